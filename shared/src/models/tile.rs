use serde::{Deserialize, Serialize};

/// Rectangular pixel region of the frame, in frame coordinates.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Region {
    pub x: u32,
    pub y: u32,
    pub width: u32,
    pub height: u32,
}

impl Region {
    pub fn pixel_count(&self) -> usize {
        self.width as usize * self.height as usize
    }
}

/// One unit of render work. Ids are assigned row-major when the frame is
/// partitioned and double as the assignment tie-breaker: lowest id first.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Tile {
    pub id: u32,
    pub region: Region,
}

impl Tile {
    /// Partitions a frame into a fixed-size grid, left to right, top to
    /// bottom. Edge tiles are clipped to the frame bounds.
    pub fn grid(frame_width: u32, frame_height: u32, tile_size: u32) -> Vec<Tile> {
        let tile_size = tile_size.max(1);
        let mut tiles = Vec::new();
        let mut id = 0;
        let mut y = 0;
        while y < frame_height {
            let mut x = 0;
            while x < frame_width {
                tiles.push(Tile {
                    id,
                    region: Region {
                        x,
                        y,
                        width: tile_size.min(frame_width - x),
                        height: tile_size.min(frame_height - y),
                    },
                });
                id += 1;
                x += tile_size;
            }
            y += tile_size;
        }
        tiles
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn grid_exact_fit() {
        let tiles = Tile::grid(512, 512, 256);
        assert_eq!(tiles.len(), 4);
        assert_eq!(
            tiles[0].region,
            Region {
                x: 0,
                y: 0,
                width: 256,
                height: 256
            }
        );
        assert_eq!(
            tiles[3].region,
            Region {
                x: 256,
                y: 256,
                width: 256,
                height: 256
            }
        );
    }

    #[test]
    fn grid_clips_edge_tiles() {
        let tiles = Tile::grid(640, 480, 256);
        assert_eq!(tiles.len(), 6);
        assert_eq!(
            tiles[2].region,
            Region {
                x: 512,
                y: 0,
                width: 128,
                height: 256
            }
        );
        assert_eq!(
            tiles[5].region,
            Region {
                x: 512,
                y: 256,
                width: 128,
                height: 224
            }
        );
    }

    #[test]
    fn grid_ids_are_row_major() {
        let tiles = Tile::grid(64, 64, 16);
        for (index, tile) in tiles.iter().enumerate() {
            assert_eq!(tile.id as usize, index);
        }
        assert_eq!(tiles[4].region.x, 0);
        assert_eq!(tiles[4].region.y, 16);
    }

    #[test]
    fn grid_regions_are_disjoint_and_cover_the_frame() {
        let tiles = Tile::grid(100, 70, 32);
        let mut covered = vec![false; 100 * 70];
        for tile in &tiles {
            let r = tile.region;
            for y in r.y..r.y + r.height {
                for x in r.x..r.x + r.width {
                    let index = (y * 100 + x) as usize;
                    assert!(!covered[index], "pixel ({}, {}) covered twice", x, y);
                    covered[index] = true;
                }
            }
        }
        assert!(covered.iter().all(|&c| c));
    }
}
