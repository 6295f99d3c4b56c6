use serde::{Deserialize, Serialize};

use super::tile::Region;

pub const BYTES_PER_PIXEL: usize = 4;

/// RGBA8 pixel storage, used both for single tile results and for the
/// assembled frame.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PixelBuffer {
    pub width: u32,
    pub height: u32,
    pub data: Vec<u8>,
}

impl PixelBuffer {
    /// An opaque black buffer of the given dimensions.
    pub fn new(width: u32, height: u32) -> Self {
        let mut data = vec![0u8; width as usize * height as usize * BYTES_PER_PIXEL];
        for pixel in data.chunks_exact_mut(BYTES_PER_PIXEL) {
            pixel[3] = 0xff;
        }
        Self {
            width,
            height,
            data,
        }
    }

    /// Wraps raw bytes, refusing data that does not match the dimensions.
    pub fn from_raw(width: u32, height: u32, data: Vec<u8>) -> Option<Self> {
        if data.len() != width as usize * height as usize * BYTES_PER_PIXEL {
            return None;
        }
        Some(Self {
            width,
            height,
            data,
        })
    }

    pub fn matches(&self, region: &Region) -> bool {
        self.width == region.width
            && self.height == region.height
            && self.data.len() == region.pixel_count() * BYTES_PER_PIXEL
    }

    pub fn put_pixel(&mut self, x: u32, y: u32, rgba: [u8; 4]) {
        let offset = (y as usize * self.width as usize + x as usize) * BYTES_PER_PIXEL;
        self.data[offset..offset + BYTES_PER_PIXEL].copy_from_slice(&rgba);
    }

    /// Copies `tile` into this buffer with its top-left corner at `(x, y)`.
    /// Tile regions are disjoint by construction, so blits never overlap.
    pub fn blit(&mut self, x: u32, y: u32, tile: &PixelBuffer) {
        let rows = tile.height.min(self.height.saturating_sub(y));
        let columns = tile.width.min(self.width.saturating_sub(x));
        for row in 0..rows {
            let src_start = row as usize * tile.width as usize * BYTES_PER_PIXEL;
            let src_end = src_start + columns as usize * BYTES_PER_PIXEL;
            let dst_start =
                ((y + row) as usize * self.width as usize + x as usize) * BYTES_PER_PIXEL;
            let dst_end = dst_start + columns as usize * BYTES_PER_PIXEL;
            self.data[dst_start..dst_end].copy_from_slice(&tile.data[src_start..src_end]);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn from_raw_rejects_short_data() {
        assert!(PixelBuffer::from_raw(4, 4, vec![0u8; 4 * 4 * 4 - 1]).is_none());
        assert!(PixelBuffer::from_raw(4, 4, vec![0u8; 4 * 4 * 4]).is_some());
    }

    #[test]
    fn blit_writes_only_the_target_region() {
        let mut frame = PixelBuffer::new(8, 8);
        let mut tile = PixelBuffer::new(4, 4);
        for y in 0..4 {
            for x in 0..4 {
                tile.put_pixel(x, y, [0x11, 0x22, 0x33, 0xff]);
            }
        }

        frame.blit(4, 4, &tile);

        for y in 0..8u32 {
            for x in 0..8u32 {
                let offset = (y as usize * 8 + x as usize) * BYTES_PER_PIXEL;
                let red = frame.data[offset];
                if x >= 4 && y >= 4 {
                    assert_eq!(red, 0x11);
                } else {
                    assert_eq!(red, 0);
                }
            }
        }
    }
}
