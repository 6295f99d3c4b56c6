//! The render-tile service: given a scene and a tile region, produce the
//! pixels for that region. Pure with respect to the coordination layer.

use std::fmt;

use rand::Rng;
use shared::models::pixel::PixelBuffer;
use shared::models::tile::Region;

use crate::bvh::{Bvh, Hit, Ray};
use crate::math::Vec3;
use crate::{Camera, Scene};

pub const SAMPLES_PER_PIXEL: u32 = 4;

const SHADOW_BIAS: f64 = 1e-3;
const AMBIENT: f32 = 0.18;

#[derive(Debug)]
pub enum RenderError {
    AccelMissing,
}

impl fmt::Display for RenderError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RenderError::AccelMissing => {
                write!(f, "top-level acceleration structure is not built")
            }
        }
    }
}

impl std::error::Error for RenderError {}

/// Renders one tile. Traversal happens under the scene's shared lock,
/// which is held for the duration of the tile and released before the
/// result is handed back.
pub fn render_tile(scene: &Scene, region: &Region) -> Result<PixelBuffer, RenderError> {
    scene.with_accel(|bvh| {
        let bvh = bvh.ok_or(RenderError::AccelMissing)?;
        let mut buffer = PixelBuffer::new(region.width, region.height);
        let mut rng = rand::thread_rng();
        let frame_width = scene.width();
        let frame_height = scene.height();

        for py in 0..region.height {
            for px in 0..region.width {
                let mut accum = [0.0f32; 3];
                for _ in 0..SAMPLES_PER_PIXEL {
                    let fx = (region.x + px) as f64 + rng.gen::<f64>();
                    let fy = (region.y + py) as f64 + rng.gen::<f64>();
                    let ray = primary_ray(scene.camera(), fx, fy, frame_width, frame_height);
                    let color = match bvh.intersect(&ray, scene.spheres()) {
                        Some(hit) => shade(scene, bvh, &hit),
                        None => background(scene, &ray),
                    };
                    accum[0] += color[0];
                    accum[1] += color[1];
                    accum[2] += color[2];
                }
                let scale = 1.0 / SAMPLES_PER_PIXEL as f32;
                buffer.put_pixel(
                    px,
                    py,
                    [
                        to_channel(accum[0] * scale),
                        to_channel(accum[1] * scale),
                        to_channel(accum[2] * scale),
                        0xff,
                    ],
                );
            }
        }
        Ok(buffer)
    })
}

fn primary_ray(camera: &Camera, fx: f64, fy: f64, width: u32, height: u32) -> Ray {
    let aspect = width as f64 / height as f64;
    let half_height = (camera.fov.to_radians() / 2.0).tan();
    let half_width = aspect * half_height;

    let forward = (camera.look_at - camera.position).normalized();
    let right = forward.cross(camera.up).normalized();
    let up = right.cross(forward);

    let ndc_x = 2.0 * fx / width as f64 - 1.0;
    let ndc_y = 1.0 - 2.0 * fy / height as f64;
    let direction =
        (forward + right * (ndc_x * half_width) + up * (ndc_y * half_height)).normalized();
    Ray {
        origin: camera.position,
        direction,
    }
}

fn shade(scene: &Scene, bvh: &Bvh, hit: &Hit) -> [f32; 3] {
    let base = scene.material(hit.sphere).eval(hit.u, hit.v);
    let to_light = -scene.sun_direction();
    let lambert = hit.normal.dot(to_light).max(0.0) as f32;

    let lit = if lambert > 0.0 {
        let shadow_ray = Ray {
            origin: hit.point + hit.normal * SHADOW_BIAS,
            direction: to_light,
        };
        !bvh.occluded(&shadow_ray, scene.spheres(), f64::INFINITY)
    } else {
        false
    };

    let intensity = if lit {
        AMBIENT + (1.0 - AMBIENT) * lambert
    } else {
        AMBIENT
    };
    [base[0] * intensity, base[1] * intensity, base[2] * intensity]
}

fn background(scene: &Scene, ray: &Ray) -> [f32; 3] {
    let u = 0.5 + ray.direction.z.atan2(ray.direction.x) / (2.0 * std::f64::consts::PI);
    let v = 0.5 - ray.direction.y.clamp(-1.0, 1.0).asin() / std::f64::consts::PI;
    scene.background().eval(u, v)
}

fn to_channel(value: f32) -> u8 {
    (value.clamp(0.0, 1.0) * 255.0) as u8
}

#[cfg(test)]
mod tests {
    use super::*;
    use shared::models::pixel::BYTES_PER_PIXEL;

    #[test]
    fn tile_buffer_matches_its_region() {
        let scene = Scene::demo(128, 96);
        let region = Region {
            x: 32,
            y: 16,
            width: 48,
            height: 40,
        };
        let buffer = render_tile(&scene, &region).unwrap();
        assert!(buffer.matches(&region));
        assert_eq!(buffer.data.len(), region.pixel_count() * BYTES_PER_PIXEL);
    }

    #[test]
    fn torn_down_scene_reports_a_render_error() {
        let scene = Scene::demo(64, 64);
        scene.teardown();
        let region = Region {
            x: 0,
            y: 0,
            width: 16,
            height: 16,
        };
        assert!(render_tile(&scene, &region).is_err());
    }

    #[test]
    fn sky_tile_is_not_black() {
        let scene = Scene::demo(128, 128);
        let region = Region {
            x: 0,
            y: 0,
            width: 16,
            height: 16,
        };
        let buffer = render_tile(&scene, &region).unwrap();
        assert!(buffer.data.iter().step_by(4).any(|&channel| channel > 0));
    }
}
