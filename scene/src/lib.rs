pub mod bvh;
pub mod math;
pub mod nodes;
pub mod render;

use std::fmt;
use std::sync::{Arc, RwLock};

use log::debug;
use serde::{Deserialize, Serialize};

use bvh::Bvh;
use math::Vec3;
use nodes::{NodeDesc, NodeStore, ShaderNode};

#[derive(Debug)]
pub enum SceneError {
    Serialization(serde_json::Error),
}

impl fmt::Display for SceneError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SceneError::Serialization(e) => write!(f, "scene serialization error: {}", e),
        }
    }
}

impl std::error::Error for SceneError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            SceneError::Serialization(e) => Some(e),
        }
    }
}

impl From<serde_json::Error> for SceneError {
    fn from(e: serde_json::Error) -> Self {
        SceneError::Serialization(e)
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct Camera {
    pub position: Vec3,
    pub look_at: Vec3,
    pub up: Vec3,
    /// Vertical field of view in degrees.
    pub fov: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Sphere {
    pub center: Vec3,
    pub radius: f64,
    pub material: NodeDesc,
}

/// Serializable scene description: this is what travels as the handshake
/// blob, and what scene files on disk contain.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SceneDesc {
    pub width: u32,
    pub height: u32,
    pub camera: Camera,
    pub sun_direction: Vec3,
    pub background: NodeDesc,
    pub spheres: Vec<Sphere>,
}

/// In-memory scene shared by every concurrent render operation.
///
/// The top-level acceleration structure sits behind a reader/writer lock:
/// traversal takes the shared side, rebuild and teardown take the exclusive
/// side and wait for in-flight readers to drain. Shader nodes are interned
/// through the [`NodeStore`], so structurally identical nodes are one
/// shared instance.
pub struct Scene {
    desc: SceneDesc,
    sun_direction: Vec3,
    materials: Vec<Arc<ShaderNode>>,
    background: Arc<ShaderNode>,
    storage: NodeStore,
    top_level: RwLock<Option<Bvh>>,
}

impl Scene {
    pub fn from_desc(desc: SceneDesc) -> Self {
        let storage = NodeStore::new();
        let materials = desc
            .spheres
            .iter()
            .map(|sphere| storage.intern_desc(&sphere.material))
            .collect();
        let background = storage.intern_desc(&desc.background);
        let sun_direction = desc.sun_direction.normalized();
        let scene = Self {
            desc,
            sun_direction,
            materials,
            background,
            storage,
            top_level: RwLock::new(None),
        };
        scene.rebuild_accel();
        scene
    }

    /// Built-in scene used when no scene file is given: a checkered ground
    /// sphere and a few shaded spheres above it.
    pub fn demo(width: u32, height: u32) -> Self {
        let white = NodeDesc::Constant {
            color: [0.85, 0.85, 0.85],
        };
        let charcoal = NodeDesc::Constant {
            color: [0.12, 0.12, 0.14],
        };
        let desc = SceneDesc {
            width,
            height,
            camera: Camera {
                position: Vec3::new(0.0, 1.4, 4.2),
                look_at: Vec3::new(0.0, 0.6, 0.0),
                up: Vec3::new(0.0, 1.0, 0.0),
                fov: 55.0,
            },
            sun_direction: Vec3::new(-0.45, -1.0, -0.3),
            background: NodeDesc::Constant {
                color: [0.48, 0.65, 0.93],
            },
            spheres: vec![
                Sphere {
                    center: Vec3::new(0.0, -100.0, 0.0),
                    radius: 100.0,
                    material: NodeDesc::Checker {
                        a: Box::new(white.clone()),
                        b: Box::new(charcoal),
                        scale: 160.0,
                    },
                },
                Sphere {
                    center: Vec3::new(-1.2, 0.6, 0.0),
                    radius: 0.6,
                    material: NodeDesc::Constant {
                        color: [0.82, 0.2, 0.16],
                    },
                },
                Sphere {
                    center: Vec3::new(0.2, 0.7, -0.4),
                    radius: 0.7,
                    material: NodeDesc::Mix {
                        a: Box::new(NodeDesc::Constant {
                            color: [0.2, 0.45, 0.85],
                        }),
                        b: Box::new(white.clone()),
                        factor: 0.35,
                    },
                },
                Sphere {
                    center: Vec3::new(1.5, 0.45, 0.6),
                    radius: 0.45,
                    material: NodeDesc::Checker {
                        a: Box::new(NodeDesc::Constant {
                            color: [0.95, 0.75, 0.2],
                        }),
                        b: Box::new(white),
                        scale: 12.0,
                    },
                },
            ],
        };
        Self::from_desc(desc)
    }

    /// Serializes the scene description; sent once per worker connection.
    pub fn to_blob(&self) -> Result<Vec<u8>, SceneError> {
        Ok(serde_json::to_vec(&self.desc)?)
    }

    pub fn from_blob(blob: &[u8]) -> Result<Self, SceneError> {
        let desc: SceneDesc = serde_json::from_slice(blob)?;
        Ok(Self::from_desc(desc))
    }

    pub fn width(&self) -> u32 {
        self.desc.width
    }

    pub fn height(&self) -> u32 {
        self.desc.height
    }

    pub fn camera(&self) -> &Camera {
        &self.desc.camera
    }

    pub fn sun_direction(&self) -> Vec3 {
        self.sun_direction
    }

    pub fn spheres(&self) -> &[Sphere] {
        &self.desc.spheres
    }

    pub fn material(&self, sphere: usize) -> &Arc<ShaderNode> {
        &self.materials[sphere]
    }

    pub fn background(&self) -> &Arc<ShaderNode> {
        &self.background
    }

    pub fn node_storage(&self) -> &NodeStore {
        &self.storage
    }

    /// Rebuilds the top-level acceleration structure. Waits for all
    /// in-flight traversals before swapping it.
    pub fn rebuild_accel(&self) {
        let bvh = Bvh::build(&self.desc.spheres);
        let mut guard = self
            .top_level
            .write()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        *guard = Some(bvh);
        debug!(
            "Top-level acceleration structure built over {} spheres",
            self.desc.spheres.len()
        );
    }

    /// Runs `f` with the acceleration structure under the shared lock.
    pub fn with_accel<R>(&self, f: impl FnOnce(Option<&Bvh>) -> R) -> R {
        let guard = self
            .top_level
            .read()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        f(guard.as_ref())
    }

    /// Drops the acceleration structure under the exclusive lock, after all
    /// in-flight traversals have drained.
    pub fn teardown(&self) {
        let mut guard = self
            .top_level
            .write()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        *guard = None;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn blob_round_trips_the_description() {
        let scene = Scene::demo(320, 240);
        let blob = scene.to_blob().unwrap();
        let restored = Scene::from_blob(&blob).unwrap();
        assert_eq!(restored.width(), 320);
        assert_eq!(restored.height(), 240);
        assert_eq!(restored.spheres().len(), scene.spheres().len());
        assert!(restored.with_accel(|bvh| bvh.is_some()));
    }

    #[test]
    fn teardown_removes_the_accel_structure() {
        let scene = Scene::demo(64, 64);
        assert!(scene.with_accel(|bvh| bvh.is_some()));
        scene.teardown();
        assert!(scene.with_accel(|bvh| bvh.is_none()));
        scene.rebuild_accel();
        assert!(scene.with_accel(|bvh| bvh.is_some()));
    }

    #[test]
    fn demo_scene_shares_interned_nodes() {
        let scene = Scene::demo(64, 64);
        // The white constant appears in three materials; interning must
        // collapse it to one node.
        let interned = scene.node_storage().len();
        let mut total = 0;
        for sphere in scene.spheres() {
            total += sphere.material.node_count();
        }
        total += 1; // background
        assert!(interned < total);
    }
}
