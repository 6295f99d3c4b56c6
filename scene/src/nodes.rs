//! Shader value nodes and their deduplicating storage.
//!
//! Nodes are interned through [`NodeStore`]: a candidate is looked up by a
//! structural hash before allocation and an existing equal node is reused,
//! so two references built from identical operands and operator are always
//! the same `Arc`. Downstream code relies on that for cheap identity
//! comparison.

use std::collections::hash_map::DefaultHasher;
use std::collections::HashMap;
use std::hash::{Hash, Hasher};
use std::sync::{Arc, RwLock};

use serde::{Deserialize, Serialize};

pub type Color = [f32; 3];

/// Serializable node description, as found in scene files and the
/// handshake blob. Interning turns this tree into shared [`ShaderNode`]s.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum NodeDesc {
    Constant {
        color: Color,
    },
    Checker {
        a: Box<NodeDesc>,
        b: Box<NodeDesc>,
        scale: f64,
    },
    Mix {
        a: Box<NodeDesc>,
        b: Box<NodeDesc>,
        factor: f32,
    },
}

impl NodeDesc {
    /// Nodes in this description tree, duplicates counted.
    pub fn node_count(&self) -> usize {
        match self {
            NodeDesc::Constant { .. } => 1,
            NodeDesc::Checker { a, b, .. } | NodeDesc::Mix { a, b, .. } => {
                1 + a.node_count() + b.node_count()
            }
        }
    }
}

/// Interned shader node. Children are themselves interned, so structural
/// identity of a node reduces to pointer identity of its operands.
#[derive(Debug)]
pub enum ShaderNode {
    Constant {
        color: Color,
    },
    Checker {
        a: Arc<ShaderNode>,
        b: Arc<ShaderNode>,
        scale: f64,
    },
    Mix {
        a: Arc<ShaderNode>,
        b: Arc<ShaderNode>,
        factor: f32,
    },
}

impl ShaderNode {
    /// Evaluates the node at a surface parameterization.
    pub fn eval(&self, u: f64, v: f64) -> Color {
        match self {
            ShaderNode::Constant { color } => *color,
            ShaderNode::Checker { a, b, scale } => {
                let parity =
                    (u * scale).floor() as i64 + (v * scale).floor() as i64;
                if parity.rem_euclid(2) == 0 {
                    a.eval(u, v)
                } else {
                    b.eval(u, v)
                }
            }
            ShaderNode::Mix { a, b, factor } => {
                let ca = a.eval(u, v);
                let cb = b.eval(u, v);
                let t = factor.clamp(0.0, 1.0);
                [
                    ca[0] + (cb[0] - ca[0]) * t,
                    ca[1] + (cb[1] - ca[1]) * t,
                    ca[2] + (cb[2] - ca[2]) * t,
                ]
            }
        }
    }

    /// Content hash over operator and operands. Interned children are
    /// hashed by pointer, floats by bit pattern.
    fn structural_hash(&self) -> u64 {
        let mut hasher = DefaultHasher::new();
        match self {
            ShaderNode::Constant { color } => {
                0u8.hash(&mut hasher);
                for channel in color {
                    channel.to_bits().hash(&mut hasher);
                }
            }
            ShaderNode::Checker { a, b, scale } => {
                1u8.hash(&mut hasher);
                (Arc::as_ptr(a) as usize).hash(&mut hasher);
                (Arc::as_ptr(b) as usize).hash(&mut hasher);
                scale.to_bits().hash(&mut hasher);
            }
            ShaderNode::Mix { a, b, factor } => {
                2u8.hash(&mut hasher);
                (Arc::as_ptr(a) as usize).hash(&mut hasher);
                (Arc::as_ptr(b) as usize).hash(&mut hasher);
                factor.to_bits().hash(&mut hasher);
            }
        }
        hasher.finish()
    }

    /// Equality fallback after a hash hit; hash equality alone is not
    /// trusted.
    fn structural_eq(&self, other: &ShaderNode) -> bool {
        match (self, other) {
            (ShaderNode::Constant { color: ca }, ShaderNode::Constant { color: cb }) => ca
                .iter()
                .zip(cb.iter())
                .all(|(x, y)| x.to_bits() == y.to_bits()),
            (
                ShaderNode::Checker {
                    a: aa,
                    b: ab,
                    scale: sa,
                },
                ShaderNode::Checker {
                    a: ba,
                    b: bb,
                    scale: sb,
                },
            ) => Arc::ptr_eq(aa, ba) && Arc::ptr_eq(ab, bb) && sa.to_bits() == sb.to_bits(),
            (
                ShaderNode::Mix {
                    a: aa,
                    b: ab,
                    factor: fa,
                },
                ShaderNode::Mix {
                    a: ba,
                    b: bb,
                    factor: fb,
                },
            ) => Arc::ptr_eq(aa, ba) && Arc::ptr_eq(ab, bb) && fa.to_bits() == fb.to_bits(),
            _ => false,
        }
    }
}

/// Content-addressed node storage with no eviction. Buckets keyed by
/// structural hash hold every node with that hash; lookups resolve
/// collisions with an explicit equality comparison.
#[derive(Debug, Default)]
pub struct NodeStore {
    table: RwLock<HashMap<u64, Vec<Arc<ShaderNode>>>>,
}

impl NodeStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Interns a description tree bottom-up, returning the shared root.
    pub fn intern_desc(&self, desc: &NodeDesc) -> Arc<ShaderNode> {
        match desc {
            NodeDesc::Constant { color } => self.intern(ShaderNode::Constant { color: *color }),
            NodeDesc::Checker { a, b, scale } => {
                let a = self.intern_desc(a);
                let b = self.intern_desc(b);
                self.intern(ShaderNode::Checker { a, b, scale: *scale })
            }
            NodeDesc::Mix { a, b, factor } => {
                let a = self.intern_desc(a);
                let b = self.intern_desc(b);
                self.intern(ShaderNode::Mix {
                    a,
                    b,
                    factor: *factor,
                })
            }
        }
    }

    /// Returns the existing node equal to `node`, or stores `node` and
    /// returns it. Operand nodes must already be interned in this store.
    pub fn intern(&self, node: ShaderNode) -> Arc<ShaderNode> {
        let hash = node.structural_hash();
        {
            let table = self
                .table
                .read()
                .unwrap_or_else(|poisoned| poisoned.into_inner());
            if let Some(bucket) = table.get(&hash) {
                for existing in bucket {
                    if existing.structural_eq(&node) {
                        return existing.clone();
                    }
                }
            }
        }

        let mut table = self
            .table
            .write()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        let bucket = table.entry(hash).or_default();
        // A racing intern may have inserted between the two locks.
        for existing in bucket.iter() {
            if existing.structural_eq(&node) {
                return existing.clone();
            }
        }
        let node = Arc::new(node);
        bucket.push(node.clone());
        node
    }

    pub fn len(&self) -> usize {
        let table = self
            .table
            .read()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        table.values().map(|bucket| bucket.len()).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
