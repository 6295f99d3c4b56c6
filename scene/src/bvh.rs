//! Bounding volume hierarchy over the scene's spheres.
//!
//! The tree stores sphere indices; callers pass the sphere slice back in at
//! traversal time, which keeps the structure cheap to rebuild at frame
//! boundaries.

use crate::math::Vec3;
use crate::Sphere;

const T_MIN: f64 = 1e-4;

#[derive(Debug, Clone, Copy)]
pub struct Ray {
    pub origin: Vec3,
    pub direction: Vec3,
}

impl Ray {
    pub fn at(&self, t: f64) -> Vec3 {
        self.origin + self.direction * t
    }
}

#[derive(Debug, Clone, Copy)]
pub struct Hit {
    pub t: f64,
    pub point: Vec3,
    pub normal: Vec3,
    pub sphere: usize,
    pub u: f64,
    pub v: f64,
}

#[derive(Debug, Clone, Copy)]
struct Aabb {
    min: Vec3,
    max: Vec3,
}

impl Aabb {
    fn of_sphere(sphere: &Sphere) -> Self {
        let r = Vec3::new(sphere.radius, sphere.radius, sphere.radius);
        Self {
            min: sphere.center - r,
            max: sphere.center + r,
        }
    }

    fn union(self, other: Aabb) -> Aabb {
        Aabb {
            min: Vec3::new(
                self.min.x.min(other.min.x),
                self.min.y.min(other.min.y),
                self.min.z.min(other.min.z),
            ),
            max: Vec3::new(
                self.max.x.max(other.max.x),
                self.max.y.max(other.max.y),
                self.max.z.max(other.max.z),
            ),
        }
    }

    fn largest_axis(&self) -> usize {
        let extent = self.max - self.min;
        if extent.x >= extent.y && extent.x >= extent.z {
            0
        } else if extent.y >= extent.z {
            1
        } else {
            2
        }
    }

    fn hit(&self, ray: &Ray, mut t_min: f64, mut t_max: f64) -> bool {
        for axis in 0..3 {
            let origin = ray.origin.axis(axis);
            let direction = ray.direction.axis(axis);
            let inv = 1.0 / direction;
            let mut t0 = (self.min.axis(axis) - origin) * inv;
            let mut t1 = (self.max.axis(axis) - origin) * inv;
            if inv < 0.0 {
                std::mem::swap(&mut t0, &mut t1);
            }
            t_min = t_min.max(t0);
            t_max = t_max.min(t1);
            if t_max <= t_min {
                return false;
            }
        }
        true
    }
}

#[derive(Debug)]
enum Node {
    Leaf {
        bounds: Aabb,
        spheres: Vec<usize>,
    },
    Branch {
        bounds: Aabb,
        left: Box<Node>,
        right: Box<Node>,
    },
}

impl Node {
    fn bounds(&self) -> Aabb {
        match self {
            Node::Leaf { bounds, .. } | Node::Branch { bounds, .. } => *bounds,
        }
    }
}

#[derive(Debug)]
pub struct Bvh {
    root: Option<Node>,
}

impl Bvh {
    pub fn build(spheres: &[Sphere]) -> Self {
        if spheres.is_empty() {
            return Self { root: None };
        }
        let indices: Vec<usize> = (0..spheres.len()).collect();
        Self {
            root: Some(build_node(spheres, indices)),
        }
    }

    /// Nearest intersection along `ray`, if any.
    pub fn intersect(&self, ray: &Ray, spheres: &[Sphere]) -> Option<Hit> {
        let root = self.root.as_ref()?;
        intersect_node(root, ray, spheres, f64::INFINITY)
    }

    /// True when anything lies along `ray` closer than `t_max`; used for
    /// shadow rays.
    pub fn occluded(&self, ray: &Ray, spheres: &[Sphere], t_max: f64) -> bool {
        match self.root.as_ref() {
            Some(root) => intersect_node(root, ray, spheres, t_max).is_some(),
            None => false,
        }
    }
}

fn build_node(spheres: &[Sphere], mut indices: Vec<usize>) -> Node {
    let bounds = indices
        .iter()
        .map(|&i| Aabb::of_sphere(&spheres[i]))
        .reduce(Aabb::union)
        .unwrap_or(Aabb {
            min: Vec3::new(0.0, 0.0, 0.0),
            max: Vec3::new(0.0, 0.0, 0.0),
        });

    if indices.len() <= 2 {
        return Node::Leaf {
            bounds,
            spheres: indices,
        };
    }

    let axis = bounds.largest_axis();
    indices.sort_by(|&a, &b| {
        spheres[a]
            .center
            .axis(axis)
            .total_cmp(&spheres[b].center.axis(axis))
    });
    let right_half = indices.split_off(indices.len() / 2);
    let left = build_node(spheres, indices);
    let right = build_node(spheres, right_half);
    Node::Branch {
        bounds: left.bounds().union(right.bounds()),
        left: Box::new(left),
        right: Box::new(right),
    }
}

fn intersect_node(node: &Node, ray: &Ray, spheres: &[Sphere], t_max: f64) -> Option<Hit> {
    if !node.bounds().hit(ray, T_MIN, t_max) {
        return None;
    }
    match node {
        Node::Leaf {
            spheres: indices, ..
        } => {
            let mut closest: Option<Hit> = None;
            let mut limit = t_max;
            for &index in indices {
                if let Some(hit) = sphere_hit(&spheres[index], index, ray, limit) {
                    limit = hit.t;
                    closest = Some(hit);
                }
            }
            closest
        }
        Node::Branch { left, right, .. } => {
            let left_hit = intersect_node(left, ray, spheres, t_max);
            let limit = left_hit.as_ref().map_or(t_max, |hit| hit.t);
            intersect_node(right, ray, spheres, limit).or(left_hit)
        }
    }
}

fn sphere_hit(sphere: &Sphere, index: usize, ray: &Ray, t_max: f64) -> Option<Hit> {
    let oc = ray.origin - sphere.center;
    let a = ray.direction.dot(ray.direction);
    let half_b = oc.dot(ray.direction);
    let c = oc.dot(oc) - sphere.radius * sphere.radius;
    let discriminant = half_b * half_b - a * c;
    if discriminant < 0.0 {
        return None;
    }

    let sqrt_d = discriminant.sqrt();
    let mut t = (-half_b - sqrt_d) / a;
    if t < T_MIN || t > t_max {
        t = (-half_b + sqrt_d) / a;
        if t < T_MIN || t > t_max {
            return None;
        }
    }

    let point = ray.at(t);
    let normal = (point - sphere.center) * (1.0 / sphere.radius);
    let u = 0.5 + normal.z.atan2(normal.x) / (2.0 * std::f64::consts::PI);
    let v = 0.5 - normal.y.clamp(-1.0, 1.0).asin() / std::f64::consts::PI;
    Some(Hit {
        t,
        point,
        normal,
        sphere: index,
        u,
        v,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::nodes::NodeDesc;

    fn sphere(center: Vec3, radius: f64) -> Sphere {
        Sphere {
            center,
            radius,
            material: NodeDesc::Constant {
                color: [1.0, 1.0, 1.0],
            },
        }
    }

    #[test]
    fn ray_hits_single_sphere() {
        let spheres = vec![sphere(Vec3::new(0.0, 0.0, -3.0), 1.0)];
        let bvh = Bvh::build(&spheres);
        let ray = Ray {
            origin: Vec3::new(0.0, 0.0, 0.0),
            direction: Vec3::new(0.0, 0.0, -1.0),
        };
        let hit = bvh.intersect(&ray, &spheres).unwrap();
        assert!((hit.t - 2.0).abs() < 1e-9);
        assert_eq!(hit.sphere, 0);
        assert!((hit.normal.z - 1.0).abs() < 1e-9);
    }

    #[test]
    fn ray_misses_off_axis() {
        let spheres = vec![sphere(Vec3::new(0.0, 0.0, -3.0), 1.0)];
        let bvh = Bvh::build(&spheres);
        let ray = Ray {
            origin: Vec3::new(5.0, 0.0, 0.0),
            direction: Vec3::new(0.0, 0.0, -1.0),
        };
        assert!(bvh.intersect(&ray, &spheres).is_none());
    }

    #[test]
    fn nearest_of_two_spheres_wins() {
        let spheres = vec![
            sphere(Vec3::new(0.0, 0.0, -8.0), 1.0),
            sphere(Vec3::new(0.0, 0.0, -3.0), 1.0),
        ];
        let bvh = Bvh::build(&spheres);
        let ray = Ray {
            origin: Vec3::new(0.0, 0.0, 0.0),
            direction: Vec3::new(0.0, 0.0, -1.0),
        };
        let hit = bvh.intersect(&ray, &spheres).unwrap();
        assert_eq!(hit.sphere, 1);
    }

    #[test]
    fn empty_scene_never_hits() {
        let spheres: Vec<Sphere> = Vec::new();
        let bvh = Bvh::build(&spheres);
        let ray = Ray {
            origin: Vec3::new(0.0, 0.0, 0.0),
            direction: Vec3::new(0.0, 0.0, -1.0),
        };
        assert!(bvh.intersect(&ray, &spheres).is_none());
        assert!(!bvh.occluded(&ray, &spheres, f64::INFINITY));
    }

    #[test]
    fn occlusion_respects_distance_limit() {
        let spheres = vec![sphere(Vec3::new(0.0, 0.0, -10.0), 1.0)];
        let bvh = Bvh::build(&spheres);
        let ray = Ray {
            origin: Vec3::new(0.0, 0.0, 0.0),
            direction: Vec3::new(0.0, 0.0, -1.0),
        };
        assert!(bvh.occluded(&ray, &spheres, f64::INFINITY));
        assert!(!bvh.occluded(&ray, &spheres, 5.0));
    }
}
