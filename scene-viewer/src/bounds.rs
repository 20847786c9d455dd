use nalgebra::{Matrix4, Point3, Vector3};

/// An axis-aligned box.
///
/// Starts out inside-out (`min` at +inf, `max` at -inf) so the first point
/// expanded into it becomes both corners.
#[derive(Copy, Clone, Debug, PartialEq)]
pub struct BoundingBox {
    pub min: Vector3<f32>,
    pub max: Vector3<f32>,
}

impl Default for BoundingBox {
    fn default() -> Self {
        Self {
            min: Vector3::repeat(f32::INFINITY),
            max: Vector3::repeat(f32::NEG_INFINITY),
        }
    }
}

impl BoundingBox {
    pub fn new(min: Vector3<f32>, max: Vector3<f32>) -> Self {
        Self { min, max }
    }

    pub fn from_points<'a>(points: impl IntoIterator<Item = &'a Vector3<f32>>) -> Self {
        let mut bb = Self::default();
        for p in points {
            bb.expand(p);
        }
        bb
    }

    pub fn expand(&mut self, point: &Vector3<f32>) {
        self.min = self.min.inf(point);
        self.max = self.max.sup(point);
    }

    // true until something has been expanded into it
    pub fn is_empty(&self) -> bool {
        self.min.x > self.max.x || self.min.y > self.max.y || self.min.z > self.max.z
    }

    pub fn center(&self) -> Vector3<f32> {
        (self.min + self.max) * 0.5
    }

    pub fn size(&self) -> Vector3<f32> {
        self.max - self.min
    }

    pub fn radius(&self) -> f32 {
        self.size().norm() * 0.5
    }

    pub fn corners(&self) -> [Vector3<f32>; 8] {
        let (l, h) = (self.min, self.max);
        [
            Vector3::new(l.x, l.y, l.z),
            Vector3::new(h.x, l.y, l.z),
            Vector3::new(l.x, h.y, l.z),
            Vector3::new(l.x, l.y, h.z),
            Vector3::new(h.x, h.y, l.z),
            Vector3::new(h.x, l.y, h.z),
            Vector3::new(l.x, h.y, h.z),
            Vector3::new(h.x, h.y, h.z),
        ]
    }

    // the box around the 8 transformed corners; grows under rotation
    pub fn transformed(&self, transform: &Matrix4<f32>) -> Self {
        if self.is_empty() {
            return *self;
        }
        let mut bb = Self::default();
        for corner in self.corners().iter() {
            bb.expand(&transform.transform_point(&Point3::from(*corner)).coords);
        }
        bb
    }

    /// Slab test. Returns the distance along `direction` to where the ray enters
    /// the box, or to where it leaves if the origin is already inside.
    ///
    /// Zero direction components divide out to infinities, which the comparisons
    /// handle without any special casing. A ray that only touches an edge or a
    /// corner (near == far) counts as a hit. An empty box is never hit.
    pub fn ray_intersect(&self, origin: &Vector3<f32>, direction: &Vector3<f32>) -> Option<f32> {
        if self.is_empty() {
            return None;
        }
        let inv_dir = direction.map(|d| 1.0 / d);
        let t1 = (self.min - origin).component_mul(&inv_dir);
        let t2 = (self.max - origin).component_mul(&inv_dir);

        let t_min = t1.inf(&t2);
        let t_max = t1.sup(&t2);

        let t_near = t_min.x.max(t_min.y).max(t_min.z);
        let t_far = t_max.x.min(t_max.y).min(t_max.z);

        if t_near > t_far || t_far < 0.0 {
            return None;
        }
        Some(if t_near > 0.0 { t_near } else { t_far })
    }
}
