// An Axis-Aligned Bounding Box, with the slab-test ray intersection used by
// both the BVH builder (for surface-area cost) and BVH traversal (C1).

use glam::Vec3;

#[derive(Copy, Clone, Debug)]
pub struct AABB {
    pub min: Vec3,
    pub max: Vec3,
}

impl AABB {
    /// A placeholder AABB, used for initialising arrays. Any `expand`/`join`
    /// against it yields the other operand back.
    pub const EMPTY: AABB = AABB {
        min: Vec3::splat(f32::INFINITY),
        max: Vec3::splat(f32::NEG_INFINITY),
    };

    pub fn new(min: Vec3, max: Vec3) -> AABB {
        AABB { min, max }
    }

    pub fn center(&self) -> Vec3 {
        0.5 * (self.min + self.max)
    }

    /// Returns the smallest AABB containing both `self` and `o`.
    pub fn join(&self, o: &AABB) -> AABB {
        AABB::new(self.min.min(o.min), self.max.max(o.max))
    }

    /// Returns the smallest AABB containing both `self` and the point `v`.
    pub fn include(&self, v: Vec3) -> AABB {
        AABB::new(self.min.min(v), self.max.max(v))
    }

    /// True if `o` is a subset of `self`.
    pub fn contains(&self, o: &AABB) -> bool {
        o.min.cmpge(self.min).all() && o.max.cmple(self.max).all()
    }

    /// Returns the world-space AABB enclosing `self` under an affine
    /// transform, by transforming its 8 corners and taking their union. Used
    /// to derive per-instance bounds for the TLAS from an object-space mesh
    /// bounding box.
    pub fn transformed_by(&self, transform: glam::Affine3A) -> AABB {
        let corners = [
            Vec3::new(self.min.x, self.min.y, self.min.z),
            Vec3::new(self.max.x, self.min.y, self.min.z),
            Vec3::new(self.min.x, self.max.y, self.min.z),
            Vec3::new(self.max.x, self.max.y, self.min.z),
            Vec3::new(self.min.x, self.min.y, self.max.z),
            Vec3::new(self.max.x, self.min.y, self.max.z),
            Vec3::new(self.min.x, self.max.y, self.max.z),
            Vec3::new(self.max.x, self.max.y, self.max.z),
        ];
        corners
            .iter()
            .fold(AABB::EMPTY, |acc, &c| acc.include(transform.transform_point3(c)))
    }

    /// `2 * (ex*ey + ey*ez + ez*ex)`, with degenerate (negative) extents
    /// clamped to zero so an empty or inverted box costs nothing under SAH.
    pub fn surface_area(&self) -> f32 {
        let e = (self.max - self.min).max(Vec3::ZERO);
        2.0 * (e.x * e.y + e.y * e.z + e.z * e.x)
    }

    /// Slab-test intersection against a ray already carrying its
    /// precomputed `inv_dir`. Returns `(t_near, t_far)` on a hit, with
    /// `t_near <= t_far`; the caller clamps `t_near` against the ray's `t_min`
    /// and `t_far` against the current closest hit distance.
    pub fn intersect(&self, origin: Vec3, inv_dir: Vec3) -> Option<(f32, f32)> {
        let t1 = (self.min - origin) * inv_dir;
        let t2 = (self.max - origin) * inv_dir;

        let t_min = t1.min(t2);
        let t_max = t1.max(t2);

        let t_near = t_min.x.max(t_min.y).max(t_min.z);
        let t_far = t_max.x.min(t_max.y).min(t_max.z);

        if t_near <= t_far {
            Some((t_near, t_far))
        } else {
            None
        }
    }
}

impl Default for AABB {
    fn default() -> AABB {
        AABB::EMPTY
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_includes_to_the_point() {
        let b = AABB::EMPTY.include(Vec3::new(1.0, 2.0, 3.0));
        assert_eq!(b.min, Vec3::new(1.0, 2.0, 3.0));
        assert_eq!(b.max, Vec3::new(1.0, 2.0, 3.0));
    }

    #[test]
    fn degenerate_box_has_zero_area() {
        assert_eq!(AABB::EMPTY.surface_area(), 0.0);
    }

    #[test]
    fn join_contains_both_children() {
        let a = AABB::new(Vec3::ZERO, Vec3::ONE);
        let b = AABB::new(Vec3::splat(-1.0), Vec3::splat(0.5));
        let u = a.join(&b);
        assert!(u.contains(&a));
        assert!(u.contains(&b));
    }

    #[test]
    fn ray_from_inside_straddles_zero() {
        let b = AABB::new(Vec3::splat(-1.0), Vec3::splat(1.0));
        let origin = Vec3::ZERO;
        let dir = Vec3::new(1.0, 0.3, -0.2).normalize();
        let (t_near, t_far) = b.intersect(origin, dir.recip()).unwrap();
        assert!(t_near <= 0.0);
        assert!(t_far >= 0.0);
    }

    #[test]
    fn miss_returns_none() {
        let b = AABB::new(Vec3::splat(5.0), Vec3::splat(6.0));
        let origin = Vec3::ZERO;
        let dir = Vec3::new(0.0, 0.0, 1.0);
        assert!(b.intersect(origin, dir.recip()).is_none());
    }

    #[test]
    fn transformed_by_translation_shifts_bounds() {
        let b = AABB::new(Vec3::ZERO, Vec3::ONE);
        let t = glam::Affine3A::from_translation(Vec3::new(2.0, 0.0, 0.0));
        let moved = b.transformed_by(t);
        assert_eq!(moved.min, Vec3::new(2.0, 0.0, 0.0));
        assert_eq!(moved.max, Vec3::new(3.0, 1.0, 1.0));
    }

    #[test]
    fn box_entirely_behind_origin_still_reports_bounds() {
        // The caller is responsible for rejecting t_far < ray.t_min; the box
        // test itself only reports the interval.
        let b = AABB::new(Vec3::splat(-6.0), Vec3::splat(-5.0));
        let origin = Vec3::ZERO;
        let dir = Vec3::new(1.0, 1.0, 1.0).normalize();
        let (t_near, t_far) = b.intersect(origin, dir.recip()).unwrap();
        assert!(t_near < 0.0 && t_far < 0.0);
    }
}
