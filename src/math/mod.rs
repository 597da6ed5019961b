// External imports
pub use glam::{Affine3A, Mat3, Mat4, Vec2, Vec3};

pub mod rng;
pub mod sampling;

pub const EPSILON: f32 = 1e-6;
pub const RAY_EPSILON: f32 = 1e-7;

/// Clamps `x` into `[min_val, max_val]`.
pub fn clamp(x: f32, min_val: f32, max_val: f32) -> f32 {
    x.max(min_val).min(max_val)
}

/// Replaces a non-finite value with `fallback`. Used to stop a single
/// degenerate path vertex (NaN/Inf throughput or radiance) from poisoning
/// the accumulator.
pub fn finite_or(v: Vec3, fallback: Vec3) -> Vec3 {
    if v.is_finite() {
        v
    } else {
        fallback
    }
}

/// Builds an orthonormal tangent/bitangent pair for the given normal.
/// Switches reference axis to avoid a degenerate cross product when `N` is
/// nearly aligned with world-Z.
pub fn build_coordinate_system(n: Vec3) -> (Vec3, Vec3) {
    let t = if n.z.abs() < 0.999 {
        n.cross(Vec3::Z).normalize()
    } else {
        n.cross(Vec3::Y).normalize()
    };
    let b = t.cross(n);
    (t, b)
}
