// Thin-lens camera data (C7). The raygen core consumes `horizontal`/
// `vertical` already scaled to sensor size; `look_at` is a convenience
// constructor a host can use instead of assembling that basis by hand,
// mirroring the derivation in the distilled reference's `PerspectiveCamera`
// (right/up built from `direction` and world-up, scaled by sensor size).

use glam::Vec3;

#[derive(Clone, Copy, Debug)]
pub struct CameraData {
    pub position: Vec3,
    pub direction: Vec3,
    pub horizontal: Vec3,
    pub vertical: Vec3,
    /// Millimeters.
    pub focal_length: f32,
    /// f-stop; 0 disables depth of field.
    pub aperture: f32,
    /// Meters.
    pub focus_distance: f32,
    pub bokeh_bias: f32,
}

impl CameraData {
    /// Builds a camera basis from a look-at pose. `sensor_width`/
    /// `sensor_height` are in meters; `horizontal`/`vertical` come out scaled
    /// only by sensor size, never by `focus_distance` — the thin-lens raygen
    /// (§4.7) applies focal length and focus distance itself.
    pub fn look_at(
        position: Vec3,
        target: Vec3,
        world_up: Vec3,
        sensor_width: f32,
        sensor_height: f32,
        focal_length: f32,
        aperture: f32,
        focus_distance: f32,
        bokeh_bias: f32,
    ) -> CameraData {
        let direction = (target - position).normalize();
        let right = direction.cross(world_up).normalize();
        let up = right.cross(direction).normalize();

        CameraData {
            position,
            direction,
            horizontal: right * sensor_width,
            vertical: up * sensor_height,
            focal_length,
            aperture,
            focus_distance,
            bokeh_bias,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn look_at_produces_an_orthogonal_basis() {
        let cam = CameraData::look_at(
            Vec3::new(0.0, 0.0, -5.0),
            Vec3::ZERO,
            Vec3::Y,
            0.036,
            0.036,
            30.0,
            0.0,
            5.0,
            0.0,
        );
        assert!(cam.direction.dot(cam.horizontal).abs() < 1e-5);
        assert!(cam.direction.dot(cam.vertical).abs() < 1e-5);
        assert!(cam.horizontal.dot(cam.vertical).abs() < 1e-5);
    }

    #[test]
    fn look_at_normalizes_direction() {
        let cam = CameraData::look_at(
            Vec3::ZERO,
            Vec3::new(0.0, 0.0, 10.0),
            Vec3::Y,
            0.036,
            0.036,
            30.0,
            0.0,
            5.0,
            0.0,
        );
        assert!((cam.direction.length() - 1.0).abs() < 1e-5);
    }
}
