// Equirectangular HDRI lookup on ray miss (C12).

use crate::graphics::texture::Texture;
use glam::Vec3;
use std::f32::consts::PI;

/// Maps a direction to equirectangular UV coordinates.
fn direction_to_uv(d: Vec3) -> glam::Vec2 {
    let u = d.x.atan2(d.z) / (2.0 * PI) + 0.5;
    let v = d.y.clamp(-1.0, 1.0).acos() / PI;
    glam::Vec2::new(u, v)
}

/// Samples the environment for a terminal ray direction. Absent HDRI
/// (`None`) yields neutral white, matching spec.md §4.12.
pub fn sample_environment(env: Option<&Texture>, direction: Vec3) -> Vec3 {
    match env {
        Some(tex) => tex.sample(direction_to_uv(direction)),
        None => Vec3::ONE,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_environment_is_neutral_white() {
        assert_eq!(sample_environment(None, Vec3::Z), Vec3::ONE);
    }

    #[test]
    fn constant_environment_samples_uniformly() {
        let tex = Texture::constant(Vec3::new(0.2, 0.4, 0.6));
        let c = sample_environment(Some(&tex), Vec3::new(0.3, 0.8, -0.2).normalize());
        assert_eq!(c, Vec3::new(0.2, 0.4, 0.6));
    }
}
