// A bilinearly-filtered, repeat-wrapped image sampler (C11).

use glam::{Vec2, Vec3};

/// An RGB image, stored as linear float texels. A host loading 8-bit PNGs or
/// similar converts once at registration time; the sampling core only ever
/// deals in `Vec3`.
#[derive(Clone, Debug)]
pub struct Texture {
    pub width: u32,
    pub height: u32,
    texels: Vec<Vec3>,
}

impl Texture {
    /// Builds a texture from a row-major `width * height` texel buffer.
    pub fn new(width: u32, height: u32, texels: Vec<Vec3>) -> Texture {
        debug_assert_eq!(texels.len(), (width as usize) * (height as usize));
        Texture {
            width,
            height,
            texels,
        }
    }

    /// A single-texel texture, useful for constant-color fallbacks.
    pub fn constant(color: Vec3) -> Texture {
        Texture::new(1, 1, vec![color])
    }

    fn texel(&self, x: i64, y: i64) -> Vec3 {
        let ix = modulo(x, self.width as i64) as usize;
        let iy = modulo(y, self.height as i64) as usize;
        self.texels[iy * self.width as usize + ix]
    }

    /// Bilinearly samples the texture at UV coordinates in `(0,1)x(0,1)`.
    /// Coordinates outside that range wrap (repeat addressing); this is the
    /// only addressing mode supported.
    pub fn sample(&self, uv: Vec2) -> Vec3 {
        let x = uv.x * self.width as f32 - 0.5;
        let y = uv.y * self.height as f32 - 0.5;

        let x0 = x.floor();
        let y0 = y.floor();
        let fx = x - x0;
        let fy = y - y0;

        let x0 = x0 as i64;
        let y0 = y0 as i64;

        let c00 = self.texel(x0, y0);
        let c10 = self.texel(x0 + 1, y0);
        let c01 = self.texel(x0, y0 + 1);
        let c11 = self.texel(x0 + 1, y0 + 1);

        let top = c00.lerp(c10, fx);
        let bottom = c01.lerp(c11, fx);
        top.lerp(bottom, fy)
    }
}

/// Mathematically correct modulo, unlike Rust's `%` remainder operator.
fn modulo(a: i64, m: i64) -> i64 {
    ((a % m) + m) % m
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn constant_texture_samples_uniformly() {
        let tex = Texture::constant(Vec3::new(0.25, 0.5, 0.75));
        assert_eq!(tex.sample(Vec2::new(0.1, 0.9)), Vec3::new(0.25, 0.5, 0.75));
    }

    #[test]
    fn sampling_wraps_past_one() {
        let tex = Texture::new(
            2,
            1,
            vec![Vec3::new(1.0, 0.0, 0.0), Vec3::new(0.0, 1.0, 0.0)],
        );
        let inside = tex.sample(Vec2::new(0.25, 0.5));
        let wrapped = tex.sample(Vec2::new(1.25, 0.5));
        assert_eq!(inside, wrapped);
    }

    #[test]
    fn bilinear_blend_is_between_neighbors() {
        let tex = Texture::new(
            2,
            1,
            vec![Vec3::new(0.0, 0.0, 0.0), Vec3::new(1.0, 1.0, 1.0)],
        );
        let mid = tex.sample(Vec2::new(0.5, 0.5));
        assert!(mid.x > 0.0 && mid.x < 1.0);
    }
}
