// A metallic-roughness PBR material (C6's shading core consumes this
// directly; no BRDF ever branches on a `Material` variant, unlike the
// enum-per-lobe design this replaces).

use glam::Vec3;

/// Optional texture slot, indexing into a `Scene`'s texture table. `None`
/// ("unused", the in-memory equivalent of spec.md's `-1` sentinel) is the
/// only form of "missing texture" this crate recognizes — never a `Result`
/// error, and never a bounds-checked fetch: `Scene` clamps an out-of-range
/// index back to `None` at the point a material is registered.
pub type TextureSlot = Option<u32>;

#[derive(Clone, Copy, Debug)]
pub struct Material {
    pub albedo: Vec3,
    pub metallic: f32,
    pub roughness: f32,
    pub specular: f32,
    pub ior: f32,
    pub transmission: Vec3,
    pub emission: Vec3,

    pub albedo_texture: TextureSlot,
    pub metallic_texture: TextureSlot,
    pub roughness_texture: TextureSlot,
    pub specular_texture: TextureSlot,
}

impl Default for Material {
    fn default() -> Material {
        Material {
            albedo: Vec3::splat(0.8),
            metallic: 0.0,
            roughness: 0.5,
            specular: 0.5,
            ior: 1.5,
            transmission: Vec3::ZERO,
            emission: Vec3::ZERO,
            albedo_texture: None,
            metallic_texture: None,
            roughness_texture: None,
            specular_texture: None,
        }
    }
}

impl Material {
    pub fn is_emissive(&self) -> bool {
        self.emission.max_element() > 0.0
    }

    /// Mean of the transmission tint, used as the stochastic probability of
    /// taking the transmission lobe at a hit (rather than a diffuse/specular
    /// BRDF bounce).
    pub fn transmission_probability(&self) -> f32 {
        (self.transmission.x + self.transmission.y + self.transmission.z) / 3.0
    }
}
