// BRDF sampling, evaluation and PDFs for the shading core (C5/C6).
// Grounded on the CPU reference implementation's `ShadersCpu` namespace:
// cosine-weighted diffuse, GGX half-vector sampling, Schlick Fresnel,
// Smith/Schlick-GGX geometry term.

use crate::math::{build_coordinate_system, clamp, EPSILON};
use glam::Vec3;
use std::f32::consts::PI;

/// Cosine-weighted sample of the upper hemisphere around `n`.
pub fn sample_diffuse(n: Vec3, u1: f32, u2: f32) -> Vec3 {
    let r = u1.sqrt();
    let theta = 2.0 * PI * u2;
    let x = r * theta.cos();
    let y = r * theta.sin();
    let z = (1.0 - u1).max(0.0).sqrt();

    let (t, b) = build_coordinate_system(n);
    (x * t + y * b + z * n).normalize()
}

/// PDF of `sample_diffuse` for the given direction `l`.
pub fn pdf_diffuse(n: Vec3, l: Vec3) -> f32 {
    n.dot(l).max(0.0) / PI
}

/// Lambertian BRDF, already folded by `(1 - metallic)`.
pub fn evaluate_diffuse_brdf(albedo: Vec3, metallic: f32) -> Vec3 {
    albedo / PI * (1.0 - metallic)
}

/// Samples a GGX half-vector around `n` for the given `roughness`.
fn sample_ggx_half_vector(roughness: f32, n: Vec3, u1: f32, u2: f32) -> Vec3 {
    let a = roughness * roughness;
    let phi = 2.0 * PI * u1;
    let denom = (1.0 + (a * a - 1.0) * u2).max(EPSILON);
    let cos_theta = ((1.0 - u2) / denom).max(0.0).sqrt();
    let sin_theta = (1.0 - cos_theta * cos_theta).max(0.0).sqrt();

    let h_local = Vec3::new(phi.cos() * sin_theta, phi.sin() * sin_theta, cos_theta);
    let (t, b) = build_coordinate_system(n);
    (h_local.x * t + h_local.y * b + h_local.z * n).normalize()
}

/// Trowbridge-Reitz (GGX) normal distribution function.
pub fn distribution_ggx(n: Vec3, h: Vec3, roughness: f32) -> f32 {
    let a = roughness * roughness;
    let a2 = a * a;
    let n_dot_h = n.dot(h).max(0.0);
    let n_dot_h2 = n_dot_h * n_dot_h;
    let denom = (n_dot_h2 * (a2 - 1.0) + 1.0).max(EPSILON);
    a2 / (PI * denom * denom)
}

/// Samples a reflected direction from a GGX half-vector sample.
pub fn sample_specular(view_dir: Vec3, n: Vec3, roughness: f32, u1: f32, u2: f32) -> Vec3 {
    let mut h = sample_ggx_half_vector(roughness, n, u1, u2);
    if h.dot(n) < 0.0 {
        h = -h;
    }
    reflect(-view_dir, h)
}

/// PDF of `sample_specular` for the given outgoing direction `l`.
pub fn pdf_specular(view_dir: Vec3, n: Vec3, roughness: f32, l: Vec3) -> f32 {
    let h = (view_dir + l).normalize();
    let n_dot_h = n.dot(h).max(EPSILON);
    let v_dot_h = view_dir.dot(h).max(EPSILON);
    let d = distribution_ggx(n, h, roughness);
    ((d * n_dot_h) / (4.0 * v_dot_h)).max(EPSILON)
}

/// Schlick's approximation to the Fresnel term.
pub fn fresnel_schlick(cos_theta: f32, f0: Vec3) -> Vec3 {
    let cos_theta = clamp(cos_theta, 0.0, 1.0);
    f0 + (Vec3::ONE - f0) * (1.0 - cos_theta).powf(5.0)
}

fn geometry_schlick_ggx(n_dot_v: f32, roughness: f32) -> f32 {
    let n_dot_v = n_dot_v.max(EPSILON);
    let k = (roughness * roughness) / 2.0;
    n_dot_v / (n_dot_v * (1.0 - k) + k)
}

/// Smith geometry term, the product of the Schlick-GGX terms for view and
/// light directions.
pub fn geometry_smith(n: Vec3, v: Vec3, l: Vec3, roughness: f32) -> f32 {
    let n_dot_v = n.dot(v).max(0.0);
    let n_dot_l = n.dot(l).max(0.0);
    geometry_schlick_ggx(n_dot_v, roughness) * geometry_schlick_ggx(n_dot_l, roughness)
}

/// Evaluates the full Cook-Torrance specular BRDF (Fresnel x Distribution x
/// Geometry), normalized by `4 * NoV * NoL`.
pub fn evaluate_specular_brdf(
    view_dir: Vec3,
    n: Vec3,
    albedo: Vec3,
    metallic: f32,
    roughness: f32,
    l: Vec3,
) -> Vec3 {
    let h = (view_dir + l).normalize();
    let n_dot_v = n.dot(view_dir).max(0.0);
    let n_dot_l = n.dot(l).max(0.0);
    let d = distribution_ggx(n, h, roughness);
    let g = geometry_smith(n, view_dir, l, roughness);
    let f0 = Vec3::splat(0.04).lerp(albedo, metallic);
    let f = fresnel_schlick(view_dir.dot(h).max(0.0), f0);
    (f * d * g) / (4.0 * n_dot_v * n_dot_l).max(EPSILON)
}

/// Reflects `i` about `n` (matches GLSL's `reflect`, not the physics
/// convention: `i` points toward the surface).
pub fn reflect(i: Vec3, n: Vec3) -> Vec3 {
    i - 2.0 * i.dot(n) * n
}

/// Refracts `i` through a surface with normal `n` and relative IOR `eta`
/// (`etaI / etaT`). Returns `Vec3::ZERO` on total internal reflection,
/// matching GLSL's `refract`.
pub fn refract(i: Vec3, n: Vec3, eta: f32) -> Vec3 {
    let n_dot_i = n.dot(i);
    let k = 1.0 - eta * eta * (1.0 - n_dot_i * n_dot_i);
    if k < 0.0 {
        Vec3::ZERO
    } else {
        eta * i - (eta * n_dot_i + k.sqrt()) * n
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn mc_integrate<F: Fn(Vec3) -> f32>(n: Vec3, samples: &[(f32, f32)], pdf: F, sample: impl Fn(f32, f32) -> Vec3) -> f32 {
        let mut sum = 0.0;
        for &(u1, u2) in samples {
            let l = sample(u1, u2);
            let p = pdf(l);
            if p > 0.0 {
                sum += 1.0; // importance sampling: each sample contributes pdf/pdf = 1
            }
        }
        sum / samples.len() as f32
    }

    #[test]
    fn diffuse_pdf_integrates_near_one() {
        let n = Vec3::Z;
        let samples: Vec<(f32, f32)> = (0..4096)
            .map(|i| {
                let u1 = ((i * 2654435761u32) % 10000) as f32 / 10000.0;
                let u2 = ((i * 40503u32 + 7) % 10000) as f32 / 10000.0;
                (u1, u2)
            })
            .collect();
        let estimate = mc_integrate(n, &samples, |l| pdf_diffuse(n, l), |u1, u2| sample_diffuse(n, u1, u2));
        assert!((estimate - 1.0).abs() < 0.05);
    }

    #[test]
    fn refract_falls_back_to_zero_on_tir() {
        let i = Vec3::new(1.0, 0.0, 0.0).normalize();
        let n = Vec3::Z;
        let r = refract(i, n, 1.5);
        assert_eq!(r, Vec3::ZERO);
    }

    #[test]
    fn reflect_preserves_length() {
        let i = Vec3::new(0.3, -0.7, 0.5).normalize();
        let n = Vec3::Z;
        let r = reflect(i, n);
        assert!((r.length() - 1.0).abs() < 1e-5);
    }

    #[test]
    fn fresnel_at_normal_incidence_returns_f0() {
        let f0 = Vec3::splat(0.04);
        let f = fresnel_schlick(1.0, f0);
        assert!((f - f0).length() < 1e-5);
    }
}
