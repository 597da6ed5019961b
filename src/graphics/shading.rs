// The shading core (C6): turns a closest-hit record into an updated
// `Payload` — emission, optional dielectric transmission, or a diffuse/
// specular BRDF bounce with multiple importance sampling. Grounded on
// `CpuRaytracer::closesthit`/`::miss` (original_source/src/Cpu/CpuRaytracer.cpp),
// backed by the BRDF math in `graphics::sampling` (ported from
// `Cpu/ShadersCpu.cpp`).

use crate::graphics::environment;
use crate::graphics::payload::{BounceKind, Payload};
use crate::graphics::ray::Hit;
use crate::graphics::scene::Scene;
use crate::math::sampling;
use crate::math::{clamp, finite_or, EPSILON};
use glam::{Mat3, Vec3};

/// Builds the normal-correction matrix `transpose(inverse(mat3(transform)))`
/// for transforming an object-space normal into world space under a
/// non-uniform scale.
fn normal_matrix(transform: glam::Affine3A) -> Mat3 {
    let m3 = Mat3::from_cols(
        transform.matrix3.x_axis.into(),
        transform.matrix3.y_axis.into(),
        transform.matrix3.z_axis.into(),
    );
    m3.inverse().transpose()
}

/// Advances `payload` across a closest hit: interpolates the surface point,
/// evaluates the material (with optional texture sampling), and either
/// refracts through a dielectric or samples a diffuse/specular BRDF bounce.
pub fn shade_hit(scene: &Scene, hit: &Hit, payload: &mut Payload) {
    let instance = scene.instance(hit.instance_index as usize);
    let mesh = match scene.mesh(instance.mesh_id) {
        Some(mesh) => mesh,
        None => {
            miss(scene, payload);
            return;
        }
    };

    let local_position = mesh.position(hit.face_index, hit.u, hit.v);
    let local_normal = mesh.shading_normal(hit.face_index, hit.u, hit.v);
    let uv = mesh.uv(hit.face_index, hit.u, hit.v);

    let world_position = instance.transform.transform_point3(local_position);
    let mut normal = (normal_matrix(instance.transform) * local_normal).normalize();

    let material = mesh.material_for(hit.face_index);

    let mut albedo = material.albedo;
    if let Some(tex) = scene.sample_texture(material.albedo_texture, uv) {
        albedo *= tex;
    }

    let mut metallic = clamp(material.metallic, 0.05, 0.99);
    if let Some(tex) = scene.sample_texture(material.metallic_texture, uv) {
        metallic = clamp(metallic * tex.x, 0.05, 0.99);
    }

    let mut roughness = clamp(material.roughness, 0.05, 0.99);
    if let Some(tex) = scene.sample_texture(material.roughness_texture, uv) {
        roughness = clamp(roughness * tex.x, 0.05, 0.99);
    }

    let mut specular = material.specular * 2.0;
    if let Some(tex) = scene.sample_texture(material.specular_texture, uv) {
        specular *= tex.x;
    }

    payload.color = material.emission;
    payload.position = world_position;
    payload.normal = normal;

    // Transmission fires stochastically with probability equal to the mean
    // of the transmission tint; see spec.md §4.6 step 4 and the Open
    // Questions note on the albedo/transmission convention this mirrors.
    let transmission_p = material.transmission_probability();
    if transmission_p > 0.0 && payload.rng.next() < transmission_p {
        let i = payload.next_direction.normalize();
        let mut eta_i = 1.0;
        let mut eta_t = material.ior;
        if i.dot(normal) > 0.0 {
            normal = -normal;
            std::mem::swap(&mut eta_i, &mut eta_t);
        }
        let eta = eta_i / eta_t;
        let refracted = sampling::refract(i, normal, eta);
        payload.next_direction = if refracted.length() < EPSILON {
            sampling::reflect(i, normal)
        } else {
            refracted
        };

        payload.color *= albedo;
        payload.throughput = finite_or(payload.throughput * material.transmission, Vec3::ZERO);
        payload.bounce_kind = Some(BounceKind::Transmission);
        return;
    }

    let view_dir = (-payload.next_direction).normalize();
    if normal.dot(view_dir) < 0.0 {
        normal = -normal;
    }
    payload.normal = normal;

    let n_dot_v = normal.dot(view_dir).max(0.0);
    let f0 = Vec3::splat(0.04).lerp(albedo, metallic);
    let fresnel_at_n_dot_v = sampling::fresnel_schlick(n_dot_v, f0).x;

    let diffuse_energy = (1.0 - metallic) * (1.0 - fresnel_at_n_dot_v);
    let specular_energy = fresnel_at_n_dot_v.max(0.04) * (1.0 - roughness * roughness).max(0.05);
    let p_diffuse = diffuse_energy / (diffuse_energy + specular_energy + EPSILON);

    let choose_diffuse = payload.rng.next() < p_diffuse;
    let sampled_dir = if choose_diffuse {
        sampling::sample_diffuse(normal, payload.rng.next(), payload.rng.next())
    } else {
        sampling::sample_specular(view_dir, normal, roughness, payload.rng.next(), payload.rng.next())
    };

    let pdf_diffuse = sampling::pdf_diffuse(normal, sampled_dir).max(EPSILON);
    let pdf_specular = sampling::pdf_specular(view_dir, normal, roughness, sampled_dir).max(EPSILON);

    let diffuse_brdf = sampling::evaluate_diffuse_brdf(albedo, metallic);
    let specular_brdf =
        sampling::evaluate_specular_brdf(view_dir, normal, albedo, metallic, roughness, sampled_dir) * specular;

    let w_diffuse = p_diffuse * pdf_diffuse;
    let w_specular = (1.0 - p_diffuse) * pdf_specular;
    let mis_weight = if choose_diffuse {
        (w_diffuse * w_diffuse) / (w_diffuse * w_diffuse + w_specular * w_specular + EPSILON)
    } else {
        (w_specular * w_specular) / (w_diffuse * w_diffuse + w_specular * w_specular + EPSILON)
    };

    let pdf_combined = p_diffuse * pdf_diffuse + (1.0 - p_diffuse) * pdf_specular;
    let n_o_l = normal.dot(sampled_dir).max(0.0);
    let total_brdf = diffuse_brdf + specular_brdf;

    let bounce_throughput = total_brdf * n_o_l * mis_weight / pdf_combined;
    payload.throughput = finite_or(payload.throughput * bounce_throughput, Vec3::ZERO);
    payload.next_direction = sampled_dir.normalize();
    payload.bounce_kind = Some(if choose_diffuse {
        BounceKind::Diffuse
    } else {
        BounceKind::Specular
    });
}

/// Terminates a path into the background: samples the environment HDRI once
/// with the terminal direction (spec.md §4.12).
pub fn miss(scene: &Scene, payload: &mut Payload) {
    payload.color = environment::sample_environment(scene.environment_texture(), payload.next_direction);
    payload.done = true;
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graphics::material::Material;
    use crate::graphics::mesh::{Face, MeshAsset, Vertex};
    use crate::math::rng::Rng;
    use glam::{Affine3A, Vec2};

    fn furnace_scene() -> Scene {
        let vertices = vec![
            Vertex { position: Vec3::new(-10.0, -10.0, 0.0), normal: Vec3::Z, tangent: Vec3::X, uv: Vec2::ZERO },
            Vertex { position: Vec3::new(10.0, -10.0, 0.0), normal: Vec3::Z, tangent: Vec3::X, uv: Vec2::new(1.0, 0.0) },
            Vertex { position: Vec3::new(0.0, 10.0, 0.0), normal: Vec3::Z, tangent: Vec3::X, uv: Vec2::new(0.5, 1.0) },
        ];
        let faces = vec![Face { indices: [0, 1, 2], material_index: 0 }];
        let material = Material {
            albedo: Vec3::ONE,
            metallic: 0.0,
            roughness: 1.0,
            transmission: Vec3::ZERO,
            ..Material::default()
        };
        let mesh = MeshAsset::build(0, vertices, faces, vec![material], crate::graphics::bvh::BvhParams::default()).unwrap();

        let camera = crate::graphics::camera::CameraData::look_at(
            Vec3::new(0.0, 0.0, -5.0), Vec3::ZERO, Vec3::Y, 0.036, 0.036, 30.0, 0.0, 5.0, 0.0,
        );
        let mut scene = Scene::new(camera);
        scene.register_mesh(mesh);
        scene.add_instance(Affine3A::IDENTITY, 0).unwrap();
        scene.absorb_dirty();
        scene
    }

    #[test]
    fn miss_samples_neutral_white_with_no_environment() {
        let scene = furnace_scene();
        let mut payload = Payload::new(Vec3::ZERO, Vec3::Z, Rng::for_pixel(0, 0, 0));
        miss(&scene, &mut payload);
        assert_eq!(payload.color, Vec3::ONE);
        assert!(payload.done);
    }

    #[test]
    fn diffuse_hit_keeps_throughput_finite_and_bounded() {
        let scene = furnace_scene();
        let hit = scene.trace(Vec3::new(0.0, -1.0, -5.0), Vec3::Z, 0.0, f32::INFINITY).unwrap();
        let mut payload = Payload::new(Vec3::new(0.0, -1.0, -5.0), Vec3::Z, Rng::for_pixel(1, 1, 0));
        shade_hit(&scene, &hit, &mut payload);
        assert!(payload.throughput.is_finite());
        assert!(!payload.done);
        assert!(payload.bounce_kind.is_some());
    }
}
