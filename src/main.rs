//! A minimal native debug driver, analogous to the teacher's own
//! `main.rs` benchmark binary: it is not the host application (no
//! windowing, no asset loading) — just a hand-built scene run through a
//! handful of progressive frames with timing and stats printed to stdout.

use glam::{Affine3A, Vec2, Vec3};
use pathtracer_core::graphics::{Face, Material, MeshAsset, Vertex};
use pathtracer_core::{render_frame, CameraData, Framebuffer, RenderConfig, Scene};
use std::time::Instant;
use tracing_subscriber::EnvFilter;

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    let camera = CameraData::look_at(
        Vec3::new(0.0, 1.0, -4.0),
        Vec3::new(0.0, 0.0, 0.0),
        Vec3::Y,
        0.036,
        0.024,
        35.0,
        0.0,
        4.0,
        0.0,
    );

    let config = RenderConfig::default();
    let bvh_params = pathtracer_core::graphics::BvhParams::from_config(&config);

    let mut scene = Scene::new(camera);
    scene.register_mesh(floor_mesh(bvh_params));
    scene.register_mesh(quad_light_mesh(bvh_params));

    scene
        .add_instance(Affine3A::IDENTITY, 0)
        .expect("floor mesh was just registered");
    scene
        .add_instance(
            Affine3A::from_scale_rotation_translation(
                Vec3::splat(0.5),
                glam::Quat::from_rotation_x(std::f32::consts::FRAC_PI_2),
                Vec3::new(0.0, 2.0, 0.0),
            ),
            1,
        )
        .expect("light mesh was just registered");

    let width = 256;
    let height = 144;
    let mut framebuffer = Framebuffer::new(width, height);

    let frames = 8;
    println!("### Rendering {frames} progressive frames at {width}x{height} ###");

    let total_start = Instant::now();
    for frame in 0..frames {
        let pre_absorption = scene.absorb_dirty();
        let frame_start = Instant::now();
        let stats = render_frame(&scene, &camera, &config, &mut framebuffer, frame, pre_absorption.accumulation);
        println!(
            "frame {frame}: {} buckets, {} pixels, {} workers, {}ms",
            stats.buckets_dispatched,
            stats.pixels_shaded,
            stats.worker_count,
            frame_start.elapsed().as_millis()
        );
    }
    println!("Total: {}ms", total_start.elapsed().as_millis());

    let center = framebuffer.color(width / 2, height / 2);
    println!("Center pixel color: {center:?}");
}

/// A large grey quad standing in for a ground plane.
fn floor_mesh(bvh_params: pathtracer_core::graphics::BvhParams) -> MeshAsset {
    let vertices = vec![
        Vertex { position: Vec3::new(-10.0, -1.0, -10.0), normal: Vec3::Y, tangent: Vec3::X, uv: Vec2::ZERO },
        Vertex { position: Vec3::new(10.0, -1.0, -10.0), normal: Vec3::Y, tangent: Vec3::X, uv: Vec2::new(1.0, 0.0) },
        Vertex { position: Vec3::new(10.0, -1.0, 10.0), normal: Vec3::Y, tangent: Vec3::X, uv: Vec2::ONE },
        Vertex { position: Vec3::new(-10.0, -1.0, 10.0), normal: Vec3::Y, tangent: Vec3::X, uv: Vec2::new(0.0, 1.0) },
    ];
    let faces = vec![
        Face { indices: [0, 1, 2], material_index: 0 },
        Face { indices: [0, 2, 3], material_index: 0 },
    ];
    let material = Material { albedo: Vec3::splat(0.6), metallic: 0.0, roughness: 0.9, ..Material::default() };
    MeshAsset::build(0, vertices, faces, vec![material], bvh_params).expect("floor mesh is well-formed")
}

/// A small emissive quad acting as an area light.
fn quad_light_mesh(bvh_params: pathtracer_core::graphics::BvhParams) -> MeshAsset {
    let vertices = vec![
        Vertex { position: Vec3::new(-1.0, -1.0, 0.0), normal: Vec3::Z, tangent: Vec3::X, uv: Vec2::ZERO },
        Vertex { position: Vec3::new(1.0, -1.0, 0.0), normal: Vec3::Z, tangent: Vec3::X, uv: Vec2::new(1.0, 0.0) },
        Vertex { position: Vec3::new(1.0, 1.0, 0.0), normal: Vec3::Z, tangent: Vec3::X, uv: Vec2::ONE },
        Vertex { position: Vec3::new(-1.0, 1.0, 0.0), normal: Vec3::Z, tangent: Vec3::X, uv: Vec2::new(0.0, 1.0) },
    ];
    let faces = vec![
        Face { indices: [0, 1, 2], material_index: 0 },
        Face { indices: [0, 2, 3], material_index: 0 },
    ];
    let material = Material { emission: Vec3::splat(8.0), albedo: Vec3::ZERO, ..Material::default() };
    MeshAsset::build(1, vertices, faces, vec![material], bvh_params).expect("light mesh is well-formed")
}
