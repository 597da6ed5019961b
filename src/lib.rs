//! A physically based, progressive CPU path tracer core: per-mesh SAH BVHs
//! under a TLAS, a metallic-roughness + dielectric BRDF with multiple
//! importance sampling, a thin-lens camera, a dirty-flag-gated progressive
//! accumulator, and a bucketed multi-threaded scheduler.
//!
//! This crate is a library consumed by a host application (windowing,
//! asset loading, display, scene editing all live outside it); `main.rs`
//! is a minimal in-process demo driver, not that host.

pub mod config;
pub mod dispatch;
pub mod error;
pub mod framebuffer;
pub mod graphics;
pub mod math;

pub use config::RenderConfig;
pub use dispatch::{render_frame, RenderStats};
pub use error::RenderError;
pub use framebuffer::Framebuffer;
pub use graphics::{CameraData, DirtyFlags, Instance, Material, MeshAsset, Scene, Texture};
