// The logical root consumed by the render core (C4's registry half, plus
// C10's dirty-flag controller). Owns instances, mesh assets and textures;
// raises dirty bits at its own mutation methods only — `Instance` never
// reaches back into `Scene`, unlike the `SceneObject -> Renderer`
// back-reference the distilled reference carries.

use crate::error::RenderError;
use crate::graphics::camera::CameraData;
use crate::graphics::instance::Instance;
use crate::graphics::mesh::MeshAsset;
use crate::graphics::ray::Hit;
use crate::graphics::texture::Texture;
use crate::graphics::tlas::{self, TlasNode};
use crate::math::EPSILON;
use glam::{Affine3A, Vec2, Vec3};
use std::collections::HashMap;
use tracing::{debug, warn};

/// The four independent dirty categories (C10). `CLEAN -> DIRTY(subset) ->
/// (frame absorbs) -> CLEAN`; no other states.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct DirtyFlags {
    pub tlas: bool,
    pub meshes: bool,
    pub textures: bool,
    pub accumulation: bool,
}

impl DirtyFlags {
    fn all_dirty() -> DirtyFlags {
        DirtyFlags {
            tlas: true,
            meshes: true,
            textures: true,
            accumulation: true,
        }
    }
}

pub struct Scene {
    instances: Vec<Instance>,
    meshes: HashMap<u64, MeshAsset>,
    textures: Vec<Texture>,
    environment: Option<u32>,
    camera: CameraData,
    tlas_nodes: Vec<TlasNode>,
    dirty: DirtyFlags,
}

impl Scene {
    pub fn new(camera: CameraData) -> Scene {
        Scene {
            instances: Vec::new(),
            meshes: HashMap::new(),
            textures: Vec::new(),
            environment: None,
            camera,
            tlas_nodes: Vec::new(),
            // A freshly constructed scene has nothing built yet; the first
            // frame must absorb all four categories.
            dirty: DirtyFlags::all_dirty(),
        }
    }

    pub fn camera(&self) -> CameraData {
        self.camera
    }

    pub fn set_camera(&mut self, camera: CameraData) {
        self.camera = camera;
        self.dirty.accumulation = true;
    }

    /// Registers (or replaces) a mesh asset. Geometry edits always imply a
    /// TLAS refresh, since instance bounds derive from mesh bounds.
    pub fn register_mesh(&mut self, mesh: MeshAsset) {
        self.meshes.insert(mesh.id, mesh);
        self.dirty.meshes = true;
        self.dirty.tlas = true;
        self.dirty.accumulation = true;
    }

    pub fn mesh(&self, mesh_id: u64) -> Option<&MeshAsset> {
        self.meshes.get(&mesh_id)
    }

    /// Adds an instance of a registered mesh. Fails with `InvalidInstance`
    /// if `mesh_id` was never registered — the caller is expected to log and
    /// skip, per spec.md §7.
    pub fn add_instance(&mut self, transform: Affine3A, mesh_id: u64) -> Result<usize, RenderError> {
        if !self.meshes.contains_key(&mesh_id) {
            return Err(RenderError::InvalidInstance { mesh_id });
        }
        self.instances.push(Instance::new(transform, mesh_id));
        self.dirty.tlas = true;
        self.dirty.accumulation = true;
        Ok(self.instances.len() - 1)
    }

    pub fn remove_instance(&mut self, index: usize) {
        self.instances.remove(index);
        self.dirty.tlas = true;
        self.dirty.accumulation = true;
    }

    pub fn set_instance_transform(&mut self, index: usize, transform: Affine3A) {
        self.instances[index].set_transform(transform);
        self.dirty.tlas = true;
        self.dirty.accumulation = true;
    }

    pub fn instance(&self, index: usize) -> &Instance {
        &self.instances[index]
    }

    pub fn instance_count(&self) -> usize {
        self.instances.len()
    }

    /// Appends a texture, returning its index for use in a material's
    /// texture slots or as the environment index.
    pub fn add_texture(&mut self, texture: Texture) -> u32 {
        self.textures.push(texture);
        self.dirty.textures = true;
        self.dirty.accumulation = true;
        (self.textures.len() - 1) as u32
    }

    pub fn replace_texture(&mut self, index: u32, texture: Texture) {
        self.textures[index as usize] = texture;
        self.dirty.textures = true;
        self.dirty.accumulation = true;
    }

    /// Sets the environment texture. An out-of-range index is a
    /// `TextureOutOfRange` recovery: logged and treated as "no HDRI".
    pub fn set_environment(&mut self, index: Option<u32>) {
        self.environment = index.filter(|&i| (i as usize) < self.textures.len());
        if let Some(i) = index {
            if self.environment.is_none() {
                warn!(texture_index = i, "environment texture index out of range, falling back to neutral white");
            }
        }
        self.dirty.accumulation = true;
    }

    pub fn environment_texture(&self) -> Option<&Texture> {
        self.environment.map(|i| &self.textures[i as usize])
    }

    /// Samples a material's texture slot, or returns `None` ("use the
    /// constant factor instead") for an unused or out-of-range slot.
    pub fn sample_texture(&self, slot: Option<u32>, uv: Vec2) -> Option<Vec3> {
        let index = slot?;
        match self.textures.get(index as usize) {
            Some(tex) => Some(tex.sample(uv)),
            None => {
                warn!(texture_index = index, "texture index out of range, using material base value");
                None
            }
        }
    }

    /// Rebuilds the TLAS from current instance/mesh state, and clears every
    /// dirty bit except `accumulation`, which the *caller* (the accumulator)
    /// consults before this call returns, since it governs the accumulator
    /// reset rather than any rebuild.
    ///
    /// Returns the dirty state as it stood *before* absorption, so the
    /// accumulator can tell whether this frame must write instead of blend.
    pub fn absorb_dirty(&mut self) -> DirtyFlags {
        let snapshot = self.dirty;

        if snapshot.tlas || snapshot.meshes {
            self.rebuild_tlas();
            debug!(
                instances = self.instances.len(),
                tlas = snapshot.tlas,
                meshes = snapshot.meshes,
                textures = snapshot.textures,
                "absorbed dirty state"
            );
        }

        self.dirty = DirtyFlags::default();
        snapshot
    }

    fn rebuild_tlas(&mut self) {
        let bounds: Vec<_> = self
            .instances
            .iter()
            .map(|inst| {
                self.meshes
                    .get(&inst.mesh_id)
                    .map(|m| m.bounds.transformed_by(inst.transform))
                    .unwrap_or(crate::graphics::aabb::AABB::EMPTY)
            })
            .collect();
        self.tlas_nodes = tlas::build_tlas(&bounds);
    }

    /// Traces a world-space ray against every instance via the TLAS,
    /// implementing the per-instance object-space transform of spec.md
    /// §4.4: transform into object space (without renormalizing direction),
    /// rescale `tMax` by `1/|d'|` to query the mesh BVH in object-space
    /// units, then convert a local hit distance back to world space by
    /// multiplying by `|d'|`.
    pub fn trace(&self, origin: Vec3, dir: Vec3, t_min: f32, t_max: f32) -> Option<Hit> {
        let mut best: Option<Hit> = None;

        tlas::traverse_tlas(&self.tlas_nodes, origin, dir.recip(), t_min, t_max, |instance_index, closest_t| {
            let instance = &self.instances[instance_index as usize];
            let mesh = match self.meshes.get(&instance.mesh_id) {
                Some(m) => m,
                None => return closest_t,
            };

            let local_origin = instance.inverse_transform.transform_point3(origin);
            let local_dir = instance.inverse_transform.transform_vector3(dir);
            let local_dir_length = local_dir.length();
            if local_dir_length < EPSILON {
                return closest_t;
            }
            let local_t_max = closest_t / local_dir_length;
            let local_inv_dir = local_dir.recip();

            match mesh.trace(local_origin, local_dir, local_inv_dir, t_min, local_t_max) {
                Some(local_hit) => {
                    let world_t = local_hit.t * local_dir_length;
                    if world_t < closest_t {
                        best = Some(Hit {
                            t: world_t,
                            instance_index,
                            face_index: local_hit.face_index,
                            u: local_hit.u,
                            v: local_hit.v,
                        });
                        world_t
                    } else {
                        closest_t
                    }
                }
                None => closest_t,
            }
        });

        best
    }
}
