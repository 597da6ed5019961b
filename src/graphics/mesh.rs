// An immutable, BVH-owning mesh asset (C2's build target). Once built, a
// `MeshAsset` is never mutated in place — scene edits replace the whole
// asset, matching the rebuild-only (no BVH refitting) contract.

use crate::error::RenderError;
use crate::graphics::aabb::AABB;
use crate::graphics::bvh::{self, BVHNode, BvhParams, LocalHit};
use crate::graphics::material::Material;
use glam::{Vec2, Vec3};
use tracing::warn;

#[derive(Clone, Copy, Debug)]
pub struct Vertex {
    pub position: Vec3,
    pub normal: Vec3,
    pub tangent: Vec3,
    pub uv: Vec2,
}

#[derive(Clone, Copy, Debug)]
pub struct Face {
    pub indices: [u32; 3],
    pub material_index: u32,
}

#[derive(Debug)]
pub struct MeshAsset {
    pub id: u64,
    pub vertices: Vec<Vertex>,
    pub faces: Vec<Face>,
    pub materials: Vec<Material>,
    pub bvh: Vec<BVHNode>,
    pub bounds: AABB,
}

impl MeshAsset {
    /// Builds a mesh's BVH from its buffers, using the builder tunables in
    /// `params` (spec.md §6: `bvh_max_depth`/`bvh_leaf_max`/SAH costs).
    /// Fails only when a face indexes past the end of the vertex or
    /// material buffer — every other degenerate condition (zero faces,
    /// zero-area triangles) degrades silently instead of erroring.
    pub fn build(
        id: u64,
        vertices: Vec<Vertex>,
        faces: Vec<Face>,
        materials: Vec<Material>,
        params: BvhParams,
    ) -> Result<MeshAsset, RenderError> {
        for face in &faces {
            for &index in &face.indices {
                if index as usize >= vertices.len() {
                    return Err(RenderError::BuildFailure {
                        mesh_id: id,
                        reason: format!(
                            "face references vertex {index}, but mesh has {} vertices",
                            vertices.len()
                        ),
                    });
                }
            }
            if face.material_index as usize >= materials.len() && !materials.is_empty() {
                return Err(RenderError::BuildFailure {
                    mesh_id: id,
                    reason: format!(
                        "face references material {}, but mesh has {} materials",
                        face.material_index,
                        materials.len()
                    ),
                });
            }
        }

        if faces.is_empty() {
            warn!(mesh_id = id, "registering mesh with zero faces");
        }

        let bvh = bvh::build_bvh(&faces, &vertices, params);
        let bounds = bvh.first().map_or(AABB::EMPTY, |root| root.bounds);

        Ok(MeshAsset {
            id,
            vertices,
            faces,
            materials,
            bvh,
            bounds,
        })
    }

    pub fn material_for(&self, face_index: u32) -> Material {
        let face = &self.faces[face_index as usize];
        self.materials
            .get(face.material_index as usize)
            .copied()
            .unwrap_or_default()
    }

    /// Interpolates the vertex normal across a triangle's barycentric
    /// coordinates and normalizes the result.
    pub fn shading_normal(&self, face_index: u32, u: f32, v: f32) -> Vec3 {
        let face = &self.faces[face_index as usize];
        let n0 = self.vertices[face.indices[0] as usize].normal;
        let n1 = self.vertices[face.indices[1] as usize].normal;
        let n2 = self.vertices[face.indices[2] as usize].normal;
        let w = 1.0 - u - v;
        (w * n0 + u * n1 + v * n2).normalize()
    }

    pub fn uv(&self, face_index: u32, u: f32, v: f32) -> Vec2 {
        let face = &self.faces[face_index as usize];
        let uv0 = self.vertices[face.indices[0] as usize].uv;
        let uv1 = self.vertices[face.indices[1] as usize].uv;
        let uv2 = self.vertices[face.indices[2] as usize].uv;
        let w = 1.0 - u - v;
        w * uv0 + u * uv1 + v * uv2
    }

    pub fn position(&self, face_index: u32, u: f32, v: f32) -> Vec3 {
        let face = &self.faces[face_index as usize];
        let p0 = self.vertices[face.indices[0] as usize].position;
        let p1 = self.vertices[face.indices[1] as usize].position;
        let p2 = self.vertices[face.indices[2] as usize].position;
        let w = 1.0 - u - v;
        w * p0 + u * p1 + v * p2
    }

    pub fn trace(
        &self,
        origin: Vec3,
        dir: Vec3,
        inv_dir: Vec3,
        t_min: f32,
        t_max: f32,
    ) -> Option<LocalHit> {
        bvh::intersect_bvh(
            &self.bvh,
            &self.faces,
            &self.vertices,
            origin,
            dir,
            inv_dir,
            t_min,
            t_max,
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn triangle() -> (Vec<Vertex>, Vec<Face>, Vec<Material>) {
        let vertices = vec![
            Vertex {
                position: Vec3::new(0.0, 0.0, 0.0),
                normal: Vec3::Z,
                tangent: Vec3::X,
                uv: Vec2::ZERO,
            },
            Vertex {
                position: Vec3::new(1.0, 0.0, 0.0),
                normal: Vec3::Z,
                tangent: Vec3::X,
                uv: Vec2::new(1.0, 0.0),
            },
            Vertex {
                position: Vec3::new(0.0, 1.0, 0.0),
                normal: Vec3::Z,
                tangent: Vec3::X,
                uv: Vec2::new(0.0, 1.0),
            },
        ];
        let faces = vec![Face {
            indices: [0, 1, 2],
            material_index: 0,
        }];
        (vertices, faces, vec![Material::default()])
    }

    #[test]
    fn empty_mesh_builds_without_error() {
        let mesh = MeshAsset::build(0, vec![], vec![], vec![], BvhParams::default()).unwrap();
        assert!(mesh.bvh.is_empty());
    }

    #[test]
    fn out_of_range_vertex_index_is_a_build_failure() {
        let faces = vec![Face {
            indices: [0, 1, 2],
            material_index: 0,
        }];
        let err = MeshAsset::build(1, vec![], faces, vec![], BvhParams::default()).unwrap_err();
        assert!(matches!(err, RenderError::BuildFailure { mesh_id: 1, .. }));
    }

    #[test]
    fn shading_normal_interpolates_across_the_face() {
        let (vertices, faces, materials) = triangle();
        let mesh = MeshAsset::build(2, vertices, faces, materials, BvhParams::default()).unwrap();
        let n = mesh.shading_normal(0, 1.0 / 3.0, 1.0 / 3.0);
        assert!((n - Vec3::Z).length() < 1e-5);
    }
}
