// A single placement of a mesh asset in the scene (C4's TLAS entries). Plain
// data, deliberately: no back-reference to the owning `Scene`. Raising the
// `tlas`/`accumulation` dirty bits on a transform edit is the `Scene`'s job,
// done at the mutation method, never from inside `Instance` itself — see
// the one-way-ownership design note.

use glam::Affine3A;

#[derive(Clone, Copy, Debug)]
pub struct Instance {
    pub transform: Affine3A,
    pub inverse_transform: Affine3A,
    pub mesh_id: u64,
}

impl Instance {
    /// Builds an instance, deriving the inverse transform once up front so
    /// the hot path never inverts a matrix per ray.
    pub fn new(transform: Affine3A, mesh_id: u64) -> Instance {
        Instance {
            transform,
            inverse_transform: transform.inverse(),
            mesh_id,
        }
    }

    /// Replaces this instance's transform, re-deriving the inverse. Callers
    /// (i.e. `Scene::set_instance_transform`) are responsible for raising
    /// dirty bits; this method only recomputes the cached inverse.
    pub fn set_transform(&mut self, transform: Affine3A) {
        self.transform = transform;
        self.inverse_transform = transform.inverse();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use glam::Vec3;

    #[test]
    fn inverse_transform_undoes_the_transform() {
        let t = Affine3A::from_translation(Vec3::new(2.0, 0.0, 0.0));
        let inst = Instance::new(t, 7);
        let p = Vec3::new(1.0, 1.0, 1.0);
        let round_tripped = inst.inverse_transform.transform_point3(inst.transform.transform_point3(p));
        assert!((round_tripped - p).length() < 1e-5);
    }
}
