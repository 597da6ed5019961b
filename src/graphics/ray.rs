// The hit record produced by tracing a ray through the TLAS (C3/C4).

/// The closest-hit record produced by tracing a ray through the TLAS.
/// `u`/`v` are the Möller-Trumbore barycentric coordinates of the second and
/// third triangle vertex; the first vertex's weight is `1.0 - u - v`.
#[derive(Clone, Copy, Debug)]
pub struct Hit {
    pub t: f32,
    pub instance_index: u32,
    pub face_index: u32,
    pub u: f32,
    pub v: f32,
}

impl Hit {
    pub fn barycentrics(&self) -> (f32, f32, f32) {
        (1.0 - self.u - self.v, self.u, self.v)
    }
}
