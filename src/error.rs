// Structured error type for the crate's fallible setup paths.
//
// Most of the recoverable conditions this crate names (empty mesh, missing
// texture, degenerate triangle, non-finite path vertex) are not modeled as
// `Result` at all — they are silent, local recoveries inside the hot path,
// narrated only through `tracing` events (see `RenderStats`). Only the two
// conditions a host genuinely cannot proceed past without deciding something
// become real errors.

use thiserror::Error;

#[derive(Error, Debug)]
pub enum RenderError {
    /// A mesh's BVH could not be built (e.g. a face indexes past the end of
    /// the vertex buffer). Fatal to that single `MeshAsset::build` call.
    #[error("failed to build BVH for mesh {mesh_id}: {reason}")]
    BuildFailure { mesh_id: u64, reason: String },

    /// A scene mutation referenced a mesh id that was never registered.
    /// Non-fatal to the scene as a whole: the host is expected to log and
    /// skip the offending instance.
    #[error("instance referenced unknown mesh id {mesh_id}")]
    InvalidInstance { mesh_id: u64 },
}
