// The state threaded through one path's bounce loop (C6/C7). A plain struct
// updated in an explicit loop, not recursion or a yielding coroutine — see
// the design note on coroutine-like control flow (spec.md §9).

use crate::math::rng::Rng;
use glam::Vec3;

/// Which lobe the most recent bounce sampled. Bounce caps are tracked as a
/// total per kind across the whole path, not "consecutive of the same kind"
/// (spec.md's Open Questions resolution).
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum BounceKind {
    Diffuse,
    Specular,
    Transmission,
}

#[derive(Clone, Debug)]
pub struct Payload {
    /// Radiance contributed at the current vertex (emission, or the
    /// environment color on miss). The raygen loop folds this into the
    /// running path color by `throughput`.
    pub color: Vec3,
    pub throughput: Vec3,
    pub position: Vec3,
    pub normal: Vec3,
    pub next_direction: Vec3,
    pub rng: Rng,
    pub bounce_kind: Option<BounceKind>,
    pub done: bool,
}

impl Payload {
    pub fn new(origin: Vec3, direction: Vec3, rng: Rng) -> Payload {
        Payload {
            color: Vec3::ZERO,
            throughput: Vec3::ONE,
            position: origin,
            normal: Vec3::ZERO,
            next_direction: direction,
            rng,
            bounce_kind: None,
            done: false,
        }
    }
}
