// Render configuration (spec.md §6). Grounded on the distilled reference's
// push-constant bundling: a plain struct with a `Default` supplying every
// listed knob, assembled in-process by the host — no file/env parsing, no
// wire protocol, matching the "no persisted configuration" clause.

#[derive(Clone, Copy, Debug)]
pub struct RenderConfig {
    pub max_diffuse_bounces: u32,
    pub max_specular_bounces: u32,
    pub max_transmission_bounces: u32,
    pub max_total_bounces: u32,
    pub samples_per_frame: u32,
    pub bucket_size: u32,
    pub bvh_max_depth: u32,
    pub bvh_leaf_max: u32,
    pub sah_traversal_cost: f32,
    pub sah_intersection_cost: f32,
}

impl Default for RenderConfig {
    fn default() -> RenderConfig {
        RenderConfig {
            max_diffuse_bounces: 4,
            max_specular_bounces: 6,
            max_transmission_bounces: 12,
            max_total_bounces: 24,
            samples_per_frame: 1,
            bucket_size: 16,
            bvh_max_depth: 128,
            bvh_leaf_max: 4,
            sah_traversal_cost: 1.0,
            sah_intersection_cost: 1.0,
        }
    }
}
