// Top-level acceleration structure over scene instances (C4). Structurally
// the same iterative SAH build as the per-mesh BVH, specialized to a leaf
// size of one instance: TLAS leaves are rarely worth batching, since the
// real cost lives one level down in each instance's own mesh BVH.

use crate::graphics::aabb::AABB;
use tracing::debug;

#[derive(Clone, Copy, Debug)]
pub struct TlasNode {
    pub bounds: AABB,
    /// `-1` for a leaf.
    pub left_child: i32,
    pub right_child: i32,
    pub instance_index: i32,
}

impl TlasNode {
    pub fn is_leaf(&self) -> bool {
        self.instance_index >= 0
    }
}

struct Primitive {
    instance_index: u32,
    bounds: AABB,
}

struct BuildTask {
    node_index: usize,
    start: usize,
    end: usize,
}

/// Builds a TLAS over the given world-space instance bounds. `bounds[i]`
/// corresponds to instance index `i`.
pub fn build_tlas(bounds: &[AABB]) -> Vec<TlasNode> {
    if bounds.is_empty() {
        return Vec::new();
    }

    let mut prims: Vec<Primitive> = bounds
        .iter()
        .enumerate()
        .map(|(i, &b)| Primitive {
            instance_index: i as u32,
            bounds: b,
        })
        .collect();

    let placeholder = TlasNode {
        bounds: AABB::EMPTY,
        left_child: -1,
        right_child: -1,
        instance_index: -1,
    };
    let mut nodes = vec![placeholder];
    let mut stack = vec![BuildTask {
        node_index: 0,
        start: 0,
        end: prims.len(),
    }];

    while let Some(task) = stack.pop() {
        let node_bounds = prims[task.start..task.end]
            .iter()
            .fold(AABB::EMPTY, |acc, p| acc.join(&p.bounds));
        let count = task.end - task.start;

        if count == 1 {
            nodes[task.node_index] = TlasNode {
                bounds: node_bounds,
                left_child: -1,
                right_child: -1,
                instance_index: prims[task.start].instance_index as i32,
            };
            continue;
        }

        let axis = widest_axis(node_bounds);
        prims[task.start..task.end].sort_by(|a, b| {
            axis_component(a.bounds.center(), axis)
                .partial_cmp(&axis_component(b.bounds.center(), axis))
                .unwrap_or(std::cmp::Ordering::Equal)
        });
        let mid = task.start + count / 2;

        let left_index = nodes.len();
        nodes.push(placeholder);
        let right_index = nodes.len();
        nodes.push(placeholder);

        nodes[task.node_index] = TlasNode {
            bounds: node_bounds,
            left_child: left_index as i32,
            right_child: right_index as i32,
            instance_index: -1,
        };

        stack.push(BuildTask {
            node_index: right_index,
            start: mid,
            end: task.end,
        });
        stack.push(BuildTask {
            node_index: left_index,
            start: task.start,
            end: mid,
        });
    }

    debug!(instances = bounds.len(), nodes = nodes.len(), "built TLAS");

    nodes
}

fn widest_axis(bounds: AABB) -> usize {
    let e = bounds.max - bounds.min;
    if e.x > e.y && e.x > e.z {
        0
    } else if e.y > e.z {
        1
    } else {
        2
    }
}

fn axis_component(v: glam::Vec3, axis: usize) -> f32 {
    match axis {
        0 => v.x,
        1 => v.y,
        _ => v.z,
    }
}

/// Walks the TLAS against a world-space ray, calling `visit_instance` for
/// every leaf whose bounds the ray enters, in near-to-far order. `visit_instance`
/// returns the updated closest-hit distance so far, used to prune siblings.
pub fn traverse_tlas(
    nodes: &[TlasNode],
    origin: glam::Vec3,
    inv_dir: glam::Vec3,
    t_min: f32,
    t_max: f32,
    mut visit_instance: impl FnMut(u32, f32) -> f32,
) {
    if nodes.is_empty() {
        return;
    }

    let mut closest_t = t_max;
    let mut stack: Vec<usize> = Vec::with_capacity(64);
    stack.push(0);

    while let Some(node_index) = stack.pop() {
        let node = &nodes[node_index];
        let hit = match node.bounds.intersect(origin, inv_dir) {
            Some(h) => h,
            None => continue,
        };
        if hit.1 < t_min || hit.0 > closest_t {
            continue;
        }

        if node.is_leaf() {
            closest_t = visit_instance(node.instance_index as u32, closest_t);
        } else {
            let left = &nodes[node.left_child as usize];
            let right = &nodes[node.right_child as usize];
            let left_t = left.bounds.intersect(origin, inv_dir).map(|(n, _)| n);
            let right_t = right.bounds.intersect(origin, inv_dir).map(|(n, _)| n);

            match (left_t, right_t) {
                (Some(lt), Some(rt)) => {
                    if lt <= rt {
                        stack.push(node.right_child as usize);
                        stack.push(node.left_child as usize);
                    } else {
                        stack.push(node.left_child as usize);
                        stack.push(node.right_child as usize);
                    }
                }
                (Some(_), None) => stack.push(node.left_child as usize),
                (None, Some(_)) => stack.push(node.right_child as usize),
                (None, None) => {}
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use glam::Vec3;

    #[test]
    fn empty_tlas_visits_nothing() {
        let nodes = build_tlas(&[]);
        let mut visited = 0;
        traverse_tlas(&nodes, Vec3::ZERO, Vec3::ONE, 0.0, f32::INFINITY, |_, t| {
            visited += 1;
            t
        });
        assert_eq!(visited, 0);
    }

    #[test]
    fn visits_every_instance_whose_box_the_ray_crosses() {
        let bounds = vec![
            AABB::new(Vec3::new(-1.0, -1.0, 0.0), Vec3::new(1.0, 1.0, 1.0)),
            AABB::new(Vec3::new(-1.0, -1.0, 5.0), Vec3::new(1.0, 1.0, 6.0)),
            AABB::new(Vec3::new(10.0, 10.0, 10.0), Vec3::new(11.0, 11.0, 11.0)),
        ];
        let nodes = build_tlas(&bounds);

        let origin = Vec3::new(0.0, 0.0, -5.0);
        let dir = Vec3::Z;
        let mut visited = Vec::new();
        traverse_tlas(
            &nodes,
            origin,
            dir.recip(),
            0.0,
            f32::INFINITY,
            |instance, t| {
                visited.push(instance);
                t
            },
        );
        visited.sort();
        assert_eq!(visited, vec![0, 1]);
    }
}
