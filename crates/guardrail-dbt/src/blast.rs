//! Blast radius: models transitively downstream of a set of changed models

use std::collections::{HashMap, HashSet, VecDeque};
use crate::manifest::is_model_id;

/// Default traversal depth bound
pub const DEFAULT_MAX_DEPTH: usize = 10;

/// Breadth-first search over model-to-model child edges
///
/// Returns the sorted, deduplicated ids of models reachable from `seeds`,
/// excluding the seeds. Non-model children (tests, exposures, ...) are
/// never enqueued. A model at exactly `max_depth` is included but not
/// expanded; `max_depth == 0` yields nothing.
pub fn compute_blast_radius<S: AsRef<str>>(
    child_map: &HashMap<String, Vec<String>>,
    seeds: &[S],
    max_depth: usize,
) -> Vec<String> {
    let mut visited: HashSet<&str> = seeds.iter().map(|s| s.as_ref()).collect();
    let mut queue: VecDeque<(&str, usize)> = VecDeque::new();
    let mut downstream = Vec::new();

    if max_depth == 0 {
        return downstream;
    }

    for seed in seeds {
        enqueue_children(child_map, seed.as_ref(), 1, &mut visited, &mut queue);
    }

    while let Some((node_id, depth)) = queue.pop_front() {
        downstream.push(node_id.to_string());

        if depth >= max_depth {
            continue;
        }

        enqueue_children(child_map, node_id, depth + 1, &mut visited, &mut queue);
    }

    downstream.sort();
    downstream
}

fn enqueue_children<'a>(
    child_map: &'a HashMap<String, Vec<String>>,
    node_id: &str,
    depth: usize,
    visited: &mut HashSet<&'a str>,
    queue: &mut VecDeque<(&'a str, usize)>,
) {
    let Some(children) = child_map.get(node_id) else {
        return;
    };

    for child in children {
        if is_model_id(child) && visited.insert(child.as_str()) {
            queue.push_back((child.as_str(), depth));
        }
    }
}
