//! Unit-weight shortest paths over a CFG
//!
//! Every edge costs one hop, so breadth-first search is exact. Parallel
//! edges change nothing. Unreachable vertices are `None`.

use crate::cfg::Cfg;
use petgraph::graph::NodeIndex;
use petgraph::visit::EdgeRef;
use petgraph::Direction;
use std::collections::VecDeque;

/// Hop counts from `source` to every vertex, following edges in `direction`
///
/// With `Direction::Incoming` the result is the distance from every vertex
/// *to* `source`.
pub fn bfs_distances(cfg: &Cfg, source: NodeIndex, direction: Direction) -> Vec<Option<u32>> {
    let mut dist: Vec<Option<u32>> = vec![None; cfg.node_count()];
    if source.index() >= dist.len() {
        return dist;
    }

    dist[source.index()] = Some(0);
    let mut queue = VecDeque::from([source]);
    while let Some(current) = queue.pop_front() {
        let next = dist[current.index()].map_or(0, |d| d + 1);
        for edge in cfg.edges_directed(current, direction) {
            let neighbour = match direction {
                Direction::Outgoing => edge.target(),
                Direction::Incoming => edge.source(),
            };
            if dist[neighbour.index()].is_none() {
                dist[neighbour.index()] = Some(next);
                queue.push_back(neighbour);
            }
        }
    }
    dist
}

/// Length of the shortest path from `from` to `to`
pub fn shortest_distance(cfg: &Cfg, from: NodeIndex, to: NodeIndex) -> Option<u32> {
    if from.index() >= cfg.node_count() || to.index() >= cfg.node_count() {
        return None;
    }
    if from == to {
        return Some(0);
    }

    let mut seen = vec![false; cfg.node_count()];
    seen[from.index()] = true;
    let mut queue = VecDeque::from([(from, 0u32)]);
    while let Some((current, d)) = queue.pop_front() {
        for neighbour in cfg.neighbors_directed(current, Direction::Outgoing) {
            if neighbour == to {
                return Some(d + 1);
            }
            if !seen[neighbour.index()] {
                seen[neighbour.index()] = true;
                queue.push_back((neighbour, d + 1));
            }
        }
    }
    None
}

/// Longest finite shortest-path distance between any two vertices
///
/// All-pairs by repeated BFS. Pairs without a path are ignored, so a
/// disconnected graph never reports an infinite diameter. An empty or
/// single-vertex graph has diameter 0.
pub fn diameter(cfg: &Cfg) -> u32 {
    cfg.node_indices()
        .filter_map(|source| {
            bfs_distances(cfg, source, Direction::Outgoing)
                .into_iter()
                .flatten()
                .max()
        })
        .max()
        .unwrap_or(0)
}
