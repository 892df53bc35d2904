// src/navigation/planner.rs
// A* shortest-path search over the location graph. The heuristic is the
// straight-line distance to the goal in the graph's coordinate mode, which never
// overestimates because edge costs are straight-line distances too.

use log::{debug, warn};
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::collections::BinaryHeap;

use super::route::{Route, Waypoint};
use crate::core::geometry::{CoordinateMode, Coordinates};
use crate::core::graph::{Graph, LocationNode};
use crate::error::{Result, WayfinderError};

/// Route planner tunables
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PlannerConfig {
    /// Maximum node expansions before a search gives up
    #[serde(default = "default_max_expansions")]
    pub max_expansions: usize,
}

fn default_max_expansions() -> usize {
    1_000_000
}

impl Default for PlannerConfig {
    fn default() -> Self {
        PlannerConfig {
            max_expansions: default_max_expansions(),
        }
    }
}

/// Result of a successful search
#[derive(Clone, Debug, PartialEq)]
pub struct PlannedPath {
    /// Node ids from start to goal inclusive
    pub node_ids: Vec<String>,
    /// One waypoint per node, carrying the node's coordinates
    pub waypoints: Vec<Waypoint>,
    /// Total path cost in meters
    pub distance: f64,
    pub mode: CoordinateMode,
}

impl PlannedPath {
    /// Converts the path into a tracker route. The first waypoint is the start
    /// node, so the route is marked as starting at the origin.
    pub fn into_route(self) -> Route {
        Route::new(self.mode, self.waypoints, true)
    }
}

/// Open-set entry; `sequence` keeps equal-`f` pops in insertion order
#[derive(Clone, Copy, Debug)]
struct SearchNode {
    index: usize,
    f_score: f64,
    sequence: u64,
}

impl PartialEq for SearchNode {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for SearchNode {}

impl Ord for SearchNode {
    fn cmp(&self, other: &Self) -> Ordering {
        // Reversed for a min-heap on f, then on sequence
        other
            .f_score
            .total_cmp(&self.f_score)
            .then_with(|| other.sequence.cmp(&self.sequence))
    }
}

impl PartialOrd for SearchNode {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

/// A* route planner
#[derive(Debug, Clone, Default)]
pub struct RoutePlanner {
    config: PlannerConfig,
}

impl RoutePlanner {
    pub fn new(config: PlannerConfig) -> Self {
        RoutePlanner { config }
    }

    /// Finds the shortest path between two node ids.
    ///
    /// Returns [`WayfinderError::NotFound`] when either id is not in the graph
    /// or the two nodes are not connected.
    pub fn find_path(&self, graph: &Graph, start_id: &str, goal_id: &str) -> Result<PlannedPath> {
        let start = graph
            .index_of(start_id)
            .ok_or_else(|| WayfinderError::NotFound(format!("start node '{}'", start_id)))?;
        let goal = graph
            .index_of(goal_id)
            .ok_or_else(|| WayfinderError::NotFound(format!("goal node '{}'", goal_id)))?;

        if start == goal {
            return Ok(self.build_path(graph, vec![start], 0.0));
        }

        let mode = graph.mode();
        let goal_coords = *graph.coordinates_at(goal);
        let heuristic = |index: usize| -> f64 {
            mode.distance(graph.coordinates_at(index), &goal_coords)
                .unwrap_or(0.0)
        };

        let n = graph.node_count();
        let mut g_score = vec![f64::INFINITY; n];
        let mut parent: Vec<Option<usize>> = vec![None; n];
        let mut closed = vec![false; n];
        let mut open_set = BinaryHeap::new();
        let mut sequence = 0u64;
        let mut expansions = 0usize;

        g_score[start] = 0.0;
        open_set.push(SearchNode {
            index: start,
            f_score: heuristic(start),
            sequence,
        });

        while let Some(SearchNode { index: current, .. }) = open_set.pop() {
            if closed[current] {
                // Stale entry superseded by a better g
                continue;
            }
            if current == goal {
                let nodes = reconstruct(&parent, goal);
                debug!(
                    "Path {} -> {}: {} nodes, {:.1} m, {} expansions",
                    start_id,
                    goal_id,
                    nodes.len(),
                    g_score[goal],
                    expansions
                );
                return Ok(self.build_path(graph, nodes, g_score[goal]));
            }

            closed[current] = true;
            expansions += 1;
            if expansions > self.config.max_expansions {
                warn!(
                    "Search {} -> {} exceeded {} expansions",
                    start_id, goal_id, self.config.max_expansions
                );
                break;
            }

            for &(neighbor, cost) in graph.neighbors(current) {
                if closed[neighbor] {
                    continue;
                }
                let tentative = g_score[current] + cost;
                if tentative < g_score[neighbor] {
                    g_score[neighbor] = tentative;
                    parent[neighbor] = Some(current);
                    sequence += 1;
                    open_set.push(SearchNode {
                        index: neighbor,
                        f_score: tentative + heuristic(neighbor),
                        sequence,
                    });
                }
            }
        }

        Err(WayfinderError::NotFound(format!(
            "no path from '{}' to '{}'",
            start_id, goal_id
        )))
    }

    fn build_path(&self, graph: &Graph, nodes: Vec<usize>, distance: f64) -> PlannedPath {
        PlannedPath {
            node_ids: nodes.iter().map(|&i| graph.node_at(i).id.clone()).collect(),
            waypoints: nodes.iter().map(|&i| Waypoint::from(graph.node_at(i))).collect(),
            distance,
            mode: graph.mode(),
        }
    }
}

/// Shortest path with the default planner configuration
pub fn find_path(graph: &Graph, start_id: &str, goal_id: &str) -> Result<PlannedPath> {
    RoutePlanner::default().find_path(graph, start_id, goal_id)
}

/// Node closest to `position` in the graph's coordinate mode. Useful for
/// picking a start node from an estimated position when no marker was scanned.
pub fn nearest_node<'a>(graph: &'a Graph, position: &Coordinates) -> Option<&'a LocationNode> {
    let mode = graph.mode();
    (0..graph.node_count())
        .filter_map(|i| {
            mode.distance(graph.coordinates_at(i), position)
                .map(|d| (i, d))
        })
        .min_by(|a, b| a.1.total_cmp(&b.1))
        .map(|(i, _)| graph.node_at(i))
}

fn reconstruct(parent: &[Option<usize>], goal: usize) -> Vec<usize> {
    let mut path = vec![goal];
    let mut current = goal;
    while let Some(previous) = parent[current] {
        path.push(previous);
        current = previous;
    }
    path.reverse();
    path
}
