// core/graph.rs

// Location graph the route planner searches. Nodes are known places (rooms,
// entrances, landmarks) and connections are walkable links between them. A graph
// is built fresh for every route request from a description supplied by the
// host's persistence layer and is never mutated afterwards.

// Dependencies
use log::debug;
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};
use std::fs::File;
use std::path::Path;

use super::geometry::{dominant_mode, CoordinateMode, Coordinates, GeoPoint, PlanarPoint};
use crate::error::Result;

/// A known location
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct LocationNode {
    pub id: String,
    #[serde(default)]
    pub x: Option<f64>,
    #[serde(default)]
    pub y: Option<f64>,
    #[serde(default)]
    pub latitude: Option<f64>,
    #[serde(default)]
    pub longitude: Option<f64>,
    #[serde(default)]
    pub floor: Option<i32>,
    #[serde(default)]
    pub category: Option<String>,
}

impl LocationNode {
    /// Node with planar map coordinates (meters)
    pub fn planar(id: impl Into<String>, x: f64, y: f64) -> Self {
        LocationNode {
            id: id.into(),
            x: Some(x),
            y: Some(y),
            latitude: None,
            longitude: None,
            floor: None,
            category: None,
        }
    }

    /// Node with absolute coordinates only
    pub fn geodetic(id: impl Into<String>, latitude: f64, longitude: f64) -> Self {
        LocationNode {
            id: id.into(),
            x: None,
            y: None,
            latitude: Some(latitude),
            longitude: Some(longitude),
            floor: None,
            category: None,
        }
    }

    pub fn with_geodetic(mut self, latitude: f64, longitude: f64) -> Self {
        self.latitude = Some(latitude);
        self.longitude = Some(longitude);
        self
    }

    pub fn with_floor(mut self, floor: i32) -> Self {
        self.floor = Some(floor);
        self
    }

    pub fn with_category(mut self, category: impl Into<String>) -> Self {
        self.category = Some(category.into());
        self
    }

    pub fn coordinates(&self) -> Coordinates {
        Coordinates {
            planar: match (self.x, self.y) {
                (Some(x), Some(y)) => Some(PlanarPoint::new(x, y)),
                _ => None,
            },
            geodetic: match (self.latitude, self.longitude) {
                (Some(lat), Some(lon)) => Some(GeoPoint::new(lat, lon)),
                _ => None,
            },
        }
    }
}

/// Bidirectional walkable link between two node ids
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Connection {
    pub from: String,
    pub to: String,
}

impl Connection {
    pub fn new(from: impl Into<String>, to: impl Into<String>) -> Self {
        Connection {
            from: from.into(),
            to: to.into(),
        }
    }
}

/// Serializable graph description as stored by the host application
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct GraphDescription {
    pub nodes: Vec<LocationNode>,
    #[serde(default)]
    pub connections: Vec<Connection>,
}

impl GraphDescription {
    /// Parses a description from a YAML document
    pub fn from_yaml_str(yaml: &str) -> Result<Self> {
        Ok(serde_yaml::from_str(yaml)?)
    }

    /// Loads a description from a YAML file
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let file = File::open(path.as_ref())?;
        let description: GraphDescription = serde_yaml::from_reader(file)?;
        debug!(
            "Loaded graph description from {:?}: {} nodes, {} connections",
            path.as_ref(),
            description.nodes.len(),
            description.connections.len()
        );
        Ok(description)
    }

    pub fn build(&self) -> Graph {
        Graph::build(self.nodes.clone(), &self.connections)
    }
}

/// Undirected edge between two node indices
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Edge {
    pub a: usize,
    pub b: usize,
    pub cost: f64,
}

/// Counts of entities dropped while building a graph
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct BuildReport {
    pub skipped_nodes: usize,
    pub skipped_edges: usize,
}

impl BuildReport {
    pub fn is_clean(&self) -> bool {
        self.skipped_nodes == 0 && self.skipped_edges == 0
    }
}

/// Immutable weighted location graph in a single coordinate mode
#[derive(Clone, Debug)]
pub struct Graph {
    nodes: Vec<LocationNode>,
    coordinates: Vec<Coordinates>,
    index: HashMap<String, usize>,
    edges: Vec<Edge>,
    adjacency: Vec<Vec<(usize, f64)>>,
    mode: CoordinateMode,
    report: BuildReport,
}

impl Graph {
    /// Builds a graph, dropping malformed nodes and connections.
    ///
    /// # Panics
    /// Panics if an edge cost comes out negative or non-finite, which means the
    /// coordinate validation above it is broken.
    pub fn build(nodes: Vec<LocationNode>, connections: &[Connection]) -> Self {
        let mut report = BuildReport::default();
        let candidates: Vec<Coordinates> = nodes.iter().map(LocationNode::coordinates).collect();
        let mode = dominant_mode(candidates.iter());

        let mut kept = Vec::with_capacity(nodes.len());
        let mut coordinates = Vec::with_capacity(nodes.len());
        let mut index = HashMap::with_capacity(nodes.len());

        for (node, coords) in nodes.into_iter().zip(candidates) {
            if !coords.supports(mode) {
                debug!("Dropping node '{}': no usable {:?} coordinates", node.id, mode);
                report.skipped_nodes += 1;
                continue;
            }
            if index.contains_key(&node.id) {
                debug!("Dropping duplicate node '{}'", node.id);
                report.skipped_nodes += 1;
                continue;
            }
            index.insert(node.id.clone(), kept.len());
            coordinates.push(coords);
            kept.push(node);
        }

        let mut edges = Vec::with_capacity(connections.len());
        let mut adjacency = vec![Vec::new(); kept.len()];
        let mut seen = HashSet::with_capacity(connections.len());

        for connection in connections {
            let (Some(&a), Some(&b)) = (index.get(&connection.from), index.get(&connection.to)) else {
                debug!(
                    "Dropping connection {} -> {}: unknown endpoint",
                    connection.from, connection.to
                );
                report.skipped_edges += 1;
                continue;
            };
            if a == b || !seen.insert((a.min(b), a.max(b))) {
                debug!(
                    "Dropping connection {} -> {}: self-loop or duplicate",
                    connection.from, connection.to
                );
                report.skipped_edges += 1;
                continue;
            }

            let cost = mode
                .distance(&coordinates[a], &coordinates[b])
                .unwrap_or(f64::NAN);
            assert!(
                cost.is_finite() && cost >= 0.0,
                "invalid edge cost {} between '{}' and '{}'",
                cost,
                connection.from,
                connection.to
            );

            edges.push(Edge { a, b, cost });
            adjacency[a].push((b, cost));
            adjacency[b].push((a, cost));
        }

        Graph {
            nodes: kept,
            coordinates,
            index,
            edges,
            adjacency,
            mode,
            report,
        }
    }

    pub fn mode(&self) -> CoordinateMode {
        self.mode
    }

    pub fn report(&self) -> BuildReport {
        self.report
    }

    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    pub fn edge_count(&self) -> usize {
        self.edges.len()
    }

    pub fn edges(&self) -> &[Edge] {
        &self.edges
    }

    pub fn contains(&self, id: &str) -> bool {
        self.index.contains_key(id)
    }

    pub fn node(&self, id: &str) -> Option<&LocationNode> {
        self.index.get(id).map(|&i| &self.nodes[i])
    }

    pub fn nodes(&self) -> impl Iterator<Item = &LocationNode> {
        self.nodes.iter()
    }

    pub(crate) fn index_of(&self, id: &str) -> Option<usize> {
        self.index.get(id).copied()
    }

    pub(crate) fn node_at(&self, index: usize) -> &LocationNode {
        &self.nodes[index]
    }

    pub(crate) fn coordinates_at(&self, index: usize) -> &Coordinates {
        &self.coordinates[index]
    }

    pub(crate) fn neighbors(&self, index: usize) -> &[(usize, f64)] {
        &self.adjacency[index]
    }
}
