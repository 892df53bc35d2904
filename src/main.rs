// src/main.rs
// Demo for Wayfinder: plans a route over a location graph and walks it with
// simulated sensors, logging the guidance a presentation layer would render.
//
// Usage: wayfinder [--config config.yaml] [graph.yaml START GOAL]
// Run with RUST_LOG=info (or debug) to see the output.

use log::{error, info, warn};
use std::sync::Arc;

use wayfinder::core::geometry::{CoordinateMode, GeoPoint, LocalProjection, PlanarPoint};
use wayfinder::interface::SimulatedWalk;
use wayfinder::{
    Connection, GraphDescription, LocationNode, NavigationObserver, NavigationSession, NavigationState,
    Result, RoutePlanner, WayfinderConfig, WayfinderError, Waypoint,
};

/// Geodetic position the demo's planar map origin is pinned to
const DEMO_ANCHOR: GeoPoint = GeoPoint {
    latitude: 48.137154,
    longitude: 11.576124,
};

/// Logs every navigation event
struct ConsoleObserver;

impl NavigationObserver for ConsoleObserver {
    fn on_state(&self, state: &NavigationState) {
        info!(
            "[{:>6} ms] waypoint {}/{}: {:6.1} m at {:5.1}° (turn {:+6.1}°), {:6.1} m left{}",
            state.timestamp_ms,
            state.waypoint_index + 1,
            state.waypoint_count,
            state.distance_to_next_m,
            state.bearing_deg,
            state.relative_bearing_deg,
            state.remaining_distance_m,
            if state.stale { " (stale)" } else { "" }
        );
    }

    fn on_waypoint_reached(&self, index: usize, waypoint: &Waypoint) {
        info!(
            "Reached waypoint {} ({})",
            index,
            waypoint.node_id.as_deref().unwrap_or("unnamed")
        );
    }

    fn on_arrival(&self, state: &NavigationState) {
        info!("Arrived, {:.1} m from the destination", state.distance_to_next_m);
    }
}

/// Small campus used when no graph file is given
fn demo_graph() -> GraphDescription {
    GraphDescription {
        nodes: vec![
            LocationNode::planar("entrance", 0.0, 0.0).with_category("entrance"),
            LocationNode::planar("lobby", 0.0, 30.0),
            LocationNode::planar("courtyard", 40.0, 30.0),
            LocationNode::planar("library", 40.0, 80.0).with_category("library"),
            LocationNode::planar("cafeteria", -35.0, 60.0).with_category("food"),
        ],
        connections: vec![
            Connection::new("entrance", "lobby"),
            Connection::new("lobby", "courtyard"),
            Connection::new("courtyard", "library"),
            Connection::new("lobby", "cafeteria"),
            Connection::new("cafeteria", "library"),
        ],
    }
}

struct Args {
    config: Option<String>,
    graph: Option<String>,
    start: String,
    goal: String,
}

fn parse_args() -> Result<Args> {
    let mut config = None;
    let mut positional = Vec::new();
    let mut args = std::env::args().skip(1);
    while let Some(arg) = args.next() {
        if arg == "--config" {
            config = Some(args.next().ok_or_else(|| {
                WayfinderError::InvalidInput("--config needs a path".to_string())
            })?);
        } else {
            positional.push(arg);
        }
    }

    match positional.as_slice() {
        [] => Ok(Args {
            config,
            graph: None,
            start: "entrance".to_string(),
            goal: "library".to_string(),
        }),
        [graph, start, goal] => Ok(Args {
            config,
            graph: Some(graph.clone()),
            start: start.clone(),
            goal: goal.clone(),
        }),
        _ => Err(WayfinderError::InvalidInput(
            "usage: wayfinder [--config config.yaml] [graph.yaml START GOAL]".to_string(),
        )),
    }
}

fn run() -> Result<()> {
    let args = parse_args()?;
    let config = match &args.config {
        Some(path) => WayfinderConfig::load(path)?,
        None => WayfinderConfig::default(),
    };
    let description = match &args.graph {
        Some(path) => GraphDescription::load(path)?,
        None => demo_graph(),
    };

    let graph = description.build();
    if !graph.report().is_clean() {
        warn!("Graph built with skipped entries: {:?}", graph.report());
    }
    info!(
        "Graph: {} nodes, {} edges ({:?})",
        graph.node_count(),
        graph.edge_count(),
        graph.mode()
    );

    let planner = RoutePlanner::new(config.planner.clone());
    let path = planner.find_path(&graph, &args.start, &args.goal)?;
    info!(
        "Route {} -> {}: {} ({:.1} m)",
        args.start,
        args.goal,
        path.node_ids.join(" -> "),
        path.distance
    );
    let route = path.into_route();

    // Express the walk in planar meters whatever the graph's mode
    let (projection, walk_path): (LocalProjection, Vec<PlanarPoint>) = match route.mode() {
        CoordinateMode::Planar => {
            let points: Vec<PlanarPoint> =
                route.waypoints().iter().filter_map(|w| w.coordinates.planar).collect();
            let origin = points.first().copied().unwrap_or_else(PlanarPoint::zeros);
            (LocalProjection::new(DEMO_ANCHOR, origin), points)
        }
        CoordinateMode::Geodetic => {
            let start = route
                .waypoint(0)
                .and_then(|w| w.coordinates.geodetic)
                .unwrap_or(DEMO_ANCHOR);
            let projection = LocalProjection::new(start, PlanarPoint::zeros());
            let points = route
                .waypoints()
                .iter()
                .filter_map(|w| w.coordinates.geodetic)
                .map(|g| projection.to_planar(g))
                .collect();
            (projection, points)
        }
    };

    let session = NavigationSession::from_config(&config);
    session.subscribe(Arc::new(ConsoleObserver));
    let anchor = projection.anchor();
    let origin = walk_path.first().copied().unwrap_or_else(PlanarPoint::zeros);
    session.anchor(anchor.latitude, anchor.longitude, origin.x, origin.y)?;
    session.start(route);

    let walk = SimulatedWalk::new(projection, walk_path).with_fix_accuracy(4.0);
    info!(
        "Walking {:.1} m in {:.1} s of simulated time",
        walk.length_m(),
        walk.duration_ms() as f64 / 1000.0
    );
    let delivered = walk.replay(&session.fix_subscription(), &session.motion_subscription());

    let stats = session.stats();
    info!(
        "Replayed {} samples: {} fixes applied, {} ignored, {} steps",
        delivered, stats.fixes_applied, stats.fixes_ignored, stats.steps
    );
    match session.latest_state() {
        Some(state) if state.arrived => info!("Navigation finished: arrived"),
        Some(state) => warn!(
            "Navigation ended {:.1} m short of waypoint {}",
            state.distance_to_next_m, state.waypoint_index
        ),
        None => warn!("No navigation state was produced"),
    }
    session.stop();
    Ok(())
}

fn main() {
    env_logger::init();
    info!("Starting Wayfinder demo");
    if let Err(e) = run() {
        error!("Demo failed: {}", e);
        std::process::exit(1);
    }
}
