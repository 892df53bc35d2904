// core/session.rs

// Navigation session: the caller-owned object that wires the position estimator
// to the navigation tracker. The host pushes sensor samples through subscription
// handles; every applied sample refreshes the estimate and drives the tracker,
// which notifies observers. Readers poll immutable snapshots that are swapped
// whole, so they never see a half-updated state.

// Dependencies
use log::{debug, info, warn};
use parking_lot::{Mutex, RwLock};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use super::localization::{EstimatorConfig, EstimatorStats, PositionEstimate, PositionEstimator, SampleOutcome};
use super::state::{NavigationState, TrackerPhase};
use crate::config::WayfinderConfig;
use crate::error::Result;
use crate::interface::{FixSample, MotionSample, NavigationObserver, SampleSink, Subscription};
use crate::navigation::{NavigationTracker, Route, TrackerConfig};

struct SessionInner {
    estimator: PositionEstimator,
    tracker: NavigationTracker,
    stopped: bool,
    handles: Vec<Arc<AtomicBool>>,
}

struct SessionShared {
    inner: Mutex<SessionInner>,
    latest_estimate: RwLock<Option<Arc<PositionEstimate>>>,
    latest_state: RwLock<Option<Arc<NavigationState>>>,
}

impl SessionShared {
    /// Runs one estimator input under the session lock and propagates the result
    fn apply<F>(&self, ingest: F)
    where
        F: FnOnce(&mut PositionEstimator) -> SampleOutcome,
    {
        let mut inner = self.inner.lock();
        // A sample that passed its handle's check while stop() was running
        // lands here after the flag flipped
        if inner.stopped {
            return;
        }
        if ingest(&mut inner.estimator) == SampleOutcome::Applied {
            self.refresh(&mut inner);
        }
    }

    /// Publishes the current estimate and feeds it to the tracker
    fn refresh(&self, inner: &mut SessionInner) {
        let estimate = match inner.estimator.current_estimate() {
            Ok(estimate) => estimate,
            Err(_) => return,
        };
        if inner.tracker.on_position_update(&estimate).is_some() {
            *self.latest_state.write() = inner.tracker.snapshot();
        }
        *self.latest_estimate.write() = Some(Arc::new(estimate));
    }
}

struct SessionSink {
    shared: Arc<SessionShared>,
}

impl SampleSink<FixSample> for SessionSink {
    fn deliver(&self, sample: FixSample) {
        self.shared.apply(|estimator| {
            estimator.ingest_fix(
                sample.latitude,
                sample.longitude,
                sample.accuracy_meters,
                sample.timestamp_ms,
            )
        });
    }
}

impl SampleSink<MotionSample> for SessionSink {
    fn deliver(&self, sample: MotionSample) {
        self.shared.apply(|estimator| {
            estimator.ingest_motion(sample.acceleration, sample.orientation, sample.timestamp_ms)
        });
    }
}

/// One navigation attempt: estimator, tracker and the sensor handles feeding them
#[derive(Clone)]
pub struct NavigationSession {
    shared: Arc<SessionShared>,
}

impl NavigationSession {
    pub fn new(estimator: EstimatorConfig, tracker: TrackerConfig) -> Self {
        let inner = SessionInner {
            estimator: PositionEstimator::new(estimator),
            tracker: NavigationTracker::new(tracker),
            stopped: false,
            handles: Vec::new(),
        };
        NavigationSession {
            shared: Arc::new(SessionShared {
                inner: Mutex::new(inner),
                latest_estimate: RwLock::new(None),
                latest_state: RwLock::new(None),
            }),
        }
    }

    /// Builds a session from the estimator and tracker sections of a config
    pub fn from_config(config: &WayfinderConfig) -> Self {
        NavigationSession::new(config.estimator.clone(), config.tracker.clone())
    }

    /// Starts following `route`. When the position is already known, the first
    /// state is computed immediately.
    pub fn start(&self, route: Route) -> TrackerPhase {
        let mut inner = self.shared.inner.lock();
        if inner.stopped {
            warn!("Session already stopped; ignoring new route");
            return TrackerPhase::Idle;
        }
        *self.shared.latest_state.write() = None;
        let phase = inner.tracker.start(route);
        if phase.is_active() {
            self.shared.refresh(&mut inner);
        }
        inner.tracker.phase()
    }

    /// Pins a geodetic position to a planar map position
    pub fn anchor(&self, latitude: f64, longitude: f64, planar_x: f64, planar_y: f64) -> Result<()> {
        let mut inner = self.shared.inner.lock();
        inner.estimator.anchor(latitude, longitude, planar_x, planar_y)?;
        if !inner.stopped {
            self.shared.refresh(&mut inner);
        }
        Ok(())
    }

    /// Handle for pushing absolute fixes
    pub fn fix_subscription(&self) -> Subscription<FixSample> {
        Subscription::<FixSample>::new(self.sink(), self.register_handle())
    }

    /// Handle for pushing motion samples
    pub fn motion_subscription(&self) -> Subscription<MotionSample> {
        Subscription::<MotionSample>::new(self.sink(), self.register_handle())
    }

    /// Adds an observer. Callbacks run while the session is locked and must not
    /// call back into it.
    pub fn subscribe(&self, observer: Arc<dyn NavigationObserver>) {
        self.shared.inner.lock().tracker.subscribe(observer);
    }

    /// Forces advancement to the next waypoint
    pub fn skip_to_next(&self) -> Option<NavigationState> {
        let mut inner = self.shared.inner.lock();
        if inner.stopped {
            return None;
        }
        let state = inner.tracker.skip_to_next();
        if state.is_some() {
            *self.shared.latest_state.write() = inner.tracker.snapshot();
        }
        state
    }

    /// Deactivates every subscription handle and ends navigation. No sample is
    /// processed once this returns; further calls do nothing.
    pub fn stop(&self) {
        let mut inner = self.shared.inner.lock();
        if inner.stopped {
            debug!("Session already stopped");
            return;
        }
        inner.stopped = true;
        for handle in inner.handles.drain(..) {
            handle.store(false, Ordering::SeqCst);
        }
        inner.tracker.stop();
        info!("Session stopped");
    }

    pub fn is_stopped(&self) -> bool {
        self.shared.inner.lock().stopped
    }

    pub fn phase(&self) -> TrackerPhase {
        self.shared.inner.lock().tracker.phase()
    }

    /// Most recent navigation state, if any was produced
    pub fn latest_state(&self) -> Option<Arc<NavigationState>> {
        self.shared.latest_state.read().clone()
    }

    /// Most recent position estimate, if the session is calibrated
    pub fn latest_estimate(&self) -> Option<Arc<PositionEstimate>> {
        self.shared.latest_estimate.read().clone()
    }

    /// Estimate with staleness judged against a host clock reading
    pub fn estimate_at(&self, now_ms: u64) -> Result<PositionEstimate> {
        self.shared.inner.lock().estimator.estimate_at(now_ms)
    }

    pub fn stats(&self) -> EstimatorStats {
        self.shared.inner.lock().estimator.stats()
    }

    fn sink(&self) -> Arc<SessionSink> {
        Arc::new(SessionSink {
            shared: Arc::clone(&self.shared),
        })
    }

    fn register_handle(&self) -> Arc<AtomicBool> {
        let mut inner = self.shared.inner.lock();
        let handle = Arc::new(AtomicBool::new(!inner.stopped));
        if !inner.stopped {
            inner.handles.push(Arc::clone(&handle));
        }
        handle
    }
}

impl Default for NavigationSession {
    fn default() -> Self {
        NavigationSession::new(EstimatorConfig::default(), TrackerConfig::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::geometry::CoordinateMode;
    use crate::interface::MockNavigationObserver;
    use crate::navigation::Waypoint;
    use crate::WayfinderError;
    use nalgebra::Vector3;

    const LAT: f64 = 52.52;
    const LON: f64 = 13.405;

    fn route() -> Route {
        Route::new(
            CoordinateMode::Planar,
            vec![Waypoint::planar(0.0, 0.0), Waypoint::planar(0.0, 50.0)],
            true,
        )
    }

    #[test]
    fn test_fix_drives_tracker() {
        let session = NavigationSession::default();
        assert_eq!(session.start(route()), TrackerPhase::Navigating);
        assert!(session.latest_state().is_none());

        let fixes = session.fix_subscription();
        assert!(fixes.push(FixSample::new(LAT, LON, 3.0, 1_000)));

        let estimate = session.latest_estimate().unwrap();
        assert!(estimate.planar.norm() < 1e-9);
        let state = session.latest_state().unwrap();
        assert_eq!(state.waypoint_index, 1);
        assert!((state.distance_to_next_m - 50.0).abs() < 1e-6);
    }

    #[test]
    fn test_motion_before_calibration_yields_nothing() {
        let session = NavigationSession::default();
        session.start(route());
        let motion = session.motion_subscription();
        motion.push(MotionSample::with_heading(Vector3::new(0.0, 0.0, 2.5), 0.0, 100));
        assert!(session.latest_estimate().is_none());
        assert!(matches!(session.estimate_at(100), Err(WayfinderError::Uncalibrated)));
        assert_eq!(session.stats().steps, 1);
    }

    #[test]
    fn test_start_after_anchor_computes_immediately() {
        let session = NavigationSession::default();
        session.anchor(LAT, LON, 0.0, 10.0).unwrap();
        session.start(route());
        let state = session.latest_state().unwrap();
        assert!((state.distance_to_next_m - 40.0).abs() < 1e-9);
    }

    #[test]
    fn test_no_delivery_after_stop() {
        let mut observer = MockNavigationObserver::new();
        observer.expect_on_state().times(2).return_const(());
        observer.expect_on_waypoint_reached().never();
        observer.expect_on_arrival().never();

        let session = NavigationSession::default();
        session.subscribe(Arc::new(observer));
        session.start(route());
        session.anchor(LAT, LON, 0.0, 0.0).unwrap();

        let fixes = session.fix_subscription();
        let motion = session.motion_subscription();
        assert!(fixes.push(FixSample::new(LAT, LON, 3.0, 1_000)));

        session.stop();
        assert!(!fixes.is_active());
        assert!(!fixes.push(FixSample::new(LAT, LON, 3.0, 2_000)));
        assert!(!motion.push(MotionSample::with_heading(Vector3::zeros(), 90.0, 2_000)));
        assert_eq!(session.phase(), TrackerPhase::Idle);
    }

    #[test]
    fn test_stop_is_idempotent() {
        let session = NavigationSession::default();
        session.start(route());
        session.stop();
        session.stop();
        assert!(session.is_stopped());

        // Handles requested afterwards are born inactive
        assert!(!session.fix_subscription().is_active());
        assert_eq!(session.start(route()), TrackerPhase::Idle);
        assert!(session.skip_to_next().is_none());
    }

    #[test]
    fn test_handles_work_across_threads() {
        let session = NavigationSession::default();
        session.start(route());
        let fixes = session.fix_subscription();

        let worker = std::thread::spawn(move || {
            for i in 0..10u64 {
                fixes.push(FixSample::new(LAT + i as f64 * 1e-5, LON, 3.0, i * 1_000));
            }
        });
        worker.join().unwrap();

        assert_eq!(session.stats().fixes_applied, 10);
        let state = session.latest_state().unwrap();
        assert!(state.distance_to_next_m < 50.0);
    }
}
