// Position estimator behavior across mixed fix quality, heading sources and
// sample timing.

use nalgebra::{Matrix3, Vector3};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use rstest::rstest;

use wayfinder::core::geometry::{GeoPoint, LocalProjection, PlanarPoint};
use wayfinder::core::localization::SampleOutcome;
use wayfinder::{Orientation, PositionEstimator};

const ANCHOR: GeoPoint = GeoPoint {
    latitude: 40.4168,
    longitude: -3.7038,
};

fn anchored() -> (PositionEstimator, LocalProjection) {
    let mut estimator = PositionEstimator::default();
    estimator
        .anchor(ANCHOR.latitude, ANCHOR.longitude, 0.0, 0.0)
        .unwrap();
    (estimator, LocalProjection::new(ANCHOR, PlanarPoint::zeros()))
}

fn fix_at(
    estimator: &mut PositionEstimator,
    projection: &LocalProjection,
    x: f64,
    y: f64,
    accuracy_m: f64,
    timestamp_ms: u64,
) -> SampleOutcome {
    let geo = projection.to_geo(&PlanarPoint::new(x, y));
    estimator.ingest_fix(geo.latitude, geo.longitude, accuracy_m, timestamp_ms)
}

#[test]
fn test_alternating_fix_quality_tracks_accurate_fixes() {
    let (mut estimator, projection) = anchored();

    for i in 0..20u64 {
        let truth_y = i as f64 * 2.0;
        let before = estimator.current_estimate().unwrap().planar;

        // Poor fix far off to the side
        fix_at(&mut estimator, &projection, 60.0, truth_y, 20.0, i * 1000);
        let after_poor = estimator.current_estimate().unwrap().planar;
        let pulled = (after_poor - before).norm();
        let offered = (PlanarPoint::new(60.0, truth_y) - before).norm();
        assert!(pulled <= 0.05 * offered, "poor fix moved estimate {:.2} of {:.2} m", pulled, offered);

        fix_at(&mut estimator, &projection, 0.0, truth_y, 3.0, i * 1000 + 500);
    }

    let estimate = estimator.current_estimate().unwrap();
    assert!(estimate.planar.x.abs() < 0.1, "{:?}", estimate.planar);
    assert!((estimate.planar.y - 38.0).abs() < 1.0, "{:?}", estimate.planar);
    assert_eq!(estimator.stats().fixes_ignored, 20);
}

#[rstest]
#[case(4.0, 0.8)]
#[case(12.0, 0.5)]
#[case(30.0, 0.0)]
fn test_single_fix_moves_by_weight(#[case] accuracy: f64, #[case] fraction: f64) {
    let (mut estimator, projection) = anchored();
    fix_at(&mut estimator, &projection, 0.0, 20.0, accuracy, 100);
    let y = estimator.current_estimate().unwrap().planar.y;
    assert!((y - 20.0 * fraction).abs() < 0.01, "moved to {}", y);
}

#[test]
fn test_noisy_fixes_settle_near_truth() {
    let (mut estimator, projection) = anchored();
    let mut rng = StdRng::seed_from_u64(11);
    let truth = PlanarPoint::new(25.0, -40.0);

    for i in 0..200u64 {
        let noise = PlanarPoint::new(rng.gen_range(-3.0..3.0), rng.gen_range(-3.0..3.0));
        let accuracy = rng.gen_range(2.0..25.0);
        let measured = truth + noise;
        fix_at(&mut estimator, &projection, measured.x, measured.y, accuracy, i * 1000);
    }

    let estimate = estimator.current_estimate().unwrap();
    assert!((estimate.planar - truth).norm() < 4.5, "{:?}", estimate.planar);
    assert!(estimate.accuracy_m <= 15.0);
}

#[test]
fn test_rotation_matrix_heading_steers_steps() {
    let (mut estimator, _) = anchored();
    // Device y axis pointing east
    let east = Matrix3::new(0.0, 1.0, 0.0, -1.0, 0.0, 0.0, 0.0, 0.0, 1.0);
    let jolt = Vector3::new(0.0, 0.0, 2.5);

    for k in 0..4u64 {
        estimator.ingest_motion(jolt, Orientation::RotationMatrix(east), k * 400);
    }
    let estimate = estimator.current_estimate().unwrap();
    assert!((estimate.planar.x - 2.8).abs() < 1e-6, "{:?}", estimate.planar);
    assert!(estimate.planar.y.abs() < 1e-6);
    assert!((estimate.heading_deg - 90.0).abs() < 1e-6);
    // Anchor accuracy plus drift for each dead-reckoned step
    assert!((estimate.accuracy_m - 1.4).abs() < 1e-9);
}

#[test]
fn test_heading_wrap_from_both_sides() {
    let (mut estimator, _) = anchored();
    estimator.ingest_motion(Vector3::zeros(), Orientation::Heading(10.0), 0);
    estimator.ingest_motion(Vector3::zeros(), Orientation::Heading(350.0), 20);
    let heading = estimator.current_estimate().unwrap().heading_deg;
    assert!((heading - 7.0).abs() < 1e-9, "{}", heading);
}

#[test]
fn test_equal_timestamps_are_accepted() {
    let (mut estimator, projection) = anchored();
    assert_eq!(fix_at(&mut estimator, &projection, 0.0, 5.0, 3.0, 1000), SampleOutcome::Applied);
    assert_eq!(fix_at(&mut estimator, &projection, 0.0, 5.0, 3.0, 1000), SampleOutcome::Applied);
    // Streams are ordered independently
    assert_eq!(
        estimator.ingest_motion(Vector3::zeros(), Orientation::Heading(0.0), 10),
        SampleOutcome::Applied
    );
    assert_eq!(estimator.stats().out_of_order, 0);
}

#[test]
fn test_fix_refreshes_stale_estimate() {
    let (mut estimator, projection) = anchored();
    fix_at(&mut estimator, &projection, 0.0, 0.0, 3.0, 0);
    assert!(estimator.estimate_at(6000).unwrap().stale);

    fix_at(&mut estimator, &projection, 0.0, 1.0, 3.0, 6000);
    assert!(!estimator.estimate_at(6000).unwrap().stale);
}

#[test]
fn test_late_fix_does_not_roll_back_dead_reckoning() {
    let (mut estimator, projection) = anchored();
    let jolt = Vector3::new(0.0, 0.0, 2.5);
    for k in 1..=5u64 {
        estimator.ingest_motion(jolt, Orientation::Heading(0.0), k * 1000);
    }
    let walked = estimator.current_estimate().unwrap();
    assert!((walked.planar.y - 3.5).abs() < 1e-9);

    // Buffered fix from before the steps
    assert_eq!(fix_at(&mut estimator, &projection, 0.0, 0.0, 3.0, 500), SampleOutcome::Dropped);
    let after = estimator.current_estimate().unwrap();
    assert_eq!(after.planar, walked.planar);
    assert_eq!(after.timestamp_ms, 5000);
    assert_eq!(estimator.stats().out_of_order, 1);

    assert_eq!(fix_at(&mut estimator, &projection, 0.0, 3.5, 3.0, 5200), SampleOutcome::Applied);
}

#[test]
fn test_late_step_keeps_heading_but_not_position() {
    let (mut estimator, projection) = anchored();
    fix_at(&mut estimator, &projection, 0.0, 10.0, 3.0, 2000);
    let fixed = estimator.current_estimate().unwrap().planar;

    let outcome = estimator.ingest_motion(Vector3::new(0.0, 0.0, 2.5), Orientation::Heading(90.0), 1500);
    assert_eq!(outcome, SampleOutcome::Applied);
    let estimate = estimator.current_estimate().unwrap();
    assert_eq!(estimate.planar, fixed);
    assert!((estimate.heading_deg - 90.0).abs() < 1e-9);
    assert_eq!(estimator.stats().steps, 0);
    assert_eq!(estimator.stats().out_of_order, 1);
}
