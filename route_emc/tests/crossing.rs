use geo::LineString;
use route_emc::crossing::analyze_crossings;
use route_emc::geometry::MetricLine;
use route_emc::layers::{Feature, FeatureGeometry};

fn route(coords: &[(f64, f64)]) -> MetricLine {
    MetricLine::new(LineString::from(coords.to_vec()))
}

fn track(id: u64, coords: &[(f64, f64)]) -> Feature {
    Feature {
        id,
        geometry: FeatureGeometry::Line(LineString::from(coords.to_vec())),
    }
}

/// Track crossing the horizontal route at `x` under `angle_degrees`.
fn angled_track(id: u64, x: f64, angle_degrees: f64) -> Feature {
    let dx = angle_degrees.to_radians().cos() * 100.0;
    let dy = angle_degrees.to_radians().sin() * 100.0;
    track(id, &[(x - dx, -dy), (x + dx, dy)])
}

#[test]
fn perpendicular_crossing_reports_ninety_degrees() {
    let r = route(&[(0.0, 0.0), (200.0, 0.0)]);
    let analysis = analyze_crossings(&r, &[angled_track(1, 100.0, 90.0)]);
    assert!(analysis.crosses_track);
    assert!((analysis.primary_angle_degrees.unwrap() - 90.0).abs() < 1e-6);
}

#[test]
fn parallel_track_reports_no_crossing() {
    let r = route(&[(0.0, 0.0), (200.0, 0.0)]);
    let analysis = analyze_crossings(&r, &[track(1, &[(0.0, 25.0), (200.0, 25.0)])]);
    assert!(!analysis.crosses_track);
    assert!(analysis.primary_angle_degrees.is_none());
}

#[test]
fn reported_angles_always_lie_in_the_acute_range() {
    let r = route(&[(0.0, 0.0), (200.0, 0.0)]);
    for degrees in [10.0, 30.0, 45.0, 60.0, 89.0, 91.0, 120.0, 150.0, 170.0] {
        let analysis = analyze_crossings(&r, &[angled_track(1, 100.0, degrees)]);
        let angle = analysis.primary_angle_degrees.unwrap();
        assert!((0.0..=90.0).contains(&angle), "angle {angle} for {degrees}°");
        let expected = if degrees > 90.0 { 180.0 - degrees } else { degrees };
        assert!((angle - expected).abs() < 1e-6, "angle {angle} for {degrees}°");
    }
}

#[test]
fn thirty_and_one_fifty_normalize_to_the_same_angle() {
    let r = route(&[(0.0, 0.0), (200.0, 0.0)]);
    let low = analyze_crossings(&r, &[angled_track(1, 100.0, 30.0)]);
    let high = analyze_crossings(&r, &[angled_track(1, 100.0, 150.0)]);
    assert!((low.primary_angle_degrees.unwrap() - 30.0).abs() < 1e-6);
    assert!((high.primary_angle_degrees.unwrap() - 30.0).abs() < 1e-6);
}

#[test]
fn primary_angle_favors_the_perpendicular_crossing() {
    let r = route(&[(0.0, 0.0), (600.0, 0.0)]);
    let analysis = analyze_crossings(
        &r,
        &[
            angled_track(1, 100.0, 40.0),
            angled_track(2, 300.0, 88.0),
            angled_track(3, 500.0, 120.0),
        ],
    );
    assert_eq!(analysis.angles_degrees.len(), 3);
    assert!((analysis.primary_angle_degrees.unwrap() - 88.0).abs() < 1e-6);
}

#[test]
fn every_crossed_track_contributes_one_angle() {
    let r = route(&[(0.0, 0.0), (400.0, 0.0)]);
    let analysis = analyze_crossings(
        &r,
        &[
            angled_track(1, 100.0, 90.0),
            angled_track(2, 300.0, 45.0),
            track(3, &[(0.0, 80.0), (400.0, 80.0)]),
        ],
    );
    assert_eq!(analysis.angles_degrees.len(), 2);
}
