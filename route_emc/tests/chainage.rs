use geo::{LineString, Point};
use route_emc::assets::{AssetPoint, AssetPointKind, AssetPointStore};
use route_emc::chainage::{calculate_chainage, position_at_chainage};
use route_emc::config::SpatialQueryConfig;
use route_emc::geometry::MetricLine;
use route_emc::layers::InMemoryLayer;
use route_emc::route::RouteId;

fn route(coords: &[(f64, f64)]) -> MetricLine {
    MetricLine::new(LineString::from(coords.to_vec()))
}

#[test]
fn midpoint_round_trip() {
    let r = route(&[(0.0, 0.0), (500.0, 0.0)]);
    let length = r.length_m();
    let result = calculate_chainage(&r, Point::new(250.0, 12.0)).unwrap();
    assert!((result.chainage_m - length / 2.0).abs() < 1e-9);
    assert!((result.snapped.x() - 250.0).abs() < 1e-9);
    assert!(result.snapped.y().abs() < 1e-9);

    let back = position_at_chainage(&r, result.chainage_m).unwrap();
    assert!((back.x() - result.snapped.x()).abs() < 1e-9);
    assert!((back.y() - result.snapped.y()).abs() < 1e-9);
}

#[test]
fn chainage_beyond_route_clamps_to_final_vertex() {
    let r = route(&[(0.0, 0.0), (100.0, 0.0), (100.0, 50.0)]);
    let clamped = position_at_chainage(&r, 1000.0).unwrap();
    assert!((clamped.x() - 100.0).abs() < 1e-9);
    assert!((clamped.y() - 50.0).abs() < 1e-9);
}

#[tokio::test]
async fn resnap_is_idempotent() {
    let route_id = RouteId::new();
    let mut store = AssetPointStore::new();
    for chainage in [30.0, 110.0, 180.0] {
        store.add_point(AssetPoint::new(
            route_id,
            AssetPointKind::Joint,
            chainage,
            Point::new(chainage, 0.0),
            Some(100.0),
            None,
        ));
    }

    let edited = route(&[(0.0, 0.0), (80.0, 60.0), (160.0, 0.0)]);
    let tracks = InMemoryLayer::from_lines(vec![LineString::from(vec![
        (0.0, 120.0),
        (200.0, 120.0),
    ])]);
    let config = SpatialQueryConfig {
        nearest_track_radius_m: 500.0,
        ..SpatialQueryConfig::default()
    };

    let first = store
        .resnap_to_route(route_id, &edited, Some(&tracks), &config)
        .await;
    let second = store
        .resnap_to_route(route_id, &edited, Some(&tracks), &config)
        .await;

    assert_eq!(first.len(), second.len());
    for (a, b) in first.iter().zip(second.iter()) {
        assert!((a.position.x() - b.position.x()).abs() < 1e-9);
        assert!((a.position.y() - b.position.y()).abs() < 1e-9);
        assert_eq!(a.distance_to_track_m.is_some(), b.distance_to_track_m.is_some());
        if let (Some(da), Some(db)) = (a.distance_to_track_m, b.distance_to_track_m) {
            assert!((da - db).abs() < 1e-9);
        }
        assert_eq!(a.compliant, b.compliant);
    }
}

#[tokio::test]
async fn resnap_without_layer_keeps_prior_distances() {
    let route_id = RouteId::new();
    let mut store = AssetPointStore::new();
    store.add_point(AssetPoint::new(
        route_id,
        AssetPointKind::Earthing,
        50.0,
        Point::new(50.0, 0.0),
        Some(45.0),
        Some(3),
    ));

    let edited = route(&[(0.0, 10.0), (100.0, 10.0)]);
    let updated = store
        .resnap_to_route(route_id, &edited, None, &SpatialQueryConfig::default())
        .await;
    assert_eq!(updated.len(), 1);
    assert!((updated[0].position.y() - 10.0).abs() < 1e-9);
    assert_eq!(updated[0].distance_to_track_m, Some(45.0));
    assert_eq!(updated[0].nearest_track_id, Some(3));
    assert!(updated[0].compliant);
}

#[tokio::test]
async fn resnap_clamps_points_past_the_shortened_route() {
    let route_id = RouteId::new();
    let mut store = AssetPointStore::new();
    store.add_point(AssetPoint::new(
        route_id,
        AssetPointKind::Joint,
        180.0,
        Point::new(180.0, 0.0),
        None,
        None,
    ));

    let shortened = route(&[(0.0, 0.0), (100.0, 0.0)]);
    let updated = store
        .resnap_to_route(route_id, &shortened, None, &SpatialQueryConfig::default())
        .await;
    assert!((updated[0].position.x() - 100.0).abs() < 1e-9);
    // Chainage is preserved even while the position is clamped.
    assert!((updated[0].chainage_m - 180.0).abs() < 1e-9);
}
