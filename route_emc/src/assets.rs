use std::collections::HashMap;
use std::fmt;

use chrono::{DateTime, Utc};
use geo::Point;
use log::warn;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::chainage::position_at_chainage;
use crate::config::SpatialQueryConfig;
use crate::geometry::MetricLine;
use crate::layers::FeatureLayer;
use crate::route::RouteId;
use crate::spatial;

/// Closed set of point asset kinds placed along a route.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AssetPointKind {
    Joint,
    Earthing,
    Mast,
}

impl AssetPointKind {
    /// Minimum clearance between this kind of point and the nearest track.
    pub fn minimum_clearance_m(self) -> f64 {
        match self {
            AssetPointKind::Joint | AssetPointKind::Earthing | AssetPointKind::Mast => 31.0,
        }
    }
}

impl fmt::Display for AssetPointKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            AssetPointKind::Joint => "joint",
            AssetPointKind::Earthing => "earthing",
            AssetPointKind::Mast => "mast",
        };
        f.write_str(name)
    }
}

/// Whether a point at `distance_m` from the nearest track satisfies the
/// clearance for its kind.  Unknown distances are never compliant.
pub fn validate_compliance(distance_m: Option<f64>, kind: AssetPointKind) -> bool {
    matches!(distance_m, Some(d) if d >= kind.minimum_clearance_m())
}

/// A joint, earthing point or mast registered on a route.
///
/// `compliant` is a pure function of `distance_to_track_m` and the kind's
/// clearance; the two are never set independently.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AssetPoint {
    pub id: Uuid,
    pub route_id: RouteId,
    pub kind: AssetPointKind,
    pub chainage_m: f64,
    /// Snapped location in the working metric CRS.
    pub position: Point<f64>,
    pub distance_to_track_m: Option<f64>,
    pub nearest_track_id: Option<u64>,
    pub compliant: bool,
    pub created_at: DateTime<Utc>,
}

impl AssetPoint {
    pub fn new(
        route_id: RouteId,
        kind: AssetPointKind,
        chainage_m: f64,
        position: Point<f64>,
        distance_to_track_m: Option<f64>,
        nearest_track_id: Option<u64>,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            route_id,
            kind,
            chainage_m,
            position,
            distance_to_track_m,
            nearest_track_id,
            compliant: validate_compliance(distance_to_track_m, kind),
            created_at: Utc::now(),
        }
    }

    /// Updates the track distance and the derived compliance flag together.
    pub fn set_track_distance(&mut self, distance_m: Option<f64>, nearest_track_id: Option<u64>) {
        self.distance_to_track_m = distance_m;
        self.nearest_track_id = nearest_track_id;
        self.compliant = validate_compliance(distance_m, self.kind);
    }
}

/// Counting aggregate over the points of one kind on a route.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct KindComplianceSummary {
    pub total: usize,
    pub compliant: usize,
    pub violations: usize,
    pub min_distance_m: Option<f64>,
    pub has_violations: bool,
    /// True only when at least one point exists and none violates; a route
    /// with zero points of a kind is "no data", not compliant.
    pub all_compliant: bool,
}

/// In-memory registry of asset points keyed by route, each list kept sorted
/// by chainage.
#[derive(Debug, Default)]
pub struct AssetPointStore {
    points: HashMap<RouteId, Vec<AssetPoint>>,
}

impl AssetPointStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a point to its route, keeping the list sorted by chainage.
    pub fn add_point(&mut self, point: AssetPoint) {
        let points = self.points.entry(point.route_id).or_default();
        points.push(point);
        points.sort_by(|a, b| a.chainage_m.total_cmp(&b.chainage_m));
    }

    /// Removes a point by id; reports a miss and returns `false` when absent.
    pub fn remove_point(&mut self, route_id: RouteId, point_id: Uuid) -> bool {
        let Some(points) = self.points.get_mut(&route_id) else {
            warn!("no asset points stored for route {route_id}");
            return false;
        };
        let before = points.len();
        points.retain(|p| p.id != point_id);
        let removed = points.len() < before;
        if !removed {
            warn!("asset point {point_id} not found on route {route_id}");
        }
        removed
    }

    pub fn points_for_route(&self, route_id: RouteId) -> &[AssetPoint] {
        self.points.get(&route_id).map(Vec::as_slice).unwrap_or(&[])
    }

    /// Drops every point of a route; returns how many were removed.
    pub fn clear_route(&mut self, route_id: RouteId) -> usize {
        self.points.remove(&route_id).map(|p| p.len()).unwrap_or(0)
    }

    pub fn clear(&mut self) {
        self.points.clear();
    }

    /// Minimum track distance across the route's points of one kind; `None`
    /// when no point of that kind has a known distance.
    pub fn min_distance_for_kind(&self, route_id: RouteId, kind: AssetPointKind) -> Option<f64> {
        self.points_for_route(route_id)
            .iter()
            .filter(|p| p.kind == kind)
            .filter_map(|p| p.distance_to_track_m)
            .min_by(f64::total_cmp)
    }

    pub fn compliance_summary_for_kind(
        &self,
        route_id: RouteId,
        kind: AssetPointKind,
    ) -> KindComplianceSummary {
        let points: Vec<&AssetPoint> = self
            .points_for_route(route_id)
            .iter()
            .filter(|p| p.kind == kind)
            .collect();
        let total = points.len();
        let compliant = points.iter().filter(|p| p.compliant).count();
        let violations = total - compliant;
        KindComplianceSummary {
            total,
            compliant,
            violations,
            min_distance_m: self.min_distance_for_kind(route_id, kind),
            has_violations: violations > 0,
            all_compliant: total > 0 && violations == 0,
        }
    }

    /// Re-projects the route's points onto an edited geometry, preserving
    /// their chainage.
    ///
    /// A chainage beyond the new route length clamps to the final vertex.
    /// When a tracks layer is supplied, the track distance and compliance of
    /// every moved point are refreshed; otherwise they keep their prior
    /// values.  A point that cannot be re-snapped is retained unchanged.
    pub async fn resnap_to_route(
        &mut self,
        route_id: RouteId,
        new_geometry: &MetricLine,
        tracks: Option<&dyn FeatureLayer>,
        config: &SpatialQueryConfig,
    ) -> Vec<AssetPoint> {
        let Some(points) = self.points.get_mut(&route_id) else {
            return Vec::new();
        };
        for point in points.iter_mut() {
            let Some(position) = position_at_chainage(new_geometry, point.chainage_m) else {
                warn!(
                    "could not re-snap {} {} at chainage {:.1} m",
                    point.kind, point.id, point.chainage_m
                );
                continue;
            };
            point.position = position;
            if let Some(layer) = tracks {
                let nearest = spatial::query_nearest_track(
                    position,
                    layer,
                    config.nearest_track_radius_m,
                    config.query_timeout,
                )
                .await;
                point.set_track_distance(nearest.distance_m, nearest.feature_id);
            }
        }
        points.clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::layers::InMemoryLayer;
    use geo::LineString;

    fn point(route_id: RouteId, kind: AssetPointKind, chainage: f64, distance: Option<f64>) -> AssetPoint {
        AssetPoint::new(route_id, kind, chainage, Point::new(chainage, 0.0), distance, None)
    }

    #[test]
    fn points_stay_sorted_by_chainage() {
        let route_id = RouteId::new();
        let mut store = AssetPointStore::new();
        store.add_point(point(route_id, AssetPointKind::Joint, 80.0, Some(40.0)));
        store.add_point(point(route_id, AssetPointKind::Joint, 20.0, Some(40.0)));
        store.add_point(point(route_id, AssetPointKind::Joint, 50.0, Some(40.0)));
        let chainages: Vec<f64> = store
            .points_for_route(route_id)
            .iter()
            .map(|p| p.chainage_m)
            .collect();
        assert_eq!(chainages, vec![20.0, 50.0, 80.0]);
    }

    #[test]
    fn remove_reports_misses() {
        let route_id = RouteId::new();
        let mut store = AssetPointStore::new();
        let p = point(route_id, AssetPointKind::Joint, 10.0, None);
        let id = p.id;
        store.add_point(p);
        assert!(store.remove_point(route_id, id));
        assert!(!store.remove_point(route_id, id));
        assert!(!store.remove_point(RouteId::new(), id));
    }

    #[test]
    fn compliance_follows_distance() {
        assert!(validate_compliance(Some(31.0), AssetPointKind::Joint));
        assert!(!validate_compliance(Some(30.9), AssetPointKind::Mast));
        assert!(!validate_compliance(None, AssetPointKind::Earthing));
    }

    #[test]
    fn min_distance_ignores_other_kinds_and_unknowns() {
        let route_id = RouteId::new();
        let mut store = AssetPointStore::new();
        store.add_point(point(route_id, AssetPointKind::Joint, 10.0, Some(45.0)));
        store.add_point(point(route_id, AssetPointKind::Joint, 20.0, None));
        store.add_point(point(route_id, AssetPointKind::Earthing, 30.0, Some(5.0)));
        assert_eq!(
            store.min_distance_for_kind(route_id, AssetPointKind::Joint),
            Some(45.0)
        );
        assert_eq!(
            store.min_distance_for_kind(route_id, AssetPointKind::Mast),
            None
        );
    }

    #[test]
    fn zero_points_is_no_data_not_compliance() {
        let store = AssetPointStore::new();
        let summary = store.compliance_summary_for_kind(RouteId::new(), AssetPointKind::Joint);
        assert_eq!(summary.total, 0);
        assert!(!summary.all_compliant);
        assert!(!summary.has_violations);
    }

    #[tokio::test]
    async fn resnap_refreshes_track_distance() {
        let route_id = RouteId::new();
        let mut store = AssetPointStore::new();
        store.add_point(point(route_id, AssetPointKind::Joint, 50.0, Some(100.0)));

        let new_geometry = MetricLine::new(LineString::from(vec![(0.0, 0.0), (200.0, 0.0)]));
        let tracks = InMemoryLayer::from_lines(vec![LineString::from(vec![
            (0.0, 20.0),
            (200.0, 20.0),
        ])]);
        let updated = store
            .resnap_to_route(
                route_id,
                &new_geometry,
                Some(&tracks),
                &SpatialQueryConfig::default(),
            )
            .await;
        assert_eq!(updated.len(), 1);
        assert!((updated[0].position.x() - 50.0).abs() < 1e-9);
        assert!((updated[0].distance_to_track_m.unwrap() - 20.0).abs() < 1e-9);
        assert!(!updated[0].compliant);
    }
}
