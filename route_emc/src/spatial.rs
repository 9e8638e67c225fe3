use std::time::Duration;

use geo::{Point, Rect};
use log::warn;

use crate::config::SpatialQueryConfig;
use crate::geometry::{self, MetricLine};
use crate::layers::{Feature, FeatureLayer};

/// Outcome of a nearest-track lookup around a point.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct NearestTrack {
    pub distance_m: Option<f64>,
    pub feature_id: Option<u64>,
}

impl NearestTrack {
    fn none() -> Self {
        Self {
            distance_m: None,
            feature_id: None,
        }
    }
}

/// Per-earthing-point clearance to the nearest track.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct EarthingClearance {
    pub feature_id: u64,
    pub distance_to_track_m: Option<f64>,
    pub compliant: bool,
}

async fn query_features(
    layer: &dyn FeatureLayer,
    window: Rect<f64>,
    timeout: Duration,
) -> Vec<Feature> {
    match tokio::time::timeout(timeout, layer.query_intersecting(window)).await {
        Ok(Ok(features)) => features,
        Ok(Err(err)) => {
            warn!("reference layer query failed: {err}");
            Vec::new()
        }
        Err(_) => {
            warn!("reference layer query timed out after {timeout:?}");
            Vec::new()
        }
    }
}

/// Fetches the features of `layer` inside the search buffer around the route.
///
/// Failures and timeouts degrade to an empty result so that dependent rules
/// report "not evaluated" instead of aborting the evaluation.
pub async fn fetch_features_near_route(
    route: &MetricLine,
    layer: &dyn FeatureLayer,
    buffer_m: f64,
    timeout: Duration,
) -> Vec<Feature> {
    let Some(window) = geometry::search_window(route.line_string(), buffer_m) else {
        return Vec::new();
    };
    query_features(layer, window, timeout).await
}

/// Minimum planar distance from the full route geometry to any of `features`,
/// reduced by `adjustment_m` and clamped at zero.
///
/// Returns `None` when no feature yields a finite distance; missing data is
/// "distance unknown", never zero.
pub fn min_distance_to_features(
    route: &MetricLine,
    features: &[Feature],
    adjustment_m: f64,
) -> Option<f64> {
    let mut minimum = f64::INFINITY;
    for feature in features {
        let distance = feature.geometry.min_distance_to_line(route);
        if distance < minimum {
            minimum = distance;
        }
    }
    if minimum.is_finite() {
        Some((minimum - adjustment_m).max(0.0))
    } else {
        None
    }
}

/// Minimum distance from the route to any feature of `layer` within
/// `buffer_m`.
pub async fn min_distance_to_layer(
    route: &MetricLine,
    layer: &dyn FeatureLayer,
    buffer_m: f64,
    adjustment_m: f64,
    timeout: Duration,
) -> Option<f64> {
    let features = fetch_features_near_route(route, layer, buffer_m, timeout).await;
    min_distance_to_features(route, &features, adjustment_m)
}

/// Nearest track feature to a point within `radius_m`.
pub async fn query_nearest_track(
    point: Point<f64>,
    layer: &dyn FeatureLayer,
    radius_m: f64,
    timeout: Duration,
) -> NearestTrack {
    let window = geometry::point_window(point, radius_m);
    let features = query_features(layer, window, timeout).await;
    let mut best: Option<(f64, u64)> = None;
    for feature in &features {
        let distance = feature.geometry.min_distance_to_point(point);
        if best.map_or(true, |(current, _)| distance < current) {
            best = Some((distance, feature.id));
        }
    }
    match best {
        Some((distance, id)) => NearestTrack {
            distance_m: Some(distance),
            feature_id: Some(id),
        },
        None => NearestTrack::none(),
    }
}

/// Snaps `point` to the closest location on the nearest feature of `layer`
/// within `tolerance_m`; `None` when nothing is in range.
pub async fn snap_to_layer(
    point: Point<f64>,
    layer: &dyn FeatureLayer,
    tolerance_m: f64,
    timeout: Duration,
) -> Option<Point<f64>> {
    let window = geometry::point_window(point, tolerance_m);
    let features = query_features(layer, window, timeout).await;
    let mut best: Option<(f64, Point<f64>)> = None;
    for feature in &features {
        let Some(candidate) = feature.geometry.closest_point_to(point) else {
            continue;
        };
        let distance = feature.geometry.min_distance_to_point(point);
        if distance <= tolerance_m && best.map_or(true, |(current, _)| distance < current) {
            best = Some((distance, candidate));
        }
    }
    best.map(|(_, snapped)| snapped)
}

/// Surveys the earthing points near the route against the track clearance.
///
/// Earthing features without a determinable track distance are reported as
/// non-compliant: an unknown distance must never read as cleared.
pub async fn earthing_clearance_survey(
    route: &MetricLine,
    earthing_layer: &dyn FeatureLayer,
    track_features: &[Feature],
    clearance_m: f64,
    config: &SpatialQueryConfig,
) -> Vec<EarthingClearance> {
    let earthing = fetch_features_near_route(
        route,
        earthing_layer,
        config.earthing_buffer_m,
        config.query_timeout,
    )
    .await;

    earthing
        .iter()
        .map(|feature| {
            let anchor = feature_anchor(feature);
            let mut minimum = f64::INFINITY;
            if let Some(location) = anchor {
                for track in track_features {
                    let distance = track.geometry.min_distance_to_point(location);
                    if distance < minimum {
                        minimum = distance;
                    }
                }
            }
            let distance_to_track_m = minimum.is_finite().then_some(minimum);
            EarthingClearance {
                feature_id: feature.id,
                distance_to_track_m,
                compliant: distance_to_track_m.map_or(false, |d| d >= clearance_m),
            }
        })
        .collect()
}

fn feature_anchor(feature: &Feature) -> Option<Point<f64>> {
    match &feature.geometry {
        crate::layers::FeatureGeometry::Point(p) => Some(*p),
        other => other
            .bounding_rect()
            .map(|rect| Point::new(rect.center().x, rect.center().y)),
    }
}
