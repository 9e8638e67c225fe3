//! Builds the evaluation context for a route and runs the rule table.

use log::debug;

use crate::config::EngineConfig;
use crate::crossing;
use crate::crs::Crs;
use crate::error::EvaluateError;
use crate::layers::ReferenceLayers;
use crate::route::Route;
use crate::rules::{self, ComplianceResult, EvaluationContext};
use crate::spatial;

/// Evaluates a route against the full rule set.
///
/// Track features are fetched once and reused for both the crossing analysis
/// and the minimum track distance; the technical-room query runs concurrently
/// with the track fetch.  Spatial failures degrade to "distance unknown" so
/// the affected rules report pending instead of aborting the run.
pub async fn evaluate_route(
    route: &Route,
    layers: &ReferenceLayers,
    config: &EngineConfig,
) -> Result<ComplianceResult, EvaluateError> {
    let metric = route.geometry().to_metric(&Crs::rd_new())?;
    let metadata = route.metadata().sanitized();
    let route_type = metadata.infrastructure_type;
    let sq = &config.spatial;

    let track_fetch = async {
        match &layers.tracks {
            Some(layer) => {
                spatial::fetch_features_near_route(
                    &metric,
                    layer.as_ref(),
                    sq.track_buffer_m,
                    sq.query_timeout,
                )
                .await
            }
            None => Vec::new(),
        }
    };
    let technical_room_fetch = async {
        match &layers.technical_rooms {
            Some(layer) => {
                spatial::min_distance_to_layer(
                    &metric,
                    layer.as_ref(),
                    sq.technical_room_buffer_m,
                    0.0,
                    sq.query_timeout,
                )
                .await
            }
            None => None,
        }
    };
    let (track_features, technical_room_distance_m) = tokio::join!(track_fetch, technical_room_fetch);

    let crossing = crossing::analyze_crossings(&metric, &track_features);
    let track_distance_m =
        spatial::min_distance_to_features(&metric, &track_features, sq.track_width_adjustment_m);

    let ctx = EvaluationContext {
        route_type,
        metadata,
        crossing,
        track_distance_m,
        technical_room_distance_m,
        has_technical_rooms_layer: layers.technical_rooms.is_some(),
        config: config.compliance,
    };
    let rule_results = rules::run_rules(&ctx);
    debug!(
        "evaluated {} rules for route {} ({route_type})",
        rule_results.len(),
        route.id
    );
    let summary = rules::summarize_results(&rule_results, route_type);
    Ok(ComplianceResult {
        evaluated_at: summary.evaluated_at,
        summary,
        rules: rule_results,
    })
}
