//! The fixed RLN00398 rule table and compliance aggregation.
//!
//! Each rule pairs an applicability predicate with an evaluation function,
//! both pure over a shared [`EvaluationContext`].  Adding or removing a rule
//! is a one-line change to [`RULES`].

use std::fmt;

use chrono::{DateTime, Utc};
use log::warn;
use serde::{Deserialize, Serialize};

use crate::config::ComplianceConfig;
use crate::crossing::CrossingAnalysis;
use crate::route::{ElectrifiedSystem, InfrastructureType, RouteMetadata};

/// Identifiers of the fixed rule set.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RuleId {
    CrossingAngle,
    FaultClearingTime,
    OhlDoubleGuying,
    OhlNonCrossingDistance,
    CableNonCrossingHv,
    CableNonCrossingLv,
    CableBoreCrossing,
    TechnicalRoomClearance,
    JointDistance,
    OhlMastDistance,
}

impl RuleId {
    pub fn as_str(self) -> &'static str {
        match self {
            RuleId::CrossingAngle => "CROSSING_ANGLE",
            RuleId::FaultClearingTime => "FAULT_CLEARING_TIME",
            RuleId::OhlDoubleGuying => "OHL_DOUBLE_GUYING",
            RuleId::OhlNonCrossingDistance => "OHL_NON_CROSSING_DISTANCE",
            RuleId::CableNonCrossingHv => "CABLE_NON_CROSSING_HV",
            RuleId::CableNonCrossingLv => "CABLE_NON_CROSSING_LV",
            RuleId::CableBoreCrossing => "CABLE_BORE_CROSSING",
            RuleId::TechnicalRoomClearance => "TECHNICAL_ROOM_CLEARANCE",
            RuleId::JointDistance => "JOINT_DISTANCE",
            RuleId::OhlMastDistance => "OHL_MAST_DISTANCE",
        }
    }
}

impl fmt::Display for RuleId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.pad(self.as_str())
    }
}

/// Verdict of one rule for one route.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RuleStatus {
    Pass,
    Fail,
    NotEvaluated,
    NotApplicable,
}

/// Structured numeric detail backing a rule verdict.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "kind")]
pub enum RuleMetrics {
    Angle {
        angle_degrees: f64,
        permitted_min: f64,
        permitted_max: f64,
    },
    ClearingTime {
        fault_clearing_time_ms: f64,
        limit_ms: f64,
    },
    Distance {
        minimum_distance_m: f64,
        required_distance_m: f64,
        auto_evaluated: bool,
    },
}

/// One rule's verdict with its citation and human-readable message.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RuleResult {
    pub id: RuleId,
    pub title: String,
    pub clause: String,
    pub status: RuleStatus,
    pub message: String,
    pub metrics: Option<RuleMetrics>,
}

/// Route-level verdict derived from the individual rule statuses.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OverallStatus {
    Pass,
    Fail,
    Incomplete,
    NotEvaluated,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ComplianceSummary {
    pub status: OverallStatus,
    pub pass_count: usize,
    pub fail_count: usize,
    pub pending_count: usize,
    pub not_applicable_count: usize,
    pub evaluated_at: DateTime<Utc>,
    pub infrastructure_type: InfrastructureType,
}

/// Full outcome of one evaluation run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ComplianceResult {
    pub evaluated_at: DateTime<Utc>,
    pub summary: ComplianceSummary,
    pub rules: Vec<RuleResult>,
}

/// Everything a rule needs to decide applicability and outcome.
#[derive(Debug, Clone)]
pub struct EvaluationContext {
    pub route_type: InfrastructureType,
    /// Metadata with non-finite numerics already dropped.
    pub metadata: RouteMetadata,
    pub crossing: CrossingAnalysis,
    /// Minimum route-to-track distance, track-width adjusted; `None` when no
    /// track data was available.
    pub track_distance_m: Option<f64>,
    pub technical_room_distance_m: Option<f64>,
    pub has_technical_rooms_layer: bool,
    pub config: ComplianceConfig,
}

/// Failure raised inside a rule callback; contained per rule.
#[derive(Debug, thiserror::Error)]
#[error("{0}")]
pub struct RuleError(pub String);

/// Outcome produced by a rule's evaluation function.
#[derive(Debug, Clone, PartialEq)]
pub struct RuleOutcome {
    pub status: RuleStatus,
    pub message: String,
    pub metrics: Option<RuleMetrics>,
}

impl RuleOutcome {
    fn not_evaluated(message: &str) -> Self {
        Self {
            status: RuleStatus::NotEvaluated,
            message: message.to_string(),
            metrics: None,
        }
    }
}

type AppliesFn = fn(&EvaluationContext) -> Result<bool, RuleError>;
type EvaluateFn = fn(&EvaluationContext) -> Result<RuleOutcome, RuleError>;

/// Static definition of one compliance rule.
pub struct RuleDef {
    pub id: RuleId,
    pub title: &'static str,
    pub clause: &'static str,
    pub applicable_for: &'static [InfrastructureType],
    pub not_applicable_message: &'static str,
    pub applies: AppliesFn,
    pub evaluate: EvaluateFn,
}

const BOTH: &[InfrastructureType] = &[InfrastructureType::Cable, InfrastructureType::Overhead];
const CABLE_ONLY: &[InfrastructureType] = &[InfrastructureType::Cable];
const OVERHEAD_ONLY: &[InfrastructureType] = &[InfrastructureType::Overhead];

fn always_applies(_ctx: &EvaluationContext) -> Result<bool, RuleError> {
    Ok(true)
}

fn crossing_angle_evaluate(ctx: &EvaluationContext) -> Result<RuleOutcome, RuleError> {
    let window = ctx.config.crossing_angle;
    let Some(angle) = ctx.crossing.primary_angle_degrees else {
        return Ok(RuleOutcome::not_evaluated("Unable to determine crossing angle"));
    };
    let within = angle >= window.min_degrees && angle <= window.max_degrees;
    Ok(RuleOutcome {
        status: if within { RuleStatus::Pass } else { RuleStatus::Fail },
        message: if within {
            format!("Measured crossing angle {angle:.1}°")
        } else {
            format!(
                "Crossing angle {angle:.1}° outside {}°–{}° window",
                window.min_degrees, window.max_degrees
            )
        },
        metrics: Some(RuleMetrics::Angle {
            angle_degrees: angle,
            permitted_min: window.min_degrees,
            permitted_max: window.max_degrees,
        }),
    })
}

fn fault_clearing_time_evaluate(ctx: &EvaluationContext) -> Result<RuleOutcome, RuleError> {
    let limit = ctx.config.fault_clearing_time_max_ms;
    let Some(value) = ctx.metadata.fault_clearing_time_ms else {
        return Ok(RuleOutcome::not_evaluated(
            "Provide the expected fault clearing time",
        ));
    };
    let passes = value <= limit;
    Ok(RuleOutcome {
        status: if passes { RuleStatus::Pass } else { RuleStatus::Fail },
        message: if passes {
            format!("Fault clearing time {value:.0} ms")
        } else {
            format!("Fault clearing time {value:.0} ms exceeds {limit} ms")
        },
        metrics: Some(RuleMetrics::ClearingTime {
            fault_clearing_time_ms: value,
            limit_ms: limit,
        }),
    })
}

fn double_guying_evaluate(ctx: &EvaluationContext) -> Result<RuleOutcome, RuleError> {
    let Some(value) = ctx.metadata.has_double_guying else {
        return Ok(RuleOutcome::not_evaluated(
            "Confirm whether the crossing span is double-guyed",
        ));
    };
    Ok(RuleOutcome {
        status: if value { RuleStatus::Pass } else { RuleStatus::Fail },
        message: if value {
            "Double guying confirmed".to_string()
        } else {
            "Crossing span must be double-guyed".to_string()
        },
        metrics: None,
    })
}

/// Threshold for the non-crossing separation rules, which drops sharply on
/// 25 kV / 50 Hz electrified lines.
fn non_crossing_threshold_m(ctx: &EvaluationContext) -> f64 {
    if ctx.metadata.electrified_system == ElectrifiedSystem::TwentyFiveKv50Hz {
        ctx.config.non_crossing_distance_25kv_m
    } else {
        ctx.config.non_crossing_distance_m
    }
}

fn distance_outcome(
    distance_m: Option<f64>,
    threshold_m: f64,
    fail_message: impl Fn(f64) -> String,
) -> RuleOutcome {
    let Some(distance) = distance_m else {
        return RuleOutcome::not_evaluated("Track reference data unavailable");
    };
    let passes = distance >= threshold_m;
    RuleOutcome {
        status: if passes { RuleStatus::Pass } else { RuleStatus::Fail },
        message: if passes {
            format!("Minimum horizontal distance {distance:.1} m")
        } else {
            fail_message(distance)
        },
        metrics: Some(RuleMetrics::Distance {
            minimum_distance_m: distance,
            required_distance_m: threshold_m,
            auto_evaluated: false,
        }),
    }
}

fn ohl_non_crossing_evaluate(ctx: &EvaluationContext) -> Result<RuleOutcome, RuleError> {
    let threshold = non_crossing_threshold_m(ctx);
    Ok(distance_outcome(ctx.track_distance_m, threshold, |d| {
        format!("Keep overhead line {threshold} m from outermost track (current {d:.1} m)")
    }))
}

fn cable_hv_non_crossing_evaluate(ctx: &EvaluationContext) -> Result<RuleOutcome, RuleError> {
    let threshold = non_crossing_threshold_m(ctx);
    Ok(distance_outcome(ctx.track_distance_m, threshold, |d| {
        format!("Maintain {threshold} m separation from the track (current {d:.1} m)")
    }))
}

fn cable_lv_non_crossing_evaluate(ctx: &EvaluationContext) -> Result<RuleOutcome, RuleError> {
    let threshold = ctx.config.low_voltage_distance_m;
    Ok(distance_outcome(ctx.track_distance_m, threshold, |d| {
        format!("Maintain {threshold} m separation from the track (current {d:.1} m)")
    }))
}

fn bore_crossing_evaluate(ctx: &EvaluationContext) -> Result<RuleOutcome, RuleError> {
    let Some(value) = ctx.metadata.has_bored_crossing else {
        return Ok(RuleOutcome::not_evaluated(
            "Confirm whether the crossing uses an insulated conduit",
        ));
    };
    Ok(RuleOutcome {
        status: if value { RuleStatus::Pass } else { RuleStatus::Fail },
        message: if value {
            "Bored insulated conduit confirmed".to_string()
        } else {
            "Provide insulated conduit for cable crossing".to_string()
        },
        metrics: None,
    })
}

fn technical_room_evaluate(ctx: &EvaluationContext) -> Result<RuleOutcome, RuleError> {
    let Some(distance) = ctx.technical_room_distance_m else {
        return Ok(RuleOutcome::not_evaluated(if ctx.has_technical_rooms_layer {
            "Technical room data not found near route"
        } else {
            "Technical rooms layer not configured"
        }));
    };
    let threshold = ctx.config.technical_room_distance_m;
    let passes = distance >= threshold;
    Ok(RuleOutcome {
        status: if passes { RuleStatus::Pass } else { RuleStatus::Fail },
        message: if passes {
            format!("Nearest technical room {distance:.1} m away")
        } else {
            format!("Keep ≥{threshold} m from technical rooms (current {distance:.1} m)")
        },
        metrics: Some(RuleMetrics::Distance {
            minimum_distance_m: distance,
            required_distance_m: threshold,
            auto_evaluated: false,
        }),
    })
}

/// Shared body of the joint and mast clearance rules: when the whole route
/// keeps the clearance from every track, points may sit anywhere and the rule
/// passes automatically; otherwise the user-supplied (or store-derived)
/// minimum is required.
fn point_clearance_outcome(
    ctx: &EvaluationContext,
    threshold_m: f64,
    marked_distance_m: Option<f64>,
    auto_pass_message: impl Fn(f64) -> String,
    missing_near_message: impl Fn(f64) -> String,
    missing_message: &str,
    pass_message: impl Fn(f64) -> String,
    fail_message: impl Fn(f64) -> String,
) -> RuleOutcome {
    if let Some(route_distance) = ctx.track_distance_m {
        if route_distance >= threshold_m {
            return RuleOutcome {
                status: RuleStatus::Pass,
                message: auto_pass_message(route_distance),
                metrics: Some(RuleMetrics::Distance {
                    minimum_distance_m: route_distance,
                    required_distance_m: threshold_m,
                    auto_evaluated: true,
                }),
            };
        }
    }

    let Some(marked) = marked_distance_m else {
        return RuleOutcome::not_evaluated(
            &ctx.track_distance_m
                .map(missing_near_message)
                .unwrap_or_else(|| missing_message.to_string()),
        );
    };
    let passes = marked >= threshold_m;
    RuleOutcome {
        status: if passes { RuleStatus::Pass } else { RuleStatus::Fail },
        message: if passes { pass_message(marked) } else { fail_message(marked) },
        metrics: Some(RuleMetrics::Distance {
            minimum_distance_m: marked,
            required_distance_m: threshold_m,
            auto_evaluated: false,
        }),
    }
}

fn joint_distance_evaluate(ctx: &EvaluationContext) -> Result<RuleOutcome, RuleError> {
    let threshold = ctx.config.joint_distance_m;
    Ok(point_clearance_outcome(
        ctx,
        threshold,
        ctx.metadata.min_joint_distance_m,
        |d| format!("Entire route is {d:.1} m from tracks - joints can be placed anywhere"),
        |d| format!("Route comes within {d:.1} m of tracks - mark joint locations for validation"),
        "Document minimum distance between joints/earthing and the track",
        |d| format!("Joints located {d:.1} m from track"),
        |d| format!("Ensure joints ≥{threshold} m from track (current {d:.1} m)"),
    ))
}

fn mast_distance_evaluate(ctx: &EvaluationContext) -> Result<RuleOutcome, RuleError> {
    let threshold = ctx.config.mast_distance_m;
    Ok(point_clearance_outcome(
        ctx,
        threshold,
        ctx.metadata.min_mast_distance_m,
        |d| format!("Entire route is {d:.1} m from tracks - masts can be placed anywhere"),
        |d| format!("Route comes within {d:.1} m of tracks - document minimum mast distance"),
        "Document minimum distance between masts and the track",
        |d| format!("Masts located {d:.1} m from track"),
        |d| format!("Ensure masts ≥{threshold} m from track (current {d:.1} m)"),
    ))
}

fn crosses_track(ctx: &EvaluationContext) -> Result<bool, RuleError> {
    Ok(ctx.crossing.crosses_track)
}

fn does_not_cross_track(ctx: &EvaluationContext) -> Result<bool, RuleError> {
    Ok(!ctx.crossing.crosses_track)
}

fn cable_hv_applies(ctx: &EvaluationContext) -> Result<bool, RuleError> {
    Ok(!ctx.crossing.crosses_track && ctx.metadata.effective_voltage_kv() >= 35.0)
}

fn cable_lv_applies(ctx: &EvaluationContext) -> Result<bool, RuleError> {
    Ok(!ctx.crossing.crosses_track && ctx.metadata.effective_voltage_kv() < 35.0)
}

/// The fixed rule table, in reporting order.
pub const RULES: &[RuleDef] = &[
    RuleDef {
        id: RuleId::CrossingAngle,
        title: "Crossing angle between 80° and 100°",
        clause: "§ 5.1 (1), § 5.2 (1)",
        applicable_for: BOTH,
        not_applicable_message: "Route does not cross a railway track",
        applies: crosses_track,
        evaluate: crossing_angle_evaluate,
    },
    RuleDef {
        id: RuleId::FaultClearingTime,
        title: "Fault must clear within 100 ms",
        clause: "§ 5.1 (4), § 5.2 (2)",
        applicable_for: BOTH,
        not_applicable_message: "Not applicable",
        applies: always_applies,
        evaluate: fault_clearing_time_evaluate,
    },
    RuleDef {
        id: RuleId::OhlDoubleGuying,
        title: "Crossing span is double-guyed",
        clause: "§ 5.1 (3)",
        applicable_for: OVERHEAD_ONLY,
        not_applicable_message: "Applies only to overhead crossings",
        applies: crosses_track,
        evaluate: double_guying_evaluate,
    },
    RuleDef {
        id: RuleId::OhlNonCrossingDistance,
        title: "Overhead line distance to track",
        clause: "§ 5.1 (5)",
        applicable_for: OVERHEAD_ONLY,
        not_applicable_message: "Overhead line crosses the track",
        applies: does_not_cross_track,
        evaluate: ohl_non_crossing_evaluate,
    },
    RuleDef {
        id: RuleId::CableNonCrossingHv,
        title: "≥35 kV cable distance to track",
        clause: "§ 5.2 (3)",
        applicable_for: CABLE_ONLY,
        not_applicable_message: "Cable crosses the track",
        applies: cable_hv_applies,
        evaluate: cable_hv_non_crossing_evaluate,
    },
    RuleDef {
        id: RuleId::CableNonCrossingLv,
        title: "<35 kV cable distance to track",
        clause: "§ 5.2 (4), § 5.2 (5)",
        applicable_for: CABLE_ONLY,
        not_applicable_message: "Cable crosses the track",
        applies: cable_lv_applies,
        evaluate: cable_lv_non_crossing_evaluate,
    },
    RuleDef {
        id: RuleId::CableBoreCrossing,
        title: "Bored insulated conduit for underpasses",
        clause: "§ 5.2 (7)",
        applicable_for: CABLE_ONLY,
        not_applicable_message: "Cable does not cross the track",
        applies: crosses_track,
        evaluate: bore_crossing_evaluate,
    },
    RuleDef {
        id: RuleId::TechnicalRoomClearance,
        title: "No HV infrastructure within 20 m of technical rooms",
        clause: "§ 5.1 (8), § 5.2 (6)",
        applicable_for: BOTH,
        not_applicable_message: "Not applicable",
        applies: always_applies,
        evaluate: technical_room_evaluate,
    },
    RuleDef {
        id: RuleId::JointDistance,
        title: "Joints and earthing ≥31 m from track",
        clause: "§ 5.2 (8)",
        applicable_for: CABLE_ONLY,
        not_applicable_message: "Not applicable",
        applies: always_applies,
        evaluate: joint_distance_evaluate,
    },
    RuleDef {
        id: RuleId::OhlMastDistance,
        title: "Masts ≥31 m from track",
        clause: "§ 5.1 (7)",
        applicable_for: OVERHEAD_ONLY,
        not_applicable_message: "Not applicable",
        applies: always_applies,
        evaluate: mast_distance_evaluate,
    },
];

/// Runs the rule table against the context, preserving table order.
///
/// A failing applicability check silences the rule; a failing evaluation is
/// reported as "not evaluated".  Neither aborts the batch.
pub fn run_rules(ctx: &EvaluationContext) -> Vec<RuleResult> {
    let mut results = Vec::new();
    for rule in RULES {
        if !rule.applicable_for.contains(&ctx.route_type) {
            continue;
        }
        let applies = match (rule.applies)(ctx) {
            Ok(applies) => applies,
            Err(err) => {
                warn!("applicability check failed for rule {}: {err}", rule.id);
                false
            }
        };
        if !applies {
            results.push(RuleResult {
                id: rule.id,
                title: rule.title.to_string(),
                clause: rule.clause.to_string(),
                status: RuleStatus::NotApplicable,
                message: rule.not_applicable_message.to_string(),
                metrics: None,
            });
            continue;
        }
        match (rule.evaluate)(ctx) {
            Ok(outcome) => results.push(RuleResult {
                id: rule.id,
                title: rule.title.to_string(),
                clause: rule.clause.to_string(),
                status: outcome.status,
                message: outcome.message,
                metrics: outcome.metrics,
            }),
            Err(err) => {
                warn!("failed to evaluate rule {}: {err}", rule.id);
                results.push(RuleResult {
                    id: rule.id,
                    title: rule.title.to_string(),
                    clause: rule.clause.to_string(),
                    status: RuleStatus::NotEvaluated,
                    message: err.to_string(),
                    metrics: None,
                });
            }
        }
    }
    results
}

/// Aggregates rule verdicts into the route-level status.
///
/// Fail dominates everything; a route passes only with at least one pass and
/// nothing pending; any other mix with assessable rules is incomplete.
pub fn summarize_results(
    rules: &[RuleResult],
    infrastructure_type: InfrastructureType,
) -> ComplianceSummary {
    let mut pass_count = 0;
    let mut fail_count = 0;
    let mut pending_count = 0;
    let mut not_applicable_count = 0;
    for rule in rules {
        match rule.status {
            RuleStatus::Pass => pass_count += 1,
            RuleStatus::Fail => fail_count += 1,
            RuleStatus::NotEvaluated => pending_count += 1,
            RuleStatus::NotApplicable => not_applicable_count += 1,
        }
    }

    let status = if fail_count > 0 {
        OverallStatus::Fail
    } else if pass_count > 0 && pending_count == 0 {
        OverallStatus::Pass
    } else if pass_count > 0 || pending_count > 0 {
        OverallStatus::Incomplete
    } else {
        OverallStatus::NotEvaluated
    };

    ComplianceSummary {
        status,
        pass_count,
        fail_count,
        pending_count,
        not_applicable_count,
        evaluated_at: Utc::now(),
        infrastructure_type,
    }
}
