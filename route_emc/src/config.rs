//! Fixed RLN00398 compliance thresholds and the spatial query profile.

use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Permitted crossing-angle window in degrees.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct AngleWindow {
    pub min_degrees: f64,
    pub max_degrees: f64,
}

/// Clearance criteria from RLN00398.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ComplianceConfig {
    pub crossing_angle: AngleWindow,
    /// Ceiling on the fault clearing time in milliseconds.
    pub fault_clearing_time_max_ms: f64,
    /// Non-crossing distance to the outermost track, default electrification.
    pub non_crossing_distance_m: f64,
    /// Non-crossing distance on 25 kV / 50 Hz electrified lines.
    pub non_crossing_distance_25kv_m: f64,
    /// Non-crossing distance for cables below 35 kV.
    pub low_voltage_distance_m: f64,
    pub technical_room_distance_m: f64,
    pub joint_distance_m: f64,
    pub mast_distance_m: f64,
}

impl Default for ComplianceConfig {
    fn default() -> Self {
        Self {
            crossing_angle: AngleWindow {
                min_degrees: 80.0,
                max_degrees: 100.0,
            },
            fault_clearing_time_max_ms: 100.0,
            non_crossing_distance_m: 700.0,
            non_crossing_distance_25kv_m: 11.0,
            low_voltage_distance_m: 11.0,
            technical_room_distance_m: 20.0,
            joint_distance_m: 31.0,
            mast_distance_m: 31.0,
        }
    }
}

/// Search buffers and limits for the reference-layer queries.
///
/// The buffers are deliberately generous: the backing layers are remote and
/// paged, so the search window must be wide enough that the true
/// minimum-distance feature is always inside the candidate set.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SpatialQueryConfig {
    pub track_buffer_m: f64,
    pub technical_room_buffer_m: f64,
    pub earthing_buffer_m: f64,
    /// Radius for per-point nearest-track lookups.
    pub nearest_track_radius_m: f64,
    /// Tolerance for snapping drawn points onto reference features.
    pub snap_tolerance_m: f64,
    /// Half of the physical track envelope, subtracted from centerline
    /// distances.
    pub track_width_adjustment_m: f64,
    pub query_timeout: Duration,
}

impl Default for SpatialQueryConfig {
    fn default() -> Self {
        Self {
            track_buffer_m: 10_000.0,
            technical_room_buffer_m: 10_000.0,
            earthing_buffer_m: 50.0,
            nearest_track_radius_m: 200.0,
            snap_tolerance_m: 50.0,
            track_width_adjustment_m: 1.5,
            query_timeout: Duration::from_secs(10),
        }
    }
}

/// Complete engine configuration, injected rather than global.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct EngineConfig {
    pub compliance: ComplianceConfig,
    pub spatial: SpatialQueryConfig,
}
