use std::collections::HashMap;
use std::fmt;

use geo::LineString;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::crs::Crs;
use crate::error::{CrsError, RouteError};
use crate::geometry::{self, MetricLine};
use crate::rules::ComplianceResult;

/// Nominal voltage assumed when none is entered.
pub const DEFAULT_VOLTAGE_KV: f64 = 110.0;

/// Identifier of a drawn route.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct RouteId(Uuid);

impl RouteId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for RouteId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for RouteId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

/// Kind of high-voltage infrastructure a route represents.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum InfrastructureType {
    Cable,
    Overhead,
}

impl fmt::Display for InfrastructureType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            InfrastructureType::Cable => f.write_str("cable"),
            InfrastructureType::Overhead => f.write_str("overhead"),
        }
    }
}

/// Railway electrification system along the route's surroundings.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ElectrifiedSystem {
    #[serde(rename = "standard")]
    Standard,
    #[serde(rename = "25kv_50hz")]
    TwentyFiveKv50Hz,
}

/// User-editable engineering parameters attached to a route.
///
/// Every evaluation input is optional; rules that miss their input report
/// "not evaluated" rather than assuming a value.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RouteMetadata {
    pub infrastructure_type: InfrastructureType,
    pub voltage_kv: Option<f64>,
    pub electrified_system: ElectrifiedSystem,
    pub fault_clearing_time_ms: Option<f64>,
    pub has_double_guying: Option<bool>,
    pub has_bored_crossing: Option<bool>,
    pub min_joint_distance_m: Option<f64>,
    pub min_mast_distance_m: Option<f64>,
    pub notes: String,
}

impl Default for RouteMetadata {
    fn default() -> Self {
        Self {
            infrastructure_type: InfrastructureType::Cable,
            voltage_kv: None,
            electrified_system: ElectrifiedSystem::Standard,
            fault_clearing_time_ms: None,
            has_double_guying: None,
            has_bored_crossing: None,
            min_joint_distance_m: None,
            min_mast_distance_m: None,
            notes: String::new(),
        }
    }
}

fn finite(value: Option<f64>) -> Option<f64> {
    value.filter(|v| v.is_finite())
}

impl RouteMetadata {
    /// Nominal voltage with the 110 kV default applied.
    pub fn effective_voltage_kv(&self) -> f64 {
        finite(self.voltage_kv).unwrap_or(DEFAULT_VOLTAGE_KV)
    }

    /// Copy with non-finite numeric fields treated as unset.
    pub fn sanitized(&self) -> Self {
        Self {
            voltage_kv: finite(self.voltage_kv),
            fault_clearing_time_ms: finite(self.fault_clearing_time_ms),
            min_joint_distance_m: finite(self.min_joint_distance_m),
            min_mast_distance_m: finite(self.min_mast_distance_m),
            ..self.clone()
        }
    }
}

/// Route polyline tagged with its source CRS.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RouteGeometry {
    line: LineString<f64>,
    crs: Crs,
}

impl RouteGeometry {
    /// A route polyline needs at least two vertices; drawing finalization is
    /// refused below that.
    pub fn new(line: LineString<f64>, crs: Crs) -> Result<Self, RouteError> {
        if line.0.len() < 2 {
            return Err(RouteError::TooFewVertices(line.0.len()));
        }
        Ok(Self { line, crs })
    }

    pub fn line_string(&self) -> &LineString<f64> {
        &self.line
    }

    pub fn crs(&self) -> &Crs {
        &self.crs
    }

    /// Reprojects the polyline into the given planar metric CRS.
    ///
    /// Geographic targets are refused: distance math is undefined in degrees.
    pub fn to_metric(&self, target: &Crs) -> Result<MetricLine, CrsError> {
        if target.is_geographic() {
            return Err(CrsError::GeographicCrs(target.definition().to_string()));
        }
        if &self.crs == target {
            return Ok(MetricLine::new(self.line.clone()));
        }
        self.crs
            .transform_line_string(target, &self.line)
            .map(MetricLine::new)
            .ok_or_else(|| CrsError::Transform {
                from: self.crs.definition().to_string(),
                to: target.definition().to_string(),
            })
    }

    /// Derived route length in metres.
    pub fn length_m(&self) -> f64 {
        geometry::route_length_m(&self.line, &self.crs)
    }
}

/// A drawn candidate route with metadata and a cached evaluation result.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Route {
    pub id: RouteId,
    pub name: String,
    geometry: RouteGeometry,
    metadata: RouteMetadata,
    compliance: Option<ComplianceResult>,
    version: u64,
}

impl Route {
    pub fn new(name: &str, geometry: RouteGeometry, metadata: RouteMetadata) -> Self {
        Self {
            id: RouteId::new(),
            name: name.to_string(),
            geometry,
            metadata,
            compliance: None,
            version: 0,
        }
    }

    pub fn geometry(&self) -> &RouteGeometry {
        &self.geometry
    }

    pub fn metadata(&self) -> &RouteMetadata {
        &self.metadata
    }

    /// Cached evaluation result; `None` whenever geometry or metadata changed
    /// since the last evaluation.
    pub fn compliance(&self) -> Option<&ComplianceResult> {
        self.compliance.as_ref()
    }

    /// Monotonic counter identifying the current geometry/metadata state.
    pub fn version(&self) -> u64 {
        self.version
    }

    pub fn length_m(&self) -> f64 {
        self.geometry.length_m()
    }

    pub(crate) fn set_geometry(&mut self, geometry: RouteGeometry) {
        self.geometry = geometry;
        self.version += 1;
        self.compliance = None;
    }

    pub(crate) fn set_metadata(&mut self, metadata: RouteMetadata) {
        self.metadata = metadata;
        self.version += 1;
        self.compliance = None;
    }

    pub(crate) fn set_compliance(&mut self, result: ComplianceResult) {
        self.compliance = Some(result);
    }
}

/// In-memory collection of routes for one editing session.
#[derive(Debug, Default)]
pub struct RouteStore {
    routes: HashMap<RouteId, Route>,
}

impl RouteStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a freshly drawn route and returns its id.
    pub fn create(&mut self, name: &str, geometry: RouteGeometry, metadata: RouteMetadata) -> RouteId {
        let route = Route::new(name, geometry, metadata);
        let id = route.id;
        self.routes.insert(id, route);
        id
    }

    pub fn get(&self, id: RouteId) -> Option<&Route> {
        self.routes.get(&id)
    }

    pub(crate) fn get_mut(&mut self, id: RouteId) -> Option<&mut Route> {
        self.routes.get_mut(&id)
    }

    pub fn remove(&mut self, id: RouteId) -> Option<Route> {
        self.routes.remove(&id)
    }

    /// Replaces a route's polyline, invalidating its cached compliance.
    pub fn set_geometry(&mut self, id: RouteId, geometry: RouteGeometry) -> Result<(), RouteError> {
        let route = self.routes.get_mut(&id).ok_or(RouteError::UnknownRoute(id))?;
        route.set_geometry(geometry);
        Ok(())
    }

    /// Replaces a route's metadata, invalidating its cached compliance.
    pub fn set_metadata(&mut self, id: RouteId, metadata: RouteMetadata) -> Result<(), RouteError> {
        let route = self.routes.get_mut(&id).ok_or(RouteError::UnknownRoute(id))?;
        route.set_metadata(metadata);
        Ok(())
    }

    pub fn iter(&self) -> impl Iterator<Item = &Route> {
        self.routes.values()
    }

    pub fn len(&self) -> usize {
        self.routes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.routes.is_empty()
    }

    pub fn clear(&mut self) {
        self.routes.clear();
    }
}
