use std::time::Duration;

use thiserror::Error;

use crate::assets::AssetPointKind;
use crate::route::{InfrastructureType, RouteId};

/// Failures while transforming between coordinate reference systems.
#[derive(Debug, Error)]
pub enum CrsError {
    #[error("cannot transform coordinates from {from} to {to}")]
    Transform { from: String, to: String },
    #[error("{0} is a geographic CRS; distances require a planar metric CRS")]
    GeographicCrs(String),
}

/// Failures reported by a reference layer query.
#[derive(Debug, Error)]
pub enum LayerError {
    #[error("layer query failed: {0}")]
    Query(String),
    #[error("layer query timed out after {0:?}")]
    Timeout(Duration),
}

/// Structural problems with routes and asset point placement.
#[derive(Debug, Error)]
pub enum RouteError {
    #[error("a route needs at least two vertices (got {0})")]
    TooFewVertices(usize),
    #[error("unknown route {0}")]
    UnknownRoute(RouteId),
    #[error("{kind} points cannot be placed on a {infrastructure} route")]
    KindMismatch {
        kind: AssetPointKind,
        infrastructure: InfrastructureType,
    },
    #[error("point could not be projected onto the route path")]
    OffRoute,
}

/// Failures of session operations that touch route geometry.
#[derive(Debug, Error)]
pub enum EngineError {
    #[error(transparent)]
    Route(#[from] RouteError),
    #[error(transparent)]
    Crs(#[from] CrsError),
}

/// Failures of the route evaluation entry point.
#[derive(Debug, Error)]
pub enum EvaluateError {
    #[error(transparent)]
    Route(#[from] RouteError),
    #[error(transparent)]
    Crs(#[from] CrsError),
    #[error("an evaluation is already in progress for route {0}")]
    InProgress(RouteId),
    #[error("route {0} changed while the evaluation was running; result discarded")]
    Superseded(RouteId),
}
