//! Session-scoped application state: the route and asset point stores plus
//! the per-route evaluation guard.
//!
//! All mutable state lives on an explicit [`Session`] value injected into
//! callers, so tests get isolated instances and teardown is a [`Session::clear`].

use std::collections::HashSet;

use geo::Point;

use crate::assets::{AssetPoint, AssetPointKind, AssetPointStore};
use crate::chainage;
use crate::config::EngineConfig;
use crate::crs::Crs;
use crate::error::{EngineError, EvaluateError, RouteError};
use crate::evaluator;
use crate::layers::ReferenceLayers;
use crate::route::{InfrastructureType, Route, RouteGeometry, RouteId, RouteMetadata, RouteStore};
use crate::rules::ComplianceResult;
use crate::spatial::{self, EarthingClearance, NearestTrack};

/// Snapshot of a route taken when an evaluation starts.
///
/// Running the snapshot does not borrow the session, so edits can land while
/// the spatial queries are in flight; [`Session::commit_evaluation`] then
/// decides whether the result is still valid.
pub struct EvaluationJob {
    route: Route,
}

impl EvaluationJob {
    pub fn route_id(&self) -> RouteId {
        self.route.id
    }

    pub fn version(&self) -> u64 {
        self.route.version()
    }

    pub async fn run(
        &self,
        layers: &ReferenceLayers,
        config: &EngineConfig,
    ) -> Result<ComplianceResult, EvaluateError> {
        evaluator::evaluate_route(&self.route, layers, config).await
    }
}

/// Mutable state for one editing session.
#[derive(Default)]
pub struct Session {
    routes: RouteStore,
    assets: AssetPointStore,
    evaluating: HashSet<RouteId>,
    config: EngineConfig,
}

impl Session {
    pub fn new(config: EngineConfig) -> Self {
        Self {
            routes: RouteStore::new(),
            assets: AssetPointStore::new(),
            evaluating: HashSet::new(),
            config,
        }
    }

    pub fn routes(&self) -> &RouteStore {
        &self.routes
    }

    pub fn assets(&self) -> &AssetPointStore {
        &self.assets
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// Drops every route, asset point and in-flight evaluation marker.
    pub fn clear(&mut self) {
        self.routes.clear();
        self.assets.clear();
        self.evaluating.clear();
    }

    pub fn create_route(
        &mut self,
        name: &str,
        geometry: RouteGeometry,
        metadata: RouteMetadata,
    ) -> RouteId {
        self.routes.create(name, geometry, metadata)
    }

    /// Deletes a route together with every asset point keyed by it.
    pub fn delete_route(&mut self, id: RouteId) -> Result<(), RouteError> {
        self.routes
            .remove(id)
            .ok_or(RouteError::UnknownRoute(id))?;
        self.assets.clear_route(id);
        self.evaluating.remove(&id);
        Ok(())
    }

    pub fn set_metadata(&mut self, id: RouteId, metadata: RouteMetadata) -> Result<(), RouteError> {
        self.routes.set_metadata(id, metadata)
    }

    /// Replaces a route's polyline and re-snaps its asset points onto the new
    /// geometry, refreshing track distances when a tracks layer is available.
    pub async fn update_route_geometry(
        &mut self,
        id: RouteId,
        geometry: RouteGeometry,
        layers: &ReferenceLayers,
    ) -> Result<Vec<AssetPoint>, EngineError> {
        let metric = geometry.to_metric(&Crs::rd_new())?;
        self.routes.set_geometry(id, geometry)?;
        let updated = self
            .assets
            .resnap_to_route(id, &metric, layers.tracks.as_deref(), &self.config.spatial)
            .await;
        Ok(updated)
    }

    /// Places an asset point at the location on the route nearest to `click`.
    ///
    /// Masts belong to overhead routes, joints and earthing points to cable
    /// routes; a mismatch is refused.
    pub async fn place_asset_point(
        &mut self,
        id: RouteId,
        kind: AssetPointKind,
        click: Point<f64>,
        layers: &ReferenceLayers,
    ) -> Result<AssetPoint, EngineError> {
        let route = self.routes.get(id).ok_or(RouteError::UnknownRoute(id))?;
        let infrastructure = route.metadata().infrastructure_type;
        let allowed = match kind {
            AssetPointKind::Mast => infrastructure == InfrastructureType::Overhead,
            AssetPointKind::Joint | AssetPointKind::Earthing => {
                infrastructure == InfrastructureType::Cable
            }
        };
        if !allowed {
            return Err(RouteError::KindMismatch {
                kind,
                infrastructure,
            }
            .into());
        }

        let metric = route.geometry().to_metric(&Crs::rd_new())?;
        let chainage =
            chainage::calculate_chainage(&metric, click).ok_or(RouteError::OffRoute)?;
        let nearest = match &layers.tracks {
            Some(tracks) => {
                spatial::query_nearest_track(
                    chainage.snapped,
                    tracks.as_ref(),
                    self.config.spatial.nearest_track_radius_m,
                    self.config.spatial.query_timeout,
                )
                .await
            }
            None => NearestTrack {
                distance_m: None,
                feature_id: None,
            },
        };

        let point = AssetPoint::new(
            id,
            kind,
            chainage.chainage_m,
            chainage.snapped,
            nearest.distance_m,
            nearest.feature_id,
        );
        self.assets.add_point(point.clone());
        Ok(point)
    }

    pub fn remove_asset_point(&mut self, id: RouteId, point_id: uuid::Uuid) -> bool {
        self.assets.remove_point(id, point_id)
    }

    /// Surveys existing earthing infrastructure near a route against the
    /// joint/earthing track clearance.
    ///
    /// Needs both the earthing and the tracks layer; an empty survey is
    /// returned when either is missing.
    pub async fn survey_earthing_clearances(
        &self,
        id: RouteId,
        layers: &ReferenceLayers,
    ) -> Result<Vec<EarthingClearance>, EngineError> {
        let route = self.routes.get(id).ok_or(RouteError::UnknownRoute(id))?;
        let (Some(earthing), Some(tracks)) = (&layers.earthing, &layers.tracks) else {
            return Ok(Vec::new());
        };
        let metric = route.geometry().to_metric(&Crs::rd_new())?;
        let sq = &self.config.spatial;
        let track_features = spatial::fetch_features_near_route(
            &metric,
            tracks.as_ref(),
            sq.track_buffer_m,
            sq.query_timeout,
        )
        .await;
        Ok(spatial::earthing_clearance_survey(
            &metric,
            earthing.as_ref(),
            &track_features,
            self.config.compliance.joint_distance_m,
            sq,
        )
        .await)
    }

    /// Starts an evaluation for a route, rejecting a second request while one
    /// is outstanding for the same route.
    pub fn begin_evaluation(&mut self, id: RouteId) -> Result<EvaluationJob, EvaluateError> {
        let route = self
            .routes
            .get(id)
            .ok_or(RouteError::UnknownRoute(id))?
            .clone();
        if !self.evaluating.insert(id) {
            return Err(EvaluateError::InProgress(id));
        }
        Ok(EvaluationJob { route })
    }

    /// Commits a finished evaluation onto its route.
    ///
    /// The result is discarded when the route no longer exists or its state
    /// changed since the job was started.
    pub fn commit_evaluation(
        &mut self,
        job: &EvaluationJob,
        result: ComplianceResult,
    ) -> Result<ComplianceResult, EvaluateError> {
        let id = job.route_id();
        self.evaluating.remove(&id);
        match self.routes.get_mut(id) {
            Some(route) if route.version() == job.version() => {
                route.set_compliance(result.clone());
                Ok(result)
            }
            _ => Err(EvaluateError::Superseded(id)),
        }
    }

    /// Releases the in-progress marker of a job whose run failed.
    pub fn abort_evaluation(&mut self, job: &EvaluationJob) {
        self.evaluating.remove(&job.route_id());
    }

    /// Convenience wrapper chaining begin, run and commit.
    pub async fn evaluate_route(
        &mut self,
        id: RouteId,
        layers: &ReferenceLayers,
    ) -> Result<ComplianceResult, EvaluateError> {
        let job = self.begin_evaluation(id)?;
        let config = self.config;
        match job.run(layers, &config).await {
            Ok(result) => self.commit_evaluation(&job, result),
            Err(err) => {
                self.abort_evaluation(&job);
                Err(err)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use geo::LineString;

    fn geometry(coords: &[(f64, f64)]) -> RouteGeometry {
        RouteGeometry::new(LineString::from(coords.to_vec()), Crs::rd_new()).unwrap()
    }

    fn cable_metadata() -> RouteMetadata {
        RouteMetadata {
            infrastructure_type: InfrastructureType::Cable,
            ..RouteMetadata::default()
        }
    }

    #[test]
    fn delete_cascades_to_asset_points() {
        let mut session = Session::new(EngineConfig::default());
        let id = session.create_route("A", geometry(&[(0.0, 0.0), (100.0, 0.0)]), cable_metadata());
        session.assets.add_point(AssetPoint::new(
            id,
            AssetPointKind::Joint,
            10.0,
            Point::new(10.0, 0.0),
            Some(40.0),
            None,
        ));
        assert_eq!(session.assets().points_for_route(id).len(), 1);

        session.delete_route(id).unwrap();
        assert!(session.routes().get(id).is_none());
        assert!(session.assets().points_for_route(id).is_empty());
    }

    #[test]
    fn second_evaluation_request_is_rejected() {
        let mut session = Session::new(EngineConfig::default());
        let id = session.create_route("A", geometry(&[(0.0, 0.0), (100.0, 0.0)]), cable_metadata());
        let _job = session.begin_evaluation(id).unwrap();
        assert!(matches!(
            session.begin_evaluation(id),
            Err(EvaluateError::InProgress(_))
        ));
    }

    #[tokio::test]
    async fn mast_on_cable_route_is_refused() {
        let mut session = Session::new(EngineConfig::default());
        let id = session.create_route("A", geometry(&[(0.0, 0.0), (100.0, 0.0)]), cable_metadata());
        let result = session
            .place_asset_point(
                id,
                AssetPointKind::Mast,
                Point::new(50.0, 5.0),
                &ReferenceLayers::default(),
            )
            .await;
        assert!(matches!(
            result,
            Err(EngineError::Route(RouteError::KindMismatch { .. }))
        ));
    }

    #[tokio::test]
    async fn placement_snaps_and_sorts() {
        let mut session = Session::new(EngineConfig::default());
        let id = session.create_route("A", geometry(&[(0.0, 0.0), (100.0, 0.0)]), cable_metadata());
        let layers = ReferenceLayers::default();
        let later = session
            .place_asset_point(id, AssetPointKind::Joint, Point::new(80.0, 4.0), &layers)
            .await
            .unwrap();
        let earlier = session
            .place_asset_point(id, AssetPointKind::Joint, Point::new(20.0, -3.0), &layers)
            .await
            .unwrap();
        assert!((later.chainage_m - 80.0).abs() < 1e-9);
        assert!((earlier.chainage_m - 20.0).abs() < 1e-9);
        let stored = session.assets().points_for_route(id);
        assert_eq!(stored[0].id, earlier.id);
        assert_eq!(stored[1].id, later.id);
    }
}
