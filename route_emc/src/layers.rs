//! Reference infrastructure layers and the spatial feature abstraction.
//!
//! The evaluator only needs "query features intersecting a search window,
//! with geometry returned".  Any provider satisfying [`FeatureLayer`] works;
//! [`InMemoryLayer`] is an R-tree backed implementation for tests and
//! offline runs.

use std::sync::Arc;

use async_trait::async_trait;
use geo::{
    BoundingRect, Closest, ClosestPoint, EuclideanDistance, Intersects, LineString, Point,
    Polygon, Rect,
};
use rstar::{RTree, RTreeObject, AABB};

use crate::error::LayerError;
use crate::geometry::MetricLine;

/// Geometry of a reference feature, expressed in the working metric CRS.
#[derive(Debug, Clone, PartialEq)]
pub enum FeatureGeometry {
    Point(Point<f64>),
    Line(LineString<f64>),
    Area(Polygon<f64>),
}

impl FeatureGeometry {
    pub fn bounding_rect(&self) -> Option<Rect<f64>> {
        match self {
            FeatureGeometry::Point(p) => Some(p.bounding_rect()),
            FeatureGeometry::Line(l) => l.bounding_rect(),
            FeatureGeometry::Area(a) => a.bounding_rect(),
        }
    }

    /// Shortest planar distance from the full polyline to this feature.
    pub fn min_distance_to_line(&self, line: &MetricLine) -> f64 {
        let route = line.line_string();
        match self {
            FeatureGeometry::Point(p) => route.euclidean_distance(p),
            FeatureGeometry::Line(l) => route.euclidean_distance(l),
            FeatureGeometry::Area(a) => {
                if a.intersects(route) {
                    0.0
                } else {
                    route.euclidean_distance(a.exterior())
                }
            }
        }
    }

    /// Shortest planar distance from a point to this feature.
    pub fn min_distance_to_point(&self, point: Point<f64>) -> f64 {
        match self {
            FeatureGeometry::Point(p) => point.euclidean_distance(p),
            FeatureGeometry::Line(l) => point.euclidean_distance(l),
            FeatureGeometry::Area(a) => {
                if a.intersects(&point) {
                    0.0
                } else {
                    point.euclidean_distance(a.exterior())
                }
            }
        }
    }

    /// Closest location on this feature to `point`, if determinable.
    pub fn closest_point_to(&self, point: Point<f64>) -> Option<Point<f64>> {
        let closest = match self {
            FeatureGeometry::Point(p) => return Some(*p),
            FeatureGeometry::Line(l) => l.closest_point(&point),
            FeatureGeometry::Area(a) => a.exterior().closest_point(&point),
        };
        match closest {
            Closest::Intersection(p) | Closest::SinglePoint(p) => Some(p),
            Closest::Indeterminate => None,
        }
    }
}

/// A reference feature returned by a layer query.
#[derive(Debug, Clone, PartialEq)]
pub struct Feature {
    pub id: u64,
    pub geometry: FeatureGeometry,
}

/// Bounded spatial search over one reference layer.
///
/// Implementations must return feature geometries in the working metric CRS
/// and may suspend (remote feature services).
#[async_trait]
pub trait FeatureLayer: Send + Sync {
    async fn query_intersecting(&self, window: Rect<f64>) -> Result<Vec<Feature>, LayerError>;
}

/// The named reference layers consumed by the evaluator.
#[derive(Clone, Default)]
pub struct ReferenceLayers {
    pub tracks: Option<Arc<dyn FeatureLayer>>,
    pub technical_rooms: Option<Arc<dyn FeatureLayer>>,
    pub earthing: Option<Arc<dyn FeatureLayer>>,
}

struct FeatureNode {
    feature: Feature,
    envelope: AABB<[f64; 2]>,
}

impl RTreeObject for FeatureNode {
    type Envelope = AABB<[f64; 2]>;

    fn envelope(&self) -> Self::Envelope {
        self.envelope
    }
}

/// In-memory reference layer backed by an R-tree.
pub struct InMemoryLayer {
    tree: RTree<FeatureNode>,
}

impl InMemoryLayer {
    pub fn new(features: Vec<Feature>) -> Self {
        let nodes = features
            .into_iter()
            .filter_map(|feature| {
                let rect = feature.geometry.bounding_rect()?;
                Some(FeatureNode {
                    envelope: AABB::from_corners(
                        [rect.min().x, rect.min().y],
                        [rect.max().x, rect.max().y],
                    ),
                    feature,
                })
            })
            .collect();
        Self {
            tree: RTree::bulk_load(nodes),
        }
    }

    /// Builds a layer of line features with sequential ids.
    pub fn from_lines(lines: Vec<LineString<f64>>) -> Self {
        Self::new(
            lines
                .into_iter()
                .enumerate()
                .map(|(i, line)| Feature {
                    id: i as u64 + 1,
                    geometry: FeatureGeometry::Line(line),
                })
                .collect(),
        )
    }

    /// Builds a layer of area features with sequential ids.
    pub fn from_polygons(polygons: Vec<Polygon<f64>>) -> Self {
        Self::new(
            polygons
                .into_iter()
                .enumerate()
                .map(|(i, polygon)| Feature {
                    id: i as u64 + 1,
                    geometry: FeatureGeometry::Area(polygon),
                })
                .collect(),
        )
    }

    /// Builds a layer of point features with sequential ids.
    pub fn from_points(points: Vec<Point<f64>>) -> Self {
        Self::new(
            points
                .into_iter()
                .enumerate()
                .map(|(i, point)| Feature {
                    id: i as u64 + 1,
                    geometry: FeatureGeometry::Point(point),
                })
                .collect(),
        )
    }

    pub fn len(&self) -> usize {
        self.tree.size()
    }

    pub fn is_empty(&self) -> bool {
        self.tree.size() == 0
    }
}

#[async_trait]
impl FeatureLayer for InMemoryLayer {
    async fn query_intersecting(&self, window: Rect<f64>) -> Result<Vec<Feature>, LayerError> {
        let envelope = AABB::from_corners(
            [window.min().x, window.min().y],
            [window.max().x, window.max().y],
        );
        Ok(self
            .tree
            .locate_in_envelope_intersecting(&envelope)
            .map(|node| node.feature.clone())
            .collect())
    }
}
