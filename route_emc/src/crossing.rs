use geo::algorithm::line_intersection::{line_intersection, LineIntersection};
use geo::{Coord, LineString, Point};

use crate::geometry::{acute_angle_degrees, unit_tangent_at, MetricLine};
use crate::layers::{Feature, FeatureGeometry};

/// Result of analysing a route against a set of track geometries.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct CrossingAnalysis {
    /// True iff at least one intersection with a resolvable angle was found.
    pub crosses_track: bool,
    /// Among all crossing angles, the one closest to perpendicular.
    pub primary_angle_degrees: Option<f64>,
    pub angles_degrees: Vec<f64>,
}

/// First intersection between the route and a track polyline, reduced to a
/// single representative point for tangent sampling.  A collinear overlap is
/// represented by its midpoint.
fn representative_intersection(route: &MetricLine, track: &LineString<f64>) -> Option<Point<f64>> {
    for route_segment in route.line_string().lines() {
        for track_segment in track.lines() {
            match line_intersection(route_segment, track_segment) {
                Some(LineIntersection::SinglePoint { intersection, .. }) => {
                    return Some(Point(intersection));
                }
                Some(LineIntersection::Collinear { intersection }) => {
                    return Some(Point(Coord {
                        x: (intersection.start.x + intersection.end.x) / 2.0,
                        y: (intersection.start.y + intersection.end.y) / 2.0,
                    }));
                }
                None => {}
            }
        }
    }
    None
}

/// Detects crossings between the route and each track geometry and computes
/// the crossing angle at each one.
///
/// The crossing angle is the acute angle between the route's local tangent
/// and the track's local tangent at the intersection, in [0°, 90°].
/// Intersections whose tangents cannot be resolved are skipped, not counted
/// as crossings.
pub fn analyze_crossings(route: &MetricLine, tracks: &[Feature]) -> CrossingAnalysis {
    let mut angles = Vec::new();
    for feature in tracks {
        let FeatureGeometry::Line(track) = &feature.geometry else {
            continue;
        };
        let Some(representative) = representative_intersection(route, track) else {
            continue;
        };
        let track_line = MetricLine::new(track.clone());
        let Some(route_tangent) = unit_tangent_at(route, representative) else {
            continue;
        };
        let Some(track_tangent) = unit_tangent_at(&track_line, representative) else {
            continue;
        };
        if let Some(angle) = acute_angle_degrees(route_tangent, track_tangent) {
            angles.push(angle);
        }
    }

    // The compliance window is centered on 90°, so the angle closest to
    // perpendicular is the representative one; the strict comparison keeps
    // the first-found angle on a tie.
    let primary_angle_degrees = angles.iter().copied().fold(None, |best, current| match best {
        None => Some(current),
        Some(b) => {
            if (90.0 - current).abs() < (90.0 - b).abs() {
                Some(current)
            } else {
                Some(b)
            }
        }
    });

    CrossingAnalysis {
        crosses_track: !angles.is_empty(),
        primary_angle_degrees,
        angles_degrees: angles,
    }
}
