//! Planar geometry helpers shared by the chainage, crossing and spatial
//! query modules.

use geo::{Coord, EuclideanLength, GeodesicLength, Line, LineString, Point, Rect};
use log::warn;

use crate::crs::Crs;

/// Polyline known to be expressed in the working planar metric CRS.
///
/// Wrapping is the caller's assertion; the checked construction path is
/// [`crate::route::RouteGeometry::to_metric`].
#[derive(Debug, Clone, PartialEq)]
pub struct MetricLine(LineString<f64>);

impl MetricLine {
    /// Wraps a polyline that is already in the working metric CRS.
    pub fn new(line: LineString<f64>) -> Self {
        Self(line)
    }

    pub fn line_string(&self) -> &LineString<f64> {
        &self.0
    }

    /// Planar length in metres.
    pub fn length_m(&self) -> f64 {
        self.0.euclidean_length()
    }
}

/// Closest location on a polyline to a query point.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct NearestCoordinate {
    pub coord: Coord<f64>,
    /// Index of the segment the snapped coordinate lies on.
    pub segment_index: usize,
    pub distance_m: f64,
}

fn closest_on_segment(segment: Line<f64>, p: Coord<f64>) -> Coord<f64> {
    let a = segment.start;
    let b = segment.end;
    let ab = Coord {
        x: b.x - a.x,
        y: b.y - a.y,
    };
    let len2 = ab.x * ab.x + ab.y * ab.y;
    if len2 == 0.0 {
        return a;
    }
    let t = (((p.x - a.x) * ab.x + (p.y - a.y) * ab.y) / len2).clamp(0.0, 1.0);
    Coord {
        x: a.x + t * ab.x,
        y: a.y + t * ab.y,
    }
}

fn coord_distance(a: Coord<f64>, b: Coord<f64>) -> f64 {
    ((b.x - a.x).powi(2) + (b.y - a.y).powi(2)).sqrt()
}

/// Finds the closest point on `line` to `point`, together with the index of
/// the segment it falls on.
pub fn nearest_coordinate(line: &MetricLine, point: Point<f64>) -> Option<NearestCoordinate> {
    let mut best: Option<NearestCoordinate> = None;
    for (index, segment) in line.line_string().lines().enumerate() {
        let coord = closest_on_segment(segment, point.0);
        let distance_m = coord_distance(coord, point.0);
        if best.as_ref().map_or(true, |b| distance_m < b.distance_m) {
            best = Some(NearestCoordinate {
                coord,
                segment_index: index,
                distance_m,
            });
        }
    }
    best
}

/// Unit tangent of the segment of `line` nearest to `point`.
///
/// Falls back to an adjacent segment when the located one is degenerate;
/// returns `None` when no non-degenerate segment exists around the point.
pub fn unit_tangent_at(line: &MetricLine, point: Point<f64>) -> Option<(f64, f64)> {
    let nearest = nearest_coordinate(line, point)?;
    let segments: Vec<Line<f64>> = line.line_string().lines().collect();
    let mut candidates = vec![nearest.segment_index];
    if nearest.segment_index > 0 {
        candidates.push(nearest.segment_index - 1);
    }
    if nearest.segment_index + 1 < segments.len() {
        candidates.push(nearest.segment_index + 1);
    }
    for index in candidates {
        let segment = segments[index];
        let dx = segment.end.x - segment.start.x;
        let dy = segment.end.y - segment.start.y;
        let length = dx.hypot(dy);
        if length > 0.0 {
            return Some((dx / length, dy / length));
        }
    }
    None
}

/// Acute angle in degrees between two direction vectors, normalized into
/// [0°, 90°]: a crossing and its supplementary angle are the same physical
/// geometry.
pub fn acute_angle_degrees(a: (f64, f64), b: (f64, f64)) -> Option<f64> {
    let magnitude_a = a.0.hypot(a.1);
    let magnitude_b = b.0.hypot(b.1);
    if magnitude_a == 0.0 || magnitude_b == 0.0 {
        return None;
    }
    let cosine = ((a.0 * b.0 + a.1 * b.1) / (magnitude_a * magnitude_b)).clamp(-1.0, 1.0);
    let degrees = cosine.acos().to_degrees();
    Some(if degrees > 90.0 { 180.0 - degrees } else { degrees })
}

/// Total route length in metres, rounded to centimetres.
///
/// Geodesic length for geographic input, planar length otherwise.  A
/// near-zero geodesic result on a non-trivial line signals a CRS mismatch and
/// falls back to the planar length.
pub fn route_length_m(line: &LineString<f64>, crs: &Crs) -> f64 {
    let length = if crs.is_geographic() {
        let geodesic = line.geodesic_length();
        if geodesic.abs() < 0.001 && line.0.len() >= 2 {
            warn!("geodesic length returned near-zero, falling back to planar length");
            line.euclidean_length()
        } else {
            geodesic.abs()
        }
    } else {
        line.euclidean_length()
    };
    (length * 100.0).round() / 100.0
}

/// Axis-aligned search window covering `line` grown by `margin_m` on every
/// side.  Used to scope reference-layer queries, not as a compliance buffer.
pub fn search_window(line: &LineString<f64>, margin_m: f64) -> Option<Rect<f64>> {
    let mut xs = line.0.iter().map(|c| c.x);
    let mut ys = line.0.iter().map(|c| c.y);
    let first_x = xs.next()?;
    let first_y = ys.next()?;
    let (min_x, max_x) = xs.fold((first_x, first_x), |(lo, hi), x| (lo.min(x), hi.max(x)));
    let (min_y, max_y) = ys.fold((first_y, first_y), |(lo, hi), y| (lo.min(y), hi.max(y)));
    Some(Rect::new(
        Coord {
            x: min_x - margin_m,
            y: min_y - margin_m,
        },
        Coord {
            x: max_x + margin_m,
            y: max_y + margin_m,
        },
    ))
}

/// Square search window of half-size `radius_m` around a point.
pub fn point_window(point: Point<f64>, radius_m: f64) -> Rect<f64> {
    Rect::new(
        Coord {
            x: point.x() - radius_m,
            y: point.y() - radius_m,
        },
        Coord {
            x: point.x() + radius_m,
            y: point.y() + radius_m,
        },
    )
}

/// Formats a distance for display: metres below one kilometre, kilometres
/// above.
pub fn format_distance(meters: f64) -> String {
    if meters < 1000.0 {
        format!("{:.1} m", meters)
    } else {
        format!("{:.2} km", meters / 1000.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn line(coords: &[(f64, f64)]) -> MetricLine {
        MetricLine::new(LineString::from(coords.to_vec()))
    }

    #[test]
    fn nearest_coordinate_mid_segment() {
        let route = line(&[(0.0, 0.0), (100.0, 0.0)]);
        let nearest = nearest_coordinate(&route, Point::new(40.0, 25.0)).unwrap();
        assert!((nearest.coord.x - 40.0).abs() < 1e-9);
        assert!(nearest.coord.y.abs() < 1e-9);
        assert_eq!(nearest.segment_index, 0);
        assert!((nearest.distance_m - 25.0).abs() < 1e-9);
    }

    #[test]
    fn nearest_coordinate_picks_closer_segment() {
        let route = line(&[(0.0, 0.0), (100.0, 0.0), (100.0, 100.0)]);
        let nearest = nearest_coordinate(&route, Point::new(90.0, 80.0)).unwrap();
        assert_eq!(nearest.segment_index, 1);
        assert!((nearest.coord.x - 100.0).abs() < 1e-9);
        assert!((nearest.coord.y - 80.0).abs() < 1e-9);
    }

    #[test]
    fn tangent_skips_degenerate_segment() {
        let route = line(&[(0.0, 0.0), (0.0, 0.0), (10.0, 0.0)]);
        let tangent = unit_tangent_at(&route, Point::new(0.0, 1.0)).unwrap();
        assert!((tangent.0 - 1.0).abs() < 1e-9);
        assert!(tangent.1.abs() < 1e-9);
    }

    #[test]
    fn angle_normalization() {
        let east = (1.0, 0.0);
        let north = (0.0, 1.0);
        assert!((acute_angle_degrees(east, north).unwrap() - 90.0).abs() < 1e-9);
        assert!(acute_angle_degrees(east, east).unwrap().abs() < 1e-9);

        let thirty = (30f64.to_radians().cos(), 30f64.to_radians().sin());
        let one_fifty = (150f64.to_radians().cos(), 150f64.to_radians().sin());
        assert!((acute_angle_degrees(east, thirty).unwrap() - 30.0).abs() < 1e-6);
        assert!((acute_angle_degrees(east, one_fifty).unwrap() - 30.0).abs() < 1e-6);
    }

    #[test]
    fn angle_of_zero_vector_is_none() {
        assert!(acute_angle_degrees((0.0, 0.0), (1.0, 0.0)).is_none());
    }

    #[test]
    fn planar_length_rounds_to_cm() {
        let route = LineString::from(vec![(0.0, 0.0), (3.0, 4.0)]);
        assert_eq!(route_length_m(&route, &Crs::rd_new()), 5.0);
        let skewed = LineString::from(vec![(0.0, 0.0), (1.0, 1.0)]);
        assert_eq!(route_length_m(&skewed, &Crs::rd_new()), 1.41);
    }

    #[test]
    fn geodesic_length_for_geographic_input() {
        // Roughly one degree of longitude at the equator.
        let route = LineString::from(vec![(0.0, 0.0), (1.0, 0.0)]);
        let length = route_length_m(&route, &Crs::wgs84());
        assert!((length - 111_319.49).abs() < 100.0);
    }

    #[test]
    fn search_window_grows_bounds() {
        let route = LineString::from(vec![(10.0, 20.0), (30.0, 40.0)]);
        let window = search_window(&route, 5.0).unwrap();
        assert_eq!(window.min().x, 5.0);
        assert_eq!(window.min().y, 15.0);
        assert_eq!(window.max().x, 35.0);
        assert_eq!(window.max().y, 45.0);
    }

    #[test]
    fn distance_formatting() {
        assert_eq!(format_distance(12.34), "12.3 m");
        assert_eq!(format_distance(1234.5), "1.23 km");
    }
}
