use geo::{Coord, Point};

use crate::geometry::{nearest_coordinate, MetricLine};

/// A point projected onto a route with its along-route distance.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ChainagePoint {
    /// Distance along the route from its start to the snapped position.
    pub chainage_m: f64,
    pub snapped: Point<f64>,
    pub segment_index: usize,
}

fn segment_length(a: Coord<f64>, b: Coord<f64>) -> f64 {
    ((b.x - a.x).powi(2) + (b.y - a.y).powi(2)).sqrt()
}

/// Projects `click` onto the route and measures the chainage of the snapped
/// position: the sum of every fully traversed segment plus the partial
/// distance within the snapped segment.
///
/// Operates on a single polyline path; multi-path routes are not supported.
pub fn calculate_chainage(route: &MetricLine, click: Point<f64>) -> Option<ChainagePoint> {
    let vertices = &route.line_string().0;
    if vertices.len() < 2 {
        return None;
    }
    let nearest = nearest_coordinate(route, click)?;
    let mut chainage_m = 0.0;
    for i in 0..nearest.segment_index {
        chainage_m += segment_length(vertices[i], vertices[i + 1]);
    }
    chainage_m += segment_length(vertices[nearest.segment_index], nearest.coord);
    Some(ChainagePoint {
        chainage_m,
        snapped: Point(nearest.coord),
        segment_index: nearest.segment_index,
    })
}

/// Walks the route to `chainage_m` and interpolates the position within the
/// segment that straddles it.
///
/// A chainage beyond the total route length clamps to the final vertex; a
/// negative chainage clamps to the start.
pub fn position_at_chainage(route: &MetricLine, chainage_m: f64) -> Option<Point<f64>> {
    let vertices = &route.line_string().0;
    if vertices.is_empty() {
        return None;
    }
    let target = chainage_m.max(0.0);
    let mut accumulated = 0.0;
    for i in 0..vertices.len().saturating_sub(1) {
        let length = segment_length(vertices[i], vertices[i + 1]);
        if length > 0.0 && accumulated + length >= target {
            let t = (target - accumulated) / length;
            return Some(Point::new(
                vertices[i].x + (vertices[i + 1].x - vertices[i].x) * t,
                vertices[i].y + (vertices[i + 1].y - vertices[i].y) * t,
            ));
        }
        accumulated += length;
    }
    vertices.last().map(|c| Point(*c))
}

#[cfg(test)]
mod tests {
    use super::*;
    use geo::LineString;

    fn route(coords: &[(f64, f64)]) -> MetricLine {
        MetricLine::new(LineString::from(coords.to_vec()))
    }

    #[test]
    fn chainage_on_straight_route() {
        let r = route(&[(0.0, 0.0), (100.0, 0.0)]);
        let result = calculate_chainage(&r, Point::new(50.0, 10.0)).unwrap();
        assert!((result.chainage_m - 50.0).abs() < 1e-9);
        assert!((result.snapped.x() - 50.0).abs() < 1e-9);
        assert!(result.snapped.y().abs() < 1e-9);
    }

    #[test]
    fn chainage_accumulates_previous_segments() {
        let r = route(&[(0.0, 0.0), (100.0, 0.0), (100.0, 100.0)]);
        let result = calculate_chainage(&r, Point::new(120.0, 50.0)).unwrap();
        assert!((result.chainage_m - 150.0).abs() < 1e-9);
        assert_eq!(result.segment_index, 1);
    }

    #[test]
    fn position_interpolates_within_segment() {
        let r = route(&[(0.0, 0.0), (100.0, 0.0), (100.0, 100.0)]);
        let p = position_at_chainage(&r, 150.0).unwrap();
        assert!((p.x() - 100.0).abs() < 1e-9);
        assert!((p.y() - 50.0).abs() < 1e-9);
    }

    #[test]
    fn position_clamps_past_the_end() {
        let r = route(&[(0.0, 0.0), (100.0, 0.0)]);
        let p = position_at_chainage(&r, 250.0).unwrap();
        assert!((p.x() - 100.0).abs() < 1e-9);
        assert!(p.y().abs() < 1e-9);
    }

    #[test]
    fn position_clamps_negative_chainage() {
        let r = route(&[(10.0, 10.0), (100.0, 10.0)]);
        let p = position_at_chainage(&r, -5.0).unwrap();
        assert!((p.x() - 10.0).abs() < 1e-9);
        assert!((p.y() - 10.0).abs() < 1e-9);
    }
}
