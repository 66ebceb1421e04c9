//! Planar and great-circle kernels over geographic coordinates.

use netreview_buffers::{Bounds, Position, Segment};

/// Mean Earth radius in metres.
pub const EARTH_RADIUS_METERS: f64 = 6_371_008.8;

/// Length of one degree of latitude, also used for longitude at the equator.
pub const DEGREE_IN_METERS: f64 = 111_320.0;

/// Great-circle distance in metres.
pub fn haversine_distance(a: Position, b: Position) -> f64 {
    let d_lat = (b.lat - a.lat).to_radians();
    let d_lon = (b.lon - a.lon).to_radians();
    let lat1 = a.lat.to_radians();
    let lat2 = b.lat.to_radians();

    let h = (d_lat / 2.0).sin().powi(2) + lat1.cos() * lat2.cos() * (d_lon / 2.0).sin().powi(2);
    2.0 * EARTH_RADIUS_METERS * h.sqrt().atan2((1.0 - h).sqrt())
}

/// Degree deltas `(d_lon, d_lat)` covering `meters` around latitude `lat`.
pub fn meters_to_degrees(meters: f64, lat: f64) -> (f64, f64) {
    let d_lat = meters / DEGREE_IN_METERS;
    let d_lon = meters / (DEGREE_IN_METERS * lat.to_radians().cos());
    (d_lon, d_lat)
}

/// Box of half-size `meters` centred on `center`.
pub fn search_bounds(center: Position, meters: f64) -> Bounds {
    let (d_lon, d_lat) = meters_to_degrees(meters, center.lat);
    Bounds::new(
        center.lon - d_lon,
        center.lat - d_lat,
        center.lon + d_lon,
        center.lat + d_lat,
    )
}

/// Crossing point of two segments, endpoints inclusive. Parallel and
/// collinear segments never intersect.
pub fn segment_intersection(a: &Segment, b: &Segment) -> Option<Position> {
    let (x1, y1) = (a.start.lon, a.start.lat);
    let (x2, y2) = (a.end.lon, a.end.lat);
    let (x3, y3) = (b.start.lon, b.start.lat);
    let (x4, y4) = (b.end.lon, b.end.lat);

    let denom = (y4 - y3) * (x2 - x1) - (x4 - x3) * (y2 - y1);
    if denom == 0.0 {
        return None;
    }
    let ua = ((x4 - x3) * (y1 - y3) - (y4 - y3) * (x1 - x3)) / denom;
    let ub = ((x2 - x1) * (y1 - y3) - (y2 - y1) * (x1 - x3)) / denom;

    if (0.0..=1.0).contains(&ua) && (0.0..=1.0).contains(&ub) {
        Some(Position::new(x1 + ua * (x2 - x1), y1 + ua * (y2 - y1)))
    } else {
        None
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct NearestPoint {
    pub position: Position,
    /// Metres from the query point.
    pub distance: f64,
}

/// Closest point of `segment` to `point`.
///
/// The projection happens in a local equirectangular frame centred on
/// `point`; the reported distance is the great-circle one.
pub fn nearest_point_on_segment(point: Position, segment: &Segment) -> NearestPoint {
    let scale_x = point.lat.to_radians().cos();
    let ax = (segment.start.lon - point.lon) * scale_x;
    let ay = segment.start.lat - point.lat;
    let bx = (segment.end.lon - point.lon) * scale_x;
    let by = segment.end.lat - point.lat;

    let (dx, dy) = (bx - ax, by - ay);
    let length_squared = dx * dx + dy * dy;
    let t = if length_squared == 0.0 {
        0.0
    } else {
        (-(ax * dx + ay * dy) / length_squared).clamp(0.0, 1.0)
    };

    let position = Position::new(
        segment.start.lon + t * (segment.end.lon - segment.start.lon),
        segment.start.lat + t * (segment.end.lat - segment.start.lat),
    );
    NearestPoint {
        position,
        distance: haversine_distance(point, position),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    fn seg(x1: f64, y1: f64, x2: f64, y2: f64) -> Segment {
        Segment::new(Position::new(x1, y1), Position::new(x2, y2))
    }

    #[test]
    fn crossing_segments_intersect() {
        let p = segment_intersection(&seg(0.0, 0.0, 0.0, 10.0), &seg(-5.0, 5.0, 5.0, 5.0)).unwrap();
        assert_relative_eq!(p.lon, 0.0);
        assert_relative_eq!(p.lat, 5.0);
    }

    #[test]
    fn touching_endpoints_count() {
        let p = segment_intersection(&seg(0.0, 0.0, 0.0, 10.0), &seg(0.0, 10.0, 10.0, 10.0));
        assert_eq!(p, Some(Position::new(0.0, 10.0)));
    }

    #[test]
    fn parallel_and_disjoint_segments_do_not_intersect() {
        assert!(segment_intersection(&seg(0.0, 0.0, 1.0, 0.0), &seg(0.0, 1.0, 1.0, 1.0)).is_none());
        assert!(segment_intersection(&seg(0.0, 0.0, 2.0, 0.0), &seg(1.0, 0.0, 3.0, 0.0)).is_none());
        assert!(segment_intersection(&seg(0.0, 0.0, 1.0, 1.0), &seg(2.0, 0.0, 1.6, 0.4)).is_none());
    }

    #[test]
    fn one_degree_of_latitude() {
        let d = haversine_distance(Position::new(0.0, 0.0), Position::new(0.0, 1.0));
        assert_relative_eq!(d, 111_195.08, epsilon = 0.5);
    }

    #[test]
    fn nearest_point_is_perpendicular_foot() {
        let n = nearest_point_on_segment(Position::new(0.0005, 0.0001), &seg(0.0, 0.0, 0.001, 0.0));
        assert_relative_eq!(n.position.lon, 0.0005, epsilon = 1e-12);
        assert_relative_eq!(n.position.lat, 0.0, epsilon = 1e-12);
        assert_relative_eq!(n.distance, 11.12, epsilon = 0.01);
    }

    #[test]
    fn nearest_point_clamps_to_endpoints() {
        let n = nearest_point_on_segment(Position::new(-1.0, 0.0), &seg(0.0, 0.0, 1.0, 0.0));
        assert_eq!(n.position, Position::new(0.0, 0.0));

        let degenerate = nearest_point_on_segment(Position::new(0.0, 1.0), &seg(2.0, 2.0, 2.0, 2.0));
        assert_eq!(degenerate.position, Position::new(2.0, 2.0));
    }

    #[test]
    fn search_bounds_widen_with_latitude() {
        let equator = search_bounds(Position::new(0.0, 0.0), 100.0);
        let north = search_bounds(Position::new(0.0, 60.0), 100.0);
        assert_relative_eq!(
            equator.max_y - equator.min_y,
            north.max_y - north.min_y,
            epsilon = 1e-12
        );
        assert_relative_eq!(
            (north.max_x - north.min_x) / (equator.max_x - equator.min_x),
            2.0,
            epsilon = 1e-9
        );
    }
}
