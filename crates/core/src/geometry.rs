//! Canvas geometry primitives
//!
//! All coordinates live in the host canvas space and are measured in pixels.
//! The canvas is treated as an orthographic, axis-aligned plane.

/// A point on the canvas, in pixels
#[derive(Debug, Clone, Copy, PartialEq, Default, serde::Serialize, serde::Deserialize)]
pub struct Point {
    pub x: f64,
    pub y: f64,
}

impl Point {
    /// Create a new point
    pub fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }

    /// Euclidean pixel distance to another point
    pub fn distance_to(&self, other: &Point) -> f64 {
        let dx = self.x - other.x;
        let dy = self.y - other.y;
        (dx * dx + dy * dy).sqrt()
    }

    /// Pixel delta from this point to `other`
    pub fn delta_to(&self, other: &Point) -> SegmentPixels {
        SegmentPixels::new(other.x - self.x, other.y - self.y)
    }
}

/// Pixel extent of a straight segment
///
/// Signs are kept as given but every consumer works on magnitudes.
#[derive(Debug, Clone, Copy, PartialEq, Default, serde::Serialize, serde::Deserialize)]
pub struct SegmentPixels {
    pub dx: f64,
    pub dy: f64,
}

impl SegmentPixels {
    pub fn new(dx: f64, dy: f64) -> Self {
        Self { dx, dy }
    }

    /// Segment between two points
    pub fn between(start: Point, end: Point) -> Self {
        start.delta_to(&end)
    }

    /// Euclidean length in pixels
    pub fn length(&self) -> f64 {
        self.dx.hypot(self.dy)
    }

    /// True when the horizontal extent dominates (ties count as horizontal)
    pub fn is_horizontal(&self) -> bool {
        self.dx.abs() >= self.dy.abs()
    }
}

/// Opaque id of a host-owned visual element
///
/// Carried on measurements and calibrations so the host can link results
/// back to what it drew. Never interpreted here.
#[derive(Debug, Clone, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
#[serde(transparent)]
pub struct ElementRef(pub String);

impl ElementRef {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

/// Signed shoelace area of a closed ring, in square pixels
///
/// Positive for counter-clockwise rings in a y-up space.
pub fn shoelace_area(points: &[Point]) -> f64 {
    let n = points.len();
    if n < 3 {
        return 0.0;
    }
    let mut area = 0.0;
    for i in 0..n {
        let j = (i + 1) % n;
        area += points[i].x * points[j].y;
        area -= points[j].x * points[i].y;
    }
    area / 2.0
}

/// Ray-casting point-in-polygon test
///
/// Casts a ray towards +x and counts edge crossings. Points exactly on an
/// edge may land on either side.
pub fn point_in_polygon(point: &Point, polygon: &[Point]) -> bool {
    let n = polygon.len();
    if n < 3 {
        return false;
    }
    let mut inside = false;
    let mut j = n - 1;
    for i in 0..n {
        let (pi, pj) = (polygon[i], polygon[j]);
        if (pi.y > point.y) != (pj.y > point.y) {
            let x_cross = pj.x + (point.y - pj.y) * (pi.x - pj.x) / (pi.y - pj.y);
            if point.x < x_cross {
                inside = !inside;
            }
        }
        j = i;
    }
    inside
}

/// Bounding box of a point list as (min, max)
pub fn bounding_box(points: &[Point]) -> Option<(Point, Point)> {
    let first = points.first()?;
    let mut min = *first;
    let mut max = *first;
    for point in points.iter().skip(1) {
        min.x = min.x.min(point.x);
        min.y = min.y.min(point.y);
        max.x = max.x.max(point.x);
        max.y = max.y.max(point.y);
    }
    Some((min, max))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn square() -> Vec<Point> {
        vec![
            Point::new(0.0, 0.0),
            Point::new(10.0, 0.0),
            Point::new(10.0, 10.0),
            Point::new(0.0, 10.0),
        ]
    }

    #[test]
    fn test_point_distance() {
        let a = Point::new(0.0, 0.0);
        let b = Point::new(3.0, 4.0);
        assert_eq!(a.distance_to(&b), 5.0);
        assert_eq!(a.delta_to(&b), SegmentPixels::new(3.0, 4.0));
    }

    #[test]
    fn test_segment_orientation() {
        assert!(SegmentPixels::new(5.0, 5.0).is_horizontal());
        assert!(SegmentPixels::new(-6.0, 5.0).is_horizontal());
        assert!(!SegmentPixels::new(1.0, -5.0).is_horizontal());
        assert_eq!(SegmentPixels::new(3.0, 4.0).length(), 5.0);
    }

    #[test]
    fn test_shoelace_sign() {
        let ccw = square();
        let mut cw = square();
        cw.reverse();
        assert_eq!(shoelace_area(&ccw), 100.0);
        assert_eq!(shoelace_area(&cw), -100.0);
        assert_eq!(shoelace_area(&ccw[..2]), 0.0);
    }

    #[test]
    fn test_point_in_polygon() {
        let poly = square();
        assert!(point_in_polygon(&Point::new(5.0, 5.0), &poly));
        assert!(!point_in_polygon(&Point::new(15.0, 5.0), &poly));
        assert!(!point_in_polygon(&Point::new(5.0, -1.0), &poly));

        // Concave "L" shape: the notch is outside
        let l_shape = vec![
            Point::new(0.0, 0.0),
            Point::new(10.0, 0.0),
            Point::new(10.0, 4.0),
            Point::new(4.0, 4.0),
            Point::new(4.0, 10.0),
            Point::new(0.0, 10.0),
        ];
        assert!(point_in_polygon(&Point::new(2.0, 8.0), &l_shape));
        assert!(!point_in_polygon(&Point::new(8.0, 8.0), &l_shape));
    }

    #[test]
    fn test_bounding_box() {
        let (min, max) = bounding_box(&[Point::new(3.0, -2.0), Point::new(-1.0, 7.0)]).unwrap();
        assert_eq!(min, Point::new(-1.0, -2.0));
        assert_eq!(max, Point::new(3.0, 7.0));
        assert!(bounding_box(&[]).is_none());
    }
}
