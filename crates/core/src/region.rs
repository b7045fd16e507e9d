//! Scale regions
//!
//! A region is a bounded canvas area carrying its own calibration, for
//! example a detail view drawn at a different scale than the main plan.
//! Inside its boundary the region's calibration overrides the global one.

use crate::calibration::{CalibrationContext, CalibrationMapping};
use crate::error::{MeasureError, MeasureResult};
use crate::geometry::{point_in_polygon, shoelace_area, Point};

/// Unique identifier for scale regions
pub type RegionId = uuid::Uuid;

/// Boundary of a scale region
#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum RegionBoundary {
    /// Axis-aligned box (frame or group bounds)
    Box { min: Point, max: Point },
    /// Freeform polygon, implicitly closed
    Polygon { points: Vec<Point> },
}

impl RegionBoundary {
    /// Box from two opposite corners in any order
    pub fn from_corners(a: Point, b: Point) -> Self {
        RegionBoundary::Box {
            min: Point::new(a.x.min(b.x), a.y.min(b.y)),
            max: Point::new(a.x.max(b.x), a.y.max(b.y)),
        }
    }

    /// Enclosed area in square pixels
    pub fn area(&self) -> f64 {
        match self {
            RegionBoundary::Box { min, max } => {
                (max.x - min.x).max(0.0) * (max.y - min.y).max(0.0)
            }
            RegionBoundary::Polygon { points } => shoelace_area(points).abs(),
        }
    }

    /// Whether `point` lies inside the boundary
    ///
    /// Box edges count as inside.
    pub fn contains(&self, point: &Point) -> bool {
        match self {
            RegionBoundary::Box { min, max } => {
                point.x >= min.x && point.x <= max.x && point.y >= min.y && point.y <= max.y
            }
            RegionBoundary::Polygon { points } => point_in_polygon(point, points),
        }
    }
}

/// A canvas area with its own calibration
#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
#[serde(try_from = "RegionRecord")]
pub struct ScaleRegion {
    id: RegionId,
    boundary: RegionBoundary,
    calibration: CalibrationMapping,
    name: String,
}

impl ScaleRegion {
    /// Create a region, rejecting boundaries that enclose no area.
    pub fn new(
        boundary: RegionBoundary,
        calibration: CalibrationMapping,
        name: impl Into<String>,
    ) -> MeasureResult<Self> {
        check_enclosed_area(&boundary)?;
        Ok(Self {
            id: RegionId::new_v4(),
            boundary,
            calibration,
            name: name.into(),
        })
    }

    pub fn id(&self) -> RegionId {
        self.id
    }

    pub fn boundary(&self) -> &RegionBoundary {
        &self.boundary
    }

    pub fn calibration(&self) -> &CalibrationMapping {
        &self.calibration
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn contains(&self, point: &Point) -> bool {
        self.boundary.contains(point)
    }

    pub fn area(&self) -> f64 {
        self.boundary.area()
    }
}

fn check_enclosed_area(boundary: &RegionBoundary) -> MeasureResult<()> {
    let area = boundary.area();
    if !area.is_finite() || area <= 0.0 {
        return Err(MeasureError::DegenerateGeometry(format!(
            "region boundary encloses no area ({area} px²)"
        )));
    }
    Ok(())
}

/// Unchecked wire form of [`ScaleRegion`]
#[derive(serde::Deserialize)]
struct RegionRecord {
    id: RegionId,
    boundary: RegionBoundary,
    calibration: CalibrationMapping,
    name: String,
}

impl TryFrom<RegionRecord> for ScaleRegion {
    type Error = MeasureError;

    fn try_from(record: RegionRecord) -> MeasureResult<Self> {
        check_enclosed_area(&record.boundary)?;
        Ok(Self {
            id: record.id,
            boundary: record.boundary,
            calibration: record.calibration,
            name: record.name,
        })
    }
}

/// Host-side provider of regions near a point
///
/// Lets the host derive regions from its own grouping model on demand
/// instead of registering them up front.
pub trait RegionSource {
    fn list_regions_near(&self, point: &Point) -> Vec<ScaleRegion>;
}

/// Most specific region among `regions` containing `point`
///
/// Smallest area wins; on equal area the earliest in iteration order wins.
fn most_specific<'a, I>(regions: I, point: &Point) -> Option<&'a ScaleRegion>
where
    I: IntoIterator<Item = &'a ScaleRegion>,
{
    let mut best: Option<(&ScaleRegion, f64)> = None;
    for region in regions {
        if !region.contains(point) {
            continue;
        }
        let area = region.area();
        match best {
            Some((_, best_area)) if best_area <= area => {}
            _ => best = Some((region, area)),
        }
    }
    best.map(|(region, _)| region)
}

/// Resolve the calibration for `point` from a host region source.
pub fn resolve_from_source<S: RegionSource + ?Sized>(
    source: &S,
    point: &Point,
    fallback: &CalibrationMapping,
) -> CalibrationMapping {
    let regions = source.list_regions_near(point);
    most_specific(&regions, point)
        .map(|region| region.calibration.clone())
        .unwrap_or_else(|| fallback.clone())
}

/// Registered scale regions, in registration order
#[derive(Debug, Clone, Default)]
pub struct ScaleRegionIndex {
    regions: Vec<ScaleRegion>,
}

impl ScaleRegionIndex {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a region; a region with the same id is replaced in place.
    pub fn register(&mut self, region: ScaleRegion) {
        tracing::debug!(id = %region.id, name = %region.name, area = region.area(), "scale region registered");
        match self.regions.iter_mut().find(|r| r.id == region.id) {
            Some(existing) => *existing = region,
            None => self.regions.push(region),
        }
    }

    /// Remove a region by id
    pub fn unregister(&mut self, id: RegionId) -> Option<ScaleRegion> {
        let position = self.regions.iter().position(|r| r.id == id)?;
        tracing::debug!(%id, "scale region unregistered");
        Some(self.regions.remove(position))
    }

    pub fn get(&self, id: RegionId) -> Option<&ScaleRegion> {
        self.regions.iter().find(|r| r.id == id)
    }

    pub fn iter(&self) -> impl Iterator<Item = &ScaleRegion> {
        self.regions.iter()
    }

    pub fn len(&self) -> usize {
        self.regions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.regions.is_empty()
    }

    pub fn clear(&mut self) {
        self.regions.clear();
    }

    /// Region that governs `point`, if any
    pub fn region_at(&self, point: &Point) -> Option<&ScaleRegion> {
        most_specific(&self.regions, point)
    }

    /// Calibration for `point`: the most specific containing region's, or `fallback`.
    pub fn resolve<'a>(&'a self, point: &Point, fallback: &'a CalibrationMapping) -> &'a CalibrationMapping {
        match self.region_at(point) {
            Some(region) => {
                tracing::trace!(region = %region.name, x = point.x, y = point.y, "point resolved to region");
                &region.calibration
            }
            None => fallback,
        }
    }

    /// Context for `point`, falling back to the global context.
    ///
    /// A point inside a region is calibrated even when the global context is empty.
    pub fn resolve_context(&self, point: &Point, global: &CalibrationContext) -> CalibrationContext {
        match self.region_at(point) {
            Some(region) => CalibrationContext::new(region.calibration.clone()),
            None => global.clone(),
        }
    }
}

impl RegionSource for ScaleRegionIndex {
    fn list_regions_near(&self, point: &Point) -> Vec<ScaleRegion> {
        self.regions
            .iter()
            .filter(|r| r.contains(point))
            .cloned()
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::calibration::establish;
    use crate::geometry::SegmentPixels;
    use crate::units::Unit;

    fn mapping(px_per_ft: f64) -> CalibrationMapping {
        establish(SegmentPixels::new(px_per_ft * 10.0, 0.0), 10.0, Unit::Ft, 1.0, 1e-9).unwrap()
    }

    fn boxed(x0: f64, y0: f64, x1: f64, y1: f64) -> RegionBoundary {
        RegionBoundary::from_corners(Point::new(x0, y0), Point::new(x1, y1))
    }

    #[test]
    fn test_boundary_area_and_contains() {
        let b = boxed(10.0, 10.0, 0.0, 0.0);
        assert_eq!(b.area(), 100.0);
        assert!(b.contains(&Point::new(10.0, 5.0)));
        assert!(!b.contains(&Point::new(10.1, 5.0)));

        let tri = RegionBoundary::Polygon {
            points: vec![Point::new(0.0, 0.0), Point::new(10.0, 0.0), Point::new(0.0, 10.0)],
        };
        assert_eq!(tri.area(), 50.0);
        assert!(tri.contains(&Point::new(2.0, 2.0)));
        assert!(!tri.contains(&Point::new(8.0, 8.0)));
    }

    #[test]
    fn test_region_rejects_zero_area() {
        let flat = boxed(0.0, 0.0, 10.0, 0.0);
        assert!(matches!(
            ScaleRegion::new(flat, mapping(40.0), "flat"),
            Err(MeasureError::DegenerateGeometry(_))
        ));

        let collinear = RegionBoundary::Polygon {
            points: vec![Point::new(0.0, 0.0), Point::new(5.0, 5.0), Point::new(10.0, 10.0)],
        };
        assert!(ScaleRegion::new(collinear, mapping(40.0), "line").is_err());
    }

    #[test]
    fn test_resolve_fallback() {
        let index = ScaleRegionIndex::new();
        let global = mapping(40.0);
        assert_eq!(index.resolve(&Point::new(1.0, 1.0), &global).id(), global.id());
    }

    #[test]
    fn test_resolve_smallest_wins() {
        let global = mapping(40.0);
        let outer = ScaleRegion::new(boxed(0.0, 0.0, 1000.0, 1000.0), mapping(20.0), "plan").unwrap();
        let inner = ScaleRegion::new(boxed(100.0, 100.0, 200.0, 200.0), mapping(80.0), "detail").unwrap();

        let mut index = ScaleRegionIndex::new();
        // Registration order must not matter
        index.register(inner.clone());
        index.register(outer.clone());

        let p_inner = Point::new(150.0, 150.0);
        let p_outer = Point::new(500.0, 500.0);
        let p_none = Point::new(-5.0, 0.0);

        assert_eq!(index.resolve(&p_inner, &global).id(), inner.calibration().id());
        assert_eq!(index.resolve(&p_outer, &global).id(), outer.calibration().id());
        assert_eq!(index.resolve(&p_none, &global).id(), global.id());
    }

    #[test]
    fn test_equal_area_earliest_wins() {
        let global = mapping(40.0);
        let first = ScaleRegion::new(boxed(0.0, 0.0, 10.0, 10.0), mapping(1.0), "first").unwrap();
        let second = ScaleRegion::new(boxed(0.0, 0.0, 10.0, 10.0), mapping(2.0), "second").unwrap();
        let mut index = ScaleRegionIndex::new();
        index.register(first.clone());
        index.register(second);
        assert_eq!(index.resolve(&Point::new(5.0, 5.0), &global).id(), first.calibration().id());
    }

    #[test]
    fn test_polygon_region() {
        let global = mapping(40.0);
        let l_shape = RegionBoundary::Polygon {
            points: vec![
                Point::new(0.0, 0.0),
                Point::new(100.0, 0.0),
                Point::new(100.0, 40.0),
                Point::new(40.0, 40.0),
                Point::new(40.0, 100.0),
                Point::new(0.0, 100.0),
            ],
        };
        let region = ScaleRegion::new(l_shape, mapping(10.0), "wing").unwrap();
        let mut index = ScaleRegionIndex::new();
        index.register(region.clone());

        assert_eq!(index.resolve(&Point::new(20.0, 80.0), &global).id(), region.calibration().id());
        // Inside the bounding box but in the notch
        assert_eq!(index.resolve(&Point::new(80.0, 80.0), &global).id(), global.id());
    }

    #[test]
    fn test_register_replace_and_unregister() {
        let region = ScaleRegion::new(boxed(0.0, 0.0, 10.0, 10.0), mapping(5.0), "a").unwrap();
        let id = region.id();
        let mut index = ScaleRegionIndex::new();
        index.register(region.clone());
        index.register(region);
        assert_eq!(index.len(), 1);

        assert!(index.unregister(id).is_some());
        assert!(index.unregister(id).is_none());
        assert!(index.is_empty());
    }

    #[test]
    fn test_resolve_context() {
        let region = ScaleRegion::new(boxed(0.0, 0.0, 10.0, 10.0), mapping(5.0), "a").unwrap();
        let mut index = ScaleRegionIndex::new();
        index.register(region.clone());

        let empty = CalibrationContext::none();
        let inside = index.resolve_context(&Point::new(5.0, 5.0), &empty);
        assert_eq!(inside.mapping().unwrap().id(), region.calibration().id());

        let outside = index.resolve_context(&Point::new(50.0, 5.0), &empty);
        assert!(matches!(outside.mapping(), Err(MeasureError::NoActiveCalibration)));
    }

    struct HostGroups(Vec<ScaleRegion>);

    impl RegionSource for HostGroups {
        fn list_regions_near(&self, _point: &Point) -> Vec<ScaleRegion> {
            self.0.clone()
        }
    }

    #[test]
    fn test_resolve_from_source() {
        let global = mapping(40.0);
        let big = ScaleRegion::new(boxed(0.0, 0.0, 100.0, 100.0), mapping(2.0), "big").unwrap();
        let small = ScaleRegion::new(boxed(0.0, 0.0, 20.0, 20.0), mapping(3.0), "small").unwrap();
        let host = HostGroups(vec![big.clone(), small.clone()]);

        let resolved = resolve_from_source(&host, &Point::new(10.0, 10.0), &global);
        assert_eq!(resolved.id(), small.calibration().id());
        let resolved = resolve_from_source(&host, &Point::new(50.0, 50.0), &global);
        assert_eq!(resolved.id(), big.calibration().id());
        let resolved = resolve_from_source(&host, &Point::new(500.0, 50.0), &global);
        assert_eq!(resolved.id(), global.id());
    }

    #[test]
    fn test_index_as_region_source() {
        let region = ScaleRegion::new(boxed(0.0, 0.0, 10.0, 10.0), mapping(5.0), "a").unwrap();
        let mut index = ScaleRegionIndex::new();
        index.register(region);
        assert_eq!(index.list_regions_near(&Point::new(1.0, 1.0)).len(), 1);
        assert!(index.list_regions_near(&Point::new(11.0, 1.0)).is_empty());
    }

    #[test]
    fn test_deserialize_rejects_zero_area_region() {
        let region = ScaleRegion::new(boxed(0.0, 0.0, 50.0, 50.0), mapping(20.0), "Detail").unwrap();
        let json = serde_json::to_value(&region).unwrap();
        let back: ScaleRegion = serde_json::from_value(json.clone()).unwrap();
        assert_eq!(back, region);

        let mut flat = json;
        flat["boundary"]["max"]["y"] = serde_json::json!(0.0);
        let err = serde_json::from_value::<ScaleRegion>(flat).unwrap_err();
        assert!(err.to_string().contains("encloses no area"));
    }
}
