//! Measurement calculators
//!
//! Pure functions from canvas geometry and an explicit calibration to
//! real-world values. Lengths come out in the calibration's reference unit,
//! areas in square units and volumes in cubic units.
//!
//! Lengths use a per-axis approximation: a segment is measured along its
//! own dominant axis with that axis's scale. Diagonal segments are therefore
//! reduced to their longer component rather than transformed in 2D.

use crate::calibration::{CalibrationContext, CalibrationMapping};
use crate::error::{require_positive, MeasureError, MeasureResult};
use crate::geometry::{shoelace_area, Point};
use std::f64::consts::PI;
use std::fmt;

/// Distance between two points along the segment's dominant axis.
///
/// Fails with `DegenerateGeometry` when the points coincide.
pub fn linear_distance(p1: Point, p2: Point, ctx: &CalibrationContext) -> MeasureResult<f64> {
    let mapping = ctx.mapping()?;
    if p1 == p2 {
        return Err(MeasureError::DegenerateGeometry(
            "segment endpoints coincide".to_string(),
        ));
    }
    Ok(axis_distance(&p1, &p2, mapping))
}

/// Dominant-axis distance; zero for coincident points
fn axis_distance(p1: &Point, p2: &Point, mapping: &CalibrationMapping) -> f64 {
    let dx = (p2.x - p1.x).abs();
    let dy = (p2.y - p1.y).abs();
    if dx >= dy {
        mapping.horizontal_to_units(dx)
    } else {
        mapping.vertical_to_units(dy)
    }
}

fn require_polygon(points: &[Point]) -> MeasureResult<()> {
    if points.len() < 3 {
        return Err(MeasureError::DegenerateGeometry(format!(
            "polygon needs at least 3 points, got {}",
            points.len()
        )));
    }
    Ok(())
}

/// Area of a closed polygon in square units.
///
/// Shoelace area in pixel space divided by both axis scales. Independent of
/// the starting vertex and winding direction.
pub fn polygon_area(points: &[Point], ctx: &CalibrationContext) -> MeasureResult<f64> {
    let mapping = ctx.mapping()?;
    require_polygon(points)?;
    let pixel_area = shoelace_area(points).abs();
    Ok(pixel_area / (mapping.pixels_per_unit_x() * mapping.pixels_per_unit_y()))
}

/// Perimeter of a closed polygon: the sum of its edge lengths.
pub fn perimeter(points: &[Point], ctx: &CalibrationContext) -> MeasureResult<f64> {
    let mapping = ctx.mapping()?;
    require_polygon(points)?;
    let n = points.len();
    Ok((0..n)
        .map(|i| axis_distance(&points[i], &points[(i + 1) % n], mapping))
        .sum())
}

/// Length of an open path: the sum of its segment lengths.
pub fn polyline_length(points: &[Point], ctx: &CalibrationContext) -> MeasureResult<f64> {
    let mapping = ctx.mapping()?;
    if points.len() < 2 {
        return Err(MeasureError::DegenerateGeometry(format!(
            "polyline needs at least 2 points, got {}",
            points.len()
        )));
    }
    Ok(points
        .windows(2)
        .map(|w| axis_distance(&w[0], &w[1], mapping))
        .sum())
}

/// Angle at `vertex` between the rays to `p1` and `p2`, in degrees `[0, 180]`.
///
/// Calibration-independent.
pub fn angle_at_vertex(p1: Point, vertex: Point, p2: Point) -> MeasureResult<f64> {
    let (ax, ay) = (p1.x - vertex.x, p1.y - vertex.y);
    let (bx, by) = (p2.x - vertex.x, p2.y - vertex.y);
    let mag_a = ax.hypot(ay);
    let mag_b = bx.hypot(by);
    if mag_a == 0.0 || mag_b == 0.0 {
        return Err(MeasureError::DegenerateGeometry(
            "angle arm has zero length".to_string(),
        ));
    }
    let cos = ((ax * bx + ay * by) / (mag_a * mag_b)).clamp(-1.0, 1.0);
    Ok(cos.acos().to_degrees())
}

/// Derived circle dimensions
#[derive(Debug, Clone, Copy, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct CircleMetrics {
    pub radius: f64,
    pub diameter: f64,
    pub circumference: f64,
    pub area: f64,
}

/// Circle dimensions from a drawn bounding width and height.
///
/// The radius averages the horizontal and vertical half-extents, each with
/// its own axis scale.
pub fn circle_metrics(width_px: f64, height_px: f64, ctx: &CalibrationContext) -> MeasureResult<CircleMetrics> {
    let mapping = ctx.mapping()?;
    for (value, what) in [(width_px, "circle width"), (height_px, "circle height")] {
        if value == 0.0 {
            return Err(MeasureError::DegenerateGeometry(format!("{what} is zero")));
        }
        require_positive(value, what)?;
    }
    let rx = width_px / 2.0 / mapping.pixels_per_unit_x();
    let ry = height_px / 2.0 / mapping.pixels_per_unit_y();
    let radius = (rx + ry) / 2.0;
    Ok(CircleMetrics {
        radius,
        diameter: 2.0 * radius,
        circumference: 2.0 * PI * radius,
        area: PI * radius * radius,
    })
}

/// Prism volume over a polygonal base
#[derive(Debug, Clone, Copy, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct VolumeMetrics {
    pub base_area: f64,
    pub height: f64,
    pub volume: f64,
}

/// Volume of a prism with the given base, `height` already in the calibrated unit.
pub fn volume(base_points: &[Point], height: f64, ctx: &CalibrationContext) -> MeasureResult<VolumeMetrics> {
    let base_area = polygon_area(base_points, ctx)?;
    require_positive(height, "height")?;
    Ok(VolumeMetrics {
        base_area,
        height,
        volume: base_area * height,
    })
}

/// Gross, subtracted and net areas
#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct CutoutMetrics {
    pub gross_area: f64,
    /// Area of each cutout, in input order
    pub cutout_areas: Vec<f64>,
    pub net_area: f64,
}

/// Net area of `main` after subtracting each cutout.
///
/// Cutouts are not checked for containment or overlap. A cutout reaching
/// outside `main` yields a net area that does not describe real geometry.
pub fn cutout_net_area(
    main: &[Point],
    cutouts: &[Vec<Point>],
    ctx: &CalibrationContext,
) -> MeasureResult<CutoutMetrics> {
    let gross_area = polygon_area(main, ctx)?;
    let cutout_areas = cutouts
        .iter()
        .map(|cutout| polygon_area(cutout, ctx))
        .collect::<MeasureResult<Vec<_>>>()?;
    let net_area = gross_area - cutout_areas.iter().sum::<f64>();
    if net_area < 0.0 {
        tracing::warn!(gross_area, net_area, "cutouts exceed the gross area");
    }
    Ok(CutoutMetrics {
        gross_area,
        cutout_areas,
        net_area,
    })
}

/// Rise-to-run ratio of a slope
#[derive(Debug, Clone, Copy, PartialEq, serde::Serialize, serde::Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum SlopeRatio {
    /// Reduced `rise:run` with the unreduced quotient
    Ratio { rise: u64, run: u64, value: f64 },
    /// Run too short to express in hundredths; shown as `value:1`
    Unreduced { value: f64 },
    /// Zero run
    Vertical,
}

impl SlopeRatio {
    /// Numeric rise/run, `None` when vertical
    pub fn value(&self) -> Option<f64> {
        match self {
            SlopeRatio::Ratio { value, .. } | SlopeRatio::Unreduced { value } => Some(*value),
            SlopeRatio::Vertical => None,
        }
    }
}

impl fmt::Display for SlopeRatio {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SlopeRatio::Ratio { rise, run, .. } => write!(f, "{rise}:{run}"),
            SlopeRatio::Unreduced { value } => write!(f, "{value:.2}:1"),
            SlopeRatio::Vertical => f.write_str("vertical"),
        }
    }
}

/// Slope between two points
#[derive(Debug, Clone, Copy, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct SlopeMetrics {
    /// Vertical extent in the reference unit
    pub rise: f64,
    /// Horizontal extent in the reference unit
    pub run: f64,
    pub ratio: SlopeRatio,
    /// Grade in percent, `None` when vertical
    pub percentage: Option<f64>,
    pub degrees: f64,
}

/// Slope of the segment from `p1` to `p2`.
///
/// The ratio text is reduced by the GCD of rise and run in hundredths.
pub fn slope(p1: Point, p2: Point, ctx: &CalibrationContext) -> MeasureResult<SlopeMetrics> {
    let mapping = ctx.mapping()?;
    let rise = mapping.vertical_to_units(p2.y - p1.y);
    let run = mapping.horizontal_to_units(p2.x - p1.x);
    if rise == 0.0 && run == 0.0 {
        return Err(MeasureError::DegenerateGeometry(
            "slope endpoints coincide".to_string(),
        ));
    }
    if run == 0.0 {
        return Ok(SlopeMetrics {
            rise,
            run,
            ratio: SlopeRatio::Vertical,
            percentage: None,
            degrees: 90.0,
        });
    }

    let value = rise / run;
    let rise_hundredths = (rise * 100.0).round() as u64;
    let run_hundredths = (run * 100.0).round() as u64;
    let ratio = if run_hundredths == 0 {
        SlopeRatio::Unreduced { value }
    } else {
        let divisor = gcd(rise_hundredths, run_hundredths);
        SlopeRatio::Ratio {
            rise: rise_hundredths / divisor,
            run: run_hundredths / divisor,
            value,
        }
    };
    Ok(SlopeMetrics {
        rise,
        run,
        ratio,
        percentage: Some(value * 100.0),
        degrees: value.atan().to_degrees(),
    })
}

fn gcd(mut a: u64, mut b: u64) -> u64 {
    while b != 0 {
        let t = a % b;
        a = b;
        b = t;
    }
    a
}

/// Next number in a count sequence
pub fn count_marker(sequence_number: u64) -> u64 {
    sequence_number.saturating_add(1)
}
