//! Computed measurements
//!
//! A measurement is the result of one finalized interaction: the computed
//! values for its kind, the unit they are expressed in, when it was taken,
//! and the host element it annotates. Geometry is not retained; recompute
//! from fresh geometry and replace the entry instead.

use crate::calculators::{
    self, CircleMetrics, CutoutMetrics, SlopeMetrics, SlopeRatio, VolumeMetrics,
};
use crate::calibration::CalibrationContext;
use crate::error::MeasureResult;
use crate::geometry::{ElementRef, Point};
use crate::units::Unit;
use std::fmt;

/// Kind of measurement
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, serde::Serialize, serde::Deserialize)]
pub enum MeasurementKind {
    Linear,
    Area,
    Polyline,
    Volume,
    Angle,
    Circle,
    Cutout,
    Slope,
    Count,
}

impl MeasurementKind {
    pub const ALL: [MeasurementKind; 9] = [
        MeasurementKind::Linear,
        MeasurementKind::Area,
        MeasurementKind::Polyline,
        MeasurementKind::Volume,
        MeasurementKind::Angle,
        MeasurementKind::Circle,
        MeasurementKind::Cutout,
        MeasurementKind::Slope,
        MeasurementKind::Count,
    ];

    pub fn name(self) -> &'static str {
        match self {
            MeasurementKind::Linear => "Linear",
            MeasurementKind::Area => "Area",
            MeasurementKind::Polyline => "Polyline",
            MeasurementKind::Volume => "Volume",
            MeasurementKind::Angle => "Angle",
            MeasurementKind::Circle => "Circle",
            MeasurementKind::Cutout => "Cutout",
            MeasurementKind::Slope => "Slope",
            MeasurementKind::Count => "Count",
        }
    }
}

impl fmt::Display for MeasurementKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Computed values, one variant per kind
#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum MeasurementValue {
    Linear { length: f64 },
    Area { area: f64, perimeter: f64 },
    Polyline { length: f64, segments: usize },
    Volume(VolumeMetrics),
    Angle { degrees: f64 },
    Circle(CircleMetrics),
    Cutout(CutoutMetrics),
    Slope(SlopeMetrics),
    Count { number: u64 },
}

/// A computed measurement
#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct Measurement {
    value: MeasurementValue,
    /// Length unit the values are based on; `None` for angles and counts
    unit: Option<Unit>,
    /// Unix timestamp in milliseconds
    created_at: i64,
    element_ref: Option<ElementRef>,
}

impl Measurement {
    /// Wrap already-computed values
    pub fn new(value: MeasurementValue, unit: Option<Unit>) -> Self {
        Self {
            value,
            unit,
            created_at: crate::unix_millis(),
            element_ref: None,
        }
    }

    fn calibrated(value: MeasurementValue, ctx: &CalibrationContext) -> MeasureResult<Self> {
        let unit = ctx.mapping()?.reference_unit();
        Ok(Self::new(value, Some(unit)))
    }

    /// Straight distance between two points
    pub fn linear(p1: Point, p2: Point, ctx: &CalibrationContext) -> MeasureResult<Self> {
        let length = calculators::linear_distance(p1, p2, ctx)?;
        Self::calibrated(MeasurementValue::Linear { length }, ctx)
    }

    /// Closed polygon area with its perimeter
    pub fn area(points: &[Point], ctx: &CalibrationContext) -> MeasureResult<Self> {
        let area = calculators::polygon_area(points, ctx)?;
        let perimeter = calculators::perimeter(points, ctx)?;
        Self::calibrated(MeasurementValue::Area { area, perimeter }, ctx)
    }

    /// Open path length
    pub fn polyline(points: &[Point], ctx: &CalibrationContext) -> MeasureResult<Self> {
        let length = calculators::polyline_length(points, ctx)?;
        let segments = points.len().saturating_sub(1);
        Self::calibrated(MeasurementValue::Polyline { length, segments }, ctx)
    }

    /// Prism volume over a polygonal base
    pub fn volume(base: &[Point], height: f64, ctx: &CalibrationContext) -> MeasureResult<Self> {
        let metrics = calculators::volume(base, height, ctx)?;
        Self::calibrated(MeasurementValue::Volume(metrics), ctx)
    }

    /// Angle at a vertex; needs no calibration
    pub fn angle(p1: Point, vertex: Point, p2: Point) -> MeasureResult<Self> {
        let degrees = calculators::angle_at_vertex(p1, vertex, p2)?;
        Ok(Self::new(MeasurementValue::Angle { degrees }, None))
    }

    /// Circle from its drawn bounding size
    pub fn circle(width_px: f64, height_px: f64, ctx: &CalibrationContext) -> MeasureResult<Self> {
        let metrics = calculators::circle_metrics(width_px, height_px, ctx)?;
        Self::calibrated(MeasurementValue::Circle(metrics), ctx)
    }

    /// Net area after cutouts
    pub fn cutout(main: &[Point], cutouts: &[Vec<Point>], ctx: &CalibrationContext) -> MeasureResult<Self> {
        let metrics = calculators::cutout_net_area(main, cutouts, ctx)?;
        Self::calibrated(MeasurementValue::Cutout(metrics), ctx)
    }

    /// Slope between two points
    pub fn slope(p1: Point, p2: Point, ctx: &CalibrationContext) -> MeasureResult<Self> {
        let metrics = calculators::slope(p1, p2, ctx)?;
        Self::calibrated(MeasurementValue::Slope(metrics), ctx)
    }

    /// Count marker following `previous`
    pub fn count(previous: u64) -> Self {
        Self::new(
            MeasurementValue::Count {
                number: calculators::count_marker(previous),
            },
            None,
        )
    }

    /// Link this measurement to a host element
    pub fn with_element_ref(mut self, element_ref: ElementRef) -> Self {
        self.element_ref = Some(element_ref);
        self
    }

    pub fn value(&self) -> &MeasurementValue {
        &self.value
    }

    pub fn unit(&self) -> Option<Unit> {
        self.unit
    }

    pub fn created_at(&self) -> i64 {
        self.created_at
    }

    pub fn element_ref(&self) -> Option<&ElementRef> {
        self.element_ref.as_ref()
    }

    pub fn kind(&self) -> MeasurementKind {
        match self.value {
            MeasurementValue::Linear { .. } => MeasurementKind::Linear,
            MeasurementValue::Area { .. } => MeasurementKind::Area,
            MeasurementValue::Polyline { .. } => MeasurementKind::Polyline,
            MeasurementValue::Volume(_) => MeasurementKind::Volume,
            MeasurementValue::Angle { .. } => MeasurementKind::Angle,
            MeasurementValue::Circle(_) => MeasurementKind::Circle,
            MeasurementValue::Cutout(_) => MeasurementKind::Cutout,
            MeasurementValue::Slope(_) => MeasurementKind::Slope,
            MeasurementValue::Count { .. } => MeasurementKind::Count,
        }
    }

    /// The headline number for reports
    ///
    /// Circles report area, cutouts their net area, slopes their angle.
    pub fn primary_value(&self) -> f64 {
        match &self.value {
            MeasurementValue::Linear { length } => *length,
            MeasurementValue::Area { area, .. } => *area,
            MeasurementValue::Polyline { length, .. } => *length,
            MeasurementValue::Volume(v) => v.volume,
            MeasurementValue::Angle { degrees } => *degrees,
            MeasurementValue::Circle(c) => c.area,
            MeasurementValue::Cutout(c) => c.net_area,
            MeasurementValue::Slope(s) => s.degrees,
            MeasurementValue::Count { number } => *number as f64,
        }
    }

    /// Unit suffix of [`Self::primary_value`], e.g. `ft`, `ft²`, `ft³`, `°`
    pub fn unit_label(&self) -> String {
        let code = self.unit.map(Unit::code).unwrap_or("");
        match self.kind() {
            MeasurementKind::Linear | MeasurementKind::Polyline => code.to_string(),
            MeasurementKind::Area | MeasurementKind::Circle | MeasurementKind::Cutout => {
                format!("{code}²")
            }
            MeasurementKind::Volume => format!("{code}³"),
            MeasurementKind::Angle | MeasurementKind::Slope => "°".to_string(),
            MeasurementKind::Count => String::new(),
        }
    }

    /// Label drawn next to the measurement on the canvas
    pub fn formatted_label(&self, precision: usize) -> String {
        match &self.value {
            MeasurementValue::Angle { degrees } => format!("{:.*}°", precision, degrees),
            MeasurementValue::Slope(s) => match s.percentage {
                Some(pct) => format!("{} ({:.*}%)", s.ratio, precision, pct),
                None => s.ratio.to_string(),
            },
            MeasurementValue::Count { number } => format!("#{number}"),
            _ => format!("{:.*} {}", precision, self.primary_value(), self.unit_label()),
        }
    }

    /// Secondary values as `key=value` pairs for reports
    pub fn extra(&self, precision: usize) -> String {
        let code = self.unit.map(Unit::code).unwrap_or("");
        let p = precision;
        match &self.value {
            MeasurementValue::Area { perimeter, .. } => format!("perimeter={perimeter:.p$} {code}"),
            MeasurementValue::Polyline { segments, .. } => format!("segments={segments}"),
            MeasurementValue::Volume(v) => format!(
                "base_area={:.p$} {code}²; height={:.p$} {code}",
                v.base_area, v.height
            ),
            MeasurementValue::Circle(c) => format!(
                "radius={:.p$} {code}; diameter={:.p$} {code}; circumference={:.p$} {code}",
                c.radius, c.diameter, c.circumference
            ),
            MeasurementValue::Cutout(c) => format!(
                "gross_area={:.p$} {code}²; cutouts={}; deducted={:.p$} {code}²",
                c.gross_area,
                c.cutout_areas.len(),
                c.cutout_areas.iter().sum::<f64>()
            ),
            MeasurementValue::Slope(s) => {
                let grade = s
                    .percentage
                    .map(|pct| format!("{pct:.p$}%"))
                    .unwrap_or_else(|| "undefined".to_string());
                format!(
                    "rise={:.p$} {code}; run={:.p$} {code}; ratio={}; grade={grade}",
                    s.rise, s.run, s.ratio
                )
            }
            MeasurementValue::Linear { .. }
            | MeasurementValue::Angle { .. }
            | MeasurementValue::Count { .. } => String::new(),
        }
    }

    /// Re-express every value in `to`
    ///
    /// Angles, counts and slope ratios are unit-free and pass through.
    pub fn converted(&self, to: Unit) -> Self {
        let Some(from) = self.unit else {
            return self.clone();
        };
        let len = |v: f64| from.convert(v, to);
        let area = |v: f64| from.convert_area(v, to);
        let value = match &self.value {
            MeasurementValue::Linear { length } => MeasurementValue::Linear { length: len(*length) },
            MeasurementValue::Area { area: a, perimeter } => MeasurementValue::Area {
                area: area(*a),
                perimeter: len(*perimeter),
            },
            MeasurementValue::Polyline { length, segments } => MeasurementValue::Polyline {
                length: len(*length),
                segments: *segments,
            },
            MeasurementValue::Volume(v) => MeasurementValue::Volume(VolumeMetrics {
                base_area: area(v.base_area),
                height: len(v.height),
                volume: from.convert_volume(v.volume, to),
            }),
            MeasurementValue::Circle(c) => MeasurementValue::Circle(CircleMetrics {
                radius: len(c.radius),
                diameter: len(c.diameter),
                circumference: len(c.circumference),
                area: area(c.area),
            }),
            MeasurementValue::Cutout(c) => MeasurementValue::Cutout(CutoutMetrics {
                gross_area: area(c.gross_area),
                cutout_areas: c.cutout_areas.iter().map(|&a| area(a)).collect(),
                net_area: area(c.net_area),
            }),
            MeasurementValue::Slope(s) => MeasurementValue::Slope(SlopeMetrics {
                rise: len(s.rise),
                run: len(s.run),
                ratio: s.ratio,
                percentage: s.percentage,
                degrees: s.degrees,
            }),
            other @ (MeasurementValue::Angle { .. } | MeasurementValue::Count { .. }) => other.clone(),
        };
        Self {
            value,
            unit: Some(to),
            created_at: self.created_at,
            element_ref: self.element_ref.clone(),
        }
    }

    /// Whether this slope is vertical
    pub fn is_vertical_slope(&self) -> bool {
        matches!(
            &self.value,
            MeasurementValue::Slope(SlopeMetrics { ratio: SlopeRatio::Vertical, .. })
        )
    }
}
