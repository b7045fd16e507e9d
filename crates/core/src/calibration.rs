//! Pixel-to-unit calibration
//!
//! A calibration is derived from one straight reference segment whose true
//! length the user supplies. The segment's dominant axis is measured
//! directly. The orthogonal axis cannot be observed from a single segment,
//! so it is approximated as the primary scale times an axis correction
//! factor. Cross-axis accuracy is only as good as that factor.

use crate::config::MeasureConfig;
use crate::error::{require_positive, MeasureError, MeasureResult};
use crate::geometry::{ElementRef, SegmentPixels};
use crate::label;
use crate::units::Unit;

/// Unique identifier for calibration mappings
pub type CalibrationId = uuid::Uuid;

/// How a calibration was derived
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Orientation {
    Horizontal,
    Vertical,
    /// Derived from the full Euclidean length of the segment
    Diagonal,
}

/// Pixels per real-world unit
#[derive(Debug, Clone, Copy, PartialEq, serde::Serialize, serde::Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Scale {
    /// Same scale on both axes
    Uniform { pixels_per_unit: f64 },
    /// Independent horizontal and vertical scales
    PerAxis { x: f64, y: f64 },
}

impl Scale {
    /// Horizontal pixels per unit
    pub fn x(&self) -> f64 {
        match *self {
            Scale::Uniform { pixels_per_unit } => pixels_per_unit,
            Scale::PerAxis { x, .. } => x,
        }
    }

    /// Vertical pixels per unit
    pub fn y(&self) -> f64 {
        match *self {
            Scale::Uniform { pixels_per_unit } => pixels_per_unit,
            Scale::PerAxis { y, .. } => y,
        }
    }

    pub fn is_uniform(&self) -> bool {
        matches!(self, Scale::Uniform { .. })
    }
}

/// An immutable pixel-to-unit mapping
///
/// Never patched. Updating a calibration produces a new mapping with a new id.
#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
#[serde(try_from = "MappingRecord")]
pub struct CalibrationMapping {
    id: CalibrationId,
    scale: Scale,
    reference_unit: Unit,
    reference_distance: f64,
    orientation: Orientation,
    axis_correction: f64,
    /// Unix timestamp in milliseconds
    created_at: i64,
    element_ref: Option<ElementRef>,
}

/// Unchecked wire form of [`CalibrationMapping`]
#[derive(serde::Deserialize)]
struct MappingRecord {
    id: CalibrationId,
    scale: Scale,
    reference_unit: Unit,
    reference_distance: f64,
    orientation: Orientation,
    axis_correction: f64,
    created_at: i64,
    element_ref: Option<ElementRef>,
}

impl TryFrom<MappingRecord> for CalibrationMapping {
    type Error = MeasureError;

    fn try_from(record: MappingRecord) -> MeasureResult<Self> {
        require_positive(record.scale.x(), "horizontal pixels per unit")?;
        require_positive(record.scale.y(), "vertical pixels per unit")?;
        require_positive(record.reference_distance, "reference distance")?;
        require_positive(record.axis_correction, "axis correction")?;
        Ok(Self {
            id: record.id,
            scale: record.scale,
            reference_unit: record.reference_unit,
            reference_distance: record.reference_distance,
            orientation: record.orientation,
            axis_correction: record.axis_correction,
            created_at: record.created_at,
            element_ref: record.element_ref,
        })
    }
}

impl CalibrationMapping {
    /// Build a mapping from an explicit scale, validating both axes.
    pub fn from_scale(
        scale: Scale,
        reference_distance: f64,
        reference_unit: Unit,
        orientation: Orientation,
    ) -> MeasureResult<Self> {
        require_positive(scale.x(), "horizontal pixels per unit")?;
        require_positive(scale.y(), "vertical pixels per unit")?;
        require_positive(reference_distance, "reference distance")?;
        let axis_correction = match orientation {
            Orientation::Horizontal => scale.y() / scale.x(),
            Orientation::Vertical => scale.x() / scale.y(),
            Orientation::Diagonal => 1.0,
        };
        Ok(Self {
            id: CalibrationId::new_v4(),
            scale,
            reference_unit,
            reference_distance,
            orientation,
            axis_correction,
            created_at: crate::unix_millis(),
            element_ref: None,
        })
    }

    /// Tag this mapping with the host element it was drawn as
    pub fn with_element_ref(mut self, element_ref: ElementRef) -> Self {
        self.element_ref = Some(element_ref);
        self
    }

    pub fn id(&self) -> CalibrationId {
        self.id
    }

    pub fn scale(&self) -> Scale {
        self.scale
    }

    /// Horizontal pixels per unit
    pub fn pixels_per_unit_x(&self) -> f64 {
        self.scale.x()
    }

    /// Vertical pixels per unit
    pub fn pixels_per_unit_y(&self) -> f64 {
        self.scale.y()
    }

    pub fn reference_unit(&self) -> Unit {
        self.reference_unit
    }

    /// True length of the reference segment, in the reference unit
    pub fn reference_distance(&self) -> f64 {
        self.reference_distance
    }

    pub fn orientation(&self) -> Orientation {
        self.orientation
    }

    pub fn axis_correction(&self) -> f64 {
        self.axis_correction
    }

    pub fn created_at(&self) -> i64 {
        self.created_at
    }

    pub fn element_ref(&self) -> Option<&ElementRef> {
        self.element_ref.as_ref()
    }

    /// Convert a horizontal pixel extent into the reference unit
    pub fn horizontal_to_units(&self, pixels: f64) -> f64 {
        pixels.abs() / self.scale.x()
    }

    /// Convert a vertical pixel extent into the reference unit
    pub fn vertical_to_units(&self, pixels: f64) -> f64 {
        pixels.abs() / self.scale.y()
    }

    /// Label such as `40.00 px/ft`, or `40.00 × 36.00 px/ft` for per-axis scales
    pub fn describe(&self, precision: usize) -> String {
        match self.scale {
            Scale::Uniform { pixels_per_unit } => {
                format!("{:.*} px/{}", precision, pixels_per_unit, self.reference_unit)
            }
            Scale::PerAxis { x, y } => format!(
                "{:.*} × {:.*} px/{}",
                precision, x, precision, y, self.reference_unit
            ),
        }
    }
}

/// Derive a mapping from the segment's dominant axis.
///
/// `axis_correction` scales the unmeasured orthogonal axis relative to the
/// measured one. A factor of exactly 1.0 produces a uniform scale.
pub fn establish(
    segment: SegmentPixels,
    true_distance: f64,
    unit: Unit,
    axis_correction: f64,
    epsilon: f64,
) -> MeasureResult<CalibrationMapping> {
    let length = segment.length();
    if !length.is_finite() || length <= epsilon {
        return Err(MeasureError::DegenerateGeometry(format!(
            "calibration segment length {length} px is too short"
        )));
    }
    require_positive(true_distance, "true distance")?;
    require_positive(axis_correction, "axis correction")?;

    let (orientation, primary_pixels) = if segment.is_horizontal() {
        (Orientation::Horizontal, segment.dx.abs())
    } else {
        (Orientation::Vertical, segment.dy.abs())
    };
    let primary = require_positive(primary_pixels / true_distance, "pixels per unit")?;
    let cross = require_positive(primary * axis_correction, "cross-axis pixels per unit")?;

    let scale = if axis_correction == 1.0 {
        Scale::Uniform { pixels_per_unit: primary }
    } else if orientation == Orientation::Horizontal {
        Scale::PerAxis { x: primary, y: cross }
    } else {
        Scale::PerAxis { x: cross, y: primary }
    };

    let mapping = CalibrationMapping {
        id: CalibrationId::new_v4(),
        scale,
        reference_unit: unit,
        reference_distance: true_distance,
        orientation,
        axis_correction,
        created_at: crate::unix_millis(),
        element_ref: None,
    };
    tracing::debug!(
        id = %mapping.id,
        ?orientation,
        px_per_unit_x = mapping.scale.x(),
        px_per_unit_y = mapping.scale.y(),
        %unit,
        "calibration established"
    );
    Ok(mapping)
}

/// Derive a uniform mapping from the segment's Euclidean length.
pub fn establish_uniform(
    segment: SegmentPixels,
    true_distance: f64,
    unit: Unit,
    epsilon: f64,
) -> MeasureResult<CalibrationMapping> {
    let length = segment.length();
    if !length.is_finite() || length <= epsilon {
        return Err(MeasureError::DegenerateGeometry(format!(
            "calibration segment length {length} px is too short"
        )));
    }
    require_positive(true_distance, "true distance")?;
    let pixels_per_unit = require_positive(length / true_distance, "pixels per unit")?;

    let mapping = CalibrationMapping {
        id: CalibrationId::new_v4(),
        scale: Scale::Uniform { pixels_per_unit },
        reference_unit: unit,
        reference_distance: true_distance,
        orientation: Orientation::Diagonal,
        axis_correction: 1.0,
        created_at: crate::unix_millis(),
        element_ref: None,
    };
    tracing::debug!(id = %mapping.id, px_per_unit = mapping.scale.x(), %unit, "uniform calibration established");
    Ok(mapping)
}

/// Recompute a mapping after its reference segment moved.
///
/// Keeps the true distance, unit, correction factor and element tag; the
/// result has a new id and supersedes the input.
pub fn update_in_place(
    mapping: &CalibrationMapping,
    new_segment: SegmentPixels,
    epsilon: f64,
) -> MeasureResult<CalibrationMapping> {
    let updated = match mapping.orientation {
        Orientation::Diagonal => establish_uniform(
            new_segment,
            mapping.reference_distance,
            mapping.reference_unit,
            epsilon,
        )?,
        Orientation::Horizontal | Orientation::Vertical => establish(
            new_segment,
            mapping.reference_distance,
            mapping.reference_unit,
            mapping.axis_correction,
            epsilon,
        )?,
    };
    tracing::debug!(old = %mapping.id, new = %updated.id, "calibration superseded");
    Ok(CalibrationMapping {
        element_ref: mapping.element_ref.clone(),
        ..updated
    })
}

/// Explicit calibration handed to every calculator
///
/// An empty context makes calibration-dependent calculators fail with
/// [`MeasureError::NoActiveCalibration`].
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CalibrationContext {
    mapping: Option<CalibrationMapping>,
}

impl CalibrationContext {
    pub fn new(mapping: CalibrationMapping) -> Self {
        Self { mapping: Some(mapping) }
    }

    /// A context without calibration
    pub fn none() -> Self {
        Self::default()
    }

    /// The calibration, or `NoActiveCalibration`
    pub fn mapping(&self) -> MeasureResult<&CalibrationMapping> {
        self.mapping.as_ref().ok_or(MeasureError::NoActiveCalibration)
    }

    pub fn get(&self) -> Option<&CalibrationMapping> {
        self.mapping.as_ref()
    }

    pub fn is_calibrated(&self) -> bool {
        self.mapping.is_some()
    }
}

impl From<CalibrationMapping> for CalibrationContext {
    fn from(mapping: CalibrationMapping) -> Self {
        Self::new(mapping)
    }
}

impl From<Option<CalibrationMapping>> for CalibrationContext {
    fn from(mapping: Option<CalibrationMapping>) -> Self {
        Self { mapping }
    }
}

/// Owner of the active (global) calibration
#[derive(Debug, Clone, Default)]
pub struct CalibrationManager {
    config: MeasureConfig,
    active: Option<CalibrationMapping>,
}

impl CalibrationManager {
    pub fn new(config: MeasureConfig) -> Self {
        Self { config, active: None }
    }

    pub fn config(&self) -> &MeasureConfig {
        &self.config
    }

    /// Establish a calibration from a drawn segment and make it active.
    pub fn establish(
        &mut self,
        segment: SegmentPixels,
        true_distance: f64,
        unit: Unit,
    ) -> MeasureResult<&CalibrationMapping> {
        let mapping = establish(
            segment,
            true_distance,
            unit,
            self.config.axis_correction,
            self.config.epsilon,
        )?;
        Ok(&*self.active.insert(mapping))
    }

    /// Same as [`Self::establish`] with an explicit correction factor.
    pub fn establish_with_correction(
        &mut self,
        segment: SegmentPixels,
        true_distance: f64,
        unit: Unit,
        axis_correction: f64,
    ) -> MeasureResult<&CalibrationMapping> {
        let mapping = establish(segment, true_distance, unit, axis_correction, self.config.epsilon)?;
        Ok(&*self.active.insert(mapping))
    }

    /// Establish a uniform calibration from the full segment length.
    pub fn establish_uniform(
        &mut self,
        segment: SegmentPixels,
        true_distance: f64,
        unit: Unit,
    ) -> MeasureResult<&CalibrationMapping> {
        let mapping = establish_uniform(segment, true_distance, unit, self.config.epsilon)?;
        Ok(&*self.active.insert(mapping))
    }

    /// Recover a calibration from an existing label.
    ///
    /// Returns `Ok(None)` when the text is not a calibration label. A
    /// recovered mapping becomes active.
    pub fn reparse(
        &mut self,
        annotation_text: &str,
        segment: SegmentPixels,
    ) -> MeasureResult<Option<&CalibrationMapping>> {
        let Some(parsed) = label::parse_calibration_label(annotation_text, self.config.default_unit)?
        else {
            tracing::debug!(text = annotation_text, "not a calibration label");
            return Ok(None);
        };
        let mapping = establish(
            segment,
            parsed.distance,
            parsed.unit,
            self.config.axis_correction,
            self.config.epsilon,
        )?;
        Ok(Some(&*self.active.insert(mapping)))
    }

    /// Recompute the active calibration against moved geometry.
    pub fn update_active(&mut self, new_segment: SegmentPixels) -> MeasureResult<&CalibrationMapping> {
        let current = self.active.as_ref().ok_or(MeasureError::NoActiveCalibration)?;
        let updated = update_in_place(current, new_segment, self.config.epsilon)?;
        Ok(&*self.active.insert(updated))
    }

    /// Replace the active calibration with an existing mapping
    pub fn set_active(&mut self, mapping: CalibrationMapping) {
        self.active = Some(mapping);
    }

    pub fn active(&self) -> Option<&CalibrationMapping> {
        self.active.as_ref()
    }

    /// Drop the active calibration
    pub fn clear(&mut self) -> Option<CalibrationMapping> {
        self.active.take()
    }

    /// Snapshot of the active calibration for calculator calls
    pub fn context(&self) -> CalibrationContext {
        CalibrationContext::from(self.active.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const EPS: f64 = 1e-9;

    #[test]
    fn test_establish_horizontal() {
        let mapping = establish(SegmentPixels::new(400.0, 0.0), 10.0, Unit::Ft, 1.0, EPS).unwrap();
        assert_eq!(mapping.orientation(), Orientation::Horizontal);
        assert_eq!(mapping.pixels_per_unit_x(), 40.0);
        assert_eq!(mapping.pixels_per_unit_y(), 40.0);
        assert!(mapping.scale().is_uniform());
        assert_eq!(mapping.reference_distance(), 10.0);
        assert_eq!(mapping.reference_unit(), Unit::Ft);
    }

    #[test]
    fn test_establish_vertical_with_correction() {
        let mapping = establish(SegmentPixels::new(10.0, -300.0), 3.0, Unit::M, 0.5, EPS).unwrap();
        assert_eq!(mapping.orientation(), Orientation::Vertical);
        assert_eq!(mapping.pixels_per_unit_y(), 100.0);
        assert_eq!(mapping.pixels_per_unit_x(), 50.0);
        assert_eq!(mapping.scale(), Scale::PerAxis { x: 50.0, y: 100.0 });
        assert_eq!(mapping.axis_correction(), 0.5);
    }

    #[test]
    fn test_establish_tie_is_horizontal() {
        let mapping = establish(SegmentPixels::new(30.0, 30.0), 1.0, Unit::In, 1.0, EPS).unwrap();
        assert_eq!(mapping.orientation(), Orientation::Horizontal);
        assert_eq!(mapping.pixels_per_unit_x(), 30.0);
    }

    #[test]
    fn test_establish_failures() {
        assert!(matches!(
            establish(SegmentPixels::new(0.0, 0.0), 10.0, Unit::Ft, 1.0, EPS),
            Err(MeasureError::DegenerateGeometry(_))
        ));
        assert!(matches!(
            establish(SegmentPixels::new(0.5, 0.0), 10.0, Unit::Ft, 1.0, 1.0),
            Err(MeasureError::DegenerateGeometry(_))
        ));
        assert!(matches!(
            establish(SegmentPixels::new(100.0, 0.0), 0.0, Unit::Ft, 1.0, EPS),
            Err(MeasureError::InvalidNumericInput(_))
        ));
        assert!(matches!(
            establish(SegmentPixels::new(100.0, 0.0), -4.0, Unit::Ft, 1.0, EPS),
            Err(MeasureError::InvalidNumericInput(_))
        ));
        assert!(matches!(
            establish(SegmentPixels::new(100.0, 0.0), 4.0, Unit::Ft, 0.0, EPS),
            Err(MeasureError::InvalidNumericInput(_))
        ));
    }

    #[test]
    fn test_establish_uniform_is_diagonal() {
        let mapping = establish_uniform(SegmentPixels::new(300.0, 400.0), 5.0, Unit::M, EPS).unwrap();
        assert_eq!(mapping.orientation(), Orientation::Diagonal);
        assert_eq!(mapping.pixels_per_unit_x(), 100.0);
        assert_eq!(mapping.pixels_per_unit_y(), 100.0);
    }

    #[test]
    fn test_update_in_place_supersedes() {
        let original = establish(SegmentPixels::new(400.0, 0.0), 10.0, Unit::Ft, 1.0, EPS)
            .unwrap()
            .with_element_ref(ElementRef::new("line-7"));
        let updated = update_in_place(&original, SegmentPixels::new(0.0, 200.0), EPS).unwrap();

        assert_ne!(updated.id(), original.id());
        assert_eq!(updated.orientation(), Orientation::Vertical);
        assert_eq!(updated.pixels_per_unit_y(), 20.0);
        assert_eq!(updated.reference_distance(), 10.0);
        assert_eq!(updated.reference_unit(), Unit::Ft);
        assert_eq!(updated.element_ref(), Some(&ElementRef::new("line-7")));
        // The original value is untouched
        assert_eq!(original.pixels_per_unit_x(), 40.0);
    }

    #[test]
    fn test_update_keeps_correction_factor() {
        let original = establish(SegmentPixels::new(400.0, 0.0), 10.0, Unit::Ft, 0.8, EPS).unwrap();
        let updated = update_in_place(&original, SegmentPixels::new(800.0, 0.0), EPS).unwrap();
        assert_eq!(updated.pixels_per_unit_x(), 80.0);
        assert!((updated.pixels_per_unit_y() - 64.0).abs() < 1e-9);
    }

    #[test]
    fn test_from_scale_validates() {
        let mapping = CalibrationMapping::from_scale(
            Scale::PerAxis { x: 40.0, y: 20.0 },
            10.0,
            Unit::Ft,
            Orientation::Horizontal,
        )
        .unwrap();
        assert_eq!(mapping.axis_correction(), 0.5);

        assert!(CalibrationMapping::from_scale(
            Scale::Uniform { pixels_per_unit: 0.0 },
            10.0,
            Unit::Ft,
            Orientation::Horizontal,
        )
        .is_err());
    }

    #[test]
    fn test_context() {
        let empty = CalibrationContext::none();
        assert_eq!(empty.mapping(), Err(MeasureError::NoActiveCalibration));
        assert!(!empty.is_calibrated());

        let mapping = establish(SegmentPixels::new(100.0, 0.0), 1.0, Unit::M, 1.0, EPS).unwrap();
        let ctx = CalibrationContext::from(mapping.clone());
        assert_eq!(ctx.mapping().unwrap(), &mapping);
    }

    #[test]
    fn test_manager_lifecycle() {
        let mut manager = CalibrationManager::new(MeasureConfig::default());
        assert!(manager.active().is_none());
        assert!(matches!(
            manager.update_active(SegmentPixels::new(10.0, 0.0)),
            Err(MeasureError::NoActiveCalibration)
        ));

        let first_id = manager
            .establish(SegmentPixels::new(400.0, 0.0), 10.0, Unit::Ft)
            .unwrap()
            .id();
        let second_id = manager.update_active(SegmentPixels::new(200.0, 0.0)).unwrap().id();
        assert_ne!(first_id, second_id);
        assert_eq!(manager.active().unwrap().pixels_per_unit_x(), 20.0);

        let ctx = manager.context();
        assert!(ctx.is_calibrated());

        assert!(manager.clear().is_some());
        assert!(!manager.context().is_calibrated());
    }

    #[test]
    fn test_manager_uses_configured_correction() {
        let config = MeasureConfig::default().with_axis_correction(1.1);
        let mut manager = CalibrationManager::new(config);
        let mapping = manager
            .establish(SegmentPixels::new(100.0, 0.0), 10.0, Unit::Ft)
            .unwrap();
        assert_eq!(mapping.pixels_per_unit_x(), 10.0);
        assert!((mapping.pixels_per_unit_y() - 11.0).abs() < 1e-9);
    }

    #[test]
    fn test_manager_reparse() {
        let mut manager = CalibrationManager::default();
        let mapping = manager
            .reparse("Calibration: 10' 6\" ft", SegmentPixels::new(420.0, 0.0))
            .unwrap()
            .unwrap();
        assert!((mapping.reference_distance() - 10.5).abs() < 1e-9);
        assert!((mapping.pixels_per_unit_x() - 40.0).abs() < 1e-9);
        assert!(manager.active().is_some());

        let mut manager = CalibrationManager::default();
        assert!(manager
            .reparse("Kitchen", SegmentPixels::new(420.0, 0.0))
            .unwrap()
            .is_none());
        assert!(manager.active().is_none());
    }

    #[test]
    fn test_describe() {
        let uniform = establish(SegmentPixels::new(400.0, 0.0), 10.0, Unit::Ft, 1.0, EPS).unwrap();
        assert_eq!(uniform.describe(2), "40.00 px/ft");

        let per_axis = establish(SegmentPixels::new(400.0, 0.0), 10.0, Unit::Ft, 0.5, EPS).unwrap();
        assert_eq!(per_axis.describe(1), "40.0 × 20.0 px/ft");
    }

    #[test]
    fn test_establish_rejects_unrepresentable_scale() {
        assert!(matches!(
            establish(SegmentPixels::new(1e300, 0.0), 1e-10, Unit::Ft, 1.0, EPS),
            Err(MeasureError::InvalidNumericInput(_))
        ));
        assert!(matches!(
            establish_uniform(SegmentPixels::new(1e300, 1e300), 1e-10, Unit::Ft, EPS),
            Err(MeasureError::InvalidNumericInput(_))
        ));
        // Cross axis underflows to zero
        assert!(matches!(
            establish(SegmentPixels::new(1.0, 0.0), 10.0, Unit::Ft, 5e-324, EPS),
            Err(MeasureError::InvalidNumericInput(_))
        ));
    }

    #[test]
    fn test_mapping_serde_round_trip() {
        let mapping = establish(SegmentPixels::new(400.0, 0.0), 10.0, Unit::Ft, 0.75, EPS)
            .unwrap()
            .with_element_ref(ElementRef::new("cal-1"));
        let json = serde_json::to_string(&mapping).unwrap();
        let back: CalibrationMapping = serde_json::from_str(&json).unwrap();
        assert_eq!(back, mapping);
    }

    #[test]
    fn test_deserialize_rejects_invalid_mapping() {
        let mapping = establish(SegmentPixels::new(400.0, 0.0), 10.0, Unit::Ft, 1.0, EPS).unwrap();
        let valid = serde_json::to_value(&mapping).unwrap();

        let mut zero_scale = valid.clone();
        zero_scale["scale"]["pixels_per_unit"] = serde_json::json!(0.0);
        let err = serde_json::from_value::<CalibrationMapping>(zero_scale).unwrap_err();
        assert!(err.to_string().contains("pixels per unit"));

        let mut negative_distance = valid.clone();
        negative_distance["reference_distance"] = serde_json::json!(-5.0);
        assert!(serde_json::from_value::<CalibrationMapping>(negative_distance).is_err());

        let mut bad_correction = valid;
        bad_correction["axis_correction"] = serde_json::json!(0.0);
        assert!(serde_json::from_value::<CalibrationMapping>(bad_correction).is_err());
    }
}
