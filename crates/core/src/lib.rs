//! PlanScale Core Library
//!
//! Calibrated measurement engine for plan drawings: turns on-canvas pixel
//! geometry into real-world lengths, areas, volumes, angles and slopes.

pub mod calculators;
pub mod calibration;
pub mod config;
pub mod csv_export;
pub mod error;
pub mod geometry;
pub mod label;
pub mod ledger;
pub mod measurement;
pub mod region;
pub mod units;

pub use calculators::{
    angle_at_vertex, circle_metrics, count_marker, cutout_net_area, linear_distance, perimeter,
    polygon_area, polyline_length, slope, volume, CircleMetrics, CutoutMetrics, SlopeMetrics,
    SlopeRatio, VolumeMetrics,
};
pub use calibration::{
    establish, establish_uniform, update_in_place, CalibrationContext, CalibrationId,
    CalibrationManager, CalibrationMapping, Orientation, Scale,
};
pub use config::{ConfigError, MeasureConfig};
pub use csv_export::{
    export_calibrations_csv, export_rows_csv, CsvExportConfig, CsvExportError, CsvExportResult,
};
pub use error::{MeasureError, MeasureResult};
pub use geometry::{ElementRef, Point, SegmentPixels};
pub use label::{format_calibration_label, parse_calibration_label, ParsedLabel};
pub use ledger::{EntryId, ExportRow, KindTotal, LedgerEntry, MeasurementLedger};
pub use measurement::{Measurement, MeasurementKind, MeasurementValue};
pub use region::{RegionBoundary, RegionId, RegionSource, ScaleRegion, ScaleRegionIndex};
pub use units::{all_conversions, convert, Unit};

use std::time::{SystemTime, UNIX_EPOCH};

/// Current wall-clock time in Unix milliseconds
pub(crate) fn unix_millis() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as i64)
        .unwrap_or(0)
}
