//! CSV export for measurement reports and calibrations
//!
//! Writes ledger rows and calibration mappings for spreadsheets and
//! takeoff tools.

use crate::calibration::CalibrationMapping;
use crate::ledger::ExportRow;
use std::io::Write;

/// Error types for CSV export
#[derive(Debug, thiserror::Error)]
pub enum CsvExportError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("CSV serialization error: {0}")]
    Csv(#[from] csv::Error),
}

pub type CsvExportResult<T> = Result<T, CsvExportError>;

/// Configuration for CSV export
#[derive(Debug, Clone)]
pub struct CsvExportConfig {
    /// Include column headers in the output
    pub include_headers: bool,

    /// CSV delimiter character
    pub delimiter: u8,

    /// Decimals used for the Value column; `None` writes full precision
    pub value_precision: Option<usize>,
}

impl Default for CsvExportConfig {
    fn default() -> Self {
        Self {
            include_headers: true,
            delimiter: b',',
            value_precision: None,
        }
    }
}

/// Export ledger rows to CSV format
///
/// CSV columns:
/// - Index: 1-based position in the ledger
/// - Type: Measurement kind (Linear, Area, ...)
/// - Value: Primary value in real-world units
/// - Unit: Unit label (e.g., "ft", "m²", "°")
/// - Extra: Secondary values as `key=value` pairs
/// - Timestamp: Unix milliseconds
pub fn export_rows_csv<W: Write>(
    writer: W,
    rows: &[ExportRow],
    config: &CsvExportConfig,
) -> CsvExportResult<()> {
    let mut csv_writer = csv::WriterBuilder::new()
        .delimiter(config.delimiter)
        .has_headers(config.include_headers)
        .from_writer(writer);

    if config.include_headers {
        csv_writer.write_record(["Index", "Type", "Value", "Unit", "Extra", "Timestamp"])?;
    }

    for row in rows {
        csv_writer.write_record(&[
            row.index.to_string(),
            row.kind.to_string(),
            format_value(row.value, config.value_precision),
            row.unit.clone(),
            row.extra.clone(),
            row.timestamp.to_string(),
        ])?;
    }

    csv_writer.flush()?;
    Ok(())
}

/// Export calibration mappings to CSV format
///
/// CSV columns:
/// - ID: Calibration identifier
/// - Orientation: Horizontal, Vertical or Diagonal
/// - Pixels Per Unit X / Y: Scale along each axis
/// - Reference Distance: True distance of the reference segment
/// - Unit: Reference unit
/// - Axis Correction: Orthogonal axis correction factor
/// - Element: Host element tag, if any
/// - Created: Unix milliseconds
pub fn export_calibrations_csv<W: Write>(
    writer: W,
    mappings: &[&CalibrationMapping],
    config: &CsvExportConfig,
) -> CsvExportResult<()> {
    let mut csv_writer = csv::WriterBuilder::new()
        .delimiter(config.delimiter)
        .has_headers(config.include_headers)
        .from_writer(writer);

    if config.include_headers {
        csv_writer.write_record([
            "ID",
            "Orientation",
            "Pixels Per Unit X",
            "Pixels Per Unit Y",
            "Reference Distance",
            "Unit",
            "Axis Correction",
            "Element",
            "Created",
        ])?;
    }

    for mapping in mappings {
        csv_writer.write_record(&[
            mapping.id().to_string(),
            format!("{:?}", mapping.orientation()),
            format_value(mapping.pixels_per_unit_x(), config.value_precision),
            format_value(mapping.pixels_per_unit_y(), config.value_precision),
            format_value(mapping.reference_distance(), config.value_precision),
            mapping.reference_unit().to_string(),
            mapping.axis_correction().to_string(),
            mapping
                .element_ref()
                .map(|e| e.as_str().to_string())
                .unwrap_or_default(),
            mapping.created_at().to_string(),
        ])?;
    }

    csv_writer.flush()?;
    Ok(())
}

fn format_value(value: f64, precision: Option<usize>) -> String {
    match precision {
        Some(p) => format!("{value:.p$}"),
        None => value.to_string(),
    }
}
