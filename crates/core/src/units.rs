//! Unit conversion
//!
//! Every supported unit is defined by how many meters one unit spans.
//! Conversions go through meters, so any pair of units converts with a
//! single multiply and divide.

use crate::error::{MeasureError, MeasureResult};
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

/// A supported length unit
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, serde::Serialize, serde::Deserialize,
)]
#[serde(rename_all = "lowercase")]
pub enum Unit {
    Ft,
    In,
    Yd,
    Mi,
    M,
    Cm,
    Mm,
    Km,
}

impl Unit {
    /// All units in table order
    pub const ALL: [Unit; 8] = [
        Unit::Ft,
        Unit::In,
        Unit::Yd,
        Unit::Mi,
        Unit::M,
        Unit::Cm,
        Unit::Mm,
        Unit::Km,
    ];

    /// Meters spanned by one of this unit
    pub fn meters_per_unit(self) -> f64 {
        match self {
            Unit::Ft => 0.3048,
            Unit::In => 0.0254,
            Unit::Yd => 0.9144,
            Unit::Mi => 1609.344,
            Unit::M => 1.0,
            Unit::Cm => 0.01,
            Unit::Mm => 0.001,
            Unit::Km => 1000.0,
        }
    }

    /// Short code used in labels and exports
    pub fn code(self) -> &'static str {
        match self {
            Unit::Ft => "ft",
            Unit::In => "in",
            Unit::Yd => "yd",
            Unit::Mi => "mi",
            Unit::M => "m",
            Unit::Cm => "cm",
            Unit::Mm => "mm",
            Unit::Km => "km",
        }
    }

    /// Whether this is an imperial unit
    pub fn is_imperial(self) -> bool {
        matches!(self, Unit::Ft | Unit::In | Unit::Yd | Unit::Mi)
    }

    /// Convert a length from this unit into `to`
    pub fn convert(self, value: f64, to: Unit) -> f64 {
        if self == to {
            return value;
        }
        value * self.meters_per_unit() / to.meters_per_unit()
    }

    /// Convert an area (square units) from this unit into `to`
    pub fn convert_area(self, value: f64, to: Unit) -> f64 {
        if self == to {
            return value;
        }
        let factor = self.meters_per_unit() / to.meters_per_unit();
        value * factor * factor
    }

    /// Convert a volume (cubic units) from this unit into `to`
    pub fn convert_volume(self, value: f64, to: Unit) -> f64 {
        if self == to {
            return value;
        }
        let factor = self.meters_per_unit() / to.meters_per_unit();
        value * factor * factor * factor
    }
}

impl fmt::Display for Unit {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.code())
    }
}

impl FromStr for Unit {
    type Err = MeasureError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let unit = match s.trim().to_ascii_lowercase().as_str() {
            "ft" | "foot" | "feet" => Unit::Ft,
            "in" | "inch" | "inches" => Unit::In,
            "yd" | "yard" | "yards" => Unit::Yd,
            "mi" | "mile" | "miles" => Unit::Mi,
            "m" | "meter" | "meters" | "metre" | "metres" => Unit::M,
            "cm" | "centimeter" | "centimeters" | "centimetre" | "centimetres" => Unit::Cm,
            "mm" | "millimeter" | "millimeters" | "millimetre" | "millimetres" => Unit::Mm,
            "km" | "kilometer" | "kilometers" | "kilometre" | "kilometres" => Unit::Km,
            _ => return Err(MeasureError::UnknownUnit(s.to_string())),
        };
        Ok(unit)
    }
}

/// Convert `value` between two unit codes
pub fn convert(value: f64, from: &str, to: &str) -> MeasureResult<f64> {
    let from: Unit = from.parse()?;
    let to: Unit = to.parse()?;
    Ok(from.convert(value, to))
}

/// Express `value` in every supported unit
pub fn all_conversions(value: f64, from: &str) -> MeasureResult<BTreeMap<Unit, f64>> {
    let from: Unit = from.parse()?;
    Ok(Unit::ALL
        .iter()
        .map(|&unit| (unit, from.convert(value, unit)))
        .collect())
}

/// Format a length in feet as a feet-inches label, e.g. `10' 6"`
///
/// Rounds to the nearest whole inch.
pub fn format_feet_inches(feet: f64) -> String {
    let sign = if feet < 0.0 { "-" } else { "" };
    let total_inches = (feet.abs() * 12.0).round() as u64;
    format!("{sign}{}' {}\"", total_inches / 12, total_inches % 12)
}
