//! Engine configuration
//!
//! Tunables for calibration and label formatting. Configuration can be
//! loaded from a JSON file, environment variables, or built programmatically.

use crate::units::Unit;
use std::fs;
use std::path::Path;

/// Configuration for calibration and measurement formatting.
#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
#[serde(default)]
pub struct MeasureConfig {
    /// Segments at or below this pixel length are degenerate
    pub epsilon: f64,
    /// Cross-axis multiplier applied to single-segment calibrations
    pub axis_correction: f64,
    /// Unit assumed when a calibration label carries neither mark nor unit
    pub default_unit: Unit,
    /// Decimal places in formatted labels
    pub label_precision: usize,
    /// Default number of entries returned by history views
    pub history_limit: usize,
}

impl Default for MeasureConfig {
    fn default() -> Self {
        Self {
            epsilon: 1e-9,
            axis_correction: 1.0,
            default_unit: Unit::Ft,
            label_precision: 2,
            history_limit: 50,
        }
    }
}

impl MeasureConfig {
    /// Sets the degenerate-segment threshold in pixels.
    pub fn with_epsilon(mut self, epsilon: f64) -> Self {
        self.epsilon = epsilon;
        self
    }

    /// Sets the cross-axis correction factor.
    pub fn with_axis_correction(mut self, factor: f64) -> Self {
        self.axis_correction = factor;
        self
    }

    /// Sets the fallback unit for calibration labels.
    pub fn with_default_unit(mut self, unit: Unit) -> Self {
        self.default_unit = unit;
        self
    }

    /// Sets the label precision.
    pub fn with_label_precision(mut self, precision: usize) -> Self {
        self.label_precision = precision;
        self
    }

    /// Sets the default history length.
    pub fn with_history_limit(mut self, limit: usize) -> Self {
        self.history_limit = limit;
        self
    }

    /// Checks that every numeric setting is usable.
    ///
    /// # Errors
    /// Returns [`ConfigError::InvalidValue`] naming the first bad key.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if !(self.epsilon.is_finite() && self.epsilon >= 0.0) {
            return Err(ConfigError::InvalidValue("epsilon".to_string()));
        }
        if !(self.axis_correction.is_finite() && self.axis_correction > 0.0) {
            return Err(ConfigError::InvalidValue("axis_correction".to_string()));
        }
        Ok(())
    }

    /// Applies environment overrides on top of the defaults.
    ///
    /// Environment variables:
    /// - `PLANSCALE_EPSILON`: degenerate-segment threshold in pixels
    /// - `PLANSCALE_AXIS_CORRECTION`: cross-axis multiplier (default: 1.0)
    /// - `PLANSCALE_DEFAULT_UNIT`: unit code for bare calibration labels (default: ft)
    /// - `PLANSCALE_LABEL_PRECISION`: decimal places in labels (default: 2)
    /// - `PLANSCALE_HISTORY_LIMIT`: default history length (default: 50)
    ///
    /// # Errors
    /// Returns an error if any environment variable contains an invalid value.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::default().with_env_overrides()
    }

    /// Applies environment overrides on top of this configuration.
    ///
    /// # Errors
    /// Returns an error if any environment variable contains an invalid value.
    pub fn with_env_overrides(mut self) -> Result<Self, ConfigError> {
        if let Some(val) = env_value("PLANSCALE_EPSILON") {
            self.epsilon = parse_env("PLANSCALE_EPSILON", &val)?;
        }
        if let Some(val) = env_value("PLANSCALE_AXIS_CORRECTION") {
            self.axis_correction = parse_env("PLANSCALE_AXIS_CORRECTION", &val)?;
        }
        if let Some(val) = env_value("PLANSCALE_DEFAULT_UNIT") {
            self.default_unit = parse_env("PLANSCALE_DEFAULT_UNIT", &val)?;
        }
        if let Some(val) = env_value("PLANSCALE_LABEL_PRECISION") {
            self.label_precision = parse_env("PLANSCALE_LABEL_PRECISION", &val)?;
        }
        if let Some(val) = env_value("PLANSCALE_HISTORY_LIMIT") {
            self.history_limit = parse_env("PLANSCALE_HISTORY_LIMIT", &val)?;
        }
        self.validate()?;
        Ok(self)
    }

    /// Loads configuration from a JSON file.
    ///
    /// Missing keys keep their defaults:
    /// ```json
    /// { "axis_correction": 1.0, "default_unit": "m", "label_precision": 3 }
    /// ```
    ///
    /// # Errors
    /// Returns an error if the file cannot be read, parsed, or validated.
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let contents = fs::read_to_string(path.as_ref())?;
        let config: Self = serde_json::from_str(&contents)?;
        config.validate()?;
        Ok(config)
    }

    /// Saves configuration to a JSON file.
    ///
    /// # Errors
    /// Returns an error if the file cannot be written.
    pub fn save_to_file<P: AsRef<Path>>(&self, path: P) -> Result<(), ConfigError> {
        let json = serde_json::to_string_pretty(self)?;
        fs::write(path.as_ref(), json)?;
        Ok(())
    }
}

fn env_value(key: &str) -> Option<String> {
    std::env::var(key).ok().filter(|v| !v.trim().is_empty())
}

fn parse_env<T: std::str::FromStr>(key: &str, value: &str) -> Result<T, ConfigError> {
    value
        .trim()
        .parse::<T>()
        .map_err(|_| ConfigError::InvalidValue(key.to_string()))
}

/// Errors that can occur during configuration operations.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("invalid value for configuration key: {0}")]
    InvalidValue(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("config parse error: {0}")]
    Parse(#[from] serde_json::Error),
}
