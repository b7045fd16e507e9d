use anyhow::{Context, Result};
use clap::{Parser, Subcommand, ValueEnum};
use planscale_core::{
    csv_export, label, CalibrationManager, CalibrationMapping, ElementRef, KindTotal,
    MeasureConfig, Measurement, MeasurementLedger, Point, RegionBoundary, ScaleRegion,
    ScaleRegionIndex, SegmentPixels, Unit,
};
use serde::{Deserialize, Serialize};
use std::ffi::OsString;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};

#[derive(Debug, Parser)]
#[command(name = "planscale")]
#[command(about = "Calibrated measurements for plan drawings")]
pub struct Cli {
    /// JSON configuration file; PLANSCALE_* variables override it.
    #[arg(long, global = true, value_name = "FILE")]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Debug, Subcommand)]
enum Commands {
    /// Convert a value between length units.
    Convert {
        value: f64,
        from: String,
        /// Target unit; omit to print every unit as JSON.
        to: Option<String>,
    },
    /// Establish a calibration from a reference segment.
    Calibrate {
        distance: f64,
        unit: String,
        #[arg(long, allow_hyphen_values = true)]
        dx: f64,
        #[arg(long, allow_hyphen_values = true)]
        dy: f64,
        /// Use the full segment length instead of the dominant axis.
        #[arg(long)]
        uniform: bool,
        #[arg(long, value_enum, default_value_t = OutputFormat::Json)]
        format: OutputFormat,
    },
    /// Recover a calibration from existing label text.
    Reparse {
        text: String,
        #[arg(long, allow_hyphen_values = true)]
        dx: f64,
        #[arg(long, allow_hyphen_values = true)]
        dy: f64,
    },
    /// Run the measurements of a session file.
    ///
    /// Each shape is calibrated by the region holding its first point
    /// (vertex for angles, center for circles).
    Measure {
        #[arg(value_name = "SESSION")]
        session: PathBuf,
        #[arg(long, value_enum, default_value_t = OutputFormat::Json)]
        format: OutputFormat,
    },
    /// Print CLI version.
    Version,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum OutputFormat {
    Json,
    Csv,
}

/// Measurement session read by `measure`
#[derive(Debug, Deserialize)]
struct Session {
    calibration: CalibrationSpec,
    #[serde(default)]
    regions: Vec<RegionSpec>,
    #[serde(default)]
    measurements: Vec<MeasureRequest>,
}

/// Either an explicit distance or label text to recover one from
#[derive(Debug, Deserialize)]
struct CalibrationSpec {
    segment: SegmentPixels,
    distance: Option<f64>,
    unit: Option<String>,
    label: Option<String>,
    #[serde(default)]
    uniform: bool,
    axis_correction: Option<f64>,
    element: Option<String>,
}

#[derive(Debug, Deserialize)]
struct RegionSpec {
    name: String,
    boundary: RegionBoundary,
    calibration: CalibrationSpec,
}

#[derive(Debug, Deserialize)]
struct MeasureRequest {
    #[serde(flatten)]
    shape: Shape,
    element: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
enum Shape {
    Linear { start: Point, end: Point },
    Area { points: Vec<Point> },
    Polyline { points: Vec<Point> },
    Volume { base: Vec<Point>, height: f64 },
    Angle { p1: Point, vertex: Point, p2: Point },
    Circle { center: Point, width: f64, height: f64 },
    Cutout { main: Vec<Point>, cutouts: Vec<Vec<Point>> },
    Slope { start: Point, end: Point },
    Count,
}

impl Shape {
    /// Point used to pick the scale region
    fn anchor(&self) -> Option<Point> {
        match self {
            Shape::Linear { start, .. } | Shape::Slope { start, .. } => Some(*start),
            Shape::Area { points } | Shape::Polyline { points } => points.first().copied(),
            Shape::Volume { base, .. } => base.first().copied(),
            Shape::Angle { vertex, .. } => Some(*vertex),
            Shape::Circle { center, .. } => Some(*center),
            Shape::Cutout { main, .. } => main.first().copied(),
            Shape::Count => None,
        }
    }
}

#[derive(Debug, Serialize)]
struct MeasureOutput {
    calibration: String,
    rows: Vec<planscale_core::ExportRow>,
    totals: Vec<KindTotal>,
    recent: Vec<String>,
}

pub fn run<I, T>(args: I) -> Result<()>
where
    I: IntoIterator<Item = T>,
    T: Into<OsString> + Clone,
{
    let cli = Cli::parse_from(args);
    let config = load_config(cli.config.as_deref())?;

    match cli.command {
        Commands::Convert { value, from, to } => run_convert(value, &from, to.as_deref()),
        Commands::Calibrate { distance, unit, dx, dy, uniform, format } => {
            run_calibrate(config, distance, &unit, SegmentPixels::new(dx, dy), uniform, format)
        }
        Commands::Reparse { text, dx, dy } => run_reparse(config, &text, SegmentPixels::new(dx, dy)),
        Commands::Measure { session, format } => run_measure(config, &session, format),
        Commands::Version => {
            println!("{}", env!("CARGO_PKG_VERSION"));
            Ok(())
        }
    }
}

fn load_config(path: Option<&Path>) -> Result<MeasureConfig> {
    let base = match path {
        Some(path) => MeasureConfig::from_file(path)
            .with_context(|| format!("failed to load config from {}", path.display()))?,
        None => MeasureConfig::default(),
    };
    let config = base.with_env_overrides().context("invalid PLANSCALE_* environment")?;
    tracing::debug!(?config, "configuration loaded");
    Ok(config)
}

fn run_convert(value: f64, from: &str, to: Option<&str>) -> Result<()> {
    match to {
        Some(to) => {
            let converted = planscale_core::convert(value, from, to)?;
            println!("{converted}");
        }
        None => {
            let all = planscale_core::all_conversions(value, from)?;
            println!("{}", serde_json::to_string_pretty(&all)?);
        }
    }
    Ok(())
}

fn run_calibrate(
    config: MeasureConfig,
    distance: f64,
    unit: &str,
    segment: SegmentPixels,
    uniform: bool,
    format: OutputFormat,
) -> Result<()> {
    let unit: Unit = unit.parse()?;
    let mut manager = CalibrationManager::new(config);
    let mapping = if uniform {
        manager.establish_uniform(segment, distance, unit)?
    } else {
        manager.establish(segment, distance, unit)?
    };

    match format {
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(mapping)?),
        OutputFormat::Csv => csv_export::export_calibrations_csv(
            io::stdout().lock(),
            &[mapping],
            &csv_export::CsvExportConfig::default(),
        )?,
    }
    Ok(())
}

fn run_reparse(config: MeasureConfig, text: &str, segment: SegmentPixels) -> Result<()> {
    let mut manager = CalibrationManager::new(config);
    let mapping = manager.reparse(text, segment)?;
    println!("{}", serde_json::to_string_pretty(&mapping)?);
    Ok(())
}

fn run_measure(config: MeasureConfig, session_path: &Path, format: OutputFormat) -> Result<()> {
    if !session_path.is_file() {
        anyhow::bail!("session file does not exist: {}", session_path.display());
    }
    let raw = fs::read_to_string(session_path)
        .with_context(|| format!("failed to read {}", session_path.display()))?;
    let session: Session = serde_json::from_str(&raw)
        .with_context(|| format!("invalid session file {}", session_path.display()))?;

    let precision = config.label_precision;
    let history_limit = config.history_limit;
    let mut manager = CalibrationManager::new(config);
    let global = build_mapping(&manager, &session.calibration).context("failed to calibrate")?;
    manager.set_active(global);
    let global_ctx = manager.context();

    let mut index = ScaleRegionIndex::new();
    for spec in &session.regions {
        let mapping = build_mapping(&manager, &spec.calibration)
            .with_context(|| format!("failed to calibrate region {:?}", spec.name))?;
        let region = ScaleRegion::new(spec.boundary.clone(), mapping, spec.name.clone())
            .with_context(|| format!("invalid region {:?}", spec.name))?;
        index.register(region);
    }

    let mut ledger = MeasurementLedger::new();
    let mut counted = 0;
    for (i, request) in session.measurements.iter().enumerate() {
        let ctx = match request.shape.anchor() {
            Some(anchor) => index.resolve_context(&anchor, &global_ctx),
            None => global_ctx.clone(),
        };
        let measurement = match &request.shape {
            Shape::Linear { start, end } => Measurement::linear(*start, *end, &ctx),
            Shape::Area { points } => Measurement::area(points, &ctx),
            Shape::Polyline { points } => Measurement::polyline(points, &ctx),
            Shape::Volume { base, height } => Measurement::volume(base, *height, &ctx),
            Shape::Angle { p1, vertex, p2 } => Measurement::angle(*p1, *vertex, *p2),
            Shape::Circle { width, height, .. } => Measurement::circle(*width, *height, &ctx),
            Shape::Cutout { main, cutouts } => Measurement::cutout(main, cutouts, &ctx),
            Shape::Slope { start, end } => Measurement::slope(*start, *end, &ctx),
            Shape::Count => {
                let m = Measurement::count(counted);
                counted = planscale_core::count_marker(counted);
                Ok(m)
            }
        }
        .with_context(|| format!("measurement #{} failed", i + 1))?;

        let measurement = match &request.element {
            Some(element) => measurement.with_element_ref(ElementRef::new(element.clone())),
            None => measurement,
        };
        ledger.append(measurement);
    }

    let rows = ledger.export_rows(precision);
    match format {
        OutputFormat::Json => {
            let calibration = manager
                .active()
                .map(|m| m.describe(precision))
                .unwrap_or_default();
            let output = MeasureOutput {
                calibration,
                rows,
                totals: ledger.totals(),
                recent: ledger
                    .history(history_limit)
                    .into_iter()
                    .map(|entry| entry.measurement.formatted_label(precision))
                    .collect(),
            };
            println!("{}", serde_json::to_string_pretty(&output)?);
        }
        OutputFormat::Csv => csv_export::export_rows_csv(
            io::stdout().lock(),
            &rows,
            &csv_export::CsvExportConfig::default(),
        )?,
    }
    Ok(())
}

fn build_mapping(manager: &CalibrationManager, spec: &CalibrationSpec) -> Result<CalibrationMapping> {
    let config = manager.config();
    let (distance, unit) = match (&spec.label, spec.distance) {
        (Some(text), _) => {
            let parsed = label::parse_calibration_label(text, config.default_unit)?
                .with_context(|| format!("label {text:?} holds no calibration distance"))?;
            (parsed.distance, parsed.unit)
        }
        (None, Some(distance)) => {
            let unit = match &spec.unit {
                Some(code) => code.parse::<Unit>()?,
                None => config.default_unit,
            };
            (distance, unit)
        }
        (None, None) => anyhow::bail!("calibration needs either a distance or a label"),
    };

    let mapping = if spec.uniform {
        planscale_core::establish_uniform(spec.segment, distance, unit, config.epsilon)?
    } else {
        planscale_core::establish(
            spec.segment,
            distance,
            unit,
            spec.axis_correction.unwrap_or(config.axis_correction),
            config.epsilon,
        )?
    };
    Ok(match &spec.element {
        Some(element) => mapping.with_element_ref(ElementRef::new(element.clone())),
        None => mapping,
    })
}
