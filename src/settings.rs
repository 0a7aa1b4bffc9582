use anyhow::{ensure, Context, Result};
use clap::Parser;
use config::{Config, Environment, File, FileFormat};
use log::info;
use nalgebra::Complex;
use serde::Deserialize;
use std::env;
use std::fmt;
use std::path::{Path, PathBuf};

use crate::error::StackError;
use crate::material::Material;
use crate::problem::Problem;
use crate::stack::{LayerSpec, Stack};
use crate::sweep::{SweepConfig, SweepParameter};
use crate::wave::IncidentWave;


/// A complex number in a configuration file: a real number or `[re, im]`.
#[derive(Debug, Clone, Copy, Deserialize, PartialEq)]
#[serde(untagged)]
pub enum ComplexValue {
    Real(f64),
    Complex([f64; 2]),
}

impl From<ComplexValue> for Complex<f64> {
    fn from(value: ComplexValue) -> Self {
        match value {
            ComplexValue::Real(re) => Complex::new(re, 0.0),
            ComplexValue::Complex([re, im]) => Complex::new(re, im),
        }
    }
}

/// A permittivity or permeability in a configuration file: a scalar or 3x3 rows.
#[derive(Debug, Clone, Deserialize, PartialEq)]
#[serde(untagged)]
pub enum MaterialConfig {
    Scalar(ComplexValue),
    Rows(Vec<Vec<ComplexValue>>),
}

impl MaterialConfig {
    pub fn to_material(&self) -> Result<Material, StackError> {
        match self {
            MaterialConfig::Scalar(value) => Ok(Material::isotropic(Complex::from(*value))),
            MaterialConfig::Rows(rows) => {
                let rows: Vec<Vec<Complex<f64>>> = rows
                    .iter()
                    .map(|row| row.iter().map(|&v| Complex::from(v)).collect())
                    .collect();
                Material::from_rows(&rows)
            }
        }
    }
}

fn default_mu() -> MaterialConfig {
    MaterialConfig::Scalar(ComplexValue::Real(1.0))
}

#[derive(Debug, Clone, Deserialize, PartialEq)]
pub struct LayerConfig {
    pub name: String,
    pub epsilon: MaterialConfig,
    #[serde(default = "default_mu")]
    pub mu: MaterialConfig,
    pub thickness: Option<f64>, // omitted for the first and last layer
}

impl LayerConfig {
    pub fn to_layer(&self) -> Result<LayerSpec, StackError> {
        Ok(LayerSpec {
            name: self.name.clone(),
            epsilon: self.epsilon.to_material()?,
            mu: self.mu.to_material()?,
            thickness: self.thickness,
        })
    }
}

/// Field profile along the stack normal, written after the main solve.
#[derive(Debug, Clone, Copy, Deserialize, PartialEq)]
pub struct ProfileConfig {
    pub start: f64,
    pub end: f64,
    pub count: usize,
}

/// Runtime configuration for the application. Angles are in degrees.
#[derive(Debug, Clone, Deserialize, PartialEq)]
pub struct Settings {
    pub wavelength: f64,
    pub theta: f64,
    pub phi: f64,
    pub psi: f64,
    #[serde(default = "default_tolerance")]
    pub tolerance: f64,
    pub layers: Vec<LayerConfig>,
    pub sweep: Option<SweepConfig>,
    pub profile: Option<ProfileConfig>,
    #[serde(default = "default_directory")]
    pub directory: PathBuf,
}

fn default_tolerance() -> f64 {
    crate::config::DEFAULT_BALANCE_TOLERANCE
}

fn default_directory() -> PathBuf {
    PathBuf::from("strata_run")
}

impl Settings {
    /// Parses and validates settings from TOML text.
    pub fn from_toml_str(text: &str) -> Result<Self> {
        let config = Config::builder()
            .add_source(File::from_str(text, FileFormat::Toml))
            .build()
            .context("Error loading configuration")?;
        let settings: Settings = config
            .try_deserialize()
            .context("Error deserializing configuration")?;
        validate_config(&settings)?;
        Ok(settings)
    }

    /// Builds the stack and incident wave described by these settings.
    pub fn problem(&self) -> Result<Problem, StackError> {
        let layers = self
            .layers
            .iter()
            .map(LayerConfig::to_layer)
            .collect::<Result<Vec<_>, _>>()?;
        let stack = Stack::new(layers)?;
        let wave = IncidentWave::new(
            self.wavelength,
            self.theta.to_radians(),
            self.phi.to_radians(),
            self.psi.to_radians(),
        )?;
        Ok(Problem::new(stack, wave).with_tolerance(self.tolerance))
    }

    /// Overrides file values with the command-line arguments that were given.
    pub fn apply(&mut self, args: &CliArgs) {
        if let Some(wavelength) = args.w {
            self.wavelength = wavelength;
        }
        if let Some(theta) = args.theta {
            self.theta = theta;
        }
        if let Some(phi) = args.phi {
            self.phi = phi;
        }
        if let Some(psi) = args.psi {
            self.psi = psi;
        }
        if let Some(tol) = args.tol {
            self.tolerance = tol;
        }
        if let Some(sweep) = args.sweep {
            self.sweep = Some(sweep);
        }
        if let Some(profile) = args.profile {
            self.profile = Some(profile);
        }
        if let Some(dir) = &args.dir {
            self.directory = dir.clone();
        }
    }
}

/// Loads `config/default.toml` alone, without environment or command-line
/// overrides.
pub fn load_default_config() -> Result<Settings> {
    let strata_dir = retrieve_project_root()?;
    let default_config_file = strata_dir.join("config/default.toml");

    let settings: Config = Config::builder()
        .add_source(File::from(default_config_file).required(true))
        .build()
        .context("Error loading configuration")?;

    let config: Settings = settings
        .try_deserialize()
        .context("Error deserializing configuration")?;

    validate_config(&config)?;

    Ok(config)
}

/// Loads the settings for a run from the command line of the process.
pub fn load_config() -> Result<Settings> {
    load_config_with_cli(&CliArgs::parse())
}

/// Loads the settings for a run: the configuration file, then `STRATA_*`
/// environment variables, then the given command-line arguments.
pub fn load_config_with_cli(args: &CliArgs) -> Result<Settings> {
    let config_file = match &args.config {
        Some(path) => path.clone(),
        None => {
            let strata_dir = retrieve_project_root()?;
            let default_config_file = strata_dir.join("config/default.toml");
            let local_config = strata_dir.join("config/local.toml");
            // Check if local config exists, if not use default
            if local_config.exists() {
                local_config
            } else {
                default_config_file
            }
        }
    };
    info!("Using configuration: {}", config_file.display());

    let settings: Config = Config::builder()
        .add_source(File::from(config_file.as_path()).required(true))
        .add_source(Environment::with_prefix("strata").try_parsing(true))
        .build()
        .with_context(|| format!("Error loading configuration {}", config_file.display()))?;

    let mut config: Settings = settings
        .try_deserialize()
        .context("Error deserializing configuration")?;

    config.apply(args);

    validate_config(&config)?;

    Ok(config)
}

/// Retrieve the project root directory.
/// This function tries to find the project root directory in different ways:
/// 1. If the CARGO_MANIFEST_DIR environment variable is set, use it.
/// 2. If the STRATA_ROOT_DIR environment variable is set, use it.
/// 3. If the "config" subdirectory is found in the executable directory or any of its parents, use it.
pub fn retrieve_project_root() -> Result<PathBuf> {
    if let Ok(manifest_dir) = env::var("CARGO_MANIFEST_DIR") {
        return Ok(PathBuf::from(manifest_dir));
    }
    if let Ok(path) = env::var("STRATA_ROOT_DIR") {
        return Ok(PathBuf::from(path));
    }
    let exe_path = env::current_exe().context("Failed to get current executable path")?;
    exe_path
        .ancestors()
        .skip(1)
        .find(|dir| dir.join("config").is_dir())
        .map(Path::to_path_buf)
        .context("Could not find project root directory")
}

fn validate_config(config: &Settings) -> Result<()> {
    ensure!(
        config.wavelength.is_finite() && config.wavelength > 0.0,
        "Wavelength must be greater than 0"
    );
    ensure!(
        config.tolerance.is_finite() && config.tolerance >= 0.0,
        "Tolerance must be a non-negative number"
    );
    ensure!(config.layers.len() >= 2, "At least two layers are required");
    if let Some(sweep) = &config.sweep {
        ensure!(sweep.count > 0, "Sweep count must be at least 1");
    }
    if let Some(profile) = &config.profile {
        ensure!(profile.count > 0, "Profile count must be at least 1");
    }
    Ok(())
}

#[derive(Parser, Debug, Default)]
#[command(version, about = "Strata - transfer-matrix optics of anisotropic multilayers")]
pub struct CliArgs {
    /// Vacuum wavelength, in the length unit of the layer thicknesses.
    #[arg(short, long)]
    w: Option<f64>,

    /// Polar angle of incidence in degrees, measured in the first layer.
    #[arg(long, allow_negative_numbers = true)]
    theta: Option<f64>,

    /// Azimuth of the plane of incidence in degrees.
    #[arg(long, allow_negative_numbers = true)]
    phi: Option<f64>,

    /// Polarization angle in degrees. 0 is p (TM), 90 is s (TE).
    #[arg(long, allow_negative_numbers = true)]
    psi: Option<f64>,

    /// Tolerance on the energy-balance residual |1 - R - T - A|.
    #[arg(long)]
    tol: Option<f64>,

    /// Path to a configuration file, replacing config/default.toml.
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Sweep a parameter after the main solve.
    /// Format: parameter,start,stop,count with parameter one of wavelength, theta.
    #[arg(long, value_parser = parse_sweep)]
    sweep: Option<SweepConfig>,

    /// Write the field along the stack normal.
    /// Format: start,end,count
    #[arg(long, value_parser = parse_profile, allow_hyphen_values = true)]
    profile: Option<ProfileConfig>,

    /// Output directory.
    #[arg(long)]
    dir: Option<PathBuf>,
}

/// Parse a sweep in the format "parameter,start,stop,count"
fn parse_sweep(s: &str) -> Result<SweepConfig, String> {
    let parts: Vec<&str> = s.split(',').map(str::trim).collect();
    let [parameter, start, stop, count] = parts.as_slice() else {
        return Err(format!(
            "Invalid sweep format: '{}'. Expected 'parameter,start,stop,count'",
            s
        ));
    };
    let parameter = match *parameter {
        "wavelength" => SweepParameter::Wavelength,
        "theta" => SweepParameter::Theta,
        other => return Err(format!("Unknown sweep parameter: {}", other)),
    };
    Ok(SweepConfig {
        parameter,
        start: parse_value(start)?,
        stop: parse_value(stop)?,
        count: count
            .parse()
            .map_err(|_| format!("Failed to parse sweep count: {}", count))?,
    })
}

/// Parse a profile in the format "start,end,count"
fn parse_profile(s: &str) -> Result<ProfileConfig, String> {
    let parts: Vec<&str> = s.split(',').map(str::trim).collect();
    let [start, end, count] = parts.as_slice() else {
        return Err(format!(
            "Invalid profile format: '{}'. Expected 'start,end,count'",
            s
        ));
    };
    Ok(ProfileConfig {
        start: parse_value(start)?,
        end: parse_value(end)?,
        count: count
            .parse()
            .map_err(|_| format!("Failed to parse profile count: {}", count))?,
    })
}

fn parse_value(s: &str) -> Result<f64, String> {
    s.parse::<f64>()
        .map_err(|_| format!("Failed to parse number: {}", s))
}

impl fmt::Display for Settings {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Settings:
  - Wavelength: {:.6}
  - Theta: {:.4}°
  - Phi: {:.4}°
  - Psi: {:.4}°
  - Tolerance: {:.1e}
  - Layers: {}
  - Output Directory: {}
",
            self.wavelength,
            self.theta,
            self.phi,
            self.psi,
            self.tolerance,
            self.layers.iter().map(|layer| layer.name.as_str()).collect::<Vec<_>>().join(" / "),
            self.directory.display(),
        )
    }
}
