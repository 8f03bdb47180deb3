//! CLI shim: command-line arguments over an optional TOML config file.
//!
//! This is deliberately the thinnest possible layer: it produces the one
//! immutable [`CampaignConfig`] value and hands it to the application.  No
//! other module reads arguments, files, or environment variables.
//!
//! Precedence per setting: CLI flag > config file > built-in default.

use std::path::PathBuf;

use clap::Parser;
use thiserror::Error;

use crate::domain::CampaignConfig;

/// Error type for configuration assembly.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config file {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse config file {path}: {source}")]
    Parse {
        path: String,
        #[source]
        source: toml::de::Error,
    },

    /// A `--profile-arg` value was not of the form `key=value`.
    #[error("malformed profile argument {0:?}, expected key=value")]
    BadProfileArg(String),
}

/// SEMFI fault-injection campaign driver.
///
/// Drives configuration-memory and register error injections over the UART
/// link to a SEM-monitored FPGA, on the schedule of the selected time
/// profile.
#[derive(Parser, Debug)]
#[command(name = "semfi-campaign", version, about)]
pub struct Cli {
    /// Campaign configuration file (TOML).
    #[arg(long, env = "SEMFI_CONFIG")]
    pub config: Option<PathBuf>,

    /// Materialised target pool file (TOML), produced by the pool builder.
    #[arg(long, env = "SEMFI_POOL")]
    pub pool: PathBuf,

    /// Serial device of the SEM monitor link.
    #[arg(long)]
    pub device: Option<String>,

    /// Baud rate of the UART link.
    #[arg(long)]
    pub baud: Option<u32>,

    /// Time profile name (uniform, ramp, poisson, microburst, mmpp2, trace).
    #[arg(long)]
    pub profile: Option<String>,

    /// Profile argument as key=value; repeatable.
    #[arg(long = "profile-arg", value_name = "KEY=VALUE")]
    pub profile_args: Vec<String>,

    /// Campaign-wide seed for reproducible runs.
    #[arg(long)]
    pub seed: Option<u64>,

    /// Seed for time-profile draws (wins over --seed).
    #[arg(long)]
    pub time_seed: Option<u64>,

    /// Skip the mandatory preflight verification.
    #[arg(long)]
    pub no_preflight: bool,

    /// Run against the in-process stub device instead of hardware.
    #[arg(long)]
    pub debug: bool,
}

/// Assembles the campaign configuration from the file (if any) and the CLI
/// overrides.
pub fn build_config(cli: &Cli) -> Result<CampaignConfig, ConfigError> {
    let mut config = match &cli.config {
        Some(path) => load_config_file(path)?,
        None => CampaignConfig::default(),
    };

    if let Some(device) = &cli.device {
        config.device = device.clone();
    }
    if let Some(baud) = cli.baud {
        config.baud = baud;
    }
    if let Some(profile) = &cli.profile {
        config.profile.name = profile.clone();
        // A profile switched on the command line does not inherit the
        // file's arguments for a different profile.
        config.profile.args.clear();
    }
    for pair in &cli.profile_args {
        let (key, value) = pair
            .split_once('=')
            .ok_or_else(|| ConfigError::BadProfileArg(pair.clone()))?;
        config
            .profile
            .args
            .insert(key.trim().to_string(), value.trim().to_string());
    }
    if let Some(seed) = cli.seed {
        config.global_seed = Some(seed);
    }
    if let Some(seed) = cli.time_seed {
        config.time_seed = Some(seed);
    }
    if cli.no_preflight {
        config.preflight_required = false;
    }
    if cli.debug {
        config.debug = true;
    }

    Ok(config)
}

fn load_config_file(path: &PathBuf) -> Result<CampaignConfig, ConfigError> {
    let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
        path: path.display().to_string(),
        source,
    })?;
    toml::from_str(&text).map_err(|source| ConfigError::Parse {
        path: path.display().to_string(),
        source,
    })
}

// ── Tests ─────────────────────────────────────────────────────────────────────
