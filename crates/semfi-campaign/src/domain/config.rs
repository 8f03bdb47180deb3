//! Campaign configuration types.
//!
//! [`CampaignConfig`] is the single source of truth for all runtime
//! settings.  It is built once at startup (CLI arguments over an optional
//! TOML file over defaults) and then passed by reference into every
//! constructor that needs it.
//!
//! # Design rationale
//!
//! Keeping configuration as a plain struct (no global settings module, no
//! environment reads inside the domain) means the transport, session, and
//! profile constructors can be driven from tests with hand-built configs.
//! The infrastructure layer owns populating the struct; nothing in the
//! injection path ever consults ambient state.

use std::collections::HashMap;
use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Default serial device for the SEM monitor link.
pub const DEFAULT_DEVICE: &str = "/dev/ttyUSB0";

/// Default baud rate of the UART link.
pub const DEFAULT_BAUD: u32 = 1_250_000;

/// Selected time profile plus its opaque argument map.
///
/// Argument values stay as strings; each profile constructor parses and
/// validates the keys it understands and rejects what it cannot.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProfileSpec {
    /// Registry name of the time profile (e.g. `"uniform"`, `"poisson"`).
    pub name: String,
    /// `key = "value"` arguments forwarded verbatim to the constructor.
    #[serde(default)]
    pub args: HashMap<String, String>,
}

impl ProfileSpec {
    /// Builds a profile selection from a name and `key=value` pairs.
    pub fn new(name: impl Into<String>, args: HashMap<String, String>) -> Self {
        Self {
            name: name.into(),
            args,
        }
    }
}

/// All runtime configuration for one campaign.
///
/// | Field                  | Default        |
/// |------------------------|----------------|
/// | device                 | `/dev/ttyUSB0` |
/// | baud                   | 1 250 000      |
/// | reg_id_width           | 8 bits         |
/// | reg_inject_disabled    | false          |
/// | preflight_required     | true           |
/// | stop_on_exhaustion     | true           |
/// | prompt_timeout_s       | 0.5 s          |
/// | status_window_s        | 0.3 s          |
/// | debug                  | false          |
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CampaignConfig {
    /// Serial device path of the UART link.
    pub device: String,

    /// Baud rate of the UART link.
    pub baud: u32,

    /// Bit width of register ids on the wire (1..=8).  8 bits supports ids
    /// 1..=255; id 0 stays reserved as the hardware idle value.
    pub reg_id_width: u8,

    /// Administratively disables register injection; register targets are
    /// then served by the recording no-op backend.
    pub reg_inject_disabled: bool,

    /// Whether a failed preflight (no status response from the monitor)
    /// aborts the campaign.  When false the failure is logged and the
    /// campaign proceeds.
    pub preflight_required: bool,

    /// When true (default) an exhausted pool ends the campaign; when false
    /// the controller rewinds the pool and keeps cycling targets until
    /// another stop condition fires.
    pub stop_on_exhaustion: bool,

    /// How long blocking setup calls wait for a prompt sentinel.
    pub prompt_timeout_s: f64,

    /// Collection window for the status report after an `S` query.
    pub status_window_s: f64,

    /// Campaign-wide seed for reproducible random draws.  Profiles fall
    /// back to this when neither a profile-local seed nor `time_seed` is
    /// given.
    pub global_seed: Option<u64>,

    /// Seed consumed by the external pool builder; carried here so one
    /// config value describes the whole reproducible run.
    pub area_seed: Option<u64>,

    /// Seed for time-profile draws; overrides `global_seed`.
    pub time_seed: Option<u64>,

    /// Selected time profile and its arguments.
    pub profile: ProfileSpec,

    /// Debug mode: talk to the in-process stub device instead of real
    /// hardware, allowing full campaign runs without a board.
    pub debug: bool,
}

impl Default for CampaignConfig {
    fn default() -> Self {
        Self {
            device: DEFAULT_DEVICE.to_string(),
            baud: DEFAULT_BAUD,
            reg_id_width: 8,
            reg_inject_disabled: false,
            preflight_required: true,
            stop_on_exhaustion: true,
            prompt_timeout_s: 0.5,
            status_window_s: 0.3,
            global_seed: None,
            area_seed: None,
            time_seed: None,
            profile: ProfileSpec {
                name: "uniform".to_string(),
                args: HashMap::new(),
            },
            debug: false,
        }
    }
}

impl CampaignConfig {
    /// Prompt-wait timeout as a [`Duration`].
    pub fn prompt_timeout(&self) -> Duration {
        Duration::from_secs_f64(self.prompt_timeout_s.max(0.0))
    }

    /// Status collection window as a [`Duration`].
    pub fn status_window(&self) -> Duration {
        Duration::from_secs_f64(self.status_window_s.max(0.0))
    }

    /// The seed stochastic profiles should use when their argument map does
    /// not carry a local `seed`: `time_seed` wins over `global_seed`.
    pub fn effective_time_seed(&self) -> Option<u64> {
        self.time_seed.or(self.global_seed)
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
