//! Time-profile engine.
//!
//! A time profile is a pure scheduling strategy: it decides *when* the next
//! injection fires and drives the [`InjectionController`] in a loop of
//! fetch / sleep / inject / check-stop steps.  Profiles own no hardware
//! knowledge; everything wire-level is behind the controller's router.
//!
//! Profiles are resolved through an explicit [`ProfileRegistry`] (a name →
//! constructor map populated at process start) rather than any runtime
//! discovery, so an unknown profile name fails fast with a clear error
//! before any hardware is touched.
//!
//! # Reproducibility
//!
//! Every stochastic profile draws from a `StdRng` seeded with the effective
//! seed: a profile-local `seed` argument wins over the config's time seed,
//! which wins over the global seed.  Identical seed + identical arguments
//! reproduce an identical delay sequence, independent of execution jitter.

use std::collections::HashMap;

use async_trait::async_trait;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use thiserror::Error;

use super::controller::InjectionController;

pub mod microburst;
pub mod mmpp2;
pub mod poisson;
pub mod ramp;
pub mod trace;
pub mod uniform;

/// Error type for profile resolution and argument parsing.
#[derive(Debug, Error)]
pub enum ProfileError {
    /// The requested profile name is not in the registry.
    #[error("unknown time profile {name:?}; known profiles: {known}")]
    UnknownProfile { name: String, known: String },

    /// A required argument is absent or blank.
    #[error("profile {profile:?} requires argument {arg:?}")]
    MissingArgument {
        profile: &'static str,
        arg: &'static str,
    },

    /// An argument failed to parse or violates its documented range.
    #[error("invalid value {value:?} for argument {arg:?}: {message}")]
    InvalidArgument {
        arg: &'static str,
        value: String,
        message: String,
    },

    /// A trace schedule file could not be read.
    #[error("failed to read trace file {path}: {source}")]
    TraceIo {
        path: String,
        #[source]
        source: std::io::Error,
    },
}

/// One scheduling strategy, driving the controller until a stop condition.
#[async_trait(?Send)]
pub trait TimeProfile: Send + std::fmt::Debug {
    /// Runs the scheduling loop to completion.
    ///
    /// Individual injection failures are absorbed by the controller; this
    /// method only ends on exhaustion, duration/shot limits, or a stop
    /// request, recording the termination reason as it does.
    async fn run(&mut self, controller: &mut InjectionController);
}

/// Opaque `key=value` argument map handed to profile constructors.
///
/// Values stay strings until a constructor parses them; missing keys and
/// blank values both read as "not given", mirroring how argument strings
/// arrive from configuration files and the CLI.
#[derive(Debug, Clone, Default)]
pub struct ProfileArgs {
    map: HashMap<String, String>,
}

impl ProfileArgs {
    pub fn new(map: HashMap<String, String>) -> Self {
        Self { map }
    }

    /// Raw string value, with blank treated as absent.
    pub fn get_str(&self, key: &str) -> Option<&str> {
        self.map
            .get(key)
            .map(|s| s.trim())
            .filter(|s| !s.is_empty())
    }

    /// Optional float argument.
    pub fn get_f64(&self, key: &'static str) -> Result<Option<f64>, ProfileError> {
        match self.get_str(key) {
            None => Ok(None),
            Some(raw) => raw
                .parse::<f64>()
                .map(Some)
                .map_err(|e| ProfileError::InvalidArgument {
                    arg: key,
                    value: raw.to_string(),
                    message: e.to_string(),
                }),
        }
    }

    /// Optional integer argument, accepting `0x`/`0o`/`0b` prefixes.
    pub fn get_u64(&self, key: &'static str) -> Result<Option<u64>, ProfileError> {
        match self.get_str(key) {
            None => Ok(None),
            Some(raw) => parse_u64_auto(raw).map(Some).map_err(|message| {
                ProfileError::InvalidArgument {
                    arg: key,
                    value: raw.to_string(),
                    message,
                }
            }),
        }
    }

    /// Required float argument.
    pub fn require_f64(
        &self,
        profile: &'static str,
        key: &'static str,
    ) -> Result<f64, ProfileError> {
        self.get_f64(key)?
            .ok_or(ProfileError::MissingArgument { profile, arg: key })
    }

    /// The seed this profile should use: the local `seed` argument if
    /// present, otherwise the config-level seed passed in.
    pub fn effective_seed(&self, config_seed: Option<u64>) -> Result<Option<u64>, ProfileError> {
        Ok(self.get_u64("seed")?.or(config_seed))
    }
}

/// Integer parsing with Python-style base auto-detection (`0x2A`, `0o52`,
/// `0b101010`, or plain decimal), as seed values historically arrived in
/// any of these spellings.
fn parse_u64_auto(raw: &str) -> Result<u64, String> {
    let parsed = if let Some(hex) = raw.strip_prefix("0x").or_else(|| raw.strip_prefix("0X")) {
        u64::from_str_radix(hex, 16)
    } else if let Some(oct) = raw.strip_prefix("0o").or_else(|| raw.strip_prefix("0O")) {
        u64::from_str_radix(oct, 8)
    } else if let Some(bin) = raw.strip_prefix("0b").or_else(|| raw.strip_prefix("0B")) {
        u64::from_str_radix(bin, 2)
    } else {
        raw.parse::<u64>()
    };
    parsed.map_err(|e| e.to_string())
}

/// Builds the RNG for a stochastic profile.  `None` means a fresh
/// entropy-seeded generator (non-reproducible runs are allowed, just not
/// the default for campaigns that set any seed).
pub fn make_rng(seed: Option<u64>) -> StdRng {
    match seed {
        Some(seed) => StdRng::seed_from_u64(seed),
        None => StdRng::from_entropy(),
    }
}

/// Draws an exponentially distributed inter-arrival time (seconds) for a
/// Poisson process with the given rate, by inverse-CDF sampling.
///
/// `rate_hz` must be positive; constructors validate that before the loop.
pub fn sample_exponential(rng: &mut StdRng, rate_hz: f64) -> f64 {
    // gen::<f64>() is in [0, 1); reject 0 so ln() stays finite.
    let mut u: f64 = rng.gen();
    while u <= 0.0 {
        u = rng.gen();
    }
    -u.ln() / rate_hz
}

/// Constructor signature every profile module exposes.
///
/// The second parameter is the config-level time seed; each constructor
/// resolves the final seed via [`ProfileArgs::effective_seed`].
pub type ProfileConstructor =
    fn(&ProfileArgs, Option<u64>) -> Result<Box<dyn TimeProfile>, ProfileError>;

/// Explicit name → constructor registry, populated at process start.
pub struct ProfileRegistry {
    constructors: HashMap<&'static str, ProfileConstructor>,
}

impl ProfileRegistry {
    /// Empty registry, for embedding scenarios that bring their own set.
    pub fn new() -> Self {
        Self {
            constructors: HashMap::new(),
        }
    }

    /// Registry with all built-in profiles registered.
    pub fn with_builtins() -> Self {
        let mut registry = Self::new();
        registry.register("uniform", uniform::build);
        registry.register("ramp", ramp::build);
        registry.register("poisson", poisson::build);
        registry.register("microburst", microburst::build);
        registry.register("mmpp2", mmpp2::build);
        registry.register("trace", trace::build);
        registry
    }

    /// Adds or replaces a constructor under `name`.
    pub fn register(&mut self, name: &'static str, constructor: ProfileConstructor) {
        self.constructors.insert(name, constructor);
    }

    /// Registered profile names, sorted for stable error messages.
    pub fn names(&self) -> Vec<&'static str> {
        let mut names: Vec<_> = self.constructors.keys().copied().collect();
        names.sort_unstable();
        names
    }

    /// Resolves and constructs a profile.
    ///
    /// # Errors
    ///
    /// [`ProfileError::UnknownProfile`] for names nobody registered, or the
    /// constructor's own argument errors.
    pub fn build(
        &self,
        name: &str,
        args: &HashMap<String, String>,
        config_seed: Option<u64>,
    ) -> Result<Box<dyn TimeProfile>, ProfileError> {
        let constructor =
            self.constructors
                .get(name)
                .ok_or_else(|| ProfileError::UnknownProfile {
                    name: name.to_string(),
                    known: self.names().join(", "),
                })?;
        constructor(&ProfileArgs::new(args.clone()), config_seed)
    }
}

impl Default for ProfileRegistry {
    fn default() -> Self {
        Self::with_builtins()
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
