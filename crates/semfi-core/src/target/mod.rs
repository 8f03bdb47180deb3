//! Injection target model.
//!
//! Every injectable unit in a campaign is a [`Target`]: either a
//! configuration-memory bit addressed by a fixed-width hex string (injected
//! through the SEM monitor) or a CPU register addressed by a small positive
//! id (injected through the register-injection hardware).
//!
//! `Target` is a tagged union, so a value can never carry both an address
//! and a register id, or neither.  The validating constructors are the only
//! way to build one; once built, targets are immutable and are handed to the
//! campaign in a pre-ordered [`pool::TargetPool`].

use thiserror::Error;

pub mod pool;

/// Number of hex digits in a SEM configuration-memory address.
///
/// The SEM monitor's injection command takes a linear frame address printed
/// as exactly ten hex digits; shorter inputs are zero-padded on the left.
pub const CONFIG_ADDRESS_WIDTH: usize = 10;

/// Error type for target construction.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum TargetError {
    /// The configuration address is empty.
    #[error("configuration address must not be empty")]
    EmptyAddress,

    /// The configuration address contains a non-hex character.
    #[error("configuration address {address:?} is not a hex string")]
    NonHexAddress { address: String },

    /// The configuration address is longer than the wire format allows.
    #[error("configuration address {address:?} exceeds {CONFIG_ADDRESS_WIDTH} hex digits")]
    AddressTooLong { address: String },

    /// Register id 0 is reserved as the idle / no-injection value.
    #[error("register id 0 is reserved as the idle id")]
    ZeroRegId,
}

/// Discriminates the two target kinds without borrowing the payload.
///
/// Used for pool statistics and backend provisioning (a pool with no
/// register targets does not need the register-injection backend at all).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TargetKind {
    /// Configuration-memory bit, injected via the SEM monitor.
    Config,
    /// CPU register, injected via the register-injection hardware.
    Reg,
}

impl std::fmt::Display for TargetKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            TargetKind::Config => write!(f, "CONFIG"),
            TargetKind::Reg => write!(f, "REG"),
        }
    }
}

/// A configuration-memory injection target.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConfigTarget {
    /// Module the target belongs to (reporting/statistics only).
    pub module_name: String,
    /// Linear frame address, normalised to ten uppercase hex digits.
    pub config_address: String,
    /// Pblock the address falls inside, when known.
    pub pblock_name: Option<String>,
    /// Provenance of the target (e.g. `"pool:file"`, `"profile:modules"`).
    pub source: String,
    /// Free-form tags for grouping in reports.
    pub tags: Vec<String>,
}

impl ConfigTarget {
    /// Builds a configuration target, validating and normalising the address.
    ///
    /// The address must be a non-empty hex string of at most
    /// [`CONFIG_ADDRESS_WIDTH`] digits; it is stored uppercased and
    /// left-padded with zeros to the full width.
    ///
    /// # Errors
    ///
    /// Returns [`TargetError`] if the address is empty, non-hex, or too long.
    pub fn new(
        module_name: impl Into<String>,
        config_address: &str,
    ) -> Result<Self, TargetError> {
        let config_address = normalize_address(config_address)?;
        Ok(Self {
            module_name: module_name.into(),
            config_address,
            pblock_name: None,
            source: "unknown".to_string(),
            tags: Vec::new(),
        })
    }

    /// Sets the pblock name.
    pub fn with_pblock(mut self, pblock_name: impl Into<String>) -> Self {
        self.pblock_name = Some(pblock_name.into());
        self
    }

    /// Sets the provenance string.
    pub fn with_source(mut self, source: impl Into<String>) -> Self {
        self.source = source.into();
        self
    }

    /// Replaces the tag list.
    pub fn with_tags(mut self, tags: Vec<String>) -> Self {
        self.tags = tags;
        self
    }
}

/// A CPU-register injection target.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RegTarget {
    /// Module the target belongs to (reporting/statistics only).
    pub module_name: String,
    /// Register id broadcast to the injection logic.  Never 0.
    pub reg_id: u16,
    /// Human-readable register name, when known.
    pub reg_name: Option<String>,
    /// Provenance of the target.
    pub source: String,
    /// Free-form tags for grouping in reports.
    pub tags: Vec<String>,
}

impl RegTarget {
    /// Builds a register target.
    ///
    /// # Errors
    ///
    /// Returns [`TargetError::ZeroRegId`] for id 0, which the hardware
    /// reserves as the idle / no-injection value.  The upper bound depends
    /// on the configured id bit width and is enforced at encode time by
    /// [`crate::protocol::reg::encode_reg_inject`].
    pub fn new(module_name: impl Into<String>, reg_id: u16) -> Result<Self, TargetError> {
        if reg_id == 0 {
            return Err(TargetError::ZeroRegId);
        }
        Ok(Self {
            module_name: module_name.into(),
            reg_id,
            reg_name: None,
            source: "unknown".to_string(),
            tags: Vec::new(),
        })
    }

    /// Sets the register name.
    pub fn with_reg_name(mut self, reg_name: impl Into<String>) -> Self {
        self.reg_name = Some(reg_name.into());
        self
    }

    /// Sets the provenance string.
    pub fn with_source(mut self, source: impl Into<String>) -> Self {
        self.source = source.into();
        self
    }

    /// Replaces the tag list.
    pub fn with_tags(mut self, tags: Vec<String>) -> Self {
        self.tags = tags;
        self
    }
}

/// One injectable unit: a configuration bit or a register.
///
/// The sum type makes the "exactly one variant's field set" invariant a
/// construction-time guarantee rather than a runtime check.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Target {
    /// Configuration-memory bit (logic/LUTs/routing), routed to the SEM monitor.
    Config(ConfigTarget),
    /// Register id (flip-flops in the design), routed to the register backend.
    Reg(RegTarget),
}

impl Target {
    /// Convenience constructor for a configuration target.
    pub fn config(
        module_name: impl Into<String>,
        config_address: &str,
    ) -> Result<Self, TargetError> {
        ConfigTarget::new(module_name, config_address).map(Target::Config)
    }

    /// Convenience constructor for a register target.
    pub fn reg(module_name: impl Into<String>, reg_id: u16) -> Result<Self, TargetError> {
        RegTarget::new(module_name, reg_id).map(Target::Reg)
    }

    /// The kind discriminant of this target.
    pub fn kind(&self) -> TargetKind {
        match self {
            Target::Config(_) => TargetKind::Config,
            Target::Reg(_) => TargetKind::Reg,
        }
    }

    /// The module this target belongs to.
    pub fn module_name(&self) -> &str {
        match self {
            Target::Config(t) => &t.module_name,
            Target::Reg(t) => &t.module_name,
        }
    }

    /// Short wire-level description for log events.
    pub fn describe(&self) -> String {
        match self {
            Target::Config(t) => format!("CONFIG {}", t.config_address),
            Target::Reg(t) => format!("REG {}", t.reg_id),
        }
    }
}

fn normalize_address(address: &str) -> Result<String, TargetError> {
    let trimmed = address.trim();
    if trimmed.is_empty() {
        return Err(TargetError::EmptyAddress);
    }
    if !trimmed.bytes().all(|b| b.is_ascii_hexdigit()) {
        return Err(TargetError::NonHexAddress {
            address: trimmed.to_string(),
        });
    }
    if trimmed.len() > CONFIG_ADDRESS_WIDTH {
        return Err(TargetError::AddressTooLong {
            address: trimmed.to_string(),
        });
    }
    Ok(format!(
        "{:0>width$}",
        trimmed.to_ascii_uppercase(),
        width = CONFIG_ADDRESS_WIDTH
    ))
}

// ── Tests ─────────────────────────────────────────────────────────────────────
