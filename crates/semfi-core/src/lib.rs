//! # semfi-core
//!
//! Shared library for SEMFI containing the injection-target model and the
//! wire-level command codecs for the SEM monitor and the register-injection
//! hardware.
//!
//! This crate is used by the campaign driver and by any future diagnostic
//! tooling.  It has zero dependencies on serial ports, async runtimes, or
//! the filesystem.
//!
//! # Architecture overview
//!
//! SEMFI drives fault-injection campaigns against an FPGA over a single UART
//! link.  The FPGA carries a SEM (Soft Error Mitigation) monitor that scans
//! and corrects configuration memory; a companion hardware module intercepts
//! binary commands and flips bits in CPU registers.  A campaign walks an
//! ordered pool of *targets* (configuration-memory addresses and register
//! ids) and fires each one on a precise schedule.
//!
//! This crate defines:
//!
//! - **`target`** – The [`Target`] sum type (configuration bit vs. register)
//!   and the ordered [`TargetPool`] the campaign consumes.
//!
//! - **`protocol`** – Pure encode/parse functions for the two wire formats:
//!   the SEM monitor's ASCII line commands (`I`, `O`, `S`, `N <address>`,
//!   prompt sentinels `I>`/`O>`/`D>`) and the 2-byte binary register
//!   injection command (`0x52` + register id).
//!
//! Everything here is a plain value type or a pure function, so the whole
//! crate unit-tests without hardware.

pub mod protocol;
pub mod target;

// Re-export the most-used types at the crate root so callers can write
// `semfi_core::Target` instead of `semfi_core::target::Target`.
pub use protocol::reg::{encode_reg_inject, RegEncodeError, REG_COMMAND_TAG};
pub use protocol::sem::{inject_command, SemStatus};
pub use protocol::{Enqueued, Mode, Prompt};
pub use target::pool::{KindCounts, PoolStats, TargetPool};
pub use target::{ConfigTarget, RegTarget, Target, TargetError, TargetKind};
