//! Binary codec for the register-injection command.
//!
//! Wire format:
//! ```text
//! [tag:1][reg_id:1]
//! ```
//! Exactly two bytes.  The tag is ASCII `R` (0x52); the second byte is the
//! register id truncated to the configured bit width.  The interception
//! hardware broadcasts the id to the FPGA injection logic; id 0 is the idle
//! value it drives when no injection is active, so 0 is never a valid
//! command operand.

use thiserror::Error;

/// Command tag byte: ASCII `R`.
pub const REG_COMMAND_TAG: u8 = 0x52;

/// Errors that can occur while encoding a register-injection command.
///
/// Validation happens entirely before any transport interaction; an encode
/// error means nothing was written to the wire.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum RegEncodeError {
    /// The configured id width does not fit the one-byte operand.
    #[error("register id width must be 1..=8 bits, got {width_bits}")]
    WidthOutOfRange { width_bits: u8 },

    /// The id is 0 (reserved as idle) or exceeds the width's maximum.
    #[error("register id {reg_id} outside valid range 1..={max} for {width_bits}-bit ids")]
    IdOutOfRange {
        reg_id: u16,
        max: u16,
        width_bits: u8,
    },
}

/// Largest register id representable in `width_bits` bits.
///
/// # Errors
///
/// Returns [`RegEncodeError::WidthOutOfRange`] unless `1 <= width_bits <= 8`.
pub fn max_reg_id(width_bits: u8) -> Result<u16, RegEncodeError> {
    if !(1..=8).contains(&width_bits) {
        return Err(RegEncodeError::WidthOutOfRange { width_bits });
    }
    Ok((1u16 << width_bits) - 1)
}

/// Encodes the 2-byte register-injection command.
///
/// Validates `1 <= reg_id <= 2^width_bits - 1` and produces
/// `[REG_COMMAND_TAG, reg_id]` with the id masked to the configured width.
///
/// # Errors
///
/// Returns [`RegEncodeError`] for a bad width or an out-of-range id; in
/// either case no bytes are produced.
pub fn encode_reg_inject(reg_id: u16, width_bits: u8) -> Result<[u8; 2], RegEncodeError> {
    let max = max_reg_id(width_bits)?;
    if reg_id == 0 || reg_id > max {
        return Err(RegEncodeError::IdOutOfRange {
            reg_id,
            max,
            width_bits,
        });
    }
    // Validated id fits in width_bits <= 8, so the cast is lossless.
    Ok([REG_COMMAND_TAG, (reg_id as u8) & ((max & 0xFF) as u8)])
}

// ── Tests ─────────────────────────────────────────────────────────────────────
