//! Protocol module containing the SEM text codec, the register binary codec,
//! and the shared mode/prompt types.

pub mod reg;
pub mod sem;

/// SEM monitor operating mode, as far as the host knows it.
///
/// The host never assumes the monitor's mode: transitions happen only
/// through explicit commands whose completion is confirmed by the matching
/// prompt sentinel.  A freshly opened session is `Unknown` until the first
/// prompt sync.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Mode {
    /// Mode not yet established (before sync, or a detect-only prompt).
    Unknown,
    /// Idle: scanning stopped, error injection commands accepted.
    Idle,
    /// Observation: the monitor is scanning and correcting.
    Observe,
}

impl std::fmt::Display for Mode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Mode::Unknown => write!(f, "unknown"),
            Mode::Idle => write!(f, "idle"),
            Mode::Observe => write!(f, "observe"),
        }
    }
}

/// A prompt sentinel line printed by the SEM monitor.
///
/// The monitor terminates every command exchange with a two-character prompt
/// naming its current state: `I>` (idle), `O>` (observation) or `D>`
/// (detect-only).  Detect-only is recognised during prompt sync so a monitor
/// left in that state still syncs, but campaigns never command it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Prompt {
    Idle,
    Observe,
    DetectOnly,
}

impl Prompt {
    /// Classifies a framed line as a prompt sentinel, if it is one.
    ///
    /// Matches the bare sentinel with optional surrounding whitespace,
    /// mirroring the monitor's `X>` prompt lines.  Anything else (banners,
    /// echoes, status pairs) is not a prompt.
    pub fn parse(line: &str) -> Option<Prompt> {
        match line.trim() {
            "I>" => Some(Prompt::Idle),
            "O>" => Some(Prompt::Observe),
            "D>" => Some(Prompt::DetectOnly),
            _ => None,
        }
    }

    /// The mode this prompt proves the monitor is in.
    pub fn mode(self) -> Mode {
        match self {
            Prompt::Idle => Mode::Idle,
            Prompt::Observe => Mode::Observe,
            // Detect-only is a real monitor state but not one the campaign
            // drives, so the session keeps treating the mode as unknown.
            Prompt::DetectOnly => Mode::Unknown,
        }
    }

    /// The sentinel text as it appears on the wire.
    pub fn sentinel(self) -> &'static str {
        match self {
            Prompt::Idle => "I>",
            Prompt::Observe => "O>",
            Prompt::DetectOnly => "D>",
        }
    }
}

/// Marker result for a command that was queued to the wire and will never be
/// awaited.
///
/// Injection commands are fire-and-forget: the write returns as soon as the
/// bytes reach the OS buffer, and any response the device produces is drained
/// later by the transport's background reader.  Returning `Enqueued` instead
/// of `()` keeps that contract visible in signatures, so an acknowledgment
/// wait cannot creep into the hot path unnoticed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[must_use = "an enqueued command reports nothing beyond acceptance by the transport"]
pub struct Enqueued;

// ── Tests ─────────────────────────────────────────────────────────────────────
