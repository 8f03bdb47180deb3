//! End-of-campaign reporting types.

use std::time::Duration;

use uuid::Uuid;

/// Why the scheduling loop ended.
///
/// Whichever condition fires first is recorded by the controller and carried
/// into the summary; later conditions do not overwrite it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TerminationReason {
    /// The target pool (and any upstream supplier) ran out of targets.
    PoolExhausted,
    /// The profile's configured duration elapsed.
    DurationReached,
    /// The profile's configured shot cap was reached.
    ShotCapReached,
    /// The profile completed its configured number of bursts.
    BurstsCompleted,
    /// A trace profile replayed its whole schedule.
    TraceComplete,
    /// An external stop request (signal handler, sync collaborator).
    StopRequested,
    /// A dispatch contract violation forced the campaign down.
    DispatchFailure,
}

impl std::fmt::Display for TerminationReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let text = match self {
            TerminationReason::PoolExhausted => "target pool exhausted",
            TerminationReason::DurationReached => "duration limit reached",
            TerminationReason::ShotCapReached => "shot cap reached",
            TerminationReason::BurstsCompleted => "requested bursts completed",
            TerminationReason::TraceComplete => "trace schedule completed",
            TerminationReason::StopRequested => "stop requested",
            TerminationReason::DispatchFailure => "dispatch contract violation",
        };
        f.write_str(text)
    }
}

/// Final campaign report.
///
/// Every campaign terminates with one of these, regardless of how many
/// individual injections failed along the way.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CampaignSummary {
    /// Unique id of this campaign run, stamped on all its log events.
    pub run_id: Uuid,
    /// Injections attempted.
    pub total: u64,
    /// Injections whose command reached the wire (or the no-op backend).
    pub succeeded: u64,
    /// Injections rejected by validation or failed at the transport.
    pub failed: u64,
    /// Wall time of the scheduling loop, measured on the monotonic clock.
    pub elapsed: Duration,
    /// First stop condition that fired.
    pub reason: TerminationReason,
}

impl std::fmt::Display for CampaignSummary {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{} injections ({} ok, {} failed) in {:.3}s: {}",
            self.total,
            self.succeeded,
            self.failed,
            self.elapsed.as_secs_f64(),
            self.reason
        )
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_summary_display_is_operator_readable() {
        let summary = CampaignSummary {
            run_id: Uuid::nil(),
            total: 10,
            succeeded: 9,
            failed: 1,
            elapsed: Duration::from_millis(1500),
            reason: TerminationReason::DurationReached,
        };
        assert_eq!(
            summary.to_string(),
            "10 injections (9 ok, 1 failed) in 1.500s: duration limit reached"
        );
    }

    #[test]
    fn test_reason_display_texts() {
        assert_eq!(
            TerminationReason::PoolExhausted.to_string(),
            "target pool exhausted"
        );
        assert_eq!(
            TerminationReason::StopRequested.to_string(),
            "stop requested"
        );
    }
}
