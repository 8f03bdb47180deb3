//! Microburst time profile: clustered back-to-back injections.
//!
//! Arguments:
//! - `burst_size` shots per burst (integer > 0, required)
//! - `gap_s`      gap between bursts in seconds (float > 0, required)
//! - `bursts`     optional cap on the number of bursts
//! - `duration_s` optional overall time limit in seconds
//!
//! Each burst fires `burst_size` shots with no deliberate gap (only the
//! transport write time separates them), then one inter-burst gap follows.
//! If both `bursts` and `duration_s` are set, whichever is hit first ends
//! the profile.

use std::time::Duration;

use async_trait::async_trait;
use tokio::time::Instant;

use crate::application::controller::InjectionController;
use crate::domain::TerminationReason;

use super::{ProfileArgs, ProfileError, TimeProfile};

#[derive(Debug)]
pub struct MicroburstProfile {
    burst_size: u64,
    gap: Duration,
    bursts: Option<u64>,
    duration: Option<Duration>,
}

impl MicroburstProfile {
    fn from_args(args: &ProfileArgs) -> Result<Self, ProfileError> {
        let burst_size = args
            .get_u64("burst_size")?
            .ok_or(ProfileError::MissingArgument {
                profile: "microburst",
                arg: "burst_size",
            })?;
        if burst_size == 0 {
            return Err(ProfileError::InvalidArgument {
                arg: "burst_size",
                value: "0".to_string(),
                message: "a burst must contain at least one shot".to_string(),
            });
        }

        let gap_s = args.require_f64("microburst", "gap_s")?;
        if gap_s <= 0.0 {
            return Err(ProfileError::InvalidArgument {
                arg: "gap_s",
                value: gap_s.to_string(),
                message: "inter-burst gap must be positive".to_string(),
            });
        }

        let bursts = args.get_u64("bursts")?;
        if bursts == Some(0) {
            return Err(ProfileError::InvalidArgument {
                arg: "bursts",
                value: "0".to_string(),
                message: "burst count must be positive when given".to_string(),
            });
        }

        let duration_s = args.get_f64("duration_s")?;

        Ok(Self {
            burst_size,
            gap: Duration::from_secs_f64(gap_s),
            bursts,
            duration: duration_s.filter(|d| *d > 0.0).map(Duration::from_secs_f64),
        })
    }

    fn duration_reached(&self, start: Instant) -> bool {
        self.duration
            .map(|d| start.elapsed() >= d)
            .unwrap_or(false)
    }
}

/// Constructor registered under `"microburst"`.
pub fn build(
    args: &ProfileArgs,
    _config_seed: Option<u64>,
) -> Result<Box<dyn TimeProfile>, ProfileError> {
    MicroburstProfile::from_args(args).map(|p| Box::new(p) as Box<dyn TimeProfile>)
}

#[async_trait(?Send)]
impl TimeProfile for MicroburstProfile {
    async fn run(&mut self, controller: &mut InjectionController) {
        let start = Instant::now();
        let mut completed_bursts: u64 = 0;

        'campaign: loop {
            if controller.should_stop() {
                controller.set_termination_reason(TerminationReason::StopRequested);
                break;
            }
            if self.duration_reached(start) {
                controller.set_termination_reason(TerminationReason::DurationReached);
                break;
            }

            // One burst: back-to-back shots, no deliberate spacing.
            for _ in 0..self.burst_size {
                if controller.should_stop() {
                    controller.set_termination_reason(TerminationReason::StopRequested);
                    break 'campaign;
                }
                if self.duration_reached(start) {
                    controller.set_termination_reason(TerminationReason::DurationReached);
                    break 'campaign;
                }
                let Some(target) = controller.next_target() else {
                    controller.set_termination_reason(TerminationReason::PoolExhausted);
                    break 'campaign;
                };
                controller.inject_target(&target).await;
            }

            completed_bursts += 1;
            if self.bursts == Some(completed_bursts) {
                controller.set_termination_reason(TerminationReason::BurstsCompleted);
                break;
            }

            controller.sleep(self.gap).await;
        }
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    fn arg_map(pairs: &[(&str, &str)]) -> ProfileArgs {
        ProfileArgs::new(
            pairs
                .iter()
                .map(|(k, v)| (k.to_string(), v.to_string()))
                .collect(),
        )
    }

    #[test]
    fn test_required_arguments() {
        assert!(matches!(
            MicroburstProfile::from_args(&arg_map(&[("gap_s", "1")])),
            Err(ProfileError::MissingArgument { .. })
        ));
        assert!(matches!(
            MicroburstProfile::from_args(&arg_map(&[("burst_size", "5")])),
            Err(ProfileError::MissingArgument { .. })
        ));
    }

    #[test]
    fn test_zero_burst_size_rejected() {
        assert!(matches!(
            MicroburstProfile::from_args(&arg_map(&[("burst_size", "0"), ("gap_s", "1")])),
            Err(ProfileError::InvalidArgument { .. })
        ));
    }

    #[test]
    fn test_zero_gap_rejected() {
        assert!(matches!(
            MicroburstProfile::from_args(&arg_map(&[("burst_size", "4"), ("gap_s", "0")])),
            Err(ProfileError::InvalidArgument { .. })
        ));
    }

    #[test]
    fn test_caps_parsed() {
        let profile = MicroburstProfile::from_args(&arg_map(&[
            ("burst_size", "8"),
            ("gap_s", "2.5"),
            ("bursts", "3"),
            ("duration_s", "60"),
        ]))
        .unwrap();
        assert_eq!(profile.burst_size, 8);
        assert_eq!(profile.gap, Duration::from_millis(2500));
        assert_eq!(profile.bursts, Some(3));
        assert_eq!(profile.duration, Some(Duration::from_secs(60)));
    }
}
