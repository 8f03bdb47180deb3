//! Uniform time profile: fixed injection cadence.
//!
//! Arguments:
//! - `rate_hz`    injections per second (float)
//! - `period_s`   period between injections (float); wins over `rate_hz`
//! - `duration_s` optional stop time in seconds
//! - `shots`      optional cap on the number of injections
//!
//! Stops at whichever of duration / shot cap / pool exhaustion / stop
//! request comes first.  Scheduling is deadline-based: each injection is
//! planned at `start + n * period`, so a late step does not stretch the
//! overall schedule.

use std::time::Duration;

use async_trait::async_trait;
use tokio::time::Instant;

use crate::application::controller::InjectionController;
use crate::domain::TerminationReason;

use super::{ProfileArgs, ProfileError, TimeProfile};

#[derive(Debug)]
pub struct UniformProfile {
    period: Duration,
    duration: Option<Duration>,
    shots: Option<u64>,
}

impl UniformProfile {
    fn from_args(args: &ProfileArgs) -> Result<Self, ProfileError> {
        let rate_hz = args.get_f64("rate_hz")?;
        let period_s = args.get_f64("period_s")?;
        let duration_s = args.get_f64("duration_s")?;
        let shots = args.get_u64("shots")?;

        // Resolve the effective period, preferring an explicit period.
        let period = match (period_s, rate_hz) {
            (Some(p), _) if p > 0.0 => Duration::from_secs_f64(p),
            (_, Some(r)) if r > 0.0 => Duration::from_secs_f64(1.0 / r),
            _ => {
                return Err(ProfileError::MissingArgument {
                    profile: "uniform",
                    arg: "rate_hz or period_s (positive)",
                })
            }
        };

        Ok(Self {
            period,
            duration: duration_s.filter(|d| *d > 0.0).map(Duration::from_secs_f64),
            shots,
        })
    }
}

/// Constructor registered under `"uniform"`.
pub fn build(
    args: &ProfileArgs,
    _config_seed: Option<u64>,
) -> Result<Box<dyn TimeProfile>, ProfileError> {
    UniformProfile::from_args(args).map(|p| Box::new(p) as Box<dyn TimeProfile>)
}

#[async_trait(?Send)]
impl TimeProfile for UniformProfile {
    async fn run(&mut self, controller: &mut InjectionController) {
        let start = Instant::now();
        let mut next_deadline = start;
        let mut fired: u64 = 0;

        loop {
            if controller.should_stop() {
                controller.set_termination_reason(TerminationReason::StopRequested);
                break;
            }
            if let Some(duration) = self.duration {
                if start.elapsed() >= duration {
                    controller.set_termination_reason(TerminationReason::DurationReached);
                    break;
                }
            }
            if let Some(cap) = self.shots {
                if fired >= cap {
                    controller.set_termination_reason(TerminationReason::ShotCapReached);
                    break;
                }
            }

            let Some(target) = controller.next_target() else {
                controller.set_termination_reason(TerminationReason::PoolExhausted);
                break;
            };

            // Wait until the planned deadline; if we are already past it,
            // inject immediately rather than stretching the schedule.
            let now = Instant::now();
            if now < next_deadline {
                controller.sleep(next_deadline - now).await;
            }

            controller.inject_target(&target).await;
            fired += 1;
            next_deadline += self.period;
        }
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
