//! Poisson time profile: exponential inter-arrival times at a fixed rate.
//!
//! Arguments:
//! - `rate_hz`    average injections per second (float > 0, required)
//! - `duration_s` optional stop time in seconds
//! - `seed`       optional local seed; wins over the config's time seed
//!
//! Identical seed and arguments reproduce a bit-identical delay sequence;
//! execution jitter affects when injections land, never what the schedule
//! is.  Deadlines accumulate on the *scheduled* timeline, so a late step
//! does not compress the following gaps.

use std::time::Duration;

use async_trait::async_trait;
use rand::rngs::StdRng;
use tokio::time::Instant;

use crate::application::controller::InjectionController;
use crate::domain::TerminationReason;

use super::{make_rng, sample_exponential, ProfileArgs, ProfileError, TimeProfile};

#[derive(Debug)]
pub struct PoissonProfile {
    rate_hz: f64,
    duration: Option<Duration>,
    rng: StdRng,
}

impl PoissonProfile {
    fn from_args(args: &ProfileArgs, config_seed: Option<u64>) -> Result<Self, ProfileError> {
        let rate_hz = args.require_f64("poisson", "rate_hz")?;
        if rate_hz <= 0.0 {
            return Err(ProfileError::InvalidArgument {
                arg: "rate_hz",
                value: rate_hz.to_string(),
                message: "rate must be positive".to_string(),
            });
        }
        let duration_s = args.get_f64("duration_s")?;
        let seed = args.effective_seed(config_seed)?;

        Ok(Self {
            rate_hz,
            duration: duration_s.filter(|d| *d > 0.0).map(Duration::from_secs_f64),
            rng: make_rng(seed),
        })
    }

    /// Draws the next inter-arrival delay in seconds.
    fn sample_delay(&mut self) -> f64 {
        sample_exponential(&mut self.rng, self.rate_hz)
    }
}

/// Constructor registered under `"poisson"`.
pub fn build(
    args: &ProfileArgs,
    config_seed: Option<u64>,
) -> Result<Box<dyn TimeProfile>, ProfileError> {
    PoissonProfile::from_args(args, config_seed).map(|p| Box::new(p) as Box<dyn TimeProfile>)
}

#[async_trait(?Send)]
impl TimeProfile for PoissonProfile {
    async fn run(&mut self, controller: &mut InjectionController) {
        let start = Instant::now();
        // Offset of the next scheduled injection from campaign start.
        let mut scheduled = Duration::ZERO;

        loop {
            if controller.should_stop() {
                controller.set_termination_reason(TerminationReason::StopRequested);
                break;
            }
            if let Some(duration) = self.duration {
                if scheduled >= duration {
                    controller.set_termination_reason(TerminationReason::DurationReached);
                    break;
                }
            }

            scheduled += Duration::from_secs_f64(self.sample_delay());

            let Some(target) = controller.next_target() else {
                controller.set_termination_reason(TerminationReason::PoolExhausted);
                break;
            };

            let deadline = start + scheduled;
            let now = Instant::now();
            if now < deadline {
                controller.sleep(deadline - now).await;
            }

            controller.inject_target(&target).await;
        }
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
