//! Ramp time profile: linear sweep of the injection rate.
//!
//! Arguments:
//! - `start_rate_hz` initial rate (float > 0, default 1.0)
//! - `end_rate_hz`   final rate (float > 0, default 10.0)
//! - `duration_s`    total sweep duration in seconds (float > 0, required)
//!
//! The sweep is a piecewise-uniform approximation: at each step the
//! instantaneous rate is interpolated from elapsed time and translated into
//! the local period.

use std::time::Duration;

use async_trait::async_trait;
use tokio::time::Instant;

use crate::application::controller::InjectionController;
use crate::domain::TerminationReason;

use super::{ProfileArgs, ProfileError, TimeProfile};

#[derive(Debug)]
pub struct RampProfile {
    start_rate_hz: f64,
    end_rate_hz: f64,
    duration: Duration,
}

impl RampProfile {
    fn from_args(args: &ProfileArgs) -> Result<Self, ProfileError> {
        let start_rate_hz = args.get_f64("start_rate_hz")?.unwrap_or(1.0);
        let end_rate_hz = args.get_f64("end_rate_hz")?.unwrap_or(10.0);
        let duration_s = args.require_f64("ramp", "duration_s")?;

        if start_rate_hz <= 0.0 || end_rate_hz <= 0.0 {
            return Err(ProfileError::InvalidArgument {
                arg: "start_rate_hz/end_rate_hz",
                value: format!("{start_rate_hz}/{end_rate_hz}"),
                message: "rates must be positive".to_string(),
            });
        }
        if duration_s <= 0.0 {
            return Err(ProfileError::InvalidArgument {
                arg: "duration_s",
                value: duration_s.to_string(),
                message: "duration must be positive".to_string(),
            });
        }

        Ok(Self {
            start_rate_hz,
            end_rate_hz,
            duration: Duration::from_secs_f64(duration_s),
        })
    }

    /// Instantaneous rate at `elapsed`, clamped to the endpoint rates.
    fn rate_at(&self, elapsed: Duration) -> f64 {
        if elapsed >= self.duration {
            return self.end_rate_hz;
        }
        let frac = elapsed.as_secs_f64() / self.duration.as_secs_f64();
        self.start_rate_hz + frac * (self.end_rate_hz - self.start_rate_hz)
    }
}

/// Constructor registered under `"ramp"`.
pub fn build(
    args: &ProfileArgs,
    _config_seed: Option<u64>,
) -> Result<Box<dyn TimeProfile>, ProfileError> {
    RampProfile::from_args(args).map(|p| Box::new(p) as Box<dyn TimeProfile>)
}

#[async_trait(?Send)]
impl TimeProfile for RampProfile {
    async fn run(&mut self, controller: &mut InjectionController) {
        let start = Instant::now();
        let mut next_deadline = start;

        loop {
            if controller.should_stop() {
                controller.set_termination_reason(TerminationReason::StopRequested);
                break;
            }
            let elapsed = start.elapsed();
            if elapsed >= self.duration {
                controller.set_termination_reason(TerminationReason::DurationReached);
                break;
            }

            let Some(target) = controller.next_target() else {
                controller.set_termination_reason(TerminationReason::PoolExhausted);
                break;
            };

            let now = Instant::now();
            if now < next_deadline {
                controller.sleep(next_deadline - now).await;
            }

            controller.inject_target(&target).await;

            // Derive the next period from the rate at this point of the sweep.
            let period = Duration::from_secs_f64(1.0 / self.rate_at(start.elapsed()));
            next_deadline += period;
        }
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
