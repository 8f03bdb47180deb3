//! MMPP2 time profile: two-state Markov-modulated Poisson process.
//!
//! The process alternates between a low-rate and a high-rate hidden state.
//! At each step the state may transition according to fixed per-step
//! probabilities, then the inter-arrival delay is drawn from the active
//! state's Poisson rate.  Over many steps the fraction spent in the high
//! state converges to `p_lh / (p_lh + p_hl)`.
//!
//! Arguments:
//! - `low_hz`         Poisson rate in the LOW state (float > 0, required)
//! - `high_hz`        Poisson rate in the HIGH state (float > 0, required)
//! - `p_low_to_high`  per-step LOW→HIGH transition probability (0..=1, required)
//! - `p_high_to_low`  per-step HIGH→LOW transition probability (0..=1, required)
//! - `start_state`    `"low"` (default) or `"high"`
//! - `duration_s`     optional stop time in seconds
//! - `seed`           optional local seed; wins over the config's time seed

use std::time::Duration;

use async_trait::async_trait;
use rand::rngs::StdRng;
use rand::Rng;
use tokio::time::Instant;

use crate::application::controller::InjectionController;
use crate::domain::TerminationReason;

use super::{make_rng, sample_exponential, ProfileArgs, ProfileError, TimeProfile};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum BurstState {
    Low,
    High,
}

#[derive(Debug)]
pub struct Mmpp2Profile {
    low_hz: f64,
    high_hz: f64,
    p_low_to_high: f64,
    p_high_to_low: f64,
    state: BurstState,
    duration: Option<Duration>,
    rng: StdRng,
}

impl Mmpp2Profile {
    fn from_args(args: &ProfileArgs, config_seed: Option<u64>) -> Result<Self, ProfileError> {
        let low_hz = args.require_f64("mmpp2", "low_hz")?;
        let high_hz = args.require_f64("mmpp2", "high_hz")?;
        let p_low_to_high = args.require_f64("mmpp2", "p_low_to_high")?;
        let p_high_to_low = args.require_f64("mmpp2", "p_high_to_low")?;

        if low_hz <= 0.0 || high_hz <= 0.0 {
            return Err(ProfileError::InvalidArgument {
                arg: "low_hz/high_hz",
                value: format!("{low_hz}/{high_hz}"),
                message: "rates must be positive".to_string(),
            });
        }
        for (arg, p) in [
            ("p_low_to_high", p_low_to_high),
            ("p_high_to_low", p_high_to_low),
        ] {
            if !(0.0..=1.0).contains(&p) {
                return Err(ProfileError::InvalidArgument {
                    arg,
                    value: p.to_string(),
                    message: "probability must be within 0..=1".to_string(),
                });
            }
        }

        let state = match args.get_str("start_state").unwrap_or("low") {
            "low" => BurstState::Low,
            "high" => BurstState::High,
            other => {
                return Err(ProfileError::InvalidArgument {
                    arg: "start_state",
                    value: other.to_string(),
                    message: "expected \"low\" or \"high\"".to_string(),
                })
            }
        };

        let duration_s = args.get_f64("duration_s")?;
        let seed = args.effective_seed(config_seed)?;

        Ok(Self {
            low_hz,
            high_hz,
            p_low_to_high,
            p_high_to_low,
            state,
            duration: duration_s.filter(|d| *d > 0.0).map(Duration::from_secs_f64),
            rng: make_rng(seed),
        })
    }

    /// One scheduling step: maybe transition, then draw the next delay from
    /// the active state's rate.  Returns the delay in seconds.
    fn advance(&mut self) -> f64 {
        let u: f64 = self.rng.gen();
        self.state = match self.state {
            BurstState::Low if u < self.p_low_to_high => BurstState::High,
            BurstState::High if u < self.p_high_to_low => BurstState::Low,
            unchanged => unchanged,
        };
        let rate_hz = match self.state {
            BurstState::Low => self.low_hz,
            BurstState::High => self.high_hz,
        };
        sample_exponential(&mut self.rng, rate_hz)
    }

    fn in_high_state(&self) -> bool {
        self.state == BurstState::High
    }
}

/// Constructor registered under `"mmpp2"`.
pub fn build(
    args: &ProfileArgs,
    config_seed: Option<u64>,
) -> Result<Box<dyn TimeProfile>, ProfileError> {
    Mmpp2Profile::from_args(args, config_seed).map(|p| Box::new(p) as Box<dyn TimeProfile>)
}

#[async_trait(?Send)]
impl TimeProfile for Mmpp2Profile {
    async fn run(&mut self, controller: &mut InjectionController) {
        let start = Instant::now();
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

            scheduled += Duration::from_secs_f64(self.advance());

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
