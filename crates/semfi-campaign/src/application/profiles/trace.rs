//! Trace time profile: replay of a pre-recorded injection schedule.
//!
//! Arguments:
//! - `path`    schedule file, one value per line (required)
//! - `format`  `"offsets"` (default): absolute seconds from campaign start;
//!             `"deltas"`: inter-injection gaps, accumulated into offsets
//! - `scale`   multiplicative factor applied to every value (float > 0,
//!             default 1.0)
//!
//! Blank lines and `#` comments are skipped; negative values are dropped.
//! The replayed schedule is forced monotonic non-decreasing: offset files
//! are sorted, and delta files accumulate non-negative gaps, so injections
//! can never be scheduled backwards in time.

use std::path::PathBuf;
use std::time::Duration;

use async_trait::async_trait;
use tokio::time::Instant;

use crate::application::controller::InjectionController;
use crate::domain::TerminationReason;

use super::{ProfileArgs, ProfileError, TimeProfile};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum TraceFormat {
    Offsets,
    Deltas,
}

#[derive(Debug)]
pub struct TraceProfile {
    /// Absolute offsets from campaign start, monotonic non-decreasing.
    schedule: Vec<Duration>,
}

impl TraceProfile {
    fn from_args(args: &ProfileArgs) -> Result<Self, ProfileError> {
        let path = PathBuf::from(args.get_str("path").ok_or(ProfileError::MissingArgument {
            profile: "trace",
            arg: "path",
        })?);

        let scale = args.get_f64("scale")?.unwrap_or(1.0);
        if scale <= 0.0 {
            return Err(ProfileError::InvalidArgument {
                arg: "scale",
                value: scale.to_string(),
                message: "scale must be positive".to_string(),
            });
        }

        let format = match args.get_str("format").unwrap_or("offsets") {
            "offsets" => TraceFormat::Offsets,
            "deltas" => TraceFormat::Deltas,
            other => {
                return Err(ProfileError::InvalidArgument {
                    arg: "format",
                    value: other.to_string(),
                    message: "expected \"offsets\" or \"deltas\"".to_string(),
                })
            }
        };

        let text = std::fs::read_to_string(&path).map_err(|source| ProfileError::TraceIo {
            path: path.display().to_string(),
            source,
        })?;
        let schedule = parse_schedule(&text, scale, format).map_err(|(line, message)| {
            ProfileError::InvalidArgument {
                arg: "path",
                value: line,
                message,
            }
        })?;

        Ok(Self { schedule })
    }

    /// Number of scheduled injections.
    fn len(&self) -> usize {
        self.schedule.len()
    }
}

fn parse_schedule(
    text: &str,
    scale: f64,
    format: TraceFormat,
) -> Result<Vec<Duration>, (String, String)> {
    let mut values = Vec::new();
    for raw_line in text.lines() {
        let line = raw_line.trim();
        if line.is_empty() || line.starts_with('#') {
            continue;
        }
        let value: f64 = line
            .parse()
            .map_err(|e: std::num::ParseFloatError| (line.to_string(), e.to_string()))?;
        if !value.is_finite() {
            return Err((line.to_string(), "value must be finite".to_string()));
        }
        // Negative entries are dropped, matching the recorded-trace tools
        // that emit sentinel values for suppressed events.
        if value < 0.0 {
            continue;
        }
        values.push(value * scale);
    }

    let offsets: Vec<f64> = match format {
        TraceFormat::Offsets => {
            // Enforce the monotonic non-decreasing schedule.
            values.sort_by(|a, b| a.partial_cmp(b).expect("finite values compare"));
            values
        }
        TraceFormat::Deltas => values
            .into_iter()
            .scan(0.0f64, |acc, delta| {
                *acc += delta;
                Some(*acc)
            })
            .collect(),
    };

    Ok(offsets.into_iter().map(Duration::from_secs_f64).collect())
}

/// Constructor registered under `"trace"`.
pub fn build(
    args: &ProfileArgs,
    _config_seed: Option<u64>,
) -> Result<Box<dyn TimeProfile>, ProfileError> {
    TraceProfile::from_args(args).map(|p| Box::new(p) as Box<dyn TimeProfile>)
}

#[async_trait(?Send)]
impl TimeProfile for TraceProfile {
    async fn run(&mut self, controller: &mut InjectionController) {
        let start = Instant::now();

        for &offset in &self.schedule {
            if controller.should_stop() {
                controller.set_termination_reason(TerminationReason::StopRequested);
                return;
            }
            let Some(target) = controller.next_target() else {
                controller.set_termination_reason(TerminationReason::PoolExhausted);
                return;
            };

            let deadline = start + offset;
            let now = Instant::now();
            if now < deadline {
                controller.sleep(deadline - now).await;
            }

            controller.inject_target(&target).await;
        }
        controller.set_termination_reason(TerminationReason::TraceComplete);
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
