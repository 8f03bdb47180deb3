//! Injection controller: the per-campaign session object.
//!
//! One controller exists per campaign run and is owned by the single
//! scheduling task.  It pulls targets from the pool (falling back to an
//! optional upstream supplier once the pool runs dry), routes them through
//! the [`Router`], tracks counters and elapsed time on the monotonic clock,
//! and exposes the cooperative stop machinery to time profiles.
//!
//! Nothing in here ever blocks on hardware responses: all injection paths
//! are fire-and-forget by construction, and the only suspension points a
//! profile sees are `sleep` and its own loop.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use semfi_core::{Target, TargetPool};
use tokio::time::Instant;
use tracing::{error, info, warn};
use uuid::Uuid;

use crate::domain::{CampaignConfig, CampaignSummary, TerminationReason};

use super::router::Router;

/// Clonable cooperative stop flag.
///
/// Signal handlers and synchronization collaborators hold clones and trip
/// the flag; the scheduling loop polls it between steps.  There is no
/// forced preemption, so worst-case cancellation latency is one scheduling
/// step.
#[derive(Debug, Clone, Default)]
pub struct StopHandle {
    flag: Arc<AtomicBool>,
}

impl StopHandle {
    pub fn new() -> Self {
        Self::default()
    }

    /// Requests a cooperative stop.  Idempotent.
    pub fn request_stop(&self) {
        self.flag.store(true, Ordering::Relaxed);
    }

    /// True once a stop has been requested.
    pub fn is_stopped(&self) -> bool {
        self.flag.load(Ordering::Relaxed)
    }
}

/// Upstream target source consulted only once the owned pool is exhausted.
///
/// This is the seam towards an area-profile collaborator that can produce
/// targets beyond the pre-built pool; the core only pulls, one target at a
/// time.
pub trait TargetSupplier: Send {
    fn next_target(&mut self) -> Option<Target>;
}

/// Per-campaign session state: pool cursor, counters, stop machinery.
///
/// Created at campaign start, consumed by [`summary`](Self::summary) at the
/// end; never reused across campaigns.
pub struct InjectionController {
    pool: TargetPool,
    router: Router,
    stop: StopHandle,
    stop_predicate: Option<Box<dyn Fn() -> bool + Send + Sync>>,
    supplier: Option<Box<dyn TargetSupplier>>,
    started: Instant,
    total: u64,
    succeeded: u64,
    failed: u64,
    reason: Option<TerminationReason>,
    stop_on_exhaustion: bool,
    run_id: Uuid,
}

impl InjectionController {
    /// Builds the controller for one campaign run.
    pub fn new(
        pool: TargetPool,
        router: Router,
        config: &CampaignConfig,
        stop: StopHandle,
    ) -> Self {
        Self {
            pool,
            router,
            stop,
            stop_predicate: None,
            supplier: None,
            started: Instant::now(),
            total: 0,
            succeeded: 0,
            failed: 0,
            reason: None,
            stop_on_exhaustion: config.stop_on_exhaustion,
            run_id: Uuid::new_v4(),
        }
    }

    /// Attaches the optional upstream target supplier.
    pub fn with_supplier(mut self, supplier: Box<dyn TargetSupplier>) -> Self {
        self.supplier = Some(supplier);
        self
    }

    /// Attaches an external stop predicate, consulted by
    /// [`should_stop`](Self::should_stop) once per scheduling step.
    pub fn with_stop_predicate(
        mut self,
        predicate: Box<dyn Fn() -> bool + Send + Sync>,
    ) -> Self {
        self.stop_predicate = Some(predicate);
        self
    }

    /// A clone of the stop flag for signal handlers and sync collaborators.
    pub fn stop_handle(&self) -> StopHandle {
        self.stop.clone()
    }

    /// Unique id of this campaign run.
    pub fn run_id(&self) -> Uuid {
        self.run_id
    }

    /// Returns the next target to inject, or `None` on exhaustion.
    ///
    /// Order of consultation: the owned pool, then the upstream supplier.
    /// With `stop_on_exhaustion = false` the pool is rewound instead and
    /// targets cycle until another stop condition fires.
    pub fn next_target(&mut self) -> Option<Target> {
        if let Some(target) = self.pool.pop_next() {
            return Some(target);
        }
        if let Some(supplier) = &mut self.supplier {
            if let Some(target) = supplier.next_target() {
                return Some(target);
            }
        }
        if !self.stop_on_exhaustion && !self.pool.is_empty() {
            self.pool.reset();
            return self.pool.pop_next();
        }
        None
    }

    /// Routes one target and records the outcome.
    ///
    /// Ordinary failures only count; a dispatch contract violation
    /// additionally trips the stop flag, ending the campaign at the next
    /// scheduling step.
    pub async fn inject_target(&mut self, target: &Target) -> bool {
        self.total += 1;
        match self.router.dispatch(target).await {
            Ok(true) => {
                self.succeeded += 1;
                info!(
                    run_id = %self.run_id,
                    target = %target.describe(),
                    module = target.module_name(),
                    outcome = "ok",
                    "injection"
                );
                true
            }
            Ok(false) => {
                self.failed += 1;
                warn!(
                    run_id = %self.run_id,
                    target = %target.describe(),
                    module = target.module_name(),
                    outcome = "failed",
                    "injection"
                );
                false
            }
            Err(e) => {
                self.failed += 1;
                error!(run_id = %self.run_id, error = %e, "dispatch contract violation, stopping campaign");
                self.set_termination_reason(TerminationReason::DispatchFailure);
                self.stop.request_stop();
                false
            }
        }
    }

    /// Suspends the scheduling task for `duration`, measured against the
    /// monotonic clock (immune to wall-clock adjustments).
    pub async fn sleep(&self, duration: Duration) {
        if duration > Duration::ZERO {
            tokio::time::sleep(duration).await;
        }
    }

    /// True once an external stop request has been registered, either via a
    /// [`StopHandle`] or the pluggable predicate.
    pub fn should_stop(&self) -> bool {
        if self.stop.is_stopped() {
            return true;
        }
        match &self.stop_predicate {
            Some(predicate) => predicate(),
            None => false,
        }
    }

    /// Trips the stop flag from within the scheduling task.
    pub fn request_stop(&self) {
        self.stop.request_stop();
    }

    /// Records why the campaign ended.  The first recorded reason wins.
    pub fn set_termination_reason(&mut self, reason: TerminationReason) {
        if self.reason.is_none() {
            self.reason = Some(reason);
        }
    }

    /// Time since the controller was created, on the monotonic clock.
    pub fn elapsed(&self) -> Duration {
        self.started.elapsed()
    }

    /// Injections attempted so far.
    pub fn total(&self) -> u64 {
        self.total
    }

    /// Consumes the controller into the final campaign report.
    pub fn summary(self) -> CampaignSummary {
        let reason = self.reason.unwrap_or(if self.stop.is_stopped() {
            TerminationReason::StopRequested
        } else {
            TerminationReason::PoolExhausted
        });
        CampaignSummary {
            run_id: self.run_id,
            total: self.total,
            succeeded: self.succeeded,
            failed: self.failed,
            elapsed: self.started.elapsed(),
            reason,
        }
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
