//! Campaign orchestration.
//!
//! One call drives the whole flow the operator sees:
//!
//! ```text
//! run_campaign()
//!  └─ resolve time profile          -- fail fast, before touching hardware
//!  └─ analyze pool                  -- which backends does it need?
//!  └─ open link (serial or stub)    -- only if some backend needs it
//!       ├─ SemSession::connect      -- prompt sync + preflight
//!       ├─ goto_idle                -- the monitor accepts `N` when idle
//!       └─ register injector        -- live, placeholder, or no-op
//!  └─ profile.run(controller)       -- the scheduling loop
//!  └─ summary                       -- always produced, link always closed
//! ```
//!
//! Failure policy: everything up to the scheduling loop is fatal and
//! prevents the campaign from starting; inside the loop all failures are
//! counted, never propagated.  The link is closed on every exit path.

use std::sync::Arc;

use semfi_core::TargetPool;
use thiserror::Error;
use tracing::info;

use crate::domain::{CampaignConfig, CampaignSummary};
use crate::infrastructure::reg::{create_register_injector, RegisterInjector};
use crate::infrastructure::sem::{ProtocolError, SemSession};
use crate::infrastructure::transport::{self, SerialTransport, TransportError};

use super::controller::{InjectionController, StopHandle};
use super::profiles::{ProfileError, ProfileRegistry};
use super::router::Router;

/// Errors that prevent a campaign from starting.
///
/// Once the scheduling loop is running, nothing propagates here any more;
/// per-injection failures end up in the summary's counters instead.
#[derive(Debug, Error)]
pub enum CampaignError {
    #[error(transparent)]
    Profile(#[from] ProfileError),

    #[error(transparent)]
    Protocol(#[from] ProtocolError),

    #[error(transparent)]
    Transport(#[from] TransportError),
}

/// Runs one complete campaign and returns its summary.
///
/// The pool arrives fully materialised from the external pool builder; the
/// stop handle is shared with signal handlers and synchronization
/// collaborators before the loop starts.
pub async fn run_campaign(
    config: &CampaignConfig,
    pool: TargetPool,
    registry: &ProfileRegistry,
    stop: StopHandle,
) -> Result<CampaignSummary, CampaignError> {
    // Resolve the profile first: an unknown name or bad argument must fail
    // before any hardware is opened.
    let mut profile = registry.build(
        &config.profile.name,
        &config.profile.args,
        config.effective_time_seed(),
    )?;

    let stats = pool.stats();
    info!(
        total = stats.total,
        config_targets = stats.by_kind.config,
        reg_targets = stats.by_kind.reg,
        modules = stats.by_module.len(),
        "target pool ready"
    );

    let needs_sem = stats.by_kind.config > 0;
    let needs_link = needs_sem || (stats.by_kind.reg > 0 && !config.reg_inject_disabled);

    let link: Option<Arc<SerialTransport>> = if needs_link {
        Some(Arc::new(transport::connect_from_config(config)?))
    } else {
        None
    };

    // The link is closed on every path out of the setup-and-run phase,
    // including setup errors.
    let result = setup_and_run(config, pool, &mut profile, link.clone(), needs_sem, stop).await;
    if let Some(link) = link {
        link.close().await;
    }

    let summary = result?;
    info!(
        run_id = %summary.run_id,
        total = summary.total,
        succeeded = summary.succeeded,
        failed = summary.failed,
        elapsed_s = summary.elapsed.as_secs_f64(),
        reason = %summary.reason,
        "campaign complete"
    );
    Ok(summary)
}

async fn setup_and_run(
    config: &CampaignConfig,
    pool: TargetPool,
    profile: &mut Box<dyn super::profiles::TimeProfile>,
    link: Option<Arc<SerialTransport>>,
    needs_sem: bool,
    stop: StopHandle,
) -> Result<CampaignSummary, CampaignError> {
    let sem = if needs_sem {
        let link = link
            .clone()
            .expect("a pool with config targets always opens the link");
        let mut session = SemSession::connect(link, config).await?;
        // The monitor only accepts `N` injection commands at the idle
        // prompt, so the campaign parks it there before the loop starts.
        session.goto_idle().await?;
        Some(Arc::new(session))
    } else {
        None
    };

    // The factory picks the no-op backend when register injection is
    // administratively disabled.
    let reg: Arc<dyn RegisterInjector> = create_register_injector(config, link);

    let router = Router::new(sem, reg);
    let mut controller = InjectionController::new(pool, router, config, stop);
    info!(
        run_id = %controller.run_id(),
        profile = %config.profile.name,
        "campaign starting"
    );

    profile.run(&mut controller).await;
    Ok(controller.summary())
}

// ── Tests ─────────────────────────────────────────────────────────────────────
