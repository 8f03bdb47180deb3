//! SEMFI campaign driver entry point.
//!
//! Wires together the external-collaborator seams (CLI, config file, pool
//! file, Ctrl-C) and hands control to [`run_campaign`].  Everything
//! campaign-critical lives in the library; this binary only assembles it.

use clap::Parser;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

use semfi_campaign::application::campaign::run_campaign;
use semfi_campaign::application::controller::StopHandle;
use semfi_campaign::application::profiles::ProfileRegistry;
use semfi_campaign::infrastructure::{cli, pool_file};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialise structured logging.  Level is overridden by `RUST_LOG`.
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let args = cli::Cli::parse();
    let config = cli::build_config(&args)?;
    let pool = pool_file::load_pool_file(&args.pool)?;
    let registry = ProfileRegistry::with_builtins();

    // Graceful shutdown: Ctrl-C trips the cooperative stop flag; the
    // profile finishes its current scheduling step and the campaign still
    // ends with a summary.
    let stop = StopHandle::new();
    let stop_for_signal = stop.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            info!("shutdown signal received, stopping after the current step");
            stop_for_signal.request_stop();
        }
    });

    match run_campaign(&config, pool, &registry, stop).await {
        Ok(summary) => {
            info!(%summary, "campaign finished");
            Ok(())
        }
        Err(e) => {
            error!(error = %e, "campaign failed to run");
            Err(e.into())
        }
    }
}
