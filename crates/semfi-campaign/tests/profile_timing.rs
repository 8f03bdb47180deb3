//! Scheduler timing properties, verified under tokio's paused clock.
//!
//! With `start_paused = true` every `sleep` advances virtual time instantly
//! and deterministically, so the timing guarantees (injection counts within
//! jitter tolerance, loops exiting at-or-after their duration) can be
//! asserted exactly instead of flakily.
//!
//! All profiles run against a register-only controller whose router ends in
//! the recording no-op backend: the scheduling maths is what is under test,
//! not the wire.

use std::collections::HashMap;
use std::io::Write;
use std::sync::Arc;
use std::time::Duration;

use semfi_campaign::application::controller::{InjectionController, StopHandle};
use semfi_campaign::application::profiles::ProfileRegistry;
use semfi_campaign::application::router::Router;
use semfi_campaign::domain::{CampaignConfig, TerminationReason};
use semfi_campaign::infrastructure::reg::{NoopRegisterInjector, RegisterInjector};
use semfi_core::{Target, TargetPool};

fn reg_controller(targets: usize, config: &CampaignConfig) -> InjectionController {
    let mut pool = TargetPool::new();
    for i in 0..targets {
        pool.push(Target::reg("m", ((i % 200) + 1) as u16).unwrap());
    }
    let reg: Arc<dyn RegisterInjector> = Arc::new(NoopRegisterInjector::new());
    InjectionController::new(pool, Router::new(None, reg), config, StopHandle::new())
}

fn args(pairs: &[(&str, &str)]) -> HashMap<String, String> {
    pairs
        .iter()
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .collect()
}

#[tokio::test(start_paused = true)]
async fn uniform_rate_and_duration_bound_injection_count() {
    let config = CampaignConfig::default();
    let mut controller = reg_controller(1000, &config);
    let registry = ProfileRegistry::with_builtins();

    let mut profile = registry
        .build(
            "uniform",
            &args(&[("rate_hz", "10"), ("duration_s", "1.0")]),
            None,
        )
        .unwrap();
    profile.run(&mut controller).await;

    let elapsed = controller.elapsed();
    let summary = controller.summary();
    // 10 Hz over 1 s: 9..=11 injections within the schedule-jitter
    // tolerance, and the loop exits at or after the duration, never before.
    assert!(
        (9..=11).contains(&summary.total),
        "expected 9..=11 injections, got {}",
        summary.total
    );
    assert!(elapsed >= Duration::from_secs(1));
    assert_eq!(summary.reason, TerminationReason::DurationReached);
}

#[tokio::test(start_paused = true)]
async fn uniform_shot_cap_ends_run_first() {
    let config = CampaignConfig::default();
    let mut controller = reg_controller(1000, &config);
    let registry = ProfileRegistry::with_builtins();

    let mut profile = registry
        .build(
            "uniform",
            &args(&[("rate_hz", "100"), ("duration_s", "60"), ("shots", "7")]),
            None,
        )
        .unwrap();
    profile.run(&mut controller).await;

    let summary = controller.summary();
    assert_eq!(summary.total, 7);
    assert_eq!(summary.reason, TerminationReason::ShotCapReached);
}

#[tokio::test(start_paused = true)]
async fn uniform_exhausts_small_pool() {
    let config = CampaignConfig::default();
    let mut controller = reg_controller(5, &config);
    let registry = ProfileRegistry::with_builtins();

    let mut profile = registry
        .build("uniform", &args(&[("rate_hz", "50")]), None)
        .unwrap();
    profile.run(&mut controller).await;

    let summary = controller.summary();
    assert_eq!(summary.total, 5);
    assert_eq!(summary.reason, TerminationReason::PoolExhausted);
}

#[tokio::test(start_paused = true)]
async fn microburst_fires_bursts_separated_by_gaps() {
    let config = CampaignConfig::default();
    let mut controller = reg_controller(1000, &config);
    let registry = ProfileRegistry::with_builtins();

    let mut profile = registry
        .build(
            "microburst",
            &args(&[("burst_size", "4"), ("gap_s", "2.0"), ("bursts", "3")]),
            None,
        )
        .unwrap();
    profile.run(&mut controller).await;

    let elapsed = controller.elapsed();
    let summary = controller.summary();
    assert_eq!(summary.total, 12, "3 bursts of 4 shots");
    assert_eq!(summary.reason, TerminationReason::BurstsCompleted);
    // Two inter-burst gaps elapse; the final burst ends the run without a
    // trailing gap.
    assert!(elapsed >= Duration::from_secs(4));
    assert!(elapsed < Duration::from_secs(6));
}

#[tokio::test(start_paused = true)]
async fn poisson_stops_at_duration() {
    let config = CampaignConfig::default();
    let mut controller = reg_controller(1000, &config);
    let registry = ProfileRegistry::with_builtins();

    let mut profile = registry
        .build(
            "poisson",
            &args(&[("rate_hz", "100"), ("duration_s", "0.5"), ("seed", "9")]),
            None,
        )
        .unwrap();
    profile.run(&mut controller).await;

    let summary = controller.summary();
    assert_eq!(summary.reason, TerminationReason::DurationReached);
    // ~50 expected; a seeded run is deterministic, the bound just avoids
    // baking the exact draw sequence into the test.
    assert!(
        (20..=100).contains(&summary.total),
        "got {} injections",
        summary.total
    );
}

#[tokio::test(start_paused = true)]
async fn ramp_exits_at_duration_with_increasing_density() {
    let config = CampaignConfig::default();
    let mut controller = reg_controller(1000, &config);
    let registry = ProfileRegistry::with_builtins();

    let mut profile = registry
        .build(
            "ramp",
            &args(&[
                ("start_rate_hz", "5"),
                ("end_rate_hz", "20"),
                ("duration_s", "2.0"),
            ]),
            None,
        )
        .unwrap();
    profile.run(&mut controller).await;

    let elapsed = controller.elapsed();
    let summary = controller.summary();
    assert_eq!(summary.reason, TerminationReason::DurationReached);
    assert!(elapsed >= Duration::from_secs(2));
    // Average rate ~12.5 Hz over 2 s.
    assert!(
        (15..=40).contains(&summary.total),
        "got {} injections",
        summary.total
    );
}

#[tokio::test(start_paused = true)]
async fn trace_replays_its_whole_schedule() {
    let mut trace = tempfile::NamedTempFile::new().unwrap();
    writeln!(trace, "# three shots\n0.10\n0.25\n0.40").unwrap();

    let config = CampaignConfig::default();
    let mut controller = reg_controller(10, &config);
    let registry = ProfileRegistry::with_builtins();

    let mut profile = registry
        .build(
            "trace",
            &args(&[("path", trace.path().to_str().unwrap())]),
            None,
        )
        .unwrap();
    profile.run(&mut controller).await;

    let elapsed = controller.elapsed();
    let summary = controller.summary();
    assert_eq!(summary.total, 3);
    assert_eq!(summary.reason, TerminationReason::TraceComplete);
    assert!(elapsed >= Duration::from_millis(400));
}

#[tokio::test(start_paused = true)]
async fn stop_request_ends_profile_between_steps() {
    let config = CampaignConfig::default();
    let mut controller = reg_controller(1000, &config);
    let registry = ProfileRegistry::with_builtins();

    let stop = controller.stop_handle();
    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(550)).await;
        stop.request_stop();
    });

    // Unbounded uniform profile: only the stop request can end it.
    let mut profile = registry
        .build("uniform", &args(&[("rate_hz", "10")]), None)
        .unwrap();
    profile.run(&mut controller).await;

    let summary = controller.summary();
    assert_eq!(summary.reason, TerminationReason::StopRequested);
    // Cooperative cancellation: worst case one scheduling step of latency.
    assert!(
        (5..=8).contains(&summary.total),
        "got {} injections",
        summary.total
    );
}

#[tokio::test(start_paused = true)]
async fn identical_seeds_reproduce_identical_campaigns() {
    let registry = ProfileRegistry::with_builtins();
    let config = CampaignConfig::default();

    let mut totals = Vec::new();
    for _ in 0..2 {
        let mut controller = reg_controller(1000, &config);
        let mut profile = registry
            .build(
                "poisson",
                &args(&[("rate_hz", "200"), ("duration_s", "1.0"), ("seed", "31")]),
                None,
            )
            .unwrap();
        profile.run(&mut controller).await;
        totals.push(controller.summary().total);
    }
    assert_eq!(
        totals[0], totals[1],
        "same seed and args must reproduce the same schedule"
    );
}
