use std::sync::Arc;
use std::time::Duration;

use tokio::sync::watch;
use tokio::task::JoinSet;
use tokio::time::{MissedTickBehavior, interval, timeout};
use tracing::{debug, error, info, warn};

use super::executor::CheckExecutor;
use super::types::{ConnectionStatus, EventStatus, Target};
use crate::config::ConfigError;
use crate::database::EventStore;

/// How long an in-flight round may keep running after a stop request
pub const DEFAULT_SHUTDOWN_GRACE: Duration = Duration::from_secs(5);

/// Tally of one target's check within a round
#[derive(Debug, Default, Clone, Copy)]
struct TargetReport {
    appended: usize,
    failed_appends: usize,
    reachable: bool,
}

/// Tally of a whole round
#[derive(Debug, Default, Clone, Copy)]
struct RoundSummary {
    checked: usize,
    reachable: usize,
    appended: usize,
    failed_appends: usize,
}

impl RoundSummary {
    fn add(&mut self, report: TargetReport) {
        self.checked += 1;
        self.reachable += usize::from(report.reachable);
        self.appended += report.appended;
        self.failed_appends += report.failed_appends;
    }
}

/// Poll scheduler - drives fixed-interval rounds over the whole target set
///
/// Rounds start on a grid of `interval` from the first round. A round is
/// never started while the previous one is still running: a round that
/// overruns its slot is followed immediately by one catch-up round, any
/// further ticks missed meanwhile are skipped, and the grid realigns.
pub struct PollScheduler {
    targets: Arc<[Target]>,
    interval: Duration,
    executor: Arc<CheckExecutor>,
    store: Arc<dyn EventStore>,
    shutdown_grace: Duration,
}

impl PollScheduler {
    pub fn new(
        targets: Arc<[Target]>,
        interval: Duration,
        executor: Arc<CheckExecutor>,
        store: Arc<dyn EventStore>,
    ) -> Result<Self, ConfigError> {
        if interval.is_zero() {
            return Err(ConfigError::InvalidInterval(0));
        }

        Ok(Self { targets, interval, executor, store, shutdown_grace: DEFAULT_SHUTDOWN_GRACE })
    }

    pub fn with_shutdown_grace(mut self, grace: Duration) -> Self {
        self.shutdown_grace = grace;
        self
    }

    /// Run rounds until `stop` is raised (or its sender is dropped).
    ///
    /// A round in flight when the stop arrives gets `shutdown_grace` to
    /// finish; checks still running after that are aborted.
    pub async fn run(&self, mut stop: watch::Receiver<bool>) {
        let mut timer = interval(self.interval);
        timer.set_missed_tick_behavior(MissedTickBehavior::Skip);

        info!(
            targets = self.targets.len(),
            interval_secs = self.interval.as_secs_f64(),
            "Poll scheduler started"
        );

        let mut round: u64 = 0;
        loop {
            tokio::select! {
                biased;
                _ = stop_requested(&mut stop) => break,
                _ = timer.tick() => {}
            }

            round += 1;
            let mut checks = self.spawn_round(round);
            let mut summary = RoundSummary::default();

            let stopped = tokio::select! {
                biased;
                _ = join_round(&mut checks, &mut summary) => false,
                _ = stop_requested(&mut stop) => true,
            };

            if stopped {
                info!(round, in_flight = checks.len(), "Stop requested, waiting for in-flight checks");
                if timeout(self.shutdown_grace, join_round(&mut checks, &mut summary)).await.is_err() {
                    warn!(round, abandoned = checks.len(), "Abandoning checks after shutdown grace period");
                    checks.shutdown().await;
                }
                log_round(round, &summary);
                break;
            }

            log_round(round, &summary);
        }

        info!(rounds = round, "Poll scheduler stopped");
    }

    /// Launch one check task per target
    fn spawn_round(&self, round: u64) -> JoinSet<TargetReport> {
        let mut checks = JoinSet::new();

        for target in self.targets.iter() {
            let target = target.clone();
            let executor = Arc::clone(&self.executor);
            let store = Arc::clone(&self.store);

            checks.spawn(async move { check_and_record(&target, round, &executor, store.as_ref()).await });
        }

        checks
    }
}

/// Check one target and append its events, connection first
async fn check_and_record(
    target: &Target,
    round: u64,
    executor: &CheckExecutor,
    store: &dyn EventStore,
) -> TargetReport {
    let outcome = executor.execute(target, round).await;
    let mut report = TargetReport {
        reachable: outcome.connection.status == EventStatus::Connection(ConnectionStatus::Ok),
        ..TargetReport::default()
    };

    for event in outcome.into_events() {
        debug!(url = %event.url, round, status = %event.status, detail = %event.detail, "Check event");

        match store.append(&event).await {
            Ok(_) => report.appended += 1,
            Err(e) => {
                report.failed_appends += 1;
                error!(url = %event.url, round, status = %event.status, "Failed to record event: {}", e);
            }
        }
    }

    report
}

async fn join_round(checks: &mut JoinSet<TargetReport>, summary: &mut RoundSummary) {
    while let Some(joined) = checks.join_next().await {
        match joined {
            Ok(report) => summary.add(report),
            Err(e) if e.is_cancelled() => {}
            Err(e) => error!("Check task panicked: {}", e),
        }
    }
}

fn log_round(round: u64, summary: &RoundSummary) {
    if summary.failed_appends > 0 {
        error!(
            round,
            checked = summary.checked,
            failed_appends = summary.failed_appends,
            "Round finished with unrecorded events"
        );
    } else {
        info!(
            round,
            checked = summary.checked,
            reachable = summary.reachable,
            events = summary.appended,
            "Round finished"
        );
    }
}

/// Resolves once the stop flag is raised or every sender is gone
async fn stop_requested(stop: &mut watch::Receiver<bool>) {
    let _ = stop.wait_for(|stopped| *stopped).await;
}
