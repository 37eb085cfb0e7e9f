//! Scheduler loop behaviour with a fake cycle.

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{broadcast, mpsc};
use tokio::time::Instant;

use roster_daemon::{run, run_scheduler, Cycle, DaemonError, SchedulerOptions};
use roster_sync::{CycleReport, SyncError};

#[derive(Default)]
struct FakeCycle {
    runs: AtomicU64,
    fail_on: Vec<u64>,
    bootstrap_fails: bool,
    saw_dry_run: AtomicBool,
    /// Fired from inside `run`, like a signal arriving mid-cycle.
    shutdown_during_run: Option<broadcast::Sender<()>>,
    finished: Option<mpsc::UnboundedSender<u64>>,
}

impl Cycle for FakeCycle {
    fn bootstrap(&self) -> Result<bool, SyncError> {
        if self.bootstrap_fails {
            return Err(SyncError::SiteNotFound {
                name: "bootstrap".into(),
            });
        }
        Ok(false)
    }

    fn run(&self, dry_run: bool) -> Result<CycleReport, SyncError> {
        let n = self.runs.fetch_add(1, Ordering::SeqCst) + 1;
        self.saw_dry_run.store(dry_run, Ordering::SeqCst);
        if let Some(shutdown) = &self.shutdown_during_run {
            let _ = shutdown.send(());
        }
        if let Some(finished) = &self.finished {
            let _ = finished.send(n);
        }
        if self.fail_on.contains(&n) {
            return Err(SyncError::SiteNotFound {
                name: format!("cycle {n}"),
            });
        }
        Ok(CycleReport {
            dry_run,
            ..Default::default()
        })
    }
}

fn options(interval_secs: u64, max_cycles: Option<u64>) -> SchedulerOptions {
    SchedulerOptions {
        interval: Duration::from_secs(interval_secs),
        max_cycles,
        dry_run: false,
    }
}

#[tokio::test(start_paused = true)]
async fn failing_cycle_does_not_stop_the_loop() {
    let cycle = Arc::new(FakeCycle {
        fail_on: vec![1],
        ..Default::default()
    });
    let (shutdown, _) = broadcast::channel(1);

    let summary = tokio_test::assert_ok!(
        run_scheduler(cycle.clone(), options(300, Some(3)), shutdown).await
    );

    assert_eq!(summary.cycles, 3);
    assert_eq!(summary.failed_cycles, 1);
    assert!(summary.last_report.is_some());
    assert_eq!(cycle.runs.load(Ordering::SeqCst), 3);
}

#[tokio::test(start_paused = true)]
async fn cycles_are_spaced_by_the_interval() {
    let cycle = Arc::new(FakeCycle::default());
    let (shutdown, _) = broadcast::channel(1);
    let mut opts = options(300, Some(3));
    opts.dry_run = true;

    let started = Instant::now();
    run_scheduler(cycle.clone(), opts, shutdown).await.expect("scheduler");

    let elapsed = started.elapsed();
    assert!(elapsed >= Duration::from_secs(600), "slept {elapsed:?}");
    assert!(elapsed < Duration::from_secs(900), "slept {elapsed:?}");
    assert!(cycle.saw_dry_run.load(Ordering::SeqCst));
}

#[tokio::test(start_paused = true)]
async fn bootstrap_failure_is_fatal_and_runs_no_cycle() {
    let cycle = Arc::new(FakeCycle {
        bootstrap_fails: true,
        ..Default::default()
    });
    let (shutdown, _) = broadcast::channel(1);

    let err = run_scheduler(cycle.clone(), options(300, None), shutdown)
        .await
        .unwrap_err();
    assert!(matches!(err, DaemonError::Bootstrap(_)), "got: {err}");
    assert_eq!(cycle.runs.load(Ordering::SeqCst), 0);
}

#[tokio::test(start_paused = true)]
async fn shutdown_mid_cycle_lets_the_cycle_finish() {
    let (shutdown, _) = broadcast::channel(1);
    let cycle = Arc::new(FakeCycle {
        shutdown_during_run: Some(shutdown.clone()),
        ..Default::default()
    });

    let started = Instant::now();
    let summary = run_scheduler(cycle, options(3600, None), shutdown)
        .await
        .expect("scheduler");

    assert_eq!(summary.cycles, 1);
    assert!(summary.last_report.is_some(), "the interrupted cycle completed");
    assert!(started.elapsed() < Duration::from_secs(3600));
}

#[tokio::test]
async fn shutdown_during_sleep_exits_promptly() {
    let (finished_tx, mut finished_rx) = mpsc::unbounded_channel();
    let cycle = Arc::new(FakeCycle {
        finished: Some(finished_tx),
        ..Default::default()
    });
    let (shutdown, _) = broadcast::channel(1);

    let handle = tokio::spawn(run_scheduler(cycle, options(3600, None), shutdown.clone()));
    assert_eq!(finished_rx.recv().await, Some(1));
    tokio::time::sleep(Duration::from_millis(20)).await;
    shutdown.send(()).expect("scheduler is listening");

    let summary = tokio::time::timeout(Duration::from_secs(5), handle)
        .await
        .expect("scheduler exited before timeout")
        .expect("join")
        .expect("scheduler");
    assert_eq!(summary.cycles, 1);
}

#[tokio::test]
async fn run_returns_once_the_scheduler_stops() {
    let cycle = Arc::new(FakeCycle::default());

    let summary = tokio::time::timeout(Duration::from_secs(5), run(cycle.clone(), options(0, Some(1))))
        .await
        .expect("run exits without a signal")
        .expect("run");
    assert_eq!(summary.cycles, 1);

    let failing = Arc::new(FakeCycle {
        bootstrap_fails: true,
        ..Default::default()
    });
    let err = tokio::time::timeout(Duration::from_secs(5), run(failing, options(0, None)))
        .await
        .expect("run exits without a signal")
        .unwrap_err();
    assert!(matches!(err, DaemonError::Bootstrap(_)), "got: {err}");
}
