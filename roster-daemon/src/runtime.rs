use std::sync::Arc;
use std::time::Duration;

use tokio::sync::broadcast::{self, error::TryRecvError};
use tokio::time::Instant;

use roster_core::Config;
use roster_directory::{DirectoryConnector, LdapConnector};
use roster_source::{HttpSourceClient, ThreadPause};
use roster_sync::{CycleContext, CycleReport, SyncError};

use crate::error::{io_err, DaemonError};
use crate::logging::init_tracing;

// ---------------------------------------------------------------------------
// Cycle seam
// ---------------------------------------------------------------------------

/// What the scheduler drives. Both methods block and run on the blocking pool.
pub trait Cycle: Send + Sync {
    /// Prepare the managed subtree. Returns `true` when it was created.
    fn bootstrap(&self) -> Result<bool, SyncError>;

    fn run(&self, dry_run: bool) -> Result<CycleReport, SyncError>;
}

/// Production [`Cycle`]: HTTP source, LDAP directory, real sleeps.
pub struct LiveCycle {
    config: Config,
    source: HttpSourceClient,
    directory: Box<dyn DirectoryConnector>,
}

impl LiveCycle {
    pub fn new(config: Config) -> Self {
        let source = HttpSourceClient::new(&config.source);
        let directory = Box::new(LdapConnector::new(config.directory.clone()));
        Self::with_parts(config, source, directory)
    }

    pub fn with_parts(
        config: Config,
        source: HttpSourceClient,
        directory: Box<dyn DirectoryConnector>,
    ) -> Self {
        Self {
            config,
            source,
            directory,
        }
    }

    /// Borrowed collaborators for the `roster_sync` entry points.
    pub fn context(&self) -> CycleContext<'_> {
        CycleContext {
            config: &self.config,
            source: &self.source,
            directory: self.directory.as_ref(),
            pause: &ThreadPause,
        }
    }
}

impl Cycle for LiveCycle {
    fn bootstrap(&self) -> Result<bool, SyncError> {
        roster_sync::bootstrap(&self.context())
    }

    fn run(&self, dry_run: bool) -> Result<CycleReport, SyncError> {
        roster_sync::run_cycle(&self.context(), dry_run)
    }
}

// ---------------------------------------------------------------------------
// Scheduler
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SchedulerOptions {
    pub interval: Duration,
    /// Stop after this many cycles; `None` runs until shutdown.
    pub max_cycles: Option<u64>,
    pub dry_run: bool,
}

impl SchedulerOptions {
    pub fn from_config(config: &Config) -> Self {
        Self {
            interval: config.sync.interval,
            max_cycles: None,
            dry_run: false,
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct SchedulerSummary {
    pub cycles: u64,
    pub failed_cycles: u64,
    pub last_report: Option<CycleReport>,
}

/// Bootstrap, then run cycles until shutdown or `max_cycles`.
///
/// A failed cycle is logged and the loop continues. Shutdown is checked
/// before each cycle and interrupts the sleep between cycles; a cycle that
/// has started always runs to completion.
pub async fn run_scheduler(
    cycle: Arc<dyn Cycle>,
    options: SchedulerOptions,
    shutdown: broadcast::Sender<()>,
) -> Result<SchedulerSummary, DaemonError> {
    let mut shutdown_rx = shutdown.subscribe();

    let boot = Arc::clone(&cycle);
    let created = tokio::task::spawn_blocking(move || boot.bootstrap())
        .await
        .map_err(|err| join_err("bootstrap", err))?
        .map_err(DaemonError::Bootstrap)?;
    if created {
        tracing::info!("managed subtree created");
    }

    let mut summary = SchedulerSummary::default();
    loop {
        match shutdown_rx.try_recv() {
            Err(TryRecvError::Empty) => {}
            _ => break,
        }

        let started = Instant::now();
        let worker = Arc::clone(&cycle);
        let dry_run = options.dry_run;
        let result = tokio::task::spawn_blocking(move || worker.run(dry_run))
            .await
            .map_err(|err| join_err("cycle", err))?;

        summary.cycles += 1;
        match result {
            Ok(report) => {
                tracing::info!(
                    cycle = summary.cycles,
                    added = report.apply.added,
                    updated = report.apply.updated,
                    deleted = report.apply.deleted,
                    errors = report.apply.errors,
                    failed_users = report.resolve.failed,
                    duration_ms = report.duration_ms,
                    "sync cycle finished",
                );
                summary.last_report = Some(report);
            }
            Err(err) => {
                summary.failed_cycles += 1;
                tracing::error!(
                    cycle = summary.cycles,
                    error = %err,
                    elapsed_ms = started.elapsed().as_millis() as u64,
                    "sync cycle failed; will retry next interval",
                );
            }
        }

        if options.max_cycles.is_some_and(|max| summary.cycles >= max) {
            break;
        }

        tracing::debug!(interval_secs = options.interval.as_secs(), "sleeping until next cycle");
        tokio::select! {
            _ = shutdown_rx.recv() => break,
            _ = tokio::time::sleep(options.interval) => {}
        }
    }

    tracing::info!(
        cycles = summary.cycles,
        failed = summary.failed_cycles,
        "scheduler stopped"
    );
    Ok(summary)
}

// ---------------------------------------------------------------------------
// Process entry points
// ---------------------------------------------------------------------------

/// Install logging, start a runtime and block until the daemon exits.
pub fn start_blocking(config: Config, options: SchedulerOptions) -> Result<SchedulerSummary, DaemonError> {
    init_tracing();
    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
        .map_err(|e| io_err("tokio runtime", e))?;
    runtime.block_on(run(Arc::new(LiveCycle::new(config)), options))
}

/// Run the scheduler alongside the signal listener.
pub async fn run(
    cycle: Arc<dyn Cycle>,
    options: SchedulerOptions,
) -> Result<SchedulerSummary, DaemonError> {
    let (shutdown_tx, _) = broadcast::channel::<()>(4);
    let signal_handle = spawn_signal_listener(shutdown_tx.clone());

    let scheduler_handle = {
        let shutdown = shutdown_tx.clone();
        tokio::spawn(async move {
            let result = run_scheduler(cycle, options, shutdown.clone()).await;
            let _ = shutdown.send(());
            result
        })
    };

    let (scheduler_result, signal_result) = tokio::join!(scheduler_handle, signal_handle);
    handle_join("signal_handler", signal_result)?;
    scheduler_result.map_err(|err| join_err("scheduler", err))?
}

/// Forward SIGINT/SIGTERM into `shutdown`, or return once anyone else sends
/// on it. Subscribes before spawning.
fn spawn_signal_listener(
    shutdown: broadcast::Sender<()>,
) -> tokio::task::JoinHandle<Result<(), DaemonError>> {
    let mut shutdown_rx = shutdown.subscribe();
    tokio::spawn(async move {
        tokio::select! {
            _ = shutdown_rx.recv() => Ok(()),
            signal = wait_for_signal() => match signal {
                Ok(name) => {
                    tracing::info!(signal = name, "shutdown requested");
                    let _ = shutdown.send(());
                    Ok(())
                }
                Err(err) => Err(err),
            }
        }
    })
}

#[cfg(unix)]
async fn wait_for_signal() -> Result<&'static str, DaemonError> {
    use tokio::signal::unix::{signal, SignalKind};

    let mut term = signal(SignalKind::terminate()).map_err(|e| io_err("SIGTERM handler", e))?;
    tokio::select! {
        result = tokio::signal::ctrl_c() => {
            result.map_err(|err| DaemonError::Signal(err.to_string()))?;
            Ok("SIGINT")
        }
        _ = term.recv() => Ok("SIGTERM"),
    }
}

#[cfg(not(unix))]
async fn wait_for_signal() -> Result<&'static str, DaemonError> {
    tokio::signal::ctrl_c()
        .await
        .map_err(|err| DaemonError::Signal(err.to_string()))?;
    Ok("ctrl-c")
}

fn handle_join(
    task: &'static str,
    result: Result<Result<(), DaemonError>, tokio::task::JoinError>,
) -> Result<(), DaemonError> {
    match result {
        Ok(inner) => inner,
        Err(err) => Err(join_err(task, err)),
    }
}

fn join_err(task: &'static str, err: tokio::task::JoinError) -> DaemonError {
    DaemonError::Join {
        task,
        message: err.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn options_take_interval_from_config() {
        let config = test_config();
        let options = SchedulerOptions::from_config(&config);
        assert_eq!(options.interval, Duration::from_secs(42));
        assert_eq!(options.max_cycles, None);
        assert!(!options.dry_run);
    }

    #[tokio::test]
    async fn join_failure_is_reported_with_task_name() {
        let handle = tokio::spawn(async {
            if true {
                panic!("boom");
            }
            Ok::<(), DaemonError>(())
        });
        let err = handle_join("worker", handle.await).unwrap_err();
        assert!(err.to_string().starts_with("worker task join failure"), "{err}");
    }

    #[tokio::test]
    async fn signal_listener_sees_shutdown_sent_before_it_runs() {
        let (shutdown_tx, _) = broadcast::channel::<()>(4);
        let listener = spawn_signal_listener(shutdown_tx.clone());
        shutdown_tx.send(()).expect("listener is subscribed");

        let joined = tokio::time::timeout(Duration::from_secs(5), listener)
            .await
            .expect("listener exits without a signal");
        handle_join("signal_handler", joined).expect("clean exit");
    }

    fn test_config() -> Config {
        let env = |key: &str| -> Option<String> {
            match key {
                "ROSTER_SOURCE_URL" => Some("http://source.invalid".into()),
                "ROSTER_SOURCE_TOKEN" => Some("t".into()),
                "ROSTER_LDAP_URL" => Some("ldap://directory.invalid".into()),
                "ROSTER_LDAP_BIND_DN" => Some("cn=admin,dc=x".into()),
                "ROSTER_LDAP_BASE_DN" => Some("dc=x".into()),
                "ROSTER_SYNC_INTERVAL_SECS" => Some("42".into()),
                _ => None,
            }
        };
        roster_core::config::load_with(None, env).expect("config")
    }
}
