//! One reconciliation cycle, end to end.
//!
//! Shared entrypoint for `roster once`, `roster plan`, `roster backup` and the
//! daemon loop. Everything here is synchronous; the daemon runs it on the
//! blocking pool.

use std::path::PathBuf;
use std::time::{Duration, Instant};

use serde::Serialize;

use roster_core::{Config, Dn, SourcePolicy, SourceSite, SourceUserProfile, SyncConfig};
use roster_directory::{Directory, DirectoryConnector};
use roster_source::{fetch_all, Endpoint, Pause, RetryPolicy, SourceApi};

use crate::apply::{apply, ApplyStats};
use crate::backup::{self, SnapshotResult};
use crate::error::SyncError;
use crate::extract::{extract_user_ids, ExtractStats};
use crate::plan::{plan, ReconciliationPlan};
use crate::resolve::{ProfileResolver, ResolveStats};
use crate::state::{ensure_managed_subtree, read_state};

// ---------------------------------------------------------------------------
// Context and report
// ---------------------------------------------------------------------------

/// Collaborators for one cycle.
#[derive(Clone, Copy)]
pub struct CycleContext<'a> {
    pub config: &'a Config,
    pub source: &'a dyn SourceApi,
    pub directory: &'a dyn DirectoryConnector,
    pub pause: &'a dyn Pause,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct PlanCounts {
    pub creates: usize,
    pub updates: usize,
    pub deletes: usize,
}

impl From<&ReconciliationPlan> for PlanCounts {
    fn from(plan: &ReconciliationPlan) -> Self {
        Self {
            creates: plan.creates.len(),
            updates: plan.updates.len(),
            deletes: plan.deletes.len(),
        }
    }
}

/// Summary of one cycle.
#[derive(Debug, Clone, Default, Serialize)]
pub struct CycleReport {
    pub dry_run: bool,
    pub extract: ExtractStats,
    pub candidates: usize,
    #[serde(flatten)]
    pub resolve: ResolveStats,
    pub planned: PlanCounts,
    #[serde(flatten)]
    pub apply: ApplyStats,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub snapshot: Option<PathBuf>,
    pub duration_ms: u64,
}

impl CycleReport {
    pub fn duration(&self) -> Duration {
        Duration::from_millis(self.duration_ms)
    }

    /// One-line human summary, also used as the cycle log line.
    pub fn summary(&self) -> String {
        format!(
            "{}{} policies, {} candidates, {} resolved ({} inactive, {} excluded, {} failed); \
             added {}, updated {}, deleted {}, errors {} in {:.1}s",
            if self.dry_run { "[dry-run] " } else { "" },
            self.extract.policies,
            self.candidates,
            self.resolve.resolved,
            self.resolve.skipped_inactive,
            self.resolve.skipped_excluded,
            self.resolve.failed,
            self.apply.added,
            self.apply.updated,
            self.apply.deleted,
            self.apply.errors,
            self.duration().as_secs_f64()
        )
    }

    fn finish(&mut self, started: Instant) {
        self.duration_ms = u64::try_from(started.elapsed().as_millis()).unwrap_or(u64::MAX);
    }
}

pub fn retry_policy(config: &SyncConfig) -> RetryPolicy {
    RetryPolicy::new(config.retry_max_attempts, config.retry_base_delay)
}

// ---------------------------------------------------------------------------
// Entry points
// ---------------------------------------------------------------------------

/// Make sure the managed subtree exists. Any failure, including failing to
/// connect, is a [`SyncError::Bootstrap`].
pub fn bootstrap(ctx: &CycleContext<'_>) -> Result<bool, SyncError> {
    let managed = ctx.config.directory.managed_dn();
    let mut session = ctx
        .directory
        .connect()
        .map_err(|source| SyncError::Bootstrap {
            dn: managed.0.clone(),
            source,
        })?;
    let result = ensure_managed_subtree(session.as_mut(), &managed, &ctx.config.directory.managed_ou);
    close(session.as_mut());
    result
}

/// Run a full cycle: fetch, resolve, plan, snapshot, apply.
pub fn run_cycle(ctx: &CycleContext<'_>, dry_run: bool) -> Result<CycleReport, SyncError> {
    let started = Instant::now();
    let mut report = CycleReport {
        dry_run,
        ..Default::default()
    };
    let profiles = gather(ctx, &mut report)?;

    let managed = ctx.config.directory.managed_dn();
    with_session(ctx.directory, |dir| {
        let state = read_state(dir, &managed);
        let plan = plan(&profiles, &state, &managed);
        report.planned = PlanCounts::from(&plan);

        if !dry_run && !plan.is_empty() {
            if let Some(backup_dir) = &ctx.config.sync.backup_dir {
                let base = Dn::from(ctx.config.directory.base_dn.as_str());
                let snap = backup::snapshot(dir, &base, backup_dir).map_err(|err| {
                    tracing::error!("snapshot failed, skipping this cycle's changes: {err}");
                    SyncError::Snapshot {
                        dir: backup_dir.clone(),
                        source: Box::new(err),
                    }
                })?;
                report.snapshot = Some(snap.path().to_path_buf());
            }
        }

        report.apply = apply(dir, &plan, dry_run);
        Ok(())
    })?;

    report.finish(started);
    tracing::info!("cycle complete: {}", report.summary());
    Ok(report)
}

/// Everything up to and including planning; nothing is written.
pub fn plan_cycle(ctx: &CycleContext<'_>) -> Result<(ReconciliationPlan, CycleReport), SyncError> {
    let started = Instant::now();
    let mut report = CycleReport {
        dry_run: true,
        ..Default::default()
    };
    let profiles = gather(ctx, &mut report)?;

    let managed = ctx.config.directory.managed_dn();
    let plan = with_session(ctx.directory, |dir| {
        let state = read_state(dir, &managed);
        Ok(plan(&profiles, &state, &managed))
    })?;
    report.planned = PlanCounts::from(&plan);
    report.finish(started);
    Ok((plan, report))
}

/// Snapshot the whole base DN now, outside any cycle.
pub fn backup_now(ctx: &CycleContext<'_>) -> Result<SnapshotResult, SyncError> {
    let Some(backup_dir) = &ctx.config.sync.backup_dir else {
        return Err(SyncError::BackupNotConfigured);
    };
    let base = Dn::from(ctx.config.directory.base_dn.as_str());
    with_session(ctx.directory, |dir| backup::snapshot(dir, &base, backup_dir))
}

// ---------------------------------------------------------------------------
// Steps
// ---------------------------------------------------------------------------

/// Source side: policies → ids → eligible profiles.
fn gather(
    ctx: &CycleContext<'_>,
    report: &mut CycleReport,
) -> Result<Vec<SourceUserProfile>, SyncError> {
    let policies = fetch_policies(ctx)?;
    let extraction = extract_user_ids(&policies);
    report.extract = extraction.stats;
    report.candidates = extraction.ids.len();

    let resolver = ProfileResolver::from_config(ctx.source, ctx.pause, &ctx.config.sync);
    let resolution = resolver.resolve(&extraction.ids);
    report.resolve = resolution.stats;
    Ok(resolution.profiles)
}

/// All policies, scoped to the configured site when one is named.
pub fn fetch_policies(ctx: &CycleContext<'_>) -> Result<Vec<SourcePolicy>, SyncError> {
    let retry = retry_policy(&ctx.config.sync);
    let page_size = ctx.config.source.page_size;

    let endpoint = match ctx.config.source.site_name.as_deref() {
        Some(name) => {
            let sites: Vec<SourceSite> =
                fetch_all(ctx.source, Endpoint::sites(), page_size, retry, ctx.pause)?;
            let site = sites
                .into_iter()
                .find(|site| site.name.trim().eq_ignore_ascii_case(name.trim()))
                .ok_or_else(|| SyncError::SiteNotFound {
                    name: name.to_owned(),
                })?;
            tracing::info!("scoping policies to site {} ({})", site.name, site.id);
            Endpoint::policies_for_site(&site.id)
        }
        None => Endpoint::policies(),
    };

    let policies: Vec<SourcePolicy> = fetch_all(ctx.source, endpoint, page_size, retry, ctx.pause)?;
    tracing::info!("fetched {} access policies", policies.len());
    Ok(policies)
}

/// Open a session, run `f`, and always close the session afterwards.
fn with_session<T, F>(connector: &dyn DirectoryConnector, f: F) -> Result<T, SyncError>
where
    F: FnOnce(&mut dyn Directory) -> Result<T, SyncError>,
{
    let mut session = connector.connect()?;
    let result = f(session.as_mut());
    close(session.as_mut());
    result
}

fn close(session: &mut dyn Directory) {
    if let Err(err) = session.close() {
        tracing::warn!("failed to close directory session: {err}");
    }
}
