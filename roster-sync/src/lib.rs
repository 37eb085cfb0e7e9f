//! # roster-sync
//!
//! Reconciliation engine: turns access policies into the set of people who
//! should exist in the directory and makes the managed subtree match.
//!
//! Pipeline, per cycle:
//!
//! 1. [`extract`]: policies → distinct individual user ids
//! 2. [`resolve`]: ids → active, non-excluded profiles
//! 3. [`state`]: managed entries currently in the directory
//! 4. [`plan`]: creates / updates / deletes, attributes via [`attributes`]
//! 5. [`backup`]: LDIF snapshot before the first mutation
//! 6. [`apply`]: execute the plan, tallying per-entry failures
//!
//! [`pipeline`] wires the steps together for the CLI and the daemon.

pub mod apply;
pub mod attributes;
pub mod backup;
pub mod error;
pub mod extract;
pub mod pipeline;
pub mod plan;
pub mod resolve;
pub mod state;

pub use apply::{apply, ApplyStats};
pub use backup::{SnapshotRecord, SnapshotResult};
pub use error::SyncError;
pub use extract::{extract_user_ids, ExtractStats, Extraction};
pub use pipeline::{
    backup_now, bootstrap, fetch_policies, plan_cycle, retry_policy, run_cycle, CycleContext,
    CycleReport, PlanCounts,
};
pub use plan::{plan, PlannedCreate, PlannedUpdate, ReconciliationPlan};
pub use resolve::{ExclusionFilter, ProfileResolver, Resolution, ResolveStats};
pub use state::{ensure_managed_subtree, read_state, DirectoryState};
