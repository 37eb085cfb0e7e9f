//! Profile resolution: user ids → eligible profiles.
//!
//! Every id is fetched individually under the shared [`RetryPolicy`]. A
//! failure only drops that user. Successful fetches are spaced by a fixed
//! pacing delay so a large roster does not trip the source's rate limiter.

use std::collections::BTreeSet;
use std::time::Duration;

use serde::Serialize;

use roster_core::{SourceUserProfile, SyncConfig, UserId};
use roster_source::{Pause, RetryPolicy, SourceApi, SourceError};

// ---------------------------------------------------------------------------
// Exclusion filter
// ---------------------------------------------------------------------------

/// Case-insensitive surname substring filter.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ExclusionFilter {
    needles: Vec<String>,
}

impl ExclusionFilter {
    pub fn new<I, S>(substrings: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        Self {
            needles: substrings
                .into_iter()
                .map(|s| s.as_ref().trim().to_lowercase())
                .filter(|s| !s.is_empty())
                .collect(),
        }
    }

    pub fn from_config(config: &SyncConfig) -> Self {
        Self::new(&config.exclude_surnames)
    }

    /// The first configured substring contained in `surname`, if any.
    pub fn matching(&self, surname: &str) -> Option<&str> {
        let surname = surname.to_lowercase();
        self.needles
            .iter()
            .find(|needle| surname.contains(needle.as_str()))
            .map(String::as_str)
    }

    pub fn excludes(&self, profile: &SourceUserProfile) -> bool {
        profile
            .last_name
            .as_deref()
            .is_some_and(|surname| self.matching(surname).is_some())
    }
}

// ---------------------------------------------------------------------------
// Resolver
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct ResolveStats {
    /// Profiles fetched successfully, before filtering.
    pub resolved: usize,
    pub failed: usize,
    pub skipped_inactive: usize,
    pub skipped_excluded: usize,
}

impl ResolveStats {
    /// Profiles that passed both filters.
    pub fn eligible(&self) -> usize {
        self.resolved - self.skipped_inactive - self.skipped_excluded
    }
}

#[derive(Debug, Clone, Default)]
pub struct Resolution {
    pub profiles: Vec<SourceUserProfile>,
    pub failed: Vec<UserId>,
    pub stats: ResolveStats,
}

pub struct ProfileResolver<'a> {
    api: &'a dyn SourceApi,
    pause: &'a dyn Pause,
    retry: RetryPolicy,
    pacing: Duration,
    exclusions: ExclusionFilter,
}

impl<'a> ProfileResolver<'a> {
    pub fn new(
        api: &'a dyn SourceApi,
        pause: &'a dyn Pause,
        retry: RetryPolicy,
        pacing: Duration,
        exclusions: ExclusionFilter,
    ) -> Self {
        Self {
            api,
            pause,
            retry,
            pacing,
            exclusions,
        }
    }

    /// Resolver wired from the sync section of the configuration.
    pub fn from_config(api: &'a dyn SourceApi, pause: &'a dyn Pause, config: &SyncConfig) -> Self {
        Self::new(
            api,
            pause,
            RetryPolicy::new(config.retry_max_attempts, config.retry_base_delay),
            config.pacing_delay,
            ExclusionFilter::from_config(config),
        )
    }

    /// Fetch, then filter by status and surname, in id order.
    pub fn resolve(&self, ids: &BTreeSet<UserId>) -> Resolution {
        let mut out = Resolution::default();
        let mut remaining = ids.len();

        for id in ids {
            remaining -= 1;
            let fetched = self
                .retry
                .run(self.pause, SourceError::is_rate_limited, |_| self.api.get_user(id));
            let profile = match fetched {
                Ok(profile) => profile,
                Err(err) => {
                    tracing::warn!("failed to fetch user {id}: {err}");
                    out.stats.failed += 1;
                    out.failed.push(id.clone());
                    continue;
                }
            };

            out.stats.resolved += 1;
            if remaining > 0 && !self.pacing.is_zero() {
                self.pause.pause(self.pacing);
            }

            if !profile.status.is_active() {
                tracing::debug!("skipping user {id}: status {}", profile.status);
                out.stats.skipped_inactive += 1;
                continue;
            }
            if self.exclusions.excludes(&profile) {
                tracing::info!(
                    "skipping user {id}: surname {:?} is excluded",
                    profile.last_name.as_deref().unwrap_or_default()
                );
                out.stats.skipped_excluded += 1;
                continue;
            }
            out.profiles.push(profile);
        }

        tracing::info!(
            "resolved {} user(s): {} eligible, {} inactive, {} excluded, {} failed",
            out.stats.resolved,
            out.stats.eligible(),
            out.stats.skipped_inactive,
            out.stats.skipped_excluded,
            out.stats.failed
        );
        out
    }
}
