//! Plan execution against an open directory session.
//!
//! Each operation stands alone: a failure is logged, counted, and the next
//! operation proceeds. Nothing is rolled back.

use serde::Serialize;

use roster_directory::{Directory, PERSON_CLASS};

use crate::plan::ReconciliationPlan;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct ApplyStats {
    pub added: usize,
    pub updated: usize,
    pub deleted: usize,
    pub errors: usize,
}

/// Apply creates, then updates, then deletes.
///
/// With `dry_run` nothing is written; every operation is logged and counted
/// as if it had succeeded.
pub fn apply(dir: &mut dyn Directory, plan: &ReconciliationPlan, dry_run: bool) -> ApplyStats {
    let mut stats = ApplyStats::default();
    let tag = if dry_run { "[dry-run] " } else { "" };

    for create in &plan.creates {
        let result = if dry_run {
            Ok(())
        } else {
            dir.add(&create.dn, &[PERSON_CLASS], &create.attributes)
        };
        match result {
            Ok(()) => {
                tracing::info!("{tag}added {}", create.dn);
                stats.added += 1;
            }
            Err(err) => {
                tracing::error!("failed to add {}: {err}", create.dn);
                stats.errors += 1;
            }
        }
    }

    for update in &plan.updates {
        let result = if dry_run {
            Ok(())
        } else {
            dir.modify_replace(&update.dn, &update.attributes)
        };
        match result {
            Ok(()) => {
                tracing::debug!("{tag}updated {}", update.dn);
                stats.updated += 1;
            }
            Err(err) => {
                tracing::error!("failed to update {}: {err}", update.dn);
                stats.errors += 1;
            }
        }
    }

    for entry in &plan.deletes {
        let result = if dry_run { Ok(()) } else { dir.delete(&entry.dn) };
        match result {
            Ok(()) => {
                tracing::info!("{tag}deleted {}", entry.dn);
                stats.deleted += 1;
            }
            Err(err) => {
                tracing::error!("failed to delete {}: {err}", entry.dn);
                stats.errors += 1;
            }
        }
    }

    stats
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::plan::{self, PlannedCreate};
    use crate::state::{read_state, DirectoryState};
    use roster_core::{Attributes, DirectoryEntry, Dn, PhoneParts, SourceUserProfile, UserId};
    use roster_directory::{MemoryDirectory, SUBTREE_CLASS};

    fn managed() -> Dn {
        Dn::from("ou=users,dc=example,dc=com")
    }

    fn dir_with_subtree() -> MemoryDirectory {
        let dir = MemoryDirectory::new();
        dir.seed(&managed(), &[SUBTREE_CLASS], Attributes::new());
        dir
    }

    fn profile(id: &str, first: &str, last: &str) -> SourceUserProfile {
        SourceUserProfile {
            id: UserId::from(id),
            first_name: Some(first.into()),
            last_name: Some(last.into()),
            email: None,
            phone: PhoneParts::default(),
            status: "ACTIVE".into(),
        }
    }

    #[test]
    fn applies_all_three_buckets() {
        let mut dir = dir_with_subtree();
        let stale = Dn::for_user(&UserId::from("gone"), &managed());
        dir.seed(&stale, &[PERSON_CLASS], [("uid".to_owned(), vec!["gone".to_owned()])].into());
        let kept = Dn::for_user(&UserId::from("u2"), &managed());
        dir.seed(&kept, &[PERSON_CLASS], [("uid".to_owned(), vec!["u2".to_owned()])].into());

        let state = read_state(&mut dir, &managed());
        let profiles = [profile("u1", "Ada", "Lovelace"), profile("u2", "Grace", "Hopper")];
        let plan = plan::plan(&profiles, &state, &managed());
        let stats = apply(&mut dir, &plan, false);

        assert_eq!(
            stats,
            ApplyStats {
                added: 1,
                updated: 1,
                deleted: 1,
                errors: 0
            }
        );
        assert!(dir.get(&stale).is_none());
        let updated = dir.get(&kept).expect("u2");
        assert_eq!(updated.first("cn"), Some("Grace Hopper"));
        let added = dir.get(&Dn::for_user(&UserId::from("u1"), &managed())).expect("u1");
        assert_eq!(added.first("mail"), Some("user_u1@fallback.com"));
    }

    #[test]
    fn one_failure_does_not_stop_the_rest() {
        let mut dir = dir_with_subtree();
        let bad = Dn::for_user(&UserId::from("bad"), &managed());
        dir.fail_writes_to(&bad);

        let profiles = [profile("bad", "B", "Ad"), profile("good", "G", "Ood")];
        let plan = plan::plan(&profiles, &DirectoryState::new(), &managed());
        let stats = apply(&mut dir, &plan, false);

        assert_eq!(stats.added, 1);
        assert_eq!(stats.errors, 1);
        assert!(dir.get(&Dn::for_user(&UserId::from("good"), &managed())).is_some());
    }

    #[test]
    fn already_existing_entry_counts_as_error() {
        let mut dir = dir_with_subtree();
        let dn = Dn::for_user(&UserId::from("u1"), &managed());
        dir.seed(&dn, &[PERSON_CLASS], Attributes::new());
        let plan = ReconciliationPlan {
            creates: vec![PlannedCreate {
                uid: UserId::from("u1"),
                dn,
                attributes: Attributes::new(),
            }],
            ..Default::default()
        };
        assert_eq!(apply(&mut dir, &plan, false).errors, 1);
    }

    #[test]
    fn dry_run_counts_without_writing() {
        let mut dir = dir_with_subtree();
        let plan = ReconciliationPlan {
            deletes: vec![DirectoryEntry {
                dn: Dn::from("uid=x,ou=users,dc=example,dc=com"),
                uid: UserId::from("x"),
                attributes: Attributes::new(),
            }],
            ..plan::plan(&[profile("u1", "A", "B")], &DirectoryState::new(), &managed())
        };
        let stats = apply(&mut dir, &plan, true);
        assert_eq!(stats.added, 1);
        assert_eq!(stats.deleted, 1);
        assert_eq!(dir.writes(), 0);
    }
}
