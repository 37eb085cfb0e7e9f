//! Reconciliation planning: eligible profiles vs. directory state.
//!
//! The plan is pure data. Buckets are disjoint by uid and sorted by uid, so
//! two plans over the same inputs compare equal.

use std::collections::BTreeSet;

use serde::Serialize;

use roster_core::{Attributes, DirectoryEntry, Dn, SourceUserProfile, UserId};

use crate::attributes;
use crate::state::DirectoryState;

/// A user to add under the managed subtree.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PlannedCreate {
    pub uid: UserId,
    pub dn: Dn,
    pub attributes: Attributes,
}

/// A user whose existing entry is overwritten with fresh attributes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PlannedUpdate {
    pub uid: UserId,
    pub dn: Dn,
    pub attributes: Attributes,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ReconciliationPlan {
    pub creates: Vec<PlannedCreate>,
    pub updates: Vec<PlannedUpdate>,
    pub deletes: Vec<DirectoryEntry>,
}

impl ReconciliationPlan {
    pub fn is_empty(&self) -> bool {
        self.creates.is_empty() && self.updates.is_empty() && self.deletes.is_empty()
    }

    /// Total number of planned operations.
    pub fn len(&self) -> usize {
        self.creates.len() + self.updates.len() + self.deletes.len()
    }
}

/// Diff eligible `profiles` against `state`.
///
/// - profile without entry → create at `uid=<id>,<managed>`
/// - profile with entry → update at the entry's existing DN
/// - entry without profile → delete
///
/// Every eligible profile is updated each cycle, whether or not its
/// attributes changed.
pub fn plan(profiles: &[SourceUserProfile], state: &DirectoryState, managed: &Dn) -> ReconciliationPlan {
    let mut out = ReconciliationPlan::default();
    let mut seen: BTreeSet<&UserId> = BTreeSet::new();

    let mut ordered: Vec<&SourceUserProfile> = profiles.iter().collect();
    ordered.sort_by(|a, b| a.id.cmp(&b.id));

    for profile in ordered {
        if !seen.insert(&profile.id) {
            continue;
        }
        let attributes = attributes::derive(profile);
        match state.get(&profile.id) {
            Some(entry) => out.updates.push(PlannedUpdate {
                uid: profile.id.clone(),
                dn: entry.dn.clone(),
                attributes,
            }),
            None => out.creates.push(PlannedCreate {
                uid: profile.id.clone(),
                dn: Dn::for_user(&profile.id, managed),
                attributes,
            }),
        }
    }

    out.deletes = state
        .iter()
        .filter(|(uid, _)| !seen.contains(uid))
        .map(|(_, entry)| entry.clone())
        .collect();

    tracing::info!(
        "plan: {} to create, {} to update, {} to delete",
        out.creates.len(),
        out.updates.len(),
        out.deletes.len()
    );
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use roster_core::PhoneParts;

    fn managed() -> Dn {
        Dn::from("ou=users,dc=example,dc=com")
    }

    fn profile(id: &str) -> SourceUserProfile {
        SourceUserProfile {
            id: UserId::from(id),
            first_name: Some(format!("First{id}")),
            last_name: Some(format!("Last{id}")),
            email: None,
            phone: PhoneParts::default(),
            status: "ACTIVE".into(),
        }
    }

    fn state(ids: &[&str]) -> DirectoryState {
        ids.iter()
            .map(|id| {
                let uid = UserId::from(*id);
                let entry = DirectoryEntry {
                    dn: Dn::for_user(&uid, &managed()),
                    uid: uid.clone(),
                    attributes: Attributes::new(),
                };
                (uid, entry)
            })
            .collect()
    }

    fn uids<'a>(it: impl Iterator<Item = &'a UserId>) -> Vec<&'a str> {
        it.map(UserId::as_str).collect()
    }

    #[test]
    fn diff_creates_updates_and_deletes() {
        let profiles = vec![profile("A"), profile("B"), profile("C")];
        let plan = plan(&profiles, &state(&["B", "C", "D"]), &managed());

        assert_eq!(uids(plan.creates.iter().map(|c| &c.uid)), ["A"]);
        assert_eq!(uids(plan.updates.iter().map(|u| &u.uid)), ["B", "C"]);
        assert_eq!(uids(plan.deletes.iter().map(|d| &d.uid)), ["D"]);
        assert_eq!(plan.len(), 4);
        assert_eq!(
            plan.creates[0].dn.as_str(),
            "uid=A,ou=users,dc=example,dc=com"
        );
    }

    #[test]
    fn update_keeps_existing_dn() {
        let uid = UserId::from("u1");
        let mut st = DirectoryState::new();
        st.insert(
            uid.clone(),
            DirectoryEntry {
                dn: Dn::from("cn=legacy,ou=users,dc=example,dc=com"),
                uid,
                attributes: Attributes::new(),
            },
        );
        let plan = plan(&[profile("u1")], &st, &managed());
        assert_eq!(plan.updates[0].dn.as_str(), "cn=legacy,ou=users,dc=example,dc=com");
    }

    #[test]
    fn nothing_on_either_side_is_empty() {
        let plan = plan(&[], &DirectoryState::new(), &managed());
        assert!(plan.is_empty());
        assert_eq!(plan.len(), 0);
    }

    #[test]
    fn empty_source_deletes_everything() {
        let plan = plan(&[], &state(&["x", "y"]), &managed());
        assert!(plan.creates.is_empty() && plan.updates.is_empty());
        assert_eq!(plan.deletes.len(), 2);
    }

    #[test]
    fn buckets_are_sorted_and_deterministic() {
        let profiles = vec![profile("c"), profile("a"), profile("b"), profile("a")];
        let first = plan(&profiles, &DirectoryState::new(), &managed());
        let mut reversed = profiles.clone();
        reversed.reverse();
        let second = plan(&reversed, &DirectoryState::new(), &managed());
        assert_eq!(uids(first.creates.iter().map(|c| &c.uid)), ["a", "b", "c"]);
        assert_eq!(first, second);
    }
}
