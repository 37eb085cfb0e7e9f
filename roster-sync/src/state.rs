//! Directory-side state: managed subtree bootstrap and current entries.

use std::collections::BTreeMap;

use roster_core::{Attributes, DirectoryEntry, Dn, UserId};
use roster_directory::{Directory, DirectoryError, PERSON_CLASS, SUBTREE_CLASS};

use crate::error::SyncError;

/// `description` given to a subtree created by [`ensure_managed_subtree`].
pub const SUBTREE_DESCRIPTION: &str = "Access control users";

/// Managed entries keyed by `uid`.
pub type DirectoryState = BTreeMap<UserId, DirectoryEntry>;

/// Create the managed subtree if it does not exist.
///
/// Returns `true` when the subtree was created by this call.
pub fn ensure_managed_subtree(
    dir: &mut dyn Directory,
    managed: &Dn,
    ou_name: &str,
) -> Result<bool, SyncError> {
    let bootstrap = |source: DirectoryError| SyncError::Bootstrap {
        dn: managed.0.clone(),
        source,
    };

    if dir.exists(managed).map_err(bootstrap)? {
        tracing::debug!("managed subtree {managed} present");
        return Ok(false);
    }

    let mut attributes = Attributes::new();
    attributes.insert("ou".to_owned(), vec![ou_name.to_owned()]);
    attributes.insert("description".to_owned(), vec![SUBTREE_DESCRIPTION.to_owned()]);
    dir.add(managed, &[SUBTREE_CLASS], &attributes).map_err(bootstrap)?;
    tracing::info!("created managed subtree {managed}");
    Ok(true)
}

/// Read every person entry under `managed`.
///
/// A failed search is logged and yields an empty state, which makes the
/// cycle create-only. Entries without a `uid` are ignored; when two entries
/// share a `uid` the first by DN wins.
pub fn read_state(dir: &mut dyn Directory, managed: &Dn) -> DirectoryState {
    let entries = match dir.search(managed, Some(PERSON_CLASS)) {
        Ok(entries) => entries,
        Err(err) => {
            tracing::warn!("could not read managed entries under {managed}: {err}");
            return DirectoryState::new();
        }
    };

    let mut sorted = entries;
    sorted.sort_by(|a, b| a.dn.cmp(&b.dn));

    let mut state = DirectoryState::new();
    for entry in sorted {
        let Some(uid) = entry.first("uid").map(str::trim).filter(|u| !u.is_empty()) else {
            tracing::debug!("ignoring {} without uid", entry.dn);
            continue;
        };
        let uid = UserId::from(uid);
        if let Some(kept) = state.get(&uid) {
            tracing::warn!(
                "duplicate uid {uid}: keeping {}, ignoring {}",
                kept.dn,
                entry.dn
            );
            continue;
        }
        state.insert(
            uid.clone(),
            DirectoryEntry {
                dn: entry.dn,
                uid,
                attributes: entry.attributes,
            },
        );
    }
    tracing::info!("found {} managed entries under {managed}", state.len());
    state
}
