//! In-process [`Directory`] for dry runs and tests.
//!
//! Clones share the same tree, so a handle kept by a test observes whatever a
//! session opened through [`DirectoryConnector`] wrote.

use std::collections::{BTreeMap, BTreeSet};
use std::sync::{Arc, Mutex, MutexGuard};

use roster_core::{Attributes, Dn};

use crate::error::{DirectoryError, RC_ALREADY_EXISTS, RC_NO_SUCH_OBJECT, RC_OTHER};
use crate::{BinaryAttributes, Directory, DirectoryConnector, Entry};

#[derive(Debug, Default)]
struct State {
    entries: BTreeMap<String, Entry>,
    failing: BTreeSet<String>,
    fail_search: bool,
    fail_connect: bool,
    writes: usize,
    sessions_opened: usize,
    sessions_closed: usize,
}

/// Shared in-memory directory tree keyed by normalized DN.
#[derive(Debug, Clone, Default)]
pub struct MemoryDirectory {
    state: Arc<Mutex<State>>,
}

impl MemoryDirectory {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert an entry directly, bypassing parent checks and counters.
    pub fn seed(&self, dn: &Dn, object_classes: &[&str], attributes: Attributes) {
        let mut attributes = attributes;
        attributes.insert(
            "objectClass".to_owned(),
            object_classes.iter().map(|c| (*c).to_owned()).collect(),
        );
        self.lock().entries.insert(
            key(dn),
            Entry {
                dn: dn.clone(),
                attributes,
                binary: BinaryAttributes::new(),
            },
        );
    }

    /// Attach a binary value to a seeded entry.
    pub fn seed_binary(&self, dn: &Dn, name: &str, value: Vec<u8>) {
        if let Some(entry) = self.lock().entries.get_mut(&key(dn)) {
            entry.binary.entry(name.to_owned()).or_default().push(value);
        }
    }

    pub fn get(&self, dn: &Dn) -> Option<Entry> {
        self.lock().entries.get(&key(dn)).cloned()
    }

    /// Make every mutation of `dn` fail with rc 80.
    pub fn fail_writes_to(&self, dn: &Dn) {
        self.lock().failing.insert(key(dn));
    }

    pub fn fail_searches(&self, fail: bool) {
        self.lock().fail_search = fail;
    }

    pub fn fail_connects(&self, fail: bool) {
        self.lock().fail_connect = fail;
    }

    /// Successful add/modify/delete calls so far.
    pub fn writes(&self) -> usize {
        self.lock().writes
    }

    /// (opened, closed) session counts.
    pub fn sessions(&self) -> (usize, usize) {
        let state = self.lock();
        (state.sessions_opened, state.sessions_closed)
    }

    fn lock(&self) -> MutexGuard<'_, State> {
        self.state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn check_writable(state: &State, op: &'static str, dn: &Dn) -> Result<(), DirectoryError> {
        if state.failing.contains(&key(dn)) {
            return Err(DirectoryError::Operation {
                op,
                dn: dn.0.clone(),
                rc: RC_OTHER,
                message: "injected failure".to_owned(),
            });
        }
        Ok(())
    }
}

impl Directory for MemoryDirectory {
    fn exists(&mut self, dn: &Dn) -> Result<bool, DirectoryError> {
        Ok(self.lock().entries.contains_key(&key(dn)))
    }

    fn search(&mut self, base: &Dn, object_class: Option<&str>) -> Result<Vec<Entry>, DirectoryError> {
        let state = self.lock();
        if state.fail_search {
            return Err(no_such_object("search", base));
        }
        let base_key = key(base);
        if !state.entries.contains_key(&base_key) {
            return Err(no_such_object("search", base));
        }
        Ok(state
            .entries
            .iter()
            .filter(|(k, _)| is_within(k, &base_key))
            .map(|(_, entry)| entry)
            .filter(|entry| match object_class {
                None => true,
                Some(class) => entry
                    .attributes
                    .get("objectClass")
                    .is_some_and(|classes| classes.iter().any(|c| c.eq_ignore_ascii_case(class))),
            })
            .cloned()
            .collect())
    }

    fn add(
        &mut self,
        dn: &Dn,
        object_classes: &[&str],
        attributes: &Attributes,
    ) -> Result<(), DirectoryError> {
        let mut state = self.lock();
        Self::check_writable(&state, "add", dn)?;
        let k = key(dn);
        if state.entries.contains_key(&k) {
            return Err(DirectoryError::Operation {
                op: "add",
                dn: dn.0.clone(),
                rc: RC_ALREADY_EXISTS,
                message: "entry already exists".to_owned(),
            });
        }
        if let Some(parent) = parent_key(&k) {
            if !state.entries.contains_key(parent) && !is_naming_context(parent) {
                return Err(no_such_object("add", dn));
            }
        }
        let mut attributes = attributes.clone();
        attributes.retain(|_, values| !values.is_empty());
        attributes.insert(
            "objectClass".to_owned(),
            object_classes.iter().map(|c| (*c).to_owned()).collect(),
        );
        state.entries.insert(
            k,
            Entry {
                dn: dn.clone(),
                attributes,
                binary: BinaryAttributes::new(),
            },
        );
        state.writes += 1;
        Ok(())
    }

    fn modify_replace(&mut self, dn: &Dn, attributes: &Attributes) -> Result<(), DirectoryError> {
        let mut state = self.lock();
        Self::check_writable(&state, "modify", dn)?;
        let entry = state
            .entries
            .get_mut(&key(dn))
            .ok_or_else(|| no_such_object("modify", dn))?;
        for (name, values) in attributes {
            if values.is_empty() {
                entry.attributes.remove(name);
            } else {
                entry.attributes.insert(name.clone(), values.clone());
            }
        }
        state.writes += 1;
        Ok(())
    }

    fn delete(&mut self, dn: &Dn) -> Result<(), DirectoryError> {
        let mut state = self.lock();
        Self::check_writable(&state, "delete", dn)?;
        if state.entries.remove(&key(dn)).is_none() {
            return Err(no_such_object("delete", dn));
        }
        state.writes += 1;
        Ok(())
    }

    fn close(&mut self) -> Result<(), DirectoryError> {
        self.lock().sessions_closed += 1;
        Ok(())
    }
}

impl DirectoryConnector for MemoryDirectory {
    fn connect(&self) -> Result<Box<dyn Directory>, DirectoryError> {
        let mut state = self.lock();
        if state.fail_connect {
            return Err(DirectoryError::Bind {
                bind_dn: "cn=memory".to_owned(),
                message: "injected connect failure".to_owned(),
            });
        }
        state.sessions_opened += 1;
        drop(state);
        Ok(Box::new(self.clone()))
    }
}

fn key(dn: &Dn) -> String {
    dn.as_str()
        .split(',')
        .map(|rdn| rdn.trim().to_ascii_lowercase())
        .collect::<Vec<_>>()
        .join(",")
}

fn parent_key(key: &str) -> Option<&str> {
    let mut escaped = false;
    for (i, c) in key.char_indices() {
        match c {
            '\\' if !escaped => escaped = true,
            ',' if !escaped => return Some(&key[i + 1..]),
            _ => escaped = false,
        }
    }
    None
}

fn is_within(candidate: &str, base: &str) -> bool {
    candidate == base || candidate.ends_with(&format!(",{base}"))
}

/// `dc=` components are the server's naming context and always exist.
fn is_naming_context(dn_key: &str) -> bool {
    dn_key.split(',').all(|rdn| rdn.starts_with("dc="))
}

fn no_such_object(op: &'static str, dn: &Dn) -> DirectoryError {
    DirectoryError::Operation {
        op,
        dn: dn.0.clone(),
        rc: RC_NO_SUCH_OBJECT,
        message: "no such object".to_owned(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{PERSON_CLASS, SUBTREE_CLASS};

    fn ou() -> Dn {
        Dn::from("ou=users,dc=example,dc=com")
    }

    fn person(uid: &str) -> (Dn, Attributes) {
        let mut attrs = Attributes::new();
        attrs.insert("uid".into(), vec![uid.into()]);
        attrs.insert("cn".into(), vec![format!("User {uid}")]);
        (Dn::from(format!("uid={uid},ou=users,dc=example,dc=com")), attrs)
    }

    #[test]
    fn add_under_missing_parent_fails() {
        let mut dir = MemoryDirectory::new();
        dir.seed(&Dn::from("dc=example,dc=com"), &["domain"], Attributes::new());
        let (dn, attrs) = person("u1");
        let err = dir.add(&dn, &[PERSON_CLASS], &attrs).unwrap_err();
        assert_eq!(err.result_code(), Some(RC_NO_SUCH_OBJECT));
    }

    #[test]
    fn add_search_modify_delete() {
        let mut dir = MemoryDirectory::new();
        dir.add(&ou(), &[SUBTREE_CLASS], &Attributes::new()).expect("ou");
        let (dn, attrs) = person("u1");
        dir.add(&dn, &[PERSON_CLASS], &attrs).expect("add");

        let found = dir.search(&ou(), Some(PERSON_CLASS)).expect("search");
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].first("uid"), Some("u1"));

        let mut change = Attributes::new();
        change.insert("cn".into(), vec!["Renamed".into()]);
        dir.modify_replace(&dn, &change).expect("modify");
        assert_eq!(dir.get(&dn).and_then(|e| e.first("cn").map(str::to_owned)), Some("Renamed".into()));

        dir.delete(&dn).expect("delete");
        assert!(dir.search(&ou(), Some(PERSON_CLASS)).expect("search").is_empty());
        assert_eq!(dir.writes(), 4);
    }

    #[test]
    fn search_under_missing_base_is_no_such_object() {
        let mut dir = MemoryDirectory::new();
        let err = dir.search(&ou(), None).unwrap_err();
        assert_eq!(err.result_code(), Some(RC_NO_SUCH_OBJECT));
    }

    #[test]
    fn duplicate_add_is_already_exists() {
        let mut dir = MemoryDirectory::new();
        dir.add(&ou(), &[SUBTREE_CLASS], &Attributes::new()).expect("ou");
        let err = dir.add(&ou(), &[SUBTREE_CLASS], &Attributes::new()).unwrap_err();
        assert_eq!(err.result_code(), Some(RC_ALREADY_EXISTS));
    }

    #[test]
    fn dn_matching_ignores_case_and_spacing() {
        let mut dir = MemoryDirectory::new();
        dir.add(&ou(), &[SUBTREE_CLASS], &Attributes::new()).expect("ou");
        assert!(dir.exists(&Dn::from("OU=Users, DC=example, DC=com")).expect("exists"));
    }
}
