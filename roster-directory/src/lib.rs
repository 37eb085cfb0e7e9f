//! # roster-directory
//!
//! Write side: the [`Directory`] session seam, an `ldap3` implementation, an
//! in-memory implementation, and LDIF rendering for snapshots.
//!
//! A session is opened with [`DirectoryConnector::connect`], used for every
//! operation of one phase, and closed explicitly. Sessions are `&mut self`
//! throughout; sharing one across threads is not supported.

pub mod error;
pub mod ldap;
pub mod ldif;
pub mod memory;

use std::collections::BTreeMap;

use roster_core::{Attributes, Dn};

pub use error::DirectoryError;
pub use ldap::{LdapConnector, LdapDirectory};
pub use memory::MemoryDirectory;

/// Object class of managed user entries.
pub const PERSON_CLASS: &str = "inetOrgPerson";
/// Object class of the managed subtree.
pub const SUBTREE_CLASS: &str = "organizationalUnit";

/// Attribute values that are not valid UTF-8 (`jpegPhoto`, certificates).
pub type BinaryAttributes = BTreeMap<String, Vec<Vec<u8>>>;

/// One search hit. `attributes` includes `objectClass` when requested.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Entry {
    pub dn: Dn,
    pub attributes: Attributes,
    pub binary: BinaryAttributes,
}

impl Entry {
    /// First value of `name`, matched case-insensitively.
    pub fn first(&self, name: &str) -> Option<&str> {
        self.attributes
            .iter()
            .find(|(key, _)| key.eq_ignore_ascii_case(name))
            .and_then(|(_, values)| values.first())
            .map(String::as_str)
    }
}

/// An open, bound directory session.
pub trait Directory {
    /// Base-scope existence check. `noSuchObject` is `Ok(false)`.
    fn exists(&mut self, dn: &Dn) -> Result<bool, DirectoryError>;

    /// Subtree search under `base` for `(objectClass=<class>)`, or every
    /// entry when `object_class` is `None`.
    fn search(&mut self, base: &Dn, object_class: Option<&str>) -> Result<Vec<Entry>, DirectoryError>;

    fn add(&mut self, dn: &Dn, object_classes: &[&str], attributes: &Attributes)
        -> Result<(), DirectoryError>;

    /// Replace every attribute named in `attributes`; others are untouched.
    fn modify_replace(&mut self, dn: &Dn, attributes: &Attributes) -> Result<(), DirectoryError>;

    fn delete(&mut self, dn: &Dn) -> Result<(), DirectoryError>;

    /// Unbind. The session must not be used afterwards.
    fn close(&mut self) -> Result<(), DirectoryError>;
}

/// Opens [`Directory`] sessions.
pub trait DirectoryConnector: Send + Sync {
    fn connect(&self) -> Result<Box<dyn Directory>, DirectoryError>;
}
