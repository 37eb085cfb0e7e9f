//! Domain types shared by the source, directory and sync crates.
//!
//! Source-side records (`SourcePolicy`, `SourceSite`, `SourceUserProfile`) are
//! decoded straight from the access-control API's JSON and re-fetched every
//! cycle. `DirectoryEntry` mirrors durable state owned by the directory.

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// Newtypes
// ---------------------------------------------------------------------------

/// Opaque, stable user identifier assigned by the access-control system.
///
/// Doubles as the directory `uid` attribute of the managed entry.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct UserId(pub String);

impl UserId {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for UserId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

impl From<String> for UserId {
    fn from(s: String) -> Self {
        Self(s)
    }
}

impl From<&str> for UserId {
    fn from(s: &str) -> Self {
        Self(s.to_owned())
    }
}

/// A directory distinguished name.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Dn(pub String);

impl Dn {
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// `uid=<uid>,<parent>`, the DN of a managed user entry.
    pub fn for_user(uid: &UserId, parent: &Dn) -> Self {
        Self(format!("uid={},{}", escape_rdn_value(uid.as_str()), parent.0))
    }

    /// `ou=<ou>,<parent>`.
    pub fn for_subtree(ou: &str, parent: &str) -> Self {
        Self(format!("ou={},{}", escape_rdn_value(ou), parent))
    }
}

impl fmt::Display for Dn {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

impl From<String> for Dn {
    fn from(s: String) -> Self {
        Self(s)
    }
}

impl From<&str> for Dn {
    fn from(s: &str) -> Self {
        Self(s.to_owned())
    }
}

/// Escape an RDN attribute value (RFC 4514 §2.4).
fn escape_rdn_value(value: &str) -> String {
    let mut out = String::with_capacity(value.len());
    let last = value.chars().count().saturating_sub(1);
    for (i, c) in value.chars().enumerate() {
        match c {
            ',' | '+' | '"' | '\\' | '<' | '>' | ';' | '=' => {
                out.push('\\');
                out.push(c);
            }
            '#' if i == 0 => out.push_str("\\#"),
            ' ' if i == 0 || i == last => out.push_str("\\ "),
            _ => out.push(c),
        }
    }
    out
}

// ---------------------------------------------------------------------------
// Source records
// ---------------------------------------------------------------------------

/// How a policy subject refers to people.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum SubjectType {
    /// The subject id is a user id.
    #[serde(rename = "USER", alias = "user", alias = "individual")]
    Individual,
    /// The subject id is a group id; membership is not expanded.
    #[serde(rename = "USER_GROUP", alias = "user_group", alias = "group")]
    Group,
    #[serde(other)]
    Unknown,
}

/// One entry of a policy's subject list.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PolicySubject {
    #[serde(rename = "id", alias = "subject_id")]
    pub subject_id: String,
    #[serde(rename = "type", alias = "subject_type")]
    pub subject_type: SubjectType,
}

/// An access policy, used only to enumerate who currently has access.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SourcePolicy {
    pub id: String,
    #[serde(default)]
    pub name: String,
    #[serde(default, alias = "members")]
    pub subjects: Vec<PolicySubject>,
}

/// A site (location) of the access-control deployment.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SourceSite {
    pub id: String,
    pub name: String,
}

/// Account state as reported by the source.
///
/// Both `ACTIVE` and `ACTIVED` (the spelling used in the vendor's API
/// reference) count as active; anything else is carried verbatim.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum UserStatus {
    Active,
    Inactive(String),
}

impl UserStatus {
    pub fn is_active(&self) -> bool {
        matches!(self, UserStatus::Active)
    }
}

impl Default for UserStatus {
    fn default() -> Self {
        UserStatus::Inactive(String::new())
    }
}

impl From<String> for UserStatus {
    fn from(raw: String) -> Self {
        let trimmed = raw.trim();
        if trimmed.eq_ignore_ascii_case("ACTIVE") || trimmed.eq_ignore_ascii_case("ACTIVED") {
            UserStatus::Active
        } else {
            UserStatus::Inactive(raw)
        }
    }
}

impl From<&str> for UserStatus {
    fn from(raw: &str) -> Self {
        UserStatus::from(raw.to_owned())
    }
}

impl From<UserStatus> for String {
    fn from(status: UserStatus) -> Self {
        match status {
            UserStatus::Active => "ACTIVE".to_owned(),
            UserStatus::Inactive(raw) => raw,
        }
    }
}

impl fmt::Display for UserStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            UserStatus::Active => write!(f, "ACTIVE"),
            UserStatus::Inactive(raw) if raw.is_empty() => write!(f, "<none>"),
            UserStatus::Inactive(raw) => write!(f, "{raw}"),
        }
    }
}

/// Split phone number as the source stores it.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct PhoneParts {
    #[serde(default, alias = "phone_area_code", skip_serializing_if = "Option::is_none")]
    pub area_code: Option<String>,
    #[serde(
        default,
        alias = "mobile",
        alias = "phone",
        skip_serializing_if = "Option::is_none"
    )]
    pub mobile_number: Option<String>,
}

/// Full user profile as returned by the per-user endpoint.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SourceUserProfile {
    pub id: UserId,
    #[serde(default, alias = "firstname", skip_serializing_if = "Option::is_none")]
    pub first_name: Option<String>,
    #[serde(default, alias = "lastname", skip_serializing_if = "Option::is_none")]
    pub last_name: Option<String>,
    #[serde(
        default,
        alias = "user_email",
        alias = "useremail",
        skip_serializing_if = "Option::is_none"
    )]
    pub email: Option<String>,
    #[serde(flatten)]
    pub phone: PhoneParts,
    #[serde(default)]
    pub status: UserStatus,
}

// ---------------------------------------------------------------------------
// Directory state
// ---------------------------------------------------------------------------

/// Multi-valued attribute map, ordered for deterministic writes and output.
pub type Attributes = BTreeMap<String, Vec<String>>;

/// An entry found under the managed subtree.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DirectoryEntry {
    pub dn: Dn,
    pub uid: UserId,
    #[serde(default)]
    pub attributes: Attributes,
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
