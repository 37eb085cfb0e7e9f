//! Roster core library: domain types, configuration, errors.
//!
//! - [`types`]: newtypes and source / directory records
//! - [`config`]: immutable [`Config`] built from YAML + environment
//! - [`error`]: [`ConfigError`]

pub mod config;
pub mod error;
pub mod types;

pub use config::{Config, DirectoryConfig, Secret, SourceConfig, SyncConfig};
pub use error::ConfigError;
pub use types::{
    Attributes, DirectoryEntry, Dn, PhoneParts, PolicySubject, SourcePolicy, SourceSite,
    SourceUserProfile, SubjectType, UserId, UserStatus,
};
