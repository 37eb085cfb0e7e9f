//! Error types for roster-directory.

use thiserror::Error;

/// `noSuchObject`.
pub const RC_NO_SUCH_OBJECT: u32 = 32;
/// `entryAlreadyExists`.
pub const RC_ALREADY_EXISTS: u32 = 68;
/// `other`; used by the in-memory directory for injected failures.
pub const RC_OTHER: u32 = 80;

/// Failures talking to the directory service.
#[derive(Debug, Error)]
pub enum DirectoryError {
    /// TCP/TLS connection could not be established.
    #[error("cannot connect to {url}: {source}")]
    Connect {
        url: String,
        #[source]
        source: ldap3::LdapError,
    },

    /// Simple bind rejected.
    #[error("bind as {bind_dn} failed: {message}")]
    Bind { bind_dn: String, message: String },

    /// The server answered an operation with a non-zero result code.
    #[error("{op} {dn} failed (rc={rc}): {message}")]
    Operation {
        op: &'static str,
        dn: String,
        rc: u32,
        message: String,
    },

    /// The request never got a result (connection dropped, protocol error).
    #[error("{op} {dn}: {source}")]
    Protocol {
        op: &'static str,
        dn: String,
        #[source]
        source: ldap3::LdapError,
    },
}

impl DirectoryError {
    /// LDAP result code, when the server returned one.
    pub fn result_code(&self) -> Option<u32> {
        match self {
            DirectoryError::Operation { rc, .. } => Some(*rc),
            _ => None,
        }
    }
}
