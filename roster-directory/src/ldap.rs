//! `ldap3` (blocking API) implementation of [`Directory`].

use std::collections::HashSet;
use std::time::Duration;

use ldap3::{LdapConn, LdapConnSettings, LdapError, Mod, Scope, SearchEntry};

use roster_core::{Attributes, DirectoryConfig, Dn};

use crate::error::{DirectoryError, RC_NO_SUCH_OBJECT};
use crate::{Directory, DirectoryConnector, Entry};

const CONNECT_TIMEOUT: Duration = Duration::from_secs(10);

/// Opens a fresh bound [`LdapDirectory`] per call.
#[derive(Debug, Clone)]
pub struct LdapConnector {
    config: DirectoryConfig,
}

impl LdapConnector {
    pub fn new(config: DirectoryConfig) -> Self {
        Self { config }
    }
}

impl DirectoryConnector for LdapConnector {
    fn connect(&self) -> Result<Box<dyn Directory>, DirectoryError> {
        Ok(Box::new(LdapDirectory::connect(&self.config)?))
    }
}

/// A bound LDAP session.
pub struct LdapDirectory {
    conn: LdapConn,
    url: String,
    closed: bool,
}

impl LdapDirectory {
    /// Connect and simple-bind with the configured credentials.
    pub fn connect(config: &DirectoryConfig) -> Result<Self, DirectoryError> {
        let settings = LdapConnSettings::new().set_conn_timeout(CONNECT_TIMEOUT);
        let mut conn =
            LdapConn::with_settings(settings, &config.url).map_err(|source| {
                DirectoryError::Connect {
                    url: config.url.clone(),
                    source,
                }
            })?;

        tracing::debug!("binding to {} as {}", config.url, config.bind_dn);
        let bound = conn
            .simple_bind(&config.bind_dn, config.bind_password.expose())
            .and_then(|res| res.success());
        if let Err(err) = bound {
            return Err(DirectoryError::Bind {
                bind_dn: config.bind_dn.clone(),
                message: describe(&err),
            });
        }

        tracing::info!("connected to directory {}", config.url);
        Ok(Self {
            conn,
            url: config.url.clone(),
            closed: false,
        })
    }
}

impl Directory for LdapDirectory {
    fn exists(&mut self, dn: &Dn) -> Result<bool, DirectoryError> {
        let result = self
            .conn
            .search(dn.as_str(), Scope::Base, "(objectClass=*)", vec!["1.1"])
            .map_err(|source| protocol("search", dn, source))?;
        if result.1.rc == RC_NO_SUCH_OBJECT {
            return Ok(false);
        }
        let (entries, _) = result.success().map_err(|err| operation("search", dn, err))?;
        Ok(!entries.is_empty())
    }

    fn search(&mut self, base: &Dn, object_class: Option<&str>) -> Result<Vec<Entry>, DirectoryError> {
        let filter = format!("(objectClass={})", object_class.unwrap_or("*"));
        let (entries, _) = self
            .conn
            .search(base.as_str(), Scope::Subtree, &filter, vec!["*"])
            .map_err(|source| protocol("search", base, source))?
            .success()
            .map_err(|err| operation("search", base, err))?;

        Ok(entries
            .into_iter()
            .map(|raw| {
                let entry = SearchEntry::construct(raw);
                Entry {
                    dn: Dn(entry.dn),
                    attributes: entry.attrs.into_iter().collect(),
                    binary: entry.bin_attrs.into_iter().collect(),
                }
            })
            .collect())
    }

    fn add(
        &mut self,
        dn: &Dn,
        object_classes: &[&str],
        attributes: &Attributes,
    ) -> Result<(), DirectoryError> {
        let mut attrs: Vec<(&str, HashSet<&str>)> =
            vec![("objectClass", object_classes.iter().copied().collect())];
        for (name, values) in attributes {
            if values.is_empty() {
                continue;
            }
            attrs.push((name.as_str(), values.iter().map(String::as_str).collect()));
        }

        self.conn
            .add(dn.as_str(), attrs)
            .map_err(|source| protocol("add", dn, source))?
            .success()
            .map_err(|err| operation("add", dn, err))?;
        Ok(())
    }

    fn modify_replace(&mut self, dn: &Dn, attributes: &Attributes) -> Result<(), DirectoryError> {
        let mods: Vec<Mod<&str>> = attributes
            .iter()
            .map(|(name, values)| {
                Mod::Replace(name.as_str(), values.iter().map(String::as_str).collect())
            })
            .collect();
        if mods.is_empty() {
            return Ok(());
        }

        self.conn
            .modify(dn.as_str(), mods)
            .map_err(|source| protocol("modify", dn, source))?
            .success()
            .map_err(|err| operation("modify", dn, err))?;
        Ok(())
    }

    fn delete(&mut self, dn: &Dn) -> Result<(), DirectoryError> {
        self.conn
            .delete(dn.as_str())
            .map_err(|source| protocol("delete", dn, source))?
            .success()
            .map_err(|err| operation("delete", dn, err))?;
        Ok(())
    }

    fn close(&mut self) -> Result<(), DirectoryError> {
        if self.closed {
            return Ok(());
        }
        self.closed = true;
        self.conn.unbind().map_err(|source| DirectoryError::Protocol {
            op: "unbind",
            dn: self.url.clone(),
            source,
        })
    }
}

fn protocol(op: &'static str, dn: &Dn, source: LdapError) -> DirectoryError {
    DirectoryError::Protocol {
        op,
        dn: dn.0.clone(),
        source,
    }
}

fn operation(op: &'static str, dn: &Dn, err: LdapError) -> DirectoryError {
    match err {
        LdapError::LdapResult { result } => DirectoryError::Operation {
            op,
            dn: dn.0.clone(),
            rc: result.rc,
            message: result.text,
        },
        other => protocol(op, dn, other),
    }
}

fn describe(err: &LdapError) -> String {
    match err {
        LdapError::LdapResult { result } => format!("rc={} {}", result.rc, result.text),
        other => other.to_string(),
    }
}
