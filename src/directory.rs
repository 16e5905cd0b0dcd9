//! # Directory Service Access
//!
//! Thin typed layer over the directory service. The installer only ever
//! needs a single-valued attribute of one configuration entry, so the trait
//! exposes exactly that: read one value, replace one value, disconnect.
//!
//! The LDAP implementation keeps the original blocking
//! connect/search/modify/unbind sequence; the connection is released
//! explicitly by the installer on every exit path, with `Drop` as a
//! backstop.

use std::collections::HashSet;

use ldap3::{LdapConn, Mod, Scope, SearchEntry};

use crate::common::{InstallError, InstallResult};

/// Operations the installer performs against the directory service.
pub trait DirectoryService {
    /// Reads a single-valued attribute of an entry.
    ///
    /// A missing or multivalued attribute is an unexpected directory state.
    fn get_single_value(&mut self, dn: &str, attribute: &str) -> InstallResult<String>;

    /// Replaces the value of a single-valued attribute.
    ///
    /// Returns `false` when the attribute already holds the value and no
    /// modify was sent; "no actual change needed" is success.
    fn replace_value(&mut self, dn: &str, attribute: &str, value: &str) -> InstallResult<bool>;

    /// Releases the connection. Safe to call more than once.
    fn disconnect(&mut self);
}

/// Directory service access over a bound LDAP connection.
pub struct LdapDirectory {
    conn: Option<LdapConn>,
}

impl LdapDirectory {
    /// Connects and binds with a simple bind.
    pub fn connect(uri: &str, bind_dn: &str, password: &str) -> InstallResult<Self> {
        let mut conn = LdapConn::new(uri)?;
        conn.simple_bind(bind_dn, password)?.success()?;
        Ok(Self { conn: Some(conn) })
    }

    fn conn(&mut self) -> InstallResult<&mut LdapConn> {
        self.conn
            .as_mut()
            .ok_or_else(|| InstallError::Directory("connection already released".into()))
    }
}

impl DirectoryService for LdapDirectory {
    fn get_single_value(&mut self, dn: &str, attribute: &str) -> InstallResult<String> {
        let (entries, _) = self
            .conn()?
            .search(dn, Scope::Base, "(objectClass=*)", vec![attribute])?
            .success()?;
        let entry = entries
            .into_iter()
            .next()
            .ok_or_else(|| InstallError::State(format!("entry {} not found", dn)))?;
        let entry = SearchEntry::construct(entry);
        let values = entry.attrs.get(attribute).map(Vec::as_slice).unwrap_or(&[]);
        match values {
            [value] => Ok(value.clone()),
            [] => Err(InstallError::State(format!(
                "entry {} has no {} attribute",
                dn, attribute
            ))),
            _ => Err(InstallError::State(format!(
                "entry {} has multiple {} values",
                dn, attribute
            ))),
        }
    }

    fn replace_value(&mut self, dn: &str, attribute: &str, value: &str) -> InstallResult<bool> {
        if self.get_single_value(dn, attribute)? == value {
            return Ok(false);
        }
        self.conn()?
            .modify(dn, vec![Mod::Replace(attribute, HashSet::from([value]))])?
            .success()?;
        Ok(true)
    }

    fn disconnect(&mut self) {
        if let Some(mut conn) = self.conn.take() {
            if let Err(e) = conn.unbind() {
                log::warn!("failed to unbind from the directory service: {}", e);
            }
        }
    }
}

impl Drop for LdapDirectory {
    fn drop(&mut self) {
        self.disconnect();
    }
}
