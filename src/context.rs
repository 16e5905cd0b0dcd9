//! # Deployment Context
//!
//! Explicit configuration context for the identity-management deployment,
//! read once at startup from the deployment configuration file and passed
//! into the installer. Replaces any ambient, process-global state.
//!
//! The configuration file is a line-based `key = value` format under a
//! `[global]` section. Only the keys the installer needs are parsed; unknown
//! keys are ignored.

use std::fs;
use std::path::{Path, PathBuf};

use crate::common::{InstallError, InstallResult, DEFAULT_CONFIG_PATH, HTTP_DB_DIR, HTTP_NSS_CONF, HTTP_SERVICE_ACCOUNT};

/// Deployment-wide settings consumed by the installer.
#[derive(Clone, Debug)]
pub struct ApiContext {
    /// Kerberos realm of the deployment.
    pub realm: String,
    /// Fully qualified hostname of this server.
    pub host: String,
    /// URI of the directory service.
    pub ldap_uri: String,
    /// Whether automatic certificate tracking/renewal is enabled.
    pub enable_ra: bool,
    /// NSS database directory of the web server.
    pub http_db_dir: PathBuf,
    /// NSS configuration file of the web server.
    pub http_nss_conf: PathBuf,
    /// Service account of the web server.
    pub http_service_account: String,
}

impl ApiContext {
    /// Reads the deployment configuration from the default location.
    pub fn bootstrap() -> InstallResult<Self> {
        check_server_configuration()?;
        Self::from_config_file(Path::new(DEFAULT_CONFIG_PATH))
    }

    /// Parses a deployment configuration file.
    ///
    /// `realm` and `host` are mandatory; `ldap_uri` defaults to the local
    /// LDAPI-less URI derived from the hostname and `enable_ra` to false.
    pub fn from_config_file(path: &Path) -> InstallResult<Self> {
        let contents = fs::read_to_string(path)
            .map_err(|e| InstallError::Configuration(format!("cannot read {}: {}", path.display(), e)))?;
        let mut realm = None;
        let mut host = None;
        let mut ldap_uri = None;
        let mut enable_ra = false;
        for line in contents.lines() {
            let line = line.trim();
            if line.is_empty() || line.starts_with('#') || line.starts_with('[') {
                continue;
            }
            let Some((key, value)) = line.split_once('=') else {
                continue;
            };
            let value = value.trim();
            match key.trim() {
                "realm" => realm = Some(value.to_string()),
                "host" => host = Some(value.to_string()),
                "ldap_uri" => ldap_uri = Some(value.to_string()),
                "enable_ra" => enable_ra = parse_boolean(value),
                _ => {}
            }
        }
        let realm =
            realm.ok_or_else(|| InstallError::Configuration("realm not set in configuration".into()))?;
        let host =
            host.ok_or_else(|| InstallError::Configuration("host not set in configuration".into()))?;
        let ldap_uri = ldap_uri.unwrap_or_else(|| format!("ldap://{}", host));
        Ok(Self {
            realm,
            host,
            ldap_uri,
            enable_ra,
            http_db_dir: PathBuf::from(HTTP_DB_DIR),
            http_nss_conf: PathBuf::from(HTTP_NSS_CONF),
            http_service_account: HTTP_SERVICE_ACCOUNT.to_string(),
        })
    }

    /// Directory server instance identifier derived from the realm.
    pub fn dirsrv_serverid(&self) -> String {
        realm_to_serverid(&self.realm)
    }

    /// Configuration and certificate database directory of the directory
    /// server instance.
    pub fn dirsrv_config_dirname(&self) -> PathBuf {
        PathBuf::from(format!("/etc/dirsrv/slapd-{}", self.dirsrv_serverid()))
    }
}

/// Converts a realm name into a directory server instance identifier.
pub fn realm_to_serverid(realm: &str) -> String {
    realm.replace('.', "-")
}

fn parse_boolean(value: &str) -> bool {
    matches!(value.to_ascii_lowercase().as_str(), "true" | "yes" | "1")
}

/// Verifies this host has been configured as a server.
pub fn check_server_configuration() -> InstallResult<()> {
    if Path::new(DEFAULT_CONFIG_PATH).exists() {
        Ok(())
    } else {
        Err(InstallError::Configuration(
            "server is not configured on this system".into(),
        ))
    }
}

/// Fails unless the process runs with superuser privilege.
pub fn check_superuser() -> InstallResult<()> {
    if unsafe { libc::geteuid() } == 0 {
        Ok(())
    } else {
        Err(InstallError::Permission(
            "must be run as the superuser".into(),
        ))
    }
}
