//! # Common Types and Constants
//!
//! This module provides the error taxonomy and deployment constants used
//! throughout the certificate installer. It includes:
//! - The `InstallError` enum and `InstallResult` alias
//! - Well-known filesystem locations of the deployment
//! - Names of the configuration directives and directory attributes touched

/// Local CA certificate used as the trust anchor when validating bundles.
pub const CA_CERT_PATH: &str = "/etc/ipa/ca.crt";
/// Deployment configuration file; its presence means the server is configured.
pub const DEFAULT_CONFIG_PATH: &str = "/etc/ipa/default.conf";
/// NSS certificate database of the web server.
pub const HTTP_DB_DIR: &str = "/etc/httpd/alias";
/// NSS configuration file of the web server.
pub const HTTP_NSS_CONF: &str = "/etc/httpd/conf.d/nss.conf";
/// Service account the web server runs as.
pub const HTTP_SERVICE_ACCOUNT: &str = "apache";
/// Directive in the web server NSS configuration naming the active certificate.
pub const NICKNAME_DIRECTIVE: &str = "NSSNickname";
/// Directory entry holding the directory server's encryption configuration.
pub const DS_ENCRYPTION_DN: &str = "cn=RSA,cn=encryption,cn=config";
/// Attribute of that entry naming the active server certificate.
pub const DS_NICKNAME_ATTR: &str = "nssslpersonalityssl";
/// Bind identity of the directory service administrator.
pub const DIRECTORY_MANAGER_DN: &str = "cn=Directory Manager";
/// Files making up an NSS certificate database.
pub const NSS_DB_FILES: [&str; 3] = ["cert8.db", "key3.db", "secmod.db"];

pub type InstallResult<R> = Result<R, InstallError>;

/// Represents errors that can occur while installing a server certificate
///
/// The variants map to the stages of the installation: option validation,
/// secret collection, bundle validation, directory state inspection, the
/// delete/import/track sequence, and file ownership fixing.
#[derive(Clone, Debug, PartialEq, thiserror::Error)]
pub enum InstallError {
    #[error("usage error: {0}")]
    Usage(String),
    #[error("configuration error: {0}")]
    Configuration(String),
    #[error("certificate validation failed: {0}")]
    Validation(String),
    #[error("unexpected directory state: {0}")]
    State(String),
    #[error("certificate installation failed: {0}")]
    Installation(String),
    #[error("permission error: {0}")]
    Permission(String),
    #[error("directory service error: {0}")]
    Directory(String),
    #[error("IO error: {0}")]
    IO(String),
}

impl From<std::io::Error> for InstallError {
    fn from(e: std::io::Error) -> Self {
        InstallError::IO(e.to_string())
    }
}

impl From<ldap3::LdapError> for InstallError {
    fn from(e: ldap3::LdapError) -> Self {
        InstallError::Directory(e.to_string())
    }
}
