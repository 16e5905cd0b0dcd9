//! # Installation Request
//!
//! Validated CLI input for one run of the installer, plus interactive
//! collection of the Directory Manager password. The request is built once
//! and is immutable afterwards.

use std::path::PathBuf;

use crate::common::{InstallError, InstallResult};

/// Which servers receive the new certificate, and the secrets to do it.
#[derive(Clone, Debug)]
pub struct InstallRequest {
    pub dirsrv: bool,
    pub http: bool,
    pub pkcs12_path: PathBuf,
    pub dirsrv_pin: Option<String>,
    pub http_pin: Option<String>,
    /// Directory Manager bind password, collected interactively.
    pub dm_password: Option<String>,
}

impl InstallRequest {
    /// Validates the raw CLI input into a request.
    ///
    /// At least one target must be selected, every selected target needs the
    /// password of the PKCS#12 file, and exactly one bundle path must be
    /// given.
    pub fn configure(
        dirsrv: bool,
        http: bool,
        dirsrv_pin: Option<String>,
        http_pin: Option<String>,
        pkcs12_paths: &[PathBuf],
    ) -> InstallResult<Self> {
        if !dirsrv && !http {
            return Err(InstallError::Usage(
                "you must specify dirsrv and/or http".into(),
            ));
        }
        let pin_missing = |pin: &Option<String>| pin.as_deref().map_or(true, str::is_empty);
        if (dirsrv && pin_missing(&dirsrv_pin)) || (http && pin_missing(&http_pin)) {
            return Err(InstallError::Usage(
                "you must provide the password for the PKCS#12 file".into(),
            ));
        }
        if pkcs12_paths.len() != 1 {
            return Err(InstallError::Usage(
                "you must provide a pkcs12 filename".into(),
            ));
        }
        Ok(Self {
            dirsrv,
            http,
            pkcs12_path: pkcs12_paths[0].clone(),
            dirsrv_pin,
            http_pin,
            dm_password: None,
        })
    }

    /// Interactively obtains the secrets not supplied on the command line.
    ///
    /// The directory target needs the Directory Manager bind password; no
    /// confirmation, no retry. Declining it is a configuration error.
    pub fn collect_secrets(mut self, reader: &dyn SecretReader) -> InstallResult<Self> {
        if self.dirsrv {
            let password = reader.read_password("Directory Manager password: ")?;
            match password {
                Some(password) if !password.is_empty() => self.dm_password = Some(password),
                _ => {
                    return Err(InstallError::Configuration(
                        "Directory Manager password required".into(),
                    ))
                }
            }
        }
        Ok(self)
    }
}

/// Source of interactively entered secrets.
pub trait SecretReader {
    /// Reads one secret; `None` means the operator declined to enter it.
    fn read_password(&self, prompt: &str) -> InstallResult<Option<String>>;
}

/// Reads secrets from the controlling terminal without echoing.
pub struct TtySecretReader;

impl SecretReader for TtySecretReader {
    fn read_password(&self, prompt: &str) -> InstallResult<Option<String>> {
        let password = rpassword::prompt_password(prompt)
            .map_err(|e| InstallError::IO(format!("failed to read password: {}", e)))?;
        if password.is_empty() {
            Ok(None)
        } else {
            Ok(Some(password))
        }
    }
}
