//! # Certificate Database Operations
//!
//! Contract of the certificate-database helper library and its NSS
//! implementation. The NSS implementation drives the platform tools
//! (`certutil`, `pk12util`, `getcert`); PKCS#12 parsing, X.509 validation
//! and the database format itself live entirely in those tools.
//!
//! Bundle verification never touches the target database: the bundle is
//! imported into a scratch database in a temporary directory, checked for
//! validity against the CA trust anchor, and checked for a subject matching
//! the deployment hostname.

use std::path::{Path, PathBuf};
use std::process::Command;

use crate::common::{InstallError, InstallResult};

/// Certificate-database operations the installer depends on.
pub trait CertDb {
    /// Validates a PKCS#12 bundle against the CA trust anchor and the
    /// deployment hostname, returning the nickname of the server
    /// certificate it carries. Performs no mutation of the target database.
    fn verify_pkcs12(
        &self,
        bundle: &Path,
        pin_file: &Path,
        ca_file: &Path,
        hostname: &str,
    ) -> InstallResult<String>;

    /// Removes a certificate from the database.
    fn delete_cert(&self, nickname: &str) -> InstallResult<()>;

    /// Imports a PKCS#12 bundle into the database, returning the nickname
    /// assigned to the new certificate.
    fn import_pkcs12(&self, bundle: &Path, pin_file: &Path) -> InstallResult<String>;

    /// Registers a certificate with the renewal agent.
    fn track_cert(
        &self,
        nickname: &str,
        principal: &str,
        restart_command: &str,
    ) -> InstallResult<()>;

    /// Deregisters a certificate from the renewal agent.
    fn untrack_cert(&self, nickname: &str) -> InstallResult<()>;
}

/// An NSS certificate database on the local filesystem.
pub struct NssCertDb {
    db_dir: PathBuf,
}

impl NssCertDb {
    pub fn new(db_dir: &Path) -> Self {
        Self {
            db_dir: db_dir.to_path_buf(),
        }
    }

    fn db_arg(dir: &Path) -> InstallResult<&str> {
        dir.to_str()
            .ok_or_else(|| InstallError::IO(format!("invalid database path {}", dir.display())))
    }

    fn path_arg(path: &Path) -> InstallResult<&str> {
        path.to_str()
            .ok_or_else(|| InstallError::IO(format!("invalid path {}", path.display())))
    }

    /// Nicknames of the server certificates (private key present) in a
    /// database directory.
    fn find_server_certs(dir: &Path) -> InstallResult<Vec<String>> {
        let listing = run("certutil", &["-L", "-d", Self::db_arg(dir)?])
            .map_err(InstallError::Installation)?;
        Ok(parse_server_certs(&listing))
    }

    fn subject_cn(dir: &Path, nickname: &str) -> InstallResult<Option<String>> {
        let output = run("certutil", &["-L", "-d", Self::db_arg(dir)?, "-n", nickname])
            .map_err(InstallError::Installation)?;
        Ok(parse_subject_cn(&output))
    }
}

impl CertDb for NssCertDb {
    fn verify_pkcs12(
        &self,
        bundle: &Path,
        pin_file: &Path,
        ca_file: &Path,
        hostname: &str,
    ) -> InstallResult<String> {
        let scratch = tempfile::tempdir()?;
        let scratch_dir = Self::db_arg(scratch.path())?.to_string();
        run(
            "certutil",
            &["-N", "-d", &scratch_dir, "--empty-password"],
        )
        .map_err(InstallError::Validation)?;
        run(
            "certutil",
            &[
                "-A",
                "-d",
                &scratch_dir,
                "-n",
                "CA certificate",
                "-t",
                "CT,,",
                "-a",
                "-i",
                Self::path_arg(ca_file)?,
            ],
        )
        .map_err(|e| InstallError::Validation(format!("cannot load CA certificate: {}", e)))?;
        run(
            "pk12util",
            &[
                "-i",
                Self::path_arg(bundle)?,
                "-d",
                &scratch_dir,
                "-w",
                Self::path_arg(pin_file)?,
            ],
        )
        .map_err(|e| InstallError::Validation(format!("unable to import the bundle: {}", e)))?;

        let server_certs = Self::find_server_certs(scratch.path())?;
        let nickname = match server_certs.as_slice() {
            [nickname] => nickname.clone(),
            [] => {
                return Err(InstallError::Validation(
                    "no server certificate found in the bundle".into(),
                ))
            }
            _ => {
                return Err(InstallError::Validation(
                    "more than one server certificate found in the bundle".into(),
                ))
            }
        };
        run(
            "certutil",
            &["-V", "-d", &scratch_dir, "-n", &nickname, "-u", "V"],
        )
        .map_err(|e| {
            InstallError::Validation(format!("certificate {} is not trusted: {}", nickname, e))
        })?;
        match Self::subject_cn(scratch.path(), &nickname)? {
            Some(cn) if cn == hostname => Ok(nickname),
            Some(cn) => Err(InstallError::Validation(format!(
                "certificate subject {} does not match the host name {}",
                cn, hostname
            ))),
            None => Err(InstallError::Validation(format!(
                "certificate {} has no subject common name",
                nickname
            ))),
        }
    }

    fn delete_cert(&self, nickname: &str) -> InstallResult<()> {
        run(
            "certutil",
            &["-D", "-d", Self::db_arg(&self.db_dir)?, "-n", nickname],
        )
        .map_err(InstallError::Installation)?;
        Ok(())
    }

    fn import_pkcs12(&self, bundle: &Path, pin_file: &Path) -> InstallResult<String> {
        run(
            "pk12util",
            &[
                "-i",
                Self::path_arg(bundle)?,
                "-d",
                Self::db_arg(&self.db_dir)?,
                "-w",
                Self::path_arg(pin_file)?,
            ],
        )
        .map_err(InstallError::Installation)?;
        let listing = run(
            "pk12util",
            &[
                "-l",
                Self::path_arg(bundle)?,
                "-w",
                Self::path_arg(pin_file)?,
            ],
        )
        .map_err(InstallError::Installation)?;
        parse_friendly_name(&listing).ok_or_else(|| {
            InstallError::Installation("imported bundle has no friendly name".into())
        })
    }

    fn track_cert(
        &self,
        nickname: &str,
        principal: &str,
        restart_command: &str,
    ) -> InstallResult<()> {
        run(
            "getcert",
            &[
                "start-tracking",
                "-d",
                Self::db_arg(&self.db_dir)?,
                "-n",
                nickname,
                "-K",
                principal,
                "-C",
                restart_command,
            ],
        )
        .map_err(InstallError::Installation)?;
        Ok(())
    }

    fn untrack_cert(&self, nickname: &str) -> InstallResult<()> {
        run(
            "getcert",
            &[
                "stop-tracking",
                "-d",
                Self::db_arg(&self.db_dir)?,
                "-n",
                nickname,
            ],
        )
        .map_err(InstallError::Installation)?;
        Ok(())
    }
}

fn run(program: &str, args: &[&str]) -> Result<String, String> {
    let output = Command::new(program)
        .args(args)
        .output()
        .map_err(|e| format!("failed to run {}: {}", program, e))?;
    if output.status.success() {
        Ok(String::from_utf8_lossy(&output.stdout).into_owned())
    } else {
        let stderr = String::from_utf8_lossy(&output.stderr);
        Err(format!(
            "{} exit code {}: {}",
            program,
            output.status.code().unwrap_or(-1),
            stderr.trim()
        ))
    }
}

/// Extracts the nicknames with `u,u,u` trust flags from a `certutil -L`
/// listing; those are the certificates with a private key in the database.
fn parse_server_certs(listing: &str) -> Vec<String> {
    let mut nicknames = Vec::new();
    for line in listing.lines() {
        let trimmed = line.trim_end();
        if let Some(nickname) = trimmed.strip_suffix("u,u,u") {
            nicknames.push(nickname.trim_end().to_string());
        }
    }
    nicknames
}

/// Extracts the subject common name from a `certutil -L -n <nick>` dump.
fn parse_subject_cn(output: &str) -> Option<String> {
    for line in output.lines() {
        let trimmed = line.trim();
        let Some(subject) = trimmed.strip_prefix("Subject:") else {
            continue;
        };
        let subject = subject.trim().trim_matches('"');
        for component in subject.split(',') {
            if let Some(cn) = component.trim().strip_prefix("CN=") {
                return Some(cn.to_string());
            }
        }
    }
    None
}

/// Extracts the certificate friendly name from a `pk12util -l` listing.
fn parse_friendly_name(listing: &str) -> Option<String> {
    for line in listing.lines() {
        let trimmed = line.trim();
        if let Some(name) = trimmed.strip_prefix("Friendly Name:") {
            return Some(name.trim().to_string());
        }
    }
    None
}
