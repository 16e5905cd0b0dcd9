//! # Certificate Installation Workflow
//!
//! Per-target replacement of the active server certificate. Each selected
//! target goes through the same procedure: locate the old certificate,
//! validate the new bundle (before any destructive action), swap the
//! database contents, record the new nickname in the target's configuration
//! store, and fix file ownership where needed.
//!
//! The two targets run strictly in sequence and independently; a failure in
//! one does not stop the other, and already-applied changes are not rolled
//! back.

use std::ffi::CString;
use std::fs;
use std::io::Write;
use std::os::unix::fs::{chown, PermissionsExt};
use std::path::{Path, PathBuf};

use crate::certdb::{CertDb, NssCertDb};
use crate::common::{
    InstallError, InstallResult, CA_CERT_PATH, DIRECTORY_MANAGER_DN, DS_ENCRYPTION_DN,
    DS_NICKNAME_ATTR, NICKNAME_DIRECTIVE, NSS_DB_FILES,
};
use crate::context::ApiContext;
use crate::directive::{get_directive, set_directive};
use crate::directory::{DirectoryService, LdapDirectory};
use crate::request::InstallRequest;

/// Per-target metadata derived at the start of that target's installation.
pub struct TargetConfig {
    pub db_dir: PathBuf,
    pub old_nickname: String,
    pub principal: String,
    pub restart_command: String,
}

/// Nickname assigned to the newly imported certificate.
#[derive(Clone, Debug, PartialEq)]
pub struct ImportedCertificate {
    pub nickname: String,
}

/// Outcome of one run, per requested target.
///
/// Partial success (one of two targets installed) is a valid end state and
/// is reported distinctly from full success.
#[derive(Debug, Default)]
pub struct InstallSummary {
    pub dirsrv: Option<InstallResult<()>>,
    pub http: Option<InstallResult<()>>,
}

impl InstallSummary {
    pub fn succeeded(&self) -> bool {
        !self.outcomes().iter().any(|(_, r)| r.is_err())
    }

    pub fn partial(&self) -> bool {
        let outcomes = self.outcomes();
        outcomes.iter().any(|(_, r)| r.is_ok()) && outcomes.iter().any(|(_, r)| r.is_err())
    }

    pub fn outcomes(&self) -> Vec<(&'static str, &InstallResult<()>)> {
        let mut outcomes = Vec::new();
        if let Some(result) = &self.dirsrv {
            outcomes.push(("directory server", result));
        }
        if let Some(result) = &self.http {
            outcomes.push(("http server", result));
        }
        outcomes
    }
}

/// Drives the certificate replacement for the selected targets.
pub struct CertInstaller<'a> {
    context: &'a ApiContext,
    request: &'a InstallRequest,
}

impl<'a> CertInstaller<'a> {
    pub fn new(context: &'a ApiContext, request: &'a InstallRequest) -> Self {
        Self { context, request }
    }

    /// Installs the certificate for every requested target, directory server
    /// first, wiring up the real directory and database collaborators.
    pub fn run(&self) -> InstallSummary {
        let mut summary = InstallSummary::default();
        if self.request.dirsrv {
            summary.dirsrv = Some(self.run_dirsrv());
        }
        if self.request.http {
            summary.http = Some(self.run_http());
        }
        summary
    }

    fn run_dirsrv(&self) -> InstallResult<()> {
        let dm_password = self.request.dm_password.as_deref().ok_or_else(|| {
            InstallError::Configuration("Directory Manager password required".into())
        })?;
        let mut directory =
            LdapDirectory::connect(&self.context.ldap_uri, DIRECTORY_MANAGER_DN, dm_password)?;
        let certdb = NssCertDb::new(&self.context.dirsrv_config_dirname());
        self.install_dirsrv_cert(&mut directory, &certdb)
    }

    fn run_http(&self) -> InstallResult<()> {
        let certdb = NssCertDb::new(&self.context.http_db_dir);
        self.install_http_cert(&certdb)
    }

    /// Replaces the directory server certificate.
    ///
    /// The old nickname is read from, and the new one written back to, the
    /// `nssslpersonalityssl` attribute of the encryption configuration
    /// entry. The connection is released on every exit path.
    pub fn install_dirsrv_cert(
        &self,
        directory: &mut dyn DirectoryService,
        certdb: &dyn CertDb,
    ) -> InstallResult<()> {
        let result = self.install_dirsrv_cert_steps(directory, certdb);
        directory.disconnect();
        result
    }

    fn install_dirsrv_cert_steps(
        &self,
        directory: &mut dyn DirectoryService,
        certdb: &dyn CertDb,
    ) -> InstallResult<()> {
        let serverid = self.context.dirsrv_serverid();
        let pin = self
            .request
            .dirsrv_pin
            .as_deref()
            .ok_or_else(|| InstallError::Usage("no PKCS#12 password for dirsrv".into()))?;
        let old_nickname = directory.get_single_value(DS_ENCRYPTION_DN, DS_NICKNAME_ATTR)?;
        let target = TargetConfig {
            db_dir: self.context.dirsrv_config_dirname(),
            old_nickname,
            principal: format!("ldap/{}", self.context.host),
            restart_command: format!("restart_dirsrv {}", serverid),
        };
        let server_cert = self.import_cert(certdb, &target, pin)?;
        let changed =
            directory.replace_value(DS_ENCRYPTION_DN, DS_NICKNAME_ATTR, &server_cert.nickname)?;
        if changed {
            log::info!(
                "directory server certificate set to {}",
                server_cert.nickname
            );
        } else {
            log::info!(
                "directory server certificate already set to {}",
                server_cert.nickname
            );
        }
        Ok(())
    }

    /// Replaces the web server certificate and fixes the certificate
    /// database file permissions afterwards.
    pub fn install_http_cert(&self, certdb: &dyn CertDb) -> InstallResult<()> {
        let pin = self
            .request
            .http_pin
            .as_deref()
            .ok_or_else(|| InstallError::Usage("no PKCS#12 password for http".into()))?;
        let old_nickname = get_directive(&self.context.http_nss_conf, NICKNAME_DIRECTIVE)?;
        let target = TargetConfig {
            db_dir: self.context.http_db_dir.clone(),
            old_nickname,
            principal: format!("HTTP/{}", self.context.host),
            restart_command: "restart_httpd".to_string(),
        };
        let server_cert = self.import_cert(certdb, &target, pin)?;
        set_directive(
            &self.context.http_nss_conf,
            NICKNAME_DIRECTIVE,
            &server_cert.nickname,
        )?;
        fix_db_permissions(&self.context.http_db_dir, &self.context.http_service_account)?;
        log::info!("http server certificate set to {}", server_cert.nickname);
        Ok(())
    }

    /// Shared import procedure: validate the bundle, then swap the database
    /// contents and update renewal tracking.
    ///
    /// The PKCS#12 password is handed to the database tools through a
    /// temporary file readable only by this process; the file is removed
    /// when this function returns, on every path.
    pub fn import_cert(
        &self,
        certdb: &dyn CertDb,
        target: &TargetConfig,
        pin: &str,
    ) -> InstallResult<ImportedCertificate> {
        let mut pin_file = tempfile::NamedTempFile::new()?;
        pin_file.write_all(pin.as_bytes())?;
        pin_file.flush()?;

        certdb.verify_pkcs12(
            &self.request.pkcs12_path,
            pin_file.path(),
            Path::new(CA_CERT_PATH),
            &self.context.host,
        )?;

        if self.context.enable_ra {
            // Best effort; a stale tracking request must not abort the install.
            if let Err(e) = certdb.untrack_cert(&target.old_nickname) {
                log::warn!(
                    "failed to stop tracking certificate {}: {}",
                    target.old_nickname,
                    e
                );
            }
        }

        // Known risk: a crash between the delete and the import leaves no
        // server certificate installed. The underlying tools offer no
        // transactional replacement.
        certdb
            .delete_cert(&target.old_nickname)
            .map_err(as_installation)?;
        let nickname = certdb
            .import_pkcs12(&self.request.pkcs12_path, pin_file.path())
            .map_err(as_installation)?;

        if self.context.enable_ra {
            certdb
                .track_cert(&nickname, &target.principal, &target.restart_command)
                .map_err(as_installation)?;
        }
        Ok(ImportedCertificate { nickname })
    }
}

fn as_installation(e: InstallError) -> InstallError {
    match e {
        InstallError::Installation(_) => e,
        e => InstallError::Installation(e.to_string()),
    }
}

/// Restricts the certificate database files to owner/group access and hands
/// their group ownership to the given service account's group. User
/// ownership is left untouched.
pub fn fix_db_permissions(db_dir: &Path, service_account: &str) -> InstallResult<()> {
    let gid = group_gid(service_account)?.ok_or_else(|| {
        InstallError::Permission(format!(
            "service account {} does not exist",
            service_account
        ))
    })?;
    for name in NSS_DB_FILES {
        let path = db_dir.join(name);
        let mut permissions = fs::metadata(&path)?.permissions();
        permissions.set_mode(0o640);
        fs::set_permissions(&path, permissions)?;
        chown(&path, None, Some(gid))?;
    }
    Ok(())
}

/// Looks up a group id by name. `Ok(None)` means the group does not exist.
fn group_gid(name: &str) -> InstallResult<Option<u32>> {
    let c_name = CString::new(name)
        .map_err(|_| InstallError::Permission(format!("invalid group name {}", name)))?;
    let mut group: libc::group = unsafe { std::mem::zeroed() };
    let mut buffer = vec![0 as libc::c_char; 16384];
    let mut result: *mut libc::group = std::ptr::null_mut();
    let rc = unsafe {
        libc::getgrnam_r(
            c_name.as_ptr(),
            &mut group,
            buffer.as_mut_ptr(),
            buffer.len(),
            &mut result,
        )
    };
    if rc != 0 {
        return Err(InstallError::IO(
            std::io::Error::from_raw_os_error(rc).to_string(),
        ));
    }
    if result.is_null() {
        Ok(None)
    } else {
        Ok(Some(group.gr_gid))
    }
}
