use std::ffi::CStr;
use std::fs;
use std::os::unix::fs::MetadataExt;
use std::path::{Path, PathBuf};

use certinstall::certdb::CertDb;
use certinstall::common::InstallResult;
use certinstall::context::ApiContext;
use certinstall::directive::get_directive;
use certinstall::installer::CertInstaller;
use certinstall::request::InstallRequest;

/// Pretends the bundle is valid and carries a certificate named `New-Cert`.
struct AcceptingCertDb;

impl CertDb for AcceptingCertDb {
    fn verify_pkcs12(
        &self,
        _bundle: &Path,
        _pin_file: &Path,
        _ca_file: &Path,
        _hostname: &str,
    ) -> InstallResult<String> {
        Ok("New-Cert".to_string())
    }

    fn delete_cert(&self, _nickname: &str) -> InstallResult<()> {
        Ok(())
    }

    fn import_pkcs12(&self, _bundle: &Path, _pin_file: &Path) -> InstallResult<String> {
        Ok("New-Cert".to_string())
    }

    fn track_cert(
        &self,
        _nickname: &str,
        _principal: &str,
        _restart_command: &str,
    ) -> InstallResult<()> {
        Ok(())
    }

    fn untrack_cert(&self, _nickname: &str) -> InstallResult<()> {
        Ok(())
    }
}

/// Name and id of the effective group of this process, if it has a name.
fn effective_group() -> Option<(String, u32)> {
    let gid = unsafe { libc::getegid() };
    let mut group: libc::group = unsafe { std::mem::zeroed() };
    let mut buffer = vec![0 as libc::c_char; 16384];
    let mut result: *mut libc::group = std::ptr::null_mut();
    let rc = unsafe {
        libc::getgrgid_r(
            gid,
            &mut group,
            buffer.as_mut_ptr(),
            buffer.len(),
            &mut result,
        )
    };
    if rc != 0 || result.is_null() {
        return None;
    }
    let name = unsafe { CStr::from_ptr(group.gr_name) }
        .to_string_lossy()
        .into_owned();
    Some((name, gid))
}

#[test]
fn test_http_install_end_to_end() {
    let Some((group_name, gid)) = effective_group() else {
        // Cannot exercise the ownership fix without a named group.
        return;
    };
    let dir = tempfile::tempdir().expect("create temp dir");
    let db_dir = dir.path().join("alias");
    fs::create_dir(&db_dir).expect("create db dir");
    for name in ["cert8.db", "key3.db", "secmod.db"] {
        fs::write(db_dir.join(name), b"").expect("create db file");
    }
    let nss_conf = dir.path().join("nss.conf");
    fs::write(&nss_conf, "NSSEngine on\nNSSNickname \"oldCert\"\n").expect("write conf");

    let context = ApiContext {
        realm: "EXAMPLE.COM".to_string(),
        host: "server.example.com".to_string(),
        ldap_uri: "ldap://server.example.com".to_string(),
        enable_ra: false,
        http_db_dir: db_dir.clone(),
        http_nss_conf: nss_conf.clone(),
        http_service_account: group_name,
    };
    let request = InstallRequest {
        dirsrv: false,
        http: true,
        pkcs12_path: PathBuf::from("cert.p12"),
        dirsrv_pin: None,
        http_pin: Some("secret".to_string()),
        dm_password: None,
    };

    let installer = CertInstaller::new(&context, &request);
    installer
        .install_http_cert(&AcceptingCertDb)
        .expect("http install succeeds");

    let nickname = get_directive(&nss_conf, "NSSNickname").expect("directive present");
    assert_eq!("New-Cert", nickname);
    for name in ["cert8.db", "key3.db", "secmod.db"] {
        let metadata = fs::metadata(db_dir.join(name)).expect("stat db file");
        assert_eq!(0o640, metadata.mode() & 0o777);
        assert_eq!(gid, metadata.gid());
    }
}
