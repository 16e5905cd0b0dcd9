//! # Web Server Configuration Directives
//!
//! Reader and writer for the directive-based configuration format of the web
//! server's NSS module: one directive per line, name separated from the value
//! by whitespace, with optional double quoting of the value. Rewrites
//! preserve every unrelated line.

use std::fs;
use std::path::Path;

use crate::common::{InstallError, InstallResult};

/// Reads the value of a directive from a configuration file.
pub fn get_directive(path: &Path, name: &str) -> InstallResult<String> {
    let contents = fs::read_to_string(path)?;
    for line in contents.lines() {
        if let Some(value) = parse_directive(line, name) {
            return Ok(value);
        }
    }
    Err(InstallError::Configuration(format!(
        "directive {} not found in {}",
        name,
        path.display()
    )))
}

/// Replaces the value of a directive, leaving all other lines untouched.
///
/// The value is written quoted, matching how the deployment tools emit the
/// file. A missing directive is appended at the end.
pub fn set_directive(path: &Path, name: &str, value: &str) -> InstallResult<()> {
    let contents = fs::read_to_string(path)?;
    let mut lines = Vec::new();
    let mut replaced = false;
    for line in contents.lines() {
        if !replaced && parse_directive(line, name).is_some() {
            lines.push(format!("{} \"{}\"", name, value));
            replaced = true;
        } else {
            lines.push(line.to_string());
        }
    }
    if !replaced {
        lines.push(format!("{} \"{}\"", name, value));
    }
    let mut output = lines.join("\n");
    output.push('\n');
    fs::write(path, output)?;
    Ok(())
}

fn parse_directive(line: &str, name: &str) -> Option<String> {
    let trimmed = line.trim_start();
    let rest = trimmed.strip_prefix(name)?;
    // Require whitespace after the name so e.g. NSSNicknameExtra won't match.
    if !rest.starts_with(char::is_whitespace) {
        return None;
    }
    let value = rest.trim().trim_matches('"');
    Some(value.to_string())
}

#[cfg(test)]
mod tests {
    use std::io::Write;

    use super::*;

    const NSS_CONF: &str = "\
# NSS module configuration
NSSEngine on
NSSNickname \"Server-Cert\"
NSSCertificateDatabase /etc/httpd/alias
";

    fn write_conf(contents: &str) -> tempfile::NamedTempFile {
        let mut file = tempfile::NamedTempFile::new().expect("create temp conf");
        file.write_all(contents.as_bytes()).expect("write conf");
        file
    }

    #[test]
    fn test_get_directive_strips_quotes() {
        let file = write_conf(NSS_CONF);
        let value = get_directive(file.path(), "NSSNickname").expect("directive present");
        assert_eq!("Server-Cert", value);
    }

    #[test]
    fn test_get_directive_requires_exact_name() {
        let file = write_conf("NSSNicknameExtra \"x\"\n");
        let result = get_directive(file.path(), "NSSNickname");
        assert!(matches!(result, Err(InstallError::Configuration(_))));
    }

    #[test]
    fn test_set_directive_rewrites_value_only() {
        let file = write_conf(NSS_CONF);
        set_directive(file.path(), "NSSNickname", "New-Cert").expect("directive rewritten");
        let contents = fs::read_to_string(file.path()).expect("read conf");
        assert!(contents.contains("NSSNickname \"New-Cert\""));
        assert!(contents.contains("NSSEngine on"));
        assert!(contents.contains("NSSCertificateDatabase /etc/httpd/alias"));
        assert!(!contents.contains("Server-Cert"));
    }

    #[test]
    fn test_set_directive_appends_when_absent() {
        let file = write_conf("NSSEngine on\n");
        set_directive(file.path(), "NSSNickname", "New-Cert").expect("directive appended");
        let value = get_directive(file.path(), "NSSNickname").expect("directive present");
        assert_eq!("New-Cert", value);
    }
}
