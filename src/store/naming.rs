// SPDX-License-Identifier: EUPL-1.2

//! File-name conventions and identity validation.
//!
//! The mapping between a CSR and its certificate is reconstructed from the
//! file name alone: `alice.csr.pem` ⇄ `alice.crt.pem`.

use std::ffi::OsString;
use std::path::{Path, PathBuf};
use std::sync::OnceLock;

use regex::Regex;

use crate::error::CscError;

pub const CERT_SUFFIX: &str = ".crt.pem";
pub const CSR_SUFFIX: &str = ".csr.pem";
pub const KEY_SUFFIX: &str = ".key.pem";
pub const REQRENEW_SUFFIX: &str = ".reqrenew";
pub const RENEWED_SUFFIX: &str = ".renewed";

/// External identities become directory names: `@` is not filesystem-safe.
pub fn normalize_user_name(name: &str) -> String {
    name.replace('@', "_")
}

/// Strip any directory part a client may have sent along.
pub fn normalize_file_name(name: &str) -> &str {
    name.rsplit('/').next().unwrap_or(name)
}

/// Reject names that would escape their directory.
pub fn validate_segment<'a>(kind: &str, name: &'a str) -> Result<&'a str, CscError> {
    if name.is_empty()
        || name == "."
        || name == ".."
        || name.contains(['/', '\\', '\0'])
    {
        return Err(CscError::Validation(format!("invalid {kind}: '{name}'")));
    }
    Ok(name)
}

pub fn is_valid_csr_file_name(name: &str) -> bool {
    name.ends_with("pem") || name.ends_with("csr")
}

pub fn is_valid_cert_file_name(name: &str) -> bool {
    name.ends_with("crt.pem") || name.ends_with("crt")
}

fn before<'a>(name: &'a str, marker: &str) -> &'a str {
    name.find(marker).map(|i| &name[..i]).unwrap_or(name)
}

/// `alice.csr.pem` → `alice`
pub fn csr_base_name(name: &str) -> &str {
    before(name, ".csr")
}

/// `alice.crt.pem` → `alice`
pub fn cert_base_name(name: &str) -> &str {
    before(name, ".crt")
}

/// `alice.csr.pem` → `alice.crt.pem`
pub fn cert_file_for_csr(csr_name: &str) -> String {
    format!("{}{CERT_SUFFIX}", csr_base_name(csr_name))
}

/// `alice.crt.pem` → `alice.csr.pem`
pub fn csr_file_for_cert(cert_name: &str) -> String {
    format!("{}{CSR_SUFFIX}", cert_base_name(cert_name))
}

/// `path` with `suffix` appended to its file name.
pub fn marker(path: &Path, suffix: &str) -> PathBuf {
    let mut name = path.file_name().map(OsString::from).unwrap_or_default();
    name.push(suffix);
    path.with_file_name(name)
}

pub fn file_name(path: &Path) -> String {
    path.file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default()
}

/// Parent directory name, compared case-insensitively against `dir`.
pub fn parent_is(path: &Path, dir: &str) -> bool {
    path.parent()
        .and_then(Path::file_name)
        .map(|n| n.to_string_lossy().eq_ignore_ascii_case(dir))
        .unwrap_or(false)
}

pub fn validate_app_name(name: &str) -> Result<&str, CscError> {
    static APP_NAME: OnceLock<Regex> = OnceLock::new();
    let re = APP_NAME.get_or_init(|| Regex::new(r"^[A-Za-z0-9_-]+$").expect("static regex"));
    if re.is_match(name) {
        Ok(name)
    } else {
        Err(CscError::Validation(format!(
            "application name '{name}' may only contain letters, digits, '_' and '-'"
        )))
    }
}

pub fn is_valid_contact(email: &str) -> bool {
    static EMAIL: OnceLock<Regex> = OnceLock::new();
    EMAIL
        .get_or_init(|| Regex::new(r"^[^@\s]+@[^@\s]+\.[^@\s]+$").expect("static regex"))
        .is_match(email)
}
