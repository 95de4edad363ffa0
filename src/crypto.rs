// SPDX-License-Identifier: EUPL-1.2

//! Delegated cryptographic operations.
//!
//! Nothing here implements cryptography. Every operation spawns an external
//! process and maps its exit status (and, for signing, its output) onto
//! [`CscError`]:
//!
//! ```text
//! openssl enc [-d] -aes256 -a -S {salt} -pbkdf2 -iter 20000 -pass env:… -in {file} -out {file}.tmp
//! {workspace}/sign-csr.sh   {workspace} {csr}  {key-password}   → last line: cert path
//! {workspace}/revoke-cert.sh {workspace} {cert} {key-password}
//! {scripts}/gen-app-key.sh  {apps-dir} {app} {password}
//! {scripts}/gen-app-csr.sh  {apps-dir} {app} {password}
//! ```

use std::ffi::OsString;
use std::path::{Path, PathBuf};
use std::process::Command;
use std::sync::Arc;

use crate::{
    error::CscError,
    fs::Filesystem,
    process::{last_line, run_command},
};

const PBKDF2_ITERATIONS: &str = "20000";
const PASSWORD_ENV: &str = "CSC_CIPHER_PASS";

pub const SIGN_SCRIPT: &str = "sign-csr.sh";
pub const REVOKE_SCRIPT: &str = "revoke-cert.sh";
pub const APP_KEY_SCRIPT: &str = "gen-app-key.sh";
pub const APP_CSR_SCRIPT: &str = "gen-app-csr.sh";

/// Capability boundary around the external crypto tooling.
pub trait CryptoGateway: Send + Sync {
    /// Decrypt `file` in place.
    fn decrypt(&self, file: &Path, password: &str) -> Result<(), CscError>;

    /// Encrypt `file` in place.
    fn encrypt(&self, file: &Path, password: &str) -> Result<(), CscError>;

    /// Sign `csr` with the CA material in `workspace`; returns the absolute
    /// path of the issued certificate.
    fn sign(&self, workspace: &Path, csr: &Path, key_password: &str) -> Result<PathBuf, CscError>;

    fn revoke(&self, workspace: &Path, cert: &Path, key_password: &str) -> Result<(), CscError>;

    /// Create `<apps_dir>/<app>/<app>.key.pem` protected by `password`.
    fn generate_app_key(&self, apps_dir: &Path, app: &str, password: &str) -> Result<(), CscError>;

    /// Create `<apps_dir>/<app>/<app>.csr.pem` from the app key.
    fn generate_app_csr(&self, apps_dir: &Path, app: &str, password: &str) -> Result<(), CscError>;
}

/// Process-spawning [`CryptoGateway`] using `openssl` and the CA scripts.
pub struct OpensslGateway {
    salt: String,
    scripts: PathBuf,
    fs: Arc<dyn Filesystem>,
}

impl OpensslGateway {
    pub fn new(salt: impl Into<String>, scripts: impl Into<PathBuf>, fs: Arc<dyn Filesystem>) -> Self {
        Self {
            salt: salt.into(),
            scripts: scripts.into(),
            fs,
        }
    }

    fn cipher(&self, description: &str, decrypt: bool, file: &Path, password: &str) -> Result<(), CscError> {
        let output = temp_sibling(file);
        let mut cmd = Command::new("openssl");
        cmd.args(cipher_args(decrypt, &self.salt, file, &output))
            .env(PASSWORD_ENV, password);

        if let Err(e) = run_command(description, &mut cmd) {
            if let Err(cleanup) = self.fs.remove_if_exists(&output) {
                tracing::warn!(path = %output.display(), "Leaving partial cipher output behind: {cleanup}");
            }
            return Err(e);
        }

        self.fs.move_replace(&output, file)?;
        Ok(())
    }
}

impl CryptoGateway for OpensslGateway {
    fn decrypt(&self, file: &Path, password: &str) -> Result<(), CscError> {
        self.cipher("Decrypting file", true, file, password)
    }

    fn encrypt(&self, file: &Path, password: &str) -> Result<(), CscError> {
        self.cipher("Encrypting file", false, file, password)
    }

    fn sign(&self, workspace: &Path, csr: &Path, key_password: &str) -> Result<PathBuf, CscError> {
        let output = run_command(
            "Sign CSR",
            Command::new(workspace.join(SIGN_SCRIPT))
                .arg(workspace)
                .arg(csr)
                .arg(key_password),
        )?;

        let relative = last_line(&output.stdout)
            .ok_or_else(|| CscError::UnexpectedOutput(SIGN_SCRIPT.into()))?;

        Ok(workspace.join(relative))
    }

    fn revoke(&self, workspace: &Path, cert: &Path, key_password: &str) -> Result<(), CscError> {
        run_command(
            "Revoke Certificate",
            Command::new(workspace.join(REVOKE_SCRIPT))
                .arg(workspace)
                .arg(cert)
                .arg(key_password),
        )?;
        Ok(())
    }

    fn generate_app_key(&self, apps_dir: &Path, app: &str, password: &str) -> Result<(), CscError> {
        run_command(
            "Create application key",
            Command::new(self.scripts.join(APP_KEY_SCRIPT))
                .arg(apps_dir)
                .arg(app)
                .arg(password),
        )?;
        Ok(())
    }

    fn generate_app_csr(&self, apps_dir: &Path, app: &str, password: &str) -> Result<(), CscError> {
        run_command(
            "Create application CSR",
            Command::new(self.scripts.join(APP_CSR_SCRIPT))
                .arg(apps_dir)
                .arg(app)
                .arg(password),
        )?;
        Ok(())
    }
}

/// `<file>.tmp` next to `file`.
pub fn temp_sibling(file: &Path) -> PathBuf {
    let mut name = file.file_name().map(OsString::from).unwrap_or_default();
    name.push(".tmp");
    file.with_file_name(name)
}

fn cipher_args(decrypt: bool, salt: &str, input: &Path, output: &Path) -> Vec<OsString> {
    let mut args: Vec<OsString> = vec!["enc".into()];
    if decrypt {
        args.push("-d".into());
    }
    for a in ["-aes256", "-a", "-S", salt, "-pbkdf2", "-iter", PBKDF2_ITERATIONS] {
        args.push(a.into());
    }
    args.push("-pass".into());
    args.push(format!("env:{PASSWORD_ENV}").into());
    args.push("-in".into());
    args.push(input.into());
    args.push("-out".into());
    args.push(output.into());
    args
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fs::LocalFs;

    #[test]
    fn temp_sibling_appends_suffix() {
        assert_eq!(
            temp_sibling(Path::new("/repo/intermediate/ca.key.pem")),
            PathBuf::from("/repo/intermediate/ca.key.pem.tmp")
        );
    }

    #[test]
    fn cipher_args_never_carry_the_password() {
        let args = cipher_args(true, "0011223344556677", Path::new("a.pem"), Path::new("a.pem.tmp"));
        let joined: Vec<String> = args.iter().map(|a| a.to_string_lossy().into_owned()).collect();
        assert_eq!(joined[0], "enc");
        assert_eq!(joined[1], "-d");
        assert!(joined.contains(&"20000".to_string()));
        assert!(joined.contains(&"env:CSC_CIPHER_PASS".to_string()));
        assert_eq!(joined.last().map(String::as_str), Some("a.pem.tmp"));

        let enc = cipher_args(false, "0011223344556677", Path::new("a"), Path::new("b"));
        assert!(!enc.iter().any(|a| a == "-d"));
    }

    #[cfg(unix)]
    fn script(dir: &Path, name: &str, body: &str) {
        use std::os::unix::fs::PermissionsExt;
        let path = dir.join(name);
        std::fs::write(&path, format!("#!/bin/sh\n{body}\n")).unwrap();
        std::fs::set_permissions(&path, std::fs::Permissions::from_mode(0o755)).unwrap();
    }

    #[cfg(unix)]
    #[test]
    fn failed_cipher_leaves_no_partial_output() {
        let dir = tempfile::tempdir().unwrap();
        let gateway = OpensslGateway::new("0011223344556677", dir.path(), Arc::new(LocalFs));
        let missing = dir.path().join("missing.key.pem");

        assert!(gateway.decrypt(&missing, "pw").is_err());
        assert!(!temp_sibling(&missing).exists());
        assert!(!missing.exists());
    }

    #[cfg(unix)]
    #[test]
    fn sign_resolves_last_output_line_against_workspace() {
        let ws = tempfile::tempdir().unwrap();
        script(ws.path(), SIGN_SCRIPT, "echo 'Signing...'\necho intermediate/certs/alice.crt.pem");

        let gw = OpensslGateway::new("00", ws.path(), Arc::new(LocalFs));
        let cert = gw
            .sign(ws.path(), &ws.path().join("intermediate/csr/alice.csr.pem"), "pw")
            .unwrap();
        assert_eq!(cert, ws.path().join("intermediate/certs/alice.crt.pem"));
    }

    #[cfg(unix)]
    #[test]
    fn sign_without_output_is_unexpected() {
        let ws = tempfile::tempdir().unwrap();
        script(ws.path(), SIGN_SCRIPT, "true");

        let gw = OpensslGateway::new("00", ws.path(), Arc::new(LocalFs));
        let err = gw.sign(ws.path(), Path::new("x.csr.pem"), "pw").unwrap_err();
        assert!(matches!(err, CscError::UnexpectedOutput(_)));
    }

    #[cfg(unix)]
    #[test]
    fn failing_revoke_is_a_process_error() {
        let ws = tempfile::tempdir().unwrap();
        script(ws.path(), REVOKE_SCRIPT, "echo 'no such cert' >&2\nexit 1");

        let gw = OpensslGateway::new("00", ws.path(), Arc::new(LocalFs));
        let err = gw.revoke(ws.path(), Path::new("x.crt.pem"), "pw").unwrap_err();
        assert!(matches!(err, CscError::Process { .. }));
    }

    #[cfg(unix)]
    #[test]
    fn app_key_script_receives_apps_dir_and_name() {
        let scripts = tempfile::tempdir().unwrap();
        let apps = tempfile::tempdir().unwrap();
        script(
            scripts.path(),
            APP_KEY_SCRIPT,
            "mkdir -p \"$1/$2\" && printf '%s' \"$3\" > \"$1/$2/$2.key.pem\"",
        );

        let gw = OpensslGateway::new("00", scripts.path(), Arc::new(LocalFs));
        gw.generate_app_key(apps.path(), "billing", "s3cret").unwrap();

        let key = std::fs::read_to_string(apps.path().join("billing/billing.key.pem")).unwrap();
        assert_eq!(key, "s3cret");
    }
}
