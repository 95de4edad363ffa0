// SPDX-License-Identifier: EUPL-1.2

//! Workspace synchronization.
//!
//! A workspace is a throwaway, decrypted clone of the encrypted CA
//! repository. It is rebuilt from the remote at the start of every
//! mutating workflow and published (encrypted, committed, pushed) at the
//! end. Whatever is left on disk after a failure is never reused.

use std::path::{Component, Path, PathBuf};
use std::process::Command;
use std::sync::Arc;

use crate::{
    crypto::CryptoGateway,
    error::CscError,
    fs::Filesystem,
    process::{last_line, run_command},
};

/// Intake directory for CSRs inside the workspace.
pub const INTAKE_DIR: &str = "intermediate/csr";

const CRYPT_SCAN_DEPTH: usize = 4;
const CRYPT_EXTENSIONS: [&str; 4] = ["pem", "csr", "pfx", "crt"];

/// The local working copy used by one workflow at a time.
pub trait Workspace: Send + Sync {
    fn root(&self) -> &Path;

    /// Discard any existing working copy and clone a fresh one.
    fn reset(&self) -> Result<(), CscError>;

    fn decrypt_all(&self, password: &str) -> Result<(), CscError>;

    fn encrypt_all(&self, password: &str) -> Result<(), CscError>;

    /// Commit everything as `"<operation> - done by: <operator>"` and push.
    fn publish(&self, operator: &str, operation: &str) -> Result<(), CscError>;

    /// Copy `source` to `relative` inside the workspace, replacing.
    fn import_file(&self, source: &Path, relative: &Path) -> Result<PathBuf, CscError>;

    /// Copy `cert` into `destination_dir` under its own file name, replacing.
    fn export_certificate(&self, destination_dir: &Path, cert: &Path) -> Result<PathBuf, CscError>;
}

/// Version-control transport used by [`GitWorkspace`].
pub trait Repository: Send + Sync {
    fn clone_to(&self, target: &Path) -> Result<(), CscError>;

    /// Stage all changes and commit; returns the new commit id.
    fn commit_all(&self, root: &Path, message: &str) -> Result<String, CscError>;

    fn push(&self, root: &Path) -> Result<(), CscError>;
}

pub fn commit_message(operation: &str, operator: &str) -> String {
    format!("{operation} - done by: {operator}")
}

/// Files that are encrypted at rest in the repository.
pub fn is_encrypted_at_rest(path: &Path) -> bool {
    let in_git_dir = path
        .components()
        .any(|c| matches!(c, Component::Normal(n) if n == ".git"));
    let name = path
        .file_name()
        .map(|n| n.to_string_lossy())
        .unwrap_or_default();

    !in_git_dir && CRYPT_EXTENSIONS.iter().any(|ext| name.ends_with(ext))
}

// ── Git transport ─────────────────────────────────────────────────────────────

/// [`Repository`] driving the `git` command line over SSH.
pub struct GitCli {
    url: String,
    ssh_key: Option<PathBuf>,
}

impl GitCli {
    pub fn new(url: impl Into<String>, ssh_key: Option<PathBuf>) -> Self {
        Self {
            url: url.into(),
            ssh_key,
        }
    }

    fn git(&self) -> Command {
        let mut cmd = Command::new("git");
        if let Some(key) = &self.ssh_key {
            cmd.env(
                "GIT_SSH_COMMAND",
                format!("ssh -i {} -o IdentitiesOnly=yes", key.display()),
            );
        }
        cmd
    }

    fn git_in(&self, root: &Path) -> Command {
        let mut cmd = self.git();
        cmd.arg("-C").arg(root);
        cmd
    }
}

/// Clone and push failures are transport failures, whatever the exit code.
fn as_transport(e: CscError) -> CscError {
    match e {
        CscError::Process { description, code } => {
            CscError::Transport(format!("{description} exited with {code}"))
        }
        other => other,
    }
}

impl Repository for GitCli {
    fn clone_to(&self, target: &Path) -> Result<(), CscError> {
        tracing::debug!(url = %self.url, target = %target.display(), "Cloning certificate repository");
        run_command(
            "Clone certificate repository",
            self.git().args(["clone", "--quiet"]).arg(&self.url).arg(target),
        )
        .map_err(as_transport)?;
        Ok(())
    }

    fn commit_all(&self, root: &Path, message: &str) -> Result<String, CscError> {
        run_command("Stage changes", self.git_in(root).args(["add", "--all"]))?;
        run_command(
            "Commit changes",
            self.git_in(root)
                .args(["-c", "user.name=client-cert-registry"])
                .args(["-c", "user.email=client-cert-registry@localhost"])
                .args(["commit", "--quiet", "--allow-empty", "-m", message]),
        )?;
        let head = run_command("Resolve commit", self.git_in(root).args(["rev-parse", "HEAD"]))?;
        last_line(&head.stdout).ok_or_else(|| CscError::UnexpectedOutput("git rev-parse".into()))
    }

    fn push(&self, root: &Path) -> Result<(), CscError> {
        run_command("Push changes", self.git_in(root).args(["push", "--quiet"])).map_err(as_transport)?;
        Ok(())
    }
}

// ── Workspace ─────────────────────────────────────────────────────────────────

/// [`Workspace`] cloned from a [`Repository`] and ciphered via a
/// [`CryptoGateway`].
pub struct GitWorkspace {
    root: PathBuf,
    repository: Arc<dyn Repository>,
    crypto: Arc<dyn CryptoGateway>,
    fs: Arc<dyn Filesystem>,
}

impl GitWorkspace {
    pub fn new(
        root: impl Into<PathBuf>,
        repository: Arc<dyn Repository>,
        crypto: Arc<dyn CryptoGateway>,
        fs: Arc<dyn Filesystem>,
    ) -> Self {
        Self {
            root: root.into(),
            repository,
            crypto,
            fs,
        }
    }

    fn encrypted_files(&self) -> Result<Vec<PathBuf>, CscError> {
        Ok(self
            .fs
            .find(&self.root, CRYPT_SCAN_DEPTH, &is_encrypted_at_rest)?)
    }
}

impl Workspace for GitWorkspace {
    fn root(&self) -> &Path {
        &self.root
    }

    fn reset(&self) -> Result<(), CscError> {
        if self.fs.exists(&self.root) {
            tracing::debug!(root = %self.root.display(), "Discarding previous workspace");
            self.fs.remove_recursive(&self.root)?;
        }
        if let Some(parent) = self.root.parent() {
            self.fs.create_dirs(parent)?;
        }
        self.repository.clone_to(&self.root)
    }

    fn decrypt_all(&self, password: &str) -> Result<(), CscError> {
        let files = self.encrypted_files()?;
        for file in &files {
            self.crypto.decrypt(file, password)?;
        }
        tracing::debug!(count = files.len(), "Workspace decrypted");
        Ok(())
    }

    fn encrypt_all(&self, password: &str) -> Result<(), CscError> {
        let files = self.encrypted_files()?;
        for file in &files {
            self.crypto.encrypt(file, password)?;
        }
        tracing::debug!(count = files.len(), "Workspace encrypted");
        Ok(())
    }

    fn publish(&self, operator: &str, operation: &str) -> Result<(), CscError> {
        let message = commit_message(operation, operator);
        let commit = self.repository.commit_all(&self.root, &message)?;

        if let Err(e) = self.repository.push(&self.root) {
            tracing::error!(%commit, %message, "Commit was created but not pushed: {e}");
            return Err(CscError::PushFailed {
                commit,
                reason: e.to_string(),
            });
        }

        tracing::info!(%commit, %message, "Workspace published");
        Ok(())
    }

    fn import_file(&self, source: &Path, relative: &Path) -> Result<PathBuf, CscError> {
        let target = self.root.join(relative);
        if let Some(parent) = target.parent() {
            self.fs.create_dirs(parent)?;
        }
        self.fs.copy_replace(source, &target)?;
        Ok(target)
    }

    fn export_certificate(&self, destination_dir: &Path, cert: &Path) -> Result<PathBuf, CscError> {
        let name = cert
            .file_name()
            .ok_or_else(|| CscError::UnexpectedOutput(format!("certificate path {}", cert.display())))?;
        let target = destination_dir.join(name);

        self.fs.create_dirs(destination_dir)?;
        self.fs.copy_replace(cert, &target)?;
        Ok(target)
    }
}
