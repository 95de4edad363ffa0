// SPDX-License-Identifier: EUPL-1.2

//! Test doubles for the process-backed boundaries.

use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;

use parking_lot::Mutex;

use crate::{
    crypto::CryptoGateway,
    error::CscError,
    fs::{Filesystem, LocalFs},
    state::AppState,
    store::{naming, Layout},
    workspace::{GitWorkspace, Repository, Workspace},
};

// ── Crypto ────────────────────────────────────────────────────────────────────

/// Records every call as `"<op>:<file name>"`. `sign` writes
/// `intermediate/certs/<base>.crt.pem` into the workspace.
#[derive(Default)]
pub struct FakeCrypto {
    calls: Mutex<Vec<String>>,
    fail_on: Mutex<Option<String>>,
}

impl FakeCrypto {
    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().clone()
    }

    pub fn fail_on(&self, op: &str) {
        *self.fail_on.lock() = Some(op.to_string());
    }

    pub fn clear_failure(&self) {
        *self.fail_on.lock() = None;
    }

    fn record(&self, op: &str, subject: &str) -> Result<(), CscError> {
        self.calls.lock().push(format!("{op}:{subject}"));
        if self.fail_on.lock().as_deref() == Some(op) {
            return Err(CscError::Process {
                description: op.to_string(),
                code: "1".into(),
            });
        }
        Ok(())
    }
}

impl CryptoGateway for FakeCrypto {
    fn decrypt(&self, file: &Path, _password: &str) -> Result<(), CscError> {
        self.record("decrypt", &naming::file_name(file))
    }

    fn encrypt(&self, file: &Path, _password: &str) -> Result<(), CscError> {
        self.record("encrypt", &naming::file_name(file))
    }

    fn sign(&self, workspace: &Path, csr: &Path, _key_password: &str) -> Result<PathBuf, CscError> {
        let name = naming::file_name(csr);
        self.record("sign", &name)?;

        let relative = Path::new("intermediate/certs").join(naming::cert_file_for_csr(&name));
        let cert = workspace.join(&relative);
        std::fs::create_dir_all(workspace.join("intermediate/certs"))?;
        std::fs::write(&cert, format!("-----BEGIN CERTIFICATE-----\n{name}\n-----END CERTIFICATE-----\n"))?;
        Ok(cert)
    }

    fn revoke(&self, _workspace: &Path, cert: &Path, _key_password: &str) -> Result<(), CscError> {
        self.record("revoke", &naming::file_name(cert))
    }

    fn generate_app_key(&self, apps_dir: &Path, app: &str, _password: &str) -> Result<(), CscError> {
        self.record("app-key", app)?;
        std::fs::create_dir_all(apps_dir.join(app))?;
        std::fs::write(apps_dir.join(app).join(format!("{app}.key.pem")), "key")?;
        Ok(())
    }

    fn generate_app_csr(&self, apps_dir: &Path, app: &str, _password: &str) -> Result<(), CscError> {
        self.record("app-csr", app)?;
        std::fs::write(apps_dir.join(app).join(format!("{app}.csr.pem")), "csr")?;
        Ok(())
    }
}

// ── Repository ────────────────────────────────────────────────────────────────

/// Clones a small CA skeleton; remembers commit messages.
#[derive(Default)]
pub struct FakeRepository {
    clones: AtomicUsize,
    pushes: AtomicUsize,
    fail_push: AtomicBool,
    commits: Mutex<Vec<String>>,
}

impl FakeRepository {
    pub fn clone_count(&self) -> usize {
        self.clones.load(Ordering::SeqCst)
    }

    pub fn push_count(&self) -> usize {
        self.pushes.load(Ordering::SeqCst)
    }

    pub fn commits(&self) -> Vec<String> {
        self.commits.lock().clone()
    }

    pub fn fail_push(&self) {
        self.fail_push.store(true, Ordering::SeqCst);
    }
}

impl Repository for FakeRepository {
    fn clone_to(&self, target: &Path) -> Result<(), CscError> {
        self.clones.fetch_add(1, Ordering::SeqCst);
        std::fs::create_dir_all(target.join("intermediate/private"))?;
        std::fs::create_dir_all(target.join("intermediate/certs"))?;
        std::fs::write(target.join("intermediate/private/ca.key.pem"), "encrypted key")?;
        std::fs::write(target.join("intermediate/certs/ca.cert.pem"), "encrypted cert")?;
        std::fs::write(target.join("intermediate/index.txt"), "")?;
        std::fs::write(target.join("README.md"), "ca")?;
        Ok(())
    }

    fn commit_all(&self, _root: &Path, message: &str) -> Result<String, CscError> {
        let mut commits = self.commits.lock();
        commits.push(message.to_string());
        Ok(format!("commit-{}", commits.len()))
    }

    fn push(&self, _root: &Path) -> Result<(), CscError> {
        if self.fail_push.load(Ordering::SeqCst) {
            return Err(CscError::Transport("remote rejected push".into()));
        }
        self.pushes.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}

// ── Workspace ─────────────────────────────────────────────────────────────────

/// Counts calls without touching disk; can fail a chosen step.
pub struct RecordingWorkspace {
    root: PathBuf,
    calls: Mutex<Vec<&'static str>>,
    fail_at: Mutex<Option<&'static str>>,
}

impl RecordingWorkspace {
    pub fn new() -> Self {
        Self {
            root: PathBuf::from("/nonexistent/workspace"),
            calls: Mutex::new(Vec::new()),
            fail_at: Mutex::new(None),
        }
    }

    pub fn calls(&self) -> Vec<&'static str> {
        self.calls.lock().clone()
    }

    pub fn fail_at(&self, step: &'static str) {
        *self.fail_at.lock() = Some(step);
    }

    fn step(&self, name: &'static str) -> Result<(), CscError> {
        self.calls.lock().push(name);
        if *self.fail_at.lock() == Some(name) {
            return Err(CscError::Transport(format!("{name} failed")));
        }
        Ok(())
    }
}

impl Workspace for RecordingWorkspace {
    fn root(&self) -> &Path {
        &self.root
    }

    fn reset(&self) -> Result<(), CscError> {
        self.step("reset")
    }

    fn decrypt_all(&self, _password: &str) -> Result<(), CscError> {
        self.step("decrypt")
    }

    fn encrypt_all(&self, _password: &str) -> Result<(), CscError> {
        self.step("encrypt")
    }

    fn publish(&self, _operator: &str, _operation: &str) -> Result<(), CscError> {
        self.step("publish")
    }

    fn import_file(&self, _source: &Path, relative: &Path) -> Result<PathBuf, CscError> {
        self.step("import")?;
        Ok(self.root.join(relative))
    }

    fn export_certificate(&self, destination_dir: &Path, cert: &Path) -> Result<PathBuf, CscError> {
        self.step("export")?;
        Ok(destination_dir.join(naming::file_name(cert)))
    }
}

// ── HTTP ──────────────────────────────────────────────────────────────────────

/// A real PEM-encoded PKCS#10 request for `cn`.
pub fn csr_pem(cn: &str) -> String {
    let key = rcgen::KeyPair::generate().unwrap();
    rcgen::CertificateParams::new(vec![cn.to_string()])
        .unwrap()
        .serialize_request(&key)
        .unwrap()
        .pem()
        .unwrap()
}

/// Router over a temporary storage root, fake crypto and a fake remote.
pub fn test_server() -> (axum_test::TestServer, tempfile::TempDir) {
    let dir = tempfile::tempdir().unwrap();
    let layout = Layout::new(dir.path());
    let fs: Arc<dyn Filesystem> = Arc::new(LocalFs);
    let crypto: Arc<dyn CryptoGateway> = Arc::new(FakeCrypto::default());
    let repository: Arc<dyn Repository> = Arc::new(FakeRepository::default());

    let user_ws = Arc::new(GitWorkspace::new(
        layout.user_workspace(),
        repository.clone(),
        crypto.clone(),
        fs.clone(),
    ));
    let apps_ws = Arc::new(GitWorkspace::new(layout.apps_workspace(), repository, crypto.clone(), fs.clone()));

    let state = AppState::assemble(fs, layout, dir.path().join("crl.pem"), crypto, user_ws, apps_ws);
    let server = axum_test::TestServer::new(crate::router(Arc::new(state))).unwrap();
    (server, dir)
}
