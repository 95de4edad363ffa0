// SPDX-License-Identifier: EUPL-1.2

//! Lifecycle state stores.
//!
//! State is positional: a CSR is pending, accepted or rejected depending on
//! the directory it sits in, and a certificate is active or revoked the
//! same way. Transitions are moves; flags are empty marker files.
//!
//! ```text
//! users/<user>/<csr>                      pending
//! users/<user>/accepted/<csr>[.renewed]   accepted (signed)
//! users/<user>/rejected/<csr>             rejected
//! users/<user>/certs/<crt>[.reqrenew]     active certificate
//! users/<user>/revoked/<crt>              revoked certificate
//! applications/<app>/<app>.{key,csr,crt}.pem[.reqrenew]
//! ```
//!
//! Readers run without the workflow lock and may observe a tree that is
//! being rewritten; they return empty results instead of failing.

pub mod admin;
pub mod apps;
pub mod inspect;
pub mod naming;
pub mod user;

use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};

use crate::{
    fs::Filesystem,
    models::{CertInfo, CertificateRequest, CsrState},
};

pub use admin::AdminStore;
pub use apps::SharedAppStore;
pub use user::UserStore;

pub const USERS_DIR: &str = "users";
pub const APPS_DIR: &str = "applications";
pub const CERTS_DIR: &str = "certs";
pub const REVOKED_DIR: &str = "revoked";
pub const CA_CERT_FILE: &str = "intermediate.cert.pem";
pub const USER_WORKSPACE_DIR: &str = "cert-repo";
pub const APPS_WORKSPACE_DIR: &str = "cert-repo-apps";

/// Paths below the configured storage root.
#[derive(Debug, Clone)]
pub struct Layout {
    storage: PathBuf,
}

impl Layout {
    pub fn new(storage: impl Into<PathBuf>) -> Self {
        Self {
            storage: storage.into(),
        }
    }

    pub fn storage(&self) -> &Path {
        &self.storage
    }

    pub fn users_dir(&self) -> PathBuf {
        self.storage.join(USERS_DIR)
    }

    pub fn user_dir(&self, user: &str) -> PathBuf {
        self.users_dir().join(user)
    }

    pub fn csr_dir(&self, user: &str, state: CsrState) -> PathBuf {
        match state.subdir() {
            Some(sub) => self.user_dir(user).join(sub),
            None => self.user_dir(user),
        }
    }

    pub fn certs_dir(&self, user: &str) -> PathBuf {
        self.user_dir(user).join(CERTS_DIR)
    }

    pub fn revoked_dir(&self, user: &str) -> PathBuf {
        self.user_dir(user).join(REVOKED_DIR)
    }

    pub fn apps_dir(&self) -> PathBuf {
        self.storage.join(APPS_DIR)
    }

    pub fn app_dir(&self, app: &str) -> PathBuf {
        self.apps_dir().join(app)
    }

    pub fn ca_cert(&self) -> PathBuf {
        self.storage.join(CA_CERT_FILE)
    }

    pub fn user_workspace(&self) -> PathBuf {
        self.storage.join(USER_WORKSPACE_DIR)
    }

    pub fn apps_workspace(&self) -> PathBuf {
        self.storage.join(APPS_WORKSPACE_DIR)
    }
}

pub(crate) fn last_modified(fs: &dyn Filesystem, path: &Path) -> Option<DateTime<Utc>> {
    fs.modified(path).ok().map(DateTime::<Utc>::from)
}

pub(crate) fn is_csr_file(path: &Path) -> bool {
    naming::is_valid_csr_file_name(&naming::file_name(path))
}

pub(crate) fn is_cert_file(path: &Path) -> bool {
    naming::is_valid_cert_file_name(&naming::file_name(path))
}

/// Build the view of a CSR found in `user_dir` (or one of its state
/// subdirectories).
pub(crate) fn request_view(fs: &dyn Filesystem, path: &Path, user_dir: &Path, state: CsrState) -> CertificateRequest {
    let file_name = naming::file_name(path);
    let reqrenew = user_dir
        .join(CERTS_DIR)
        .join(naming::cert_file_for_csr(&file_name) + naming::REQRENEW_SUFFIX);
    let renewed = naming::marker(path, naming::RENEWED_SUFFIX);

    CertificateRequest {
        user_name: naming::file_name(user_dir),
        csr_info: fs.read(path).ok().and_then(|pem| inspect::csr_subject(&pem)),
        last_modified: last_modified(fs, path),
        last_renewed: fs
            .is_file(&renewed)
            .then(|| last_modified(fs, &renewed))
            .flatten(),
        renewal_requested: fs.is_file(&reqrenew),
        csr_file: path.to_path_buf(),
        file_name,
        state,
    }
}

/// `true` iff the originating CSR carries a `.renewed` marker that is newer
/// than the certificate's latest `.reqrenew` marker (or there is none).
pub(crate) fn is_cert_renewed(fs: &dyn Filesystem, cert: &Path) -> std::io::Result<bool> {
    let Some(user_dir) = cert.parent().and_then(Path::parent) else {
        return Ok(false);
    };
    let csr_name = naming::csr_file_for_cert(&naming::file_name(cert));
    let renewed = user_dir
        .join("accepted")
        .join(csr_name + naming::RENEWED_SUFFIX);
    let reqrenew = naming::marker(cert, naming::REQRENEW_SUFFIX);

    if !fs.is_file(&renewed) {
        return Ok(false);
    }
    if !fs.is_file(&reqrenew) {
        return Ok(true);
    }

    Ok(fs.modified(&renewed)? > fs.modified(&reqrenew)?)
}

/// Build the view of a certificate found in `<user_dir>/{certs,revoked}`.
pub(crate) fn cert_view(fs: &dyn Filesystem, path: &Path, user_dir: &Path) -> CertInfo {
    let renewed = match is_cert_renewed(fs, path) {
        Ok(renewed) => renewed,
        Err(e) => {
            tracing::warn!(path = %path.display(), "Unable to determine renewed state: {e}");
            false
        }
    };

    CertInfo {
        user_name: naming::file_name(user_dir),
        file_name: naming::file_name(path),
        cert_file: path.to_path_buf(),
        last_modified: last_modified(fs, path),
        renewal_requested: fs.is_file(&naming::marker(path, naming::REQRENEW_SUFFIX)),
        renewed,
    }
}
