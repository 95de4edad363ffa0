// SPDX-License-Identifier: EUPL-1.2

//! Operator view of the user domain and the CSR state transitions.
//!
//! A request lives in exactly one of `users/<u>/`, `users/<u>/accepted/`
//! and `users/<u>/rejected/`. Every transition moves the file and then
//! drops stale copies of the same name from the other two locations.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::SystemTime;

use crate::{
    error::CscError,
    fs::Filesystem,
    models::{CertInfo, CertificateRequest, CsrState},
    store::{cert_view, is_cert_file, is_csr_file, naming, request_view, Layout, CERTS_DIR, REVOKED_DIR},
};

const PENDING_SCAN_DEPTH: usize = 2;
const STATE_SCAN_DEPTH: usize = 3;

pub struct AdminStore {
    fs: Arc<dyn Filesystem>,
    layout: Layout,
}

impl AdminStore {
    pub fn new(fs: Arc<dyn Filesystem>, layout: Layout) -> Self {
        Self { fs, layout }
    }

    pub fn layout(&self) -> &Layout {
        &self.layout
    }

    // ── Listings ──────────────────────────────────────────────────────────────

    /// Pending requests of every user.
    pub fn find_pending_requests(&self) -> Vec<CertificateRequest> {
        let users_dir = self.layout.users_dir();
        let matcher = |p: &Path| {
            is_csr_file(p) && p.parent().and_then(Path::parent) == Some(users_dir.as_path())
        };

        self.scan(&users_dir, PENDING_SCAN_DEPTH, &matcher)
            .iter()
            .filter_map(|p| {
                let user_dir = p.parent()?;
                Some(request_view(self.fs.as_ref(), p, user_dir, CsrState::Pending))
            })
            .collect()
    }

    /// Accepted (signed) requests of every user.
    pub fn find_signed_requests(&self) -> Vec<CertificateRequest> {
        let matcher = |p: &Path| is_csr_file(p) && naming::parent_is(p, "accepted");

        self.scan(&self.layout.users_dir(), STATE_SCAN_DEPTH, &matcher)
            .iter()
            .filter_map(|p| {
                let user_dir = p.parent()?.parent()?;
                Some(request_view(self.fs.as_ref(), p, user_dir, CsrState::Accepted))
            })
            .collect()
    }

    /// Revoked certificates of every user.
    pub fn find_revoked_certificates(&self) -> Vec<CertInfo> {
        let matcher = |p: &Path| is_cert_file(p) && naming::parent_is(p, REVOKED_DIR);

        self.scan(&self.layout.users_dir(), STATE_SCAN_DEPTH, &matcher)
            .iter()
            .filter_map(|p| {
                let user_dir = p.parent()?.parent()?;
                Some(cert_view(self.fs.as_ref(), p, user_dir))
            })
            .collect()
    }

    fn scan(&self, start: &Path, depth: usize, matcher: &dyn Fn(&Path) -> bool) -> Vec<PathBuf> {
        self.fs.find(start, depth, matcher).unwrap_or_else(|e| {
            tracing::debug!(start = %start.display(), "Nothing to list: {e}");
            Vec::new()
        })
    }

    // ── Resolution ────────────────────────────────────────────────────────────

    /// Where a request of `user` currently sits, checked pending first.
    pub fn locate(&self, user: &str, file_name: &str) -> Option<(CsrState, PathBuf)> {
        CsrState::ALL.into_iter().find_map(|state| {
            let path = self.layout.csr_dir(user, state).join(file_name);
            self.fs.is_file(&path).then_some((state, path))
        })
    }

    /// The request to hand to the signer: pending or already accepted.
    pub fn csr_for_signing(&self, user: &str, file_name: &str) -> Result<PathBuf, CscError> {
        let (user, file_name) = validated(user, file_name)?;
        match self.locate(user, file_name) {
            Some((CsrState::Pending | CsrState::Accepted, path)) => Ok(path),
            Some((CsrState::Rejected, _)) => Err(CscError::Validation(format!(
                "request {file_name} of {user} was rejected"
            ))),
            None => Err(CscError::NotFound(format!("request {file_name} of {user}"))),
        }
    }

    pub fn find_accepted_csr(&self, user: &str, file_name: &str) -> Option<PathBuf> {
        let path = self.layout.csr_dir(user, CsrState::Accepted).join(file_name);
        self.fs.is_file(&path).then_some(path)
    }

    /// Accepted request or `Inconsistent`.
    pub fn require_accepted_csr(&self, user: &str, file_name: &str) -> Result<PathBuf, CscError> {
        let (user, file_name) = validated(user, file_name)?;
        self.find_accepted_csr(user, file_name).ok_or_else(|| {
            CscError::Inconsistent(format!("no accepted request {file_name} for {user}"))
        })
    }

    /// Active certificate issued for the request `csr_file_name`.
    pub fn find_cert_for_request(&self, user: &str, csr_file_name: &str) -> Option<PathBuf> {
        let cert = self
            .layout
            .certs_dir(user)
            .join(naming::cert_file_for_csr(csr_file_name));
        self.fs.is_file(&cert).then_some(cert)
    }

    /// Like [`find_cert_for_request`](Self::find_cert_for_request), but a
    /// missing certificate is inconsistent user data.
    pub fn require_cert_for_request(&self, user: &str, csr_file_name: &str) -> Result<PathBuf, CscError> {
        let (user, csr_file_name) = validated(user, csr_file_name)?;
        self.find_cert_for_request(user, csr_file_name).ok_or_else(|| {
            CscError::Inconsistent(format!(
                "no certificate {} for {user}",
                naming::cert_file_for_csr(csr_file_name)
            ))
        })
    }

    // ── Transitions ───────────────────────────────────────────────────────────

    pub fn accept(&self, user: &str, file_name: &str) -> Result<PathBuf, CscError> {
        let (user, file_name) = validated(user, file_name)?;
        match self.locate(user, file_name) {
            Some((CsrState::Pending, source)) => self.move_to(user, file_name, &source, CsrState::Accepted),
            Some((CsrState::Accepted, path)) => Ok(path),
            Some((CsrState::Rejected, _)) => Err(CscError::Validation(format!(
                "request {file_name} of {user} was rejected"
            ))),
            None => Err(CscError::NotFound(format!("request {file_name} of {user}"))),
        }
    }

    /// Only pending requests are rejected here. An accepted request leaves
    /// `accepted/` through revocation of its certificate.
    pub fn reject(&self, user: &str, file_name: &str) -> Result<PathBuf, CscError> {
        let (user, file_name) = validated(user, file_name)?;
        match self.locate(user, file_name) {
            Some((CsrState::Pending, source)) => self.move_to(user, file_name, &source, CsrState::Rejected),
            Some((CsrState::Rejected, path)) => Ok(path),
            Some((CsrState::Accepted, _)) => Err(CscError::Validation(format!(
                "request {file_name} of {user} is accepted, revoke its certificate instead"
            ))),
            None => Err(CscError::NotFound(format!("request {file_name} of {user}"))),
        }
    }

    /// The request whose certificate is about to be revoked. It must be
    /// accepted, or already rejected by an earlier revocation.
    pub fn revocable_request(&self, user: &str, file_name: &str) -> Result<(CsrState, PathBuf), CscError> {
        let (user, file_name) = validated(user, file_name)?;
        match self.locate(user, file_name) {
            Some((CsrState::Pending, _)) | None => Err(CscError::Inconsistent(format!(
                "no accepted request {file_name} for {user}"
            ))),
            Some(found) => Ok(found),
        }
    }

    fn move_to(&self, user: &str, file_name: &str, source: &Path, state: CsrState) -> Result<PathBuf, CscError> {
        let dir = self.layout.csr_dir(user, state);
        let target = dir.join(file_name);

        self.fs.create_dirs(&dir)?;
        self.fs.move_replace(source, &target)?;

        for other in CsrState::ALL.into_iter().filter(|s| *s != state) {
            let stale = self.layout.csr_dir(user, other).join(file_name);
            if self.fs.remove_if_exists(&stale)? {
                tracing::warn!(%user, %file_name, ?other, "Removed stale copy of request");
            }
        }

        tracing::debug!(%user, %file_name, ?state, "Request moved");
        Ok(target)
    }

    /// Move the certificate issued for `csr_file_name` to `revoked/` and
    /// stamp it with the revocation time.
    pub fn flag_revoked(&self, user: &str, csr_file_name: &str) -> Result<PathBuf, CscError> {
        let (user, csr_file_name) = validated(user, csr_file_name)?;
        let cert = self.require_cert_for_request(user, csr_file_name)?;
        let dir = self.layout.revoked_dir(user);
        let target = dir.join(naming::file_name(&cert));

        self.fs.create_dirs(&dir)?;
        self.fs.move_replace(&cert, &target)?;
        self.fs.set_modified(&target, SystemTime::now())?;
        self.fs
            .remove_if_exists(&naming::marker(&cert, naming::REQRENEW_SUFFIX))?;
        Ok(target)
    }

    /// Revoke the certificate and reject the request it was issued for.
    pub fn flag_revoked_and_reject(&self, user: &str, csr_file_name: &str) -> Result<PathBuf, CscError> {
        let (user, csr_file_name) = validated(user, csr_file_name)?;
        let (state, request) = self.revocable_request(user, csr_file_name)?;
        self.require_cert_for_request(user, csr_file_name)?;

        let revoked = self.flag_revoked(user, csr_file_name)?;
        if state == CsrState::Accepted {
            self.move_to(user, csr_file_name, &request, CsrState::Rejected)?;
        }
        Ok(revoked)
    }

    /// Touch `<csr>.renewed` and clear the certificate's `.reqrenew`.
    pub fn flag_renewed(&self, csr: &Path) -> Result<(), CscError> {
        self.fs.touch(&naming::marker(csr, naming::RENEWED_SUFFIX), SystemTime::now())?;

        if let Some(user_dir) = csr.parent().and_then(Path::parent) {
            let reqrenew = user_dir
                .join(CERTS_DIR)
                .join(naming::cert_file_for_csr(&naming::file_name(csr)) + naming::REQRENEW_SUFFIX);
            self.fs.remove_if_exists(&reqrenew)?;
        }
        Ok(())
    }
}

fn validated<'a>(user: &'a str, file_name: &'a str) -> Result<(&'a str, &'a str), CscError> {
    Ok((
        naming::validate_segment("user name", user)?,
        naming::validate_segment("file name", file_name)?,
    ))
}
