// SPDX-License-Identifier: EUPL-1.2

//! The per-user view of the storage tree.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::SystemTime;

use crate::{
    error::CscError,
    fs::Filesystem,
    models::{CertInfo, CertificateRequest, CsrState},
    store::{cert_view, inspect, is_cert_file, is_csr_file, naming, request_view, Layout},
};

/// What a single user sees and may change about their own requests.
pub struct UserStore {
    fs: Arc<dyn Filesystem>,
    layout: Layout,
    crl_path: PathBuf,
}

impl UserStore {
    pub fn new(fs: Arc<dyn Filesystem>, layout: Layout, crl_path: impl Into<PathBuf>) -> Self {
        Self {
            fs,
            layout,
            crl_path: crl_path.into(),
        }
    }

    pub fn find_pending(&self, user: &str) -> Vec<CertificateRequest> {
        self.find_requests(user, CsrState::Pending)
    }

    pub fn find_accepted(&self, user: &str) -> Vec<CertificateRequest> {
        self.find_requests(user, CsrState::Accepted)
    }

    pub fn find_rejected(&self, user: &str) -> Vec<CertificateRequest> {
        self.find_requests(user, CsrState::Rejected)
    }

    fn find_requests(&self, user: &str, state: CsrState) -> Vec<CertificateRequest> {
        let user_dir = self.layout.user_dir(user);
        let dir = self.layout.csr_dir(user, state);

        match self.fs.find(&dir, 1, &is_csr_file) {
            Ok(files) => files
                .iter()
                .map(|p| request_view(self.fs.as_ref(), p, &user_dir, state))
                .collect(),
            Err(e) => {
                tracing::debug!(%user, ?state, "No certificate requests: {e}");
                Vec::new()
            }
        }
    }

    pub fn find_certificates(&self, user: &str) -> Vec<CertInfo> {
        let user_dir = self.layout.user_dir(user);

        match self.fs.find(&self.layout.certs_dir(user), 1, &is_cert_file) {
            Ok(files) => files
                .iter()
                .map(|p| cert_view(self.fs.as_ref(), p, &user_dir))
                .collect(),
            Err(e) => {
                tracing::debug!(%user, "No certificates: {e}");
                Vec::new()
            }
        }
    }

    /// Store an uploaded CSR as a new pending request.
    ///
    /// Refuses invalid names, content that is not a PKCS#10 request, and
    /// overwriting a request that is already pending.
    pub fn save_uploaded_csr(&self, user: &str, file_name: &str, pem: &str) -> Result<PathBuf, CscError> {
        naming::validate_segment("user name", user)?;
        let file_name = naming::validate_segment("file name", naming::normalize_file_name(file_name))?;
        if !naming::is_valid_csr_file_name(file_name) {
            return Err(CscError::Validation(format!(
                "'{file_name}' is not a request file (*.pem, *.csr)"
            )));
        }
        if !inspect::is_csr_pem(pem.as_bytes()) {
            return Err(CscError::Validation("Invalid CSR File!".into()));
        }

        let user_dir = self.layout.user_dir(user);
        let target = user_dir.join(file_name);
        if self.fs.exists(&target) {
            return Err(CscError::Duplicate(format!("Request-File already exists: {file_name}")));
        }

        self.fs.create_dirs(&user_dir)?;
        self.fs.write(&target, pem.as_bytes())?;
        tracing::info!(%user, %file_name, "Received certificate request");
        Ok(target)
    }

    /// Create or refresh `<cert>.reqrenew`.
    pub fn request_renewal(&self, user: &str, cert_file_name: &str) -> Result<PathBuf, CscError> {
        let cert = self.certificate_file(user, cert_file_name)?;
        let marker = naming::marker(&cert, naming::REQRENEW_SUFFIX);
        self.fs.touch(&marker, SystemTime::now())?;
        Ok(marker)
    }

    /// An active certificate of `user`, for download or renewal.
    pub fn certificate_file(&self, user: &str, file_name: &str) -> Result<PathBuf, CscError> {
        naming::validate_segment("user name", user)?;
        let file_name = naming::validate_segment("file name", naming::normalize_file_name(file_name))?;
        if !naming::is_valid_cert_file_name(file_name) {
            return Err(CscError::Validation(format!("'{file_name}' is not a certificate file")));
        }

        let cert = self.layout.certs_dir(user).join(file_name);
        if self.fs.is_file(&cert) {
            Ok(cert)
        } else {
            Err(CscError::NotFound(format!("certificate {file_name}")))
        }
    }

    pub fn ca_certificate(&self) -> PathBuf {
        self.layout.ca_cert()
    }

    pub fn revocation_list(&self) -> PathBuf {
        self.crl_path.clone()
    }
}
