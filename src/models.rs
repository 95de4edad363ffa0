// SPDX-License-Identifier: EUPL-1.2

//! Domain views and request bodies.
//!
//! Every view is derived from the storage tree on each call; nothing here
//! is persisted.

use std::path::PathBuf;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Positional state of a CSR: which directory it lives in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum CsrState {
    Pending,
    Accepted,
    Rejected,
}

impl CsrState {
    pub const ALL: [CsrState; 3] = [CsrState::Pending, CsrState::Accepted, CsrState::Rejected];

    /// Subdirectory below the user directory; pending requests live at the root.
    pub fn subdir(self) -> Option<&'static str> {
        match self {
            CsrState::Pending => None,
            CsrState::Accepted => Some("accepted"),
            CsrState::Rejected => Some("rejected"),
        }
    }
}

/// A certificate signing request of a user.
#[derive(Debug, Clone, Serialize)]
pub struct CertificateRequest {
    pub user_name: String,
    pub file_name: String,
    pub csr_file: PathBuf,
    pub state: CsrState,
    /// Subject DN, when the file parses.
    pub csr_info: Option<String>,
    pub last_modified: Option<DateTime<Utc>>,
    /// Timestamp of the `.renewed` marker.
    pub last_renewed: Option<DateTime<Utc>>,
    /// A `.reqrenew` marker sits next to the signed certificate.
    pub renewal_requested: bool,
}

/// An issued (or revoked) certificate of a user.
#[derive(Debug, Clone, Serialize)]
pub struct CertInfo {
    pub user_name: String,
    pub file_name: String,
    pub cert_file: PathBuf,
    pub last_modified: Option<DateTime<Utc>>,
    pub renewal_requested: bool,
    pub renewed: bool,
}

/// Team metadata stored in `appdetails.properties`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct AppDetails {
    pub team_name: Option<String>,
    pub team_contact: Option<String>,
}

/// Key/CSR/certificate bundle of a shared application.
#[derive(Debug, Clone, Serialize)]
pub struct SharedApp {
    pub name: String,
    pub key_file: Option<PathBuf>,
    pub csr_file: Option<PathBuf>,
    pub cert_file: Option<PathBuf>,
    pub key_last_modified: Option<DateTime<Utc>>,
    pub csr_last_modified: Option<DateTime<Utc>>,
    pub cert_last_modified: Option<DateTime<Utc>>,
    pub cert_valid_to: Option<DateTime<Utc>>,
    pub csr_info: Option<String>,
    pub renewal_requested: bool,
    pub details: Option<AppDetails>,
}

// ── Request bodies ────────────────────────────────────────────────────────────

/// Body for `POST /csr`.
#[derive(Debug, Deserialize)]
pub struct UploadCsrRequest {
    /// Defaults to `<user>.csr.pem`.
    pub file_name: Option<String>,
    pub csr: String,
}

/// Body for renewal requests.
#[derive(Debug, Deserialize)]
pub struct RenewalRequest {
    pub file_name: String,
}

/// Body for accept/reject of a user CSR.
#[derive(Debug, Deserialize)]
pub struct UserCsrAction {
    pub user_name: String,
    pub file_name: String,
}

/// Body for workspace-backed operations on a user certificate.
#[derive(Debug, Deserialize)]
pub struct UserCertOperation {
    pub user_name: String,
    pub file_name: String,
    pub crypt_password: String,
    pub key_password: String,
}

/// Body for `POST /apps`.
#[derive(Debug, Deserialize)]
pub struct CreateAppRequest {
    pub app_name: String,
    pub team_name: Option<String>,
    pub team_contact: Option<String>,
}

/// Body for workspace-backed operations on a shared application.
#[derive(Debug, Deserialize)]
pub struct AppCertOperation {
    pub file_name: String,
    pub crypt_password: String,
    pub key_password: String,
}
