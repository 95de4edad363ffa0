// SPDX-License-Identifier: EUPL-1.2

//! End-to-end operator workflows, one module per lock domain.

pub mod apps;
pub mod user;

use std::fmt;

pub use apps::AppWorkflows;
pub use user::UserWorkflows;

/// Operation names; they end up in commit messages.
pub mod operation {
    pub const SIGN_USER: &str = "Signed User-Certificate";
    pub const RENEW_USER: &str = "Renew User-Certificate";
    pub const REVOKE_USER: &str = "Revoked User-Certificate";
    pub const ACCEPT_USER: &str = "Accepted User-CSR";
    pub const REJECT_USER: &str = "Rejected User-CSR";
    pub const CREATE_APP: &str = "Created App";
    pub const SIGN_APP: &str = "Signed App-Certificate";
    pub const RENEW_APP: &str = "Renewed App-Certificate";
    pub const REVOKE_APP: &str = "Revoked App-Certificate";
}

/// Passwords an operator supplies for a workspace-backed workflow.
#[derive(Clone)]
pub struct Passwords {
    /// Symmetric password of the repository contents.
    pub crypt: String,
    /// Passphrase of the CA signing key.
    pub key: String,
}

impl fmt::Debug for Passwords {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Passwords")
            .field("crypt", &"<redacted>")
            .field("key", &"<redacted>")
            .finish()
    }
}
