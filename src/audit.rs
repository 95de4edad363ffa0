// SPDX-License-Identifier: EUPL-1.2

//! Audit trail of operator actions.
//!
//! Entries are `tracing` events on the `audit` target, so they can be routed
//! separately with e.g. `RUST_LOG=audit=info`.

use std::fmt;

pub const TARGET: &str = "audit";

/// A security-relevant action and its subject.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuditEvent<'a> {
    AcceptedCsr { user: &'a str, file: &'a str },
    SignedCsr { user: &'a str, file: &'a str },
    RejectedCsr { user: &'a str, file: &'a str },
    RevokedCert { user: &'a str, file: &'a str },
    RenewedCert { user: &'a str, file: &'a str },
    RequestedRenewal { user: &'a str, file: &'a str },
    CreatedApp { app: &'a str, team: Option<&'a str> },
    SignedAppCsr { app: &'a str },
    RequestedAppRenewal { app: &'a str },
    RenewedAppCert { app: &'a str },
    RevokedAppCert { app: &'a str },
}

impl AuditEvent<'_> {
    pub fn name(&self) -> &'static str {
        match self {
            AuditEvent::AcceptedCsr { .. } => "csr_accepted",
            AuditEvent::SignedCsr { .. } => "csr_signed",
            AuditEvent::RejectedCsr { .. } => "csr_rejected",
            AuditEvent::RevokedCert { .. } => "cert_revoked",
            AuditEvent::RenewedCert { .. } => "cert_renewed",
            AuditEvent::RequestedRenewal { .. } => "renewal_requested",
            AuditEvent::CreatedApp { .. } => "app_created",
            AuditEvent::SignedAppCsr { .. } => "app_csr_signed",
            AuditEvent::RequestedAppRenewal { .. } => "app_renewal_requested",
            AuditEvent::RenewedAppCert { .. } => "app_cert_renewed",
            AuditEvent::RevokedAppCert { .. } => "app_cert_revoked",
        }
    }
}

impl fmt::Display for AuditEvent<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AuditEvent::AcceptedCsr { user, file } => write!(f, "ACCEPTED CSR '{file}' of user '{user}'"),
            AuditEvent::SignedCsr { user, file } => write!(f, "SIGNED CSR '{file}' of user '{user}'"),
            AuditEvent::RejectedCsr { user, file } => write!(f, "REJECTED CSR '{file}' of user '{user}'"),
            AuditEvent::RevokedCert { user, file } => write!(f, "REVOKED Cert '{file}' of user '{user}'"),
            AuditEvent::RenewedCert { user, file } => write!(f, "RENEWED Cert '{file}' of user '{user}'"),
            AuditEvent::RequestedRenewal { user, file } => {
                write!(f, "REQUESTED RENEWAL of Cert '{file}' of user '{user}'")
            }
            AuditEvent::CreatedApp { app, team } => {
                write!(f, "CREATED APP/CSR '{app}' for team '{}'", team.unwrap_or("-"))
            }
            AuditEvent::SignedAppCsr { app } => write!(f, "SIGNED APP-CSR '{app}'"),
            AuditEvent::RequestedAppRenewal { app } => write!(f, "REQUESTED RENEWAL for APP '{app}'"),
            AuditEvent::RenewedAppCert { app } => write!(f, "RENEWED Cert for APP '{app}'"),
            AuditEvent::RevokedAppCert { app } => write!(f, "REVOKED Cert for APP '{app}'"),
        }
    }
}

/// Emit `event` as performed by `operator`.
pub fn record(operator: &str, event: AuditEvent<'_>) {
    tracing::info!(
        target: TARGET,
        event = event.name(),
        %operator,
        "Operator '{operator}' {event}"
    );
}
