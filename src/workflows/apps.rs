// SPDX-License-Identifier: EUPL-1.2

//! Shared application workflows.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use crate::{
    audit::{self, AuditEvent},
    coordinator::WorkflowCoordinator,
    crypto::CryptoGateway,
    error::CscError,
    models::AppDetails,
    store::{naming, SharedAppStore},
    workflows::{operation, Passwords},
    workspace::{Workspace, INTAKE_DIR},
};

pub struct AppWorkflows {
    coordinator: Arc<WorkflowCoordinator>,
    store: Arc<SharedAppStore>,
    crypto: Arc<dyn CryptoGateway>,
}

/// `billing.crt.pem` → `billing.csr.pem`
fn csr_for_cert(cert_file_name: &str) -> String {
    cert_file_name.replace("crt.pem", "csr.pem")
}

impl AppWorkflows {
    pub fn new(
        coordinator: Arc<WorkflowCoordinator>,
        store: Arc<SharedAppStore>,
        crypto: Arc<dyn CryptoGateway>,
    ) -> Self {
        Self {
            coordinator,
            store,
            crypto,
        }
    }

    fn issue(&self, ws: &dyn Workspace, app: &str, csr: &Path, key_password: &str) -> Result<PathBuf, CscError> {
        let intake = Path::new(INTAKE_DIR).join(naming::file_name(csr));
        let imported = ws.import_file(csr, &intake)?;
        let cert = self.crypto.sign(ws.root(), &imported, key_password)?;
        ws.export_certificate(&self.store.app_dir(app), &cert)
    }

    /// Create key, CSR and details of a new application. Returns the key
    /// password, which is not stored anywhere.
    pub fn create(&self, app: &str, details: &AppDetails, operator: &str) -> Result<String, CscError> {
        let app = naming::validate_app_name(app)?;
        let details = AppDetails {
            team_name: blank_to_none(details.team_name.as_deref()),
            team_contact: blank_to_none(details.team_contact.as_deref()),
        };
        if let Some(contact) = &details.team_contact {
            if !naming::is_valid_contact(contact) {
                return Err(CscError::Validation(format!("invalid contact address '{contact}'")));
            }
        }

        let password = self.coordinator.exclusive(operation::CREATE_APP, || {
            if self.store.exists(app) {
                return Err(CscError::Duplicate(format!("application {app} already exists")));
            }
            self.build_app(app, &details).inspect_err(|e| {
                tracing::warn!(%app, "Creating application failed, removing it: {e}");
                if let Err(cleanup) = self.store.remove_app(app) {
                    tracing::error!(%app, "Partial application left behind: {cleanup}");
                }
            })
        })?;

        audit::record(
            operator,
            AuditEvent::CreatedApp {
                app,
                team: details.team_name.as_deref(),
            },
        );
        Ok(password)
    }

    fn build_app(&self, app: &str, details: &AppDetails) -> Result<String, CscError> {
        let password = self.store.create_app_key(app)?;
        self.store.create_csr(app, &password)?;
        self.store.create_app_details(app, details)?;
        Ok(password)
    }

    pub fn sign(&self, app: &str, csr_file_name: &str, passwords: &Passwords, operator: &str) -> Result<PathBuf, CscError> {
        self.store.app_file(app, csr_file_name)?;

        let cert = self.coordinator.run(operator, &passwords.crypt, operation::SIGN_APP, |ws| {
            let csr = self.store.require_app_file(app, csr_file_name)?;
            self.issue(ws, app, &csr, &passwords.key)
        })?;

        audit::record(operator, AuditEvent::SignedAppCsr { app });
        Ok(cert)
    }

    /// Revoke the certificate and sign the app's CSR again.
    pub fn renew(&self, app: &str, cert_file_name: &str, passwords: &Passwords, operator: &str) -> Result<PathBuf, CscError> {
        let cert = self.coordinator.run(operator, &passwords.crypt, operation::RENEW_APP, |ws| {
            let old = self.store.require_app_file(app, cert_file_name)?;
            let csr = self.store.require_app_file(app, &csr_for_cert(cert_file_name))?;

            self.crypto.revoke(ws.root(), &old, &passwords.key)?;
            self.store.delete_app_file(app, cert_file_name)?;

            let cert = self.issue(ws, app, &csr, &passwords.key)?;
            self.store
                .delete_app_file(app, &format!("{cert_file_name}{}", naming::REQRENEW_SUFFIX))?;
            Ok(cert)
        })?;

        audit::record(operator, AuditEvent::RenewedAppCert { app });
        Ok(cert)
    }

    pub fn revoke(&self, app: &str, cert_file_name: &str, passwords: &Passwords, operator: &str) -> Result<(), CscError> {
        self.coordinator.run(operator, &passwords.crypt, operation::REVOKE_APP, |ws| {
            let cert = self.store.require_app_file(app, cert_file_name)?;
            self.crypto.revoke(ws.root(), &cert, &passwords.key)?;
            self.store.delete_app_file(app, cert_file_name)?;
            Ok(())
        })?;

        audit::record(operator, AuditEvent::RevokedAppCert { app });
        Ok(())
    }

    pub fn request_renewal(&self, app: &str, cert_file_name: &str, operator: &str) -> Result<PathBuf, CscError> {
        let marker = self.store.request_renewal(app, cert_file_name)?;
        audit::record(operator, AuditEvent::RequestedAppRenewal { app });
        Ok(marker)
    }
}

fn blank_to_none(value: Option<&str>) -> Option<String> {
    value.map(str::trim).filter(|v| !v.is_empty()).map(str::to_string)
}
