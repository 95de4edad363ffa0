// SPDX-License-Identifier: EUPL-1.2

//! User certificate workflows: sign, renew, revoke, accept, reject.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use crate::{
    audit::{self, AuditEvent},
    coordinator::WorkflowCoordinator,
    crypto::CryptoGateway,
    error::CscError,
    store::{naming, AdminStore},
    workflows::{operation, Passwords},
    workspace::{Workspace, INTAKE_DIR},
};

pub struct UserWorkflows {
    coordinator: Arc<WorkflowCoordinator>,
    store: Arc<AdminStore>,
    crypto: Arc<dyn CryptoGateway>,
}

impl UserWorkflows {
    pub fn new(
        coordinator: Arc<WorkflowCoordinator>,
        store: Arc<AdminStore>,
        crypto: Arc<dyn CryptoGateway>,
    ) -> Self {
        Self {
            coordinator,
            store,
            crypto,
        }
    }

    /// Import `csr` into the intake directory, sign it and copy the new
    /// certificate into the user's `certs/`.
    fn issue(&self, ws: &dyn Workspace, user: &str, csr: &Path, key_password: &str) -> Result<PathBuf, CscError> {
        let intake = Path::new(INTAKE_DIR).join(naming::file_name(csr));
        let imported = ws.import_file(csr, &intake)?;
        let cert = self.crypto.sign(ws.root(), &imported, key_password)?;
        ws.export_certificate(&self.store.layout().certs_dir(user), &cert)
    }

    /// Sign a pending (or re-sign an accepted) request. The request moves to
    /// `accepted/` only once the signed state is published.
    pub fn sign(&self, user: &str, file_name: &str, passwords: &Passwords, operator: &str) -> Result<PathBuf, CscError> {
        let user = &checked_user(user)?;
        self.store.csr_for_signing(user, file_name)?;

        let cert = self.coordinator.run_then(
            operator,
            &passwords.crypt,
            operation::SIGN_USER,
            |ws| {
                let csr = self.store.csr_for_signing(user, file_name)?;
                self.issue(ws, user, &csr, &passwords.key)
            },
            |cert| {
                self.store.accept(user, file_name)?;
                Ok(cert)
            },
        )?;

        audit::record(operator, AuditEvent::SignedCsr { user, file: file_name });
        Ok(cert)
    }

    /// Revoke the current certificate of an accepted request and issue a new
    /// one from the same request.
    pub fn renew(&self, user: &str, file_name: &str, passwords: &Passwords, operator: &str) -> Result<PathBuf, CscError> {
        let user = &checked_user(user)?;
        naming::validate_segment("file name", file_name)?;

        let cert = self.coordinator.run(operator, &passwords.crypt, operation::RENEW_USER, |ws| {
            let old = self.store.require_cert_for_request(user, file_name)?;
            let csr = self.store.require_accepted_csr(user, file_name)?;

            self.crypto.revoke(ws.root(), &old, &passwords.key)?;
            self.store.flag_revoked(user, file_name)?;

            let cert = self.issue(ws, user, &csr, &passwords.key)?;
            self.store.flag_renewed(&csr)?;
            Ok(cert)
        })?;

        audit::record(operator, AuditEvent::RenewedCert { user, file: file_name });
        Ok(cert)
    }

    /// Revoke the certificate of a request and reject the request.
    pub fn revoke(&self, user: &str, file_name: &str, passwords: &Passwords, operator: &str) -> Result<PathBuf, CscError> {
        let user = &checked_user(user)?;
        naming::validate_segment("file name", file_name)?;

        let revoked = self.coordinator.run(operator, &passwords.crypt, operation::REVOKE_USER, |ws| {
            self.store.revocable_request(user, file_name)?;
            let cert = self.store.require_cert_for_request(user, file_name)?;
            self.crypto.revoke(ws.root(), &cert, &passwords.key)?;
            self.store.flag_revoked_and_reject(user, file_name)
        })?;

        audit::record(operator, AuditEvent::RevokedCert { user, file: file_name });
        Ok(revoked)
    }

    pub fn accept(&self, user: &str, file_name: &str, operator: &str) -> Result<PathBuf, CscError> {
        let user = &checked_user(user)?;
        let path = self
            .coordinator
            .exclusive(operation::ACCEPT_USER, || self.store.accept(user, file_name))?;
        audit::record(operator, AuditEvent::AcceptedCsr { user, file: file_name });
        Ok(path)
    }

    pub fn reject(&self, user: &str, file_name: &str, operator: &str) -> Result<PathBuf, CscError> {
        let user = &checked_user(user)?;
        let path = self
            .coordinator
            .exclusive(operation::REJECT_USER, || self.store.reject(user, file_name))?;
        audit::record(operator, AuditEvent::RejectedCsr { user, file: file_name });
        Ok(path)
    }
}

/// Operators may name a user by login (`alice@example.org`); storage uses
/// the normalized form.
fn checked_user(user: &str) -> Result<String, CscError> {
    let user = naming::normalize_user_name(user);
    naming::validate_segment("user name", &user)?;
    Ok(user)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::coordinator::Domain;
    use crate::fs::{Filesystem, LocalFs};
    use crate::store::{Layout, UserStore};
    use crate::testing::{FakeCrypto, FakeRepository};
    use crate::workspace::GitWorkspace;
    use std::fs;
    use std::time::{Duration, SystemTime};

    struct Harness {
        dir: tempfile::TempDir,
        repo: Arc<FakeRepository>,
        crypto: Arc<FakeCrypto>,
        coordinator: Arc<WorkflowCoordinator>,
        workflows: UserWorkflows,
        users: UserStore,
    }

    fn harness() -> Harness {
        let dir = tempfile::tempdir().unwrap();
        let layout = Layout::new(dir.path());
        let fs = Arc::new(LocalFs);
        let repo = Arc::new(FakeRepository::default());
        let crypto = Arc::new(FakeCrypto::default());
        let ws = Arc::new(GitWorkspace::new(
            layout.user_workspace(),
            repo.clone(),
            crypto.clone(),
            fs.clone(),
        ));
        let coordinator = Arc::new(WorkflowCoordinator::new(Domain::UserCertificates, ws));
        let admin = Arc::new(AdminStore::new(fs.clone(), layout.clone()));
        let workflows = UserWorkflows::new(coordinator.clone(), admin, crypto.clone());
        let users = UserStore::new(fs, layout, dir.path().join("crl.pem"));

        Harness {
            dir,
            repo,
            crypto,
            coordinator,
            workflows,
            users,
        }
    }

    fn passwords() -> Passwords {
        Passwords {
            crypt: "crypt".into(),
            key: "key".into(),
        }
    }

    impl Harness {
        fn path(&self, rel: &str) -> PathBuf {
            self.dir.path().join(rel)
        }

        fn upload(&self, user: &str, name: &str) {
            let dir = self.path(&format!("users/{user}"));
            fs::create_dir_all(&dir).unwrap();
            fs::write(dir.join(name), "csr").unwrap();
        }
    }

    #[test]
    fn accept_then_sign_issues_certificate() {
        let h = harness();
        h.upload("alice", "alice.csr.pem");

        h.workflows.accept("alice", "alice.csr.pem", "admin").unwrap();
        let cert = h
            .workflows
            .sign("alice", "alice.csr.pem", &passwords(), "admin")
            .unwrap();

        assert_eq!(cert, h.path("users/alice/certs/alice.crt.pem"));
        assert_eq!(h.repo.commits(), vec!["Signed User-Certificate - done by: admin".to_string()]);
        assert_eq!(h.repo.push_count(), 1);
        assert!(h.path("users/alice/accepted/alice.csr.pem").is_file());
        assert!(!h.path("users/alice/alice.csr.pem").exists());
        assert!(h.path("cert-repo/intermediate/csr/alice.csr.pem").is_file());

        let calls = h.crypto.calls();
        let sign = calls.iter().position(|c| c == "sign:alice.csr.pem").unwrap();
        assert!(calls[..sign].iter().any(|c| c.starts_with("decrypt:")));
        assert!(calls[sign..].iter().any(|c| c == "encrypt:alice.crt.pem"));

        let certs = h.users.find_certificates("alice");
        assert_eq!(certs.len(), 1);
        assert!(!certs[0].renewal_requested);
        assert!(!h.coordinator.is_busy());
    }

    #[test]
    fn signing_pending_request_accepts_it() {
        let h = harness();
        h.upload("bob", "laptop.csr.pem");

        h.workflows.sign("bob", "laptop.csr.pem", &passwords(), "admin").unwrap();

        assert!(h.path("users/bob/accepted/laptop.csr.pem").is_file());
        assert!(h.path("users/bob/certs/laptop.crt.pem").is_file());
    }

    #[test]
    fn failed_push_leaves_request_pending() {
        let h = harness();
        h.upload("alice", "alice.csr.pem");
        h.repo.fail_push();

        let err = h
            .workflows
            .sign("alice", "alice.csr.pem", &passwords(), "admin")
            .unwrap_err();

        assert!(matches!(err, CscError::PushFailed { .. }));
        assert!(h.path("users/alice/alice.csr.pem").is_file());
        assert!(!h.path("users/alice/accepted/alice.csr.pem").exists());
        assert!(!h.coordinator.is_busy());
    }

    #[test]
    fn unknown_request_fails_before_workspace() {
        let h = harness();

        let err = h
            .workflows
            .sign("alice", "ghost.csr.pem", &passwords(), "admin")
            .unwrap_err();

        assert!(matches!(err, CscError::NotFound(_)));
        assert_eq!(h.repo.clone_count(), 0);
    }

    #[test]
    fn renew_replaces_certificate_and_flags_request() {
        let h = harness();
        h.upload("alice", "alice.csr.pem");
        h.workflows.sign("alice", "alice.csr.pem", &passwords(), "admin").unwrap();

        let marker = h.users.request_renewal("alice", "alice.crt.pem").unwrap();
        LocalFs
            .set_modified(&marker, SystemTime::now() - Duration::from_secs(60))
            .unwrap();
        assert!(h.users.find_certificates("alice")[0].renewal_requested);

        h.workflows.renew("alice", "alice.csr.pem", &passwords(), "admin").unwrap();

        assert!(h.path("users/alice/revoked/alice.crt.pem").is_file());
        assert!(h.path("users/alice/certs/alice.crt.pem").is_file());
        assert!(h.path("users/alice/accepted/alice.csr.pem.renewed").is_file());
        assert!(!marker.exists());
        assert!(h.crypto.calls().contains(&"revoke:alice.crt.pem".to_string()));
        assert_eq!(
            h.repo.commits().last().map(String::as_str),
            Some("Renew User-Certificate - done by: admin")
        );

        let certs = h.users.find_certificates("alice");
        assert_eq!(certs.len(), 1);
        assert!(certs[0].renewed);
        assert!(!certs[0].renewal_requested);
    }

    #[test]
    fn revoke_moves_certificate_and_rejects_request() {
        let h = harness();
        h.upload("alice", "alice.csr.pem");
        h.workflows.sign("alice", "alice.csr.pem", &passwords(), "admin").unwrap();

        let revoked = h
            .workflows
            .revoke("alice", "alice.csr.pem", &passwords(), "admin")
            .unwrap();

        assert_eq!(revoked, h.path("users/alice/revoked/alice.crt.pem"));
        assert!(h.users.find_certificates("alice").is_empty());
        assert_eq!(h.users.find_rejected("alice").len(), 1);
        assert!(h.users.find_accepted("alice").is_empty());
    }

    #[test]
    fn revoke_without_certificate_is_inconsistent_and_unpublished() {
        let h = harness();
        h.upload("alice", "alice.csr.pem");
        h.workflows.accept("alice", "alice.csr.pem", "admin").unwrap();

        let err = h
            .workflows
            .revoke("alice", "alice.csr.pem", &passwords(), "admin")
            .unwrap_err();

        assert!(matches!(err, CscError::Inconsistent(_)));
        assert!(h.repo.commits().is_empty());
        assert!(!h.crypto.calls().iter().any(|c| c.starts_with("revoke:")));
        assert!(!h.coordinator.is_busy());
    }

    #[test]
    fn traversing_file_name_is_refused_before_workspace() {
        let h = harness();
        h.upload("alice", "alice.csr.pem");
        h.workflows.sign("alice", "alice.csr.pem", &passwords(), "admin").unwrap();
        let clones = h.repo.clone_count();

        for result in [
            h.workflows.revoke("alice", "../certs/alice.csr.pem", &passwords(), "admin"),
            h.workflows.renew("alice", "../certs/alice.csr.pem", &passwords(), "admin"),
            h.workflows.revoke("../alice", "alice.csr.pem", &passwords(), "admin"),
        ] {
            assert!(matches!(result, Err(CscError::Validation(_))));
        }

        assert_eq!(h.repo.clone_count(), clones);
        assert!(!h.crypto.calls().iter().any(|c| c.starts_with("revoke:")));
        assert!(h.path("users/alice/certs/alice.crt.pem").is_file());
        assert!(!h.path("users/alice/revoked").exists());
        assert_eq!(h.repo.commits().len(), 1);
    }

    #[test]
    fn login_names_resolve_to_normalized_user() {
        let h = harness();
        h.upload("alice_example.org", "alice.csr.pem");

        let cert = h
            .workflows
            .sign("alice@example.org", "alice.csr.pem", &passwords(), "admin")
            .unwrap();
        assert_eq!(cert, h.path("users/alice_example.org/certs/alice.crt.pem"));

        h.workflows
            .revoke("alice@example.org", "alice.csr.pem", &passwords(), "admin")
            .unwrap();
        assert_eq!(h.users.find_rejected("alice_example.org").len(), 1);
    }

    #[test]
    fn signed_request_is_not_rejected_without_revocation() {
        let h = harness();
        h.upload("alice", "alice.csr.pem");
        h.workflows.sign("alice", "alice.csr.pem", &passwords(), "admin").unwrap();

        let err = h.workflows.reject("alice", "alice.csr.pem", "admin").unwrap_err();

        assert!(matches!(err, CscError::Validation(_)));
        assert!(h.path("users/alice/accepted/alice.csr.pem").is_file());
        assert!(h.path("users/alice/certs/alice.crt.pem").is_file());
        h.workflows.renew("alice", "alice.csr.pem", &passwords(), "admin").unwrap();
    }

    #[test]
    fn revoke_of_pending_request_touches_nothing() {
        let h = harness();
        h.upload("alice", "alice.csr.pem");
        fs::create_dir_all(h.path("users/alice/certs")).unwrap();
        fs::write(h.path("users/alice/certs/alice.crt.pem"), "cert").unwrap();

        let err = h
            .workflows
            .revoke("alice", "alice.csr.pem", &passwords(), "admin")
            .unwrap_err();

        assert!(matches!(err, CscError::Inconsistent(_)));
        assert!(!h.crypto.calls().iter().any(|c| c.starts_with("revoke:")));
        assert!(h.path("users/alice/certs/alice.crt.pem").is_file());
        assert!(h.repo.commits().is_empty());
    }

    #[test]
    fn reject_pending_request() {
        let h = harness();
        h.upload("carol", "carol.csr.pem");

        h.workflows.reject("carol", "carol.csr.pem", "admin").unwrap();

        assert!(h.users.find_pending("carol").is_empty());
        assert_eq!(h.users.find_rejected("carol").len(), 1);
        assert_eq!(h.repo.clone_count(), 0);
    }
}
