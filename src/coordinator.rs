// SPDX-License-Identifier: EUPL-1.2

//! Exclusive workflow coordination.
//!
//! Each domain owns one [`WorkflowCoordinator`]. A mutating workflow either
//! gets the domain lock immediately or fails with [`CscError::Busy`]; it
//! never waits. Inside the lock the workspace is rebuilt from the remote,
//! decrypted, mutated, re-encrypted and published.

use std::fmt;
use std::sync::Arc;

use parking_lot::{Mutex, MutexGuard};
use uuid::Uuid;

use crate::{error::CscError, workspace::Workspace};

/// Independent lock scopes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Domain {
    UserCertificates,
    SharedApps,
}

impl fmt::Display for Domain {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Domain::UserCertificates => "user certificates",
            Domain::SharedApps => "shared applications",
        })
    }
}

/// Non-blocking mutex; the guard releases on drop.
#[derive(Default)]
pub struct DomainLock {
    inner: Mutex<()>,
}

impl DomainLock {
    pub fn try_acquire(&self) -> Option<MutexGuard<'_, ()>> {
        self.inner.try_lock()
    }

    pub fn is_held(&self) -> bool {
        self.inner.is_locked()
    }
}

pub struct WorkflowCoordinator {
    domain: Domain,
    lock: DomainLock,
    workspace: Arc<dyn Workspace>,
}

impl WorkflowCoordinator {
    pub fn new(domain: Domain, workspace: Arc<dyn Workspace>) -> Self {
        Self {
            domain,
            lock: DomainLock::default(),
            workspace,
        }
    }

    pub fn is_busy(&self) -> bool {
        self.lock.is_held()
    }

    /// Run `body` against a freshly synchronized workspace.
    ///
    /// Sequence: reset, decrypt, `body`, encrypt, publish. The first error
    /// aborts the rest; nothing is rolled back, the next reset discards
    /// whatever the failed run left behind.
    pub fn run<T>(
        &self,
        operator: &str,
        crypt_password: &str,
        operation: &str,
        body: impl FnOnce(&dyn Workspace) -> Result<T, CscError>,
    ) -> Result<T, CscError> {
        self.run_then(operator, crypt_password, operation, body, Ok)
    }

    /// Like [`run`](Self::run); `after` runs once the workspace is
    /// published, still under the lock.
    pub fn run_then<T, U>(
        &self,
        operator: &str,
        crypt_password: &str,
        operation: &str,
        body: impl FnOnce(&dyn Workspace) -> Result<T, CscError>,
        after: impl FnOnce(T) -> Result<U, CscError>,
    ) -> Result<U, CscError> {
        let _guard = self.acquire(operation)?;
        let span = tracing::info_span!(
            "workflow",
            domain = %self.domain,
            %operation,
            %operator,
            id = %Uuid::new_v4(),
        );
        let _entered = span.enter();

        let result = self
            .sequence(operator, crypt_password, operation, body)
            .and_then(after);
        match &result {
            Ok(_) => tracing::info!("Workflow completed"),
            Err(e) if e.is_infrastructure() => tracing::error!(error = ?e, "Workflow failed: {e}"),
            Err(e) => tracing::warn!("Workflow aborted: {e}"),
        }
        result
    }

    fn sequence<T>(
        &self,
        operator: &str,
        crypt_password: &str,
        operation: &str,
        body: impl FnOnce(&dyn Workspace) -> Result<T, CscError>,
    ) -> Result<T, CscError> {
        let ws = self.workspace.as_ref();
        ws.reset()?;
        ws.decrypt_all(crypt_password)?;
        let value = body(ws)?;
        ws.encrypt_all(crypt_password)?;
        ws.publish(operator, operation)?;
        Ok(value)
    }

    /// Run `body` under the domain lock without touching the workspace.
    pub fn exclusive<T>(
        &self,
        operation: &str,
        body: impl FnOnce() -> Result<T, CscError>,
    ) -> Result<T, CscError> {
        let _guard = self.acquire(operation)?;
        let result = body();
        if let Err(e) = &result {
            tracing::warn!(domain = %self.domain, %operation, "Operation aborted: {e}");
        }
        result
    }

    fn acquire(&self, operation: &str) -> Result<MutexGuard<'_, ()>, CscError> {
        self.lock.try_acquire().ok_or_else(|| {
            tracing::warn!(domain = %self.domain, %operation, "Concurrent access prevented");
            CscError::Busy(self.domain)
        })
    }
}
