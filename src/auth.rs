// SPDX-License-Identifier: EUPL-1.2

//! Caller identity.
//!
//! Authentication happens in the fronting proxy, which forwards the
//! authenticated identity in `X-Remote-User`. The registry trusts that
//! header and never authenticates on its own.

use axum::{
    async_trait,
    extract::FromRequestParts,
    http::request::Parts,
};

use crate::{error::CscError, store::naming};

pub const REMOTE_USER_HEADER: &str = "x-remote-user";

/// The identity a request is made on behalf of.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Caller {
    /// As sent by the proxy, lowercased. Recorded as the operator.
    pub identity: String,
    /// Directory name below `users/`.
    pub user_name: String,
}

impl Caller {
    pub fn from_identity(raw: &str) -> Result<Self, CscError> {
        let identity = raw.trim().to_lowercase();
        if identity.is_empty() {
            return Err(CscError::Unauthenticated);
        }
        let user_name = naming::normalize_user_name(&identity);
        naming::validate_segment("user name", &user_name)?;
        Ok(Self { identity, user_name })
    }
}

#[async_trait]
impl<S: Send + Sync> FromRequestParts<S> for Caller {
    type Rejection = CscError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let raw = parts
            .headers
            .get(REMOTE_USER_HEADER)
            .and_then(|v| v.to_str().ok())
            .ok_or(CscError::Unauthenticated)?;
        Caller::from_identity(raw)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn identity_is_normalized() {
        let c = Caller::from_identity(" Alice@Example.org ").unwrap();
        assert_eq!(c.identity, "alice@example.org");
        assert_eq!(c.user_name, "alice_example.org");
    }

    #[test]
    fn blank_or_traversing_identities_are_refused() {
        assert!(matches!(Caller::from_identity("  "), Err(CscError::Unauthenticated)));
        assert!(matches!(Caller::from_identity("../root"), Err(CscError::Validation(_))));
    }
}
