// SPDX-License-Identifier: EUPL-1.2

//! Operator endpoints for the user certificate domain.
//!
//! Role checks are the proxy's job; every call here is recorded with the
//! caller as operator.

use crate::{
    auth::Caller,
    error::CscError,
    handlers::blocking,
    models::{CertInfo, CertificateRequest, UserCertOperation, UserCsrAction},
    state::AppState,
    store::naming,
    workflows::Passwords,
};
use axum::{extract::State, Json};
use serde_json::{json, Value};
use std::sync::Arc;

fn passwords(op: &UserCertOperation) -> Passwords {
    Passwords {
        crypt: op.crypt_password.clone(),
        key: op.key_password.clone(),
    }
}

// ── Listings ──────────────────────────────────────────────────────────────────

/// `GET /admin/requests/pending`
pub async fn pending_requests(
    State(state): State<Arc<AppState>>,
    _caller: Caller,
) -> Result<Json<Vec<CertificateRequest>>, CscError> {
    blocking(move || Ok(Json(state.admin.find_pending_requests()))).await
}

/// `GET /admin/requests/signed` — Accepted requests with renewal markers.
pub async fn signed_requests(
    State(state): State<Arc<AppState>>,
    _caller: Caller,
) -> Result<Json<Vec<CertificateRequest>>, CscError> {
    blocking(move || Ok(Json(state.admin.find_signed_requests()))).await
}

/// `GET /admin/certs/revoked`
pub async fn revoked_certificates(
    State(state): State<Arc<AppState>>,
    _caller: Caller,
) -> Result<Json<Vec<CertInfo>>, CscError> {
    blocking(move || Ok(Json(state.admin.find_revoked_certificates()))).await
}

// ── Lock-only transitions ─────────────────────────────────────────────────────

/// `POST /admin/csr/accept`
pub async fn accept_csr(
    State(state): State<Arc<AppState>>,
    caller: Caller,
    Json(req): Json<UserCsrAction>,
) -> Result<Json<Value>, CscError> {
    blocking(move || {
        state
            .user_workflows
            .accept(&req.user_name, &req.file_name, &caller.identity)?;
        Ok(Json(json!({ "user_name": naming::normalize_user_name(&req.user_name), "file_name": req.file_name, "state": "accepted" })))
    })
    .await
}

/// `POST /admin/csr/reject`
pub async fn reject_csr(
    State(state): State<Arc<AppState>>,
    caller: Caller,
    Json(req): Json<UserCsrAction>,
) -> Result<Json<Value>, CscError> {
    blocking(move || {
        state
            .user_workflows
            .reject(&req.user_name, &req.file_name, &caller.identity)?;
        Ok(Json(json!({ "user_name": naming::normalize_user_name(&req.user_name), "file_name": req.file_name, "state": "rejected" })))
    })
    .await
}

// ── Workspace workflows ───────────────────────────────────────────────────────

/// `POST /admin/csr/sign`
///
/// Body: `{ "user_name", "file_name", "crypt_password", "key_password" }`
pub async fn sign_csr(
    State(state): State<Arc<AppState>>,
    caller: Caller,
    Json(req): Json<UserCertOperation>,
) -> Result<Json<Value>, CscError> {
    blocking(move || {
        let cert = state.user_workflows.sign(
            &req.user_name,
            &req.file_name,
            &passwords(&req),
            &caller.identity,
        )?;
        Ok(Json(json!({
            "user_name": naming::normalize_user_name(&req.user_name),
            "certificate": naming::file_name(&cert),
            "message": "Certificate signed",
        })))
    })
    .await
}

/// `POST /admin/certs/renew` — `file_name` names the accepted request.
pub async fn renew_certificate(
    State(state): State<Arc<AppState>>,
    caller: Caller,
    Json(req): Json<UserCertOperation>,
) -> Result<Json<Value>, CscError> {
    blocking(move || {
        let cert = state.user_workflows.renew(
            &req.user_name,
            &req.file_name,
            &passwords(&req),
            &caller.identity,
        )?;
        Ok(Json(json!({
            "user_name": naming::normalize_user_name(&req.user_name),
            "certificate": naming::file_name(&cert),
            "message": "Certificate renewed",
        })))
    })
    .await
}

/// `POST /admin/certs/revoke` — `file_name` names the accepted request.
pub async fn revoke_certificate(
    State(state): State<Arc<AppState>>,
    caller: Caller,
    Json(req): Json<UserCertOperation>,
) -> Result<Json<Value>, CscError> {
    blocking(move || {
        let revoked = state.user_workflows.revoke(
            &req.user_name,
            &req.file_name,
            &passwords(&req),
            &caller.identity,
        )?;
        tracing::warn!("Revoked certificate {} of {}", revoked.display(), req.user_name);
        Ok(Json(json!({
            "user_name": naming::normalize_user_name(&req.user_name),
            "certificate": naming::file_name(&revoked),
            "message": "Certificate revoked",
        })))
    })
    .await
}

// ── Tests ─────────────────────────────────────────────────────────────────────
