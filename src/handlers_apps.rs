// SPDX-License-Identifier: EUPL-1.2

//! Shared application endpoints.

use crate::{
    auth::Caller,
    error::CscError,
    handlers::{blocking, download},
    models::{AppCertOperation, AppDetails, CreateAppRequest, RenewalRequest, SharedApp},
    state::AppState,
    store::naming,
    workflows::Passwords,
};
use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::Response,
    Json,
};
use serde_json::{json, Value};
use std::sync::Arc;

fn passwords(op: &AppCertOperation) -> Passwords {
    Passwords {
        crypt: op.crypt_password.clone(),
        key: op.key_password.clone(),
    }
}

/// `GET /apps`
pub async fn list_apps(
    State(state): State<Arc<AppState>>,
    _caller: Caller,
) -> Result<Json<Vec<SharedApp>>, CscError> {
    blocking(move || Ok(Json(state.apps.find_apps()))).await
}

/// `POST /apps` — Create key, CSR and team details.
///
/// The generated key password is returned once and never stored.
pub async fn create_app(
    State(state): State<Arc<AppState>>,
    caller: Caller,
    Json(req): Json<CreateAppRequest>,
) -> Result<(StatusCode, Json<Value>), CscError> {
    let (app_name, password) = blocking(move || {
        let details = AppDetails {
            team_name: req.team_name,
            team_contact: req.team_contact,
        };
        let password = state.app_workflows.create(&req.app_name, &details, &caller.identity)?;
        Ok((req.app_name, password))
    })
    .await?;

    Ok((
        StatusCode::CREATED,
        Json(json!({
            "app_name": app_name,
            "key_password": password,
        })),
    ))
}

/// `GET /apps/:app/files/:file` — Download a key, CSR or certificate.
pub async fn download_app_file(
    State(state): State<Arc<AppState>>,
    _caller: Caller,
    Path((app, file)): Path<(String, String)>,
) -> Result<Response, CscError> {
    let path = blocking(move || state.apps.app_file(&app, &file)).await?;
    download(path).await
}

/// `POST /apps/:app/renewal`
pub async fn request_app_renewal(
    State(state): State<Arc<AppState>>,
    caller: Caller,
    Path(app): Path<String>,
    Json(req): Json<RenewalRequest>,
) -> Result<Json<Value>, CscError> {
    blocking(move || {
        state
            .app_workflows
            .request_renewal(&app, &req.file_name, &caller.identity)?;
        Ok(Json(json!({ "app_name": app, "file_name": req.file_name, "renewal_requested": true })))
    })
    .await
}

/// `POST /apps/:app/sign` — `file_name` names the CSR.
pub async fn sign_app(
    State(state): State<Arc<AppState>>,
    caller: Caller,
    Path(app): Path<String>,
    Json(req): Json<AppCertOperation>,
) -> Result<Json<Value>, CscError> {
    blocking(move || {
        let cert = state
            .app_workflows
            .sign(&app, &req.file_name, &passwords(&req), &caller.identity)?;
        Ok(Json(json!({ "app_name": app, "certificate": naming::file_name(&cert) })))
    })
    .await
}

/// `POST /apps/:app/renew` — `file_name` names the certificate.
pub async fn renew_app(
    State(state): State<Arc<AppState>>,
    caller: Caller,
    Path(app): Path<String>,
    Json(req): Json<AppCertOperation>,
) -> Result<Json<Value>, CscError> {
    blocking(move || {
        let cert = state
            .app_workflows
            .renew(&app, &req.file_name, &passwords(&req), &caller.identity)?;
        Ok(Json(json!({ "app_name": app, "certificate": naming::file_name(&cert) })))
    })
    .await
}

/// `POST /apps/:app/revoke` — `file_name` names the certificate.
pub async fn revoke_app(
    State(state): State<Arc<AppState>>,
    caller: Caller,
    Path(app): Path<String>,
    Json(req): Json<AppCertOperation>,
) -> Result<Json<Value>, CscError> {
    blocking(move || {
        state
            .app_workflows
            .revoke(&app, &req.file_name, &passwords(&req), &caller.identity)?;
        tracing::warn!("Revoked certificate {} of application {app}", req.file_name);
        Ok(Json(json!({ "app_name": app, "certificate": req.file_name, "message": "Certificate revoked" })))
    })
    .await
}

// ── Tests ─────────────────────────────────────────────────────────────────────
