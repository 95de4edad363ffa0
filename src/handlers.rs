// SPDX-License-Identifier: EUPL-1.2

//! Axum route handlers for user self-service and public downloads.

use crate::{
    auth::Caller,
    error::CscError,
    models::{RenewalRequest, UploadCsrRequest},
    state::AppState,
    store::naming,
};
use axum::{
    extract::{Path, State},
    http::{header, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use serde_json::{json, Value};
use std::path::PathBuf;
use std::sync::Arc;

/// Run filesystem- and process-bound work off the async executor.
pub(crate) async fn blocking<T, F>(f: F) -> Result<T, CscError>
where
    F: FnOnce() -> Result<T, CscError> + Send + 'static,
    T: Send + 'static,
{
    tokio::task::spawn_blocking(f)
        .await
        .map_err(|e| CscError::Internal(anyhow::anyhow!("blocking task failed: {e}")))?
}

/// Serve a PEM file verbatim as an attachment.
pub(crate) async fn download(path: PathBuf) -> Result<Response, CscError> {
    let bytes = match tokio::fs::read(&path).await {
        Ok(bytes) => bytes,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            return Err(CscError::NotFound(naming::file_name(&path)))
        }
        Err(e) => return Err(e.into()),
    };

    Ok((
        [
            (header::CONTENT_TYPE, "application/x-pem-file".to_string()),
            (
                header::CONTENT_DISPOSITION,
                format!("attachment; filename=\"{}\"", naming::file_name(&path)),
            ),
        ],
        bytes,
    )
        .into_response())
}

// ── Health ────────────────────────────────────────────────────────────────────

/// `GET /health` — Health check
pub async fn health() -> Json<Value> {
    Json(json!({
        "status": "ok",
        "service": "client-cert-registry",
        "version": env!("CARGO_PKG_VERSION"),
    }))
}

// ── Own requests and certificates ─────────────────────────────────────────────

/// `GET /me` — Pending, accepted and rejected requests plus certificates of
/// the caller.
pub async fn my_overview(
    State(state): State<Arc<AppState>>,
    caller: Caller,
) -> Result<Json<Value>, CscError> {
    blocking(move || {
        let user = &caller.user_name;
        Ok(Json(json!({
            "user": caller.identity,
            "pending": state.users.find_pending(user),
            "accepted": state.users.find_accepted(user),
            "rejected": state.users.find_rejected(user),
            "certificates": state.users.find_certificates(user),
        })))
    })
    .await
}

/// `POST /me/csr` — Upload a new certificate request.
///
/// Body: `{ "file_name": "laptop.csr.pem", "csr": "-----BEGIN CERTIFICATE REQUEST-----…" }`
pub async fn upload_csr(
    State(state): State<Arc<AppState>>,
    caller: Caller,
    Json(req): Json<UploadCsrRequest>,
) -> Result<(StatusCode, Json<Value>), CscError> {
    let file_name = req
        .file_name
        .unwrap_or_else(|| format!("{}{}", caller.user_name, naming::CSR_SUFFIX));

    let saved = blocking(move || state.users.save_uploaded_csr(&caller.user_name, &file_name, &req.csr)).await?;

    Ok((
        StatusCode::CREATED,
        Json(json!({
            "file_name": naming::file_name(&saved),
            "status": "pending",
        })),
    ))
}

/// `POST /me/renewal` — Ask the operators to renew one of the caller's
/// certificates.
pub async fn request_renewal(
    State(state): State<Arc<AppState>>,
    caller: Caller,
    Json(req): Json<RenewalRequest>,
) -> Result<Json<Value>, CscError> {
    let file_name = req.file_name.clone();
    blocking(move || {
        state.users.request_renewal(&caller.user_name, &req.file_name)?;
        crate::audit::record(
            &caller.identity,
            crate::audit::AuditEvent::RequestedRenewal {
                user: &caller.user_name,
                file: &req.file_name,
            },
        );
        Ok(())
    })
    .await?;

    Ok(Json(json!({
        "file_name": file_name,
        "renewal_requested": true,
    })))
}

/// `GET /me/certs/:file` — Download one of the caller's certificates.
pub async fn download_certificate(
    State(state): State<Arc<AppState>>,
    caller: Caller,
    Path(file): Path<String>,
) -> Result<Response, CscError> {
    let path = blocking(move || state.users.certificate_file(&caller.user_name, &file)).await?;
    download(path).await
}

// ── Public downloads ──────────────────────────────────────────────────────────

/// `GET /ca` — The intermediate CA certificate.
pub async fn download_ca(State(state): State<Arc<AppState>>) -> Result<Response, CscError> {
    download(state.users.ca_certificate()).await
}

/// `GET /crl` — The current certificate revocation list.
pub async fn download_crl(State(state): State<Arc<AppState>>) -> Result<Response, CscError> {
    download(state.users.revocation_list()).await
}

// ── Tests ─────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::test_server;
    use axum::http::{HeaderName, HeaderValue};

    fn alice() -> (HeaderName, HeaderValue) {
        (
            HeaderName::from_static("x-remote-user"),
            HeaderValue::from_static("alice@example.org"),
        )
    }

    #[tokio::test]
    async fn health_returns_ok() {
        let resp = health().await;
        assert_eq!(resp.0["status"], "ok");
        assert_eq!(resp.0["service"], "client-cert-registry");
    }

    #[tokio::test]
    async fn overview_requires_identity() {
        let (server, _dir) = test_server();
        let resp = server.get("/me").await;
        assert_eq!(resp.status_code(), StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn upload_then_list() {
        let (server, _dir) = test_server();
        let (name, value) = alice();

        let resp = server
            .post("/me/csr")
            .add_header(name.clone(), value.clone())
            .json(&json!({ "csr": crate::testing::csr_pem("alice") }))
            .await;
        assert_eq!(resp.status_code(), StatusCode::CREATED);
        assert_eq!(resp.json::<Value>()["file_name"], "alice_example.org.csr.pem");

        let resp = server.get("/me").add_header(name, value).await;
        resp.assert_status_ok();
        let body = resp.json::<Value>();
        assert_eq!(body["pending"].as_array().unwrap().len(), 1);
        assert_eq!(body["pending"][0]["state"], "pending");
        assert!(body["certificates"].as_array().unwrap().is_empty());
    }

    #[tokio::test]
    async fn invalid_upload_is_unprocessable() {
        let (server, _dir) = test_server();
        let (name, value) = alice();

        let resp = server
            .post("/me/csr")
            .add_header(name, value)
            .json(&json!({ "file_name": "x.csr.pem", "csr": "garbage" }))
            .await;
        assert_eq!(resp.status_code(), StatusCode::UNPROCESSABLE_ENTITY);
        assert!(resp.json::<Value>()["error"].as_str().unwrap().contains("Invalid CSR"));
    }

    #[tokio::test]
    async fn missing_downloads_are_not_found() {
        let (server, _dir) = test_server();
        let (name, value) = alice();

        assert_eq!(server.get("/ca").await.status_code(), StatusCode::NOT_FOUND);
        assert_eq!(server.get("/crl").await.status_code(), StatusCode::NOT_FOUND);
        let resp = server.get("/me/certs/alice.crt.pem").add_header(name, value).await;
        assert_eq!(resp.status_code(), StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn ca_certificate_is_served_verbatim() {
        let (server, dir) = test_server();
        std::fs::write(dir.path().join("intermediate.cert.pem"), "CA PEM").unwrap();

        let resp = server.get("/ca").await;
        resp.assert_status_ok();
        assert_eq!(resp.text(), "CA PEM");
        assert_eq!(resp.header("content-type"), "application/x-pem-file");
    }
}
