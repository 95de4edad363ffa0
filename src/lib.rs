// SPDX-License-Identifier: EUPL-1.2

//! Client certificate registry.
//!
//! Manages user and shared-application client certificates whose CA lives in
//! an encrypted git repository. Requests and certificates are plain files in
//! a storage tree; signing and revocation run in a freshly cloned, decrypted
//! workspace that is re-encrypted and pushed afterwards.
//!
//! ## Endpoints
//!
//! - `GET  /health`                   — Health check
//! - `GET  /ca`, `GET /crl`           — CA certificate and revocation list
//! - `GET  /me`                       — Own requests and certificates
//! - `POST /me/csr`                   — Upload a CSR
//! - `POST /me/renewal`               — Request renewal of an own certificate
//! - `GET  /me/certs/:file`           — Download an own certificate
//! - `GET  /admin/requests/pending`   — All pending requests
//! - `GET  /admin/requests/signed`    — All accepted requests
//! - `GET  /admin/certs/revoked`      — All revoked certificates
//! - `POST /admin/csr/{accept,reject,sign}`
//! - `POST /admin/certs/{renew,revoke}`
//! - `GET  /apps`, `POST /apps`       — Shared applications
//! - `GET  /apps/:app/files/:file`
//! - `POST /apps/:app/{renewal,sign,renew,revoke}`

pub mod audit;
pub mod auth;
pub mod config;
pub mod coordinator;
pub mod crypto;
pub mod error;
pub mod fs;
pub mod handlers;
pub mod handlers_admin;
pub mod handlers_apps;
pub mod models;
pub mod process;
pub mod state;
pub mod store;
pub mod workflows;
pub mod workspace;

#[cfg(test)]
pub(crate) mod testing;

use axum::{
    routing::{get, post},
    Router,
};
use std::sync::Arc;

pub use config::Config;
pub use error::CscError;
pub use state::AppState;

/// All routes, without transport layers.
pub fn router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/health", get(handlers::health))
        .route("/ca", get(handlers::download_ca))
        .route("/crl", get(handlers::download_crl))
        .route("/me", get(handlers::my_overview))
        .route("/me/csr", post(handlers::upload_csr))
        .route("/me/renewal", post(handlers::request_renewal))
        .route("/me/certs/:file", get(handlers::download_certificate))
        .route("/admin/requests/pending", get(handlers_admin::pending_requests))
        .route("/admin/requests/signed", get(handlers_admin::signed_requests))
        .route("/admin/certs/revoked", get(handlers_admin::revoked_certificates))
        .route("/admin/csr/accept", post(handlers_admin::accept_csr))
        .route("/admin/csr/reject", post(handlers_admin::reject_csr))
        .route("/admin/csr/sign", post(handlers_admin::sign_csr))
        .route("/admin/certs/renew", post(handlers_admin::renew_certificate))
        .route("/admin/certs/revoke", post(handlers_admin::revoke_certificate))
        .route("/apps", get(handlers_apps::list_apps).post(handlers_apps::create_app))
        .route("/apps/:app/files/:file", get(handlers_apps::download_app_file))
        .route("/apps/:app/renewal", post(handlers_apps::request_app_renewal))
        .route("/apps/:app/sign", post(handlers_apps::sign_app))
        .route("/apps/:app/renew", post(handlers_apps::renew_app))
        .route("/apps/:app/revoke", post(handlers_apps::revoke_app))
        .with_state(state)
}
