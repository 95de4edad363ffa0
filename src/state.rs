// SPDX-License-Identifier: EUPL-1.2

//! Stores, workflows and application state.

use std::sync::Arc;

use anyhow::Context;

use crate::{
    config::Config,
    coordinator::{Domain, WorkflowCoordinator},
    crypto::{CryptoGateway, OpensslGateway},
    fs::{Filesystem, LocalFs},
    store::{AdminStore, Layout, SharedAppStore, UserStore},
    workflows::{AppWorkflows, UserWorkflows},
    workspace::{GitCli, GitWorkspace, Repository, Workspace},
};

/// Shared application state injected into every Axum handler.
pub struct AppState {
    pub users: UserStore,
    pub admin: Arc<AdminStore>,
    pub apps: Arc<SharedAppStore>,
    pub user_workflows: UserWorkflows,
    pub app_workflows: AppWorkflows,
}

impl AppState {
    /// Wire the process-backed implementations from `config`.
    pub fn from_config(config: &Config) -> anyhow::Result<Self> {
        let fs: Arc<dyn Filesystem> = Arc::new(LocalFs);
        let layout = Layout::new(&config.storage_path);

        fs.create_dirs(layout.storage())
            .with_context(|| format!("creating storage at {}", layout.storage().display()))?;
        tracing::info!("Storage root: {}", layout.storage().display());

        if fs.is_dir(&config.scripts_path) {
            tracing::info!("Application scripts: {}", config.scripts_path.display());
        } else {
            tracing::warn!(
                "Scripts path {} missing, creating shared apps will fail",
                config.scripts_path.display()
            );
        }

        match &config.git_keyfile {
            Some(key) => tracing::info!("Using SSH key {} for {}", key.display(), config.cert_repo),
            None => tracing::warn!("CSC_GIT_KEYFILE not set, git uses the ambient SSH configuration"),
        }

        let crypto: Arc<dyn CryptoGateway> = Arc::new(OpensslGateway::new(
            config.crypt_salt.clone(),
            config.scripts_path.clone(),
            fs.clone(),
        ));
        let repository: Arc<dyn Repository> =
            Arc::new(GitCli::new(config.cert_repo.clone(), config.git_keyfile.clone()));

        let user_ws: Arc<dyn Workspace> = Arc::new(GitWorkspace::new(
            layout.user_workspace(),
            repository.clone(),
            crypto.clone(),
            fs.clone(),
        ));
        let apps_ws: Arc<dyn Workspace> = Arc::new(GitWorkspace::new(
            layout.apps_workspace(),
            repository,
            crypto.clone(),
            fs.clone(),
        ));

        Ok(Self::assemble(fs, layout, config.crl_path.clone(), crypto, user_ws, apps_ws))
    }

    /// Build the state around the given boundaries.
    pub fn assemble(
        fs: Arc<dyn Filesystem>,
        layout: Layout,
        crl_path: std::path::PathBuf,
        crypto: Arc<dyn CryptoGateway>,
        user_workspace: Arc<dyn Workspace>,
        apps_workspace: Arc<dyn Workspace>,
    ) -> Self {
        let admin = Arc::new(AdminStore::new(fs.clone(), layout.clone()));
        let apps = Arc::new(SharedAppStore::new(fs.clone(), layout.clone(), crypto.clone()));

        let user_coordinator = Arc::new(WorkflowCoordinator::new(Domain::UserCertificates, user_workspace));
        let apps_coordinator = Arc::new(WorkflowCoordinator::new(Domain::SharedApps, apps_workspace));

        Self {
            users: UserStore::new(fs, layout, crl_path),
            user_workflows: UserWorkflows::new(user_coordinator, admin.clone(), crypto.clone()),
            app_workflows: AppWorkflows::new(apps_coordinator, apps.clone(), crypto),
            admin,
            apps,
        }
    }
}
