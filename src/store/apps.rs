// SPDX-License-Identifier: EUPL-1.2

//! Shared application bundles below `applications/<app>/`.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::SystemTime;

use rand::{distr::Alphanumeric, Rng};

use crate::{
    crypto::CryptoGateway,
    error::CscError,
    fs::Filesystem,
    models::{AppDetails, SharedApp},
    store::{inspect, last_modified, naming, Layout},
};

pub const DETAILS_FILE: &str = "appdetails.properties";
const PASSWORD_LENGTH: usize = 32;

pub struct SharedAppStore {
    fs: Arc<dyn Filesystem>,
    layout: Layout,
    crypto: Arc<dyn CryptoGateway>,
}

impl SharedAppStore {
    pub fn new(fs: Arc<dyn Filesystem>, layout: Layout, crypto: Arc<dyn CryptoGateway>) -> Self {
        Self { fs, layout, crypto }
    }

    pub fn app_dir(&self, app: &str) -> PathBuf {
        self.layout.app_dir(app)
    }

    pub fn find_apps(&self) -> Vec<SharedApp> {
        match self.fs.list_dirs(&self.layout.apps_dir()) {
            Ok(dirs) => dirs.iter().map(|d| self.app_view(d)).collect(),
            Err(e) => {
                tracing::debug!("No shared apps: {e}");
                Vec::new()
            }
        }
    }

    fn app_view(&self, dir: &Path) -> SharedApp {
        let name = naming::file_name(dir);
        let existing = |suffix: &str| {
            let path = dir.join(format!("{name}{suffix}"));
            self.fs.is_file(&path).then_some(path)
        };

        let key_file = existing(naming::KEY_SUFFIX);
        let csr_file = existing(naming::CSR_SUFFIX);
        let cert_file = existing(naming::CERT_SUFFIX);
        let renewal_requested = existing(&format!("{}{}", naming::CERT_SUFFIX, naming::REQRENEW_SUFFIX)).is_some();

        let fs = self.fs.as_ref();
        SharedApp {
            key_last_modified: key_file.as_deref().and_then(|p| last_modified(fs, p)),
            csr_last_modified: csr_file.as_deref().and_then(|p| last_modified(fs, p)),
            cert_last_modified: cert_file.as_deref().and_then(|p| last_modified(fs, p)),
            csr_info: csr_file
                .as_deref()
                .and_then(|p| fs.read(p).ok())
                .and_then(|pem| inspect::csr_subject(&pem)),
            cert_valid_to: cert_file
                .as_deref()
                .and_then(|p| fs.read(p).ok())
                .and_then(|pem| inspect::cert_valid_to(&pem)),
            details: self.read_details(dir),
            name,
            key_file,
            csr_file,
            cert_file,
            renewal_requested,
        }
    }

    pub fn exists(&self, app: &str) -> bool {
        self.fs.is_dir(&self.layout.app_dir(app))
    }

    fn app_path(&self, app: &str, file_name: &str) -> Result<PathBuf, CscError> {
        let app = naming::validate_segment("application name", app)?;
        let file_name = naming::validate_segment("file name", naming::normalize_file_name(file_name))?;
        Ok(self.layout.app_dir(app).join(file_name))
    }

    pub fn find_app_file(&self, app: &str, file_name: &str) -> Result<Option<PathBuf>, CscError> {
        let path = self.app_path(app, file_name)?;
        Ok(self.fs.is_file(&path).then_some(path))
    }

    /// An app file the workflow depends on; absence is inconsistent data.
    pub fn require_app_file(&self, app: &str, file_name: &str) -> Result<PathBuf, CscError> {
        self.find_app_file(app, file_name)?
            .ok_or_else(|| CscError::Inconsistent(format!("no file {file_name} for application {app}")))
    }

    /// An app file requested for download.
    pub fn app_file(&self, app: &str, file_name: &str) -> Result<PathBuf, CscError> {
        self.find_app_file(app, file_name)?
            .ok_or_else(|| CscError::NotFound(format!("{file_name} of application {app}")))
    }

    /// Drop a partly created application directory.
    pub fn remove_app(&self, app: &str) -> Result<(), CscError> {
        let dir = self.layout.app_dir(naming::validate_app_name(app)?);
        if self.fs.exists(&dir) {
            self.fs.remove_recursive(&dir)?;
        }
        Ok(())
    }

    pub fn delete_app_file(&self, app: &str, file_name: &str) -> Result<bool, CscError> {
        let path = self.app_path(app, file_name)?;
        Ok(self.fs.remove_if_exists(&path)?)
    }

    /// Create or refresh `<cert>.reqrenew` in the app directory.
    pub fn request_renewal(&self, app: &str, cert_file_name: &str) -> Result<PathBuf, CscError> {
        let cert = self.app_file(app, cert_file_name)?;
        let marker = naming::marker(&cert, naming::REQRENEW_SUFFIX);
        self.fs.touch(&marker, SystemTime::now())?;
        Ok(marker)
    }

    /// Run the key script with a fresh password and return that password.
    pub fn create_app_key(&self, app: &str) -> Result<String, CscError> {
        let app = naming::validate_app_name(app)?;
        let password = generate_password(PASSWORD_LENGTH);

        let apps_dir = self.layout.apps_dir();
        self.fs.create_dirs(&apps_dir)?;
        self.crypto.generate_app_key(&apps_dir, app, &password)?;
        Ok(password)
    }

    pub fn create_csr(&self, app: &str, password: &str) -> Result<(), CscError> {
        let app = naming::validate_app_name(app)?;
        self.crypto.generate_app_csr(&self.layout.apps_dir(), app, password)
    }

    pub fn create_app_details(&self, app: &str, details: &AppDetails) -> Result<PathBuf, CscError> {
        let app = naming::validate_app_name(app)?;
        let mut contents = String::new();
        for (key, value) in [("teamName", &details.team_name), ("teamContact", &details.team_contact)] {
            let Some(value) = value else { continue };
            if value.contains(['\n', '\r']) {
                return Err(CscError::Validation(format!("{key} must be a single line")));
            }
            contents.push_str(&format!("{key}={value}\n"));
        }

        let dir = self.layout.app_dir(app);
        self.fs.create_dirs(&dir)?;
        let path = dir.join(DETAILS_FILE);
        self.fs.write(&path, contents.as_bytes())?;
        Ok(path)
    }

    pub fn app_details(&self, app: &str) -> Option<AppDetails> {
        let app = naming::validate_segment("application name", app).ok()?;
        self.read_details(&self.layout.app_dir(app))
    }

    fn read_details(&self, dir: &Path) -> Option<AppDetails> {
        let raw = self.fs.read(&dir.join(DETAILS_FILE)).ok()?;
        Some(parse_details(&String::from_utf8_lossy(&raw)))
    }
}

fn generate_password(len: usize) -> String {
    rand::rng()
        .sample_iter(Alphanumeric)
        .take(len)
        .map(char::from)
        .collect()
}

fn parse_details(raw: &str) -> AppDetails {
    let mut details = AppDetails::default();
    for line in raw.lines().map(str::trim) {
        if line.starts_with('#') {
            continue;
        }
        let Some((key, value)) = line.split_once('=') else { continue };
        let value = Some(value.trim().to_string()).filter(|v| !v.is_empty());
        match key.trim() {
            "teamName" => details.team_name = value,
            "teamContact" => details.team_contact = value,
            _ => {}
        }
    }
    details
}
