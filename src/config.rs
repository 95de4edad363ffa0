// SPDX-License-Identifier: EUPL-1.2

//! Runtime configuration from environment variables.
//!
//! | Variable           | Default                                |
//! |--------------------|----------------------------------------|
//! | `CSC_STORAGE_PATH` | `./data`                               |
//! | `CSC_CERT_REPO`    | required                               |
//! | `CSC_GIT_KEYFILE`  | unset: git uses the ambient SSH setup  |
//! | `CSC_CRYPT_SALT`   | required, 16 hex characters            |
//! | `CSC_CRL_PATH`     | `<storage>/crl/intermediate.crl.pem`   |
//! | `CSC_SCRIPTS_PATH` | `<storage>/scripts`                    |
//! | `LISTEN_ADDR`      | `0.0.0.0:3100`                         |

use std::path::PathBuf;

use anyhow::{bail, Context};

#[derive(Debug, Clone)]
pub struct Config {
    pub storage_path: PathBuf,
    pub cert_repo: String,
    pub git_keyfile: Option<PathBuf>,
    pub crypt_salt: String,
    pub crl_path: PathBuf,
    pub scripts_path: PathBuf,
    pub listen_addr: String,
}

impl Config {
    pub fn from_env() -> anyhow::Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> anyhow::Result<Self> {
        let var = |key: &str| lookup(key).map(|v| v.trim().to_string()).filter(|v| !v.is_empty());

        let storage_path = PathBuf::from(var("CSC_STORAGE_PATH").unwrap_or_else(|| "./data".into()));
        let cert_repo = var("CSC_CERT_REPO").context("CSC_CERT_REPO must point at the certificate repository")?;
        let crypt_salt = var("CSC_CRYPT_SALT").context("CSC_CRYPT_SALT is required")?;
        if crypt_salt.len() != 16 || !crypt_salt.chars().all(|c| c.is_ascii_hexdigit()) {
            bail!("CSC_CRYPT_SALT must be 16 hex characters");
        }

        let crl_path = var("CSC_CRL_PATH")
            .map(PathBuf::from)
            .unwrap_or_else(|| storage_path.join("crl").join("intermediate.crl.pem"));
        let scripts_path = var("CSC_SCRIPTS_PATH")
            .map(PathBuf::from)
            .unwrap_or_else(|| storage_path.join("scripts"));

        Ok(Self {
            git_keyfile: var("CSC_GIT_KEYFILE").map(PathBuf::from),
            listen_addr: var("LISTEN_ADDR").unwrap_or_else(|| "0.0.0.0:3100".into()),
            storage_path,
            cert_repo,
            crypt_salt,
            crl_path,
            scripts_path,
        })
    }
}
