//! Configuration loaded from the environment

use secrecy::Secret;
use std::env;
use std::path::PathBuf;

use crate::client::DEFAULT_API_URL;
use crate::types::*;

/// Environment variable holding the personal access token
pub const TOKEN_ENV: &str = "YNAB_PERSONAL_ACCESS_TOKEN";

#[derive(Debug, Clone)]
pub struct Config {
    /// Personal access token; only needed when committing
    pub token: Option<Secret<String>>,
    pub api_url: String,
    /// SQLite export of the budget
    pub db_path: PathBuf,
    pub log_level: String,
}

impl Config {
    pub fn from_env() -> Self {
        Self {
            token: env::var(TOKEN_ENV)
                .ok()
                .filter(|token| !token.is_empty())
                .map(Secret::new),
            api_url: env::var("YNAB_API_URL").unwrap_or_else(|_| DEFAULT_API_URL.to_string()),
            db_path: env::var("SQLITE_EXPORT_FOR_YNAB_DB")
                .map(PathBuf::from)
                .unwrap_or_else(|_| default_db_path()),
            log_level: env::var("LOG_LEVEL").unwrap_or_else(|_| "warn".to_string()),
        }
    }

    /// The token, or a configuration error explaining how to set it
    pub fn require_token(&self) -> ReconcileResult<Secret<String>> {
        self.token.clone().ok_or_else(|| {
            ReconcileError::Config(format!(
                "Must set YNAB access token as '{}' environment variable. See https://api.ynab.com/#personal-access-tokens",
                TOKEN_ENV
            ))
        })
    }
}

/// Where the sync tool keeps its database by default
pub fn default_db_path() -> PathBuf {
    let data_home = env::var("XDG_DATA_HOME")
        .ok()
        .filter(|dir| !dir.is_empty())
        .map(PathBuf::from)
        .or_else(|| env::var("HOME").ok().map(|home| PathBuf::from(home).join(".local/share")))
        .unwrap_or_else(|| PathBuf::from("."));

    data_home.join("sqlite-export-for-ynab").join("db.sqlite")
}
