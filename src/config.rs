//! Export configuration read from the environment.
//!
//! | Variable | Default |
//! |---|---|
//! | `DATABASE_URL` | `sqlite://robocjk.db` |
//! | `GIT_REPOSITORIES_PATH` | required |
//! | `GIT_USER_NAME` | required |
//! | `GIT_USER_EMAIL` | required |
//! | `ROBOCJK_EXPORT_CANCEL_TIMEOUT` | `120` (seconds) |
//! | `ROBOCJK_EXPORT_QUERIES_PAGINATION_LIMIT` | `500` |
//! | `ROBOCJK_EXPORT_PUSH_ATTEMPTS` | `3` |
//!
//! Values are layered with figment: defaults first, then the listed
//! variables from the process environment (which includes anything loaded
//! from the env settings file).

use figment::{
    Figment,
    providers::{Env, Serialized},
};
use miette::Diagnostic;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;
use thiserror::Error;

use crate::export::ExportSettings;
use crate::sync::{GitIdentity, RetryConfig};

pub const DATABASE_URL: &str = "DATABASE_URL";
pub const GIT_REPOSITORIES_PATH: &str = "GIT_REPOSITORIES_PATH";
pub const GIT_USER_NAME: &str = "GIT_USER_NAME";
pub const GIT_USER_EMAIL: &str = "GIT_USER_EMAIL";
pub const CANCEL_TIMEOUT: &str = "ROBOCJK_EXPORT_CANCEL_TIMEOUT";
pub const PAGINATION_LIMIT: &str = "ROBOCJK_EXPORT_QUERIES_PAGINATION_LIMIT";
pub const PUSH_ATTEMPTS: &str = "ROBOCJK_EXPORT_PUSH_ATTEMPTS";

pub const DEFAULT_DATABASE_URL: &str = "sqlite://robocjk.db";
pub const DEFAULT_CANCEL_TIMEOUT_SECS: u64 = 120;
pub const DEFAULT_PAGINATION_LIMIT: usize = 500;
pub const DEFAULT_PUSH_ATTEMPTS: u32 = 3;

const ENV_KEYS: [&str; 7] = [
    DATABASE_URL,
    GIT_REPOSITORIES_PATH,
    GIT_USER_NAME,
    GIT_USER_EMAIL,
    CANCEL_TIMEOUT,
    PAGINATION_LIMIT,
    PUSH_ATTEMPTS,
];

#[derive(Error, Diagnostic, Debug)]
pub enum ConfigError {
    #[error("Missing required setting {name}")]
    #[diagnostic(
        code(robocjk::config::missing),
        help("Set {name} in the environment or in the env settings file")
    )]
    Missing { name: &'static str },

    #[error("Invalid value '{value}' for {name}: {reason}")]
    #[diagnostic(code(robocjk::config::invalid))]
    Invalid {
        name: &'static str,
        value: String,
        reason: String,
    },

    #[error("Invalid configuration: {0}")]
    #[diagnostic(code(robocjk::config::figment))]
    Figment(#[from] figment::Error),
}

/// Raw settings as extracted from the environment. `Env::raw` lowercases
/// variable names, so each field is named after its variable.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct EnvSettings {
    pub database_url: String,
    pub git_repositories_path: Option<String>,
    pub git_user_name: Option<String>,
    pub git_user_email: Option<String>,
    pub robocjk_export_cancel_timeout: u64,
    pub robocjk_export_queries_pagination_limit: usize,
    pub robocjk_export_push_attempts: u32,
}

impl Default for EnvSettings {
    fn default() -> Self {
        Self {
            database_url: DEFAULT_DATABASE_URL.to_string(),
            git_repositories_path: None,
            git_user_name: None,
            git_user_email: None,
            robocjk_export_cancel_timeout: DEFAULT_CANCEL_TIMEOUT_SECS,
            robocjk_export_queries_pagination_limit: DEFAULT_PAGINATION_LIMIT,
            robocjk_export_push_attempts: DEFAULT_PUSH_ATTEMPTS,
        }
    }
}

/// Typed settings of one export run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExportConfig {
    pub database_url: String,
    pub repositories_path: PathBuf,
    pub identity: GitIdentity,
    pub cancel_timeout: Duration,
    pub page_size: usize,
    pub push_attempts: u32,
}

impl ExportConfig {
    /// Read the configuration from the process environment.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_figment(Self::figment())
    }

    /// Defaults overlaid with the export variables of the process environment.
    pub fn figment() -> Figment {
        Figment::from(Serialized::defaults(EnvSettings::default()))
            .merge(Env::raw().only(&ENV_KEYS))
    }

    /// Extract and validate settings from `figment`. Blank values count as unset.
    pub fn from_figment(figment: Figment) -> Result<Self, ConfigError> {
        let settings: EnvSettings = figment.extract()?;

        let database_url = non_blank(Some(settings.database_url))
            .unwrap_or_else(|| DEFAULT_DATABASE_URL.to_string());

        Ok(Self {
            database_url,
            repositories_path: PathBuf::from(required(
                GIT_REPOSITORIES_PATH,
                settings.git_repositories_path,
            )?),
            identity: GitIdentity {
                name: required(GIT_USER_NAME, settings.git_user_name)?,
                email: required(GIT_USER_EMAIL, settings.git_user_email)?,
            },
            cancel_timeout: Duration::from_secs(positive(
                CANCEL_TIMEOUT,
                settings.robocjk_export_cancel_timeout,
            )?),
            page_size: positive(
                PAGINATION_LIMIT,
                settings.robocjk_export_queries_pagination_limit,
            )?,
            push_attempts: positive(PUSH_ATTEMPTS, settings.robocjk_export_push_attempts)?,
        })
    }

    /// Push retry policy with the configured number of attempts.
    pub fn retry_config(&self) -> RetryConfig {
        RetryConfig {
            max_attempts: self.push_attempts,
            ..RetryConfig::default()
        }
    }

    pub fn export_settings(&self) -> ExportSettings {
        ExportSettings {
            repositories_path: self.repositories_path.clone(),
            cancel_timeout: self.cancel_timeout,
            identity: self.identity.clone(),
        }
    }
}

fn non_blank(value: Option<String>) -> Option<String> {
    value
        .map(|value| value.trim().to_string())
        .filter(|value| !value.is_empty())
}

fn required(name: &'static str, value: Option<String>) -> Result<String, ConfigError> {
    non_blank(value).ok_or(ConfigError::Missing { name })
}

fn positive<T>(name: &'static str, value: T) -> Result<T, ConfigError>
where
    T: PartialOrd + Default + ToString,
{
    if value <= T::default() {
        return Err(ConfigError::Invalid {
            name,
            value: value.to_string(),
            reason: "must be greater than zero".to_string(),
        });
    }
    Ok(value)
}
