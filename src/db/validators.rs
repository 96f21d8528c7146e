//! Field validation applied before persistence.

use std::fmt;
use std::str::FromStr;
use std::sync::LazyLock;

use miette::Diagnostic;
use regex::Regex;
use thiserror::Error;

/// Maximum length of a project repository URL.
pub const REPO_URL_MAX_LENGTH: usize = 200;

static SSH_REPO_URL: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"^(?P<user>[A-Za-z0-9][A-Za-z0-9_.-]*)@(?P<host>[A-Za-z0-9][A-Za-z0-9.-]*):(?P<path>(?:[A-Za-z0-9_][A-Za-z0-9_.~-]*/)*)(?P<repo>[A-Za-z0-9_][A-Za-z0-9_.~-]*)\.git$",
    )
    .expect("SSH repository URL pattern is valid")
});

#[derive(Error, Diagnostic, Debug, Clone, PartialEq, Eq)]
pub enum ValidationError {
    #[error("Repository URL is empty")]
    #[diagnostic(
        code(robocjk::validators::empty_repo_url),
        help("The .git repository SSH URL, eg. git@github.com:username/repository.git")
    )]
    EmptyRepoUrl,

    #[error("Repository URL is {length} characters long, the maximum is {max}")]
    #[diagnostic(code(robocjk::validators::repo_url_too_long))]
    RepoUrlTooLong { length: usize, max: usize },

    #[error("Invalid git SSH repository URL: '{url}'")]
    #[diagnostic(
        code(robocjk::validators::invalid_ssh_url),
        help("The .git repository SSH URL, eg. git@github.com:username/repository.git")
    )]
    InvalidSshUrl { url: String },
}

/// A validated git SSH repository URL of the form `user@host:path/repo.git`.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct RepoUrl {
    raw: String,
    host_range: (usize, usize),
    repo_range: (usize, usize),
}

impl RepoUrl {
    pub fn parse(value: &str) -> Result<Self, ValidationError> {
        let value = value.trim();
        if value.is_empty() {
            return Err(ValidationError::EmptyRepoUrl);
        }
        if value.len() > REPO_URL_MAX_LENGTH {
            return Err(ValidationError::RepoUrlTooLong {
                length: value.len(),
                max: REPO_URL_MAX_LENGTH,
            });
        }

        let caps = SSH_REPO_URL
            .captures(value)
            .ok_or_else(|| ValidationError::InvalidSshUrl {
                url: value.to_string(),
            })?;
        // Both groups are mandatory in the pattern.
        let (Some(host), Some(repo)) = (caps.name("host"), caps.name("repo")) else {
            return Err(ValidationError::InvalidSshUrl {
                url: value.to_string(),
            });
        };

        Ok(Self {
            raw: value.to_string(),
            host_range: (host.start(), host.end()),
            repo_range: (repo.start(), repo.end()),
        })
    }

    pub fn as_str(&self) -> &str {
        &self.raw
    }

    pub fn host(&self) -> &str {
        &self.raw[self.host_range.0..self.host_range.1]
    }

    /// Repository name without the `.git` suffix.
    pub fn repo_name(&self) -> &str {
        &self.raw[self.repo_range.0..self.repo_range.1]
    }
}

impl FromStr for RepoUrl {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl AsRef<str> for RepoUrl {
    fn as_ref(&self) -> &str {
        &self.raw
    }
}

impl fmt::Display for RepoUrl {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.raw)
    }
}
