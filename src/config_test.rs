//! Tests for ExportConfig.

use figment::providers::Serialized;
use figment::{Figment, Jail};
use std::path::PathBuf;
use std::time::Duration;

use crate::config::*;

fn defaults() -> Figment {
    Figment::from(Serialized::defaults(EnvSettings::default()))
}

fn with_required(figment: Figment) -> Figment {
    figment
        .merge(Serialized::default("git_repositories_path", "/srv/robocjk/repos"))
        .merge(Serialized::default("git_user_name", "RoboCJK"))
        .merge(Serialized::default("git_user_email", "robocjk@example.com"))
}

fn set_all(jail: &mut Jail, overrides: &[(&str, &str)]) {
    let base = [
        (DATABASE_URL, "sqlite:///var/lib/robocjk.db"),
        (GIT_REPOSITORIES_PATH, "/srv/robocjk/repos"),
        (GIT_USER_NAME, "RoboCJK"),
        (GIT_USER_EMAIL, "robocjk@example.com"),
        (CANCEL_TIMEOUT, "120"),
        (PAGINATION_LIMIT, "500"),
        (PUSH_ATTEMPTS, "3"),
    ];
    for (name, value) in base {
        let value = overrides
            .iter()
            .find(|(key, _)| *key == name)
            .map_or(value, |(_, value)| *value);
        jail.set_env(name, value);
    }
}

#[test]
fn defaults_apply_when_optional_settings_are_unset() {
    let config = ExportConfig::from_figment(with_required(defaults())).unwrap();

    assert_eq!(config.database_url, "sqlite://robocjk.db");
    assert_eq!(config.repositories_path, PathBuf::from("/srv/robocjk/repos"));
    assert_eq!(config.identity.name, "RoboCJK");
    assert_eq!(config.identity.email, "robocjk@example.com");
    assert_eq!(config.cancel_timeout, Duration::from_secs(120));
    assert_eq!(config.page_size, 500);
    assert_eq!(config.push_attempts, 3);
}

#[test]
fn environment_overrides_defaults() {
    Jail::expect_with(|jail| {
        set_all(
            jail,
            &[
                (CANCEL_TIMEOUT, "30"),
                (PAGINATION_LIMIT, "50"),
                (PUSH_ATTEMPTS, "5"),
            ],
        );

        let config = ExportConfig::from_env().expect("config loads");
        assert_eq!(config.database_url, "sqlite:///var/lib/robocjk.db");
        assert_eq!(config.identity.email, "robocjk@example.com");
        assert_eq!(config.cancel_timeout, Duration::from_secs(30));
        assert_eq!(config.page_size, 50);
        assert_eq!(config.push_attempts, 5);
        assert_eq!(config.retry_config().max_attempts, 5);
        assert_eq!(config.export_settings().cancel_timeout, Duration::from_secs(30));
        Ok(())
    });
}

#[test]
fn blank_database_url_falls_back_to_default() {
    let figment = with_required(defaults()).merge(Serialized::default("database_url", " "));
    let config = ExportConfig::from_figment(figment).unwrap();
    assert_eq!(config.database_url, "sqlite://robocjk.db");
}

#[test]
fn missing_git_identity_is_an_error() {
    let figment = with_required(defaults()).merge(Serialized::default("git_user_email", "  "));
    assert!(matches!(
        ExportConfig::from_figment(figment),
        Err(ConfigError::Missing {
            name: "GIT_USER_EMAIL"
        })
    ));
}

#[test]
fn missing_repositories_path_is_an_error() {
    let figment = defaults()
        .merge(Serialized::default("git_user_name", "RoboCJK"))
        .merge(Serialized::default("git_user_email", "a@b.c"));
    assert!(matches!(
        ExportConfig::from_figment(figment),
        Err(ConfigError::Missing {
            name: "GIT_REPOSITORIES_PATH"
        })
    ));
}

#[test]
fn non_integer_timeout_is_rejected() {
    Jail::expect_with(|jail| {
        set_all(jail, &[(CANCEL_TIMEOUT, "two minutes")]);

        let err = ExportConfig::from_env().unwrap_err();
        assert!(matches!(err, ConfigError::Figment(_)));
        assert!(
            err.to_string()
                .to_lowercase()
                .contains("robocjk_export_cancel_timeout")
        );
        Ok(())
    });
}

#[test]
fn negative_page_size_is_rejected() {
    Jail::expect_with(|jail| {
        set_all(jail, &[(PAGINATION_LIMIT, "-10")]);
        assert!(matches!(
            ExportConfig::from_env(),
            Err(ConfigError::Figment(_))
        ));
        Ok(())
    });
}

#[test]
fn zero_values_are_rejected() {
    let cases = [
        (
            CANCEL_TIMEOUT,
            defaults().merge(Serialized::default("robocjk_export_cancel_timeout", 0u64)),
        ),
        (
            PAGINATION_LIMIT,
            defaults().merge(Serialized::default(
                "robocjk_export_queries_pagination_limit",
                0usize,
            )),
        ),
        (
            PUSH_ATTEMPTS,
            defaults().merge(Serialized::default("robocjk_export_push_attempts", 0u32)),
        ),
    ];

    for (name, figment) in cases {
        let err = ExportConfig::from_figment(with_required(figment)).unwrap_err();
        assert_eq!(
            err.to_string(),
            format!("Invalid value '0' for {}: must be greater than zero", name)
        );
    }
}

#[test]
fn zero_from_environment_is_rejected() {
    Jail::expect_with(|jail| {
        set_all(jail, &[(PUSH_ATTEMPTS, "0")]);
        assert!(matches!(
            ExportConfig::from_env(),
            Err(ConfigError::Invalid {
                name: "ROBOCJK_EXPORT_PUSH_ATTEMPTS",
                ..
            })
        ));
        Ok(())
    });
}
