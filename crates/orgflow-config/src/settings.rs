//! 環境変数からのオーケストレーター設定
//!
//! | 環境変数 | デフォルト |
//! |---|---|
//! | `ORGFLOW_REGION` | `us-east-1` |
//! | `ORGFLOW_POLL_INTERVAL_SECS` | 10 |
//! | `ORGFLOW_ACCOUNT_MAX_ATTEMPTS` | 90 |
//! | `ORGFLOW_UNIT_MAX_ATTEMPTS` | 6 |
//! | `ORGFLOW_ORGANIZATION_MAX_ATTEMPTS` | 6 |
//! | `ORGFLOW_EMAIL_MAX_ATTEMPTS` | 60 |

use crate::error::{ConfigError, Result};
use orgflow_cloud::{DEFAULT_REGION, EntityKind, OrchestratorConfig, PollPolicy};
use std::time::Duration;

pub const ENV_REGION: &str = "ORGFLOW_REGION";
pub const ENV_POLL_INTERVAL: &str = "ORGFLOW_POLL_INTERVAL_SECS";
pub const ENV_ACCOUNT_MAX_ATTEMPTS: &str = "ORGFLOW_ACCOUNT_MAX_ATTEMPTS";
pub const ENV_UNIT_MAX_ATTEMPTS: &str = "ORGFLOW_UNIT_MAX_ATTEMPTS";
pub const ENV_ORGANIZATION_MAX_ATTEMPTS: &str = "ORGFLOW_ORGANIZATION_MAX_ATTEMPTS";
pub const ENV_EMAIL_MAX_ATTEMPTS: &str = "ORGFLOW_EMAIL_MAX_ATTEMPTS";

/// 実行時設定
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Settings {
    /// 組織レベルの操作をすべて送るリージョン
    pub region: String,
    /// ポーリング間隔
    pub poll_interval: Duration,
    pub account_max_attempts: u32,
    pub unit_max_attempts: u32,
    pub organization_max_attempts: u32,
    pub email_max_attempts: u32,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            region: DEFAULT_REGION.to_string(),
            poll_interval: Duration::from_secs(10),
            account_max_attempts: 90,
            unit_max_attempts: 6,
            organization_max_attempts: 6,
            email_max_attempts: 60,
        }
    }
}

impl Settings {
    /// プロセスの環境変数から読み込む
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// 任意の参照関数から読み込む（未設定の項目はデフォルト値）
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let defaults = Self::default();
        let attempts = |name: &'static str, default: u32| -> Result<u32> {
            match lookup(name) {
                Some(value) => parse_positive(name, &value),
                None => Ok(default),
            }
        };

        let region = match lookup(ENV_REGION) {
            Some(value) if value.trim().is_empty() => {
                return Err(ConfigError::InvalidValue {
                    name: ENV_REGION,
                    value,
                });
            }
            Some(value) => value,
            None => defaults.region,
        };

        let poll_interval = match lookup(ENV_POLL_INTERVAL) {
            Some(value) => Duration::from_secs(
                value
                    .trim()
                    .parse::<u64>()
                    .map_err(|_| ConfigError::InvalidValue {
                        name: ENV_POLL_INTERVAL,
                        value: value.clone(),
                    })?,
            ),
            None => defaults.poll_interval,
        };

        let settings = Self {
            region,
            poll_interval,
            account_max_attempts: attempts(
                ENV_ACCOUNT_MAX_ATTEMPTS,
                defaults.account_max_attempts,
            )?,
            unit_max_attempts: attempts(ENV_UNIT_MAX_ATTEMPTS, defaults.unit_max_attempts)?,
            organization_max_attempts: attempts(
                ENV_ORGANIZATION_MAX_ATTEMPTS,
                defaults.organization_max_attempts,
            )?,
            email_max_attempts: attempts(ENV_EMAIL_MAX_ATTEMPTS, defaults.email_max_attempts)?,
        };
        tracing::debug!(?settings, "Settings resolved");
        Ok(settings)
    }

    /// オーケストレーター設定に変換
    pub fn orchestrator_config(&self) -> OrchestratorConfig {
        let policy = |max_attempts| PollPolicy::new(self.poll_interval, max_attempts);
        OrchestratorConfig::new()
            .with_region(self.region.clone())
            .with_interval(self.poll_interval)
            .with_policy(EntityKind::Account, policy(self.account_max_attempts))
            .with_policy(EntityKind::Unit, policy(self.unit_max_attempts))
            .with_policy(EntityKind::Placement, policy(self.unit_max_attempts))
            .with_policy(EntityKind::DelegatedAdmin, policy(self.unit_max_attempts))
            .with_policy(EntityKind::Organization, policy(self.organization_max_attempts))
            .with_policy(EntityKind::Root, policy(self.organization_max_attempts))
            .with_policy(EntityKind::ServiceAccess, policy(self.organization_max_attempts))
            .with_policy(EntityKind::EmailIdentity, policy(self.email_max_attempts))
    }
}

fn parse_positive(name: &'static str, value: &str) -> Result<u32> {
    match value.trim().parse::<u32>() {
        Ok(n) if n > 0 => Ok(n),
        _ => Err(ConfigError::InvalidValue {
            name,
            value: value.to_string(),
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serial_test::serial;
    use std::collections::HashMap;

    fn lookup(vars: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |name| vars.get(name).cloned()
    }

    #[test]
    fn test_defaults() {
        let settings = Settings::from_lookup(lookup(&[])).unwrap();
        assert_eq!(settings, Settings::default());
        assert_eq!(settings.region, "us-east-1");
        assert_eq!(settings.poll_interval, Duration::from_secs(10));
    }

    #[test]
    fn test_overrides() {
        let settings = Settings::from_lookup(lookup(&[
            (ENV_REGION, "us-west-2"),
            (ENV_POLL_INTERVAL, "0"),
            (ENV_ACCOUNT_MAX_ATTEMPTS, "120"),
            (ENV_UNIT_MAX_ATTEMPTS, " 3 "),
        ]))
        .unwrap();

        assert_eq!(settings.region, "us-west-2");
        assert_eq!(settings.poll_interval, Duration::ZERO);
        assert_eq!(settings.account_max_attempts, 120);
        assert_eq!(settings.unit_max_attempts, 3);
        assert_eq!(settings.email_max_attempts, 60);
    }

    #[test]
    fn test_invalid_values() {
        for (name, value) in [
            (ENV_POLL_INTERVAL, "ten"),
            (ENV_ACCOUNT_MAX_ATTEMPTS, "0"),
            (ENV_UNIT_MAX_ATTEMPTS, "-1"),
            (ENV_REGION, " "),
        ] {
            let err = Settings::from_lookup(lookup(&[(name, value)])).unwrap_err();
            assert!(
                matches!(err, ConfigError::InvalidValue { name: n, .. } if n == name),
                "{name}={value}"
            );
        }
    }

    #[test]
    fn test_orchestrator_config() {
        let settings = Settings {
            poll_interval: Duration::from_secs(5),
            account_max_attempts: 40,
            ..Settings::default()
        };
        let config = settings.orchestrator_config();

        let account = config.policy_for(EntityKind::Account);
        assert_eq!(account.interval, Duration::from_secs(5));
        assert_eq!(account.max_attempts, 40);
        assert_eq!(config.policy_for(EntityKind::Unit).max_attempts, 6);
        assert_eq!(config.policy_for(EntityKind::Placement).max_attempts, 6);
        assert_eq!(config.policy_for(EntityKind::EmailIdentity).max_attempts, 60);
        assert_eq!(config.region, "us-east-1");
    }

    #[test]
    #[serial]
    fn test_from_env() {
        temp_env::with_vars(
            [
                (ENV_REGION, Some("eu-west-1")),
                (ENV_EMAIL_MAX_ATTEMPTS, Some("12")),
                (ENV_POLL_INTERVAL, None),
            ],
            || {
                let settings = Settings::from_env().unwrap();
                assert_eq!(settings.region, "eu-west-1");
                assert_eq!(settings.email_max_attempts, 12);
                assert_eq!(settings.poll_interval, Duration::from_secs(10));
            },
        );
    }
}
