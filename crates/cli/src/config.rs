//! Runtime configuration.
//!
//! Configuration is a read-only key lookup, bound to process environment
//! variables by [`CliConfig::from_env`]. Values are read and validated once at
//! startup.
//!
//! | Variable | Default |
//! |----------|---------|
//! | `COMMIT_SYNC_GITHUB_USERNAME` | required |
//! | `COMMIT_SYNC_GITHUB_PASSWORD` | required |
//! | `COMMIT_SYNC_GITHUB_ORGANIZATION` | required |
//! | `COMMIT_SYNC_EMAIL_DOMAIN` | required |
//! | `COMMIT_SYNC_SERVER_URL` | required |
//! | `COMMIT_SYNC_GITHUB_API_URL` | `https://api.github.com` |
//! | `COMMIT_SYNC_REDIS_HOSTNAME` | `127.0.0.1` |
//! | `COMMIT_SYNC_REDIS_PORT` | `6379` |
//! | `COMMIT_SYNC_REDIS_DB` | `0` |
//! | `COMMIT_SYNC_REDIS_KEY_PREFIX` | `github-` |
//! | `COMMIT_SYNC_HTTP_TIMEOUT_SECS` | `30` |
//! | `OTEL_EXPORTER_OTLP_ENDPOINT` | unset (no span export) |

use std::str::FromStr;
use std::time::Duration;

use engine::{OrganizationName, SyncSettings};
use github::{Credentials, GithubConfig, DEFAULT_API_BASE};
use store::RedisConfig;
use thiserror::Error;

const PREFIX: &str = "COMMIT_SYNC_";
const DEFAULT_HTTP_TIMEOUT_SECS: u64 = 30;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("Missing required configuration value {key}")]
    Missing { key: String },

    #[error("Invalid value for {key}: {message}")]
    Invalid { key: String, message: String },
}

/// Everything the binary needs to build and run one synchronisation.
#[derive(Debug, Clone)]
pub struct CliConfig {
    pub github: GithubConfig,
    pub redis: RedisConfig,
    pub sink_url: String,
    pub sink_timeout: Duration,
    pub settings: SyncSettings,
    pub otlp_endpoint: Option<String>,
}

impl CliConfig {
    /// Reads configuration from the process environment.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Reads configuration through an arbitrary key lookup.
    ///
    /// Keys are the full variable names (e.g. `COMMIT_SYNC_SERVER_URL`). Blank
    /// values are treated as absent.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let source = Lookup(lookup);

        let organization = OrganizationName::new(source.required("GITHUB_ORGANIZATION")?)
            .ok_or_else(|| ConfigError::Missing {
                key: format!("{PREFIX}GITHUB_ORGANIZATION"),
            })?;
        let timeout = Duration::from_secs(
            source.parsed("HTTP_TIMEOUT_SECS", DEFAULT_HTTP_TIMEOUT_SECS)?,
        );

        let github = GithubConfig {
            api_base: source
                .optional("GITHUB_API_URL")
                .unwrap_or_else(|| DEFAULT_API_BASE.to_string()),
            organization,
            credentials: Credentials {
                username: source.required("GITHUB_USERNAME")?,
                password: source.required("GITHUB_PASSWORD")?,
            },
            timeout,
        };

        let defaults = RedisConfig::default();
        let redis = RedisConfig {
            host: source.optional("REDIS_HOSTNAME").unwrap_or(defaults.host),
            port: source.parsed("REDIS_PORT", defaults.port)?,
            db: source.parsed("REDIS_DB", defaults.db)?,
            key_prefix: source
                .optional("REDIS_KEY_PREFIX")
                .unwrap_or(defaults.key_prefix),
        };

        Ok(Self {
            github,
            redis,
            sink_url: source.required("SERVER_URL")?,
            sink_timeout: timeout,
            settings: SyncSettings::new(source.required("EMAIL_DOMAIN")?),
            otlp_endpoint: source.raw("OTEL_EXPORTER_OTLP_ENDPOINT"),
        })
    }
}

struct Lookup<F>(F);

impl<F> Lookup<F>
where
    F: Fn(&str) -> Option<String>,
{
    fn raw(&self, key: &str) -> Option<String> {
        (self.0)(key).filter(|v| !v.trim().is_empty())
    }

    fn optional(&self, name: &str) -> Option<String> {
        self.raw(&format!("{PREFIX}{name}"))
    }

    fn required(&self, name: &str) -> Result<String, ConfigError> {
        self.optional(name).ok_or_else(|| ConfigError::Missing {
            key: format!("{PREFIX}{name}"),
        })
    }

    fn parsed<T>(&self, name: &str, default: T) -> Result<T, ConfigError>
    where
        T: FromStr,
        T::Err: std::fmt::Display,
    {
        match self.optional(name) {
            None => Ok(default),
            Some(v) => v.trim().parse().map_err(|e: T::Err| ConfigError::Invalid {
                key: format!("{PREFIX}{name}"),
                message: e.to_string(),
            }),
        }
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use super::*;

    fn base() -> HashMap<&'static str, &'static str> {
        HashMap::from([
            ("COMMIT_SYNC_GITHUB_USERNAME", "bot"),
            ("COMMIT_SYNC_GITHUB_PASSWORD", "s3cret"),
            ("COMMIT_SYNC_GITHUB_ORGANIZATION", "acme"),
            ("COMMIT_SYNC_EMAIL_DOMAIN", "@allowed.com"),
            ("COMMIT_SYNC_SERVER_URL", "https://sink.example.test/events"),
        ])
    }

    fn load(vars: &HashMap<&'static str, &'static str>) -> Result<CliConfig, ConfigError> {
        CliConfig::from_lookup(|key| vars.get(key).map(|v| v.to_string()))
    }

    #[test]
    fn test_defaults_apply() {
        let cfg = load(&base()).unwrap();

        assert_eq!(cfg.github.api_base, DEFAULT_API_BASE);
        assert_eq!(cfg.github.organization.as_str(), "acme");
        assert_eq!(cfg.github.credentials.username, "bot");
        assert_eq!(cfg.github.timeout, Duration::from_secs(30));
        assert_eq!(cfg.redis, RedisConfig::default());
        assert_eq!(cfg.sink_url, "https://sink.example.test/events");
        assert_eq!(cfg.settings, SyncSettings::new("@allowed.com"));
        assert_eq!(cfg.otlp_endpoint, None);
    }

    #[test]
    fn test_overrides_apply() {
        let mut vars = base();
        vars.insert("COMMIT_SYNC_REDIS_HOSTNAME", "redis.internal");
        vars.insert("COMMIT_SYNC_REDIS_PORT", "6380");
        vars.insert("COMMIT_SYNC_REDIS_DB", "3");
        vars.insert("COMMIT_SYNC_REDIS_KEY_PREFIX", "");
        vars.insert("COMMIT_SYNC_HTTP_TIMEOUT_SECS", "5");
        vars.insert("COMMIT_SYNC_GITHUB_API_URL", "https://ghe.example.test/api/v3");
        vars.insert("OTEL_EXPORTER_OTLP_ENDPOINT", "http://collector:4317");

        let cfg = load(&vars).unwrap();

        assert_eq!(cfg.redis.host, "redis.internal");
        assert_eq!(cfg.redis.port, 6380);
        assert_eq!(cfg.redis.db, 3);
        // Blank counts as unset.
        assert_eq!(cfg.redis.key_prefix, "github-");
        assert_eq!(cfg.sink_timeout, Duration::from_secs(5));
        assert_eq!(cfg.github.api_base, "https://ghe.example.test/api/v3");
        assert_eq!(cfg.otlp_endpoint.as_deref(), Some("http://collector:4317"));
    }

    #[test]
    fn test_missing_required_key() {
        for key in [
            "COMMIT_SYNC_GITHUB_USERNAME",
            "COMMIT_SYNC_GITHUB_PASSWORD",
            "COMMIT_SYNC_GITHUB_ORGANIZATION",
            "COMMIT_SYNC_EMAIL_DOMAIN",
            "COMMIT_SYNC_SERVER_URL",
        ] {
            let mut vars = base();
            vars.remove(key);
            assert_eq!(
                load(&vars).unwrap_err(),
                ConfigError::Missing {
                    key: key.to_string()
                }
            );
        }
    }

    #[test]
    fn test_unparseable_number() {
        let mut vars = base();
        vars.insert("COMMIT_SYNC_REDIS_PORT", "sixty");

        assert!(matches!(
            load(&vars).unwrap_err(),
            ConfigError::Invalid { key, .. } if key == "COMMIT_SYNC_REDIS_PORT"
        ));
    }

    #[test]
    fn test_password_is_not_printed() {
        let cfg = load(&base()).unwrap();
        assert!(!format!("{cfg:?}").contains("s3cret"));
    }
}
