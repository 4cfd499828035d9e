//! commit-sync watermark storage adapter.
//!
//! Implements [`engine::WatermarkStore`] on Redis. Each repository's watermark
//! is a plain string value under `<prefix><repo-name>-pushed_at`; the default
//! prefix `github-` matches the keys existing deployments already hold.
//!
//! ## Architectural Layer
//!
//! **Infrastructure.** Connection management and key layout live here; the
//! [`engine`] crate only sees [`engine::WatermarkStore`].

use async_trait::async_trait;
use engine::{RepositoryName, StoreError, Watermark, WatermarkStore};
use redis::aio::ConnectionManager;
use redis::AsyncCommands;

/// Namespace prepended to every watermark key unless configured otherwise.
pub const DEFAULT_KEY_PREFIX: &str = "github-";

/// Where and how to store watermarks.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RedisConfig {
    pub host: String,
    pub port: u16,
    pub db: i64,
    pub key_prefix: String,
}

impl RedisConfig {
    /// `redis://<host>:<port>/<db>`.
    pub fn url(&self) -> String {
        format!("redis://{}:{}/{}", self.host, self.port, self.db)
    }
}

impl Default for RedisConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 6379,
            db: 0,
            key_prefix: DEFAULT_KEY_PREFIX.to_string(),
        }
    }
}

/// Watermarks kept in Redis.
#[derive(Clone)]
pub struct RedisWatermarkStore {
    manager: ConnectionManager,
    prefix: String,
}

impl RedisWatermarkStore {
    #[tracing::instrument(level = "debug", skip(cfg), fields(host = %cfg.host, port = cfg.port, db = cfg.db))]
    pub async fn connect(cfg: &RedisConfig) -> Result<Self, StoreError> {
        let target = cfg.url();
        let connect_error = |e: redis::RedisError| StoreError::Connect {
            target: target.clone(),
            message: e.to_string(),
        };
        let client = redis::Client::open(target.as_str()).map_err(connect_error)?;
        let manager = ConnectionManager::new(client).await.map_err(connect_error)?;
        Ok(Self {
            manager,
            prefix: cfg.key_prefix.clone(),
        })
    }

    fn key(&self, repository: &RepositoryName) -> String {
        scoped_key(&self.prefix, repository)
    }
}

fn scoped_key(prefix: &str, repository: &RepositoryName) -> String {
    format!("{prefix}{}", Watermark::storage_key(repository))
}

#[async_trait]
impl WatermarkStore for RedisWatermarkStore {
    #[tracing::instrument(level = "debug", skip_all, fields(repository = %repository))]
    async fn get(&self, repository: &RepositoryName) -> Result<Watermark, StoreError> {
        let key = self.key(repository);
        let mut conn = self.manager.clone();
        let value: Option<String> = conn.get(&key).await.map_err(|e| StoreError::Backend {
            operation: "get",
            key: key.clone(),
            message: e.to_string(),
        })?;
        // An empty value counts as never synchronised.
        Ok(value
            .filter(|v| !v.is_empty())
            .map(Watermark::new)
            .unwrap_or_default())
    }

    #[tracing::instrument(level = "debug", skip_all, fields(repository = %repository, value = %value))]
    async fn set(&self, repository: &RepositoryName, value: &Watermark) -> Result<(), StoreError> {
        let key = self.key(repository);
        let mut conn = self.manager.clone();
        let _: () = conn
            .set(&key, value.as_str())
            .await
            .map_err(|e| StoreError::Backend {
                operation: "set",
                key: key.clone(),
                message: e.to_string(),
            })?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_scoped_key() {
        let repo = RepositoryName::new("svc-a").unwrap();
        assert_eq!(scoped_key(DEFAULT_KEY_PREFIX, &repo), "github-svc-a-pushed_at");
        assert_eq!(scoped_key("", &repo), "svc-a-pushed_at");
    }

    #[test]
    fn test_default_config_url() {
        assert_eq!(RedisConfig::default().url(), "redis://127.0.0.1:6379/0");
    }

    /// Round-trips a watermark through a real Redis.
    ///
    /// Set `COMMIT_SYNC_TEST_REDIS_URL` (e.g. `redis://127.0.0.1:6379/15`) to run;
    /// the test is a no-op otherwise.
    #[tokio::test]
    async fn test_get_set_against_live_redis() {
        let Ok(url) = std::env::var("COMMIT_SYNC_TEST_REDIS_URL") else {
            return;
        };
        let client = redis::Client::open(url).unwrap();
        let store = RedisWatermarkStore {
            manager: ConnectionManager::new(client).await.unwrap(),
            prefix: format!("commit-sync-test-{}-", std::process::id()),
        };
        let repo = RepositoryName::new("svc-a").unwrap();

        assert_eq!(store.get(&repo).await.unwrap(), Watermark::epoch());

        let value = Watermark::new("2021-05-02T00:00:00Z");
        store.set(&repo, &value).await.unwrap();
        assert_eq!(store.get(&repo).await.unwrap(), value);

        let mut conn = store.manager.clone();
        let _: () = conn.del(store.key(&repo)).await.unwrap();
    }
}
