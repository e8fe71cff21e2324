use super::config::AppConfig;
use crate::core::SeedError;
use async_trait::async_trait;
use serde::Deserialize;
use serde_json::{Map as JsonMap, Value as JsonValue};
use std::collections::HashMap;
use std::time::Duration;
use tracing::debug;

pub type SeedRecord = JsonMap<String, JsonValue>;

/// External bulk source of candidate records, addressed by pool name.
#[async_trait]
pub trait SeedPool: Send + Sync {
    async fn fetch(&self, pool: &str) -> Result<Vec<SeedRecord>, SeedError>;
}

/// Pools read from the `<pool>.json` files of one GitHub gist.
pub struct GistSeedPool {
    client: reqwest::Client,
    base_url: String,
    gist_hash: String,
}

#[derive(Deserialize)]
struct Gist {
    files: HashMap<String, GistFile>,
}

#[derive(Deserialize)]
struct GistFile {
    content: String,
}

impl GistSeedPool {
    pub fn new(base_url: &str, gist_hash: &str, timeout: Duration) -> Result<Self, SeedError> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .user_agent(concat!("quizgate/", env!("CARGO_PKG_VERSION")))
            .build()?;
        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            gist_hash: gist_hash.to_string(),
        })
    }

    /// `None` when no gist is configured.
    pub fn from_config(config: &AppConfig) -> Result<Option<Self>, SeedError> {
        config
            .seed_gist_hash
            .as_deref()
            .map(|hash| Self::new(&config.seed_base_url, hash, config.seed_timeout()))
            .transpose()
    }

    pub fn url(&self) -> String {
        format!("{}/{}", self.base_url, self.gist_hash)
    }
}

#[async_trait]
impl SeedPool for GistSeedPool {
    async fn fetch(&self, pool: &str) -> Result<Vec<SeedRecord>, SeedError> {
        let url = self.url();
        debug!(%url, pool, "fetching seed pool");

        let gist: Gist = self
            .client
            .get(&url)
            .send()
            .await?
            .error_for_status()?
            .json()
            .await?;

        let file = gist
            .files
            .get(&format!("{pool}.json"))
            .ok_or_else(|| SeedError::MissingPool(pool.to_string()))?;
        let parsed: JsonValue =
            serde_json::from_str(&file.content).map_err(|err| SeedError::Malformed {
                pool: pool.to_string(),
                reason: err.to_string(),
            })?;
        records(pool, parsed)
    }
}

/// In-process pools, for tests and offline bootstraps.
#[derive(Debug, Clone, Default)]
pub struct StaticSeedPool {
    pools: HashMap<String, JsonValue>,
}

impl StaticSeedPool {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_pool(mut self, pool: &str, records: JsonValue) -> Self {
        self.pools.insert(pool.to_string(), records);
        self
    }
}

#[async_trait]
impl SeedPool for StaticSeedPool {
    async fn fetch(&self, pool: &str) -> Result<Vec<SeedRecord>, SeedError> {
        let raw = self
            .pools
            .get(pool)
            .cloned()
            .ok_or_else(|| SeedError::MissingPool(pool.to_string()))?;
        records(pool, raw)
    }
}

fn records(pool: &str, raw: JsonValue) -> Result<Vec<SeedRecord>, SeedError> {
    let malformed = |reason: &str| SeedError::Malformed {
        pool: pool.to_string(),
        reason: reason.to_string(),
    };
    let JsonValue::Array(items) = raw else {
        return Err(malformed("expected a JSON array"));
    };
    items
        .into_iter()
        .map(|item| match item {
            JsonValue::Object(record) => Ok(record),
            _ => Err(malformed("every entry must be an object")),
        })
        .collect()
}
