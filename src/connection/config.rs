use clap::Parser;
use std::time::Duration;

/// Process configuration, read once at startup.
///
/// Every field can come from a flag or the matching environment variable.
#[derive(Debug, Clone, Parser)]
#[command(name = "quizgate", about = "Role-gated quiz records over HTTP")]
pub struct AppConfig {
    /// Interface to bind
    #[arg(long, env = "APP_HOST", default_value = "127.0.0.1")]
    pub host: String,

    /// Port to bind
    #[arg(long, env = "APP_PORT", default_value_t = 3000)]
    pub port: u16,

    /// Gist holding the seed pools (`<pool>.json` files)
    #[arg(long, env = "SEED_GIST_HASH")]
    pub seed_gist_hash: Option<String>,

    #[arg(long, env = "SEED_BASE_URL", default_value = "https://api.github.com/gists")]
    pub seed_base_url: String,

    /// Seconds before a seed pool fetch is abandoned
    #[arg(long, env = "SEED_TIMEOUT_SECS", default_value_t = 10)]
    pub seed_timeout_secs: u64,

    /// Bearer token bound to a bootstrap SUPER_USER session
    #[arg(long, env = "BOOTSTRAP_TOKEN")]
    pub bootstrap_token: Option<String>,

    /// bcrypt work factor for stored passwords
    #[arg(long, env = "BCRYPT_COST", default_value_t = bcrypt::DEFAULT_COST)]
    pub bcrypt_cost: u32,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 3000,
            seed_gist_hash: None,
            seed_base_url: "https://api.github.com/gists".to_string(),
            seed_timeout_secs: 10,
            bootstrap_token: None,
            bcrypt_cost: bcrypt::DEFAULT_COST,
        }
    }
}

impl AppConfig {
    pub fn address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    pub fn seed_timeout(&self) -> Duration {
        Duration::from_secs(self.seed_timeout_secs)
    }

    /// Set the bcrypt cost
    pub fn bcrypt_cost(mut self, cost: u32) -> Self {
        self.bcrypt_cost = cost;
        self
    }

    /// Set the seed gist
    pub fn seed_gist(mut self, base_url: &str, hash: &str) -> Self {
        self.seed_base_url = base_url.to_string();
        self.seed_gist_hash = Some(hash.to_string());
        self
    }
}
