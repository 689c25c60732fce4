use anyhow::Context as _;
use serde::{de::Error as _, Deserialize, Serialize};
use std::{path::Path, time::Duration};

#[derive(Copy, Clone, Debug, Serialize)]
pub enum Env {
    Prod,
    Dev,
}

impl Env {
    pub fn is_dev(self) -> bool {
        use Env::*;
        match self {
            Dev => true,
            Prod => false,
        }
    }
}

impl<'de> serde::de::Deserialize<'de> for Env {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::de::Deserializer<'de>,
    {
        let s: String = serde::de::Deserialize::deserialize(deserializer)?;
        match s.as_str() {
            "dev" | "devel" | "development" => Ok(Env::Dev),
            "prod" | "production" => Ok(Env::Prod),
            _ => Err(D::Error::custom("unknown environment")),
        }
    }
}

fn default_env() -> Env {
    if cfg!(debug_assertions) {
        Env::Dev
    } else {
        Env::Prod
    }
}

/// Blob store endpoint. The public-object URL rule lives here so that the
/// uploader and the link resolver agree on it.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
#[serde(rename_all = "kebab-case")]
pub struct StoreConfig {
    /// Base URL of the hosted store, scheme and host only.
    pub base_url: String,
    #[serde(default = "default_bucket")]
    pub bucket: String,
}

impl StoreConfig {
    /// Canonical public retrieval URL for an object key. Deterministic,
    /// unsigned, no expiry; visibility is a bucket-policy concern.
    pub fn public_object_url(&self, key: &str) -> String {
        format!(
            "{}/storage/v1/object/public/{}/{}",
            self.base_url.trim_end_matches('/'),
            self.bucket,
            key
        )
    }
}

fn default_bucket() -> String {
    "uploads".to_string()
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
#[serde(rename_all = "kebab-case")]
pub struct NotifyConfig {
    /// Function endpoint the evaluation notice is posted to.
    pub endpoint: String,
    #[serde(default = "default_notify_timeout_secs")]
    pub timeout_secs: u64,
}

impl NotifyConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

fn default_notify_timeout_secs() -> u64 {
    3
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
#[serde(rename_all = "kebab-case")]
pub struct TimeoutsConfig {
    #[serde(default = "default_lookup_secs")]
    pub lookup_secs: u64,
    #[serde(default = "default_persist_secs")]
    pub persist_secs: u64,
}

impl TimeoutsConfig {
    pub fn lookup(&self) -> Duration {
        Duration::from_secs(self.lookup_secs)
    }

    pub fn persist(&self) -> Duration {
        Duration::from_secs(self.persist_secs)
    }
}

impl Default for TimeoutsConfig {
    fn default() -> Self {
        TimeoutsConfig {
            lookup_secs: default_lookup_secs(),
            persist_secs: default_persist_secs(),
        }
    }
}

fn default_lookup_secs() -> u64 {
    10
}

fn default_persist_secs() -> u64 {
    10
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
#[serde(rename_all = "kebab-case")]
pub struct PortalConfig {
    pub store: StoreConfig,
    pub notify: NotifyConfig,
    #[serde(default)]
    pub timeouts: TimeoutsConfig,
    #[serde(default = "default_env")]
    pub env: Env,
}

impl PortalConfig {
    pub fn obtain(config_path: &Path) -> anyhow::Result<PortalConfig> {
        if !config_path.exists() {
            anyhow::bail!("Portal config {} does not exist", config_path.display());
        }
        let config = std::fs::read(config_path).context("failed to read config")?;
        let config = serde_yaml::from_slice(&config).context("parse error")?;

        Ok(config)
    }

    /// Key the notification endpoint is called with.
    pub fn notify_api_key(&self) -> String {
        std::env::var("PORTAL_NOTIFY_KEY").unwrap_or_else(|_| {
            if let Env::Dev = self.env {
                String::from("DEVEL_HARDCODED_KEY")
            } else {
                panic!("Error: running in production mode, but PORTAL_NOTIFY_KEY not specified");
            }
        })
    }
}
