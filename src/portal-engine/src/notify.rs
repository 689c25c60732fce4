//! Outbound evaluation notice, posted to the hosted function endpoint.

use async_trait::async_trait;
use db::schema::Decision;
use serde::Serialize;
use std::time::Duration;

/// Wire format of the notification function.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct EvalNotice {
    pub to_email: String,
    pub full_name: String,
    pub status: Decision,
    pub feedback: String,
}

#[async_trait]
pub trait Notifier: Send + Sync {
    async fn send(&self, notice: EvalNotice) -> anyhow::Result<()>;
}

/// Posts the notice over HTTP. Best-effort relative to the persisted
/// decision: callers decide how to surface a failure, nothing is retried
/// here.
pub struct FunctionNotifier {
    endpoint: String,
    api_key: String,
    timeout: Duration,
}

impl FunctionNotifier {
    pub fn new(endpoint: String, api_key: String, timeout: Duration) -> FunctionNotifier {
        FunctionNotifier {
            endpoint,
            api_key,
            timeout,
        }
    }

    pub fn from_config(cfg: &crate::config::PortalConfig) -> FunctionNotifier {
        FunctionNotifier::new(
            cfg.notify.endpoint.clone(),
            cfg.notify_api_key(),
            cfg.notify.timeout(),
        )
    }
}

#[async_trait]
impl Notifier for FunctionNotifier {
    async fn send(&self, notice: EvalNotice) -> anyhow::Result<()> {
        use anyhow::Context as _;
        let client = reqwest::ClientBuilder::new()
            .timeout(self.timeout)
            .build()
            .context("failed to initialize http client")?;
        let response = client
            .post(&self.endpoint)
            .bearer_auth(&self.api_key)
            .json(&notice)
            .send()
            .await
            .context("notification endpoint unreachable")?;
        if !response.status().is_success() {
            anyhow::bail!("notification endpoint returned {}", response.status());
        }
        Ok(())
    }
}
