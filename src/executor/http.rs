//! Executor backed by an external placement worker reached over HTTP

use super::{BetExecutor, ExecutionReport};
use crate::error::Result;
use crate::types::BetRecord;
use async_trait::async_trait;
use reqwest::Client;
use serde_json::Value;
use std::time::Duration;

/// Posts each bet to `{base_url}/bets` and reads back a JSON verdict
pub struct HttpWorkerExecutor {
    http: Client,
    base_url: String,
}

impl HttpWorkerExecutor {
    pub fn new(base_url: &str, timeout: Duration) -> Result<Self> {
        let http = Client::builder().timeout(timeout).build()?;

        Ok(Self {
            http,
            base_url: base_url.trim_end_matches('/').to_string(),
        })
    }
}

#[async_trait]
impl BetExecutor for HttpWorkerExecutor {
    fn name(&self) -> &'static str {
        "http_worker"
    }

    async fn place_bet(&self, bet: &BetRecord) -> Result<ExecutionReport> {
        let url = format!("{}/bets", self.base_url);
        let resp = self.http.post(&url).json(bet).send().await?;
        let status = resp.status();
        let body: Value = resp.json().await.unwrap_or(Value::Null);

        if !status.is_success() {
            let reason = body["error"]
                .as_str()
                .map(str::to_string)
                .unwrap_or_else(|| format!("worker returned {}", status));
            return Ok(ExecutionReport::failed(reason));
        }

        let success = body["success"].as_bool().unwrap_or(true);
        let error = body["error"].as_str().map(str::to_string);
        tracing::debug!("Worker replied {} for {}", status, bet.summary());

        Ok(ExecutionReport {
            success,
            error: if success { None } else { error.or_else(|| Some("rejected by worker".into())) },
            details: Some(body),
        })
    }
}
