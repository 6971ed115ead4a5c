//! Result Reporter
//!
//! Sends one record per solved puzzle to the remote leaderboard ledger.
//!
//! Reporting is a side channel: the session spawns the call and never waits
//! for it, and a failure is logged and dropped. The local completion always
//! stands.
//!
//! The ledger is a hosted Postgres REST endpoint:
//! ```text
//! POST {url}/rest/v1/{table}
//! apikey: <anon key>
//! Authorization: Bearer <anon key>
//! { "team_name", "question_id", "time_spent", "attempts", "completed_at" }
//! ```

use async_trait::async_trait;
use chrono::{DateTime, SecondsFormat, Utc};
use serde::{Deserialize, Serialize};
use std::time::Duration;
use thiserror::Error;
use tracing::debug;

use crate::config::LedgerConfig;

#[derive(Debug, Error)]
pub enum ReportError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),
    #[error("Ledger rejected record: {status} {body}")]
    Rejected { status: u16, body: String },
    #[error("Reporter unavailable: {0}")]
    Unavailable(String),
}

/// Wire shape of one leaderboard row.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CompletionRecord {
    pub team_name: String,
    pub question_id: String,
    /// Seconds spent on the puzzle.
    pub time_spent: u64,
    pub attempts: u32,
    /// ISO-8601, UTC.
    pub completed_at: String,
}

impl CompletionRecord {
    pub fn new(
        team_name: impl Into<String>,
        question_id: impl Into<String>,
        time_spent: u64,
        attempts: u32,
        completed_at: DateTime<Utc>,
    ) -> Self {
        Self {
            team_name: team_name.into(),
            question_id: question_id.into(),
            time_spent,
            attempts,
            completed_at: completed_at.to_rfc3339_opts(SecondsFormat::Millis, true),
        }
    }
}

#[async_trait]
pub trait ResultReporter: Send + Sync {
    async fn report(&self, record: &CompletionRecord) -> Result<(), ReportError>;
}

/// Reporter used when no ledger is configured.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopReporter;

#[async_trait]
impl ResultReporter for NoopReporter {
    async fn report(&self, record: &CompletionRecord) -> Result<(), ReportError> {
        debug!(
            "No ledger configured, skipping report for {} / {}",
            record.team_name, record.question_id
        );
        Ok(())
    }
}

/// HTTP reporter for the hosted leaderboard table.
pub struct LedgerReporter {
    endpoint: String,
    anon_key: String,
    client: reqwest::Client,
}

impl LedgerReporter {
    pub fn new(config: &LedgerConfig) -> Result<Self, ReportError> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()?;

        Ok(Self {
            endpoint: format!(
                "{}/rest/v1/{}",
                config.url.trim_end_matches('/'),
                config.table
            ),
            anon_key: config.anon_key.clone(),
            client,
        })
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }
}

#[async_trait]
impl ResultReporter for LedgerReporter {
    async fn report(&self, record: &CompletionRecord) -> Result<(), ReportError> {
        let resp = self
            .client
            .post(&self.endpoint)
            .header("apikey", &self.anon_key)
            .bearer_auth(&self.anon_key)
            .header("Prefer", "return=minimal")
            .json(record)
            .send()
            .await?;

        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            return Err(ReportError::Rejected {
                status: status.as_u16(),
                body,
            });
        }

        debug!(
            "Reported {} / {} to ledger ({} s, {} attempts)",
            record.team_name, record.question_id, record.time_spent, record.attempts
        );
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use httpmock::prelude::*;

    fn ledger_config(url: String) -> LedgerConfig {
        LedgerConfig {
            url,
            anon_key: "anon-key".to_string(),
            table: "leaderboard".to_string(),
            timeout_secs: 5,
        }
    }

    fn sample_record() -> CompletionRecord {
        CompletionRecord::new(
            "NEXUS",
            "q3",
            125,
            4,
            Utc.with_ymd_and_hms(2025, 3, 14, 9, 30, 0).unwrap(),
        )
    }

    #[test]
    fn test_completion_record_wire_shape() {
        let json = serde_json::to_value(sample_record()).unwrap();
        assert_eq!(
            json,
            serde_json::json!({
                "team_name": "NEXUS",
                "question_id": "q3",
                "time_spent": 125,
                "attempts": 4,
                "completed_at": "2025-03-14T09:30:00.000Z",
            })
        );
    }

    #[test]
    fn test_endpoint_strips_trailing_slash() {
        let reporter = LedgerReporter::new(&ledger_config("https://x.example/".into())).unwrap();
        assert_eq!(reporter.endpoint(), "https://x.example/rest/v1/leaderboard");
    }

    #[tokio::test]
    async fn test_ledger_reporter_posts_record() {
        let server = MockServer::start_async().await;
        let mock = server
            .mock_async(|when, then| {
                when.method(POST)
                    .path("/rest/v1/leaderboard")
                    .header("apikey", "anon-key")
                    .header("authorization", "Bearer anon-key")
                    .json_body(serde_json::to_value(sample_record()).unwrap());
                then.status(201);
            })
            .await;

        let reporter = LedgerReporter::new(&ledger_config(server.base_url())).unwrap();
        reporter.report(&sample_record()).await.unwrap();

        mock.assert_async().await;
    }

    #[tokio::test]
    async fn test_ledger_reporter_surfaces_rejection() {
        let server = MockServer::start_async().await;
        server
            .mock_async(|when, then| {
                when.method(POST).path("/rest/v1/leaderboard");
                then.status(401).body("invalid api key");
            })
            .await;

        let reporter = LedgerReporter::new(&ledger_config(server.base_url())).unwrap();
        let err = reporter.report(&sample_record()).await.unwrap_err();
        assert!(matches!(err, ReportError::Rejected { status: 401, ref body } if body == "invalid api key"));
    }

    #[tokio::test]
    async fn test_noop_reporter_accepts_everything() {
        assert!(NoopReporter.report(&sample_record()).await.is_ok());
    }
}
