//! REST collaborator client. Ordinary calls authenticate via bearer header;
//! the shutdown beacon authenticates via a query-string token because that
//! delivery path cannot carry custom headers.

use std::time::Duration;

use chrono::{DateTime, SecondsFormat, Utc};

use mailwatch_core::api::{ApiError, MailApi, TelemetrySink};
use mailwatch_core::types::{EngagementEvent, MessageSummary, ViewSessionRecord};

/// Beacon delivery gets a short deadline: shutdown must not hang on it.
const BEACON_TIMEOUT: Duration = Duration::from_secs(2);

pub struct HttpMailApi {
    client: reqwest::Client,
    base_url: String,
    token: Option<String>,
}

impl HttpMailApi {
    pub fn new(base_url: impl Into<String>, token: Option<String>) -> Self {
        Self {
            client: reqwest::Client::new(),
            base_url: base_url.into().trim_end_matches('/').to_string(),
            token,
        }
    }

    fn url(&self, path: &str) -> String {
        format!("{}{path}", self.base_url)
    }

    fn authorized(&self, req: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        match &self.token {
            Some(token) => req.bearer_auth(token),
            None => req,
        }
    }

    async fn post_json(&self, path: &str, body: &serde_json::Value) -> Result<(), ApiError> {
        let response = self
            .authorized(self.client.post(self.url(path)).json(body))
            .send()
            .await
            .map_err(|e| ApiError::Transport(e.to_string()))?;
        if !response.status().is_success() {
            return Err(ApiError::Status(response.status().as_u16()));
        }
        Ok(())
    }
}

impl MailApi for HttpMailApi {
    async fn messages_after(
        &self,
        after: DateTime<Utc>,
        limit: u32,
    ) -> Result<Vec<MessageSummary>, ApiError> {
        let response = self
            .authorized(self.client.get(self.url("/api/emails")).query(&[
                ("after", after.to_rfc3339_opts(SecondsFormat::Millis, true)),
                ("limit", limit.to_string()),
            ]))
            .send()
            .await
            .map_err(|e| ApiError::Transport(e.to_string()))?;
        if !response.status().is_success() {
            return Err(ApiError::Status(response.status().as_u16()));
        }
        response
            .json::<Vec<MessageSummary>>()
            .await
            .map_err(|e| ApiError::Decode(e.to_string()))
    }
}

impl TelemetrySink for HttpMailApi {
    async fn record_event(&self, event: EngagementEvent) -> Result<(), ApiError> {
        let body = serde_json::json!({
            "event_type": event.event_type,
            "email_id": event.email_id,
            "event_data": event.event_data,
        });
        self.post_json("/api/engagement/events", &body).await
    }

    async fn persist_session(&self, record: &ViewSessionRecord) -> Result<(), ApiError> {
        let body = serde_json::to_value(record).map_err(|e| ApiError::Decode(e.to_string()))?;
        self.post_json("/api/engagement/sessions", &body).await
    }

    async fn beacon_session(&self, record: &ViewSessionRecord) {
        let Ok(body) = serde_json::to_value(record) else {
            return;
        };
        let mut req = self
            .client
            .post(self.url("/api/engagement/sessions/beacon"))
            .timeout(BEACON_TIMEOUT)
            .json(&body);
        if let Some(token) = &self.token {
            req = req.query(&[("token", token)]);
        }
        // Best-effort: no retry, no propagation. The send either lands or
        // the measurement is lost with the process.
        match req.send().await {
            Ok(response) if !response.status().is_success() => {
                tracing::debug!(status = response.status().as_u16(), "beacon rejected");
            }
            Ok(_) => {}
            Err(e) => {
                tracing::debug!(error = %e, "beacon send failed");
            }
        }
    }
}
