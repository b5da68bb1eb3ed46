//! HTTP gateway: talks to the management API over JSON/HTTP via reqwest.

use async_trait::async_trait;
use secrecy::{ExposeSecret, SecretString};
use serde::de::DeserializeOwned;
use tracing::{debug, warn};

use super::gateway::CrawlerGateway;
use super::model::{CrawlerInfo, CrawlerList, CrawlerPatch, CrawlerSpec};
use crate::config::ConsoleConfig;
use crate::error::{ConfigError, RemoteError};

/// Longest error body carried into a `RemoteError` message.
const MAX_ERROR_BODY_CHARS: usize = 300;

/// Management API client.
pub struct HttpGateway {
    base_url: String,
    api_token: Option<SecretString>,
    client: reqwest::Client,
}

impl HttpGateway {
    pub fn new(config: &ConsoleConfig) -> Result<Self, ConfigError> {
        let client = reqwest::Client::builder()
            .timeout(config.request_timeout)
            .user_agent(concat!("crawler-console/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| ConfigError::HttpClient(e.to_string()))?;

        Ok(Self {
            base_url: config.base_url.trim_end_matches('/').to_string(),
            api_token: config.api_token.clone(),
            client,
        })
    }

    fn crawlers_url(&self, process_id: i64) -> String {
        format!("{}/api/crawler/process/{process_id}/crawler", self.base_url)
    }

    fn crawler_url(&self, process_id: i64, crawler_id: i64) -> String {
        format!("{}/{crawler_id}", self.crawlers_url(process_id))
    }

    fn authorize(&self, req: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        match &self.api_token {
            Some(token) => req.bearer_auth(token.expose_secret()),
            None => req,
        }
    }

    /// Send a request and turn non-2xx responses into `RemoteError`.
    async fn send(&self, req: reqwest::RequestBuilder) -> Result<reqwest::Response, RemoteError> {
        let resp = self.authorize(req).send().await?;
        let status = resp.status();
        if status.is_success() {
            return Ok(resp);
        }

        let body = resp.text().await.unwrap_or_default();
        let message = error_message(&body)
            .or_else(|| status.canonical_reason().map(str::to_string))
            .unwrap_or_else(|| "request failed".to_string());
        Err(RemoteError::new(Some(status.as_u16()), message))
    }

    async fn decode<T: DeserializeOwned>(resp: reqwest::Response) -> Result<T, RemoteError> {
        let status = resp.status().as_u16();
        let bytes = resp.bytes().await?;
        serde_json::from_slice(&bytes).map_err(|e| {
            RemoteError::new(Some(status), format!("Invalid response body: {e}"))
        })
    }
}

/// Pull a readable message out of an error body: the JSON `message` field
/// when present, otherwise the trimmed text.
fn error_message(body: &str) -> Option<String> {
    let body = body.trim();
    if body.is_empty() {
        return None;
    }
    if let Ok(value) = serde_json::from_str::<serde_json::Value>(body)
        && let Some(msg) = value.get("message").and_then(|m| m.as_str())
    {
        return Some(msg.to_string());
    }
    Some(body.chars().take(MAX_ERROR_BODY_CHARS).collect())
}

/// Decode the body of a successful create. The crawler already exists at this
/// point, so a body that is not a crawler record is logged and dropped.
fn created_record(process_id: i64, body: &[u8]) -> Option<CrawlerInfo> {
    if body.iter().all(u8::is_ascii_whitespace) {
        debug!(process_id, "Create returned no body");
        return None;
    }
    match serde_json::from_slice(body) {
        Ok(info) => Some(info),
        Err(e) => {
            warn!(process_id, "Create succeeded but the response was not a crawler: {e}");
            None
        }
    }
}

#[async_trait]
impl CrawlerGateway for HttpGateway {
    async fn list_crawlers(&self, process_id: i64) -> Result<CrawlerList, RemoteError> {
        let resp = self
            .send(self.client.get(self.crawlers_url(process_id)))
            .await?;
        let list: CrawlerList = Self::decode(resp).await?;
        debug!(
            process_id,
            crawlers = list.crawler_list.len(),
            "Fetched crawler list"
        );
        Ok(list)
    }

    async fn create_crawler(
        &self,
        process_id: i64,
        spec: &CrawlerSpec,
    ) -> Result<Option<CrawlerInfo>, RemoteError> {
        let resp = self
            .send(self.client.post(self.crawlers_url(process_id)).json(spec))
            .await?;
        let bytes = resp.bytes().await?;
        Ok(created_record(process_id, &bytes))
    }

    async fn update_crawler(
        &self,
        process_id: i64,
        crawler_id: i64,
        patch: &CrawlerPatch,
    ) -> Result<(), RemoteError> {
        self.send(
            self.client
                .patch(self.crawler_url(process_id, crawler_id))
                .json(patch),
        )
        .await?;
        Ok(())
    }

    async fn delete_crawler(&self, process_id: i64, crawler_id: i64) -> Result<(), RemoteError> {
        self.send(self.client.delete(self.crawler_url(process_id, crawler_id)))
            .await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn urls_are_built_from_base() {
        let cfg = ConsoleConfig {
            base_url: "http://admin.local:8080/".to_string(),
            ..Default::default()
        };
        let gw = HttpGateway::new(&cfg).unwrap();
        assert_eq!(
            gw.crawlers_url(3),
            "http://admin.local:8080/api/crawler/process/3/crawler"
        );
        assert_eq!(
            gw.crawler_url(3, 17),
            "http://admin.local:8080/api/crawler/process/3/crawler/17"
        );
    }

    #[test]
    fn error_message_prefers_json_message() {
        assert_eq!(
            error_message(r#"{"code": 400, "message": "name taken"}"#).as_deref(),
            Some("name taken")
        );
        assert_eq!(error_message("  plain failure \n").as_deref(), Some("plain failure"));
        assert_eq!(error_message("   "), None);
    }

    #[test]
    fn created_record_tolerates_missing_or_foreign_bodies() {
        let body = br#"{"id": 12, "status": "stopped", "name": "alpha"}"#;
        let info = created_record(1, body).unwrap();
        assert_eq!(info.id, 12);
        assert_eq!(info.name, "alpha");

        assert!(created_record(1, b"").is_none());
        assert!(created_record(1, b" \n").is_none());
        assert!(created_record(1, br#"{"data": {"id": 12}}"#).is_none());
        assert!(created_record(1, b"OK").is_none());
    }

    #[test]
    fn error_message_truncates_long_bodies() {
        let body = "x".repeat(1000);
        assert_eq!(error_message(&body).unwrap().len(), MAX_ERROR_BODY_CHARS);
    }
}
