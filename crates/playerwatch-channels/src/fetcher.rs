//! Reporting API client.

use std::time::Instant;

use async_trait::async_trait;
use playerwatch_core::{PlayerSource, PlayerwatchError, Result};

/// Fetches the raw player roster: `POST <url>` with `{"report_api_key": ...}`.
pub struct HttpFetcher {
    client: reqwest::Client,
    url: String,
    api_key: String,
}

impl HttpFetcher {
    pub fn new(client: reqwest::Client, url: impl Into<String>, api_key: impl Into<String>) -> Self {
        Self {
            client,
            url: url.into(),
            api_key: api_key.into(),
        }
    }

    /// Raw response body. Anything but `200 OK` is an error.
    pub async fn data(&self) -> Result<Vec<u8>> {
        let start = Instant::now();

        let resp = self
            .client
            .post(&self.url)
            .json(&serde_json::json!({ "report_api_key": self.api_key }))
            .send()
            .await
            .map_err(|e| {
                tracing::error!("Error sending request: {e}");
                PlayerwatchError::Http(format!("request failed: {e}"))
            })?;

        let status = resp.status();
        if status != reqwest::StatusCode::OK {
            tracing::error!(status = status.as_u16(), "Invalid status code");
            return Err(PlayerwatchError::Http(format!("unexpected status {status}")));
        }

        let body = resp.bytes().await.map_err(|e| {
            tracing::error!("Error reading response body: {e}");
            PlayerwatchError::Http(format!("read body: {e}"))
        })?;

        tracing::debug!(bytes = body.len(), elapsed = ?start.elapsed(), "Players fetched");
        Ok(body.to_vec())
    }
}

#[async_trait]
impl PlayerSource for HttpFetcher {
    async fn fetch(&self) -> Result<Vec<u8>> {
        self.data().await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::{Json, Router, http::StatusCode, routing::post};

    async fn serve(app: Router) -> String {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });
        format!("http://{addr}/report")
    }

    async fn report(Json(req): Json<serde_json::Value>) -> (StatusCode, String) {
        if req["report_api_key"] == "good-key" {
            (StatusCode::OK, r#"[{"id":"1"}]"#.to_string())
        } else {
            (StatusCode::UNAUTHORIZED, "denied".to_string())
        }
    }

    #[tokio::test]
    async fn test_fetch_sends_api_key() {
        let url = serve(Router::new().route("/report", post(report))).await;
        let fetcher = HttpFetcher::new(reqwest::Client::new(), url, "good-key");

        let body = fetcher.fetch().await.unwrap();
        assert_eq!(body, br#"[{"id":"1"}]"#);
    }

    #[tokio::test]
    async fn test_non_ok_status_is_error() {
        let url = serve(Router::new().route("/report", post(report))).await;
        let fetcher = HttpFetcher::new(reqwest::Client::new(), url, "bad-key");

        let err = fetcher.fetch().await.unwrap_err();
        assert!(matches!(err, PlayerwatchError::Http(msg) if msg.contains("401")));
    }

    #[tokio::test]
    async fn test_unreachable_host_is_error() {
        let fetcher = HttpFetcher::new(reqwest::Client::new(), "http://127.0.0.1:1/report", "k");
        assert!(matches!(fetcher.fetch().await, Err(PlayerwatchError::Http(_))));
    }
}
