//! Shared HTTP client for search sources.
//!
//! One pooled `reqwest::Client` serves every strategy. Each call carries its
//! own timeout, and bodies over `max_bytes` are rejected both from the
//! Content-Length header and after reading.

use bytes::Bytes;
use reqwest::{Client, header};
use std::time::{Duration, Instant};

use sift_core::AppConfig;

use crate::SourceError;

const HTML_ACCEPT: &str = "text/html,application/xhtml+xml,application/xml;q=0.9,image/webp,*/*;q=0.8";
const JSON_ACCEPT: &str = "application/json";

/// Configuration for the fetch client.
#[derive(Debug, Clone)]
pub struct FetchConfig {
    /// User agent string sent to every source.
    pub user_agent: String,

    /// Maximum response body size in bytes (default: 5MB)
    pub max_bytes: usize,

    /// Client-wide ceiling; per-call timeouts are normally shorter.
    pub timeout: Duration,

    /// Maximum number of redirects to follow (default: 5)
    pub max_redirects: usize,
}

impl Default for FetchConfig {
    fn default() -> Self {
        Self::from(&AppConfig::default())
    }
}

impl From<&AppConfig> for FetchConfig {
    fn from(config: &AppConfig) -> Self {
        Self {
            user_agent: config.user_agent.clone(),
            max_bytes: config.max_bytes,
            timeout: Duration::from_secs(30),
            max_redirects: 5,
        }
    }
}

/// HTTP client used by every extraction strategy.
#[derive(Debug, Clone)]
pub struct FetchClient {
    http: Client,
    config: FetchConfig,
}

impl FetchClient {
    /// Create a new fetch client with the given configuration.
    pub fn new(config: FetchConfig) -> Result<Self, SourceError> {
        let http = Client::builder()
            .user_agent(&config.user_agent)
            .timeout(config.timeout)
            .redirect(reqwest::redirect::Policy::limited(config.max_redirects))
            .use_rustls_tls()
            .gzip(true)
            .brotli(true)
            .deflate(true)
            .build()?;

        Ok(Self { http, config })
    }

    /// Fetch an HTML page as text.
    pub async fn get_html(&self, url: &str, query: &[(&str, &str)], timeout: Duration) -> Result<String, SourceError> {
        let headers = [("Accept", HTML_ACCEPT), ("Accept-Language", "en-US,en;q=0.9")];
        let bytes = self.get(url, query, &headers, timeout).await?;
        Ok(String::from_utf8_lossy(&bytes).into_owned())
    }

    /// Fetch and parse a JSON document.
    pub async fn get_json(
        &self, url: &str, query: &[(&str, &str)], headers: &[(&str, &str)], timeout: Duration,
    ) -> Result<serde_json::Value, SourceError> {
        let mut all = vec![("Accept", JSON_ACCEPT)];
        all.extend_from_slice(headers);
        let bytes = self.get(url, query, &all, timeout).await?;
        Ok(serde_json::from_slice(&bytes)?)
    }

    async fn get(
        &self, url: &str, query: &[(&str, &str)], headers: &[(&str, &str)], timeout: Duration,
    ) -> Result<Bytes, SourceError> {
        let start = Instant::now();

        let mut request = self.http.get(url).query(query).timeout(timeout);
        for (name, value) in headers {
            request = request.header(*name, *value);
        }

        let response = request.send().await?;
        let status = response.status();

        if status == 401 || status == 403 {
            return Err(SourceError::AuthError);
        }
        if status == 429 {
            return Err(SourceError::RateLimited);
        }
        if !status.is_success() {
            return Err(SourceError::HttpError { status: status.as_u16() });
        }

        let limit = self.config.max_bytes;
        if let Some(len) = response.content_length()
            && len as usize > limit
        {
            return Err(SourceError::TooLarge { size: len as usize, limit });
        }

        let content_type = response
            .headers()
            .get(header::CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .map(str::to_string);

        let bytes = response.bytes().await?;
        if bytes.len() > limit {
            return Err(SourceError::TooLarge { size: bytes.len(), limit });
        }

        tracing::debug!(
            url,
            status = status.as_u16(),
            content_type = content_type.as_deref().unwrap_or(""),
            bytes = bytes.len(),
            fetch_ms = start.elapsed().as_millis() as u64,
            "fetched source page"
        );

        Ok(bytes)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{header as header_eq, method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn client() -> FetchClient {
        FetchClient::new(FetchConfig::default()).unwrap()
    }

    #[test]
    fn test_fetch_config_from_app_config() {
        let app = AppConfig { max_bytes: 1024, ..Default::default() };
        let config = FetchConfig::from(&app);
        assert_eq!(config.max_bytes, 1024);
        assert!(config.user_agent.contains("Mozilla/5.0"));
        assert_eq!(config.max_redirects, 5);
    }

    #[tokio::test]
    async fn test_get_html_sends_query_and_headers() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/search"))
            .and(query_param("q", "rust lang"))
            .and(header_eq("Accept-Language", "en-US,en;q=0.9"))
            .respond_with(ResponseTemplate::new(200).set_body_string("<html>ok</html>"))
            .mount(&server)
            .await;

        let body = client()
            .get_html(&format!("{}/search", server.uri()), &[("q", "rust lang")], Duration::from_secs(5))
            .await
            .unwrap();
        assert_eq!(body, "<html>ok</html>");
    }

    #[tokio::test]
    async fn test_get_json_parses_body() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(header_eq("X-Token", "secret"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({"ok": true})))
            .mount(&server)
            .await;

        let value = client()
            .get_json(&server.uri(), &[], &[("X-Token", "secret")], Duration::from_secs(5))
            .await
            .unwrap();
        assert_eq!(value["ok"], true);
    }

    #[tokio::test]
    async fn test_status_mapping() {
        let server = MockServer::start().await;
        for (route, status) in [("/auth", 403), ("/limited", 429), ("/down", 503)] {
            Mock::given(path(route))
                .respond_with(ResponseTemplate::new(status))
                .mount(&server)
                .await;
        }

        let c = client();
        let t = Duration::from_secs(5);
        let auth = c.get_html(&format!("{}/auth", server.uri()), &[], t).await;
        assert!(matches!(auth, Err(SourceError::AuthError)));
        let limited = c.get_html(&format!("{}/limited", server.uri()), &[], t).await;
        assert!(matches!(limited, Err(SourceError::RateLimited)));
        let down = c.get_html(&format!("{}/down", server.uri()), &[], t).await;
        assert!(matches!(down, Err(SourceError::HttpError { status: 503 })));
    }

    #[tokio::test]
    async fn test_body_over_limit_rejected() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(200).set_body_string("x".repeat(64)))
            .mount(&server)
            .await;

        let small = FetchClient::new(FetchConfig { max_bytes: 16, ..Default::default() }).unwrap();
        let result = small.get_html(&server.uri(), &[], Duration::from_secs(5)).await;
        assert!(matches!(result, Err(SourceError::TooLarge { limit: 16, .. })));
    }

    #[tokio::test]
    async fn test_slow_response_times_out() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(200).set_delay(Duration::from_millis(500)))
            .mount(&server)
            .await;

        let result = client().get_html(&server.uri(), &[], Duration::from_millis(50)).await;
        assert!(matches!(result, Err(SourceError::Timeout)));
    }

    #[tokio::test]
    async fn test_connection_refused_is_network_error() {
        let result = client()
            .get_html("http://127.0.0.1:1/", &[], Duration::from_secs(2))
            .await;
        assert!(matches!(result, Err(SourceError::Network(_))));
    }
}
