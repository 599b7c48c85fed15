//! HTTP client utilities.

use reqwest::header::{HeaderMap, HeaderValue, ACCEPT, ACCEPT_LANGUAGE, USER_AGENT};
use reqwest::{Client, RequestBuilder, Response};
use std::sync::Arc;
use std::time::Duration;

use crate::sources::SourceError;

/// User agent sent to sites that reject non-browser clients.
pub const BROWSER_USER_AGENT: &str = "Mozilla/5.0 (Windows NT 10.0; Win64; x64) \
     AppleWebKit/537.36 (KHTML, like Gecko) Chrome/124.0 Safari/537.36";

/// Shared HTTP client with sensible defaults
#[derive(Debug, Clone)]
pub struct HttpClient {
    client: Arc<Client>,
}

impl HttpClient {
    /// Create a new HTTP client with default settings
    pub fn new() -> Result<Self, SourceError> {
        Self::with_user_agent(concat!(
            env!("CARGO_PKG_NAME"),
            "/",
            env!("CARGO_PKG_VERSION")
        ))
    }

    /// Create a new HTTP client with a custom user agent
    pub fn with_user_agent(user_agent: &str) -> Result<Self, SourceError> {
        Self::with_timeout(user_agent, Duration::from_secs(30))
    }

    /// Create a client with an explicit per-request timeout
    pub fn with_timeout(user_agent: &str, timeout: Duration) -> Result<Self, SourceError> {
        let client = Client::builder()
            .user_agent(user_agent)
            .timeout(timeout)
            .connect_timeout(Duration::from_secs(10))
            .pool_idle_timeout(Duration::from_secs(90))
            .build()
            .map_err(|e| SourceError::Config(format!("Failed to create HTTP client: {}", e)))?;

        Ok(Self {
            client: Arc::new(client),
        })
    }

    /// Create a client that presents itself as a desktop browser.
    ///
    /// It also streams asset downloads, so only individual reads are bounded,
    /// never the whole body.
    pub fn browser() -> Result<Self, SourceError> {
        Self::browser_with_read_timeout(Duration::from_secs(60))
    }

    pub fn browser_with_read_timeout(read_timeout: Duration) -> Result<Self, SourceError> {
        let client = Client::builder()
            .default_headers(browser_headers())
            .read_timeout(read_timeout)
            .connect_timeout(Duration::from_secs(10))
            .pool_idle_timeout(Duration::from_secs(90))
            .build()
            .map_err(|e| SourceError::Config(format!("Failed to create HTTP client: {}", e)))?;

        Ok(Self {
            client: Arc::new(client),
        })
    }

    /// Create from an existing reqwest Client
    pub fn from_client(client: Arc<Client>) -> Self {
        Self { client }
    }

    /// Get the underlying client
    pub fn client(&self) -> &Client {
        &self.client
    }

    pub fn get(&self, url: &str) -> RequestBuilder {
        self.client.get(url)
    }

    pub fn post(&self, url: &str) -> RequestBuilder {
        self.client.post(url)
    }
}

/// Headers that make scraping requests look like an ordinary browser visit
pub fn browser_headers() -> HeaderMap {
    let mut headers = HeaderMap::new();
    headers.insert(USER_AGENT, HeaderValue::from_static(BROWSER_USER_AGENT));
    headers.insert(
        ACCEPT,
        HeaderValue::from_static("text/html,application/xhtml+xml,application/json;q=0.9,*/*;q=0.8"),
    );
    headers.insert(ACCEPT_LANGUAGE, HeaderValue::from_static("en-US,en;q=0.9"));
    headers
}

/// Turn a non-success response into a [`SourceError::Http`].
pub async fn check_status(response: Response, provider: &str) -> Result<Response, SourceError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }

    let body = response.text().await.unwrap_or_default();
    let snippet: String = body.chars().take(200).collect();
    Err(SourceError::Http {
        status: status.as_u16(),
        message: format!("{} returned {}: {}", provider, status, snippet.trim()),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_browser_headers() {
        let headers = browser_headers();
        assert!(headers.get(USER_AGENT).is_some());
        assert!(headers.get(ACCEPT_LANGUAGE).is_some());
    }

    #[tokio::test]
    async fn test_check_status_maps_client_error() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("GET", "/missing")
            .with_status(404)
            .with_body("nope")
            .create_async()
            .await;

        let client = HttpClient::new().unwrap();
        let response = client
            .get(&format!("{}/missing", server.url()))
            .send()
            .await
            .unwrap();
        let err = check_status(response, "Test").await.unwrap_err();

        mock.assert_async().await;
        assert!(err.is_client_error());
        assert!(err.to_string().contains("404"));
    }

    #[tokio::test]
    async fn test_browser_client_survives_slow_streamed_body() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("GET", "/slides.zip")
            .with_status(200)
            .with_chunked_body(|w| {
                for chunk in [b"PK".as_slice(), b"slow".as_slice(), b"zip".as_slice()] {
                    std::thread::sleep(Duration::from_millis(400));
                    w.write_all(chunk)?;
                }
                Ok(())
            })
            .create_async()
            .await;

        let client = HttpClient::browser_with_read_timeout(Duration::from_secs(1)).unwrap();
        let body = client
            .get(&format!("{}/slides.zip", server.url()))
            .send()
            .await
            .unwrap()
            .bytes()
            .await
            .unwrap();

        mock.assert_async().await;
        assert_eq!(body.as_ref(), b"PKslowzip");
    }
}
