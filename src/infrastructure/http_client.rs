//! HTTP client for dashboard access with cookie session handling
//!
//! Thin wrapper over reqwest configured for the carrier dashboard: bounded
//! timeout, generic user agent, shared cookie jar, gzip and limited
//! redirects. One instance plus its jar make up an authenticated session;
//! a fresh instance always starts from an empty jar.

use anyhow::{anyhow, Result};
use reqwest::cookie::Jar;
use reqwest::{Client, ClientBuilder, Response};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, error};

/// Configuration for HTTP client behavior.
#[derive(Debug, Clone)]
pub struct HttpClientConfig {
    /// Request timeout in seconds.
    pub timeout_seconds: u64,
    /// User agent string.
    pub user_agent: String,
}

impl Default for HttpClientConfig {
    fn default() -> Self {
        Self {
            timeout_seconds: crate::infrastructure::config::defaults::REQUEST_TIMEOUT_SECONDS,
            user_agent: crate::infrastructure::config::defaults::USER_AGENT.to_string(),
        }
    }
}

/// HTTP client bound to a cookie jar.
#[derive(Clone)]
pub struct HttpClient {
    client: Client,
    jar: Arc<Jar>,
}

impl HttpClient {
    /// Create a new client with a fresh, empty cookie jar.
    pub fn with_config(config: &HttpClientConfig) -> Result<Self> {
        let jar = Arc::new(Jar::default());
        let client = ClientBuilder::new()
            .timeout(Duration::from_secs(config.timeout_seconds))
            .user_agent(&config.user_agent)
            .cookie_provider(jar.clone())
            .gzip(true)
            .redirect(reqwest::redirect::Policy::limited(10))
            .build()
            .map_err(|e| anyhow!("Failed to create HTTP client: {}", e))?;

        Ok(Self { client, jar })
    }

    /// Shared cookie jar backing this client. Read-only for callers; the
    /// jar itself is updated by responses flowing through the client.
    pub fn cookie_jar(&self) -> Arc<Jar> {
        self.jar.clone()
    }

    /// Fetch a URL, erroring on non-success status.
    pub async fn fetch_response(&self, url: &str) -> Result<Response> {
        debug!("HTTP GET: {}", url);
        let response = self
            .client
            .get(url)
            .send()
            .await
            .map_err(|e| anyhow!("HTTP request failed: {}", e))?;

        if !response.status().is_success() {
            error!("HTTP error {}: {}", response.status(), url);
            return Err(anyhow!("HTTP error {}: {}", response.status(), url));
        }

        Ok(response)
    }

    /// Fetch the markup of a page as a string.
    pub async fn fetch_html_string(&self, url: &str) -> Result<String> {
        let response = self.fetch_response(url).await?;
        let html = response
            .text()
            .await
            .map_err(|e| anyhow!("Failed to read response body: {}", e))?;

        if html.is_empty() {
            return Err(anyhow!("Empty response from {}", url));
        }

        Ok(html)
    }

    /// Submit a form-encoded POST and return the final response after
    /// redirects. Non-success status is an error.
    pub async fn post_form(&self, url: &str, fields: &[(String, String)]) -> Result<Response> {
        debug!("HTTP POST (form): {}", url);
        let response = self
            .client
            .post(url)
            .form(fields)
            .send()
            .await
            .map_err(|e| anyhow!("Form submit failed: {}", e))?;

        if !response.status().is_success() {
            error!("HTTP error {} submitting form to {}", response.status(), url);
            return Err(anyhow!(
                "HTTP error {} submitting form to {}",
                response.status(),
                url
            ));
        }

        Ok(response)
    }
}
