//! HTTP client for operator services.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::{Error, Result};

/// Body returned by `GET /process`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ServiceResponse {
    #[serde(default)]
    pub error: Option<String>,
    #[serde(default)]
    pub result: Value,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub stats: Option<Value>,
}

/// Talks to a service listening on `base_url`.
#[derive(Debug, Clone)]
pub struct ServiceClient {
    http: reqwest::Client,
    base_url: String,
}

impl ServiceClient {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            http: reqwest::Client::new(),
            base_url: base_url.into().trim_end_matches('/').to_string(),
        }
    }

    /// Client for a service published on `localhost:<port>`.
    pub fn localhost(port: u16) -> Self {
        Self::new(format!("http://localhost:{port}"))
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Ask the service to process `input_path` (a container path).
    ///
    /// # Errors
    ///
    /// [`Error::ServiceCall`] naming the input when the service reports an
    /// error or answers with a non-JSON failure status.
    pub async fn process(&self, input_path: &str) -> Result<ServiceResponse> {
        let url = format!("{}/process", self.base_url);
        tracing::debug!("GET {url}?input_path={input_path}");

        let response = self
            .http
            .get(&url)
            .query(&[("input_path", input_path)])
            .send()
            .await?;
        let status = response.status();
        let body = response.text().await?;

        let parsed: ServiceResponse = match serde_json::from_str(&body) {
            Ok(parsed) => parsed,
            Err(_) if !status.is_success() => {
                return Err(Error::service_call(
                    input_path,
                    format!("HTTP {status}: {}", body.trim()),
                ))
            }
            Err(e) => return Err(e.into()),
        };

        match parsed.error.as_deref().map(str::trim) {
            Some(message) if !message.is_empty() => Err(Error::service_call(input_path, message)),
            _ => Ok(parsed),
        }
    }

    /// Ask the service to shut itself down.
    pub async fn stop(&self) -> Result<()> {
        let url = format!("{}/stop", self.base_url);
        tracing::debug!("GET {url}");
        self.http.get(&url).send().await?;
        Ok(())
    }
}
