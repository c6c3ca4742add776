//! Remote detail source and store
//!
//! This module handles all HTTP requests of the dispatch pipeline:
//! - Building the HTTP client with a per-request timeout
//! - GET of an item's detail object from the fetch endpoint
//! - POST of that detail object to the submit endpoint
//! - Error classification into [`RemoteError`]

use crate::config::{RemoteConfig, ID_PLACEHOLDER};
use crate::identity::Identity;
use async_trait::async_trait;
use reqwest::Client;
use serde_json::{Map, Value};
use std::time::Duration;
use thiserror::Error;

/// Field of the submit response that echoes the stored identity
pub const ACK_IDENTITY_FIELD: &str = "productId";

/// Errors from a single fetch or submit call
#[derive(Debug, Error)]
pub enum RemoteError {
    #[error("HTTP error: {0}")]
    Http(String),

    #[error("Request timed out")]
    Timeout,

    #[error("Unexpected HTTP status {0}")]
    Status(u16),

    #[error("Malformed detail object: {0}")]
    MalformedDetail(String),

    #[error("Malformed acknowledgement: {0}")]
    MalformedAck(String),
}

impl From<reqwest::Error> for RemoteError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            Self::Timeout
        } else if let Some(status) = err.status() {
            Self::Status(status.as_u16())
        } else {
            Self::Http(err.to_string())
        }
    }
}

/// Detail object returned by the fetch endpoint
#[derive(Debug, Clone, PartialEq)]
pub struct DetailObject {
    /// Identity the detail was requested for
    pub identity: Identity,

    /// The JSON object as returned by the remote
    pub body: Map<String, Value>,
}

/// Acknowledgement returned by the submit endpoint
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Ack {
    /// Identity the remote store reports as stored
    pub identity: Identity,
}

impl Ack {
    /// Reads the acknowledged identity from a submit response body
    pub fn from_response(body: &Value) -> Result<Self, RemoteError> {
        let field = body
            .get(ACK_IDENTITY_FIELD)
            .ok_or_else(|| RemoteError::MalformedAck(format!("missing '{}'", ACK_IDENTITY_FIELD)))?;

        let identity = match field {
            Value::Number(n) => Identity::from_number(n),
            Value::String(s) => Identity::parse(s),
            other => {
                return Err(RemoteError::MalformedAck(format!(
                    "'{}' is not an identity: {}",
                    ACK_IDENTITY_FIELD, other
                )))
            }
        }
        .map_err(|e| RemoteError::MalformedAck(e.to_string()))?;

        Ok(Self { identity })
    }
}

/// Fetch-then-submit endpoints used by the dispatcher
///
/// Both calls may be re-issued for the same identity.
#[async_trait]
pub trait RemoteClient: Send + Sync {
    /// Fetches the detail object for an identity
    async fn fetch_detail(&self, identity: &Identity) -> Result<DetailObject, RemoteError>;

    /// Submits a detail object to the remote store
    async fn submit_detail(&self, detail: &DetailObject) -> Result<Ack, RemoteError>;

    /// Wakes the submit endpoint before the first batch
    async fn warm_up(&self) -> Result<(), RemoteError> {
        Ok(())
    }
}

/// Builds an HTTP client with proper configuration
///
/// # Arguments
///
/// * `config` - The remote endpoint configuration
///
/// # Returns
///
/// * `Ok(Client)` - Successfully built HTTP client
/// * `Err(reqwest::Error)` - Failed to build client
pub fn build_http_client(config: &RemoteConfig) -> Result<Client, reqwest::Error> {
    let user_agent = format!("{}/{}", env!("CARGO_PKG_NAME"), env!("CARGO_PKG_VERSION"));

    Client::builder()
        .user_agent(user_agent)
        .timeout(Duration::from_secs(config.timeout_secs))
        .connect_timeout(Duration::from_secs(config.timeout_secs))
        .gzip(true)
        .brotli(true)
        .build()
}

/// reqwest-backed [`RemoteClient`]
pub struct HttpRemoteClient {
    client: Client,
    fetch_url_template: String,
    submit_url: String,
}

impl HttpRemoteClient {
    /// Creates a client for the configured endpoints
    pub fn new(config: &RemoteConfig) -> Result<Self, reqwest::Error> {
        Ok(Self {
            client: build_http_client(config)?,
            fetch_url_template: config.fetch_url_template.clone(),
            submit_url: config.submit_url.clone(),
        })
    }

    /// Fills the fetch template with the canonical identity
    pub fn detail_url(&self, identity: &Identity) -> String {
        self.fetch_url_template
            .replace(ID_PLACEHOLDER, identity.as_str())
    }
}

#[async_trait]
impl RemoteClient for HttpRemoteClient {
    async fn fetch_detail(&self, identity: &Identity) -> Result<DetailObject, RemoteError> {
        let response = self.client.get(self.detail_url(identity)).send().await?;
        let status = response.status();
        tracing::info!("Request product {}: Status Code - {}", identity, status.as_u16());

        if !status.is_success() {
            return Err(RemoteError::Status(status.as_u16()));
        }

        let body: Value = response
            .json()
            .await
            .map_err(|e| RemoteError::MalformedDetail(e.to_string()))?;

        match body {
            Value::Object(body) => Ok(DetailObject {
                identity: identity.clone(),
                body,
            }),
            other => Err(RemoteError::MalformedDetail(format!(
                "expected a JSON object, got {}",
                other
            ))),
        }
    }

    async fn submit_detail(&self, detail: &DetailObject) -> Result<Ack, RemoteError> {
        let response = self
            .client
            .post(&self.submit_url)
            .json(&detail.body)
            .send()
            .await?;
        let status = response.status();

        if !status.is_success() {
            return Err(RemoteError::Status(status.as_u16()));
        }

        let body: Value = response
            .json()
            .await
            .map_err(|e| RemoteError::MalformedAck(e.to_string()))?;
        tracing::debug!("Stored {}: {}", detail.identity, body);

        Ack::from_response(&body)
    }

    async fn warm_up(&self) -> Result<(), RemoteError> {
        let response = self.client.get(&self.submit_url).send().await?;
        tracing::info!("Warm up response: {}", response.status());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use wiremock::matchers::{body_json, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn config_for(server: &MockServer) -> RemoteConfig {
        RemoteConfig {
            fetch_url_template: format!("{}/products/{{id}}/", server.uri()),
            submit_url: format!("{}/submit", server.uri()),
            timeout_secs: 5,
            rotate_command: None,
        }
    }

    fn id(raw: &str) -> Identity {
        Identity::parse(raw).unwrap()
    }

    #[test]
    fn test_detail_url_uses_canonical_identity() {
        let config = RemoteConfig {
            fetch_url_template: "https://api.example.com/products/{id}/".to_string(),
            submit_url: "https://store.example.com/submit".to_string(),
            timeout_secs: 5,
            rotate_command: None,
        };
        let client = HttpRemoteClient::new(&config).unwrap();

        assert_eq!(
            client.detail_url(&id("64.1000")),
            "https://api.example.com/products/64.1/"
        );
        assert_eq!(
            client.detail_url(&id("12.000")),
            "https://api.example.com/products/12/"
        );
    }

    #[test]
    fn test_ack_from_response() {
        let ack = Ack::from_response(&json!({"productId": 3505.2})).unwrap();
        assert_eq!(ack.identity, id("3505.2"));

        let ack = Ack::from_response(&json!({"productId": "3529"})).unwrap();
        assert_eq!(ack.identity, id("3529"));

        assert!(matches!(
            Ack::from_response(&json!({"status": "ok"})),
            Err(RemoteError::MalformedAck(_))
        ));
        assert!(matches!(
            Ack::from_response(&json!({"productId": null})),
            Err(RemoteError::MalformedAck(_))
        ));
    }

    #[tokio::test]
    async fn test_fetch_detail() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/products/12/"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"id": "12", "name": "Lemons"})))
            .mount(&server)
            .await;

        let client = HttpRemoteClient::new(&config_for(&server)).unwrap();
        let detail = client.fetch_detail(&id("12.0")).await.unwrap();

        assert_eq!(detail.identity, id("12"));
        assert_eq!(detail.body.get("name"), Some(&json!("Lemons")));
    }

    #[tokio::test]
    async fn test_fetch_detail_error_status() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(404))
            .mount(&server)
            .await;

        let client = HttpRemoteClient::new(&config_for(&server)).unwrap();
        let result = client.fetch_detail(&id("12")).await;

        assert!(matches!(result, Err(RemoteError::Status(404))));
    }

    #[tokio::test]
    async fn test_fetch_detail_rejects_non_object() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!([1, 2, 3])))
            .mount(&server)
            .await;

        let client = HttpRemoteClient::new(&config_for(&server)).unwrap();
        let result = client.fetch_detail(&id("12")).await;

        assert!(matches!(result, Err(RemoteError::MalformedDetail(_))));
    }

    #[tokio::test]
    async fn test_submit_detail_posts_body() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/submit"))
            .and(body_json(json!({"id": "12"})))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"productId": 12})))
            .expect(1)
            .mount(&server)
            .await;

        let client = HttpRemoteClient::new(&config_for(&server)).unwrap();
        let detail = DetailObject {
            identity: id("12"),
            body: json!({"id": "12"}).as_object().cloned().unwrap(),
        };
        let ack = client.submit_detail(&detail).await.unwrap();

        assert_eq!(ack.identity, id("12"));
    }

    #[tokio::test]
    async fn test_submit_detail_malformed_ack() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(200).set_body_string("stored"))
            .mount(&server)
            .await;

        let client = HttpRemoteClient::new(&config_for(&server)).unwrap();
        let detail = DetailObject {
            identity: id("12"),
            body: Map::new(),
        };
        let result = client.submit_detail(&detail).await;

        assert!(matches!(result, Err(RemoteError::MalformedAck(_))));
    }

    #[tokio::test]
    async fn test_warm_up_hits_submit_endpoint() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/submit"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"ok": true})))
            .expect(1)
            .mount(&server)
            .await;

        let client = HttpRemoteClient::new(&config_for(&server)).unwrap();
        client.warm_up().await.unwrap();
    }
}
