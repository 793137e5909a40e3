//! Spinnaker API client.
//!
//! The client knows the API base URL and how to turn responses into values
//! or errors. Moving bytes over the wire is delegated to a [`Transport`], so
//! tests and embedders can swap the HTTP stack.

use std::fmt;
use std::sync::Arc;

use async_trait::async_trait;
use reqwest::{Client, Method, Url, header};
use serde::de::DeserializeOwned;
use tracing::{debug, trace};

use crate::error::{DocumentError, RemoteError, Result, UnexpectedResponse};

/// Content type used when sending delivery config documents.
pub const YAML_CONTENT_TYPE: &str = "application/x-yaml";

/// Environment variable holding the API base URL.
pub const BASE_URL_ENV: &str = "SPINNAKER_API_BASE_URL";

/// A request handed to a [`Transport`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ApiRequest {
    /// HTTP method.
    pub method: Method,
    /// Full request URL.
    pub url: String,
    /// Request body and its content type.
    pub body: Option<(Vec<u8>, &'static str)>,
}

/// Status and body of a completed request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ApiResponse {
    /// HTTP status code.
    pub status: u16,
    /// Raw response body.
    pub body: Vec<u8>,
}

/// Sends requests and returns raw responses.
///
/// Implementations report only failures to obtain a response; status
/// handling belongs to [`SpinnakerClient`].
#[async_trait]
pub trait Transport: Send + Sync {
    /// Performs one request.
    async fn send(&self, request: ApiRequest) -> Result<ApiResponse>;
}

/// [`Transport`] backed by `reqwest`, without retries or timeouts.
#[derive(Debug, Clone, Default)]
pub struct HttpTransport {
    client: Client,
}

impl HttpTransport {
    /// Creates a transport with a default `reqwest` client.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl Transport for HttpTransport {
    async fn send(&self, request: ApiRequest) -> Result<ApiResponse> {
        let ApiRequest { method, url, body } = request;
        let mut builder = self
            .client
            .request(method.clone(), &url)
            .header(header::ACCEPT, "application/json");
        if let Some((content, content_type)) = body {
            builder = builder
                .header(header::CONTENT_TYPE, content_type)
                .body(content);
        }

        let response = builder
            .send()
            .await
            .map_err(|e| RemoteError::transport(method.as_str(), &url, e.to_string()))?;
        let status = response.status().as_u16();
        let body = response.bytes().await.map_err(|e| {
            RemoteError::transport(
                method.as_str(),
                &url,
                format!("failed to read response body: {e}"),
            )
        })?;

        Ok(ApiResponse {
            status,
            body: body.to_vec(),
        })
    }
}

/// Connection settings for the Spinnaker API.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ClientSettings {
    /// API base URL, e.g. `https://gate.example.com`.
    pub base_url: Option<String>,
}

impl ClientSettings {
    /// Builds an HTTP client from these settings.
    ///
    /// # Errors
    ///
    /// Returns [`RemoteError::MissingBaseUrl`] if no base URL is set, or
    /// [`RemoteError::InvalidBaseUrl`] if it is not an absolute URL.
    pub fn client(&self) -> Result<SpinnakerClient> {
        let base_url = self.base_url.as_deref().unwrap_or_default();
        SpinnakerClient::new(base_url, Arc::new(HttpTransport::new()))
    }
}

/// Spinnaker API client.
#[derive(Clone)]
pub struct SpinnakerClient {
    base: Url,
    /// `base` serialized without the trailing slash.
    base_url: String,
    transport: Arc<dyn Transport>,
}

impl fmt::Debug for SpinnakerClient {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SpinnakerClient")
            .field("base_url", &self.base_url)
            .finish_non_exhaustive()
    }
}

impl SpinnakerClient {
    /// Creates a client for `base_url` using `transport`.
    ///
    /// # Errors
    ///
    /// Returns [`RemoteError::MissingBaseUrl`] if `base_url` is empty, or
    /// [`RemoteError::InvalidBaseUrl`] if it is not an absolute URL.
    pub fn new(base_url: &str, transport: Arc<dyn Transport>) -> Result<Self> {
        let trimmed = base_url.trim();
        if trimmed.is_empty() {
            return Err(RemoteError::MissingBaseUrl.into());
        }
        let invalid = |message: String| RemoteError::InvalidBaseUrl {
            url: trimmed.to_string(),
            message,
        };

        let mut base = Url::parse(trimmed).map_err(|e| invalid(e.to_string()))?;
        if base.cannot_be_a_base() {
            return Err(invalid(String::from("URL cannot have a path")).into());
        }
        base.set_query(None);
        base.set_fragment(None);

        Ok(Self {
            base_url: base.as_str().trim_end_matches('/').to_string(),
            base,
            transport,
        })
    }

    /// Returns the full URL for an API path.
    #[must_use]
    pub fn url(&self, path: &str) -> String {
        format!("{}{path}", self.base_url)
    }

    /// Builds an API path from raw segments and query pairs, percent-encoding
    /// each part. The result is relative to the base URL, like the paths
    /// taken by [`SpinnakerClient::request`].
    #[must_use]
    pub fn endpoint(&self, segments: &[&str], query: &[(&str, &str)]) -> String {
        let mut url = self.base.clone();
        if let Ok(mut path) = url.path_segments_mut() {
            path.pop_if_empty().extend(segments);
        }
        if !query.is_empty() {
            url.query_pairs_mut().extend_pairs(query);
        }

        let full = url.as_str();
        full.strip_prefix(self.base_url.as_str())
            .unwrap_or(full)
            .to_string()
    }

    /// Sends a request and returns the body of a 2xx response.
    ///
    /// # Errors
    ///
    /// Returns [`RemoteError::UnexpectedResponse`] for any other status, or
    /// the transport's error if no response was received.
    pub async fn request(
        &self,
        method: Method,
        path: &str,
        body: Option<(Vec<u8>, &'static str)>,
    ) -> Result<Vec<u8>> {
        let url = self.url(path);
        debug!(%method, %url, "Sending Spinnaker API request");

        let response = self
            .transport
            .send(ApiRequest {
                method,
                url: url.clone(),
                body,
            })
            .await?;
        trace!(status = response.status, bytes = response.body.len(), "Received response");

        if !(200..300).contains(&response.status) {
            return Err(RemoteError::UnexpectedResponse(UnexpectedResponse {
                status: response.status,
                url,
                body: response.body,
            })
            .into());
        }
        Ok(response.body)
    }

    /// GETs a path and returns the raw body.
    ///
    /// # Errors
    ///
    /// See [`SpinnakerClient::request`].
    pub async fn get(&self, path: &str) -> Result<Vec<u8>> {
        self.request(Method::GET, path, None).await
    }

    /// GETs a path and parses the JSON body.
    ///
    /// # Errors
    ///
    /// Returns [`DocumentError::InvalidContent`] if the body is not the
    /// expected JSON, or any error from [`SpinnakerClient::request`].
    pub async fn get_json<T: DeserializeOwned>(&self, path: &str) -> Result<T> {
        let content = self.get(path).await?;
        serde_json::from_slice(&content).map_err(|e| {
            DocumentError::invalid_json(&content, e)
                .context(format!("expected JSON from {}", self.url(path)))
                .into()
        })
    }

    /// POSTs a YAML document and returns the raw body.
    ///
    /// # Errors
    ///
    /// See [`SpinnakerClient::request`].
    pub async fn post_yaml(&self, path: &str, content: &[u8]) -> Result<Vec<u8>> {
        self.request(Method::POST, path, Some((content.to_vec(), YAML_CONTENT_TYPE)))
            .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::DeliveryError;
    use wiremock::matchers::{body_string, header as header_eq, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    async fn client_for(server: &MockServer) -> SpinnakerClient {
        SpinnakerClient::new(&server.uri(), Arc::new(HttpTransport::new())).unwrap()
    }

    #[test]
    fn test_missing_base_url() {
        let err = SpinnakerClient::new("  ", Arc::new(HttpTransport::new())).unwrap_err();
        assert!(matches!(err, DeliveryError::Remote(RemoteError::MissingBaseUrl)));

        let err = ClientSettings::default().client().unwrap_err();
        assert!(matches!(err, DeliveryError::Remote(RemoteError::MissingBaseUrl)));
    }

    #[test]
    fn test_url_trims_trailing_slash() {
        let client = SpinnakerClient::new("http://gate/", Arc::new(HttpTransport::new())).unwrap();
        assert_eq!(client.url("/managed/delivery-configs"), "http://gate/managed/delivery-configs");
    }

    #[test]
    fn test_invalid_base_url() {
        let err = SpinnakerClient::new("gate.example.com", Arc::new(HttpTransport::new()))
            .unwrap_err();
        assert!(matches!(
            err,
            DeliveryError::Remote(RemoteError::InvalidBaseUrl { url, .. }) if url == "gate.example.com"
        ));
    }

    #[test]
    fn test_endpoint_encodes_segments_and_query() {
        let client =
            SpinnakerClient::new("http://gate/api/", Arc::new(HttpTransport::new())).unwrap();

        let endpoint = client.endpoint(
            &["managed", "resources", "export", "aws", "my account", "cluster", "a/b"],
            &[("serviceAccount", "me+ci@example.com")],
        );

        assert_eq!(
            endpoint,
            "/managed/resources/export/aws/my%20account/cluster/a%2Fb?serviceAccount=me%2Bci%40example.com"
        );
        assert_eq!(
            client.url(&endpoint),
            "http://gate/api/managed/resources/export/aws/my%20account/cluster/a%2Fb?serviceAccount=me%2Bci%40example.com"
        );
        assert_eq!(client.endpoint(&["applications", "myapp"], &[]), "/applications/myapp");
    }

    #[tokio::test]
    async fn test_post_yaml_sends_content_type() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/managed/delivery-configs/diff"))
            .and(header_eq("content-type", YAML_CONTENT_TYPE))
            .and(body_string("name: x\n"))
            .respond_with(ResponseTemplate::new(200).set_body_string("[]"))
            .expect(1)
            .mount(&server)
            .await;

        let client = client_for(&server).await;
        let body = client
            .post_yaml("/managed/delivery-configs/diff", b"name: x\n")
            .await
            .unwrap();

        assert_eq!(body, b"[]");
    }

    #[tokio::test]
    async fn test_non_success_is_unexpected_response() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/applications/myapp/serverGroups"))
            .respond_with(ResponseTemplate::new(503).set_body_string("down"))
            .mount(&server)
            .await;

        let client = client_for(&server).await;
        let err = client.get("/applications/myapp/serverGroups").await.unwrap_err();

        let response = err.unexpected_response().unwrap();
        assert_eq!(response.status, 503);
        assert_eq!(response.body_text(), "down");
        assert!(response.url.ends_with("/applications/myapp/serverGroups"));
    }

    #[tokio::test]
    async fn test_get_json_invalid_body() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/applications/myapp/loadBalancers"))
            .respond_with(ResponseTemplate::new(200).set_body_string("not json"))
            .mount(&server)
            .await;

        let client = client_for(&server).await;
        let err = client
            .get_json::<serde_json::Value>("/applications/myapp/loadBalancers")
            .await
            .unwrap_err();

        assert!(matches!(
            err.document_error(),
            Some(DocumentError::InvalidContent { content, .. }) if content == b"not json"
        ));
    }
}
