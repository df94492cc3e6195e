//! HTTP transport seam
//!
//! [`ApiClient`](super::ApiClient) and the update channel talk to the
//! network only through [`Transport`]. [`ReqwestTransport`] is the real
//! implementation; tests script their own.

use std::future::Future;

use futures_util::stream::BoxStream;
use futures_util::StreamExt;
use reqwest::Method;
use thiserror::Error;
use tracing::debug;

/// A request ready to send
#[derive(Debug, Clone)]
pub struct HttpRequest {
    pub method: Method,
    pub url: String,
    pub headers: Vec<(&'static str, String)>,
    pub body: Option<Vec<u8>>,
}

impl HttpRequest {
    /// Value of a header, if set
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(n, _)| n.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }
}

/// A fully read response
#[derive(Debug, Clone)]
pub struct HttpResponse {
    pub status: u16,
    pub body: Vec<u8>,
}

impl HttpResponse {
    pub fn new(status: u16, body: impl Into<Vec<u8>>) -> Self {
        Self {
            status,
            body: body.into(),
        }
    }

    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }
}

/// No usable response was received
#[derive(Error, Debug, Clone, PartialEq)]
#[error("{0}")]
pub struct TransportError(pub String);

/// Chunks of a long-lived response body
pub type ByteStream = BoxStream<'static, Result<Vec<u8>, TransportError>>;

/// Sends requests and opens streaming responses
pub trait Transport: Send + Sync + 'static {
    /// Send one request and read the whole response
    fn send(
        &self,
        request: HttpRequest,
    ) -> impl Future<Output = Result<HttpResponse, TransportError>> + Send;

    /// Open a streaming GET; fails unless the server answers with success
    fn open_stream(
        &self,
        request: HttpRequest,
    ) -> impl Future<Output = Result<ByteStream, TransportError>> + Send;
}

/// Transport backed by a shared `reqwest::Client`
#[derive(Debug, Clone, Default)]
pub struct ReqwestTransport {
    client: reqwest::Client,
}

impl ReqwestTransport {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_client(client: reqwest::Client) -> Self {
        Self { client }
    }

    fn build(&self, request: HttpRequest) -> reqwest::RequestBuilder {
        let mut builder = self.client.request(request.method, &request.url);
        for (name, value) in request.headers {
            builder = builder.header(name, value);
        }
        if let Some(body) = request.body {
            builder = builder.body(body);
        }
        builder
    }
}

impl Transport for ReqwestTransport {
    async fn send(&self, request: HttpRequest) -> Result<HttpResponse, TransportError> {
        debug!("{} {}", request.method, request.url);
        let response = self
            .build(request)
            .send()
            .await
            .map_err(|e| TransportError(e.to_string()))?;

        let status = response.status().as_u16();
        let body = response
            .bytes()
            .await
            .map_err(|e| TransportError(e.to_string()))?;

        Ok(HttpResponse::new(status, body.to_vec()))
    }

    async fn open_stream(&self, request: HttpRequest) -> Result<ByteStream, TransportError> {
        debug!("Opening stream {}", request.url);
        let response = self
            .build(request)
            .send()
            .await
            .map_err(|e| TransportError(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            return Err(TransportError(format!(
                "Update stream rejected with status {}",
                status.as_u16()
            )));
        }

        Ok(response
            .bytes_stream()
            .map(|chunk| {
                chunk
                    .map(|bytes| bytes.to_vec())
                    .map_err(|e| TransportError(e.to_string()))
            })
            .boxed())
    }
}
