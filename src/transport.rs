/*!
 * HTTP transport used by every stage client.
 *
 * The `Transport` trait is the single seam between the retry logic and the
 * network. `ReqwestTransport` is the production implementation; tests plug in
 * scripted transports to simulate timeouts and error statuses.
 */

use async_trait::async_trait;
use bytes::Bytes;
use reqwest::{multipart, Client, Method};
use serde::de::DeserializeOwned;
use serde_json::Value;
use std::fmt::Debug;
use std::time::Duration;
use thiserror::Error;

/// Transport-level failure, below HTTP status handling
#[derive(Error, Debug, Clone, PartialEq)]
pub enum TransportError {
    /// The request or connection attempt exceeded its timeout
    #[error("timed out: {0}")]
    Timeout(String),

    /// The connection could not be established or was reset
    #[error("connection error: {0}")]
    Connection(String),

    /// Any other failure (malformed response, body read error...)
    #[error("{0}")]
    Other(String),
}

impl TransportError {
    pub fn is_timeout(&self) -> bool {
        matches!(self, Self::Timeout(_))
    }
}

/// One part of a multipart form
#[derive(Debug, Clone, PartialEq)]
pub enum FormPart {
    /// Plain text field
    Text { name: String, value: String },
    /// File upload
    File { name: String, file_name: String, data: Bytes },
}

/// Owned multipart form that can be rebuilt for every retry attempt
#[derive(Debug, Clone, Default, PartialEq)]
pub struct MultipartForm {
    pub parts: Vec<FormPart>,
}

impl MultipartForm {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a text field
    pub fn text(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.parts.push(FormPart::Text {
            name: name.into(),
            value: value.into(),
        });
        self
    }

    /// Add a file field
    pub fn file(mut self, name: impl Into<String>, file_name: impl Into<String>, data: impl Into<Bytes>) -> Self {
        self.parts.push(FormPart::File {
            name: name.into(),
            file_name: file_name.into(),
            data: data.into(),
        });
        self
    }

    /// Value of a text field by name
    pub fn text_value(&self, name: &str) -> Option<&str> {
        self.parts.iter().find_map(|part| match part {
            FormPart::Text { name: n, value } if n == name => Some(value.as_str()),
            _ => None,
        })
    }

    /// File name and contents of a file field by name
    pub fn file_value(&self, name: &str) -> Option<(&str, &Bytes)> {
        self.parts.iter().find_map(|part| match part {
            FormPart::File { name: n, file_name, data } if n == name => Some((file_name.as_str(), data)),
            _ => None,
        })
    }

    fn to_reqwest(&self) -> multipart::Form {
        self.parts.iter().fold(multipart::Form::new(), |form, part| match part {
            FormPart::Text { name, value } => form.text(name.clone(), value.clone()),
            FormPart::File { name, file_name, data } => {
                let part = multipart::Part::bytes(data.to_vec()).file_name(file_name.clone());
                form.part(name.clone(), part)
            }
        })
    }
}

/// Request payload
#[derive(Debug, Clone, PartialEq)]
pub enum RequestBody {
    Empty,
    Json(Value),
    Multipart(MultipartForm),
}

/// A fully described outbound request
#[derive(Debug, Clone, PartialEq)]
pub struct HttpRequest {
    pub method: Method,
    pub url: String,
    pub body: RequestBody,
    pub timeout: Duration,
}

impl HttpRequest {
    pub fn get(url: impl Into<String>, timeout: Duration) -> Self {
        Self {
            method: Method::GET,
            url: url.into(),
            body: RequestBody::Empty,
            timeout,
        }
    }
}

/// Buffered response
#[derive(Debug, Clone, PartialEq)]
pub struct HttpResponse {
    pub status: u16,
    pub content_type: Option<String>,
    pub body: Bytes,
}

impl HttpResponse {
    pub fn new(status: u16, body: impl Into<Bytes>) -> Self {
        Self {
            status,
            content_type: None,
            body: body.into(),
        }
    }

    /// JSON response with the matching content type
    pub fn json(status: u16, value: &Value) -> Self {
        Self {
            status,
            content_type: Some("application/json".to_string()),
            body: Bytes::from(value.to_string()),
        }
    }

    pub fn is_success(&self) -> bool {
        self.status < 400
    }

    /// Body decoded as UTF-8, lossily
    pub fn text(&self) -> String {
        String::from_utf8_lossy(&self.body).into_owned()
    }

    /// Body parsed as JSON
    pub fn parse_json<T: DeserializeOwned>(&self) -> Result<T, serde_json::Error> {
        serde_json::from_slice(&self.body)
    }
}

/// Sends one HTTP request and returns the buffered response
#[async_trait]
pub trait Transport: Send + Sync + Debug {
    async fn send(&self, request: HttpRequest) -> Result<HttpResponse, TransportError>;
}

/// Production transport backed by a pooled `reqwest::Client`
#[derive(Debug, Clone)]
pub struct ReqwestTransport {
    client: Client,
}

impl ReqwestTransport {
    /// Create a transport with connection pooling and TCP keepalive
    pub fn new() -> Self {
        Self {
            client: Client::builder()
                .pool_idle_timeout(Duration::from_secs(90))
                .pool_max_idle_per_host(20)
                .tcp_keepalive(Duration::from_secs(60))
                .build()
                .unwrap_or_default(),
        }
    }

    /// Wrap an existing client
    pub fn with_client(client: Client) -> Self {
        Self { client }
    }

    fn classify(error: reqwest::Error) -> TransportError {
        if error.is_timeout() {
            TransportError::Timeout(error.to_string())
        } else if error.is_connect() {
            TransportError::Connection(error.to_string())
        } else {
            TransportError::Other(error.to_string())
        }
    }
}

impl Default for ReqwestTransport {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Transport for ReqwestTransport {
    async fn send(&self, request: HttpRequest) -> Result<HttpResponse, TransportError> {
        let builder = self
            .client
            .request(request.method, &request.url)
            .timeout(request.timeout);

        let builder = match &request.body {
            RequestBody::Empty => builder,
            RequestBody::Json(value) => builder.json(value),
            RequestBody::Multipart(form) => builder.multipart(form.to_reqwest()),
        };

        let response = builder.send().await.map_err(Self::classify)?;

        let status = response.status().as_u16();
        let content_type = response
            .headers()
            .get(reqwest::header::CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .map(str::to_string);
        let body = response.bytes().await.map_err(Self::classify);

        finish_response(status, content_type, body)
    }
}

/// Assemble a response once the status line is known
///
/// A failed body read after a rejection status still yields the rejection,
/// so a slow error body is never retried as a timeout.
fn finish_response(
    status: u16,
    content_type: Option<String>,
    body: Result<Bytes, TransportError>,
) -> Result<HttpResponse, TransportError> {
    match body {
        Ok(body) => Ok(HttpResponse {
            status,
            content_type,
            body,
        }),
        Err(_) if status >= 400 => Ok(HttpResponse {
            status,
            content_type,
            body: Bytes::new(),
        }),
        Err(e) => Err(e),
    }
}
