//! Shared HTTP plumbing for the object-storage services
//!
//! S3, OSS and Google Cloud Storage all expose objects as
//! `GET/PUT/HEAD/DELETE` on a per-object URL; they differ in URL layout and
//! in how a request is authenticated. [`HttpObjectBackend`] owns the HTTP
//! client and status handling, a [`RequestSigner`] supplies the rest.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use reqwest::{Method, StatusCode};
use std::time::Duration;
use tracing::debug;
use url::Url;

use crate::backend::{Backend, BackendKind, check_key};
use crate::config::DEFAULT_TIMEOUT;
use crate::error::{BackendError, Result};

/// Content type sent with every upload
pub(crate) const OBJECT_CONTENT_TYPE: &str = "application/octet-stream";

/// Longest response body echoed into an error message
const MAX_ERROR_BODY: usize = 512;

/// A request about to be signed
pub struct ObjectRequest<'a> {
    pub method: &'a Method,
    pub url: &'a Url,
    /// Object key after prefixing, as stored in the bucket
    pub object_key: &'a str,
    pub content_type: Option<&'a str>,
    pub body: &'a [u8],
    pub now: DateTime<Utc>,
}

/// Per-service URL layout and authentication
pub trait RequestSigner: Send + Sync {
    fn kind(&self) -> BackendKind;

    /// Apply the configured prefix to a storage key
    fn object_key(&self, key: &str) -> String;

    /// Absolute URL of an object
    fn object_url(&self, object_key: &str) -> Result<Url>;

    /// Headers authenticating the request; empty for anonymous access
    fn sign(&self, request: &ObjectRequest<'_>) -> Result<Vec<(String, String)>>;
}

/// Object-storage medium over HTTP
pub struct HttpObjectBackend<S: RequestSigner> {
    client: reqwest::Client,
    signer: S,
}

impl<S: RequestSigner> HttpObjectBackend<S> {
    /// Create a backend with the default request timeout
    pub fn new(signer: S) -> Result<Self> {
        Self::with_timeout(signer, DEFAULT_TIMEOUT)
    }

    pub fn with_timeout(signer: S, timeout: Duration) -> Result<Self> {
        let client = reqwest::Client::builder()
            // Signed requests must not be replayed against another host
            .redirect(reqwest::redirect::Policy::none())
            .timeout(timeout)
            .build()
            .map_err(|e| BackendError::InvalidConfig(format!("HTTP client: {}", e)))?;
        Ok(Self { client, signer })
    }

    pub fn signer(&self) -> &S {
        &self.signer
    }

    async fn send(
        &self,
        op: &'static str,
        method: Method,
        key: &str,
        body: Vec<u8>,
    ) -> Result<reqwest::Response> {
        check_key(key)?;
        let object_key = self.signer.object_key(key);
        let url = self.signer.object_url(&object_key)?;
        let is_upload = method == Method::PUT;
        let content_type = is_upload.then_some(OBJECT_CONTENT_TYPE);

        let headers = self.signer.sign(&ObjectRequest {
            method: &method,
            url: &url,
            object_key: &object_key,
            content_type,
            body: &body,
            now: Utc::now(),
        })?;

        debug!(backend = %self.signer.kind(), %method, key = %object_key, "object request");

        let mut request = self.client.request(method, url);
        if let Some(ct) = content_type {
            request = request.header(reqwest::header::CONTENT_TYPE, ct);
        }
        for (name, value) in headers {
            request = request.header(name, value);
        }
        if is_upload {
            request = request.body(body);
        }

        request
            .send()
            .await
            .map_err(|e| BackendError::network(op, key, e))
    }

    async fn status_error(op: &'static str, key: &str, response: reqwest::Response) -> BackendError {
        let status = response.status().as_u16();
        let mut message = response.text().await.unwrap_or_default();
        if message.len() > MAX_ERROR_BODY {
            let mut cut = MAX_ERROR_BODY;
            while !message.is_char_boundary(cut) {
                cut -= 1;
            }
            message.truncate(cut);
        }
        BackendError::Http {
            op,
            key: key.to_string(),
            status,
            message,
        }
    }
}

#[async_trait]
impl<S: RequestSigner> Backend for HttpObjectBackend<S> {
    fn kind(&self) -> BackendKind {
        self.signer.kind()
    }

    async fn read(&self, key: &str) -> Result<Option<Vec<u8>>> {
        let response = self.send("read", Method::GET, key, Vec::new()).await?;
        match response.status() {
            StatusCode::NOT_FOUND => Ok(None),
            status if status.is_success() => {
                let bytes = response
                    .bytes()
                    .await
                    .map_err(|e| BackendError::network("read", key, e))?;
                Ok(Some(bytes.to_vec()))
            }
            _ => Err(Self::status_error("read", key, response).await),
        }
    }

    async fn write(&self, key: &str, data: &[u8]) -> Result<()> {
        let response = self.send("write", Method::PUT, key, data.to_vec()).await?;
        if response.status().is_success() {
            Ok(())
        } else {
            Err(Self::status_error("write", key, response).await)
        }
    }

    async fn delete(&self, key: &str) -> Result<()> {
        let response = self.send("delete", Method::DELETE, key, Vec::new()).await?;
        match response.status() {
            StatusCode::NOT_FOUND => Ok(()),
            status if status.is_success() => Ok(()),
            _ => Err(Self::status_error("delete", key, response).await),
        }
    }

    async fn exists(&self, key: &str) -> Result<bool> {
        let response = self.send("probe", Method::HEAD, key, Vec::new()).await?;
        match response.status() {
            StatusCode::NOT_FOUND => Ok(false),
            status if status.is_success() => Ok(true),
            _ => Err(Self::status_error("probe", key, response).await),
        }
    }
}

/// Percent-encode a key for use in a URL path, keeping `/` separators
///
/// Only RFC 3986 unreserved characters pass through unchanged, which is the
/// encoding the S3 and OSS signature schemes expect.
pub(crate) fn encode_key(key: &str) -> String {
    let mut out = String::with_capacity(key.len());
    for byte in key.bytes() {
        match byte {
            b'A'..=b'Z' | b'a'..=b'z' | b'0'..=b'9' | b'-' | b'_' | b'.' | b'~' | b'/' => {
                out.push(byte as char)
            }
            _ => out.push_str(&format!("%{:02X}", byte)),
        }
    }
    out
}

/// Parse a configured endpoint, rejecting anything but http(s)
pub(crate) fn parse_endpoint(endpoint: &str) -> Result<Url> {
    let url = Url::parse(endpoint.trim_end_matches('/'))
        .map_err(|e| BackendError::InvalidConfig(format!("endpoint '{}': {}", endpoint, e)))?;
    if !matches!(url.scheme(), "http" | "https") {
        return Err(BackendError::InvalidConfig(format!(
            "endpoint '{}' must use http or https",
            endpoint
        )));
    }
    Ok(url)
}

/// `Host` header value as the HTTP client will send it
pub(crate) fn host_header(url: &Url) -> String {
    let host = url.host_str().unwrap_or_default();
    match url.port() {
        Some(port) => format!("{}:{}", host, port),
        None => host.to_string(),
    }
}

/// Join an endpoint and path segments into an object URL
pub(crate) fn join_url(base: &Url, path: &str) -> Result<Url> {
    let joined = format!("{}/{}", base.as_str().trim_end_matches('/'), path);
    Url::parse(&joined).map_err(|e| BackendError::InvalidKey {
        key: path.to_string(),
        reason: e.to_string(),
    })
}
