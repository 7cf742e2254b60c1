//! Google Cloud Storage medium, through the XML API
//!
//! Objects live at `{endpoint}/{bucket}/{key}` and requests carry an OAuth2
//! bearer token. Obtaining and refreshing that token is left to the caller.

use url::Url;

use crate::backend::{BackendKind, prefixed_key};
use crate::config::{GoogleConfig, SecretString};
use crate::error::Result;
use crate::http::{HttpObjectBackend, ObjectRequest, RequestSigner, encode_key, join_url, parse_endpoint};

/// Google Cloud Storage medium
pub type GcsBackend = HttpObjectBackend<GcsSigner>;

impl HttpObjectBackend<GcsSigner> {
    pub fn from_config(config: &GoogleConfig) -> Result<Self> {
        Self::new(GcsSigner::from_config(config)?)
    }
}

#[derive(Debug, Clone)]
pub struct GcsSigner {
    endpoint: Url,
    bucket: String,
    prefix: Option<String>,
    token: Option<SecretString>,
}

impl GcsSigner {
    pub fn from_config(config: &GoogleConfig) -> Result<Self> {
        Ok(Self {
            endpoint: parse_endpoint(&config.endpoint())?,
            bucket: config.bucket.clone(),
            prefix: config.prefix.clone(),
            token: config.token.clone(),
        })
    }
}

impl RequestSigner for GcsSigner {
    fn kind(&self) -> BackendKind {
        BackendKind::Google
    }

    fn object_key(&self, key: &str) -> String {
        prefixed_key(self.prefix.as_deref(), key)
    }

    fn object_url(&self, object_key: &str) -> Result<Url> {
        join_url(
            &self.endpoint,
            &format!("{}/{}", encode_key(&self.bucket), encode_key(object_key)),
        )
    }

    fn sign(&self, _request: &ObjectRequest<'_>) -> Result<Vec<(String, String)>> {
        Ok(self
            .token
            .iter()
            .map(|token| ("authorization".to_string(), format!("Bearer {}", token.expose())))
            .collect())
    }
}
