//! Alibaba Cloud OSS medium
//!
//! Buckets are addressed virtual-hosted style (`{bucket}.{endpoint host}`)
//! unless the endpoint is a custom domain bound to the bucket. Requests are
//! signed with the OSS header signature (HMAC-SHA1 over verb, content headers,
//! date, `x-oss-*` headers and the bucket-qualified resource).

use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use hmac::{Hmac, Mac};
use sha1::Sha1;
use url::Url;

use crate::backend::{BackendKind, prefixed_key};
use crate::config::{OssConfig, SecretString};
use crate::error::{BackendError, Result};
use crate::http::{HttpObjectBackend, ObjectRequest, RequestSigner, encode_key, join_url, parse_endpoint};

const SECURITY_TOKEN_HEADER: &str = "x-oss-security-token";

/// OSS medium
pub type OssBackend = HttpObjectBackend<OssSigner>;

impl HttpObjectBackend<OssSigner> {
    pub fn from_config(config: &OssConfig) -> Result<Self> {
        Self::new(OssSigner::from_config(config)?)
    }
}

#[derive(Debug, Clone)]
struct Credentials {
    access_key_id: String,
    access_key_secret: SecretString,
    security_token: Option<SecretString>,
}

/// Virtual-hosted URL layout and OSS header signing
#[derive(Debug, Clone)]
pub struct OssSigner {
    /// Base URL objects hang off, bucket host already applied
    base: Url,
    bucket: String,
    prefix: Option<String>,
    credentials: Option<Credentials>,
}

impl OssSigner {
    pub fn from_config(config: &OssConfig) -> Result<Self> {
        let credentials = match (&config.access_key_id, &config.access_key_secret) {
            (Some(id), Some(secret)) => Some(Credentials {
                access_key_id: id.clone(),
                access_key_secret: secret.clone(),
                security_token: config.security_token.clone(),
            }),
            (None, None) => None,
            _ => {
                return Err(BackendError::InvalidConfig(
                    "oss accessKeyId and accessKeySecret must be set together".to_string(),
                ));
            }
        };

        let mut base = parse_endpoint(&config.endpoint)?;
        if !config.cname {
            let host = base.host_str().unwrap_or_default().to_string();
            base.set_host(Some(&format!("{}.{}", config.bucket, host)))
                .map_err(|e| {
                    BackendError::InvalidConfig(format!("oss bucket host '{}': {}", config.bucket, e))
                })?;
        }

        Ok(Self {
            base,
            bucket: config.bucket.clone(),
            prefix: config.prefix.clone(),
            credentials,
        })
    }
}

impl RequestSigner for OssSigner {
    fn kind(&self) -> BackendKind {
        BackendKind::Oss
    }

    fn object_key(&self, key: &str) -> String {
        prefixed_key(self.prefix.as_deref(), key)
    }

    fn object_url(&self, object_key: &str) -> Result<Url> {
        join_url(&self.base, &encode_key(object_key))
    }

    fn sign(&self, request: &ObjectRequest<'_>) -> Result<Vec<(String, String)>> {
        let date = request.now.format("%a, %d %b %Y %H:%M:%S GMT").to_string();
        let mut headers = vec![("date".to_string(), date.clone())];

        let Some(credentials) = &self.credentials else {
            return Ok(headers);
        };

        let mut oss_headers = Vec::new();
        if let Some(token) = &credentials.security_token {
            oss_headers.push((SECURITY_TOKEN_HEADER.to_string(), token.expose().to_string()));
        }

        let to_sign = string_to_sign(
            request.method.as_str(),
            request.content_type.unwrap_or_default(),
            &date,
            &oss_headers,
            &format!("/{}/{}", self.bucket, request.object_key),
        );
        let signature = hmac_sha1(credentials.access_key_secret.expose(), &to_sign)?;

        headers.extend(oss_headers);
        headers.push((
            "authorization".to_string(),
            format!("OSS {}:{}", credentials.access_key_id, signature),
        ));
        Ok(headers)
    }
}

/// Build the OSS string to sign; `oss_headers` must use lowercase names
fn string_to_sign(
    verb: &str,
    content_type: &str,
    date: &str,
    oss_headers: &[(String, String)],
    resource: &str,
) -> String {
    let mut sorted: Vec<_> = oss_headers.iter().collect();
    sorted.sort_by(|a, b| a.0.cmp(&b.0));
    let canonical_headers: String = sorted
        .iter()
        .map(|(name, value)| format!("{}:{}\n", name, value.trim()))
        .collect();

    // Content-MD5 is never sent, so its line stays empty
    format!(
        "{}\n\n{}\n{}\n{}{}",
        verb, content_type, date, canonical_headers, resource
    )
}

fn hmac_sha1(secret: &str, data: &str) -> Result<String> {
    let mut mac = Hmac::<Sha1>::new_from_slice(secret.as_bytes())
        .map_err(|e| BackendError::InvalidConfig(format!("signing key: {}", e)))?;
    mac.update(data.as_bytes());
    Ok(STANDARD.encode(mac.finalize().into_bytes()))
}
