//! Amazon S3 medium
//!
//! Objects are addressed path-style (`{endpoint}/{bucket}/{key}`) so the same
//! code serves AWS and S3-compatible services such as MinIO. Requests carry an
//! AWS Signature Version 4 `Authorization` header when credentials are set.

use hmac::{Hmac, Mac};
use sha2::{Digest, Sha256};
use url::Url;

use crate::backend::{BackendKind, prefixed_key};
use crate::config::{S3Config, SecretString};
use crate::error::{BackendError, Result};
use crate::http::{
    HttpObjectBackend, ObjectRequest, RequestSigner, encode_key, host_header, join_url,
    parse_endpoint,
};

const ALGORITHM: &str = "AWS4-HMAC-SHA256";
const SERVICE: &str = "s3";

/// S3 medium
pub type S3Backend = HttpObjectBackend<S3Signer>;

impl HttpObjectBackend<S3Signer> {
    pub fn from_config(config: &S3Config) -> Result<Self> {
        Self::new(S3Signer::from_config(config)?)
    }
}

/// Access key pair used for SigV4
#[derive(Debug, Clone)]
struct Credentials {
    access_key_id: String,
    secret_access_key: SecretString,
    session_token: Option<SecretString>,
}

/// Path-style URL layout and SigV4 signing
#[derive(Debug, Clone)]
pub struct S3Signer {
    endpoint: Url,
    region: String,
    bucket: String,
    prefix: Option<String>,
    credentials: Option<Credentials>,
}

impl S3Signer {
    pub fn from_config(config: &S3Config) -> Result<Self> {
        let credentials = match (&config.access_key_id, &config.secret_access_key) {
            (Some(id), Some(secret)) => Some(Credentials {
                access_key_id: id.clone(),
                secret_access_key: secret.clone(),
                session_token: config.session_token.clone(),
            }),
            (None, None) => None,
            _ => {
                return Err(BackendError::InvalidConfig(
                    "s3 accessKeyId and secretAccessKey must be set together".to_string(),
                ));
            }
        };

        Ok(Self {
            endpoint: parse_endpoint(&config.endpoint())?,
            region: config.region.clone(),
            bucket: config.bucket.clone(),
            prefix: config.prefix.clone(),
            credentials,
        })
    }

    fn scope(&self, date: &str) -> String {
        format!("{}/{}/{}/aws4_request", date, self.region, SERVICE)
    }
}

impl RequestSigner for S3Signer {
    fn kind(&self) -> BackendKind {
        BackendKind::S3
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

    fn sign(&self, request: &ObjectRequest<'_>) -> Result<Vec<(String, String)>> {
        let Some(credentials) = &self.credentials else {
            return Ok(Vec::new());
        };

        let amz_date = request.now.format("%Y%m%dT%H%M%SZ").to_string();
        let date = request.now.format("%Y%m%d").to_string();
        let payload_hash = hex::encode(Sha256::digest(request.body));

        // Sorted by name, as the canonical request requires
        let mut headers = vec![
            ("host".to_string(), host_header(request.url)),
            ("x-amz-content-sha256".to_string(), payload_hash.clone()),
            ("x-amz-date".to_string(), amz_date.clone()),
        ];
        if let Some(token) = &credentials.session_token {
            headers.push(("x-amz-security-token".to_string(), token.expose().to_string()));
        }

        let signed_headers = headers
            .iter()
            .map(|(name, _)| name.as_str())
            .collect::<Vec<_>>()
            .join(";");
        let canonical_headers: String = headers
            .iter()
            .map(|(name, value)| format!("{}:{}\n", name, value.trim()))
            .collect();

        let canonical_request = canonical_request(
            request.method.as_str(),
            request.url.path(),
            &canonical_headers,
            &signed_headers,
            &payload_hash,
        );
        let scope = self.scope(&date);
        let to_sign = string_to_sign(&amz_date, &scope, &canonical_request);
        let key = signing_key(
            credentials.secret_access_key.expose(),
            &date,
            &self.region,
            SERVICE,
        )?;
        let signature = hex::encode(hmac_sha256(&key, to_sign.as_bytes())?);

        let authorization = format!(
            "{} Credential={}/{}, SignedHeaders={}, Signature={}",
            ALGORITHM, credentials.access_key_id, scope, signed_headers, signature
        );

        // Host is set by the HTTP client from the URL
        let mut out: Vec<(String, String)> = headers
            .into_iter()
            .filter(|(name, _)| name != "host")
            .collect();
        out.push(("authorization".to_string(), authorization));
        Ok(out)
    }
}

fn canonical_request(
    method: &str,
    path: &str,
    canonical_headers: &str,
    signed_headers: &str,
    payload_hash: &str,
) -> String {
    // Object requests never carry a query string
    format!(
        "{}\n{}\n\n{}\n{}\n{}",
        method, path, canonical_headers, signed_headers, payload_hash
    )
}

fn string_to_sign(amz_date: &str, scope: &str, canonical_request: &str) -> String {
    format!(
        "{}\n{}\n{}\n{}",
        ALGORITHM,
        amz_date,
        scope,
        hex::encode(Sha256::digest(canonical_request.as_bytes()))
    )
}

/// Derive the SigV4 signing key for a day, region and service
fn signing_key(secret: &str, date: &str, region: &str, service: &str) -> Result<Vec<u8>> {
    let k_date = hmac_sha256(format!("AWS4{}", secret).as_bytes(), date.as_bytes())?;
    let k_region = hmac_sha256(&k_date, region.as_bytes())?;
    let k_service = hmac_sha256(&k_region, service.as_bytes())?;
    hmac_sha256(&k_service, b"aws4_request")
}

fn hmac_sha256(key: &[u8], data: &[u8]) -> Result<Vec<u8>> {
    let mut mac = Hmac::<Sha256>::new_from_slice(key)
        .map_err(|e| BackendError::InvalidConfig(format!("signing key: {}", e)))?;
    mac.update(data);
    Ok(mac.finalize().into_bytes().to_vec())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::Backend;
    use chrono::{TimeZone, Utc};
    use reqwest::Method;
    use wiremock::matchers::{header, header_exists, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn config(endpoint: &str) -> S3Config {
        S3Config {
            endpoint: Some(endpoint.to_string()),
            region: "us-east-1".to_string(),
            bucket: "state".to_string(),
            access_key_id: Some("AKIDEXAMPLE".to_string()),
            secret_access_key: Some("wJalrXUtnFEMI/K7MDENG+bPxRfiCYEXAMPLEKEY".into()),
            session_token: None,
            prefix: Some("stackyard".to_string()),
        }
    }

    #[test]
    fn test_signing_key_vector() {
        let key = signing_key(
            "wJalrXUtnFEMI/K7MDENG+bPxRfiCYEXAMPLEKEY",
            "20120215",
            "us-east-1",
            "iam",
        )
        .unwrap();
        assert_eq!(
            hex::encode(key),
            "f4780e2d9f65fa895f9c67b32ce1baf0b0d8a43505a000a1a9e090d414db404d"
        );
    }

    #[test]
    fn test_object_url_is_path_style() {
        let signer = S3Signer::from_config(&config("http://127.0.0.1:9000")).unwrap();
        let key = signer.object_key("releases/shop/dev/1.yaml");
        assert_eq!(key, "stackyard/releases/shop/dev/1.yaml");

        let url = signer.object_url(&key).unwrap();
        assert_eq!(
            url.as_str(),
            "http://127.0.0.1:9000/state/stackyard/releases/shop/dev/1.yaml"
        );
    }

    #[test]
    fn test_authorization_header_shape() {
        let mut cfg = config("http://127.0.0.1:9000");
        cfg.session_token = Some("session".into());
        let signer = S3Signer::from_config(&cfg).unwrap();
        let url = signer.object_url("k").unwrap();
        let now = Utc.with_ymd_and_hms(2024, 5, 1, 12, 0, 0).unwrap();

        let headers = signer
            .sign(&ObjectRequest {
                method: &Method::GET,
                url: &url,
                object_key: "k",
                content_type: None,
                body: b"",
                now,
            })
            .unwrap();

        let get = |name: &str| {
            headers
                .iter()
                .find(|(n, _)| n == name)
                .map(|(_, v)| v.clone())
                .unwrap()
        };
        assert_eq!(get("x-amz-date"), "20240501T120000Z");
        assert_eq!(get("x-amz-security-token"), "session");
        assert_eq!(
            get("x-amz-content-sha256"),
            "e3b0c44298fc1c149afbf4c8996fb92427ae41e4649b934ca495991b7852b855"
        );

        let auth = get("authorization");
        assert!(auth.starts_with(
            "AWS4-HMAC-SHA256 Credential=AKIDEXAMPLE/20240501/us-east-1/s3/aws4_request, "
        ));
        assert!(auth.contains(
            "SignedHeaders=host;x-amz-content-sha256;x-amz-date;x-amz-security-token, "
        ));
        assert!(!auth.contains("wJalrXUtnFEMI"));
        assert!(headers.iter().all(|(n, _)| n != "host"));
    }

    #[test]
    fn test_signature_is_stable() {
        let signer = S3Signer::from_config(&config("http://127.0.0.1:9000")).unwrap();
        let key = signer.object_key("k");
        let url = signer.object_url(&key).unwrap();
        let now = Utc.with_ymd_and_hms(2024, 5, 1, 12, 0, 0).unwrap();

        let headers = signer
            .sign(&ObjectRequest {
                method: &Method::GET,
                url: &url,
                object_key: &key,
                content_type: None,
                body: b"",
                now,
            })
            .unwrap();
        let (_, auth) = headers.iter().find(|(n, _)| n == "authorization").unwrap();
        assert!(auth.ends_with(
            "Signature=5ad1203a4ee642e48844799ff5910b68eb83853f336bb09a8f0da1aa4bee6a01"
        ));
    }

    #[test]
    fn test_anonymous_requests_are_unsigned() {
        let mut cfg = config("http://127.0.0.1:9000");
        cfg.access_key_id = None;
        cfg.secret_access_key = None;
        let signer = S3Signer::from_config(&cfg).unwrap();
        let url = signer.object_url("k").unwrap();

        let headers = signer
            .sign(&ObjectRequest {
                method: &Method::GET,
                url: &url,
                object_key: "k",
                content_type: None,
                body: b"",
                now: Utc::now(),
            })
            .unwrap();
        assert!(headers.is_empty());
    }

    #[tokio::test]
    async fn test_s3_write_and_read() {
        let server = MockServer::start().await;
        Mock::given(method("PUT"))
            .and(path("/state/stackyard/releases/shop/dev/1.yaml"))
            .and(header_exists("authorization"))
            .and(header(
                "x-amz-content-sha256",
                hex::encode(Sha256::digest(b"revision: 1")).as_str(),
            ))
            .respond_with(ResponseTemplate::new(200))
            .expect(1)
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/state/stackyard/releases/shop/dev/1.yaml"))
            .respond_with(ResponseTemplate::new(200).set_body_bytes(b"revision: 1".to_vec()))
            .mount(&server)
            .await;

        let backend = S3Backend::from_config(&config(&server.uri())).unwrap();
        backend
            .write("releases/shop/dev/1.yaml", b"revision: 1")
            .await
            .unwrap();
        let data = backend.read("releases/shop/dev/1.yaml").await.unwrap();
        assert_eq!(data.as_deref(), Some(b"revision: 1".as_slice()));
    }

    #[tokio::test]
    async fn test_s3_missing_object() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(404))
            .mount(&server)
            .await;
        Mock::given(method("HEAD"))
            .respond_with(ResponseTemplate::new(404))
            .mount(&server)
            .await;
        Mock::given(method("DELETE"))
            .respond_with(ResponseTemplate::new(404))
            .mount(&server)
            .await;

        let backend = S3Backend::from_config(&config(&server.uri())).unwrap();
        assert_eq!(backend.read("releases/shop/dev/9.yaml").await.unwrap(), None);
        assert!(!backend.exists("releases/shop/dev/9.yaml").await.unwrap());
        backend.delete("releases/shop/dev/9.yaml").await.unwrap();
    }

    #[tokio::test]
    async fn test_s3_error_status() {
        let server = MockServer::start().await;
        Mock::given(method("PUT"))
            .respond_with(ResponseTemplate::new(403).set_body_string("AccessDenied"))
            .mount(&server)
            .await;

        let backend = S3Backend::from_config(&config(&server.uri())).unwrap();
        let err = backend.write("k", b"v").await.unwrap_err();
        match err {
            BackendError::Http { status, message, .. } => {
                assert_eq!(status, 403);
                assert_eq!(message, "AccessDenied");
            }
            other => panic!("unexpected error: {other}"),
        }
    }
}
