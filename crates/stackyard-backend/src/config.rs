//! Backend configuration
//!
//! Configuration is plain data: where a medium lives and which credentials to
//! present. Discovering credentials (environment, profiles, instance metadata)
//! is the embedding application's job.
//!
//! ```yaml
//! type: s3
//! bucket: platform-state
//! region: eu-west-1
//! accessKeyId: AKIA...
//! secretAccessKey: ...
//! prefix: stackyard
//! ```

use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

use crate::error::{BackendError, Result};

/// Default deadline for a single storage call
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);

/// Default Google Cloud Storage XML API endpoint
pub const GOOGLE_DEFAULT_ENDPOINT: &str = "https://storage.googleapis.com";

/// Storage medium selection
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum BackendConfig {
    Local(LocalConfig),
    S3(S3Config),
    Oss(OssConfig),
    Google(GoogleConfig),
    /// Process memory; nothing survives the process
    Memory,
}

impl BackendConfig {
    /// Check that every required field is present
    pub fn validate(&self) -> Result<()> {
        match self {
            Self::Local(local) => {
                if local.path.as_os_str().is_empty() {
                    return Err(BackendError::InvalidConfig(
                        "local backend requires a path".to_string(),
                    ));
                }
            }
            Self::S3(s3) => {
                require("s3", "bucket", &s3.bucket)?;
                require("s3", "region", &s3.region)?;
                if s3.access_key_id.is_some() != s3.secret_access_key.is_some() {
                    return Err(BackendError::InvalidConfig(
                        "s3 accessKeyId and secretAccessKey must be set together".to_string(),
                    ));
                }
            }
            Self::Oss(oss) => {
                require("oss", "endpoint", &oss.endpoint)?;
                require("oss", "bucket", &oss.bucket)?;
                if oss.access_key_id.is_some() != oss.access_key_secret.is_some() {
                    return Err(BackendError::InvalidConfig(
                        "oss accessKeyId and accessKeySecret must be set together".to_string(),
                    ));
                }
            }
            Self::Google(google) => {
                require("google", "bucket", &google.bucket)?;
            }
            Self::Memory => {}
        }
        Ok(())
    }
}

fn require(backend: &str, field: &str, value: &str) -> Result<()> {
    if value.trim().is_empty() {
        return Err(BackendError::InvalidConfig(format!(
            "{backend} backend requires '{field}'"
        )));
    }
    Ok(())
}

/// Local filesystem medium
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LocalConfig {
    /// Root directory; keys are laid out beneath it
    pub path: PathBuf,
}

/// Amazon S3 (or any S3-compatible service)
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct S3Config {
    /// Service endpoint; defaults to `https://s3.{region}.amazonaws.com`
    pub endpoint: Option<String>,
    pub region: String,
    pub bucket: String,
    pub access_key_id: Option<String>,
    pub secret_access_key: Option<SecretString>,
    pub session_token: Option<SecretString>,
    /// Key prefix inside the bucket
    pub prefix: Option<String>,
}

impl S3Config {
    pub fn endpoint(&self) -> String {
        self.endpoint
            .clone()
            .unwrap_or_else(|| format!("https://s3.{}.amazonaws.com", self.region))
    }
}

/// Alibaba Cloud Object Storage Service
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct OssConfig {
    /// Regional endpoint, e.g. `https://oss-cn-hangzhou.aliyuncs.com`
    pub endpoint: String,
    pub bucket: String,
    pub access_key_id: Option<String>,
    pub access_key_secret: Option<SecretString>,
    pub security_token: Option<SecretString>,
    /// Endpoint is a custom domain already bound to the bucket
    pub cname: bool,
    pub prefix: Option<String>,
}

/// Google Cloud Storage, through its XML API
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct GoogleConfig {
    pub endpoint: Option<String>,
    pub bucket: String,
    /// OAuth2 access token
    pub token: Option<SecretString>,
    pub prefix: Option<String>,
}

impl GoogleConfig {
    pub fn endpoint(&self) -> String {
        self.endpoint
            .clone()
            .unwrap_or_else(|| GOOGLE_DEFAULT_ENDPOINT.to_string())
    }
}

/// Options shared by every store built on a backend
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct StoreOptions {
    /// Deadline applied to each storage call
    #[serde(with = "humantime_serde")]
    pub timeout: Duration,
}

impl Default for StoreOptions {
    fn default() -> Self {
        Self {
            timeout: DEFAULT_TIMEOUT,
        }
    }
}

/// A credential that never shows up in `Debug` output
#[derive(Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SecretString(String);

impl SecretString {
    pub fn new(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    pub fn expose(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Debug for SecretString {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("SecretString(***)")
    }
}

impl From<&str> for SecretString {
    fn from(value: &str) -> Self {
        Self::new(value)
    }
}

impl From<String> for SecretString {
    fn from(value: String) -> Self {
        Self(value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_s3_config() {
        let yaml = r#"
type: s3
bucket: platform-state
region: eu-west-1
accessKeyId: AKIDEXAMPLE
secretAccessKey: hunter2
prefix: stackyard
"#;
        let config: BackendConfig = serde_yaml::from_str(yaml).unwrap();
        let BackendConfig::S3(s3) = &config else {
            panic!("expected s3 config, got {:?}", config);
        };
        assert_eq!(s3.bucket, "platform-state");
        assert_eq!(s3.endpoint(), "https://s3.eu-west-1.amazonaws.com");
        assert_eq!(s3.secret_access_key.as_ref().map(|s| s.expose()), Some("hunter2"));
        config.validate().unwrap();
    }

    #[test]
    fn test_secret_redacted_in_debug() {
        let config = GoogleConfig {
            bucket: "b".to_string(),
            token: Some("ya29.secret".into()),
            ..Default::default()
        };
        let debug = format!("{:?}", config);
        assert!(!debug.contains("ya29.secret"));
        assert!(debug.contains("***"));
    }

    #[test]
    fn test_validate_missing_bucket() {
        let config = BackendConfig::Google(GoogleConfig::default());
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("bucket"));
    }

    #[test]
    fn test_validate_half_credentials() {
        let config = BackendConfig::Oss(OssConfig {
            endpoint: "https://oss-cn-hangzhou.aliyuncs.com".to_string(),
            bucket: "b".to_string(),
            access_key_id: Some("id".to_string()),
            ..Default::default()
        });
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_parse_local_and_memory() {
        let local: BackendConfig = serde_yaml::from_str("type: local\npath: /var/lib/stackyard").unwrap();
        assert_eq!(
            local,
            BackendConfig::Local(LocalConfig {
                path: PathBuf::from("/var/lib/stackyard")
            })
        );

        let memory: BackendConfig = serde_yaml::from_str("type: memory").unwrap();
        assert_eq!(memory, BackendConfig::Memory);
    }

    #[test]
    fn test_store_options_timeout() {
        let options: StoreOptions = serde_yaml::from_str("timeout: 5s").unwrap();
        assert_eq!(options.timeout, Duration::from_secs(5));
        assert_eq!(StoreOptions::default().timeout, DEFAULT_TIMEOUT);
    }
}
