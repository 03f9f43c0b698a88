//! Configuration management for the upload client
//!
//! Settings come from a JSON file (the same shape the merchant demo has always
//! used) and can then be overridden from the environment, `.env` included.

use std::env;
use std::fmt;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::Deserialize;

use crate::error::{Result, UploadError};
use crate::upload::DigestAlgorithm;

/// Config file read when neither the command line nor `WXPAY_CONFIG` names one
pub const DEFAULT_CONFIG_PATH: &str = "config.json";

/// Production media upload endpoint
pub const DEFAULT_ENDPOINT: &str = "https://api.mch.weixin.qq.com/secapi/mch/uploadmedia";

pub const DEFAULT_TIMEOUT_SECS: u64 = 30;

#[derive(Clone, Deserialize)]
pub struct Config {
    /// Merchant ID assigned by the payment platform
    pub mch_id: String,

    /// API key, set in the merchant platform's API security page
    #[serde(alias = "Key")]
    pub key: String,

    #[serde(alias = "Cert")]
    pub cert: CertConfig,

    /// Media file to upload
    #[serde(alias = "ImgFile")]
    pub img_file: PathBuf,

    #[serde(default = "default_endpoint")]
    pub endpoint: String,

    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,

    /// Fail the run when the gateway answers with a non-2xx status
    #[serde(default)]
    pub strict: bool,

    #[serde(default)]
    pub digest: DigestAlgorithm,
}

#[derive(Debug, Clone, Deserialize)]
pub struct CertConfig {
    /// Client certificate (PEM)
    #[serde(alias = "CertFile")]
    pub cert_file: PathBuf,

    /// Client private key (PEM)
    #[serde(alias = "KeyFile")]
    pub key_file: PathBuf,

    /// Root CA the gateway certificate must chain to (PEM)
    #[serde(alias = "Ca")]
    pub ca: PathBuf,
}

fn default_endpoint() -> String {
    DEFAULT_ENDPOINT.to_string()
}

fn default_timeout_secs() -> u64 {
    DEFAULT_TIMEOUT_SECS
}

impl fmt::Debug for Config {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Config")
            .field("mch_id", &self.mch_id)
            .field("key", &"<redacted>")
            .field("cert", &self.cert)
            .field("img_file", &self.img_file)
            .field("endpoint", &self.endpoint)
            .field("timeout_secs", &self.timeout_secs)
            .field("strict", &self.strict)
            .field("digest", &self.digest)
            .finish()
    }
}

impl Config {
    /// Pick the config path: first CLI argument, then `WXPAY_CONFIG`, then the default.
    pub fn resolve_path(cli_arg: Option<String>) -> PathBuf {
        cli_arg
            .or_else(|| env::var("WXPAY_CONFIG").ok())
            .unwrap_or_else(|| DEFAULT_CONFIG_PATH.to_string())
            .into()
    }

    /// Load the file, apply environment overrides and validate.
    pub fn load(path: &Path) -> Result<Self> {
        let mut config = Self::from_file(path)?;
        config.apply_overrides(|name| env::var(name).ok())?;
        config.validate()?;
        Ok(config)
    }

    pub fn from_file(path: &Path) -> Result<Self> {
        let raw = std::fs::read_to_string(path).map_err(|e| {
            UploadError::ConfigLoad(format!("Failed to read {}: {}", path.display(), e))
        })?;
        Self::from_json(&raw)
    }

    pub fn from_json(raw: &str) -> Result<Self> {
        serde_json::from_str(raw)
            .map_err(|e| UploadError::ConfigLoad(format!("Invalid config: {}", e)))
    }

    /// Override file values with `WXPAY_*` variables.
    ///
    /// `lookup` abstracts the environment so callers can feed a fixed map.
    pub fn apply_overrides<F>(&mut self, lookup: F) -> Result<()>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(v) = lookup("WXPAY_MCH_ID") {
            self.mch_id = v;
        }
        if let Some(v) = lookup("WXPAY_KEY") {
            self.key = v;
        }
        if let Some(v) = lookup("WXPAY_ENDPOINT") {
            self.endpoint = v;
        }
        if let Some(v) = lookup("WXPAY_IMG_FILE") {
            self.img_file = v.into();
        }
        if let Some(v) = lookup("WXPAY_TIMEOUT_SECS") {
            self.timeout_secs = v.parse().map_err(|_| {
                UploadError::ConfigLoad(format!("WXPAY_TIMEOUT_SECS is not a number: {}", v))
            })?;
        }
        if let Some(v) = lookup("WXPAY_STRICT") {
            self.strict = matches!(v.to_ascii_lowercase().as_str(), "1" | "true" | "yes");
        }
        Ok(())
    }

    pub fn validate(&self) -> Result<()> {
        let required = [
            ("mch_id", self.mch_id.is_empty()),
            ("key", self.key.is_empty()),
            ("img_file", self.img_file.as_os_str().is_empty()),
            ("cert.cert_file", self.cert.cert_file.as_os_str().is_empty()),
            ("cert.key_file", self.cert.key_file.as_os_str().is_empty()),
            ("cert.ca", self.cert.ca.as_os_str().is_empty()),
        ];
        if let Some((name, _)) = required.iter().find(|(_, missing)| *missing) {
            return Err(UploadError::ConfigLoad(format!("Missing required field: {}", name)));
        }

        let url = reqwest::Url::parse(&self.endpoint).map_err(|e| {
            UploadError::ConfigLoad(format!("Invalid endpoint {}: {}", self.endpoint, e))
        })?;
        if !matches!(url.scheme(), "https" | "http") {
            return Err(UploadError::ConfigLoad(format!(
                "Unsupported endpoint scheme: {}",
                url.scheme()
            )));
        }

        if self.timeout_secs == 0 {
            return Err(UploadError::ConfigLoad("timeout_secs must be positive".to_string()));
        }

        Ok(())
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}
