//! Merchant credentials
//!
//! Loaded once at startup and passed by reference to whatever needs them.

use std::fmt;
use std::path::Path;

use rustls::pki_types::pem::PemObject;
use rustls::pki_types::{CertificateDer, PrivateKeyDer};

use crate::config::Config;
use crate::error::{Result, UploadError};

pub struct Credentials {
    mch_id: String,
    key: String,
    /// Client certificate chain followed by its private key
    identity_pem: Vec<u8>,
    ca_pem: Vec<u8>,
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("mch_id", &self.mch_id)
            .field("key", &"<redacted>")
            .finish_non_exhaustive()
    }
}

impl Credentials {
    /// Read the certificate files named by `config`.
    pub async fn load(config: &Config) -> Result<Self> {
        let cert_pem = read_pem(&config.cert.cert_file).await?;
        let key_pem = read_pem(&config.cert.key_file).await?;
        let ca_pem = read_pem(&config.cert.ca).await?;

        let credentials =
            Self::from_pem(&config.mch_id, &config.key, &cert_pem, &key_pem, &ca_pem)?;

        tracing::info!(
            mch_id = %config.mch_id,
            cert_file = %config.cert.cert_file.display(),
            ca = %config.cert.ca.display(),
            "Loaded merchant credentials"
        );

        Ok(credentials)
    }

    pub fn from_pem(
        mch_id: &str,
        key: &str,
        cert_pem: &[u8],
        key_pem: &[u8],
        ca_pem: &[u8],
    ) -> Result<Self> {
        let client_chain = parse_certificates("client certificate", cert_pem)?;
        PrivateKeyDer::from_pem_slice(key_pem).map_err(|e| {
            UploadError::CertificateLoad(format!("Failed to parse private key: {}", e))
        })?;
        let roots = parse_certificates("CA certificate", ca_pem)?;

        tracing::debug!(
            client_chain_len = client_chain.len(),
            roots = roots.len(),
            "Parsed PEM material"
        );

        let mut identity_pem = Vec::with_capacity(cert_pem.len() + key_pem.len() + 1);
        identity_pem.extend_from_slice(cert_pem);
        identity_pem.push(b'\n');
        identity_pem.extend_from_slice(key_pem);

        let credentials = Self {
            mch_id: mch_id.to_string(),
            key: key.to_string(),
            identity_pem,
            ca_pem: ca_pem.to_vec(),
        };
        credentials.identity()?;
        credentials.ca_certificate()?;

        Ok(credentials)
    }

    pub fn mch_id(&self) -> &str {
        &self.mch_id
    }

    /// Shared secret used to sign requests
    pub fn key(&self) -> &str {
        &self.key
    }

    /// Client identity for mutual TLS
    pub fn identity(&self) -> Result<reqwest::Identity> {
        reqwest::Identity::from_pem(&self.identity_pem).map_err(|e| {
            UploadError::CertificateLoad(format!("Failed to build client identity: {}", e))
        })
    }

    /// The single root the gateway certificate must chain to
    pub fn ca_certificate(&self) -> Result<reqwest::Certificate> {
        reqwest::Certificate::from_pem(&self.ca_pem).map_err(|e| {
            UploadError::CertificateLoad(format!("Failed to load CA certificate: {}", e))
        })
    }
}

async fn read_pem(path: &Path) -> Result<Vec<u8>> {
    tokio::fs::read(path).await.map_err(|e| {
        UploadError::CertificateLoad(format!("Failed to read {}: {}", path.display(), e))
    })
}

fn parse_certificates(what: &str, pem: &[u8]) -> Result<Vec<CertificateDer<'static>>> {
    let certs = CertificateDer::pem_slice_iter(pem)
        .collect::<std::result::Result<Vec<_>, _>>()
        .map_err(|e| UploadError::CertificateLoad(format!("Failed to parse {}: {}", what, e)))?;
    if certs.is_empty() {
        return Err(UploadError::CertificateLoad(format!("No {} found", what)));
    }
    Ok(certs)
}
