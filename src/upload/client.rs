//! Mutual-TLS upload client
//!
//! One client per run, one POST. The trust store holds only the configured
//! root; built-in roots are disabled.

use std::error::Error as StdError;
use std::time::Duration;

use reqwest::header::CONTENT_TYPE;

use super::multipart::MultipartBody;
use super::types::UploadResponse;
use crate::config::Config;
use crate::credentials::Credentials;
use crate::error::{Result, UploadError};

pub struct UploadClient {
    client: reqwest::Client,
    endpoint: String,
    strict: bool,
}

impl UploadClient {
    /// Build the HTTPS client from the merchant identity and pinned root.
    pub fn new(credentials: &Credentials, endpoint: &str, timeout: Duration) -> Result<Self> {
        let client = reqwest::Client::builder()
            .use_rustls_tls()
            .tls_built_in_root_certs(false)
            .add_root_certificate(credentials.ca_certificate()?)
            .identity(credentials.identity()?)
            .timeout(timeout)
            .build()
            .map_err(|e| {
                UploadError::CertificateLoad(format!(
                    "Failed to build TLS client: {}",
                    error_chain(&e)
                ))
            })?;

        Ok(Self {
            client,
            endpoint: endpoint.to_string(),
            strict: false,
        })
    }

    pub fn from_config(credentials: &Credentials, config: &Config) -> Result<Self> {
        Ok(Self::new(credentials, &config.endpoint, config.timeout())?.strict(config.strict))
    }

    /// Treat non-2xx responses as errors
    pub fn strict(mut self, strict: bool) -> Self {
        self.strict = strict;
        self
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    /// POST the finished body and return the raw response.
    pub async fn send_request(&self, body: MultipartBody) -> Result<UploadResponse> {
        let content_type = body.content_type();

        tracing::debug!(
            method = "POST",
            url = %self.endpoint,
            content_type = %content_type,
            content_length = body.len(),
            parts = ?body.part_names(),
            "Sending upload request"
        );

        let response = self
            .client
            .post(&self.endpoint)
            .header(CONTENT_TYPE, content_type)
            .body(body.into_bytes())
            .send()
            .await
            .map_err(classify_transport_error)?;

        let status = response.status().as_u16();
        let body = response.bytes().await.map_err(classify_transport_error)?;
        let response = UploadResponse { status, body };

        tracing::info!(status = status, "Upload response status");
        tracing::info!("Upload response body: {}", response.body_text());

        if self.strict && !response.is_success() {
            return Err(UploadError::UnexpectedStatus {
                status,
                body: response.body_text(),
            });
        }

        Ok(response)
    }
}

/// Map a reqwest failure onto the upload error taxonomy.
///
/// TLS failures arrive as IO errors wrapping a rustls error somewhere down
/// the source chain.
pub fn classify_transport_error(err: reqwest::Error) -> UploadError {
    let detail = error_chain(&err);

    if is_tls_failure(&err) {
        return UploadError::TlsHandshake(detail);
    }
    if err.is_timeout() || err.is_connect() || has_io_error(&err) {
        return UploadError::Network(detail);
    }
    UploadError::HttpProtocol(detail)
}

fn sources<'a>(
    err: &'a (dyn StdError + 'static),
) -> impl Iterator<Item = &'a (dyn StdError + 'static)> {
    std::iter::successors(Some(err), |&e| e.source())
}

fn is_tls_failure(err: &reqwest::Error) -> bool {
    sources(err).any(|e| {
        if e.downcast_ref::<rustls::Error>().is_some() {
            return true;
        }
        if let Some(io) = e.downcast_ref::<std::io::Error>() {
            if io
                .get_ref()
                .is_some_and(|inner| inner.downcast_ref::<rustls::Error>().is_some())
            {
                return true;
            }
        }
        let text = e.to_string().to_ascii_lowercase();
        text.contains("certificate") || text.contains("handshake")
    })
}

fn has_io_error(err: &reqwest::Error) -> bool {
    sources(err).any(|e| e.downcast_ref::<std::io::Error>().is_some())
}

fn error_chain(err: &(dyn StdError + 'static)) -> String {
    sources(err)
        .map(|e| e.to_string())
        .collect::<Vec<_>>()
        .join(": ")
}
