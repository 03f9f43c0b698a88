//! Error types for the upload client

use std::path::PathBuf;

use thiserror::Error;

/// Crate-wide result type
pub type Result<T> = std::result::Result<T, UploadError>;

/// Everything that can abort an upload run.
///
/// None of these are recovered locally: the binary logs the error and exits.
#[derive(Error, Debug)]
pub enum UploadError {
    #[error("Config load error: {0}")]
    ConfigLoad(String),

    #[error("Certificate load error: {0}")]
    CertificateLoad(String),

    #[error("File access error: {}: {source}", .path.display())]
    FileAccess {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Encoding error: {0}")]
    Encoding(String),

    #[error("TLS handshake failure: {0}")]
    TlsHandshake(String),

    #[error("Network error: {0}")]
    Network(String),

    #[error("HTTP protocol error: {0}")]
    HttpProtocol(String),

    /// Only raised when strict mode is on
    #[error("Unexpected HTTP status {status}: {body}")]
    UnexpectedStatus { status: u16, body: String },
}

impl UploadError {
    pub fn file_access(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::FileAccess {
            path: path.into(),
            source,
        }
    }

    /// Short machine-readable code, used as a structured log field
    pub fn code(&self) -> &'static str {
        match self {
            Self::ConfigLoad(_) => "CONFIG_LOAD",
            Self::CertificateLoad(_) => "CERTIFICATE_LOAD",
            Self::FileAccess { .. } => "FILE_ACCESS",
            Self::Encoding(_) => "ENCODING",
            Self::TlsHandshake(_) => "TLS_HANDSHAKE",
            Self::Network(_) => "NETWORK",
            Self::HttpProtocol(_) => "HTTP_PROTOCOL",
            Self::UnexpectedStatus { .. } => "UNEXPECTED_STATUS",
        }
    }
}
