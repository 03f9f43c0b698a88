//! Weixin Pay upload media client
//!
//! Uploads one media file to the merchant gateway: hashes it, signs the
//! request with the merchant key, and POSTs a multipart body over mutual TLS.
//! The binary in main.rs runs the whole flow once.
//!
//! # Modules
//!
//! - `config`: JSON config file and `WXPAY_*` environment overrides
//! - `credentials`: merchant id, API key, client identity and pinned root CA
//! - `upload`: hashing, signing, multipart encoding and the HTTPS client
//! - `error`: the error taxonomy shared by all of the above

pub mod config;
pub mod credentials;
pub mod error;
pub mod upload;

pub use config::Config;
pub use credentials::Credentials;
pub use error::{Result, UploadError};
