//! Signed Media Upload
//!
//! Builds and sends the gateway's upload media request:
//! - MD5 content hash of the media file (`media_hash`)
//! - Keyed signature over `mch_id`, `media_hash` and the merchant key (`sign`)
//! - multipart/form-data body with parts `media`, `mch_id`, `media_hash`, `sign`
//! - One POST over mutual TLS, pinned to the configured root CA
//!
//! Flow:
//! 1. Load credentials
//! 2. Hash the media file
//! 3. Compute the signature
//! 4. Encode and finish the multipart body
//! 5. Send the request and report the response

pub mod builder;
pub mod client;
pub mod digest;
pub mod multipart;
pub mod types;

#[cfg(test)]
pub(crate) mod test_utils;

pub use builder::{SignedUpload, SignedUploadRequestBuilder};
pub use client::{classify_transport_error, UploadClient};
pub use digest::{
    compute_media_hash, compute_signature, digest_hex, signature_payload, DigestAlgorithm,
};
pub use multipart::{
    build_multipart_body, MediaFile, MultipartBody, MultipartWriter, MEDIA_CONTENT_TYPE,
};
pub use types::*;
