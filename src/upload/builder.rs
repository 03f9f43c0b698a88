//! Signed upload request construction
//!
//! Flow: read the media once, hash it, sign `mch_id` + `media_hash` with the
//! merchant key, then encode the multipart body from the same buffer.

use std::path::Path;

use super::digest::{compute_signature, DigestAlgorithm};
use super::multipart::{MediaFile, MultipartBody};
use super::types::UploadRequest;
use crate::credentials::Credentials;
use crate::error::Result;

/// A request ready to hand to [`super::UploadClient::send_request`]
#[derive(Debug, Clone)]
pub struct SignedUpload {
    pub request: UploadRequest,
    pub body: MultipartBody,
}

pub struct SignedUploadRequestBuilder<'a> {
    credentials: &'a Credentials,
    algorithm: DigestAlgorithm,
}

impl<'a> SignedUploadRequestBuilder<'a> {
    pub fn new(credentials: &'a Credentials) -> Self {
        Self {
            credentials,
            algorithm: DigestAlgorithm::default(),
        }
    }

    pub fn with_algorithm(mut self, algorithm: DigestAlgorithm) -> Self {
        self.algorithm = algorithm;
        self
    }

    pub fn algorithm(&self) -> DigestAlgorithm {
        self.algorithm
    }

    pub async fn build(&self, path: &Path) -> Result<SignedUpload> {
        let media = MediaFile::open(path).await?;
        self.build_from_media(&media)
    }

    pub fn build_from_media(&self, media: &MediaFile) -> Result<SignedUpload> {
        let media_hash = media.hash(self.algorithm);
        let sign = compute_signature(
            self.algorithm,
            self.credentials.mch_id(),
            &media_hash,
            self.credentials.key(),
        );

        let request = UploadRequest::new(
            self.credentials.mch_id().to_string(),
            media.file_name().to_string(),
            media_hash,
            sign,
        );
        let body = MultipartBody::for_media(media, &request.form_fields())?;

        tracing::info!(
            mch_id = %request.mch_id(),
            media = %request.media(),
            media_hash = %request.media_hash(),
            size = media.len(),
            algorithm = ?self.algorithm,
            "Built signed upload request"
        );

        Ok(SignedUpload { request, body })
    }
}
