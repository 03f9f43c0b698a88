//! Upload request and response types

use bytes::Bytes;
use serde::Serialize;

use crate::error::{Result, UploadError};

/// Form field names, in the order the gateway expects them after `media`
pub const FIELD_MCH_ID: &str = "mch_id";
pub const FIELD_MEDIA_HASH: &str = "media_hash";
pub const FIELD_SIGN: &str = "sign";

// ============================================================================
// Request
// ============================================================================

/// The signed fields of one upload
///
/// Built only by [`super::SignedUploadRequestBuilder`], which computes
/// `media_hash` before `sign`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct UploadRequest {
    mch_id: String,
    /// File name of the uploaded media
    media: String,
    media_hash: String,
    sign: String,
}

impl UploadRequest {
    pub(crate) fn new(mch_id: String, media: String, media_hash: String, sign: String) -> Self {
        Self {
            mch_id,
            media,
            media_hash,
            sign,
        }
    }

    pub fn mch_id(&self) -> &str {
        &self.mch_id
    }

    pub fn media(&self) -> &str {
        &self.media
    }

    pub fn media_hash(&self) -> &str {
        &self.media_hash
    }

    pub fn sign(&self) -> &str {
        &self.sign
    }

    /// Text fields of the multipart body, in wire order
    pub fn form_fields(&self) -> [(&'static str, &str); 3] {
        [
            (FIELD_MCH_ID, self.mch_id.as_str()),
            (FIELD_MEDIA_HASH, self.media_hash.as_str()),
            (FIELD_SIGN, self.sign.as_str()),
        ]
    }

    /// Render as the gateway's `<xml>` document, for logging
    pub fn to_xml(&self) -> Result<String> {
        let mut buffer = String::new();
        let mut ser = quick_xml::se::Serializer::with_root(&mut buffer, Some("xml"))
            .map_err(|e| UploadError::Encoding(format!("XML serializer: {}", e)))?;
        ser.indent(' ', 4);
        self.serialize(ser)
            .map_err(|e| UploadError::Encoding(format!("XML serialization: {}", e)))?;
        Ok(buffer)
    }
}

// ============================================================================
// Response
// ============================================================================

/// Raw gateway response; the payload is not interpreted
#[derive(Debug, Clone)]
pub struct UploadResponse {
    pub status: u16,
    pub body: Bytes,
}

impl UploadResponse {
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }

    pub fn body_text(&self) -> String {
        String::from_utf8_lossy(&self.body).into_owned()
    }
}
