//! multipart/form-data encoding for the upload body
//!
//! The gateway parses the body strictly, so the writer mirrors the layout
//! common form encoders produce: CRLF line endings, quoted names, and a
//! closing delimiter written by [`MultipartWriter::finish`]. A body can only be
//! sent once it has been finished.

use std::path::{Path, PathBuf};

use bytes::Bytes;
use uuid::Uuid;

use super::digest::{digest_hex, DigestAlgorithm};
use crate::error::{Result, UploadError};

/// Content type of the `media` part
pub const MEDIA_CONTENT_TYPE: &str = "application/octet-stream";

// RFC 2046 limit
const MAX_BOUNDARY_LEN: usize = 70;

// ============================================================================
// Media File
// ============================================================================

/// File contents read once and shared by hashing and body construction
#[derive(Debug, Clone)]
pub struct MediaFile {
    path: PathBuf,
    file_name: String,
    data: Bytes,
}

impl MediaFile {
    pub async fn open(path: &Path) -> Result<Self> {
        let data = tokio::fs::read(path)
            .await
            .map_err(|e| UploadError::file_access(path, e))?;

        let file_name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| "media".to_string());

        tracing::debug!(
            path = %path.display(),
            size = data.len(),
            "Read media file"
        );

        Ok(Self {
            path: path.to_path_buf(),
            file_name,
            data: Bytes::from(data),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn file_name(&self) -> &str {
        &self.file_name
    }

    pub fn data(&self) -> &Bytes {
        &self.data
    }

    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    pub fn hash(&self, algorithm: DigestAlgorithm) -> String {
        digest_hex(algorithm, &self.data)
    }
}

// ============================================================================
// Writer
// ============================================================================

/// Incremental multipart/form-data encoder
pub struct MultipartWriter {
    boundary: String,
    buf: Vec<u8>,
    parts: Vec<String>,
}

impl MultipartWriter {
    /// Create a writer with a random boundary
    pub fn new() -> Self {
        Self {
            boundary: format!("----WxPayFormBoundary{}", Uuid::new_v4().simple()),
            buf: Vec::new(),
            parts: Vec::new(),
        }
    }

    pub fn with_boundary(boundary: &str) -> Result<Self> {
        let valid = !boundary.is_empty()
            && boundary.len() <= MAX_BOUNDARY_LEN
            && boundary
                .bytes()
                .all(|b| b.is_ascii_alphanumeric() || b"'()+_,-./:=?".contains(&b));
        if !valid {
            return Err(UploadError::Encoding(format!("Invalid boundary: {:?}", boundary)));
        }

        Ok(Self {
            boundary: boundary.to_string(),
            buf: Vec::new(),
            parts: Vec::new(),
        })
    }

    pub fn boundary(&self) -> &str {
        &self.boundary
    }

    /// Append a file part
    pub fn write_file(
        &mut self,
        name: &str,
        file_name: &str,
        content_type: &str,
        data: &[u8],
    ) -> Result<()> {
        check_header_value("content type", content_type)?;
        let disposition = format!(
            "form-data; name=\"{}\"; filename=\"{}\"",
            escape_quotes(check_header_value("field name", name)?),
            escape_quotes(check_header_value("file name", file_name)?),
        );
        self.write_part(name, &disposition, Some(content_type), data);
        Ok(())
    }

    /// Append a plain text field
    pub fn write_field(&mut self, name: &str, value: &str) -> Result<()> {
        let disposition = format!(
            "form-data; name=\"{}\"",
            escape_quotes(check_header_value("field name", name)?)
        );
        self.write_part(name, &disposition, None, value.as_bytes());
        Ok(())
    }

    fn write_part(&mut self, name: &str, disposition: &str, content_type: Option<&str>, data: &[u8]) {
        if self.parts.is_empty() {
            self.buf.extend_from_slice(format!("--{}\r\n", self.boundary).as_bytes());
        } else {
            self.buf.extend_from_slice(format!("\r\n--{}\r\n", self.boundary).as_bytes());
        }

        self.buf
            .extend_from_slice(format!("Content-Disposition: {}\r\n", disposition).as_bytes());
        if let Some(content_type) = content_type {
            self.buf
                .extend_from_slice(format!("Content-Type: {}\r\n", content_type).as_bytes());
        }
        self.buf.extend_from_slice(b"\r\n");
        self.buf.extend_from_slice(data);

        self.parts.push(name.to_string());
    }

    /// Write the closing delimiter and hand out the finished body
    pub fn finish(mut self) -> MultipartBody {
        if self.parts.is_empty() {
            self.buf.extend_from_slice(format!("--{}--\r\n", self.boundary).as_bytes());
        } else {
            self.buf.extend_from_slice(format!("\r\n--{}--\r\n", self.boundary).as_bytes());
        }

        MultipartBody {
            boundary: self.boundary,
            bytes: Bytes::from(self.buf),
            parts: self.parts,
        }
    }
}

impl Default for MultipartWriter {
    fn default() -> Self {
        Self::new()
    }
}

fn check_header_value<'a>(what: &str, value: &'a str) -> Result<&'a str> {
    if value.contains(['\r', '\n']) {
        return Err(UploadError::Encoding(format!(
            "{} contains a line break: {:?}",
            what, value
        )));
    }
    Ok(value)
}

fn escape_quotes(value: &str) -> String {
    value.replace('\\', "\\\\").replace('"', "\\\"")
}

// ============================================================================
// Finished Body
// ============================================================================

/// A finalized multipart body, ready to send
#[derive(Debug, Clone)]
pub struct MultipartBody {
    boundary: String,
    bytes: Bytes,
    parts: Vec<String>,
}

impl MultipartBody {
    /// Encode `media` as the `media` part followed by `fields` in order.
    pub fn for_media(media: &MediaFile, fields: &[(&str, &str)]) -> Result<Self> {
        let mut writer = MultipartWriter::new();
        writer.write_file("media", media.file_name(), MEDIA_CONTENT_TYPE, media.data())?;
        for (name, value) in fields {
            writer.write_field(name, value)?;
        }
        Ok(writer.finish())
    }

    /// Value for the `Content-Type` request header
    pub fn content_type(&self) -> String {
        format!("multipart/form-data; boundary={}", self.boundary)
    }

    pub fn boundary(&self) -> &str {
        &self.boundary
    }

    pub fn bytes(&self) -> &Bytes {
        &self.bytes
    }

    pub fn into_bytes(self) -> Bytes {
        self.bytes
    }

    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }

    /// Part names in the order they were written
    pub fn part_names(&self) -> &[String] {
        &self.parts
    }
}

/// Read the file at `path` and encode it with `fields`.
pub async fn build_multipart_body(path: &Path, fields: &[(&str, &str)]) -> Result<MultipartBody> {
    let media = MediaFile::open(path).await?;
    MultipartBody::for_media(&media, fields)
}
