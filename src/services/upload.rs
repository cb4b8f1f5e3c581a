//! Upload store
//!
//! Persists covers, thumbnails and book files under the configured upload
//! directory and returns their public URL. Files arrive either raw (multipart)
//! or base64 encoded, as a `data:` URL or a bare base64 string.

use crate::config::UploadConfig;
use data_encoding::{BASE64, BASE64_NOPAD};
use serde::Serialize;
use tokio::fs;
use uuid::Uuid;

#[derive(Debug, thiserror::Error)]
pub enum UploadError {
    #[error("File type not allowed: {0}")]
    TypeNotAllowed(String),

    #[error("File too large: {size} bytes (max {max} bytes)")]
    TooLarge { size: u64, max: u64 },

    #[error("Invalid base64 payload")]
    InvalidEncoding,

    #[error("Empty file")]
    Empty,

    #[error("Failed to store file: {0}")]
    Io(#[from] std::io::Error),
}

/// A file written to the upload directory
#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct StoredFile {
    pub url: String,
    pub filename: String,
    pub size: u64,
    pub content_type: String,
}

/// Writes uploads to disk with unique names
#[derive(Debug, Clone)]
pub struct UploadStore {
    config: UploadConfig,
}

impl UploadStore {
    pub fn new(config: UploadConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &UploadConfig {
        &self.config
    }

    /// Store a raw upload, capped by `max_file_size`
    pub async fn save_bytes(&self, data: &[u8], content_type: &str) -> Result<StoredFile, UploadError> {
        self.store(data, content_type, self.config.max_file_size).await
    }

    /// Store a `data:<mime>;base64,<payload>` URL or a bare base64 string,
    /// capped by `max_base64_size` after decoding.
    ///
    /// Bare payloads have their type detected from the file signature.
    pub async fn save_data_url(&self, payload: &str) -> Result<StoredFile, UploadError> {
        let (declared, encoded) = split_data_url(payload.trim());

        // 4 base64 characters carry 3 bytes
        let estimated = (encoded.len() as u64 / 4) * 3;
        let max = self.config.max_base64_size;
        if estimated > max + 3 {
            return Err(UploadError::TooLarge { size: estimated, max });
        }

        let data = decode_base64(encoded)?;
        let content_type = match declared {
            Some(mime) => mime.to_string(),
            None => sniff_content_type(&data)
                .ok_or_else(|| UploadError::TypeNotAllowed("unknown".into()))?
                .to_string(),
        };
        self.store(&data, &content_type, max).await
    }

    async fn store(&self, data: &[u8], content_type: &str, max: u64) -> Result<StoredFile, UploadError> {
        let content_type = content_type.trim().to_lowercase();
        if !self.config.is_type_allowed(&content_type) {
            return Err(UploadError::TypeNotAllowed(content_type));
        }
        if data.is_empty() {
            return Err(UploadError::Empty);
        }
        let size = data.len() as u64;
        if size > max {
            return Err(UploadError::TooLarge { size, max });
        }

        fs::create_dir_all(&self.config.path).await?;
        let filename = format!("{}.{}", Uuid::new_v4(), self.config.get_extension(&content_type));
        fs::write(self.config.path.join(&filename), data).await?;

        tracing::debug!("Stored upload {} ({} bytes, {})", filename, size, content_type);
        Ok(StoredFile {
            url: format!("{}/{}", self.config.public_prefix.trim_end_matches('/'), filename),
            filename,
            size,
            content_type,
        })
    }
}

/// True for `data:` URLs, which content fields may carry instead of a stored URL
pub fn is_data_url(value: &str) -> bool {
    value.trim_start().starts_with("data:")
}

fn split_data_url(payload: &str) -> (Option<&str>, &str) {
    match payload.strip_prefix("data:").and_then(|rest| rest.split_once(',')) {
        Some((meta, data)) => {
            let mime = meta.split(';').next().filter(|m| !m.is_empty());
            (mime, data)
        }
        None => (None, payload),
    }
}

fn decode_base64(encoded: &str) -> Result<Vec<u8>, UploadError> {
    let cleaned: Vec<u8> = encoded
        .bytes()
        .filter(|b| !b.is_ascii_whitespace())
        .collect();
    BASE64
        .decode(&cleaned)
        .or_else(|_| BASE64_NOPAD.decode(&cleaned))
        .map_err(|_| UploadError::InvalidEncoding)
}

fn sniff_content_type(data: &[u8]) -> Option<&'static str> {
    if data.starts_with(&[0x89, b'P', b'N', b'G']) {
        Some("image/png")
    } else if data.starts_with(&[0xFF, 0xD8, 0xFF]) {
        Some("image/jpeg")
    } else if data.starts_with(b"GIF8") {
        Some("image/gif")
    } else if data.len() >= 12 && &data[..4] == b"RIFF" && &data[8..12] == b"WEBP" {
        Some("image/webp")
    } else if data.starts_with(b"%PDF") {
        Some("application/pdf")
    } else if data.starts_with(b"PK\x03\x04") {
        Some("application/epub+zip")
    } else {
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    const PNG_HEADER: &[u8] = &[0x89, b'P', b'N', b'G', 0x0D, 0x0A, 0x1A, 0x0A, 0, 0, 0, 0];

    fn store_in(dir: &TempDir) -> UploadStore {
        UploadStore::new(UploadConfig {
            path: dir.path().to_path_buf(),
            max_file_size: 64,
            max_base64_size: 32,
            ..Default::default()
        })
    }

    #[tokio::test]
    async fn test_save_bytes_writes_unique_files() {
        let dir = TempDir::new().unwrap();
        let store = store_in(&dir);

        let a = store.save_bytes(b"%PDF-1.4 test", "application/pdf").await.unwrap();
        let b = store.save_bytes(b"%PDF-1.4 test", "application/pdf").await.unwrap();

        assert_ne!(a.filename, b.filename);
        assert!(a.filename.ends_with(".pdf"));
        assert_eq!(a.url, format!("/uploads/{}", a.filename));
        assert_eq!(a.size, 13);
        assert_eq!(std::fs::read(dir.path().join(&a.filename)).unwrap(), b"%PDF-1.4 test");
    }

    #[tokio::test]
    async fn test_save_bytes_rejects_type_and_size() {
        let dir = TempDir::new().unwrap();
        let store = store_in(&dir);

        assert!(matches!(
            store.save_bytes(b"#!/bin/sh", "application/x-sh").await,
            Err(UploadError::TypeNotAllowed(_))
        ));
        assert!(matches!(
            store.save_bytes(&[0u8; 65], "image/png").await,
            Err(UploadError::TooLarge { size: 65, max: 64 })
        ));
        assert!(matches!(store.save_bytes(&[], "image/png").await, Err(UploadError::Empty)));
    }

    #[tokio::test]
    async fn test_save_data_url_and_bare_base64() {
        let dir = TempDir::new().unwrap();
        let store = store_in(&dir);
        let encoded = BASE64.encode(PNG_HEADER);

        let from_url = store
            .save_data_url(&format!("data:image/png;base64,{}", encoded))
            .await
            .unwrap();
        assert_eq!(from_url.content_type, "image/png");
        assert_eq!(from_url.size, PNG_HEADER.len() as u64);

        let bare = store.save_data_url(&encoded).await.unwrap();
        assert_eq!(bare.content_type, "image/png");
        assert!(bare.filename.ends_with(".png"));
    }

    #[tokio::test]
    async fn test_save_data_url_errors() {
        let dir = TempDir::new().unwrap();
        let store = store_in(&dir);

        assert!(matches!(
            store.save_data_url("data:image/png;base64,@@not base64@@").await,
            Err(UploadError::InvalidEncoding)
        ));

        let big = BASE64.encode(&[0u8; 60]);
        assert!(matches!(
            store.save_data_url(&format!("data:image/png;base64,{}", big)).await,
            Err(UploadError::TooLarge { .. })
        ));

        let text = BASE64.encode(b"plain text");
        assert!(matches!(
            store.save_data_url(&text).await,
            Err(UploadError::TypeNotAllowed(_))
        ));
    }

    #[test]
    fn test_data_url_helpers() {
        assert!(is_data_url("data:image/png;base64,AAAA"));
        assert!(!is_data_url("/uploads/cover.png"));
        assert_eq!(split_data_url("data:image/gif;base64,R0lG"), (Some("image/gif"), "R0lG"));
        assert_eq!(split_data_url("R0lG"), (None, "R0lG"));
        assert_eq!(sniff_content_type(b"GIF89a"), Some("image/gif"));
        assert_eq!(sniff_content_type(b"hello"), None);
    }
}
