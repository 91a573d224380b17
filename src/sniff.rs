//! Content sniffing for upload payloads.

use std::path::Path;

use thiserror::Error;
use tokio::{fs::File, io::AsyncReadExt};

/// Only this many leading bytes are inspected.
pub const SNIFF_LEN: usize = 512;

pub const TEXT_PLAIN: &str = "text/plain; charset=utf-8";
pub const OCTET_STREAM: &str = "application/octet-stream";

const IMAGE_TYPES: [&str; 4] = ["image/bmp", "image/gif", "image/jpeg", "image/png"];

#[derive(Error, Debug)]
pub enum SniffError {
    #[error("failed to read `{path}`: `{source}`")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },
}

/// Whether the mime type is one of the image types default image uploaders
/// accept.
pub fn is_image(mime_type: &str) -> bool {
    IMAGE_TYPES.contains(&mime_type)
}

fn is_binary_byte(b: u8) -> bool {
    matches!(b, 0x00..=0x08 | 0x0B | 0x0E..=0x1A | 0x1C..=0x1F)
}

/// Detect the content type of a buffer.
pub fn detect_content_type(data: &[u8]) -> String {
    let data = &data[..data.len().min(SNIFF_LEN)];
    if let Some(kind) = infer::get(data) {
        return kind.mime_type().to_string();
    }
    if data.iter().any(|&b| is_binary_byte(b)) {
        return OCTET_STREAM.to_string();
    }
    // The cut may land inside a multibyte sequence.
    match std::str::from_utf8(data) {
        Ok(_) => TEXT_PLAIN.to_string(),
        Err(e) if e.error_len().is_none() => TEXT_PLAIN.to_string(),
        Err(_) => OCTET_STREAM.to_string(),
    }
}

/// Detect the content type of a file from its first [`SNIFF_LEN`] bytes.
pub async fn sniff_mime_type(path: &Path) -> Result<String, SniffError> {
    let io_err = |source| SniffError::Io {
        path: path.display().to_string(),
        source,
    };
    let file = File::open(path).await.map_err(io_err)?;
    let mut head = Vec::with_capacity(SNIFF_LEN);
    file.take(SNIFF_LEN as u64)
        .read_to_end(&mut head)
        .await
        .map_err(io_err)?;
    let mime_type = detect_content_type(&head);
    debug!("Sniffed {} as {}", path.display(), mime_type);
    Ok(mime_type)
}
