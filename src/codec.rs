use crate::error::{Result, ScanError};
use crate::types::RawImage;
use base64::{engine::general_purpose::STANDARD as BASE64, Engine};
use std::io;

/// Guess the image MIME type from its leading magic bytes.
pub fn sniff_mime(bytes: &[u8]) -> &'static str {
    if bytes.starts_with(&[0xFF, 0xD8, 0xFF]) {
        "image/jpeg"
    } else if bytes.starts_with(&[0x89, b'P', b'N', b'G', 0x0D, 0x0A, 0x1A, 0x0A]) {
        "image/png"
    } else if bytes.starts_with(b"GIF87a") || bytes.starts_with(b"GIF89a") {
        "image/gif"
    } else if bytes.len() >= 12 && &bytes[0..4] == b"RIFF" && &bytes[8..12] == b"WEBP" {
        "image/webp"
    } else if bytes.starts_with(b"BM") {
        "image/bmp"
    } else {
        "application/octet-stream"
    }
}

/// Encode raw bytes as a `data:<mime>;base64,...` URL.
pub fn encode(raw: &[u8]) -> String {
    format!("data:{};base64,{}", sniff_mime(raw), BASE64.encode(raw))
}

/// Decode either a data URL or bare base64 back into raw bytes.
pub fn decode(transport: &str) -> Result<Vec<u8>> {
    let payload = strip_data_url(transport.trim())?;
    BASE64
        .decode(payload)
        .map_err(|e| ScanError::Encoding(format!("Invalid base64: {}", e)))
}

fn strip_data_url(s: &str) -> Result<&str> {
    if !s.starts_with("data:") {
        return Ok(s);
    }
    let (header, payload) = s
        .split_once(',')
        .ok_or_else(|| ScanError::Encoding("Data URL has no payload".to_string()))?;
    if !header.ends_with(";base64") {
        return Err(ScanError::Encoding(format!(
            "Unsupported data URL encoding: {}",
            header
        )));
    }
    Ok(payload)
}

/// Load the bytes behind an acquired image handle. Missing, unreadable or empty images
/// are encoding failures whichever step reads them.
pub async fn read_image(image: RawImage) -> Result<Vec<u8>> {
    let bytes = match image {
        RawImage::Bytes(b) => b,
        RawImage::File(path) => tokio::fs::read(&path).await.map_err(|e| {
            if e.kind() == io::ErrorKind::NotFound {
                ScanError::Encoding(format!("Image not found: {}", path.display()))
            } else {
                ScanError::Encoding(format!("Could not read image {}: {}", path.display(), e))
            }
        })?,
    };
    if bytes.is_empty() {
        return Err(ScanError::Encoding("Image is empty".to_string()));
    }
    Ok(bytes)
}

/// Read an acquired image handle and encode it for transport.
pub async fn encode_image(image: &RawImage) -> Result<String> {
    Ok(encode(&read_image(image.clone()).await?))
}
