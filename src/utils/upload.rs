use std::path::Path;

use bytes::Bytes;
use serde::Serialize;
use tokio::fs;
use uuid::Uuid;

use crate::config::get_config;
use crate::error::{Error, Result};

pub const LOGO_EXTENSIONS: &[&str] = &["png", "jpg", "jpeg", "webp"];
pub const CV_EXTENSIONS: &[&str] = &["pdf", "doc", "docx", "txt", "rtf"];

/// A logo persisted under the uploads directory. `url` is the public
/// path served by the static file route.
#[derive(Debug, Clone, Serialize)]
pub struct StoredLogo {
    pub key: String,
    pub url: String,
    pub name: String,
}

pub fn file_extension(filename: &str) -> String {
    Path::new(filename)
        .extension()
        .and_then(|ext| ext.to_str())
        .map(|ext| ext.to_lowercase())
        .unwrap_or_else(|| "bin".to_string())
}

/// Checks the extension against an allow-list and, for formats with a
/// stable signature, verifies the magic bytes match the extension.
pub fn validate_upload(filename: &str, data: &[u8], allowed: &[&str]) -> Result<String> {
    let extension = file_extension(filename);
    if !allowed.contains(&extension.as_str()) {
        return Err(Error::BadRequest(format!(
            "File type .{} is not allowed",
            extension
        )));
    }
    if data.is_empty() {
        return Err(Error::BadRequest("Uploaded file is empty".to_string()));
    }

    let signature_ok = match extension.as_str() {
        "pdf" => data.starts_with(b"%PDF"),
        "png" => data.starts_with(&[0x89, 0x50, 0x4E, 0x47]),
        "jpg" | "jpeg" => data.starts_with(&[0xFF, 0xD8]),
        "webp" => data.len() >= 12 && data.starts_with(b"RIFF") && &data[8..12] == b"WEBP",
        _ => true,
    };
    if !signature_ok {
        return Err(Error::BadRequest(format!(
            "File content does not match .{} format",
            extension
        )));
    }

    Ok(extension)
}

/// Validates and writes a company logo to disk, returning the stored
/// key, public URL and original filename.
pub async fn save_logo_file(filename: &str, data: &Bytes) -> Result<StoredLogo> {
    let extension = validate_upload(filename, data, LOGO_EXTENSIONS)?;

    let directory = format!("{}/logos", get_config().uploads_dir);
    fs::create_dir_all(&directory)
        .await
        .map_err(|e| Error::internal("Failed to store logo", e))?;

    let key = format!("{}.{}", Uuid::new_v4(), extension);
    let path = format!("{}/{}", directory, key);
    fs::write(&path, data)
        .await
        .map_err(|e| Error::internal("Failed to store logo", e))?;

    Ok(StoredLogo {
        url: format!("/uploads/logos/{}", key),
        key,
        name: filename.to_string(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn extension_is_lowercased() {
        assert_eq!(file_extension("Resume.PDF"), "pdf");
        assert_eq!(file_extension("logo.tar.gz"), "gz");
        assert_eq!(file_extension("no_extension"), "bin");
    }

    #[test]
    fn disallowed_extensions_are_rejected() {
        let result = validate_upload("payload.exe", b"MZ", CV_EXTENSIONS);

        assert!(matches!(result, Err(Error::BadRequest(msg)) if msg.contains(".exe")));
    }

    #[test]
    fn pdf_magic_bytes_are_enforced() {
        assert!(validate_upload("cv.pdf", b"%PDF-1.7 rest", CV_EXTENSIONS).is_ok());
        assert!(validate_upload("cv.pdf", b"<html>", CV_EXTENSIONS).is_err());
    }

    #[test]
    fn image_signatures_are_enforced() {
        let png = [0x89, 0x50, 0x4E, 0x47, 0x0D, 0x0A, 0x1A, 0x0A];
        assert!(validate_upload("logo.png", &png, LOGO_EXTENSIONS).is_ok());
        assert!(validate_upload("logo.png", b"GIF89a", LOGO_EXTENSIONS).is_err());

        let jpeg = [0xFF, 0xD8, 0xFF, 0xE0];
        assert!(validate_upload("logo.jpg", &jpeg, LOGO_EXTENSIONS).is_ok());

        let mut webp = Vec::from(&b"RIFF"[..]);
        webp.extend_from_slice(&[0, 0, 0, 0]);
        webp.extend_from_slice(b"WEBP");
        assert!(validate_upload("logo.webp", &webp, LOGO_EXTENSIONS).is_ok());
        assert!(validate_upload("logo.webp", b"RIFFxxxx", LOGO_EXTENSIONS).is_err());
    }

    #[test]
    fn empty_files_are_rejected() {
        assert!(validate_upload("cv.txt", b"", CV_EXTENSIONS).is_err());
    }

    #[test]
    fn plain_text_formats_skip_signature_checks() {
        assert!(validate_upload("cv.txt", b"hello", CV_EXTENSIONS).is_ok());
        assert!(validate_upload("cv.docx", b"PK\x03\x04", CV_EXTENSIONS).is_ok());
    }
}
