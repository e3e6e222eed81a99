//! A single photo ready for upload.

use std::path::Path;
use thiserror::Error;

/// MIME type used when the extension is missing or unknown.
pub const DEFAULT_MIME: &str = "image/jpeg";

#[derive(Error, Debug)]
pub enum CaptureError {
    #[error("failed to read image {path}: {source}")]
    Read {
        path: String,
        #[source]
        source: std::io::Error,
    },
    #[error("image file {0} is empty")]
    Empty(String),
}

/// Photo bytes plus the metadata the multipart upload needs.
#[derive(Debug, Clone, PartialEq)]
pub struct CapturedImage {
    pub bytes: Vec<u8>,
    pub mime: String,
    pub filename: String,
}

impl CapturedImage {
    /// Wrap JPEG bytes produced by the camera, naming them after the capture time.
    pub fn from_jpeg(bytes: Vec<u8>) -> Self {
        let stamp = chrono::Local::now().format("%Y%m%d-%H%M%S");
        Self {
            bytes,
            mime: DEFAULT_MIME.to_string(),
            filename: format!("capture-{stamp}.jpg"),
        }
    }

    /// Load a photo from disk, deriving its MIME type from the extension.
    pub fn from_file(path: &Path) -> Result<Self, CaptureError> {
        let bytes = std::fs::read(path).map_err(|source| CaptureError::Read {
            path: path.display().to_string(),
            source,
        })?;
        if bytes.is_empty() {
            return Err(CaptureError::Empty(path.display().to_string()));
        }

        let filename = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| "upload.jpg".to_string());

        tracing::debug!(path = %path.display(), bytes = bytes.len(), "loaded image file");

        Ok(Self {
            bytes,
            mime: mime_for_path(path).to_string(),
            filename,
        })
    }
}

/// Derive an image MIME type from a file extension, case-insensitively.
pub fn mime_for_path(path: &Path) -> &'static str {
    let Some(ext) = path.extension().and_then(|e| e.to_str()) else {
        return DEFAULT_MIME;
    };
    match ext.to_ascii_lowercase().as_str() {
        "jpg" | "jpeg" => "image/jpeg",
        "png" => "image/png",
        "gif" => "image/gif",
        "webp" => "image/webp",
        "bmp" => "image/bmp",
        "heic" => "image/heic",
        "heif" => "image/heif",
        _ => DEFAULT_MIME,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    #[test]
    fn test_mime_known_extensions() {
        assert_eq!(mime_for_path(Path::new("a.png")), "image/png");
        assert_eq!(mime_for_path(Path::new("a.JPG")), "image/jpeg");
        assert_eq!(mime_for_path(Path::new("dir/a.HEIC")), "image/heic");
    }

    #[test]
    fn test_mime_defaults_to_jpeg() {
        assert_eq!(mime_for_path(Path::new("photo")), DEFAULT_MIME);
        assert_eq!(mime_for_path(Path::new("photo.tiff")), DEFAULT_MIME);
    }

    #[test]
    fn test_from_jpeg_names_capture() {
        let img = CapturedImage::from_jpeg(vec![0xFF, 0xD8]);
        assert_eq!(img.mime, "image/jpeg");
        assert!(img.filename.starts_with("capture-"));
        assert!(img.filename.ends_with(".jpg"));
    }

    fn temp_path(name: &str) -> PathBuf {
        std::env::temp_dir().join(format!("edutrack-{}-{name}", uuid::Uuid::new_v4()))
    }

    #[test]
    fn test_from_file_reads_bytes_and_mime() {
        let path = temp_path("face.png");
        std::fs::write(&path, b"not really a png").unwrap();
        let img = CapturedImage::from_file(&path).unwrap();
        std::fs::remove_file(&path).unwrap();

        assert_eq!(img.bytes, b"not really a png");
        assert_eq!(img.mime, "image/png");
        assert!(img.filename.ends_with("face.png"));
    }

    #[test]
    fn test_from_file_rejects_empty() {
        let path = temp_path("empty.jpg");
        std::fs::write(&path, b"").unwrap();
        let err = CapturedImage::from_file(&path).unwrap_err();
        std::fs::remove_file(&path).unwrap();
        assert!(matches!(err, CaptureError::Empty(_)));
    }

    #[test]
    fn test_from_file_missing() {
        let err = CapturedImage::from_file(&temp_path("missing.jpg")).unwrap_err();
        assert!(matches!(err, CaptureError::Read { .. }));
    }
}
