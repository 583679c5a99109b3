//! Upload handling: what the user gave us, and whether we accept it.
//!
//! Only JPEG, PNG and PDF are accepted. The declared MIME type (derived from
//! the file extension when reading from disk) decides the route through the
//! session. Content is not sniffed for rejection: a broken PDF is the
//! rasteriser's to report, and the model copes with a PNG named `.jpg`.

use crate::error::Ocr2MdError;
use image::ImageFormat;
use std::io::Cursor;
use std::path::Path;
use tracing::debug;

/// The three accepted upload kinds.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FileKind {
    Jpeg,
    Png,
    Pdf,
}

impl FileKind {
    /// Map a file extension (case-insensitive, without the dot).
    pub fn from_extension(ext: &str) -> Option<Self> {
        match ext.to_ascii_lowercase().as_str() {
            "jpg" | "jpeg" => Some(FileKind::Jpeg),
            "png" => Some(FileKind::Png),
            "pdf" => Some(FileKind::Pdf),
            _ => None,
        }
    }

    /// Map a declared MIME type.
    pub fn from_mime(mime: &str) -> Option<Self> {
        match mime.trim().to_ascii_lowercase().as_str() {
            "image/jpeg" | "image/jpg" => Some(FileKind::Jpeg),
            "image/png" => Some(FileKind::Png),
            "application/pdf" => Some(FileKind::Pdf),
            _ => None,
        }
    }

    /// Canonical MIME type.
    pub fn mime(self) -> &'static str {
        match self {
            FileKind::Jpeg => "image/jpeg",
            FileKind::Png => "image/png",
            FileKind::Pdf => "application/pdf",
        }
    }

    fn image_format(self) -> Option<ImageFormat> {
        match self {
            FileKind::Jpeg => Some(ImageFormat::Jpeg),
            FileKind::Png => Some(ImageFormat::Png),
            FileKind::Pdf => None,
        }
    }

    pub fn is_pdf(self) -> bool {
        self == FileKind::Pdf
    }

    fn label(self) -> &'static str {
        match self {
            FileKind::Jpeg => "JPEG",
            FileKind::Png => "PNG",
            FileKind::Pdf => "PDF",
        }
    }
}

/// MIME type for a path, judged by its extension alone.
pub fn mime_for_path(path: &Path) -> Option<&'static str> {
    path.extension()
        .and_then(|e| e.to_str())
        .and_then(FileKind::from_extension)
        .map(FileKind::mime)
}

/// One uploaded file: raw bytes, declared MIME type and name.
///
/// Lives for exactly one session step and is never shared.
#[derive(Debug, Clone)]
pub struct UploadedFile {
    pub filename: String,
    pub mime: String,
    pub bytes: Vec<u8>,
}

impl UploadedFile {
    pub fn new(filename: impl Into<String>, mime: impl Into<String>, bytes: Vec<u8>) -> Self {
        Self {
            filename: filename.into(),
            mime: mime.into(),
            bytes,
        }
    }

    /// Read a local file, deriving the MIME type from its extension.
    ///
    /// Unknown extensions are still read; [`UploadedFile::validate`] rejects
    /// them with the list of accepted types.
    pub async fn from_path(path: impl AsRef<Path>) -> Result<Self, Ocr2MdError> {
        let path = path.as_ref();
        let bytes = tokio::fs::read(path).await.map_err(|e| match e.kind() {
            std::io::ErrorKind::NotFound => Ocr2MdError::FileNotFound {
                path: path.to_path_buf(),
            },
            std::io::ErrorKind::PermissionDenied => Ocr2MdError::PermissionDenied {
                path: path.to_path_buf(),
            },
            _ => Ocr2MdError::Internal(format!("reading {}: {e}", path.display())),
        })?;

        let filename = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| path.display().to_string());
        let mime = mime_for_path(path).unwrap_or("application/octet-stream");
        debug!("Read upload '{}' ({} bytes, {})", filename, bytes.len(), mime);

        Ok(Self::new(filename, mime, bytes))
    }

    /// Check the declared type is accepted and the upload is not empty.
    ///
    /// The bytes themselves are not judged here: PDFs are left to the
    /// rasteriser (which reports `ConversionError`) and images go to the
    /// model as-is. A disagreeing image signature is only logged.
    pub fn validate(&self) -> Result<FileKind, Ocr2MdError> {
        let kind = FileKind::from_mime(&self.mime).ok_or_else(|| {
            Ocr2MdError::UnsupportedFileType {
                filename: self.filename.clone(),
                mime: self.mime.clone(),
            }
        })?;

        if self.bytes.is_empty() {
            return Err(Ocr2MdError::EmptyUpload {
                filename: self.filename.clone(),
            });
        }

        if let Some(expected) = kind.image_format() {
            match image::guess_format(&self.bytes) {
                Ok(found) if found == expected => {}
                Ok(found) => debug!(
                    "'{}' is declared {} but looks like {:?}; sending as-is",
                    self.filename,
                    kind.label(),
                    found
                ),
                Err(e) => debug!("'{}': image signature not recognised ({})", self.filename, e),
            }
        }

        Ok(kind)
    }
}

/// Pixel dimensions of an image upload, if its header can be read.
pub fn image_dimensions(bytes: &[u8]) -> Option<(u32, u32)> {
    image::ImageReader::new(Cursor::new(bytes))
        .with_guessed_format()
        .ok()?
        .into_dimensions()
        .ok()
}
