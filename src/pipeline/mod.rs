//! Pipeline stages for image/PDF-to-Markdown conversion.
//!
//! Each submodule implements exactly one step, and the two stages that touch
//! the outside world sit behind traits so the session can be driven by stubs
//! in tests.
//!
//! ## Data Flow
//!
//! ```text
//! input ──▶ render ──▶ encode ──▶ ocr
//! (upload)  (pdftoppm) (data URI) (hosted VLM)
//! ```
//!
//! 1. [`input`]  — accept an upload and check it is JPG, PNG or PDF
//! 2. [`render`] — PDFs only: rasterise every page through poppler
//! 3. [`encode`] — wrap page bytes in a `data:<mime>;base64,` payload
//! 4. [`ocr`]    — one chat-completion request per page

pub mod encode;
pub mod input;
pub mod ocr;
pub mod render;

/// One raster image handed to the OCR stage.
///
/// Either the whole uploaded image or one rendered PDF page. Sequences of
/// `PageImage` are always in document order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PageImage {
    /// 1-indexed position in the document.
    pub page_num: usize,
    /// Encoded image bytes (JPEG for rendered pages).
    pub bytes: Vec<u8>,
    /// MIME type of `bytes`.
    pub mime: String,
}

impl PageImage {
    pub fn new(page_num: usize, bytes: Vec<u8>, mime: impl Into<String>) -> Self {
        Self {
            page_num,
            bytes,
            mime: mime.into(),
        }
    }

    /// A rendered PDF page.
    pub fn jpeg(page_num: usize, bytes: Vec<u8>) -> Self {
        Self::new(page_num, bytes, "image/jpeg")
    }
}
