//! Image encoding: page bytes → `data:<mime>;base64,<payload>`.
//!
//! OpenAI-compatible vision endpoints take images inline as data URIs in the
//! `image_url.url` field. The bytes are passed through untouched; no
//! re-compression happens here.

use crate::pipeline::PageImage;
use base64::{engine::general_purpose::STANDARD, Engine as _};
use std::fmt;
use tracing::debug;

/// MIME type assumed when the caller does not name one.
pub const DEFAULT_MIME: &str = "image/jpeg";

/// An immutable inline image payload ready for the request body.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EncodedPayload {
    uri: String,
    mime_len: usize,
}

impl EncodedPayload {
    /// The full `data:` URI.
    pub fn as_str(&self) -> &str {
        &self.uri
    }

    /// The declared MIME type.
    pub fn mime(&self) -> &str {
        &self.uri["data:".len().."data:".len() + self.mime_len]
    }

    /// The base64 part after the comma.
    pub fn base64_data(&self) -> &str {
        &self.uri["data:".len() + self.mime_len + ";base64,".len()..]
    }
}

impl fmt::Display for EncodedPayload {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.uri)
    }
}

/// Wrap raw image bytes as a `data:<mime>;base64,` URI.
pub fn encode_image(bytes: &[u8], mime: &str) -> EncodedPayload {
    let b64 = STANDARD.encode(bytes);
    debug!("Encoded image → {} bytes base64", b64.len());

    EncodedPayload {
        uri: format!("data:{mime};base64,{b64}"),
        mime_len: mime.len(),
    }
}

/// Encode one page using its own MIME type.
pub fn encode_page(page: &PageImage) -> EncodedPayload {
    encode_image(&page.bytes, &page.mime)
}
