//! # ocr2md
//!
//! Turn an uploaded image or PDF into Markdown using a hosted Vision Language
//! Model (VLM).
//!
//! Each page is shown to the model as a picture and the model writes the
//! Markdown. Nothing is parsed locally: PDF pages are rasterised by poppler's
//! `pdftoppm`, and the text comes back from Groq's OpenAI-compatible API.
//!
//! ## Pipeline Overview
//!
//! ```text
//! upload (JPG / PNG / PDF)
//!  │
//!  ├─ 1. Input   accept the file, check its type
//!  ├─ 2. Render  PDFs only: one JPEG per page via pdftoppm
//!  ├─ 3. Encode  bytes → data:<mime>;base64,… payload
//!  ├─ 4. VLM     one request per page, strictly in page order
//!  └─ 5. Output  non-empty page texts joined with blank lines
//! ```
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use ocr2md::{Session, SessionConfig};
//! use std::sync::Arc;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     // Reads GROQ_API_KEY (and optionally GROQ_BASE_URL)
//!     let config = Arc::new(SessionConfig::from_env().build()?);
//!     let session = Session::from_config(config)?;
//!     let output = session.process_path("scan.pdf").await?;
//!     if output.is_displayable() {
//!         println!("{}", output.markdown);
//!     }
//!     for err in output.page_errors() {
//!         eprintln!("{err}");
//!     }
//!     Ok(())
//! }
//! ```
//!
//! ## Feature Flags
//!
//! | Feature | Default | Description |
//! |---------|---------|-------------|
//! | `cli`   | on      | Enables the `ocr2md` binary (clap + anyhow + tracing-subscriber + indicatif) |
//!
//! ## Testing without the outside world
//!
//! [`Session::new`] takes any [`Rasterizer`] and [`VisionOcrService`], so the
//! whole flow can be exercised with in-memory stubs.

// ── Modules ──────────────────────────────────────────────────────────────

pub mod config;
pub mod error;
pub mod output;
pub mod pipeline;
pub mod progress;
pub mod prompts;
pub mod session;

// ── Re-exports ───────────────────────────────────────────────────────────

pub use config::{SessionConfig, SessionConfigBuilder, DEFAULT_MODEL, SUPPORTED_MODELS};
pub use error::{Ocr2MdError, OcrRequestError, PageError};
pub use output::{PageResult, SessionOutput, SessionStats};
pub use pipeline::encode::{encode_image, EncodedPayload};
pub use pipeline::input::{FileKind, UploadedFile};
pub use pipeline::ocr::{GroqOcrClient, VisionOcrService};
pub use pipeline::render::{PopplerRasterizer, Rasterizer};
pub use pipeline::PageImage;
pub use progress::{NoopProgressCallback, ProgressCallback, SessionProgressCallback};
pub use session::{assemble_markdown, write_markdown, Session, SessionState};
