//! The session orchestrator: one upload in, one Markdown document out.
//!
//! ```text
//! Idle ─▶ FileReceived ─┬─▶ Rasterizing ──┬─▶ PerPageOcr ─▶ Aggregated ─┬─▶ Displayed
//!                       └─▶ DirectEncode ─┘                             └─▶ Idle (nothing to show)
//! ```
//!
//! Pages are processed strictly one after another, in document order. A page
//! whose OCR request fails is reported through the progress callback and left
//! out of the document; the remaining pages still run. Fatal errors (bad
//! upload, missing rasteriser, unreadable PDF) end the session before any OCR
//! request is made and return it to `Idle`.

use crate::config::{validate_model, SessionConfig};
use crate::error::{Ocr2MdError, PageError};
use crate::output::{PageResult, SessionOutput, SessionStats};
use crate::pipeline::encode::encode_page;
use crate::pipeline::input::{image_dimensions, UploadedFile};
use crate::pipeline::ocr::{GroqOcrClient, VisionOcrService};
use crate::pipeline::render::{PopplerRasterizer, Rasterizer};
use crate::pipeline::PageImage;
use crate::progress::ProgressCallback;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::Path;
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, info, warn};

/// Where a session is in its single pass over an upload.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SessionState {
    Idle,
    FileReceived,
    Rasterizing,
    DirectEncode,
    PerPageOcr,
    Aggregated,
    Displayed,
}

impl fmt::Display for SessionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            SessionState::Idle => "idle",
            SessionState::FileReceived => "file received",
            SessionState::Rasterizing => "rasterizing",
            SessionState::DirectEncode => "direct encode",
            SessionState::PerPageOcr => "per-page OCR",
            SessionState::Aggregated => "aggregated",
            SessionState::Displayed => "displayed",
        };
        f.write_str(s)
    }
}

/// Drives one upload at a time through rasterise → encode → OCR → aggregate.
///
/// A `Session` holds no per-upload state, so the same value can process any
/// number of uploads one after another; each is independent.
pub struct Session {
    config: Arc<SessionConfig>,
    rasterizer: Arc<dyn Rasterizer>,
    ocr: Arc<dyn VisionOcrService>,
    progress: Option<ProgressCallback>,
}

impl Session {
    /// Assemble a session from explicit collaborators.
    pub fn new(
        config: Arc<SessionConfig>,
        rasterizer: Arc<dyn Rasterizer>,
        ocr: Arc<dyn VisionOcrService>,
    ) -> Self {
        Self {
            config,
            rasterizer,
            ocr,
            progress: None,
        }
    }

    /// Production wiring: `pdftoppm` for PDFs, Groq for OCR.
    ///
    /// # Errors
    /// [`Ocr2MdError::MissingApiKey`] when the config has no credential.
    pub fn from_config(config: Arc<SessionConfig>) -> Result<Self, Ocr2MdError> {
        let rasterizer = Arc::new(PopplerRasterizer::new(config.dpi));
        let ocr = Arc::new(GroqOcrClient::from_config(&config)?);
        Ok(Self::new(config, rasterizer, ocr))
    }

    pub fn with_progress(mut self, progress: ProgressCallback) -> Self {
        self.progress = Some(progress);
        self
    }

    pub fn config(&self) -> &SessionConfig {
        &self.config
    }

    /// Process an upload with the configured model.
    pub async fn process(&self, upload: UploadedFile) -> Result<SessionOutput, Ocr2MdError> {
        let model = self.config.model.clone();
        self.process_with_model(upload, &model).await
    }

    /// Read `path` and process it with the configured model.
    pub async fn process_path(&self, path: impl AsRef<Path>) -> Result<SessionOutput, Ocr2MdError> {
        let upload = UploadedFile::from_path(path).await?;
        self.process(upload).await
    }

    /// Process an upload with `model`, which must be in the catalog.
    ///
    /// # Returns
    /// `Ok(SessionOutput)` even when some or all pages failed OCR; check
    /// `output.stats.failed_pages` or [`SessionOutput::page_errors`].
    ///
    /// # Errors
    /// Fatal problems only: unknown model, unsupported or empty upload,
    /// missing rasteriser, PDF the rasteriser rejects.
    pub async fn process_with_model(
        &self,
        upload: UploadedFile,
        model: &str,
    ) -> Result<SessionOutput, Ocr2MdError> {
        validate_model(model)?;
        let result = self.run(upload, model).await;
        if result.is_err() {
            self.transition(SessionState::Idle);
        }
        result
    }

    async fn run(&self, upload: UploadedFile, model: &str) -> Result<SessionOutput, Ocr2MdError> {
        let total_start = Instant::now();
        self.transition(SessionState::FileReceived);
        info!("Processing '{}' ({})", upload.filename, upload.mime);

        let kind = upload.validate()?;

        // ── Step 1: Page images ──────────────────────────────────────────
        let raster_start = Instant::now();
        let pages = if kind.is_pdf() {
            self.transition(SessionState::Rasterizing);
            self.rasterizer.rasterize(&upload.bytes).await?
        } else {
            self.transition(SessionState::DirectEncode);
            if let Some((w, h)) = image_dimensions(&upload.bytes) {
                debug!("Image upload {}x{} px", w, h);
            }
            vec![PageImage::new(1, upload.bytes, kind.mime())]
        };
        let rasterize_duration_ms = if kind.is_pdf() {
            raster_start.elapsed().as_millis() as u64
        } else {
            0
        };

        // ── Step 2: OCR each page, in order ─────────────────────────────
        self.transition(SessionState::PerPageOcr);
        let total = pages.len();
        if let Some(ref cb) = self.progress {
            cb.on_session_start(total);
        }

        let ocr_start = Instant::now();
        let mut results = Vec::with_capacity(total);
        for page in &pages {
            results.push(self.ocr_page(page, total, model).await);
        }
        let ocr_duration_ms = ocr_start.elapsed().as_millis() as u64;

        // ── Step 3: Aggregate ────────────────────────────────────────────
        self.transition(SessionState::Aggregated);
        let markdown = assemble_markdown(
            results
                .iter()
                .filter(|r| r.contributed())
                .map(|r| r.markdown.as_str()),
        );

        let processed = results.iter().filter(|r| r.error.is_none()).count();
        let stats = SessionStats {
            total_pages: total,
            processed_pages: processed,
            failed_pages: total - processed,
            empty_pages: results
                .iter()
                .filter(|r| r.error.is_none() && r.markdown.is_empty())
                .count(),
            total_duration_ms: total_start.elapsed().as_millis() as u64,
            rasterize_duration_ms,
            ocr_duration_ms,
        };

        let state = if markdown.is_empty() {
            SessionState::Idle
        } else {
            SessionState::Displayed
        };
        self.transition(state);

        info!(
            "Session complete: {}/{} pages, {} chars, {}ms",
            processed,
            total,
            markdown.len(),
            stats.total_duration_ms
        );
        if let Some(ref cb) = self.progress {
            cb.on_session_complete(total, processed);
        }

        Ok(SessionOutput {
            markdown,
            pages: results,
            stats,
            state,
        })
    }

    async fn ocr_page(&self, page: &PageImage, total: usize, model: &str) -> PageResult {
        let start = Instant::now();
        let page_num = page.page_num;
        if let Some(ref cb) = self.progress {
            cb.on_page_start(page_num, total);
        }

        let payload = encode_page(page);
        match self.ocr.extract(&payload, model).await {
            Ok(markdown) => {
                debug!("Page {}: {} chars", page_num, markdown.len());
                if let Some(ref cb) = self.progress {
                    cb.on_page_complete(page_num, total, markdown.len());
                }
                PageResult {
                    page_num,
                    markdown,
                    duration_ms: start.elapsed().as_millis() as u64,
                    error: None,
                }
            }
            Err(e) => {
                let error = PageError::from_request(page_num, &e);
                warn!("{}", error);
                if let Some(ref cb) = self.progress {
                    cb.on_page_error(page_num, total, &error.to_string());
                }
                PageResult {
                    page_num,
                    markdown: String::new(),
                    duration_ms: start.elapsed().as_millis() as u64,
                    error: Some(error),
                }
            }
        }
    }

    fn transition(&self, state: SessionState) {
        debug!("Session state → {}", state);
        if let Some(ref cb) = self.progress {
            cb.on_state_change(state);
        }
    }
}

/// Join page texts in order, each non-empty one followed by a blank line.
///
/// Empty texts are skipped without a trace; nothing is reordered or merged.
pub fn assemble_markdown<'a>(texts: impl IntoIterator<Item = &'a str>) -> String {
    let mut out = String::new();
    for text in texts {
        if !text.is_empty() {
            out.push_str(text);
            out.push_str("\n\n");
        }
    }
    out
}

/// Write Markdown to `path` atomically (temp file + rename).
pub async fn write_markdown(path: impl AsRef<Path>, markdown: &str) -> Result<(), Ocr2MdError> {
    let path = path.as_ref();
    let write_err = |source: std::io::Error| Ocr2MdError::OutputWriteFailed {
        path: path.to_path_buf(),
        source,
    };

    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        tokio::fs::create_dir_all(parent).await.map_err(write_err)?;
    }

    let tmp_path = path.with_extension("md.tmp");
    tokio::fs::write(&tmp_path, markdown).await.map_err(write_err)?;
    tokio::fs::rename(&tmp_path, path).await.map_err(write_err)?;
    Ok(())
}
