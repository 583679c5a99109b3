//! PDF rasterisation: one JPEG per page via poppler's `pdftoppm`.
//!
//! The PDF bytes are committed to a temporary file inside a private working
//! directory, `pdftoppm` writes `page-<n>.jpg` files next to it, and the
//! pages are read back in numeric order. The working directory is a
//! [`tempfile::TempDir`]: it is removed when the call returns, fails, or the
//! future is dropped mid-flight (the child process is killed on drop too).
//!
//! ## Why shell out?
//!
//! PDF rendering is a deep problem we do not want to own. `pdftoppm` is
//! present on most Linux hosts, one `brew install` away on macOS, and its
//! absence is cheap to detect up front (see [`poppler_locate`]).

use crate::error::Ocr2MdError;
use crate::pipeline::PageImage;
use async_trait::async_trait;
use once_cell::sync::Lazy;
use regex::Regex;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::time::Instant;
use tokio::process::Command;
use tracing::{debug, info};

/// Turns a PDF into an ordered sequence of page images.
#[async_trait]
pub trait Rasterizer: Send + Sync {
    /// Render every page of `pdf`, in document order.
    ///
    /// # Errors
    /// - [`Ocr2MdError::ToolUnavailable`] when the rendering toolchain is missing
    /// - [`Ocr2MdError::ConversionError`] when the PDF cannot be rendered
    async fn rasterize(&self, pdf: &[u8]) -> Result<Vec<PageImage>, Ocr2MdError>;
}

/// [`Rasterizer`] backed by the `pdftoppm` command-line tool.
#[derive(Debug, Clone)]
pub struct PopplerRasterizer {
    dpi: u32,
    binary: Option<PathBuf>,
    temp_root: Option<PathBuf>,
}

impl PopplerRasterizer {
    /// Render at `dpi`, locating `pdftoppm` on first use.
    pub fn new(dpi: u32) -> Self {
        Self {
            dpi,
            binary: None,
            temp_root: None,
        }
    }

    /// Use this `pdftoppm` instead of searching `POPPLER_PATH`/`PATH`.
    pub fn with_binary(mut self, path: impl Into<PathBuf>) -> Self {
        self.binary = Some(path.into());
        self
    }

    /// Create working directories under `dir` instead of the system temp dir.
    pub fn with_temp_root(mut self, dir: impl Into<PathBuf>) -> Self {
        self.temp_root = Some(dir.into());
        self
    }

    pub fn dpi(&self) -> u32 {
        self.dpi
    }

    /// The first lookup runs `pdftoppm -v`, so it goes to the blocking pool.
    async fn resolve_binary(&self) -> Result<PathBuf, Ocr2MdError> {
        if let Some(p) = &self.binary {
            return Ok(p.clone());
        }
        let located = tokio::task::spawn_blocking(poppler_locate::locate_pdftoppm)
            .await
            .map_err(|e| Ocr2MdError::Internal(format!("locating pdftoppm: {e}")))?;
        Ok(located?)
    }

    fn work_dir(&self) -> Result<tempfile::TempDir, Ocr2MdError> {
        let mut builder = tempfile::Builder::new();
        builder.prefix("ocr2md-");
        match &self.temp_root {
            Some(root) => builder.tempdir_in(root),
            None => builder.tempdir(),
        }
        .map_err(|e| Ocr2MdError::Internal(format!("tempdir: {e}")))
    }
}

#[async_trait]
impl Rasterizer for PopplerRasterizer {
    async fn rasterize(&self, pdf: &[u8]) -> Result<Vec<PageImage>, Ocr2MdError> {
        let start = Instant::now();
        let binary = self.resolve_binary().await?;

        let work_dir = self.work_dir()?;
        let mut pdf_file = tempfile::Builder::new()
            .prefix("upload-")
            .suffix(".pdf")
            .tempfile_in(work_dir.path())
            .map_err(|e| Ocr2MdError::Internal(format!("tempfile: {e}")))?;
        pdf_file
            .write_all(pdf)
            .and_then(|_| pdf_file.flush())
            .map_err(|e| Ocr2MdError::Internal(format!("tempfile write: {e}")))?;

        let prefix = work_dir.path().join(PAGE_PREFIX);
        debug!(
            "Running {} -jpeg -r {} on {} bytes",
            binary.display(),
            self.dpi,
            pdf.len()
        );

        let output = Command::new(&binary)
            .arg("-jpeg")
            .arg("-r")
            .arg(self.dpi.to_string())
            .arg(pdf_file.path())
            .arg(&prefix)
            .stdin(Stdio::null())
            .kill_on_drop(true)
            .output()
            .await
            .map_err(|e| spawn_error(&binary, e))?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            let detail = if stderr.trim().is_empty() {
                format!("pdftoppm exited with {}", output.status)
            } else {
                stderr.trim().to_string()
            };
            return Err(Ocr2MdError::ConversionError { detail });
        }

        let pages = collect_pages(work_dir.path()).await?;
        if pages.is_empty() {
            return Err(Ocr2MdError::ConversionError {
                detail: "pdftoppm produced no pages".into(),
            });
        }

        info!(
            "Rendered {} pages in {}ms",
            pages.len(),
            start.elapsed().as_millis()
        );
        Ok(pages)
    }
}

// ── Internal helpers ─────────────────────────────────────────────────────

const PAGE_PREFIX: &str = "page";

/// pdftoppm zero-pads the page number to the width of the page count.
static RE_PAGE_FILE: Lazy<Regex> = Lazy::new(|| Regex::new(r"^page-(\d+)\.jpg$").unwrap());

/// Page number encoded in a pdftoppm output file name.
pub(crate) fn page_number(file_name: &str) -> Option<usize> {
    RE_PAGE_FILE
        .captures(file_name)
        .and_then(|caps| caps[1].parse().ok())
}

async fn collect_pages(dir: &Path) -> Result<Vec<PageImage>, Ocr2MdError> {
    let io_err = |e: std::io::Error| Ocr2MdError::Internal(format!("reading rendered pages: {e}"));

    let mut numbered: Vec<(usize, PathBuf)> = Vec::new();
    let mut entries = tokio::fs::read_dir(dir).await.map_err(io_err)?;
    while let Some(entry) = entries.next_entry().await.map_err(io_err)? {
        let name = entry.file_name();
        if let Some(n) = name.to_str().and_then(page_number) {
            numbered.push((n, entry.path()));
        }
    }
    numbered.sort_by_key(|(n, _)| *n);

    let mut pages = Vec::with_capacity(numbered.len());
    for (n, path) in numbered {
        let bytes = tokio::fs::read(&path).await.map_err(io_err)?;
        debug!("Rendered page {} → {} bytes", n, bytes.len());
        pages.push(PageImage::jpeg(n, bytes));
    }
    Ok(pages)
}

fn spawn_error(binary: &Path, e: std::io::Error) -> Ocr2MdError {
    if matches!(
        e.kind(),
        std::io::ErrorKind::NotFound | std::io::ErrorKind::PermissionDenied
    ) {
        poppler_locate::PopplerError::ProbeFailed {
            path: binary.to_path_buf(),
            reason: e.to_string(),
            hint: poppler_locate::install_hint(),
        }
        .into()
    } else {
        Ocr2MdError::Internal(format!("failed to run {}: {e}", binary.display()))
    }
}
