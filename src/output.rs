//! Result types for one processed upload.

use crate::error::PageError;
use crate::session::SessionState;
use serde::{Deserialize, Serialize};

/// Everything a session produced for one upload.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionOutput {
    /// Aggregated Markdown; each non-empty page followed by a blank line.
    pub markdown: String,
    /// One record per attempted page, in document order.
    pub pages: Vec<PageResult>,
    pub stats: SessionStats,
    /// `Displayed` when there is Markdown to show, otherwise `Idle`.
    pub state: SessionState,
}

impl SessionOutput {
    /// `true` when the output panel should be shown.
    pub fn is_displayable(&self) -> bool {
        self.state == SessionState::Displayed
    }

    /// Errors for the pages that were skipped.
    pub fn page_errors(&self) -> impl Iterator<Item = &PageError> {
        self.pages.iter().filter_map(|p| p.error.as_ref())
    }
}

/// Outcome of one page.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PageResult {
    /// 1-indexed page number.
    pub page_num: usize,
    /// Raw model text; empty when the page failed.
    pub markdown: String,
    pub duration_ms: u64,
    pub error: Option<PageError>,
}

impl PageResult {
    /// The page made it into the document.
    pub fn contributed(&self) -> bool {
        self.error.is_none() && !self.markdown.is_empty()
    }
}

/// Counters for one upload.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SessionStats {
    pub total_pages: usize,
    /// Pages whose OCR request succeeded (including empty answers).
    pub processed_pages: usize,
    pub failed_pages: usize,
    /// Successful pages whose answer was empty and therefore dropped.
    pub empty_pages: usize,
    pub total_duration_ms: u64,
    /// Zero for image uploads.
    pub rasterize_duration_ms: u64,
    pub ocr_duration_ms: u64,
}
