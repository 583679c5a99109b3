//! Progress-callback trait for per-page session events.
//!
//! Inject an [`Arc<dyn SessionProgressCallback>`] via
//! [`crate::session::Session::with_progress`] to receive events as the
//! session moves through its states and pages. The terminal front end turns
//! these into a progress bar and "Processing page i of N" lines; tests use
//! them to observe ordering.
//!
//! # Example
//!
//! ```rust
//! use ocr2md::SessionProgressCallback;
//! use std::sync::atomic::{AtomicUsize, Ordering};
//!
//! struct CountingCallback {
//!     completed: AtomicUsize,
//! }
//!
//! impl SessionProgressCallback for CountingCallback {
//!     fn on_page_complete(&self, page_num: usize, total_pages: usize, markdown_len: usize) {
//!         self.completed.fetch_add(1, Ordering::SeqCst);
//!         eprintln!("Page {}/{} done ({} bytes)", page_num, total_pages, markdown_len);
//!     }
//! }
//! ```

use crate::session::SessionState;
use std::sync::Arc;

/// Called by the session as it processes one upload.
///
/// All methods have default no-op implementations so callers only override
/// what they care about. Pages are processed sequentially, so events for one
/// session never overlap.
pub trait SessionProgressCallback: Send + Sync {
    /// Called on every state transition, starting with `FileReceived`.
    fn on_state_change(&self, state: SessionState) {
        let _ = state;
    }

    /// Called once the page sequence is known, before the first OCR call.
    fn on_session_start(&self, total_pages: usize) {
        let _ = total_pages;
    }

    /// Called just before the OCR request is sent for a page.
    ///
    /// # Arguments
    /// * `page_num`    — 1-indexed page number
    /// * `total_pages` — total pages in the upload
    fn on_page_start(&self, page_num: usize, total_pages: usize) {
        let _ = (page_num, total_pages);
    }

    /// Called when a page's OCR request succeeds. `markdown_len` may be 0:
    /// an empty answer is a success that contributes nothing.
    fn on_page_complete(&self, page_num: usize, total_pages: usize, markdown_len: usize) {
        let _ = (page_num, total_pages, markdown_len);
    }

    /// Called when a page's OCR request fails. The page is skipped.
    fn on_page_error(&self, page_num: usize, total_pages: usize, error: &str) {
        let _ = (page_num, total_pages, error);
    }

    /// Called once after every page has been attempted.
    fn on_session_complete(&self, total_pages: usize, success_count: usize) {
        let _ = (total_pages, success_count);
    }
}

/// A no-op implementation for callers that don't need progress events.
pub struct NoopProgressCallback;

impl SessionProgressCallback for NoopProgressCallback {}

/// Convenience alias for the shared callback handle.
pub type ProgressCallback = Arc<dyn SessionProgressCallback>;
