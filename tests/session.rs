//! Session-level tests driven entirely by in-memory collaborators.
//!
//! A stub rasteriser stands in for pdftoppm and a scripted OCR service stands
//! in for the hosted model, so these run offline and deterministically.

use async_trait::async_trait;
use ocr2md::{
    EncodedPayload, Ocr2MdError, OcrRequestError, PageImage, Rasterizer, Session, SessionConfig,
    SessionProgressCallback, SessionState, UploadedFile, VisionOcrService, DEFAULT_MODEL,
};
use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

// ── Test helpers ─────────────────────────────────────────────────────────────

const PNG_MAGIC: &[u8] = b"\x89PNG\r\n\x1a\n\0\0\0\rIHDR";
const JPEG_MAGIC: &[u8] = &[0xFF, 0xD8, 0xFF, 0xE0, 0x00, 0x10, b'J', b'F', b'I', b'F'];

/// How the stub rasteriser answers.
enum RasterMode {
    Pages(usize),
    ToolMissing,
    BadPdf,
}

/// Stands in for pdftoppm: fake JPEG pages, a missing tool, or a PDF it
/// cannot render.
struct StubRasterizer {
    mode: RasterMode,
    calls: AtomicUsize,
}

impl StubRasterizer {
    fn build(mode: RasterMode) -> Arc<Self> {
        Arc::new(Self {
            mode,
            calls: AtomicUsize::new(0),
        })
    }

    fn with_pages(pages: usize) -> Arc<Self> {
        Self::build(RasterMode::Pages(pages))
    }

    fn missing() -> Arc<Self> {
        Self::build(RasterMode::ToolMissing)
    }

    fn rejecting() -> Arc<Self> {
        Self::build(RasterMode::BadPdf)
    }
}

#[async_trait]
impl Rasterizer for StubRasterizer {
    async fn rasterize(&self, _pdf: &[u8]) -> Result<Vec<PageImage>, Ocr2MdError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        match self.mode {
            RasterMode::ToolMissing => Err(Ocr2MdError::ToolUnavailable {
                message: "pdftoppm not found".into(),
            }),
            RasterMode::BadPdf => Err(Ocr2MdError::ConversionError {
                detail: "Syntax Error: Couldn't find trailer dictionary".into(),
            }),
            RasterMode::Pages(n) => Ok((1..=n)
                .map(|i| PageImage::jpeg(i, format!("page-{i}").into_bytes()))
                .collect()),
        }
    }
}

/// Replays scripted answers in order and records every request.
#[derive(Default)]
struct ScriptedOcr {
    answers: Mutex<VecDeque<Result<String, OcrRequestError>>>,
    seen: Mutex<Vec<(String, String)>>,
}

impl ScriptedOcr {
    fn new(answers: Vec<Result<String, OcrRequestError>>) -> Arc<Self> {
        Arc::new(Self {
            answers: Mutex::new(answers.into()),
            seen: Mutex::new(Vec::new()),
        })
    }

    fn calls(&self) -> usize {
        self.seen.lock().unwrap().len()
    }
}

#[async_trait]
impl VisionOcrService for ScriptedOcr {
    async fn extract(
        &self,
        payload: &EncodedPayload,
        model: &str,
    ) -> Result<String, OcrRequestError> {
        self.seen
            .lock()
            .unwrap()
            .push((payload.as_str().to_string(), model.to_string()));
        self.answers
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| Ok(String::new()))
    }
}

#[derive(Default)]
struct StateRecorder {
    states: Mutex<Vec<SessionState>>,
    pages: Mutex<Vec<String>>,
}

impl SessionProgressCallback for StateRecorder {
    fn on_state_change(&self, state: SessionState) {
        self.states.lock().unwrap().push(state);
    }

    fn on_page_start(&self, page_num: usize, total_pages: usize) {
        self.pages
            .lock()
            .unwrap()
            .push(format!("Processing page {page_num} of {total_pages}..."));
    }

    fn on_page_error(&self, page_num: usize, _total_pages: usize, _error: &str) {
        self.pages.lock().unwrap().push(format!("error {page_num}"));
    }
}

fn config() -> Arc<SessionConfig> {
    Arc::new(SessionConfig::builder().build().unwrap())
}

fn session(raster: Arc<StubRasterizer>, ocr: Arc<ScriptedOcr>) -> Session {
    Session::new(config(), raster, ocr)
}

fn pdf_upload() -> UploadedFile {
    UploadedFile::new("doc.pdf", "application/pdf", b"%PDF-1.4\n%stub\n".to_vec())
}

fn png_upload() -> UploadedFile {
    UploadedFile::new("scan.png", "image/png", PNG_MAGIC.to_vec())
}

fn ok(s: &str) -> Result<String, OcrRequestError> {
    Ok(s.to_string())
}

// ── PDF uploads ──────────────────────────────────────────────────────────────

#[tokio::test]
async fn pdf_pages_are_concatenated_in_order() {
    let raster = StubRasterizer::with_pages(2);
    let ocr = ScriptedOcr::new(vec![ok("# A"), ok("# B")]);
    let out = session(raster.clone(), ocr.clone())
        .process(pdf_upload())
        .await
        .unwrap();

    assert_eq!(out.markdown, "# A\n\n# B\n\n");
    assert_eq!(out.state, SessionState::Displayed);
    assert_eq!(out.stats.total_pages, 2);
    assert_eq!(ocr.calls(), 2);
    assert_eq!(raster.calls.load(Ordering::SeqCst), 1);

    // Each request carries that page's bytes, in page order.
    let seen = ocr.seen.lock().unwrap();
    assert!(seen[0].0.starts_with("data:image/jpeg;base64,"));
    assert_ne!(seen[0].0, seen[1].0);
}

#[tokio::test]
async fn failed_page_is_skipped_and_the_rest_continue() {
    let raster = StubRasterizer::with_pages(3);
    let ocr = ScriptedOcr::new(vec![
        ok("# P1"),
        Err(OcrRequestError::Api {
            status: 500,
            detail: "upstream exploded".into(),
        }),
        ok("# P3"),
    ]);
    let out = session(raster, ocr.clone())
        .process(pdf_upload())
        .await
        .unwrap();

    assert_eq!(out.markdown, "# P1\n\n# P3\n\n");
    assert_eq!(ocr.calls(), 3);
    assert_eq!(out.stats.failed_pages, 1);
    assert_eq!(out.stats.processed_pages, 2);

    let errors: Vec<String> = out.page_errors().map(|e| e.to_string()).collect();
    assert_eq!(errors.len(), 1);
    assert!(errors[0].starts_with("Page 2: error processing image:"), "{}", errors[0]);
    assert!(errors[0].contains("upstream exploded"));
}

#[tokio::test]
async fn missing_rasterizer_makes_no_ocr_calls() {
    let ocr = ScriptedOcr::new(vec![ok("never")]);
    let err = session(StubRasterizer::missing(), ocr.clone())
        .process(pdf_upload())
        .await
        .unwrap_err();

    assert!(matches!(err, Ocr2MdError::ToolUnavailable { .. }));
    assert_eq!(ocr.calls(), 0);
}

#[tokio::test]
async fn empty_results_are_dropped_silently() {
    let raster = StubRasterizer::with_pages(2);
    let ocr = ScriptedOcr::new(vec![ok(""), ok("")]);
    let out = session(raster, ocr).process(pdf_upload()).await.unwrap();

    assert_eq!(out.markdown, "");
    assert_eq!(out.state, SessionState::Idle);
    assert!(!out.is_displayable());
    assert_eq!(out.page_errors().count(), 0);
    assert_eq!(out.stats.empty_pages, 2);
}

#[tokio::test]
async fn all_pages_failing_yields_nothing_to_show() {
    let raster = StubRasterizer::with_pages(2);
    let ocr = ScriptedOcr::new(vec![
        Err(OcrRequestError::Timeout { secs: 60 }),
        Err(OcrRequestError::Transport("connection reset".into())),
    ]);
    let out = session(raster, ocr).process(pdf_upload()).await.unwrap();

    assert_eq!(out.markdown, "");
    assert_eq!(out.state, SessionState::Idle);
    assert_eq!(out.stats.failed_pages, 2);
}

#[tokio::test]
async fn unrenderable_pdf_is_a_conversion_error_without_ocr() {
    let recorder = Arc::new(StateRecorder::default());
    let raster = StubRasterizer::rejecting();
    let ocr = ScriptedOcr::new(vec![ok("never")]);
    let upload = UploadedFile::new("fake.pdf", "application/pdf", b"garbage".to_vec());
    let err = session(raster.clone(), ocr.clone())
        .with_progress(recorder.clone())
        .process(upload)
        .await
        .unwrap_err();

    assert!(matches!(err, Ocr2MdError::ConversionError { .. }), "{err:?}");
    assert!(err.to_string().starts_with("Error converting PDF:"));
    assert_eq!(raster.calls.load(Ordering::SeqCst), 1);
    assert_eq!(ocr.calls(), 0);
    assert_eq!(
        *recorder.states.lock().unwrap(),
        vec![
            SessionState::FileReceived,
            SessionState::Rasterizing,
            SessionState::Idle,
        ]
    );
}

#[tokio::test]
async fn odd_pdf_bytes_still_reach_the_rasterizer() {
    // Leading BOM before the header; pdftoppm decides, not the upload check.
    let raster = StubRasterizer::with_pages(1);
    let ocr = ScriptedOcr::new(vec![ok("# Doc")]);
    let upload = UploadedFile::new(
        "doc.pdf",
        "application/pdf",
        b"\xEF\xBB\xBF%PDF-1.4\n".to_vec(),
    );
    let out = session(raster.clone(), ocr).process(upload).await.unwrap();

    assert_eq!(out.markdown, "# Doc\n\n");
    assert_eq!(raster.calls.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn missing_tool_wins_over_bad_pdf_bytes() {
    let ocr = ScriptedOcr::new(vec![]);
    let upload = UploadedFile::new("fake.pdf", "application/pdf", b"garbage".to_vec());
    let err = session(StubRasterizer::missing(), ocr.clone())
        .process(upload)
        .await
        .unwrap_err();

    assert!(matches!(err, Ocr2MdError::ToolUnavailable { .. }));
    assert_eq!(ocr.calls(), 0);
}

// ── Image uploads ────────────────────────────────────────────────────────────

#[tokio::test]
async fn image_upload_is_one_page_without_rasterizing() {
    let raster = StubRasterizer::with_pages(5);
    let ocr = ScriptedOcr::new(vec![ok("# Receipt")]);
    let out = session(raster.clone(), ocr.clone())
        .process(png_upload())
        .await
        .unwrap();

    assert_eq!(out.markdown, "# Receipt\n\n");
    assert_eq!(out.pages.len(), 1);
    assert_eq!(out.stats.rasterize_duration_ms, 0);
    assert_eq!(raster.calls.load(Ordering::SeqCst), 0);

    let seen = ocr.seen.lock().unwrap();
    assert_eq!(seen.len(), 1);
    assert!(seen[0].0.starts_with("data:image/png;base64,"));
}

#[tokio::test]
async fn png_named_jpg_is_sent_as_is() {
    let ocr = ScriptedOcr::new(vec![ok("# Photo")]);
    let upload = UploadedFile::new("photo.jpg", "image/jpeg", PNG_MAGIC.to_vec());
    let out = session(StubRasterizer::with_pages(0), ocr.clone())
        .process(upload)
        .await
        .unwrap();

    assert_eq!(out.markdown, "# Photo\n\n");
    assert!(ocr.seen.lock().unwrap()[0]
        .0
        .starts_with("data:image/jpeg;base64,"));
}

#[tokio::test]
async fn jpeg_upload_keeps_its_mime() {
    let ocr = ScriptedOcr::new(vec![ok("x")]);
    let upload = UploadedFile::new("a.jpg", "image/jpeg", JPEG_MAGIC.to_vec());
    session(StubRasterizer::with_pages(0), ocr.clone())
        .process(upload)
        .await
        .unwrap();

    assert!(ocr.seen.lock().unwrap()[0]
        .0
        .starts_with("data:image/jpeg;base64,"));
}

#[tokio::test]
async fn unsupported_upload_is_rejected() {
    let ocr = ScriptedOcr::new(vec![]);
    let upload = UploadedFile::new("notes.txt", "text/plain", b"hello".to_vec());
    let err = session(StubRasterizer::with_pages(1), ocr.clone())
        .process(upload)
        .await
        .unwrap_err();

    assert!(matches!(err, Ocr2MdError::UnsupportedFileType { .. }));
    assert_eq!(ocr.calls(), 0);
}

#[tokio::test]
async fn empty_upload_is_rejected() {
    let upload = UploadedFile::new("blank.png", "image/png", Vec::new());
    let err = session(StubRasterizer::with_pages(1), ScriptedOcr::new(vec![]))
        .process(upload)
        .await
        .unwrap_err();
    assert!(matches!(err, Ocr2MdError::EmptyUpload { .. }));
}

#[tokio::test]
async fn missing_path_is_file_not_found() {
    let dir = tempfile::tempdir().unwrap();
    let err = session(StubRasterizer::with_pages(1), ScriptedOcr::new(vec![]))
        .process_path(dir.path().join("nope.pdf"))
        .await
        .unwrap_err();
    assert!(matches!(err, Ocr2MdError::FileNotFound { .. }));
}

#[tokio::test]
async fn process_path_reads_extension_for_type() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("scan.png");
    std::fs::write(&path, PNG_MAGIC).unwrap();

    let ocr = ScriptedOcr::new(vec![ok("text")]);
    let out = session(StubRasterizer::with_pages(0), ocr)
        .process_path(&path)
        .await
        .unwrap();
    assert_eq!(out.markdown, "text\n\n");
}

// ── Model selection ──────────────────────────────────────────────────────────

#[tokio::test]
async fn model_is_passed_through_unchanged() {
    let ocr = ScriptedOcr::new(vec![ok("x")]);
    session(StubRasterizer::with_pages(0), ocr.clone())
        .process_with_model(png_upload(), DEFAULT_MODEL)
        .await
        .unwrap();
    assert_eq!(ocr.seen.lock().unwrap()[0].1, DEFAULT_MODEL);
}

#[tokio::test]
async fn unknown_model_is_rejected_without_calls() {
    let raster = StubRasterizer::with_pages(1);
    let ocr = ScriptedOcr::new(vec![ok("x")]);
    let err = session(raster.clone(), ocr.clone())
        .process_with_model(pdf_upload(), "gpt-imaginary")
        .await
        .unwrap_err();

    assert!(matches!(err, Ocr2MdError::UnknownModel { .. }));
    assert_eq!(raster.calls.load(Ordering::SeqCst), 0);
    assert_eq!(ocr.calls(), 0);
}

// ── Progress and state ───────────────────────────────────────────────────────

#[tokio::test]
async fn states_follow_the_pdf_path() {
    let recorder = Arc::new(StateRecorder::default());
    let ocr = ScriptedOcr::new(vec![ok("a"), Err(OcrRequestError::Timeout { secs: 1 })]);
    session(StubRasterizer::with_pages(2), ocr)
        .with_progress(recorder.clone())
        .process(pdf_upload())
        .await
        .unwrap();

    assert_eq!(
        *recorder.states.lock().unwrap(),
        vec![
            SessionState::FileReceived,
            SessionState::Rasterizing,
            SessionState::PerPageOcr,
            SessionState::Aggregated,
            SessionState::Displayed,
        ]
    );
    assert_eq!(
        *recorder.pages.lock().unwrap(),
        vec![
            "Processing page 1 of 2...",
            "Processing page 2 of 2...",
            "error 2",
        ]
    );
}

#[tokio::test]
async fn fatal_error_returns_to_idle() {
    let recorder = Arc::new(StateRecorder::default());
    session(StubRasterizer::missing(), ScriptedOcr::new(vec![]))
        .with_progress(recorder.clone())
        .process(pdf_upload())
        .await
        .unwrap_err();

    assert_eq!(
        *recorder.states.lock().unwrap(),
        vec![
            SessionState::FileReceived,
            SessionState::Rasterizing,
            SessionState::Idle,
        ]
    );
}

#[tokio::test]
async fn image_path_uses_direct_encode() {
    let recorder = Arc::new(StateRecorder::default());
    session(StubRasterizer::with_pages(0), ScriptedOcr::new(vec![ok("x")]))
        .with_progress(recorder.clone())
        .process(png_upload())
        .await
        .unwrap();

    let states = recorder.states.lock().unwrap();
    assert_eq!(states[1], SessionState::DirectEncode);
    assert!(!states.contains(&SessionState::Rasterizing));
}

#[tokio::test]
async fn sessions_are_independent() {
    let ocr = ScriptedOcr::new(vec![ok("first"), ok("second")]);
    let s = session(StubRasterizer::with_pages(0), ocr);

    let a = s.process(png_upload()).await.unwrap();
    let b = s.process(png_upload()).await.unwrap();
    assert_eq!(a.markdown, "first\n\n");
    assert_eq!(b.markdown, "second\n\n");
}

#[tokio::test]
async fn output_serialises_to_json() {
    let ocr = ScriptedOcr::new(vec![ok("# T")]);
    let out = session(StubRasterizer::with_pages(1), ocr)
        .process(pdf_upload())
        .await
        .unwrap();

    let json = serde_json::to_value(&out).unwrap();
    assert_eq!(json["markdown"], "# T\n\n");
    assert_eq!(json["stats"]["total_pages"], 1);
    assert_eq!(json["state"], "Displayed");
}

#[test]
fn callback_and_services_are_send_sync() {
    fn assert_send_sync<T: Send + Sync>() {}
    assert_send_sync::<Session>();
    assert_send_sync::<ocr2md::NoopProgressCallback>();
    assert_send_sync::<ocr2md::GroqOcrClient>();
}
