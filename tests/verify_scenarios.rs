//! Verifier scenarios with in-test compiler and backend fakes.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use texprune::verify::{
    CompileError, CompileFailure, Compiler, GrayImage, Rasterizer, Side, TextExtractor, Verifier,
    VerifyError, VerifyOptions,
};
use texprune::{DiffPayload, Method, Verdict};

// ─────────────────────────────────────────────────────────────────────────────
// Fakes
// ─────────────────────────────────────────────────────────────────────────────

/// Returns a fixed PDF (or failure) per directory.
#[derive(Default)]
struct FakeCompiler {
    outputs: HashMap<PathBuf, Result<Vec<u8>, CompileError>>,
    delay: Option<Duration>,
}

impl FakeCompiler {
    fn with(mut self, dir: &str, output: Result<&[u8], CompileError>) -> Self {
        self.outputs.insert(PathBuf::from(dir), output.map(|b| b.to_vec()));
        self
    }
}

#[async_trait]
impl Compiler for FakeCompiler {
    async fn compile(&self, dir: &Path, _main_file: &str) -> Result<Vec<u8>, CompileError> {
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        self.outputs.get(dir).cloned().unwrap_or_else(|| {
            Err(CompileError { failure: CompileFailure::MissingPdf(dir.join("main.pdf")), log: String::new() })
        })
    }
}

#[derive(Debug, thiserror::Error)]
#[error("backend unavailable")]
struct Unavailable;

/// Maps PDF bytes to page text; counts calls.
#[derive(Default)]
struct FakeText {
    pages: HashMap<Vec<u8>, Vec<String>>,
    calls: Arc<AtomicUsize>,
}

impl FakeText {
    fn with(mut self, pdf: &[u8], pages: &[&str]) -> Self {
        self.pages.insert(pdf.to_vec(), pages.iter().map(|p| p.to_string()).collect());
        self
    }
}

#[async_trait]
impl TextExtractor for FakeText {
    type Error = Unavailable;

    async fn extract_text(&self, pdf: &[u8]) -> Result<Vec<String>, Self::Error> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.pages.get(pdf).cloned().ok_or(Unavailable)
    }
}

/// Maps PDF bytes to rasters; counts calls.
#[derive(Default)]
struct FakeRaster {
    pages: HashMap<Vec<u8>, Vec<GrayImage>>,
    calls: Arc<AtomicUsize>,
}

impl FakeRaster {
    fn with(mut self, pdf: &[u8], pages: Vec<GrayImage>) -> Self {
        self.pages.insert(pdf.to_vec(), pages);
        self
    }
}

#[async_trait]
impl Rasterizer for FakeRaster {
    type Error = Unavailable;

    async fn rasterize(&self, pdf: &[u8], _dpi: u32) -> Result<Vec<GrayImage>, Self::Error> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.pages.get(pdf).cloned().ok_or(Unavailable)
    }
}

const ORIGINAL: &str = "/projects/original";
const CLEANED: &str = "/projects/cleaned";

async fn run(
    compiler: FakeCompiler,
    text: FakeText,
    raster: FakeRaster,
    options: VerifyOptions,
) -> Result<texprune::VerificationReport, VerifyError> {
    Verifier::new(compiler, text, raster, options)
        .verify(Path::new(ORIGINAL), Path::new(CLEANED), "main.tex")
        .await
}

// ─────────────────────────────────────────────────────────────────────────────
// Scenarios
// ─────────────────────────────────────────────────────────────────────────────

#[tokio::test]
async fn test_identical_bytes_stop_after_hash() {
    let text = FakeText::default();
    let text_calls = Arc::clone(&text.calls);
    let compiler = FakeCompiler::default()
        .with(ORIGINAL, Ok(b"%PDF same".as_slice()))
        .with(CLEANED, Ok(b"%PDF same".as_slice()));

    let report = run(compiler, text, FakeRaster::default(), VerifyOptions::default()).await.unwrap();

    assert_eq!(report.methods_run(), vec![Method::Hash]);
    assert_eq!(report.decisive(), Verdict::Identical);
    assert_eq!(text_calls.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn test_timestamp_difference_is_text_identical() {
    let compiler = FakeCompiler::default()
        .with(ORIGINAL, Ok(b"%PDF /CreationDate(2024)".as_slice()))
        .with(CLEANED, Ok(b"%PDF /CreationDate(2025)".as_slice()));
    let text = FakeText::default()
        .with(b"%PDF /CreationDate(2024)", &["Title\nBody text\n"])
        .with(b"%PDF /CreationDate(2025)", &["Title\nBody   text\n"]);
    let raster = FakeRaster::default();
    let raster_calls = Arc::clone(&raster.calls);

    let report = run(compiler, text, raster, VerifyOptions::default()).await.unwrap();

    assert_eq!(report.summary(), "Different (hash) / Identical (text)");
    assert_eq!(report.decisive(), Verdict::Identical);
    assert!(!report.is_disputed());
    assert_eq!(raster_calls.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn test_text_difference_without_visual_stops() {
    let compiler = FakeCompiler::default()
        .with(ORIGINAL, Ok(b"a".as_slice()))
        .with(CLEANED, Ok(b"b".as_slice()));
    let text = FakeText::default().with(b"a", &["kept line\nlost line\n"]).with(b"b", &["kept line\n"]);

    let report = run(compiler, text, FakeRaster::default(), VerifyOptions::default()).await.unwrap();

    assert_eq!(report.methods_run(), vec![Method::Hash, Method::Text]);
    assert_eq!(report.decisive(), Verdict::Different);
    match &report.verdict_for(Method::Text).unwrap().diff {
        Some(DiffPayload::Text { lines, .. }) => {
            assert_eq!(lines.len(), 1);
            assert_eq!(lines[0].to_string(), "-[p1] lost line");
        }
        other => panic!("unexpected diff: {:?}", other),
    }
}

#[tokio::test]
async fn test_visual_runs_after_text_difference_when_requested() {
    let compiler = FakeCompiler::default()
        .with(ORIGINAL, Ok(b"a".as_slice()))
        .with(CLEANED, Ok(b"b".as_slice()));
    let text = FakeText::default().with(b"a", &["ﬁne\n"]).with(b"b", &["fine\n"]);
    let raster = FakeRaster::default()
        .with(b"a", vec![GrayImage::filled(20, 20, 255)])
        .with(b"b", vec![GrayImage::filled(20, 20, 255)]);

    let options = VerifyOptions { visual: true, ..VerifyOptions::default() };
    let report = run(compiler, text, raster, options).await.unwrap();

    assert_eq!(report.summary(), "Different (hash) / Different (text) / Identical (visual)");
    assert_eq!(report.decisive(), Verdict::Different);
    assert!(report.is_disputed());
}

#[tokio::test]
async fn test_missing_text_layer_falls_back_to_visual() {
    let compiler = FakeCompiler::default()
        .with(ORIGINAL, Ok(b"scan-a".as_slice()))
        .with(CLEANED, Ok(b"scan-b".as_slice()));
    let text = FakeText::default().with(b"scan-a", &[""]).with(b"scan-b", &["  \n"]);
    let raster = FakeRaster::default()
        .with(b"scan-a", vec![GrayImage::filled(10, 10, 0), GrayImage::filled(10, 10, 0)])
        .with(b"scan-b", vec![GrayImage::filled(10, 10, 0)]);

    let report = run(compiler, text, raster, VerifyOptions::default()).await.unwrap();

    assert_eq!(report.verdict_for(Method::Text).unwrap().verdict, Verdict::Inconclusive);
    let visual = report.verdict_for(Method::Visual).unwrap();
    assert_eq!(visual.diff, Some(DiffPayload::PageCount { original: 2, cleaned: 1 }));
    assert_eq!(report.decisive(), Verdict::Different);
}

#[tokio::test]
async fn test_backend_failure_is_inconclusive() {
    let compiler = FakeCompiler::default()
        .with(ORIGINAL, Ok(b"a".as_slice()))
        .with(CLEANED, Ok(b"b".as_slice()));

    let report = run(compiler, FakeText::default(), FakeRaster::default(), VerifyOptions::default())
        .await
        .unwrap();

    assert_eq!(report.methods_run(), vec![Method::Hash, Method::Text, Method::Visual]);
    assert_eq!(report.decisive(), Verdict::Inconclusive);
    assert!(report.verdict_for(Method::Visual).unwrap().note.is_some());
}

#[tokio::test]
async fn test_compile_failure_aborts_before_comparison() {
    let text = FakeText::default();
    let text_calls = Arc::clone(&text.calls);
    let compiler = FakeCompiler::default().with(ORIGINAL, Ok(b"%PDF".as_slice())).with(
        CLEANED,
        Err(CompileError {
            failure: CompileFailure::ExitStatus(Some(1)),
            log: "! LaTeX Error: File `missing.sty' not found.".to_string(),
        }),
    );

    let err = run(compiler, text, FakeRaster::default(), VerifyOptions::default()).await.unwrap_err();

    let VerifyError::CompileFailed { side, failure, log_excerpt } = err;
    assert_eq!(side, Side::Cleaned);
    assert_eq!(failure, CompileFailure::ExitStatus(Some(1)));
    assert!(log_excerpt.contains("missing.sty"));
    assert_eq!(text_calls.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn test_compile_timeout() {
    let compiler = FakeCompiler {
        delay: Some(Duration::from_secs(5)),
        ..FakeCompiler::default()
    }
    .with(ORIGINAL, Ok(b"x".as_slice()))
    .with(CLEANED, Ok(b"x".as_slice()));

    let options = VerifyOptions { compile_timeout: Duration::from_millis(20), ..VerifyOptions::default() };
    let err = run(compiler, FakeText::default(), FakeRaster::default(), options).await.unwrap_err();

    let VerifyError::CompileFailed { side, failure, .. } = err;
    assert_eq!(side, Side::Original);
    assert_eq!(failure, CompileFailure::Timeout(0));
}
