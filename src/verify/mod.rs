//! Equivalence verifier.
//!
//! Compiles the original and the cleaned tree and compares the two PDFs,
//! cheapest method first:
//!
//! 1. **Compile** both trees concurrently; either failure aborts the run
//! 2. **Hash**: identical digests settle it, a mismatch is only recorded
//! 3. **Text**: Identical stops; Different stops unless visual was requested
//! 4. **Visual**: when requested, or when the text was inconclusive
//!
//! The report keeps every verdict that was produced.

pub mod backends;
pub mod compare;
pub mod compiler;
pub mod diff;

use std::fmt;
use std::path::Path;
use std::time::Duration;

use async_trait::async_trait;

use crate::types::{Method, MethodVerdict, VerificationReport, Verdict};

pub use backends::{BackendError, GrayImage, PopplerRaster, PopplerText};
pub use compiler::LatexmkCompiler;

/// Which tree a compile belonged to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Side {
    /// The source tree.
    Original,
    /// The reduced tree.
    Cleaned,
}

impl fmt::Display for Side {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Original => write!(f, "original"),
            Self::Cleaned => write!(f, "cleaned"),
        }
    }
}

/// Why a compilation failed.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum CompileFailure {
    /// The compile did not finish in time.
    #[error("timed out after {0}s")]
    Timeout(u64),
    /// The last compile step exited unsuccessfully.
    #[error("compiler exited with status {}", .0.map(|c| c.to_string()).unwrap_or_else(|| "unknown".to_string()))]
    ExitStatus(Option<i32>),
    /// The compiler reported success but the PDF is missing.
    #[error("no PDF produced at {0}")]
    MissingPdf(std::path::PathBuf),
    /// The compiler could not be started.
    #[error("failed to start compiler: {0}")]
    Spawn(String),
    /// A PDF from an earlier build could not be removed before compiling.
    #[error("cannot remove stale PDF at {0}")]
    StalePdf(std::path::PathBuf),
}

/// A failed compilation with its log excerpt.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("{failure}")]
pub struct CompileError {
    /// What went wrong.
    pub failure: CompileFailure,
    /// Relevant part of the compiler output.
    pub log: String,
}

/// Error type for verification.
#[derive(Debug, thiserror::Error)]
pub enum VerifyError {
    /// One of the trees did not compile.
    #[error("Compilation of the {side} tree failed: {failure}")]
    CompileFailed {
        /// Tree that failed.
        side: Side,
        /// Failure kind.
        failure: CompileFailure,
        /// Relevant part of the compiler output.
        log_excerpt: String,
    },
}

/// Produces a PDF from a tree.
#[async_trait]
pub trait Compiler: Send + Sync {
    /// Compile `main_file` (relative to `dir`) and return the PDF bytes.
    async fn compile(&self, dir: &Path, main_file: &str) -> Result<Vec<u8>, CompileError>;
}

/// Extracts per-page text from a PDF.
#[async_trait]
pub trait TextExtractor: Send + Sync {
    /// Error type.
    type Error: std::error::Error + Send + Sync + 'static;

    /// Text of each page, in page order.
    async fn extract_text(&self, pdf: &[u8]) -> Result<Vec<String>, Self::Error>;
}

/// Renders PDF pages to grayscale rasters.
#[async_trait]
pub trait Rasterizer: Send + Sync {
    /// Error type.
    type Error: std::error::Error + Send + Sync + 'static;

    /// One raster per page at `dpi`, in page order.
    async fn rasterize(&self, pdf: &[u8], dpi: u32) -> Result<Vec<GrayImage>, Self::Error>;
}

/// Verification options.
#[derive(Debug, Clone, PartialEq)]
pub struct VerifyOptions {
    /// Run the visual comparison even when the text comparison decided.
    pub visual: bool,
    /// Log every diff line.
    pub verbose: bool,
    /// Raster resolution.
    pub dpi: u32,
    /// Largest fraction of differing pixels a page may have and still match.
    pub pixel_tolerance: f64,
    /// Bound on each tree's compilation.
    pub compile_timeout: Duration,
    /// Diff lines kept in a text verdict.
    pub max_diff_lines: usize,
}

impl Default for VerifyOptions {
    fn default() -> Self {
        Self {
            visual: false,
            verbose: false,
            dpi: 150,
            pixel_tolerance: 0.01,
            compile_timeout: Duration::from_secs(300),
            max_diff_lines: 200,
        }
    }
}

/// Compares an original and a cleaned tree.
pub struct Verifier<C, T, R> {
    compiler: C,
    text: T,
    raster: R,
    options: VerifyOptions,
}

impl Verifier<LatexmkCompiler, PopplerText, PopplerRaster> {
    /// Verifier using latexmk and the poppler utilities from `PATH`.
    pub fn with_defaults(options: VerifyOptions) -> Self {
        Self::new(LatexmkCompiler::new(), PopplerText::default(), PopplerRaster::default(), options)
    }
}

impl<C: Compiler, T: TextExtractor, R: Rasterizer> Verifier<C, T, R> {
    /// Create a verifier from its collaborators.
    pub fn new(compiler: C, text: T, raster: R, options: VerifyOptions) -> Self {
        Self { compiler, text, raster, options }
    }

    /// Get the options.
    pub fn options(&self) -> &VerifyOptions {
        &self.options
    }

    async fn compile(&self, side: Side, dir: &Path, main_file: &str) -> Result<Vec<u8>, VerifyError> {
        let timeout = self.options.compile_timeout;
        tracing::info!(%side, dir = %dir.display(), "compiling");
        let result = match tokio::time::timeout(timeout, self.compiler.compile(dir, main_file)).await {
            Ok(result) => result,
            Err(_) => Err(CompileError {
                failure: CompileFailure::Timeout(timeout.as_secs()),
                log: String::new(),
            }),
        };
        result.map_err(|err| {
            tracing::error!(%side, failure = %err.failure, "compilation failed");
            VerifyError::CompileFailed { side, failure: err.failure, log_excerpt: err.log }
        })
    }

    /// Compile both trees and compare the PDFs.
    pub async fn verify(
        &self,
        original_dir: &Path,
        cleaned_dir: &Path,
        main_file: &str,
    ) -> Result<VerificationReport, VerifyError> {
        let (original, cleaned) = tokio::join!(
            self.compile(Side::Original, original_dir, main_file),
            self.compile(Side::Cleaned, cleaned_dir, main_file),
        );
        let original = original?;
        let cleaned = cleaned?;

        let mut report = VerificationReport::new(main_file);

        let hash = compare::compare_bytes(&original, &cleaned);
        let hash_identical = hash.verdict == Verdict::Identical;
        self.record(&mut report, hash);
        if hash_identical {
            return Ok(report);
        }

        let text = match tokio::try_join!(self.text.extract_text(&original), self.text.extract_text(&cleaned)) {
            Ok((a, b)) => compare::compare_text(&a, &b, self.options.max_diff_lines),
            Err(e) => {
                tracing::warn!(error = %e, "text extraction failed");
                MethodVerdict::inconclusive(Method::Text, format!("text extraction failed: {}", e))
            }
        };
        let text_verdict = text.verdict;
        self.record(&mut report, text);
        let run_visual = match text_verdict {
            Verdict::Identical => false,
            Verdict::Different => self.options.visual,
            Verdict::Inconclusive => true,
        };
        if !run_visual {
            return Ok(report);
        }

        let dpi = self.options.dpi;
        let visual = match tokio::try_join!(self.raster.rasterize(&original, dpi), self.raster.rasterize(&cleaned, dpi)) {
            Ok((a, b)) => compare::compare_pages(&a, &b, self.options.pixel_tolerance),
            Err(e) => {
                tracing::warn!(error = %e, "rasterization failed");
                MethodVerdict::inconclusive(Method::Visual, format!("rasterization failed: {}", e))
            }
        };
        self.record(&mut report, visual);

        Ok(report)
    }

    fn record(&self, report: &mut VerificationReport, verdict: MethodVerdict) {
        tracing::info!(method = %verdict.method, verdict = %verdict.verdict, "comparison");
        if self.options.verbose {
            if let Some(crate::types::DiffPayload::Text { lines, .. }) = &verdict.diff {
                for line in lines {
                    tracing::info!("{}", line);
                }
            }
        }
        report.push(verdict);
    }
}
