//! Poppler-based text and raster backends.
//!
//! Both shell out to the poppler utilities (`pdftotext`, `pdftoppm`) with
//! the PDF written to a scratch directory that is removed afterwards.

use std::path::Path;
use std::process::Output;

use async_trait::async_trait;
use tempfile::TempDir;
use tokio::process::Command;

use super::{Rasterizer, TextExtractor};

/// Error type for PDF backends.
#[derive(Debug, thiserror::Error)]
pub enum BackendError {
    /// The tool could not be started.
    #[error("Failed to run {tool}: {source}")]
    Spawn {
        /// Executable name.
        tool: String,
        /// Underlying error.
        #[source]
        source: std::io::Error,
    },
    /// The tool exited unsuccessfully.
    #[error("{tool} exited with {status}: {stderr}")]
    Failed {
        /// Executable name.
        tool: String,
        /// Exit status as reported by the OS.
        status: String,
        /// Trimmed standard error.
        stderr: String,
    },
    /// Scratch file handling failed.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
    /// A rendered page could not be decoded.
    #[error("Invalid page image {name}: {reason}")]
    InvalidImage {
        /// File name of the page.
        name: String,
        /// What was wrong.
        reason: String,
    },
}

/// 8-bit grayscale page raster.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GrayImage {
    /// Width in pixels.
    pub width: u32,
    /// Height in pixels.
    pub height: u32,
    /// Row-major pixels, `width * height` bytes.
    pub pixels: Vec<u8>,
}

impl GrayImage {
    /// Create an image, checking the buffer size.
    pub fn new(width: u32, height: u32, pixels: Vec<u8>) -> Option<Self> {
        (pixels.len() == width as usize * height as usize).then_some(Self { width, height, pixels })
    }

    /// Uniformly filled image.
    pub fn filled(width: u32, height: u32, value: u8) -> Self {
        Self { width, height, pixels: vec![value; width as usize * height as usize] }
    }

    /// Pixel at `(x, y)`.
    pub fn get(&self, x: u32, y: u32) -> u8 {
        self.pixels[y as usize * self.width as usize + x as usize]
    }

    /// Set the pixel at `(x, y)`.
    pub fn set(&mut self, x: u32, y: u32, value: u8) {
        self.pixels[y as usize * self.width as usize + x as usize] = value;
    }
}

/// Next whitespace-separated header token, skipping `#` comments.
fn next_token<'a>(bytes: &'a [u8], pos: &mut usize) -> Option<&'a [u8]> {
    loop {
        while *pos < bytes.len() && bytes[*pos].is_ascii_whitespace() {
            *pos += 1;
        }
        if *pos < bytes.len() && bytes[*pos] == b'#' {
            while *pos < bytes.len() && bytes[*pos] != b'\n' {
                *pos += 1;
            }
            continue;
        }
        break;
    }
    let start = *pos;
    while *pos < bytes.len() && !bytes[*pos].is_ascii_whitespace() {
        *pos += 1;
    }
    (start < *pos).then(|| &bytes[start..*pos])
}

/// Decode a binary PGM (`P5`) image. 16-bit samples keep their high byte.
pub fn parse_pgm(bytes: &[u8]) -> Result<GrayImage, String> {
    let mut pos = 0;
    let mut fields = [0u32; 3];

    if next_token(bytes, &mut pos) != Some(b"P5".as_slice()) {
        return Err("not a binary PGM (P5) file".to_string());
    }
    for (field, name) in fields.iter_mut().zip(["width", "height", "maxval"]) {
        *field = next_token(bytes, &mut pos)
            .and_then(|t| std::str::from_utf8(t).ok())
            .and_then(|t| t.parse().ok())
            .ok_or_else(|| format!("missing or invalid {}", name))?;
    }
    let [width, height, maxval] = fields;
    if maxval == 0 || maxval > u16::MAX as u32 {
        return Err(format!("unsupported maxval {}", maxval));
    }

    // Exactly one whitespace byte separates the header from the raster.
    pos += 1;
    let samples = width as usize * height as usize;
    let sample_bytes = if maxval < 256 { 1 } else { 2 };
    let data = bytes
        .get(pos..pos + samples * sample_bytes)
        .ok_or_else(|| "truncated raster".to_string())?;

    let pixels = if sample_bytes == 1 {
        data.to_vec()
    } else {
        data.chunks_exact(2).map(|pair| pair[0]).collect()
    };

    GrayImage::new(width, height, pixels).ok_or_else(|| "raster size mismatch".to_string())
}

async fn run(tool: &str, args: &[&str], cwd: &Path) -> Result<Output, BackendError> {
    let output = Command::new(tool)
        .args(args)
        .current_dir(cwd)
        .kill_on_drop(true)
        .output()
        .await
        .map_err(|source| BackendError::Spawn { tool: tool.to_string(), source })?;

    if !output.status.success() {
        return Err(BackendError::Failed {
            tool: tool.to_string(),
            status: output.status.to_string(),
            stderr: String::from_utf8_lossy(&output.stderr).trim().to_string(),
        });
    }
    Ok(output)
}

async fn scratch_pdf(pdf: &[u8]) -> Result<TempDir, BackendError> {
    let dir = TempDir::new()?;
    tokio::fs::write(dir.path().join("input.pdf"), pdf).await?;
    Ok(dir)
}

/// Split `pdftotext` output into pages on form feeds.
pub fn split_pages(text: &str) -> Vec<String> {
    let mut pages: Vec<String> = text.split('\u{000C}').map(str::to_string).collect();
    // pdftotext terminates every page, including the last, with a form feed.
    if pages.len() > 1 && pages.last().is_some_and(|p| p.trim().is_empty()) {
        pages.pop();
    }
    pages
}

/// Text extraction with `pdftotext -layout`.
#[derive(Debug, Clone)]
pub struct PopplerText {
    program: String,
}

impl Default for PopplerText {
    fn default() -> Self {
        Self { program: "pdftotext".to_string() }
    }
}

impl PopplerText {
    /// Use a specific `pdftotext` executable.
    pub fn with_program(program: impl Into<String>) -> Self {
        Self { program: program.into() }
    }
}

#[async_trait]
impl TextExtractor for PopplerText {
    type Error = BackendError;

    async fn extract_text(&self, pdf: &[u8]) -> Result<Vec<String>, Self::Error> {
        let dir = scratch_pdf(pdf).await?;
        let output = run(&self.program, &["-layout", "-enc", "UTF-8", "input.pdf", "-"], dir.path()).await?;
        Ok(split_pages(&String::from_utf8_lossy(&output.stdout)))
    }
}

/// Grayscale rasterization with `pdftoppm -gray`.
#[derive(Debug, Clone)]
pub struct PopplerRaster {
    program: String,
}

impl Default for PopplerRaster {
    fn default() -> Self {
        Self { program: "pdftoppm".to_string() }
    }
}

impl PopplerRaster {
    /// Use a specific `pdftoppm` executable.
    pub fn with_program(program: impl Into<String>) -> Self {
        Self { program: program.into() }
    }
}

#[async_trait]
impl Rasterizer for PopplerRaster {
    type Error = BackendError;

    async fn rasterize(&self, pdf: &[u8], dpi: u32) -> Result<Vec<GrayImage>, Self::Error> {
        let dir = scratch_pdf(pdf).await?;
        let dpi = dpi.to_string();
        run(&self.program, &["-gray", "-r", dpi.as_str(), "input.pdf", "page"], dir.path()).await?;

        // Page numbers are zero-padded to a common width, so name order is page order.
        let mut names = Vec::new();
        let mut entries = tokio::fs::read_dir(dir.path()).await?;
        while let Some(entry) = entries.next_entry().await? {
            let name = entry.file_name().to_string_lossy().into_owned();
            if name.starts_with("page") && name.ends_with(".pgm") {
                names.push(name);
            }
        }
        names.sort();

        let mut pages = Vec::with_capacity(names.len());
        for name in names {
            let bytes = tokio::fs::read(dir.path().join(&name)).await?;
            let image = parse_pgm(&bytes).map_err(|reason| BackendError::InvalidImage { name, reason })?;
            pages.push(image);
        }
        Ok(pages)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_pgm_8bit() {
        let mut bytes = b"P5\n# made by test\n3 2\n255\n".to_vec();
        bytes.extend_from_slice(&[0, 10, 20, 30, 40, 255]);

        let image = parse_pgm(&bytes).unwrap();
        assert_eq!((image.width, image.height), (3, 2));
        assert_eq!(image.get(2, 1), 255);
        assert_eq!(image.get(0, 1), 30);
    }

    #[test]
    fn test_parse_pgm_16bit_keeps_high_byte() {
        let mut bytes = b"P5 1 2 65535\n".to_vec();
        bytes.extend_from_slice(&[0x12, 0x34, 0xFF, 0x00]);
        let image = parse_pgm(&bytes).unwrap();
        assert_eq!(image.pixels, vec![0x12, 0xFF]);
    }

    #[test]
    fn test_parse_pgm_rejects_bad_input() {
        assert!(parse_pgm(b"P2\n1 1\n255\n0").is_err());
        assert!(parse_pgm(b"P5\n4 4\n255\n\x00\x00").is_err());
        assert!(parse_pgm(b"P5\n4\n").is_err());
    }

    #[test]
    fn test_split_pages() {
        assert_eq!(split_pages("one\n\u{000C}two\n\u{000C}"), vec!["one\n", "two\n"]);
        assert_eq!(split_pages(""), vec![""]);
    }

    #[test]
    fn test_gray_image_buffer_size_checked() {
        assert!(GrayImage::new(2, 2, vec![0; 3]).is_none());
        let mut image = GrayImage::filled(2, 2, 255);
        image.set(1, 0, 0);
        assert_eq!(image.get(1, 0), 0);
    }
}
