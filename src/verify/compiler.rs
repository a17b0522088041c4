//! LaTeX compilation with latexmk, falling back to pdflatex + bibtex.

use std::path::{Path, PathBuf};
use std::process::Output;

use async_trait::async_trait;
use tokio::process::Command;

use super::{CompileError, CompileFailure, Compiler};

/// Lines kept in a compile log excerpt.
pub const LOG_EXCERPT_LINES: usize = 40;

/// Pick the informative part of a TeX log: from the first `!` error line
/// when there is one, else the tail.
pub fn log_excerpt(log: &str, max_lines: usize) -> String {
    let lines: Vec<&str> = log.lines().collect();
    let start = match lines.iter().position(|l| l.starts_with('!')) {
        Some(idx) => idx,
        None => lines.len().saturating_sub(max_lines),
    };
    lines[start..].iter().take(max_lines).copied().collect::<Vec<_>>().join("\n")
}

/// Compiles with `latexmk -pdf`; when that fails, runs `pdflatex`, then
/// `bibtex` if the document has a bibliography, then `pdflatex` twice.
///
/// Compilation happens in the main file's directory. A PDF left there by an
/// earlier build is removed first, and the result only counts when the last
/// step exits successfully. Child processes are killed when the future is
/// dropped, so a timeout around [`Compiler::compile`] does not leave them
/// running.
#[derive(Debug, Clone)]
pub struct LatexmkCompiler {
    latexmk: String,
    pdflatex: String,
    bibtex: String,
    shell_escape: bool,
}

impl Default for LatexmkCompiler {
    fn default() -> Self {
        Self {
            latexmk: "latexmk".to_string(),
            pdflatex: "pdflatex".to_string(),
            bibtex: "bibtex".to_string(),
            shell_escape: false,
        }
    }
}

impl LatexmkCompiler {
    /// Create a compiler using the tools on `PATH`.
    pub fn new() -> Self {
        Self::default()
    }

    /// Pass `-shell-escape` (needed by e.g. `minted`).
    pub fn with_shell_escape(mut self, enabled: bool) -> Self {
        self.shell_escape = enabled;
        self
    }

    async fn run(&self, program: &str, args: &[&str], cwd: &Path) -> Result<Output, CompileError> {
        tracing::debug!(program, ?args, cwd = %cwd.display(), "running");
        Command::new(program)
            .args(args)
            .current_dir(cwd)
            .stdin(std::process::Stdio::null())
            .kill_on_drop(true)
            .output()
            .await
            .map_err(|e| CompileError {
                failure: CompileFailure::Spawn(format!("{}: {}", program, e)),
                log: String::new(),
            })
    }

    fn tex_args<'a>(&self, file_name: &'a str) -> Vec<&'a str> {
        let mut args = vec!["-interaction=nonstopmode"];
        if self.shell_escape {
            args.push("-shell-escape");
        }
        args.push(file_name);
        args
    }

    async fn fallback(&self, cwd: &Path, file_name: &str, stem: &str) -> Result<Output, CompileError> {
        let args = self.tex_args(file_name);
        let first = self.run(&self.pdflatex, &args, cwd).await?;

        let aux = tokio::fs::read_to_string(cwd.join(format!("{}.aux", stem))).await.unwrap_or_default();
        if !aux.contains("\\bibdata") {
            return Ok(first);
        }

        tracing::debug!(stem, "running bibtex");
        let bib = self.run(&self.bibtex, &[stem], cwd).await?;
        if !bib.status.success() {
            tracing::warn!(status = %bib.status, "bibtex failed, continuing");
        }
        self.run(&self.pdflatex, &args, cwd).await?;
        self.run(&self.pdflatex, &args, cwd).await
    }
}

fn combined_output(output: &Output) -> String {
    let mut text = String::from_utf8_lossy(&output.stdout).into_owned();
    text.push_str(&String::from_utf8_lossy(&output.stderr));
    text
}

#[async_trait]
impl Compiler for LatexmkCompiler {
    async fn compile(&self, dir: &Path, main_file: &str) -> Result<Vec<u8>, CompileError> {
        let main = dir.join(main_file);
        let cwd: PathBuf = main.parent().map(Path::to_path_buf).unwrap_or_else(|| dir.to_path_buf());
        let file_name = main
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| main_file.to_string());
        let stem = Path::new(&file_name)
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_else(|| file_name.clone());
        let pdf = cwd.join(format!("{}.pdf", stem));

        match tokio::fs::remove_file(&pdf).await {
            Ok(()) => tracing::debug!(pdf = %pdf.display(), "removed PDF from an earlier build"),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
            Err(e) => {
                return Err(CompileError { failure: CompileFailure::StalePdf(pdf), log: e.to_string() });
            }
        }

        let mut args = vec!["-pdf", "-halt-on-error"];
        args.extend(self.tex_args(&file_name));
        let output = match self.run(&self.latexmk, &args, &cwd).await {
            Ok(output) if output.status.success() => output,
            Ok(output) => {
                tracing::warn!(dir = %dir.display(), status = %output.status, "latexmk failed, trying pdflatex");
                self.fallback(&cwd, &file_name, &stem).await?
            }
            Err(err) => {
                tracing::warn!(dir = %dir.display(), error = %err.failure, "latexmk unavailable, trying pdflatex");
                self.fallback(&cwd, &file_name, &stem).await?
            }
        };

        if !output.status.success() {
            return Err(CompileError {
                failure: CompileFailure::ExitStatus(output.status.code()),
                log: log_excerpt(&combined_output(&output), LOG_EXCERPT_LINES),
            });
        }

        match tokio::fs::read(&pdf).await {
            Ok(bytes) => {
                tracing::info!(pdf = %pdf.display(), bytes = bytes.len(), "compiled");
                Ok(bytes)
            }
            Err(_) => Err(CompileError {
                failure: CompileFailure::MissingPdf(pdf),
                log: log_excerpt(&combined_output(&output), LOG_EXCERPT_LINES),
            }),
        }
    }
}
