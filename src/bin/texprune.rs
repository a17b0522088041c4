//! texprune binary
//!
//! Reduces a LaTeX project to what its main document needs, and checks that
//! the reduced project still produces the same PDF.
//!
//! ## Commands
//!
//! - `clean`: resolve dependencies from the main file and write the reduced tree
//! - `compare`: compile both trees and compare the PDFs
//!
//! ## Configuration
//!
//! Environment variables:
//! - `RUST_LOG`: Log level filter (default: texprune=info)
//! - `LOG_FORMAT`: "json" for structured logs, "pretty" for terminals (default: pretty)
//! - `TEXPRUNE_COMPILE_TIMEOUT`: per-tree compile timeout in seconds (default: 300)
//!
//! ## Exit codes
//!
//! `0` success (for `compare`: the decisive verdict is Identical), `1` error
//! or Different, `2` Inconclusive.
//!
//! ## Usage
//!
//! ```bash
//! texprune clean paper/ -o paper-clean/
//! texprune compare paper/ paper-clean/ --visual
//! ```

use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::sync::Arc;
use std::time::Duration;

use clap::{Parser, Subcommand};
use tracing::{error, info, warn};
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use texprune::verify::{LatexmkCompiler, PopplerRaster, PopplerText};
use texprune::{
    find_main_file, CleanPolicy, DependencyResolver, FsSourceTree, ReduceOptions, TreeReducer,
    Verdict, Verifier, VerifyError, VerifyOptions,
};

/// texprune - minimal LaTeX source trees for submission
#[derive(Parser)]
#[command(name = "texprune")]
#[command(version)]
#[command(about = "Reduce a LaTeX project to the files it needs, and verify the result")]
#[command(propagate_version = true)]
struct Cli {
    /// Log every resolved reference and diff line
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Print the report as JSON on stdout
    #[arg(long, global = true)]
    json: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Write a reduced, comment-free copy of a project
    Clean {
        /// Source project directory
        source: PathBuf,

        /// Output directory
        #[arg(short, long, default_value = "./cleaned_project")]
        output: PathBuf,

        /// Main TeX file, relative to the source directory (detected when omitted)
        #[arg(short, long)]
        main: Option<String>,

        /// JSON file with clean policy overrides
        #[arg(long)]
        policy: Option<PathBuf>,

        /// Replace the contents of a non-empty output directory
        #[arg(long)]
        overwrite: bool,
    },
    /// Compile two projects and compare the resulting PDFs
    Compare {
        /// Original project directory
        original: PathBuf,

        /// Cleaned project directory
        cleaned: PathBuf,

        /// Main TeX file, relative to both directories (detected when omitted)
        #[arg(short, long)]
        main: Option<String>,

        /// Also compare rendered pages
        #[arg(long)]
        visual: bool,

        /// Raster resolution for the visual comparison
        #[arg(long, default_value_t = 150)]
        dpi: u32,

        /// Fraction of differing pixels tolerated per page
        #[arg(long, default_value_t = 0.01)]
        tolerance: f64,

        /// Compile timeout per tree, in seconds
        #[arg(long, env = "TEXPRUNE_COMPILE_TIMEOUT", default_value_t = 300)]
        timeout: u64,

        /// Pass -shell-escape to the TeX engine
        #[arg(long)]
        shell_escape: bool,
    },
}

/// Initialize the tracing subscriber with JSON or pretty format
fn init_tracing(verbose: bool) {
    let log_format = std::env::var("LOG_FORMAT").unwrap_or_else(|_| "pretty".to_string());

    let default_filter = if verbose { "texprune=debug" } else { "texprune=info" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| default_filter.into());

    if log_format == "json" {
        tracing_subscriber::registry()
            .with(filter)
            .with(
                fmt::layer()
                    .json()
                    .with_target(true)
                    .flatten_event(true)
                    .with_writer(std::io::stderr),
            )
            .init();
    } else {
        tracing_subscriber::registry()
            .with(filter)
            .with(fmt::layer().with_target(false).with_writer(std::io::stderr))
            .init();
    }
}

fn load_policy(path: Option<&Path>) -> Result<CleanPolicy, String> {
    match path {
        None => Ok(CleanPolicy::default()),
        Some(path) => {
            let text = std::fs::read_to_string(path)
                .map_err(|e| format!("failed to read policy {}: {}", path.display(), e))?;
            CleanPolicy::from_json(&text).map_err(|e| format!("invalid policy {}: {}", path.display(), e))
        }
    }
}

fn locate_main(tree: &FsSourceTree, main: Option<String>) -> Result<String, String> {
    match main {
        Some(main) => Ok(main),
        None => find_main_file(tree).map(|p| p.to_string()).map_err(|e| e.to_string()),
    }
}

fn print_json<T: serde::Serialize>(value: &T) -> Result<(), String> {
    let text = serde_json::to_string_pretty(value).map_err(|e| e.to_string())?;
    println!("{}", text);
    Ok(())
}

fn run_clean(
    source: PathBuf,
    output: PathBuf,
    main: Option<String>,
    policy: Option<PathBuf>,
    overwrite: bool,
    json: bool,
) -> Result<(), String> {
    let policy = load_policy(policy.as_deref())?;
    let tree = FsSourceTree::scan_excluding(&source, &[output.clone()]).map_err(|e| e.to_string())?;
    let tree = Arc::new(tree);
    let main = locate_main(&tree, main)?;

    let resolution = DependencyResolver::new(Arc::clone(&tree), policy.clone())
        .resolve(&main)
        .map_err(|e| e.to_string())?;
    info!("dependency tree:\n{}", resolution.graph.render_tree());

    let report = TreeReducer::new(tree, policy)
        .reduce(&output, &resolution.reachable, &resolution.warnings, ReduceOptions { overwrite })
        .map_err(|e| e.to_string())?;

    if json {
        return print_json(&report);
    }
    println!(
        "Copied {} files ({} bytes) to {}",
        report.files_copied(),
        report.bytes_written,
        output.display()
    );
    if !report.is_clean() {
        println!("{} unresolved reference(s):", report.warnings.len());
        for warning in &report.warnings {
            println!("  {}", warning);
        }
    }
    Ok(())
}

async fn run_compare(
    original: PathBuf,
    cleaned: PathBuf,
    main: Option<String>,
    options: VerifyOptions,
    shell_escape: bool,
    json: bool,
) -> Result<Verdict, String> {
    let main = match main {
        Some(main) => main,
        None => {
            let tree = FsSourceTree::scan(&original).map_err(|e| e.to_string())?;
            locate_main(&tree, None)?
        }
    };

    let verifier = Verifier::new(
        LatexmkCompiler::new().with_shell_escape(shell_escape),
        PopplerText::default(),
        PopplerRaster::default(),
        options,
    );

    let report = match verifier.verify(&original, &cleaned, &main).await {
        Ok(report) => report,
        Err(err) => {
            let VerifyError::CompileFailed { log_excerpt, .. } = &err;
            if !log_excerpt.is_empty() {
                eprintln!("{}", log_excerpt);
            }
            return Err(err.to_string());
        }
    };

    if json {
        print_json(&report)?;
    } else {
        println!("{}", report.summary());
        if report.is_disputed() {
            println!("Methods disagree; see individual verdicts above.");
        }
    }
    Ok(report.decisive())
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    match cli.command {
        Commands::Clean { source, output, main, policy, overwrite } => {
            match run_clean(source, output, main, policy, overwrite, cli.json) {
                Ok(()) => ExitCode::SUCCESS,
                Err(message) => {
                    error!("{}", message);
                    ExitCode::from(1)
                }
            }
        }
        Commands::Compare { original, cleaned, main, visual, dpi, tolerance, timeout, shell_escape } => {
            let options = VerifyOptions {
                visual,
                verbose: cli.verbose,
                dpi,
                pixel_tolerance: tolerance,
                compile_timeout: Duration::from_secs(timeout),
                ..VerifyOptions::default()
            };
            match run_compare(original, cleaned, main, options, shell_escape, cli.json).await {
                Ok(Verdict::Identical) => ExitCode::SUCCESS,
                Ok(Verdict::Different) => ExitCode::from(1),
                Ok(Verdict::Inconclusive) => {
                    warn!("no comparison method could decide");
                    ExitCode::from(2)
                }
                Err(message) => {
                    error!("{}", message);
                    ExitCode::from(1)
                }
            }
        }
    }
}
