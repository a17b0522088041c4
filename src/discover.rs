//! Main-file discovery.

use crate::comments::strip_line;
use crate::store::SourceTree;
use crate::types::ProjectPath;

/// Error type for main-file discovery.
#[derive(Debug, thiserror::Error)]
pub enum DiscoverError {
    /// No `.tex` file declares a document class.
    #[error("No main TeX file found (no file contains \\documentclass); pass the main file explicitly")]
    NoCandidates,
}

/// Whether uncommented text of the document declares a class.
fn declares_document_class(text: &str) -> bool {
    text.lines().any(|line| strip_line(line).contains("\\documentclass"))
}

/// Find the main document of a tree.
///
/// Candidates are `.tex` files containing `\documentclass` outside
/// comments. A single candidate wins outright; among several, `main.tex` or
/// `<root dir name>.tex` is preferred, else the first in path order.
pub fn find_main_file<S: SourceTree>(store: &S) -> Result<ProjectPath, DiscoverError> {
    let candidates: Vec<ProjectPath> = store
        .files()
        .into_iter()
        .filter(|path| path.has_extension(".tex"))
        .filter(|path| match store.read_text(path) {
            Ok(source) => declares_document_class(&source.text),
            Err(e) => {
                tracing::debug!(path = %path, error = %e, "skipping unreadable candidate");
                false
            }
        })
        .collect();

    match candidates.len() {
        0 => Err(DiscoverError::NoCandidates),
        1 => {
            tracing::info!(main = %candidates[0], "found main file");
            Ok(candidates[0].clone())
        }
        _ => {
            let dir_name = store
                .local_root()
                .and_then(|root| root.canonicalize().ok())
                .and_then(|root| root.file_name().map(|n| n.to_string_lossy().to_lowercase()));
            let preferred = candidates.iter().find(|c| {
                let name = c.file_name().to_lowercase();
                name == "main.tex" || dir_name.as_deref().is_some_and(|d| name == format!("{}.tex", d))
            });
            match preferred {
                Some(main) => {
                    tracing::info!(main = %main, candidates = candidates.len(), "selected main file");
                    Ok(main.clone())
                }
                None => {
                    let names: Vec<&str> = candidates.iter().map(|c| c.as_str()).collect();
                    tracing::warn!(candidates = ?names, main = %candidates[0], "multiple main file candidates, using the first");
                    Ok(candidates[0].clone())
                }
            }
        }
    }
}
