//! CleanPolicy v1: resolution and stripping configuration.

use serde::{Deserialize, Serialize};

use crate::canonical::canonical_hash_hex;
use crate::DEFAULT_POLICY_VERSION;

/// Policy controlling how a tree is resolved and reduced.
///
/// ## Parameters
///
/// - `graphics_search_dirs`: directories tried for `\includegraphics` after the
///   including file's directory and any `\graphicspath` entries (`""` is the root)
/// - `image_extensions`: suffixes tried in order when a graphics reference has
///   no extension of its own (`""` tries the name as written)
/// - `include_style_files`: keep every class/package/style file in the tree
/// - `style_extensions`: what counts as a style file
/// - `auxiliary_files`: root-level build and readme files copied when present
/// - `verbatim_environments`: environments whose body is never comment-stripped
/// - `skip_comment_environment`: ignore directives inside `comment` environments
/// - `drop_comment_only_lines`: delete comment-only lines instead of blanking them
///
/// Policies deserialize with defaults for missing fields, so a policy file
/// only needs to name what it changes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CleanPolicy {
    /// Policy version identifier.
    pub version: String,
    /// Extra graphics search directories, relative to the root.
    pub graphics_search_dirs: Vec<String>,
    /// Graphics extensions tried in order.
    pub image_extensions: Vec<String>,
    /// Whether to keep style files found anywhere in the tree.
    pub include_style_files: bool,
    /// Extensions treated as style files.
    pub style_extensions: Vec<String>,
    /// Root-level files copied verbatim when present.
    pub auxiliary_files: Vec<String>,
    /// Environments left untouched by comment stripping.
    pub verbatim_environments: Vec<String>,
    /// Whether directives inside `\begin{comment}` blocks are ignored.
    pub skip_comment_environment: bool,
    /// Whether comment-only lines are removed rather than blanked.
    pub drop_comment_only_lines: bool,
}

fn strings(items: &[&str]) -> Vec<String> {
    items.iter().map(|s| s.to_string()).collect()
}

impl Default for CleanPolicy {
    fn default() -> Self {
        Self {
            version: DEFAULT_POLICY_VERSION.to_string(),
            graphics_search_dirs: strings(&["", "figures", "figs", "images", "img"]),
            image_extensions: strings(&[
                "", ".pdf", ".png", ".jpg", ".jpeg", ".eps", ".ps", ".tif", ".tiff",
            ]),
            include_style_files: true,
            style_extensions: strings(&[".sty", ".cls", ".bst", ".bbx", ".cbx"]),
            auxiliary_files: strings(&[
                "Makefile",
                "makefile",
                "latexmkrc",
                ".latexmkrc",
                "README",
                "README.md",
                "README.txt",
            ]),
            verbatim_environments: strings(&["verbatim", "Verbatim", "lstlisting", "minted"]),
            skip_comment_environment: true,
            drop_comment_only_lines: false,
        }
    }
}

impl CleanPolicy {
    /// Get the policy ID.
    pub fn policy_id(&self) -> &str {
        &self.version
    }

    /// Compute a hash of the policy parameters.
    ///
    /// Recorded in every reachable set so that a reduced tree can be traced
    /// back to the exact configuration that produced it.
    pub fn params_hash(&self) -> String {
        canonical_hash_hex(self)
    }

    /// Whether a file name carries one of the style extensions.
    pub fn is_style_file(&self, file_name: &str) -> bool {
        let lower = file_name.to_ascii_lowercase();
        self.style_extensions
            .iter()
            .any(|ext| !ext.is_empty() && lower.ends_with(&ext.to_ascii_lowercase()))
    }

    /// Load a policy from JSON text.
    pub fn from_json(text: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(text)
    }

    /// Policy that keeps only what directives reference: no style sweep, no
    /// auxiliary files.
    pub fn minimal() -> Self {
        Self {
            include_style_files: false,
            auxiliary_files: Vec::new(),
            ..Self::default()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_params_hash_determinism() {
        assert_eq!(CleanPolicy::default().params_hash(), CleanPolicy::default().params_hash());
    }

    #[test]
    fn test_params_hash_changes() {
        let policy1 = CleanPolicy::default();
        let mut policy2 = CleanPolicy::default();
        policy2.graphics_search_dirs.push("plots".to_string());

        assert_ne!(policy1.params_hash(), policy2.params_hash());
    }

    #[test]
    fn test_partial_json_uses_defaults() {
        let policy = CleanPolicy::from_json(r#"{"include_style_files": false}"#).unwrap();
        assert!(!policy.include_style_files);
        assert_eq!(policy.image_extensions, CleanPolicy::default().image_extensions);
        assert_eq!(policy.policy_id(), DEFAULT_POLICY_VERSION);
    }

    #[test]
    fn test_is_style_file() {
        let policy = CleanPolicy::default();
        assert!(policy.is_style_file("acmart.cls"));
        assert!(policy.is_style_file("Custom.STY"));
        assert!(!policy.is_style_file("main.tex"));
    }
}
