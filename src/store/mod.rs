//! Source tree backends.

pub mod fs;
pub mod memory;

use crate::types::ProjectPath;

/// Read-only view of the files under a project root.
///
/// Implementations must be immutable once constructed and must list files
/// in `ProjectPath` order, so that every traversal over the same tree makes
/// the same decisions.
pub trait SourceTree {
    /// Error type for read operations.
    type Error: std::error::Error + Send + Sync + 'static;

    /// Whether a regular file exists at `path`.
    fn contains(&self, path: &ProjectPath) -> bool;

    /// Read the raw bytes of a file.
    fn read(&self, path: &ProjectPath) -> Result<Vec<u8>, Self::Error>;

    /// All files, in path order.
    fn files(&self) -> Vec<ProjectPath>;

    /// Directory on disk the tree was scanned from, if any.
    fn local_root(&self) -> Option<&std::path::Path> {
        None
    }

    /// Read a file as text, see [`SourceText::decode`].
    fn read_text(&self, path: &ProjectPath) -> Result<SourceText, Self::Error> {
        Ok(SourceText::decode(self.read(path)?))
    }
}

/// How a source file was decoded.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Encoding {
    /// Valid UTF-8.
    Utf8,
    /// Anything else, mapped byte-per-char so it re-encodes losslessly.
    Latin1,
}

/// Decoded file content that can be written back byte-exactly.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceText {
    /// Decoded text.
    pub text: String,
    /// Decoding used.
    pub encoding: Encoding,
}

impl SourceText {
    /// Decode bytes as UTF-8, falling back to Latin-1.
    ///
    /// `%` and `\` are ASCII in both, so comment detection is unaffected by
    /// the fallback.
    pub fn decode(bytes: Vec<u8>) -> Self {
        match String::from_utf8(bytes) {
            Ok(text) => Self { text, encoding: Encoding::Utf8 },
            Err(err) => {
                let text = err.into_bytes().into_iter().map(char::from).collect();
                Self { text, encoding: Encoding::Latin1 }
            }
        }
    }

    /// Encode text produced from this source back to bytes.
    pub fn encode(&self, text: &str) -> Vec<u8> {
        match self.encoding {
            Encoding::Utf8 => text.as_bytes().to_vec(),
            Encoding::Latin1 => text.chars().map(|c| c as u32 as u8).collect(),
        }
    }
}

pub use fs::FsSourceTree;
pub use memory::InMemorySourceTree;
