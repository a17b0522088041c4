//! Resolution policy and directive recognition.

pub mod clean;
pub mod directives;

pub use clean::CleanPolicy;
pub use directives::{Directive, DirectiveSet};
