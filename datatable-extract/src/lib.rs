//! DataTable Extract - Markup Extractor
//!
//! Finds data and select directives in raw page text. The scanner is lazy
//! and reports each malformed occurrence as a page-local error; nothing
//! here knows about persistence.

mod directive;
mod scanner;
mod split;

pub use directive::{DataDirective, Extractor, PageExtraction, SelectDirective};
pub use scanner::{DirectiveKind, DirectiveScanner, RawDirective, Span};
pub use split::{clean_value, split_args, strip_comments};
