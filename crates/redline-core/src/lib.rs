//! Review model and inline review markup
//!
//! This crate holds everything about tracked changes and comments that does not
//! depend on the word-processing package format:
//!
//! - [`model`]: paragraphs of runs carrying revision and highlight state, plus
//!   comments anchored to run boundaries
//! - [`render`]: the tagged transcript and the other textual views
//! - [`scanner`] and [`parser`]: annotated text back to stripped text and tags
//! - [`config`]: delimiter sets and review options
//!
//! ## Example
//!
//! ```
//! use redline_core::{parse_markup, TagConfig, TagKind};
//!
//! let parsed = parse_markup("say \\repl{hello}{goodbye}", &TagConfig::default()).unwrap();
//! assert_eq!(parsed.stripped_text, "say goodbye");
//! assert_eq!(parsed.tags[0].kind(), TagKind::Replaced);
//! assert_eq!(parsed.tags[0].old_text(), Some("hello"));
//! ```

pub mod config;
pub mod error;
pub mod model;
pub mod parser;
pub mod render;
pub mod scanner;
pub mod tags;

pub use config::{
    ConfigError, Delimiters, ReplacedDelimiters, ReviewOptions, TagConfig, DEFAULT_AUTHOR,
    DEFAULT_HIGHLIGHT_COLOR,
};
pub use error::{AnchorSide, BuildError, LoadError, MarkupError, ParseError};
pub use model::{
    merge_spans, CommentAnchor, Document, Paragraph, Revision, RevisionInfo, RevisionKind,
    RevisionSpan, Run, RunCursor,
};
pub use parser::{parse_markup, MarkupParser, ParsedMarkup};
pub use render::{View, ViewRenderer};
pub use scanner::{MarkupScanner, ScanOutput, Token};
pub use tags::{Tag, TagKind, TagPayload};
