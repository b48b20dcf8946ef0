//! DOCX tracked changes and comments for redline
//!
//! Reads the insertions, deletions, highlights and comments of a `.docx`
//! package into a [`redline_core::Document`], and writes annotated text back
//! out as a package with real revision and comment markup.
//!
//! ## Usage
//!
//! ### Reading
//!
//! ```no_run
//! use redline_core::{ReviewOptions, View};
//! use redline_docx::ReviewProcessor;
//!
//! let processor = ReviewProcessor::open("reviewed.docx", ReviewOptions::default())?;
//! println!("{}", processor.render(View::Tagged));
//! for comment in processor.comments() {
//!     println!("{}", comment.display_text());
//! }
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```
//!
//! ### Writing
//!
//! ```no_run
//! use redline_core::ReviewOptions;
//! use redline_docx::{Package, ReviewProcessor};
//!
//! let template = Package::open("template.docx")?;
//! let package = ReviewProcessor::build(
//!     &template,
//!     "The \\del{old}\\add{new} wording\\comment{clearer}",
//!     &ReviewOptions::default(),
//! )?;
//! package.write("reviewed.docx")?;
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```
//!
//! ## Implementation Notes
//!
//! - Parts are parsed with `quick-xml` into a small owned tree and written back
//!   with the same crate; untouched parts keep their original bytes
//! - Output is assembled in memory and persisted through a temporary file
//! - Tables, images and footnotes are skipped with a warning when reading

pub mod error;
pub mod package;
pub mod processor;
pub mod reader;
pub mod writer;
pub mod xml;

// Re-export main types
pub use error::{PackageError, Result};
pub use package::Package;
pub use processor::{RevisionEntry, ReviewProcessor, WriteError};
pub use reader::PackageReader;
pub use writer::PackageWriter;
pub use xml::{XmlDocument, XmlElement, XmlNode};
