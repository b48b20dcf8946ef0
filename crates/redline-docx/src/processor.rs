//! One loaded document plus the options it was read with

use crate::package::Package;
use crate::reader::PackageReader;
use crate::writer::PackageWriter;
use redline_core::{
    parse_markup, BuildError, CommentAnchor, Document, LoadError, MarkupError, ReviewOptions,
    RevisionKind, RevisionSpan, View, ViewRenderer,
};
use serde::Serialize;
use std::borrow::Cow;
use std::path::Path;
use thiserror::Error;

/// A revision span together with its text
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RevisionEntry {
    #[serde(flatten)]
    pub span: RevisionSpan,
    pub text: String,
}

/// Failure turning annotated text into a package
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum WriteError {
    #[error(transparent)]
    Markup(#[from] MarkupError),
    #[error(transparent)]
    Build(#[from] BuildError),
}

/// Owns one [`Document`] and renders it with fixed options
#[derive(Debug, Clone)]
pub struct ReviewProcessor {
    document: Document,
    options: ReviewOptions,
}

impl ReviewProcessor {
    /// Read the package at `path`
    ///
    /// # Errors
    ///
    /// Returns `LoadError::MalformedPackage` if the file cannot be opened as a
    /// package or its body cannot be read.
    pub fn open<P: AsRef<Path>>(path: P, options: ReviewOptions) -> Result<Self, LoadError> {
        let package = Package::open(path)?;
        Self::from_package(&package, options)
    }

    /// Read an already opened package
    ///
    /// # Errors
    ///
    /// Returns `LoadError::MalformedPackage` if the body cannot be read.
    pub fn from_package(package: &Package, options: ReviewOptions) -> Result<Self, LoadError> {
        let document = PackageReader::new(options.merge_revisions).load(package)?;
        Ok(Self { document, options })
    }

    #[inline]
    #[must_use = "returns the document"]
    pub const fn document(&self) -> &Document {
        &self.document
    }

    #[inline]
    #[must_use = "returns the options"]
    pub const fn options(&self) -> &ReviewOptions {
        &self.options
    }

    /// Final-draft text of each paragraph
    #[must_use = "returns the paragraph texts"]
    pub fn paragraphs(&self) -> Vec<String> {
        self.document
            .paragraphs()
            .iter()
            .map(|p| p.text_where(|k| k != RevisionKind::Deleted))
            .collect()
    }

    /// Every insertion and deletion span, in document order
    #[must_use = "returns the revisions"]
    pub fn revisions(&self) -> Vec<RevisionEntry> {
        let paragraphs = self.document.paragraphs();
        self.document
            .revisions()
            .map(|span| {
                let text = paragraphs
                    .get(span.paragraph)
                    .map(|p| span.text(p))
                    .unwrap_or_default();
                RevisionEntry { span, text }
            })
            .collect()
    }

    /// Comments in id order
    pub fn comments(&self) -> impl Iterator<Item = &CommentAnchor> {
        self.document.comments()
    }

    /// Irregularities skipped while reading
    #[inline]
    #[must_use = "returns the load warnings"]
    pub fn warnings(&self) -> &[LoadError] {
        self.document.warnings()
    }

    /// Render one view with the processor's tag configuration
    #[must_use = "returns the rendered view"]
    pub fn render(&self, view: View) -> String {
        ViewRenderer::new(&self.document, &self.options.tags)
            .render(view, self.options.include_comments)
    }

    /// Parse annotated text and build a package from `template`
    ///
    /// # Errors
    ///
    /// Returns `WriteError::Markup` for an invalid delimiter configuration or
    /// malformed markup, and `WriteError::Build` if the template cannot be
    /// extended.
    pub fn build(
        template: &Package,
        annotated: &str,
        options: &ReviewOptions,
    ) -> Result<Package, WriteError> {
        // Windows line endings are paragraph breaks like bare newlines
        let annotated = if annotated.contains("\r\n") {
            Cow::Owned(annotated.replace("\r\n", "\n"))
        } else {
            Cow::Borrowed(annotated)
        };
        let parsed = parse_markup(&annotated, &options.tags)?;
        log::debug!(
            "parsed {} tags over {} bytes of text",
            parsed.tags.len(),
            parsed.stripped_text.len()
        );
        let package = PackageWriter::from_options(options).build(
            template,
            &parsed.stripped_text,
            &parsed.tags,
        )?;
        Ok(package)
    }
}
