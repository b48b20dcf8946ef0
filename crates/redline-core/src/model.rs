//! Structural model of a reviewed document
//!
//! A [`Document`] is an ordered list of [`Paragraph`]s, each an ordered list of
//! [`Run`]s with a uniform revision state, plus the [`CommentAnchor`]s that point
//! into them. Documents are built once by a package reader and never mutated.

use crate::error::LoadError;
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::collections::BTreeMap;
use std::ops::Range;

/// Revision state of a run, without metadata
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum RevisionKind {
    None,
    Inserted,
    Deleted,
}

/// Metadata attached to a tracked insertion or deletion
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Serialize)]
pub struct RevisionInfo {
    pub id: Option<u32>,
    pub author: Option<String>,
    pub date: Option<DateTime<Utc>>,
}

impl RevisionInfo {
    #[inline]
    #[must_use = "creates revision metadata"]
    pub fn new(id: u32, author: impl Into<String>, date: DateTime<Utc>) -> Self {
        Self {
            id: Some(id),
            author: Some(author.into()),
            date: Some(date),
        }
    }
}

/// Revision state of a run
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Serialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum Revision {
    #[default]
    None,
    Inserted(RevisionInfo),
    Deleted(RevisionInfo),
}

impl Revision {
    #[inline]
    #[must_use = "returns the revision kind"]
    pub const fn kind(&self) -> RevisionKind {
        match self {
            Self::None => RevisionKind::None,
            Self::Inserted(_) => RevisionKind::Inserted,
            Self::Deleted(_) => RevisionKind::Deleted,
        }
    }

    #[inline]
    #[must_use = "returns the revision metadata"]
    pub const fn info(&self) -> Option<&RevisionInfo> {
        match self {
            Self::None => None,
            Self::Inserted(info) | Self::Deleted(info) => Some(info),
        }
    }
}

/// A stretch of text with one revision state
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Serialize)]
pub struct Run {
    pub text: String,
    pub revision: Revision,
    pub highlight: bool,
}

impl Run {
    #[inline]
    #[must_use = "creates a plain run"]
    pub fn plain(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            revision: Revision::None,
            highlight: false,
        }
    }

    #[inline]
    #[must_use = "creates an inserted run"]
    pub fn inserted(text: impl Into<String>, info: RevisionInfo) -> Self {
        Self {
            text: text.into(),
            revision: Revision::Inserted(info),
            highlight: false,
        }
    }

    #[inline]
    #[must_use = "creates a deleted run"]
    pub fn deleted(text: impl Into<String>, info: RevisionInfo) -> Self {
        Self {
            text: text.into(),
            revision: Revision::Deleted(info),
            highlight: false,
        }
    }

    #[inline]
    #[must_use = "returns the run with the highlight flag set"]
    pub fn highlighted(mut self) -> Self {
        self.highlight = true;
        self
    }

    #[inline]
    #[must_use = "returns the revision kind"]
    pub const fn kind(&self) -> RevisionKind {
        self.revision.kind()
    }
}

/// A paragraph and its runs
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Serialize)]
pub struct Paragraph {
    /// Position of the paragraph within its document
    pub index: usize,
    pub runs: Vec<Run>,
}

impl Paragraph {
    #[inline]
    #[must_use = "creates a paragraph"]
    pub const fn new(index: usize, runs: Vec<Run>) -> Self {
        Self { index, runs }
    }

    /// Concatenated text of runs whose kind passes `keep`
    #[must_use = "returns the filtered paragraph text"]
    pub fn text_where(&self, keep: impl Fn(RevisionKind) -> bool) -> String {
        self.runs
            .iter()
            .filter(|run| keep(run.kind()))
            .map(|run| run.text.as_str())
            .collect()
    }

    /// Revision spans covering every run of the paragraph, plain runs included
    ///
    /// With `merge` set, consecutive runs sharing kind, id and author fold into
    /// one span; otherwise there is one span per run.
    #[must_use = "returns the paragraph's spans"]
    pub fn spans(&self, merge: bool) -> Vec<RevisionSpan> {
        let spans: Vec<RevisionSpan> = self
            .runs
            .iter()
            .enumerate()
            .map(|(i, run)| RevisionSpan::from_run(self.index, i, run))
            .collect();
        if merge {
            merge_spans(&spans)
        } else {
            spans
        }
    }
}

/// A maximal run sequence sharing one revision kind, author and id
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
pub struct RevisionSpan {
    pub paragraph: usize,
    /// Run indices within the paragraph
    pub runs: Range<usize>,
    pub kind: RevisionKind,
    pub id: Option<u32>,
    pub author: Option<String>,
    pub date: Option<DateTime<Utc>>,
}

impl RevisionSpan {
    fn from_run(paragraph: usize, index: usize, run: &Run) -> Self {
        let info = run.revision.info();
        Self {
            paragraph,
            runs: index..index + 1,
            kind: run.kind(),
            id: info.and_then(|i| i.id),
            author: info.and_then(|i| i.author.clone()),
            date: info.and_then(|i| i.date),
        }
    }

    fn continues(&self, next: &Self) -> bool {
        self.paragraph == next.paragraph
            && self.runs.end == next.runs.start
            && self.kind == next.kind
            && self.id == next.id
            && self.author == next.author
    }

    /// Concatenated text of the span's runs
    #[must_use = "returns the span text"]
    pub fn text(&self, paragraph: &Paragraph) -> String {
        paragraph.runs[self.runs.clone()]
            .iter()
            .map(|run| run.text.as_str())
            .collect()
    }
}

/// Fold adjacent spans with the same kind, id and author
///
/// Idempotent: merging already merged spans returns them unchanged.
#[must_use = "returns the merged spans"]
pub fn merge_spans(spans: &[RevisionSpan]) -> Vec<RevisionSpan> {
    let mut merged: Vec<RevisionSpan> = Vec::with_capacity(spans.len());
    for span in spans {
        match merged.last_mut() {
            Some(last) if last.continues(span) => {
                last.runs.end = span.runs.end;
                if last.date.is_none() {
                    last.date = span.date;
                }
            }
            _ => merged.push(span.clone()),
        }
    }
    merged
}

/// A boundary between runs: `run` runs of `paragraph` lie before it
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub struct RunCursor {
    pub paragraph: usize,
    pub run: usize,
}

impl RunCursor {
    #[inline]
    #[must_use = "creates a cursor"]
    pub const fn new(paragraph: usize, run: usize) -> Self {
        Self { paragraph, run }
    }
}

/// A comment and the run range it is attached to
///
/// The range is half-open between two cursors; `start == end` marks a comment
/// on an insertion point.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
pub struct CommentAnchor {
    pub id: u32,
    pub author: Option<String>,
    pub initials: Option<String>,
    pub date: Option<DateTime<Utc>>,
    pub body: String,
    pub start: RunCursor,
    pub end: RunCursor,
}

impl CommentAnchor {
    #[inline]
    #[must_use = "returns whether the anchor covers no runs"]
    pub fn is_empty(&self) -> bool {
        self.start == self.end
    }

    /// "author: body", or just the body when the author is unknown
    #[must_use = "returns the formatted comment"]
    pub fn display_text(&self) -> String {
        match &self.author {
            Some(author) => format!("{author}: {}", self.body),
            None => self.body.clone(),
        }
    }
}

/// Root of the model: paragraphs, comments by id, and the merge policy
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct Document {
    paragraphs: Vec<Paragraph>,
    comments: BTreeMap<u32, CommentAnchor>,
    merge_revisions: bool,
    #[serde(skip)]
    warnings: Vec<LoadError>,
}

impl Document {
    #[must_use = "creates a document"]
    pub fn new(
        paragraphs: Vec<Paragraph>,
        comments: BTreeMap<u32, CommentAnchor>,
        merge_revisions: bool,
        warnings: Vec<LoadError>,
    ) -> Self {
        Self {
            paragraphs,
            comments,
            merge_revisions,
            warnings,
        }
    }

    #[inline]
    #[must_use = "returns the paragraphs"]
    pub fn paragraphs(&self) -> &[Paragraph] {
        &self.paragraphs
    }

    /// Comments in id order
    #[inline]
    pub fn comments(&self) -> impl Iterator<Item = &CommentAnchor> {
        self.comments.values()
    }

    #[inline]
    #[must_use = "returns the comment with this id"]
    pub fn comment(&self, id: u32) -> Option<&CommentAnchor> {
        self.comments.get(&id)
    }

    #[inline]
    #[must_use = "returns the merge policy"]
    pub const fn merge_revisions(&self) -> bool {
        self.merge_revisions
    }

    /// Irregularities recovered from while loading
    #[inline]
    #[must_use = "returns the load warnings"]
    pub fn warnings(&self) -> &[LoadError] {
        &self.warnings
    }

    #[inline]
    #[must_use = "returns whether the document has any text"]
    pub fn is_empty(&self) -> bool {
        self.paragraphs.iter().all(|p| p.runs.is_empty())
    }

    /// Spans of one paragraph under the document's merge policy
    #[inline]
    #[must_use = "returns the paragraph's spans"]
    pub fn spans(&self, paragraph: &Paragraph) -> Vec<RevisionSpan> {
        paragraph.spans(self.merge_revisions)
    }

    /// Every inserted or deleted span in document order
    pub fn revisions(&self) -> impl Iterator<Item = RevisionSpan> + '_ {
        self.paragraphs.iter().flat_map(move |p| {
            self.spans(p)
                .into_iter()
                .filter(|s| s.kind != RevisionKind::None)
        })
    }

    /// True when any run carries an insertion or deletion
    #[must_use = "returns whether the document has revisions"]
    pub fn has_revisions(&self) -> bool {
        self.paragraphs
            .iter()
            .flat_map(|p| &p.runs)
            .any(|r| r.kind() != RevisionKind::None)
    }
}
