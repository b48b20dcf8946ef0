//! Textual views of a reviewed document
//!
//! Every view is a pure function of a [`Document`] and a [`TagConfig`]. Paragraphs
//! are separated by a single newline; an empty document renders as an empty
//! string in every view.

use crate::config::{Delimiters, TagConfig};
use crate::model::{CommentAnchor, Document, Paragraph, RevisionKind, RevisionSpan, RunCursor};
use std::cmp::Reverse;
use std::collections::{BTreeMap, HashSet};
use std::fmt;
use std::ops::Range;
use std::str::FromStr;

/// The six views a document can be rendered to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum View {
    /// Every run, revisions wrapped in tags, comments inline
    Tagged,
    /// Inserted text only
    Added,
    /// Deleted text only
    Deleted,
    /// "author: body" per comment
    Comments,
    /// Insertions accepted, deletions rejected
    Final,
    /// Insertions rejected, deletions restored
    Original,
}

impl View {
    /// All views, in the order the CLI prints them
    pub const ALL: [Self; 6] = [
        Self::Tagged,
        Self::Added,
        Self::Deleted,
        Self::Comments,
        Self::Final,
        Self::Original,
    ];

    #[inline]
    #[must_use = "returns the view name"]
    pub const fn name(&self) -> &'static str {
        match self {
            Self::Tagged => "tagged",
            Self::Added => "added",
            Self::Deleted => "deleted",
            Self::Comments => "comments",
            Self::Final => "final",
            Self::Original => "original",
        }
    }
}

impl fmt::Display for View {
    #[inline]
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.name())
    }
}

impl FromStr for View {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "tagged" | "transcript" => Ok(Self::Tagged),
            "added" | "additions" => Ok(Self::Added),
            "deleted" | "deletions" => Ok(Self::Deleted),
            "comments" => Ok(Self::Comments),
            "final" => Ok(Self::Final),
            "original" => Ok(Self::Original),
            _ => Err(format!(
                "unknown view: '{s}' (expected: tagged, added, deleted, comments, final, original)"
            )),
        }
    }
}

/// How a stretch of runs is wrapped in the tagged transcript
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum UnitKind {
    Plain,
    Inserted,
    Deleted,
    /// A deletion immediately followed by the insertion that replaces it
    Substitution { split: usize },
}

#[derive(Debug, Clone, PartialEq, Eq)]
struct Unit {
    runs: Range<usize>,
    kind: UnitKind,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum WrapperKind {
    Inserted,
    Deleted,
    /// Written in one piece; nothing opens or closes inside it
    Substitution { split: usize },
    Highlight,
}

/// A delimiter pair around a stretch of runs of one paragraph
#[derive(Debug, Clone, PartialEq, Eq)]
struct Wrapper {
    runs: Range<usize>,
    kind: WrapperKind,
}

/// Nesting depth of an anchor bracket over the same runs as a wrapper
const ANCHOR_DEPTH: u8 = 2;

impl Wrapper {
    /// Pairs over the same runs nest by depth, lowest outermost
    const fn depth(&self) -> u8 {
        match self.kind {
            WrapperKind::Highlight => 1,
            _ => 0,
        }
    }

    /// Whether a bracket over `range` sits beside, around or inside this pair
    fn nests_with(&self, range: &Range<usize>) -> bool {
        let (start, end) = (self.runs.start, self.runs.end);
        let beside = range.end <= start || end <= range.start;
        let around = range.start <= start && end <= range.end;
        let inside = start <= range.start
            && range.end <= end
            && !matches!(self.kind, WrapperKind::Substitution { .. });
        beside || around || inside
    }

    /// Whether the boundary before `run` falls strictly inside this pair
    const fn splits(&self, run: usize) -> bool {
        self.runs.start < run && run < self.runs.end
    }
}

const fn delimiters(tags: &TagConfig, kind: WrapperKind) -> Option<&Delimiters> {
    match kind {
        WrapperKind::Inserted => Some(&tags.added),
        WrapperKind::Deleted => Some(&tags.deleted),
        WrapperKind::Highlight => Some(&tags.highlight),
        WrapperKind::Substitution { .. } => None,
    }
}

/// Renders the views of one document
#[derive(Debug, Clone, Copy)]
pub struct ViewRenderer<'a> {
    document: &'a Document,
    tags: &'a TagConfig,
}

impl<'a> ViewRenderer<'a> {
    #[inline]
    #[must_use = "creates a renderer"]
    pub const fn new(document: &'a Document, tags: &'a TagConfig) -> Self {
        Self { document, tags }
    }

    /// Render one view; the comments view is joined with newlines
    #[must_use = "returns the rendered view"]
    pub fn render(&self, view: View, include_comments: bool) -> String {
        match view {
            View::Tagged => self.tagged_transcript(include_comments),
            View::Added => self.added_only(),
            View::Deleted => self.deleted_only(),
            View::Comments => self.comments_only().join("\n"),
            View::Final => self.final_draft(),
            View::Original => self.original_draft(),
        }
    }

    /// Inserted text only, each span wrapped in the added pair
    #[must_use = "returns the added-only view"]
    pub fn added_only(&self) -> String {
        self.revision_only(RevisionKind::Inserted)
    }

    /// Deleted text only, each span wrapped in the deleted pair
    #[must_use = "returns the deleted-only view"]
    pub fn deleted_only(&self) -> String {
        self.revision_only(RevisionKind::Deleted)
    }

    fn revision_only(&self, kind: RevisionKind) -> String {
        let pair = match kind {
            RevisionKind::Deleted => &self.tags.deleted,
            _ => &self.tags.added,
        };
        self.document
            .paragraphs()
            .iter()
            .filter_map(|p| {
                let line: String = self
                    .document
                    .spans(p)
                    .iter()
                    .filter(|s| s.kind == kind)
                    .map(|s| pair.wrap(&s.text(p)))
                    .collect();
                (!line.is_empty()).then_some(line)
            })
            .collect::<Vec<_>>()
            .join("\n")
    }

    /// One "author: body" line per comment, in id order
    #[must_use = "returns the comments"]
    pub fn comments_only(&self) -> Vec<String> {
        self.document
            .comments()
            .map(CommentAnchor::display_text)
            .collect()
    }

    /// Plain and inserted text: every insertion accepted, every deletion rejected
    #[must_use = "returns the final draft"]
    pub fn final_draft(&self) -> String {
        self.join_paragraphs(|p| p.text_where(|k| k != RevisionKind::Deleted))
    }

    /// Plain and deleted text: the document as it was before review
    #[must_use = "returns the original draft"]
    pub fn original_draft(&self) -> String {
        self.join_paragraphs(|p| p.text_where(|k| k != RevisionKind::Inserted))
    }

    fn join_paragraphs(&self, line: impl Fn(&Paragraph) -> String) -> String {
        self.document
            .paragraphs()
            .iter()
            .map(line)
            .collect::<Vec<_>>()
            .join("\n")
    }

    /// Every run in order with revisions, highlights and (optionally) comments tagged
    #[must_use = "returns the tagged transcript"]
    pub fn tagged_transcript(&self, include_comments: bool) -> String {
        let paragraphs = self.document.paragraphs();
        let layouts: Vec<Vec<Wrapper>> = paragraphs.iter().map(|p| self.wrappers(p)).collect();

        let mut writer = TranscriptWriter {
            tags: self.tags,
            comments_at: BTreeMap::new(),
            anchor_starts: BTreeMap::new(),
            anchor_ends: BTreeMap::new(),
            out: String::new(),
        };
        if include_comments {
            let anchored = self.explicit_anchors(&layouts);
            for comment in self.document.comments() {
                if anchored.contains(&comment.id) {
                    writer.anchor_starts.insert(comment.start, comment);
                    writer.anchor_ends.insert(comment.end, comment);
                } else {
                    writer.comments_at.entry(comment.end).or_default().push(comment);
                }
            }
        }

        for (i, (paragraph, wrappers)) in paragraphs.iter().zip(&layouts).enumerate() {
            if i > 0 {
                writer.out.push('\n');
            }
            writer.paragraph(paragraph, wrappers);
        }
        // Comments whose cursor lies past the last run go at the very end
        let leftover: Vec<_> = std::mem::take(&mut writer.comments_at)
            .into_values()
            .flatten()
            .collect();
        for comment in leftover {
            writer.comment(comment);
        }
        writer.out
    }

    /// Group a paragraph's spans into transcript units
    fn units(&self, paragraph: &Paragraph) -> Vec<Unit> {
        let spans = self.document.spans(paragraph);
        let mut units = Vec::with_capacity(spans.len());
        let mut i = 0;
        while i < spans.len() {
            let span = &spans[i];
            let unit = match span.kind {
                RevisionKind::Deleted
                    if spans.get(i + 1).is_some_and(|next| is_substitution(span, next)) =>
                {
                    let next = &spans[i + 1];
                    i += 1;
                    Unit {
                        runs: span.runs.start..next.runs.end,
                        kind: UnitKind::Substitution {
                            split: span.runs.end,
                        },
                    }
                }
                RevisionKind::Deleted => Unit {
                    runs: span.runs.clone(),
                    kind: UnitKind::Deleted,
                },
                RevisionKind::Inserted => Unit {
                    runs: span.runs.clone(),
                    kind: UnitKind::Inserted,
                },
                RevisionKind::None => Unit {
                    runs: span.runs.clone(),
                    kind: UnitKind::Plain,
                },
            };
            units.push(unit);
            i += 1;
        }
        units
    }

    /// Revision and highlight pairs of one paragraph
    fn wrappers(&self, paragraph: &Paragraph) -> Vec<Wrapper> {
        let units = self.units(paragraph);
        let mut wrappers: Vec<Wrapper> = units
            .iter()
            .filter_map(|unit| {
                let kind = match unit.kind {
                    UnitKind::Plain => return None,
                    UnitKind::Inserted => WrapperKind::Inserted,
                    UnitKind::Deleted => WrapperKind::Deleted,
                    UnitKind::Substitution { split } => WrapperKind::Substitution { split },
                };
                Some(Wrapper {
                    runs: unit.runs.clone(),
                    kind,
                })
            })
            .collect();
        wrappers.extend(highlight_wrappers(paragraph, &units));
        wrappers
    }

    /// Comments that need an explicit anchor bracket to keep their range
    ///
    /// A bracket has to nest with every revision and highlight pair it meets,
    /// may not open or close inside a substitution, and is skipped when the
    /// outermost pair closing at the comment already spans the same runs.
    /// Ranges crossing paragraphs only open and close outside every pair.
    /// Bracketed ranges never overlap; earlier starts win.
    fn explicit_anchors(&self, layouts: &[Vec<Wrapper>]) -> HashSet<u32> {
        let paragraphs = self.document.paragraphs();
        let within = |cursor: RunCursor| {
            paragraphs
                .get(cursor.paragraph)
                .is_some_and(|p| cursor.run <= p.runs.len())
        };

        let mut candidates: Vec<&CommentAnchor> = self
            .document
            .comments()
            .filter(|c| c.start < c.end && within(c.start) && within(c.end))
            .collect();
        candidates.sort_by_key(|c| (c.start, c.id));

        let mut chosen = HashSet::new();
        let mut last_end: Option<RunCursor> = None;
        for comment in candidates {
            let (Some(first), Some(last)) = (
                layouts.get(comment.start.paragraph),
                layouts.get(comment.end.paragraph),
            ) else {
                continue;
            };
            let fits = if comment.start.paragraph == comment.end.paragraph {
                let range = comment.start.run..comment.end.run;
                first.iter().all(|w| w.nests_with(&range)) && !closes_over(first, &range)
            } else {
                !first.iter().any(|w| w.splits(comment.start.run))
                    && !last.iter().any(|w| w.splits(comment.end.run))
            };
            let overlaps = last_end.is_some_and(|e| comment.start < e);
            if fits && !overlaps {
                chosen.insert(comment.id);
                last_end = Some(comment.end);
            }
        }
        chosen
    }
}

/// A deleted span directly followed by the insertion allocated right after it
fn is_substitution(deleted: &RevisionSpan, inserted: &RevisionSpan) -> bool {
    inserted.kind == RevisionKind::Inserted
        && deleted.runs.end == inserted.runs.start
        && deleted.author == inserted.author
        && matches!((deleted.id, inserted.id), (Some(d), Some(i)) if d.checked_add(1) == Some(i))
}

/// Whether the outermost pair closing at `range.end` spans exactly `range`
///
/// A comment written right after that pair attaches to it without a bracket.
fn closes_over(wrappers: &[Wrapper], range: &Range<usize>) -> bool {
    wrappers
        .iter()
        .filter(|w| w.runs.end == range.end)
        .min_by_key(|w| (w.runs.start, w.depth()))
        .is_some_and(|w| w.runs.start == range.start)
}

/// Highlight pairs for a paragraph
///
/// A highlighted stretch gets one pair when every revision unit it touches
/// lies wholly inside it; otherwise it is cut at unit boundaries. Stretches
/// inside a substitution are written with the substitution.
fn highlight_wrappers(paragraph: &Paragraph, units: &[Unit]) -> Vec<Wrapper> {
    let runs = &paragraph.runs;
    let mut wrappers = Vec::new();
    let mut i = 0;
    while i < runs.len() {
        if !runs[i].highlight {
            i += 1;
            continue;
        }
        let start = i;
        while i < runs.len() && runs[i].highlight {
            i += 1;
        }
        let stretch = start..i;

        let touched: Vec<&Unit> = units
            .iter()
            .filter(|u| u.runs.start < stretch.end && stretch.start < u.runs.end)
            .collect();
        let covers_units = touched.len() > 1
            && touched.iter().all(|u| match u.kind {
                UnitKind::Plain => true,
                UnitKind::Substitution { .. } => false,
                UnitKind::Inserted | UnitKind::Deleted => {
                    stretch.start <= u.runs.start && u.runs.end <= stretch.end
                }
            });
        if covers_units {
            wrappers.push(Wrapper {
                runs: stretch,
                kind: WrapperKind::Highlight,
            });
            continue;
        }
        for unit in touched {
            if matches!(unit.kind, UnitKind::Substitution { .. }) {
                continue;
            }
            wrappers.push(Wrapper {
                runs: stretch.start.max(unit.runs.start)..stretch.end.min(unit.runs.end),
                kind: WrapperKind::Highlight,
            });
        }
    }
    wrappers
}

struct TranscriptWriter<'a> {
    tags: &'a TagConfig,
    /// Comments without a bracket, by end cursor
    comments_at: BTreeMap<RunCursor, Vec<&'a CommentAnchor>>,
    anchor_starts: BTreeMap<RunCursor, &'a CommentAnchor>,
    anchor_ends: BTreeMap<RunCursor, &'a CommentAnchor>,
    out: String,
}

impl<'a> TranscriptWriter<'a> {
    /// Write one paragraph, visiting every boundary between its runs
    ///
    /// At each boundary: point comments, closing delimiters innermost first,
    /// the bracketed comment and the remaining comments, then opening
    /// delimiters outermost first.
    fn paragraph(&mut self, paragraph: &Paragraph, wrappers: &[Wrapper]) {
        let tags = self.tags;
        let index = paragraph.index;
        let mut moved: Vec<&'a CommentAnchor> = Vec::new();
        let mut run = 0;
        loop {
            let at = RunCursor::new(index, run);
            let (points, ranged): (Vec<_>, Vec<_>) = self
                .comments_at
                .remove(&at)
                .unwrap_or_default()
                .into_iter()
                .partition(|c| c.is_empty());
            for comment in points {
                self.comment(comment);
            }

            let mut closers: Vec<(Option<usize>, u8, Option<&Wrapper>)> = wrappers
                .iter()
                .filter(|w| w.runs.end == run && delimiters(tags, w.kind).is_some())
                .map(|w| (Some(w.runs.start), w.depth(), Some(w)))
                .collect();
            let closing = self.anchor_ends.remove(&at);
            if let Some(comment) = closing {
                let start = (comment.start.paragraph == index).then_some(comment.start.run);
                closers.push((start, ANCHOR_DEPTH, None));
            }
            closers.sort_by_key(|&(start, depth, _)| (Reverse(start), Reverse(depth)));
            for (_, _, wrapper) in closers {
                let pair = match wrapper {
                    Some(w) => delimiters(tags, w.kind),
                    None => Some(&tags.anchor),
                };
                if let Some(pair) = pair {
                    self.out.push_str(&pair.end);
                }
            }
            for comment in closing.into_iter().chain(moved.drain(..)).chain(ranged) {
                self.comment(comment);
            }

            let mut openers: Vec<(Option<Reverse<usize>>, u8, Option<&Wrapper>)> = wrappers
                .iter()
                .filter(|w| w.runs.start == run)
                .map(|w| (Some(Reverse(w.runs.end)), w.depth(), Some(w)))
                .collect();
            if let Some(comment) = self.anchor_starts.remove(&at) {
                let end = (comment.end.paragraph == index).then_some(Reverse(comment.end.run));
                openers.push((end, ANCHOR_DEPTH, None));
            }
            openers.sort_by_key(|&(end, depth, _)| (end, depth));
            let mut resume = None;
            for (_, _, wrapper) in openers {
                match wrapper {
                    None => self.out.push_str(&tags.anchor.start),
                    Some(w) => match w.kind {
                        WrapperKind::Substitution { split } => {
                            self.substitution(paragraph, w.runs.clone(), split, &mut moved);
                            resume = Some(w.runs.end);
                        }
                        kind => {
                            if let Some(pair) = delimiters(tags, kind) {
                                self.out.push_str(&pair.start);
                            }
                        }
                    },
                }
            }

            match resume {
                Some(end) => run = end,
                None if run < paragraph.runs.len() => {
                    self.out.push_str(&paragraph.runs[run].text);
                    run += 1;
                }
                None => break,
            }
        }
    }

    /// Write a substitution in one piece
    ///
    /// Comments ending inside it move to its end: points stay inside the new
    /// text, ranges follow the closing delimiter.
    fn substitution(
        &mut self,
        paragraph: &Paragraph,
        runs: Range<usize>,
        split: usize,
        moved: &mut Vec<&'a CommentAnchor>,
    ) {
        let tags = self.tags;
        let mut points = Vec::new();
        for run in runs.start + 1..=runs.end {
            let cursor = RunCursor::new(paragraph.index, run);
            for comment in self.comments_at.remove(&cursor).unwrap_or_default() {
                if comment.is_empty() {
                    points.push(comment);
                } else {
                    moved.push(comment);
                }
            }
        }

        let old: String = paragraph.runs[runs.start..split]
            .iter()
            .map(|r| r.text.as_str())
            .collect();
        self.out.push_str(&tags.replaced.start);
        self.out.push_str(&old);
        self.out.push_str(&tags.replaced.separator);

        let new = &paragraph.runs[split..runs.end];
        for (i, run) in new.iter().enumerate() {
            if run.highlight && (i == 0 || !new[i - 1].highlight) {
                self.out.push_str(&tags.highlight.start);
            }
            self.out.push_str(&run.text);
            // Points go before any closer so they do not borrow its range
            if i + 1 == new.len() {
                for comment in points.drain(..) {
                    self.comment(comment);
                }
            }
            if run.highlight && new.get(i + 1).map_or(true, |next| !next.highlight) {
                self.out.push_str(&tags.highlight.end);
            }
        }
        for comment in points {
            self.comment(comment);
        }
        self.out.push_str(&tags.replaced.end);
    }

    fn comment(&mut self, comment: &CommentAnchor) {
        self.out
            .push_str(&self.tags.comment.wrap(&comment.display_text()));
    }
}
