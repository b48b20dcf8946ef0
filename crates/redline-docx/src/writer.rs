//! Package writer: stripped text and tags onto a template
//!
//! The template is cloned part by part. Its body is replaced by paragraphs
//! synthesized from the text (one per line), keeping the template's section
//! properties, and new comments are appended to its comments part. Styles,
//! numbering, relationships and everything else are carried over unchanged.
//!
//! Revision and comment ids are allocated in tag order from one past the
//! highest id already present in the template.

use crate::package::{rels_path_for, Package, REL_COMMENTS};
use crate::xml::{XmlDocument, XmlElement, XmlNode};
use chrono::{DateTime, SecondsFormat, Utc};
use redline_core::{
    BuildError, ReviewOptions, RevisionKind, Tag, TagKind, DEFAULT_AUTHOR, DEFAULT_HIGHLIGHT_COLOR,
};
use std::collections::BTreeSet;
use std::ops::Range;

/// Elements whose `w:id` belongs to the revision id space
const TRACKED_CHANGE_ELEMENTS: &[&str] = &[
    "w:ins",
    "w:del",
    "w:moveFrom",
    "w:moveTo",
    "w:rPrChange",
    "w:pPrChange",
    "w:sectPrChange",
    "w:tblPrChange",
    "w:trPrChange",
    "w:tcPrChange",
];

/// Elements whose `w:id` belongs to the comment id space
const COMMENT_ELEMENTS: &[&str] = &[
    "w:comment",
    "w:commentRangeStart",
    "w:commentRangeEnd",
    "w:commentReference",
];

/// Monotonic id counter for one id space
#[derive(Debug)]
struct IdAllocator {
    kind: &'static str,
    next: u32,
    taken: BTreeSet<u32>,
}

impl IdAllocator {
    /// Start one past the highest id already taken
    fn seeded(kind: &'static str, taken: BTreeSet<u32>) -> Self {
        let next = taken.last().map_or(0, |max| max.saturating_add(1));
        Self { kind, next, taken }
    }

    fn allocate(&mut self) -> Result<u32, BuildError> {
        let id = self.next;
        if !self.taken.insert(id) {
            return Err(BuildError::IdCollision {
                kind: self.kind,
                id,
            });
        }
        self.next = id.saturating_add(1);
        Ok(id)
    }

    fn skip(&mut self) {
        self.next = self.next.saturating_add(1);
    }
}

/// Ids assigned to one tag
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum TagIds {
    None,
    Revision(u32),
    Substitution { deleted: u32, inserted: u32 },
    Comment(u32),
}

/// A tag with its ids
#[derive(Debug)]
struct Planned<'t> {
    tag: &'t Tag,
    ids: TagIds,
}

impl Planned<'_> {
    fn comment_id(&self) -> Option<u32> {
        match self.ids {
            TagIds::Comment(id) => Some(id),
            _ => None,
        }
    }
}

/// Template parts the writer extends
struct Template {
    document_path: String,
    document: XmlDocument,
    comments_path: String,
    comments: XmlDocument,
}

/// Builds a reviewed package from stripped text and tags
#[derive(Debug, Clone)]
pub struct PackageWriter {
    author: String,
    highlight_color: String,
    date: DateTime<Utc>,
}

impl Default for PackageWriter {
    fn default() -> Self {
        Self::new(DEFAULT_AUTHOR)
    }
}

impl PackageWriter {
    /// Writer stamping revisions with `author` and the current time
    #[must_use = "creates a writer"]
    pub fn new(author: impl Into<String>) -> Self {
        Self {
            author: author.into(),
            highlight_color: DEFAULT_HIGHLIGHT_COLOR.to_string(),
            date: Utc::now(),
        }
    }

    #[must_use = "creates a writer"]
    pub fn from_options(options: &ReviewOptions) -> Self {
        Self::new(options.author.clone()).with_highlight_color(options.highlight_color.clone())
    }

    /// Use a fixed timestamp instead of the current time
    #[must_use = "returns the writer with the date set"]
    pub fn with_date(mut self, date: DateTime<Utc>) -> Self {
        self.date = date;
        self
    }

    #[must_use = "returns the writer with the colour set"]
    pub fn with_highlight_color(mut self, color: impl Into<String>) -> Self {
        self.highlight_color = color.into();
        self
    }

    #[inline]
    #[must_use = "returns the author"]
    pub fn author(&self) -> &str {
        &self.author
    }

    /// Project `tags` over `text` onto a copy of `template`
    ///
    /// # Errors
    ///
    /// Returns `InvalidTemplate` if the template has no body, no relationships
    /// part for its main document, or no comments part; `TagOutOfRange` if a
    /// tag does not fall on character boundaries of `text`; `IdCollision` if
    /// an allocated id is already used by the template.
    pub fn build(
        &self,
        template: &Package,
        text: &str,
        tags: &[Tag],
    ) -> Result<Package, BuildError> {
        for tag in tags {
            let in_range = tag.start <= tag.end
                && tag.end <= text.len()
                && text.is_char_boundary(tag.start)
                && text.is_char_boundary(tag.end);
            if !in_range {
                return Err(BuildError::TagOutOfRange {
                    start: tag.start,
                    end: tag.end,
                    len: text.len(),
                });
            }
        }

        let Template {
            document_path,
            mut document,
            comments_path,
            mut comments,
        } = Self::load_template(template)?;

        let (taken_revisions, taken_comments) = taken_ids(template);
        let mut revision_ids = IdAllocator::seeded("revision", taken_revisions);
        let mut comment_ids = IdAllocator::seeded("comment", taken_comments);
        let planned = plan(text, tags, &mut revision_ids, &mut comment_ids)?;

        let paragraphs: Vec<XmlElement> = line_ranges(text)
            .into_iter()
            .map(|line| self.paragraph(text, line, &planned))
            .collect();
        let paragraph_count = paragraphs.len();

        for p in &planned {
            if let TagIds::Comment(id) = p.ids {
                comments.root.push(self.comment_element(id, p.tag.body().unwrap_or_default()));
            }
        }

        let body = document
            .root
            .child_mut("w:body")
            .ok_or_else(|| BuildError::InvalidTemplate("template has no w:body".to_string()))?;
        let sect_pr = body.child("w:sectPr").cloned();
        body.children = paragraphs.into_iter().map(XmlNode::Element).collect();
        if let Some(sect_pr) = sect_pr {
            body.push(sect_pr);
        }

        let mut package = template.clone();
        package.set_xml_part(document_path, &document)?;
        package.set_xml_part(comments_path, &comments)?;

        log::info!(
            "built {} paragraphs with {} revision ids and {} comments",
            paragraph_count,
            planned
                .iter()
                .map(|p| match p.ids {
                    TagIds::Revision(_) => 1,
                    TagIds::Substitution { .. } => 2,
                    _ => 0,
                })
                .sum::<usize>(),
            planned.iter().filter(|p| p.comment_id().is_some()).count()
        );
        Ok(package)
    }

    fn load_template(template: &Package) -> Result<Template, BuildError> {
        let document_path = template.main_document_path()?;
        let document = template.xml_part(&document_path)?;
        if document.root.child("w:body").is_none() {
            return Err(BuildError::InvalidTemplate(format!(
                "{document_path} has no w:body element"
            )));
        }

        let rels_path = rels_path_for(&document_path);
        if !template.contains(&rels_path) {
            return Err(BuildError::InvalidTemplate(format!(
                "missing relationships part {rels_path}"
            )));
        }

        let comments_path = template
            .related_part(&document_path, REL_COMMENTS)?
            .ok_or_else(|| {
                BuildError::InvalidTemplate(format!("{rels_path} declares no comments part"))
            })?;
        if !template.contains(&comments_path) {
            return Err(BuildError::InvalidTemplate(format!(
                "missing comments part {comments_path}"
            )));
        }
        let comments = template.xml_part(&comments_path)?;
        if comments.root.name != "w:comments" {
            return Err(BuildError::InvalidTemplate(format!(
                "{comments_path} root is <{}>, expected <w:comments>",
                comments.root.name
            )));
        }

        Ok(Template {
            document_path,
            document,
            comments_path,
            comments,
        })
    }

    /// One `w:p` for the line `line` of `text`
    fn paragraph(&self, text: &str, line: Range<usize>, planned: &[Planned<'_>]) -> XmlElement {
        let mut points: BTreeSet<usize> = BTreeSet::from([line.start, line.end]);
        for p in planned {
            for offset in [p.tag.start, p.tag.end] {
                if line.start < offset && offset < line.end {
                    points.insert(offset);
                }
            }
        }
        let points: Vec<usize> = points.into_iter().collect();

        let mut builder = ParagraphBuilder::new();
        for (i, &at) in points.iter().enumerate() {
            self.markers_at(at, planned, &mut builder);
            if let Some(&next) = points.get(i + 1) {
                let segment = at..next;
                // The CR of a CRLF pair belongs to the break, not the run
                let piece = text[segment.clone()].trim_end_matches('\r');
                if piece.is_empty() {
                    continue;
                }
                let revision = innermost_revision(planned, &segment);
                let highlight = highlighted(planned, &segment);
                let deleted = revision.is_some_and(|(kind, _)| kind == RevisionKind::Deleted);
                let run = self.run_element(piece, deleted, highlight);
                builder.push_run(run, revision, self);
            }
        }
        builder.finish()
    }

    /// Comment markers and substitution deletions at one offset
    fn markers_at(&self, at: usize, planned: &[Planned<'_>], builder: &mut ParagraphBuilder) {
        let comments = || planned.iter().filter_map(|p| Some((p.comment_id()?, p.tag)));

        for (id, tag) in comments().filter(|(_, t)| t.end == at && t.start < at) {
            builder.push_marker(marker("w:commentRangeEnd", id));
            builder.push_marker(reference_run(id));
            log::trace!("comment {id} closes at {} after opening at {}", at, tag.start);
        }
        for (id, _) in comments().filter(|(_, t)| t.start == at && t.end > at) {
            builder.push_marker(marker("w:commentRangeStart", id));
        }
        for (id, _) in comments().filter(|(_, t)| t.start == at && t.end == at) {
            builder.push_marker(marker("w:commentRangeStart", id));
            builder.push_marker(marker("w:commentRangeEnd", id));
            builder.push_marker(reference_run(id));
        }

        for p in planned.iter().filter(|p| p.tag.start == at) {
            if let (TagIds::Substitution { deleted, .. }, Some(old)) = (p.ids, p.tag.old_text()) {
                let span = p.tag.start..p.tag.end;
                let run = self.run_element(old, true, highlighted(planned, &span));
                builder.push_run(run, Some((RevisionKind::Deleted, deleted)), self);
            }
        }
    }

    /// A `w:r` with text split around tabs
    fn run_element(&self, text: &str, deleted: bool, highlight: bool) -> XmlElement {
        let mut r = XmlElement::new("w:r");
        if highlight {
            r.push(
                XmlElement::new("w:rPr").with_child(
                    XmlElement::new("w:highlight").with_attr("w:val", self.highlight_color.as_str()),
                ),
            );
        }
        let text_name = if deleted { "w:delText" } else { "w:t" };
        for (i, piece) in text.split('\t').enumerate() {
            if i > 0 {
                r.push(XmlElement::new("w:tab"));
            }
            if !piece.is_empty() {
                r.push(
                    XmlElement::new(text_name)
                        .with_attr("xml:space", "preserve")
                        .with_text(piece),
                );
            }
        }
        r
    }

    fn revision_wrapper(&self, kind: RevisionKind, id: u32) -> XmlElement {
        let name = if kind == RevisionKind::Deleted {
            "w:del"
        } else {
            "w:ins"
        };
        XmlElement::new(name)
            .with_attr("w:id", id.to_string())
            .with_attr("w:author", self.author.as_str())
            .with_attr("w:date", self.timestamp())
    }

    fn comment_element(&self, id: u32, body: &str) -> XmlElement {
        let mut comment = XmlElement::new("w:comment")
            .with_attr("w:id", id.to_string())
            .with_attr("w:author", self.author.as_str())
            .with_attr("w:date", self.timestamp())
            .with_attr("w:initials", initials(&self.author));
        for line in body.split('\n').map(|l| l.trim_end_matches('\r')) {
            let mut p = XmlElement::new("w:p");
            if !line.is_empty() {
                p.push(self.run_element(line, false, false));
            }
            comment.push(p);
        }
        comment
    }

    fn timestamp(&self) -> String {
        self.date.to_rfc3339_opts(SecondsFormat::Secs, true)
    }
}

/// Accumulates one paragraph, grouping consecutive runs of one revision
#[derive(Debug)]
struct ParagraphBuilder {
    paragraph: XmlElement,
    open: Option<(RevisionKind, u32, XmlElement)>,
}

impl ParagraphBuilder {
    fn new() -> Self {
        Self {
            paragraph: XmlElement::new("w:p"),
            open: None,
        }
    }

    fn push_run(
        &mut self,
        run: XmlElement,
        revision: Option<(RevisionKind, u32)>,
        writer: &PackageWriter,
    ) {
        let Some((kind, id)) = revision else {
            self.flush();
            self.paragraph.push(run);
            return;
        };
        match &mut self.open {
            Some((open_kind, open_id, wrapper)) if *open_kind == kind && *open_id == id => {
                wrapper.push(run);
            }
            _ => {
                self.flush();
                self.open = Some((kind, id, writer.revision_wrapper(kind, id).with_child(run)));
            }
        }
    }

    fn push_marker(&mut self, marker: XmlElement) {
        self.flush();
        self.paragraph.push(marker);
    }

    fn flush(&mut self) {
        if let Some((_, _, wrapper)) = self.open.take() {
            self.paragraph.push(wrapper);
        }
    }

    fn finish(mut self) -> XmlElement {
        self.flush();
        self.paragraph
    }
}

/// Assign ids to tags in order
///
/// A deletion directly followed by a separate insertion would otherwise get
/// consecutive ids and read back as one substitution, so one id is skipped
/// between them.
fn plan<'t>(
    text: &str,
    tags: &'t [Tag],
    revision_ids: &mut IdAllocator,
    comment_ids: &mut IdAllocator,
) -> Result<Vec<Planned<'t>>, BuildError> {
    let mut ordered: Vec<&Tag> = tags.iter().collect();
    ordered.sort_by(|a, b| a.start.cmp(&b.start).then(b.end.cmp(&a.end)));

    let mut last_deletion_end: Option<usize> = None;
    let mut planned = Vec::with_capacity(ordered.len());
    for tag in ordered {
        let ids = match tag.kind() {
            TagKind::Added if tag.is_empty() => TagIds::None,
            TagKind::Deleted if tag.is_empty() => TagIds::None,
            TagKind::Added | TagKind::Deleted if only_line_breaks(&text[tag.start..tag.end]) => {
                log::warn!(
                    "dropping {:?} tag at {}..{}: it covers only line breaks",
                    tag.kind(),
                    tag.start,
                    tag.end
                );
                TagIds::None
            }
            TagKind::Added => {
                if last_deletion_end.take() == Some(tag.start) {
                    revision_ids.skip();
                }
                TagIds::Revision(revision_ids.allocate()?)
            }
            TagKind::Deleted => {
                let id = revision_ids.allocate()?;
                last_deletion_end = Some(tag.end);
                TagIds::Revision(id)
            }
            TagKind::Replaced => {
                last_deletion_end = None;
                let deleted = revision_ids.allocate()?;
                let inserted = revision_ids.allocate()?;
                TagIds::Substitution { deleted, inserted }
            }
            TagKind::Comment => TagIds::Comment(comment_ids.allocate()?),
            TagKind::Highlight => TagIds::None,
        };
        planned.push(Planned { tag, ids });
    }
    Ok(planned)
}

/// Revision of the innermost added, deleted or replaced tag covering `segment`
fn innermost_revision(
    planned: &[Planned<'_>],
    segment: &Range<usize>,
) -> Option<(RevisionKind, u32)> {
    let mut best: Option<(&Tag, RevisionKind, u32)> = None;
    for p in planned {
        let (kind, id) = match p.ids {
            TagIds::Revision(id) if p.tag.kind() == TagKind::Deleted => (RevisionKind::Deleted, id),
            TagIds::Revision(id) => (RevisionKind::Inserted, id),
            TagIds::Substitution { inserted, .. } => (RevisionKind::Inserted, inserted),
            TagIds::None | TagIds::Comment(_) => continue,
        };
        if !p.tag.covers(segment.start, segment.end) {
            continue;
        }
        let inner = best.map_or(true, |(b, _, _)| {
            p.tag.start > b.start || (p.tag.start == b.start && p.tag.end < b.end)
        });
        if inner {
            best = Some((p.tag, kind, id));
        }
    }
    best.map(|(_, kind, id)| (kind, id))
}

fn highlighted(planned: &[Planned<'_>], segment: &Range<usize>) -> bool {
    planned
        .iter()
        .any(|p| p.tag.kind() == TagKind::Highlight && p.tag.covers(segment.start, segment.end))
}

/// Paragraph breaks carry no run text, so a revision over them alone has nothing to mark
fn only_line_breaks(text: &str) -> bool {
    text.chars().all(|c| c == '\n' || c == '\r')
}

/// Byte ranges of the lines of `text`, newlines excluded
fn line_ranges(text: &str) -> Vec<Range<usize>> {
    let mut lines = Vec::new();
    let mut start = 0;
    for (i, _) in text.match_indices('\n') {
        lines.push(start..i);
        start = i + 1;
    }
    lines.push(start..text.len());
    lines
}

/// Revision and comment ids used by any XML part of the template
///
/// Headers, footers, footnotes and endnotes share the id space of the body.
fn taken_ids(template: &Package) -> (BTreeSet<u32>, BTreeSet<u32>) {
    let mut revisions = BTreeSet::new();
    let mut comments = BTreeSet::new();
    for name in template.part_names().filter(|n| n.ends_with(".xml")) {
        match template.xml_part(name) {
            Ok(part) => {
                revisions.extend(collect_ids(&part.root, TRACKED_CHANGE_ELEMENTS));
                comments.extend(collect_ids(&part.root, COMMENT_ELEMENTS));
            }
            Err(e) => log::debug!("skipping {name} while collecting ids: {e}"),
        }
    }
    (revisions, comments)
}

/// Numeric `w:id`s of every element named in `names`, root included
fn collect_ids(root: &XmlElement, names: &[&str]) -> BTreeSet<u32> {
    std::iter::once(root)
        .chain(root.descendants())
        .filter(|e| names.contains(&e.name.as_str()))
        .filter_map(|e| e.attr("w:id")?.parse().ok())
        .collect()
}

fn marker(name: &str, id: u32) -> XmlElement {
    XmlElement::new(name).with_attr("w:id", id.to_string())
}

fn reference_run(id: u32) -> XmlElement {
    XmlElement::new("w:r").with_child(marker("w:commentReference", id))
}

fn initials(author: &str) -> String {
    author
        .split_whitespace()
        .filter_map(|word| word.chars().next())
        .flat_map(char::to_uppercase)
        .collect()
}
