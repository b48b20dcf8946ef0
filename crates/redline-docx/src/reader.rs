//! Package reader: body tree to review model
//!
//! Reading is best-effort. Only a missing or malformed body aborts a load;
//! unknown markup and unpaired comment markers are skipped, logged at `warn`
//! and recorded on the [`Document`] as warnings.
//!
//! ## Markup handled
//! - `w:p` paragraphs of `w:r` runs (`w:t`, `w:delText`, `w:tab`, `w:br`, `w:cr`)
//! - `w:ins`/`w:moveTo` (inserted) and `w:del`/`w:moveFrom` (deleted) wrappers
//! - `w:hyperlink`, `w:smartTag`, `w:fldSimple`, `w:customXml` and `w:sdt`
//!   containers, read through
//! - `w:commentRangeStart`/`w:commentRangeEnd` markers, paired by id, with
//!   bodies from the comments part
//! - `w:rPr/w:highlight` for the highlight flag

use crate::package::{Package, REL_COMMENTS};
use crate::xml::XmlElement;
use chrono::{DateTime, NaiveDateTime, Utc};
use redline_core::{
    AnchorSide, CommentAnchor, Document, LoadError, Paragraph, Revision, RevisionInfo, Run,
    RunCursor,
};
use std::collections::{BTreeMap, HashMap};

/// Comments part used when the document has no comments relationship
const DEFAULT_COMMENTS_PART: &str = "word/comments.xml";

/// Paragraph-level markup skipped without a warning
const IGNORED_INLINE: &[&str] = &[
    "w:pPr",
    "w:bookmarkStart",
    "w:bookmarkEnd",
    "w:proofErr",
    "w:permStart",
    "w:permEnd",
    "w:moveFromRangeStart",
    "w:moveFromRangeEnd",
    "w:moveToRangeStart",
    "w:moveToRangeEnd",
];

/// Run-level markup skipped without a warning
const IGNORED_IN_RUN: &[&str] = &[
    "w:rPr",
    "w:lastRenderedPageBreak",
    "w:fldChar",
    "w:instrText",
    "w:delInstrText",
    "w:softHyphen",
];

/// Parse a revision or comment timestamp
///
/// Accepts RFC 3339 and the zone-less form some producers write.
#[inline]
pub(crate) fn parse_date(s: &str) -> Option<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(s)
        .map(|dt| dt.with_timezone(&Utc))
        .ok()
        .or_else(|| {
            NaiveDateTime::parse_from_str(s, "%Y-%m-%dT%H:%M:%S")
                .ok()
                .map(|dt| dt.and_utc())
        })
}

/// Revision metadata from a `w:ins`/`w:del` style element
fn revision_info(e: &XmlElement) -> RevisionInfo {
    RevisionInfo {
        id: e.attr("w:id").and_then(|s| s.parse().ok()),
        author: e.attr("w:author").map(str::to_string),
        date: e.attr("w:date").and_then(parse_date),
    }
}

/// Plain text of one paragraph of a comment body
fn comment_paragraph_text(p: &XmlElement) -> String {
    let mut text = String::new();
    for e in p.descendants() {
        match e.name.as_str() {
            "w:t" => text.push_str(&e.text()),
            "w:tab" => text.push('\t'),
            "w:br" | "w:cr" => text.push('\n'),
            _ => {}
        }
    }
    text
}

/// A `w:comment` from the comments part
#[derive(Debug, Clone, Default)]
struct CommentBody {
    author: Option<String>,
    initials: Option<String>,
    date: Option<DateTime<Utc>>,
    text: String,
}

/// Reads a [`Document`] out of a package
#[derive(Debug, Clone, Copy)]
pub struct PackageReader {
    merge_revisions: bool,
}

impl Default for PackageReader {
    #[inline]
    fn default() -> Self {
        Self::new(true)
    }
}

impl PackageReader {
    #[inline]
    #[must_use = "creates a reader"]
    pub const fn new(merge_revisions: bool) -> Self {
        Self { merge_revisions }
    }

    /// Load the main document of a package
    ///
    /// # Errors
    ///
    /// Returns `LoadError::MalformedPackage` if the main document part is
    /// missing, is not well-formed XML, or has no `w:body`. Every other
    /// irregularity is recorded on the returned document instead.
    pub fn load(&self, package: &Package) -> Result<Document, LoadError> {
        let document_path = package.main_document_path()?;
        let xml = package.xml_part(&document_path)?;
        let body = xml.root.child("w:body").ok_or_else(|| {
            LoadError::MalformedPackage(format!("{document_path} has no w:body element"))
        })?;

        let bodies = Self::read_comment_bodies(package, &document_path);

        let mut state = WalkBodyState::default();
        state.walk_body(body);
        let document = state.into_document(bodies, self.merge_revisions);

        log::debug!(
            "loaded {} paragraphs, {} comments, {} warnings",
            document.paragraphs().len(),
            document.comments().count(),
            document.warnings().len()
        );
        Ok(document)
    }

    /// Comment bodies by id; a missing or broken comments part yields none
    fn read_comment_bodies(package: &Package, document_path: &str) -> HashMap<u32, CommentBody> {
        let path = match package.related_part(document_path, REL_COMMENTS) {
            Ok(Some(path)) => path,
            Ok(None) => DEFAULT_COMMENTS_PART.to_string(),
            Err(e) => {
                log::warn!("cannot read relationships of {document_path}: {e}");
                DEFAULT_COMMENTS_PART.to_string()
            }
        };
        if !package.contains(&path) {
            return HashMap::new();
        }
        let xml = match package.xml_part(&path) {
            Ok(xml) => xml,
            Err(e) => {
                log::warn!("ignoring unreadable comments part {path}: {e}");
                return HashMap::new();
            }
        };

        let mut bodies = HashMap::new();
        for comment in xml.root.children_named("w:comment") {
            let Some(id) = comment.attr("w:id").and_then(|s| s.parse::<u32>().ok()) else {
                log::warn!("skipping comment without a numeric w:id");
                continue;
            };
            let text = comment
                .children_named("w:p")
                .map(comment_paragraph_text)
                .collect::<Vec<_>>()
                .join("\n");
            bodies.insert(
                id,
                CommentBody {
                    author: comment.attr("w:author").map(str::to_string),
                    initials: comment.attr("w:initials").map(str::to_string),
                    date: comment.attr("w:date").and_then(parse_date),
                    text,
                },
            );
        }
        bodies
    }
}

/// State carried through one walk of the body tree
#[derive(Debug, Default)]
struct WalkBodyState {
    paragraphs: Vec<Paragraph>,
    /// Runs of the paragraph being read
    runs: Vec<Run>,
    open_comments: HashMap<u32, RunCursor>,
    comment_ranges: BTreeMap<u32, (RunCursor, RunCursor)>,
    /// Where each `w:commentReference` sits, for comments without range markers
    references: HashMap<u32, RunCursor>,
    warnings: Vec<LoadError>,
}

impl WalkBodyState {
    /// Boundary before the next run to be read
    fn cursor(&self) -> RunCursor {
        RunCursor::new(self.paragraphs.len(), self.runs.len())
    }

    fn warn(&mut self, warning: LoadError) {
        log::warn!("{warning}");
        self.warnings.push(warning);
    }

    fn walk_body(&mut self, body: &XmlElement) {
        for child in body.elements() {
            match child.name.as_str() {
                "w:p" => self.handle_paragraph(child),
                "w:sdt" => {
                    if let Some(content) = child.child("w:sdtContent") {
                        self.walk_body(content);
                    }
                }
                "w:customXml" => self.walk_body(child),
                "w:commentRangeStart" => self.handle_comment_marker(child, AnchorSide::Start),
                "w:commentRangeEnd" => self.handle_comment_marker(child, AnchorSide::End),
                "w:sectPr" | "w:bookmarkStart" | "w:bookmarkEnd" | "w:proofErr" => {}
                name => self.warn(LoadError::UnsupportedElement {
                    name: name.to_string(),
                    paragraph: self.paragraphs.len(),
                }),
            }
        }
    }

    fn handle_paragraph(&mut self, p: &XmlElement) {
        self.walk_inline(p, &Revision::None);
        let index = self.paragraphs.len();
        let runs = std::mem::take(&mut self.runs);
        self.paragraphs.push(Paragraph::new(index, runs));
    }

    /// Paragraph content, under the revision of the enclosing wrapper
    fn walk_inline(&mut self, parent: &XmlElement, revision: &Revision) {
        for child in parent.elements() {
            match child.name.as_str() {
                "w:r" => self.handle_run(child, revision),
                "w:ins" | "w:moveTo" => {
                    self.walk_inline(child, &Revision::Inserted(revision_info(child)));
                }
                "w:del" | "w:moveFrom" => {
                    self.walk_inline(child, &Revision::Deleted(revision_info(child)));
                }
                "w:hyperlink" | "w:smartTag" | "w:fldSimple" | "w:customXml" => {
                    self.walk_inline(child, revision);
                }
                "w:sdt" => {
                    if let Some(content) = child.child("w:sdtContent") {
                        self.walk_inline(content, revision);
                    }
                }
                "w:commentRangeStart" => self.handle_comment_marker(child, AnchorSide::Start),
                "w:commentRangeEnd" => self.handle_comment_marker(child, AnchorSide::End),
                name if IGNORED_INLINE.contains(&name) => {}
                name => self.warn(LoadError::UnsupportedElement {
                    name: name.to_string(),
                    paragraph: self.paragraphs.len(),
                }),
            }
        }
    }

    fn handle_run(&mut self, r: &XmlElement, revision: &Revision) {
        let highlight = r
            .child("w:rPr")
            .and_then(|rpr| rpr.child("w:highlight"))
            .is_some_and(|h| h.attr("w:val") != Some("none"));

        let mut text = String::new();
        for child in r.elements() {
            match child.name.as_str() {
                "w:t" | "w:delText" => text.push_str(&child.text()),
                "w:tab" => text.push('\t'),
                "w:br" | "w:cr" => text.push('\n'),
                "w:noBreakHyphen" => text.push('\u{2011}'),
                "w:commentReference" => {
                    if let Some(id) = child.attr("w:id").and_then(|s| s.parse().ok()) {
                        let cursor = self.cursor();
                        self.references.insert(id, cursor);
                    }
                }
                name if IGNORED_IN_RUN.contains(&name) => {}
                name => self.warn(LoadError::UnsupportedElement {
                    name: name.to_string(),
                    paragraph: self.paragraphs.len(),
                }),
            }
        }

        // Marker-only runs carry no text and do not count as runs
        if text.is_empty() {
            return;
        }
        self.runs.push(Run {
            text,
            revision: revision.clone(),
            highlight,
        });
    }

    fn handle_comment_marker(&mut self, e: &XmlElement, side: AnchorSide) {
        let raw_id = e.attr("w:id").unwrap_or_default().to_string();
        let Ok(id) = raw_id.parse::<u32>() else {
            self.warn(LoadError::DanglingCommentAnchor { id: raw_id, side });
            return;
        };
        let cursor = self.cursor();
        match side {
            AnchorSide::Start => {
                if self.open_comments.insert(id, cursor).is_some() {
                    log::debug!("comment {id} restarted, keeping the later start");
                }
            }
            AnchorSide::End => match self.open_comments.remove(&id) {
                Some(start) => {
                    self.comment_ranges.insert(id, (start, cursor));
                }
                None => self.warn(LoadError::DanglingCommentAnchor { id: raw_id, side }),
            },
        }
    }

    /// Pull a cursor past the last paragraph back onto it
    fn clamp(&self, cursor: RunCursor) -> RunCursor {
        match self.paragraphs.last() {
            Some(last) if cursor.paragraph >= self.paragraphs.len() => {
                RunCursor::new(last.index, last.runs.len())
            }
            _ => cursor,
        }
    }

    fn into_document(
        mut self,
        mut bodies: HashMap<u32, CommentBody>,
        merge_revisions: bool,
    ) -> Document {
        let mut unclosed: Vec<u32> = self.open_comments.keys().copied().collect();
        unclosed.sort_unstable();
        for id in unclosed {
            self.warn(LoadError::DanglingCommentAnchor {
                id: id.to_string(),
                side: AnchorSide::Start,
            });
        }

        let mut comments = BTreeMap::new();
        for (&id, &(start, end)) in &self.comment_ranges {
            let body = bodies.remove(&id).unwrap_or_else(|| {
                log::debug!("comment {id} has no body in the comments part");
                CommentBody::default()
            });
            comments.insert(id, self.anchor(id, body, start, end));
        }

        // Comments with a reference but no range markers annotate a point
        let mut points: Vec<(u32, RunCursor)> = self
            .references
            .iter()
            .map(|(&id, &cursor)| (id, cursor))
            .filter(|(id, _)| !comments.contains_key(id) && !self.open_comments.contains_key(id))
            .collect();
        points.sort_unstable();
        for (id, cursor) in points {
            if let Some(body) = bodies.remove(&id) {
                comments.insert(id, self.anchor(id, body, cursor, cursor));
            }
        }

        Document::new(self.paragraphs, comments, merge_revisions, self.warnings)
    }

    fn anchor(&self, id: u32, body: CommentBody, start: RunCursor, end: RunCursor) -> CommentAnchor {
        CommentAnchor {
            id,
            author: body.author,
            initials: body.initials,
            date: body.date,
            body: body.text,
            start: self.clamp(start),
            end: self.clamp(end),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use redline_core::RevisionKind;

    const W_NS: &str = "http://schemas.openxmlformats.org/wordprocessingml/2006/main";

    fn package(body: &str, comments: Option<&str>) -> Package {
        let document = format!(
            r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?><w:document xmlns:w="{W_NS}"><w:body>{body}</w:body></w:document>"#
        );
        let mut parts = vec![("word/document.xml".to_string(), document)];
        if let Some(comments) = comments {
            parts.push((
                "word/comments.xml".to_string(),
                format!(r#"<w:comments xmlns:w="{W_NS}">{comments}</w:comments>"#),
            ));
        }
        Package::from_parts(parts)
    }

    fn load(body: &str, comments: Option<&str>) -> Document {
        PackageReader::default()
            .load(&package(body, comments))
            .unwrap()
    }

    #[test]
    fn test_plain_paragraphs() {
        let doc = load(
            r#"<w:p><w:r><w:t xml:space="preserve">Hello </w:t></w:r><w:r><w:t>world</w:t></w:r></w:p><w:p/>"#,
            None,
        );
        assert_eq!(doc.paragraphs().len(), 2);
        assert_eq!(doc.paragraphs()[0].runs.len(), 2);
        assert_eq!(doc.paragraphs()[0].text_where(|_| true), "Hello world");
        assert!(doc.paragraphs()[1].runs.is_empty());
        assert!(!doc.has_revisions());
        assert!(doc.warnings().is_empty());
    }

    #[test]
    fn test_revision_metadata() {
        let doc = load(
            r#"<w:p><w:del w:id="3" w:author="Bob" w:date="2024-05-01T09:30:00Z"><w:r><w:delText>old</w:delText></w:r></w:del><w:ins w:id="4" w:author="Bob"><w:r><w:t>new</w:t></w:r></w:ins></w:p>"#,
            None,
        );
        let runs = &doc.paragraphs()[0].runs;
        assert_eq!(runs[0].kind(), RevisionKind::Deleted);
        assert_eq!(runs[1].kind(), RevisionKind::Inserted);
        let info = runs[0].revision.info().unwrap();
        assert_eq!(info.id, Some(3));
        assert_eq!(info.author.as_deref(), Some("Bob"));
        assert_eq!(
            info.date,
            Some(DateTime::parse_from_rfc3339("2024-05-01T09:30:00Z").unwrap().with_timezone(&Utc))
        );
        assert_eq!(runs[1].revision.info().unwrap().date, None);
    }

    #[test]
    fn test_moves_read_as_revisions() {
        let doc = load(
            r#"<w:p><w:moveFrom w:id="1" w:author="A"><w:r><w:t>gone</w:t></w:r></w:moveFrom><w:moveTo w:id="2" w:author="A"><w:r><w:t>here</w:t></w:r></w:moveTo></w:p>"#,
            None,
        );
        let runs = &doc.paragraphs()[0].runs;
        assert_eq!(runs[0].kind(), RevisionKind::Deleted);
        assert_eq!(runs[1].kind(), RevisionKind::Inserted);
    }

    #[test]
    fn test_run_content() {
        let doc = load(
            r#"<w:p><w:r><w:rPr><w:highlight w:val="yellow"/></w:rPr><w:t>a</w:t><w:tab/><w:t>b</w:t><w:br/></w:r><w:r><w:rPr><w:highlight w:val="none"/></w:rPr><w:t>c</w:t></w:r></w:p>"#,
            None,
        );
        let runs = &doc.paragraphs()[0].runs;
        assert_eq!(runs[0].text, "a\tb\n");
        assert!(runs[0].highlight);
        assert!(!runs[1].highlight);
    }

    #[test]
    fn test_hyperlink_content_is_read() {
        let doc = load(
            r#"<w:p><w:hyperlink w:anchor="x"><w:r><w:t>link</w:t></w:r></w:hyperlink><w:proofErr w:type="spellStart"/></w:p>"#,
            None,
        );
        assert_eq!(doc.paragraphs()[0].text_where(|_| true), "link");
        assert!(doc.warnings().is_empty());
    }

    #[test]
    fn test_unsupported_elements_warn() {
        let doc = load(
            r#"<w:tbl><w:tr/></w:tbl><w:p><w:r><w:t>x</w:t><w:drawing/></w:r><w:oMath/></w:p>"#,
            None,
        );
        assert_eq!(doc.paragraphs().len(), 1);
        let names: Vec<String> = doc
            .warnings()
            .iter()
            .filter_map(|w| match w {
                LoadError::UnsupportedElement { name, .. } => Some(name.clone()),
                _ => None,
            })
            .collect();
        assert_eq!(names, vec!["w:tbl", "w:drawing", "w:oMath"]);
    }

    #[test]
    fn test_comment_anchor_and_body() {
        let doc = load(
            r#"<w:p><w:r><w:t>before </w:t></w:r><w:commentRangeStart w:id="0"/><w:r><w:t>target</w:t></w:r><w:commentRangeEnd w:id="0"/><w:r><w:commentReference w:id="0"/></w:r></w:p>"#,
            Some(
                r#"<w:comment w:id="0" w:author="Ann" w:initials="A" w:date="2024-01-02T03:04:05Z"><w:p><w:r><w:t>first</w:t></w:r></w:p><w:p><w:r><w:t>second</w:t></w:r></w:p></w:comment>"#,
            ),
        );
        let comment = doc.comment(0).unwrap();
        assert_eq!(comment.start, RunCursor::new(0, 1));
        assert_eq!(comment.end, RunCursor::new(0, 2));
        assert_eq!(comment.body, "first\nsecond");
        assert_eq!(comment.author.as_deref(), Some("Ann"));
        assert_eq!(comment.initials.as_deref(), Some("A"));
        assert_eq!(doc.paragraphs()[0].runs.len(), 2);
    }

    #[test]
    fn test_comment_across_paragraphs() {
        let doc = load(
            r#"<w:p><w:commentRangeStart w:id="5"/><w:r><w:t>one</w:t></w:r></w:p><w:p><w:r><w:t>two</w:t></w:r><w:commentRangeEnd w:id="5"/></w:p>"#,
            Some(r#"<w:comment w:id="5" w:author="Ann"><w:p><w:r><w:t>spans</w:t></w:r></w:p></w:comment>"#),
        );
        let comment = doc.comment(5).unwrap();
        assert_eq!(comment.start, RunCursor::new(0, 0));
        assert_eq!(comment.end, RunCursor::new(1, 1));
    }

    #[test]
    fn test_dangling_markers_are_dropped() {
        let doc = load(
            r#"<w:p><w:commentRangeStart w:id="1"/><w:r><w:t>x</w:t></w:r><w:commentRangeEnd w:id="2"/></w:p>"#,
            None,
        );
        assert_eq!(doc.comments().count(), 0);
        assert!(doc.warnings().contains(&LoadError::DanglingCommentAnchor {
            id: "2".to_string(),
            side: AnchorSide::End,
        }));
        assert!(doc.warnings().contains(&LoadError::DanglingCommentAnchor {
            id: "1".to_string(),
            side: AnchorSide::Start,
        }));
    }

    #[test]
    fn test_missing_body_keeps_empty_comment() {
        let doc = load(
            r#"<w:p><w:commentRangeStart w:id="9"/><w:r><w:t>x</w:t></w:r><w:commentRangeEnd w:id="9"/></w:p>"#,
            None,
        );
        assert_eq!(doc.comment(9).unwrap().body, "");
    }

    #[test]
    fn test_reference_only_comment_is_a_point() {
        let doc = load(
            r#"<w:p><w:r><w:t>ab</w:t></w:r><w:r><w:commentReference w:id="2"/></w:r><w:r><w:t>cd</w:t></w:r></w:p>"#,
            Some(r#"<w:comment w:id="2" w:author="Ann"><w:p><w:r><w:t>here</w:t></w:r></w:p></w:comment>"#),
        );
        let comment = doc.comment(2).unwrap();
        assert!(comment.is_empty());
        assert_eq!(comment.start, RunCursor::new(0, 1));
    }

    #[test]
    fn test_marker_after_last_paragraph_is_clamped() {
        let doc = load(
            r#"<w:p><w:commentRangeStart w:id="1"/><w:r><w:t>x</w:t></w:r></w:p><w:commentRangeEnd w:id="1"/>"#,
            None,
        );
        assert_eq!(doc.comment(1).unwrap().end, RunCursor::new(0, 1));
    }

    #[test]
    fn test_missing_body_is_fatal() {
        let package = Package::from_parts([(
            "word/document.xml",
            format!(r#"<w:document xmlns:w="{W_NS}"/>"#),
        )]);
        let err = PackageReader::default().load(&package).unwrap_err();
        assert!(err.is_fatal());
    }

    #[test]
    fn test_malformed_xml_is_fatal() {
        let package = Package::from_parts([("word/document.xml", "<w:document><w:body>")]);
        assert!(matches!(
            PackageReader::default().load(&package),
            Err(LoadError::MalformedPackage(_))
        ));
    }

    #[test]
    fn test_parse_date_forms() {
        assert!(parse_date("2024-01-15T10:30:00Z").is_some());
        assert!(parse_date("2024-01-15T10:30:00.123+02:00").is_some());
        assert!(parse_date("2024-01-15T10:30:00").is_some());
        assert!(parse_date("yesterday").is_none());
    }
}
