//! Fixture packages built in memory with `ZipWriter`

#![allow(dead_code)]

use redline_docx::Package;
use std::io::{Cursor, Write};
use zip::write::SimpleFileOptions;
use zip::ZipWriter;

pub const W_NS: &str = "http://schemas.openxmlformats.org/wordprocessingml/2006/main";

const CONTENT_TYPES: &str = r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>
<Types xmlns="http://schemas.openxmlformats.org/package/2006/content-types">
  <Default Extension="rels" ContentType="application/vnd.openxmlformats-package.relationships+xml"/>
  <Default Extension="xml" ContentType="application/xml"/>
  <Override PartName="/word/document.xml" ContentType="application/vnd.openxmlformats-officedocument.wordprocessingml.document.main+xml"/>
  <Override PartName="/word/styles.xml" ContentType="application/vnd.openxmlformats-officedocument.wordprocessingml.styles+xml"/>
  <Override PartName="/word/comments.xml" ContentType="application/vnd.openxmlformats-officedocument.wordprocessingml.comments+xml"/>
</Types>"#;

const PACKAGE_RELS: &str = r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>
<Relationships xmlns="http://schemas.openxmlformats.org/package/2006/relationships">
  <Relationship Id="rId1" Type="http://schemas.openxmlformats.org/officeDocument/2006/relationships/officeDocument" Target="word/document.xml"/>
</Relationships>"#;

const DOCUMENT_RELS: &str = r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>
<Relationships xmlns="http://schemas.openxmlformats.org/package/2006/relationships">
  <Relationship Id="rId1" Type="http://schemas.openxmlformats.org/officeDocument/2006/relationships/styles" Target="styles.xml"/>
  <Relationship Id="rId2" Type="http://schemas.openxmlformats.org/officeDocument/2006/relationships/comments" Target="comments.xml"/>
</Relationships>"#;

const STYLES: &str = r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>
<w:styles xmlns:w="http://schemas.openxmlformats.org/wordprocessingml/2006/main">
  <w:style w:type="paragraph" w:default="1" w:styleId="Normal"><w:name w:val="Normal"/></w:style>
</w:styles>"#;

fn document(body: &str) -> String {
    format!(
        r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>
<w:document xmlns:w="{W_NS}"><w:body>{body}<w:sectPr><w:pgSz w:w="12240" w:h="15840"/></w:sectPr></w:body></w:document>"#
    )
}

fn comments(entries: &str) -> String {
    format!(
        r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>
<w:comments xmlns:w="{W_NS}">{entries}</w:comments>"#
    )
}

/// Zip the given parts in order
pub fn zip_parts(parts: &[(&str, &str)]) -> Vec<u8> {
    let mut zip = ZipWriter::new(Cursor::new(Vec::new()));
    for (name, content) in parts {
        zip.start_file(*name, SimpleFileOptions::default()).unwrap();
        zip.write_all(content.as_bytes()).unwrap();
    }
    zip.finish().unwrap().into_inner()
}

/// A complete package with the given body and comment entries
pub fn docx_bytes(body: &str, comment_entries: &str) -> Vec<u8> {
    let document = document(body);
    let comments = comments(comment_entries);
    zip_parts(&[
        ("[Content_Types].xml", CONTENT_TYPES),
        ("_rels/.rels", PACKAGE_RELS),
        ("word/document.xml", &document),
        ("word/_rels/document.xml.rels", DOCUMENT_RELS),
        ("word/styles.xml", STYLES),
        ("word/comments.xml", &comments),
    ])
}

pub fn docx(body: &str, comment_entries: &str) -> Package {
    Package::from_reader(Cursor::new(docx_bytes(body, comment_entries))).unwrap()
}

/// An empty template, the way a word processor saves a blank document
pub fn template() -> Package {
    docx(r#"<w:p/>"#, "")
}

/// A document reviewed by two people
pub fn reviewed() -> Package {
    docx(
        r#"<w:p><w:r><w:t xml:space="preserve">The </w:t></w:r><w:del w:id="1" w:author="Alice" w:date="2024-02-01T10:00:00Z"><w:r><w:delText>quick</w:delText></w:r></w:del><w:ins w:id="2" w:author="Alice" w:date="2024-02-01T10:00:00Z"><w:r><w:t>slow</w:t></w:r></w:ins><w:r><w:t xml:space="preserve"> brown fox</w:t></w:r></w:p>
<w:p><w:commentRangeStart w:id="0"/><w:r><w:t>jumps</w:t></w:r><w:commentRangeEnd w:id="0"/><w:r><w:commentReference w:id="0"/></w:r><w:ins w:id="5" w:author="Bob"><w:r><w:t xml:space="preserve"> high</w:t></w:r><w:r><w:t xml:space="preserve">er</w:t></w:r></w:ins><w:del w:id="6" w:author="Bob"><w:r><w:delText xml:space="preserve"> over</w:delText></w:r></w:del></w:p>"#,
        r#"<w:comment w:id="0" w:author="Bob" w:date="2024-02-02T09:00:00Z" w:initials="B"><w:p><w:r><w:t>Is this right?</w:t></w:r></w:p></w:comment>"#,
    )
}
