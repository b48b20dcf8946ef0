//! Word-processing package container
//!
//! A package is a ZIP archive of named parts. Parts are kept as raw bytes in
//! archive order so that anything the reader and writer do not touch is written
//! back exactly as it was read.
//!
//! ## Parts this crate cares about
//! - `_rels/.rels` - package relationships, names the main document part
//! - `word/document.xml` - main document body (usual location)
//! - `word/_rels/document.xml.rels` - relationships of the main document
//! - `word/comments.xml` - comment bodies
//! - `[Content_Types].xml` - content type of every part

use crate::error::{PackageError, Result};
use crate::xml::XmlDocument;
use std::fs::File;
use std::io::{BufReader, Cursor, Read, Seek, Write};
use std::path::Path;
use zip::write::SimpleFileOptions;
use zip::{CompressionMethod, ZipArchive, ZipWriter};

/// Package relationships part
pub const PACKAGE_RELS: &str = "_rels/.rels";

/// Where the main document usually lives
pub const DEFAULT_DOCUMENT_PART: &str = "word/document.xml";

/// Content types part
pub const CONTENT_TYPES: &str = "[Content_Types].xml";

/// Relationship type of the main document
pub const REL_OFFICE_DOCUMENT: &str =
    "http://schemas.openxmlformats.org/officeDocument/2006/relationships/officeDocument";

/// Relationship type of the comments part
pub const REL_COMMENTS: &str =
    "http://schemas.openxmlformats.org/officeDocument/2006/relationships/comments";

/// An in-memory package with parts in archive order
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Package {
    parts: Vec<(String, Vec<u8>)>,
}

impl Package {
    /// Open a package from a path
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be opened or is not a ZIP archive.
    #[must_use = "this function returns a package that should be processed"]
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        log::debug!("opening package {}", path.display());
        let file = File::open(path)?;
        Self::from_reader(BufReader::new(file))
    }

    /// Read every file of a ZIP archive, skipping directory entries
    ///
    /// # Errors
    ///
    /// Returns an error if the content is not a valid ZIP archive or an entry
    /// cannot be read.
    #[must_use = "this function returns a package that should be processed"]
    pub fn from_reader<R: Read + Seek>(reader: R) -> Result<Self> {
        let mut archive = ZipArchive::new(reader)?;
        let mut parts = Vec::with_capacity(archive.len());
        for i in 0..archive.len() {
            let mut file = archive.by_index(i)?;
            if file.is_dir() {
                continue;
            }
            let name = file.name().to_string();
            let mut content = Vec::new();
            file.read_to_end(&mut content)?;
            parts.push((name, content));
        }
        log::debug!("read {} parts", parts.len());
        Ok(Self { parts })
    }

    /// Build a package from named parts, in the given order
    pub fn from_parts<I, N, B>(parts: I) -> Self
    where
        I: IntoIterator<Item = (N, B)>,
        N: Into<String>,
        B: Into<Vec<u8>>,
    {
        Self {
            parts: parts
                .into_iter()
                .map(|(n, b)| (n.into(), b.into()))
                .collect(),
        }
    }

    /// Part names in archive order
    pub fn part_names(&self) -> impl Iterator<Item = &str> {
        self.parts.iter().map(|(n, _)| n.as_str())
    }

    #[inline]
    #[must_use = "returns the part bytes"]
    pub fn part(&self, name: &str) -> Option<&[u8]> {
        self.parts
            .iter()
            .find(|(n, _)| n == name)
            .map(|(_, b)| b.as_slice())
    }

    #[inline]
    #[must_use = "checks whether the part exists"]
    pub fn contains(&self, name: &str) -> bool {
        self.part(name).is_some()
    }

    /// Parse a part as XML
    ///
    /// # Errors
    ///
    /// Returns `MissingPart` if the part is absent, or an error if it is not
    /// UTF-8 or not well-formed.
    pub fn xml_part(&self, name: &str) -> Result<XmlDocument> {
        let bytes = self
            .part(name)
            .ok_or_else(|| PackageError::MissingPart(name.to_string()))?;
        let text = String::from_utf8(bytes.to_vec())?;
        XmlDocument::parse(&text)
    }

    /// Replace a part in place, or append it if new
    pub fn set_part(&mut self, name: impl Into<String>, bytes: Vec<u8>) {
        let name = name.into();
        match self.parts.iter_mut().find(|(n, _)| *n == name) {
            Some(slot) => slot.1 = bytes,
            None => self.parts.push((name, bytes)),
        }
    }

    /// Serialize an XML tree into a part
    ///
    /// # Errors
    ///
    /// Returns an error if serialization fails.
    pub fn set_xml_part(&mut self, name: impl Into<String>, xml: &XmlDocument) -> Result<()> {
        self.set_part(name, xml.to_bytes()?);
        Ok(())
    }

    /// Path of the main document part
    ///
    /// Resolved through the package relationships, falling back to
    /// `word/document.xml` when there are none.
    ///
    /// # Errors
    ///
    /// Returns an error if the relationships part is malformed.
    pub fn main_document_path(&self) -> Result<String> {
        if !self.contains(PACKAGE_RELS) {
            return Ok(DEFAULT_DOCUMENT_PART.to_string());
        }
        Ok(self
            .related_part("", REL_OFFICE_DOCUMENT)?
            .unwrap_or_else(|| DEFAULT_DOCUMENT_PART.to_string()))
    }

    /// Target of the first relationship of `rel_type` declared by `source`
    ///
    /// `source` is a part name, or `""` for the package itself. Targets are
    /// resolved relative to the source's folder.
    ///
    /// # Errors
    ///
    /// Returns an error if the relationships part exists but is malformed.
    pub fn related_part(&self, source: &str, rel_type: &str) -> Result<Option<String>> {
        let rels_path = rels_path_for(source);
        if !self.contains(&rels_path) {
            return Ok(None);
        }
        let rels = self.xml_part(&rels_path)?;
        let target = rels
            .root
            .children_named("Relationship")
            .find(|r| r.attr("Type") == Some(rel_type))
            .and_then(|r| r.attr("Target"));
        Ok(target.map(|t| resolve_target(source, t)))
    }

    /// Serialize to ZIP bytes, parts in order, deflated
    ///
    /// # Errors
    ///
    /// Returns an error if writing the archive fails.
    pub fn to_bytes(&self) -> Result<Vec<u8>> {
        let mut zip = ZipWriter::new(Cursor::new(Vec::new()));
        let options = SimpleFileOptions::default().compression_method(CompressionMethod::Deflated);
        for (name, bytes) in &self.parts {
            zip.start_file(name.as_str(), options)?;
            zip.write_all(bytes)?;
        }
        Ok(zip.finish()?.into_inner())
    }

    /// Write the package to `path`, replacing it atomically
    ///
    /// The archive goes to a temporary file in the destination folder first,
    /// so a failed write never leaves a truncated package behind.
    ///
    /// # Errors
    ///
    /// Returns an error if serialization or any file operation fails.
    pub fn write<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let path = path.as_ref();
        let bytes = self.to_bytes()?;
        let dir = match path.parent() {
            Some(p) if !p.as_os_str().is_empty() => p,
            _ => Path::new("."),
        };
        let mut temp = tempfile::NamedTempFile::new_in(dir)?;
        temp.write_all(&bytes)?;
        temp.as_file().sync_all()?;
        temp.persist(path).map_err(|e| PackageError::Io(e.error))?;
        log::info!("wrote {} ({} bytes)", path.display(), bytes.len());
        Ok(())
    }
}

/// `word/document.xml` -> `word/_rels/document.xml.rels`, `""` -> `_rels/.rels`
#[must_use = "returns the relationships part name"]
pub fn rels_path_for(part: &str) -> String {
    match part.rsplit_once('/') {
        Some((dir, file)) => format!("{dir}/_rels/{file}.rels"),
        None if part.is_empty() => PACKAGE_RELS.to_string(),
        None => format!("_rels/{part}.rels"),
    }
}

/// Resolve a relationship target against its source part's folder
fn resolve_target(source: &str, target: &str) -> String {
    if let Some(absolute) = target.strip_prefix('/') {
        return absolute.to_string();
    }
    let mut segments: Vec<&str> = match source.rsplit_once('/') {
        Some((dir, _)) => dir.split('/').collect(),
        None => Vec::new(),
    };
    for segment in target.split('/') {
        match segment {
            "" | "." => {}
            ".." => {
                segments.pop();
            }
            s => segments.push(s),
        }
    }
    segments.join("/")
}
