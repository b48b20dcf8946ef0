//! A small owned XML tree over `quick-xml`
//!
//! Package parts are read into [`XmlElement`] trees, edited in place and written
//! back. Names are kept qualified (`w:p`), namespace declarations are ordinary
//! attributes, and whitespace text is preserved so untouched markup survives a
//! read/write cycle.

use crate::error::{PackageError, Result};
use quick_xml::events::{BytesDecl, BytesEnd, BytesStart, BytesText, Event};
use quick_xml::{Reader, Writer};

/// A child of an element
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum XmlNode {
    Element(XmlElement),
    Text(String),
}

/// An element with its attributes in document order
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct XmlElement {
    pub name: String,
    pub attributes: Vec<(String, String)>,
    pub children: Vec<XmlNode>,
}

impl XmlElement {
    #[inline]
    #[must_use = "creates an element"]
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Self::default()
        }
    }

    /// Builder form of [`set_attr`](Self::set_attr)
    #[inline]
    #[must_use = "returns the element with the attribute set"]
    pub fn with_attr(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.set_attr(name, value);
        self
    }

    /// Builder form of [`push`](Self::push)
    #[inline]
    #[must_use = "returns the element with the child appended"]
    pub fn with_child(mut self, child: Self) -> Self {
        self.push(child);
        self
    }

    /// Builder form of [`push_text`](Self::push_text)
    #[inline]
    #[must_use = "returns the element with the text appended"]
    pub fn with_text(mut self, text: impl Into<String>) -> Self {
        self.push_text(text);
        self
    }

    #[inline]
    #[must_use = "returns the attribute value"]
    pub fn attr(&self, name: &str) -> Option<&str> {
        self.attributes
            .iter()
            .find(|(k, _)| k == name)
            .map(|(_, v)| v.as_str())
    }

    /// Set an attribute, replacing an existing value in place
    pub fn set_attr(&mut self, name: impl Into<String>, value: impl Into<String>) {
        let name = name.into();
        let value = value.into();
        match self.attributes.iter_mut().find(|(k, _)| *k == name) {
            Some(slot) => slot.1 = value,
            None => self.attributes.push((name, value)),
        }
    }

    #[inline]
    pub fn push(&mut self, child: Self) {
        self.children.push(XmlNode::Element(child));
    }

    #[inline]
    pub fn push_text(&mut self, text: impl Into<String>) {
        self.children.push(XmlNode::Text(text.into()));
    }

    /// Child elements, skipping text
    pub fn elements(&self) -> impl Iterator<Item = &Self> {
        self.children.iter().filter_map(|node| match node {
            XmlNode::Element(e) => Some(e),
            XmlNode::Text(_) => None,
        })
    }

    /// Child elements with a given qualified name
    pub fn children_named<'a>(&'a self, name: &'a str) -> impl Iterator<Item = &'a Self> + 'a {
        self.elements().filter(move |e| e.name == name)
    }

    #[must_use = "returns the first matching child"]
    pub fn child(&self, name: &str) -> Option<&Self> {
        self.elements().find(|e| e.name == name)
    }

    pub fn child_mut(&mut self, name: &str) -> Option<&mut Self> {
        self.children.iter_mut().find_map(|node| match node {
            XmlNode::Element(e) if e.name == name => Some(e),
            _ => None,
        })
    }

    /// Depth-first search over descendants, self excluded
    pub fn descendants(&self) -> Vec<&Self> {
        let mut out = Vec::new();
        let mut stack: Vec<&Self> = self.elements().collect();
        stack.reverse();
        while let Some(e) = stack.pop() {
            out.push(e);
            let mut children: Vec<&Self> = e.elements().collect();
            children.reverse();
            stack.extend(children);
        }
        out
    }

    /// Concatenated text of this element and its descendants
    #[must_use = "returns the text content"]
    pub fn text(&self) -> String {
        let mut text = String::new();
        collect_text(self, &mut text);
        text
    }

    fn write_to<W: std::io::Write>(&self, writer: &mut Writer<W>) -> Result<()> {
        let mut start = BytesStart::new(self.name.as_str());
        for (k, v) in &self.attributes {
            start.push_attribute((k.as_str(), v.as_str()));
        }
        if self.children.is_empty() {
            writer.write_event(Event::Empty(start))?;
            return Ok(());
        }
        writer.write_event(Event::Start(start))?;
        for child in &self.children {
            match child {
                XmlNode::Element(e) => e.write_to(writer)?,
                XmlNode::Text(t) => writer.write_event(Event::Text(BytesText::new(t)))?,
            }
        }
        writer.write_event(Event::End(BytesEnd::new(self.name.as_str())))?;
        Ok(())
    }
}

fn collect_text(element: &XmlElement, out: &mut String) {
    for child in &element.children {
        match child {
            XmlNode::Element(e) => collect_text(e, out),
            XmlNode::Text(t) => out.push_str(t),
        }
    }
}

/// A whole XML part: one root element
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct XmlDocument {
    pub root: XmlElement,
}

impl XmlDocument {
    #[inline]
    #[must_use = "creates an XML document"]
    pub const fn new(root: XmlElement) -> Self {
        Self { root }
    }

    /// Parse a part into a tree
    ///
    /// Comments, processing instructions and the doctype are dropped.
    ///
    /// # Errors
    ///
    /// Returns an error if the XML is malformed, end tags do not match, or
    /// there is no root element.
    pub fn parse(xml: &str) -> Result<Self> {
        let mut reader = Reader::from_str(xml);
        reader.trim_text(false);

        let mut stack: Vec<XmlElement> = Vec::new();
        let mut root: Option<XmlElement> = None;
        let mut buf = Vec::new();
        loop {
            match reader.read_event_into(&mut buf)? {
                Event::Start(e) => stack.push(element_from(&e)?),
                Event::Empty(e) => {
                    let element = element_from(&e)?;
                    attach(&mut stack, &mut root, element)?;
                }
                Event::End(_) => {
                    let element = stack.pop().ok_or_else(|| {
                        PackageError::InvalidStructure("unexpected end tag".to_string())
                    })?;
                    attach(&mut stack, &mut root, element)?;
                }
                Event::Text(e) => {
                    if let Some(parent) = stack.last_mut() {
                        parent.push_text(e.unescape()?.into_owned());
                    }
                }
                Event::CData(e) => {
                    if let Some(parent) = stack.last_mut() {
                        parent.push_text(String::from_utf8(e.into_inner().into_owned())?);
                    }
                }
                Event::Eof => break,
                Event::Decl(_) | Event::PI(_) | Event::Comment(_) | Event::DocType(_) => {}
            }
            buf.clear();
        }

        if let Some(open) = stack.last() {
            return Err(PackageError::InvalidStructure(format!(
                "element <{}> is never closed",
                open.name
            )));
        }
        root.map(Self::new)
            .ok_or_else(|| PackageError::InvalidStructure("no root element".to_string()))
    }

    /// Serialize with a standalone UTF-8 declaration
    ///
    /// # Errors
    ///
    /// Returns an error if writing an event fails.
    pub fn to_bytes(&self) -> Result<Vec<u8>> {
        let mut writer = Writer::new(Vec::new());
        writer.write_event(Event::Decl(BytesDecl::new("1.0", Some("UTF-8"), Some("yes"))))?;
        writer.write_event(Event::Text(BytesText::from_escaped("\r\n")))?;
        self.root.write_to(&mut writer)?;
        Ok(writer.into_inner())
    }
}

fn element_from(start: &BytesStart<'_>) -> Result<XmlElement> {
    let name = String::from_utf8(start.name().as_ref().to_vec())?;
    let mut element = XmlElement::new(name);
    for attr in start.attributes() {
        let attr = attr?;
        let key = String::from_utf8(attr.key.as_ref().to_vec())?;
        let value = attr.unescape_value()?.into_owned();
        element.attributes.push((key, value));
    }
    Ok(element)
}

fn attach(
    stack: &mut [XmlElement],
    root: &mut Option<XmlElement>,
    element: XmlElement,
) -> Result<()> {
    if let Some(parent) = stack.last_mut() {
        parent.push(element);
        return Ok(());
    }
    if root.is_some() {
        return Err(PackageError::InvalidStructure(format!(
            "second root element <{}>",
            element.name
        )));
    }
    *root = Some(element);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_tree() {
        let doc = XmlDocument::parse(
            r#"<?xml version="1.0"?><w:body><w:p w:rsidR="00A1"><w:r><w:t xml:space="preserve"> hi &amp; bye</w:t></w:r></w:p></w:body>"#,
        )
        .unwrap();
        assert_eq!(doc.root.name, "w:body");
        let p = doc.root.child("w:p").unwrap();
        assert_eq!(p.attr("w:rsidR"), Some("00A1"));
        assert_eq!(p.text(), " hi & bye");
        assert_eq!(doc.root.descendants().len(), 3);
    }

    #[test]
    fn test_write_then_parse_preserves_tree() {
        let root = XmlElement::new("w:document")
            .with_attr("xmlns:w", "urn:w")
            .with_child(
                XmlElement::new("w:t")
                    .with_attr("xml:space", "preserve")
                    .with_text("a < b \"quoted\""),
            )
            .with_child(XmlElement::new("w:tab"));
        let doc = XmlDocument::new(root);
        let bytes = doc.to_bytes().unwrap();
        let text = String::from_utf8(bytes).unwrap();
        assert!(text.starts_with("<?xml version=\"1.0\" encoding=\"UTF-8\" standalone=\"yes\"?>"));
        assert!(text.contains("<w:tab/>"));
        assert_eq!(XmlDocument::parse(&text).unwrap(), doc);
    }

    #[test]
    fn test_unclosed_element() {
        assert!(matches!(
            XmlDocument::parse("<a><b></b>"),
            Err(PackageError::InvalidStructure(_))
        ));
    }

    #[test]
    fn test_mismatched_end_tag() {
        assert!(XmlDocument::parse("<a><b></a></b>").is_err());
    }

    #[test]
    fn test_set_attr_replaces() {
        let mut e = XmlElement::new("w:comment").with_attr("w:id", "1");
        e.set_attr("w:id", "2");
        assert_eq!(e.attributes, vec![("w:id".to_string(), "2".to_string())]);
    }
}
