//! A small owned XML tree built on quick-xml.
//!
//! Element and attribute names are kept exactly as written in the source
//! document, prefix included (`p:sp`, `r:embed`). OOXML producers use the
//! conventional prefixes, so lookups are done on qualified names.

use crate::{Error, Result};
use quick_xml::escape::escape;
use quick_xml::events::{BytesCData, BytesDecl, BytesEnd, BytesStart, BytesText, Event};
use quick_xml::{Reader, Writer};
use std::fmt;

/// A child node of an element.
#[derive(Debug, Clone, PartialEq)]
pub enum XmlNode {
    Element(XmlElement),
    Text(String),
    CData(String),
    Comment(String),
}

/// An element with its attributes and children, in document order.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct XmlElement {
    pub name: String,
    pub attributes: Vec<(String, String)>,
    pub children: Vec<XmlNode>,
}

/// A parsed XML part.
#[derive(Debug, Clone, PartialEq)]
pub struct XmlDocument {
    pub root: XmlElement,
}

impl XmlDocument {
    pub fn new(root: XmlElement) -> Self {
        Self { root }
    }

    /// Parse a UTF-8 XML document.
    pub fn parse(bytes: &[u8]) -> Result<Self> {
        let text = std::str::from_utf8(bytes)
            .map_err(|e| Error::XmlError(format!("Document is not UTF-8: {}", e)))?;
        let text = text.strip_prefix('\u{feff}').unwrap_or(text);

        let mut reader = Reader::from_str(text);
        reader.trim_text(false);

        let mut stack: Vec<XmlElement> = Vec::new();
        let mut root: Option<XmlElement> = None;

        loop {
            match reader.read_event() {
                Ok(Event::Start(ref e)) => {
                    stack.push(element_from_start(e)?);
                }
                Ok(Event::Empty(ref e)) => {
                    let element = element_from_start(e)?;
                    attach(&mut stack, &mut root, element)?;
                }
                Ok(Event::End(_)) => {
                    let element = stack
                        .pop()
                        .ok_or_else(|| Error::XmlError("Unbalanced end tag".to_string()))?;
                    attach(&mut stack, &mut root, element)?;
                }
                Ok(Event::Text(ref e)) => {
                    if let Some(parent) = stack.last_mut() {
                        let text = e
                            .unescape()
                            .map_err(|e| Error::XmlError(format!("Bad text content: {}", e)))?;
                        if !text.is_empty() {
                            parent.children.push(XmlNode::Text(text.into_owned()));
                        }
                    }
                }
                Ok(Event::CData(ref e)) => {
                    if let Some(parent) = stack.last_mut() {
                        let text = String::from_utf8_lossy(e).into_owned();
                        parent.children.push(XmlNode::CData(text));
                    }
                }
                Ok(Event::Comment(ref e)) => {
                    if let Some(parent) = stack.last_mut() {
                        let text = String::from_utf8_lossy(e).into_owned();
                        parent.children.push(XmlNode::Comment(text));
                    }
                }
                Ok(Event::Eof) => break,
                // Declaration, processing instructions and doctype are not kept;
                // a standard declaration is written back on save.
                Ok(_) => {}
                Err(e) => {
                    return Err(Error::XmlError(format!(
                        "Error at position {}: {}",
                        reader.buffer_position(),
                        e
                    )));
                }
            }
        }

        if !stack.is_empty() {
            return Err(Error::XmlError(format!(
                "Unclosed element <{}>",
                stack[stack.len() - 1].name
            )));
        }

        root.map(XmlDocument::new)
            .ok_or_else(|| Error::XmlError("Document has no root element".to_string()))
    }

    /// Serialize with a standalone UTF-8 declaration.
    pub fn to_bytes(&self) -> Result<Vec<u8>> {
        let mut writer = Writer::new(Vec::new());
        writer
            .write_event(Event::Decl(BytesDecl::new("1.0", Some("UTF-8"), Some("yes"))))
            .map_err(write_error)?;
        writer.get_mut().extend_from_slice(b"\r\n");
        write_element(&mut writer, &self.root)?;
        Ok(writer.into_inner())
    }
}

fn element_from_start(e: &BytesStart<'_>) -> Result<XmlElement> {
    let name = String::from_utf8_lossy(e.name().as_ref()).into_owned();
    let mut attributes = Vec::new();

    for attr in e.attributes() {
        let attr =
            attr.map_err(|err| Error::XmlError(format!("Bad attribute in <{}>: {}", name, err)))?;
        let key = String::from_utf8_lossy(attr.key.as_ref()).into_owned();
        let value = attr
            .unescape_value()
            .map_err(|err| Error::XmlError(format!("Bad attribute value in <{}>: {}", name, err)))?
            .into_owned();
        attributes.push((key, value));
    }

    Ok(XmlElement {
        name,
        attributes,
        children: Vec::new(),
    })
}

fn attach(
    stack: &mut [XmlElement],
    root: &mut Option<XmlElement>,
    element: XmlElement,
) -> Result<()> {
    if let Some(parent) = stack.last_mut() {
        parent.children.push(XmlNode::Element(element));
        Ok(())
    } else if root.is_none() {
        *root = Some(element);
        Ok(())
    } else {
        Err(Error::XmlError(format!(
            "Second root element <{}>",
            element.name
        )))
    }
}

fn write_element(writer: &mut Writer<Vec<u8>>, element: &XmlElement) -> Result<()> {
    let mut start = BytesStart::new(element.name.as_str());
    for (key, value) in &element.attributes {
        let value = escape_attribute(value);
        start.push_attribute((key.as_bytes(), value.as_bytes()));
    }

    if element.children.is_empty() {
        return writer.write_event(Event::Empty(start)).map_err(write_error);
    }

    writer.write_event(Event::Start(start)).map_err(write_error)?;
    for child in &element.children {
        match child {
            XmlNode::Element(el) => write_element(writer, el)?,
            XmlNode::Text(text) => writer
                .write_event(Event::Text(BytesText::new(text)))
                .map_err(write_error)?,
            XmlNode::CData(text) => writer
                .write_event(Event::CData(BytesCData::new(text.as_str())))
                .map_err(write_error)?,
            XmlNode::Comment(text) => writer
                .write_event(Event::Comment(BytesText::from_escaped(text.as_str())))
                .map_err(write_error)?,
        }
    }
    writer
        .write_event(Event::End(BytesEnd::new(element.name.as_str())))
        .map_err(write_error)
}

/// Escape an attribute value, writing whitespace other than spaces as
/// character references so attribute normalization keeps it.
fn escape_attribute(value: &str) -> String {
    let escaped = escape(value);
    let mut out = String::with_capacity(escaped.len());
    for c in escaped.chars() {
        match c {
            '\n' => out.push_str("&#10;"),
            '\r' => out.push_str("&#13;"),
            '\t' => out.push_str("&#9;"),
            _ => out.push(c),
        }
    }
    out
}

fn write_error<E: fmt::Display>(e: E) -> Error {
    Error::XmlError(format!("Failed to write XML: {}", e))
}

impl XmlElement {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            attributes: Vec::new(),
            children: Vec::new(),
        }
    }

    pub fn with_attr(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.set_attr(key, value);
        self
    }

    pub fn with_child(mut self, child: XmlElement) -> Self {
        self.children.push(XmlNode::Element(child));
        self
    }

    pub fn with_text(mut self, text: impl Into<String>) -> Self {
        self.set_text(text);
        self
    }

    /// Name without its namespace prefix.
    pub fn local_name(&self) -> &str {
        local_name(&self.name)
    }

    pub fn attr(&self, key: &str) -> Option<&str> {
        self.attributes
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.as_str())
    }

    pub fn set_attr(&mut self, key: impl Into<String>, value: impl Into<String>) {
        let key = key.into();
        let value = value.into();
        match self.attributes.iter_mut().find(|(k, _)| *k == key) {
            Some(slot) => slot.1 = value,
            None => self.attributes.push((key, value)),
        }
    }

    pub fn remove_attr(&mut self, key: &str) -> Option<String> {
        let pos = self.attributes.iter().position(|(k, _)| k == key)?;
        Some(self.attributes.remove(pos).1)
    }

    /// Child elements, skipping text and comments.
    pub fn elements(&self) -> impl Iterator<Item = &XmlElement> {
        self.children.iter().filter_map(|node| match node {
            XmlNode::Element(el) => Some(el),
            _ => None,
        })
    }

    pub fn elements_mut(&mut self) -> impl Iterator<Item = &mut XmlElement> {
        self.children.iter_mut().filter_map(|node| match node {
            XmlNode::Element(el) => Some(el),
            _ => None,
        })
    }

    pub fn child(&self, name: &str) -> Option<&XmlElement> {
        self.elements().find(|el| el.name == name)
    }

    pub fn child_mut(&mut self, name: &str) -> Option<&mut XmlElement> {
        self.elements_mut().find(|el| el.name == name)
    }

    pub fn children_named<'a>(&'a self, name: &'a str) -> impl Iterator<Item = &'a XmlElement> {
        self.elements().filter(move |el| el.name == name)
    }

    /// Follow a chain of child names.
    pub fn path(&self, names: &[&str]) -> Option<&XmlElement> {
        let mut current = self;
        for name in names {
            current = current.child(name)?;
        }
        Some(current)
    }

    pub fn path_mut(&mut self, names: &[&str]) -> Option<&mut XmlElement> {
        let mut current = self;
        for name in names {
            current = current.child_mut(name)?;
        }
        Some(current)
    }

    /// Index in `children` of the first element with this name.
    pub fn position(&self, name: &str) -> Option<usize> {
        self.children
            .iter()
            .position(|node| matches!(node, XmlNode::Element(el) if el.name == name))
    }

    /// The element stored at `children[index]`.
    pub fn element_at_mut(&mut self, index: usize) -> Option<&mut XmlElement> {
        match self.children.get_mut(index) {
            Some(XmlNode::Element(el)) => Some(el),
            _ => None,
        }
    }

    /// Existing child with this name, or a new one inserted as the first child.
    pub fn get_or_insert_first(&mut self, name: &str) -> &mut XmlElement {
        let index = match self.position(name) {
            Some(index) => index,
            None => {
                self.children.insert(0, XmlNode::Element(XmlElement::new(name)));
                0
            }
        };
        match &mut self.children[index] {
            XmlNode::Element(el) => el,
            _ => unreachable!("position() only yields element indices"),
        }
    }

    /// Existing child with this name, or a new one appended.
    pub fn get_or_append(&mut self, name: &str) -> &mut XmlElement {
        let index = match self.position(name) {
            Some(index) => index,
            None => {
                self.children.push(XmlNode::Element(XmlElement::new(name)));
                self.children.len() - 1
            }
        };
        match &mut self.children[index] {
            XmlNode::Element(el) => el,
            _ => unreachable!("position() only yields element indices"),
        }
    }

    pub fn push_element(&mut self, element: XmlElement) {
        self.children.push(XmlNode::Element(element));
    }

    /// Insert before the first child named `before`, or append if there is none.
    pub fn insert_before(&mut self, element: XmlElement, before: &str) {
        match self.position(before) {
            Some(index) => self.children.insert(index, XmlNode::Element(element)),
            None => self.children.push(XmlNode::Element(element)),
        }
    }

    /// Insert after the last child named `after`, or append if there is none.
    pub fn insert_after_last(&mut self, after: &str, element: XmlElement) {
        let last = self
            .children
            .iter()
            .rposition(|node| matches!(node, XmlNode::Element(el) if el.name == after));
        match last {
            Some(index) => self.children.insert(index + 1, XmlNode::Element(element)),
            None => self.children.push(XmlNode::Element(element)),
        }
    }

    /// Remove direct children with this name, returning how many were removed.
    pub fn remove_children(&mut self, name: &str) -> usize {
        let before = self.children.len();
        self.children
            .retain(|node| !matches!(node, XmlNode::Element(el) if el.name == name));
        before - self.children.len()
    }

    /// Remove every descendant element matching `pred`.
    pub fn remove_descendants<F>(&mut self, pred: &mut F) -> usize
    where
        F: FnMut(&XmlElement) -> bool,
    {
        let before = self.children.len();
        self.children
            .retain(|node| !matches!(node, XmlNode::Element(el) if pred(el)));
        let mut removed = before - self.children.len();
        for el in self.elements_mut() {
            removed += el.remove_descendants(pred);
        }
        removed
    }

    /// Depth-first iterator over descendant elements, excluding `self`.
    pub fn descendants(&self) -> Descendants<'_> {
        Descendants {
            stack: vec![self.children.iter()],
        }
    }

    /// First descendant element with this name.
    pub fn find(&self, name: &str) -> Option<&XmlElement> {
        self.descendants().find(|el| el.name == name)
    }

    pub fn find_mut(&mut self, name: &str) -> Option<&mut XmlElement> {
        for el in self.elements_mut() {
            if el.name == name {
                return Some(el);
            }
            if let Some(found) = el.find_mut(name) {
                return Some(found);
            }
        }
        None
    }

    /// Visit `self` and every descendant element, parents first.
    pub fn walk_mut<F>(&mut self, f: &mut F)
    where
        F: FnMut(&mut XmlElement),
    {
        f(self);
        for el in self.elements_mut() {
            el.walk_mut(f);
        }
    }

    /// Concatenated direct text content.
    pub fn text(&self) -> String {
        let mut out = String::new();
        for node in &self.children {
            match node {
                XmlNode::Text(t) | XmlNode::CData(t) => out.push_str(t),
                _ => {}
            }
        }
        out
    }

    /// Replace all children with a single text node.
    pub fn set_text(&mut self, text: impl Into<String>) {
        let text = text.into();
        self.children.clear();
        if !text.is_empty() {
            self.children.push(XmlNode::Text(text));
        }
    }
}

/// Iterator returned by [`XmlElement::descendants`].
pub struct Descendants<'a> {
    stack: Vec<std::slice::Iter<'a, XmlNode>>,
}

impl<'a> Iterator for Descendants<'a> {
    type Item = &'a XmlElement;

    fn next(&mut self) -> Option<&'a XmlElement> {
        loop {
            let iter = self.stack.last_mut()?;
            match iter.next() {
                Some(XmlNode::Element(el)) => {
                    self.stack.push(el.children.iter());
                    return Some(el);
                }
                Some(_) => continue,
                None => {
                    self.stack.pop();
                }
            }
        }
    }
}

/// Extract the local name from a potentially namespaced XML name.
pub fn local_name(name: &str) -> &str {
    match name.find(':') {
        Some(pos) => &name[pos + 1..],
        None => name,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>
<p:sld xmlns:a="http://schemas.openxmlformats.org/drawingml/2006/main" xmlns:p="http://schemas.openxmlformats.org/presentationml/2006/main"><p:cSld><p:spTree><p:sp><p:txBody><a:p><a:r><a:t>Fish &amp; chips</a:t></a:r><a:r><a:t xml:space="preserve"> two </a:t></a:r></a:p></p:txBody></p:sp><p:extLst/></p:spTree></p:cSld></p:sld>"#;

    #[test]
    fn test_local_name() {
        assert_eq!(local_name("p:sp"), "sp");
        assert_eq!(local_name("a:t"), "t");
        assert_eq!(local_name("sp"), "sp");
    }

    #[test]
    fn test_parse_keeps_text_and_whitespace() {
        let doc = XmlDocument::parse(SAMPLE.as_bytes()).unwrap();
        assert_eq!(doc.root.name, "p:sld");
        let texts: Vec<String> = doc
            .root
            .descendants()
            .filter(|el| el.name == "a:t")
            .map(|el| el.text())
            .collect();
        assert_eq!(texts, vec!["Fish & chips".to_string(), " two ".to_string()]);
    }

    #[test]
    fn test_write_then_parse_is_stable() {
        let doc = XmlDocument::parse(SAMPLE.as_bytes()).unwrap();
        let bytes = doc.to_bytes().unwrap();
        let written = String::from_utf8(bytes.clone()).unwrap();
        assert!(written.starts_with("<?xml version=\"1.0\" encoding=\"UTF-8\" standalone=\"yes\"?>"));
        assert!(written.contains("Fish &amp; chips"));
        assert!(written.contains("<p:extLst/>"));
        assert_eq!(XmlDocument::parse(&bytes).unwrap(), doc);
    }

    #[test]
    fn test_attribute_whitespace_survives_write() {
        let doc = XmlDocument::parse(br#"<p:cNvPr descr="one&#xA;two&#9;x &amp; &quot;y&quot;"/>"#).unwrap();
        assert_eq!(doc.root.attr("descr"), Some("one\ntwo\tx & \"y\""));

        let bytes = doc.to_bytes().unwrap();
        let text = String::from_utf8(bytes.clone()).unwrap();
        assert!(text.contains("one&#10;two&#9;x &amp; &quot;y&quot;"), "{}", text);
        assert_eq!(XmlDocument::parse(&bytes).unwrap(), doc);
    }

    #[test]
    fn test_insert_before_and_get_or_insert_first() {
        let mut doc = XmlDocument::parse(SAMPLE.as_bytes()).unwrap();
        let tree = doc.root.path_mut(&["p:cSld", "p:spTree"]).unwrap();
        tree.insert_before(XmlElement::new("p:pic"), "p:extLst");
        let names: Vec<&str> = tree.elements().map(|el| el.name.as_str()).collect();
        assert_eq!(names, vec!["p:sp", "p:pic", "p:extLst"]);

        let paragraph = doc.root.find_mut("a:p").unwrap();
        paragraph.get_or_insert_first("a:pPr").set_attr("lvl", "1");
        assert_eq!(paragraph.elements().next().unwrap().name, "a:pPr");
        assert_eq!(paragraph.child("a:pPr").unwrap().attr("lvl"), Some("1"));
    }

    #[test]
    fn test_insert_after_last() {
        let mut body = XmlElement::new("p:txBody")
            .with_child(XmlElement::new("a:bodyPr"))
            .with_child(XmlElement::new("a:p").with_attr("n", "1"))
            .with_child(XmlElement::new("a:p").with_attr("n", "2"))
            .with_child(XmlElement::new("a:extLst"));
        body.insert_after_last("a:p", XmlElement::new("a:p").with_attr("n", "3"));
        let order: Vec<Option<&str>> = body.elements().map(|el| el.attr("n")).collect();
        assert_eq!(order, vec![None, Some("1"), Some("2"), Some("3"), None]);
    }

    #[test]
    fn test_remove_descendants() {
        let mut doc = XmlDocument::parse(SAMPLE.as_bytes()).unwrap();
        let removed = doc.root.remove_descendants(&mut |el| el.name == "a:r");
        assert_eq!(removed, 2);
        assert!(doc.root.find("a:t").is_none());
    }

    #[test]
    fn test_reject_garbage() {
        assert!(XmlDocument::parse(b"<a><b></a>").is_err());
        assert!(XmlDocument::parse(b"").is_err());
    }
}
