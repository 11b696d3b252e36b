//! OPC package: the ZIP container, its content types and relationship parts.
//!
//! Part names are stored without a leading slash (`ppt/slides/slide1.xml`).
//! The package root is addressed by the empty part name.

use deck_core::{Error, Result, XmlDocument, XmlElement};
use quick_xml::events::Event;
use quick_xml::Reader;
use std::collections::{BTreeMap, HashSet};
use std::io::{Read, Seek, Write};
use zip::write::FileOptions;
use zip::{CompressionMethod, ZipArchive, ZipWriter};

pub const CONTENT_TYPES_PART: &str = "[Content_Types].xml";

const CONTENT_TYPES_NS: &str = "http://schemas.openxmlformats.org/package/2006/content-types";
const RELATIONSHIPS_NS: &str = "http://schemas.openxmlformats.org/package/2006/relationships";

/// Relationship type URIs.
pub mod rel_type {
    pub const OFFICE_DOCUMENT: &str =
        "http://schemas.openxmlformats.org/officeDocument/2006/relationships/officeDocument";
    pub const SLIDE: &str = "http://schemas.openxmlformats.org/officeDocument/2006/relationships/slide";
    pub const SLIDE_LAYOUT: &str =
        "http://schemas.openxmlformats.org/officeDocument/2006/relationships/slideLayout";
    pub const SLIDE_MASTER: &str =
        "http://schemas.openxmlformats.org/officeDocument/2006/relationships/slideMaster";
    pub const NOTES_SLIDE: &str =
        "http://schemas.openxmlformats.org/officeDocument/2006/relationships/notesSlide";
    pub const NOTES_MASTER: &str =
        "http://schemas.openxmlformats.org/officeDocument/2006/relationships/notesMaster";
    pub const IMAGE: &str = "http://schemas.openxmlformats.org/officeDocument/2006/relationships/image";
    pub const HYPERLINK: &str =
        "http://schemas.openxmlformats.org/officeDocument/2006/relationships/hyperlink";
    pub const THEME: &str = "http://schemas.openxmlformats.org/officeDocument/2006/relationships/theme";
}

/// Content type strings.
pub mod content_type {
    pub const PRESENTATION: &str =
        "application/vnd.openxmlformats-officedocument.presentationml.presentation.main+xml";
    pub const SLIDE: &str = "application/vnd.openxmlformats-officedocument.presentationml.slide+xml";
    pub const SLIDE_LAYOUT: &str =
        "application/vnd.openxmlformats-officedocument.presentationml.slideLayout+xml";
    pub const SLIDE_MASTER: &str =
        "application/vnd.openxmlformats-officedocument.presentationml.slideMaster+xml";
    pub const NOTES_SLIDE: &str =
        "application/vnd.openxmlformats-officedocument.presentationml.notesSlide+xml";
    pub const NOTES_MASTER: &str =
        "application/vnd.openxmlformats-officedocument.presentationml.notesMaster+xml";
    pub const THEME: &str = "application/vnd.openxmlformats-officedocument.theme+xml";
    pub const RELATIONSHIPS: &str = "application/vnd.openxmlformats-package.relationships+xml";
    pub const XML: &str = "application/xml";
}

/// One entry of a relationships part.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Relationship {
    pub id: String,
    pub rel_type: String,
    /// Target as written: relative to the source part, or a URL when external.
    pub target: String,
    pub external: bool,
}

/// The relationships of one source part.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Relationships {
    rels: Vec<Relationship>,
}

impl Relationships {
    pub fn new() -> Self {
        Self::default()
    }

    /// Parse a `.rels` part.
    pub fn parse(xml: &[u8]) -> Result<Self> {
        let text = String::from_utf8_lossy(xml);
        let mut reader = Reader::from_str(&text);
        reader.trim_text(true);

        let mut rels = Vec::new();
        loop {
            match reader.read_event() {
                Ok(Event::Empty(ref e)) | Ok(Event::Start(ref e))
                    if e.name().as_ref() == b"Relationship" =>
                {
                    let mut rel = Relationship {
                        id: String::new(),
                        rel_type: String::new(),
                        target: String::new(),
                        external: false,
                    };

                    for attr in e.attributes().flatten() {
                        let value = attr
                            .unescape_value()
                            .map_err(|e| Error::XmlError(format!("Bad relationship attribute: {}", e)))?
                            .into_owned();
                        match attr.key.as_ref() {
                            b"Id" => rel.id = value,
                            b"Type" => rel.rel_type = value,
                            b"Target" => rel.target = value,
                            b"TargetMode" => rel.external = value == "External",
                            _ => {}
                        }
                    }

                    if rel.id.is_empty() {
                        log::warn!("Ignoring relationship without Id (target '{}')", rel.target);
                    } else {
                        rels.push(rel);
                    }
                }
                Ok(Event::Eof) => break,
                Err(e) => {
                    return Err(Error::XmlError(format!(
                        "Error parsing relationships: {}",
                        e
                    )));
                }
                _ => {}
            }
        }

        Ok(Self { rels })
    }

    pub fn to_bytes(&self) -> Result<Vec<u8>> {
        let mut root = XmlElement::new("Relationships").with_attr("xmlns", RELATIONSHIPS_NS);
        for rel in &self.rels {
            let mut el = XmlElement::new("Relationship")
                .with_attr("Id", rel.id.as_str())
                .with_attr("Type", rel.rel_type.as_str())
                .with_attr("Target", rel.target.as_str());
            if rel.external {
                el.set_attr("TargetMode", "External");
            }
            root.push_element(el);
        }
        XmlDocument::new(root).to_bytes()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Relationship> {
        self.rels.iter()
    }

    pub fn len(&self) -> usize {
        self.rels.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rels.is_empty()
    }

    pub fn get(&self, id: &str) -> Option<&Relationship> {
        self.rels.iter().find(|r| r.id == id)
    }

    /// First relationship of the given type.
    pub fn by_type(&self, rel_type: &str) -> Option<&Relationship> {
        self.rels.iter().find(|r| r.rel_type == rel_type)
    }

    /// The lowest `rIdN` not in use.
    pub fn next_id(&self) -> String {
        let used: HashSet<&str> = self.rels.iter().map(|r| r.id.as_str()).collect();
        (1..)
            .map(|n| format!("rId{}", n))
            .find(|id| !used.contains(id.as_str()))
            .unwrap_or_else(|| format!("rId{}", self.rels.len() + 1))
    }

    /// Add a relationship, returning its id.
    pub fn add(&mut self, rel_type: &str, target: &str, external: bool) -> String {
        let id = self.next_id();
        self.rels.push(Relationship {
            id: id.clone(),
            rel_type: rel_type.to_string(),
            target: target.to_string(),
            external,
        });
        id
    }

    /// Id of an equivalent existing relationship, or of a newly added one.
    pub fn relate_to(&mut self, rel_type: &str, target: &str, external: bool) -> String {
        if let Some(existing) = self
            .rels
            .iter()
            .find(|r| r.rel_type == rel_type && r.target == target && r.external == external)
        {
            return existing.id.clone();
        }
        self.add(rel_type, target, external)
    }

    pub fn remove(&mut self, id: &str) -> Option<Relationship> {
        let pos = self.rels.iter().position(|r| r.id == id)?;
        Some(self.rels.remove(pos))
    }
}

/// `[Content_Types].xml`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ContentTypes {
    defaults: Vec<(String, String)>,
    overrides: Vec<(String, String)>,
}

impl ContentTypes {
    pub fn parse(xml: &[u8]) -> Result<Self> {
        let doc = XmlDocument::parse(xml)?;
        let mut types = ContentTypes::default();
        for el in doc.root.elements() {
            match (el.local_name(), el.attr("ContentType")) {
                ("Default", Some(ct)) => {
                    if let Some(ext) = el.attr("Extension") {
                        types.defaults.push((ext.to_string(), ct.to_string()));
                    }
                }
                ("Override", Some(ct)) => {
                    if let Some(part) = el.attr("PartName") {
                        types.overrides.push((part.to_string(), ct.to_string()));
                    }
                }
                _ => {}
            }
        }
        Ok(types)
    }

    pub fn to_bytes(&self) -> Result<Vec<u8>> {
        let mut root = XmlElement::new("Types").with_attr("xmlns", CONTENT_TYPES_NS);
        for (ext, ct) in &self.defaults {
            root.push_element(
                XmlElement::new("Default")
                    .with_attr("Extension", ext.as_str())
                    .with_attr("ContentType", ct.as_str()),
            );
        }
        for (part, ct) in &self.overrides {
            root.push_element(
                XmlElement::new("Override")
                    .with_attr("PartName", part.as_str())
                    .with_attr("ContentType", ct.as_str()),
            );
        }
        XmlDocument::new(root).to_bytes()
    }

    /// Content type of a part: its override, else the default for its extension.
    pub fn content_type(&self, part: &str) -> Option<&str> {
        let part_name = format!("/{}", part);
        if let Some((_, ct)) = self
            .overrides
            .iter()
            .find(|(p, _)| p.eq_ignore_ascii_case(&part_name))
        {
            return Some(ct);
        }
        let ext = part.rsplit_once('.').map(|(_, ext)| ext)?;
        self.defaults
            .iter()
            .find(|(e, _)| e.eq_ignore_ascii_case(ext))
            .map(|(_, ct)| ct.as_str())
    }

    pub fn set_override(&mut self, part: &str, content_type: &str) {
        let part_name = format!("/{}", part);
        match self
            .overrides
            .iter_mut()
            .find(|(p, _)| p.eq_ignore_ascii_case(&part_name))
        {
            Some(slot) => slot.1 = content_type.to_string(),
            None => self.overrides.push((part_name, content_type.to_string())),
        }
    }

    pub fn remove_override(&mut self, part: &str) {
        let part_name = format!("/{}", part);
        self.overrides
            .retain(|(p, _)| !p.eq_ignore_ascii_case(&part_name));
    }

    /// Register a default for `ext` unless one exists.
    pub fn ensure_default(&mut self, ext: &str, content_type: &str) {
        if !self.defaults.iter().any(|(e, _)| e.eq_ignore_ascii_case(ext)) {
            self.defaults
                .push((ext.to_string(), content_type.to_string()));
        }
    }
}

/// An OPC package held in memory.
#[derive(Debug, Clone)]
pub struct Package {
    parts: BTreeMap<String, Vec<u8>>,
    content_types: ContentTypes,
}

impl Package {
    /// Read every member of a ZIP container.
    pub fn from_reader<R: Read + Seek>(reader: R) -> Result<Self> {
        let mut archive = ZipArchive::new(reader)
            .map_err(|e| Error::ZipError(format!("Failed to open ZIP: {}", e)))?;

        let mut parts = BTreeMap::new();
        let mut content_types = None;

        for i in 0..archive.len() {
            let mut file = archive
                .by_index(i)
                .map_err(|e| Error::ZipError(format!("Failed to read entry {}: {}", i, e)))?;
            if file.is_dir() {
                continue;
            }
            let name = file.name().trim_start_matches('/').to_string();
            let mut data = Vec::new();
            file.read_to_end(&mut data)
                .map_err(|e| Error::ZipError(format!("Failed to read '{}': {}", name, e)))?;

            if name == CONTENT_TYPES_PART {
                content_types = Some(ContentTypes::parse(&data)?);
            } else {
                parts.insert(name, data);
            }
        }

        let content_types = content_types.ok_or_else(|| {
            Error::CorruptedFile(format!("Package has no {}", CONTENT_TYPES_PART))
        })?;

        Ok(Self {
            parts,
            content_types,
        })
    }

    pub fn part(&self, name: &str) -> Option<&[u8]> {
        self.parts.get(name).map(Vec::as_slice)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.parts.contains_key(name)
    }

    pub fn part_names(&self) -> impl Iterator<Item = &str> {
        self.parts.keys().map(String::as_str)
    }

    pub fn set_part(&mut self, name: impl Into<String>, data: Vec<u8>) {
        self.parts.insert(name.into(), data);
    }

    pub fn content_types(&self) -> &ContentTypes {
        &self.content_types
    }

    pub fn content_types_mut(&mut self) -> &mut ContentTypes {
        &mut self.content_types
    }

    /// Parse an XML part.
    pub fn xml_part(&self, name: &str) -> Result<XmlDocument> {
        let data = self
            .part(name)
            .ok_or_else(|| Error::PptxParseError(format!("Missing part '{}'", name)))?;
        XmlDocument::parse(data)
            .map_err(|e| Error::PptxParseError(format!("Bad XML in '{}': {}", name, e)))
    }

    /// Relationships of a part; empty when it has no relationships part.
    pub fn rels_for(&self, name: &str) -> Result<Relationships> {
        match self.part(&rels_path(name)) {
            Some(data) => Relationships::parse(data),
            None => Ok(Relationships::new()),
        }
    }

    pub fn set_rels(&mut self, name: &str, rels: &Relationships) -> Result<()> {
        let path = rels_path(name);
        if rels.is_empty() {
            self.parts.remove(&path);
        } else {
            self.parts.insert(path, rels.to_bytes()?);
        }
        Ok(())
    }

    /// First free part name of the form `{prefix}{N}{suffix}`, N from 1.
    ///
    /// A number counts as taken whatever the extension, so `image1.png`
    /// blocks `image1.jpeg`.
    pub fn next_partname(&self, prefix: &str, suffix: &str) -> String {
        let n = (1..)
            .find(|n| {
                let stem = format!("{}{}.", prefix, n);
                !self.parts.keys().any(|k| k.starts_with(&stem))
            })
            .unwrap_or(1);
        format!("{}{}{}", prefix, n, suffix)
    }

    /// Drop parts that cannot be reached through relationships from the
    /// package root, along with their relationship parts and overrides.
    pub fn prune_unreachable(&mut self) -> Result<usize> {
        let mut reachable: HashSet<String> = HashSet::new();
        let mut queue = vec![String::new()];

        while let Some(source) = queue.pop() {
            let rels = self.rels_for(&source)?;
            for rel in rels.iter().filter(|r| !r.external) {
                let target = resolve_target(&source, &rel.target);
                if self.parts.contains_key(&target) && reachable.insert(target.clone()) {
                    queue.push(target);
                }
            }
        }

        let doomed: Vec<String> = self
            .parts
            .keys()
            .filter(|name| !is_rels_part(name) && !reachable.contains(name.as_str()))
            .cloned()
            .collect();

        for name in &doomed {
            log::debug!("Dropping unreachable part {}", name);
            self.parts.remove(name);
            self.content_types.remove_override(name);
        }

        let orphan_rels: Vec<String> = self
            .parts
            .keys()
            .filter(|name| match rels_source(name) {
                Some(source) => !source.is_empty() && !self.parts.contains_key(&source),
                None => false,
            })
            .cloned()
            .collect();
        for name in &orphan_rels {
            self.parts.remove(name);
        }

        Ok(doomed.len())
    }

    /// Write the package as a ZIP container, pruning unreachable parts first.
    pub fn write_to<W: Write + Seek>(&mut self, writer: W) -> Result<W> {
        let pruned = self.prune_unreachable()?;
        if pruned > 0 {
            log::debug!("Pruned {} unreachable parts", pruned);
        }

        let mut zip = ZipWriter::new(writer);
        let options = FileOptions::default().compression_method(CompressionMethod::Deflated);

        zip.start_file(CONTENT_TYPES_PART, options)
            .map_err(|e| Error::ZipError(format!("Failed to start '{}': {}", CONTENT_TYPES_PART, e)))?;
        zip.write_all(&self.content_types.to_bytes()?)?;

        for (name, data) in &self.parts {
            zip.start_file(name.as_str(), options)
                .map_err(|e| Error::ZipError(format!("Failed to start '{}': {}", name, e)))?;
            zip.write_all(data)?;
        }

        zip.finish()
            .map_err(|e| Error::ZipError(format!("Failed to finish ZIP: {}", e)))
    }
}

/// Directory of a part name (`ppt/slides` for `ppt/slides/slide1.xml`).
pub fn base_dir(part: &str) -> &str {
    match part.rfind('/') {
        Some(pos) => &part[..pos],
        None => "",
    }
}

/// Relationships part of a part (`_rels/.rels` for the package root).
pub fn rels_path(part: &str) -> String {
    match part.rfind('/') {
        Some(pos) => format!("{}/_rels/{}.rels", &part[..pos], &part[pos + 1..]),
        None => format!("_rels/{}.rels", part),
    }
}

fn is_rels_part(name: &str) -> bool {
    rels_source(name).is_some()
}

/// Source part of a relationships part name.
fn rels_source(name: &str) -> Option<String> {
    let stem = name.strip_suffix(".rels")?;
    let (dir, file) = match stem.rfind('/') {
        Some(pos) => (&stem[..pos], &stem[pos + 1..]),
        None => ("", stem),
    };
    let parent = match dir.strip_suffix("_rels") {
        Some(parent) => parent.trim_end_matches('/'),
        None => return None,
    };
    if parent.is_empty() {
        Some(file.to_string())
    } else {
        Some(format!("{}/{}", parent, file))
    }
}

/// Resolve a relationship target against its source part.
pub fn resolve_target(source: &str, target: &str) -> String {
    if let Some(absolute) = target.strip_prefix('/') {
        return normalize_path(absolute);
    }
    let base = base_dir(source);
    if base.is_empty() {
        normalize_path(target)
    } else {
        normalize_path(&format!("{}/{}", base, target))
    }
}

/// Relative reference from `source`'s directory to `target`.
pub fn relative_target(source: &str, target: &str) -> String {
    let base: Vec<&str> = base_dir(source).split('/').filter(|s| !s.is_empty()).collect();
    let target: Vec<&str> = target.split('/').collect();

    let common = base
        .iter()
        .zip(target.iter())
        .take_while(|(a, b)| a == b)
        .count()
        .min(target.len().saturating_sub(1));

    let mut segments: Vec<&str> = vec![".."; base.len() - common];
    segments.extend_from_slice(&target[common..]);
    segments.join("/")
}

fn normalize_path(path: &str) -> String {
    let mut segments: Vec<&str> = Vec::new();
    for segment in path.split('/') {
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

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rels_path() {
        assert_eq!(rels_path("ppt/slides/slide1.xml"), "ppt/slides/_rels/slide1.xml.rels");
        assert_eq!(rels_path("ppt/presentation.xml"), "ppt/_rels/presentation.xml.rels");
        assert_eq!(rels_path(""), "_rels/.rels");
    }

    #[test]
    fn test_rels_source() {
        assert_eq!(
            rels_source("ppt/slides/_rels/slide1.xml.rels").as_deref(),
            Some("ppt/slides/slide1.xml")
        );
        assert_eq!(rels_source("_rels/.rels").as_deref(), Some(""));
        assert_eq!(rels_source("ppt/slides/slide1.xml"), None);
    }

    #[test]
    fn test_resolve_and_relative_target() {
        assert_eq!(
            resolve_target("ppt/slides/slide1.xml", "../media/image1.png"),
            "ppt/media/image1.png"
        );
        assert_eq!(resolve_target("", "ppt/presentation.xml"), "ppt/presentation.xml");
        assert_eq!(
            resolve_target("ppt/presentation.xml", "/ppt/slides/slide2.xml"),
            "ppt/slides/slide2.xml"
        );

        assert_eq!(
            relative_target("ppt/slides/slide3.xml", "ppt/slideLayouts/slideLayout2.xml"),
            "../slideLayouts/slideLayout2.xml"
        );
        assert_eq!(
            relative_target("ppt/presentation.xml", "ppt/slides/slide3.xml"),
            "slides/slide3.xml"
        );
        assert_eq!(
            relative_target("ppt/slides/slide1.xml", "ppt/slides/slide2.xml"),
            "slide2.xml"
        );
    }

    #[test]
    fn test_relationships_parse_and_relate() {
        let xml = br#"<?xml version="1.0" encoding="UTF-8"?>
<Relationships xmlns="http://schemas.openxmlformats.org/package/2006/relationships">
  <Relationship Id="rId1" Type="http://schemas.openxmlformats.org/officeDocument/2006/relationships/slideLayout" Target="../slideLayouts/slideLayout2.xml"/>
  <Relationship Id="rId3" Type="http://schemas.openxmlformats.org/officeDocument/2006/relationships/hyperlink" Target="https://example.com/?a=1&amp;b=2" TargetMode="External"/>
</Relationships>"#;

        let mut rels = Relationships::parse(xml).unwrap();
        assert_eq!(rels.len(), 2);
        let link = rels.get("rId3").unwrap();
        assert!(link.external);
        assert_eq!(link.target, "https://example.com/?a=1&b=2");

        assert_eq!(rels.next_id(), "rId2");
        let same = rels.relate_to(rel_type::SLIDE_LAYOUT, "../slideLayouts/slideLayout2.xml", false);
        assert_eq!(same, "rId1");
        let image = rels.relate_to(rel_type::IMAGE, "../media/image1.png", false);
        assert_eq!(image, "rId2");
        assert_eq!(rels.next_id(), "rId4");

        let reparsed = Relationships::parse(&rels.to_bytes().unwrap()).unwrap();
        assert_eq!(reparsed, rels);
    }

    #[test]
    fn test_content_types() {
        let xml = br#"<?xml version="1.0"?><Types xmlns="http://schemas.openxmlformats.org/package/2006/content-types"><Default Extension="xml" ContentType="application/xml"/><Override PartName="/ppt/slides/slide1.xml" ContentType="application/vnd.openxmlformats-officedocument.presentationml.slide+xml"/></Types>"#;
        let mut types = ContentTypes::parse(xml).unwrap();
        assert_eq!(types.content_type("ppt/slides/slide1.xml"), Some(content_type::SLIDE));
        assert_eq!(types.content_type("ppt/other.xml"), Some(content_type::XML));
        assert_eq!(types.content_type("ppt/media/image1.png"), None);

        types.ensure_default("png", "image/png");
        types.ensure_default("PNG", "image/x-png");
        assert_eq!(types.content_type("ppt/media/image1.png"), Some("image/png"));

        types.remove_override("ppt/slides/slide1.xml");
        assert_eq!(types.content_type("ppt/slides/slide1.xml"), Some(content_type::XML));
    }
}
