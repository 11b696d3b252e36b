//! Presentation model over an OPC package.
//!
//! Slides are parsed once on open and kept as owned XML trees; they are
//! serialized back into the package when the presentation is saved.

use crate::media::ImageData;
use crate::package::{
    content_type, rel_type, relative_target, resolve_target, Package, Relationships,
};
use crate::shapes::{self, next_shape_id, xfrm_element};
use deck_core::{Error, Rect, Result, XmlDocument, XmlElement, XmlNode};
use std::fs::File;
use std::io::{BufReader, Read, Seek, Write};
use std::path::Path;

pub const NS_A: &str = "http://schemas.openxmlformats.org/drawingml/2006/main";
pub const NS_R: &str = "http://schemas.openxmlformats.org/officeDocument/2006/relationships";
pub const NS_P: &str = "http://schemas.openxmlformats.org/presentationml/2006/main";

/// Slide size used when `p:sldSz` is absent (4:3).
const DEFAULT_SLIDE_SIZE: (i64, i64) = (9_144_000, 6_858_000);

/// First id PowerPoint hands out in `p:sldIdLst`.
const MIN_SLIDE_ID: u32 = 256;

/// A slide of the presentation.
#[derive(Debug, Clone)]
pub struct Slide {
    id: u32,
    rel_id: String,
    part_name: String,
    layout: Option<String>,
    pub(crate) xml: XmlDocument,
    pub(crate) rels: Relationships,
}

impl Slide {
    /// `p:sldId@id`.
    pub fn id(&self) -> u32 {
        self.id
    }

    pub fn part_name(&self) -> &str {
        &self.part_name
    }

    /// Part name of the slide layout.
    pub fn layout_part(&self) -> Option<&str> {
        self.layout.as_deref()
    }

    pub fn xml(&self) -> &XmlDocument {
        &self.xml
    }

    pub fn relationships(&self) -> &Relationships {
        &self.rels
    }

    pub fn shape_tree(&self) -> Option<&XmlElement> {
        self.xml.root.path(&["p:cSld", "p:spTree"])
    }

    pub fn shape_tree_mut(&mut self) -> Option<&mut XmlElement> {
        self.xml.root.path_mut(&["p:cSld", "p:spTree"])
    }

    /// Top-level shapes in z-order.
    pub fn shapes(&self) -> impl Iterator<Item = &XmlElement> {
        self.shape_tree()
            .into_iter()
            .flat_map(|tree| tree.elements())
            .filter(|el| shapes::is_shape(el))
    }

    /// Text of every text-bearing top-level shape.
    pub fn texts(&self) -> Vec<String> {
        self.shapes().filter_map(shapes::shape_text).collect()
    }

    /// Number of `r:embed` image references in the slide.
    pub fn image_reference_count(&self) -> usize {
        shapes::image_reference_count(&self.xml.root)
    }
}

/// A slide layout and its display name.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Layout {
    pub part_name: String,
    pub name: String,
}

/// A presentation opened from a PPTX file.
#[derive(Debug, Clone)]
pub struct Presentation {
    package: Package,
    part_name: String,
    xml: XmlDocument,
    rels: Relationships,
    pub(crate) slides: Vec<Slide>,
    layouts: Vec<Layout>,
    slide_width: i64,
    slide_height: i64,
}

impl Presentation {
    /// Open a PPTX file.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let file = File::open(path.as_ref())?;
        Self::from_reader(BufReader::new(file))
    }

    pub fn from_reader<R: Read + Seek>(reader: R) -> Result<Self> {
        let package = Package::from_reader(reader)?;
        Self::from_package(package)
    }

    pub fn from_package(package: Package) -> Result<Self> {
        let root_rels = package.rels_for("")?;
        let part_name = root_rels
            .by_type(rel_type::OFFICE_DOCUMENT)
            .map(|rel| resolve_target("", &rel.target))
            .ok_or_else(|| {
                Error::PptxParseError("Package has no officeDocument relationship".to_string())
            })?;

        let xml = package.xml_part(&part_name)?;
        if xml.root.local_name() != "presentation" {
            return Err(Error::UnsupportedFormat(format!(
                "Main part is <{}>, not a presentation",
                xml.root.name
            )));
        }
        let rels = package.rels_for(&part_name)?;

        let (slide_width, slide_height) = match xml.root.child("p:sldSz") {
            Some(size) => (
                size.attr("cx").and_then(|v| v.parse().ok()).unwrap_or(DEFAULT_SLIDE_SIZE.0),
                size.attr("cy").and_then(|v| v.parse().ok()).unwrap_or(DEFAULT_SLIDE_SIZE.1),
            ),
            None => DEFAULT_SLIDE_SIZE,
        };

        let layouts = read_layouts(&package, &part_name, &xml, &rels)?;
        let slides = read_slides(&package, &part_name, &xml, &rels)?;

        log::debug!(
            "Opened presentation with {} slides and {} layouts ({}x{} EMU)",
            slides.len(),
            layouts.len(),
            slide_width,
            slide_height
        );

        Ok(Self {
            package,
            part_name,
            xml,
            rels,
            slides,
            layouts,
            slide_width,
            slide_height,
        })
    }

    pub fn slide_width(&self) -> i64 {
        self.slide_width
    }

    pub fn slide_height(&self) -> i64 {
        self.slide_height
    }

    pub fn slides(&self) -> &[Slide] {
        &self.slides
    }

    pub fn slide_count(&self) -> usize {
        self.slides.len()
    }

    pub fn slide(&self, index: usize) -> Result<&Slide> {
        self.slides.get(index).ok_or_else(|| {
            Error::TemplateError(format!(
                "Slide index {} out of range ({} slides)",
                index,
                self.slides.len()
            ))
        })
    }

    pub(crate) fn slide_mut(&mut self, index: usize) -> Result<&mut Slide> {
        let count = self.slides.len();
        self.slides.get_mut(index).ok_or_else(|| {
            Error::TemplateError(format!("Slide index {} out of range ({} slides)", index, count))
        })
    }

    pub fn layouts(&self) -> &[Layout] {
        &self.layouts
    }

    pub fn layout_name(&self, part_name: &str) -> Option<&str> {
        self.layouts
            .iter()
            .find(|l| l.part_name == part_name)
            .map(|l| l.name.as_str())
    }

    pub fn package(&self) -> &Package {
        &self.package
    }

    /// Append a bare slide based on `layout`, returning its index.
    pub fn add_slide(&mut self, layout: &str) -> Result<usize> {
        if !self.package.contains(layout) {
            return Err(Error::RelationshipError(format!(
                "Slide layout '{}' not found",
                layout
            )));
        }

        let part_name = self.package.next_partname("ppt/slides/slide", ".xml");
        let xml = new_slide_xml();

        let mut rels = Relationships::new();
        rels.add(rel_type::SLIDE_LAYOUT, &relative_target(&part_name, layout), false);

        self.package.set_part(part_name.clone(), xml.to_bytes()?);
        self.package
            .content_types_mut()
            .set_override(&part_name, content_type::SLIDE);

        let rel_id = self.rels.add(
            rel_type::SLIDE,
            &relative_target(&self.part_name, &part_name),
            false,
        );
        let id = self.next_slide_id();

        let sld_id = XmlElement::new("p:sldId")
            .with_attr("id", id.to_string())
            .with_attr("r:id", rel_id.as_str());
        match self.xml.root.child_mut("p:sldIdLst") {
            Some(list) => list.push_element(sld_id),
            None => {
                let list = XmlElement::new("p:sldIdLst").with_child(sld_id);
                let anchor = ["p:sldSz", "p:notesSz", "p:smartTags", "p:embeddedFontLst"]
                    .iter()
                    .find_map(|name| self.xml.root.position(name));
                match anchor {
                    Some(index) => self.xml.root.children.insert(index, XmlNode::Element(list)),
                    None => self.xml.root.push_element(list),
                }
            }
        }

        log::debug!("Added slide {} (id {}) on layout {}", part_name, id, layout);

        self.slides.push(Slide {
            id,
            rel_id,
            part_name,
            layout: Some(layout.to_string()),
            xml,
            rels,
        });
        Ok(self.slides.len() - 1)
    }

    fn next_slide_id(&self) -> u32 {
        let max = self.slides.iter().map(|s| s.id).max().unwrap_or(MIN_SLIDE_ID - 1);
        if max < i32::MAX as u32 {
            return (max + 1).max(MIN_SLIDE_ID);
        }
        (MIN_SLIDE_ID..)
            .find(|id| !self.slides.iter().any(|s| s.id == *id))
            .unwrap_or(MIN_SLIDE_ID)
    }

    /// Remove the slide with this `p:sldId@id`.
    ///
    /// The slide part itself is dropped when the package is saved, once
    /// nothing refers to it.
    pub fn remove_slide(&mut self, id: u32) -> Result<()> {
        let index = self
            .slides
            .iter()
            .position(|s| s.id == id)
            .ok_or_else(|| Error::TemplateError(format!("No slide with id {}", id)))?;
        let slide = self.slides.remove(index);
        self.rels.remove(&slide.rel_id);

        let id_text = id.to_string();
        let rel_id = slide.rel_id.clone();
        let removed = self.xml.root.remove_descendants(&mut |el| match el.name.as_str() {
            "p:sldId" | "p14:sldId" => el.attr("id") == Some(id_text.as_str()),
            // Custom shows list slides by relationship id
            "p:sld" => el.attr("r:id") == Some(rel_id.as_str()),
            _ => false,
        });

        log::debug!(
            "Removed slide {} (id {}), {} list entries",
            slide.part_name,
            id,
            removed
        );
        Ok(())
    }

    /// Plain text of a slide's notes, if it has a notes slide.
    pub fn notes_text(&self, index: usize) -> Result<Option<String>> {
        let slide = self.slide(index)?;
        let notes_part = match slide.rels.by_type(rel_type::NOTES_SLIDE) {
            Some(rel) => resolve_target(&slide.part_name, &rel.target),
            None => return Ok(None),
        };
        if !self.package.contains(&notes_part) {
            return Ok(None);
        }
        let notes = self.package.xml_part(&notes_part)?;
        Ok(notes_body(&notes.root).map(shapes::paragraphs_text))
    }

    /// Replace a slide's notes text, creating the notes slide if needed.
    ///
    /// Returns `false` when the slide has no notes and the presentation has
    /// no notes master to create them from.
    pub fn set_notes_text(&mut self, index: usize, text: &str) -> Result<bool> {
        let slide = self.slide(index)?;
        let slide_part = slide.part_name.clone();

        if let Some(rel) = slide.rels.by_type(rel_type::NOTES_SLIDE) {
            let notes_part = resolve_target(&slide_part, &rel.target);
            if self.package.contains(&notes_part) {
                let mut notes = self.package.xml_part(&notes_part)?;
                match notes_body_mut(&mut notes.root) {
                    Some(body) => set_body_text(body, text),
                    None => {
                        return Err(Error::PptxParseError(format!(
                            "{} has no notes placeholder",
                            notes_part
                        )))
                    }
                }
                self.package.set_part(notes_part, notes.to_bytes()?);
                return Ok(true);
            }
        }

        let master = match self.rels.by_type(rel_type::NOTES_MASTER) {
            Some(rel) => resolve_target(&self.part_name, &rel.target),
            None => return Ok(false),
        };
        if !self.package.contains(&master) {
            return Ok(false);
        }

        let notes_part = self
            .package
            .next_partname("ppt/notesSlides/notesSlide", ".xml");
        let mut notes = new_notes_xml();
        if let Some(body) = notes_body_mut(&mut notes.root) {
            set_body_text(body, text);
        }

        let mut notes_rels = Relationships::new();
        notes_rels.add(rel_type::NOTES_MASTER, &relative_target(&notes_part, &master), false);
        notes_rels.add(rel_type::SLIDE, &relative_target(&notes_part, &slide_part), false);

        self.package.set_part(notes_part.clone(), notes.to_bytes()?);
        self.package.set_rels(&notes_part, &notes_rels)?;
        self.package
            .content_types_mut()
            .set_override(&notes_part, content_type::NOTES_SLIDE);

        let slide = self.slide_mut(index)?;
        slide.rels.add(
            rel_type::NOTES_SLIDE,
            &relative_target(&slide_part, &notes_part),
            false,
        );
        Ok(true)
    }

    /// Media part holding `image`, adding it unless identical bytes exist.
    fn media_part_for(&mut self, image: &ImageData) -> String {
        if let Some(existing) = self
            .package
            .part_names()
            .filter(|name| name.starts_with("ppt/media/"))
            .find(|name| self.package.part(name) == Some(image.bytes.as_slice()))
        {
            return existing.to_string();
        }

        let ext = image.format.extension();
        let part_name = self
            .package
            .next_partname("ppt/media/image", &format!(".{}", ext));
        self.package
            .content_types_mut()
            .ensure_default(ext, image.format.content_type());
        self.package.set_part(part_name.clone(), image.bytes.clone());
        part_name
    }

    /// Relationship id under which `image` is available to a slide.
    pub fn relate_image(&mut self, index: usize, image: &ImageData) -> Result<String> {
        self.slide(index)?;
        let media = self.media_part_for(image);
        let slide = self.slide_mut(index)?;
        let target = relative_target(&slide.part_name, &media);
        Ok(slide.rels.relate_to(rel_type::IMAGE, &target, false))
    }

    /// Add a picture on top of a slide's shapes.
    pub fn add_picture(
        &mut self,
        index: usize,
        image: &ImageData,
        rect: Rect,
        descr: &str,
    ) -> Result<()> {
        if rect.width <= 0 || rect.height <= 0 {
            return Err(Error::ImageError(format!(
                "picture size {}x{} EMU is not positive",
                rect.width, rect.height
            )));
        }
        if self.slide(index)?.shape_tree().is_none() {
            return Err(Error::PptxParseError(format!(
                "{} has no shape tree",
                self.slides[index].part_name
            )));
        }

        let rel_id = self.relate_image(index, image)?;
        let slide = self.slide_mut(index)?;
        let id = next_shape_id(&slide.xml.root);
        let picture = picture_element(id, descr, &rel_id, rect);
        if let Some(tree) = slide.shape_tree_mut() {
            tree.insert_before(picture, "p:extLst");
        }
        Ok(())
    }

    /// Serialize slides and the presentation part back into the package.
    fn flush(&mut self) -> Result<()> {
        for slide in &self.slides {
            self.package
                .set_part(slide.part_name.clone(), slide.xml.to_bytes()?);
            self.package.set_rels(&slide.part_name, &slide.rels)?;
        }
        self.package
            .set_part(self.part_name.clone(), self.xml.to_bytes()?);
        self.package.set_rels(&self.part_name, &self.rels)?;
        Ok(())
    }

    pub fn write_to<W: Write + Seek>(&mut self, writer: W) -> Result<W> {
        self.flush()?;
        self.package.write_to(writer)
    }

    /// Save to a file.
    pub fn save<P: AsRef<Path>>(&mut self, path: P) -> Result<()> {
        let file = File::create(path.as_ref())?;
        let mut file = self.write_to(file)?;
        file.flush()?;
        Ok(())
    }

    /// Serialize to an in-memory PPTX.
    pub fn to_bytes(&mut self) -> Result<Vec<u8>> {
        Ok(self.write_to(std::io::Cursor::new(Vec::new()))?.into_inner())
    }
}

fn read_slides(
    package: &Package,
    part_name: &str,
    xml: &XmlDocument,
    rels: &Relationships,
) -> Result<Vec<Slide>> {
    let mut slides = Vec::new();
    let list = match xml.root.child("p:sldIdLst") {
        Some(list) => list,
        None => return Ok(slides),
    };

    for entry in list.children_named("p:sldId") {
        let id = entry
            .attr("id")
            .and_then(|v| v.parse::<u32>().ok())
            .ok_or_else(|| Error::PptxParseError("p:sldId without a valid id".to_string()))?;
        let rel_id = entry
            .attr("r:id")
            .ok_or_else(|| Error::PptxParseError(format!("Slide {} has no r:id", id)))?;
        let rel = rels.get(rel_id).ok_or_else(|| {
            Error::RelationshipError(format!("Slide relationship {} not found", rel_id))
        })?;

        let slide_part = resolve_target(part_name, &rel.target);
        let slide_xml = package.xml_part(&slide_part)?;
        let slide_rels = package.rels_for(&slide_part)?;
        let layout = slide_rels
            .by_type(rel_type::SLIDE_LAYOUT)
            .map(|r| resolve_target(&slide_part, &r.target));

        slides.push(Slide {
            id,
            rel_id: rel_id.to_string(),
            part_name: slide_part,
            layout,
            xml: slide_xml,
            rels: slide_rels,
        });
    }

    Ok(slides)
}

fn read_layouts(
    package: &Package,
    part_name: &str,
    xml: &XmlDocument,
    rels: &Relationships,
) -> Result<Vec<Layout>> {
    let mut layouts = Vec::new();
    let masters = match xml.root.child("p:sldMasterIdLst") {
        Some(list) => list,
        None => return Ok(layouts),
    };

    for master_id in masters.children_named("p:sldMasterId") {
        let master_part = match master_id.attr("r:id").and_then(|id| rels.get(id)) {
            Some(rel) => resolve_target(part_name, &rel.target),
            None => continue,
        };
        let master = package.xml_part(&master_part)?;
        let master_rels = package.rels_for(&master_part)?;

        let list = match master.root.child("p:sldLayoutIdLst") {
            Some(list) => list,
            None => continue,
        };
        for layout_id in list.children_named("p:sldLayoutId") {
            let layout_part = match layout_id.attr("r:id").and_then(|id| master_rels.get(id)) {
                Some(rel) => resolve_target(&master_part, &rel.target),
                None => continue,
            };
            let name = package
                .xml_part(&layout_part)
                .ok()
                .and_then(|doc| doc.root.child("p:cSld").and_then(|c| c.attr("name")).map(str::to_string))
                .unwrap_or_default();
            layouts.push(Layout {
                part_name: layout_part,
                name,
            });
        }
    }

    Ok(layouts)
}

fn group_header() -> [XmlElement; 2] {
    [
        XmlElement::new("p:nvGrpSpPr")
            .with_child(XmlElement::new("p:cNvPr").with_attr("id", "1").with_attr("name", ""))
            .with_child(XmlElement::new("p:cNvGrpSpPr"))
            .with_child(XmlElement::new("p:nvPr")),
        XmlElement::new("p:grpSpPr").with_child(
            XmlElement::new("a:xfrm")
                .with_child(XmlElement::new("a:off").with_attr("x", "0").with_attr("y", "0"))
                .with_child(XmlElement::new("a:ext").with_attr("cx", "0").with_attr("cy", "0"))
                .with_child(XmlElement::new("a:chOff").with_attr("x", "0").with_attr("y", "0"))
                .with_child(XmlElement::new("a:chExt").with_attr("cx", "0").with_attr("cy", "0")),
        ),
    ]
}

fn with_namespaces(name: &str) -> XmlElement {
    XmlElement::new(name)
        .with_attr("xmlns:a", NS_A)
        .with_attr("xmlns:r", NS_R)
        .with_attr("xmlns:p", NS_P)
}

/// A slide with an empty shape tree.
fn new_slide_xml() -> XmlDocument {
    let [nv, grp] = group_header();
    let tree = XmlElement::new("p:spTree").with_child(nv).with_child(grp);
    let root = with_namespaces("p:sld")
        .with_child(XmlElement::new("p:cSld").with_child(tree))
        .with_child(XmlElement::new("p:clrMapOvr").with_child(XmlElement::new("a:masterClrMapping")));
    XmlDocument::new(root)
}

/// A notes slide with a slide image and an empty body placeholder.
fn new_notes_xml() -> XmlDocument {
    let [nv, grp] = group_header();
    let slide_image = XmlElement::new("p:sp")
        .with_child(
            XmlElement::new("p:nvSpPr")
                .with_child(
                    XmlElement::new("p:cNvPr")
                        .with_attr("id", "2")
                        .with_attr("name", "Slide Image Placeholder 1"),
                )
                .with_child(
                    XmlElement::new("p:cNvSpPr").with_child(
                        XmlElement::new("a:spLocks")
                            .with_attr("noGrp", "1")
                            .with_attr("noRot", "1")
                            .with_attr("noChangeAspect", "1"),
                    ),
                )
                .with_child(
                    XmlElement::new("p:nvPr")
                        .with_child(XmlElement::new("p:ph").with_attr("type", "sldImg")),
                ),
        )
        .with_child(XmlElement::new("p:spPr"));
    let body = XmlElement::new("p:sp")
        .with_child(
            XmlElement::new("p:nvSpPr")
                .with_child(
                    XmlElement::new("p:cNvPr")
                        .with_attr("id", "3")
                        .with_attr("name", "Notes Placeholder 2"),
                )
                .with_child(
                    XmlElement::new("p:cNvSpPr")
                        .with_child(XmlElement::new("a:spLocks").with_attr("noGrp", "1")),
                )
                .with_child(
                    XmlElement::new("p:nvPr").with_child(
                        XmlElement::new("p:ph")
                            .with_attr("type", "body")
                            .with_attr("idx", "1"),
                    ),
                ),
        )
        .with_child(XmlElement::new("p:spPr"))
        .with_child(
            XmlElement::new("p:txBody")
                .with_child(XmlElement::new("a:bodyPr"))
                .with_child(XmlElement::new("a:lstStyle"))
                .with_child(XmlElement::new("a:p")),
        );
    let tree = XmlElement::new("p:spTree")
        .with_child(nv)
        .with_child(grp)
        .with_child(slide_image)
        .with_child(body);
    let root = with_namespaces("p:notes")
        .with_child(XmlElement::new("p:cSld").with_child(tree))
        .with_child(XmlElement::new("p:clrMapOvr").with_child(XmlElement::new("a:masterClrMapping")));
    XmlDocument::new(root)
}

fn is_notes_body(el: &XmlElement) -> bool {
    el.name == "p:sp"
        && el
            .path(&["p:nvSpPr", "p:nvPr", "p:ph"])
            .and_then(|ph| ph.attr("type"))
            == Some("body")
}

fn notes_body(root: &XmlElement) -> Option<&XmlElement> {
    root.path(&["p:cSld", "p:spTree"])?
        .elements()
        .find(|el| is_notes_body(el))?
        .child("p:txBody")
}

fn notes_body_mut(root: &mut XmlElement) -> Option<&mut XmlElement> {
    root.path_mut(&["p:cSld", "p:spTree"])?
        .elements_mut()
        .find(|el| is_notes_body(el))?
        .child_mut("p:txBody")
}

/// Replace the paragraphs of a text body with one paragraph per line.
fn set_body_text(body: &mut XmlElement, text: &str) {
    body.remove_children("a:p");
    for line in text.split('\n') {
        let mut p = XmlElement::new("a:p");
        // Vertical tab marks a soft line break inside the paragraph
        for (i, part) in line.split('\u{0b}').enumerate() {
            if i > 0 {
                p.push_element(XmlElement::new("a:br"));
            }
            if !part.is_empty() {
                p.push_element(
                    XmlElement::new("a:r").with_child(XmlElement::new("a:t").with_text(part)),
                );
            }
        }
        body.push_element(p);
    }
}

fn picture_element(id: u32, descr: &str, rel_id: &str, rect: Rect) -> XmlElement {
    XmlElement::new("p:pic")
        .with_child(
            XmlElement::new("p:nvPicPr")
                .with_child(
                    XmlElement::new("p:cNvPr")
                        .with_attr("id", id.to_string())
                        .with_attr("name", format!("Picture {}", id.saturating_sub(1)))
                        .with_attr("descr", descr),
                )
                .with_child(
                    XmlElement::new("p:cNvPicPr")
                        .with_child(XmlElement::new("a:picLocks").with_attr("noChangeAspect", "1")),
                )
                .with_child(XmlElement::new("p:nvPr")),
        )
        .with_child(
            XmlElement::new("p:blipFill")
                .with_child(XmlElement::new("a:blip").with_attr("r:embed", rel_id))
                .with_child(XmlElement::new("a:stretch").with_child(XmlElement::new("a:fillRect"))),
        )
        .with_child(
            XmlElement::new("p:spPr").with_child(xfrm_element(rect)).with_child(
                XmlElement::new("a:prstGeom")
                    .with_attr("prst", "rect")
                    .with_child(XmlElement::new("a:avLst")),
            ),
        )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fixtures::{picture_shape, png_bytes, text_shape, FixtureDeck, FixtureSlide, SLIDE_HEIGHT, SLIDE_WIDTH};
    use crate::shapes::shape_rect;
    use std::io::Cursor;

    fn open(deck: &FixtureDeck) -> Presentation {
        Presentation::from_reader(Cursor::new(deck.build())).unwrap()
    }

    fn reopen(pres: &mut Presentation) -> Presentation {
        let bytes = pres.to_bytes().unwrap();
        Presentation::from_reader(Cursor::new(bytes)).unwrap()
    }

    fn three_slides() -> FixtureDeck {
        FixtureDeck::new(vec![
            FixtureSlide::new(text_shape(2, "Cover", Rect::new(0, 0, 100, 100), &["Cover"])),
            FixtureSlide::new(text_shape(2, "Body", Rect::new(0, 0, 100, 100), &["Template"]))
                .with_layout(2),
            FixtureSlide::new(text_shape(2, "Stale", Rect::new(0, 0, 100, 100), &["Stale"])),
        ])
    }

    #[test]
    fn test_open_reads_slides_and_layouts() {
        let pres = open(&three_slides());
        assert_eq!(pres.slide_count(), 3);
        assert_eq!(pres.slide_width(), SLIDE_WIDTH);
        assert_eq!(pres.slide_height(), SLIDE_HEIGHT);
        assert_eq!(pres.slides()[0].id(), 256);
        assert_eq!(pres.slides()[1].part_name(), "ppt/slides/slide2.xml");
        assert_eq!(
            pres.slides()[1].layout_part(),
            Some("ppt/slideLayouts/slideLayout2.xml")
        );
        assert_eq!(pres.layouts().len(), 2);
        assert_eq!(
            pres.layout_name("ppt/slideLayouts/slideLayout2.xml"),
            Some("Title and Content")
        );
        assert_eq!(pres.slides()[2].texts(), vec!["Stale (more)".to_string()]);
    }

    #[test]
    fn test_add_slide_survives_save() {
        let mut pres = open(&three_slides());
        let index = pres.add_slide("ppt/slideLayouts/slideLayout1.xml").unwrap();
        assert_eq!(index, 3);
        assert_eq!(pres.slides()[3].id(), 259);
        assert_eq!(pres.slides()[3].part_name(), "ppt/slides/slide4.xml");

        let reopened = reopen(&mut pres);
        assert_eq!(reopened.slide_count(), 4);
        assert_eq!(
            reopened.slides()[3].layout_part(),
            Some("ppt/slideLayouts/slideLayout1.xml")
        );
        assert_eq!(reopened.slides()[3].shapes().count(), 0);

        assert!(pres.add_slide("ppt/slideLayouts/missing.xml").is_err());
    }

    #[test]
    fn test_remove_slide_prunes_part_and_sections() {
        let mut pres = open(&three_slides());
        let stale = pres.slides()[2].id();
        pres.remove_slide(stale).unwrap();
        assert!(pres.remove_slide(stale).is_err());

        let bytes = pres.to_bytes().unwrap();
        let package = Package::from_reader(Cursor::new(bytes)).unwrap();
        assert!(!package.contains("ppt/slides/slide3.xml"));
        assert!(!package.contains("ppt/slides/_rels/slide3.xml.rels"));
        assert!(package.contains("ppt/slides/slide2.xml"));
        assert_eq!(package.content_types().content_type("ppt/slides/slide3.xml"), Some(content_type::XML));

        let xml = String::from_utf8(package.part("ppt/presentation.xml").unwrap().to_vec()).unwrap();
        assert!(!xml.contains(r#"id="258""#));
        assert!(xml.contains(r#"<p14:sldId id="257"/>"#));
    }

    #[test]
    fn test_notes_round_trip() {
        let deck = FixtureDeck::new(vec![
            FixtureSlide::new("").with_notes("Speaker notes"),
            FixtureSlide::new(""),
        ]);
        let mut pres = open(&deck);
        assert_eq!(pres.notes_text(0).unwrap().as_deref(), Some("Speaker notes"));
        assert_eq!(pres.notes_text(1).unwrap(), None);

        assert!(pres.set_notes_text(1, "Line one\nLine two").unwrap());
        let reopened = reopen(&mut pres);
        assert_eq!(
            reopened.notes_text(1).unwrap().as_deref(),
            Some("Line one\nLine two")
        );
        assert_eq!(reopened.notes_text(0).unwrap().as_deref(), Some("Speaker notes"));
    }

    #[test]
    fn test_notes_need_master() {
        let deck = FixtureDeck::new(vec![FixtureSlide::new("")]).without_notes_master();
        let mut pres = open(&deck);
        assert!(!pres.set_notes_text(0, "lost").unwrap());
        assert_eq!(pres.notes_text(0).unwrap(), None);
    }

    #[test]
    fn test_add_picture_dedupes_media() {
        let deck = FixtureDeck::new(vec![FixtureSlide::new(picture_shape(
            2,
            "Logo",
            "rId2",
            Rect::new(0, 0, 10, 10),
        ))
        .with_image("rId2")]);
        let mut pres = open(&deck);

        // Same bytes as the existing media part
        let existing = ImageData::from_bytes(deck.image.clone()).unwrap();
        let rect = Rect::new(5, 5, 20, 20);
        pres.add_picture(0, &existing, rect, "again").unwrap();
        assert_eq!(pres.slides()[0].relationships().len(), 2);

        let other = ImageData::from_bytes(png_bytes(8, 8, None)).unwrap();
        pres.add_picture(0, &other, rect, "new.png").unwrap();
        assert_eq!(pres.slides()[0].relationships().len(), 3);

        let slide = &pres.slides()[0];
        let pictures: Vec<&XmlElement> = slide.shapes().filter(|s| s.name == "p:pic").collect();
        assert_eq!(pictures.len(), 3);
        let last = pictures[2];
        assert_eq!(shape_rect(last).unwrap(), rect);
        assert_eq!(shapes::non_visual_props(last).unwrap().attr("descr"), Some("new.png"));
        assert_eq!(shapes::non_visual_props(last).unwrap().attr("id"), Some("4"));
        // Pictures go in front of the extension list
        let names: Vec<&str> = slide.shape_tree().unwrap().elements().map(|e| e.name.as_str()).collect();
        assert_eq!(names.last(), Some(&"p:extLst"));

        let bytes = pres.to_bytes().unwrap();
        let package = Package::from_reader(Cursor::new(bytes)).unwrap();
        let media: Vec<&str> = package.part_names().filter(|n| n.starts_with("ppt/media/")).collect();
        assert_eq!(media, vec!["ppt/media/image1.png", "ppt/media/image2.png"]);

        assert!(pres.add_picture(0, &other, Rect::new(0, 0, 0, 10), "empty").is_err());
    }
}
