//! Copying slides within a presentation and between presentations.

use crate::media::ImageData;
use crate::normalize::{normalize_shapes, NormalizeReport};
use crate::package::{rel_type, relative_target, resolve_target};
use crate::presentation::{Presentation, Slide};
use crate::shapes::{self, referenced_ids, remap_references, shape_attrs, shape_kind};
use deck_core::{
    Error, LogoRules, Rect, Result, ShapeKind, SkipReason, Skipped, XmlElement, XmlNode,
};
use serde::Serialize;
use std::collections::HashMap;

/// Result of [`Presentation::duplicate_slide`].
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct DuplicateReport {
    /// Index of the new slide.
    pub index: usize,
    /// Source relationship id to new relationship id.
    pub rel_map: HashMap<String, String>,
    /// Reference attributes rewritten through `rel_map`.
    pub rewritten: usize,
    pub normalize: NormalizeReport,
    pub notes_copied: bool,
    pub skipped: Vec<Skipped>,
}

/// Result of [`Presentation::import_slide`].
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ImportReport {
    pub index: usize,
    /// Shapes carried over, pictures included.
    pub shapes: usize,
    pub pictures: usize,
    pub skipped: Vec<Skipped>,
}

impl Presentation {
    /// Append a copy of the slide at `source_index`.
    ///
    /// The copy shares the source's layout and related parts. Logos and
    /// decorative bars are normalized on the copy.
    pub fn duplicate_slide(&mut self, source_index: usize, rules: &LogoRules) -> Result<DuplicateReport> {
        let source = self.slide(source_index)?;
        let layout = source
            .layout_part()
            .ok_or_else(|| {
                Error::RelationshipError(format!("{} has no slide layout", source.part_name()))
            })?
            .to_string();
        let source_part = source.part_name().to_string();
        let source_rels: Vec<_> = source
            .relationships()
            .iter()
            .filter(|rel| rel.rel_type != rel_type::NOTES_SLIDE)
            .cloned()
            .collect();
        let namespaces = root_declarations(&source.xml().root);
        let background = source.xml().root.path(&["p:cSld", "p:bg"]).cloned();
        let shapes: Vec<XmlElement> = source.shapes().cloned().collect();

        let mut targets = Vec::with_capacity(source_rels.len());
        for rel in &source_rels {
            if rel.external {
                targets.push(rel.target.clone());
                continue;
            }
            let part = resolve_target(&source_part, &rel.target);
            if !self.package().contains(&part) {
                return Err(Error::RelationshipError(format!(
                    "{} of {} points to missing part {}",
                    rel.id, source_part, part
                )));
            }
            targets.push(part);
        }

        let index = self.add_slide(&layout)?;
        let slide_width = self.slide_width();
        let mut report = DuplicateReport {
            index,
            ..Default::default()
        };

        let slide = self.slide_mut(index)?;
        let new_part = slide.part_name().to_string();
        declare_missing(&mut slide.xml.root, &namespaces);
        for (rel, target) in source_rels.iter().zip(&targets) {
            let target = if rel.external {
                target.clone()
            } else {
                relative_target(&new_part, target)
            };
            let new_id = slide.rels.relate_to(&rel.rel_type, &target, rel.external);
            report.rel_map.insert(rel.id.clone(), new_id);
        }

        let csld = slide.xml.root.child_mut("p:cSld").ok_or_else(|| {
            Error::PptxParseError(format!("{} has no p:cSld", new_part))
        })?;
        if let Some(bg) = background {
            csld.remove_children("p:bg");
            csld.children.insert(0, XmlNode::Element(bg));
        }

        let tree = csld.child_mut("p:spTree").ok_or_else(|| {
            Error::PptxParseError(format!("{} has no p:spTree", new_part))
        })?;
        for shape in shapes {
            tree.insert_before(shape, "p:extLst");
        }
        report.normalize = normalize_shapes(tree, slide_width, rules);

        report.rewritten = remap_references(&mut slide.xml.root, &report.rel_map);

        match self.copy_notes(source_index, index) {
            Ok(copied) => report.notes_copied = copied,
            Err(reason) => {
                log::warn!("Notes of {} not copied: {}", source_part, reason);
                report.skipped.push(Skipped::new(format!("{} notes", source_part), reason));
            }
        }

        log::debug!(
            "Duplicated {} as {} ({} relationships, {} references)",
            source_part,
            new_part,
            report.rel_map.len(),
            report.rewritten
        );
        Ok(report)
    }

    fn copy_notes(&mut self, from: usize, to: usize) -> std::result::Result<bool, SkipReason> {
        let text = match self.notes_text(from) {
            Ok(Some(text)) => text,
            Ok(None) => return Ok(false),
            Err(e) => return Err(SkipReason::Failed(e.to_string())),
        };
        match self.set_notes_text(to, &text) {
            Ok(true) => Ok(true),
            Ok(false) => Err(SkipReason::Unresolved("no notes master".to_string())),
            Err(e) => Err(SkipReason::Failed(e.to_string())),
        }
    }

    /// Append a copy of a slide from another presentation.
    ///
    /// The layout is matched by name, falling back to the first layout.
    /// Pictures are re-added from their image bytes; other shapes are cloned
    /// with their image and hyperlink references carried over. Shapes that
    /// cannot be carried over are skipped.
    pub fn import_slide(&mut self, source: &Presentation, source_index: usize) -> Result<ImportReport> {
        let src = source.slide(source_index)?;
        let layout_name = src.layout_part().and_then(|part| source.layout_name(part));
        let layout = layout_name
            .and_then(|name| self.layouts().iter().find(|l| l.name == name))
            .or_else(|| self.layouts().first())
            .map(|l| l.part_name.clone())
            .ok_or_else(|| Error::TemplateError("Presentation has no slide layouts".to_string()))?;

        let index = self.add_slide(&layout)?;
        let mut report = ImportReport {
            index,
            ..Default::default()
        };
        declare_missing(&mut self.slide_mut(index)?.xml.root, &root_declarations(&src.xml().root));

        if let Some(bg) = src.xml().root.path(&["p:cSld", "p:bg"]) {
            let mut bg = bg.clone();
            match self.import_references(index, &mut bg, source, src) {
                Ok(()) => {
                    if let Some(csld) = self.slide_mut(index)?.xml.root.child_mut("p:cSld") {
                        csld.remove_children("p:bg");
                        csld.children.insert(0, XmlNode::Element(bg));
                    }
                }
                Err(reason) => report.skipped.push(Skipped::new("background", reason)),
            }
        }

        for shape in src.shapes() {
            let name = shapes::shape_name(shape);
            let result = if shape_kind(shape) == ShapeKind::Picture {
                self.import_picture(index, shape, source, src)
                    .map(|()| report.pictures += 1)
            } else {
                let mut el = shape.clone();
                self.import_references(index, &mut el, source, src)
                    .and_then(|()| self.append_shape(index, el))
            };
            match result {
                Ok(()) => report.shapes += 1,
                Err(reason) => {
                    log::warn!("Skipping shape {}: {}", name, reason);
                    report.skipped.push(Skipped::new(name, reason));
                }
            }
        }

        Ok(report)
    }

    fn append_shape(&mut self, index: usize, shape: XmlElement) -> std::result::Result<(), SkipReason> {
        let slide = self
            .slide_mut(index)
            .map_err(|e| SkipReason::Failed(e.to_string()))?;
        let tree = slide
            .shape_tree_mut()
            .ok_or_else(|| SkipReason::Failed("slide has no shape tree".to_string()))?;
        tree.insert_before(shape, "p:extLst");
        Ok(())
    }

    fn import_picture(
        &mut self,
        index: usize,
        shape: &XmlElement,
        source: &Presentation,
        src: &Slide,
    ) -> std::result::Result<(), SkipReason> {
        let attrs = shape_attrs(shape)?;
        let rel_id = shape
            .find("a:blip")
            .and_then(|blip| blip.attr("r:embed"))
            .ok_or_else(|| SkipReason::Unresolved("picture without embedded image".to_string()))?;
        let image = source_image(source, src, rel_id)?;
        let descr = shapes::non_visual_props(shape)
            .and_then(|props| props.attr("descr"))
            .unwrap_or("");
        let rect = Rect::new(attrs.left, attrs.top, attrs.width, attrs.height);
        self.add_picture(index, &image, rect, descr)
            .map_err(|e| SkipReason::Failed(e.to_string()))
    }

    /// Give the destination slide its own relationships for every reference
    /// inside `el`, rewriting the ids in place.
    fn import_references(
        &mut self,
        index: usize,
        el: &mut XmlElement,
        source: &Presentation,
        src: &Slide,
    ) -> std::result::Result<(), SkipReason> {
        let mut map = HashMap::new();
        for old_id in referenced_ids(el) {
            let rel = src
                .relationships()
                .get(&old_id)
                .ok_or_else(|| SkipReason::Unresolved(old_id.clone()))?;
            let new_id = if rel.external {
                self.slide_mut(index)
                    .map_err(|e| SkipReason::Failed(e.to_string()))?
                    .rels
                    .relate_to(&rel.rel_type, &rel.target, true)
            } else if rel.rel_type == rel_type::IMAGE {
                let image = source_image(source, src, &old_id)?;
                self.relate_image(index, &image)
                    .map_err(|e| SkipReason::Failed(e.to_string()))?
            } else {
                return Err(SkipReason::Unresolved(format!(
                    "{} ({})",
                    old_id, rel.rel_type
                )));
            };
            map.insert(old_id, new_id);
        }
        remap_references(el, &map);
        Ok(())
    }
}

/// Namespace declarations and `mc:Ignorable` of a part's root element.
fn root_declarations(root: &XmlElement) -> Vec<(String, String)> {
    root.attributes
        .iter()
        .filter(|(key, _)| key.starts_with("xmlns:") || key == "mc:Ignorable")
        .cloned()
        .collect()
}

fn declare_missing(root: &mut XmlElement, declarations: &[(String, String)]) {
    for (key, value) in declarations {
        if root.attr(key).is_none() {
            root.set_attr(key.as_str(), value.as_str());
        }
    }
}

fn source_image(source: &Presentation, src: &Slide, rel_id: &str) -> std::result::Result<ImageData, SkipReason> {
    let rel = src
        .relationships()
        .get(rel_id)
        .ok_or_else(|| SkipReason::Unresolved(rel_id.to_string()))?;
    let part = resolve_target(src.part_name(), &rel.target);
    let bytes = source
        .package()
        .part(&part)
        .ok_or_else(|| SkipReason::Unresolved(part.clone()))?;
    ImageData::from_bytes(bytes.to_vec()).map_err(|e| SkipReason::Failed(format!("{}: {}", part, e)))
}
