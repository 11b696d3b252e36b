//! Writing an outline entry's title and bullets into a slide's text shapes.

use crate::normalize::{normalize_shapes, NormalizeReport};
use crate::presentation::Presentation;
use crate::shapes::{self, set_width, shape_text};
use deck_core::units::inches;
use deck_core::{
    Bullet, LogoRules, OutlineEntry, Result, SkipReason, Skipped, XmlElement, XmlNode,
};
use serde::Serialize;

/// Markers and formatting used when merging outline content.
#[derive(Debug, Clone, PartialEq)]
pub struct MergeOptions {
    /// Matched case-insensitively against a shape's text.
    pub title_marker: String,
    /// Matched case-sensitively against a shape's text.
    pub body_marker: String,
    /// Width the title shape is stretched to, in EMU.
    pub title_width: i64,
    pub title_font_size_pt: u32,
    /// Left margin per outline level, in EMU.
    pub indent_per_level: i64,
}

impl Default for MergeOptions {
    fn default() -> Self {
        Self {
            title_marker: "OBJECTIVES".to_string(),
            body_marker: "By the end of this module".to_string(),
            title_width: inches(15.54),
            title_font_size_pt: 42,
            indent_per_level: 720_000,
        }
    }
}

/// What the merger did to a slide.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct MergeReport {
    pub title_shape: Option<String>,
    pub body_shape: Option<String>,
    /// Paragraphs written with bullet text.
    pub paragraphs: usize,
    pub normalize: NormalizeReport,
    pub skipped: Vec<Skipped>,
}

/// Indices in `tree.children` of the title and body shapes.
fn select_shapes(tree: &XmlElement, options: &MergeOptions) -> (Option<usize>, Option<usize>) {
    let marker = options.title_marker.to_uppercase();
    let mut title = None;
    let mut body = None;
    let mut candidates: Vec<(usize, usize)> = Vec::new();

    for (index, node) in tree.children.iter().enumerate() {
        let el = match node {
            XmlNode::Element(el) => el,
            _ => continue,
        };
        let text = match shape_text(el) {
            Some(text) => text,
            None => continue,
        };
        candidates.push((index, text.chars().count()));

        if text.to_uppercase().contains(&marker) {
            title = Some(index);
        } else if text.contains(options.body_marker.as_str()) {
            body = Some(index);
        }
    }

    if body.is_none() {
        // Longest text wins; the first one on ties
        body = candidates
            .iter()
            .filter(|(index, _)| Some(*index) != title)
            .fold(None, |best: Option<(usize, usize)>, &(index, len)| match best {
                Some((_, best_len)) if best_len >= len => best,
                _ => Some((index, len)),
            })
            .map(|(index, _)| index);
    }

    (title, body)
}

/// Merge `entry` into the shapes of a `p:spTree`.
pub fn apply_content(tree: &mut XmlElement, entry: &OutlineEntry, options: &MergeOptions) -> MergeReport {
    let mut report = MergeReport::default();
    let (title, body) = select_shapes(tree, options);

    if let Some(shape) = title.and_then(|index| tree.element_at_mut(index)) {
        write_title(shape, &entry.title, options, &mut report);
    } else {
        log::debug!("No title shape for '{}'", entry.title);
    }

    if let Some(shape) = body.and_then(|index| tree.element_at_mut(index)) {
        write_body(shape, &entry.bullets, options, &mut report);
    } else {
        log::debug!("No body shape for '{}'", entry.title);
    }

    report
}

fn write_title(shape: &mut XmlElement, title: &str, options: &MergeOptions, report: &mut MergeReport) {
    let name = shapes::shape_name(shape);

    if let Err(reason) = set_width(shape, options.title_width) {
        log::warn!("Could not widen title {}: {}", name, reason);
        report.skipped.push(Skipped::new(format!("{} width", name), reason));
    }

    let paragraph = match shape.child_mut("p:txBody").and_then(|body| body.child_mut("a:p")) {
        Some(p) => p,
        None => {
            report.skipped.push(Skipped::new(name, SkipReason::MissingParagraph));
            return;
        }
    };

    // Hundredths of a point
    let size = (options.title_font_size_pt * 100).to_string();
    match first_run_only(paragraph) {
        Some(run) => {
            run.get_or_insert_first("a:rPr").set_attr("sz", size);
            set_run_text(run, title);
        }
        None => set_paragraph_text(paragraph, title),
    }

    report.title_shape = Some(name);
}

fn write_body(shape: &mut XmlElement, bullets: &[Bullet], options: &MergeOptions, report: &mut MergeReport) {
    let name = shapes::shape_name(shape);
    let body = match shape.child_mut("p:txBody") {
        Some(body) => body,
        None => {
            report.skipped.push(Skipped::new(name, SkipReason::MissingTextBody));
            return;
        }
    };

    if let Some(template) = body.children_named("a:p").last().cloned() {
        let existing = body.children_named("a:p").count();
        for _ in existing..bullets.len() {
            body.insert_after_last("a:p", template.clone());
        }
    }

    let positions = paragraph_positions(body);
    for (i, bullet) in bullets.iter().enumerate() {
        match positions.get(i).and_then(|&pos| body.element_at_mut(pos)) {
            Some(p) => {
                write_bullet(p, bullet, options);
                report.paragraphs += 1;
            }
            None => {
                report.skipped.push(Skipped::new(
                    format!("{} bullet {}", name, i + 1),
                    SkipReason::MissingParagraph,
                ));
            }
        }
    }

    let keep = bullets.len().max(1);
    for &pos in positions.iter().skip(keep).rev() {
        body.children.remove(pos);
    }
    if bullets.is_empty() {
        if let Some(p) = positions.first().and_then(|&pos| body.element_at_mut(pos)) {
            clear_runs(p);
        }
    }

    report.body_shape = Some(name);
}

fn write_bullet(p: &mut XmlElement, bullet: &Bullet, options: &MergeOptions) {
    match first_run_only(p) {
        Some(run) => set_run_text(run, &bullet.text),
        None => set_paragraph_text(p, &bullet.text),
    }

    let ppr = p.get_or_insert_first("a:pPr");
    if bullet.level == 0 {
        ppr.remove_attr("lvl");
        ppr.remove_attr("marL");
        ppr.remove_children("a:ind");
    } else {
        ppr.set_attr("lvl", bullet.level.to_string());
        // Left indent goes on `marL`; DrawingML has no `a:ind` in `a:pPr`
        ppr.set_attr("marL", (bullet.level as i64 * options.indent_per_level).to_string());
    }
    ppr.remove_children("a:buNone");
}

fn paragraph_positions(body: &XmlElement) -> Vec<usize> {
    body.children
        .iter()
        .enumerate()
        .filter_map(|(i, node)| match node {
            XmlNode::Element(el) if el.name == "a:p" => Some(i),
            _ => None,
        })
        .collect()
}

/// Drop every run after the first; the first run, if any.
fn first_run_only(p: &mut XmlElement) -> Option<&mut XmlElement> {
    let mut seen = false;
    p.children.retain(|node| match node {
        XmlNode::Element(el) if el.name == "a:r" => !std::mem::replace(&mut seen, true),
        _ => true,
    });
    p.child_mut("a:r")
}

fn set_run_text(run: &mut XmlElement, text: &str) {
    run.get_or_append("a:t").set_text(text);
}

fn clear_runs(p: &mut XmlElement) {
    p.children.retain(|node| {
        !matches!(node, XmlNode::Element(el) if matches!(el.name.as_str(), "a:r" | "a:br" | "a:fld"))
    });
}

/// Replace a paragraph's content with plain runs; line breaks become `a:br`.
fn set_paragraph_text(p: &mut XmlElement, text: &str) {
    clear_runs(p);
    let mut nodes = Vec::new();
    for (i, line) in text.split(['\n', '\u{0b}']).enumerate() {
        if i > 0 {
            nodes.push(XmlElement::new("a:br"));
        }
        if !line.is_empty() {
            nodes.push(XmlElement::new("a:r").with_child(XmlElement::new("a:t").with_text(line)));
        }
    }
    for node in nodes {
        p.insert_before(node, "a:endParaRPr");
    }
}

impl Presentation {
    /// Merge an outline entry into a slide, then re-run the normalizer.
    pub fn merge_content(
        &mut self,
        index: usize,
        entry: &OutlineEntry,
        options: &MergeOptions,
        rules: &LogoRules,
    ) -> Result<MergeReport> {
        let width = self.slide_width();
        let slide = self.slide_mut(index)?;
        let part = slide.part_name().to_string();
        let tree = match slide.shape_tree_mut() {
            Some(tree) => tree,
            None => {
                let mut report = MergeReport::default();
                report.skipped.push(Skipped::new(
                    part,
                    SkipReason::Failed("slide has no shape tree".to_string()),
                ));
                return Ok(report);
            }
        };

        let mut report = apply_content(tree, entry, options);
        report.normalize = normalize_shapes(tree, width, rules);
        for skip in &report.skipped {
            log::warn!("{}: {}", part, skip);
        }
        Ok(report)
    }
}
