//! Reading and adjusting shape elements of a slide's `p:spTree`.

use deck_core::{Rect, ShapeAttrs, ShapeKind, SkipReason, XmlElement};
use std::collections::HashMap;

/// Element names that are shapes when they appear directly under `p:spTree`.
pub const SHAPE_ELEMENTS: &[&str] = &[
    "p:sp",
    "p:pic",
    "p:grpSp",
    "p:graphicFrame",
    "p:cxnSp",
    "p:contentPart",
];

/// Relationship-reference attributes rewritten when content moves between parts.
pub const REFERENCE_ATTRIBUTES: &[&str] = &["r:embed", "r:link", "r:id"];

pub fn is_shape(el: &XmlElement) -> bool {
    SHAPE_ELEMENTS.contains(&el.name.as_str())
}

/// The `*:cNvPr` element of a shape.
pub fn non_visual_props(el: &XmlElement) -> Option<&XmlElement> {
    el.elements()
        .find(|child| child.local_name().starts_with("nv"))
        .and_then(|nv| nv.elements().find(|c| c.local_name() == "cNvPr"))
}

pub fn shape_name(el: &XmlElement) -> String {
    non_visual_props(el)
        .and_then(|props| props.attr("name"))
        .filter(|name| !name.is_empty())
        .map(str::to_string)
        .unwrap_or_else(|| el.name.clone())
}

pub fn is_placeholder(el: &XmlElement) -> bool {
    el.elements()
        .find(|child| child.local_name().starts_with("nv"))
        .and_then(|nv| nv.child("p:nvPr"))
        .and_then(|pr| pr.child("p:ph"))
        .is_some()
}

pub fn shape_kind(el: &XmlElement) -> ShapeKind {
    match el.name.as_str() {
        "p:pic" | "p:sp" if is_placeholder(el) => ShapeKind::Placeholder,
        "p:pic" => ShapeKind::Picture,
        "p:sp" => {
            if el.path(&["p:spPr", "a:custGeom"]).is_some() {
                ShapeKind::Freeform
            } else if el.path(&["p:nvSpPr", "p:cNvSpPr"]).and_then(|e| e.attr("txBox"))
                == Some("1")
            {
                ShapeKind::TextBox
            } else {
                ShapeKind::AutoShape
            }
        }
        "p:grpSp" => ShapeKind::Group,
        "p:graphicFrame" => ShapeKind::GraphicFrame,
        "p:cxnSp" => ShapeKind::Connector,
        _ => ShapeKind::Other,
    }
}

fn xfrm_path(el: &XmlElement) -> Option<&'static [&'static str]> {
    match el.name.as_str() {
        "p:sp" | "p:pic" | "p:cxnSp" => Some(&["p:spPr", "a:xfrm"]),
        "p:grpSp" => Some(&["p:grpSpPr", "a:xfrm"]),
        "p:graphicFrame" => Some(&["p:xfrm"]),
        _ => None,
    }
}

fn xfrm(el: &XmlElement) -> Option<&XmlElement> {
    el.path(xfrm_path(el)?)
}

fn xfrm_mut(el: &mut XmlElement) -> Option<&mut XmlElement> {
    let path = xfrm_path(el)?;
    el.path_mut(path)
}

fn coordinate(el: &XmlElement, key: &str) -> Result<i64, SkipReason> {
    let raw = el.attr(key).ok_or(SkipReason::MissingGeometry)?;
    raw.trim()
        .parse::<i64>()
        .map_err(|_| SkipReason::InvalidGeometry(raw.to_string()))
}

/// Explicit geometry of a shape, in EMU.
pub fn shape_rect(el: &XmlElement) -> Result<Rect, SkipReason> {
    let xfrm = xfrm(el).ok_or(SkipReason::MissingGeometry)?;
    let off = xfrm.child("a:off").ok_or(SkipReason::MissingGeometry)?;
    let ext = xfrm.child("a:ext").ok_or(SkipReason::MissingGeometry)?;
    Ok(Rect::new(
        coordinate(off, "x")?,
        coordinate(off, "y")?,
        coordinate(ext, "cx")?,
        coordinate(ext, "cy")?,
    ))
}

/// Everything the classifier needs, or why it cannot be had.
pub fn shape_attrs(el: &XmlElement) -> Result<ShapeAttrs, SkipReason> {
    let rect = shape_rect(el)?;
    Ok(ShapeAttrs {
        kind: shape_kind(el),
        left: rect.left,
        top: rect.top,
        width: rect.width,
        height: rect.height,
        has_embedded_image: has_embedded_image(el),
    })
}

/// Move a shape; the extent is left untouched.
pub fn set_offset(el: &mut XmlElement, left: i64, top: i64) -> Result<(), SkipReason> {
    let off = xfrm_mut(el)
        .and_then(|xfrm| xfrm.child_mut("a:off"))
        .ok_or(SkipReason::MissingGeometry)?;
    off.set_attr("x", left.to_string());
    off.set_attr("y", top.to_string());
    Ok(())
}

pub fn set_width(el: &mut XmlElement, width: i64) -> Result<(), SkipReason> {
    let ext = xfrm_mut(el)
        .and_then(|xfrm| xfrm.child_mut("a:ext"))
        .ok_or(SkipReason::MissingGeometry)?;
    ext.set_attr("cx", width.to_string());
    Ok(())
}

/// Whether an `a:blip` inside the shape embeds an image part.
pub fn has_embedded_image(el: &XmlElement) -> bool {
    el.descendants()
        .any(|d| d.name == "a:blip" && d.attr("r:embed").is_some())
}

/// Number of `r:embed` references at or below `el`.
pub fn image_reference_count(el: &XmlElement) -> usize {
    std::iter::once(el)
        .chain(el.descendants())
        .filter(|d| d.attr("r:embed").is_some())
        .count()
}

/// Text of a paragraph; line breaks become vertical tabs.
pub fn paragraph_text(p: &XmlElement) -> String {
    let mut text = String::new();
    for child in p.elements() {
        match child.name.as_str() {
            "a:r" | "a:fld" => {
                if let Some(t) = child.child("a:t") {
                    text.push_str(&t.text());
                }
            }
            "a:br" => text.push('\u{0b}'),
            _ => {}
        }
    }
    text
}

/// Text of every paragraph of a text body, joined by newlines.
pub fn paragraphs_text(tx_body: &XmlElement) -> String {
    tx_body
        .children_named("a:p")
        .map(paragraph_text)
        .collect::<Vec<_>>()
        .join("\n")
}

/// Text of an `p:sp` with a text frame; `None` for any other shape.
pub fn shape_text(el: &XmlElement) -> Option<String> {
    if el.name != "p:sp" {
        return None;
    }
    el.child("p:txBody").map(paragraphs_text)
}

/// One more than the largest `cNvPr@id` in the tree.
pub fn next_shape_id(root: &XmlElement) -> u32 {
    root.descendants()
        .filter(|el| el.local_name() == "cNvPr")
        .filter_map(|el| el.attr("id").and_then(|id| id.parse::<u32>().ok()))
        .max()
        .unwrap_or(1)
        + 1
}

/// Rewrite relationship references at or below `el` through `map`.
///
/// Ids missing from the map are left as they are. Returns the number of
/// attributes changed.
pub fn remap_references(el: &mut XmlElement, map: &HashMap<String, String>) -> usize {
    let mut changed = 0;
    el.walk_mut(&mut |node| {
        for (key, value) in node.attributes.iter_mut() {
            if !REFERENCE_ATTRIBUTES.contains(&key.as_str()) {
                continue;
            }
            if let Some(new_id) = map.get(value.as_str()) {
                if new_id != value {
                    *value = new_id.clone();
                    changed += 1;
                }
            }
        }
    });
    changed
}

/// Distinct relationship ids referenced at or below `el`, in document order.
pub fn referenced_ids(el: &XmlElement) -> Vec<String> {
    let mut ids: Vec<String> = Vec::new();
    for node in std::iter::once(el).chain(el.descendants()) {
        for (key, value) in &node.attributes {
            if REFERENCE_ATTRIBUTES.contains(&key.as_str()) && !ids.contains(value) {
                ids.push(value.clone());
            }
        }
    }
    ids
}

/// `a:xfrm` element for a rectangle.
pub fn xfrm_element(rect: Rect) -> XmlElement {
    XmlElement::new("a:xfrm")
        .with_child(
            XmlElement::new("a:off")
                .with_attr("x", rect.left.to_string())
                .with_attr("y", rect.top.to_string()),
        )
        .with_child(
            XmlElement::new("a:ext")
                .with_attr("cx", rect.width.to_string())
                .with_attr("cy", rect.height.to_string()),
        )
}

#[cfg(test)]
mod tests {
    use super::*;
    use deck_core::XmlDocument;

    fn parse(xml: &str) -> XmlElement {
        let wrapped = format!(
            r#"<p:spTree xmlns:a="http://schemas.openxmlformats.org/drawingml/2006/main" xmlns:p="http://schemas.openxmlformats.org/presentationml/2006/main" xmlns:r="http://schemas.openxmlformats.org/officeDocument/2006/relationships">{}</p:spTree>"#,
            xml
        );
        let doc = XmlDocument::parse(wrapped.as_bytes()).unwrap();
        let el = doc.root.elements().next().unwrap().clone();
        el
    }

    #[test]
    fn test_shape_kind() {
        let ph = parse(r#"<p:sp><p:nvSpPr><p:cNvPr id="2" name="Title 1"/><p:cNvSpPr/><p:nvPr><p:ph type="title"/></p:nvPr></p:nvSpPr><p:spPr/></p:sp>"#);
        assert_eq!(shape_kind(&ph), ShapeKind::Placeholder);

        let free = parse(r#"<p:sp><p:nvSpPr><p:cNvPr id="3" name="Freeform 2"/><p:cNvSpPr/><p:nvPr/></p:nvSpPr><p:spPr><a:custGeom/></p:spPr></p:sp>"#);
        assert_eq!(shape_kind(&free), ShapeKind::Freeform);

        let text = parse(r#"<p:sp><p:nvSpPr><p:cNvPr id="4" name="TextBox 3"/><p:cNvSpPr txBox="1"/><p:nvPr/></p:nvSpPr><p:spPr/></p:sp>"#);
        assert_eq!(shape_kind(&text), ShapeKind::TextBox);
        assert_eq!(shape_name(&text), "TextBox 3");

        let pic = parse(r#"<p:pic><p:nvPicPr><p:cNvPr id="5" name="Picture 4"/><p:cNvPicPr/><p:nvPr/></p:nvPicPr></p:pic>"#);
        assert_eq!(shape_kind(&pic), ShapeKind::Picture);
    }

    #[test]
    fn test_geometry_read_and_write() {
        let mut pic = parse(r#"<p:pic><p:nvPicPr><p:cNvPr id="5" name="Logo"/><p:cNvPicPr/><p:nvPr/></p:nvPicPr><p:blipFill><a:blip r:embed="rId2"/></p:blipFill><p:spPr><a:xfrm><a:off x="10" y="20"/><a:ext cx="30" cy="40"/></a:xfrm></p:spPr></p:pic>"#);
        let attrs = shape_attrs(&pic).unwrap();
        assert_eq!((attrs.left, attrs.top, attrs.width, attrs.height), (10, 20, 30, 40));
        assert!(attrs.has_embedded_image);

        set_offset(&mut pic, 1, 2).unwrap();
        set_width(&mut pic, 3).unwrap();
        assert_eq!(shape_rect(&pic).unwrap(), Rect::new(1, 2, 3, 40));
    }

    #[test]
    fn test_missing_and_invalid_geometry() {
        let bare = parse(r#"<p:pic><p:nvPicPr><p:cNvPr id="5" name="Logo"/></p:nvPicPr><p:spPr/></p:pic>"#);
        assert_eq!(shape_attrs(&bare), Err(SkipReason::MissingGeometry));

        let bad = parse(r#"<p:pic><p:spPr><a:xfrm><a:off x="1.5" y="0"/><a:ext cx="1" cy="1"/></a:xfrm></p:spPr></p:pic>"#);
        assert_eq!(
            shape_attrs(&bad),
            Err(SkipReason::InvalidGeometry("1.5".to_string()))
        );
    }

    #[test]
    fn test_shape_text() {
        let sp = parse(r#"<p:sp><p:txBody><a:bodyPr/><a:p><a:r><a:t>One</a:t></a:r><a:br/><a:r><a:t>Two</a:t></a:r></a:p><a:p><a:fld id="x"><a:t>3</a:t></a:fld></a:p></p:txBody></p:sp>"#);
        assert_eq!(shape_text(&sp).as_deref(), Some("One\u{0b}Two\n3"));

        let pic = parse(r#"<p:pic/>"#);
        assert_eq!(shape_text(&pic), None);
    }

    #[test]
    fn test_remap_references() {
        let mut sp = parse(r#"<p:sp><p:nvSpPr><p:cNvPr id="9" name="Link"><a:hlinkClick r:id="rId3"/></p:cNvPr></p:nvSpPr><p:spPr><a:blipFill><a:blip r:embed="rId2"/></a:blipFill></p:spPr></p:sp>"#);
        assert_eq!(referenced_ids(&sp), vec!["rId3".to_string(), "rId2".to_string()]);

        let map: HashMap<String, String> = [("rId2", "rId5"), ("rId7", "rId8")]
            .iter()
            .map(|(a, b)| (a.to_string(), b.to_string()))
            .collect();
        assert_eq!(remap_references(&mut sp, &map), 1);
        assert_eq!(sp.find("a:blip").unwrap().attr("r:embed"), Some("rId5"));
        // Unmapped ids stay as they are
        assert_eq!(sp.find("a:hlinkClick").unwrap().attr("r:id"), Some("rId3"));
        assert_eq!(next_shape_id(&sp), 10);
    }
}
