//! Moving logos and decorative bars to their fixed positions.

use crate::shapes::{self, set_offset, shape_attrs, shape_kind};
use deck_core::{Classification, LogoRules, ShapeKind, Skipped, XmlElement};
use serde::Serialize;

/// Outcome of one normalizer pass.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct NormalizeReport {
    pub logos: usize,
    pub bars: usize,
    /// Shapes whose position actually changed.
    pub moved: usize,
    pub skipped: Vec<Skipped>,
}

/// Normalize the top-level shapes of a `p:spTree`.
pub fn normalize_shapes(tree: &mut XmlElement, slide_width: i64, rules: &LogoRules) -> NormalizeReport {
    let mut report = NormalizeReport::default();

    for shape in tree.elements_mut().filter(|el| shapes::is_shape(el)) {
        if !matches!(shape_kind(shape), ShapeKind::Picture | ShapeKind::Freeform) {
            continue;
        }
        let name = shapes::shape_name(shape);
        let attrs = match shape_attrs(shape) {
            Ok(attrs) => attrs,
            Err(reason) => {
                log::warn!("Not normalizing {}: {}", name, reason);
                report.skipped.push(Skipped::new(name, reason));
                continue;
            }
        };

        let target = match rules.classify(&attrs, slide_width) {
            Classification::Logo => {
                report.logos += 1;
                rules.logo_position(attrs.width, slide_width)
            }
            Classification::DecorativeBar => {
                report.bars += 1;
                (attrs.left, rules.bar_top)
            }
            Classification::Other => continue,
        };

        if target == (attrs.left, attrs.top) {
            continue;
        }
        match set_offset(shape, target.0, target.1) {
            Ok(()) => {
                log::debug!(
                    "Moved {} from ({}, {}) to ({}, {})",
                    name,
                    attrs.left,
                    attrs.top,
                    target.0,
                    target.1
                );
                report.moved += 1;
            }
            Err(reason) => report.skipped.push(Skipped::new(name, reason)),
        }
    }

    report
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fixtures::{freeform_shape, picture_shape, text_shape, SLIDE_WIDTH};
    use crate::shapes::shape_rect;
    use deck_core::units::inches;
    use deck_core::{Rect, SkipReason, XmlDocument};

    fn tree(shapes: &str) -> XmlElement {
        let xml = format!(
            r#"<p:spTree xmlns:a="http://schemas.openxmlformats.org/drawingml/2006/main" xmlns:p="http://schemas.openxmlformats.org/presentationml/2006/main" xmlns:r="http://schemas.openxmlformats.org/officeDocument/2006/relationships"><p:nvGrpSpPr/><p:grpSpPr/>{}</p:spTree>"#,
            shapes
        );
        XmlDocument::parse(xml.as_bytes()).unwrap().root
    }

    fn rect_of(tree: &XmlElement, name: &str) -> Rect {
        let shape = tree
            .elements()
            .find(|el| shapes::shape_name(el) == name)
            .unwrap();
        shape_rect(shape).unwrap()
    }

    #[test]
    fn test_two_inch_picture_goes_to_logo_corner() {
        let rect = Rect::new(inches(3.0), inches(4.0), inches(2.0), inches(2.0));
        let mut tree = tree(&picture_shape(2, "Logo", "rId2", rect));
        let report = normalize_shapes(&mut tree, SLIDE_WIDTH, &LogoRules::default());
        assert_eq!(report.logos, 1);
        assert_eq!(report.moved, 1);

        let moved = rect_of(&tree, "Logo");
        assert_eq!(moved.top, 0);
        assert_eq!(moved.left, SLIDE_WIDTH - inches(2.0) - inches(0.3));
        assert_eq!(moved.width, inches(2.0));
    }

    #[test]
    fn test_bars_and_freeform_logos() {
        let shapes = [
            freeform_shape(2, "Bar", Rect::new(inches(0.5), inches(2.5), inches(8.0), inches(0.1)), None),
            freeform_shape(3, "Corner", Rect::new(inches(11.0), inches(0.5), inches(1.0), inches(1.0)), Some("rId2")),
            freeform_shape(4, "Deep", Rect::new(0, inches(5.0), inches(8.0), inches(0.1)), None),
            text_shape(5, "Text", Rect::new(0, inches(1.0), inches(4.0), inches(1.0)), &["x"]),
        ]
        .concat();
        let mut tree = tree(&shapes);
        let report = normalize_shapes(&mut tree, SLIDE_WIDTH, &LogoRules::default());
        assert_eq!((report.logos, report.bars, report.moved), (1, 1, 2));

        let bar = rect_of(&tree, "Bar");
        assert_eq!((bar.left, bar.top), (inches(0.5), inches(1.06)));
        let corner = rect_of(&tree, "Corner");
        assert_eq!((corner.left, corner.top), (SLIDE_WIDTH - inches(1.0) - inches(0.3), 0));
        assert_eq!(rect_of(&tree, "Deep").top, inches(5.0));
        assert_eq!(rect_of(&tree, "Text").top, inches(1.0));
    }

    #[test]
    fn test_second_pass_changes_nothing() {
        let shapes = [
            picture_shape(2, "Logo", "rId2", Rect::new(0, inches(3.0), inches(1.5), inches(1.0))),
            freeform_shape(3, "Bar", Rect::new(0, inches(3.0), inches(8.0), inches(0.1)), None),
            freeform_shape(4, "Wide", Rect::new(inches(10.0), inches(1.0), inches(5.0), inches(1.0)), Some("rId2")),
        ]
        .concat();
        let mut tree = tree(&shapes);
        let rules = LogoRules::default();
        let first = normalize_shapes(&mut tree, SLIDE_WIDTH, &rules);
        assert_eq!(first.moved, 3);

        let snapshot = tree.clone();
        let second = normalize_shapes(&mut tree, SLIDE_WIDTH, &rules);
        assert_eq!(second.moved, 0);
        assert_eq!(tree, snapshot);
    }

    #[test]
    fn test_missing_geometry_is_skipped() {
        let shapes = r#"<p:pic><p:nvPicPr><p:cNvPr id="2" name="Loose"/><p:cNvPicPr/><p:nvPr/></p:nvPicPr><p:blipFill><a:blip r:embed="rId2"/></p:blipFill><p:spPr/></p:pic>"#;
        let mut tree = tree(shapes);
        let report = normalize_shapes(&mut tree, SLIDE_WIDTH, &LogoRules::default());
        assert_eq!(report.moved, 0);
        assert_eq!(
            report.skipped,
            vec![Skipped::new("Loose", SkipReason::MissingGeometry)]
        );
    }
}
