//! Logo and decorative-bar classification.
//!
//! Pure policy over a shape's kind and geometry, independent of any XML tree.

use crate::units::inches;
use serde::{Deserialize, Serialize};

/// Shape categories relevant to the placement rules.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ShapeKind {
    /// Any shape bound to a layout placeholder.
    Placeholder,
    Picture,
    /// An `sp` with custom geometry.
    Freeform,
    TextBox,
    AutoShape,
    Group,
    GraphicFrame,
    Connector,
    Other,
}

/// What the classification needs to know about a shape.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ShapeAttrs {
    pub kind: ShapeKind,
    pub left: i64,
    pub top: i64,
    pub width: i64,
    pub height: i64,
    /// At least one `a:blip` with an `r:embed` reference inside the shape.
    pub has_embedded_image: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Classification {
    Logo,
    DecorativeBar,
    Other,
}

/// Placement thresholds, all lengths in EMU.
#[derive(Debug, Clone, PartialEq)]
pub struct LogoRules {
    /// Pictures no larger than this on both sides are logos.
    pub max_picture_logo_size: i64,
    /// Freeform logos sit above this offset...
    pub max_freeform_logo_top: i64,
    /// ...and to the right of this fraction of the slide width.
    pub min_freeform_logo_left_ratio: f64,
    /// Distance between a placed logo and the right slide edge.
    pub logo_margin_right: i64,
    pub logo_top: i64,
    /// Freeforms above this offset that are not logos are decorative bars.
    pub max_bar_top: i64,
    pub bar_top: i64,
}

impl Default for LogoRules {
    fn default() -> Self {
        Self {
            max_picture_logo_size: inches(3.0),
            max_freeform_logo_top: inches(2.0),
            min_freeform_logo_left_ratio: 0.7,
            logo_margin_right: inches(0.3),
            logo_top: 0,
            max_bar_top: inches(4.0),
            bar_top: inches(1.06),
        }
    }
}

impl LogoRules {
    /// Classify a shape on a slide of the given width.
    pub fn classify(&self, attrs: &ShapeAttrs, slide_width: i64) -> Classification {
        match attrs.kind {
            ShapeKind::Picture => {
                if attrs.width <= self.max_picture_logo_size
                    && attrs.height <= self.max_picture_logo_size
                {
                    Classification::Logo
                } else {
                    Classification::Other
                }
            }
            ShapeKind::Freeform => {
                let in_logo_corner =
                    attrs.has_embedded_image && self.right_of_logo_line(attrs, slide_width);
                if in_logo_corner && attrs.top < self.max_freeform_logo_top {
                    Classification::Logo
                } else if attrs.has_embedded_image && self.at_logo_anchor(attrs, slide_width) {
                    // A wide logo already moved into place may end up left of the
                    // logo line; keep it a logo so repeated passes agree.
                    Classification::Logo
                } else if attrs.top < self.max_bar_top && !in_logo_corner {
                    Classification::DecorativeBar
                } else {
                    Classification::Other
                }
            }
            _ => Classification::Other,
        }
    }

    /// Top-left corner a logo of this size is moved to.
    pub fn logo_position(&self, width: i64, slide_width: i64) -> (i64, i64) {
        (slide_width - width - self.logo_margin_right, self.logo_top)
    }

    fn right_of_logo_line(&self, attrs: &ShapeAttrs, slide_width: i64) -> bool {
        attrs.left as f64 > slide_width as f64 * self.min_freeform_logo_left_ratio
    }

    fn at_logo_anchor(&self, attrs: &ShapeAttrs, slide_width: i64) -> bool {
        (attrs.left, attrs.top) == self.logo_position(attrs.width, slide_width)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SLIDE_WIDTH: i64 = 12_192_000;

    fn attrs(kind: ShapeKind, left: f64, top: f64, width: f64, height: f64, image: bool) -> ShapeAttrs {
        ShapeAttrs {
            kind,
            left: inches(left),
            top: inches(top),
            width: inches(width),
            height: inches(height),
            has_embedded_image: image,
        }
    }

    #[test]
    fn test_small_picture_is_logo() {
        let rules = LogoRules::default();
        let pic = attrs(ShapeKind::Picture, 1.0, 5.0, 2.0, 2.0, true);
        assert_eq!(rules.classify(&pic, SLIDE_WIDTH), Classification::Logo);

        let big = attrs(ShapeKind::Picture, 1.0, 5.0, 3.5, 2.0, true);
        assert_eq!(rules.classify(&big, SLIDE_WIDTH), Classification::Other);

        // Exactly 3 inches still counts
        let edge = attrs(ShapeKind::Picture, 0.0, 0.0, 3.0, 3.0, true);
        assert_eq!(rules.classify(&edge, SLIDE_WIDTH), Classification::Logo);
    }

    #[test]
    fn test_freeform_logo_needs_image_and_corner() {
        let rules = LogoRules::default();
        let logo = attrs(ShapeKind::Freeform, 11.5, 0.5, 1.0, 1.0, true);
        assert_eq!(rules.classify(&logo, SLIDE_WIDTH), Classification::Logo);

        let low = attrs(ShapeKind::Freeform, 11.5, 2.5, 1.0, 1.0, true);
        assert_eq!(rules.classify(&low, SLIDE_WIDTH), Classification::Other);

        let no_image = attrs(ShapeKind::Freeform, 11.5, 0.5, 1.0, 1.0, false);
        assert_eq!(rules.classify(&no_image, SLIDE_WIDTH), Classification::DecorativeBar);
    }

    #[test]
    fn test_decorative_bar() {
        let rules = LogoRules::default();
        let bar = attrs(ShapeKind::Freeform, 0.0, 1.5, 8.0, 0.1, false);
        assert_eq!(rules.classify(&bar, SLIDE_WIDTH), Classification::DecorativeBar);

        let deep = attrs(ShapeKind::Freeform, 0.0, 4.5, 8.0, 0.1, false);
        assert_eq!(rules.classify(&deep, SLIDE_WIDTH), Classification::Other);

        let text = attrs(ShapeKind::AutoShape, 0.0, 1.5, 8.0, 0.1, false);
        assert_eq!(rules.classify(&text, SLIDE_WIDTH), Classification::Other);
    }

    #[test]
    fn test_placed_wide_logo_stays_logo() {
        let rules = LogoRules::default();
        let width = inches(5.0);
        let (left, top) = rules.logo_position(width, SLIDE_WIDTH);
        let placed = ShapeAttrs {
            kind: ShapeKind::Freeform,
            left,
            top,
            width,
            height: inches(1.0),
            has_embedded_image: true,
        };
        assert!((left as f64) < SLIDE_WIDTH as f64 * 0.7);
        assert_eq!(rules.classify(&placed, SLIDE_WIDTH), Classification::Logo);
    }

    #[test]
    fn test_logo_position() {
        let rules = LogoRules::default();
        let (left, top) = rules.logo_position(inches(2.0), SLIDE_WIDTH);
        assert_eq!(top, 0);
        assert_eq!(left, SLIDE_WIDTH - inches(2.0) - inches(0.3));
    }
}
