//! Domain types shared by the outline reader and the deck writer.

use serde::{Deserialize, Serialize};
use std::fmt;

/// One slide worth of outline content.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OutlineEntry {
    /// Slide title.
    pub title: String,

    /// Bullet lines in document order.
    pub bullets: Vec<Bullet>,
}

impl OutlineEntry {
    /// Create an entry with the given title and no bullets.
    pub fn new(title: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            bullets: Vec::new(),
        }
    }

    /// Add a bullet line.
    pub fn push_bullet(&mut self, text: impl Into<String>, level: u8) {
        self.bullets.push(Bullet::new(text, level));
    }

    /// Builder-style variant of [`OutlineEntry::push_bullet`].
    pub fn with_bullet(mut self, text: impl Into<String>, level: u8) -> Self {
        self.push_bullet(text, level);
        self
    }
}

/// A bullet line with its 0-based outline level.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Bullet {
    pub text: String,
    pub level: u8,
}

impl Bullet {
    pub fn new(text: impl Into<String>, level: u8) -> Self {
        Self {
            text: text.into(),
            level,
        }
    }
}

/// An axis-aligned rectangle in EMU.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Rect {
    pub left: i64,
    pub top: i64,
    pub width: i64,
    pub height: i64,
}

impl Rect {
    pub fn new(left: i64, top: i64, width: i64, height: i64) -> Self {
        Self {
            left,
            top,
            width,
            height,
        }
    }

    /// Place a `width` x `height` box so its bottom-right corner sits `margin`
    /// inside the bottom-right corner of a `container_width` x `container_height` area.
    pub fn bottom_right(
        container_width: i64,
        container_height: i64,
        width: i64,
        height: i64,
        margin: i64,
    ) -> Self {
        Self {
            left: container_width - width - margin,
            top: container_height - height - margin,
            width,
            height,
        }
    }

    pub fn right(&self) -> i64 {
        self.left + self.width
    }

    pub fn bottom(&self) -> i64 {
        self.top + self.height
    }
}

/// Why a best-effort step left its target untouched.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum SkipReason {
    /// The shape carries no explicit `a:xfrm` offset/extent.
    MissingGeometry,
    /// A geometry attribute is not an integer.
    InvalidGeometry(String),
    /// The shape has no text body.
    MissingTextBody,
    /// The text body has no paragraph to reuse.
    MissingParagraph,
    /// A referenced part or relationship could not be resolved.
    Unresolved(String),
    /// The operation failed for another reason.
    Failed(String),
}

impl fmt::Display for SkipReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SkipReason::MissingGeometry => write!(f, "no explicit geometry"),
            SkipReason::InvalidGeometry(v) => write!(f, "invalid geometry value '{}'", v),
            SkipReason::MissingTextBody => write!(f, "no text body"),
            SkipReason::MissingParagraph => write!(f, "no paragraph to reuse"),
            SkipReason::Unresolved(what) => write!(f, "unresolved reference: {}", what),
            SkipReason::Failed(msg) => write!(f, "{}", msg),
        }
    }
}

/// A record of one skipped best-effort step.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Skipped {
    /// What was being processed, e.g. a shape name or `slide 3`.
    pub target: String,
    pub reason: SkipReason,
}

impl Skipped {
    pub fn new(target: impl Into<String>, reason: SkipReason) -> Self {
        Self {
            target: target.into(),
            reason,
        }
    }
}

impl fmt::Display for Skipped {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.target, self.reason)
    }
}
