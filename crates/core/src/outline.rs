//! Folding document paragraphs into slide outline entries.
//!
//! A paragraph starting with the slide marker opens a new entry; every other
//! non-blank paragraph becomes a bullet of the entry currently being built.

use crate::types::OutlineEntry;

/// Indentation (in twips) that corresponds to one outline level.
pub const TWIPS_PER_LEVEL: i64 = 720;

/// Deepest level inferred from indentation alone.
pub const MAX_INDENT_LEVEL: u8 = 2;

/// Markers recognised while folding paragraphs.
#[derive(Debug, Clone)]
pub struct OutlineOptions {
    /// Prefix that starts a new slide, matched against the trimmed text.
    pub slide_marker: String,

    /// Separator between the slide label and its title.
    pub title_delimiter: char,
}

impl Default for OutlineOptions {
    fn default() -> Self {
        Self {
            slide_marker: "Slide ".to_string(),
            title_delimiter: '\u{2013}',
        }
    }
}

/// A paragraph as read from the outline document.
///
/// Level metadata is kept raw so that malformed values degrade to level 0
/// instead of failing the read.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct OutlineParagraph {
    pub text: String,

    /// `w:numPr/w:ilvl@w:val`, when numbering is present.
    pub numbering_level: Option<String>,

    /// `w:ind@w:left` in twips, when indentation is present.
    pub left_indent: Option<String>,
}

impl OutlineParagraph {
    pub fn new(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            ..Default::default()
        }
    }

    pub fn with_numbering_level(mut self, level: impl Into<String>) -> Self {
        self.numbering_level = Some(level.into());
        self
    }

    pub fn with_left_indent(mut self, twips: impl Into<String>) -> Self {
        self.left_indent = Some(twips.into());
        self
    }

    /// Outline level of this paragraph.
    ///
    /// Explicit numbering wins; otherwise a positive left indent maps to
    /// `floor(indent / 720)` capped at 2; anything else is level 0.
    pub fn level(&self) -> u8 {
        if let Some(level) = self
            .numbering_level
            .as_deref()
            .and_then(|v| v.trim().parse::<u8>().ok())
        {
            return level;
        }

        match self
            .left_indent
            .as_deref()
            .and_then(|v| v.trim().parse::<i64>().ok())
        {
            Some(indent) if indent > 0 => {
                let level = indent / TWIPS_PER_LEVEL;
                level.min(MAX_INDENT_LEVEL as i64) as u8
            }
            _ => 0,
        }
    }
}

/// Accumulator for the paragraph fold.
#[derive(Debug, Default)]
pub struct OutlineBuilder {
    entries: Vec<OutlineEntry>,
    current: Option<OutlineEntry>,
    dropped: usize,
}

impl OutlineBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Feed one paragraph.
    pub fn push(mut self, paragraph: &OutlineParagraph, options: &OutlineOptions) -> Self {
        let text = paragraph.text.trim();
        if text.is_empty() {
            return self;
        }

        if text.starts_with(options.slide_marker.as_str()) {
            if let Some(done) = self.current.take() {
                self.entries.push(done);
            }
            let title = match text.split_once(options.title_delimiter) {
                Some((_, rest)) => rest.trim(),
                None => text,
            };
            log::debug!("Outline entry: {}", title);
            self.current = Some(OutlineEntry::new(title));
            return self;
        }

        match self.current.as_mut() {
            Some(entry) => entry.push_bullet(text, paragraph.level()),
            None => {
                log::debug!("Dropping paragraph before first slide marker: {}", text);
                self.dropped += 1;
            }
        }
        self
    }

    /// Paragraphs seen before the first slide marker.
    pub fn dropped(&self) -> usize {
        self.dropped
    }

    /// Emit all entries, including an unterminated trailing one.
    pub fn finish(mut self) -> Vec<OutlineEntry> {
        if let Some(done) = self.current.take() {
            self.entries.push(done);
        }
        self.entries
    }
}

/// Fold paragraphs into outline entries.
pub fn fold_outline<'a, I>(paragraphs: I, options: &OutlineOptions) -> Vec<OutlineEntry>
where
    I: IntoIterator<Item = &'a OutlineParagraph>,
{
    paragraphs
        .into_iter()
        .fold(OutlineBuilder::new(), |builder, p| builder.push(p, options))
        .finish()
}
