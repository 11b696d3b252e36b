//! Length unit conversions.
//!
//! Slide geometry is expressed in EMU (English Metric Units); DOCX paragraph
//! indentation is expressed in twips.

pub const EMUS_PER_INCH: i64 = 914_400;

/// Resolution assumed when an image carries no density metadata.
pub const DEFAULT_DPI: f64 = 96.0;

/// Convert inches to EMU, truncating toward zero.
#[inline]
pub fn inches(value: f64) -> i64 {
    (value * EMUS_PER_INCH as f64) as i64
}

/// Convert a pixel length at the given resolution to EMU.
///
/// A non-positive or non-finite `dpi` falls back to [`DEFAULT_DPI`].
#[inline]
pub fn px_to_emu(px: u32, dpi: f64) -> i64 {
    let dpi = if dpi.is_finite() && dpi > 0.0 { dpi } else { DEFAULT_DPI };
    (px as f64 / dpi * EMUS_PER_INCH as f64) as i64
}
