//! Core domain types, outline folding, shape classification and the XML
//! tree shared by the DOCX and PPTX backends.

pub mod classify;
pub mod error;
pub mod outline;
pub mod types;
pub mod units;
pub mod xml;

pub use classify::{Classification, LogoRules, ShapeAttrs, ShapeKind};
pub use error::{Error, Result};
pub use outline::{fold_outline, OutlineBuilder, OutlineOptions, OutlineParagraph};
pub use types::{Bullet, OutlineEntry, Rect, SkipReason, Skipped};
pub use xml::{XmlDocument, XmlElement, XmlNode};
