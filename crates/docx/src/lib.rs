//! DOCX (Office Open XML) outline reader.
//!
//! Reads the body paragraphs of a .docx file and folds them into slide
//! outline entries.

pub mod parser;

pub use parser::{paragraphs_from_xml, DocxParser};
