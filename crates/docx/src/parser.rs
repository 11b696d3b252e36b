//! DOCX outline reader.

use deck_core::{
    fold_outline, Error, OutlineEntry, OutlineOptions, OutlineParagraph, Result, XmlDocument,
    XmlElement,
};
use quick_xml::events::Event;
use quick_xml::Reader;
use std::io::{Read, Seek};
use zip::ZipArchive;

const DEFAULT_DOCUMENT_PATH: &str = "word/document.xml";
const OFFICE_DOCUMENT_REL: &str =
    "http://schemas.openxmlformats.org/officeDocument/2006/relationships/officeDocument";

/// Reader for the slide outline stored in a .docx file.
pub struct DocxParser {
    options: OutlineOptions,
}

impl DocxParser {
    /// Create a parser with the default slide marker.
    pub fn new() -> Self {
        Self {
            options: OutlineOptions::default(),
        }
    }

    /// Use custom slide marker and title delimiter.
    pub fn with_options(mut self, options: OutlineOptions) -> Self {
        self.options = options;
        self
    }

    /// Parse a DOCX file into outline entries.
    pub fn parse<R: Read + Seek>(&self, reader: R) -> Result<Vec<OutlineEntry>> {
        let paragraphs = self.read_paragraphs(reader)?;
        let entries = fold_outline(&paragraphs, &self.options);
        log::debug!(
            "Outline has {} entries from {} paragraphs",
            entries.len(),
            paragraphs.len()
        );
        Ok(entries)
    }

    /// Read the body paragraphs of a DOCX file in document order.
    pub fn read_paragraphs<R: Read + Seek>(&self, reader: R) -> Result<Vec<OutlineParagraph>> {
        let mut archive = ZipArchive::new(reader)
            .map_err(|e| Error::ZipError(format!("Failed to open ZIP: {}", e)))?;

        let document_path = self.main_document_path(&mut archive)?;
        let content = read_file_from_archive(&mut archive, &document_path)?;
        paragraphs_from_xml(&content)
    }

    /// Locate the main document part through the package relationships.
    fn main_document_path<R: Read + Seek>(&self, archive: &mut ZipArchive<R>) -> Result<String> {
        let rels = match read_file_from_archive(archive, "_rels/.rels") {
            Ok(rels) => rels,
            Err(e) => {
                log::debug!("No package relationships ({}), assuming {}", e, DEFAULT_DOCUMENT_PATH);
                return Ok(DEFAULT_DOCUMENT_PATH.to_string());
            }
        };
        let text = String::from_utf8_lossy(&rels);

        let mut reader = Reader::from_str(&text);
        reader.trim_text(true);

        loop {
            match reader.read_event() {
                Ok(Event::Empty(ref e)) | Ok(Event::Start(ref e))
                    if e.name().as_ref() == b"Relationship" =>
                {
                    let mut rel_type = String::new();
                    let mut target = String::new();

                    for attr in e.attributes().flatten() {
                        match attr.key.as_ref() {
                            b"Type" => {
                                rel_type = String::from_utf8_lossy(&attr.value).to_string();
                            }
                            b"Target" => {
                                target = String::from_utf8_lossy(&attr.value).to_string();
                            }
                            _ => {}
                        }
                    }

                    if rel_type == OFFICE_DOCUMENT_REL && !target.is_empty() {
                        return Ok(target.trim_start_matches('/').to_string());
                    }
                }
                Ok(Event::Eof) => break,
                Err(e) => {
                    return Err(Error::XmlError(format!(
                        "Error parsing package relationships: {}",
                        e
                    )));
                }
                _ => {}
            }
        }

        Ok(DEFAULT_DOCUMENT_PATH.to_string())
    }
}

impl Default for DocxParser {
    fn default() -> Self {
        Self::new()
    }
}

/// Extract body-level paragraphs from `word/document.xml` content.
///
/// Paragraphs inside tables, text boxes and other containers are not part of
/// the outline.
pub fn paragraphs_from_xml(xml: &[u8]) -> Result<Vec<OutlineParagraph>> {
    let doc = XmlDocument::parse(xml)?;
    let body = doc
        .root
        .child("w:body")
        .ok_or_else(|| Error::DocxParseError("Document has no w:body".to_string()))?;

    Ok(body.children_named("w:p").map(read_paragraph).collect())
}

fn read_paragraph(p: &XmlElement) -> OutlineParagraph {
    let mut text = String::new();
    for child in p.elements() {
        match child.name.as_str() {
            "w:r" => push_run_text(child, &mut text),
            "w:hyperlink" => {
                for run in child.children_named("w:r") {
                    push_run_text(run, &mut text);
                }
            }
            _ => {}
        }
    }

    let ppr = p.child("w:pPr");
    let numbering_level = ppr
        .and_then(|ppr| ppr.path(&["w:numPr", "w:ilvl"]))
        .and_then(|ilvl| ilvl.attr("w:val"))
        .map(str::to_string);
    let left_indent = ppr
        .and_then(|ppr| ppr.child("w:ind"))
        .and_then(|ind| ind.attr("w:left").or_else(|| ind.attr("w:start")))
        .map(str::to_string);

    OutlineParagraph {
        text,
        numbering_level,
        left_indent,
    }
}

fn push_run_text(run: &XmlElement, out: &mut String) {
    for child in run.elements() {
        match child.name.as_str() {
            "w:t" => out.push_str(&child.text()),
            "w:tab" => out.push('\t'),
            "w:br" => match child.attr("w:type") {
                Some("page") | Some("column") => {}
                _ => out.push('\n'),
            },
            "w:cr" => out.push('\n'),
            "w:noBreakHyphen" => out.push('-'),
            _ => {}
        }
    }
}

/// Read a file from the ZIP archive.
fn read_file_from_archive<R: Read + Seek>(
    archive: &mut ZipArchive<R>,
    path: &str,
) -> Result<Vec<u8>> {
    let mut file = archive
        .by_name(path)
        .map_err(|e| Error::ZipError(format!("File not found in archive '{}': {}", path, e)))?;

    let mut content = Vec::new();
    file.read_to_end(&mut content)
        .map_err(|e| Error::ZipError(format!("Failed to read '{}': {}", path, e)))?;

    Ok(content)
}
