//! Text extraction for uploaded documents.
//!
//! The loader is resolved once per upload from the document format. Slide
//! decks get their own extractor so each slide becomes a segment; everything
//! else goes through the text-like extractor.

use quick_xml::events::Event;
use std::io::{Cursor, Read};

use crate::domain::{errors::DomainError, Document, DocumentFormat};

/// Maximum decompressed bytes read from a single ZIP entry.
const MAX_XML_ENTRY_BYTES: u64 = 50 * 1024 * 1024;

const DOCX_BODY: &str = "word/document.xml";
const SLIDE_PREFIX: &str = "ppt/slides/slide";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DocumentLoader {
    TextLike(DocumentFormat),
    SlideDeck,
}

impl DocumentLoader {
    pub fn for_format(format: DocumentFormat) -> Self {
        match format {
            DocumentFormat::SlideDeck => Self::SlideDeck,
            other => Self::TextLike(other),
        }
    }

    pub fn for_document(doc: &Document) -> Self {
        Self::for_format(doc.format)
    }

    /// Extracts ordered text segments covering the whole document.
    ///
    /// A document with no extractable text is an error, never an empty load.
    pub fn extract(&self, bytes: &[u8]) -> Result<Vec<String>, DomainError> {
        let segments = match self {
            Self::TextLike(DocumentFormat::PlainText) => vec![extract_plain_text(bytes)?],
            Self::TextLike(DocumentFormat::Pdf) => vec![extract_pdf(bytes)?],
            Self::TextLike(DocumentFormat::Docx) => vec![extract_docx(bytes)?],
            Self::TextLike(DocumentFormat::SlideDeck) | Self::SlideDeck => extract_slides(bytes)?,
        };

        let segments: Vec<String> = segments
            .into_iter()
            .filter(|s| !s.trim().is_empty())
            .collect();

        if segments.is_empty() {
            return Err(DomainError::load("document contains no extractable text"));
        }
        Ok(segments)
    }
}

fn extract_plain_text(bytes: &[u8]) -> Result<String, DomainError> {
    let text = std::str::from_utf8(bytes)
        .map_err(|e| DomainError::load(format!("text file is not valid UTF-8: {e}")))?;
    Ok(text.trim_start_matches('\u{feff}').to_string())
}

fn extract_pdf(bytes: &[u8]) -> Result<String, DomainError> {
    pdf_extract::extract_text_from_mem(bytes)
        .map_err(|e| DomainError::load(format!("PDF extraction failed: {e}")))
}

fn open_archive(bytes: &[u8]) -> Result<zip::ZipArchive<Cursor<&[u8]>>, DomainError> {
    zip::ZipArchive::new(Cursor::new(bytes))
        .map_err(|e| DomainError::load(format!("not a valid OOXML container: {e}")))
}

fn read_entry_bounded(
    archive: &mut zip::ZipArchive<Cursor<&[u8]>>,
    name: &str,
) -> Result<Vec<u8>, DomainError> {
    let entry = archive
        .by_name(name)
        .map_err(|e| DomainError::load(format!("{name}: {e}")))?;
    let mut out = Vec::new();
    entry
        .take(MAX_XML_ENTRY_BYTES)
        .read_to_end(&mut out)
        .map_err(|e| DomainError::load(format!("{name}: {e}")))?;
    if out.len() as u64 >= MAX_XML_ENTRY_BYTES {
        return Err(DomainError::load(format!(
            "{name} exceeds size limit ({MAX_XML_ENTRY_BYTES} bytes)"
        )));
    }
    Ok(out)
}

fn extract_docx(bytes: &[u8]) -> Result<String, DomainError> {
    let mut archive = open_archive(bytes)?;
    let xml = read_entry_bounded(&mut archive, DOCX_BODY)?;
    Ok(paragraph_text(&xml)?.join("\n"))
}

fn extract_slides(bytes: &[u8]) -> Result<Vec<String>, DomainError> {
    let mut archive = open_archive(bytes)?;
    let mut slides: Vec<(u32, String)> = archive
        .file_names()
        .filter_map(|name| {
            let number = name
                .strip_prefix(SLIDE_PREFIX)?
                .strip_suffix(".xml")?
                .parse::<u32>()
                .ok()?;
            Some((number, name.to_string()))
        })
        .collect();
    slides.sort_by_key(|(number, _)| *number);

    if slides.is_empty() {
        return Err(DomainError::load("slide deck contains no slides"));
    }

    slides
        .into_iter()
        .map(|(_, name)| {
            let xml = read_entry_bounded(&mut archive, &name)?;
            Ok(paragraph_text(&xml)?.join("\n"))
        })
        .collect()
}

/// Collects `<t>` runs per `<p>` paragraph. Works for both WordprocessingML
/// (`w:p`/`w:t`) and DrawingML (`a:p`/`a:t`) since only local names matter.
fn paragraph_text(xml: &[u8]) -> Result<Vec<String>, DomainError> {
    let mut reader = quick_xml::Reader::from_reader(xml);
    let mut buf = Vec::new();
    let mut paragraphs = Vec::new();
    let mut current = String::new();
    let mut in_text = false;

    loop {
        match reader.read_event_into(&mut buf) {
            Ok(Event::Start(e)) if e.local_name().as_ref() == b"t" => in_text = true,
            Ok(Event::Text(te)) if in_text => {
                let text = te
                    .unescape()
                    .map_err(|e| DomainError::load(format!("malformed XML text: {e}")))?;
                current.push_str(&text);
            }
            Ok(Event::End(e)) => match e.local_name().as_ref() {
                b"t" => in_text = false,
                b"p" => {
                    let paragraph = current.trim();
                    if !paragraph.is_empty() {
                        paragraphs.push(paragraph.to_string());
                    }
                    current.clear();
                }
                _ => {}
            },
            Ok(Event::Eof) => break,
            Err(e) => return Err(DomainError::load(format!("malformed XML: {e}"))),
            _ => {}
        }
        buf.clear();
    }

    let trailing = current.trim();
    if !trailing.is_empty() {
        paragraphs.push(trailing.to_string());
    }
    Ok(paragraphs)
}
