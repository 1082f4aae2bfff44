use crate::error::IngestError;
use crate::models::{RawPage, StyledRun};
use lopdf::content::Content;
use lopdf::{Dictionary, Document, Object};
use std::collections::BTreeMap;
use std::path::Path;

pub trait PdfExtractor {
    /// Pages after `start_page` (1-based), each as styled runs in
    /// content-stream order.
    fn extract_pages(&self, path: &Path, start_page: u32) -> Result<Vec<RawPage>, IngestError>;
}

#[derive(Default)]
pub struct LopdfExtractor;

pub fn is_italic_font(base_font: &str) -> bool {
    let upper = base_font.to_uppercase();
    upper.contains("ITALIC") || upper.contains("OBLIQUE")
}

/// UTF-16BE when BOM-prefixed, otherwise one char per byte.
pub fn decode_pdf_string(bytes: &[u8]) -> String {
    if let Some(body) = bytes.strip_prefix(&[0xFE, 0xFF]) {
        let units: Vec<u16> = body
            .chunks_exact(2)
            .map(|pair| u16::from_be_bytes([pair[0], pair[1]]))
            .collect();
        return String::from_utf16_lossy(&units);
    }
    bytes.iter().map(|byte| char::from(*byte)).collect()
}

fn number(object: &Object) -> Option<f32> {
    match object {
        Object::Integer(value) => Some(*value as f32),
        Object::Real(value) => Some(*value as f32),
        _ => None,
    }
}

/// Tracks the current font and folds show-text operators into runs.
#[derive(Default)]
struct RunBuilder {
    runs: Vec<StyledRun>,
    italic: bool,
}

impl RunBuilder {
    fn set_font(&mut self, base_font: &str) {
        self.italic = is_italic_font(base_font);
    }

    fn show(&mut self, text: String) {
        if text.is_empty() {
            return;
        }
        match self.runs.last_mut() {
            Some(last) if last.italic == self.italic && !last.text.ends_with('\n') => {
                last.text.push_str(&text)
            }
            _ => self.runs.push(StyledRun {
                text,
                italic: self.italic,
            }),
        }
    }

    fn break_line(&mut self) {
        if let Some(last) = self.runs.last_mut() {
            if !last.text.ends_with('\n') {
                last.text.push('\n');
            }
        }
    }

    fn show_array(&mut self, elements: &[Object]) {
        let mut text = String::new();
        for element in elements {
            match element {
                Object::String(bytes, _) => text.push_str(&decode_pdf_string(bytes)),
                // large negative kerning is a word gap
                other => {
                    if number(other).is_some_and(|adjust| adjust < -200.0) && !text.ends_with(' ') {
                        text.push(' ');
                    }
                }
            }
        }
        self.show(text);
    }
}

/// Folds decoded content-stream operations into styled runs. `fonts` maps
/// resource names (`F1`) to base font names (`Times-Italic`).
pub fn runs_from_operations(
    operations: &[lopdf::content::Operation],
    fonts: &BTreeMap<Vec<u8>, String>,
) -> Vec<StyledRun> {
    let mut builder = RunBuilder::default();

    for operation in operations {
        let operands = &operation.operands;
        match operation.operator.as_str() {
            "Tf" => {
                if let Some(Object::Name(key)) = operands.first() {
                    let base_font = fonts
                        .get(key)
                        .cloned()
                        .unwrap_or_else(|| String::from_utf8_lossy(key).to_string());
                    builder.set_font(&base_font);
                }
            }
            "BT" | "T*" | "Tm" => builder.break_line(),
            "Td" | "TD" => {
                let vertical = operands.get(1).and_then(number).unwrap_or(0.0);
                if vertical.abs() > f32::EPSILON {
                    builder.break_line();
                }
            }
            "Tj" => {
                if let Some(Object::String(bytes, _)) = operands.first() {
                    builder.show(decode_pdf_string(bytes));
                }
            }
            "TJ" => {
                if let Some(Object::Array(elements)) = operands.first() {
                    builder.show_array(elements);
                }
            }
            "'" | "\"" => {
                builder.break_line();
                if let Some(Object::String(bytes, _)) = operands.last() {
                    builder.show(decode_pdf_string(bytes));
                }
            }
            _ => {}
        }
    }

    builder.runs
}

fn resolve_dict<'a>(document: &'a Document, object: &'a Object) -> Option<&'a Dictionary> {
    document.dereference(object).ok()?.1.as_dict().ok()
}

/// Font resources of a page, following `Parent` links for inherited
/// resources. Nearer definitions win.
fn page_fonts(document: &Document, page_id: lopdf::ObjectId) -> BTreeMap<Vec<u8>, String> {
    let mut fonts = BTreeMap::new();
    let mut node = document.get_dictionary(page_id).ok();
    let mut depth = 0;

    while let Some(dictionary) = node {
        let font_dict = dictionary
            .get(b"Resources")
            .ok()
            .and_then(|resources| resolve_dict(document, resources))
            .and_then(|resources| resources.get(b"Font").ok())
            .and_then(|font| resolve_dict(document, font));

        if let Some(font_dict) = font_dict {
            for (key, font) in font_dict.iter() {
                let base_font = resolve_dict(document, font)
                    .and_then(|font| font.get(b"BaseFont").ok())
                    .and_then(|name| name.as_name_str().ok());
                if let Some(base_font) = base_font {
                    fonts
                        .entry(key.clone())
                        .or_insert_with(|| base_font.to_string());
                }
            }
        }

        depth += 1;
        if depth > 32 {
            break;
        }
        node = dictionary
            .get(b"Parent")
            .ok()
            .and_then(|parent| resolve_dict(document, parent));
    }

    fonts
}

impl PdfExtractor for LopdfExtractor {
    fn extract_pages(&self, path: &Path, start_page: u32) -> Result<Vec<RawPage>, IngestError> {
        if !path.exists() {
            return Err(IngestError::Io(std::io::Error::new(
                std::io::ErrorKind::NotFound,
                format!("pdf not found: {}", path.display()),
            )));
        }

        let document =
            Document::load(path).map_err(|error| IngestError::PdfParse(error.to_string()))?;

        let mut pages = Vec::new();
        for (page_no, page_id) in document.get_pages() {
            if page_no <= start_page {
                continue;
            }

            let content = document
                .get_page_content(page_id)
                .map_err(|error| IngestError::PdfParse(error.to_string()))?;
            let operations = Content::decode(&content)
                .map_err(|error| IngestError::PdfParse(error.to_string()))?
                .operations;

            let runs = runs_from_operations(&operations, &page_fonts(&document, page_id));
            if runs.iter().any(|run| !run.text.trim().is_empty()) {
                pages.push(RawPage {
                    number: page_no,
                    runs,
                });
            }
        }

        if pages.is_empty() {
            return Err(IngestError::PdfParse(format!(
                "pdf had no readable page text after page {start_page}: {}",
                path.display()
            )));
        }

        Ok(pages)
    }
}
