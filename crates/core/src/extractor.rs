use crate::error::AnalysisError;
use crate::models::{DocumentKind, ExtractedText, RawDocument};
use docx_rs::{read_docx, DocumentChild, Paragraph, ParagraphChild, RunChild};
use lopdf::Document;
use tracing::debug;

pub trait TextExtractor {
    fn extract(&self, document: &RawDocument) -> Result<ExtractedText, AnalysisError>;
}

#[derive(Debug, Default, Clone, Copy)]
pub struct DocumentTextExtractor;

impl TextExtractor for DocumentTextExtractor {
    fn extract(&self, document: &RawDocument) -> Result<ExtractedText, AnalysisError> {
        let content = match document.declared_kind {
            DocumentKind::Pdf => extract_pdf_text(&document.name, &document.bytes)?,
            DocumentKind::Docx => extract_docx_text(&document.name, &document.bytes)?,
            DocumentKind::PlainText => decode_plain_text(&document.name, &document.bytes)?,
            DocumentKind::Unknown => {
                return Err(AnalysisError::UnsupportedFormat {
                    name: document.name.clone(),
                })
            }
        };

        Ok(ExtractedText {
            source_name: document.name.clone(),
            content,
        })
    }
}

pub fn extract_pdf_text(name: &str, bytes: &[u8]) -> Result<String, AnalysisError> {
    let document = Document::load_mem(bytes).map_err(|error| AnalysisError::ExtractionFailure {
        name: name.to_string(),
        reason: format!("pdf parse error: {error}"),
    })?;

    let mut text = String::new();
    for (page_no, _page_id) in document.get_pages() {
        match document.extract_text(&[page_no]) {
            Ok(page_text) => text.push_str(&page_text),
            Err(error) => {
                debug!(document = name, page = page_no, %error, "page has no extractable text");
            }
        }
    }

    Ok(text)
}

pub fn extract_docx_text(name: &str, bytes: &[u8]) -> Result<String, AnalysisError> {
    let docx = read_docx(bytes).map_err(|error| AnalysisError::ExtractionFailure {
        name: name.to_string(),
        reason: format!("docx parse error: {error:?}"),
    })?;

    let paragraphs = docx
        .document
        .children
        .iter()
        .filter_map(|child| match child {
            DocumentChild::Paragraph(paragraph) => Some(paragraph_text(paragraph)),
            _ => None,
        })
        .collect::<Vec<_>>();

    Ok(paragraphs.join(" "))
}

fn paragraph_text(paragraph: &Paragraph) -> String {
    let mut text = String::new();
    for child in &paragraph.children {
        if let ParagraphChild::Run(run) = child {
            for run_child in &run.children {
                if let RunChild::Text(fragment) = run_child {
                    text.push_str(&fragment.text);
                }
            }
        }
    }
    text
}

fn decode_plain_text(name: &str, bytes: &[u8]) -> Result<String, AnalysisError> {
    String::from_utf8(bytes.to_vec()).map_err(|error| AnalysisError::ExtractionFailure {
        name: name.to_string(),
        reason: format!("invalid utf-8: {error}"),
    })
}
