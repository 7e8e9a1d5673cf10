use crate::error::IngestError;
use crate::models::{DocumentKind, ExtractedDocument};
use chrono::Utc;
use lopdf::Document;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::path::Path;

/// Text of one PDF page, or of the whole paragraph stream of a DOCX file.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct PageText {
    pub number: u32,
    pub text: String,
}

pub trait PdfExtractor {
    fn extract_pages(&self, bytes: &[u8]) -> Result<Vec<PageText>, IngestError>;
}

#[derive(Default)]
pub struct LopdfExtractor;

impl PdfExtractor for LopdfExtractor {
    fn extract_pages(&self, bytes: &[u8]) -> Result<Vec<PageText>, IngestError> {
        let document =
            Document::load_mem(bytes).map_err(|error| IngestError::PdfParse(error.to_string()))?;

        // get_pages is keyed by page number, so iteration follows reading order.
        let mut pages = Vec::new();
        for (page_no, _page_id) in document.get_pages() {
            let text = document
                .extract_text(&[page_no])
                .map_err(|error| IngestError::PdfParse(error.to_string()))?;

            pages.push(PageText {
                number: page_no,
                text,
            });
        }

        if pages.iter().all(|page| page.text.trim().is_empty()) {
            return Err(IngestError::PdfParse(
                "pdf had no readable page text".to_string(),
            ));
        }

        Ok(pages)
    }
}

#[derive(Default)]
pub struct DocxExtractor;

impl DocxExtractor {
    pub fn extract_paragraphs(&self, bytes: &[u8]) -> Result<Vec<String>, IngestError> {
        let doc =
            docx_rs::read_docx(bytes).map_err(|error| IngestError::DocxParse(error.to_string()))?;

        let mut paragraphs = Vec::new();
        for child in doc.document.children {
            if let docx_rs::DocumentChild::Paragraph(paragraph) = child {
                let mut text = String::new();
                for child in paragraph.children {
                    if let docx_rs::ParagraphChild::Run(run) = child {
                        for child in run.children {
                            if let docx_rs::RunChild::Text(t) = child {
                                text.push_str(&t.text);
                            }
                        }
                    }
                }
                paragraphs.push(text);
            }
        }

        Ok(paragraphs)
    }
}

pub fn extract_bytes(
    source: &str,
    kind: DocumentKind,
    bytes: &[u8],
) -> Result<ExtractedDocument, IngestError> {
    let pages = match kind {
        DocumentKind::Pdf => LopdfExtractor.extract_pages(bytes)?,
        DocumentKind::Docx => {
            let paragraphs = DocxExtractor.extract_paragraphs(bytes)?;
            vec![PageText {
                number: 1,
                text: paragraphs.join("\n"),
            }]
        }
    };

    tracing::debug!(source, ?kind, pages = pages.len(), "extracted document text");

    Ok(ExtractedDocument {
        source: source.to_string(),
        kind,
        checksum: digest_bytes(bytes),
        extracted_at: Utc::now(),
        pages,
    })
}

pub fn extract_document(path: &Path) -> Result<ExtractedDocument, IngestError> {
    let name = path
        .file_name()
        .and_then(|name| name.to_str())
        .ok_or_else(|| IngestError::MissingFileName(path.display().to_string()))?;
    let kind = DocumentKind::from_path(path)
        .ok_or_else(|| IngestError::UnsupportedDocument(name.to_string()))?;

    let bytes = std::fs::read(path)?;
    extract_bytes(&path.to_string_lossy(), kind, &bytes)
}

pub fn digest_bytes(bytes: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(bytes);
    format!("{:x}", hasher.finalize())
}

#[cfg(test)]
mod tests {
    use super::*;
    use docx_rs::{Docx, Paragraph, Run};
    use lopdf::content::{Content, Operation};
    use lopdf::{dictionary, Object, Stream};
    use std::io::Cursor;
    use tempfile::tempdir;

    /// One page per entry; an empty entry gives a page with no text operators.
    fn pdf_with(pages: &[&str]) -> Vec<u8> {
        let mut doc = Document::with_version("1.5");
        let pages_id = doc.new_object_id();
        let font_id = doc.add_object(dictionary! {
            "Type" => "Font",
            "Subtype" => "Type1",
            "BaseFont" => "Helvetica",
            "Encoding" => "WinAnsiEncoding",
        });
        let resources_id = doc.add_object(dictionary! {
            "Font" => dictionary! { "F1" => font_id },
        });

        let mut kids = Vec::new();
        for text in pages {
            let operations = if text.is_empty() {
                Vec::new()
            } else {
                vec![
                    Operation::new("BT", vec![]),
                    Operation::new("Tf", vec!["F1".into(), 12.into()]),
                    Operation::new("Td", vec![72.into(), 720.into()]),
                    Operation::new("Tj", vec![Object::string_literal(*text)]),
                    Operation::new("ET", vec![]),
                ]
            };
            let content = Content { operations }
                .encode()
                .expect("content stream should encode");
            let content_id = doc.add_object(Stream::new(dictionary! {}, content));
            let page_id = doc.add_object(dictionary! {
                "Type" => "Page",
                "Parent" => pages_id,
                "Contents" => content_id,
                "Resources" => resources_id,
                "MediaBox" => vec![0.into(), 0.into(), 612.into(), 792.into()],
            });
            kids.push(Object::Reference(page_id));
        }

        let count = kids.len() as i64;
        doc.objects.insert(
            pages_id,
            Object::Dictionary(dictionary! {
                "Type" => "Pages",
                "Kids" => kids,
                "Count" => count,
            }),
        );
        let catalog_id = doc.add_object(dictionary! {
            "Type" => "Catalog",
            "Pages" => pages_id,
        });
        doc.trailer.set("Root", catalog_id);

        let mut buffer = Vec::new();
        doc.save_to(&mut buffer).expect("pdf should save into memory");
        buffer
    }

    #[test]
    fn pdf_pages_keep_reading_order() {
        let bytes = pdf_with(&["Scope of work", "Eligibility criteria", "Submission deadline"]);

        let document = extract_bytes("tender.pdf", DocumentKind::Pdf, &bytes)
            .expect("pdf should be readable");

        assert_eq!(
            document.pages.iter().map(|page| page.number).collect::<Vec<_>>(),
            vec![1, 2, 3]
        );
        let text = document.text();
        let scope = text.find("Scope of work").expect("page 1 text");
        let eligibility = text.find("Eligibility criteria").expect("page 2 text");
        let deadline = text.find("Submission deadline").expect("page 3 text");
        assert!(scope < eligibility && eligibility < deadline);
    }

    #[test]
    fn pdf_without_text_is_a_parse_error() {
        let bytes = pdf_with(&["", ""]);
        let result = extract_bytes("scan.pdf", DocumentKind::Pdf, &bytes);
        assert!(matches!(result, Err(IngestError::PdfParse(_))));
    }

    fn docx_with(paragraphs: &[&str]) -> Vec<u8> {
        let mut docx = Docx::new();
        for text in paragraphs {
            docx = docx.add_paragraph(Paragraph::new().add_run(Run::new().add_text(*text)));
        }

        let mut buffer = Cursor::new(Vec::new());
        docx.build()
            .pack(&mut buffer)
            .expect("docx should pack into memory");
        buffer.into_inner()
    }

    #[test]
    fn docx_paragraphs_keep_document_order() {
        let bytes = docx_with(&["ISO 9001 certified", "Founded 2009", "Offices in Lyon"]);

        let document = extract_bytes("company.docx", DocumentKind::Docx, &bytes)
            .expect("docx should be readable");

        assert_eq!(document.pages.len(), 1);
        assert_eq!(
            document.text(),
            "ISO 9001 certified\nFounded 2009\nOffices in Lyon"
        );
        assert_eq!(document.checksum, digest_bytes(&bytes));
    }

    #[test]
    fn broken_pdf_is_a_parse_error() {
        let result = extract_bytes("rfp.pdf", DocumentKind::Pdf, b"%PDF-1.4\n%broken");
        assert!(matches!(result, Err(IngestError::PdfParse(_))));
    }

    #[test]
    fn broken_docx_is_a_parse_error() {
        let result = extract_bytes("company.docx", DocumentKind::Docx, b"not a zip archive");
        assert!(matches!(result, Err(IngestError::DocxParse(_))));
    }

    #[test]
    fn unknown_extension_is_rejected() -> Result<(), Box<dyn std::error::Error>> {
        let dir = tempdir()?;
        let path = dir.path().join("notes.txt");
        std::fs::write(&path, b"plain text")?;

        let result = extract_document(&path);
        assert!(matches!(result, Err(IngestError::UnsupportedDocument(_))));
        Ok(())
    }

    #[test]
    fn digest_is_reproducible() {
        assert_eq!(digest_bytes(b"abc"), digest_bytes(b"abc"));
        assert_ne!(digest_bytes(b"abc"), digest_bytes(b"abd"));
    }
}
