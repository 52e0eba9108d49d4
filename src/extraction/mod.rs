//! PDF text extraction.
//!
//! Pages are read with `lopdf` and their text concatenated in page order. PDFs whose fonts
//! `lopdf` cannot map yield no text on that pass and are retried with `pdf-extract`, which reads
//! the whole file at once.

use thiserror::Error;

/// Errors raised while extracting text from an upload.
#[derive(Debug, Error)]
pub enum ExtractionError {
    /// Bytes were not a readable PDF.
    #[error("Failed to read PDF: {0}")]
    Parse(String),
    /// The PDF parsed but contained no extractable text (e.g. scanned pages).
    #[error("PDF contains no extractable text; it may be image-based or encrypted")]
    NoText,
}

/// Extract the text of every page of a PDF, in page order.
pub fn extract_pdf_text(bytes: &[u8]) -> Result<String, ExtractionError> {
    let per_page = extract_pages(bytes);
    let text = match per_page {
        Ok(text) if !text.trim().is_empty() => text,
        Ok(_) => {
            tracing::debug!("Per-page extraction produced no text; retrying whole-file");
            extract_whole_file(bytes)?
        }
        Err(error) => {
            tracing::warn!(error = %error, "Per-page extraction failed; retrying whole-file");
            extract_whole_file(bytes).map_err(|fallback| match fallback {
                ExtractionError::NoText => error,
                other => other,
            })?
        }
    };

    let text = text.replace('\0', "");
    if text.trim().is_empty() {
        return Err(ExtractionError::NoText);
    }
    Ok(text)
}

fn extract_pages(bytes: &[u8]) -> Result<String, ExtractionError> {
    let document = lopdf::Document::load_mem(bytes)
        .map_err(|error| ExtractionError::Parse(error.to_string()))?;
    let pages = document.get_pages();
    let mut text = String::new();

    for page_number in pages.keys() {
        match document.extract_text(&[*page_number]) {
            Ok(page_text) => text.push_str(&page_text),
            Err(error) => {
                tracing::debug!(page = page_number, error = %error, "Skipping unreadable page");
            }
        }
    }

    tracing::debug!(pages = pages.len(), chars = text.len(), "Extracted PDF pages");
    Ok(text)
}

fn extract_whole_file(bytes: &[u8]) -> Result<String, ExtractionError> {
    let text = pdf_extract::extract_text_from_mem(bytes)
        .map_err(|error| ExtractionError::Parse(error.to_string()))?;
    if text.trim().is_empty() {
        Err(ExtractionError::NoText)
    } else {
        Ok(text)
    }
}

#[cfg(test)]
pub(crate) mod fixtures {
    use lopdf::content::{Content, Operation};
    use lopdf::{Document, Object, Stream, dictionary};

    /// Build an in-memory PDF with one text line per page.
    pub(crate) fn pdf_with_pages(pages: &[&str]) -> Vec<u8> {
        let mut doc = Document::with_version("1.5");
        let pages_id = doc.new_object_id();
        let font_id = doc.add_object(dictionary! {
            "Type" => "Font",
            "Subtype" => "Type1",
            "BaseFont" => "Courier",
            "Encoding" => "WinAnsiEncoding",
        });
        let resources_id = doc.add_object(dictionary! {
            "Font" => dictionary! { "F1" => font_id },
        });

        let mut kids = Vec::with_capacity(pages.len());
        for line in pages {
            let content = Content {
                operations: vec![
                    Operation::new("BT", vec![]),
                    Operation::new("Tf", vec!["F1".into(), 12.into()]),
                    Operation::new("Td", vec![72.into(), 720.into()]),
                    Operation::new("Tj", vec![Object::string_literal(*line)]),
                    Operation::new("ET", vec![]),
                ],
            };
            let content_id = doc.add_object(Stream::new(
                dictionary! {},
                content.encode().expect("encode content"),
            ));
            let page_id = doc.add_object(dictionary! {
                "Type" => "Page",
                "Parent" => pages_id,
                "Contents" => content_id,
                "Resources" => resources_id,
            });
            kids.push(page_id.into());
        }

        let page_count = kids.len() as i64;
        doc.objects.insert(
            pages_id,
            Object::Dictionary(dictionary! {
                "Type" => "Pages",
                "Kids" => kids,
                "Count" => page_count,
                "MediaBox" => vec![0.into(), 0.into(), 612.into(), 792.into()],
            }),
        );
        let catalog_id = doc.add_object(dictionary! {
            "Type" => "Catalog",
            "Pages" => pages_id,
        });
        doc.trailer.set("Root", catalog_id);

        let mut bytes = Vec::new();
        doc.save_to(&mut bytes).expect("serialize pdf");
        bytes
    }
}
