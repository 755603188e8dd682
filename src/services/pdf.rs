//! PDF text extraction.

use lopdf::Document;

use crate::error::{AppError, Result};
use crate::models::ErrorCode;

/// How far into the body the `%PDF` header may appear.
const MAGIC_SCAN_BYTES: usize = 1024;

/// Extract the text of every page, in page order.
///
/// Parsing is CPU bound and runs on the blocking pool.
pub async fn extract_text(bytes: Vec<u8>) -> Result<String> {
    tokio::task::spawn_blocking(move || extract_text_blocking(&bytes))
        .await
        .map_err(|e| AppError::fetch(ErrorCode::PdfParse, format!("PDF worker failed: {e}")))?
}

/// Synchronous form of [`extract_text`].
pub fn extract_text_blocking(bytes: &[u8]) -> Result<String> {
    if !has_pdf_magic(bytes) {
        return Err(AppError::fetch(
            ErrorCode::PdfParse,
            "Downloaded body is not a PDF document",
        ));
    }

    let document = Document::load_mem(bytes)
        .map_err(|e| AppError::fetch(ErrorCode::PdfParse, format!("Cannot read PDF: {e}")))?;

    let mut pages = Vec::new();
    for page_number in document.get_pages().keys() {
        let text = document.extract_text(&[*page_number]).map_err(|e| {
            AppError::fetch(
                ErrorCode::PdfParse,
                format!("Cannot extract text from page {page_number}: {e}"),
            )
        })?;
        pages.push(text);
    }
    log::debug!("Extracted text from {} PDF pages", pages.len());

    Ok(pages.join("\n"))
}

fn has_pdf_magic(bytes: &[u8]) -> bool {
    let head = &bytes[..bytes.len().min(MAGIC_SCAN_BYTES)];
    head.windows(4).any(|window| window == b"%PDF")
}

#[cfg(test)]
mod tests {
    use lopdf::content::{Content, Operation};
    use lopdf::{Object, Stream, dictionary};

    use super::*;

    fn sample_pdf(text: &str) -> Vec<u8> {
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
        let content = Content {
            operations: vec![
                Operation::new("BT", vec![]),
                Operation::new("Tf", vec!["F1".into(), 24.into()]),
                Operation::new("Td", vec![100.into(), 600.into()]),
                Operation::new("Tj", vec![Object::string_literal(text)]),
                Operation::new("ET", vec![]),
            ],
        };
        let content_id = doc.add_object(Stream::new(dictionary! {}, content.encode().unwrap()));
        let page_id = doc.add_object(dictionary! {
            "Type" => "Page",
            "Parent" => pages_id,
            "Contents" => content_id,
        });
        doc.objects.insert(
            pages_id,
            Object::Dictionary(dictionary! {
                "Type" => "Pages",
                "Kids" => vec![page_id.into()],
                "Count" => 1,
                "Resources" => resources_id,
                "MediaBox" => vec![0.into(), 0.into(), 595.into(), 842.into()],
            }),
        );
        let catalog_id = doc.add_object(dictionary! {
            "Type" => "Catalog",
            "Pages" => pages_id,
        });
        doc.trailer.set("Root", catalog_id);

        let mut bytes = Vec::new();
        doc.save_to(&mut bytes).unwrap();
        bytes
    }

    #[test]
    fn test_rejects_non_pdf_body() {
        let err = extract_text_blocking(b"<html>not a pdf</html>").unwrap_err();
        assert_eq!(err.error_code(), Some(ErrorCode::PdfParse));
    }

    #[test]
    fn test_rejects_truncated_pdf() {
        let err = extract_text_blocking(b"%PDF-1.7\n1 0 obj\n<<").unwrap_err();
        assert_eq!(err.error_code(), Some(ErrorCode::PdfParse));
    }

    #[tokio::test]
    async fn test_extracts_page_text() {
        let bytes = sample_pdf("Terms of Service");
        let text = extract_text(bytes).await.unwrap();
        assert!(text.contains("Terms of Service"), "got {text:?}");
    }

    #[test]
    fn test_magic_may_follow_leading_bytes() {
        assert!(has_pdf_magic(b"\r\n%PDF-1.4"));
        assert!(!has_pdf_magic(b"%PD"));
    }
}
