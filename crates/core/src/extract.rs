use std::panic::{self, AssertUnwindSafe};

use lopdf::Document as PdfDocument;

use crate::error::{Result, SimilarityError};

/// Extracts the text of a PDF payload, pages concatenated in page order.
///
/// The container must parse, otherwise `UnreadableDocument`. Inside a readable
/// container a page without extractable text contributes an empty string.
pub fn extract_text(bytes: &[u8]) -> Result<String> {
    let document = PdfDocument::load_mem(bytes)
        .map_err(|err| SimilarityError::UnreadableDocument(err.to_string()))?;
    Ok(extract_pages(bytes, &document).concat())
}

/// Per-page text; the vector has one entry per page of the document.
pub fn extract_pages(bytes: &[u8], document: &PdfDocument) -> Vec<String> {
    // pdf-extract can panic on malformed content streams
    let primary = panic::catch_unwind(AssertUnwindSafe(|| {
        pdf_extract::extract_text_from_mem_by_pages(bytes)
    }));
    match primary {
        Ok(Ok(pages)) => return pages,
        Ok(Err(err)) => tracing::warn!("pdf-extract failed, using per-page fallback: {err}"),
        Err(_) => tracing::warn!("pdf-extract panicked, using per-page fallback"),
    }
    fallback_pages(document)
}

fn fallback_pages(document: &PdfDocument) -> Vec<String> {
    document
        .get_pages()
        .keys()
        .map(|page_number| match document.extract_text(&[*page_number]) {
            Ok(text) => text,
            Err(err) => {
                tracing::debug!("page {page_number} yielded no text: {err}");
                String::new()
            }
        })
        .collect()
}
