//! Plain-text extraction from an uploaded résumé file.

use crate::errors::AppError;

const PDF_MAGIC: &[u8] = b"%PDF";

/// Returns the plain text of an uploaded résumé. PDFs go through the pdf
/// text extractor; anything else is read as (lossy) UTF-8.
pub fn extract_text(bytes: &[u8]) -> Result<String, AppError> {
    if bytes.starts_with(PDF_MAGIC) {
        pdf_extract::extract_text_from_mem(bytes)
            .map_err(|e| AppError::Validation(format!("Could not read PDF resume: {e}")))
    } else {
        Ok(String::from_utf8_lossy(bytes).into_owned())
    }
}
