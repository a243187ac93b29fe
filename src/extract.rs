//! Text extraction for uploaded documents (PDF, plain text).
//!
//! The ingest boundary supplies bytes plus a filename and content-type hint;
//! this module returns plain UTF-8 text or an [`ExtractError`].

/// MIME type for PDF uploads.
pub const MIME_PDF: &str = "application/pdf";
/// MIME type for plain-text uploads.
pub const MIME_TEXT: &str = "text/plain";

#[derive(Debug, thiserror::Error)]
pub enum ExtractError {
    #[error("Only .pdf or .txt files are supported")]
    Unsupported,
    #[error("Empty file content")]
    Empty,
    #[error("Failed to extract text from PDF: {0}")]
    Pdf(String),
    #[error("No text could be extracted from the PDF")]
    NoPdfText,
}

/// Whether an upload with this name and content type can be extracted.
pub fn is_supported(filename: &str, content_type: &str) -> bool {
    let name = filename.to_lowercase();
    content_type == MIME_PDF
        || content_type == MIME_TEXT
        || name.ends_with(".pdf")
        || name.ends_with(".txt")
}

fn is_pdf(filename: &str, content_type: &str) -> bool {
    content_type == MIME_PDF || filename.to_lowercase().ends_with(".pdf")
}

/// Extract text from an upload.
///
/// PDFs go through `pdf-extract`; anything else is decoded as UTF-8,
/// replacing invalid sequences.
pub fn extract_text(bytes: &[u8], filename: &str, content_type: &str) -> Result<String, ExtractError> {
    if !is_supported(filename, content_type) {
        return Err(ExtractError::Unsupported);
    }
    if bytes.is_empty() {
        return Err(ExtractError::Empty);
    }
    if is_pdf(filename, content_type) {
        let text =
            pdf_extract::extract_text_from_mem(bytes).map_err(|e| ExtractError::Pdf(e.to_string()))?;
        if text.trim().is_empty() {
            return Err(ExtractError::NoPdfText);
        }
        return Ok(text);
    }
    Ok(String::from_utf8_lossy(bytes).into_owned())
}

/// Best-effort content type for a local file path.
pub fn guess_content_type(filename: &str) -> &'static str {
    if filename.to_lowercase().ends_with(".pdf") {
        MIME_PDF
    } else {
        MIME_TEXT
    }
}
