use copytrace_core::{Error, Result};

/// Extract text from a PDF body (in-memory bytes), concatenated across all
/// pages in page order.
///
/// Notes:
/// - Callers should apply their own output bounds (chars) if needed.
/// - Extraction quality varies by PDF (text layer vs scanned images); a
///   scanned document legitimately produces empty text.
pub fn pdf_to_text(bytes: &[u8]) -> Result<String> {
    pdf_extract::extract_text_from_mem(bytes).map_err(|e| Error::Extract(e.to_string()))
}

/// Best-effort document text: parse failures degrade to an empty string
/// rather than failing the caller. Blank output means "nothing to analyze",
/// not an error.
pub fn document_text(bytes: &[u8]) -> String {
    if !bytes_look_like_pdf(bytes) {
        tracing::warn!(len = bytes.len(), "stored document is not a pdf");
        return String::new();
    }
    match pdf_to_text(bytes) {
        Ok(text) => text,
        Err(e) => {
            tracing::warn!(error = %e, "pdf text extraction failed");
            String::new()
        }
    }
}

/// Best-effort sniff for PDF bytes (magic header).
pub fn bytes_look_like_pdf(bytes: &[u8]) -> bool {
    bytes.starts_with(b"%PDF-")
}
