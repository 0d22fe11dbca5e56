//! PDF text extraction.
//!
//! Uploads arrive as raw bytes; this module returns the plain UTF-8 text of
//! every page, each non-empty page terminated by a newline.

use thiserror::Error;

/// Leading bytes of every PDF file.
const PDF_MAGIC: &[u8] = b"%PDF-";

#[derive(Debug, Error)]
pub enum ExtractError {
    #[error("not a PDF document")]
    NotPdf,
    #[error("PDF extraction failed: {0}")]
    Pdf(String),
}

/// Extract the text of every page of a PDF held in memory.
///
/// Pages that yield no text are skipped; the rest are joined with a
/// trailing `\n` each, so the result is empty when the document carries no
/// text layer at all (scanned images).
pub fn extract_pdf_text(bytes: &[u8]) -> Result<String, ExtractError> {
    if !looks_like_pdf(bytes) {
        return Err(ExtractError::NotPdf);
    }

    let pages = pdf_extract::extract_text_from_mem_by_pages(bytes)
        .map_err(|e| ExtractError::Pdf(e.to_string()))?;

    Ok(join_pages(pages))
}

/// Cheap content sniff: the magic marker must appear in the first KiB.
pub fn looks_like_pdf(bytes: &[u8]) -> bool {
    let head = &bytes[..bytes.len().min(1024)];
    head.windows(PDF_MAGIC.len()).any(|w| w == PDF_MAGIC)
}

fn join_pages(pages: Vec<String>) -> String {
    let mut text = String::new();
    for page in pages {
        if page.is_empty() {
            continue;
        }
        text.push_str(&page);
        text.push('\n');
    }
    text
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Minimal single-page PDF showing `phrase` in Helvetica.
    /// Body first, then an xref with correct byte offsets so pdf-extract can parse it.
    fn minimal_pdf(phrase: &str) -> Vec<u8> {
        let content = format!("BT /F1 12 Tf 100 700 Td ({}) Tj ET", phrase);
        let mut out = Vec::new();
        out.extend_from_slice(b"%PDF-1.4\n");
        let o1 = out.len();
        out.extend_from_slice(b"1 0 obj << /Type /Catalog /Pages 2 0 R >> endobj\n");
        let o2 = out.len();
        out.extend_from_slice(b"2 0 obj << /Type /Pages /Kids [3 0 R] /Count 1 >> endobj\n");
        let o3 = out.len();
        out.extend_from_slice(b"3 0 obj << /Type /Page /Parent 2 0 R /MediaBox [0 0 612 792] /Contents 4 0 R /Resources << /Font << /F1 5 0 R >> >> >> endobj\n");
        let o4 = out.len();
        out.extend_from_slice(
            format!(
                "4 0 obj << /Length {} >> stream\n{}\nendstream endobj\n",
                content.len(),
                content
            )
            .as_bytes(),
        );
        let o5 = out.len();
        out.extend_from_slice(
            b"5 0 obj << /Type /Font /Subtype /Type1 /BaseFont /Helvetica >> endobj\n",
        );
        let xref_start = out.len();
        out.extend_from_slice(b"xref\n0 6\n");
        out.extend_from_slice(format!("{:010} 65535 f \n", 0).as_bytes());
        for offset in [o1, o2, o3, o4, o5] {
            out.extend_from_slice(format!("{:010} 00000 n \n", offset).as_bytes());
        }
        out.extend_from_slice(b"trailer << /Size 6 /Root 1 0 R >>\nstartxref\n");
        out.extend_from_slice(format!("{}\n", xref_start).as_bytes());
        out.extend_from_slice(b"%%EOF\n");
        out
    }

    #[test]
    fn extracts_text_from_minimal_pdf() {
        let text = extract_pdf_text(&minimal_pdf("master services agreement")).unwrap();
        assert!(
            text.contains("master services agreement"),
            "unexpected text: {:?}",
            text
        );
        assert!(text.ends_with('\n'));
    }

    #[test]
    fn non_pdf_bytes_rejected() {
        let err = extract_pdf_text(b"just some text").unwrap_err();
        assert!(matches!(err, ExtractError::NotPdf));
    }

    #[test]
    fn empty_pages_are_skipped() {
        let joined = join_pages(vec![
            "Page one".to_string(),
            String::new(),
            "Page three".to_string(),
        ]);
        assert_eq!(joined, "Page one\nPage three\n");
    }
}
