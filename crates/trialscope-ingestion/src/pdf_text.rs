//! Plain-text extraction from downloaded PDFs (lopdf).

use std::path::Path;

use anyhow::Result;
use lopdf::Document as PdfDoc;
use tracing::debug;

/// Extract and clean the text of every page in a PDF file.
pub fn pdf_file_text(pdf_path: &Path) -> Result<String> {
    let pdf = PdfDoc::load(pdf_path)?;
    Ok(document_text(&pdf))
}

/// Same as [`pdf_file_text`] for an in-memory document.
pub fn pdf_bytes_text(bytes: &[u8]) -> Result<String> {
    let pdf = PdfDoc::load_mem(bytes)?;
    Ok(document_text(&pdf))
}

fn document_text(pdf: &PdfDoc) -> String {
    let mut full_text = String::new();
    for page_num in pdf.get_pages().keys() {
        // Pages with unsupported encodings are skipped, not fatal.
        match pdf.extract_text(&[*page_num]) {
            Ok(text) => {
                full_text.push_str(&text);
                full_text.push('\n');
            }
            Err(e) => debug!(page = page_num, error = %e, "page text extraction failed"),
        }
    }
    clean_text(&full_text)
}

/// Collapse whitespace and replace typographic punctuation with ASCII.
pub fn clean_text(text: &str) -> String {
    let replaced: String = text
        .chars()
        .map(|c| match c {
            '\u{2013}' | '\u{2014}' => '-',
            '\u{2018}' | '\u{2019}' => '\'',
            '\u{201C}' | '\u{201D}' => '"',
            '\u{2022}' => '*',
            other => other,
        })
        .collect();
    replaced.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// First `max_chars` characters, with `...` appended when cut.
pub fn truncate_sample(text: &str, max_chars: usize) -> String {
    if text.chars().count() > max_chars {
        format!("{}...", text.chars().take(max_chars).collect::<String>())
    } else {
        text.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_clean_text() {
        let raw = "PVR \u{2013} reduced\n\n by  37%\u{2019}s \u{201C}primary\u{201D} \u{2022} endpoint";
        assert_eq!(clean_text(raw), "PVR - reduced by 37%'s \"primary\" * endpoint");
    }

    #[test]
    fn test_truncate_sample() {
        assert_eq!(truncate_sample("abcdef", 3), "abc...");
        assert_eq!(truncate_sample("abc", 3), "abc");
    }

    #[test]
    fn test_garbage_bytes_fail() {
        assert!(pdf_bytes_text(b"not a pdf").is_err());
    }
}
