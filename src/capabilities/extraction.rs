//! Text-extraction capability: raw uploaded bytes to ordered per-page text.

use async_trait::async_trait;

use crate::types::PolicyError;

/// Extracts the textual content of an uploaded document, one string per page
/// in page order. PDF, DOCX, or OCR backends implement this behind the trait;
/// the pipeline only sees pages.
#[async_trait]
pub trait TextExtractor: Send + Sync {
    async fn extract_pages(&self, bytes: &[u8]) -> Result<Vec<String>, PolicyError>;
}

/// Treats the upload as UTF-8 text with form-feed (`\u{c}`) page breaks,
/// the page framing PDF text extractors conventionally emit. Used in tests
/// and for plain-text policy files.
#[derive(Clone, Copy, Debug, Default)]
pub struct PlainTextExtractor;

#[async_trait]
impl TextExtractor for PlainTextExtractor {
    async fn extract_pages(&self, bytes: &[u8]) -> Result<Vec<String>, PolicyError> {
        let text = std::str::from_utf8(bytes)
            .map_err(|err| PolicyError::ExternalService(format!("document is not UTF-8: {err}")))?;
        Ok(text.split('\u{c}').map(str::to_string).collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn splits_on_form_feed_page_breaks() {
        let pages = PlainTextExtractor
            .extract_pages("page one\u{c}page two".as_bytes())
            .await
            .unwrap();
        assert_eq!(pages, vec!["page one".to_string(), "page two".to_string()]);
    }

    #[tokio::test]
    async fn rejects_non_utf8_input() {
        let result = PlainTextExtractor.extract_pages(&[0xff, 0xfe, 0x00]).await;
        assert!(matches!(result, Err(PolicyError::ExternalService(_))));
    }
}
