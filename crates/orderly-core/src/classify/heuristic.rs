use super::{Classification, Classifier};
use crate::error::Error;
use std::path::Path;

const IMAGE_EXTENSIONS: &[&str] = &["jpg", "jpeg", "png", "gif", "webp", "heic"];
const DOCUMENT_EXTENSIONS: &[&str] = &["pdf", "docx"];
const FINANCIAL_KEYWORDS: &[&str] = &["invoice", "total", "receipt", "amount due"];

/// Built-in classifier using extension and keyword rules. Returns raw scores;
/// policy adjustments belong to the confidence resolver.
#[derive(Debug, Clone, Default)]
pub struct HeuristicClassifier;

impl Classifier for HeuristicClassifier {
    fn classify(&self, file_name: &str, sample: &[u8]) -> Result<Classification, Error> {
        let ext = Path::new(file_name)
            .extension()
            .map(|e| e.to_string_lossy().to_lowercase())
            .unwrap_or_default();

        let mut result = Classification::new("Misc", 0.5, false);

        if DOCUMENT_EXTENSIONS.contains(&ext.as_str()) {
            result.requires_deep_scan = true;
        }

        if IMAGE_EXTENSIONS.contains(&ext.as_str()) {
            result.category = "Images".to_string();
            result.confidence = 0.9;
        }

        if !sample.is_empty() {
            let text = String::from_utf8_lossy(sample).to_lowercase();
            if FINANCIAL_KEYWORDS.iter().any(|k| text.contains(k)) {
                result.category = "Financial".to_string();
                result.confidence = 0.85;
                result.requires_deep_scan = true;
            }
        }

        Ok(result)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_documents_request_deep_scan() {
        let c = HeuristicClassifier.classify("test.pdf", b"").unwrap();
        assert!(c.requires_deep_scan);
        assert_eq!(c.category, "Misc");
    }

    #[test]
    fn test_images_by_extension() {
        let c = HeuristicClassifier.classify("test.PNG", b"\x89PNG").unwrap();
        assert_eq!(c.category, "Images");
        assert!(c.confidence >= 0.9);
    }

    #[test]
    fn test_financial_by_content() {
        let c = HeuristicClassifier
            .classify("invoice.txt", b"Total: $500")
            .unwrap();
        assert_eq!(c.category, "Financial");
    }
}
