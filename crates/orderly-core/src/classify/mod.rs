//! Classification boundary.
//!
//! The classifier itself is an external collaborator: it receives a byte
//! sample plus the file name and answers with a fixed three-field record.
//! Anything that does not fit that record is a classification error.

pub mod confidence;
pub mod heuristic;

pub use confidence::ConfidenceResolver;
pub use heuristic::HeuristicClassifier;

use crate::error::Error;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Classification {
    pub category: String,
    #[serde(alias = "confidence_score")]
    pub confidence: f64,
    #[serde(alias = "requiresDeepScan")]
    pub requires_deep_scan: bool,
}

impl Classification {
    pub fn new(category: impl Into<String>, confidence: f64, requires_deep_scan: bool) -> Self {
        Self {
            category: category.into(),
            confidence,
            requires_deep_scan,
        }
    }

    /// Parse and validate a raw collaborator response.
    pub fn from_json(raw: &str) -> Result<Self, Error> {
        let parsed: Classification = serde_json::from_str(raw)
            .map_err(|e| Error::Classification(format!("malformed response: {}", e)))?;
        parsed.validate()?;
        Ok(parsed)
    }

    pub fn validate(&self) -> Result<(), Error> {
        if self.category.trim().is_empty() {
            return Err(Error::Classification("empty category".to_string()));
        }
        if !(0.0..=1.0).contains(&self.confidence) {
            return Err(Error::Classification(format!(
                "confidence {} outside [0, 1]",
                self.confidence
            )));
        }
        Ok(())
    }
}

/// The classification collaborator. Implementations may be slow or fail;
/// failures are recorded per file and never abort a scan.
pub trait Classifier: Send + Sync {
    fn classify(&self, file_name: &str, sample: &[u8]) -> Result<Classification, Error>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_json_accepts_complete_record() {
        let c = Classification::from_json(
            r#"{"category":"Financial","confidence":0.8,"requires_deep_scan":false}"#,
        )
        .unwrap();
        assert_eq!(c, Classification::new("Financial", 0.8, false));
    }

    #[test]
    fn test_from_json_accepts_collaborator_field_names() {
        let c = Classification::from_json(
            r#"{"category":"Work","confidence_score":0.7,"requiresDeepScan":true,"extra":1}"#,
        )
        .unwrap();
        assert_eq!(c, Classification::new("Work", 0.7, true));
    }

    #[test]
    fn test_from_json_missing_field_is_error() {
        let err = Classification::from_json(r#"{"category":"Work","confidence":0.7}"#).unwrap_err();
        assert!(matches!(err, Error::Classification(_)));
    }

    #[test]
    fn test_from_json_rejects_out_of_range_and_empty() {
        assert!(Classification::from_json(
            r#"{"category":"Work","confidence":1.5,"requires_deep_scan":false}"#
        )
        .is_err());
        assert!(Classification::from_json(
            r#"{"category":" ","confidence":0.5,"requires_deep_scan":false}"#
        )
        .is_err());
    }
}
