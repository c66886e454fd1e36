use crate::config::ConfidenceConfig;

/// Turns a raw classifier score into the final, policy-adjusted confidence.
///
/// Rules, in order:
/// 1. start from the raw score (NaN counts as 0.0)
/// 2. generic category: subtract the penalty
/// 3. category label found in the file name (case-insensitive): add the boost
/// 4. keep-in-place category: force 1.0, overriding 2 and 3
/// 5. clamp to [0.0, 1.0]
#[derive(Debug, Clone)]
pub struct ConfidenceResolver {
    config: ConfidenceConfig,
}

impl ConfidenceResolver {
    pub fn new(config: ConfidenceConfig) -> Self {
        Self { config }
    }

    pub fn resolve(&self, raw_category: &str, raw_confidence: f64, file_name: &str) -> f64 {
        let mut score = if raw_confidence.is_nan() {
            0.0
        } else {
            raw_confidence
        };

        if self.is_generic(raw_category) {
            score -= self.config.generic_penalty;
        }

        let label = raw_category.trim().to_lowercase();
        if !label.is_empty() && file_name.to_lowercase().contains(&label) {
            score += self.config.filename_boost;
        }

        if self.is_keep(raw_category) {
            score = 1.0;
        }

        score.clamp(0.0, 1.0)
    }

    /// The "leave the file where it is" outcome.
    pub fn is_keep(&self, category: &str) -> bool {
        category.trim().eq_ignore_ascii_case(&self.config.keep_category)
    }

    pub fn is_generic(&self, category: &str) -> bool {
        let category = category.trim();
        self.config
            .generic_categories
            .iter()
            .any(|g| g.eq_ignore_ascii_case(category))
    }

    pub fn min_move_confidence(&self) -> f64 {
        self.config.min_move_confidence
    }
}

impl Default for ConfidenceResolver {
    fn default() -> Self {
        Self::new(ConfidenceConfig::default())
    }
}
