use config::{Config, ConfigError, Environment, File as ConfigFile};
use serde::Deserialize;

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub db_path: String,
    /// When false, plans in CREATED state may be executed without an approval step.
    pub require_approval: bool,
    pub ignore_patterns: Vec<String>,
    pub fingerprint: FingerprintConfig,
    pub reader: ReaderConfig,
    pub confidence: ConfidenceConfig,
    pub safety: SafetyConfig,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            db_path: "orderly.db".to_string(),
            require_approval: true,
            ignore_patterns: Vec::new(),
            fingerprint: FingerprintConfig::default(),
            reader: ReaderConfig::default(),
            confidence: ConfidenceConfig::default(),
            safety: SafetyConfig::default(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct FingerprintConfig {
    /// Bytes hashed from each end of the file.
    pub window_bytes: u64,
}

impl Default for FingerprintConfig {
    fn default() -> Self {
        Self { window_bytes: 4096 }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ReaderConfig {
    pub tier1_head_bytes: u64,
    pub tier1_tail_bytes: u64,
    pub tier2_head_bytes: u64,
    pub tier2_tail_bytes: u64,
    pub trigger_phrases: Vec<String>,
    /// Extensions without the leading dot, compared case-insensitively.
    pub high_risk_extensions: Vec<String>,
    pub escalation_threshold: f64,
}

impl Default for ReaderConfig {
    fn default() -> Self {
        Self {
            tier1_head_bytes: 2048,
            tier1_tail_bytes: 1024,
            tier2_head_bytes: 64 * 1024,
            tier2_tail_bytes: 64 * 1024,
            trigger_phrases: vec![
                "invoice".to_string(),
                "total".to_string(),
                "contract".to_string(),
                "agreement".to_string(),
            ],
            high_risk_extensions: vec!["pdf".to_string(), "docx".to_string()],
            escalation_threshold: 0.6,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ConfidenceConfig {
    pub generic_categories: Vec<String>,
    pub generic_penalty: f64,
    pub filename_boost: f64,
    pub keep_category: String,
    /// Resolved confidence below this leaves the file in place.
    pub min_move_confidence: f64,
}

impl Default for ConfidenceConfig {
    fn default() -> Self {
        Self {
            generic_categories: vec!["Misc".to_string(), "Other".to_string()],
            generic_penalty: 0.2,
            filename_boost: 0.2,
            keep_category: "Keep_Current_Location".to_string(),
            min_move_confidence: 0.4,
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct SafetyConfig {
    pub allow_symlinks: bool,
}

/// Load `Config.toml` (optional) with `ORDERLY__SECTION__KEY` environment overrides.
pub fn load_configuration() -> Result<AppConfig, ConfigError> {
    let builder = Config::builder()
        .add_source(ConfigFile::with_name("Config").required(false))
        .add_source(Environment::with_prefix("ORDERLY").separator("__"))
        .build()?;
    builder.try_deserialize::<AppConfig>()
}
