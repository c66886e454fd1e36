use crate::config::ReaderConfig;
use std::borrow::Cow;
use std::fmt;
use std::fs::File;
use std::io::{self, Read, Seek, SeekFrom};
use std::path::Path;
use tracing::trace;

/// Read `head` bytes from the start and `tail` bytes from the end of a file.
///
/// Files no larger than `head + tail` are read whole, so the two windows never
/// overlap. Never reads more than `head + tail` bytes. Returns the sampled bytes
/// and the file size observed when the file was opened.
pub fn read_head_tail(path: &Path, head: u64, tail: u64) -> io::Result<(Vec<u8>, u64)> {
    let mut f = File::open(path)?;
    let size = f.metadata()?.len();
    let budget = head.saturating_add(tail);

    if size <= budget {
        let mut buffer = Vec::with_capacity(size as usize);
        (&mut f).take(budget).read_to_end(&mut buffer)?;
        return Ok((buffer, size));
    }

    let mut buffer = Vec::with_capacity(budget as usize);
    (&mut f).take(head).read_to_end(&mut buffer)?;
    f.seek(SeekFrom::End(-(tail as i64)))?;
    f.take(tail).read_to_end(&mut buffer)?;
    Ok((buffer, size))
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Tier {
    Shallow,
    Deep,
}

/// Why a file was read at the deep tier.
#[derive(Debug, Clone, PartialEq)]
pub enum EscalationReason {
    TriggerPhrase(String),
    HighRiskExtension(String),
    LowConfidence(f64),
    DeepScanRequested,
}

impl fmt::Display for EscalationReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EscalationReason::TriggerPhrase(p) => write!(f, "trigger phrase '{}'", p),
            EscalationReason::HighRiskExtension(e) => write!(f, "high-risk extension '.{}'", e),
            EscalationReason::LowConfidence(c) => write!(f, "low confidence {:.2}", c),
            EscalationReason::DeepScanRequested => write!(f, "classifier requested a deep scan"),
        }
    }
}

#[derive(Debug, Clone)]
pub struct Sample {
    pub bytes: Vec<u8>,
    pub tier: Tier,
    pub escalation: Option<EscalationReason>,
    pub file_size: u64,
}

impl Sample {
    pub fn bytes_read(&self) -> u64 {
        self.bytes.len() as u64
    }

    /// Lossy UTF-8 view used for trigger matching.
    pub fn text(&self) -> Cow<'_, str> {
        String::from_utf8_lossy(&self.bytes)
    }
}

/// Two-tier sampler: a small head/tail read for the common case, a larger one
/// when the content or the first classification suggests the middle matters.
#[derive(Debug, Clone)]
pub struct TieredReader {
    config: ReaderConfig,
    phrases: Vec<String>,
}

impl TieredReader {
    pub fn new(config: ReaderConfig) -> Self {
        let phrases = config
            .trigger_phrases
            .iter()
            .map(|p| p.to_lowercase())
            .filter(|p| !p.is_empty())
            .collect();
        Self { config, phrases }
    }

    /// Read the shallow tier, escalating straight to the deep tier when the
    /// extension is high-risk or the shallow bytes contain a trigger phrase.
    pub fn sample(&self, path: &Path) -> io::Result<Sample> {
        let (bytes, file_size) = read_head_tail(
            path,
            self.config.tier1_head_bytes,
            self.config.tier1_tail_bytes,
        )?;
        let shallow = Sample {
            bytes,
            tier: Tier::Shallow,
            escalation: None,
            file_size,
        };

        match self.pre_classification_trigger(path, &shallow) {
            Some(reason) => self.escalate(path, reason),
            None => Ok(shallow),
        }
    }

    /// Read the deep tier unconditionally.
    pub fn escalate(&self, path: &Path, reason: EscalationReason) -> io::Result<Sample> {
        trace!("Escalating {} to deep read: {}", path.display(), reason);
        let (bytes, file_size) = read_head_tail(
            path,
            self.config.tier2_head_bytes,
            self.config.tier2_tail_bytes,
        )?;
        Ok(Sample {
            bytes,
            tier: Tier::Deep,
            escalation: Some(reason),
            file_size,
        })
    }

    /// Escalation decided after classifying shallow content, from the
    /// confidence the classifier returned. Only meaningful for shallow
    /// samples; a deep sample is never re-read.
    pub fn post_classification_trigger(
        &self,
        sample: &Sample,
        returned_confidence: f64,
        requires_deep_scan: bool,
    ) -> Option<EscalationReason> {
        if sample.tier == Tier::Deep {
            return None;
        }
        if returned_confidence < self.config.escalation_threshold {
            return Some(EscalationReason::LowConfidence(returned_confidence));
        }
        if requires_deep_scan {
            return Some(EscalationReason::DeepScanRequested);
        }
        None
    }

    fn pre_classification_trigger(&self, path: &Path, sample: &Sample) -> Option<EscalationReason> {
        if let Some(ext) = path.extension().map(|e| e.to_string_lossy().to_lowercase()) {
            if self
                .config
                .high_risk_extensions
                .iter()
                .any(|risky| risky.trim_start_matches('.').eq_ignore_ascii_case(&ext))
            {
                return Some(EscalationReason::HighRiskExtension(ext));
            }
        }

        let text = sample.text().to_lowercase();
        self.phrases
            .iter()
            .find(|phrase| text.contains(phrase.as_str()))
            .map(|phrase| EscalationReason::TriggerPhrase(phrase.clone()))
    }
}
