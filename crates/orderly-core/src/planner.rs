//! Turns a directory listing into a persisted plan.
//!
//! Every listed file produces exactly one plan item: PENDING for a proposed
//! move, SKIPPED for a decision to leave the file alone (or a classification
//! failure), ERROR for unreadable files and safety rejections.

use crate::classify::{Classification, Classifier, ConfidenceResolver};
use crate::error::Error;
use crate::events::EventSink;
use crate::hasher::{fingerprint_all, FileFingerprint};
use crate::reader::TieredReader;
use crate::safety::{is_safe, SafetyPolicy, SecurityError};
use crate::storage::models::{ItemStatus, Plan, PlanItem, PlanStatus};
use crate::storage::Database;
use std::collections::HashSet;
use std::io;
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};
use uuid::Uuid;

/// A move proposed directly by a caller instead of derived from a scan.
#[derive(Debug, Clone)]
pub struct ProposedMove {
    pub src: PathBuf,
    pub dest: PathBuf,
    pub reasoning: String,
}

pub(crate) struct Planner<'a> {
    pub db: &'a Database,
    pub classifier: &'a dyn Classifier,
    pub reader: &'a TieredReader,
    pub resolver: &'a ConfidenceResolver,
    pub policy: &'a SafetyPolicy,
    pub fingerprint_window: u64,
    pub sink: &'a dyn EventSink,
}

/// Outcome of classifying one file: where it came from and how deep we read.
struct Decision {
    classification: Classification,
    cached: bool,
    note: Option<String>,
}

impl<'a> Planner<'a> {
    /// Plan every file in `files`, all of which live under the canonical `root`.
    pub fn plan_files(&self, root: &Path, files: &[PathBuf]) -> Result<Plan, Error> {
        let plan_id = Uuid::new_v4().to_string();
        let total = files.len();

        // Sources rejected up front are never read.
        let admissions: Vec<Result<(), SecurityError>> =
            files.iter().map(|src| self.admit(root, src)).collect();
        let readable: Vec<PathBuf> = files
            .iter()
            .zip(&admissions)
            .filter(|(_, admitted)| admitted.is_ok())
            .map(|(src, _)| src.clone())
            .collect();
        let mut fingerprints = fingerprint_all(&readable, self.fingerprint_window).into_iter();

        let mut claimed: HashSet<PathBuf> = HashSet::new();
        let mut items = Vec::with_capacity(total);

        for (index, (src, admitted)) in files.iter().zip(admissions).enumerate() {
            let item = match admitted {
                Err(e) => {
                    self.sink.on_safety_block(&src.to_string_lossy(), &e.to_string());
                    failed_item(&plan_id, src, Error::Security(e))
                }
                Ok(()) => {
                    let fingerprint = fingerprints
                        .next()
                        .unwrap_or_else(|| Err(io::Error::other("fingerprint missing")));
                    self.plan_file(&plan_id, root, src, fingerprint, &mut claimed)?
                }
            };
            items.push(item);
            self.sink.on_file_planned(index + 1, total);
        }

        let plan = Plan {
            id: plan_id,
            root_dir: root.to_string_lossy().into_owned(),
            status: PlanStatus::Created,
            created_at: chrono::Utc::now().to_rfc3339(),
            executed_at: None,
            items,
        };
        self.db.insert_plan(&plan)?;

        info!(
            "Plan {} created: {} pending, {} skipped, {} errors",
            plan.id,
            plan.count_by_status(ItemStatus::Pending),
            plan.count_by_status(ItemStatus::Skipped),
            plan.count_by_status(ItemStatus::Error),
        );
        Ok(plan)
    }

    /// Persist caller-supplied moves, applying the advisory safety check.
    pub fn plan_moves(&self, root: &Path, moves: &[ProposedMove]) -> Result<Plan, Error> {
        let plan_id = Uuid::new_v4().to_string();
        let items = moves
            .iter()
            .map(|m| match self.policy.validate_move(root, &m.src, &m.dest) {
                Ok(()) => PlanItem {
                    id: Uuid::new_v4().to_string(),
                    plan_id: plan_id.clone(),
                    src_path: m.src.to_string_lossy().into_owned(),
                    dest_path: m.dest.to_string_lossy().into_owned(),
                    reasoning: m.reasoning.clone(),
                    status: ItemStatus::Pending,
                    error_msg: None,
                },
                Err(e) => {
                    self.sink.on_safety_block(&m.src.to_string_lossy(), &e.to_string());
                    let mut item = failed_item(&plan_id, &m.src, Error::Security(e));
                    item.dest_path = m.dest.to_string_lossy().into_owned();
                    item.reasoning = m.reasoning.clone();
                    item
                }
            })
            .collect();

        let plan = Plan {
            id: plan_id,
            root_dir: root.to_string_lossy().into_owned(),
            status: PlanStatus::Created,
            created_at: chrono::Utc::now().to_rfc3339(),
            executed_at: None,
            items,
        };
        self.db.insert_plan(&plan)?;
        Ok(plan)
    }

    fn admit(&self, root: &Path, src: &Path) -> Result<(), SecurityError> {
        self.policy.move_guard(src)?;
        if !is_safe(root, src) {
            return Err(SecurityError::OutsideRoot {
                path: src.display().to_string(),
                root: root.display().to_string(),
            });
        }
        Ok(())
    }

    fn plan_file(
        &self,
        plan_id: &str,
        root: &Path,
        src: &Path,
        fingerprint: io::Result<FileFingerprint>,
        claimed: &mut HashSet<PathBuf>,
    ) -> Result<PlanItem, Error> {
        let path_str = src.to_string_lossy().into_owned();
        let file_name = src
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();

        let fingerprint = match fingerprint {
            Ok(fp) => fp,
            Err(e) => {
                warn!("Cannot fingerprint {}: {}", path_str, e);
                return Ok(failed_item(plan_id, src, Error::Io(e)));
            }
        };

        let decision = match self.decide(src, &file_name, &fingerprint) {
            Ok(decision) => decision,
            Err(e) if e.is_fatal() => return Err(e),
            Err(Error::Classification(msg)) => {
                warn!("Classification failed for {}: {}", path_str, msg);
                return Ok(skipped_item(
                    plan_id,
                    src,
                    "Not classified".to_string(),
                    Some(Error::Classification(msg).item_message()),
                ));
            }
            Err(e) => {
                warn!("Cannot sample {}: {}", path_str, e);
                return Ok(failed_item(plan_id, src, e));
            }
        };

        let Classification {
            category,
            confidence,
            ..
        } = &decision.classification;
        let resolved = self.resolver.resolve(category, *confidence, &file_name);

        if self.resolver.is_keep(category) {
            self.sink.on_do_nothing(&path_str);
            return Ok(skipped_item(
                plan_id,
                src,
                "Keep in current location".to_string(),
                None,
            ));
        }

        if resolved < self.resolver.min_move_confidence() {
            self.sink.on_do_nothing(&path_str);
            return Ok(skipped_item(
                plan_id,
                src,
                format!(
                    "Classified as {} but confidence {:.2} is below {:.2}; left in place",
                    category,
                    resolved,
                    self.resolver.min_move_confidence()
                ),
                None,
            ));
        }

        let folder = match category_folder(category) {
            Some(folder) => folder,
            None => {
                return Ok(skipped_item(
                    plan_id,
                    src,
                    "Not classified".to_string(),
                    Some(
                        Error::Classification(format!("unusable category '{}'", category))
                            .item_message(),
                    ),
                ))
            }
        };

        let candidate = root.join(&folder).join(&file_name);
        if candidate == src {
            self.sink.on_do_nothing(&path_str);
            return Ok(skipped_item(
                plan_id,
                src,
                format!("Already in {}", folder),
                None,
            ));
        }
        let dest = unique_destination(candidate, claimed);

        if let Err(e) = self.policy.validate_move(root, src, &dest) {
            self.sink.on_safety_block(&path_str, &e.to_string());
            return Ok(failed_item(plan_id, src, Error::Security(e)));
        }

        let mut reasoning = format!("Classified as {} (confidence {:.2}", category, resolved);
        if decision.cached {
            reasoning.push_str(", cached");
        }
        reasoning.push(')');
        if let Some(note) = decision.note {
            reasoning.push_str("; ");
            reasoning.push_str(&note);
        }

        debug!("{} -> {} ({})", path_str, dest.display(), reasoning);
        claimed.insert(dest.clone());
        Ok(PlanItem {
            id: Uuid::new_v4().to_string(),
            plan_id: plan_id.to_string(),
            src_path: path_str,
            dest_path: dest.to_string_lossy().into_owned(),
            reasoning,
            status: ItemStatus::Pending,
            error_msg: None,
        })
    }

    /// Cache lookup, falling back to tiered sampling and classification.
    fn decide(
        &self,
        src: &Path,
        file_name: &str,
        fingerprint: &FileFingerprint,
    ) -> Result<Decision, Error> {
        let path_str = src.to_string_lossy();

        if let Some(classification) = self.db.lookup_classification(&fingerprint.digest)? {
            self.sink.on_cache_hit(&path_str);
            self.sink
                .on_bytes_saved(fingerprint.bytes_read, fingerprint.size);
            return Ok(Decision {
                classification,
                cached: true,
                note: None,
            });
        }
        self.sink.on_cache_miss(&path_str);

        let mut sample = self.reader.sample(src)?;
        let mut bytes_read = fingerprint.bytes_read + sample.bytes_read();
        let mut classification = self.classify(file_name, &sample.bytes)?;

        // Escalation looks at the classifier's own score, before any boost or penalty.
        if let Some(reason) = self.reader.post_classification_trigger(
            &sample,
            classification.confidence,
            classification.requires_deep_scan,
        ) {
            sample = self.reader.escalate(src, reason)?;
            bytes_read += sample.bytes_read();
            classification = self.classify(file_name, &sample.bytes)?;
        }
        self.sink.on_bytes_saved(bytes_read, fingerprint.size);

        self.db.put_classification(
            &fingerprint.digest,
            &path_str,
            fingerprint.size as i64,
            fingerprint.mtime,
            &classification,
        )?;

        Ok(Decision {
            classification,
            cached: false,
            note: sample.escalation.map(|reason| format!("deep read: {}", reason)),
        })
    }

    fn classify(&self, file_name: &str, sample: &[u8]) -> Result<Classification, Error> {
        let classification = match self.classifier.classify(file_name, sample) {
            Ok(c) => c,
            Err(Error::Classification(msg)) => return Err(Error::Classification(msg)),
            Err(other) => return Err(Error::Classification(other.to_string())),
        };
        classification.validate()?;
        Ok(classification)
    }
}

/// Folder name for a category: a single path component, never `.` or `..`.
fn category_folder(category: &str) -> Option<String> {
    let folder: String = category
        .trim()
        .chars()
        .map(|c| match c {
            '/' | '\\' | '\0' => '_',
            other => other,
        })
        .collect();
    match folder.as_str() {
        "" | "." | ".." => None,
        _ => Some(folder),
    }
}

/// First of `name`, `name-1`, `name-2`, ... (suffix before the extension)
/// that is neither claimed by this plan nor present on disk.
fn unique_destination(candidate: PathBuf, claimed: &HashSet<PathBuf>) -> PathBuf {
    let taken = |p: &Path| claimed.contains(p) || p.symlink_metadata().is_ok();
    if !taken(&candidate) {
        return candidate;
    }

    let parent = candidate.parent().map(Path::to_path_buf).unwrap_or_default();
    let stem = candidate
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_default();
    let ext = candidate
        .extension()
        .map(|e| format!(".{}", e.to_string_lossy()))
        .unwrap_or_default();

    let mut n = 1u32;
    loop {
        let next = parent.join(format!("{}-{}{}", stem, n, ext));
        if !taken(&next) {
            return next;
        }
        n += 1;
    }
}

fn failed_item(plan_id: &str, src: &Path, error: Error) -> PlanItem {
    let path = src.to_string_lossy().into_owned();
    PlanItem {
        id: Uuid::new_v4().to_string(),
        plan_id: plan_id.to_string(),
        src_path: path.clone(),
        dest_path: path,
        reasoning: "Rejected during planning".to_string(),
        status: ItemStatus::Error,
        error_msg: Some(error.item_message()),
    }
}

fn skipped_item(plan_id: &str, src: &Path, reasoning: String, error_msg: Option<String>) -> PlanItem {
    let path = src.to_string_lossy().into_owned();
    PlanItem {
        id: Uuid::new_v4().to_string(),
        plan_id: plan_id.to_string(),
        src_path: path.clone(),
        dest_path: path,
        reasoning,
        status: ItemStatus::Skipped,
        error_msg,
    }
}
