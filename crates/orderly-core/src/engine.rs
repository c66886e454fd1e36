use crate::classify::{Classifier, ConfidenceResolver};
use crate::config::AppConfig;
use crate::error::Error;
use crate::events::EventSink;
use crate::executor::{self, ExecutionReport};
use crate::planner::{Planner, ProposedMove};
use crate::reader::TieredReader;
use crate::safety::{canonicalize_lenient, SafetyPolicy};
use crate::scanner;
use crate::storage::models::{Plan, PlanStatus, PlanSummary};
use crate::storage::Database;
use std::path::{Path, PathBuf};
use std::sync::atomic::AtomicBool;
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, info};

/// Entry point for planning and executing file organization.
///
/// Every operation opens its own database connection, so one `Organizer`
/// (or several, across threads or processes) can share a database file.
pub struct Organizer {
    config: AppConfig,
    db_path: String,
    classifier: Arc<dyn Classifier>,
    reader: TieredReader,
    resolver: ConfidenceResolver,
    policy: SafetyPolicy,
}

impl Organizer {
    pub fn new(config: AppConfig, classifier: Arc<dyn Classifier>) -> Self {
        Self {
            db_path: config.db_path.clone(),
            reader: TieredReader::new(config.reader.clone()),
            resolver: ConfidenceResolver::new(config.confidence.clone()),
            policy: SafetyPolicy::new(&config.safety),
            classifier,
            config,
        }
    }

    pub fn with_db_path(mut self, path: &str) -> Self {
        self.db_path = path.to_string();
        self
    }

    pub fn config(&self) -> &AppConfig {
        &self.config
    }

    fn open_db(&self) -> Result<Database, Error> {
        Ok(Database::open(&self.db_path)?)
    }

    fn planner<'a>(&'a self, db: &'a Database, sink: &'a dyn EventSink) -> Planner<'a> {
        Planner {
            db,
            classifier: self.classifier.as_ref(),
            reader: &self.reader,
            resolver: &self.resolver,
            policy: &self.policy,
            fingerprint_window: self.config.fingerprint.window_bytes,
            sink,
        }
    }

    /// Scan `root` and persist a plan with one item per file found:
    /// 1. List files (sorted, ignore patterns applied, database files excluded)
    /// 2. Fingerprint, then classify on cache miss
    /// 3. Decide a destination per file and store the plan in one transaction
    pub fn create_plan(&self, root: &Path, sink: &dyn EventSink) -> Result<Plan, Error> {
        let root = canonical_root(root)?;

        info!("Scanning {}...", root.display());
        let scan_start = Instant::now();
        let excluded = self.database_files();
        let files: Vec<PathBuf> = scanner::list_files(&root, &self.config.ignore_patterns)?
            .into_iter()
            .filter(|f| !excluded.contains(f))
            .collect();
        debug!(
            "Listed {} files in {:.2}s",
            files.len(),
            scan_start.elapsed().as_secs_f64()
        );

        info!("Classifying {} files...", files.len());
        let db = self.open_db()?;
        self.planner(&db, sink).plan_files(&root, &files)
    }

    /// Persist caller-supplied moves as a plan. Moves that fail the safety
    /// check are stored as ERROR items and will never execute.
    pub fn propose_plan(
        &self,
        root: &Path,
        moves: &[ProposedMove],
        sink: &dyn EventSink,
    ) -> Result<Plan, Error> {
        let root = canonical_root(root)?;
        let db = self.open_db()?;
        self.planner(&db, sink).plan_moves(&root, moves)
    }

    /// Approve a CREATED plan. Returns the plan's status afterwards; a plan
    /// that was already past CREATED keeps its status.
    pub fn approve_plan(&self, plan_id: &str) -> Result<PlanStatus, Error> {
        let db = self.open_db()?;
        if db.approve_plan(plan_id)? {
            info!("Plan {} approved", plan_id);
            return Ok(PlanStatus::Approved);
        }
        match db.get_plan_status(plan_id)? {
            Some(status) => {
                debug!("Plan {} not approved: already {}", plan_id, status);
                Ok(status)
            }
            None => Err(Error::PlanNotFound(plan_id.to_string())),
        }
    }

    pub fn get_plan(&self, plan_id: &str) -> Result<Plan, Error> {
        self.open_db()?
            .get_plan(plan_id)?
            .ok_or_else(|| Error::PlanNotFound(plan_id.to_string()))
    }

    pub fn list_plans(&self, offset: i64, limit: i64) -> Result<Vec<PlanSummary>, Error> {
        Ok(self.open_db()?.list_plans(offset, limit)?)
    }

    pub fn execute_plan(&self, plan_id: &str, sink: &dyn EventSink) -> Result<ExecutionReport, Error> {
        self.execute_plan_until(plan_id, sink, &AtomicBool::new(false))
    }

    /// Execute a plan, stopping between items once `cancel` is set.
    pub fn execute_plan_until(
        &self,
        plan_id: &str,
        sink: &dyn EventSink,
        cancel: &AtomicBool,
    ) -> Result<ExecutionReport, Error> {
        let db = self.open_db()?;
        executor::execute_plan(
            &db,
            &self.policy,
            plan_id,
            self.config.require_approval,
            sink,
            cancel,
        )
    }

    pub fn count_cache_entries(&self) -> Result<i64, Error> {
        Ok(self.open_db()?.count_cache_entries()?)
    }

    pub fn clear_cache(&self) -> Result<usize, Error> {
        let removed = self.open_db()?.clear_cache()?;
        info!("Removed {} cache entries", removed);
        Ok(removed)
    }

    /// The database file and its SQLite sidecars, which must never be planned.
    fn database_files(&self) -> Vec<PathBuf> {
        let Ok(db) = canonicalize_lenient(Path::new(&self.db_path)) else {
            return Vec::new();
        };
        let base = db.to_string_lossy().into_owned();
        ["-wal", "-shm", "-journal"]
            .iter()
            .map(|suffix| PathBuf::from(format!("{}{}", base, suffix)))
            .chain(std::iter::once(db))
            .collect()
    }
}

fn canonical_root(root: &Path) -> Result<PathBuf, Error> {
    if !root.is_dir() {
        return Err(Error::InvalidInput(format!(
            "{} is not an existing directory",
            root.display()
        )));
    }
    Ok(root.canonicalize()?)
}
