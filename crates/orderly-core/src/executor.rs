use crate::error::Error;
use crate::events::EventSink;
use crate::safety::SafetyPolicy;
use crate::storage::models::{ItemStatus, PlanItem, PlanStatus};
use crate::storage::Database;
use std::fmt;
use std::fs;
use std::io;
use std::path::Path;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};

/// What happened to one item during an execution pass.
#[derive(Debug, Clone, PartialEq)]
pub enum Outcome {
    /// The move was performed by this pass.
    Moved,
    /// The filesystem already showed the move done; only the status was written.
    Recovered,
    /// Item was DONE before this pass; nothing touched.
    AlreadyDone,
    Skipped,
    /// Item was ERROR before this pass; not retried.
    PreviouslyFailed(String),
    /// Failed during this pass with the recorded message.
    Failed(String),
    /// A concurrent caller moved the item out of PENDING first.
    HandledElsewhere(ItemStatus),
}

impl fmt::Display for Outcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Outcome::Moved => write!(f, "moved"),
            Outcome::Recovered => write!(f, "already moved, status recorded"),
            Outcome::AlreadyDone => write!(f, "already done"),
            Outcome::Skipped => write!(f, "skipped"),
            Outcome::PreviouslyFailed(msg) => write!(f, "previously failed: {}", msg),
            Outcome::Failed(msg) => write!(f, "error: {}", msg),
            Outcome::HandledElsewhere(status) => write!(f, "handled elsewhere ({})", status),
        }
    }
}

#[derive(Debug, Clone)]
pub struct ItemOutcome {
    pub item_id: String,
    pub src_path: String,
    pub dest_path: String,
    pub outcome: Outcome,
}

#[derive(Debug)]
pub struct ExecutionReport {
    pub plan_id: String,
    pub status: PlanStatus,
    pub outcomes: Vec<ItemOutcome>,
    /// True when the cancel flag stopped the pass before the last item.
    pub interrupted: bool,
    pub duration: Duration,
}

impl ExecutionReport {
    pub fn count(&self, pred: impl Fn(&Outcome) -> bool) -> usize {
        self.outcomes.iter().filter(|o| pred(&o.outcome)).count()
    }
}

/// Execute a plan's PENDING items in persistence order.
///
/// Each item is re-validated and then reconciled with the filesystem, so a
/// move that happened before a crash is recorded instead of repeated. Status
/// writes are compare-and-swap against PENDING; losing the swap means another
/// caller handled the item. Per-item failures are recorded and the pass
/// continues; only storage errors and an unavailable root abort it. An
/// unavailable root aborts before any item is touched, so the plan can be
/// executed again once the root is back.
pub fn execute_plan(
    db: &Database,
    policy: &SafetyPolicy,
    plan_id: &str,
    require_approval: bool,
    sink: &dyn EventSink,
    cancel: &AtomicBool,
) -> Result<ExecutionReport, Error> {
    let start = Instant::now();
    let plan = db
        .get_plan(plan_id)?
        .ok_or_else(|| Error::PlanNotFound(plan_id.to_string()))?;

    if require_approval && plan.status == PlanStatus::Created {
        return Err(Error::NotApproved {
            plan_id: plan.id,
            status: plan.status,
        });
    }

    let root = match Path::new(&plan.root_dir).canonicalize() {
        Ok(root) if root.is_dir() => root,
        Ok(_) => {
            return Err(Error::InvalidInput(format!(
                "plan root {} is not a directory",
                plan.root_dir
            )))
        }
        Err(e) => {
            return Err(Error::InvalidInput(format!(
                "plan root {} is unavailable: {}",
                plan.root_dir, e
            )))
        }
    };
    let total = plan.items.len();
    let mut outcomes = Vec::with_capacity(total);
    let mut interrupted = false;

    for (index, item) in plan.items.iter().enumerate() {
        if cancel.load(Ordering::SeqCst) {
            info!("Execution of plan {} interrupted after {} items", plan.id, index);
            interrupted = true;
            break;
        }

        let outcome = match item.status {
            ItemStatus::Done => Outcome::AlreadyDone,
            ItemStatus::Skipped => Outcome::Skipped,
            ItemStatus::Error => {
                Outcome::PreviouslyFailed(item.error_msg.clone().unwrap_or_default())
            }
            ItemStatus::Pending => execute_item(db, policy, &root, item, sink)?,
        };
        debug!("{} -> {}: {}", item.src_path, item.dest_path, outcome);

        outcomes.push(ItemOutcome {
            item_id: item.id.clone(),
            src_path: item.src_path.clone(),
            dest_path: item.dest_path.clone(),
            outcome,
        });
        sink.on_item_executed(index + 1, total);
    }

    let status = db.finalize_plan(&plan.id)?;
    let report = ExecutionReport {
        plan_id: plan.id,
        status,
        outcomes,
        interrupted,
        duration: start.elapsed(),
    };
    info!(
        "Plan {} {}: {} moved, {} recovered, {} failed",
        report.plan_id,
        report.status,
        report.count(|o| *o == Outcome::Moved),
        report.count(|o| *o == Outcome::Recovered),
        report.count(|o| matches!(o, Outcome::Failed(_))),
    );
    Ok(report)
}

fn exists(path: &Path) -> bool {
    path.symlink_metadata().is_ok()
}

/// The move is visible on disk: source gone, destination present.
fn move_observed(src: &Path, dest: &Path) -> bool {
    !exists(src) && exists(dest)
}

fn execute_item(
    db: &Database,
    policy: &SafetyPolicy,
    root: &Path,
    item: &PlanItem,
    sink: &dyn EventSink,
) -> Result<Outcome, Error> {
    let src = Path::new(&item.src_path);
    let dest = Path::new(&item.dest_path);

    if let Err(e) = policy.validate_move(root, src, dest) {
        sink.on_safety_block(&item.src_path, &e.to_string());
        return fail(db, item, Error::Security(e));
    }

    if !exists(src) {
        let err = io::Error::new(io::ErrorKind::NotFound, "source not found");
        return settle(db, item, err);
    }
    if exists(dest) {
        let err = io::Error::new(io::ErrorKind::AlreadyExists, "destination already exists");
        return settle(db, item, err);
    }

    if let Some(parent) = dest.parent() {
        if let Err(e) = fs::create_dir_all(parent) {
            return fail(db, item, Error::Io(e));
        }
    }

    match fs::rename(src, dest) {
        Ok(()) => complete(db, item, Outcome::Moved),
        Err(e) => settle(db, item, describe_rename_error(e)),
    }
}

#[cfg(unix)]
const EXDEV: i32 = 18;

#[cfg(unix)]
fn is_cross_device(err: &io::Error) -> bool {
    err.raw_os_error() == Some(EXDEV)
}

#[cfg(not(unix))]
fn is_cross_device(_err: &io::Error) -> bool {
    false
}

/// `rename` cannot cross filesystems; give that case a readable message.
fn describe_rename_error(err: io::Error) -> io::Error {
    if is_cross_device(&err) {
        return io::Error::new(
            err.kind(),
            "destination is on another filesystem; cross-device moves are not supported",
        );
    }
    err
}

/// Record `err` unless the disk shows the move already done, by an earlier
/// crashed run or by a concurrent caller that won the rename.
fn settle(db: &Database, item: &PlanItem, err: io::Error) -> Result<Outcome, Error> {
    if move_observed(Path::new(&item.src_path), Path::new(&item.dest_path)) {
        return complete(db, item, Outcome::Recovered);
    }
    fail(db, item, Error::Io(err))
}

fn complete(db: &Database, item: &PlanItem, outcome: Outcome) -> Result<Outcome, Error> {
    if db.transition_item(&item.id, ItemStatus::Done, None)? {
        Ok(outcome)
    } else {
        handled_elsewhere(db, item)
    }
}

fn fail(db: &Database, item: &PlanItem, error: Error) -> Result<Outcome, Error> {
    let message = error.item_message();
    warn!("{} -> {} failed: {}", item.src_path, item.dest_path, message);
    if db.transition_item(&item.id, ItemStatus::Error, Some(&message))? {
        Ok(Outcome::Failed(message))
    } else {
        handled_elsewhere(db, item)
    }
}

fn handled_elsewhere(db: &Database, item: &PlanItem) -> Result<Outcome, Error> {
    let status = db
        .get_item(&item.id)?
        .map(|current| current.status)
        .unwrap_or(ItemStatus::Pending);
    debug!("Item {} already {} by another caller", item.id, status);
    Ok(Outcome::HandledElsewhere(status))
}
