pub mod classify;
pub mod config;
pub mod engine;
pub mod error;
pub mod events;
pub mod executor;
pub mod hasher;
mod planner;
pub mod reader;
pub mod safety;
pub mod scanner;
pub mod storage;

pub use classify::{Classification, Classifier, HeuristicClassifier};
pub use config::AppConfig;
pub use engine::Organizer;
pub use error::Error;
pub use events::{CountingSink, EventSink, SilentSink};
pub use executor::{ExecutionReport, ItemOutcome, Outcome};
pub use planner::ProposedMove;
pub use storage::models::{ItemStatus, Plan, PlanItem, PlanStatus, PlanSummary};
