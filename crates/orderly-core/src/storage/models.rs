use crate::classify::Classification;
use rusqlite::types::{FromSql, FromSqlError, FromSqlResult, ToSql, ToSqlOutput, ValueRef};
use std::fmt;
use std::str::FromStr;

/// Lifecycle of a plan. CREATED and APPROVED are set explicitly; EXECUTED and
/// FAILED are derived from item statuses once every item is terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PlanStatus {
    Created,
    Approved,
    Executed,
    Failed,
}

impl PlanStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            PlanStatus::Created => "CREATED",
            PlanStatus::Approved => "APPROVED",
            PlanStatus::Executed => "EXECUTED",
            PlanStatus::Failed => "FAILED",
        }
    }
}

impl FromStr for PlanStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "CREATED" => Ok(PlanStatus::Created),
            "APPROVED" => Ok(PlanStatus::Approved),
            "EXECUTED" => Ok(PlanStatus::Executed),
            "FAILED" => Ok(PlanStatus::Failed),
            other => Err(format!("unknown plan status '{}'", other)),
        }
    }
}

/// Item states. PENDING is the only state with outgoing transitions.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ItemStatus {
    Pending,
    Skipped,
    Done,
    Error,
}

impl ItemStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            ItemStatus::Pending => "PENDING",
            ItemStatus::Skipped => "SKIPPED",
            ItemStatus::Done => "DONE",
            ItemStatus::Error => "ERROR",
        }
    }

    pub fn is_terminal(&self) -> bool {
        !matches!(self, ItemStatus::Pending)
    }
}

impl FromStr for ItemStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "PENDING" => Ok(ItemStatus::Pending),
            "SKIPPED" => Ok(ItemStatus::Skipped),
            "DONE" => Ok(ItemStatus::Done),
            "ERROR" => Ok(ItemStatus::Error),
            other => Err(format!("unknown item status '{}'", other)),
        }
    }
}

macro_rules! sql_text_enum {
    ($ty:ty) => {
        impl fmt::Display for $ty {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(self.as_str())
            }
        }

        impl ToSql for $ty {
            fn to_sql(&self) -> rusqlite::Result<ToSqlOutput<'_>> {
                Ok(ToSqlOutput::from(self.as_str()))
            }
        }

        impl FromSql for $ty {
            fn column_result(value: ValueRef<'_>) -> FromSqlResult<Self> {
                value
                    .as_str()?
                    .parse()
                    .map_err(|e: String| FromSqlError::Other(e.into()))
            }
        }
    };
}

sql_text_enum!(PlanStatus);
sql_text_enum!(ItemStatus);

/// Terminal plan status implied by its items, or `None` while any item is
/// still PENDING.
pub fn derive_plan_status(items: &[ItemStatus]) -> Option<PlanStatus> {
    if items.iter().any(|s| !s.is_terminal()) {
        return None;
    }
    if items.iter().any(|s| *s == ItemStatus::Error) {
        Some(PlanStatus::Failed)
    } else {
        Some(PlanStatus::Executed)
    }
}

/// One scan-to-organize intent with its items in persistence order.
#[derive(Debug, Clone)]
pub struct Plan {
    pub id: String,
    pub root_dir: String,
    pub status: PlanStatus,
    pub created_at: String,
    pub executed_at: Option<String>,
    pub items: Vec<PlanItem>,
}

impl Plan {
    pub fn count_by_status(&self, status: ItemStatus) -> usize {
        self.items.iter().filter(|i| i.status == status).count()
    }
}

/// One proposed move.
#[derive(Debug, Clone, PartialEq)]
pub struct PlanItem {
    pub id: String,
    pub plan_id: String,
    pub src_path: String,
    pub dest_path: String,
    pub reasoning: String,
    pub status: ItemStatus,
    pub error_msg: Option<String>,
}

/// Plan header with its item count, for listings.
#[derive(Debug, Clone)]
pub struct PlanSummary {
    pub id: String,
    pub root_dir: String,
    pub status: PlanStatus,
    pub created_at: String,
    pub executed_at: Option<String>,
    pub item_count: i64,
}

/// A cached classification. `file_path` is diagnostic only.
#[derive(Debug, Clone)]
pub struct CacheEntry {
    pub fingerprint: String,
    pub file_path: String,
    pub size_bytes: i64,
    pub mtime: i64,
    pub classification: Classification,
    pub created_at: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_text_round_trip() {
        for s in [
            PlanStatus::Created,
            PlanStatus::Approved,
            PlanStatus::Executed,
            PlanStatus::Failed,
        ] {
            assert_eq!(s.as_str().parse::<PlanStatus>().unwrap(), s);
        }
        assert!("done".parse::<ItemStatus>().is_err());
    }

    #[test]
    fn test_derive_plan_status() {
        use ItemStatus::*;
        assert_eq!(derive_plan_status(&[Done, Pending]), None);
        assert_eq!(derive_plan_status(&[Done, Skipped]), Some(PlanStatus::Executed));
        assert_eq!(derive_plan_status(&[Done, Error]), Some(PlanStatus::Failed));
        assert_eq!(derive_plan_status(&[]), Some(PlanStatus::Executed));
    }
}
