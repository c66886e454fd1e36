use super::models::*;
use super::sqlite::Database;
use crate::classify::Classification;
use crate::error::Error;
use rusqlite::{params, OptionalExtension, Result, Row};
use tracing::{debug, warn};

const PLAN_ITEM_COLUMNS: &str =
    "id, plan_id, src_path, dest_path, reasoning, status, error_msg";

fn plan_item_from_row(row: &Row<'_>) -> Result<PlanItem> {
    Ok(PlanItem {
        id: row.get(0)?,
        plan_id: row.get(1)?,
        src_path: row.get(2)?,
        dest_path: row.get(3)?,
        reasoning: row.get(4)?,
        status: row.get(5)?,
        error_msg: row.get(6)?,
    })
}

impl Database {
    // ── File Cache ───────────────────────────────────────────────

    /// Cached classification for a fingerprint. An undecodable entry is
    /// reported as a miss so the fresh result overwrites it.
    pub fn lookup_classification(&self, fingerprint: &str) -> Result<Option<Classification>> {
        let raw: Option<String> = self
            .connection()
            .query_row(
                "SELECT classification FROM file_cache WHERE fingerprint = ?1",
                params![fingerprint],
                |row| row.get(0),
            )
            .optional()?;

        Ok(raw.and_then(|json| match serde_json::from_str::<Classification>(&json) {
            Ok(c) => Some(c),
            Err(e) => {
                warn!("Discarding undecodable cache entry {}: {}", fingerprint, e);
                None
            }
        }))
    }

    /// Insert or overwrite the classification stored for a fingerprint.
    pub fn put_classification(
        &self,
        fingerprint: &str,
        file_path: &str,
        size_bytes: i64,
        mtime: i64,
        classification: &Classification,
    ) -> std::result::Result<(), Error> {
        let json = serde_json::to_string(classification)
            .map_err(|e| Error::Cache(format!("serialize error: {}", e)))?;
        let now = chrono::Utc::now().to_rfc3339();
        self.connection().execute(
            "INSERT INTO file_cache \
             (fingerprint, file_path, size_bytes, mtime, classification, created_at) \
             VALUES (?1, ?2, ?3, ?4, ?5, ?6) \
             ON CONFLICT(fingerprint) DO UPDATE SET \
                 file_path = excluded.file_path, \
                 size_bytes = excluded.size_bytes, \
                 mtime = excluded.mtime, \
                 classification = excluded.classification, \
                 created_at = excluded.created_at",
            params![fingerprint, file_path, size_bytes, mtime, json, now],
        )?;
        Ok(())
    }

    pub fn get_cache_entry(&self, fingerprint: &str) -> std::result::Result<Option<CacheEntry>, Error> {
        let row = self
            .connection()
            .query_row(
                "SELECT fingerprint, file_path, size_bytes, mtime, classification, created_at \
                 FROM file_cache WHERE fingerprint = ?1",
                params![fingerprint],
                |row| {
                    Ok((
                        row.get::<_, String>(0)?,
                        row.get::<_, String>(1)?,
                        row.get::<_, i64>(2)?,
                        row.get::<_, i64>(3)?,
                        row.get::<_, String>(4)?,
                        row.get::<_, String>(5)?,
                    ))
                },
            )
            .optional()?;

        match row {
            Some((fingerprint, file_path, size_bytes, mtime, json, created_at)) => {
                let classification = serde_json::from_str(&json)
                    .map_err(|e| Error::Cache(format!("deserialize error: {}", e)))?;
                Ok(Some(CacheEntry {
                    fingerprint,
                    file_path,
                    size_bytes,
                    mtime,
                    classification,
                    created_at,
                }))
            }
            None => Ok(None),
        }
    }

    pub fn count_cache_entries(&self) -> Result<i64> {
        self.connection()
            .query_row("SELECT COUNT(*) FROM file_cache", [], |row| row.get(0))
    }

    /// Administrative wipe. Nothing calls this implicitly.
    pub fn clear_cache(&self) -> Result<usize> {
        let removed = self.connection().execute("DELETE FROM file_cache", [])?;
        debug!("Cleared {} cache entries", removed);
        Ok(removed)
    }

    // ── Plans ────────────────────────────────────────────────────

    /// Persist a plan and all of its items atomically.
    pub fn insert_plan(&self, plan: &Plan) -> Result<()> {
        let tx = self.immediate_transaction()?;
        tx.execute(
            "INSERT INTO plans (id, root_dir, status, created_at, executed_at) \
             VALUES (?1, ?2, ?3, ?4, ?5)",
            params![
                plan.id,
                plan.root_dir,
                plan.status,
                plan.created_at,
                plan.executed_at
            ],
        )?;
        {
            let mut stmt = tx.prepare_cached(
                "INSERT INTO plan_items \
                 (id, plan_id, src_path, dest_path, reasoning, status, error_msg) \
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
            )?;
            for item in &plan.items {
                stmt.execute(params![
                    item.id,
                    item.plan_id,
                    item.src_path,
                    item.dest_path,
                    item.reasoning,
                    item.status,
                    item.error_msg,
                ])?;
            }
        }
        tx.commit()?;
        debug!("Inserted plan {} with {} items", plan.id, plan.items.len());
        Ok(())
    }

    /// Load a plan with its items in the order they were persisted.
    pub fn get_plan(&self, plan_id: &str) -> Result<Option<Plan>> {
        let tx = self.connection().unchecked_transaction()?;
        let header = tx
            .query_row(
                "SELECT id, root_dir, status, created_at, executed_at FROM plans WHERE id = ?1",
                params![plan_id],
                |row| {
                    Ok(Plan {
                        id: row.get(0)?,
                        root_dir: row.get(1)?,
                        status: row.get(2)?,
                        created_at: row.get(3)?,
                        executed_at: row.get(4)?,
                        items: Vec::new(),
                    })
                },
            )
            .optional()?;

        let mut plan = match header {
            Some(plan) => plan,
            None => return Ok(None),
        };

        {
            let mut stmt = tx.prepare(&format!(
                "SELECT {} FROM plan_items WHERE plan_id = ?1 ORDER BY rowid",
                PLAN_ITEM_COLUMNS
            ))?;
            plan.items = stmt
                .query_map(params![plan_id], plan_item_from_row)?
                .collect::<Result<Vec<_>>>()?;
        }
        tx.commit()?;
        Ok(Some(plan))
    }

    /// List plans newest-first with their item counts.
    pub fn list_plans(&self, offset: i64, limit: i64) -> Result<Vec<PlanSummary>> {
        let mut stmt = self.connection().prepare(
            "SELECT p.id, p.root_dir, p.status, p.created_at, p.executed_at, COUNT(pi.id) \
             FROM plans p \
             LEFT JOIN plan_items pi ON pi.plan_id = p.id \
             GROUP BY p.id \
             ORDER BY p.created_at DESC, p.rowid DESC \
             LIMIT ?1 OFFSET ?2",
        )?;
        let plans = stmt
            .query_map(params![limit, offset], |row| {
                Ok(PlanSummary {
                    id: row.get(0)?,
                    root_dir: row.get(1)?,
                    status: row.get(2)?,
                    created_at: row.get(3)?,
                    executed_at: row.get(4)?,
                    item_count: row.get(5)?,
                })
            })?
            .collect::<Result<Vec<_>>>()?;
        Ok(plans)
    }

    pub fn get_plan_status(&self, plan_id: &str) -> Result<Option<PlanStatus>> {
        self.connection()
            .query_row(
                "SELECT status FROM plans WHERE id = ?1",
                params![plan_id],
                |row| row.get(0),
            )
            .optional()
    }

    /// Record the external approval signal. Only a CREATED plan can be
    /// approved; returns false when the plan was in any other state.
    pub fn approve_plan(&self, plan_id: &str) -> Result<bool> {
        let changed = self.connection().execute(
            "UPDATE plans SET status = ?1 WHERE id = ?2 AND status = ?3",
            params![PlanStatus::Approved, plan_id, PlanStatus::Created],
        )?;
        Ok(changed == 1)
    }

    /// Derive and store the plan's terminal status once every item is
    /// terminal. Returns the status the plan holds afterwards.
    pub fn finalize_plan(&self, plan_id: &str) -> Result<PlanStatus> {
        let tx = self.immediate_transaction()?;
        let current: PlanStatus = tx.query_row(
            "SELECT status FROM plans WHERE id = ?1",
            params![plan_id],
            |row| row.get(0),
        )?;
        let statuses: Vec<ItemStatus> = {
            let mut stmt = tx.prepare_cached("SELECT status FROM plan_items WHERE plan_id = ?1")?;
            let rows = stmt
                .query_map(params![plan_id], |row| row.get(0))?
                .collect::<Result<Vec<_>>>()?;
            rows
        };

        let next = match derive_plan_status(&statuses) {
            Some(terminal) => {
                let now = chrono::Utc::now().to_rfc3339();
                tx.execute(
                    "UPDATE plans SET status = ?1, executed_at = COALESCE(executed_at, ?2) \
                     WHERE id = ?3",
                    params![terminal, now, plan_id],
                )?;
                terminal
            }
            None => current,
        };
        tx.commit()?;
        Ok(next)
    }

    // ── Plan Items ───────────────────────────────────────────────

    /// Compare-and-swap an item out of PENDING. Returns true only for the
    /// caller whose update applied; a false return means another caller has
    /// already moved the item to a terminal state.
    pub fn transition_item(
        &self,
        item_id: &str,
        to: ItemStatus,
        error_msg: Option<&str>,
    ) -> Result<bool> {
        debug_assert!(to.is_terminal(), "items never transition back to PENDING");
        let changed = self.connection().execute(
            "UPDATE plan_items SET status = ?1, error_msg = ?2 \
             WHERE id = ?3 AND status = ?4",
            params![to, error_msg, item_id, ItemStatus::Pending],
        )?;
        Ok(changed == 1)
    }

    pub fn get_item(&self, item_id: &str) -> Result<Option<PlanItem>> {
        self.connection()
            .query_row(
                &format!("SELECT {} FROM plan_items WHERE id = ?1", PLAN_ITEM_COLUMNS),
                params![item_id],
                plan_item_from_row,
            )
            .optional()
    }
}
