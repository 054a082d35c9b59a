//! SQLite-backed progress store

use std::fs;
use std::path::{Path, PathBuf};

use chrono::NaiveDate;
use eyre::{Context, Result};
use rusqlite::types::Type;
use rusqlite::{Connection, OptionalExtension, Row, params};
use serde_json::Value;
use tracing::{debug, info};

use crate::record::{NewProgress, ProgressRecord, ProgressStatus, Reviewer};

const DB_FILE: &str = "progress.db";

const DATE_FORMAT: &str = "%Y-%m-%d";

const SCHEMA: &str = r#"
CREATE TABLE IF NOT EXISTS reviewers (
    id              INTEGER PRIMARY KEY AUTOINCREMENT,
    name            TEXT NOT NULL,
    phone           TEXT NOT NULL,
    known_contact   INTEGER NOT NULL DEFAULT 0,
    created_at      INTEGER NOT NULL,
    UNIQUE (name, phone)
);

CREATE TABLE IF NOT EXISTS progress (
    id                  INTEGER PRIMARY KEY AUTOINCREMENT,
    campaign_id         TEXT NOT NULL,
    reviewer_id         INTEGER NOT NULL REFERENCES reviewers(id),
    store_id            TEXT NOT NULL,
    status              TEXT NOT NULL,
    option_name         TEXT,
    form                TEXT NOT NULL DEFAULT 'null',
    review_deadline     TEXT,
    last_reminder_date  TEXT,
    created_at          INTEGER NOT NULL,
    updated_at          INTEGER NOT NULL
);

CREATE INDEX IF NOT EXISTS idx_progress_reviewer ON progress(reviewer_id);
CREATE INDEX IF NOT EXISTS idx_progress_campaign_store ON progress(campaign_id, store_id);
CREATE INDEX IF NOT EXISTS idx_progress_status ON progress(status);
"#;

const RECORD_COLUMNS: &str = "id, campaign_id, reviewer_id, store_id, status, option_name, form, \
                              review_deadline, last_reminder_date, created_at, updated_at";

/// SQL list of terminal statuses, for `NOT IN` guards
fn terminal_list() -> String {
    sql_list(ProgressStatus::ALL.iter().filter(|s| s.is_terminal()))
}

/// SQL list of early statuses
fn early_list() -> String {
    sql_list(ProgressStatus::ALL.iter().filter(|s| s.is_early()))
}

fn sql_list<'a>(statuses: impl Iterator<Item = &'a ProgressStatus>) -> String {
    statuses
        .map(|s| format!("'{}'", s.as_str()))
        .collect::<Vec<_>>()
        .join(", ")
}

fn conversion_error(idx: usize, err: impl Into<Box<dyn std::error::Error + Send + Sync>>) -> rusqlite::Error {
    rusqlite::Error::FromSqlConversionFailure(idx, Type::Text, err.into())
}

fn parse_date(idx: usize, raw: Option<String>) -> rusqlite::Result<Option<NaiveDate>> {
    raw.map(|s| NaiveDate::parse_from_str(&s, DATE_FORMAT).map_err(|e| conversion_error(idx, e)))
        .transpose()
}

fn row_to_record(row: &Row<'_>) -> rusqlite::Result<ProgressRecord> {
    let status: String = row.get(4)?;
    let form: String = row.get(6)?;
    Ok(ProgressRecord {
        id: row.get(0)?,
        campaign_id: row.get(1)?,
        reviewer_id: row.get(2)?,
        store_id: row.get(3)?,
        status: status.parse().map_err(|e: String| conversion_error(4, e))?,
        option: row.get(5)?,
        form: serde_json::from_str(&form).map_err(|e| conversion_error(6, e))?,
        review_deadline: parse_date(7, row.get(7)?)?,
        last_reminder_date: parse_date(8, row.get(8)?)?,
        created_at: row.get(9)?,
        updated_at: row.get(10)?,
    })
}

fn row_to_reviewer(row: &Row<'_>) -> rusqlite::Result<Reviewer> {
    Ok(Reviewer {
        id: row.get(0)?,
        name: row.get(1)?,
        phone: row.get(2)?,
        known_contact: row.get::<_, i64>(3)? != 0,
        created_at: row.get(4)?,
    })
}

/// The durable progress store
///
/// Synchronous and single-connection; callers that need concurrent access
/// wrap it in an actor that owns it.
pub struct Store {
    conn: Connection,
    path: Option<PathBuf>,
}

impl Store {
    /// Open or create a store in the given directory
    pub fn open(dir: impl AsRef<Path>) -> Result<Self> {
        let dir = dir.as_ref();
        fs::create_dir_all(dir).context("Failed to create store directory")?;
        let path = dir.join(DB_FILE);
        let conn = Connection::open(&path).context(format!("Failed to open {}", path.display()))?;
        conn.execute_batch(SCHEMA).context("Failed to initialize schema")?;
        info!(path = %path.display(), "Opened progress store");
        Ok(Self { conn, path: Some(path) })
    }

    /// Open a throwaway store that lives only as long as this value
    pub fn open_in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory().context("Failed to open in-memory store")?;
        conn.execute_batch(SCHEMA).context("Failed to initialize schema")?;
        Ok(Self { conn, path: None })
    }

    /// Database file path (None for in-memory stores)
    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    // === Reviewers ===

    /// Insert the reviewer if unknown and return its id
    pub fn upsert_reviewer(&mut self, name: &str, phone: &str, now: i64) -> Result<i64> {
        debug!(%name, "upsert_reviewer: called");
        self.conn.execute(
            "INSERT OR IGNORE INTO reviewers (name, phone, created_at) VALUES (?1, ?2, ?3)",
            params![name, phone, now],
        )?;
        let id = self.conn.query_row(
            "SELECT id FROM reviewers WHERE name = ?1 AND phone = ?2",
            params![name, phone],
            |row| row.get(0),
        )?;
        Ok(id)
    }

    /// Look up a reviewer by id
    pub fn reviewer(&self, id: i64) -> Result<Option<Reviewer>> {
        let reviewer = self
            .conn
            .query_row(
                "SELECT id, name, phone, known_contact, created_at FROM reviewers WHERE id = ?1",
                params![id],
                row_to_reviewer,
            )
            .optional()?;
        Ok(reviewer)
    }

    /// Look up a reviewer by name and phone
    pub fn find_reviewer(&self, name: &str, phone: &str) -> Result<Option<Reviewer>> {
        let reviewer = self
            .conn
            .query_row(
                "SELECT id, name, phone, known_contact, created_at FROM reviewers WHERE name = ?1 AND phone = ?2",
                params![name, phone],
                row_to_reviewer,
            )
            .optional()?;
        Ok(reviewer)
    }

    /// Flag the reviewer as a known messaging contact
    pub fn mark_known_contact(&mut self, id: i64) -> Result<()> {
        debug!(id, "mark_known_contact: called");
        self.conn
            .execute("UPDATE reviewers SET known_contact = 1 WHERE id = ?1", params![id])?;
        Ok(())
    }

    // === Progress rows ===

    /// Insert one row per identifier, all or nothing
    pub fn insert_progress(&mut self, new: &NewProgress) -> Result<Vec<i64>> {
        debug!(campaign_id = %new.campaign_id, reviewer_id = new.reviewer_id, count = new.store_ids.len(), "insert_progress: called");
        let tx = self.conn.transaction()?;
        let mut ids = Vec::with_capacity(new.store_ids.len());
        for store_id in &new.store_ids {
            tx.execute(
                "INSERT INTO progress (campaign_id, reviewer_id, store_id, status, created_at, updated_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?5)",
                params![new.campaign_id, new.reviewer_id, store_id, new.status.as_str(), new.created_at],
            )?;
            ids.push(tx.last_insert_rowid());
        }
        tx.commit()?;
        Ok(ids)
    }

    /// Fetch one row
    pub fn get(&self, id: i64) -> Result<Option<ProgressRecord>> {
        let sql = format!("SELECT {RECORD_COLUMNS} FROM progress WHERE id = ?1");
        let record = self.conn.query_row(&sql, params![id], row_to_record).optional()?;
        Ok(record)
    }

    /// All rows of one reviewer, oldest first
    pub fn list_by_reviewer(&self, reviewer_id: i64) -> Result<Vec<ProgressRecord>> {
        let sql = format!("SELECT {RECORD_COLUMNS} FROM progress WHERE reviewer_id = ?1 ORDER BY created_at, id");
        let mut stmt = self.conn.prepare(&sql)?;
        let rows = stmt
            .query_map(params![reviewer_id], row_to_record)?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(rows)
    }

    /// Early-status rows created at or before `cutoff`
    pub fn list_stale_early(&self, cutoff: i64) -> Result<Vec<ProgressRecord>> {
        let sql = format!(
            "SELECT {RECORD_COLUMNS} FROM progress WHERE status IN ({}) AND created_at <= ?1 ORDER BY reviewer_id, created_at",
            early_list()
        );
        let mut stmt = self.conn.prepare(&sql)?;
        let rows = stmt
            .query_map(params![cutoff], row_to_record)?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(rows)
    }

    /// Set the status of non-terminal rows; terminal rows are left alone.
    /// Returns the number of rows changed.
    pub fn set_status(&mut self, ids: &[i64], status: ProgressStatus, now: i64) -> Result<usize> {
        debug!(?ids, %status, "set_status: called");
        let sql = format!(
            "UPDATE progress SET status = ?1, updated_at = ?2 WHERE id = ?3 AND status NOT IN ({})",
            terminal_list()
        );
        let tx = self.conn.transaction()?;
        let mut changed = 0;
        for id in ids {
            changed += tx.execute(&sql, params![status.as_str(), now, id])?;
        }
        tx.commit()?;
        Ok(changed)
    }

    /// Move early-status rows of one reviewer/campaign to `TimedOut`
    pub fn cancel_by_timeout(&mut self, reviewer_id: i64, campaign_id: &str, store_ids: &[String], now: i64) -> Result<usize> {
        debug!(reviewer_id, %campaign_id, ?store_ids, "cancel_by_timeout: called");
        let sql = format!(
            "UPDATE progress SET status = ?1, updated_at = ?2
             WHERE reviewer_id = ?3 AND campaign_id = ?4 AND store_id = ?5 AND status IN ({})",
            early_list()
        );
        let tx = self.conn.transaction()?;
        let mut changed = 0;
        for store_id in store_ids {
            changed += tx.execute(
                &sql,
                params![ProgressStatus::TimedOut.as_str(), now, reviewer_id, campaign_id, store_id],
            )?;
        }
        tx.commit()?;
        if changed > 0 {
            info!(reviewer_id, %campaign_id, changed, "Timed out stale progress rows");
        }
        Ok(changed)
    }

    /// Identifiers from `store_ids` already registered for the campaign in a
    /// status that blocks re-registration, in input order
    pub fn find_active_duplicates(&self, campaign_id: &str, store_ids: &[String]) -> Result<Vec<String>> {
        let mut stmt = self
            .conn
            .prepare("SELECT status FROM progress WHERE campaign_id = ?1 AND store_id = ?2")?;
        let mut duplicates = Vec::new();
        for store_id in store_ids {
            let statuses = stmt
                .query_map(params![campaign_id, store_id], |row| row.get::<_, String>(0))?
                .collect::<rusqlite::Result<Vec<_>>>()?;
            let blocking = statuses
                .iter()
                .filter_map(|s| s.parse::<ProgressStatus>().ok())
                .any(|s| !s.ignorable_for_duplicates());
            if blocking {
                duplicates.push(store_id.clone());
            }
        }
        Ok(duplicates)
    }

    /// Record the chosen option on a non-terminal row
    pub fn assign_option(&mut self, id: i64, option: &str, now: i64) -> Result<bool> {
        let sql = format!(
            "UPDATE progress SET option_name = ?1, updated_at = ?2 WHERE id = ?3 AND status NOT IN ({})",
            terminal_list()
        );
        Ok(self.conn.execute(&sql, params![option, now, id])? > 0)
    }

    /// Store the submitted form. Early rows advance to `AwaitingPurchaseProof`;
    /// later rows keep their status. Terminal rows are not touched.
    pub fn submit_form(&mut self, id: i64, form: &Value, now: i64) -> Result<bool> {
        debug!(id, "submit_form: called");
        let sql = format!(
            "UPDATE progress
             SET form = ?1,
                 status = CASE WHEN status IN ({early}) THEN ?2 ELSE status END,
                 updated_at = ?3
             WHERE id = ?4 AND status NOT IN ({terminal})",
            early = early_list(),
            terminal = terminal_list()
        );
        let changed = self.conn.execute(
            &sql,
            params![
                serde_json::to_string(form)?,
                ProgressStatus::AwaitingPurchaseProof.as_str(),
                now,
                id
            ],
        )?;
        Ok(changed > 0)
    }

    /// Replace one field of the submitted form on a non-terminal row
    pub fn update_form_field(&mut self, id: i64, field: &str, value: &str, now: i64) -> Result<bool> {
        debug!(id, %field, "update_form_field: called");
        let tx = self.conn.transaction()?;
        let current: Option<(String, String)> = tx
            .query_row(
                "SELECT form, status FROM progress WHERE id = ?1",
                params![id],
                |row| Ok((row.get(0)?, row.get(1)?)),
            )
            .optional()?;
        let Some((form, status)) = current else {
            return Ok(false);
        };
        if status.parse::<ProgressStatus>().map(|s| s.is_terminal()).unwrap_or(true) {
            return Ok(false);
        }
        let mut form: Value = serde_json::from_str(&form)?;
        if !form.is_object() {
            form = Value::Object(Default::default());
        }
        form[field] = Value::String(value.to_string());
        tx.execute(
            "UPDATE progress SET form = ?1, updated_at = ?2 WHERE id = ?3",
            params![serde_json::to_string(&form)?, now, id],
        )?;
        tx.commit()?;
        Ok(true)
    }

    /// Rows counting against capacity, optionally only those created since `since`
    pub fn count_reserved(&self, campaign_id: &str, since: Option<i64>) -> Result<i64> {
        let sql = "SELECT COUNT(*) FROM progress
                   WHERE campaign_id = ?1 AND status NOT IN (?2, ?3) AND created_at >= ?4";
        let count = self.conn.query_row(
            sql,
            params![
                campaign_id,
                ProgressStatus::TimedOut.as_str(),
                ProgressStatus::Cancelled.as_str(),
                since.unwrap_or(i64::MIN)
            ],
            |row| row.get(0),
        )?;
        Ok(count)
    }

    /// Set the review deadline (done by the proof-upload channel)
    pub fn set_review_deadline(&mut self, id: i64, deadline: NaiveDate, now: i64) -> Result<bool> {
        let changed = self.conn.execute(
            "UPDATE progress SET review_deadline = ?1, updated_at = ?2 WHERE id = ?3",
            params![deadline.format(DATE_FORMAT).to_string(), now, id],
        )?;
        Ok(changed > 0)
    }

    /// Rows waiting for a review whose deadline is one of `dates` and that
    /// have not been reminded on `today`
    pub fn review_deadlines_on(&self, dates: &[NaiveDate], today: NaiveDate) -> Result<Vec<ProgressRecord>> {
        let sql = format!(
            "SELECT {RECORD_COLUMNS} FROM progress
             WHERE status = ?1 AND review_deadline = ?2
               AND (last_reminder_date IS NULL OR last_reminder_date < ?3)
             ORDER BY id"
        );
        let mut stmt = self.conn.prepare(&sql)?;
        let today = today.format(DATE_FORMAT).to_string();
        let mut out = Vec::new();
        for date in dates {
            let rows = stmt
                .query_map(
                    params![
                        ProgressStatus::AwaitingReviewProof.as_str(),
                        date.format(DATE_FORMAT).to_string(),
                        today
                    ],
                    row_to_record,
                )?
                .collect::<rusqlite::Result<Vec<_>>>()?;
            out.extend(rows);
        }
        Ok(out)
    }

    /// Remember that a deadline reminder went out on `date`
    pub fn mark_reminded(&mut self, id: i64, date: NaiveDate) -> Result<()> {
        self.conn.execute(
            "UPDATE progress SET last_reminder_date = ?1 WHERE id = ?2",
            params![date.format(DATE_FORMAT).to_string(), id],
        )?;
        Ok(())
    }

    /// Delete timed-out and cancelled rows last touched before `cutoff`
    pub fn purge_terminal_before(&mut self, cutoff: i64) -> Result<usize> {
        let deleted = self.conn.execute(
            "DELETE FROM progress WHERE status IN (?1, ?2) AND updated_at < ?3",
            params![
                ProgressStatus::TimedOut.as_str(),
                ProgressStatus::Cancelled.as_str(),
                cutoff
            ],
        )?;
        if deleted > 0 {
            info!(deleted, "Purged old cancelled progress rows");
        }
        Ok(deleted)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use tempfile::tempdir;

    fn store_with_reviewer() -> (Store, i64) {
        let mut store = Store::open_in_memory().unwrap();
        let reviewer = store.upsert_reviewer("홍길동", "010-1234-5678", 1_000).unwrap();
        (store, reviewer)
    }

    #[test]
    fn test_open_creates_db_file() {
        let temp = tempdir().unwrap();
        let store = Store::open(temp.path()).unwrap();
        assert!(store.path().unwrap().exists());
    }

    #[test]
    fn test_reopen_keeps_rows() {
        let temp = tempdir().unwrap();
        let id = {
            let mut store = Store::open(temp.path()).unwrap();
            let reviewer = store.upsert_reviewer("a", "010-0000-0000", 1).unwrap();
            store
                .insert_progress(&NewProgress::batch("c1", reviewer, &["s1"], 10))
                .unwrap()[0]
        };
        let store = Store::open(temp.path()).unwrap();
        let record = store.get(id).unwrap().unwrap();
        assert_eq!(record.store_id, "s1");
        assert_eq!(record.status, ProgressStatus::Applied);
        assert_eq!(record.created_at, 10);
    }

    #[test]
    fn test_upsert_reviewer_is_stable() {
        let mut store = Store::open_in_memory().unwrap();
        let a = store.upsert_reviewer("n", "p", 1).unwrap();
        let b = store.upsert_reviewer("n", "p", 2).unwrap();
        let c = store.upsert_reviewer("n", "other", 3).unwrap();
        assert_eq!(a, b);
        assert_ne!(a, c);

        store.mark_known_contact(a).unwrap();
        assert!(store.reviewer(a).unwrap().unwrap().known_contact);
        assert!(store.find_reviewer("n", "other").unwrap().is_some());
    }

    #[test]
    fn test_set_status_skips_terminal_rows() {
        let (mut store, reviewer) = store_with_reviewer();
        let ids = store
            .insert_progress(&NewProgress::batch("c1", reviewer, &["a", "b"], 10))
            .unwrap();

        store.set_status(&ids[..1], ProgressStatus::Cancelled, 20).unwrap();
        let changed = store.set_status(&ids, ProgressStatus::GuideSent, 30).unwrap();

        assert_eq!(changed, 1);
        assert_eq!(store.get(ids[0]).unwrap().unwrap().status, ProgressStatus::Cancelled);
        assert_eq!(store.get(ids[1]).unwrap().unwrap().status, ProgressStatus::GuideSent);
    }

    #[test]
    fn test_cancel_by_timeout_only_touches_early_rows() {
        let (mut store, reviewer) = store_with_reviewer();
        let ids = store
            .insert_progress(&NewProgress::batch("c1", reviewer, &["a", "b"], 10))
            .unwrap();
        store.submit_form(ids[1], &json!({"수취인명": "홍길동"}), 15).unwrap();

        let store_ids = vec!["a".to_string(), "b".to_string()];
        assert_eq!(store.cancel_by_timeout(reviewer, "c1", &store_ids, 20).unwrap(), 1);
        assert_eq!(store.cancel_by_timeout(reviewer, "c1", &store_ids, 30).unwrap(), 0);

        assert_eq!(store.get(ids[0]).unwrap().unwrap().status, ProgressStatus::TimedOut);
        assert_eq!(
            store.get(ids[1]).unwrap().unwrap().status,
            ProgressStatus::AwaitingPurchaseProof
        );
    }

    #[test]
    fn test_find_active_duplicates_ignores_early_and_cancelled() {
        let (mut store, reviewer) = store_with_reviewer();
        let ids = store
            .insert_progress(&NewProgress::batch("c1", reviewer, &["a1", "a2", "a3"], 10))
            .unwrap();
        store.set_status(&ids[..1], ProgressStatus::AwaitingPurchaseProof, 11).unwrap();
        store.set_status(&ids[2..], ProgressStatus::Cancelled, 11).unwrap();

        let query = vec!["a1".to_string(), "a2".to_string(), "a3".to_string(), "zz".to_string()];
        assert_eq!(store.find_active_duplicates("c1", &query).unwrap(), vec!["a1"]);
        assert!(store.find_active_duplicates("other", &query).unwrap().is_empty());
    }

    #[test]
    fn test_list_stale_early_respects_cutoff_and_status() {
        let (mut store, reviewer) = store_with_reviewer();
        store
            .insert_progress(&NewProgress::batch("c1", reviewer, &["old"], 100))
            .unwrap();
        store
            .insert_progress(&NewProgress::batch("c1", reviewer, &["new"], 500))
            .unwrap();
        let done = store
            .insert_progress(&NewProgress::batch("c1", reviewer, &["done"], 100))
            .unwrap();
        store.set_status(&done, ProgressStatus::AwaitingReviewProof, 101).unwrap();

        let stale = store.list_stale_early(200).unwrap();
        assert_eq!(stale.len(), 1);
        assert_eq!(stale[0].store_id, "old");
    }

    #[test]
    fn test_submit_form_and_update_field() {
        let (mut store, reviewer) = store_with_reviewer();
        let id = store
            .insert_progress(&NewProgress::batch("c1", reviewer, &["a"], 10).with_status(ProgressStatus::GuideSent))
            .unwrap()[0];

        assert!(store.submit_form(id, &json!({"은행": "국민"}), 20).unwrap());
        assert!(store.update_form_field(id, "은행", "신한", 30).unwrap());

        let record = store.get(id).unwrap().unwrap();
        assert_eq!(record.status, ProgressStatus::AwaitingPurchaseProof);
        assert_eq!(record.form_field("은행"), Some("신한"));

        store.set_status(&[id], ProgressStatus::Cancelled, 40).unwrap();
        assert!(!store.submit_form(id, &json!({}), 50).unwrap());
        assert!(!store.update_form_field(id, "은행", "우리", 50).unwrap());
    }

    #[test]
    fn test_count_reserved_excludes_cancelled() {
        let (mut store, reviewer) = store_with_reviewer();
        let ids = store
            .insert_progress(&NewProgress::batch("c1", reviewer, &["a", "b", "c"], 10))
            .unwrap();
        store
            .insert_progress(&NewProgress::batch("c1", reviewer, &["d"], 1_000))
            .unwrap();
        store.set_status(&ids[..1], ProgressStatus::TimedOut, 20).unwrap();

        assert_eq!(store.count_reserved("c1", None).unwrap(), 3);
        assert_eq!(store.count_reserved("c1", Some(500)).unwrap(), 1);
        assert_eq!(store.count_reserved("c2", None).unwrap(), 0);
    }

    #[test]
    fn test_review_deadline_reminders_once_per_day() {
        let (mut store, reviewer) = store_with_reviewer();
        let id = store
            .insert_progress(&NewProgress::batch("c1", reviewer, &["a"], 10))
            .unwrap()[0];
        store.set_status(&[id], ProgressStatus::AwaitingReviewProof, 11).unwrap();
        let today = NaiveDate::from_ymd_opt(2026, 3, 1).unwrap();
        let deadline = NaiveDate::from_ymd_opt(2026, 3, 4).unwrap();
        store.set_review_deadline(id, deadline, 12).unwrap();

        let due = store.review_deadlines_on(&[deadline], today).unwrap();
        assert_eq!(due.len(), 1);

        store.mark_reminded(id, today).unwrap();
        assert!(store.review_deadlines_on(&[deadline], today).unwrap().is_empty());
    }

    #[test]
    fn test_purge_terminal_before() {
        let (mut store, reviewer) = store_with_reviewer();
        let ids = store
            .insert_progress(&NewProgress::batch("c1", reviewer, &["a", "b"], 10))
            .unwrap();
        store.set_status(&ids[..1], ProgressStatus::Cancelled, 20).unwrap();

        assert_eq!(store.purge_terminal_before(15).unwrap(), 0);
        assert_eq!(store.purge_terminal_before(25).unwrap(), 1);
        assert!(store.get(ids[0]).unwrap().is_none());
        assert!(store.get(ids[1]).unwrap().is_some());
    }

    proptest::proptest! {
        #[test]
        fn count_reserved_tracks_status_changes(
            moves in proptest::collection::vec((0usize..6, 0usize..ProgressStatus::ALL.len()), 0..20)
        ) {
            let (mut store, reviewer) = store_with_reviewer();
            let ids = store
                .insert_progress(&NewProgress::batch("c1", reviewer, &["a", "b", "c", "d", "e", "f"], 10))
                .unwrap();
            for (idx, status) in moves {
                store.set_status(&[ids[idx]], ProgressStatus::ALL[status], 20).unwrap();
            }

            let expected = ids
                .iter()
                .filter(|id| store.get(**id).unwrap().unwrap().status.is_reserved())
                .count() as i64;
            proptest::prop_assert_eq!(store.count_reserved("c1", None).unwrap(), expected);
        }
    }
}
