use rusqlite::types::Value;
use tracing::instrument;

use labswitch_core::ids::RecordId;

use crate::database::Database;
use crate::error::StoreError;
use crate::records::{RecordFilter, RecordPatch, SessionRecord};
use crate::row_helpers;

/// Physical storage of session records. No business rules live here beyond
/// what the backing store enforces itself (the one-active-per-user index).
pub trait RegistryStore: Send + Sync {
    /// Insert a record. Fails with `Conflict` if it would create a second
    /// active record for the same username.
    fn insert(&self, record: &SessionRecord) -> Result<(), StoreError>;

    /// All matching records in insertion order.
    fn find_all(&self, filter: &RecordFilter) -> Result<Vec<SessionRecord>, StoreError>;

    /// The first matching record in insertion order.
    fn find_one(&self, filter: &RecordFilter) -> Result<Option<SessionRecord>, StoreError>;

    fn count(&self, filter: &RecordFilter) -> Result<u64, StoreError>;

    /// Apply `patch` to every matching record as one statement. Returns the
    /// number of records changed.
    fn update_matching(
        &self,
        filter: &RecordFilter,
        patch: &RecordPatch,
    ) -> Result<usize, StoreError>;
}

pub struct SqliteRegistryStore {
    db: Database,
}

impl SqliteRegistryStore {
    pub fn new(db: Database) -> Self {
        Self { db }
    }

    fn select_sql(&self, filter: &RecordFilter, limit: Option<u32>) -> (String, Vec<String>) {
        let (clause, params) = filter.where_clause();
        let mut sql = format!(
            "SELECT id, username, active, check_in, check_out FROM {} {} ORDER BY rowid",
            self.db.collection(),
            clause
        );
        if let Some(limit) = limit {
            sql.push_str(&format!(" LIMIT {limit}"));
        }
        (sql, params)
    }

    fn query(
        &self,
        filter: &RecordFilter,
        limit: Option<u32>,
    ) -> Result<Vec<SessionRecord>, StoreError> {
        let (sql, params) = self.select_sql(filter, limit);
        let table = self.db.collection();
        self.db.with_conn(|conn| {
            let mut stmt = conn.prepare(&sql)?;
            let mut rows = stmt.query(rusqlite::params_from_iter(params.iter()))?;
            let mut results = Vec::new();
            while let Some(row) = rows.next()? {
                results.push(row_to_record(row, table)?);
            }
            Ok(results)
        })
    }
}

impl RegistryStore for SqliteRegistryStore {
    #[instrument(skip(self, record), fields(username = %record.username))]
    fn insert(&self, record: &SessionRecord) -> Result<(), StoreError> {
        let sql = format!(
            "INSERT INTO {} (id, username, active, check_in, check_out) VALUES (?1, ?2, ?3, ?4, ?5)",
            self.db.collection()
        );
        self.db.with_conn(|conn| {
            conn.execute(
                &sql,
                rusqlite::params![
                    record.id.as_str(),
                    record.username,
                    record.active,
                    row_helpers::format_timestamp(&record.check_in),
                    record.check_out.as_ref().map(row_helpers::format_timestamp),
                ],
            )
            .map_err(|e| constraint_to_conflict(e, &record.username))?;
            Ok(())
        })
    }

    #[instrument(skip(self), fields(filter = %filter))]
    fn find_all(&self, filter: &RecordFilter) -> Result<Vec<SessionRecord>, StoreError> {
        self.query(filter, None)
    }

    #[instrument(skip(self), fields(filter = %filter))]
    fn find_one(&self, filter: &RecordFilter) -> Result<Option<SessionRecord>, StoreError> {
        Ok(self.query(filter, Some(1))?.into_iter().next())
    }

    #[instrument(skip(self), fields(filter = %filter))]
    fn count(&self, filter: &RecordFilter) -> Result<u64, StoreError> {
        let (clause, params) = filter.where_clause();
        let sql = format!("SELECT COUNT(*) FROM {} {}", self.db.collection(), clause);
        self.db.with_conn(|conn| {
            let count: i64 =
                conn.query_row(&sql, rusqlite::params_from_iter(params.iter()), |row| row.get(0))?;
            Ok(count as u64)
        })
    }

    #[instrument(skip(self, patch), fields(filter = %filter))]
    fn update_matching(
        &self,
        filter: &RecordFilter,
        patch: &RecordPatch,
    ) -> Result<usize, StoreError> {
        if patch.is_empty() {
            return Ok(0);
        }

        let mut sets = Vec::new();
        let mut values: Vec<Value> = Vec::new();
        if let Some(active) = patch.active {
            sets.push("active = ?");
            values.push(Value::Integer(i64::from(active)));
        }
        if let Some(at) = &patch.check_out {
            sets.push("check_out = MAX(check_in, ?)");
            values.push(Value::Text(row_helpers::format_timestamp(at)));
        }

        let (clause, params) = filter.where_clause();
        values.extend(params.into_iter().map(Value::Text));

        let sql = format!(
            "UPDATE {} SET {} {}",
            self.db.collection(),
            sets.join(", "),
            clause
        );
        let label = filter.to_string();
        self.db.with_conn(|conn| {
            conn.execute(&sql, rusqlite::params_from_iter(values.iter()))
                .map_err(|e| constraint_to_conflict(e, &label))
        })
    }
}

fn constraint_to_conflict(e: rusqlite::Error, subject: &str) -> StoreError {
    match &e {
        rusqlite::Error::SqliteFailure(err, _)
            if err.code == rusqlite::ErrorCode::ConstraintViolation =>
        {
            StoreError::Conflict(format!("active record already exists for {subject}"))
        }
        _ => StoreError::from(e),
    }
}

fn row_to_record(row: &rusqlite::Row<'_>, table: &str) -> Result<SessionRecord, StoreError> {
    let check_in: String = row_helpers::get(row, 3, table, "check_in")?;
    let check_out: Option<String> = row_helpers::get_opt(row, 4, table, "check_out")?;

    Ok(SessionRecord {
        id: RecordId::from_raw(row_helpers::get::<String>(row, 0, table, "id")?),
        username: row_helpers::get(row, 1, table, "username")?,
        active: row_helpers::get(row, 2, table, "active")?,
        check_in: row_helpers::parse_timestamp(&check_in, table, "check_in")?,
        check_out: check_out
            .map(|raw| row_helpers::parse_timestamp(&raw, table, "check_out"))
            .transpose()?,
    })
}
