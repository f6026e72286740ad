use chrono::{DateTime, SubsecRound, Utc};
use serde::{Deserialize, Serialize};

use labswitch_core::ids::RecordId;

/// One check-in/check-out span for a user. Records are never deleted; the
/// collection doubles as an audit log.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionRecord {
    pub id: RecordId,
    pub username: String,
    pub active: bool,
    pub check_in: DateTime<Utc>,
    pub check_out: Option<DateTime<Utc>>,
}

impl SessionRecord {
    /// A fresh active record stamped with the current time.
    pub fn check_in(username: impl Into<String>) -> Self {
        Self::check_in_at(username, now())
    }

    pub fn check_in_at(username: impl Into<String>, at: DateTime<Utc>) -> Self {
        Self {
            id: RecordId::new(),
            username: username.into(),
            active: true,
            check_in: at.trunc_subsecs(6),
            check_out: None,
        }
    }
}

/// Current time at the precision the store persists (microseconds).
pub fn now() -> DateTime<Utc> {
    Utc::now().trunc_subsecs(6)
}

/// Record selection used by reads and updates.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum RecordFilter {
    All,
    Active,
    ActiveForUser(String),
}

impl RecordFilter {
    pub fn matches(&self, record: &SessionRecord) -> bool {
        match self {
            Self::All => true,
            Self::Active => record.active,
            Self::ActiveForUser(username) => record.active && record.username == *username,
        }
    }

    /// WHERE clause with anonymous `?` placeholders, and the values bound to them.
    pub fn where_clause(&self) -> (&'static str, Vec<String>) {
        match self {
            Self::All => ("", Vec::new()),
            Self::Active => ("WHERE active = 1", Vec::new()),
            Self::ActiveForUser(username) => {
                ("WHERE active = 1 AND username = ?", vec![username.clone()])
            }
        }
    }
}

impl std::fmt::Display for RecordFilter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::All => f.write_str("all"),
            Self::Active => f.write_str("active"),
            Self::ActiveForUser(username) => write!(f, "active,username={username}"),
        }
    }
}

/// Partial update applied to every record matching a filter.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct RecordPatch {
    pub active: Option<bool>,
    /// Clamped so it never precedes the record's check-in.
    pub check_out: Option<DateTime<Utc>>,
}

impl RecordPatch {
    /// Flip a record inactive and stamp its check-out.
    pub fn deactivate(at: DateTime<Utc>) -> Self {
        Self {
            active: Some(false),
            check_out: Some(at.trunc_subsecs(6)),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.active.is_none() && self.check_out.is_none()
    }

    pub fn apply(&self, record: &mut SessionRecord) {
        if let Some(active) = self.active {
            record.active = active;
        }
        if let Some(at) = self.check_out {
            record.check_out = Some(at.max(record.check_in));
        }
    }
}
