use std::sync::Arc;

use tracing::{error, info, instrument};

use labswitch_store::records::{self, RecordFilter, RecordPatch, SessionRecord};
use labswitch_store::{RegistryStore, StoreError};

#[derive(Debug, thiserror::Error)]
pub enum RegistryError {
    #[error("user {username} already has an active check-in")]
    AlreadyActive { username: String },

    #[error("user {username} has no active check-in")]
    NoActiveSession { username: String },

    /// More than one active record for a single user. The store is supposed
    /// to make this impossible, so this is a data-integrity breach.
    #[error("registry inconsistent: {count} active records for user {username}")]
    ConsistencyViolation { username: String, count: u64 },

    #[error(transparent)]
    Store(#[from] StoreError),
}

impl RegistryError {
    /// Fatal errors must stop command processing instead of becoming a reply.
    pub fn is_fatal(&self) -> bool {
        matches!(self, Self::ConsistencyViolation { .. })
    }
}

/// Enforces the check-in/check-out rules on top of a [`RegistryStore`].
///
/// The one-active-record-per-user rule is checked here and also held by the
/// store itself (insert conflicts, filtered updates), so two concurrent
/// check-ins for the same user cannot both succeed.
pub struct SessionRegistry {
    store: Arc<dyn RegistryStore>,
}

impl SessionRegistry {
    pub fn new(store: Arc<dyn RegistryStore>) -> Self {
        Self { store }
    }

    #[instrument(skip(self))]
    pub fn check_in(&self, username: &str) -> Result<SessionRecord, RegistryError> {
        if self.user_has_active(username)? {
            return Err(RegistryError::AlreadyActive { username: username.to_string() });
        }

        let record = SessionRecord::check_in(username);
        match self.store.insert(&record) {
            Ok(()) => {
                info!(username, record_id = %record.id, "checked in");
                Ok(record)
            }
            // Another check-in for the same user landed between count and insert.
            Err(StoreError::Conflict(_)) => {
                Err(RegistryError::AlreadyActive { username: username.to_string() })
            }
            Err(e) => Err(e.into()),
        }
    }

    #[instrument(skip(self))]
    pub fn check_out(&self, username: &str) -> Result<(), RegistryError> {
        if !self.user_has_active(username)? {
            return Err(RegistryError::NoActiveSession { username: username.to_string() });
        }

        let changed = self.store.update_matching(
            &RecordFilter::ActiveForUser(username.to_string()),
            &RecordPatch::deactivate(records::now()),
        )?;
        if changed == 0 {
            return Err(RegistryError::NoActiveSession { username: username.to_string() });
        }

        info!(username, "checked out");
        Ok(())
    }

    /// Active records in insertion order.
    pub fn list_active(&self) -> Result<Vec<SessionRecord>, RegistryError> {
        Ok(self.store.find_all(&RecordFilter::Active)?)
    }

    /// Every record ever written, active or not.
    pub fn list_all(&self) -> Result<Vec<SessionRecord>, RegistryError> {
        Ok(self.store.find_all(&RecordFilter::All)?)
    }

    pub fn has_any_active(&self) -> Result<bool, RegistryError> {
        Ok(!self.list_active()?.is_empty())
    }

    /// Deactivate every active record regardless of owner. Returns how many
    /// records were closed.
    #[instrument(skip(self))]
    pub fn clear_all(&self) -> Result<usize, RegistryError> {
        let changed = self
            .store
            .update_matching(&RecordFilter::Active, &RecordPatch::deactivate(records::now()))?;
        info!(cleared = changed, "all active records cleared");
        Ok(changed)
    }

    pub fn user_has_active(&self, username: &str) -> Result<bool, RegistryError> {
        match self
            .store
            .count(&RecordFilter::ActiveForUser(username.to_string()))?
        {
            0 => Ok(false),
            1 => Ok(true),
            count => {
                error!(username, count, "multiple active records for one user");
                Err(RegistryError::ConsistencyViolation {
                    username: username.to_string(),
                    count,
                })
            }
        }
    }
}
