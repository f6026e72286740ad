use parking_lot::Mutex;

use crate::error::StoreError;
use crate::records::{RecordFilter, RecordPatch, SessionRecord};
use crate::registry_store::RegistryStore;

/// Vec-backed store with the same semantics as the SQLite one.
///
/// `without_unique_active` drops the one-active-per-user constraint, which
/// lets tests reproduce the state a racing pair of check-ins would leave in a
/// store without that constraint.
pub struct InMemoryRegistryStore {
    records: Mutex<Vec<SessionRecord>>,
    unique_active: bool,
}

impl InMemoryRegistryStore {
    pub fn new() -> Self {
        Self {
            records: Mutex::new(Vec::new()),
            unique_active: true,
        }
    }

    pub fn without_unique_active() -> Self {
        Self {
            records: Mutex::new(Vec::new()),
            unique_active: false,
        }
    }

    /// Every record, in insertion order.
    pub fn snapshot(&self) -> Vec<SessionRecord> {
        self.records.lock().clone()
    }
}

impl Default for InMemoryRegistryStore {
    fn default() -> Self {
        Self::new()
    }
}

impl RegistryStore for InMemoryRegistryStore {
    fn insert(&self, record: &SessionRecord) -> Result<(), StoreError> {
        let mut records = self.records.lock();
        if records.iter().any(|r| r.id == record.id) {
            return Err(StoreError::Conflict(format!("duplicate id {}", record.id)));
        }
        if self.unique_active
            && record.active
            && records
                .iter()
                .any(|r| r.active && r.username == record.username)
        {
            return Err(StoreError::Conflict(format!(
                "active record already exists for {}",
                record.username
            )));
        }
        records.push(record.clone());
        Ok(())
    }

    fn find_all(&self, filter: &RecordFilter) -> Result<Vec<SessionRecord>, StoreError> {
        Ok(self
            .records
            .lock()
            .iter()
            .filter(|r| filter.matches(r))
            .cloned()
            .collect())
    }

    fn find_one(&self, filter: &RecordFilter) -> Result<Option<SessionRecord>, StoreError> {
        Ok(self.records.lock().iter().find(|r| filter.matches(r)).cloned())
    }

    fn count(&self, filter: &RecordFilter) -> Result<u64, StoreError> {
        Ok(self.records.lock().iter().filter(|r| filter.matches(r)).count() as u64)
    }

    fn update_matching(
        &self,
        filter: &RecordFilter,
        patch: &RecordPatch,
    ) -> Result<usize, StoreError> {
        if patch.is_empty() {
            return Ok(0);
        }
        let mut records = self.records.lock();
        let mut changed = 0;
        for record in records.iter_mut().filter(|r| filter.matches(r)) {
            patch.apply(record);
            changed += 1;
        }
        Ok(changed)
    }
}
