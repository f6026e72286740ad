pub mod database;
pub mod error;
pub mod in_memory;
pub mod records;
pub mod registry_store;
pub mod row_helpers;
pub mod schema;

pub use database::Database;
pub use error::StoreError;
pub use in_memory::InMemoryRegistryStore;
pub use records::{RecordFilter, RecordPatch, SessionRecord};
pub use registry_store::{RegistryStore, SqliteRegistryStore};
