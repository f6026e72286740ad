/// SQL DDL for the registry database.
/// One table per collection; the partial unique index allows at most one
/// active record per username.
pub const SCHEMA_VERSION: u32 = 1;

pub fn create_tables(collection: &str) -> String {
    format!(
        r#"
CREATE TABLE IF NOT EXISTS {collection} (
    id TEXT PRIMARY KEY,
    username TEXT NOT NULL,
    active INTEGER NOT NULL DEFAULT 1,
    check_in TEXT NOT NULL,
    check_out TEXT
);

CREATE UNIQUE INDEX IF NOT EXISTS idx_{collection}_one_active
    ON {collection}(username) WHERE active = 1;
CREATE INDEX IF NOT EXISTS idx_{collection}_active ON {collection}(active);

CREATE TABLE IF NOT EXISTS schema_version (
    version INTEGER NOT NULL
);
"#
    )
}

pub const PRAGMAS: &str = r#"
PRAGMA journal_mode = WAL;
PRAGMA busy_timeout = 5000;
PRAGMA synchronous = NORMAL;
"#;

/// Collection names are interpolated into DDL, so only plain identifiers pass.
pub fn is_valid_collection(name: &str) -> bool {
    let mut chars = name.chars();
    matches!(chars.next(), Some(c) if c.is_ascii_alphabetic() || c == '_')
        && chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn collection_names() {
        assert!(is_valid_collection("registries"));
        assert!(is_valid_collection("_lab_2"));
        assert!(!is_valid_collection(""));
        assert!(!is_valid_collection("2lab"));
        assert!(!is_valid_collection("lab;drop"));
        assert!(!is_valid_collection("lab registries"));
    }

    #[test]
    fn ddl_uses_collection_name() {
        let ddl = create_tables("registries");
        assert!(ddl.contains("CREATE TABLE IF NOT EXISTS registries"));
        assert!(ddl.contains("idx_registries_one_active"));
        assert!(ddl.contains("WHERE active = 1"));
    }
}
