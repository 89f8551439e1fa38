use thiserror::Error;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Error, Debug)]
pub enum Error {
    #[error("configuration error: {0}")]
    Config(String),

    #[error("database error: {0}")]
    Database(String),

    /// The applied-migration ledger could not be created or read.
    #[error("migration ledger error: {0}")]
    Ledger(String),

    /// A migration body failed; its transaction was rolled back.
    #[error("migration {name} failed: {message}")]
    Migration { name: String, message: String },

    #[error("duplicate migration name: {0}")]
    DuplicateMigration(String),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("not found: {0}")]
    NotFound(String),

    #[error("{0}")]
    Other(String),
}

impl Error {
    /// Whether this error came out of the migration pass itself rather than
    /// from opening the database or reading configuration.
    pub fn is_migration_failure(&self) -> bool {
        matches!(
            self,
            Error::Ledger(_) | Error::Migration { .. } | Error::DuplicateMigration(_)
        )
    }
}

#[cfg(test)]
mod tests {
    use super::Error;

    #[test]
    fn error_display_includes_context() {
        let e = Error::Config("bad yaml".into());
        assert_eq!(e.to_string(), "configuration error: bad yaml");

        let e = Error::Ledger("no such table".into());
        assert_eq!(e.to_string(), "migration ledger error: no such table");

        let e = Error::Migration {
            name: "001_add_accounts_balance".into(),
            message: "disk full".into(),
        };
        assert_eq!(
            e.to_string(),
            "migration 001_add_accounts_balance failed: disk full"
        );

        let e = Error::Other("misc".into());
        assert_eq!(e.to_string(), "misc");
    }

    #[test]
    fn migration_failures_are_classified() {
        assert!(Error::Ledger("x".into()).is_migration_failure());
        assert!(Error::DuplicateMigration("x".into()).is_migration_failure());
        assert!(!Error::Database("x".into()).is_migration_failure());
        assert!(!Error::Config("x".into()).is_migration_failure());
    }
}
