use thiserror::Error;

pub type Result<T> = std::result::Result<T, AppError>;

#[derive(Error, Debug)]
pub enum AppError {
    #[error("database error: {0}")]
    Database(#[from] rusqlite::Error),

    #[error("connection error: {0}")]
    Connection(#[from] tokio_rusqlite::Error),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("config parse error: {0}")]
    ConfigParse(#[from] toml::de::Error),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("configuration error: {0}")]
    Config(String),

    #[error("table `{0}` already exists")]
    TableExists(String),

    #[error("migration {migration} references `{target}`, which does not exist")]
    MissingReference { migration: String, target: String },

    #[error("migration {pending} is older than the last applied migration {applied}")]
    OutOfOrder { pending: String, applied: String },

    #[error("invalid migration id `{0}`, expected <YYYYMMDDHHMMSS>_<name>")]
    InvalidVersion(String),

    #[error("duplicate migration version {0}")]
    DuplicateVersion(String),

    #[error("no migration registered for applied version {0}")]
    UnknownMigration(String),

    #[error("{0}")]
    Other(#[from] anyhow::Error),
}

impl AppError {
    /// True when SQLite rejected a write because of a NOT NULL, FOREIGN KEY,
    /// UNIQUE or trigger-raised constraint.
    pub fn is_constraint_violation(&self) -> bool {
        match self {
            AppError::Database(rusqlite::Error::SqliteFailure(e, _)) => {
                e.code == rusqlite::ErrorCode::ConstraintViolation
            }
            AppError::Connection(tokio_rusqlite::Error::Rusqlite(
                rusqlite::Error::SqliteFailure(e, _),
            )) => e.code == rusqlite::ErrorCode::ConstraintViolation,
            _ => false,
        }
    }
}
