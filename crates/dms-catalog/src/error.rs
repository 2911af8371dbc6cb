use thiserror::Error;

#[derive(Debug, Error)]
pub enum CatalogError {
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("schema version {found} is newer than this build supports ({supported})")]
    UnsupportedSchemaVersion { found: i64, supported: i64 },

    #[error("object {0} not found")]
    ObjectNotFound(String),

    #[error("object id {0} already exists")]
    DuplicateId(String),

    #[error("i/o error scanning {path}: {source}")]
    Scan {
        path: String,
        #[source]
        source: std::io::Error,
    },
}
