use thiserror::Error;

/// Errors shared across crates that operate on the domain model directly
/// (id parsing, filter/sort grammar, detail construction). Subsystem crates
/// define their own richer error enums and wrap `CoreError` where they
/// depend on this one.
#[derive(Debug, Error)]
pub enum CoreError {
    #[error("malformed object id: {0}")]
    MalformedObjectId(String),

    #[error("unknown filter token: {0}")]
    UnknownFilterToken(String),

    #[error("unknown sort criteria token: {0}")]
    UnknownSortToken(String),
}
