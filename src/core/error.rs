use thiserror::Error;

/// Outcome of a failed call into the persistence collaborator.
///
/// Each variant maps to its own response status.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum StoreError {
    #[error("{table} record {id} not found")]
    NotFound { table: String, id: i64 },

    #[error("Unique constraint failed on the fields: ({})", .fields.join(", "))]
    UniqueViolation { table: String, fields: Vec<String> },

    #[error("Constraint violation: {0}")]
    ConstraintViolation(String),

    #[error("Serialization error: {0}")]
    Serialization(String),

    #[error("Transport error: {0}")]
    Transport(String),
}

pub type Result<T> = std::result::Result<T, StoreError>;

impl From<serde_json::Error> for StoreError {
    fn from(err: serde_json::Error) -> Self {
        Self::Serialization(err.to_string())
    }
}

/// Failure of the external seed pool.
#[derive(Error, Debug)]
pub enum SeedError {
    #[error("Seed pool '{0}' does not exist")]
    MissingPool(String),

    #[error("Seed pool fetch failed: {0}")]
    Fetch(String),

    #[error("Seed pool '{pool}' is malformed: {reason}")]
    Malformed { pool: String, reason: String },
}

/// Caller-supplied input a computed field cannot derive a value from.
#[derive(Error, Debug, Clone, PartialEq)]
#[error("{0}")]
pub struct InvalidInput(pub String);

impl From<reqwest::Error> for SeedError {
    fn from(err: reqwest::Error) -> Self {
        Self::Fetch(err.to_string())
    }
}
