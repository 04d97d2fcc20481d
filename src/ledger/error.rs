use thiserror::Error;

/// Failures reported by ledger operations.
///
/// Every rejected operation leaves persisted state unchanged.
#[derive(Debug, Error)]
pub enum LedgerError {
    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Permission denied: {0}")]
    Permission(String),

    #[error("Invalid state: {0}")]
    InvalidState(String),

    #[error("{resource} {id} not found")]
    NotFound { resource: &'static str, id: String },

    #[error("Database error: {0}")]
    Database(String),
}

impl LedgerError {
    pub fn validation(msg: impl Into<String>) -> Self {
        Self::Validation(msg.into())
    }

    pub fn permission(msg: impl Into<String>) -> Self {
        Self::Permission(msg.into())
    }

    pub fn invalid_state(msg: impl Into<String>) -> Self {
        Self::InvalidState(msg.into())
    }

    pub fn not_found(resource: &'static str, id: impl ToString) -> Self {
        Self::NotFound {
            resource,
            id: id.to_string(),
        }
    }

    /// Stable machine-readable code for the error class.
    pub fn code(&self) -> &'static str {
        match self {
            Self::Validation(_) => "VALIDATION",
            Self::Permission(_) => "PERMISSION_DENIED",
            Self::InvalidState(_) => "INVALID_STATE",
            Self::NotFound { .. } => "NOT_FOUND",
            Self::Database(_) => "DATABASE",
        }
    }
}

impl From<sqlx::Error> for LedgerError {
    fn from(err: sqlx::Error) -> Self {
        Self::Database(err.to_string())
    }
}
