/// Application-wide Result type
pub type Result<T> = std::result::Result<T, AppError>;

/// Main application error type
///
/// Variants follow the payroll error taxonomy: configuration problems are
/// fatal, consistency problems are surfaced to an operator and never
/// corrected silently, transient problems roll back and may be retried.
/// Per-employee validation warnings are not errors; they travel on the
/// entry as [`EntryWarning`](crate::modules::payroll::models::EntryWarning).
#[derive(thiserror::Error, Debug)]
pub enum AppError {
    /// Unknown tax year, missing rate table, bad environment settings
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// Validation errors for business rules
    #[error("Validation error: {0}")]
    Validation(String),

    /// Stored figures disagree with their ground truth
    #[error("Consistency error: {0}")]
    Consistency(String),

    /// Persistence failure inside a transactional boundary
    #[error("Transient error: {0}")]
    Transient(String),

    /// Operation not allowed in the current lifecycle state
    #[error("Invalid state: {0}")]
    InvalidState(String),

    /// A concurrent writer changed the row first
    #[error("Conflict: {0}")]
    Conflict(String),

    /// Resource not found
    #[error("Not found: {0}")]
    NotFound(String),

    /// Database operation errors
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    /// Migration errors
    #[error("Migration error: {0}")]
    Migration(#[from] sqlx::migrate::MigrateError),

    /// JSON serialization/deserialization errors
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Tax table parse errors
    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    /// Report export errors
    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Internal errors
    #[error("Internal error: {0}")]
    Internal(String),
}

// Helper functions for common error scenarios
impl AppError {
    pub fn configuration(msg: impl Into<String>) -> Self {
        AppError::Configuration(msg.into())
    }

    pub fn validation(msg: impl Into<String>) -> Self {
        AppError::Validation(msg.into())
    }

    pub fn consistency(msg: impl Into<String>) -> Self {
        AppError::Consistency(msg.into())
    }

    pub fn transient(msg: impl Into<String>) -> Self {
        AppError::Transient(msg.into())
    }

    pub fn invalid_state(msg: impl Into<String>) -> Self {
        AppError::InvalidState(msg.into())
    }

    pub fn conflict(msg: impl Into<String>) -> Self {
        AppError::Conflict(msg.into())
    }

    pub fn not_found(resource: impl Into<String>) -> Self {
        AppError::NotFound(resource.into())
    }

    pub fn internal(msg: impl Into<String>) -> Self {
        AppError::Internal(msg.into())
    }

    /// Whether the caller may retry the whole operation unchanged
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            AppError::Transient(_) | AppError::Database(_) | AppError::Conflict(_)
        )
    }

    /// Whether the error must stop a run before any entry is written
    pub fn is_fatal(&self) -> bool {
        matches!(self, AppError::Configuration(_))
    }
}
