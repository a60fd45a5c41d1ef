use thiserror::Error;

/// Errors for operations against calendar storage, shared by the HTTP
/// API and the assistant tools.
#[derive(Debug, Error)]
pub enum CalendarError {
    #[error("required field `{0}` is missing")]
    MissingField(String),

    #[error("invalid `{field}`: {reason}")]
    Validation { field: String, reason: String },

    #[error("item {item_id} does not exist or is not owned by the caller")]
    Unauthorized { item_id: String },

    #[error("the calendar of user {user_id} is not accessible to the caller")]
    OwnerMismatch { user_id: String },

    #[error("operation failed: {0}")]
    Backend(String),
}

impl CalendarError {
    pub fn invalid(field: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::Validation {
            field: field.into(),
            reason: reason.into(),
        }
    }

    pub fn unauthorized(item_id: impl Into<String>) -> Self {
        Self::Unauthorized {
            item_id: item_id.into(),
        }
    }
}

impl From<tokio_rusqlite::Error> for CalendarError {
    fn from(err: tokio_rusqlite::Error) -> Self {
        Self::Backend(err.to_string())
    }
}

impl From<rusqlite::Error> for CalendarError {
    fn from(err: rusqlite::Error) -> Self {
        Self::Backend(err.to_string())
    }
}
