use thiserror::Error;

/// Rejected user input. Raised before anything is written, so stored data is
/// left untouched.
///
/// Travels inside `anyhow::Error`; callers tell it apart from storage failures
/// with `err.downcast_ref::<ValidationError>()`.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("{field} is required")]
    Missing { field: &'static str },
    #[error("{field} must be a number (got '{value}')")]
    NotNumeric { field: &'static str, value: String },
    #[error("{field} {reason}")]
    OutOfRange {
        field: &'static str,
        reason: &'static str,
    },
    #[error("Invalid date '{0}'. Use YYYY-MM-DD")]
    InvalidDate(String),
    #[error("Invalid intensity '{0}'. Use 0.10, 0.14, 0.20 or safe, natural, aggressive")]
    InvalidIntensity(String),
}

impl ValidationError {
    /// Name of the offending input field, when there is one.
    #[must_use]
    pub fn field(&self) -> Option<&'static str> {
        match self {
            Self::Missing { field }
            | Self::NotNumeric { field, .. }
            | Self::OutOfRange { field, .. } => Some(field),
            Self::InvalidDate(_) => Some("date"),
            Self::InvalidIntensity(_) => Some("intensity"),
        }
    }
}

/// True when `err` (or anything in its context chain) is a [`ValidationError`].
#[must_use]
pub fn is_validation(err: &anyhow::Error) -> bool {
    err.chain().any(|e| e.is::<ValidationError>())
}
