use thiserror::Error;

#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum DomainError {
    #[error("{field} is required")]
    MissingField { field: &'static str },
    #[error("{field} must be at most {max} characters")]
    FieldTooLong { field: &'static str, max: usize },
    #[error("`{value}` is not a valid email address")]
    InvalidEmail { value: String },
    #[error("Invalid date format for joined_on. Use YYYY-MM-DD.")]
    InvalidDate { value: String },
}

impl DomainError {
    pub fn field(&self) -> &'static str {
        match self {
            Self::MissingField { field } | Self::FieldTooLong { field, .. } => field,
            Self::InvalidEmail { .. } => "email",
            Self::InvalidDate { .. } => "joined_on",
        }
    }
}
