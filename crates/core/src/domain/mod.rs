pub mod client;
pub mod team_member;

use serde::{Deserialize, Serialize};

use crate::errors::DomainError;

pub const MAX_TEXT_LEN: usize = 50;
pub const MAX_EMAIL_LEN: usize = 254;

/// Unique key shared by both record kinds.
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct EmailAddress(pub String);

impl EmailAddress {
    pub fn parse(raw: &str) -> Result<Self, DomainError> {
        let value = raw.trim();
        if value.is_empty() {
            return Err(DomainError::MissingField { field: "email" });
        }
        if value.chars().count() > MAX_EMAIL_LEN {
            return Err(DomainError::FieldTooLong { field: "email", max: MAX_EMAIL_LEN });
        }

        let valid = match value.split_once('@') {
            Some((local, domain)) => {
                !local.is_empty()
                    && !domain.is_empty()
                    && !domain.contains('@')
                    && !value.chars().any(char::is_whitespace)
            }
            None => false,
        };
        if !valid {
            return Err(DomainError::InvalidEmail { value: value.to_string() });
        }

        Ok(Self(value.to_string()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for EmailAddress {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

pub(crate) fn require_text(field: &'static str, value: &str) -> Result<(), DomainError> {
    if value.trim().is_empty() {
        return Err(DomainError::MissingField { field });
    }
    if value.chars().count() > MAX_TEXT_LEN {
        return Err(DomainError::FieldTooLong { field, max: MAX_TEXT_LEN });
    }
    Ok(())
}
