use serde::{Deserialize, Serialize};

use super::{require_text, EmailAddress};
use crate::errors::DomainError;

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Client {
    pub name: String,
    pub description: String,
    pub email: EmailAddress,
}

#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ClientChanges {
    pub name: Option<String>,
    pub description: Option<String>,
}

impl Client {
    pub fn validate(&self) -> Result<(), DomainError> {
        require_text("name", &self.name)?;
        require_text("description", &self.description)?;
        Ok(())
    }

    /// Applies the supplied fields and re-validates the result.
    pub fn apply(&mut self, changes: ClientChanges) -> Result<(), DomainError> {
        let mut next = self.clone();
        if let Some(name) = changes.name {
            next.name = name;
        }
        if let Some(description) = changes.description {
            next.description = description;
        }
        next.validate()?;
        *self = next;
        Ok(())
    }
}
