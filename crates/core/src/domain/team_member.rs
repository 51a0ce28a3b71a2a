use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use super::{require_text, EmailAddress};
use crate::errors::DomainError;

pub const JOINED_ON_FORMAT: &str = "%Y-%m-%d";

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct TeamMember {
    pub first_name: String,
    pub last_name: String,
    pub email: EmailAddress,
    pub country: String,
    pub joined_on: Option<NaiveDate>,
}

#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct TeamMemberChanges {
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub country: Option<String>,
    pub joined_on: Option<NaiveDate>,
}

impl TeamMember {
    pub fn full_name(&self) -> String {
        format!("{} {}", self.first_name, self.last_name)
    }

    pub fn validate(&self) -> Result<(), DomainError> {
        require_text("first_name", &self.first_name)?;
        require_text("last_name", &self.last_name)?;
        require_text("country", &self.country)?;
        Ok(())
    }

    /// Applies the supplied fields and re-validates the result.
    pub fn apply(&mut self, changes: TeamMemberChanges) -> Result<(), DomainError> {
        let mut next = self.clone();
        if let Some(first_name) = changes.first_name {
            next.first_name = first_name;
        }
        if let Some(last_name) = changes.last_name {
            next.last_name = last_name;
        }
        if let Some(country) = changes.country {
            next.country = country;
        }
        if let Some(joined_on) = changes.joined_on {
            next.joined_on = Some(joined_on);
        }
        next.validate()?;
        *self = next;
        Ok(())
    }
}

pub fn parse_joined_on(raw: &str) -> Result<NaiveDate, DomainError> {
    NaiveDate::parse_from_str(raw.trim(), JOINED_ON_FORMAT)
        .map_err(|_| DomainError::InvalidDate { value: raw.to_string() })
}

pub fn format_joined_on(date: NaiveDate) -> String {
    date.format(JOINED_ON_FORMAT).to_string()
}

#[cfg(test)]
mod tests {
    use chrono::NaiveDate;

    use super::{format_joined_on, parse_joined_on, TeamMember, TeamMemberChanges};
    use crate::domain::EmailAddress;
    use crate::errors::DomainError;

    fn ada() -> TeamMember {
        TeamMember {
            first_name: "Ada".to_string(),
            last_name: "Lovelace".to_string(),
            email: EmailAddress("ada@example.com".to_string()),
            country: "UK".to_string(),
            joined_on: None,
        }
    }

    #[test]
    fn joined_on_accepts_iso_dates_only() {
        let date = parse_joined_on("2024-03-14").expect("iso date");
        assert_eq!(date, NaiveDate::from_ymd_opt(2024, 3, 14).expect("date"));
        assert_eq!(format_joined_on(date), "2024-03-14");

        assert!(matches!(parse_joined_on("14/03/2024"), Err(DomainError::InvalidDate { .. })));
        assert!(matches!(parse_joined_on("2024-02-30"), Err(DomainError::InvalidDate { .. })));
    }

    #[test]
    fn apply_merges_partial_changes() {
        let mut member = ada();
        member
            .apply(TeamMemberChanges {
                country: Some("France".to_string()),
                joined_on: NaiveDate::from_ymd_opt(2023, 1, 2),
                ..TeamMemberChanges::default()
            })
            .expect("valid change");

        assert_eq!(member.first_name, "Ada");
        assert_eq!(member.country, "France");
        assert_eq!(member.joined_on, NaiveDate::from_ymd_opt(2023, 1, 2));
        assert_eq!(member.full_name(), "Ada Lovelace");
    }

    #[test]
    fn blank_names_are_rejected() {
        let mut member = ada();
        member.first_name = "  ".to_string();

        assert_eq!(member.validate(), Err(DomainError::MissingField { field: "first_name" }));
    }
}
