use chrono::NaiveDate;
use sqlx::Row;

use opsdesk_core::domain::team_member::{format_joined_on, TeamMember, JOINED_ON_FORMAT};
use opsdesk_core::domain::EmailAddress;

use super::{RepositoryError, TeamMemberRepository};
use crate::DbPool;

pub struct SqlTeamMemberRepository {
    pool: DbPool,
}

impl SqlTeamMemberRepository {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }
}

fn row_to_team_member(row: &sqlx::sqlite::SqliteRow) -> Result<TeamMember, RepositoryError> {
    let first_name: String =
        row.try_get("first_name").map_err(|e| RepositoryError::Decode(e.to_string()))?;
    let last_name: String =
        row.try_get("last_name").map_err(|e| RepositoryError::Decode(e.to_string()))?;
    let email: String = row.try_get("email").map_err(|e| RepositoryError::Decode(e.to_string()))?;
    let country: String =
        row.try_get("country").map_err(|e| RepositoryError::Decode(e.to_string()))?;
    let joined_on_str: Option<String> =
        row.try_get("joined_on").map_err(|e| RepositoryError::Decode(e.to_string()))?;

    let joined_on = joined_on_str
        .map(|raw| {
            NaiveDate::parse_from_str(&raw, JOINED_ON_FORMAT)
                .map_err(|e| RepositoryError::Decode(format!("joined_on `{raw}`: {e}")))
        })
        .transpose()?;

    Ok(TeamMember { first_name, last_name, email: EmailAddress(email), country, joined_on })
}

#[async_trait::async_trait]
impl TeamMemberRepository for SqlTeamMemberRepository {
    async fn find_by_email(
        &self,
        email: &EmailAddress,
    ) -> Result<Option<TeamMember>, RepositoryError> {
        let row = sqlx::query(
            "SELECT first_name, last_name, email, country, joined_on
             FROM team_member WHERE email = ?",
        )
        .bind(email.as_str())
        .fetch_optional(&self.pool)
        .await?;

        match row {
            Some(ref r) => Ok(Some(row_to_team_member(r)?)),
            None => Ok(None),
        }
    }

    async fn list(&self) -> Result<Vec<TeamMember>, RepositoryError> {
        let rows: Vec<sqlx::sqlite::SqliteRow> = sqlx::query(
            "SELECT first_name, last_name, email, country, joined_on
             FROM team_member ORDER BY id ASC",
        )
        .fetch_all(&self.pool)
        .await?;

        rows.iter().map(row_to_team_member).collect::<Result<Vec<_>, _>>()
    }

    async fn insert(&self, member: TeamMember) -> Result<(), RepositoryError> {
        sqlx::query(
            "INSERT INTO team_member (first_name, last_name, email, country, joined_on)
             VALUES (?, ?, ?, ?, ?)",
        )
        .bind(&member.first_name)
        .bind(&member.last_name)
        .bind(member.email.as_str())
        .bind(&member.country)
        .bind(member.joined_on.map(format_joined_on))
        .execute(&self.pool)
        .await
        .map_err(|error| RepositoryError::from_insert(error, &member.email))?;

        Ok(())
    }

    async fn update(&self, member: TeamMember) -> Result<bool, RepositoryError> {
        let result = sqlx::query(
            "UPDATE team_member
             SET first_name = ?, last_name = ?, country = ?, joined_on = ?
             WHERE email = ?",
        )
        .bind(&member.first_name)
        .bind(&member.last_name)
        .bind(&member.country)
        .bind(member.joined_on.map(format_joined_on))
        .bind(member.email.as_str())
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected() > 0)
    }

    async fn delete(&self, email: &EmailAddress) -> Result<bool, RepositoryError> {
        let result = sqlx::query("DELETE FROM team_member WHERE email = ?")
            .bind(email.as_str())
            .execute(&self.pool)
            .await?;

        Ok(result.rows_affected() > 0)
    }
}
