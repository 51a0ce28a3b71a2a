use async_trait::async_trait;
use thiserror::Error;

use opsdesk_core::domain::client::Client;
use opsdesk_core::domain::team_member::TeamMember;
use opsdesk_core::domain::EmailAddress;

pub mod client;
pub mod memory;
pub mod team_member;

pub use client::SqlClientRepository;
pub use memory::{InMemoryClientRepository, InMemoryTeamMemberRepository};
pub use team_member::SqlTeamMemberRepository;

#[derive(Debug, Error)]
pub enum RepositoryError {
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),
    #[error("decode error: {0}")]
    Decode(String),
    #[error("a record with email '{email}' already exists")]
    Duplicate { email: String },
}

impl RepositoryError {
    /// Maps unique-key violations onto [`RepositoryError::Duplicate`].
    pub(crate) fn from_insert(error: sqlx::Error, email: &EmailAddress) -> Self {
        match &error {
            sqlx::Error::Database(db_error) if db_error.is_unique_violation() => {
                Self::Duplicate { email: email.to_string() }
            }
            _ => Self::Database(error),
        }
    }
}

/// Storage for team members keyed by email. `update` and `delete` report whether a row matched.
#[async_trait]
pub trait TeamMemberRepository: Send + Sync {
    async fn find_by_email(
        &self,
        email: &EmailAddress,
    ) -> Result<Option<TeamMember>, RepositoryError>;
    async fn list(&self) -> Result<Vec<TeamMember>, RepositoryError>;
    async fn insert(&self, member: TeamMember) -> Result<(), RepositoryError>;
    async fn update(&self, member: TeamMember) -> Result<bool, RepositoryError>;
    async fn delete(&self, email: &EmailAddress) -> Result<bool, RepositoryError>;
}

#[async_trait]
pub trait ClientRepository: Send + Sync {
    async fn find_by_email(&self, email: &EmailAddress) -> Result<Option<Client>, RepositoryError>;
    async fn list(&self) -> Result<Vec<Client>, RepositoryError>;
    async fn insert(&self, client: Client) -> Result<(), RepositoryError>;
    async fn update(&self, client: Client) -> Result<bool, RepositoryError>;
    async fn delete(&self, email: &EmailAddress) -> Result<bool, RepositoryError>;
}
