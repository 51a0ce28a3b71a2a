use tokio::sync::RwLock;

use opsdesk_core::domain::client::Client;
use opsdesk_core::domain::team_member::TeamMember;
use opsdesk_core::domain::EmailAddress;

use super::{ClientRepository, RepositoryError, TeamMemberRepository};

#[derive(Default)]
pub struct InMemoryTeamMemberRepository {
    members: RwLock<Vec<TeamMember>>,
}

impl InMemoryTeamMemberRepository {
    pub fn with_members(members: impl IntoIterator<Item = TeamMember>) -> Self {
        Self { members: RwLock::new(members.into_iter().collect()) }
    }
}

#[async_trait::async_trait]
impl TeamMemberRepository for InMemoryTeamMemberRepository {
    async fn find_by_email(
        &self,
        email: &EmailAddress,
    ) -> Result<Option<TeamMember>, RepositoryError> {
        let members = self.members.read().await;
        Ok(members.iter().find(|member| &member.email == email).cloned())
    }

    async fn list(&self) -> Result<Vec<TeamMember>, RepositoryError> {
        Ok(self.members.read().await.clone())
    }

    async fn insert(&self, member: TeamMember) -> Result<(), RepositoryError> {
        let mut members = self.members.write().await;
        if members.iter().any(|existing| existing.email == member.email) {
            return Err(RepositoryError::Duplicate { email: member.email.to_string() });
        }
        members.push(member);
        Ok(())
    }

    async fn update(&self, member: TeamMember) -> Result<bool, RepositoryError> {
        let mut members = self.members.write().await;
        match members.iter_mut().find(|existing| existing.email == member.email) {
            Some(slot) => {
                *slot = member;
                Ok(true)
            }
            None => Ok(false),
        }
    }

    async fn delete(&self, email: &EmailAddress) -> Result<bool, RepositoryError> {
        let mut members = self.members.write().await;
        let before = members.len();
        members.retain(|member| &member.email != email);
        Ok(members.len() != before)
    }
}

#[derive(Default)]
pub struct InMemoryClientRepository {
    clients: RwLock<Vec<Client>>,
}

impl InMemoryClientRepository {
    pub fn with_clients(clients: impl IntoIterator<Item = Client>) -> Self {
        Self { clients: RwLock::new(clients.into_iter().collect()) }
    }
}

#[async_trait::async_trait]
impl ClientRepository for InMemoryClientRepository {
    async fn find_by_email(&self, email: &EmailAddress) -> Result<Option<Client>, RepositoryError> {
        let clients = self.clients.read().await;
        Ok(clients.iter().find(|client| &client.email == email).cloned())
    }

    async fn list(&self) -> Result<Vec<Client>, RepositoryError> {
        Ok(self.clients.read().await.clone())
    }

    async fn insert(&self, client: Client) -> Result<(), RepositoryError> {
        let mut clients = self.clients.write().await;
        if clients.iter().any(|existing| existing.email == client.email) {
            return Err(RepositoryError::Duplicate { email: client.email.to_string() });
        }
        clients.push(client);
        Ok(())
    }

    async fn update(&self, client: Client) -> Result<bool, RepositoryError> {
        let mut clients = self.clients.write().await;
        match clients.iter_mut().find(|existing| existing.email == client.email) {
            Some(slot) => {
                *slot = client;
                Ok(true)
            }
            None => Ok(false),
        }
    }

    async fn delete(&self, email: &EmailAddress) -> Result<bool, RepositoryError> {
        let mut clients = self.clients.write().await;
        let before = clients.len();
        clients.retain(|client| &client.email != email);
        Ok(clients.len() != before)
    }
}
