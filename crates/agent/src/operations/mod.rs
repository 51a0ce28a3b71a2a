//! Record operations exposed to the model.

use std::sync::Arc;

use opsdesk_core::domain::EmailAddress;
use opsdesk_db::repositories::{
    ClientRepository, SqlClientRepository, SqlTeamMemberRepository, TeamMemberRepository,
};
use opsdesk_db::DbPool;

use crate::tools::{RegistryError, ToolError, ToolRegistry, ValidatedArguments};

pub mod client;
pub mod communication;
pub mod team_member;

pub use client::{AddClient, DeleteClient, GetClient, ListClients, UpdateClient};
pub use communication::SendEmail;
pub use team_member::{
    AddTeamMember, DeleteTeamMember, GetTeamMember, ListTeamMembers, UpdateTeamMember,
};

#[derive(Clone)]
pub struct RecordStores {
    pub team_members: Arc<dyn TeamMemberRepository>,
    pub clients: Arc<dyn ClientRepository>,
}

impl RecordStores {
    /// Stores backed by the application database.
    pub fn sql(pool: DbPool) -> Self {
        Self {
            team_members: Arc::new(SqlTeamMemberRepository::new(pool.clone())),
            clients: Arc::new(SqlClientRepository::new(pool)),
        }
    }
}

/// Registers every operation in catalog order.
pub fn register_all(
    registry: &mut ToolRegistry,
    stores: &RecordStores,
) -> Result<(), RegistryError> {
    registry.register(ListClients::new(stores.clients.clone()))?;
    registry.register(ListTeamMembers::new(stores.team_members.clone()))?;
    registry.register(GetTeamMember::new(stores.team_members.clone()))?;
    registry.register(AddTeamMember::new(stores.team_members.clone()))?;
    registry.register(UpdateTeamMember::new(stores.team_members.clone()))?;
    registry.register(DeleteTeamMember::new(stores.team_members.clone()))?;
    registry.register(GetClient::new(stores.clients.clone()))?;
    registry.register(AddClient::new(stores.clients.clone()))?;
    registry.register(UpdateClient::new(stores.clients.clone()))?;
    registry.register(DeleteClient::new(stores.clients.clone()))?;
    registry.register(SendEmail)?;
    Ok(())
}

pub fn default_registry(stores: &RecordStores) -> Result<ToolRegistry, RegistryError> {
    let mut registry = ToolRegistry::default();
    register_all(&mut registry, stores)?;
    Ok(registry)
}

fn email_argument(arguments: &ValidatedArguments, name: &str) -> Result<EmailAddress, ToolError> {
    Ok(EmailAddress::parse(arguments.require_text(name)?)?)
}
