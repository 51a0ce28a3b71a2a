pub mod config;
pub mod domain;
pub mod errors;

pub use domain::client::{Client, ClientChanges};
pub use domain::team_member::{TeamMember, TeamMemberChanges};
pub use domain::EmailAddress;
pub use errors::DomainError;
