use std::sync::Arc;

use async_trait::async_trait;

use opsdesk_core::domain::client::{Client, ClientChanges};
use opsdesk_db::repositories::{ClientRepository, RepositoryError};

use super::email_argument;
use crate::format::{Record, ResultValue};
use crate::tools::{InputSchema, ParamSpec, ParamType, Tool, ToolError, ValidatedArguments};

fn client_record(client: &Client) -> Record {
    Record::new()
        .field("name", client.name.as_str())
        .field("description", client.description.as_str())
        .field("email", client.email.as_str())
}

fn not_found(email: &str) -> ToolError {
    ToolError::NotFound(format!("No client found with email '{email}'."))
}

fn email_only(description: &'static str) -> InputSchema {
    InputSchema::new(vec![ParamSpec::required("email", ParamType::String, description)])
}

pub struct ListClients {
    repo: Arc<dyn ClientRepository>,
}

impl ListClients {
    pub fn new(repo: Arc<dyn ClientRepository>) -> Self {
        Self { repo }
    }
}

#[async_trait]
impl Tool for ListClients {
    fn name(&self) -> &'static str {
        "list_clients"
    }

    fn description(&self) -> &'static str {
        "Returns a list of all clients."
    }

    fn schema(&self) -> InputSchema {
        InputSchema::empty()
    }

    async fn execute(&self, _arguments: ValidatedArguments) -> Result<ResultValue, ToolError> {
        let clients = self.repo.list().await?;
        if clients.is_empty() {
            return Ok(ResultValue::status("There are currently no clients registered."));
        }
        Ok(ResultValue::RecordList(clients.iter().map(client_record).collect()))
    }
}

pub struct GetClient {
    repo: Arc<dyn ClientRepository>,
}

impl GetClient {
    pub fn new(repo: Arc<dyn ClientRepository>) -> Self {
        Self { repo }
    }
}

#[async_trait]
impl Tool for GetClient {
    fn name(&self) -> &'static str {
        "get_client"
    }

    fn description(&self) -> &'static str {
        "Get details of a client by email."
    }

    fn schema(&self) -> InputSchema {
        email_only("Email address of the client.")
    }

    async fn execute(&self, arguments: ValidatedArguments) -> Result<ResultValue, ToolError> {
        let email = email_argument(&arguments, "email")?;
        self.repo
            .find_by_email(&email)
            .await?
            .map(|client| ResultValue::Record(client_record(&client)))
            .ok_or_else(|| not_found(email.as_str()))
    }
}

pub struct AddClient {
    repo: Arc<dyn ClientRepository>,
}

impl AddClient {
    pub fn new(repo: Arc<dyn ClientRepository>) -> Self {
        Self { repo }
    }
}

#[async_trait]
impl Tool for AddClient {
    fn name(&self) -> &'static str {
        "add_client"
    }

    fn description(&self) -> &'static str {
        "Add a new client."
    }

    fn schema(&self) -> InputSchema {
        InputSchema::new(vec![
            ParamSpec::required("name", ParamType::String, "Client name."),
            ParamSpec::required("description", ParamType::String, "Short description."),
            ParamSpec::required("email", ParamType::String, "Unique contact email."),
        ])
    }

    async fn execute(&self, arguments: ValidatedArguments) -> Result<ResultValue, ToolError> {
        let email = email_argument(&arguments, "email")?;
        let duplicate =
            || ToolError::Conflict(format!("Client with email '{email}' already exists."));
        if self.repo.find_by_email(&email).await?.is_some() {
            return Err(duplicate());
        }

        let client = Client {
            name: arguments.require_text("name")?.trim().to_string(),
            description: arguments.require_text("description")?.trim().to_string(),
            email: email.clone(),
        };
        client.validate()?;

        let name = client.name.clone();
        match self.repo.insert(client).await {
            Ok(()) => Ok(ResultValue::status(format!("Client '{name}' added successfully."))),
            Err(RepositoryError::Duplicate { .. }) => Err(duplicate()),
            Err(error) => Err(error.into()),
        }
    }
}

pub struct UpdateClient {
    repo: Arc<dyn ClientRepository>,
}

impl UpdateClient {
    pub fn new(repo: Arc<dyn ClientRepository>) -> Self {
        Self { repo }
    }
}

#[async_trait]
impl Tool for UpdateClient {
    fn name(&self) -> &'static str {
        "update_client"
    }

    fn description(&self) -> &'static str {
        "Update an existing client."
    }

    fn schema(&self) -> InputSchema {
        InputSchema::new(vec![
            ParamSpec::required("email", ParamType::String, "Email of the client to update."),
            ParamSpec::optional("name", ParamType::String, "New client name."),
            ParamSpec::optional("description", ParamType::String, "New description."),
        ])
    }

    async fn execute(&self, arguments: ValidatedArguments) -> Result<ResultValue, ToolError> {
        let email = email_argument(&arguments, "email")?;
        let Some(mut client) = self.repo.find_by_email(&email).await? else {
            return Err(not_found(email.as_str()));
        };

        client.apply(ClientChanges {
            name: arguments.text("name").map(|value| value.trim().to_string()),
            description: arguments.text("description").map(|value| value.trim().to_string()),
        })?;

        if !self.repo.update(client).await? {
            return Err(not_found(email.as_str()));
        }
        Ok(ResultValue::status(format!("Client with email '{email}' updated successfully.")))
    }
}

pub struct DeleteClient {
    repo: Arc<dyn ClientRepository>,
}

impl DeleteClient {
    pub fn new(repo: Arc<dyn ClientRepository>) -> Self {
        Self { repo }
    }
}

#[async_trait]
impl Tool for DeleteClient {
    fn name(&self) -> &'static str {
        "delete_client"
    }

    fn description(&self) -> &'static str {
        "Delete a client by email."
    }

    fn schema(&self) -> InputSchema {
        email_only("Email of the client to delete.")
    }

    async fn execute(&self, arguments: ValidatedArguments) -> Result<ResultValue, ToolError> {
        let email = email_argument(&arguments, "email")?;
        if !self.repo.delete(&email).await? {
            return Err(not_found(email.as_str()));
        }
        Ok(ResultValue::status(format!("Client with email '{email}' deleted successfully.")))
    }
}
