use std::sync::Arc;

use async_trait::async_trait;

use opsdesk_core::domain::team_member::{
    format_joined_on, parse_joined_on, TeamMember, TeamMemberChanges,
};
use opsdesk_db::repositories::{RepositoryError, TeamMemberRepository};

use super::email_argument;
use crate::format::{Record, ResultValue};
use crate::tools::{InputSchema, ParamSpec, ParamType, Tool, ToolError, ValidatedArguments};

fn member_record(member: &TeamMember) -> Record {
    Record::new()
        .field("first_name", member.first_name.as_str())
        .field("last_name", member.last_name.as_str())
        .field("email", member.email.as_str())
        .field("country", member.country.as_str())
        .field("joined_on", member.joined_on.map(format_joined_on))
}

fn not_found(email: &str) -> ToolError {
    ToolError::NotFound(format!("No team member found with email '{email}'."))
}

fn joined_on_argument(
    arguments: &ValidatedArguments,
) -> Result<Option<chrono::NaiveDate>, ToolError> {
    match arguments.text("joined_on").filter(|raw| !raw.trim().is_empty()) {
        Some(raw) => Ok(Some(parse_joined_on(raw)?)),
        None => Ok(None),
    }
}

pub struct ListTeamMembers {
    repo: Arc<dyn TeamMemberRepository>,
}

impl ListTeamMembers {
    pub fn new(repo: Arc<dyn TeamMemberRepository>) -> Self {
        Self { repo }
    }
}

#[async_trait]
impl Tool for ListTeamMembers {
    fn name(&self) -> &'static str {
        "list_team_members"
    }

    fn description(&self) -> &'static str {
        "Returns a list of all team members."
    }

    fn schema(&self) -> InputSchema {
        InputSchema::empty()
    }

    async fn execute(&self, _arguments: ValidatedArguments) -> Result<ResultValue, ToolError> {
        let members = self.repo.list().await?;
        if members.is_empty() {
            return Ok(ResultValue::status("No team members registered yet."));
        }
        Ok(ResultValue::RecordList(members.iter().map(member_record).collect()))
    }
}

pub struct GetTeamMember {
    repo: Arc<dyn TeamMemberRepository>,
}

impl GetTeamMember {
    pub fn new(repo: Arc<dyn TeamMemberRepository>) -> Self {
        Self { repo }
    }
}

#[async_trait]
impl Tool for GetTeamMember {
    fn name(&self) -> &'static str {
        "get_team_member"
    }

    fn description(&self) -> &'static str {
        "Get details of a team member by email."
    }

    fn schema(&self) -> InputSchema {
        InputSchema::new(vec![ParamSpec::required(
            "email",
            ParamType::String,
            "Email address of the team member.",
        )])
    }

    async fn execute(&self, arguments: ValidatedArguments) -> Result<ResultValue, ToolError> {
        let email = email_argument(&arguments, "email")?;
        match self.repo.find_by_email(&email).await? {
            Some(member) => Ok(ResultValue::Record(member_record(&member))),
            None => Err(not_found(email.as_str())),
        }
    }
}

pub struct AddTeamMember {
    repo: Arc<dyn TeamMemberRepository>,
}

impl AddTeamMember {
    pub fn new(repo: Arc<dyn TeamMemberRepository>) -> Self {
        Self { repo }
    }
}

#[async_trait]
impl Tool for AddTeamMember {
    fn name(&self) -> &'static str {
        "add_team_member"
    }

    fn description(&self) -> &'static str {
        "Add a new team member."
    }

    fn schema(&self) -> InputSchema {
        InputSchema::new(vec![
            ParamSpec::required("first_name", ParamType::String, "First name."),
            ParamSpec::required("last_name", ParamType::String, "Last name."),
            ParamSpec::required("email", ParamType::String, "Unique email address."),
            ParamSpec::required("country", ParamType::String, "Country of residence."),
            ParamSpec::optional("joined_on", ParamType::String, "Join date as YYYY-MM-DD."),
        ])
    }

    async fn execute(&self, arguments: ValidatedArguments) -> Result<ResultValue, ToolError> {
        let email = email_argument(&arguments, "email")?;
        let duplicate = || {
            ToolError::Conflict(format!("Team member with email '{email}' already exists."))
        };
        if self.repo.find_by_email(&email).await?.is_some() {
            return Err(duplicate());
        }

        let member = TeamMember {
            first_name: arguments.require_text("first_name")?.trim().to_string(),
            last_name: arguments.require_text("last_name")?.trim().to_string(),
            email: email.clone(),
            country: arguments.require_text("country")?.trim().to_string(),
            joined_on: joined_on_argument(&arguments)?,
        };
        member.validate()?;

        match self.repo.insert(member.clone()).await {
            Ok(()) => Ok(ResultValue::status(format!(
                "Team member '{}' added successfully.",
                member.full_name()
            ))),
            Err(RepositoryError::Duplicate { .. }) => Err(duplicate()),
            Err(error) => Err(error.into()),
        }
    }
}

pub struct UpdateTeamMember {
    repo: Arc<dyn TeamMemberRepository>,
}

impl UpdateTeamMember {
    pub fn new(repo: Arc<dyn TeamMemberRepository>) -> Self {
        Self { repo }
    }
}

#[async_trait]
impl Tool for UpdateTeamMember {
    fn name(&self) -> &'static str {
        "update_team_member"
    }

    fn description(&self) -> &'static str {
        "Update an existing team member."
    }

    fn schema(&self) -> InputSchema {
        InputSchema::new(vec![
            ParamSpec::required("email", ParamType::String, "Email of the member to update."),
            ParamSpec::optional("first_name", ParamType::String, "New first name."),
            ParamSpec::optional("last_name", ParamType::String, "New last name."),
            ParamSpec::optional("country", ParamType::String, "New country."),
            ParamSpec::optional("joined_on", ParamType::String, "New join date as YYYY-MM-DD."),
        ])
    }

    async fn execute(&self, arguments: ValidatedArguments) -> Result<ResultValue, ToolError> {
        let email = email_argument(&arguments, "email")?;
        let Some(mut member) = self.repo.find_by_email(&email).await? else {
            return Err(not_found(email.as_str()));
        };

        member.apply(TeamMemberChanges {
            first_name: arguments.text("first_name").map(|value| value.trim().to_string()),
            last_name: arguments.text("last_name").map(|value| value.trim().to_string()),
            country: arguments.text("country").map(|value| value.trim().to_string()),
            joined_on: joined_on_argument(&arguments)?,
        })?;

        if !self.repo.update(member).await? {
            return Err(not_found(email.as_str()));
        }
        Ok(ResultValue::status(format!("Team member with email '{email}' updated successfully.")))
    }
}

pub struct DeleteTeamMember {
    repo: Arc<dyn TeamMemberRepository>,
}

impl DeleteTeamMember {
    pub fn new(repo: Arc<dyn TeamMemberRepository>) -> Self {
        Self { repo }
    }
}

#[async_trait]
impl Tool for DeleteTeamMember {
    fn name(&self) -> &'static str {
        "delete_team_member"
    }

    fn description(&self) -> &'static str {
        "Delete a team member by email."
    }

    fn schema(&self) -> InputSchema {
        InputSchema::new(vec![ParamSpec::required(
            "email",
            ParamType::String,
            "Email of the member to delete.",
        )])
    }

    async fn execute(&self, arguments: ValidatedArguments) -> Result<ResultValue, ToolError> {
        let email = email_argument(&arguments, "email")?;
        if !self.repo.delete(&email).await? {
            return Err(not_found(email.as_str()));
        }
        Ok(ResultValue::status(format!("Team member with email '{email}' deleted successfully.")))
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use serde_json::{json, Value};

    use opsdesk_db::repositories::{InMemoryTeamMemberRepository, TeamMemberRepository};

    use super::{
        AddTeamMember, DeleteTeamMember, GetTeamMember, ListTeamMembers, UpdateTeamMember,
    };
    use crate::format::{format_result, ResultValue, Scalar};
    use crate::tools::{Tool, ToolError};

    async fn run(tool: &dyn Tool, arguments: Value) -> Result<ResultValue, ToolError> {
        let object = arguments.as_object().cloned().unwrap_or_default();
        let validated = tool.schema().validate(&object).expect("arguments match schema");
        tool.execute(validated).await
    }

    fn repo() -> Arc<dyn TeamMemberRepository> {
        Arc::new(InMemoryTeamMemberRepository::default())
    }

    fn ada() -> Value {
        json!({
            "first_name": "Ada",
            "last_name": "Lovelace",
            "email": "ada@opsdesk.test",
            "country": "UK",
            "joined_on": "2024-01-15"
        })
    }

    #[tokio::test]
    async fn list_on_empty_store_returns_status() {
        let result = run(&ListTeamMembers::new(repo()), json!({})).await;
        assert_eq!(result, Ok(ResultValue::status("No team members registered yet.")));
    }

    #[tokio::test]
    async fn add_then_get_round_trips_through_the_store() {
        let store = repo();

        let added = run(&AddTeamMember::new(store.clone()), ada()).await;
        assert_eq!(
            added,
            Ok(ResultValue::status("Team member 'Ada Lovelace' added successfully."))
        );

        let fetched = run(&GetTeamMember::new(store), json!({"email": "ada@opsdesk.test"}))
            .await
            .expect("member exists");
        let ResultValue::Record(record) = &fetched else {
            panic!("expected a record, got {fetched:?}");
        };
        assert_eq!(record.get("joined_on"), Some(&Scalar::Text("2024-01-15".to_string())));
        assert!(format_result(&fetched).starts_with("first_name: Ada\nlast_name: Lovelace"));
    }

    #[tokio::test]
    async fn add_rejects_duplicates_and_bad_dates() {
        let store = repo();
        let add = AddTeamMember::new(store.clone());
        run(&add, ada()).await.expect("first add");

        assert_eq!(
            run(&add, ada()).await,
            Err(ToolError::Conflict(
                "Team member with email 'ada@opsdesk.test' already exists.".to_string()
            ))
        );

        let mut bad_date = ada();
        bad_date["email"] = json!("grace@opsdesk.test");
        bad_date["joined_on"] = json!("15/01/2024");
        assert_eq!(
            run(&add, bad_date).await,
            Err(ToolError::InvalidInput(
                "Invalid date format for joined_on. Use YYYY-MM-DD.".to_string()
            ))
        );
    }

    #[tokio::test]
    async fn update_changes_only_supplied_fields() {
        let store = repo();
        run(&AddTeamMember::new(store.clone()), ada()).await.expect("add");

        let updated = run(
            &UpdateTeamMember::new(store.clone()),
            json!({"email": "ada@opsdesk.test", "country": "France", "first_name": null}),
        )
        .await;
        assert_eq!(
            updated,
            Ok(ResultValue::status(
                "Team member with email 'ada@opsdesk.test' updated successfully."
            ))
        );

        let listed = run(&ListTeamMembers::new(store), json!({})).await.expect("list");
        let text = format_result(&listed);
        assert!(text.contains("first_name: Ada"));
        assert!(text.contains("country: France"));
    }

    #[tokio::test]
    async fn missing_members_are_reported_as_not_found() {
        let store = repo();
        let expected =
            Err(ToolError::NotFound("No team member found with email 'x@y.test'.".to_string()));

        let missing = json!({"email": "x@y.test"});

        assert_eq!(run(&GetTeamMember::new(store.clone()), missing.clone()).await, expected);
        assert_eq!(run(&UpdateTeamMember::new(store.clone()), missing.clone()).await, expected);
        assert_eq!(run(&DeleteTeamMember::new(store), missing).await, expected);
    }

    #[tokio::test]
    async fn delete_removes_the_member() {
        let store = repo();
        run(&AddTeamMember::new(store.clone()), ada()).await.expect("add");

        let deleted =
            run(&DeleteTeamMember::new(store.clone()), json!({"email": "ada@opsdesk.test"})).await;
        assert_eq!(
            deleted,
            Ok(ResultValue::status(
                "Team member with email 'ada@opsdesk.test' deleted successfully."
            ))
        );
        assert!(store.list().await.expect("list").is_empty());
    }
}
