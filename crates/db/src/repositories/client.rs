use sqlx::Row;

use opsdesk_core::domain::client::Client;
use opsdesk_core::domain::EmailAddress;

use super::{ClientRepository, RepositoryError};
use crate::DbPool;

pub struct SqlClientRepository {
    pool: DbPool,
}

impl SqlClientRepository {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }
}

fn row_to_client(row: &sqlx::sqlite::SqliteRow) -> Result<Client, RepositoryError> {
    let name: String = row.try_get("name").map_err(|e| RepositoryError::Decode(e.to_string()))?;
    let description: String =
        row.try_get("description").map_err(|e| RepositoryError::Decode(e.to_string()))?;
    let email: String = row.try_get("email").map_err(|e| RepositoryError::Decode(e.to_string()))?;

    Ok(Client { name, description, email: EmailAddress(email) })
}

#[async_trait::async_trait]
impl ClientRepository for SqlClientRepository {
    async fn find_by_email(&self, email: &EmailAddress) -> Result<Option<Client>, RepositoryError> {
        let row = sqlx::query("SELECT name, description, email FROM client WHERE email = ?")
            .bind(email.as_str())
            .fetch_optional(&self.pool)
            .await?;

        row.as_ref().map(row_to_client).transpose()
    }

    async fn list(&self) -> Result<Vec<Client>, RepositoryError> {
        let rows = sqlx::query("SELECT name, description, email FROM client ORDER BY id ASC")
            .fetch_all(&self.pool)
            .await?;

        rows.iter().map(row_to_client).collect()
    }

    async fn insert(&self, client: Client) -> Result<(), RepositoryError> {
        sqlx::query("INSERT INTO client (name, description, email) VALUES (?, ?, ?)")
            .bind(&client.name)
            .bind(&client.description)
            .bind(client.email.as_str())
            .execute(&self.pool)
            .await
            .map_err(|error| RepositoryError::from_insert(error, &client.email))?;

        Ok(())
    }

    async fn update(&self, client: Client) -> Result<bool, RepositoryError> {
        let result = sqlx::query("UPDATE client SET name = ?, description = ? WHERE email = ?")
            .bind(&client.name)
            .bind(&client.description)
            .bind(client.email.as_str())
            .execute(&self.pool)
            .await?;

        Ok(result.rows_affected() > 0)
    }

    async fn delete(&self, email: &EmailAddress) -> Result<bool, RepositoryError> {
        let result = sqlx::query("DELETE FROM client WHERE email = ?")
            .bind(email.as_str())
            .execute(&self.pool)
            .await?;

        Ok(result.rows_affected() > 0)
    }
}

#[cfg(test)]
mod tests {
    use opsdesk_core::domain::client::Client;
    use opsdesk_core::domain::EmailAddress;

    use super::SqlClientRepository;
    use crate::repositories::{ClientRepository, RepositoryError};
    use crate::{connect_with_settings, migrations};

    async fn setup() -> SqlClientRepository {
        let pool = connect_with_settings("sqlite::memory:", 1, 30).await.expect("connect");
        migrations::run_pending(&pool).await.expect("migrations");
        SqlClientRepository::new(pool)
    }

    fn client(name: &str, email: &str) -> Client {
        Client {
            name: name.to_string(),
            description: "Wholesale widgets".to_string(),
            email: EmailAddress(email.to_string()),
        }
    }

    #[tokio::test]
    async fn crud_round_trip() {
        let repo = setup().await;
        let mut acme = client("Acme", "ops@acme.test");

        repo.insert(acme.clone()).await.expect("insert");
        assert_eq!(repo.find_by_email(&acme.email).await.expect("find"), Some(acme.clone()));

        acme.description = "Rockets".to_string();
        assert!(repo.update(acme.clone()).await.expect("update"));
        assert_eq!(
            repo.find_by_email(&acme.email).await.expect("find").map(|c| c.description),
            Some("Rockets".to_string())
        );

        assert!(repo.delete(&acme.email).await.expect("delete"));
        assert!(repo.list().await.expect("list").is_empty());
    }

    #[tokio::test]
    async fn duplicate_email_is_reported() {
        let repo = setup().await;
        repo.insert(client("Acme", "ops@acme.test")).await.expect("insert");

        let error = repo.insert(client("Acme 2", "ops@acme.test")).await.expect_err("duplicate");
        assert!(matches!(error, RepositoryError::Duplicate { .. }));
    }

    #[tokio::test]
    async fn list_is_ordered_by_insertion() {
        let repo = setup().await;
        repo.insert(client("Umbrella", "hq@umbrella.test")).await.expect("insert");
        repo.insert(client("Acme", "ops@acme.test")).await.expect("insert");

        let names: Vec<String> =
            repo.list().await.expect("list").into_iter().map(|c| c.name).collect();
        assert_eq!(names, vec!["Umbrella".to_string(), "Acme".to_string()]);
    }
}
