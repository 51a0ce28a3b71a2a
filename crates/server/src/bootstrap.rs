use std::sync::Arc;

use opsdesk_agent::{
    llm::{GatewayError, LlmClient},
    openai::OpenAiClient,
    operations::{default_registry, RecordStores},
    tools::RegistryError,
    AgentRuntime, RuntimeSettings,
};
use opsdesk_core::config::{AppConfig, ConfigError, LoadOptions};
use opsdesk_db::{connect_with_settings, migrations, DbPool};
use thiserror::Error;
use tokio::sync::Mutex;
use tracing::info;

/// The orchestrator shared by every request. One turn at a time.
pub type SharedRuntime = Arc<Mutex<AgentRuntime>>;

pub struct Application {
    pub config: AppConfig,
    pub db_pool: DbPool,
    pub runtime: SharedRuntime,
}

#[derive(Debug, Error)]
pub enum BootstrapError {
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error("database connection failed: {0}")]
    DatabaseConnect(#[source] sqlx::Error),
    #[error("database migration failed: {0}")]
    Migration(#[source] sqlx::migrate::MigrateError),
    #[error("operation registry is invalid: {0}")]
    Registry(#[from] RegistryError),
    #[error("model gateway could not be created: {0}")]
    Gateway(#[source] GatewayError),
}

#[cfg(test)]
pub async fn bootstrap(options: LoadOptions) -> Result<Application, BootstrapError> {
    let config = AppConfig::load(options)?;
    bootstrap_with_config(config).await
}

pub async fn bootstrap_with_config(config: AppConfig) -> Result<Application, BootstrapError> {
    info!(
        event_name = "system.bootstrap.start",
        correlation_id = "bootstrap",
        "starting application bootstrap"
    );
    let gateway = OpenAiClient::from_config(&config.llm).map_err(BootstrapError::Gateway)?;
    info!(
        event_name = "system.bootstrap.gateway_ready",
        correlation_id = "bootstrap",
        provider = config.llm.provider.as_str(),
        model = %gateway.model(),
        "model gateway configured"
    );
    bootstrap_with_gateway(config, Arc::new(gateway)).await
}

/// Assembles the application around an already-built gateway.
pub async fn bootstrap_with_gateway(
    config: AppConfig,
    gateway: Arc<dyn LlmClient>,
) -> Result<Application, BootstrapError> {
    let db_pool = connect_with_settings(
        &config.database.url,
        config.database.max_connections,
        config.database.timeout_secs,
    )
    .await
    .map_err(BootstrapError::DatabaseConnect)?;
    info!(
        event_name = "system.bootstrap.database_connected",
        correlation_id = "bootstrap",
        "database connection established"
    );

    migrations::run_pending(&db_pool).await.map_err(BootstrapError::Migration)?;
    info!(
        event_name = "system.bootstrap.migrations_applied",
        correlation_id = "bootstrap",
        "database migrations applied"
    );

    let registry = default_registry(&RecordStores::sql(db_pool.clone()))?;
    info!(
        event_name = "system.bootstrap.registry_built",
        correlation_id = "bootstrap",
        operations = registry.len(),
        "operation registry built"
    );

    let runtime = AgentRuntime::new(
        gateway,
        Arc::new(registry),
        RuntimeSettings::from_config(&config.agent),
    );

    Ok(Application { config, db_pool, runtime: Arc::new(Mutex::new(runtime)) })
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use async_trait::async_trait;
    use opsdesk_agent::llm::{ChatRequest, EventStream, GatewayError, LlmClient, Reply};
    use opsdesk_core::config::{AppConfig, ConfigOverrides, LlmProvider, LoadOptions};

    use crate::bootstrap::{bootstrap, bootstrap_with_gateway};

    struct Silent;

    #[async_trait]
    impl LlmClient for Silent {
        async fn complete(&self, _request: ChatRequest<'_>) -> Result<Reply, GatewayError> {
            Ok(Reply::Text(String::new()))
        }

        async fn complete_streaming(
            &self,
            _request: ChatRequest<'_>,
        ) -> Result<EventStream, GatewayError> {
            Ok(Box::pin(futures::stream::empty()))
        }
    }

    fn overrides(api_key: Option<&str>) -> LoadOptions {
        LoadOptions {
            overrides: ConfigOverrides {
                database_url: Some("sqlite::memory:".to_string()),
                llm_api_key: api_key.map(str::to_string),
                ..ConfigOverrides::default()
            },
            ..LoadOptions::default()
        }
    }

    #[tokio::test]
    async fn bootstrap_fails_fast_without_model_endpoint() {
        let mut options = overrides(None);
        options.overrides.llm_provider = Some(LlmProvider::OpenAiCompatible);

        let result = bootstrap(options).await;

        let message = result.err().expect("missing base url should fail").to_string();
        assert!(message.contains("llm.base_url"), "{message}");
    }

    #[tokio::test]
    async fn bootstrap_migrates_and_registers_the_catalog() {
        let app = bootstrap(overrides(Some("sk-test"))).await.expect("bootstrap");

        let (table_count,): (i64,) = sqlx::query_as(
            "SELECT COUNT(*) FROM sqlite_master \
             WHERE type = 'table' AND name IN ('team_member', 'client')",
        )
        .fetch_one(&app.db_pool)
        .await
        .expect("record tables should exist after bootstrap");
        assert_eq!(table_count, 2);

        let runtime = app.runtime.lock().await;
        assert_eq!(runtime.registry().len(), 11);
        assert_eq!(runtime.conversation().len(), 1);
        drop(runtime);

        app.db_pool.close().await;
    }

    #[tokio::test]
    async fn shared_runtime_answers_through_the_supplied_gateway() {
        let config = AppConfig::load(overrides(Some("sk-test"))).expect("config");
        let app = bootstrap_with_gateway(config, Arc::new(Silent)).await.expect("bootstrap");

        let reply = app.runtime.lock().await.submit("hello", false).await;

        assert_eq!(reply, "[No reply returned.]");
        app.db_pool.close().await;
    }
}
