use std::io::Write;
use std::sync::Arc;

use futures::StreamExt;
use opsdesk_agent::llm::LlmClient;
use opsdesk_agent::openai::OpenAiClient;
use opsdesk_agent::operations::{default_registry, RecordStores};
use opsdesk_agent::{AgentRuntime, RuntimeSettings, TurnOutcome};
use opsdesk_core::config::AppConfig;

use crate::commands::{
    async_runtime, load_config, prepared_pool, CommandResult, StepError, EXIT_AGENT,
};

#[derive(Clone, Debug, Default)]
pub struct AskRequest {
    pub text: String,
    pub reset: bool,
    pub stream: bool,
}

pub fn run(request: AskRequest) -> CommandResult {
    let config = match load_config("ask") {
        Ok(config) => config,
        Err(failure) => return failure,
    };
    let gateway = match OpenAiClient::from_config(&config.llm) {
        Ok(gateway) => gateway,
        Err(error) => {
            return CommandResult::failure("ask", "gateway_init", error.to_string(), EXIT_AGENT);
        }
    };

    run_with_gateway(&config, Arc::new(gateway), &request, &mut std::io::stdout())
}

/// Runs one turn against `gateway`. Streamed fragments are written to `out` as they arrive.
pub fn run_with_gateway(
    config: &AppConfig,
    gateway: Arc<dyn LlmClient>,
    request: &AskRequest,
    out: &mut dyn Write,
) -> CommandResult {
    let runtime = match async_runtime("ask") {
        Ok(runtime) => runtime,
        Err(failure) => return failure,
    };

    let result = runtime.block_on(async {
        let pool = prepared_pool(config).await?;
        let registry = default_registry(&RecordStores::sql(pool.clone()))
            .map_err(|error| ("registry", error.to_string(), EXIT_AGENT))?;
        let mut agent = AgentRuntime::new(
            gateway,
            Arc::new(registry),
            RuntimeSettings::from_config(&config.agent),
        );

        let reply = if request.stream {
            let mut reply = String::new();
            let mut fragments = agent.submit_streaming(&request.text, request.reset);
            while let Some(fragment) = fragments.next().await {
                // Fragments are progress only; the reply is reported in full below.
                let _ = write!(out, "{fragment}").and_then(|()| out.flush());
                reply.push_str(&fragment);
            }
            drop(fragments);
            let _ = writeln!(out);
            reply
        } else {
            agent.submit(&request.text, request.reset).await
        };
        let failed = agent_failed(agent.last_outcome());

        pool.close().await;
        Ok::<(String, bool), StepError>((reply, failed))
    });

    match result {
        Ok((reply, true)) => CommandResult::failure("ask", "agent", reply, EXIT_AGENT),
        Ok((reply, false)) => CommandResult::success("ask", reply),
        Err((error_class, message, exit_code)) => {
            CommandResult::failure("ask", error_class, message, exit_code)
        }
    }
}

/// Only a backend failure is an agent error; operation diagnostics are ordinary replies.
fn agent_failed(outcome: Option<TurnOutcome>) -> bool {
    matches!(outcome, Some(TurnOutcome::GatewayFailed))
}
