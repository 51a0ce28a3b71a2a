use crate::commands::{async_runtime, load_config, prepared_pool, CommandResult, EXIT_DATABASE};
use opsdesk_db::{DemoSeed, SeedReport};

pub fn run() -> CommandResult {
    let config = match load_config("seed") {
        Ok(config) => config,
        Err(failure) => return failure,
    };
    let runtime = match async_runtime("seed") {
        Ok(runtime) => runtime,
        Err(failure) => return failure,
    };

    let result = runtime.block_on(async {
        let pool = prepared_pool(&config).await?;
        let report = DemoSeed::load(&pool)
            .await
            .map_err(|error| ("seed_execution", error.to_string(), EXIT_DATABASE));
        pool.close().await;
        report
    });

    match result {
        Ok(report) => CommandResult::success("seed", summary(&report)),
        Err((error_class, message, exit_code)) => {
            CommandResult::failure("seed", error_class, message, exit_code)
        }
    }
}

fn summary(report: &SeedReport) -> String {
    let mut lines = vec![format!(
        "demo records ready: {} team members ({} new), {} clients ({} new)",
        report.team_members_total,
        report.team_members_inserted,
        report.clients_total,
        report.clients_inserted
    )];
    lines.extend(
        DemoSeed::team_member_emails().into_iter().map(|email| format!("  - team member: {email}")),
    );
    lines.extend(DemoSeed::client_emails().into_iter().map(|email| format!("  - client: {email}")));
    lines.join("\n")
}
