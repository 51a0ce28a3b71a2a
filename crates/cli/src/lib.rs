pub mod commands;

use clap::{Parser, Subcommand};
use std::process::ExitCode;

use commands::ask::AskRequest;

#[derive(Debug, Parser)]
#[command(
    name = "opsdesk",
    about = "opsdesk operator CLI",
    long_about = "Operate the opsdesk assistant: migrations, demo records, config inspection, readiness checks, and one-off chat turns.",
    after_help = "Examples:\n  opsdesk doctor --json\n  opsdesk seed\n  opsdesk ask --stream \"who joined most recently?\""
)]
pub struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    #[command(about = "Apply pending database migrations and return structured status output")]
    Migrate,
    #[command(about = "Load demo team members and clients; safe to run repeatedly")]
    Seed,
    #[command(
        about = "Inspect effective configuration values with source attribution and redaction"
    )]
    Config,
    #[command(about = "Validate config, model credentials, operation catalog, and database")]
    Doctor {
        #[arg(long, help = "Emit machine-readable JSON output")]
        json: bool,
    },
    #[command(about = "Send one message to the assistant and print its reply")]
    Ask {
        #[arg(required = true, help = "Message text; multiple words are joined with spaces")]
        text: Vec<String>,
        #[arg(long, help = "Start from a fresh conversation")]
        reset: bool,
        #[arg(long, help = "Print reply fragments as they arrive")]
        stream: bool,
    },
}

pub fn run() -> ExitCode {
    let cli = Cli::parse();

    let result = match cli.command {
        Command::Migrate => commands::migrate::run(),
        Command::Seed => commands::seed::run(),
        Command::Config => {
            commands::CommandResult { exit_code: 0, output: commands::config::run() }
        }
        Command::Doctor { json } => {
            commands::CommandResult { exit_code: 0, output: commands::doctor::run(json) }
        }
        Command::Ask { text, reset, stream } => {
            commands::ask::run(AskRequest { text: text.join(" "), reset, stream })
        }
    };

    println!("{}", result.output);
    ExitCode::from(result.exit_code)
}
