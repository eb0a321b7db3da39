pub mod commands;

use clap::{Args, Parser, Subcommand};
use mostrador_core::config::{AppConfig, LoadOptions, LogFormat};
use std::process::ExitCode;
use tracing_subscriber::EnvFilter;

#[derive(Debug, Parser)]
#[command(
    name = "mostrador",
    about = "Mostrador operator CLI",
    long_about = "Prepare the storefront database, regenerate retrieval vectors, check readiness and run single chat turns.",
    after_help = "Examples:\n  mostrador migrate\n  mostrador seed\n  mostrador embed --tenant trattoria\n  mostrador chat --tenant trattoria \"¿a qué hora abren?\""
)]
pub struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    #[command(about = "Apply pending database migrations")]
    Migrate,
    #[command(about = "Load the demo storefronts (catalogs, stock and FAQs); safe to rerun")]
    Seed,
    #[command(about = "Regenerate FAQ and product vectors with the configured embedding model")]
    Embed {
        #[arg(long, help = "Only re-embed this tenant")]
        tenant: Option<String>,
        #[arg(long, help = "Use the built-in keyword embedder instead of the configured provider")]
        offline: bool,
    },
    #[command(about = "Check config, database, migrations and embedding coverage")]
    Doctor,
    #[command(about = "Run one conversation turn locally and print the reply")]
    Chat(ChatArgs),
}

#[derive(Debug, Clone, Args)]
pub struct ChatArgs {
    #[arg(long)]
    pub tenant: String,
    #[arg(long, help = "Continue an existing conversation")]
    pub conversation: Option<String>,
    #[arg(long, help = "Skip model providers; replies come from the deterministic fallbacks")]
    pub offline: bool,
    pub message: String,
}

pub fn run() -> ExitCode {
    let cli = Cli::parse();
    init_logging();

    let result = match cli.command {
        Command::Migrate => commands::migrate::run(),
        Command::Seed => commands::seed::run(),
        Command::Embed { tenant, offline } => commands::embed::run(tenant.as_deref(), offline),
        Command::Doctor => commands::doctor::run(),
        Command::Chat(args) => commands::chat::run(&args),
    };

    println!("{}", result.output);
    ExitCode::from(result.exit_code)
}

/// Logs go to stderr so stdout carries only the command result.
fn init_logging() {
    let config = AppConfig::load(LoadOptions::default()).ok();
    let level = config.as_ref().map_or("warn", |config| config.logging.level.as_str());
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));
    let builder = tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_target(false)
        .with_env_filter(filter);

    let _ = match config.map(|config| config.logging.format) {
        Some(LogFormat::Json) => builder.json().try_init(),
        Some(LogFormat::Pretty) => builder.pretty().try_init(),
        Some(LogFormat::Compact) | None => builder.compact().try_init(),
    };
}

#[cfg(test)]
mod tests {
    use clap::Parser;

    use super::{Cli, Command};

    #[test]
    fn chat_takes_tenant_and_trailing_message() {
        let cli = Cli::try_parse_from([
            "mostrador",
            "chat",
            "--tenant",
            "trattoria",
            "--offline",
            "quiero dos pizzas",
        ])
        .expect("parse");

        match cli.command {
            Command::Chat(args) => {
                assert_eq!(args.tenant, "trattoria");
                assert_eq!(args.message, "quiero dos pizzas");
                assert!(args.offline);
                assert!(args.conversation.is_none());
            }
            other => panic!("unexpected command {other:?}"),
        }
    }

    #[test]
    fn chat_requires_a_tenant() {
        assert!(Cli::try_parse_from(["mostrador", "chat", "hola"]).is_err());
    }

    #[test]
    fn embed_tenant_is_optional() {
        let cli = Cli::try_parse_from(["mostrador", "embed"]).expect("parse");
        assert!(matches!(cli.command, Command::Embed { tenant: None, offline: false }));
    }
}
