use clap::{Parser, Subcommand};
use oai_status::{Harvester, HarvesterArgs, StatusArgs};
use tracing::info;

/// OAI-PMH status checker and Dublin Core reporter
#[derive(Debug, Parser)]
#[command(name = "oai-status")]
#[command(about = "OAI-PMH status checker and Dublin Core reporter", long_about = None)]
#[command(args_conflicts_with_subcommands = true)]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,

    #[command(flatten)]
    report: HarvesterArgs,
}

#[derive(Debug, Subcommand)]
enum Commands {
    /// Check that the endpoint answers ListSets with at least one set
    Status(StatusArgs),
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load .env first, then .env.local can override
    let _ = dotenvy::from_filename_override(".env");
    let _ = dotenvy::from_filename_override(".env.local");

    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let args = Cli::parse();

    match args.command {
        Some(Commands::Status(cfg)) => {
            let harvester = Harvester::new(cfg.oai.config())?;
            info!("Checking ListSets on {}", harvester.config().endpoint);
            println!("{}", harvester.check_list_sets().await);
        }
        None => {
            let cfg = args.report;
            let harvester = Harvester::new(cfg.config())?;
            info!(
                "Harvesting set {} from {}",
                cfg.set,
                harvester.config().endpoint
            );
            harvester
                .report(&cfg.set, cfg.limit, &mut std::io::stdout().lock())
                .await?;
        }
    }

    Ok(())
}
