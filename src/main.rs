use std::path::PathBuf;

use clap::{Parser, Subcommand};
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use medscout::{Config, ResearcherAgent};

#[derive(Parser)]
#[command(
    name = "medscout",
    about = "Aggregates public information about medical researchers"
)]
struct Cli {
    /// CSV dataset of known researchers, checked before any web source
    #[arg(long, global = true)]
    csv: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Search all sources for a researcher and print the merged report
    Search {
        name: String,
        #[arg(short, long)]
        specialization: Option<String>,
    },
    /// Ask a question, optionally focused on one researcher
    Ask {
        question: String,
        #[arg(short, long)]
        researcher: Option<String>,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "medscout=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let cli = Cli::parse();
    let config = Config::from_env()?;
    let mut agent = ResearcherAgent::new(config);

    if let Some(path) = &cli.csv {
        let rows = agent.load_table(path)?;
        info!(rows, "dataset loaded");
    }

    match cli.command {
        Command::Search {
            name,
            specialization,
        } => {
            agent.search(&name, specialization.as_deref()).await?;
            println!("{}", agent.report(&name)?);
        }
        Command::Ask {
            question,
            researcher,
        } => {
            let answer = agent.ask(&question, researcher.as_deref()).await?;
            println!("{}", answer);
        }
    }

    Ok(())
}
