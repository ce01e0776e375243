//! assessa CLI: take and author timed assessments from the terminal.

use std::path::PathBuf;
use std::process;

use clap::{Parser, Subcommand};

mod commands;

#[derive(Parser)]
#[command(name = "assessa", version, about = "Timed multi-section assessment sessions")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Take a test interactively (commands are read from stdin)
    Take {
        /// Test identifier on the backend
        #[arg(long)]
        test_id: String,

        /// Test-taker name
        #[arg(long, default_value = "")]
        name: String,

        /// Test-taker email
        #[arg(long, default_value = "")]
        email: String,

        /// Config file path
        #[arg(long)]
        config: Option<PathBuf>,
    },

    /// Validate test definition JSON files
    Validate {
        /// Path to a test definition file or directory
        #[arg(long)]
        test: PathBuf,
    },

    /// Create starter config and example test definition
    Init,
}

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("assessa=info".parse().unwrap()),
        )
        .init();

    let cli = Cli::parse();

    let result = match cli.command {
        Commands::Take {
            test_id,
            name,
            email,
            config,
        } => commands::take::execute(test_id, name, email, config).await,
        Commands::Validate { test } => commands::validate::execute(test),
        Commands::Init => commands::init::execute(),
    };

    if let Err(e) = result {
        eprintln!("Error: {e:#}");
        process::exit(1);
    }
}
