//! opsagent CLI - run a single request through the integrated agent

use std::path::PathBuf;

use anyhow::Context;
use clap::Parser;
use tracing_subscriber::EnvFilter;

use opsagent::agent::Agent;
use opsagent::config::{self, Config};

#[derive(Parser)]
#[command(name = "opsagent", version, about = "LLM-driven OS automation agent")]
struct Cli {
    /// The request to run
    request: String,

    /// Path to a configuration file (JSON5 or TOML)
    #[arg(short, long, env = "OPSAGENT_CONFIG")]
    config: Option<PathBuf>,

    /// Print the execution summary after the response
    #[arg(long)]
    summary: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let config: Config = match cli.config {
        Some(ref path) => config::load_config_from_path(path)
            .with_context(|| format!("loading config from {}", path.display()))?,
        None => config::load_config().context("loading config")?,
    };

    let directive = if config.debug.enabled {
        config.debug.level.env_filter()
    } else {
        opsagent::config::DebugLevel::None.env_filter()
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(directive));

    match config.debug.log_file {
        Some(ref path) => {
            let file = std::fs::File::create(path)
                .with_context(|| format!("opening debug log {}", path.display()))?;
            tracing_subscriber::fmt()
                .with_env_filter(filter)
                .with_writer(std::sync::Mutex::new(file))
                .with_ansi(false)
                .init();
        }
        None => tracing_subscriber::fmt().with_env_filter(filter).init(),
    }

    let mut agent = Agent::new(config).context("initializing agent")?;

    let response = agent.run(&cli.request).await;
    println!("{response}");

    if cli.summary {
        println!("\n--- Execution summary ---");
        println!("{}", agent.summary_text());
        if let Some(audit) = agent.audit_summary() {
            println!("\n{audit}");
        }
    }

    agent.save_memory();
    Ok(())
}
