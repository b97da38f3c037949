use anyhow::Result;
use clap::{Parser, Subcommand};
use std::path::PathBuf;

use agentspace::types::AgentArch;
use agentspace::{Config, Environment};

#[derive(Parser)]
#[command(name = "agentspace")]
#[command(about = "Shared agent workspace runtime", long_about = None)]
#[command(version)]
struct Cli {
    #[arg(long, global = true, help = "TOML configuration file")]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Start a workspace: [standalone|infrastructure|remote] [-debug] [-name N] [-port P] [-wspURI U]
    Run {
        #[arg(trailing_var_arg = true, allow_hyphen_values = true)]
        args: Vec<String>,
    },
    /// Join a remote workspace once and print the session
    Join {
        #[arg(help = "Workspace URI, e.g. tcp://host:20100/main")]
        uri: url::Url,
        #[arg(help = "Agent name")]
        agent: String,
        #[arg(long, default_value = "default", help = "Agent architecture kind")]
        arch: String,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("warn")).init();

    let cli = Cli::parse();
    let config = match &cli.config {
        Some(path) => Config::load(path)?,
        None => Config::from_env(),
    };

    match cli.command {
        Commands::Run { args } => run(config, &args).await?,
        Commands::Join { uri, agent, arch } => join(config, &uri, &agent, &arch).await?,
    }

    Ok(())
}

async fn run(config: Config, args: &[String]) -> Result<()> {
    let mut env = Environment::new(config);
    env.initialize(args).await?;

    if let Some(identity) = env.identity() {
        println!(
            "Workspace {} running in {} mode",
            identity.name,
            env.mode().map(|m| m.to_string()).unwrap_or_default()
        );
    }

    tokio::signal::ctrl_c().await?;
    println!("Shutting down...");
    env.stop().await;

    Ok(())
}

async fn join(config: Config, uri: &url::Url, agent: &str, arch: &str) -> Result<()> {
    let mut env = Environment::new(config);
    env.initialize(&["remote", "-wspURI", uri.as_str()]).await?;

    let session = env.join(agent, &AgentArch::new(arch)).await?;

    println!("{}", serde_json::to_string_pretty(&session)?);
    Ok(())
}
