use std::time::Duration;

use clap::{Parser, Subcommand};
use serde_json::Value;

#[derive(Parser)]
#[command(name = "agent-cli")]
#[command(about = "Management CLI for the host agent", long_about = None)]
struct Cli {
    #[arg(short, long, default_value = "http://127.0.0.1:8444")]
    url: String,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Tell the agent to stop
    Shutdown {
        /// Drop open connections instead of letting them finish
        #[arg(short, long)]
        force: bool,

        /// Give up after this many seconds (0 waits forever)
        #[arg(short, long, default_value_t = 0)]
        timeout: u64,
    },
    /// Reload TLS material and re-run interface reconciliation
    Reload,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();
    let client = reqwest::Client::new();

    match cli.command {
        Commands::Shutdown { force, timeout } => {
            let request = client
                .put(format!("{}/internal/shutdown?force={}", cli.url, force))
                .send();

            let res = if timeout > 0 {
                tokio::time::timeout(Duration::from_secs(timeout), request)
                    .await
                    .map_err(|_| format!("daemon still running after {}s timeout", timeout))??
            } else {
                request.await?
            };
            print_response(res).await?;
        }
        Commands::Reload => {
            let res = client
                .post(format!("{}/internal/reload", cli.url))
                .send()
                .await?;
            print_response(res).await?;
        }
    }

    Ok(())
}

async fn print_response(res: reqwest::Response) -> Result<(), Box<dyn std::error::Error>> {
    let status = res.status();
    if !status.is_success() {
        let text = res.text().await.unwrap_or_default();
        return Err(format!("agent returned status {}: {}", status, text).into());
    }

    let json: Value = res.json().await?;
    println!("{}", serde_json::to_string_pretty(&json)?);
    Ok(())
}
