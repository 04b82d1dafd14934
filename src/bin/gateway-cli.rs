use clap::{Parser, Subcommand};
use serde_json::Value;

#[derive(Parser)]
#[command(name = "gateway-cli")]
#[command(about = "Management CLI for the integration gateway", long_about = None)]
struct Cli {
    #[arg(short, long, default_value = "http://localhost:8081")]
    url: String,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Check gateway system status
    Status,
    /// Show per-endpoint circuit breaker state
    Circuits,
    /// Show per-endpoint queue depth and counters
    Queues,
    /// Inspect the response cache counters
    Cache,
    /// Inspect dead-lettered webhook events
    DeadLetters,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();
    let client = reqwest::Client::new();

    let path = match cli.command {
        Commands::Status => "/admin/status",
        Commands::Circuits => "/admin/circuits",
        Commands::Queues => "/admin/queues",
        Commands::Cache => "/admin/cache",
        Commands::DeadLetters => "/admin/dead-letters",
    };

    let res = client.get(format!("{}{}", cli.url, path)).send().await?;
    print_response(res).await?;

    Ok(())
}

async fn print_response(res: reqwest::Response) -> Result<(), Box<dyn std::error::Error>> {
    let status = res.status();
    if !status.is_success() {
        eprintln!("Error: Admin API returned status {}", status);
        if let Ok(text) = res.text().await {
            eprintln!("Response: {}", text);
        }
        return Ok(());
    }

    let json: Value = res.json().await?;
    println!("{}", serde_json::to_string_pretty(&json)?);
    Ok(())
}
