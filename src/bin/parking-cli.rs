use clap::{Parser, Subcommand};
use reqwest::header::{HeaderMap, HeaderValue, AUTHORIZATION};
use serde_json::Value;

#[derive(Parser)]
#[command(name = "parking-cli")]
#[command(about = "Operator CLI for a running parking server", long_about = None)]
struct Cli {
    #[arg(short, long, default_value = "http://127.0.0.1:8080")]
    url: String,

    /// Bearer token sent with every request.
    #[arg(short, long)]
    token: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Check that the HTTP layer is up
    Health,
    /// List service information and registered endpoints
    Info,
    /// Probe the backing store and show pool statistics
    Store,
}

impl Commands {
    fn path(&self) -> &'static str {
        match self {
            Commands::Health => "/api/health",
            Commands::Info => "/api/info",
            Commands::Store => "/api/health/store",
        }
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();
    let client = reqwest::Client::new();

    let mut headers = HeaderMap::new();
    if let Some(token) = &cli.token {
        headers.insert(
            AUTHORIZATION,
            HeaderValue::from_str(&format!("Bearer {}", token))?,
        );
    }

    let url = format!("{}{}", cli.url.trim_end_matches('/'), cli.command.path());
    let res = client.get(url).headers(headers).send().await?;
    print_response(res).await
}

async fn print_response(res: reqwest::Response) -> Result<(), Box<dyn std::error::Error>> {
    let status = res.status();
    let text = res.text().await?;

    match serde_json::from_str::<Value>(&text) {
        Ok(json) => {
            let pretty = serde_json::to_string_pretty(&json)?;
            if status.is_success() {
                println!("{}", pretty);
            } else {
                eprintln!("Error: server returned status {}", status);
                eprintln!("{}", pretty);
            }
        }
        Err(_) => {
            eprintln!("Error: server returned status {}", status);
            eprintln!("Response: {}", text);
        }
    }
    Ok(())
}
