use clap::{Parser, Subcommand};
use serde_json::{json, Value};

#[derive(Parser)]
#[command(name = "proxy-cli")]
#[command(about = "Management CLI for the forwarding proxy", long_about = None)]
struct Cli {
    /// Control API base URL.
    #[arg(short, long, default_value = "http://localhost:8088")]
    url: String,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Check proxy status and registered pools
    Status,
    /// Open a pool of connections to a target host
    Connect {
        /// Target URL, e.g. http://127.0.0.1:9000
        #[arg(short, long)]
        target: String,
        /// Number of connections to open
        #[arg(short, long, default_value_t = 1)]
        count: i64,
    },
    /// Dispatch a request across an open pool
    Send {
        /// Target URL, e.g. http://127.0.0.1:9000/echo
        #[arg(short, long)]
        target: String,
        /// HTTP method for the dispatched request
        #[arg(short, long, default_value = "POST")]
        method: String,
        /// JSON body to dispatch
        #[arg(short, long, default_value = "null")]
        data: String,
        /// Number of concurrent dispatches
        #[arg(long, default_value_t = 1)]
        concurrent: i64,
    },
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();
    let client = reqwest::Client::new();

    match cli.command {
        Commands::Status => {
            let res = client.get(format!("{}/status", cli.url)).send().await?;
            print_response(res).await?;
        }
        Commands::Connect { target, count } => {
            let res = client
                .post(format!("{}/connect", cli.url))
                .json(&json!({ "targetUrl": target, "count": count }))
                .send()
                .await?;
            print_response(res).await?;
        }
        Commands::Send {
            target,
            method,
            data,
            concurrent,
        } => {
            let body: Value = serde_json::from_str(&data)?;
            let res = client
                .post(format!("{}/send", cli.url))
                .json(&json!({
                    "targetUrl": target,
                    "method": method,
                    "body": body,
                    "concurrent": concurrent,
                }))
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
        eprintln!("Error: control API returned status {}", status);
        if let Ok(text) = res.text().await {
            eprintln!("Response: {}", text);
        }
        return Ok(());
    }

    let json: Value = res.json().await?;
    println!("{}", serde_json::to_string_pretty(&json)?);
    Ok(())
}
