//! Command-line client for the quorum key-value store.
//!
//! Talks to a coordinator:
//!
//! ```text
//! client --coordinator_address localhost:5000 --operation put --key name --value Alice
//! client --coordinator_address localhost:5000 --operation get --key name
//! ```

use anyhow::{bail, Context};
use clap::{Parser, ValueEnum};
use serde_json::Value;

#[derive(Parser)]
#[command(name = "client")]
#[command(about = "Client for the replicated key-value store")]
struct Args {
    /// Coordinator endpoint (host:port)
    #[arg(long = "coordinator_address")]
    coordinator_address: String,

    /// Operation to perform
    #[arg(long, value_enum)]
    operation: Operation,

    /// Key to read or write
    #[arg(long)]
    key: String,

    /// Value to write (required for put); parsed as JSON when possible,
    /// sent as a plain string otherwise
    #[arg(long)]
    value: Option<String>,
}

#[derive(Clone, Copy, ValueEnum)]
enum Operation {
    Put,
    Get,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();
    let client = reqwest::Client::new();

    match args.operation {
        Operation::Put => {
            let raw = args
                .value
                .context("--value is required for the put operation")?;
            let value: Value = serde_json::from_str(&raw).unwrap_or(Value::String(raw));
            let url = format!("http://{}/put/{}", args.coordinator_address, args.key);
            let response = client
                .put(&url)
                .json(&serde_json::json!({ "value": value }))
                .send()
                .await
                .with_context(|| format!("failed to PUT {}", url))?;
            let status = response.status();
            let body: Value = response.json().await.context("malformed PUT response")?;
            println!("{}", body);
            if !status.is_success() {
                bail!("put failed with status {}", status);
            }
        }
        Operation::Get => {
            let url = format!("http://{}/get/{}", args.coordinator_address, args.key);
            let response = client
                .get(&url)
                .send()
                .await
                .with_context(|| format!("failed to GET {}", url))?;
            let status = response.status();
            let body: Value = response.json().await.context("malformed GET response")?;
            println!("{}", body);
            if !status.is_success() {
                bail!("get failed with status {}", status);
            }
        }
    }
    Ok(())
}
