//! Prints the VM listing of one or more CollabVM servers as JSON.
//!
//! Usage:
//!   cargo run --bin collabvm-list -- \
//!     --url wss://computernewb.com/collab-vm/vm0 \
//!     --url ws://127.0.0.1:6004 \
//!     --timeout-ms 5000

use std::time::Duration;

use anyhow::Context;
use chrono::{DateTime, Utc};
use collabvm_client::{types::VmListing, ClientOptions, VmClient};
use futures_util::future::join_all;
use serde::Serialize;
use tracing_subscriber::EnvFilter;

const DEFAULT_TIMEOUT: Duration = Duration::from_secs(10);

struct Args {
    urls: Vec<String>,
    timeout: Duration,
}

fn parse_args() -> anyhow::Result<Args> {
    let mut args = std::env::args().skip(1);
    let mut urls = Vec::new();
    let mut timeout = DEFAULT_TIMEOUT;

    while let Some(flag) = args.next() {
        match flag.as_str() {
            "--url" => urls.push(args.next().context("--url needs a value")?),
            "--timeout-ms" => {
                let ms = args.next().context("--timeout-ms needs a value")?.parse()?;
                timeout = Duration::from_millis(ms);
            }
            other => anyhow::bail!("unknown flag: {other}"),
        }
    }

    if urls.is_empty() {
        anyhow::bail!("at least one --url is required");
    }
    Ok(Args { urls, timeout })
}

#[derive(Debug, Serialize)]
struct ServerListing {
    url: String,
    fetched_at: DateTime<Utc>,
    vms: Vec<VmListing>,
    #[serde(skip_serializing_if = "Option::is_none")]
    error: Option<String>,
}

async fn fetch(url: String, timeout: Duration) -> ServerListing {
    let client = VmClient::with_options(url.clone(), ClientOptions { request_timeout: Some(timeout) });
    client.open().await;

    let result = if client.is_open() {
        client.list().await.map_err(|e| e.to_string())
    } else {
        Err("could not connect".to_string())
    };
    client.close();

    let (vms, error) = match result {
        Ok(vms) => (vms, None),
        Err(e) => {
            tracing::warn!("{url}: {e}");
            (Vec::new(), Some(e))
        }
    };
    ServerListing { url, fetched_at: Utc::now(), vms, error }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    let args = parse_args()?;
    let listings = join_all(args.urls.into_iter().map(|url| fetch(url, args.timeout))).await;

    let json = serde_json::to_string_pretty(&listings)?;
    println!("{json}");
    Ok(())
}
