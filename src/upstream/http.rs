use std::time::Duration;

use anyhow::{anyhow, Context, Result};
use reqwest::Client;
use serde_json::Value;

const CONNECT_TIMEOUT_CAP_SECS: u64 = 5;

pub fn build_client(timeout: Duration) -> Result<Client> {
    let connect_timeout = timeout.min(Duration::from_secs(CONNECT_TIMEOUT_CAP_SECS));
    Client::builder()
        .user_agent(concat!("country-atlas/", env!("CARGO_PKG_VERSION")))
        .timeout(timeout)
        .connect_timeout(connect_timeout)
        .build()
        .context("failed to build HTTP client")
}

pub async fn fetch_json(client: &Client, url: &str) -> Result<Value> {
    let response = client
        .get(url)
        .send()
        .await
        .with_context(|| format!("failed GET request: {url}"))?;
    let status = response.status();
    let body = response
        .text()
        .await
        .with_context(|| format!("failed reading response body: {url}"))?;
    if !status.is_success() {
        return Err(anyhow!("GET {url} returned {status}: {}", preview(&body)));
    }
    serde_json::from_str(&body).with_context(|| format!("invalid JSON response: {url}"))
}

fn preview(body: &str) -> String {
    body.chars().take(180).collect()
}
