use std::collections::HashMap;

use anyhow::{anyhow, Result};
use async_trait::async_trait;
use reqwest::Client;
use serde_json::Value;
use tracing::{debug, warn};

use crate::upstream::http::fetch_json;
use crate::upstream::{RateSource, RateTable};

/// open.er-api.com `latest/<base>` endpoint.
#[derive(Debug, Clone)]
pub struct ExchangeRateSource {
    client: Client,
    url: String,
}

impl ExchangeRateSource {
    pub fn new(client: Client, url: impl Into<String>) -> Self {
        Self {
            client,
            url: url.into(),
        }
    }
}

#[async_trait]
impl RateSource for ExchangeRateSource {
    async fn fetch_rates(&self) -> Result<RateTable> {
        let payload = fetch_json(&self.client, &self.url).await?;
        let table = parse_rates(&payload)?;
        debug!(count = table.len(), base = %table.base, "fetched exchange rates");
        Ok(table)
    }
}

pub fn parse_rates(payload: &Value) -> Result<RateTable> {
    let object = payload
        .as_object()
        .ok_or_else(|| anyhow!("rate payload is not a JSON object"))?;

    if let Some(result) = object.get("result").and_then(Value::as_str) {
        if result != "success" {
            let reason = object
                .get("error-type")
                .and_then(Value::as_str)
                .unwrap_or("unknown error");
            return Err(anyhow!("rate provider reported {result}: {reason}"));
        }
    }

    let raw_rates = object
        .get("rates")
        .and_then(Value::as_object)
        .ok_or_else(|| anyhow!("rate payload has no 'rates' object"))?;

    let mut rates = HashMap::with_capacity(raw_rates.len());
    for (code, value) in raw_rates {
        match value.as_f64() {
            Some(rate) => {
                rates.insert(code.clone(), rate);
            }
            None => warn!("ignoring non-numeric rate for {code}"),
        }
    }

    let base = object
        .get("base_code")
        .or_else(|| object.get("base"))
        .and_then(Value::as_str)
        .unwrap_or("USD");
    Ok(RateTable::new(base, rates))
}
