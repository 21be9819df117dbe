use anyhow::{anyhow, Result};
use async_trait::async_trait;
use reqwest::Client;
use serde_json::Value;
use tracing::{debug, warn};

use crate::upstream::http::fetch_json;
use crate::upstream::{CountryRecord, CountrySource, CurrencyRef};

/// REST Countries v2 `/all` endpoint.
#[derive(Debug, Clone)]
pub struct RestCountriesSource {
    client: Client,
    url: String,
}

impl RestCountriesSource {
    pub fn new(client: Client, url: impl Into<String>) -> Self {
        Self {
            client,
            url: url.into(),
        }
    }
}

#[async_trait]
impl CountrySource for RestCountriesSource {
    async fn fetch_countries(&self) -> Result<Vec<CountryRecord>> {
        let payload = fetch_json(&self.client, &self.url).await?;
        let records = parse_countries(&payload)?;
        debug!(count = records.len(), url = %self.url, "fetched country list");
        Ok(records)
    }
}

/// Parses the top-level array field by field. A mistyped optional field reads
/// as absent; a mistyped name or population is left empty so reconciliation
/// skips and counts the entry. Non-object entries become empty records.
pub fn parse_countries(payload: &Value) -> Result<Vec<CountryRecord>> {
    let entries = payload
        .as_array()
        .ok_or_else(|| anyhow!("country payload is not a JSON array"))?;

    let records: Vec<CountryRecord> = entries
        .iter()
        .enumerate()
        .map(|(idx, entry)| {
            if !entry.is_object() {
                warn!("country entry #{idx} is not an object");
            }
            parse_record(entry)
        })
        .collect();
    Ok(records)
}

fn parse_record(entry: &Value) -> CountryRecord {
    CountryRecord {
        name: string_field(entry, "name"),
        capital: string_field(entry, "capital"),
        region: string_field(entry, "region"),
        population: entry.get("population").and_then(integral),
        flag_url: string_field(entry, "flag"),
        currencies: entry
            .get("currencies")
            .and_then(Value::as_array)
            .map(|list| list.iter().map(parse_currency).collect()),
    }
}

fn parse_currency(entry: &Value) -> CurrencyRef {
    CurrencyRef {
        code: string_field(entry, "code"),
        name: string_field(entry, "name"),
        symbol: string_field(entry, "symbol"),
    }
}

fn string_field(entry: &Value, key: &str) -> Option<String> {
    entry.get(key).and_then(Value::as_str).map(str::to_string)
}

/// Integers, or floats with no fractional part such as `1.5e6`.
fn integral(value: &Value) -> Option<i64> {
    if let Some(n) = value.as_i64() {
        return Some(n);
    }
    let f = value.as_f64()?;
    if f.is_finite() && f.fract() == 0.0 && f >= i64::MIN as f64 && f < i64::MAX as f64 {
        Some(f as i64)
    } else {
        None
    }
}
