use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use anyhow::{anyhow, Result};
use async_trait::async_trait;

use crate::upstream::{CountryRecord, CountrySource, CurrencyRef, RateSource, RateTable, Upstreams};

pub struct StaticCountries {
    records: Vec<CountryRecord>,
    calls: AtomicUsize,
}

impl StaticCountries {
    pub fn new(records: Vec<CountryRecord>) -> Self {
        Self {
            records,
            calls: AtomicUsize::new(0),
        }
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl CountrySource for StaticCountries {
    async fn fetch_countries(&self) -> Result<Vec<CountryRecord>> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Ok(self.records.clone())
    }
}

pub struct StaticRates(pub RateTable);

#[async_trait]
impl RateSource for StaticRates {
    async fn fetch_rates(&self) -> Result<RateTable> {
        Ok(self.0.clone())
    }
}

pub struct Unreachable;

#[async_trait]
impl CountrySource for Unreachable {
    async fn fetch_countries(&self) -> Result<Vec<CountryRecord>> {
        Err(anyhow!("connection refused"))
    }
}

#[async_trait]
impl RateSource for Unreachable {
    async fn fetch_rates(&self) -> Result<RateTable> {
        Err(anyhow!("request timed out"))
    }
}

pub fn country(name: &str, population: i64, currency: Option<&str>) -> CountryRecord {
    CountryRecord {
        name: Some(name.to_string()),
        capital: Some(format!("{name} City")),
        region: Some("Testregion".to_string()),
        population: Some(population),
        flag_url: Some(format!("https://flags.example/{}.svg", name.to_lowercase())),
        currencies: currency.map(|code| {
            vec![CurrencyRef {
                code: Some(code.to_string()),
                ..CurrencyRef::default()
            }]
        }),
    }
}

pub fn rates(pairs: &[(&str, f64)]) -> RateTable {
    RateTable::new(
        "USD",
        pairs
            .iter()
            .map(|(code, rate)| (code.to_string(), *rate))
            .collect::<HashMap<_, _>>(),
    )
}

pub fn upstreams(records: Vec<CountryRecord>, table: RateTable) -> Upstreams {
    Upstreams::new(
        Arc::new(StaticCountries::new(records)),
        Arc::new(StaticRates(table)),
    )
}
