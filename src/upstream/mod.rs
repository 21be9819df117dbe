pub mod countries;
pub mod http;
pub mod rates;
#[cfg(test)]
pub(crate) mod testing;

use std::collections::HashMap;
use std::fmt::{Display, Formatter};
use std::sync::Arc;

use anyhow::Result;
use async_trait::async_trait;

use crate::config::Config;
use crate::upstream::countries::RestCountriesSource;
use crate::upstream::rates::ExchangeRateSource;

#[derive(Debug, Clone, Default, PartialEq)]
pub struct CurrencyRef {
    pub code: Option<String>,
    pub name: Option<String>,
    pub symbol: Option<String>,
}

/// One country entry as the reference API reports it. Nothing is validated yet.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CountryRecord {
    pub name: Option<String>,
    pub capital: Option<String>,
    pub region: Option<String>,
    pub population: Option<i64>,
    pub flag_url: Option<String>,
    pub currencies: Option<Vec<CurrencyRef>>,
}

impl CountryRecord {
    pub fn first_currency_code(&self) -> Option<&str> {
        self.currencies
            .as_ref()?
            .first()?
            .code
            .as_deref()
            .map(str::trim)
            .filter(|code| !code.is_empty())
    }
}

/// Currency code to units-per-USD.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RateTable {
    pub base: String,
    rates: HashMap<String, f64>,
}

impl RateTable {
    pub fn new(base: impl Into<String>, rates: HashMap<String, f64>) -> Self {
        let rates = rates
            .into_iter()
            .map(|(code, rate)| (code.trim().to_ascii_uppercase(), rate))
            .collect();
        Self {
            base: base.into(),
            rates,
        }
    }

    pub fn get(&self, code: &str) -> Option<f64> {
        self.rates.get(&code.trim().to_ascii_uppercase()).copied()
    }

    pub fn len(&self) -> usize {
        self.rates.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rates.is_empty()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UpstreamKind {
    Countries,
    ExchangeRates,
}

impl Display for UpstreamKind {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        let display = match self {
            Self::Countries => "Countries API",
            Self::ExchangeRates => "Exchange Rates API",
        };
        write!(f, "{display}")
    }
}

#[async_trait]
pub trait CountrySource: Send + Sync {
    async fn fetch_countries(&self) -> Result<Vec<CountryRecord>>;
}

#[async_trait]
pub trait RateSource: Send + Sync {
    async fn fetch_rates(&self) -> Result<RateTable>;
}

#[derive(Clone)]
pub struct Upstreams {
    pub countries: Arc<dyn CountrySource>,
    pub rates: Arc<dyn RateSource>,
}

impl Upstreams {
    pub fn new(countries: Arc<dyn CountrySource>, rates: Arc<dyn RateSource>) -> Self {
        Self { countries, rates }
    }

    pub fn from_config(config: &Config) -> Result<Self> {
        let client = http::build_client(config.upstream_timeout())?;
        Ok(Self {
            countries: Arc::new(RestCountriesSource::new(
                client.clone(),
                config.upstream.countries_url.clone(),
            )),
            rates: Arc::new(ExchangeRateSource::new(
                client,
                config.upstream.rates_url.clone(),
            )),
        })
    }
}
