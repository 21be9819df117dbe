pub mod sort;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

pub use sort::{SortKey, SortKeyParseError};

/// Longest currency code the store accepts.
pub const MAX_CURRENCY_CODE_LEN: usize = 10;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Country {
    pub id: i64,
    pub name: String,
    pub capital: Option<String>,
    pub region: Option<String>,
    pub population: i64,
    pub currency_code: Option<String>,
    pub exchange_rate: Option<f64>,
    pub estimated_gdp: f64,
    pub flag_url: Option<String>,
    pub last_refreshed_at: DateTime<Utc>,
}

/// A reconciled row ready to be upserted. The store assigns `id`.
#[derive(Debug, Clone, PartialEq)]
pub struct CountryUpsert {
    pub name: String,
    pub capital: Option<String>,
    pub region: Option<String>,
    pub population: i64,
    pub currency_code: Option<String>,
    pub exchange_rate: Option<f64>,
    pub estimated_gdp: f64,
    pub flag_url: Option<String>,
}

#[derive(Debug, Clone, Default)]
pub struct CountryFilter {
    pub region: Option<String>,
    pub currency: Option<String>,
}

impl CountryFilter {
    pub fn region(mut self, region: impl Into<String>) -> Self {
        self.region = Some(region.into());
        self
    }

    pub fn currency(mut self, currency: impl Into<String>) -> Self {
        self.currency = Some(currency.into());
        self
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct StatusSnapshot {
    pub total_countries: u64,
    pub last_refreshed_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct RefreshSummary {
    pub total_countries: u64,
    pub inserted: usize,
    pub updated: usize,
    pub skipped: usize,
    pub last_refreshed_at: DateTime<Utc>,
}

/// Case-folded form of a country name used as the natural key.
pub fn name_key(name: &str) -> String {
    name.trim().to_lowercase()
}

#[cfg(test)]
mod tests {
    use super::name_key;

    #[test]
    fn name_key_folds_case_and_trims() {
        assert_eq!(name_key("  Côte d'Ivoire "), "côte d'ivoire");
        assert_eq!(name_key("ÅLAND Islands"), name_key("åland islands"));
    }
}
