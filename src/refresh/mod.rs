pub mod estimate;

use std::path::Path;

use chrono::Utc;
use rand::Rng;
use thiserror::Error;
use tracing::{error, info, warn};

use crate::country::{CountryUpsert, RefreshSummary, MAX_CURRENCY_CODE_LEN};
use crate::render::{write_summary_image, SummaryView};
use crate::store::CountryStore;
use crate::upstream::{CountryRecord, RateTable, UpstreamKind, Upstreams};

pub use estimate::GdpEstimator;

#[derive(Debug, Error)]
pub enum RefreshError {
    #[error("could not fetch data from {upstream}")]
    Upstream {
        upstream: UpstreamKind,
        #[source]
        source: anyhow::Error,
    },
    #[error("country store failure")]
    Store(#[source] anyhow::Error),
    /// Rows were committed; only the image is stale.
    #[error("summary image generation failed")]
    Image {
        summary: RefreshSummary,
        #[source]
        source: anyhow::Error,
    },
}

#[derive(Debug, Clone)]
pub struct UpstreamSnapshot {
    pub countries: Vec<CountryRecord>,
    pub rates: RateTable,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct Reconciled {
    pub rows: Vec<CountryUpsert>,
    pub skipped: usize,
}

#[derive(Clone)]
pub struct Reconciler {
    upstreams: Upstreams,
    estimator: GdpEstimator,
}

impl Reconciler {
    pub fn new(upstreams: Upstreams, estimator: GdpEstimator) -> Self {
        Self {
            upstreams,
            estimator,
        }
    }

    /// Both payloads or nothing: a failure here leaves the store untouched.
    pub async fn fetch(&self) -> Result<UpstreamSnapshot, RefreshError> {
        let countries = self
            .upstreams
            .countries
            .fetch_countries()
            .await
            .map_err(|source| RefreshError::Upstream {
                upstream: UpstreamKind::Countries,
                source,
            })?;
        let rates = self
            .upstreams
            .rates
            .fetch_rates()
            .await
            .map_err(|source| RefreshError::Upstream {
                upstream: UpstreamKind::ExchangeRates,
                source,
            })?;
        Ok(UpstreamSnapshot { countries, rates })
    }

    pub fn apply(
        &self,
        store: &mut CountryStore,
        snapshot: UpstreamSnapshot,
    ) -> Result<RefreshSummary, RefreshError> {
        let mut rng = self.estimator.rng();
        let reconciled = reconcile(snapshot.countries, &snapshot.rates, &self.estimator, &mut rng);
        let refreshed_at = Utc::now();
        let counts = store
            .upsert_batch(&reconciled.rows, refreshed_at)
            .map_err(RefreshError::Store)?;
        let status = store.status().map_err(RefreshError::Store)?;

        let summary = RefreshSummary {
            total_countries: status.total_countries,
            inserted: counts.inserted,
            updated: counts.updated,
            skipped: reconciled.skipped,
            last_refreshed_at: status.last_refreshed_at.unwrap_or(refreshed_at),
        };
        info!(
            total = summary.total_countries,
            inserted = summary.inserted,
            updated = summary.updated,
            skipped = summary.skipped,
            "country batch committed"
        );
        Ok(summary)
    }

    pub async fn refresh(
        &self,
        db_path: &Path,
        image_path: &Path,
    ) -> Result<RefreshSummary, RefreshError> {
        let snapshot = self.fetch().await?;
        let mut store = CountryStore::open(db_path).map_err(RefreshError::Store)?;
        let summary = self.apply(&mut store, snapshot)?;

        if let Err(source) = regenerate_image(&store, image_path) {
            error!("summary image generation failed: {source:#}");
            return Err(RefreshError::Image { summary, source });
        }
        Ok(summary)
    }
}

pub fn regenerate_image(store: &CountryStore, image_path: &Path) -> anyhow::Result<()> {
    let view = SummaryView::from_store(store)?;
    write_summary_image(&view, image_path)
}

/// Validates upstream records and derives the stored fields. Records without
/// a name or a non-negative population are skipped.
pub fn reconcile<R: Rng + ?Sized>(
    records: Vec<CountryRecord>,
    rates: &RateTable,
    estimator: &GdpEstimator,
    rng: &mut R,
) -> Reconciled {
    let mut out = Reconciled::default();
    for record in records {
        let name = record
            .name
            .as_deref()
            .map(str::trim)
            .filter(|name| !name.is_empty());
        let (Some(name), Some(population)) = (name, record.population.filter(|p| *p >= 0)) else {
            warn!(
                name = ?record.name,
                population = ?record.population,
                "skipping country record missing name or population"
            );
            out.skipped += 1;
            continue;
        };

        let currency_code = record
            .first_currency_code()
            .filter(|code| code.chars().count() <= MAX_CURRENCY_CODE_LEN)
            .map(str::to_ascii_uppercase);
        let exchange_rate = currency_code
            .as_deref()
            .and_then(|code| rates.get(code))
            .and_then(|rate| estimate::usable_rate(Some(rate)));
        let estimated_gdp = estimator.estimate(population, exchange_rate, rng);

        out.rows.push(CountryUpsert {
            name: name.to_string(),
            capital: non_blank(record.capital),
            region: non_blank(record.region),
            population,
            currency_code,
            exchange_rate,
            estimated_gdp,
            flag_url: non_blank(record.flag_url),
        });
    }
    out
}

fn non_blank(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::{reconcile, GdpEstimator, Reconciler, RefreshError};
    use crate::country::{CountryFilter, SortKey};
    use crate::store::CountryStore;
    use crate::upstream::testing::{
        country, rates, upstreams, StaticCountries, StaticRates, Unreachable,
    };
    use crate::upstream::{CountryRecord, CurrencyRef, UpstreamKind, Upstreams};

    #[test]
    fn store_error_chain_names_the_cause_once() {
        let err = anyhow::Error::new(RefreshError::Store(anyhow::anyhow!("database is locked")));
        assert_eq!(format!("{err:#}"), "country store failure: database is locked");
    }

    fn sample_countries() -> Vec<CountryRecord> {
        vec![
            country("Testland", 1_000_000, Some("TST")),
            country("Nowhere", 500, Some("ZZZ")),
            country("Stateless", 42, None),
            country("Euroland", 2_000_000, Some("EUR")),
        ]
    }

    #[test]
    fn testland_gdp_falls_in_expected_range() {
        let estimator = GdpEstimator::default();
        let mut rng = estimator.rng();
        let out = reconcile(
            vec![country("Testland", 1_000_000, Some("TST"))],
            &rates(&[("TST", 2.0)]),
            &estimator,
            &mut rng,
        );
        let row = &out.rows[0];
        assert_eq!(row.currency_code.as_deref(), Some("TST"));
        assert_eq!(row.exchange_rate, Some(2.0));
        assert!((500_000_000.0..=1_000_000_000.0).contains(&row.estimated_gdp));
    }

    #[test]
    fn unknown_currency_gets_null_rate_and_zero_gdp() {
        let estimator = GdpEstimator::default();
        let mut rng = estimator.rng();
        let out = reconcile(sample_countries(), &rates(&[("TST", 2.0)]), &estimator, &mut rng);
        let nowhere = out.rows.iter().find(|r| r.name == "Nowhere").expect("row");
        assert_eq!(nowhere.currency_code.as_deref(), Some("ZZZ"));
        assert_eq!(nowhere.exchange_rate, None);
        assert_eq!(nowhere.estimated_gdp, 0.0);

        let stateless = out.rows.iter().find(|r| r.name == "Stateless").expect("row");
        assert_eq!(stateless.currency_code, None);
        assert_eq!(stateless.exchange_rate, None);
        assert_eq!(stateless.estimated_gdp, 0.0);
    }

    #[test]
    fn skips_records_missing_name_or_population() {
        let mut missing_pop = country("NoPop", 1, None);
        missing_pop.population = None;
        let mut blank_name = country("x", 10, None);
        blank_name.name = Some("   ".to_string());
        let negative = country("Negative", -5, None);

        let estimator = GdpEstimator::default();
        let mut rng = estimator.rng();
        let out = reconcile(
            vec![missing_pop, blank_name, negative, country("Kept", 3, None)],
            &rates(&[]),
            &estimator,
            &mut rng,
        );
        assert_eq!(out.skipped, 3);
        assert_eq!(out.rows.len(), 1);
        assert_eq!(out.rows[0].name, "Kept");
    }

    #[test]
    fn overlong_currency_code_is_dropped() {
        let mut record = country("Longcode", 10, None);
        record.currencies = Some(vec![CurrencyRef {
            code: Some("ABCDEFGHIJK".to_string()),
            ..CurrencyRef::default()
        }]);
        let estimator = GdpEstimator::default();
        let mut rng = estimator.rng();
        let out = reconcile(vec![record], &rates(&[("ABCDEFGHIJK", 1.0)]), &estimator, &mut rng);
        assert_eq!(out.rows[0].currency_code, None);
        assert_eq!(out.rows[0].estimated_gdp, 0.0);
    }

    #[tokio::test]
    async fn refresh_upserts_and_renders_image() {
        let dir = tempfile::tempdir().expect("tempdir");
        let db = dir.path().join("countries.db");
        let image = dir.path().join("cache/summary.png");
        let mut records = sample_countries();
        records.push(country("TESTLAND", 1_000_000, Some("TST")));
        let reconciler = Reconciler::new(
            upstreams(records, rates(&[("TST", 2.0), ("EUR", 0.9)])),
            GdpEstimator::default(),
        );

        let first = reconciler.refresh(&db, &image).await.expect("first refresh");
        assert_eq!(first.total_countries, 4);
        assert_eq!(first.inserted, 4);
        assert_eq!(first.updated, 1);
        assert!(image.exists());

        let second = reconciler.refresh(&db, &image).await.expect("second refresh");
        assert_eq!(second.total_countries, 4);
        assert_eq!(second.inserted, 0);
        assert_eq!(second.updated, 5);
        assert!(second.last_refreshed_at >= first.last_refreshed_at);

        let store = CountryStore::open(&db).expect("open");
        let rows = store
            .list(&CountryFilter::default(), Some(SortKey::GdpDesc))
            .expect("list");
        assert!(rows
            .windows(2)
            .all(|pair| pair[0].estimated_gdp >= pair[1].estimated_gdp));
        let testland = store.get("testland").expect("get").expect("present");
        assert_eq!(testland.name, "TESTLAND");
    }

    #[tokio::test]
    async fn country_api_failure_aborts_before_writes() {
        let dir = tempfile::tempdir().expect("tempdir");
        let db = dir.path().join("countries.db");
        let reconciler = Reconciler::new(
            Upstreams::new(Arc::new(Unreachable), Arc::new(StaticRates(rates(&[])))),
            GdpEstimator::default(),
        );
        let err = reconciler
            .refresh(&db, &dir.path().join("summary.png"))
            .await
            .expect_err("should fail");
        assert!(matches!(
            err,
            RefreshError::Upstream {
                upstream: UpstreamKind::Countries,
                ..
            }
        ));
        assert_eq!(err.to_string(), "could not fetch data from Countries API");
        assert!(!db.exists());
    }

    #[tokio::test]
    async fn rate_api_failure_is_reported_and_leaves_rows() {
        let dir = tempfile::tempdir().expect("tempdir");
        let db = dir.path().join("countries.db");
        let image = dir.path().join("summary.png");
        let seeded = Reconciler::new(
            upstreams(sample_countries(), rates(&[("TST", 2.0)])),
            GdpEstimator::default().with_seed(1),
        );
        let before = seeded.refresh(&db, &image).await.expect("seed");

        let countries = Arc::new(StaticCountries::new(vec![country("Later", 1, None)]));
        let broken = Reconciler::new(
            Upstreams::new(countries.clone(), Arc::new(Unreachable)),
            GdpEstimator::default(),
        );
        let err = broken.refresh(&db, &image).await.expect_err("should fail");
        assert!(matches!(
            err,
            RefreshError::Upstream {
                upstream: UpstreamKind::ExchangeRates,
                ..
            }
        ));
        assert_eq!(countries.calls(), 1);

        let store = CountryStore::open(&db).expect("open");
        let status = store.status().expect("status");
        assert_eq!(status.total_countries, before.total_countries);
        assert!(store.get("Later").expect("get").is_none());
    }

    #[tokio::test]
    async fn image_failure_keeps_committed_rows() {
        let dir = tempfile::tempdir().expect("tempdir");
        let db = dir.path().join("countries.db");
        let blocker = dir.path().join("blocker");
        std::fs::write(&blocker, b"not a directory").expect("blocker");
        let reconciler = Reconciler::new(
            upstreams(sample_countries(), rates(&[("TST", 2.0)])),
            GdpEstimator::default(),
        );

        let err = reconciler
            .refresh(&db, &blocker.join("summary.png"))
            .await
            .expect_err("image should fail");
        let summary = match err {
            RefreshError::Image { summary, .. } => summary,
            other => panic!("expected image error, got {other:?}"),
        };
        assert_eq!(summary.total_countries, 4);
        let store = CountryStore::open(&db).expect("open");
        assert_eq!(store.status().expect("status").total_countries, 4);
    }

    #[tokio::test]
    async fn seeded_refresh_is_reproducible() {
        let estimator = GdpEstimator::default().with_seed(99);
        let reconciler = Reconciler::new(
            upstreams(sample_countries(), rates(&[("TST", 2.0), ("EUR", 0.9)])),
            estimator,
        );
        let mut first = CountryStore::open_in_memory().expect("store");
        let mut second = CountryStore::open_in_memory().expect("store");
        reconciler
            .apply(&mut first, reconciler.fetch().await.expect("fetch"))
            .expect("apply");
        reconciler
            .apply(&mut second, reconciler.fetch().await.expect("fetch"))
            .expect("apply");

        let gdp = |store: &CountryStore| {
            store
                .list(&CountryFilter::default(), Some(SortKey::NameAsc))
                .expect("list")
                .into_iter()
                .map(|c| c.estimated_gdp)
                .collect::<Vec<_>>()
        };
        assert_eq!(gdp(&first), gdp(&second));
    }
}
