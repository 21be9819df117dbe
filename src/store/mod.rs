pub mod migrations;

use std::path::Path;
use std::time::Duration;

use anyhow::{Context, Result};
use chrono::{DateTime, SecondsFormat, Utc};
use rusqlite::types::Type;
use rusqlite::{params, params_from_iter, Connection, OptionalExtension, TransactionBehavior};

use crate::country::{
    name_key, Country, CountryFilter, CountryUpsert, SortKey, StatusSnapshot,
};
use crate::store::migrations::BASE_MIGRATION;

/// How long a writer waits for a concurrent refresh to commit.
const BUSY_TIMEOUT: Duration = Duration::from_secs(30);

const COUNTRY_COLUMNS: &str = "id, name, capital, region, population, currency_code, \
     exchange_rate, estimated_gdp, flag_url, last_refreshed_at";

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct UpsertCounts {
    pub inserted: usize,
    pub updated: usize,
}

pub struct CountryStore {
    conn: Connection,
}

impl CountryStore {
    pub fn open(path: &Path) -> Result<Self> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).with_context(|| {
                format!("failed creating database directory: {}", parent.display())
            })?;
        }
        let conn = Connection::open(path)
            .with_context(|| format!("failed opening database: {}", path.display()))?;
        conn.busy_timeout(BUSY_TIMEOUT)
            .context("failed setting database busy timeout")?;
        let store = Self { conn };
        store.migrate()?;
        Ok(store)
    }

    pub fn open_in_memory() -> Result<Self> {
        let store = Self {
            conn: Connection::open_in_memory()?,
        };
        store.migrate()?;
        Ok(store)
    }

    pub fn migrate(&self) -> Result<()> {
        self.conn
            .execute_batch(BASE_MIGRATION)
            .context("failed applying schema migration")?;
        Ok(())
    }

    /// Inserts or updates every row in one transaction. Rows are matched on
    /// the case-folded name, so repeated names inside `rows` collapse onto
    /// the first one's row and the later values win. The write lock is taken
    /// up front so overlapping refreshes queue behind each other.
    pub fn upsert_batch(
        &mut self,
        rows: &[CountryUpsert],
        refreshed_at: DateTime<Utc>,
    ) -> Result<UpsertCounts> {
        let stamp = format_timestamp(refreshed_at);
        let tx = self
            .conn
            .transaction_with_behavior(TransactionBehavior::Immediate)?;
        let mut counts = UpsertCounts::default();
        {
            let mut find = tx.prepare("SELECT id FROM countries WHERE name_key = ?1")?;
            let mut update = tx.prepare(
                r#"
UPDATE countries
SET name = ?2, capital = ?3, region = ?4, population = ?5, currency_code = ?6,
    exchange_rate = ?7, estimated_gdp = ?8, flag_url = ?9, last_refreshed_at = ?10
WHERE id = ?1
"#,
            )?;
            let mut insert = tx.prepare(
                r#"
INSERT INTO countries(
    name, name_key, capital, region, population, currency_code,
    exchange_rate, estimated_gdp, flag_url, last_refreshed_at
) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)
"#,
            )?;

            for row in rows {
                let key = name_key(&row.name);
                let existing: Option<i64> = find
                    .query_row(params![key], |r| r.get(0))
                    .optional()?;
                match existing {
                    Some(id) => {
                        update.execute(params![
                            id,
                            row.name,
                            row.capital,
                            row.region,
                            row.population,
                            row.currency_code,
                            row.exchange_rate,
                            row.estimated_gdp,
                            row.flag_url,
                            stamp
                        ])?;
                        counts.updated += 1;
                    }
                    None => {
                        insert.execute(params![
                            row.name,
                            key,
                            row.capital,
                            row.region,
                            row.population,
                            row.currency_code,
                            row.exchange_rate,
                            row.estimated_gdp,
                            row.flag_url,
                            stamp
                        ])?;
                        counts.inserted += 1;
                    }
                }
            }
        }
        tx.commit().context("failed committing country batch")?;
        Ok(counts)
    }

    pub fn get(&self, name: &str) -> Result<Option<Country>> {
        let sql = format!("SELECT {COUNTRY_COLUMNS} FROM countries WHERE name_key = ?1");
        let country = self
            .conn
            .query_row(&sql, params![name_key(name)], row_to_country)
            .optional()?;
        Ok(country)
    }

    pub fn list(&self, filter: &CountryFilter, sort: Option<SortKey>) -> Result<Vec<Country>> {
        let mut clauses = Vec::new();
        let mut args: Vec<String> = Vec::new();
        if let Some(region) = non_blank(filter.region.as_deref()) {
            args.push(region.to_string());
            clauses.push(format!("region = ?{} COLLATE NOCASE", args.len()));
        }
        if let Some(currency) = non_blank(filter.currency.as_deref()) {
            args.push(currency.to_string());
            clauses.push(format!("currency_code = ?{} COLLATE NOCASE", args.len()));
        }

        let mut sql = format!("SELECT {COUNTRY_COLUMNS} FROM countries");
        if !clauses.is_empty() {
            sql.push_str(" WHERE ");
            sql.push_str(&clauses.join(" AND "));
        }
        sql.push_str(" ORDER BY ");
        sql.push_str(sort.map(|key| key.order_by()).unwrap_or("id ASC"));

        let mut stmt = self.conn.prepare(&sql)?;
        let rows = stmt
            .query_map(params_from_iter(args.iter()), row_to_country)?
            .collect::<std::result::Result<Vec<_>, _>>()?;
        Ok(rows)
    }

    pub fn top_by_gdp(&self, limit: usize) -> Result<Vec<Country>> {
        let sql = format!(
            "SELECT {COUNTRY_COLUMNS} FROM countries ORDER BY estimated_gdp DESC, id ASC LIMIT ?1"
        );
        let mut stmt = self.conn.prepare(&sql)?;
        let rows = stmt
            .query_map(params![limit as i64], row_to_country)?
            .collect::<std::result::Result<Vec<_>, _>>()?;
        Ok(rows)
    }

    /// Returns `false` when no row matched.
    pub fn delete(&self, name: &str) -> Result<bool> {
        let affected = self
            .conn
            .execute("DELETE FROM countries WHERE name_key = ?1", params![name_key(name)])?;
        Ok(affected > 0)
    }

    pub fn status(&self) -> Result<StatusSnapshot> {
        let (total, latest): (i64, Option<String>) = self.conn.query_row(
            "SELECT COUNT(*), MAX(last_refreshed_at) FROM countries",
            [],
            |row| Ok((row.get(0)?, row.get(1)?)),
        )?;
        let last_refreshed_at = latest
            .map(|raw| parse_timestamp(&raw))
            .transpose()
            .context("stored refresh timestamp is not RFC 3339")?;
        Ok(StatusSnapshot {
            total_countries: total.max(0) as u64,
            last_refreshed_at,
        })
    }
}

/// Fixed-width UTC form so that `MAX()` over the text column is chronological.
fn format_timestamp(ts: DateTime<Utc>) -> String {
    ts.to_rfc3339_opts(SecondsFormat::Millis, true)
}

fn parse_timestamp(raw: &str) -> std::result::Result<DateTime<Utc>, chrono::ParseError> {
    DateTime::parse_from_rfc3339(raw).map(|dt| dt.with_timezone(&Utc))
}

fn non_blank(value: Option<&str>) -> Option<&str> {
    value.map(str::trim).filter(|v| !v.is_empty())
}

fn row_to_country(row: &rusqlite::Row<'_>) -> rusqlite::Result<Country> {
    let refreshed_raw: String = row.get(9)?;
    let last_refreshed_at = parse_timestamp(&refreshed_raw)
        .map_err(|e| rusqlite::Error::FromSqlConversionFailure(9, Type::Text, Box::new(e)))?;
    Ok(Country {
        id: row.get(0)?,
        name: row.get(1)?,
        capital: row.get(2)?,
        region: row.get(3)?,
        population: row.get(4)?,
        currency_code: row.get(5)?,
        exchange_rate: row.get(6)?,
        estimated_gdp: row.get(7)?,
        flag_url: row.get(8)?,
        last_refreshed_at,
    })
}
