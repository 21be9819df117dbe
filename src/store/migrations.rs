pub const BASE_MIGRATION: &str = r#"
CREATE TABLE IF NOT EXISTS countries (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    name TEXT NOT NULL,
    name_key TEXT NOT NULL UNIQUE,
    capital TEXT,
    region TEXT,
    population INTEGER NOT NULL,
    currency_code TEXT CHECK (currency_code IS NULL OR length(currency_code) <= 10),
    exchange_rate REAL,
    estimated_gdp REAL NOT NULL DEFAULT 0,
    flag_url TEXT,
    last_refreshed_at TEXT NOT NULL
);
CREATE INDEX IF NOT EXISTS idx_countries_region
    ON countries(region COLLATE NOCASE);
CREATE INDEX IF NOT EXISTS idx_countries_currency
    ON countries(currency_code COLLATE NOCASE);
CREATE INDEX IF NOT EXISTS idx_countries_gdp
    ON countries(estimated_gdp DESC);
"#;
