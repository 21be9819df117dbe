use comfy_table::presets::UTF8_FULL;
use comfy_table::{Cell, CellAlignment, Color, ContentArrangement, Table};

use crate::country::{Country, RefreshSummary, StatusSnapshot};
use crate::render::format_thousands;

pub fn render_countries_table(countries: &[Country]) -> String {
    let mut table = Table::new();
    table
        .load_preset(UTF8_FULL)
        .set_content_arrangement(ContentArrangement::Dynamic);
    table.set_header(vec![
        "Name",
        "Capital",
        "Region",
        "Population",
        "Currency",
        "Rate",
        "Est. GDP",
    ]);

    for c in countries {
        let gdp_cell = if c.exchange_rate.is_some() {
            Cell::new(format_thousands(c.estimated_gdp))
        } else {
            Cell::new("-").fg(Color::DarkGrey)
        };
        table.add_row(vec![
            Cell::new(&c.name),
            Cell::new(c.capital.as_deref().unwrap_or("-")),
            Cell::new(c.region.as_deref().unwrap_or("-")),
            Cell::new(format_thousands(c.population as f64)).set_alignment(CellAlignment::Right),
            Cell::new(c.currency_code.as_deref().unwrap_or("-")),
            Cell::new(
                c.exchange_rate
                    .map(|r| format!("{r:.4}"))
                    .unwrap_or_else(|| "-".to_string()),
            ),
            gdp_cell.set_alignment(CellAlignment::Right),
        ]);
    }
    table.to_string()
}

pub fn render_status_table(status: &StatusSnapshot) -> String {
    let mut table = Table::new();
    table
        .load_preset(UTF8_FULL)
        .set_content_arrangement(ContentArrangement::Dynamic);
    table.set_header(vec!["Total Countries", "Last Refreshed"]);
    table.add_row(vec![
        status.total_countries.to_string(),
        status
            .last_refreshed_at
            .map(|ts| ts.to_rfc3339())
            .unwrap_or_else(|| "never".to_string()),
    ]);
    table.to_string()
}

pub fn render_refresh_table(summary: &RefreshSummary) -> String {
    let mut table = Table::new();
    table
        .load_preset(UTF8_FULL)
        .set_content_arrangement(ContentArrangement::Dynamic);
    table.set_header(vec!["Total", "Inserted", "Updated", "Skipped", "Refreshed At"]);
    let skipped = if summary.skipped > 0 {
        Cell::new(summary.skipped).fg(Color::Yellow)
    } else {
        Cell::new(summary.skipped)
    };
    table.add_row(vec![
        Cell::new(summary.total_countries),
        Cell::new(summary.inserted).fg(Color::Green),
        Cell::new(summary.updated),
        skipped,
        Cell::new(summary.last_refreshed_at.to_rfc3339()),
    ]);
    table.to_string()
}
