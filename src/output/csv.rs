use anyhow::Result;

use crate::country::Country;

pub fn countries_to_csv(countries: &[Country]) -> Result<String> {
    let mut writer = csv::Writer::from_writer(vec![]);
    writer.write_record([
        "id",
        "name",
        "capital",
        "region",
        "population",
        "currency_code",
        "exchange_rate",
        "estimated_gdp",
        "flag_url",
        "last_refreshed_at",
    ])?;
    for country in countries {
        writer.write_record([
            country.id.to_string(),
            country.name.clone(),
            country.capital.clone().unwrap_or_default(),
            country.region.clone().unwrap_or_default(),
            country.population.to_string(),
            country.currency_code.clone().unwrap_or_default(),
            country
                .exchange_rate
                .map(|r| r.to_string())
                .unwrap_or_default(),
            format!("{:.2}", country.estimated_gdp),
            country.flag_url.clone().unwrap_or_default(),
            country.last_refreshed_at.to_rfc3339(),
        ])?;
    }
    let data = writer.into_inner()?;
    Ok(String::from_utf8_lossy(&data).to_string())
}
