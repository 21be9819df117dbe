//! Summary PNG: headline counts plus the top countries by estimated GDP.
//!
//! Text is drawn from the 8x8 bitmap glyphs in `font8x8`, so rendering
//! needs no font files on disk.

use std::fs;
use std::path::Path;

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use font8x8::{UnicodeFonts, BASIC_FONTS, LATIN_FONTS};
use image::{ImageFormat, Rgb, RgbImage};

use crate::country::Country;
use crate::store::CountryStore;

pub const WIDTH: u32 = 800;
pub const HEIGHT: u32 = 450;
pub const TOP_N: usize = 5;

const MARGIN: u32 = 24;
const GLYPH: u32 = 8;
const NAME_MAX_CHARS: usize = 20;

const BACKGROUND: Rgb<u8> = Rgb([18, 24, 38]);
const HEADER: Rgb<u8> = Rgb([33, 52, 86]);
const TEXT: Rgb<u8> = Rgb([236, 240, 245]);
const MUTED: Rgb<u8> = Rgb([150, 164, 186]);
const ACCENT: Rgb<u8> = Rgb([244, 180, 62]);
const BAR: Rgb<u8> = Rgb([64, 140, 200]);

#[derive(Debug, Clone, PartialEq)]
pub struct SummaryView {
    pub total_countries: u64,
    pub last_refreshed_at: Option<DateTime<Utc>>,
    pub top: Vec<RankedCountry>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct RankedCountry {
    pub name: String,
    pub estimated_gdp: f64,
}

impl From<&Country> for RankedCountry {
    fn from(country: &Country) -> Self {
        Self {
            name: country.name.clone(),
            estimated_gdp: country.estimated_gdp,
        }
    }
}

impl SummaryView {
    pub fn from_store(store: &CountryStore) -> Result<Self> {
        let status = store.status()?;
        let top = store.top_by_gdp(TOP_N)?;
        Ok(Self {
            total_countries: status.total_countries,
            last_refreshed_at: status.last_refreshed_at,
            top: top.iter().map(RankedCountry::from).collect(),
        })
    }
}

pub fn render_summary(view: &SummaryView) -> RgbImage {
    let mut img = RgbImage::from_pixel(WIDTH, HEIGHT, BACKGROUND);
    fill_rect(&mut img, 0, 0, WIDTH, 72, HEADER);
    draw_text(&mut img, MARGIN, 24, "COUNTRY SUMMARY", 3, TEXT);

    draw_text(
        &mut img,
        MARGIN,
        96,
        &format!("Total countries: {}", view.total_countries),
        2,
        TEXT,
    );
    let refreshed = view
        .last_refreshed_at
        .map(|ts| ts.format("%Y-%m-%d %H:%M:%S UTC").to_string())
        .unwrap_or_else(|| "never".to_string());
    draw_text(
        &mut img,
        MARGIN,
        128,
        &format!("Last refreshed: {refreshed}"),
        2,
        MUTED,
    );

    draw_text(&mut img, MARGIN, 180, "Top 5 by estimated GDP", 2, ACCENT);
    if view.top.is_empty() {
        draw_text(&mut img, MARGIN, 220, "No data yet", 2, MUTED);
        return img;
    }

    let max_gdp = view
        .top
        .iter()
        .map(|c| c.estimated_gdp)
        .fold(0.0_f64, f64::max);
    let bar_span = WIDTH - 2 * MARGIN;
    for (idx, entry) in view.top.iter().take(TOP_N).enumerate() {
        let y = 220 + idx as u32 * 44;
        let label = format!("{}. {}", idx + 1, truncate_name(&entry.name));
        draw_text(&mut img, MARGIN, y, &label, 2, TEXT);

        let gdp = format_thousands(entry.estimated_gdp);
        let gdp_width = text_width(&gdp, 2);
        draw_text(
            &mut img,
            WIDTH.saturating_sub(MARGIN + gdp_width),
            y,
            &gdp,
            2,
            ACCENT,
        );

        if max_gdp > 0.0 {
            let ratio = (entry.estimated_gdp / max_gdp).clamp(0.0, 1.0);
            let bar = ((bar_span as f64) * ratio).round() as u32;
            fill_rect(&mut img, MARGIN, y + 22, bar.max(1), 4, BAR);
        }
    }
    img
}

/// Writes through a sibling temp file so readers never see a half-written PNG.
pub fn write_summary_image(view: &SummaryView, path: &Path) -> Result<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)
            .with_context(|| format!("failed creating image directory: {}", parent.display()))?;
    }
    let tmp = path.with_extension("png.tmp");
    render_summary(view)
        .save_with_format(&tmp, ImageFormat::Png)
        .with_context(|| format!("failed encoding summary image: {}", tmp.display()))?;
    fs::rename(&tmp, path)
        .with_context(|| format!("failed moving summary image into place: {}", path.display()))?;
    Ok(())
}

pub fn format_thousands(value: f64) -> String {
    if !value.is_finite() {
        return "-".to_string();
    }
    let rounded = value.round().abs() as u128;
    let digits = rounded.to_string();
    let mut out = String::with_capacity(digits.len() + digits.len() / 3 + 1);
    if value.round() < 0.0 {
        out.push('-');
    }
    for (idx, ch) in digits.chars().enumerate() {
        if idx > 0 && (digits.len() - idx) % 3 == 0 {
            out.push(',');
        }
        out.push(ch);
    }
    out
}

fn truncate_name(name: &str) -> String {
    if name.chars().count() <= NAME_MAX_CHARS {
        return name.to_string();
    }
    let mut short: String = name.chars().take(NAME_MAX_CHARS - 3).collect();
    short.push_str("...");
    short
}

fn text_width(text: &str, scale: u32) -> u32 {
    text.chars().count() as u32 * GLYPH * scale
}

fn glyph_for(ch: char) -> [u8; 8] {
    BASIC_FONTS
        .get(ch)
        .or_else(|| LATIN_FONTS.get(ch))
        .or_else(|| BASIC_FONTS.get('?'))
        .unwrap_or([0; 8])
}

fn draw_text(img: &mut RgbImage, x: u32, y: u32, text: &str, scale: u32, color: Rgb<u8>) {
    for (idx, ch) in text.chars().enumerate() {
        let origin_x = x + idx as u32 * GLYPH * scale;
        if origin_x >= img.width() {
            break;
        }
        for (row, bits) in glyph_for(ch).into_iter().enumerate() {
            for col in 0..GLYPH {
                if bits & (1u8 << col) == 0 {
                    continue;
                }
                fill_rect(
                    img,
                    origin_x + col * scale,
                    y + row as u32 * scale,
                    scale,
                    scale,
                    color,
                );
            }
        }
    }
}

fn fill_rect(img: &mut RgbImage, x: u32, y: u32, w: u32, h: u32, color: Rgb<u8>) {
    let x_end = x.saturating_add(w).min(img.width());
    let y_end = y.saturating_add(h).min(img.height());
    for py in y..y_end {
        for px in x..x_end {
            img.put_pixel(px, py, color);
        }
    }
}
