//! Plain-text rendering for the one-shot commands.

use chrono::{DateTime, Local, Utc};
use std::fmt::Write;
use tempura_core::{
    ForecastEntry, Horizon, Location, SavedLocation, TimeFormat, Units, WeatherSnapshot,
    WindSpeedUnit,
    animation::still,
    units::{degrees_to_cardinal, format_temperature, format_wind_speed},
};

const ICON_GAP: &str = "  ";

pub fn current(
    snapshot: &WeatherSnapshot,
    wind_unit: WindSpeedUnit,
    time_format: TimeFormat,
) -> String {
    let units = snapshot.units;
    let mut details = vec![
        format!(
            "{} ({})",
            snapshot.condition.label(),
            snapshot.description
        ),
        format!(
            "{}, feels like {}",
            format_temperature(snapshot.temperature, units),
            format_temperature(snapshot.feels_like, units)
        ),
        format!(
            "Humidity {}%  Wind {}",
            snapshot.humidity_pct,
            wind(snapshot.wind_speed_mps, snapshot.wind_deg, wind_unit)
        ),
    ];
    if let Some(pressure) = snapshot.pressure_hpa {
        details.push(format!("Pressure {pressure} hPa"));
    }
    if let (Some(sunrise), Some(sunset)) = (snapshot.sunrise, snapshot.sunset) {
        details.push(format!(
            "Sunrise {}  Sunset {}",
            clock_time(sunrise, time_format),
            clock_time(sunset, time_format)
        ));
    }

    let mut out = format!("{}\n", snapshot.location.display_name());
    for line in beside(still(snapshot.condition), &details) {
        let _ = writeln!(out, "{}", line.trim_end());
    }
    let _ = writeln!(
        out,
        "Observed {}",
        snapshot
            .observed_at
            .with_timezone(&Local)
            .format("%Y-%m-%d %H:%M")
    );
    out
}

pub fn forecast(
    location: &Location,
    horizon: Horizon,
    entries: &[ForecastEntry],
    units: Units,
    wind_unit: WindSpeedUnit,
    time_format: TimeFormat,
) -> String {
    let mut out = format!("{horizon} forecast for {}\n", location.display_name());
    if entries.is_empty() {
        out.push_str("No forecast data available.\n");
        return out;
    }

    let _ = writeln!(
        out,
        "{:<12} {:<14} {:>6} {:>11} {:>6}  {}",
        "When", "Condition", "Temp", "Low/High", "Precip", "Wind"
    );
    for entry in entries {
        let when = entry.valid_at.with_timezone(&Local);
        let when = match horizon {
            Horizon::Hourly { .. } => {
                format!("{} {}", when.format("%a"), when.format(time_format.pattern()))
            }
            Horizon::Daily { .. } => when.format("%a %d %b").to_string(),
        };
        let range = match (entry.temp_min, entry.temp_max) {
            (Some(min), Some(max)) => format!(
                "{}/{}",
                format_temperature(min, units),
                format_temperature(max, units)
            ),
            _ => "-".to_string(),
        };
        let precip = entry
            .precipitation_chance
            .map(|p| format!("{:.0}%", p * 100.0))
            .unwrap_or_else(|| "-".to_string());

        let _ = writeln!(
            out,
            "{:<12} {:<14} {:>6} {:>11} {:>6}  {}",
            when,
            entry.condition.label(),
            format_temperature(entry.temperature, units),
            range,
            precip,
            wind(entry.wind_speed_mps, entry.wind_deg, wind_unit)
        );
    }
    out
}

pub fn locations(saved: &[SavedLocation]) -> String {
    if saved.is_empty() {
        return "No saved locations.\nHint: run `tempura locations add \"City, Country\"`.\n"
            .to_string();
    }

    let mut out = String::new();
    for entry in saved {
        let marker = if entry.is_default { "*" } else { " " };
        let _ = writeln!(
            out,
            "{marker} {:<32} {:>9.4} {:>10.4}",
            entry.location.display_name(),
            entry.location.lat(),
            entry.location.lon()
        );
    }
    out
}

pub fn wind(speed_mps: f64, deg: Option<u16>, unit: WindSpeedUnit) -> String {
    let speed = format_wind_speed(speed_mps, unit);
    match deg {
        Some(deg) => format!("{speed} {}", degrees_to_cardinal(deg)),
        None => speed,
    }
}

pub fn clock_time(at: DateTime<Utc>, format: TimeFormat) -> String {
    at.with_timezone(&Local).format(format.pattern()).to_string()
}

/// Icon lines on the left, text lines on the right.
pub fn beside(icon: &[&str], text: &[String]) -> Vec<String> {
    let width = icon.iter().map(|line| line.chars().count()).max().unwrap_or(0);
    let rows = icon.len().max(text.len());
    (0..rows)
        .map(|row| {
            let left = icon.get(row).copied().unwrap_or("");
            let pad = width - left.chars().count();
            let right = text.get(row).map(String::as_str).unwrap_or("");
            format!("{left}{}{ICON_GAP}{right}", " ".repeat(pad))
        })
        .collect()
}
