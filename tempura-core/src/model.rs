use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::units::Units;

/// A place resolved by geocoding.
///
/// Coordinates never change once resolved, so the fields are only readable.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Location {
    name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    country: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    state: Option<String>,
    lat: f64,
    lon: f64,
}

impl Location {
    pub fn new(name: impl Into<String>, country: Option<String>, lat: f64, lon: f64) -> Self {
        Self {
            name: name.into(),
            country,
            state: None,
            lat,
            lon,
        }
    }

    pub fn with_state(mut self, state: Option<String>) -> Self {
        self.state = state;
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn country(&self) -> Option<&str> {
        self.country.as_deref()
    }

    pub fn state(&self) -> Option<&str> {
        self.state.as_deref()
    }

    pub fn lat(&self) -> f64 {
        self.lat
    }

    pub fn lon(&self) -> f64 {
        self.lon
    }

    /// "Name, State, Country" with the missing parts left out.
    pub fn display_name(&self) -> String {
        [Some(self.name.as_str()), self.state(), self.country()]
            .into_iter()
            .flatten()
            .filter(|part| !part.is_empty())
            .collect::<Vec<_>>()
            .join(", ")
    }
}

impl fmt::Display for Location {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.display_name())
    }
}

/// Weather condition, independent of any provider's codes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Condition {
    ClearDay,
    ClearNight,
    PartlyCloudy,
    Cloudy,
    Rain,
    Thunderstorm,
    Snow,
    Mist,
}

impl Condition {
    /// Map an OpenWeatherMap condition id plus its icon code (`01d`, `10n`, ...).
    /// See: https://openweathermap.org/weather-conditions
    pub fn from_openweather(id: u16, icon: &str) -> Self {
        match id {
            200..=299 => Self::Thunderstorm,
            511 => Self::Snow, // freezing rain
            300..=399 | 500..=599 => Self::Rain,
            600..=699 => Self::Snow,
            700..=799 => Self::Mist,
            800 if icon.ends_with('n') => Self::ClearNight,
            800 => Self::ClearDay,
            801 | 802 => Self::PartlyCloudy,
            803 | 804 => Self::Cloudy,
            _ => Self::PartlyCloudy,
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            Self::ClearDay => "Clear",
            Self::ClearNight => "Clear Night",
            Self::PartlyCloudy => "Partly Cloudy",
            Self::Cloudy => "Cloudy",
            Self::Rain => "Rain",
            Self::Thunderstorm => "Thunderstorm",
            Self::Snow => "Snow",
            Self::Mist => "Mist",
        }
    }

    /// Terminal color name for the icon.
    pub fn color(&self) -> &'static str {
        match self {
            Self::ClearDay => "yellow",
            Self::ClearNight => "bright_blue",
            Self::PartlyCloudy => "yellow",
            Self::Cloudy => "white",
            Self::Rain => "bright_blue",
            Self::Thunderstorm => "bright_yellow",
            Self::Snow => "bright_cyan",
            Self::Mist => "bright_black",
        }
    }

    pub const fn all() -> &'static [Condition] {
        &[
            Self::ClearDay,
            Self::ClearNight,
            Self::PartlyCloudy,
            Self::Cloudy,
            Self::Rain,
            Self::Thunderstorm,
            Self::Snow,
            Self::Mist,
        ]
    }
}

/// One observation of current conditions.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WeatherSnapshot {
    pub location: Location,
    pub units: Units,
    pub condition: Condition,
    pub description: String,
    pub temperature: f64,
    pub feels_like: f64,
    pub humidity_pct: u8,
    pub pressure_hpa: Option<u32>,
    pub wind_speed_mps: f64,
    pub wind_deg: Option<u16>,
    pub sunrise: Option<DateTime<Utc>>,
    pub sunset: Option<DateTime<Utc>>,
    pub observed_at: DateTime<Utc>,
}

/// One hourly or daily forecast step.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ForecastEntry {
    pub valid_at: DateTime<Utc>,
    pub condition: Condition,
    pub description: String,
    pub temperature: f64,
    pub feels_like: f64,
    pub temp_min: Option<f64>,
    pub temp_max: Option<f64>,
    pub humidity_pct: u8,
    pub wind_speed_mps: f64,
    pub wind_deg: Option<u16>,
    /// Probability of precipitation, 0.0..=1.0.
    pub precipitation_chance: Option<f64>,
}

/// How far ahead a forecast reaches.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Horizon {
    Hourly { hours: u32 },
    Daily { days: u32 },
}

impl Horizon {
    pub const MAX_HOURS: u32 = 120;
    pub const MAX_DAYS: u32 = 7;

    pub fn hourly(hours: u32) -> Self {
        Self::Hourly {
            hours: hours.clamp(1, Self::MAX_HOURS),
        }
    }

    pub fn daily(days: u32) -> Self {
        Self::Daily {
            days: days.clamp(1, Self::MAX_DAYS),
        }
    }
}

impl Default for Horizon {
    fn default() -> Self {
        Self::daily(5)
    }
}

impl fmt::Display for Horizon {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Horizon::Hourly { hours } => write!(f, "{hours}-hour"),
            Horizon::Daily { days } => write!(f, "{days}-day"),
        }
    }
}

/// Sort ascending by validity time and drop repeated timestamps.
pub fn normalize_forecast(mut entries: Vec<ForecastEntry>) -> Vec<ForecastEntry> {
    entries.sort_by_key(|entry| entry.valid_at);
    entries.dedup_by_key(|entry| entry.valid_at);
    entries
}
