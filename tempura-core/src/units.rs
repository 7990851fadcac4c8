use serde::{Deserialize, Serialize};
use std::{fmt, str::FromStr};
use thiserror::Error;

/// Measurement system requested from the provider.
///
/// Temperatures come back in the requested system; wind speed is always
/// normalized to m/s before it reaches a snapshot.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
pub enum Units {
    #[serde(rename = "celsius", alias = "metric")]
    Metric,
    #[default]
    #[serde(rename = "fahrenheit", alias = "imperial")]
    Imperial,
}

impl Units {
    /// Value of the `units` query parameter.
    pub fn as_query(&self) -> &'static str {
        match self {
            Units::Metric => "metric",
            Units::Imperial => "imperial",
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Units::Metric => "celsius",
            Units::Imperial => "fahrenheit",
        }
    }

    pub fn temperature_symbol(&self) -> &'static str {
        match self {
            Units::Metric => "°C",
            Units::Imperial => "°F",
        }
    }

    pub fn toggled(&self) -> Self {
        match self {
            Units::Metric => Units::Imperial,
            Units::Imperial => Units::Metric,
        }
    }

    pub const fn all() -> &'static [Units] {
        &[Units::Metric, Units::Imperial]
    }
}

impl fmt::Display for Units {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("Unknown unit '{0}'. Expected one of: celsius, fahrenheit, mph, kmh, ms.")]
pub struct ParseUnitError(String);

impl FromStr for Units {
    type Err = ParseUnitError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "celsius" | "metric" | "c" => Ok(Units::Metric),
            "fahrenheit" | "imperial" | "f" => Ok(Units::Imperial),
            _ => Err(ParseUnitError(s.to_string())),
        }
    }
}

/// Display unit for wind speed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum WindSpeedUnit {
    #[default]
    Mph,
    Kmh,
    Ms,
}

impl WindSpeedUnit {
    pub fn as_str(&self) -> &'static str {
        match self {
            WindSpeedUnit::Mph => "mph",
            WindSpeedUnit::Kmh => "km/h",
            WindSpeedUnit::Ms => "m/s",
        }
    }

    pub const fn all() -> &'static [WindSpeedUnit] {
        &[WindSpeedUnit::Mph, WindSpeedUnit::Kmh, WindSpeedUnit::Ms]
    }
}

impl fmt::Display for WindSpeedUnit {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for WindSpeedUnit {
    type Err = ParseUnitError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "mph" => Ok(WindSpeedUnit::Mph),
            "kmh" | "km/h" | "kph" => Ok(WindSpeedUnit::Kmh),
            "ms" | "m/s" | "mps" => Ok(WindSpeedUnit::Ms),
            _ => Err(ParseUnitError(s.to_string())),
        }
    }
}

/// Clock style for times of day.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
pub enum TimeFormat {
    #[default]
    #[serde(rename = "12h")]
    TwelveHour,
    #[serde(rename = "24h")]
    TwentyFourHour,
}

impl TimeFormat {
    /// `chrono` format string for an hour and minute.
    pub fn pattern(&self) -> &'static str {
        match self {
            TimeFormat::TwelveHour => "%I:%M %p",
            TimeFormat::TwentyFourHour => "%H:%M",
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            TimeFormat::TwelveHour => "12h",
            TimeFormat::TwentyFourHour => "24h",
        }
    }

    pub const fn all() -> &'static [TimeFormat] {
        &[TimeFormat::TwelveHour, TimeFormat::TwentyFourHour]
    }
}

impl fmt::Display for TimeFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

const MPS_PER_MPH: f64 = 0.44704;

pub fn mph_to_mps(mph: f64) -> f64 {
    mph * MPS_PER_MPH
}

pub fn mps_to_mph(mps: f64) -> f64 {
    mps / MPS_PER_MPH
}

pub fn mps_to_kmh(mps: f64) -> f64 {
    mps * 3.6
}

/// Rounded temperature with its unit symbol, e.g. `21°C`.
pub fn format_temperature(value: f64, units: Units) -> String {
    format!("{:.0}{}", value, units.temperature_symbol())
}

pub fn format_wind_speed(mps: f64, unit: WindSpeedUnit) -> String {
    let value = match unit {
        WindSpeedUnit::Mph => mps_to_mph(mps),
        WindSpeedUnit::Kmh => mps_to_kmh(mps),
        WindSpeedUnit::Ms => mps,
    };
    format!("{value:.1} {unit}")
}

/// 8-point compass direction for a bearing in degrees.
pub fn degrees_to_cardinal(degrees: u16) -> &'static str {
    const DIRECTIONS: [&str; 8] = ["N", "NE", "E", "SE", "S", "SW", "W", "NW"];
    let index = (f64::from(degrees) / 45.0).round() as usize % DIRECTIONS.len();
    DIRECTIONS[index]
}
