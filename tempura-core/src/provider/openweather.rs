use async_trait::async_trait;
use chrono::{DateTime, FixedOffset, NaiveDate, Offset, TimeZone, Utc};
use reqwest::{Client, header::RETRY_AFTER};
use serde::{Deserialize, de::DeserializeOwned};
use std::{collections::BTreeMap, time::Duration};

use crate::{
    error::{FetchFailure, parse_retry_after},
    model::{Condition, ForecastEntry, Horizon, Location, WeatherSnapshot},
    units::{Units, mph_to_mps},
};

use super::WeatherProvider;

pub const DEFAULT_BASE_URL: &str = "https://api.openweathermap.org";

const REQUEST_TIMEOUT_SECS: u64 = 10;
const USER_AGENT: &str = concat!("tempura/", env!("CARGO_PKG_VERSION"));

/// The free 3-hour forecast covers 5 days in at most 40 steps.
const MAX_FORECAST_STEPS: u32 = 40;
const FORECAST_STEP_HOURS: u32 = 3;

#[derive(Debug, Clone)]
pub struct OpenWeatherProvider {
    api_key: String,
    base_url: String,
    http: Client,
}

impl OpenWeatherProvider {
    pub fn new(api_key: String) -> Self {
        Self::with_base_url(api_key, DEFAULT_BASE_URL)
    }

    /// Point the provider at another host, e.g. a mock server.
    pub fn with_base_url(api_key: String, base_url: impl Into<String>) -> Self {
        let http = Client::builder()
            .timeout(Duration::from_secs(REQUEST_TIMEOUT_SECS))
            .user_agent(USER_AGENT)
            .build()
            .unwrap_or_else(|err| {
                tracing::warn!(%err, "Failed to build HTTP client, using defaults");
                Client::new()
            });

        Self {
            api_key,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            http,
        }
    }

    pub fn api_key(&self) -> &str {
        &self.api_key
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    async fn get_json<T: DeserializeOwned>(
        &self,
        path: &str,
        params: &[(&str, String)],
    ) -> Result<T, FetchFailure> {
        let url = format!("{}{}", self.base_url, path);

        let res = self
            .http
            .get(&url)
            .query(params)
            .query(&[("appid", self.api_key.as_str())])
            .send()
            .await
            .map_err(transport_failure)?;

        let status = res.status();

        if !status.is_success() {
            let retry_after = res
                .headers()
                .get(RETRY_AFTER)
                .and_then(|v| v.to_str().ok())
                .and_then(parse_retry_after);
            let body = res.text().await.unwrap_or_default();
            tracing::debug!(%status, path, "OpenWeather request failed");

            return Err(FetchFailure::Status {
                status: status.as_u16(),
                retry_after,
                body: truncate_body(&body),
            });
        }

        let body = res.text().await.map_err(transport_failure)?;

        serde_json::from_str(&body).map_err(|err| FetchFailure::Decode {
            status: status.as_u16(),
            detail: format!("{err} in {}", truncate_body(&body)),
        })
    }

    async fn fetch_three_hourly(
        &self,
        location: &Location,
        units: Units,
        steps: u32,
    ) -> Result<OwForecastResponse, FetchFailure> {
        let mut params = location_params(location, units);
        params.push(("cnt", steps.clamp(1, MAX_FORECAST_STEPS).to_string()));
        self.get_json("/data/2.5/forecast", &params).await
    }

    async fn fetch_daily(
        &self,
        location: &Location,
        units: Units,
        days: u32,
    ) -> Result<Vec<ForecastEntry>, FetchFailure> {
        let mut params = location_params(location, units);
        params.push(("cnt", days.to_string()));

        match self
            .get_json::<OwDailyResponse>("/data/2.5/forecast/daily", &params)
            .await
        {
            Ok(parsed) => Ok(parsed
                .list
                .iter()
                .filter_map(|day| day.to_entry(units))
                .collect()),
            // The daily endpoint needs a paid plan; free keys get 401 here.
            Err(FetchFailure::Status { status, .. }) if status != 429 => {
                tracing::debug!(status, "Daily forecast unavailable, aggregating 3-hour data");
                let three_hourly = self
                    .fetch_three_hourly(location, units, MAX_FORECAST_STEPS)
                    .await?;
                Ok(aggregate_daily(&three_hourly, units, days))
            }
            Err(FetchFailure::Decode { detail, .. }) => {
                tracing::debug!(%detail, "Daily forecast unreadable, aggregating 3-hour data");
                let three_hourly = self
                    .fetch_three_hourly(location, units, MAX_FORECAST_STEPS)
                    .await?;
                Ok(aggregate_daily(&three_hourly, units, days))
            }
            Err(other) => Err(other),
        }
    }
}

#[derive(Debug, Deserialize)]
struct OwMain {
    temp: f64,
    feels_like: f64,
    humidity: u8,
    #[serde(default)]
    pressure: Option<u32>,
}

#[derive(Debug, Deserialize)]
struct OwWeather {
    id: u16,
    description: String,
    #[serde(default)]
    icon: String,
}

#[derive(Debug, Deserialize)]
struct OwWind {
    speed: f64,
    #[serde(default)]
    deg: Option<f64>,
}

#[derive(Debug, Deserialize)]
struct OwSys {
    #[serde(default)]
    sunrise: Option<i64>,
    #[serde(default)]
    sunset: Option<i64>,
}

#[derive(Debug, Deserialize)]
struct OwCurrentResponse {
    dt: i64,
    main: OwMain,
    weather: Vec<OwWeather>,
    wind: OwWind,
    #[serde(default)]
    sys: Option<OwSys>,
}

#[derive(Debug, Deserialize)]
struct OwCity {
    /// Shift from UTC in seconds.
    #[serde(default)]
    timezone: Option<i32>,
}

#[derive(Debug, Deserialize)]
struct OwForecastEntry {
    dt: i64,
    main: OwMain,
    weather: Vec<OwWeather>,
    wind: OwWind,
    #[serde(default)]
    pop: Option<f64>,
}

#[derive(Debug, Deserialize)]
struct OwForecastResponse {
    #[serde(default)]
    city: Option<OwCity>,
    list: Vec<OwForecastEntry>,
}

#[derive(Debug, Deserialize)]
struct OwDailyTemp {
    day: f64,
    min: f64,
    max: f64,
}

#[derive(Debug, Deserialize)]
struct OwDailyFeelsLike {
    day: f64,
}

#[derive(Debug, Deserialize)]
struct OwDailyEntry {
    dt: i64,
    temp: OwDailyTemp,
    feels_like: OwDailyFeelsLike,
    humidity: u8,
    speed: f64,
    #[serde(default)]
    deg: Option<f64>,
    weather: Vec<OwWeather>,
    #[serde(default)]
    pop: Option<f64>,
}

#[derive(Debug, Deserialize)]
struct OwDailyResponse {
    list: Vec<OwDailyEntry>,
}

#[derive(Debug, Deserialize)]
struct OwGeocodeResult {
    name: String,
    lat: f64,
    lon: f64,
    #[serde(default)]
    country: Option<String>,
    #[serde(default)]
    state: Option<String>,
}

impl OwCurrentResponse {
    fn into_snapshot(self, location: Location, units: Units) -> WeatherSnapshot {
        let (condition, description) = primary_condition(&self.weather);
        let sys = self.sys.as_ref();

        WeatherSnapshot {
            location,
            units,
            condition,
            description,
            temperature: self.main.temp,
            feels_like: self.main.feels_like,
            humidity_pct: self.main.humidity,
            pressure_hpa: self.main.pressure,
            wind_speed_mps: wind_to_mps(self.wind.speed, units),
            wind_deg: self.wind.deg.map(bearing),
            sunrise: sys.and_then(|s| s.sunrise).and_then(unix_to_utc),
            sunset: sys.and_then(|s| s.sunset).and_then(unix_to_utc),
            observed_at: unix_to_utc(self.dt).unwrap_or_else(Utc::now),
        }
    }
}

impl OwForecastEntry {
    fn to_entry(&self, units: Units) -> Option<ForecastEntry> {
        let (condition, description) = primary_condition(&self.weather);

        Some(ForecastEntry {
            valid_at: unix_to_utc(self.dt)?,
            condition,
            description,
            temperature: self.main.temp,
            feels_like: self.main.feels_like,
            temp_min: None,
            temp_max: None,
            humidity_pct: self.main.humidity,
            wind_speed_mps: wind_to_mps(self.wind.speed, units),
            wind_deg: self.wind.deg.map(bearing),
            precipitation_chance: self.pop,
        })
    }
}

impl OwDailyEntry {
    fn to_entry(&self, units: Units) -> Option<ForecastEntry> {
        let (condition, description) = primary_condition(&self.weather);

        Some(ForecastEntry {
            valid_at: unix_to_utc(self.dt)?,
            condition,
            description,
            temperature: self.temp.day,
            feels_like: self.feels_like.day,
            temp_min: Some(self.temp.min),
            temp_max: Some(self.temp.max),
            humidity_pct: self.humidity,
            wind_speed_mps: wind_to_mps(self.speed, units),
            wind_deg: self.deg.map(bearing),
            precipitation_chance: self.pop,
        })
    }
}

#[async_trait]
impl WeatherProvider for OpenWeatherProvider {
    async fn current(
        &self,
        location: &Location,
        units: Units,
    ) -> Result<WeatherSnapshot, FetchFailure> {
        let params = location_params(location, units);
        let parsed: OwCurrentResponse = self.get_json("/data/2.5/weather", &params).await?;
        Ok(parsed.into_snapshot(location.clone(), units))
    }

    async fn forecast(
        &self,
        location: &Location,
        units: Units,
        horizon: Horizon,
    ) -> Result<Vec<ForecastEntry>, FetchFailure> {
        match horizon {
            Horizon::Hourly { hours } => {
                let steps = hours.div_ceil(FORECAST_STEP_HOURS);
                let parsed = self.fetch_three_hourly(location, units, steps).await?;
                Ok(parsed
                    .list
                    .iter()
                    .filter_map(|entry| entry.to_entry(units))
                    .collect())
            }
            Horizon::Daily { days } => self.fetch_daily(location, units, days).await,
        }
    }

    async fn geocode(&self, query: &str, limit: u8) -> Result<Vec<Location>, FetchFailure> {
        let params = [("q", query.to_string()), ("limit", limit.to_string())];
        let parsed: Vec<OwGeocodeResult> = self.get_json("/geo/1.0/direct", &params).await?;

        Ok(parsed
            .into_iter()
            .map(|r| Location::new(r.name, r.country, r.lat, r.lon).with_state(r.state))
            .collect())
    }
}

/// Collapse 3-hour steps into per-day summaries in the city's local time.
fn aggregate_daily(
    response: &OwForecastResponse,
    units: Units,
    days: u32,
) -> Vec<ForecastEntry> {
    let offset = response
        .city
        .as_ref()
        .and_then(|c| c.timezone)
        .and_then(FixedOffset::east_opt)
        .unwrap_or_else(|| Utc.fix());

    let mut by_date: BTreeMap<NaiveDate, Vec<ForecastEntry>> = BTreeMap::new();
    for entry in response.list.iter().filter_map(|e| e.to_entry(units)) {
        let date = entry.valid_at.with_timezone(&offset).date_naive();
        by_date.entry(date).or_default().push(entry);
    }

    by_date
        .into_iter()
        .take(days as usize)
        .filter_map(|(date, entries)| summarize_day(date, offset, &entries))
        .collect()
}

fn summarize_day(
    date: NaiveDate,
    offset: FixedOffset,
    entries: &[ForecastEntry],
) -> Option<ForecastEntry> {
    let first = entries.first()?;
    let count = entries.len() as f64;

    let temperature = entries.iter().map(|e| e.temperature).sum::<f64>() / count;
    let feels_like = entries.iter().map(|e| e.feels_like).sum::<f64>() / count;
    let temp_min = entries.iter().map(|e| e.temperature).fold(f64::INFINITY, f64::min);
    let temp_max = entries.iter().map(|e| e.temperature).fold(f64::NEG_INFINITY, f64::max);
    let precipitation_chance = entries
        .iter()
        .filter_map(|e| e.precipitation_chance)
        .reduce(f64::max);

    let valid_at = date
        .and_hms_opt(0, 0, 0)
        .and_then(|midnight| offset.from_local_datetime(&midnight).single())
        .map(|local| local.with_timezone(&Utc))
        .unwrap_or(first.valid_at);

    Some(ForecastEntry {
        valid_at,
        condition: first.condition,
        description: first.description.clone(),
        temperature,
        feels_like,
        temp_min: Some(temp_min),
        temp_max: Some(temp_max),
        humidity_pct: first.humidity_pct,
        wind_speed_mps: first.wind_speed_mps,
        wind_deg: first.wind_deg,
        precipitation_chance,
    })
}

fn location_params(location: &Location, units: Units) -> Vec<(&'static str, String)> {
    vec![
        ("lat", location.lat().to_string()),
        ("lon", location.lon().to_string()),
        ("units", units.as_query().to_string()),
    ]
}

fn primary_condition(weather: &[OwWeather]) -> (Condition, String) {
    weather
        .first()
        .map(|w| (Condition::from_openweather(w.id, &w.icon), w.description.clone()))
        .unwrap_or_else(|| (Condition::PartlyCloudy, "Unknown".to_string()))
}

/// Imperial responses report wind in mph; snapshots always carry m/s.
fn wind_to_mps(speed: f64, units: Units) -> f64 {
    match units {
        Units::Metric => speed,
        Units::Imperial => mph_to_mps(speed),
    }
}

fn bearing(deg: f64) -> u16 {
    (deg.rem_euclid(360.0).round() as u16) % 360
}

fn transport_failure(err: reqwest::Error) -> FetchFailure {
    let timed_out = err.is_timeout();
    // The URL carries the API key; keep it out of error text.
    FetchFailure::Transport {
        timed_out,
        detail: err.without_url().to_string(),
    }
}

fn unix_to_utc(ts: i64) -> Option<DateTime<Utc>> {
    DateTime::from_timestamp(ts, 0)
}

fn truncate_body(body: &str) -> String {
    const MAX: usize = 200;
    match body.char_indices().nth(MAX) {
        Some((idx, _)) => format!("{}...", &body[..idx]),
        None => body.to_string(),
    }
}
