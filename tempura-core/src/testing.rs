//! In-memory provider and fixtures shared by unit tests.

use async_trait::async_trait;
use chrono::{DateTime, Duration as ChronoDuration, TimeZone, Utc};
use parking_lot::Mutex;
use std::{
    collections::{HashMap, VecDeque},
    sync::atomic::{AtomicUsize, Ordering},
    time::Duration,
};

use crate::{
    error::FetchFailure,
    model::{Condition, ForecastEntry, Horizon, Location, WeatherSnapshot},
    provider::WeatherProvider,
    units::Units,
};

type CurrentResponse = Result<WeatherSnapshot, FetchFailure>;

/// Replays scripted `current` responses in order; the last one repeats forever.
#[derive(Debug, Default)]
pub(crate) struct ScriptedProvider {
    current: Mutex<VecDeque<CurrentResponse>>,
    places: HashMap<String, Vec<Location>>,
    delay: Duration,
    current_calls: AtomicUsize,
    forecast_calls: AtomicUsize,
    geocode_calls: AtomicUsize,
}

impl ScriptedProvider {
    pub(crate) fn always(snapshot: WeatherSnapshot) -> Self {
        Self::sequence(vec![Ok(snapshot)])
    }

    pub(crate) fn sequence(responses: Vec<CurrentResponse>) -> Self {
        Self {
            current: Mutex::new(responses.into()),
            ..Self::default()
        }
    }

    pub(crate) fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    pub(crate) fn with_places(mut self, query: &str, places: Vec<Location>) -> Self {
        self.places.insert(query.to_lowercase(), places);
        self
    }

    /// Replace whatever is scripted with a single repeating response.
    pub(crate) fn set(&self, response: CurrentResponse) {
        let mut current = self.current.lock();
        current.clear();
        current.push_back(response);
    }

    pub(crate) fn current_calls(&self) -> usize {
        self.current_calls.load(Ordering::SeqCst)
    }

    pub(crate) fn forecast_calls(&self) -> usize {
        self.forecast_calls.load(Ordering::SeqCst)
    }

    pub(crate) fn geocode_calls(&self) -> usize {
        self.geocode_calls.load(Ordering::SeqCst)
    }

    async fn pause(&self) {
        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }
    }
}

#[async_trait]
impl WeatherProvider for ScriptedProvider {
    async fn current(
        &self,
        location: &Location,
        units: Units,
    ) -> Result<WeatherSnapshot, FetchFailure> {
        self.current_calls.fetch_add(1, Ordering::SeqCst);
        self.pause().await;

        let next = {
            let mut current = self.current.lock();
            if current.len() > 1 {
                current.pop_front()
            } else {
                current.front().cloned()
            }
        };

        next.unwrap_or_else(|| Err(FetchFailure::status(500)))
            .map(|mut snapshot| {
                snapshot.location = location.clone();
                snapshot.units = units;
                snapshot
            })
    }

    async fn forecast(
        &self,
        _location: &Location,
        _units: Units,
        horizon: Horizon,
    ) -> Result<Vec<ForecastEntry>, FetchFailure> {
        self.forecast_calls.fetch_add(1, Ordering::SeqCst);
        self.pause().await;

        let steps = match horizon {
            Horizon::Hourly { hours } => hours.div_ceil(3),
            Horizon::Daily { days } => days,
        };
        // Reverse order plus one duplicate, so callers must normalize.
        let mut entries: Vec<ForecastEntry> = (0..steps)
            .rev()
            .map(|step| sample_entry(i64::from(step) * 3))
            .collect();
        if let Some(first) = entries.first().cloned() {
            entries.push(first);
        }
        Ok(entries)
    }

    async fn geocode(&self, query: &str, limit: u8) -> Result<Vec<Location>, FetchFailure> {
        self.geocode_calls.fetch_add(1, Ordering::SeqCst);
        self.pause().await;

        let mut places = self
            .places
            .get(&query.to_lowercase())
            .cloned()
            .unwrap_or_default();
        places.truncate(usize::from(limit));
        Ok(places)
    }
}

pub(crate) fn san_francisco() -> Location {
    Location::new("San Francisco", Some("US".into()), 37.7749, -122.4194)
        .with_state(Some("California".into()))
}

fn base_time() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2026, 10, 18, 12, 0, 0)
        .single()
        .unwrap_or_default()
}

/// Overcast snapshot observed `minutes` after a fixed base time.
pub(crate) fn sample_snapshot(minutes: i64) -> WeatherSnapshot {
    WeatherSnapshot {
        location: san_francisco(),
        units: Units::Metric,
        condition: Condition::Cloudy,
        description: "overcast clouds".into(),
        temperature: 16.0,
        feels_like: 15.2,
        humidity_pct: 72,
        pressure_hpa: Some(1014),
        wind_speed_mps: 4.1,
        wind_deg: Some(250),
        sunrise: None,
        sunset: None,
        observed_at: base_time() + ChronoDuration::minutes(minutes),
    }
}

pub(crate) fn sample_snapshot_with(condition: Condition, minutes: i64) -> WeatherSnapshot {
    WeatherSnapshot {
        condition,
        ..sample_snapshot(minutes)
    }
}

pub(crate) fn sample_entry(hours: i64) -> ForecastEntry {
    ForecastEntry {
        valid_at: base_time() + ChronoDuration::hours(hours),
        condition: Condition::Rain,
        description: "light rain".into(),
        temperature: 14.0,
        feels_like: 13.1,
        temp_min: None,
        temp_max: None,
        humidity_pct: 80,
        wind_speed_mps: 5.0,
        wind_deg: Some(200),
        precipitation_chance: Some(0.4),
    }
}
