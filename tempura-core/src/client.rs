//! Cache-aware front door to a [`WeatherProvider`].
//!
//! Every public method returns `Result<_, AppError>`: transport problems,
//! HTTP failures and timeouts are all classified into values here and never
//! escape as anything else.

use parking_lot::Mutex;
use std::{future::Future, sync::Arc, time::Duration};

use crate::{
    cache::ResponseCache,
    clock::{Clock, SystemClock},
    error::{AppError, FetchFailure, classify},
    model::{ForecastEntry, Horizon, Location, WeatherSnapshot, normalize_forecast},
    provider::WeatherProvider,
    units::Units,
};

/// How long a weather response may be reused.
pub const DEFAULT_TTL: Duration = Duration::from_secs(10 * 60);
/// Geocoding results barely change; keep them for a day.
pub const GEOCODE_TTL: Duration = Duration::from_secs(24 * 60 * 60);
/// Upper bound for one provider round-trip, on top of the HTTP client's own timeout.
pub const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(10);

const GEOCODE_LIMIT: u8 = 5;
/// Coordinates are keyed at 4 decimal places (about 11 m).
const COORD_SCALE: f64 = 10_000.0;

/// Which remote resource a cache entry came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Endpoint {
    Current,
    Forecast(Horizon),
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum CacheKey {
    Weather {
        endpoint: Endpoint,
        lat: i64,
        lon: i64,
        units: Units,
    },
    Geocode(String),
}

impl CacheKey {
    pub fn weather(endpoint: Endpoint, location: &Location, units: Units) -> Self {
        Self::Weather {
            endpoint,
            lat: quantize(location.lat()),
            lon: quantize(location.lon()),
            units,
        }
    }

    pub fn current(location: &Location, units: Units) -> Self {
        Self::weather(Endpoint::Current, location, units)
    }

    pub fn forecast(location: &Location, units: Units, horizon: Horizon) -> Self {
        Self::weather(Endpoint::Forecast(horizon), location, units)
    }

    pub fn geocode(query: &str) -> Self {
        Self::Geocode(query.trim().to_lowercase())
    }
}

fn quantize(coordinate: f64) -> i64 {
    (coordinate * COORD_SCALE).round() as i64
}

#[derive(Debug, Clone)]
enum CachedResponse {
    Current(Arc<WeatherSnapshot>),
    Forecast(Arc<Vec<ForecastEntry>>),
    Places(Arc<Vec<Location>>),
}

#[derive(Debug)]
pub struct WeatherClient<P, C: Clock = SystemClock> {
    provider: P,
    cache: Mutex<ResponseCache<CacheKey, CachedResponse, C>>,
    ttl: Duration,
    timeout: Duration,
}

impl<P: WeatherProvider> WeatherClient<P, SystemClock> {
    pub fn new(provider: P) -> Self {
        Self::with_clock(provider, SystemClock)
    }
}

impl<P: WeatherProvider, C: Clock> WeatherClient<P, C> {
    pub fn with_clock(provider: P, clock: C) -> Self {
        Self {
            provider,
            cache: Mutex::new(ResponseCache::with_clock(clock)),
            ttl: DEFAULT_TTL,
            timeout: DEFAULT_REQUEST_TIMEOUT,
        }
    }

    pub fn with_ttl(mut self, ttl: Duration) -> Self {
        self.ttl = ttl;
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn provider(&self) -> &P {
        &self.provider
    }

    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    /// Current conditions, served from cache while fresh.
    #[tracing::instrument(skip(self), fields(location = %location.name()))]
    pub async fn fetch_current(
        &self,
        location: &Location,
        units: Units,
    ) -> Result<Arc<WeatherSnapshot>, AppError> {
        let key = CacheKey::current(location, units);
        if let Some(CachedResponse::Current(snapshot)) = self.cached(&key) {
            return Ok(snapshot);
        }

        let snapshot = Arc::new(self.call(self.provider.current(location, units)).await?);
        self.store(key, CachedResponse::Current(Arc::clone(&snapshot)), self.ttl);
        Ok(snapshot)
    }

    /// Forecast steps ascending by time, without duplicate timestamps.
    #[tracing::instrument(skip(self), fields(location = %location.name()))]
    pub async fn fetch_forecast(
        &self,
        location: &Location,
        units: Units,
        horizon: Horizon,
    ) -> Result<Arc<Vec<ForecastEntry>>, AppError> {
        let key = CacheKey::forecast(location, units, horizon);
        if let Some(CachedResponse::Forecast(entries)) = self.cached(&key) {
            return Ok(entries);
        }

        let entries = self
            .call(self.provider.forecast(location, units, horizon))
            .await?;
        let entries = Arc::new(normalize_forecast(entries));
        self.store(key, CachedResponse::Forecast(Arc::clone(&entries)), self.ttl);
        Ok(entries)
    }

    /// Places matching `query`, best match first. Never empty on success.
    #[tracing::instrument(skip(self))]
    pub async fn geocode(&self, query: &str) -> Result<Arc<Vec<Location>>, AppError> {
        let key = CacheKey::geocode(query);
        if let Some(CachedResponse::Places(places)) = self.cached(&key) {
            return Ok(places);
        }

        let normalized = normalize_query(query);
        let mut places = self
            .call(self.provider.geocode(&normalized, GEOCODE_LIMIT))
            .await?;

        if places.is_empty() {
            if let Some((city, _)) = query.split_once(',') {
                tracing::debug!(city = city.trim(), "No match, retrying without region");
                places = self
                    .call(self.provider.geocode(city.trim(), GEOCODE_LIMIT))
                    .await?;
            }
        }

        if places.is_empty() {
            return Err(AppError::LocationNotFound);
        }

        let places = Arc::new(places);
        self.store(key, CachedResponse::Places(Arc::clone(&places)), GEOCODE_TTL);
        Ok(places)
    }

    /// Best geocoding match for `query`.
    pub async fn resolve(&self, query: &str) -> Result<Location, AppError> {
        let places = self.geocode(query).await?;
        places.first().cloned().ok_or(AppError::LocationNotFound)
    }

    /// Drop cached current conditions so the next fetch is a live round-trip.
    pub fn invalidate_current(&self, location: &Location, units: Units) {
        self.cache
            .lock()
            .invalidate(&CacheKey::current(location, units));
    }

    pub fn invalidate_forecast(&self, location: &Location, units: Units, horizon: Horizon) {
        self.cache
            .lock()
            .invalidate(&CacheKey::forecast(location, units, horizon));
    }

    pub fn invalidate_all(&self) {
        self.cache.lock().invalidate_all();
    }

    fn cached(&self, key: &CacheKey) -> Option<CachedResponse> {
        self.cache.lock().get(key)
    }

    fn store(&self, key: CacheKey, response: CachedResponse, ttl: Duration) {
        self.cache.lock().put(key, response, ttl);
    }

    /// Run one provider call under the request timeout and classify failures.
    async fn call<T>(
        &self,
        request: impl Future<Output = Result<T, FetchFailure>>,
    ) -> Result<T, AppError> {
        let outcome = match tokio::time::timeout(self.timeout, request).await {
            Ok(outcome) => outcome,
            Err(_) => Err(FetchFailure::timed_out(format!(
                "no response within {:?}",
                self.timeout
            ))),
        };

        outcome.map_err(|failure| {
            let err = classify(&failure);
            tracing::warn!(?failure, %err, "Weather request failed");
            err
        })
    }
}

/// Rewrite common country spellings into the ISO codes the geocoder expects.
fn normalize_query(query: &str) -> String {
    const COUNTRY_ALIASES: [(&str, &str); 4] = [
        ("United Kingdom", "GB"),
        ("United States", "US"),
        ("USA", "US"),
        ("UK", "GB"),
    ];

    let mut parts = query.trim().split(',');
    let city = parts.next().unwrap_or_default().to_string();
    parts.fold(city, |mut normalized, part| {
        let region = part.trim();
        let code = COUNTRY_ALIASES
            .iter()
            .find(|(alias, _)| alias.eq_ignore_ascii_case(region))
            .map(|(_, code)| *code);

        normalized.push(',');
        match code {
            Some(code) => {
                normalized.push_str(&part[..part.len() - part.trim_start().len()]);
                normalized.push_str(code);
            }
            None => normalized.push_str(part),
        }
        normalized
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::ManualClock;
    use crate::model::Condition;
    use crate::provider::openweather::OpenWeatherProvider;
    use crate::testing::{ScriptedProvider, sample_snapshot, san_francisco};
    use serde_json::json;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn client(provider: ScriptedProvider) -> (WeatherClient<ScriptedProvider, ManualClock>, ManualClock) {
        let clock = ManualClock::new();
        (WeatherClient::with_clock(provider, clock.clone()), clock)
    }

    #[test]
    fn cache_key_absorbs_coordinate_noise() {
        let a = Location::new("A", None, 37.774_900_01, -122.419_399_99);
        let b = Location::new("B", None, 37.7749, -122.4194);
        let c = Location::new("C", None, 37.7751, -122.4194);

        assert_eq!(CacheKey::current(&a, Units::Metric), CacheKey::current(&b, Units::Metric));
        assert_ne!(CacheKey::current(&b, Units::Metric), CacheKey::current(&c, Units::Metric));
        assert_ne!(CacheKey::current(&b, Units::Metric), CacheKey::current(&b, Units::Imperial));
        assert_ne!(
            CacheKey::current(&b, Units::Metric),
            CacheKey::forecast(&b, Units::Metric, Horizon::daily(5))
        );
    }

    #[test]
    fn country_aliases_are_normalized() {
        assert_eq!(normalize_query("London, UK"), "London, GB");
        assert_eq!(normalize_query("Austin,USA"), "Austin,US");
        assert_eq!(normalize_query("Boston, United States"), "Boston, US");
        assert_eq!(normalize_query(" Paris, FR "), "Paris, FR");
        assert_eq!(normalize_query("Ukiah"), "Ukiah");
        assert_eq!(normalize_query("Leeds, UK, England"), "Leeds, GB, England");
        assert_eq!(normalize_query("london, uk"), "london, GB");
        assert_eq!(normalize_query("UK, usa"), "UK, US");
    }

    #[tokio::test]
    async fn second_fetch_within_ttl_is_served_from_cache() {
        let provider = ScriptedProvider::always(sample_snapshot(0));
        let (client, clock) = client(provider);
        let sf = san_francisco();

        let first = client.fetch_current(&sf, Units::Metric).await.unwrap();
        clock.advance(Duration::from_secs(2 * 60));
        let second = client.fetch_current(&sf, Units::Metric).await.unwrap();

        assert_eq!(client.provider().current_calls(), 1);
        assert!(Arc::ptr_eq(&first, &second));
    }

    #[tokio::test]
    async fn fetch_after_ttl_goes_remote_again() {
        let (client, clock) = client(ScriptedProvider::always(sample_snapshot(0)));
        let sf = san_francisco();

        client.fetch_current(&sf, Units::Metric).await.unwrap();
        clock.advance(DEFAULT_TTL);
        client.fetch_current(&sf, Units::Metric).await.unwrap();

        assert_eq!(client.provider().current_calls(), 2);
    }

    #[tokio::test]
    async fn units_are_part_of_the_key() {
        let (client, _clock) = client(ScriptedProvider::always(sample_snapshot(0)));
        let sf = san_francisco();

        client.fetch_current(&sf, Units::Metric).await.unwrap();
        client.fetch_current(&sf, Units::Imperial).await.unwrap();

        assert_eq!(client.provider().current_calls(), 2);
    }

    #[tokio::test]
    async fn invalidation_forces_a_live_round_trip() {
        let (client, _clock) = client(ScriptedProvider::always(sample_snapshot(0)));
        let sf = san_francisco();

        client.fetch_current(&sf, Units::Metric).await.unwrap();
        client.invalidate_current(&sf, Units::Metric);
        client.fetch_current(&sf, Units::Metric).await.unwrap();

        assert_eq!(client.provider().current_calls(), 2);
    }

    #[tokio::test]
    async fn failures_are_classified_and_not_cached() {
        let provider = ScriptedProvider::sequence(vec![
            Err(FetchFailure::status(503)),
            Ok(sample_snapshot(0)),
        ]);
        let (client, _clock) = client(provider);
        let sf = san_francisco();

        let err = client.fetch_current(&sf, Units::Metric).await.unwrap_err();
        assert_eq!(err, AppError::ServerError { status: 503 });

        let snapshot = client.fetch_current(&sf, Units::Metric).await.unwrap();
        assert_eq!(snapshot.condition, Condition::Cloudy);
        assert_eq!(client.provider().current_calls(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn stuck_request_times_out_as_network_unavailable() {
        let provider = ScriptedProvider::always(sample_snapshot(0)).with_delay(Duration::from_secs(60));
        let (client, _clock) = client(provider);
        let client = client.with_timeout(Duration::from_secs(5));

        let err = client
            .fetch_current(&san_francisco(), Units::Metric)
            .await
            .unwrap_err();

        assert_eq!(err, AppError::NetworkUnavailable);
    }

    #[tokio::test]
    async fn forecast_is_normalized_and_cached() {
        let (client, _clock) = client(ScriptedProvider::always(sample_snapshot(0)));
        let sf = san_francisco();

        let entries = client
            .fetch_forecast(&sf, Units::Metric, Horizon::hourly(24))
            .await
            .unwrap();
        client
            .fetch_forecast(&sf, Units::Metric, Horizon::hourly(24))
            .await
            .unwrap();

        assert!(entries.windows(2).all(|w| w[0].valid_at < w[1].valid_at));
        assert_eq!(client.provider().forecast_calls(), 1);
    }

    #[tokio::test]
    async fn geocode_retries_city_only_then_caches() {
        let provider = ScriptedProvider::always(sample_snapshot(0))
            .with_places("Springfield", vec![Location::new("Springfield", Some("US".into()), 39.8, -89.6)]);
        let (client, _clock) = client(provider);

        let place = client.resolve("Springfield, Narnia").await.unwrap();
        assert_eq!(place.name(), "Springfield");
        assert_eq!(client.provider().geocode_calls(), 2);

        client.resolve("springfield, narnia").await.unwrap();
        assert_eq!(client.provider().geocode_calls(), 2);
    }

    #[tokio::test]
    async fn geocode_without_results_is_location_not_found() {
        let (client, _clock) = client(ScriptedProvider::always(sample_snapshot(0)));

        let err = client.resolve("Atlantis").await.unwrap_err();

        assert_eq!(err, AppError::LocationNotFound);
    }

    #[tokio::test]
    async fn unauthorized_key_maps_to_invalid_api_key() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/data/2.5/weather"))
            .respond_with(ResponseTemplate::new(401).set_body_json(json!({"cod": 401})))
            .mount(&server)
            .await;

        let client = WeatherClient::new(OpenWeatherProvider::with_base_url("NEW_KEY".into(), server.uri()));
        let err = client
            .fetch_current(&san_francisco(), Units::Metric)
            .await
            .unwrap_err();

        assert_eq!(err, AppError::InvalidApiKey);
        assert!(err.remediation().contains("15 minutes"));
    }

    #[tokio::test]
    async fn rate_limit_maps_retry_after_header() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/data/2.5/weather"))
            .respond_with(ResponseTemplate::new(429).append_header("Retry-After", "30"))
            .mount(&server)
            .await;

        let client = WeatherClient::new(OpenWeatherProvider::with_base_url("KEY".into(), server.uri()));
        let err = client
            .fetch_current(&san_francisco(), Units::Metric)
            .await
            .unwrap_err();

        assert_eq!(err, AppError::RateLimited { retry_after_secs: 30 });
    }

    #[tokio::test]
    async fn repeated_fetches_hit_the_server_once() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/data/2.5/weather"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "weather": [{"id": 800, "description": "clear sky", "icon": "01d"}],
                "main": {"temp": 18.0, "feels_like": 17.5, "humidity": 50},
                "wind": {"speed": 1.5},
                "dt": 1_760_020_000
            })))
            .expect(1)
            .mount(&server)
            .await;

        let client = WeatherClient::new(OpenWeatherProvider::with_base_url("KEY".into(), server.uri()));
        for _ in 0..3 {
            let snapshot = client
                .fetch_current(&san_francisco(), Units::Metric)
                .await
                .unwrap();
            assert_eq!(snapshot.condition, Condition::ClearDay);
        }
    }
}
