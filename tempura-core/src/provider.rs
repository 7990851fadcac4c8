use crate::{
    Config,
    error::FetchFailure,
    model::{ForecastEntry, Horizon, Location, WeatherSnapshot},
    provider::openweather::OpenWeatherProvider,
    units::Units,
};
use async_trait::async_trait;
use std::fmt::Debug;

pub mod openweather;

/// Remote source of weather data.
///
/// Implementations only parse and report raw outcomes; caching, timeouts and
/// error classification live in [`crate::client::WeatherClient`].
#[async_trait]
pub trait WeatherProvider: Send + Sync + Debug {
    async fn current(
        &self,
        location: &Location,
        units: Units,
    ) -> Result<WeatherSnapshot, FetchFailure>;

    /// Entries in any order; the client normalizes them.
    async fn forecast(
        &self,
        location: &Location,
        units: Units,
        horizon: Horizon,
    ) -> Result<Vec<ForecastEntry>, FetchFailure>;

    /// Up to `limit` places matching a free-form query. An empty result is not a failure.
    async fn geocode(&self, query: &str, limit: u8) -> Result<Vec<Location>, FetchFailure>;
}

/// Construct the OpenWeatherMap provider from config.
///
/// `api_key_override` (e.g. a `--api-key` flag) wins over the config file and
/// the environment.
pub fn provider_from_config(
    config: &Config,
    api_key_override: Option<&str>,
) -> anyhow::Result<OpenWeatherProvider> {
    let api_key = api_key_override
        .map(str::trim)
        .filter(|key| !key.is_empty())
        .map(str::to_owned)
        .or_else(|| config.resolve_api_key())
        .ok_or_else(|| {
            anyhow::anyhow!(
                "No OpenWeatherMap API key configured.\n\
                 Hint: run `tempura configure`, set OPENWEATHER_API_KEY, or pass --api-key."
            )
        })?;

    Ok(OpenWeatherProvider::new(api_key))
}
