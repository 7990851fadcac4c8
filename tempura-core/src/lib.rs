//! Core library for the `tempura` CLI.
//!
//! This crate defines:
//! - Configuration, saved locations and credentials handling
//! - The OpenWeatherMap provider behind the [`WeatherProvider`] abstraction
//! - [`WeatherClient`]: response caching, request timeouts and error classification
//! - [`RefreshScheduler`]: periodic background refresh publishing [`WeatherState`]
//! - Icon animation: [`AnimationClock`] and [`IconAnimator`]
//!
//! It is used by `tempura-cli`, but can also be reused by other front ends.

pub mod animation;
pub mod cache;
pub mod client;
pub mod clock;
pub mod config;
pub mod error;
pub mod model;
pub mod provider;
pub mod scheduler;
pub mod units;

#[cfg(test)]
pub(crate) mod testing;

pub use animation::{AnimationClock, IconAnimator, IconFrame, spawn_icon_driver};
pub use client::WeatherClient;
pub use config::{Config, Preferences, SavedLocation};
pub use error::{AppError, FetchFailure, classify};
pub use model::{Condition, ForecastEntry, Horizon, Location, WeatherSnapshot};
pub use provider::{WeatherProvider, openweather::OpenWeatherProvider, provider_from_config};
pub use scheduler::{RefreshConfig, RefreshInterval, RefreshScheduler, WeatherState};
pub use units::{TimeFormat, Units, WindSpeedUnit};
