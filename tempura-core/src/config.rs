use anyhow::{Context, Result, anyhow};
use directories::ProjectDirs;
use serde::{Deserialize, Serialize};
use std::{
    fs,
    path::{Path, PathBuf},
};

use crate::{
    model::Location,
    scheduler::RefreshInterval,
    units::{TimeFormat, Units, WindSpeedUnit},
};

/// Environment variable consulted when the config file has no API key.
pub const API_KEY_ENV: &str = "OPENWEATHER_API_KEY";

pub const DEFAULT_REFRESH_MINUTES: u32 = 10;
pub const DEFAULT_ANIMATION_FPS: u32 = 5;

/// A location the user saved, flattened into the `[[locations]]` table.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SavedLocation {
    #[serde(flatten)]
    pub location: Location,
    #[serde(default)]
    pub is_default: bool,
}

/// Display and refresh preferences.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Preferences {
    pub units: Units,
    pub wind_speed_unit: WindSpeedUnit,
    pub time_format: TimeFormat,
    /// Minutes between automatic refreshes, 1..=60.
    pub auto_refresh_minutes: u32,
    pub animations_enabled: bool,
    pub animation_fps: u32,
}

impl Default for Preferences {
    fn default() -> Self {
        Self {
            units: Units::default(),
            wind_speed_unit: WindSpeedUnit::default(),
            time_format: TimeFormat::default(),
            auto_refresh_minutes: DEFAULT_REFRESH_MINUTES,
            animations_enabled: true,
            animation_fps: DEFAULT_ANIMATION_FPS,
        }
    }
}

/// Top-level configuration stored on disk.
///
/// Example TOML:
/// ```toml
/// api_key = "..."
///
/// [[locations]]
/// name = "San Francisco"
/// country = "US"
/// lat = 37.7749
/// lon = -122.4194
/// is_default = true
///
/// [preferences]
/// units = "celsius"
/// time_format = "24h"
/// auto_refresh_minutes = 10
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct Config {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub api_key: Option<String>,
    pub locations: Vec<SavedLocation>,
    pub preferences: Preferences,
}

impl Config {
    /// API key from the config file, falling back to [`API_KEY_ENV`].
    /// Blank values count as missing.
    pub fn resolve_api_key(&self) -> Option<String> {
        non_blank(self.api_key.as_deref())
            .or_else(|| non_blank(std::env::var(API_KEY_ENV).ok().as_deref()))
    }

    pub fn set_api_key(&mut self, api_key: impl Into<String>) {
        let api_key: String = api_key.into();
        self.api_key = non_blank(Some(api_key.as_str()));
    }

    /// Nothing usable yet: no key anywhere or no saved place.
    pub fn is_first_run(&self) -> bool {
        self.resolve_api_key().is_none() || self.locations.is_empty()
    }

    pub fn refresh_interval(&self) -> RefreshInterval {
        RefreshInterval::clamped_minutes(self.preferences.auto_refresh_minutes)
    }

    /// Save `location`, replacing one with the same name. Making it the default
    /// clears any previous default.
    pub fn add_location(&mut self, location: Location, make_default: bool) {
        let make_default = make_default || self.locations.is_empty();
        if make_default {
            self.clear_default();
        }

        let saved = SavedLocation {
            location,
            is_default: make_default,
        };

        match self.position(saved.location.name()) {
            Some(idx) => {
                let was_default = self.locations[idx].is_default;
                self.locations[idx] = SavedLocation {
                    is_default: saved.is_default || was_default,
                    ..saved
                };
            }
            None => self.locations.push(saved),
        }
    }

    /// Returns the removed location, if one matched `name`.
    pub fn remove_location(&mut self, name: &str) -> Option<Location> {
        let idx = self.position(name)?;
        let removed = self.locations.remove(idx);
        Some(removed.location)
    }

    pub fn set_default_location(&mut self, name: &str) -> Result<()> {
        let idx = self.position(name).ok_or_else(|| {
            anyhow!(
                "No saved location named '{name}'.\n\
                 Hint: run `tempura locations add \"{name}\"` first."
            )
        })?;
        self.clear_default();
        self.locations[idx].is_default = true;
        Ok(())
    }

    /// The explicit default, else the first saved location.
    pub fn default_location(&self) -> Option<&Location> {
        self.locations
            .iter()
            .find(|saved| saved.is_default)
            .or_else(|| self.locations.first())
            .map(|saved| &saved.location)
    }

    /// Case-insensitive lookup by saved name.
    pub fn find_location(&self, name: &str) -> Option<&Location> {
        self.position(name).map(|idx| &self.locations[idx].location)
    }

    fn position(&self, name: &str) -> Option<usize> {
        let name = name.trim();
        self.locations
            .iter()
            .position(|saved| saved.location.name().eq_ignore_ascii_case(name))
    }

    fn clear_default(&mut self) {
        for saved in &mut self.locations {
            saved.is_default = false;
        }
    }

    /// Load config from disk, or return an empty default if it doesn't exist yet.
    pub fn load() -> Result<Self> {
        Self::load_from(&Self::config_file_path()?)
    }

    pub fn load_from(path: &Path) -> Result<Self> {
        if !path.exists() {
            tracing::debug!(path = %path.display(), "No config file yet, using defaults");
            return Ok(Self::default());
        }

        let contents = fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;

        toml::from_str(&contents)
            .with_context(|| format!("Failed to parse config file: {}", path.display()))
    }

    /// Save config to disk, creating parent directories as needed.
    pub fn save(&self) -> Result<()> {
        self.save_to(&Self::config_file_path()?)
    }

    pub fn save_to(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).with_context(|| {
                format!("Failed to create config directory: {}", parent.display())
            })?;
        }

        let toml =
            toml::to_string_pretty(self).context("Failed to serialize configuration to TOML")?;

        fs::write(path, toml)
            .with_context(|| format!("Failed to write config file: {}", path.display()))
    }

    /// Path to the config file.
    pub fn config_file_path() -> Result<PathBuf> {
        let dirs = ProjectDirs::from("dev", "tempura", "tempura")
            .ok_or_else(|| anyhow!("Could not determine platform config directory"))?;

        Ok(dirs.config_dir().join("config.toml"))
    }
}

fn non_blank(value: Option<&str>) -> Option<String> {
    value
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .map(str::to_owned)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    fn place(name: &str) -> Location {
        Location::new(name, Some("US".into()), 40.0, -100.0)
    }

    fn defaults(cfg: &Config) -> usize {
        cfg.locations.iter().filter(|s| s.is_default).count()
    }

    #[test]
    fn first_location_becomes_default() {
        let mut cfg = Config::default();

        cfg.add_location(place("Austin"), false);
        cfg.add_location(place("Denver"), false);

        assert_eq!(cfg.default_location().map(Location::name), Some("Austin"));
        assert_eq!(defaults(&cfg), 1);
    }

    #[test]
    fn adding_a_default_clears_the_previous_one() {
        let mut cfg = Config::default();
        cfg.add_location(place("Austin"), true);
        cfg.add_location(place("Denver"), true);

        assert_eq!(cfg.default_location().map(Location::name), Some("Denver"));
        assert_eq!(defaults(&cfg), 1);
    }

    #[test]
    fn same_name_replaces_instead_of_duplicating() {
        let mut cfg = Config::default();
        cfg.add_location(place("Austin"), true);
        cfg.add_location(Location::new("austin", Some("US".into()), 30.27, -97.74), false);

        assert_eq!(cfg.locations.len(), 1);
        assert!(cfg.locations[0].is_default);
        assert_eq!(cfg.locations[0].location.lat(), 30.27);
    }

    #[test]
    fn set_default_switches_and_errors_on_unknown() {
        let mut cfg = Config::default();
        cfg.add_location(place("Austin"), false);
        cfg.add_location(place("Denver"), false);

        cfg.set_default_location("denver").expect("saved location");
        assert_eq!(cfg.default_location().map(Location::name), Some("Denver"));
        assert_eq!(defaults(&cfg), 1);

        let err = cfg.set_default_location("Boise").unwrap_err();
        assert!(err.to_string().contains("No saved location named 'Boise'"));
    }

    #[test]
    fn removing_the_default_falls_back_to_first() {
        let mut cfg = Config::default();
        cfg.add_location(place("Austin"), false);
        cfg.add_location(place("Denver"), true);

        assert!(cfg.remove_location("Denver").is_some());
        assert!(cfg.remove_location("Denver").is_none());
        assert_eq!(cfg.default_location().map(Location::name), Some("Austin"));
    }

    #[test]
    fn refresh_interval_is_clamped() {
        let mut cfg = Config::default();
        assert_eq!(cfg.refresh_interval().as_duration(), Duration::from_secs(600));

        cfg.preferences.auto_refresh_minutes = 0;
        assert_eq!(cfg.refresh_interval().as_duration(), Duration::from_secs(60));

        cfg.preferences.auto_refresh_minutes = 500;
        assert_eq!(cfg.refresh_interval().as_duration(), Duration::from_secs(3600));
    }

    #[test]
    fn config_key_wins_over_environment() {
        let cfg = Config {
            api_key: Some(" FROM_FILE ".into()),
            ..Config::default()
        };
        assert_eq!(cfg.resolve_api_key().as_deref(), Some("FROM_FILE"));
    }

    #[test]
    fn first_run_needs_key_and_location() {
        let mut cfg = Config::default();
        cfg.set_api_key("KEY");
        assert!(cfg.is_first_run());

        cfg.add_location(place("Austin"), false);
        assert!(!cfg.is_first_run());
    }

    #[test]
    fn missing_file_loads_defaults() {
        let dir = tempfile::tempdir().expect("tempdir");
        let cfg = Config::load_from(&dir.path().join("nope.toml")).expect("defaults");
        assert_eq!(cfg, Config::default());
    }

    #[test]
    fn round_trips_through_disk() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("nested").join("config.toml");

        let mut cfg = Config::default();
        cfg.set_api_key("KEY");
        cfg.add_location(place("Austin").with_state(Some("Texas".into())), true);
        cfg.preferences.units = Units::Metric;
        cfg.preferences.animations_enabled = false;
        cfg.preferences.time_format = TimeFormat::TwentyFourHour;
        cfg.save_to(&path).expect("save");

        let written = fs::read_to_string(&path).expect("read back");
        assert!(written.contains("units = \"celsius\""));
        assert!(written.contains("time_format = \"24h\""));

        assert_eq!(Config::load_from(&path).expect("load"), cfg);
    }

    #[test]
    fn partial_file_fills_in_defaults() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("config.toml");
        fs::write(&path, "[preferences]\nunits = \"metric\"\n").expect("write");

        let cfg = Config::load_from(&path).expect("load");

        assert_eq!(cfg.preferences.units, Units::Metric);
        assert_eq!(cfg.preferences.auto_refresh_minutes, DEFAULT_REFRESH_MINUTES);
        assert!(cfg.preferences.animations_enabled);
        assert_eq!(cfg.preferences.time_format, TimeFormat::TwelveHour);
        assert!(cfg.locations.is_empty());
    }

    #[test]
    fn broken_file_reports_path() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("config.toml");
        fs::write(&path, "locations = 3").expect("write");

        let err = Config::load_from(&path).unwrap_err();
        assert!(format!("{err:#}").contains("Failed to parse config file"));
    }
}
