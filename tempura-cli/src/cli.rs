use anyhow::{Context, Result, anyhow};
use clap::{Parser, Subcommand};
use inquire::{Confirm, CustomType, Password, PasswordDisplayMode, Select, validator::Validation};
use std::{io::IsTerminal, sync::Arc};
use tempura_core::{
    Config, Horizon, Location, OpenWeatherProvider, RefreshInterval, TimeFormat, Units,
    WeatherClient, WeatherProvider, WindSpeedUnit, provider_from_config,
};

use crate::{dashboard, output};

/// Top-level CLI struct.
#[derive(Debug, Parser)]
#[command(name = "tempura", version, about = "Terminal weather with animated ASCII icons")]
pub struct Cli {
    /// Log debug output to stderr.
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// OpenWeatherMap API key. Overrides the config file and OPENWEATHER_API_KEY.
    #[arg(long, global = true, value_name = "KEY")]
    pub api_key: Option<String>,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Set the API key and display preferences interactively.
    Configure,

    /// Show current conditions.
    Current {
        /// Saved location name or "City, Country". Defaults to the saved default.
        location: Option<String>,

        /// celsius or fahrenheit.
        #[arg(long)]
        units: Option<Units>,
    },

    /// Show a daily or hourly forecast.
    Forecast {
        /// Saved location name or "City, Country". Defaults to the saved default.
        location: Option<String>,

        /// Days ahead (1-7).
        #[arg(long, conflicts_with = "hours", value_parser = clap::value_parser!(u32).range(1..=7))]
        days: Option<u32>,

        /// Hours ahead (1-120), in 3-hour steps.
        #[arg(long, value_parser = clap::value_parser!(u32).range(1..=120))]
        hours: Option<u32>,

        #[arg(long)]
        units: Option<Units>,
    },

    /// Manage saved locations.
    Locations {
        #[command(subcommand)]
        command: LocationsCommand,
    },

    /// Live dashboard with auto-refresh and an animated icon.
    Watch {
        location: Option<String>,

        #[arg(long)]
        units: Option<Units>,
    },
}

#[derive(Debug, Subcommand)]
pub enum LocationsCommand {
    /// List saved locations.
    List,

    /// Look up a place and save it.
    Add {
        /// Free-form query, e.g. "Portland, US".
        query: String,

        /// Make it the default location.
        #[arg(long)]
        default: bool,
    },

    /// Forget a saved location.
    Remove { name: String },

    /// Use a saved location when none is given.
    Default { name: String },
}

impl Cli {
    /// Whether the command takes over the terminal.
    pub fn is_fullscreen(&self) -> bool {
        matches!(self.command, Command::Watch { .. })
    }

    pub async fn run(self) -> Result<()> {
        let Cli {
            api_key, command, ..
        } = self;
        let mut config = Config::load()?;
        let client = || -> Result<WeatherClient<OpenWeatherProvider>> {
            Ok(WeatherClient::new(provider_from_config(&config, api_key.as_deref())?))
        };

        match command {
            Command::Configure => configure(&mut config)?,
            Command::Current { location, units } => {
                let client = client()?;
                let units = units.unwrap_or(config.preferences.units);
                let location = resolve_location(&client, &config, location.as_deref()).await?;

                let snapshot = client.fetch_current(&location, units).await?;
                print!(
                    "{}",
                    output::current(
                        &snapshot,
                        config.preferences.wind_speed_unit,
                        config.preferences.time_format
                    )
                );
            }
            Command::Forecast {
                location,
                days,
                hours,
                units,
            } => {
                let client = client()?;
                let units = units.unwrap_or(config.preferences.units);
                let location = resolve_location(&client, &config, location.as_deref()).await?;
                let horizon = match (days, hours) {
                    (_, Some(hours)) => Horizon::hourly(hours),
                    (Some(days), None) => Horizon::daily(days),
                    (None, None) => Horizon::default(),
                };

                let entries = client.fetch_forecast(&location, units, horizon).await?;
                print!(
                    "{}",
                    output::forecast(
                        &location,
                        horizon,
                        &entries,
                        units,
                        config.preferences.wind_speed_unit,
                        config.preferences.time_format
                    )
                );
            }
            Command::Locations { command } => match command {
                LocationsCommand::List => print!("{}", output::locations(&config.locations)),
                LocationsCommand::Add { query, default } => {
                    let client = client()?;
                    let location = pick_location(&client, &query).await?;
                    let name = location.display_name();
                    config.add_location(location, default);
                    config.save()?;
                    println!("Saved {name}");
                }
                LocationsCommand::Remove { name } => {
                    let removed = config
                        .remove_location(&name)
                        .ok_or_else(|| anyhow!("No saved location named '{name}'."))?;
                    config.save()?;
                    println!("Removed {}", removed.display_name());
                }
                LocationsCommand::Default { name } => {
                    config.set_default_location(&name)?;
                    config.save()?;
                    println!("Default location is now {name}");
                }
            },
            Command::Watch { location, units } => {
                let client = Arc::new(client()?);
                let location = resolve_location(&client, &config, location.as_deref()).await?;
                dashboard::run(client, config, location, units).await?;
            }
        }

        Ok(())
    }
}

/// A saved location by name, a geocoded query, or the saved default.
async fn resolve_location<P: WeatherProvider>(
    client: &WeatherClient<P>,
    config: &Config,
    query: Option<&str>,
) -> Result<Location> {
    match query.map(str::trim).filter(|q| !q.is_empty()) {
        Some(query) => match config.find_location(query) {
            Some(saved) => Ok(saved.clone()),
            None => Ok(client.resolve(query).await?),
        },
        None => config.default_location().cloned().ok_or_else(|| {
            anyhow!(
                "No location given and no default location saved.\n\
                 Hint: pass a location or run `tempura locations add \"City, Country\" --default`."
            )
        }),
    }
}

/// Geocode `query`, letting the user choose when there are several matches.
async fn pick_location<P: WeatherProvider>(
    client: &WeatherClient<P>,
    query: &str,
) -> Result<Location> {
    let places = client.geocode(query).await?;
    if places.len() == 1 || !std::io::stdin().is_terminal() {
        return places
            .first()
            .cloned()
            .ok_or_else(|| anyhow!("No match for '{query}'"));
    }

    let choice = Select::new("Which place did you mean?", places.iter().map(Location::display_name).collect())
        .raw_prompt()
        .context("Location selection cancelled")?;
    places
        .get(choice.index)
        .cloned()
        .ok_or_else(|| anyhow!("No match for '{query}'"))
}

fn configure(config: &mut Config) -> Result<()> {
    let has_key = config.api_key.is_some();
    let help = if has_key {
        "Leave empty to keep the current key"
    } else {
        "Free keys at https://openweathermap.org/api; new keys take up to 15 minutes to activate"
    };
    let api_key = Password::new("OpenWeatherMap API key:")
        .with_display_mode(PasswordDisplayMode::Masked)
        .without_confirmation()
        .with_help_message(help)
        .prompt()
        .context("Failed to read API key")?;
    if !api_key.trim().is_empty() {
        config.set_api_key(api_key);
    }

    let prefs = &mut config.preferences;

    prefs.units = Select::new("Temperature units:", Units::all().to_vec())
        .with_starting_cursor(position(Units::all(), &prefs.units))
        .prompt()
        .context("Failed to read units")?;

    prefs.wind_speed_unit = Select::new("Wind speed unit:", WindSpeedUnit::all().to_vec())
        .with_starting_cursor(position(WindSpeedUnit::all(), &prefs.wind_speed_unit))
        .prompt()
        .context("Failed to read wind speed unit")?;

    prefs.time_format = Select::new("Time format:", TimeFormat::all().to_vec())
        .with_starting_cursor(position(TimeFormat::all(), &prefs.time_format))
        .prompt()
        .context("Failed to read time format")?;

    prefs.auto_refresh_minutes = CustomType::<u32>::new("Auto-refresh interval (minutes):")
        .with_default(prefs.auto_refresh_minutes)
        .with_help_message("Between 1 and 60")
        .with_validator(|minutes: &u32| {
            Ok(match RefreshInterval::from_minutes(*minutes) {
                Ok(_) => Validation::Valid,
                Err(err) => Validation::Invalid(err.to_string().into()),
            })
        })
        .prompt()
        .context("Failed to read refresh interval")?;

    prefs.animations_enabled = Confirm::new("Animate weather icons?")
        .with_default(prefs.animations_enabled)
        .prompt()
        .context("Failed to read animation preference")?;

    config.save()?;
    println!(
        "Configuration saved to {}",
        Config::config_file_path()?.display()
    );

    if config.locations.is_empty() {
        println!("Next: tempura locations add \"City, Country\" --default");
    }
    Ok(())
}

fn position<T: PartialEq>(all: &[T], current: &T) -> usize {
    all.iter().position(|item| item == current).unwrap_or(0)
}
