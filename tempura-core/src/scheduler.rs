//! Periodic background refresh of the active location.
//!
//! [`RefreshScheduler`] owns a worker task that is the only writer of the
//! published [`WeatherState`]. Readers hold a `watch::Receiver` and always see
//! a whole state, never a half-updated one.

use chrono::{DateTime, Utc};
use std::{sync::Arc, time::Duration};
use thiserror::Error;
use tokio::{
    sync::{mpsc, watch},
    task::JoinHandle,
    time::{self, Instant},
};

use crate::{
    client::WeatherClient,
    clock::Clock,
    error::AppError,
    model::{Condition, ForecastEntry, Horizon, Location, WeatherSnapshot},
    provider::WeatherProvider,
    units::Units,
};

/// Minutes between automatic refreshes, always within 1..=60.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub struct RefreshInterval(Duration);

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("Refresh interval must be between 1 and 60 minutes, got {0}")]
pub struct InvalidInterval(pub u32);

impl RefreshInterval {
    pub const MIN_MINUTES: u32 = 1;
    pub const MAX_MINUTES: u32 = 60;

    pub fn from_minutes(minutes: u32) -> Result<Self, InvalidInterval> {
        if (Self::MIN_MINUTES..=Self::MAX_MINUTES).contains(&minutes) {
            Ok(Self::minutes_unchecked(minutes))
        } else {
            Err(InvalidInterval(minutes))
        }
    }

    pub fn clamped_minutes(minutes: u32) -> Self {
        Self::minutes_unchecked(minutes.clamp(Self::MIN_MINUTES, Self::MAX_MINUTES))
    }

    fn minutes_unchecked(minutes: u32) -> Self {
        Self(Duration::from_secs(u64::from(minutes) * 60))
    }

    pub fn minutes(&self) -> u32 {
        (self.0.as_secs() / 60) as u32
    }

    pub fn as_duration(&self) -> Duration {
        self.0
    }
}

impl Default for RefreshInterval {
    fn default() -> Self {
        Self::minutes_unchecked(crate::config::DEFAULT_REFRESH_MINUTES)
    }
}

/// What the render layer shows for the active location.
#[derive(Debug, Clone, PartialEq)]
pub struct WeatherState {
    pub location: Location,
    pub units: Units,
    /// Last good observation. Kept across failed refreshes.
    pub snapshot: Option<Arc<WeatherSnapshot>>,
    pub forecast: Option<Arc<Vec<ForecastEntry>>>,
    /// The snapshot is from an earlier refresh; the latest one failed.
    pub stale: bool,
    pub loading: bool,
    pub error: Option<AppError>,
    /// Remediation text for `error`.
    pub message: Option<String>,
    /// When the snapshot was last replaced.
    pub updated_at: Option<DateTime<Utc>>,
}

impl WeatherState {
    pub fn new(location: Location, units: Units) -> Self {
        Self {
            location,
            units,
            snapshot: None,
            forecast: None,
            stale: false,
            loading: false,
            error: None,
            message: None,
            updated_at: None,
        }
    }

    pub fn condition(&self) -> Option<Condition> {
        self.snapshot.as_ref().map(|snapshot| snapshot.condition)
    }
}

#[derive(Debug, Clone)]
pub struct RefreshConfig {
    pub location: Location,
    pub units: Units,
    pub interval: RefreshInterval,
    /// Also refresh this forecast alongside current conditions.
    pub horizon: Option<Horizon>,
}

impl RefreshConfig {
    pub fn new(location: Location, units: Units) -> Self {
        Self {
            location,
            units,
            interval: RefreshInterval::default(),
            horizon: None,
        }
    }

    pub fn with_interval(mut self, interval: RefreshInterval) -> Self {
        self.interval = interval;
        self
    }

    pub fn with_forecast(mut self, horizon: Horizon) -> Self {
        self.horizon = Some(horizon);
        self
    }
}

#[derive(Debug)]
enum Command {
    RefreshNow,
    SetInterval(RefreshInterval),
    SetLocation(Location),
    SetUnits(Units),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[error("Refresh scheduler is no longer running")]
pub struct SchedulerStopped;

/// Handle to the background refresh task. Dropping it cancels the task,
/// including any fetch in flight.
#[derive(Debug)]
pub struct RefreshScheduler {
    commands: mpsc::UnboundedSender<Command>,
    state: watch::Receiver<WeatherState>,
    task: JoinHandle<()>,
}

impl RefreshScheduler {
    /// Spawn the worker. The first fetch starts immediately.
    pub fn start<P, C>(client: Arc<WeatherClient<P, C>>, config: RefreshConfig) -> Self
    where
        P: WeatherProvider + 'static,
        C: Clock,
    {
        let (state_tx, state_rx) =
            watch::channel(WeatherState::new(config.location.clone(), config.units));
        let (command_tx, command_rx) = mpsc::unbounded_channel();

        let worker = Worker {
            client,
            config,
            state: state_tx,
            commands: command_rx,
            last_attempt: Instant::now(),
            retry_after: None,
        };

        Self {
            commands: command_tx,
            state: state_rx,
            task: tokio::spawn(worker.run()),
        }
    }

    pub fn subscribe(&self) -> watch::Receiver<WeatherState> {
        self.state.clone()
    }

    /// The most recently published state.
    pub fn current(&self) -> WeatherState {
        self.state.borrow().clone()
    }

    /// Fetch now, bypassing the timer and the cache. The schedule is unchanged.
    pub fn refresh_now(&self) -> Result<(), SchedulerStopped> {
        self.send(Command::RefreshNow)
    }

    pub fn set_interval(&self, interval: RefreshInterval) -> Result<(), SchedulerStopped> {
        self.send(Command::SetInterval(interval))
    }

    /// Switch location; the published state starts over and a fetch begins.
    pub fn set_location(&self, location: Location) -> Result<(), SchedulerStopped> {
        self.send(Command::SetLocation(location))
    }

    pub fn set_units(&self, units: Units) -> Result<(), SchedulerStopped> {
        self.send(Command::SetUnits(units))
    }

    pub fn is_running(&self) -> bool {
        !self.task.is_finished()
    }

    /// Cancel the worker and wait for it to wind down.
    pub async fn stop(mut self) {
        self.task.abort();
        let _ = (&mut self.task).await;
    }

    fn send(&self, command: Command) -> Result<(), SchedulerStopped> {
        self.commands.send(command).map_err(|_| SchedulerStopped)
    }
}

impl Drop for RefreshScheduler {
    fn drop(&mut self) {
        self.task.abort();
    }
}

struct Worker<P, C: Clock> {
    client: Arc<WeatherClient<P, C>>,
    config: RefreshConfig,
    state: watch::Sender<WeatherState>,
    commands: mpsc::UnboundedReceiver<Command>,
    /// Start of the last scheduled refresh.
    last_attempt: Instant,
    /// Delay the provider asked for on the last scheduled refresh.
    retry_after: Option<Duration>,
}

impl<P: WeatherProvider, C: Clock> Worker<P, C> {
    async fn run(mut self) {
        let mut next = self.scheduled_refresh().await;

        loop {
            tokio::select! {
                _ = time::sleep_until(next) => {
                    next = self.scheduled_refresh().await;
                }
                command = self.commands.recv() => match command {
                    Some(Command::RefreshNow) => {
                        self.refresh(true).await;
                    }
                    Some(Command::SetInterval(interval)) => {
                        tracing::info!(minutes = interval.minutes(), "Refresh interval changed");
                        self.config.interval = interval;
                        next = self.next_due();
                    }
                    Some(Command::SetLocation(location)) => {
                        tracing::info!(location = %location, "Switching location");
                        self.config.location = location;
                        self.restart();
                        next = self.scheduled_refresh().await;
                    }
                    Some(Command::SetUnits(units)) => {
                        self.config.units = units;
                        self.restart();
                        next = self.scheduled_refresh().await;
                    }
                    None => break,
                },
            }
        }
        tracing::debug!("Refresh scheduler stopped");
    }

    /// Publish an empty state for the new location or units; a fetch follows.
    fn restart(&self) {
        self.state.send_replace(WeatherState {
            loading: true,
            ..WeatherState::new(self.config.location.clone(), self.config.units)
        });
    }

    /// Refresh on the timer and return when the next one is due.
    async fn scheduled_refresh(&mut self) -> Instant {
        self.last_attempt = Instant::now();
        self.retry_after = self.refresh(false).await;
        self.next_due()
    }

    /// One interval after the last scheduled refresh, or later if rate limited.
    fn next_due(&self) -> Instant {
        let interval = self.config.interval.as_duration();
        let wait = self.retry_after.map_or(interval, |retry_after| interval.max(retry_after));
        self.last_attempt + wait
    }

    /// Fetch and publish. Returns the provider-requested delay, if any.
    async fn refresh(&mut self, manual: bool) -> Option<Duration> {
        let location = self.config.location.clone();
        let units = self.config.units;
        let horizon = self.config.horizon;

        if manual {
            self.client.invalidate_current(&location, units);
            if let Some(horizon) = horizon {
                self.client.invalidate_forecast(&location, units, horizon);
            }
        }

        self.state.send_modify(|state| state.loading = true);

        let result = self.fetch(&location, units, horizon).await;
        let mut next = self.state.borrow().clone();
        next.loading = false;

        let backoff = match result {
            Ok((snapshot, forecast)) => {
                let older = next.snapshot.as_ref().is_some_and(|prev| {
                    prev.location == snapshot.location && snapshot.observed_at < prev.observed_at
                });
                if older {
                    tracing::info!(
                        observed_at = %snapshot.observed_at,
                        "Discarding observation older than the one on screen"
                    );
                } else {
                    tracing::info!(location = %location, manual, "Weather refreshed");
                    // A cache hit hands back the same snapshot; it is not an update.
                    let unchanged = next
                        .snapshot
                        .as_ref()
                        .is_some_and(|prev| Arc::ptr_eq(prev, &snapshot));
                    let updated_at = if unchanged { next.updated_at } else { Some(Utc::now()) };
                    next = WeatherState {
                        snapshot: Some(snapshot),
                        forecast: forecast.or(next.forecast),
                        stale: false,
                        error: None,
                        message: None,
                        updated_at,
                        ..next
                    };
                }
                None
            }
            Err(err) => {
                tracing::warn!(location = %location, manual, %err, "Weather refresh failed");
                next.stale = next.snapshot.is_some();
                next.message = Some(err.remediation());
                let retry_after = err.retry_after();
                next.error = Some(err);
                retry_after
            }
        };

        self.state.send_replace(next);
        backoff
    }

    async fn fetch(
        &self,
        location: &Location,
        units: Units,
        horizon: Option<Horizon>,
    ) -> Result<(Arc<WeatherSnapshot>, Option<Arc<Vec<ForecastEntry>>>), AppError> {
        let snapshot = self.client.fetch_current(location, units).await?;
        let forecast = match horizon {
            Some(horizon) => Some(self.client.fetch_forecast(location, units, horizon).await?),
            None => None,
        };
        Ok((snapshot, forecast))
    }
}
