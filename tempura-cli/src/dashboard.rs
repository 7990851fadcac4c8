//! `tempura watch`: full-screen view with auto-refresh and an animated icon.

use anyhow::{Context, Result};
use crossterm::{
    cursor,
    event::{self, Event, KeyCode, KeyEvent, KeyEventKind, KeyModifiers},
    execute, queue,
    style::{Color, Print, ResetColor, SetForegroundColor},
    terminal::{self, Clear, ClearType, EnterAlternateScreen, LeaveAlternateScreen},
};
use std::{
    io::{self, Stdout, Write},
    sync::Arc,
    time::Duration,
};
use tempura_core::{
    AnimationClock, Condition, Config, Horizon, IconAnimator, IconFrame, Location,
    OpenWeatherProvider, RefreshConfig, RefreshInterval, RefreshScheduler, TimeFormat, Units,
    WeatherClient, WeatherState, WindSpeedUnit, animation::still, spawn_icon_driver,
    units::format_temperature,
};
use tokio::sync::mpsc;

use crate::output::{beside, clock_time, wind};

const KEY_POLL: Duration = Duration::from_millis(100);
const FORECAST_DAYS: u32 = 5;
const PLACEHOLDER: Condition = Condition::PartlyCloudy;

#[derive(Debug)]
enum Input {
    Key(KeyEvent),
    Resize,
}

enum Action {
    Refresh,
    Quit,
    Interval(i32),
    ToggleUnits,
    None,
}

/// Settings for this run. Only explicit key presses reach the saved config;
/// a `--units` override stays out of it.
struct Session {
    config: Config,
    units: Units,
    interval: RefreshInterval,
}

impl Session {
    fn new(config: Config, units: Option<Units>) -> Self {
        Self {
            units: units.unwrap_or(config.preferences.units),
            interval: config.refresh_interval(),
            config,
        }
    }

    fn step_interval(&mut self, delta: i32) -> RefreshInterval {
        let minutes = self.interval.minutes().saturating_add_signed(delta);
        self.interval = RefreshInterval::clamped_minutes(minutes);
        self.config.preferences.auto_refresh_minutes = self.interval.minutes();
        self.interval
    }

    fn toggle_units(&mut self) -> Units {
        self.units = self.units.toggled();
        self.config.preferences.units = self.units;
        self.units
    }
}

pub async fn run(
    client: Arc<WeatherClient<OpenWeatherProvider>>,
    config: Config,
    location: Location,
    units: Option<Units>,
) -> Result<()> {
    let prefs = config.preferences.clone();
    let mut session = Session::new(config, units);

    let scheduler = RefreshScheduler::start(
        client,
        RefreshConfig::new(location, session.units)
            .with_interval(session.interval)
            .with_forecast(Horizon::daily(FORECAST_DAYS)),
    );
    let mut weather = scheduler.subscribe();

    let (frame_tx, mut frame_rx) = mpsc::channel::<IconFrame>(4);
    let mut clock = prefs
        .animations_enabled
        .then(|| AnimationClock::from_fps(prefs.animation_fps));
    let driver = clock.as_ref().map(|clock| {
        spawn_icon_driver(
            IconAnimator::new(PLACEHOLDER),
            clock.subscribe(),
            scheduler.subscribe(),
            frame_tx.clone(),
        )
    });
    drop(frame_tx);
    let mut frames_open = driver.is_some();

    let mut inputs = spawn_input_reader();
    let mut view = View {
        state: weather.borrow().clone(),
        icon: None,
        interval: session.interval,
        wind_unit: prefs.wind_speed_unit,
        time_format: prefs.time_format,
        notice: None,
    };

    let mut screen = Screen::enter()?;
    let result = async {
        screen.draw(&view)?;
        loop {
            tokio::select! {
                frame = frame_rx.recv(), if frames_open => match frame {
                    Some(frame) => view.icon = Some(frame),
                    None => frames_open = false,
                },
                changed = weather.changed() => {
                    if changed.is_err() {
                        break;
                    }
                    view.state = weather.borrow_and_update().clone();
                }
                input = inputs.recv() => {
                    let Some(input) = input else { break };
                    let Input::Key(key) = input else {
                        screen.clear()?;
                        screen.draw(&view)?;
                        continue;
                    };
                    match action(key) {
                        Action::Quit => break,
                        Action::Refresh => {
                            scheduler.refresh_now()?;
                        }
                        Action::Interval(delta) => {
                            let interval = session.step_interval(delta);
                            view.interval = interval;
                            scheduler.set_interval(interval)?;
                            view.notice = save_notice(&session.config);
                        }
                        Action::ToggleUnits => {
                            scheduler.set_units(session.toggle_units())?;
                            view.notice = save_notice(&session.config);
                        }
                        Action::None => continue,
                    }
                }
            }
            screen.draw(&view)?;
        }
        Ok::<(), anyhow::Error>(())
    }
    .await;

    if let Some(driver) = driver {
        driver.abort();
    }
    if let Some(clock) = clock.as_mut() {
        clock.stop();
    }
    scheduler.stop().await;
    drop(inputs);
    screen.leave()?;

    result
}

fn action(key: KeyEvent) -> Action {
    match key.code {
        KeyCode::Char('c') if key.modifiers.contains(KeyModifiers::CONTROL) => Action::Quit,
        KeyCode::Char('q') | KeyCode::Char('Q') | KeyCode::Esc => Action::Quit,
        KeyCode::Char('r') | KeyCode::Char('R') => Action::Refresh,
        KeyCode::Char('+') | KeyCode::Char('=') => Action::Interval(1),
        KeyCode::Char('-') | KeyCode::Char('_') => Action::Interval(-1),
        KeyCode::Char('u') | KeyCode::Char('U') => Action::ToggleUnits,
        _ => Action::None,
    }
}

fn save_notice(config: &Config) -> Option<String> {
    match config.save() {
        Ok(()) => None,
        Err(err) => {
            tracing::warn!(error = %err, "Failed to save preferences");
            Some(format!("Could not save preferences: {err}"))
        }
    }
}

/// Read terminal events on a blocking thread until the receiver goes away.
fn spawn_input_reader() -> mpsc::Receiver<Input> {
    let (tx, rx) = mpsc::channel(16);
    tokio::task::spawn_blocking(move || {
        while !tx.is_closed() {
            let ready = match event::poll(KEY_POLL) {
                Ok(ready) => ready,
                Err(err) => {
                    tracing::warn!(%err, "Terminal input unavailable");
                    break;
                }
            };
            if !ready {
                continue;
            }
            let input = match event::read() {
                Ok(Event::Key(key)) if key.kind == KeyEventKind::Press => Input::Key(key),
                Ok(Event::Resize(..)) => Input::Resize,
                Ok(_) => continue,
                Err(err) => {
                    tracing::warn!(%err, "Terminal input unavailable");
                    break;
                }
            };
            if tx.blocking_send(input).is_err() {
                break;
            }
        }
    });
    rx
}

struct View {
    state: WeatherState,
    icon: Option<IconFrame>,
    interval: RefreshInterval,
    wind_unit: WindSpeedUnit,
    time_format: TimeFormat,
    notice: Option<String>,
}

impl View {
    /// The animated frame when it matches the weather, else the still icon.
    fn icon_lines(&self) -> (Condition, &'static [&'static str]) {
        let condition = self.state.condition().unwrap_or(PLACEHOLDER);
        match &self.icon {
            Some(frame) if frame.condition == condition => (condition, frame.lines),
            _ => (condition, still(condition)),
        }
    }

    fn lines(&self) -> Vec<(Option<Color>, String)> {
        let state = &self.state;
        let units = state.units;
        let mut lines = vec![
            (Some(Color::Cyan), format!("tempura  {}", state.location.display_name())),
            (None, String::new()),
        ];

        let details = match &state.snapshot {
            Some(snapshot) => vec![
                format!("{} ({})", snapshot.condition.label(), snapshot.description),
                format!(
                    "{}, feels like {}",
                    format_temperature(snapshot.temperature, units),
                    format_temperature(snapshot.feels_like, units)
                ),
                format!(
                    "Humidity {}%  Wind {}",
                    snapshot.humidity_pct,
                    wind(snapshot.wind_speed_mps, snapshot.wind_deg, self.wind_unit)
                ),
                snapshot
                    .pressure_hpa
                    .map(|p| format!("Pressure {p} hPa"))
                    .unwrap_or_default(),
                self.status_line(),
            ],
            None => vec![String::new(), self.status_line()],
        };

        let (condition, icon) = self.icon_lines();
        let color = condition_color(condition);
        lines.extend(
            beside(icon, &details)
                .into_iter()
                .map(|line| (Some(color), line)),
        );

        if let Some(forecast) = &state.forecast {
            lines.push((None, String::new()));
            for entry in forecast.iter() {
                let range = match (entry.temp_min, entry.temp_max) {
                    (Some(min), Some(max)) => format!(
                        "{}/{}",
                        format_temperature(min, units),
                        format_temperature(max, units)
                    ),
                    _ => format_temperature(entry.temperature, units),
                };
                lines.push((
                    None,
                    format!(
                        "  {:<10} {:<14} {}",
                        entry.valid_at.with_timezone(&chrono::Local).format("%a %d %b"),
                        entry.condition.label(),
                        range
                    ),
                ));
            }
        }

        lines.push((None, String::new()));
        if let (Some(err), Some(message)) = (&state.error, &state.message) {
            lines.push((Some(Color::Red), format!("! {err}: {message}")));
        }
        if let Some(notice) = &self.notice {
            lines.push((Some(Color::Yellow), notice.clone()));
        }
        lines.push((
            Some(Color::DarkGrey),
            format!(
                "r refresh  u units  +/- interval ({} min)  q quit",
                self.interval.minutes()
            ),
        ));
        lines
    }

    fn status_line(&self) -> String {
        let state = &self.state;
        if state.loading {
            return "Refreshing...".to_string();
        }
        match state.updated_at {
            Some(at) if state.stale => {
                format!("Updated {} (stale)", clock_time(at, self.time_format))
            }
            Some(at) => format!("Updated {}", clock_time(at, self.time_format)),
            None => "Waiting for data".to_string(),
        }
    }
}

fn condition_color(condition: Condition) -> Color {
    match condition.color() {
        "yellow" => Color::DarkYellow,
        "bright_yellow" => Color::Yellow,
        "bright_blue" => Color::Blue,
        "bright_cyan" => Color::Cyan,
        "bright_black" => Color::DarkGrey,
        "white" => Color::White,
        _ => Color::Reset,
    }
}

/// Raw mode plus alternate screen; restored on `leave` or drop.
struct Screen {
    out: Stdout,
    active: bool,
}

impl Screen {
    fn enter() -> Result<Self> {
        terminal::enable_raw_mode().context("Failed to enable raw terminal mode")?;
        let mut out = io::stdout();
        execute!(out, EnterAlternateScreen, cursor::Hide, Clear(ClearType::All))
            .context("Failed to set up the terminal")?;
        Ok(Self { out, active: true })
    }

    fn clear(&mut self) -> Result<()> {
        execute!(self.out, Clear(ClearType::All))?;
        Ok(())
    }

    fn draw(&mut self, view: &View) -> Result<()> {
        for (row, (color, text)) in view.lines().into_iter().enumerate() {
            let row = u16::try_from(row).unwrap_or(u16::MAX);
            queue!(self.out, cursor::MoveTo(0, row), Clear(ClearType::CurrentLine))?;
            match color {
                Some(color) => queue!(self.out, SetForegroundColor(color), Print(text), ResetColor)?,
                None => queue!(self.out, Print(text))?,
            }
        }
        queue!(self.out, Clear(ClearType::FromCursorDown))?;
        self.out.flush()?;
        Ok(())
    }

    fn leave(&mut self) -> Result<()> {
        if !self.active {
            return Ok(());
        }
        self.active = false;
        execute!(self.out, cursor::Show, LeaveAlternateScreen)?;
        terminal::disable_raw_mode()?;
        Ok(())
    }
}

impl Drop for Screen {
    fn drop(&mut self) {
        let _ = self.leave();
    }
}
