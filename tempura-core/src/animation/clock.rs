use std::time::Duration;
use tokio::{
    sync::broadcast,
    task::JoinHandle,
    time::{self, MissedTickBehavior},
};

pub const DEFAULT_FRAME_INTERVAL: Duration = Duration::from_millis(200);
pub const MIN_FRAME_INTERVAL: Duration = Duration::from_millis(100);
pub const MAX_FRAME_INTERVAL: Duration = Duration::from_millis(500);

const MIN_FPS: u32 = 2;
const MAX_FPS: u32 = 10;
const TICK_BUFFER: usize = 16;

/// One animation beat. `seq` counts up from 1 for each clock.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Tick {
    pub seq: u64,
}

/// Shared periodic tick source for every icon on screen.
///
/// Ticks are broadcast; a subscriber that falls behind sees `Lagged` and
/// should skip ahead rather than replay. Dropping the clock (or [`stop`])
/// cancels the timer task and closes every subscription.
///
/// [`stop`]: AnimationClock::stop
#[derive(Debug)]
pub struct AnimationClock {
    period: Duration,
    sender: Option<broadcast::Sender<Tick>>,
    task: Option<JoinHandle<()>>,
}

impl AnimationClock {
    /// Start ticking every `period`, clamped to 100..=500ms. Must be called
    /// from inside a Tokio runtime.
    pub fn start(period: Duration) -> Self {
        let period = period.clamp(MIN_FRAME_INTERVAL, MAX_FRAME_INTERVAL);
        let (sender, _) = broadcast::channel(TICK_BUFFER);
        let task = tokio::spawn(run(period, sender.clone()));
        tracing::debug!(?period, "Animation clock started");

        Self {
            period,
            sender: Some(sender),
            task: Some(task),
        }
    }

    pub fn from_fps(fps: u32) -> Self {
        Self::start(fps_to_period(fps))
    }

    pub fn period(&self) -> Duration {
        self.period
    }

    /// A receiver for ticks from now on. After [`stop`](Self::stop) the
    /// receiver is already closed.
    pub fn subscribe(&self) -> broadcast::Receiver<Tick> {
        match &self.sender {
            Some(sender) => sender.subscribe(),
            None => broadcast::channel(1).1,
        }
    }

    pub fn is_running(&self) -> bool {
        self.task.as_ref().is_some_and(|task| !task.is_finished())
    }

    pub fn stop(&mut self) {
        if let Some(task) = self.task.take() {
            task.abort();
            tracing::debug!("Animation clock stopped");
        }
        self.sender = None;
    }
}

impl Drop for AnimationClock {
    fn drop(&mut self) {
        self.stop();
    }
}

/// 2..=10 fps, as a tick period.
pub fn fps_to_period(fps: u32) -> Duration {
    Duration::from_millis(1000 / u64::from(fps.clamp(MIN_FPS, MAX_FPS)))
}

async fn run(period: Duration, sender: broadcast::Sender<Tick>) {
    let mut interval = time::interval_at(time::Instant::now() + period, period);
    interval.set_missed_tick_behavior(MissedTickBehavior::Skip);

    let mut seq = 0;
    loop {
        interval.tick().await;
        seq += 1;
        // No subscribers is fine; someone may subscribe later.
        let _ = sender.send(Tick { seq });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::sync::broadcast::error::RecvError;

    #[test]
    fn fps_is_clamped() {
        assert_eq!(fps_to_period(5), Duration::from_millis(200));
        assert_eq!(fps_to_period(0), Duration::from_millis(500));
        assert_eq!(fps_to_period(60), Duration::from_millis(100));
    }

    #[tokio::test(start_paused = true)]
    async fn ticks_arrive_at_the_configured_period() {
        let clock = AnimationClock::start(Duration::from_millis(250));
        let mut ticks = clock.subscribe();
        let started = time::Instant::now();

        for expected in 1..=4 {
            let tick = ticks.recv().await.expect("tick");
            assert_eq!(tick.seq, expected);
        }

        assert_eq!(started.elapsed(), Duration::from_millis(1000));
        assert!(clock.is_running());
    }

    #[tokio::test(start_paused = true)]
    async fn period_is_clamped() {
        let fast = AnimationClock::start(Duration::from_millis(10));
        let slow = AnimationClock::start(Duration::from_secs(5));
        assert_eq!(fast.period(), MIN_FRAME_INTERVAL);
        assert_eq!(slow.period(), MAX_FRAME_INTERVAL);
    }

    #[tokio::test(start_paused = true)]
    async fn stop_closes_subscriptions() {
        let mut clock = AnimationClock::from_fps(5);
        let mut ticks = clock.subscribe();
        ticks.recv().await.expect("first tick");

        clock.stop();

        assert_eq!(ticks.recv().await, Err(RecvError::Closed));
        assert!(!clock.is_running());
        assert_eq!(clock.subscribe().recv().await, Err(RecvError::Closed));
    }

    #[tokio::test(start_paused = true)]
    async fn dropping_the_clock_stops_it() {
        let clock = AnimationClock::start(DEFAULT_FRAME_INTERVAL);
        let mut ticks = clock.subscribe();

        drop(clock);

        assert_eq!(ticks.recv().await, Err(RecvError::Closed));
    }
}
