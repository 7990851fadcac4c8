use tokio::{
    sync::{
        broadcast::{self, error::RecvError},
        mpsc::{self, error::TrySendError},
        watch,
    },
    task::JoinHandle,
};

use crate::{model::Condition, scheduler::WeatherState};

use super::{animator::IconAnimator, clock::Tick, frames::Frame};

/// A rendered icon frame, ready to draw.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IconFrame {
    pub condition: Condition,
    pub index: usize,
    pub lines: Frame,
}

/// Drive `animator` from clock ticks, following the condition in `weather`.
///
/// The task is the only writer of the animator's frame index. It never
/// awaits network I/O: a weather update only swaps the variant. Frames the
/// renderer has not picked up yet are dropped instead of queued. The task ends
/// when the clock stops or `frames` is closed; abort the handle to end it
/// sooner.
pub fn spawn_icon_driver(
    mut animator: IconAnimator,
    mut ticks: broadcast::Receiver<Tick>,
    mut weather: watch::Receiver<WeatherState>,
    frames: mpsc::Sender<IconFrame>,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        if let Some(condition) = weather.borrow_and_update().condition() {
            animator.set_condition(condition);
        }
        let mut follow_weather = true;

        loop {
            tokio::select! {
                biased;

                _ = frames.closed() => break,

                changed = weather.changed(), if follow_weather => match changed {
                    Ok(()) => {
                        let condition = weather.borrow_and_update().condition();
                        if let Some(condition) = condition {
                            if animator.set_condition(condition) {
                                tracing::debug!(?condition, "Icon variant changed");
                            }
                        }
                    }
                    // Scheduler is gone; keep animating the last condition.
                    Err(_) => follow_weather = false,
                },

                tick = ticks.recv() => match tick {
                    Ok(_) => {
                        let (index, lines) = animator.advance();
                        let frame = IconFrame {
                            condition: animator.condition(),
                            index,
                            lines,
                        };
                        match frames.try_send(frame) {
                            Ok(()) | Err(TrySendError::Full(_)) => {}
                            Err(TrySendError::Closed(_)) => break,
                        }
                    }
                    Err(RecvError::Lagged(skipped)) => {
                        tracing::debug!(skipped, "Icon driver fell behind, skipping ticks");
                    }
                    Err(RecvError::Closed) => break,
                },
            }
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        animation::{clock::AnimationClock, frames::frames},
        testing::{san_francisco, sample_snapshot_with},
        units::Units,
    };
    use std::{sync::Arc, time::Duration};

    fn state_with(condition: Condition) -> WeatherState {
        let mut state = WeatherState::new(san_francisco(), Units::Metric);
        state.snapshot = Some(Arc::new(sample_snapshot_with(condition, 0)));
        state
    }

    #[tokio::test(start_paused = true)]
    async fn loops_frames_and_resets_on_condition_change() {
        let clock = AnimationClock::start(Duration::from_millis(200));
        let (weather_tx, weather_rx) = watch::channel(state_with(Condition::Rain));
        let (frame_tx, mut frame_rx) = mpsc::channel(8);
        let driver = spawn_icon_driver(
            IconAnimator::new(Condition::ClearDay),
            clock.subscribe(),
            weather_rx,
            frame_tx,
        );

        let rain_len = frames(Condition::Rain).len();
        for expected in (0..rain_len).chain(0..1) {
            let frame = frame_rx.recv().await.expect("frame");
            assert_eq!(frame.condition, Condition::Rain);
            assert_eq!(frame.index, expected);
        }

        weather_tx.send_replace(state_with(Condition::Snow));
        let frame = frame_rx.recv().await.expect("frame");
        assert_eq!(frame.condition, Condition::Snow);
        assert_eq!(frame.index, 0);
        assert_eq!(frame.lines, frames(Condition::Snow)[0]);

        driver.abort();
    }

    #[tokio::test(start_paused = true)]
    async fn state_without_snapshot_keeps_current_variant() {
        let clock = AnimationClock::start(Duration::from_millis(200));
        let (_weather_tx, weather_rx) = watch::channel(WeatherState::new(san_francisco(), Units::Metric));
        let (frame_tx, mut frame_rx) = mpsc::channel(8);
        let _driver = spawn_icon_driver(
            IconAnimator::new(Condition::Mist),
            clock.subscribe(),
            weather_rx,
            frame_tx,
        );

        assert_eq!(frame_rx.recv().await.map(|f| f.condition), Some(Condition::Mist));
    }

    #[tokio::test(start_paused = true)]
    async fn lagged_ticks_are_skipped_not_replayed() {
        let (tick_tx, tick_rx) = broadcast::channel(1);
        for seq in 1..=3 {
            tick_tx.send(Tick { seq }).expect("receiver alive");
        }
        let (_weather_tx, weather_rx) = watch::channel(state_with(Condition::Cloudy));
        let (frame_tx, mut frame_rx) = mpsc::channel(8);

        let driver = spawn_icon_driver(IconAnimator::new(Condition::Cloudy), tick_rx, weather_rx, frame_tx);
        drop(tick_tx);
        driver.await.expect("driver exits when the clock closes");

        let frame = frame_rx.recv().await.expect("one frame for the newest tick");
        assert_eq!(frame.index, 0);
        assert_eq!(frame_rx.recv().await, None);
    }

    #[tokio::test(start_paused = true)]
    async fn exits_when_renderer_goes_away() {
        let clock = AnimationClock::start(Duration::from_millis(200));
        let (_weather_tx, weather_rx) = watch::channel(state_with(Condition::Rain));
        let (frame_tx, frame_rx) = mpsc::channel(1);
        let driver = spawn_icon_driver(IconAnimator::new(Condition::Rain), clock.subscribe(), weather_rx, frame_tx);

        drop(frame_rx);

        driver.await.expect("driver exits cleanly");
        assert!(clock.is_running());
    }
}
