use crate::model::Condition;

use super::frames::{Frame, frames};

/// Snapshot of an animator's position, for rendering and tests.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AnimationState {
    pub condition: Condition,
    pub frame_index: usize,
    pub frame_count: usize,
}

/// Looping frame cursor for one icon. Pure: no timers, no I/O.
#[derive(Debug, Clone)]
pub struct IconAnimator {
    condition: Condition,
    frames: &'static [Frame],
    /// Index `advance` returns next.
    next: usize,
    /// Index last returned by `advance`, if any since the last reset.
    shown: Option<usize>,
}

impl IconAnimator {
    pub fn new(condition: Condition) -> Self {
        Self {
            condition,
            frames: frames(condition),
            next: 0,
            shown: None,
        }
    }

    pub fn condition(&self) -> Condition {
        self.condition
    }

    /// Switch variants. A change restarts the sequence at frame 0; the same
    /// condition keeps the current position. Returns whether it changed.
    pub fn set_condition(&mut self, condition: Condition) -> bool {
        if condition == self.condition {
            return false;
        }
        *self = Self::new(condition);
        true
    }

    /// Frame to draw for this tick; moves the cursor on, wrapping at the end.
    pub fn advance(&mut self) -> (usize, Frame) {
        let index = self.next;
        self.shown = Some(index);
        self.next = (index + 1) % self.frames.len();
        (index, self.frames[index])
    }

    /// The frame currently on screen (frame 0 before the first tick).
    pub fn current(&self) -> Frame {
        self.frames[self.shown.unwrap_or(0)]
    }

    pub fn state(&self) -> AnimationState {
        AnimationState {
            condition: self.condition,
            frame_index: self.shown.unwrap_or(0),
            frame_count: self.frames.len(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn advance_loops_through_every_frame() {
        let mut animator = IconAnimator::new(Condition::Rain);
        let count = animator.state().frame_count;

        let indices: Vec<usize> = (0..count * 2).map(|_| animator.advance().0).collect();

        let expected: Vec<usize> = (0..count).chain(0..count).collect();
        assert_eq!(indices, expected);
    }

    #[test]
    fn condition_change_restarts_at_first_frame() {
        let mut animator = IconAnimator::new(Condition::Rain);
        animator.advance();
        animator.advance();

        assert!(animator.set_condition(Condition::Snow));
        assert_eq!(animator.state().frame_index, 0);
        let (index, frame) = animator.advance();
        assert_eq!(index, 0);
        assert_eq!(frame, frames(Condition::Snow)[0]);
    }

    #[test]
    fn same_condition_keeps_position() {
        let mut animator = IconAnimator::new(Condition::Cloudy);
        animator.advance();

        assert!(!animator.set_condition(Condition::Cloudy));
        assert_eq!(animator.advance().0, 1);
    }

    #[test]
    fn current_tracks_last_advanced_frame() {
        let mut animator = IconAnimator::new(Condition::Thunderstorm);
        assert_eq!(animator.current(), frames(Condition::Thunderstorm)[0]);

        animator.advance();
        let (_, second) = animator.advance();

        assert_eq!(animator.current(), second);
        assert_eq!(animator.state().frame_index, 1);
    }
}
