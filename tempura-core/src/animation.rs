//! Frame-based ASCII icon animation.
//!
//! An [`AnimationClock`] broadcasts ticks; each icon on screen gets an
//! [`IconAnimator`] advanced by its own driver task (see [`spawn_icon_driver`]).
//! Nothing here touches the network, so a slow refresh never stalls an icon.

pub mod animator;
pub mod clock;
pub mod driver;
pub mod frames;

pub use animator::{AnimationState, IconAnimator};
pub use clock::{AnimationClock, DEFAULT_FRAME_INTERVAL, Tick, fps_to_period};
pub use driver::{IconFrame, spawn_icon_driver};
pub use frames::{FRAME_HEIGHT, Frame, frames, still};
