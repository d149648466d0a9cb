pub mod controller;
pub mod state;

pub use controller::{TimerController, TimerSnapshot};
pub use state::{
    Completion, FocusTimer, ModeDurations, TickOutcome, TimerMode, TimerSession, TimerStatus,
    CUSTOM_MINUTES_RANGE, DEFAULT_LONG_BREAK_EVERY,
};
