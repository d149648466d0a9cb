//! Durable storage for the active timer session and the alarm list.
//!
//! Both records are JSON blobs in the key/value table. Reads are defensive:
//! anything that fails to parse or validate is logged and reported as absent.

mod alarm_store;
mod session_store;

pub use alarm_store::{AlarmStore, ALARMS_KEY};
pub use session_store::{
    PersistedSessionState, SessionStore, ACTIVE_SESSION_KEY, POMODORO_COUNT_KEY,
};
