pub mod model;
pub mod schedule;
pub mod scheduler;

pub use model::{Alarm, AlarmDraft, AlarmSound, AlarmTime};
pub use scheduler::AlarmScheduler;
