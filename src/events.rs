use chrono::{DateTime, Utc};
use serde::Serialize;
use tokio::sync::broadcast;

use crate::db::models::SessionRecord;
use crate::timer::{TimerMode, TimerSnapshot};

const EVENT_CAPACITY: usize = 64;

#[derive(Debug, Clone, Copy, Serialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub enum SilenceReason {
    Dismissed,
    Snoozed,
    AutoSilenced,
    Deleted,
}

/// Everything the engine tells the UI. Delivery is fire-and-forget: with no
/// subscribers the event is dropped.
#[derive(Debug, Clone, Serialize, PartialEq)]
#[serde(tag = "type", rename_all = "camelCase", rename_all_fields = "camelCase")]
pub enum AppEvent {
    TimerStateChanged {
        snapshot: TimerSnapshot,
    },
    TimerHeartbeat {
        snapshot: TimerSnapshot,
    },
    SessionCompleted {
        record: SessionRecord,
        next_mode: TimerMode,
        pomodoro_count: u32,
    },
    AlarmRinging {
        alarm_id: String,
        label: String,
    },
    AlarmSilenced {
        alarm_id: String,
        reason: SilenceReason,
    },
    AlarmSnoozed {
        alarm_id: String,
        until: DateTime<Utc>,
    },
    SoundBlocked {
        message: String,
    },
    Toast {
        message: String,
    },
}

#[derive(Clone)]
pub struct EventBus {
    sender: broadcast::Sender<AppEvent>,
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new()
    }
}

impl EventBus {
    pub fn new() -> Self {
        let (sender, _) = broadcast::channel(EVENT_CAPACITY);
        Self { sender }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<AppEvent> {
        self.sender.subscribe()
    }

    pub fn emit(&self, event: AppEvent) {
        let _ = self.sender.send(event);
    }

    pub fn toast(&self, message: impl Into<String>) {
        self.emit(AppEvent::Toast {
            message: message.into(),
        });
    }
}

/// Drain whatever is buffered on a receiver without waiting.
#[cfg(test)]
pub fn drain(rx: &mut broadcast::Receiver<AppEvent>) -> Vec<AppEvent> {
    let mut events = Vec::new();
    loop {
        match rx.try_recv() {
            Ok(event) => events.push(event),
            Err(broadcast::error::TryRecvError::Lagged(_)) => continue,
            Err(_) => break,
        }
    }
    events
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn emit_without_subscribers_is_harmless() {
        let bus = EventBus::new();
        bus.toast("nobody listening");

        let mut rx = bus.subscribe();
        bus.toast("hello");
        assert_eq!(
            drain(&mut rx),
            vec![AppEvent::Toast {
                message: "hello".into()
            }]
        );
    }

    #[test]
    fn events_serialize_with_type_tag() {
        let json = serde_json::to_value(AppEvent::AlarmSilenced {
            alarm_id: "a1".into(),
            reason: SilenceReason::AutoSilenced,
        })
        .unwrap();
        assert_eq!(json["type"], "alarmSilenced");
        assert_eq!(json["reason"], "autoSilenced");
    }
}
