use anyhow::{anyhow, Result};
use chrono::Duration as ChronoDuration;
use std::{
    collections::HashMap,
    sync::{
        atomic::{AtomicBool, Ordering},
        Arc,
    },
    time::Duration,
};
use tokio::{
    sync::Mutex,
    task::JoinHandle,
    time::{Instant, MissedTickBehavior},
};
use tokio_util::sync::CancellationToken;

use crate::{
    audio::TonePlayer,
    clock::Clock,
    events::{AppEvent, EventBus, SilenceReason},
    notify::{Capabilities, NotificationPermission, Notifier, PermissionGate, VIBRATION_PATTERN_MS},
    persistence::AlarmStore,
};

use super::{
    model::{Alarm, AlarmDraft},
    schedule::{due_alarms, FiredGuard},
};

const ENABLE_LOGS: bool = true;

use crate::{log_debug, log_error, log_info, log_warn};

pub const POLL_INTERVAL: Duration = Duration::from_secs(1);
pub const AUTO_SILENCE_AFTER: Duration = Duration::from_secs(30);

struct Ringing {
    alarm_id: String,
    generation: u64,
    auto_silence: CancellationToken,
}

struct PendingSnooze {
    generation: u64,
    cancel: CancellationToken,
}

#[derive(Default)]
struct SchedulerInner {
    alarms: Vec<Alarm>,
    /// Only one alarm is presented as ringing; a newer trigger replaces it.
    ringing: Option<Ringing>,
    snoozes: HashMap<String, PendingSnooze>,
    fired: FiredGuard,
    next_generation: u64,
}

impl SchedulerInner {
    fn generation(&mut self) -> u64 {
        self.next_generation = self.next_generation.wrapping_add(1);
        self.next_generation
    }

    fn find(&self, alarm_id: &str) -> Option<&Alarm> {
        self.alarms.iter().find(|a| a.id == alarm_id)
    }

    fn take_ringing(&mut self) -> Option<String> {
        self.ringing.take().map(|ringing| {
            ringing.auto_silence.cancel();
            ringing.alarm_id
        })
    }

    fn cancel_snooze(&mut self, alarm_id: &str) -> bool {
        match self.snoozes.remove(alarm_id) {
            Some(pending) => {
                pending.cancel.cancel();
                true
            }
            None => false,
        }
    }
}

/// Polls the alarm list once a second and owns the ringing/snooze lifecycle.
#[derive(Clone)]
pub struct AlarmScheduler {
    inner: Arc<Mutex<SchedulerInner>>,
    store: AlarmStore,
    clock: Arc<dyn Clock>,
    player: Arc<dyn TonePlayer>,
    notifier: Arc<dyn Notifier>,
    capabilities: Capabilities,
    permission: Arc<PermissionGate>,
    sound_warning_shown: Arc<AtomicBool>,
    events: EventBus,
    poller: Arc<Mutex<Option<(JoinHandle<()>, CancellationToken)>>>,
}

impl AlarmScheduler {
    pub fn new(
        store: AlarmStore,
        clock: Arc<dyn Clock>,
        player: Arc<dyn TonePlayer>,
        notifier: Arc<dyn Notifier>,
        events: EventBus,
    ) -> Self {
        let capabilities = notifier.capabilities();
        log_info!(
            "Alarm scheduler capabilities: notifications={}, vibration={}",
            capabilities.notifications,
            capabilities.vibration
        );

        Self {
            inner: Arc::new(Mutex::new(SchedulerInner::default())),
            store,
            clock,
            player,
            notifier,
            capabilities,
            permission: Arc::new(PermissionGate::new()),
            sound_warning_shown: Arc::new(AtomicBool::new(false)),
            events,
            poller: Arc::new(Mutex::new(None)),
        }
    }

    /// Load persisted alarms and start the poll loop.
    pub async fn initialize(&self) {
        self.reload().await;

        let mut poller = self.poller.lock().await;
        if poller.is_some() {
            return;
        }

        let token = CancellationToken::new();
        let handle = tokio::spawn(poll_loop(self.clone(), token.clone()));
        *poller = Some((handle, token));
    }

    /// Stop polling and cancel every pending side effect.
    pub async fn destroy(&self) {
        if let Some((handle, token)) = self.poller.lock().await.take() {
            token.cancel();
            if let Err(err) = handle.await {
                log_error!("alarm poller failed to join: {err}");
            }
        }

        let mut inner = self.inner.lock().await;
        inner.take_ringing();
        for (_, pending) in inner.snoozes.drain() {
            pending.cancel.cancel();
        }
        self.player.stop();
    }

    pub async fn reload(&self) {
        let alarms = self.store.load().await;
        log_info!("Loaded {} alarm(s)", alarms.len());
        self.inner.lock().await.alarms = alarms;
    }

    pub async fn list_alarms(&self) -> Vec<Alarm> {
        self.inner.lock().await.alarms.clone()
    }

    pub async fn ringing_alarm_id(&self) -> Option<String> {
        self.inner
            .lock()
            .await
            .ringing
            .as_ref()
            .map(|r| r.alarm_id.clone())
    }

    pub async fn create_alarm(&self, draft: AlarmDraft) -> Result<Alarm> {
        let alarm = Alarm::new(draft)?;
        let mut inner = self.inner.lock().await;
        let mut alarms = inner.alarms.clone();
        alarms.push(alarm.clone());
        self.store.save(&alarms).await?;
        inner.alarms = alarms;
        Ok(alarm)
    }

    pub async fn update_alarm(&self, alarm_id: &str, draft: AlarmDraft) -> Result<Alarm> {
        draft.validate()?;
        let mut inner = self.inner.lock().await;
        let mut alarms = inner.alarms.clone();
        let alarm = alarms
            .iter_mut()
            .find(|a| a.id == alarm_id)
            .ok_or_else(|| anyhow!("alarm {alarm_id} not found"))?;
        alarm.draft = draft;
        let updated = alarm.clone();
        self.store.save(&alarms).await?;
        inner.alarms = alarms;
        inner.fired.forget(alarm_id);
        Ok(updated)
    }

    pub async fn set_alarm_active(&self, alarm_id: &str, is_active: bool) -> Result<Alarm> {
        let draft = {
            let inner = self.inner.lock().await;
            let alarm = inner
                .find(alarm_id)
                .ok_or_else(|| anyhow!("alarm {alarm_id} not found"))?;
            AlarmDraft {
                is_active,
                ..alarm.draft.clone()
            }
        };
        self.update_alarm(alarm_id, draft).await
    }

    pub async fn delete_alarm(&self, alarm_id: &str) -> Result<()> {
        let mut inner = self.inner.lock().await;
        let alarms: Vec<Alarm> = inner
            .alarms
            .iter()
            .filter(|a| a.id != alarm_id)
            .cloned()
            .collect();
        if alarms.len() == inner.alarms.len() {
            return Err(anyhow!("alarm {alarm_id} not found"));
        }
        self.store.save(&alarms).await?;
        inner.alarms = alarms;
        inner.fired.forget(alarm_id);
        inner.cancel_snooze(alarm_id);

        let is_ringing = inner
            .ringing
            .as_ref()
            .map_or(false, |r| r.alarm_id == alarm_id);
        if is_ringing {
            inner.take_ringing();
            self.player.stop();
            self.events.emit(AppEvent::AlarmSilenced {
                alarm_id: alarm_id.to_string(),
                reason: SilenceReason::Deleted,
            });
        }
        Ok(())
    }

    /// Evaluate every alarm against the current wall-clock second.
    pub async fn poll_once(&self) {
        let now = self.clock.now_local();
        let due: Vec<String> = {
            let mut inner = self.inner.lock().await;
            let ids: Vec<String> = due_alarms(&inner.alarms, &now)
                .map(|a| a.id.clone())
                .collect();
            ids.into_iter()
                .filter(|id| inner.fired.claim(id, &now))
                .collect()
        };

        for alarm_id in due {
            self.trigger_alarm(&alarm_id).await;
        }
    }

    /// Start ringing an alarm. Returns `false` if the alarm no longer exists.
    pub async fn trigger_alarm(&self, alarm_id: &str) -> bool {
        let mut inner = self.inner.lock().await;
        let Some(alarm) = inner.find(alarm_id).cloned() else {
            log_warn!("Ignoring trigger for unknown alarm {alarm_id}");
            return false;
        };

        if let Some(previous) = inner.take_ringing() {
            log_info!("Alarm {} supersedes ringing alarm {}", alarm.id, previous);
        }
        inner.cancel_snooze(alarm_id);

        let generation = inner.generation();
        let auto_silence = CancellationToken::new();
        inner.ringing = Some(Ringing {
            alarm_id: alarm.id.clone(),
            generation,
            auto_silence: auto_silence.clone(),
        });
        drop(inner);
        let silence_at = Instant::now() + AUTO_SILENCE_AFTER;

        log_info!("Alarm {} ({}) ringing", alarm.id, alarm.draft.time);

        if let Err(err) = self.player.play(alarm.draft.sound, alarm.draft.volume) {
            log_warn!("Alarm sound failed for {}: {}", alarm.id, err);
            if !self.sound_warning_shown.swap(true, Ordering::SeqCst) {
                self.events.emit(AppEvent::SoundBlocked {
                    message: format!("Alarm sound could not be played: {err}"),
                });
            }
        }

        self.notify(&alarm);

        self.events.emit(AppEvent::AlarmRinging {
            alarm_id: alarm.id.clone(),
            label: alarm.display_name(),
        });

        let scheduler = self.clone();
        let alarm_id = alarm.id;
        tokio::spawn(async move {
            tokio::select! {
                _ = tokio::time::sleep_until(silence_at) => {
                    scheduler.auto_silence(&alarm_id, generation).await;
                }
                _ = auto_silence.cancelled() => {}
            }
        });

        true
    }

    fn notify(&self, alarm: &Alarm) {
        if self.capabilities.notifications {
            match self.permission.ensure(self.notifier.as_ref()) {
                NotificationPermission::Granted => {
                    let body = format!("It's {}", alarm.draft.time);
                    if let Err(err) = self.notifier.show(&alarm.display_name(), &body) {
                        log_warn!("Alarm notification failed: {err}");
                    }
                }
                NotificationPermission::Denied => {
                    log_debug!("Notification permission denied; alarm {} is audio-only", alarm.id);
                }
            }
        }

        if self.capabilities.vibration {
            if let Err(err) = self.notifier.vibrate(&VIBRATION_PATTERN_MS) {
                log_warn!("Alarm vibration failed: {err}");
            }
        }
    }

    async fn auto_silence(&self, alarm_id: &str, generation: u64) {
        let mut inner = self.inner.lock().await;
        let still_ringing = inner
            .ringing
            .as_ref()
            .map_or(false, |r| r.generation == generation);
        if !still_ringing {
            return;
        }
        inner.ringing = None;
        drop(inner);

        self.player.stop();
        log_info!("Alarm {alarm_id} auto-silenced after {}s", AUTO_SILENCE_AFTER.as_secs());
        self.events.emit(AppEvent::AlarmSilenced {
            alarm_id: alarm_id.to_string(),
            reason: SilenceReason::AutoSilenced,
        });
    }

    /// Silence now and re-fire the same alarm once after its snooze interval,
    /// regardless of its schedule. No-op when snoozing is disabled.
    pub async fn snooze(&self, alarm_id: &str) -> bool {
        let mut inner = self.inner.lock().await;
        let Some(alarm) = inner.find(alarm_id).cloned() else {
            return false;
        };
        if !alarm.draft.snooze_enabled {
            return false;
        }

        inner.take_ringing();
        self.player.stop();

        inner.cancel_snooze(alarm_id);
        let generation = inner.generation();
        let cancel = CancellationToken::new();
        inner.snoozes.insert(
            alarm.id.clone(),
            PendingSnooze {
                generation,
                cancel: cancel.clone(),
            },
        );
        drop(inner);

        let minutes = alarm.draft.snooze_interval_minutes;
        let refire_at = Instant::now() + Duration::from_secs(u64::from(minutes) * 60);
        let until = self.clock.now_utc() + ChronoDuration::minutes(i64::from(minutes));
        log_info!("Alarm {} snoozed for {} minute(s)", alarm.id, minutes);

        self.events.emit(AppEvent::AlarmSilenced {
            alarm_id: alarm.id.clone(),
            reason: SilenceReason::Snoozed,
        });
        self.events.emit(AppEvent::AlarmSnoozed {
            alarm_id: alarm.id.clone(),
            until,
        });

        let scheduler = self.clone();
        let alarm_id = alarm.id;
        tokio::spawn(async move {
            tokio::select! {
                _ = tokio::time::sleep_until(refire_at) => {
                    let due = {
                        let mut inner = scheduler.inner.lock().await;
                        match inner.snoozes.get(&alarm_id) {
                            Some(pending) if pending.generation == generation => {
                                inner.snoozes.remove(&alarm_id);
                                true
                            }
                            _ => false,
                        }
                    };
                    if due {
                        scheduler.trigger_alarm(&alarm_id).await;
                    }
                }
                _ = cancel.cancelled() => {}
            }
        });

        true
    }

    /// Stop the ringing alarm and drop any pending re-fire of `alarm_id`.
    pub async fn dismiss(&self, alarm_id: &str) {
        let mut inner = self.inner.lock().await;
        inner.take_ringing();
        inner.cancel_snooze(alarm_id);
        drop(inner);

        self.player.stop();
        self.events.emit(AppEvent::AlarmSilenced {
            alarm_id: alarm_id.to_string(),
            reason: SilenceReason::Dismissed,
        });
    }

    pub async fn has_pending_snooze(&self, alarm_id: &str) -> bool {
        self.inner.lock().await.snoozes.contains_key(alarm_id)
    }
}

async fn poll_loop(scheduler: AlarmScheduler, cancel_token: CancellationToken) {
    let mut ticker = tokio::time::interval(POLL_INTERVAL);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
    log_info!("alarm poller started");

    loop {
        tokio::select! {
            _ = ticker.tick() => scheduler.poll_once().await,
            _ = cancel_token.cancelled() => {
                log_info!("alarm poller shutting down");
                break;
            }
        }
    }
}
