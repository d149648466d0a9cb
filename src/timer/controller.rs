use std::{sync::Arc, time::Duration};

use anyhow::{bail, Result};
use log::{debug, error, info, warn};
use serde::Serialize;
use tokio::{
    sync::{mpsc, Mutex},
    task::JoinHandle,
    time,
};

use crate::{
    clock::Clock,
    continuity::{ContinuityService, LifecycleSignal, TickWorker},
    db::{models::SessionRecord, Database},
    events::{AppEvent, EventBus},
    persistence::{PersistedSessionState, SessionStore},
    settings::{TickSource, TimerSettings},
};

use super::{
    Completion, FocusTimer, TickOutcome, TimerMode, TimerSession, TimerStatus,
    CUSTOM_MINUTES_RANGE,
};

#[derive(Debug, Clone, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct TimerSnapshot {
    pub session: TimerSession,
    pub status: TimerStatus,
    pub progress_percent: f64,
    pub remaining_seconds: u64,
    pub pomodoro_count: u32,
}

impl TimerSnapshot {
    fn of(timer: &FocusTimer) -> Self {
        let session = timer.session();
        Self {
            session: session.clone(),
            status: session.status(),
            progress_percent: session.progress_percent(),
            remaining_seconds: session.remaining_seconds(),
            pomodoro_count: timer.pomodoro_count(),
        }
    }
}

struct LiveState {
    timer: FocusTimer,
    tick_source: TickSource,
    /// Set between `suspend` and `resume`; ticks are refused meanwhile.
    suspended: bool,
}

struct Ticker {
    handle: JoinHandle<()>,
    worker: Option<TickWorker>,
}

impl Ticker {
    fn cancel(self) {
        self.handle.abort();
        if let Some(worker) = self.worker {
            worker.shutdown();
        }
    }
}

#[derive(Debug, Clone, Copy)]
enum TickInput {
    Step,
    Absolute(u64),
}

/// Owns the live focus timer: drives ticks, keeps the persisted copy fresh,
/// writes history on completion and reports everything on the event bus.
#[derive(Clone)]
pub struct TimerController {
    state: Arc<Mutex<LiveState>>,
    db: Database,
    continuity: ContinuityService,
    events: EventBus,
    clock: Arc<dyn Clock>,
    ticker: Arc<Mutex<Option<Ticker>>>,
    lifecycle: Arc<Mutex<Option<JoinHandle<()>>>>,
    tick_interval: Duration,
    heartbeat_every_ticks: u32,
}

impl TimerController {
    pub fn new(
        db: Database,
        clock: Arc<dyn Clock>,
        events: EventBus,
        settings: &TimerSettings,
    ) -> Self {
        let debug_mode = std::env::var("STUDYTRACK_DEBUG")
            .map(|value| value == "1" || value.eq_ignore_ascii_case("true"))
            .unwrap_or(false);

        let continuity = ContinuityService::new(SessionStore::new(db.clone()), clock.clone());

        Self {
            state: Arc::new(Mutex::new(LiveState {
                timer: FocusTimer::new(settings.durations, settings.long_break_every),
                tick_source: settings.tick_source,
                suspended: false,
            })),
            db,
            continuity,
            events,
            clock,
            ticker: Arc::new(Mutex::new(None)),
            lifecycle: Arc::new(Mutex::new(None)),
            tick_interval: Duration::from_secs(1),
            heartbeat_every_ticks: if debug_mode { 1 } else { 10 },
        }
    }

    pub fn with_tick_interval(mut self, tick_interval: Duration) -> Self {
        self.tick_interval = tick_interval;
        self
    }

    /// Restore whatever session was persisted, folding in the time that passed
    /// while nothing was running.
    pub async fn initialize(&self) {
        let mut live = self.state.lock().await;
        let count = self.continuity.store().load_pomodoro_count().await;
        let idle = live.timer.session().clone();
        live.timer.restore(idle, count);
        self.restore_locked(&mut live).await;
    }

    pub async fn destroy(&self) {
        if let Some(handle) = self.lifecycle.lock().await.take() {
            handle.abort();
        }
        let live = self.state.lock().await;
        self.cancel_ticker().await;
        self.persist_locked(&live.timer).await;
        debug!("Timer controller destroyed");
    }

    pub async fn snapshot(&self) -> TimerSnapshot {
        TimerSnapshot::of(&self.state.lock().await.timer)
    }

    pub async fn is_suspended(&self) -> bool {
        self.state.lock().await.suspended
    }

    pub async fn start(&self) -> bool {
        let mut live = self.state.lock().await;
        if !live.timer.start(self.clock.now_utc()) {
            return false;
        }
        live.suspended = false;
        self.persist_locked(&live.timer).await;
        self.spawn_ticker(&live).await;
        self.emit_state(&live.timer);
        true
    }

    pub async fn pause(&self) -> bool {
        let mut live = self.state.lock().await;
        if !live.timer.pause() {
            return false;
        }
        self.cancel_ticker().await;
        self.persist_locked(&live.timer).await;
        self.emit_state(&live.timer);
        true
    }

    /// Abandon the current run. Nothing is written to history.
    pub async fn stop(&self) -> bool {
        let mut live = self.state.lock().await;
        self.cancel_ticker().await;
        let changed = live.timer.stop();
        self.continuity.clear().await;
        if changed {
            self.emit_state(&live.timer);
        }
        changed
    }

    pub async fn switch_mode(&self, mode: TimerMode) -> bool {
        let mut live = self.state.lock().await;
        if !live.timer.switch_mode(mode) {
            return false;
        }
        self.persist_locked(&live.timer).await;
        self.emit_state(&live.timer);
        true
    }

    pub async fn set_labels(&self, subject: &str, task: &str) -> bool {
        let mut live = self.state.lock().await;
        if !live.timer.set_labels(subject, task) {
            return false;
        }
        self.persist_locked(&live.timer).await;
        self.emit_state(&live.timer);
        true
    }

    pub async fn set_custom_minutes(&self, minutes: u32) -> Result<()> {
        if !CUSTOM_MINUTES_RANGE.contains(&minutes) {
            bail!(
                "custom duration must be between {} and {} minutes",
                CUSTOM_MINUTES_RANGE.start(),
                CUSTOM_MINUTES_RANGE.end()
            );
        }
        let mut live = self.state.lock().await;
        if !live.timer.set_custom_minutes(minutes) {
            bail!("cannot change the custom duration while the timer is running");
        }
        self.persist_locked(&live.timer).await;
        self.emit_state(&live.timer);
        Ok(())
    }

    /// New durations apply to the idle session right away and to every later
    /// session. Refused while running.
    pub async fn apply_settings(&self, settings: &TimerSettings) -> bool {
        let mut live = self.state.lock().await;
        if !live
            .timer
            .apply_durations(settings.durations, settings.long_break_every)
        {
            return false;
        }
        live.tick_source = settings.tick_source;
        self.emit_state(&live.timer);
        true
    }

    /// The host is hiding the app. Ticking stops and the live session is
    /// written with a wall-clock marker.
    pub async fn suspend(&self) {
        let mut live = self.state.lock().await;
        if live.suspended {
            return;
        }
        live.suspended = true;
        self.cancel_ticker().await;
        self.persist_locked(&live.timer).await;
        debug!("Timer suspended at {}s", live.timer.session().elapsed_seconds);
    }

    /// The host is showing the app again. Elapsed time catches up with the wall
    /// clock and ticking restarts.
    pub async fn resume(&self) {
        let mut live = self.state.lock().await;
        if !live.suspended && live.timer.is_running() {
            // never suspended, so the live count is newer than the stored one
            self.cancel_ticker().await;
            self.persist_locked(&live.timer).await;
        }
        self.restore_locked(&mut live).await;
    }

    /// Dispatch visibility signals from the host until the sender is dropped.
    pub async fn attach_lifecycle(&self, mut signals: mpsc::Receiver<LifecycleSignal>) {
        let controller = self.clone();
        let handle = tokio::spawn(async move {
            while let Some(signal) = signals.recv().await {
                match signal {
                    LifecycleSignal::Suspend => controller.suspend().await,
                    LifecycleSignal::Resume => controller.resume().await,
                }
            }
        });

        if let Some(previous) = self.lifecycle.lock().await.replace(handle) {
            previous.abort();
        }
    }

    pub async fn recent_sessions(&self, limit: u32) -> Vec<SessionRecord> {
        self.db.list_session_records(limit).await.unwrap_or_else(|err| {
            error!("Failed to load session history: {err:#}");
            Vec::new()
        })
    }

    /// Focus and custom minutes completed since local midnight.
    pub async fn focus_minutes_today(&self) -> u64 {
        let local = self.clock.now_local();
        let midnight = local.date().and_hms_opt(0, 0, 0).unwrap_or(local);
        let since = self.clock.now_utc() - (local - midnight);
        self.db.focus_minutes_since(since).await.unwrap_or_else(|err| {
            error!("Failed to total today's focus minutes: {err:#}");
            0
        })
    }

    async fn restore_locked(&self, live: &mut LiveState) {
        live.suspended = false;

        let Some(reconciled) = self.continuity.reconcile().await else {
            if live.timer.is_running() {
                // nothing usable was stored; the live count is all we have
                warn!("No stored session to reconcile; continuing from the live count");
                self.persist_locked(&live.timer).await;
                self.spawn_ticker(live).await;
            }
            self.emit_state(&live.timer);
            return;
        };

        if reconciled.drift_seconds > 0 {
            info!(
                "Caught up {}s of wall-clock time on the {} session",
                reconciled.drift_seconds,
                reconciled.state.session.mode.as_str()
            );
        }

        let PersistedSessionState {
            session,
            pomodoro_count,
            ..
        } = reconciled.state;
        let count = pomodoro_count.max(live.timer.pomodoro_count());
        live.timer.restore(session, count);

        match live.timer.settle(self.clock.now_utc()) {
            TickOutcome::Completed(completion) => self.finish_locked(completion).await,
            TickOutcome::Ticked { .. } => self.spawn_ticker(live).await,
            TickOutcome::Ignored => {}
        }
        self.emit_state(&live.timer);
    }

    async fn spawn_ticker(&self, live: &LiveState) {
        let mut slot = self.ticker.lock().await;
        if let Some(previous) = slot.take() {
            previous.cancel();
        }

        let controller = self.clone();
        let tick_interval = self.tick_interval;

        let ticker = match live.tick_source {
            TickSource::Interval => {
                let handle = tokio::spawn(async move {
                    let mut interval =
                        time::interval_at(time::Instant::now() + tick_interval, tick_interval);
                    let mut ticks: u32 = 0;
                    loop {
                        interval.tick().await;
                        ticks = ticks.wrapping_add(1);
                        if !controller.apply_tick(TickInput::Step, ticks).await {
                            break;
                        }
                    }
                });
                Ticker {
                    handle,
                    worker: None,
                }
            }
            TickSource::Worker => {
                let (worker, mut reports) = TickWorker::spawn(self.clock.clone(), tick_interval);
                worker.start(self.clock.epoch_ms(), live.timer.session().elapsed_seconds);
                let handle = tokio::spawn(async move {
                    let mut ticks: u32 = 0;
                    while let Some(report) = reports.recv().await {
                        ticks = ticks.wrapping_add(1);
                        let input = TickInput::Absolute(report.elapsed_seconds);
                        if !controller.apply_tick(input, ticks).await {
                            break;
                        }
                    }
                });
                Ticker {
                    handle,
                    worker: Some(worker),
                }
            }
        };

        *slot = Some(ticker);
    }

    async fn cancel_ticker(&self) {
        if let Some(ticker) = self.ticker.lock().await.take() {
            ticker.cancel();
        }
    }

    /// Returns `false` once the ticker should exit.
    async fn apply_tick(&self, input: TickInput, ticks: u32) -> bool {
        let mut live = self.state.lock().await;
        if live.suspended {
            return false;
        }

        let now = self.clock.now_utc();
        let outcome = match input {
            TickInput::Step => live.timer.tick(now),
            TickInput::Absolute(elapsed) => live.timer.advance_to(elapsed, now),
        };

        match outcome {
            TickOutcome::Ignored => false,
            TickOutcome::Ticked { .. } => {
                if ticks % self.heartbeat_every_ticks == 0 {
                    self.persist_locked(&live.timer).await;
                    self.events.emit(AppEvent::TimerHeartbeat {
                        snapshot: TimerSnapshot::of(&live.timer),
                    });
                }
                true
            }
            TickOutcome::Completed(completion) => {
                self.finish_locked(completion).await;
                self.emit_state(&live.timer);
                false
            }
        }
    }

    async fn finish_locked(&self, completion: Completion) {
        let Completion {
            record,
            completed_mode,
            next_mode,
            pomodoro_count,
            ..
        } = completion;

        info!(
            "{} session complete ({} min, subject {:?}); next up: {}",
            completed_mode.as_str(),
            record.duration_minutes,
            record.subject,
            next_mode.as_str()
        );

        if let Err(err) = self.db.append_session_record(&record).await {
            error!("Failed to record completed session {}: {err:#}", record.id);
        }
        self.continuity.clear().await;
        if let Err(err) = self.continuity.store().save_pomodoro_count(pomodoro_count).await {
            error!("Failed to persist pomodoro count: {err:#}");
        }

        self.events.emit(AppEvent::SessionCompleted {
            record,
            next_mode,
            pomodoro_count,
        });
        self.events.toast(completion_message(completed_mode, next_mode));
    }

    /// Idle sessions have nothing to resume, so their record is removed.
    async fn persist_locked(&self, timer: &FocusTimer) {
        if timer.status() == TimerStatus::Idle {
            self.continuity.clear().await;
            return;
        }
        if let Err(err) = self
            .continuity
            .checkpoint(timer.session(), timer.pomodoro_count())
            .await
        {
            error!("Failed to persist timer session: {err:#}");
        }
    }

    fn emit_state(&self, timer: &FocusTimer) {
        self.events.emit(AppEvent::TimerStateChanged {
            snapshot: TimerSnapshot::of(timer),
        });
    }
}

fn completion_message(completed: TimerMode, next: TimerMode) -> &'static str {
    match (completed, next) {
        (TimerMode::Focus, TimerMode::LongBreak) => {
            "Focus session complete! You've earned a long break."
        }
        (TimerMode::Focus, _) => "Focus session complete! Time for a short break.",
        (TimerMode::ShortBreak | TimerMode::LongBreak, _) => "Break's over. Ready to focus?",
        (TimerMode::Custom, _) => "Custom session complete!",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        clock::FakeClock, events::drain, persistence::ACTIVE_SESSION_KEY, timer::ModeDurations,
    };
    use chrono::{Duration as ChronoDuration, NaiveDate};

    const PARKED: Duration = Duration::from_secs(3600);

    fn clock() -> FakeClock {
        FakeClock::new(
            NaiveDate::from_ymd_opt(2024, 3, 4)
                .unwrap()
                .and_hms_opt(9, 0, 0)
                .unwrap(),
        )
    }

    fn controller_with(
        db: &Database,
        clock: &FakeClock,
        settings: TimerSettings,
        tick_interval: Duration,
    ) -> (EventBus, TimerController) {
        let events = EventBus::new();
        let controller =
            TimerController::new(db.clone(), Arc::new(clock.clone()), events.clone(), &settings)
                .with_tick_interval(tick_interval);
        (events, controller)
    }

    /// A controller whose interval ticker never fires on its own, so elapsed
    /// time only moves through reconciliation.
    fn parked() -> (FakeClock, Database, EventBus, TimerController) {
        let clock = clock();
        let db = Database::open_in_memory().unwrap();
        let (events, controller) = controller_with(&db, &clock, TimerSettings::default(), PARKED);
        (clock, db, events, controller)
    }

    fn one_minute_focus(tick_source: TickSource) -> TimerSettings {
        TimerSettings {
            durations: ModeDurations {
                focus_minutes: 1,
                ..ModeDurations::default()
            },
            tick_source,
            ..TimerSettings::default()
        }
    }

    async fn wait_until_idle(controller: &TimerController) -> TimerSnapshot {
        for _ in 0..600 {
            let snapshot = controller.snapshot().await;
            if snapshot.status == TimerStatus::Idle {
                return snapshot;
            }
            time::sleep(Duration::from_millis(500)).await;
        }
        panic!("timer never completed");
    }

    #[tokio::test]
    async fn focus_start_requires_a_subject() {
        let (_clock, _db, _events, controller) = parked();
        assert!(!controller.start().await);
        assert_eq!(controller.snapshot().await.status, TimerStatus::Idle);

        assert!(controller.set_labels("Chemistry", "Titration").await);
        assert!(controller.start().await);
        assert!(!controller.start().await);

        let snapshot = controller.snapshot().await;
        assert_eq!(snapshot.status, TimerStatus::Running);
        assert_eq!(snapshot.session.subject, "Chemistry");
        assert!(!controller.set_labels("Physics", "").await);
        controller.destroy().await;
    }

    #[tokio::test]
    async fn paused_session_survives_a_reload() {
        let (clock, db, _events, controller) = parked();
        controller.set_labels("Art", "").await;
        controller.start().await;
        assert!(controller.pause().await);
        assert!(!controller.pause().await);
        controller.destroy().await;

        clock.advance(ChronoDuration::hours(2));
        let (_events, reloaded) = controller_with(&db, &clock, TimerSettings::default(), PARKED);
        reloaded.initialize().await;

        let snapshot = reloaded.snapshot().await;
        assert_eq!(snapshot.status, TimerStatus::Paused);
        assert_eq!(snapshot.session.subject, "Art");
        assert_eq!(snapshot.session.elapsed_seconds, 0);
    }

    #[tokio::test]
    async fn pause_before_first_tick_is_persisted() {
        let (_clock, db, _events, controller) = parked();
        controller.set_labels("Art", "Perspective").await;
        controller.start().await;
        assert!(controller.pause().await);

        let snapshot = controller.snapshot().await;
        assert_eq!(snapshot.status, TimerStatus::Paused);
        assert_eq!(snapshot.session.elapsed_seconds, 0);

        let stored = SessionStore::new(db).load().await.unwrap();
        assert!(!stored.session.is_running);
        assert_eq!(stored.session.subject, "Art");
        assert_eq!(stored.session.task, "Perspective");
        assert_eq!(stored.session.status(), TimerStatus::Paused);
    }

    #[tokio::test(start_paused = true)]
    async fn resume_with_unusable_store_keeps_ticking() {
        let clock = clock();
        let db = Database::open_in_memory().unwrap();
        let (_events, controller) = controller_with(
            &db,
            &clock,
            TimerSettings::default(),
            Duration::from_secs(1),
        );
        controller.set_labels("Philosophy", "").await;
        controller.start().await;
        controller.suspend().await;
        let before = controller.snapshot().await.session.elapsed_seconds;

        db.put_value(ACTIVE_SESSION_KEY, "garbage").await.unwrap();
        controller.resume().await;
        assert!(!controller.is_suspended().await);

        time::sleep(Duration::from_secs(30)).await;
        let snapshot = controller.snapshot().await;
        assert_eq!(snapshot.status, TimerStatus::Running);
        assert!(snapshot.session.elapsed_seconds > before);

        // the live session was written back over the garbage
        let stored = SessionStore::new(db).load().await.unwrap();
        assert_eq!(stored.session.subject, "Philosophy");
        controller.destroy().await;
    }

    #[tokio::test]
    async fn resume_catches_up_once() {
        let (clock, _db, _events, controller) = parked();
        controller.set_labels("Latin", "").await;
        controller.start().await;

        controller.suspend().await;
        assert!(controller.is_suspended().await);
        clock.advance(ChronoDuration::milliseconds(120_400));

        controller.resume().await;
        controller.resume().await;

        let snapshot = controller.snapshot().await;
        assert!(!controller.is_suspended().await);
        assert_eq!(snapshot.status, TimerStatus::Running);
        assert_eq!(snapshot.session.elapsed_seconds, 120);
        controller.destroy().await;
    }

    #[tokio::test]
    async fn completion_while_suspended_runs_exactly_once() {
        let (clock, _db, events, controller) = parked();
        let mut rx = events.subscribe();
        controller.set_labels("Economics", "Elasticity").await;
        controller.start().await;
        controller.suspend().await;

        clock.advance(ChronoDuration::minutes(40));
        controller.resume().await;
        controller.resume().await;

        let snapshot = controller.snapshot().await;
        assert_eq!(snapshot.status, TimerStatus::Idle);
        assert_eq!(snapshot.session.mode, TimerMode::ShortBreak);
        assert_eq!(snapshot.session.subject, "Economics");
        assert_eq!(snapshot.pomodoro_count, 1);

        let history = controller.recent_sessions(10).await;
        assert_eq!(history.len(), 1);
        assert_eq!(history[0].duration_minutes, 25);
        assert_eq!(history[0].task, "Elasticity");
        assert_eq!(controller.focus_minutes_today().await, 25);

        let emitted = drain(&mut rx);
        let completions = emitted
            .iter()
            .filter(|e| matches!(e, AppEvent::SessionCompleted { .. }))
            .count();
        let toasts = emitted
            .iter()
            .filter(|e| matches!(e, AppEvent::Toast { .. }))
            .count();
        assert_eq!(completions, 1);
        assert_eq!(toasts, 1);
    }

    #[tokio::test]
    async fn cycle_count_survives_reload_after_completion() {
        let (clock, db, _events, controller) = parked();
        controller.set_labels("Music", "").await;
        controller.start().await;
        controller.suspend().await;
        clock.advance(ChronoDuration::minutes(26));
        controller.resume().await;
        controller.destroy().await;

        let (_events, reloaded) = controller_with(&db, &clock, TimerSettings::default(), PARKED);
        reloaded.initialize().await;
        let snapshot = reloaded.snapshot().await;
        assert_eq!(snapshot.pomodoro_count, 1);
        assert_eq!(snapshot.status, TimerStatus::Idle);
    }

    #[tokio::test]
    async fn stop_discards_without_history() {
        let (clock, db, _events, controller) = parked();
        controller.set_labels("Geography", "").await;
        controller.start().await;
        controller.suspend().await;
        clock.advance(ChronoDuration::minutes(3));
        controller.resume().await;

        assert!(controller.stop().await);
        let snapshot = controller.snapshot().await;
        assert_eq!(snapshot.status, TimerStatus::Idle);
        assert_eq!(snapshot.session.elapsed_seconds, 0);
        assert!(controller.recent_sessions(10).await.is_empty());
        assert_eq!(SessionStore::new(db).load().await, None);
        assert!(!controller.stop().await);
    }

    #[tokio::test]
    async fn reload_of_an_overdue_session_completes_it() {
        let (clock, db, _events, controller) = parked();
        controller.set_labels("Statistics", "").await;
        controller.start().await;
        controller.destroy().await;

        clock.advance(ChronoDuration::hours(1));
        let (_events, reloaded) = controller_with(&db, &clock, TimerSettings::default(), PARKED);
        reloaded.initialize().await;

        let snapshot = reloaded.snapshot().await;
        assert_eq!(snapshot.session.mode, TimerMode::ShortBreak);
        assert_eq!(snapshot.status, TimerStatus::Idle);
        assert_eq!(reloaded.recent_sessions(5).await.len(), 1);
    }

    #[tokio::test]
    async fn custom_minutes_are_validated() {
        let (_clock, _db, _events, controller) = parked();
        assert!(controller.set_custom_minutes(0).await.is_err());
        assert!(controller.set_custom_minutes(181).await.is_err());

        assert!(controller.switch_mode(TimerMode::Custom).await);
        controller.set_custom_minutes(45).await.unwrap();
        assert_eq!(controller.snapshot().await.session.target_seconds, 45 * 60);

        controller.set_labels("Reading", "").await;
        controller.start().await;
        assert!(controller.set_custom_minutes(50).await.is_err());
        assert!(!controller.switch_mode(TimerMode::Focus).await);
        controller.destroy().await;
    }

    #[tokio::test]
    async fn settings_refresh_the_idle_target_but_not_a_running_one() {
        let (_clock, _db, _events, controller) = parked();
        let mut settings = TimerSettings::default();
        settings.durations.focus_minutes = 50;
        assert!(controller.apply_settings(&settings).await);
        assert_eq!(controller.snapshot().await.session.target_seconds, 3000);

        controller.set_labels("Drawing", "").await;
        controller.start().await;
        settings.durations.focus_minutes = 10;
        assert!(!controller.apply_settings(&settings).await);
        assert_eq!(controller.snapshot().await.session.target_seconds, 3000);
        controller.destroy().await;
    }

    #[tokio::test]
    async fn lifecycle_signals_drive_suspend_and_resume() {
        let (clock, _db, _events, controller) = parked();
        let (tx, rx) = mpsc::channel(4);
        controller.attach_lifecycle(rx).await;
        controller.set_labels("French", "").await;
        controller.start().await;

        tx.send(LifecycleSignal::Suspend).await.unwrap();
        while !controller.is_suspended().await {
            tokio::task::yield_now().await;
        }

        clock.advance(ChronoDuration::seconds(90));
        tx.send(LifecycleSignal::Resume).await.unwrap();
        while controller.is_suspended().await {
            tokio::task::yield_now().await;
        }

        assert_eq!(controller.snapshot().await.session.elapsed_seconds, 90);
        controller.destroy().await;
    }

    #[tokio::test(start_paused = true)]
    async fn interval_ticks_complete_a_session() {
        let clock = clock();
        let db = Database::open_in_memory().unwrap();
        let (events, controller) = controller_with(
            &db,
            &clock,
            one_minute_focus(TickSource::Interval),
            Duration::from_secs(1),
        );
        let mut rx = events.subscribe();
        controller.set_labels("Biology", "").await;
        assert!(controller.start().await);

        let snapshot = wait_until_idle(&controller).await;
        assert_eq!(snapshot.session.mode, TimerMode::ShortBreak);
        assert_eq!(snapshot.pomodoro_count, 1);

        let history = controller.recent_sessions(5).await;
        assert_eq!(history.len(), 1);
        assert_eq!(history[0].duration_minutes, 1);

        let emitted = drain(&mut rx);
        assert!(emitted
            .iter()
            .any(|e| matches!(e, AppEvent::TimerHeartbeat { .. })));
    }

    #[tokio::test(start_paused = true)]
    async fn worker_ticks_follow_the_wall_clock() {
        let clock = clock();
        let db = Database::open_in_memory().unwrap();
        let (_events, controller) = controller_with(
            &db,
            &clock,
            one_minute_focus(TickSource::Worker),
            Duration::from_secs(1),
        );
        controller.set_labels("Physics", "").await;
        assert!(controller.start().await);

        // the host throttled us: a full minute of wall time, few ticks
        clock.advance(ChronoDuration::seconds(61));
        let snapshot = wait_until_idle(&controller).await;
        assert_eq!(snapshot.session.mode, TimerMode::ShortBreak);
        assert_eq!(controller.recent_sessions(5).await.len(), 1);
    }
}
