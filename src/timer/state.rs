use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::ops::RangeInclusive;
use uuid::Uuid;

use crate::db::models::SessionRecord;

pub const CUSTOM_MINUTES_RANGE: RangeInclusive<u32> = 1..=180;
pub const DEFAULT_LONG_BREAK_EVERY: u32 = 4;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "camelCase")]
pub enum TimerMode {
    Focus,
    ShortBreak,
    LongBreak,
    Custom,
}

impl Default for TimerMode {
    fn default() -> Self {
        TimerMode::Focus
    }
}

impl TimerMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            TimerMode::Focus => "focus",
            TimerMode::ShortBreak => "shortBreak",
            TimerMode::LongBreak => "longBreak",
            TimerMode::Custom => "custom",
        }
    }

    /// Focus and custom sessions need a subject label before they can start.
    pub fn requires_subject(&self) -> bool {
        matches!(self, TimerMode::Focus | TimerMode::Custom)
    }

    /// Whether completing this mode bumps the cumulative pomodoro counter.
    pub fn counts_as_cycle(&self) -> bool {
        matches!(self, TimerMode::Focus | TimerMode::Custom)
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub enum TimerStatus {
    Idle,
    Running,
    Paused,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase", default)]
pub struct ModeDurations {
    pub focus_minutes: u32,
    pub short_break_minutes: u32,
    pub long_break_minutes: u32,
    pub custom_minutes: u32,
}

impl Default for ModeDurations {
    fn default() -> Self {
        Self {
            focus_minutes: 25,
            short_break_minutes: 5,
            long_break_minutes: 15,
            custom_minutes: 25,
        }
    }
}

impl ModeDurations {
    pub fn minutes_for(&self, mode: TimerMode) -> u32 {
        match mode {
            TimerMode::Focus => self.focus_minutes,
            TimerMode::ShortBreak => self.short_break_minutes,
            TimerMode::LongBreak => self.long_break_minutes,
            TimerMode::Custom => self.custom_minutes,
        }
    }

    pub fn target_seconds(&self, mode: TimerMode) -> u64 {
        u64::from(self.minutes_for(mode).max(1)) * 60
    }
}

/// One in-progress countdown. This is also the persisted shape, so field names
/// follow the camelCase storage contract.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct TimerSession {
    pub mode: TimerMode,
    pub elapsed_seconds: u64,
    pub target_seconds: u64,
    /// Wall-clock millis of the last (re)start.
    pub started_at_epoch_ms: Option<i64>,
    pub subject: String,
    pub task: String,
    pub is_running: bool,
}

impl TimerSession {
    pub fn idle(mode: TimerMode, target_seconds: u64) -> Self {
        Self {
            mode,
            elapsed_seconds: 0,
            target_seconds,
            started_at_epoch_ms: None,
            subject: String::new(),
            task: String::new(),
            is_running: false,
        }
    }

    pub fn status(&self) -> TimerStatus {
        if self.is_running {
            TimerStatus::Running
        } else if self.started_at_epoch_ms.is_some() || self.elapsed_seconds > 0 {
            // a run paused before its first tick is still a run
            TimerStatus::Paused
        } else {
            TimerStatus::Idle
        }
    }

    /// Display progress. Clamped to 100 even when the counter overshoots.
    pub fn progress_percent(&self) -> f64 {
        if self.target_seconds == 0 {
            return 100.0;
        }
        let pct = self.elapsed_seconds as f64 / self.target_seconds as f64 * 100.0;
        pct.min(100.0)
    }

    pub fn remaining_seconds(&self) -> u64 {
        self.target_seconds.saturating_sub(self.elapsed_seconds)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Completion {
    pub record: SessionRecord,
    pub completed_mode: TimerMode,
    pub next_mode: TimerMode,
    /// Elapsed count at the moment of completion, reported once before reset.
    pub final_elapsed_seconds: u64,
    pub pomodoro_count: u32,
}

#[derive(Debug, Clone, PartialEq)]
pub enum TickOutcome {
    /// The timer was not running; nothing changed.
    Ignored,
    Ticked { elapsed_seconds: u64 },
    Completed(Completion),
}

/// Pomodoro state machine. Pure: callers pass the current time in, and every
/// invalid transition is a no-op reported as `false`.
#[derive(Debug, Clone)]
pub struct FocusTimer {
    session: TimerSession,
    durations: ModeDurations,
    long_break_every: u32,
    pomodoro_count: u32,
}

impl Default for FocusTimer {
    fn default() -> Self {
        Self::new(ModeDurations::default(), DEFAULT_LONG_BREAK_EVERY)
    }
}

impl FocusTimer {
    pub fn new(durations: ModeDurations, long_break_every: u32) -> Self {
        Self {
            session: TimerSession::idle(TimerMode::Focus, durations.target_seconds(TimerMode::Focus)),
            durations,
            long_break_every: long_break_every.max(1),
            pomodoro_count: 0,
        }
    }

    pub fn session(&self) -> &TimerSession {
        &self.session
    }

    pub fn status(&self) -> TimerStatus {
        self.session.status()
    }

    pub fn is_running(&self) -> bool {
        self.session.is_running
    }

    pub fn pomodoro_count(&self) -> u32 {
        self.pomodoro_count
    }

    pub fn durations(&self) -> ModeDurations {
        self.durations
    }

    /// Replace the live session with one rebuilt from storage.
    pub fn restore(&mut self, session: TimerSession, pomodoro_count: u32) {
        self.session = session;
        self.pomodoro_count = pomodoro_count;
    }

    pub fn start(&mut self, now: DateTime<Utc>) -> bool {
        if self.session.is_running {
            return false;
        }
        if self.session.mode.requires_subject() && self.session.subject.trim().is_empty() {
            return false;
        }
        self.session.started_at_epoch_ms = Some(now.timestamp_millis());
        self.session.is_running = true;
        true
    }

    pub fn pause(&mut self) -> bool {
        if !self.session.is_running {
            return false;
        }
        self.session.is_running = false;
        true
    }

    /// Discard the current run. No history record is written.
    pub fn stop(&mut self) -> bool {
        let changed = self.session.status() != TimerStatus::Idle;
        self.session.elapsed_seconds = 0;
        self.session.is_running = false;
        self.session.started_at_epoch_ms = None;
        changed
    }

    pub fn tick(&mut self, now: DateTime<Utc>) -> TickOutcome {
        self.advance(1, now)
    }

    /// Add `seconds` to a running session and complete it if the target is hit.
    pub fn advance(&mut self, seconds: u64, now: DateTime<Utc>) -> TickOutcome {
        if !self.session.is_running {
            return TickOutcome::Ignored;
        }
        self.session.elapsed_seconds = self.session.elapsed_seconds.saturating_add(seconds);
        self.settle(now)
    }

    /// Move a running session forward to an absolute elapsed count. Counts
    /// behind the live value are ignored so elapsed time never decreases.
    pub fn advance_to(&mut self, elapsed_seconds: u64, now: DateTime<Utc>) -> TickOutcome {
        let delta = elapsed_seconds.saturating_sub(self.session.elapsed_seconds);
        self.advance(delta, now)
    }

    /// Complete the session if a running count has reached its target.
    pub fn settle(&mut self, now: DateTime<Utc>) -> TickOutcome {
        if !self.session.is_running {
            return TickOutcome::Ignored;
        }
        if self.session.elapsed_seconds >= self.session.target_seconds {
            TickOutcome::Completed(self.complete_session(now))
        } else {
            TickOutcome::Ticked {
                elapsed_seconds: self.session.elapsed_seconds,
            }
        }
    }

    fn complete_session(&mut self, now: DateTime<Utc>) -> Completion {
        let finished = self.session.clone();
        let completed_mode = finished.mode;

        if completed_mode.counts_as_cycle() {
            self.pomodoro_count = self.pomodoro_count.saturating_add(1);
        }

        let next_mode = match completed_mode {
            TimerMode::Focus if self.pomodoro_count % self.long_break_every == 0 => {
                TimerMode::LongBreak
            }
            TimerMode::Focus => TimerMode::ShortBreak,
            TimerMode::ShortBreak | TimerMode::LongBreak => TimerMode::Focus,
            TimerMode::Custom => TimerMode::Custom,
        };

        let record = SessionRecord {
            id: Uuid::new_v4().to_string(),
            subject: finished.subject.clone(),
            task: finished.task.clone(),
            duration_minutes: finished.target_seconds / 60,
            completed_at: now,
            mode: completed_mode,
        };

        let mut next = TimerSession::idle(next_mode, self.durations.target_seconds(next_mode));
        next.subject = finished.subject;
        next.task = finished.task;
        self.session = next;

        Completion {
            record,
            completed_mode,
            next_mode,
            final_elapsed_seconds: finished.elapsed_seconds,
            pomodoro_count: self.pomodoro_count,
        }
    }

    pub fn switch_mode(&mut self, mode: TimerMode) -> bool {
        if self.session.is_running {
            return false;
        }
        self.session.mode = mode;
        self.session.elapsed_seconds = 0;
        self.session.started_at_epoch_ms = None;
        self.session.target_seconds = self.durations.target_seconds(mode);
        true
    }

    pub fn set_labels(&mut self, subject: &str, task: &str) -> bool {
        if self.session.is_running {
            return false;
        }
        self.session.subject = subject.trim().to_string();
        self.session.task = task.trim().to_string();
        true
    }

    pub fn set_custom_minutes(&mut self, minutes: u32) -> bool {
        if self.session.is_running || !CUSTOM_MINUTES_RANGE.contains(&minutes) {
            return false;
        }
        self.durations.custom_minutes = minutes;
        if self.session.mode == TimerMode::Custom {
            self.session.target_seconds = self.durations.target_seconds(TimerMode::Custom);
            self.session.elapsed_seconds = 0;
            self.session.started_at_epoch_ms = None;
        }
        true
    }

    /// Swap in new configured durations. An idle session picks up its new target.
    pub fn apply_durations(&mut self, durations: ModeDurations, long_break_every: u32) -> bool {
        if self.session.is_running {
            return false;
        }
        self.durations = durations;
        self.long_break_every = long_break_every.max(1);
        if self.session.status() == TimerStatus::Idle {
            self.session.target_seconds = durations.target_seconds(self.session.mode);
        }
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use rand::{rngs::StdRng, Rng, SeedableRng};

    fn t0() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 3, 4, 9, 0, 0).unwrap()
    }

    fn focus_timer() -> FocusTimer {
        let mut timer = FocusTimer::default();
        timer.set_labels("Physics", "Chapter 3");
        timer
    }

    fn run_to_completion(timer: &mut FocusTimer) -> Completion {
        assert!(timer.start(t0()));
        loop {
            match timer.tick(t0()) {
                TickOutcome::Completed(c) => return c,
                TickOutcome::Ticked { .. } => {}
                TickOutcome::Ignored => panic!("timer stopped ticking"),
            }
        }
    }

    #[test]
    fn focus_session_completes_into_short_break() {
        let mut timer = focus_timer();
        assert_eq!(timer.session().target_seconds, 1500);
        assert!(timer.start(t0()));

        let mut completions = Vec::new();
        for _ in 0..1500 {
            if let TickOutcome::Completed(c) = timer.tick(t0()) {
                completions.push(c);
            }
        }

        assert_eq!(completions.len(), 1);
        let completion = &completions[0];
        assert_eq!(completion.final_elapsed_seconds, 1500);
        assert_eq!(completion.next_mode, TimerMode::ShortBreak);
        assert_eq!(completion.record.duration_minutes, 25);
        assert_eq!(completion.record.subject, "Physics");
        assert_eq!(timer.pomodoro_count(), 1);
        assert_eq!(timer.session().mode, TimerMode::ShortBreak);
        assert_eq!(timer.session().elapsed_seconds, 0);
        assert!(!timer.is_running());
    }

    #[test]
    fn fourth_focus_cycle_earns_long_break() {
        let mut timer = focus_timer();
        let mut next_modes = Vec::new();
        for _ in 0..4 {
            next_modes.push(run_to_completion(&mut timer).next_mode);
            // take the break, then come back to focus
            let back = run_to_completion(&mut timer);
            assert_eq!(back.next_mode, TimerMode::Focus);
        }
        assert_eq!(
            next_modes,
            vec![
                TimerMode::ShortBreak,
                TimerMode::ShortBreak,
                TimerMode::ShortBreak,
                TimerMode::LongBreak
            ]
        );
        assert_eq!(run_to_completion(&mut timer).next_mode, TimerMode::ShortBreak);
    }

    #[test]
    fn custom_mode_chains_to_itself_but_counts() {
        let mut timer = focus_timer();
        assert!(timer.set_custom_minutes(1));
        assert!(timer.switch_mode(TimerMode::Custom));
        assert_eq!(timer.session().target_seconds, 60);

        let completion = run_to_completion(&mut timer);
        assert_eq!(completion.next_mode, TimerMode::Custom);
        assert_eq!(completion.pomodoro_count, 1);
        assert_eq!(timer.session().mode, TimerMode::Custom);
        assert_eq!(timer.session().target_seconds, 60);
    }

    #[test]
    fn custom_minutes_outside_range_are_rejected() {
        let mut timer = focus_timer();
        assert!(!timer.set_custom_minutes(0));
        assert!(!timer.set_custom_minutes(181));
        assert!(timer.set_custom_minutes(180));
    }

    #[test]
    fn start_requires_subject_for_focus() {
        let mut timer = FocusTimer::default();
        assert!(!timer.start(t0()));
        assert_eq!(timer.status(), TimerStatus::Idle);

        assert!(timer.switch_mode(TimerMode::ShortBreak));
        assert!(timer.start(t0()));
    }

    #[test]
    fn repeated_calls_are_no_ops() {
        let mut timer = focus_timer();
        assert!(timer.start(t0()));
        assert!(!timer.start(t0()));
        assert!(!timer.switch_mode(TimerMode::LongBreak));
        assert!(!timer.set_labels("Other", ""));
        assert!(timer.pause());
        assert!(!timer.pause());
        assert_eq!(timer.status(), TimerStatus::Paused);
    }

    #[test]
    fn pause_before_first_tick_keeps_the_run() {
        let mut timer = focus_timer();
        assert!(timer.start(t0()));
        assert!(timer.pause());

        assert_eq!(timer.session().elapsed_seconds, 0);
        assert_eq!(timer.status(), TimerStatus::Paused);
        assert_eq!(timer.session().subject, "Physics");

        // paused runs keep their target when durations change
        let mut longer = ModeDurations::default();
        longer.focus_minutes = 50;
        timer.apply_durations(longer, DEFAULT_LONG_BREAK_EVERY);
        assert_eq!(timer.session().target_seconds, 1500);

        assert!(timer.stop());
        assert_eq!(timer.status(), TimerStatus::Idle);
    }

    #[test]
    fn pause_freezes_elapsed_and_resume_records_restart() {
        let mut timer = focus_timer();
        timer.start(t0());
        for _ in 0..10 {
            timer.tick(t0());
        }
        timer.pause();
        for _ in 0..50 {
            assert_eq!(timer.tick(t0()), TickOutcome::Ignored);
        }
        assert_eq!(timer.session().elapsed_seconds, 10);
        assert_eq!(timer.status(), TimerStatus::Paused);

        let later = t0() + chrono::Duration::minutes(3);
        assert!(timer.start(later));
        assert_eq!(timer.session().started_at_epoch_ms, Some(later.timestamp_millis()));
        assert_eq!(timer.session().elapsed_seconds, 10);
    }

    #[test]
    fn stop_discards_progress_without_completion() {
        let mut timer = focus_timer();
        timer.start(t0());
        for _ in 0..100 {
            timer.tick(t0());
        }
        assert!(timer.stop());
        assert_eq!(timer.status(), TimerStatus::Idle);
        assert_eq!(timer.pomodoro_count(), 0);
        assert!(!timer.stop());
    }

    #[test]
    fn large_advance_completes_once_and_reports_overshoot() {
        let mut timer = focus_timer();
        timer.start(t0());
        match timer.advance(2000, t0()) {
            TickOutcome::Completed(c) => assert_eq!(c.final_elapsed_seconds, 2000),
            other => panic!("expected completion, got {other:?}"),
        }
        assert_eq!(timer.advance(10, t0()), TickOutcome::Ignored);
    }

    #[test]
    fn advance_to_never_moves_backwards() {
        let mut timer = focus_timer();
        timer.start(t0());
        timer.advance_to(30, t0());
        assert_eq!(
            timer.advance_to(12, t0()),
            TickOutcome::Ticked { elapsed_seconds: 30 }
        );
    }

    #[test]
    fn progress_clamps_for_display_only() {
        let mut session = TimerSession::idle(TimerMode::Focus, 100);
        session.elapsed_seconds = 150;
        assert_eq!(session.progress_percent(), 100.0);
        assert_eq!(session.remaining_seconds(), 0);
        session.elapsed_seconds = 25;
        assert_eq!(session.progress_percent(), 25.0);
    }

    #[test]
    fn random_operation_sequences_keep_elapsed_monotonic_while_running() {
        let mut rng = StdRng::seed_from_u64(0x5eed);
        for _ in 0..200 {
            let mut timer = focus_timer();
            timer.apply_durations(
                ModeDurations {
                    focus_minutes: 1,
                    ..ModeDurations::default()
                },
                DEFAULT_LONG_BREAK_EVERY,
            );
            let mut completions = 0;
            for _ in 0..300 {
                let before = timer.session().clone();
                match rng.gen_range(0..10) {
                    0 => {
                        timer.start(t0());
                    }
                    1 => {
                        timer.pause();
                    }
                    _ => match timer.tick(t0()) {
                        TickOutcome::Completed(c) => {
                            assert!(c.final_elapsed_seconds >= before.target_seconds);
                            completions += 1;
                            continue;
                        }
                        TickOutcome::Ticked { elapsed_seconds } => {
                            assert!(before.is_running);
                            assert_eq!(elapsed_seconds, before.elapsed_seconds + 1);
                        }
                        TickOutcome::Ignored => {
                            assert!(!before.is_running);
                            assert_eq!(timer.session().elapsed_seconds, before.elapsed_seconds);
                        }
                    },
                }
                assert!(timer.session().elapsed_seconds >= before.elapsed_seconds);
                if timer.is_running() {
                    assert!(timer.session().elapsed_seconds < timer.session().target_seconds);
                }
            }
            assert!(timer.pomodoro_count() as usize <= completions);
        }
    }
}
