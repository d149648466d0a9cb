//! Off-loop ticking helper.
//!
//! The worker owns no timer state. It receives `Start`/`Stop` commands and
//! sends back the elapsed count computed from the wall clock, so a throttled
//! or late tick corrects itself instead of accumulating lag.

use std::{sync::Arc, time::Duration};
use tokio::{sync::mpsc, task::JoinHandle, time::MissedTickBehavior};

use crate::clock::Clock;

const ENABLE_LOGS: bool = false;

use crate::log_debug;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WorkerCommand {
    /// Begin ticking; `base_elapsed_seconds` were already on the clock at
    /// `anchor_epoch_ms`.
    Start {
        anchor_epoch_ms: i64,
        base_elapsed_seconds: u64,
    },
    Stop,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WorkerTick {
    pub elapsed_seconds: u64,
}

pub struct TickWorker {
    commands: mpsc::UnboundedSender<WorkerCommand>,
    handle: JoinHandle<()>,
}

impl TickWorker {
    pub fn spawn(
        clock: Arc<dyn Clock>,
        interval: Duration,
    ) -> (Self, mpsc::UnboundedReceiver<WorkerTick>) {
        let (command_tx, command_rx) = mpsc::unbounded_channel();
        let (tick_tx, tick_rx) = mpsc::unbounded_channel();
        let handle = tokio::spawn(worker_loop(clock, interval, command_rx, tick_tx));
        (
            Self {
                commands: command_tx,
                handle,
            },
            tick_rx,
        )
    }

    pub fn start(&self, anchor_epoch_ms: i64, base_elapsed_seconds: u64) {
        let _ = self.commands.send(WorkerCommand::Start {
            anchor_epoch_ms,
            base_elapsed_seconds,
        });
    }

    pub fn stop(&self) {
        let _ = self.commands.send(WorkerCommand::Stop);
    }

    pub fn shutdown(self) {
        self.stop();
        self.handle.abort();
    }
}

async fn worker_loop(
    clock: Arc<dyn Clock>,
    interval: Duration,
    mut commands: mpsc::UnboundedReceiver<WorkerCommand>,
    ticks: mpsc::UnboundedSender<WorkerTick>,
) {
    let mut ticker = tokio::time::interval(interval);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
    let mut anchor: Option<(i64, u64)> = None;

    loop {
        tokio::select! {
            command = commands.recv() => match command {
                Some(WorkerCommand::Start { anchor_epoch_ms, base_elapsed_seconds }) => {
                    anchor = Some((anchor_epoch_ms, base_elapsed_seconds));
                    ticker.reset();
                }
                Some(WorkerCommand::Stop) => anchor = None,
                None => break,
            },
            _ = ticker.tick(), if anchor.is_some() => {
                let Some((anchor_ms, base)) = anchor else { continue };
                let since_anchor = (clock.epoch_ms() - anchor_ms).max(0) as u64 / 1000;
                let elapsed_seconds = base.saturating_add(since_anchor);
                log_debug!("worker tick: {elapsed_seconds}s");
                if ticks.send(WorkerTick { elapsed_seconds }).is_err() {
                    break;
                }
            }
        }
    }
}
