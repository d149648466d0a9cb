pub mod alarms;
pub mod audio;
pub mod clock;
pub mod continuity;
pub mod db;
pub mod events;
pub mod notify;
pub mod persistence;
pub mod settings;
pub mod timer;
pub mod utils;

use anyhow::{Context, Result};
use std::{path::PathBuf, sync::Arc};

use alarms::AlarmScheduler;
use audio::ToneEngineHandle;
use clock::{Clock, SystemClock};
use db::Database;
use events::EventBus;
use notify::LogNotifier;
use persistence::AlarmStore;
use settings::SettingsStore;
use timer::TimerController;

const DATA_DIR_ENV: &str = "STUDYTRACK_DATA_DIR";

/// Root wiring: every long-lived service plus the bus they report on.
pub struct App {
    pub db: Database,
    pub settings: SettingsStore,
    pub events: EventBus,
    pub timer: TimerController,
    pub alarms: AlarmScheduler,
}

impl App {
    pub fn open(data_dir: PathBuf) -> Result<Self> {
        std::fs::create_dir_all(&data_dir)
            .with_context(|| format!("Failed to create data dir {}", data_dir.display()))?;

        let db = Database::new(data_dir.join("studytrack.sqlite3"))?;
        let settings = SettingsStore::new(data_dir.join("settings.json"))?;
        let clock: Arc<dyn Clock> = Arc::new(SystemClock);
        let events = EventBus::new();

        let timer = TimerController::new(
            db.clone(),
            clock.clone(),
            events.clone(),
            &settings.timer_settings(),
        );
        let alarms = AlarmScheduler::new(
            AlarmStore::new(db.clone()),
            clock,
            Arc::new(ToneEngineHandle::new()),
            Arc::new(LogNotifier),
            events.clone(),
        );

        Ok(Self {
            db,
            settings,
            events,
            timer,
            alarms,
        })
    }

    pub async fn initialize(&self) {
        self.timer.initialize().await;
        self.alarms.initialize().await;
    }

    pub async fn destroy(&self) {
        self.alarms.destroy().await;
        self.timer.destroy().await;
    }
}

pub fn resolve_data_dir() -> PathBuf {
    if let Some(dir) = std::env::var_os(DATA_DIR_ENV).filter(|v| !v.is_empty()) {
        return PathBuf::from(dir);
    }
    dirs::data_local_dir()
        .map(|dir| dir.join("studytrack"))
        .unwrap_or_else(|| PathBuf::from("studytrack-data"))
}

pub async fn run() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    log::info!("StudyTrack starting up...");

    let data_dir = resolve_data_dir();
    let app = App::open(data_dir.clone())?;
    log::info!("Using data directory {}", data_dir.display());

    app.initialize().await;

    let mut events = app.events.subscribe();
    let forwarder = tokio::spawn(async move {
        while let Ok(event) = events.recv().await {
            match serde_json::to_string(&event) {
                Ok(json) => log::debug!("event: {json}"),
                Err(err) => log::warn!("Failed to serialize event: {err}"),
            }
        }
    });

    tokio::signal::ctrl_c()
        .await
        .context("Failed to listen for shutdown signal")?;

    log::info!("Shutting down...");
    app.destroy().await;
    forwarder.abort();
    Ok(())
}
