//! System notification and vibration backends.
//!
//! Every capability is checked once when the scheduler starts. Unsupported or
//! denied capabilities turn the matching call sites into no-ops.

use log::info;
use std::sync::Mutex;

pub const VIBRATION_PATTERN_MS: [u64; 3] = [200, 100, 200];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Capabilities {
    pub notifications: bool,
    pub vibration: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NotificationPermission {
    Granted,
    Denied,
}

pub trait Notifier: Send + Sync {
    fn capabilities(&self) -> Capabilities;

    /// Asked at most once per scheduler lifetime.
    fn request_permission(&self) -> NotificationPermission;

    fn show(&self, title: &str, body: &str) -> Result<(), String>;

    fn vibrate(&self, pattern_ms: &[u64]) -> Result<(), String>;
}

/// Headless notifier: notifications go to the log, vibration is unsupported.
#[derive(Debug, Default, Clone, Copy)]
pub struct LogNotifier;

impl Notifier for LogNotifier {
    fn capabilities(&self) -> Capabilities {
        Capabilities {
            notifications: true,
            vibration: false,
        }
    }

    fn request_permission(&self) -> NotificationPermission {
        NotificationPermission::Granted
    }

    fn show(&self, title: &str, body: &str) -> Result<(), String> {
        info!("[notification] {title}: {body}");
        Ok(())
    }

    fn vibrate(&self, _pattern_ms: &[u64]) -> Result<(), String> {
        Err("vibration is not supported on this host".into())
    }
}

/// Caches the outcome of the one-time permission prompt.
#[derive(Debug, Default)]
pub struct PermissionGate {
    state: Mutex<Option<NotificationPermission>>,
}

impl PermissionGate {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn ensure(&self, notifier: &dyn Notifier) -> NotificationPermission {
        let mut guard = match self.state.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        *guard.get_or_insert_with(|| notifier.request_permission())
    }
}
