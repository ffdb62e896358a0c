//! Event system for UI decoupling.
//!
//! Allows the CLI (or any other front end) to follow an update pass without
//! coupling to the session internals.

use std::fmt;

/// Log level for events.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogLevel {
    Trace,
    Debug,
    Info,
    Warn,
    Error,
}

/// Update session phases.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum UpdatePhase {
    #[default]
    Idle,
    /// Writing the password.
    Authenticating,
    /// Switching the device into its update mode.
    ModeEntry,
    Erasing,
    Programming,
    Verifying,
    /// Password clear and reboot.
    Finalizing,
    Success,
    Failed,
}

impl UpdatePhase {
    pub fn is_terminal(&self) -> bool {
        matches!(self, UpdatePhase::Success | UpdatePhase::Failed)
    }
}

impl fmt::Display for UpdatePhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            UpdatePhase::Idle => write!(f, "Idle"),
            UpdatePhase::Authenticating => write!(f, "Authenticating"),
            UpdatePhase::ModeEntry => write!(f, "Mode Entry"),
            UpdatePhase::Erasing => write!(f, "Erasing"),
            UpdatePhase::Programming => write!(f, "Programming"),
            UpdatePhase::Verifying => write!(f, "Verifying"),
            UpdatePhase::Finalizing => write!(f, "Finalizing"),
            UpdatePhase::Success => write!(f, "Success"),
            UpdatePhase::Failed => write!(f, "Failed"),
        }
    }
}

/// Events emitted by the update session.
#[derive(Debug, Clone)]
pub enum UpdateEvent {
    PhaseChanged { from: UpdatePhase, to: UpdatePhase },
    /// Progress of the current phase, `percent` in 0..=100.
    Progress {
        phase: UpdatePhase,
        address: u32,
        percent: u8,
    },
    Log { level: LogLevel, message: String },
    /// Host and device checksums after verification.
    CrcReport { local: u16, device: u16 },
    Error { message: String },
    /// Update pass completed successfully.
    Complete,
}

/// `round(100 * done / total)`, clamped to 100. Zero total reads as done.
pub fn progress_percent(done: u64, total: u64) -> u8 {
    if total == 0 {
        return 100;
    }
    let pct = (done * 100 + total / 2) / total;
    pct.min(100) as u8
}

/// Observer trait for receiving update events.
///
/// Implement this trait in your UI layer to receive updates.
pub trait UpdateObserver: Send + Sync {
    /// Called when an event occurs.
    fn on_event(&self, event: &UpdateEvent);
}

impl<O: UpdateObserver + ?Sized> UpdateObserver for &O {
    fn on_event(&self, event: &UpdateEvent) {
        (**self).on_event(event)
    }
}

/// No-op observer that discards all events.
pub struct NullObserver;

impl UpdateObserver for NullObserver {
    fn on_event(&self, _event: &UpdateEvent) {}
}

/// Observer that logs events using tracing.
pub struct TracingObserver;

impl UpdateObserver for TracingObserver {
    fn on_event(&self, event: &UpdateEvent) {
        match event {
            UpdateEvent::PhaseChanged { from, to } => {
                tracing::info!(from = %from, to = %to, "Phase changed");
            }
            UpdateEvent::Progress {
                phase,
                address,
                percent,
            } => {
                tracing::debug!(
                    phase = %phase,
                    address = %format!("0x{:04X}", address),
                    progress = %format!("{}%", percent),
                    "Progress"
                );
            }
            UpdateEvent::Log { level, message } => match level {
                LogLevel::Trace => tracing::trace!("{}", message),
                LogLevel::Debug => tracing::debug!("{}", message),
                LogLevel::Info => tracing::info!("{}", message),
                LogLevel::Warn => tracing::warn!("{}", message),
                LogLevel::Error => tracing::error!("{}", message),
            },
            UpdateEvent::CrcReport { local, device } => {
                tracing::info!(
                    local = %format!("0x{:04X}", local),
                    device = %format!("0x{:04X}", device),
                    "CRC report"
                );
            }
            UpdateEvent::Error { message } => {
                tracing::error!("Error: {}", message);
            }
            UpdateEvent::Complete => {
                tracing::info!("Update complete");
            }
        }
    }
}
