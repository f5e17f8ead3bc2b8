// ── Per-monitor configuration snapshot ──
//
// Built by the host from whatever configuration source it owns and
// handed in at handler construction -- the core never reads config
// files or discovers monitors itself.

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::priority::RefreshPriority;

/// Stable identifier of a monitor on the ZoneMinder server.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct MonitorId(pub u32);

impl std::fmt::Display for MonitorId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Configuration for supervising a single monitor.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MonitorConfig {
    /// The monitor to supervise.
    pub id: MonitorId,

    /// Scale (percent) for still images and stream URLs.
    pub image_scale: u32,

    /// How long a locally forced alarm stays up before the escalation
    /// window auto-expires (seconds).
    pub alarm_timeout_secs: u64,

    /// Free text attached to events this binding forces.
    pub event_text: String,

    /// Still-image refresh urgency while the monitor is quiet.
    pub image_refresh_idle: RefreshPriority,

    /// Still-image refresh urgency while the monitor is alarmed.
    pub image_refresh_alarm: RefreshPriority,
}

impl MonitorConfig {
    pub fn new(id: MonitorId) -> Self {
        Self {
            id,
            image_scale: 100,
            alarm_timeout_secs: 60,
            event_text: "Triggered from Zonelink".into(),
            image_refresh_idle: RefreshPriority::Disabled,
            image_refresh_alarm: RefreshPriority::Alarm,
        }
    }

    pub fn alarm_timeout(&self) -> Duration {
        Duration::from_secs(self.alarm_timeout_secs)
    }
}
