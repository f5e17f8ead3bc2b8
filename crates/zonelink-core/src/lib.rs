// zonelink-core: Per-monitor supervision runtime between zonelink-api
// and the host platform's device registry.
//
// The heart of the crate is the refresh machinery: a priority model for
// polling urgency, an alarm escalation window that temporarily raises
// it, a per-device refresh gate, and the orchestrator that drives one
// fetch-and-publish cycle per external tick.

pub mod alarm;
pub mod channel;
pub mod config;
pub mod error;
pub mod gate;
pub mod handler;
pub mod priority;
pub mod registry;
pub mod session;
pub mod state;

// ── Primary re-exports ──────────────────────────────────────────────
pub use alarm::AlarmEscalation;
pub use channel::{ChannelId, ChannelValue};
pub use config::{MonitorConfig, MonitorId};
pub use error::CoreError;
pub use gate::{RefreshGate, RefreshGuard};
pub use handler::{Command, MonitorHandler};
pub use priority::RefreshPriority;
pub use registry::{DeviceRegistry, DeviceStatus, StatusDetail};
pub use session::ZmSession;
pub use state::MonitorState;
