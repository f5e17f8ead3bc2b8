// zonelink-api: Async client for a ZoneMinder server.
//
// Two surfaces: the HTTP API (monitor data, daemon status, images,
// monitor commands) and the trigger port (TCP line protocol for forcing
// and observing alarms). zonelink-core maps the error taxonomy into
// user-facing diagnostics.

pub mod client;
pub mod error;
pub mod host;
pub mod models;
pub mod monitors;
pub mod transport;
pub mod trigger;

// ── Primary re-exports ──────────────────────────────────────────────
pub use client::{Credentials, ZmClient};
pub use error::Error;
pub use models::{
    AlarmState, ConfigValue, Daemon, DaemonStatus, EventData, FunctionMode, MonitorData,
    ServerVersion,
};
pub use transport::{TlsMode, TransportConfig};
pub use trigger::{TriggerClient, TriggerEvent, TriggerListener};
