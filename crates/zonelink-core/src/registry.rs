// ── Device registry boundary ──
//
// The host platform owns the channel/type system and device lifecycle;
// the core only pushes values and status through this trait. One
// registry handle per supervised device.

use crate::channel::{ChannelId, ChannelValue};

/// Overall device availability as reported to the host.
#[derive(Debug, Clone, Copy, PartialEq, Eq, strum::Display)]
pub enum DeviceStatus {
    Online,
    Offline,
}

/// Why a device is offline.
#[derive(Debug, Clone, Copy, PartialEq, Eq, strum::Display)]
pub enum StatusDetail {
    None,
    BridgeOffline,
    ConfigurationError,
    CommunicationError,
}

/// Host-side sink for one device's channel values and status.
pub trait DeviceRegistry: Send + Sync {
    /// Push one channel's current value.
    fn publish(&self, channel: ChannelId, value: ChannelValue);

    /// Whether anything on the host side consumes this channel.
    ///
    /// Expensive data classes (still image, daemon states) are only
    /// fetched for linked channels.
    fn channel_linked(&self, channel: ChannelId) -> bool;

    /// Report device availability. Only called on actual transitions.
    fn set_device_status(&self, status: DeviceStatus, detail: StatusDetail, description: &str);
}
