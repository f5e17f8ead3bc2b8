// ── Channel identity and values ──
//
// The host platform models a device as a set of typed channels. The
// core publishes one value per channel; `Undefined` is what a channel
// shows before its data class has ever been fetched.

use bytes::Bytes;

/// The channels a supervised monitor exposes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, strum::Display)]
#[strum(serialize_all = "kebab-case")]
pub enum ChannelId {
    Online,
    Enabled,
    Function,
    ForceAlarm,
    EventState,
    EventCause,
    MotionEvent,
    RecordState,
    DetailedStatus,
    CaptureDaemonState,
    AnalysisDaemonState,
    FrameDaemonState,
    StillImage,
    VideoUrl,
}

impl ChannelId {
    /// Every channel, in publish order.
    pub const ALL: [Self; 14] = [
        Self::Online,
        Self::Enabled,
        Self::Function,
        Self::ForceAlarm,
        Self::EventState,
        Self::EventCause,
        Self::MotionEvent,
        Self::RecordState,
        Self::DetailedStatus,
        Self::CaptureDaemonState,
        Self::AnalysisDaemonState,
        Self::FrameDaemonState,
        Self::StillImage,
        Self::VideoUrl,
    ];
}

/// A published channel value.
#[derive(Debug, Clone, PartialEq)]
pub enum ChannelValue {
    OnOff(bool),
    Text(String),
    /// JPEG bytes for the still-image channel.
    Image(Bytes),
    /// No value has ever been established for this channel.
    Undefined,
}

impl ChannelValue {
    pub fn on_off(value: Option<bool>) -> Self {
        value.map_or(Self::Undefined, Self::OnOff)
    }

    pub fn text(value: Option<String>) -> Self {
        value.map_or(Self::Undefined, Self::Text)
    }

    pub fn image(value: Option<Bytes>) -> Self {
        value.map_or(Self::Undefined, Self::Image)
    }

    pub fn is_defined(&self) -> bool {
        !matches!(self, Self::Undefined)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn channel_ids_render_kebab_case() {
        assert_eq!(ChannelId::ForceAlarm.to_string(), "force-alarm");
        assert_eq!(ChannelId::CaptureDaemonState.to_string(), "capture-daemon-state");
    }

    #[test]
    fn option_constructors_map_missing_to_undefined() {
        assert_eq!(ChannelValue::on_off(None), ChannelValue::Undefined);
        assert_eq!(ChannelValue::on_off(Some(true)), ChannelValue::OnOff(true));
        assert_eq!(ChannelValue::text(None), ChannelValue::Undefined);
        assert!(!ChannelValue::Undefined.is_defined());
    }
}
