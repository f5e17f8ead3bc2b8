// ── Monitor channel state ──
//
// Last-known typed values for every data class, plus the dirty counter
// that coalesces change notifications into a single republish pass.
// Fields keep their previous value when a fetch fails; `Undefined` is
// only ever published for a data class that has never been fetched.
//
// Setters report whether the value actually changed and leave the
// dirty counter alone -- callers coalesce a batch of changes into one
// `request_refresh`.

use std::sync::atomic::{AtomicI64, Ordering};
use std::sync::{Mutex, PoisonError};

use bytes::Bytes;
use zonelink_api::{AlarmState, FunctionMode, MonitorData};

use crate::channel::{ChannelId, ChannelValue};
use crate::registry::DeviceRegistry;

#[derive(Debug, Default)]
struct Fields {
    general: Option<MonitorData>,
    alarm_state: Option<AlarmState>,
    enabled: Option<bool>,
    function: Option<FunctionMode>,
    force_alarm: Option<bool>,
    event_cause: Option<String>,
    capture_daemon: Option<bool>,
    analysis_daemon: Option<bool>,
    frame_daemon: Option<bool>,
    still_image: Option<Bytes>,
    video_url: Option<String>,
    online: bool,
}

/// Channel state for one supervised monitor.
pub struct MonitorState {
    fields: Mutex<Fields>,
    // Dirty counter: channels are "fresh" only at zero. Starts at 1 so
    // the first cycle always publishes.
    pending_refresh: AtomicI64,
}

impl MonitorState {
    pub fn new() -> Self {
        Self {
            fields: Mutex::new(Fields::default()),
            pending_refresh: AtomicI64::new(1),
        }
    }

    // ── Dirty counter ────────────────────────────────────────────────

    /// Note that something changed and the channels need republishing.
    pub fn request_refresh(&self) {
        self.pending_refresh.fetch_add(1, Ordering::AcqRel);
    }

    /// Note that a republish pass completed: every channel's current
    /// value just went out, so nothing is pending anymore.
    pub fn mark_published(&self) {
        self.pending_refresh.store(0, Ordering::Release);
    }

    /// Channels reflect the current state only when nothing is pending.
    pub fn is_fresh(&self) -> bool {
        self.pending_refresh.load(Ordering::Acquire) == 0
    }

    // ── Derived conditions ───────────────────────────────────────────

    /// Whether the monitor is currently in an active alarm condition.
    ///
    /// A device condition, distinct from alarm *priority*: it selects
    /// polling intervals, not lock behavior.
    pub fn alarmed(&self) -> bool {
        let fields = self.lock();
        fields.force_alarm == Some(true)
            || fields.alarm_state.is_some_and(AlarmState::is_active)
    }

    pub fn function(&self) -> Option<FunctionMode> {
        self.lock().function
    }

    pub fn enabled(&self) -> Option<bool> {
        self.lock().enabled
    }

    // ── Setters (return true when the value actually changed) ────────

    pub fn set_general_data(&self, data: MonitorData) -> bool {
        let mut fields = self.lock();
        let mut changed = false;

        if fields.enabled != Some(data.enabled) {
            fields.enabled = Some(data.enabled);
            changed = true;
        }
        if fields.function != Some(data.function) {
            fields.function = Some(data.function);
            changed = true;
        }
        if fields.general.as_ref() != Some(&data) {
            fields.general = Some(data);
            changed = true;
        }
        changed
    }

    pub fn set_alarm_state(&self, state: AlarmState) -> bool {
        self.update(|f| &mut f.alarm_state, Some(state))
    }

    pub fn set_enabled(&self, enabled: bool) -> bool {
        self.update(|f| &mut f.enabled, Some(enabled))
    }

    pub fn set_function(&self, function: FunctionMode) -> bool {
        self.update(|f| &mut f.function, Some(function))
    }

    pub fn set_force_alarm(&self, active: bool) -> bool {
        self.update(|f| &mut f.force_alarm, Some(active))
    }

    /// Set or clear the cause text behind the event-cause channel.
    pub fn set_event_cause(&self, cause: Option<String>) -> bool {
        self.update(|f| &mut f.event_cause, cause)
    }

    pub fn set_capture_daemon(&self, running: bool) -> bool {
        self.update(|f| &mut f.capture_daemon, Some(running))
    }

    pub fn set_analysis_daemon(&self, running: bool) -> bool {
        self.update(|f| &mut f.analysis_daemon, Some(running))
    }

    pub fn set_frame_daemon(&self, running: bool) -> bool {
        self.update(|f| &mut f.frame_daemon, Some(running))
    }

    pub fn set_still_image(&self, image: Bytes) -> bool {
        self.update(|f| &mut f.still_image, Some(image))
    }

    pub fn set_video_url(&self, url: String) -> bool {
        self.update(|f| &mut f.video_url, Some(url))
    }

    pub fn set_online(&self, online: bool) -> bool {
        let mut fields = self.lock();
        if fields.online == online {
            false
        } else {
            fields.online = online;
            true
        }
    }

    // ── Channel projection ───────────────────────────────────────────

    /// The value the given channel currently publishes.
    pub fn value(&self, channel: ChannelId) -> ChannelValue {
        let fields = self.lock();
        match channel {
            ChannelId::Online => ChannelValue::OnOff(fields.online),
            ChannelId::Enabled => ChannelValue::on_off(fields.enabled),
            ChannelId::Function => {
                ChannelValue::text(fields.function.map(|f| f.to_string()))
            }
            ChannelId::ForceAlarm => ChannelValue::on_off(fields.force_alarm),
            ChannelId::EventState => {
                if fields.alarm_state.is_none() && fields.force_alarm.is_none() {
                    ChannelValue::Undefined
                } else {
                    ChannelValue::OnOff(
                        fields.force_alarm == Some(true)
                            || fields.alarm_state.is_some_and(AlarmState::is_active),
                    )
                }
            }
            ChannelId::EventCause => ChannelValue::text(fields.event_cause.clone()),
            ChannelId::MotionEvent => {
                ChannelValue::on_off(fields.alarm_state.map(|s| s == AlarmState::Alarm))
            }
            ChannelId::RecordState => match (fields.enabled, fields.function) {
                (Some(enabled), Some(function)) => {
                    ChannelValue::OnOff(enabled && function.records())
                }
                _ => ChannelValue::Undefined,
            },
            ChannelId::DetailedStatus => {
                ChannelValue::text(fields.alarm_state.map(|s| s.to_string()))
            }
            ChannelId::CaptureDaemonState => ChannelValue::on_off(fields.capture_daemon),
            ChannelId::AnalysisDaemonState => ChannelValue::on_off(fields.analysis_daemon),
            ChannelId::FrameDaemonState => ChannelValue::on_off(fields.frame_daemon),
            ChannelId::StillImage => ChannelValue::image(fields.still_image.clone()),
            ChannelId::VideoUrl => ChannelValue::text(fields.video_url.clone()),
        }
    }

    /// Push every channel's current value to the registry.
    pub fn publish_all(&self, registry: &dyn DeviceRegistry) {
        for channel in ChannelId::ALL {
            registry.publish(channel, self.value(channel));
        }
    }

    // ── Helpers ──────────────────────────────────────────────────────

    fn update<T: PartialEq>(&self, field: impl FnOnce(&mut Fields) -> &mut T, value: T) -> bool {
        let mut fields = self.lock();
        let slot = field(&mut fields);
        if *slot == value {
            false
        } else {
            *slot = value;
            true
        }
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Fields> {
        self.fields.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl Default for MonitorState {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;

    #[test]
    fn starts_dirty_so_the_first_cycle_publishes() {
        let state = MonitorState::new();
        assert!(!state.is_fresh());
        state.mark_published();
        assert!(state.is_fresh());
    }

    #[test]
    fn publish_clears_any_number_of_pending_requests() {
        let state = MonitorState::new();
        state.request_refresh();
        state.request_refresh();
        state.request_refresh();
        assert!(!state.is_fresh());

        state.mark_published();
        assert!(state.is_fresh());
    }

    #[test]
    fn counter_never_observed_negative() {
        let state = MonitorState::new();
        state.mark_published();
        state.mark_published();
        state.mark_published();
        assert!(state.is_fresh());
        assert!(state.pending_refresh.load(Ordering::Acquire) >= 0);

        state.request_refresh();
        assert!(!state.is_fresh());
    }

    #[test]
    fn counter_survives_concurrent_increments_and_publishes() {
        let state = Arc::new(MonitorState::new());
        let mut handles = Vec::new();
        for _ in 0..4 {
            let state = Arc::clone(&state);
            handles.push(std::thread::spawn(move || {
                for _ in 0..1000 {
                    state.request_refresh();
                    state.mark_published();
                    state.mark_published();
                }
            }));
        }
        for handle in handles {
            handle.join().expect("thread");
        }
        // Whatever interleaving happened, the counter stayed non-negative.
        assert!(state.pending_refresh.load(Ordering::Acquire) >= 0);
    }

    #[test]
    fn setters_report_change_only_when_the_value_moved() {
        let state = MonitorState::new();

        assert!(state.set_enabled(true));
        assert!(!state.set_enabled(true));
        assert!(state.set_enabled(false));

        assert!(state.set_online(true));
        assert!(!state.set_online(true));

        // Setters never touch the dirty counter themselves.
        state.mark_published();
        state.set_enabled(true);
        assert!(state.is_fresh());
    }

    #[test]
    fn unfetched_channels_publish_undefined() {
        let state = MonitorState::new();
        assert_eq!(state.value(ChannelId::Enabled), ChannelValue::Undefined);
        assert_eq!(state.value(ChannelId::EventState), ChannelValue::Undefined);
        assert_eq!(state.value(ChannelId::RecordState), ChannelValue::Undefined);
        assert_eq!(state.value(ChannelId::StillImage), ChannelValue::Undefined);
        // Online is always known.
        assert_eq!(state.value(ChannelId::Online), ChannelValue::OnOff(false));
    }

    #[test]
    fn derived_channels_follow_their_inputs() {
        let state = MonitorState::new();
        state.set_enabled(true);
        state.set_function(FunctionMode::Mocord);
        assert_eq!(state.value(ChannelId::RecordState), ChannelValue::OnOff(true));

        state.set_alarm_state(AlarmState::Alarm);
        assert_eq!(state.value(ChannelId::MotionEvent), ChannelValue::OnOff(true));
        assert_eq!(state.value(ChannelId::EventState), ChannelValue::OnOff(true));
        assert_eq!(
            state.value(ChannelId::DetailedStatus),
            ChannelValue::Text("Alarm".into())
        );
        assert!(state.alarmed());

        state.set_alarm_state(AlarmState::Idle);
        assert_eq!(state.value(ChannelId::MotionEvent), ChannelValue::OnOff(false));
        assert!(!state.alarmed());
    }

    #[test]
    fn force_alarm_alone_marks_the_device_alarmed() {
        let state = MonitorState::new();
        assert!(!state.alarmed());
        state.set_force_alarm(true);
        assert!(state.alarmed());
        assert_eq!(state.value(ChannelId::EventState), ChannelValue::OnOff(true));
        state.set_force_alarm(false);
        assert!(!state.alarmed());
    }

    #[test]
    fn general_data_sync_feeds_enabled_and_function() {
        let raw = serde_json::json!({
            "Id": "3",
            "Name": "Driveway",
            "Function": "Record",
            "Enabled": "1"
        });
        let data: MonitorData = serde_json::from_value(raw).expect("decode");

        let state = MonitorState::new();
        assert!(state.set_general_data(data.clone()));
        assert_eq!(state.enabled(), Some(true));
        assert_eq!(state.function(), Some(FunctionMode::Record));
        assert_eq!(state.value(ChannelId::RecordState), ChannelValue::OnOff(true));

        // Identical data again: no change.
        assert!(!state.set_general_data(data));
    }
}
