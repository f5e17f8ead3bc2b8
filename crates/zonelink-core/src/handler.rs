// ── Monitor handler ──
//
// One handler per supervised monitor. An external scheduler (owned by
// the host) drives `refresh` on a fixed tick; everything here runs
// synchronously inside that invocation -- there is no internal refresh
// thread. The refresh gate bounds concurrency, the alarm escalation
// timer bounds urgency, and per-data-class timestamps bound fetch
// frequency.

use std::sync::{Arc, Mutex, PoisonError};
use std::time::{Duration, Instant};

use arc_swap::ArcSwapOption;
use tracing::{debug, info, warn};
use zonelink_api::{Daemon, FunctionMode, TriggerEvent, ZmClient};

use crate::alarm::AlarmEscalation;
use crate::channel::ChannelId;
use crate::config::MonitorConfig;
use crate::error::CoreError;
use crate::gate::RefreshGate;
use crate::priority::RefreshPriority;
use crate::registry::{DeviceRegistry, DeviceStatus, StatusDetail};
use crate::session::ZmSession;
use crate::state::MonitorState;

// General data cadence: every 10s when quiet, every second while the
// monitor is in an active alarm condition.
const GENERAL_INTERVAL: Duration = Duration::from_secs(10);
const GENERAL_INTERVAL_ALARMED: Duration = Duration::from_secs(1);

// Score attached to alarms this binding forces.
const FORCE_ALARM_SCORE: u32 = 255;
const FORCE_ALARM_CAUSE: &str = "Zonelink Event";

/// A user command routed to a monitor channel.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    /// Republish the channel's current value.
    Refresh,
    SetEnabled(bool),
    SetFunction(FunctionMode),
    ForceAlarm(bool),
}

/// Supervises one monitor: refresh cycles, commands, alarm windows.
pub struct MonitorHandler {
    config: MonitorConfig,
    state: MonitorState,
    alarm: AlarmEscalation,
    gate: RefreshGate,
    registry: Arc<dyn DeviceRegistry>,
    session: ArcSwapOption<ZmSession>,

    // One-shot priority override, planted by lifecycle transitions and
    // consumed by the next cycle. Never silently overwritten.
    forced_priority: Mutex<Option<RefreshPriority>>,

    // Per-data-class throttles, touched only inside the refresh gate
    // or command handlers.
    last_general_refresh: Mutex<Option<Instant>>,
    last_image_refresh: Mutex<Option<Instant>>,

    // Last status pushed to the registry, for change filtering.
    last_status: Mutex<Option<(DeviceStatus, StatusDetail, String)>>,
}

impl MonitorHandler {
    pub fn new(config: MonitorConfig, registry: Arc<dyn DeviceRegistry>) -> Self {
        debug!(monitor = %config.id, "starting monitor handler");
        Self {
            config,
            state: MonitorState::new(),
            alarm: AlarmEscalation::new(),
            gate: RefreshGate::new(),
            registry,
            session: ArcSwapOption::empty(),
            forced_priority: Mutex::new(None),
            last_general_refresh: Mutex::new(None),
            last_image_refresh: Mutex::new(None),
            last_status: Mutex::new(None),
        }
    }

    pub fn config(&self) -> &MonitorConfig {
        &self.config
    }

    pub fn state(&self) -> &MonitorState {
        &self.state
    }

    /// The urgency the external scheduler should tick this device at.
    pub fn refresh_priority(&self) -> RefreshPriority {
        self.alarm.priority()
    }

    /// Ask for a republish on the next cycle (for host-side events that
    /// change what channels should show).
    pub fn request_channel_refresh(&self) {
        self.state.request_refresh();
    }

    // ── Session lifecycle ────────────────────────────────────────────

    /// Hand the handler its server session. Called by the bridge after
    /// both sides exist; replaces any previous session.
    pub fn attach(&self, session: Arc<ZmSession>) {
        debug!(monitor = %self.config.id, "session attached");
        self.session.store(Some(session));
    }

    /// Drop the server session (bridge went away).
    pub fn detach(&self) {
        debug!(monitor = %self.config.id, "session detached");
        self.session.store(None);
        self.push_status(
            DeviceStatus::Offline,
            StatusDetail::BridgeOffline,
            "server session detached",
        );
    }

    fn session(&self) -> Option<Arc<ZmSession>> {
        self.session.load_full()
    }

    fn device_status(&self) -> DeviceStatus {
        self.lock_status()
            .as_ref()
            .map_or(DeviceStatus::Offline, |(status, _, _)| *status)
    }

    /// Connected means: the registry-level status is online AND a live
    /// session is attached. Anything else short-circuits the cycle
    /// before the gate.
    fn is_connected(&self) -> bool {
        self.device_status() == DeviceStatus::Online
            && self.session().is_some_and(|s| s.is_connected())
    }

    // ── Availability ─────────────────────────────────────────────────

    /// Re-evaluate device availability and report transitions.
    ///
    /// On the transition to online, a one-shot `Batch` priority is
    /// planted so the next cycle repopulates everything.
    pub async fn update_availability(&self) {
        if self.is_connected() {
            return;
        }
        let (status, detail, description) = self.probe_availability().await;
        self.push_status(status, detail, &description);
    }

    async fn probe_availability(&self) -> (DeviceStatus, StatusDetail, String) {
        let id = self.config.id;

        let Some(session) = self.session() else {
            return (
                DeviceStatus::Offline,
                StatusDetail::BridgeOffline,
                format!("no server session attached to monitor '{id}'"),
            );
        };
        if !session.is_connected() {
            return (
                DeviceStatus::Offline,
                StatusDetail::BridgeOffline,
                "server session is disconnected".into(),
            );
        }
        if id.0 == 0 {
            return (
                DeviceStatus::Offline,
                StatusDetail::ConfigurationError,
                "no monitor id configured".into(),
            );
        }

        match session.client().get_daemon_status(id.0, Daemon::Capture).await {
            Ok(status) if status.status => (DeviceStatus::Online, StatusDetail::None, String::new()),
            Ok(_) => (
                DeviceStatus::Offline,
                StatusDetail::CommunicationError,
                "capture daemon is not running".into(),
            ),
            Err(e) => (
                DeviceStatus::Offline,
                StatusDetail::CommunicationError,
                format!("capture daemon not accessible: {e}"),
            ),
        }
    }

    /// Report a status transition to the registry, change-filtered.
    fn push_status(&self, status: DeviceStatus, detail: StatusDetail, description: &str) {
        {
            let mut last = self.lock_status();
            if last
                .as_ref()
                .is_some_and(|(s, d, msg)| *s == status && *d == detail && msg == description)
            {
                return;
            }
            debug!(
                monitor = %self.config.id,
                %status,
                %detail,
                description,
                "device status changed"
            );
            *last = Some((status, detail, description.to_string()));
        }

        self.registry.set_device_status(status, detail, description);
        if self.state.set_online(status == DeviceStatus::Online) {
            self.state.request_refresh();
        }

        if status == DeviceStatus::Online {
            self.plant_forced_priority(RefreshPriority::Batch);
        }
    }

    // ── Forced priority (one-shot) ───────────────────────────────────

    /// Plant a one-shot priority override for the next cycle. A pending
    /// override is preserved, never overwritten.
    fn plant_forced_priority(&self, priority: RefreshPriority) {
        let mut slot = self
            .forced_priority
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        if slot.is_none() {
            *slot = Some(priority);
        }
    }

    fn take_forced_priority(&self) -> Option<RefreshPriority> {
        self.forced_priority
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take()
    }

    // ── Refresh cycle ────────────────────────────────────────────────

    /// Drive one refresh cycle at the tick-supplied priority.
    ///
    /// Alarm-priority invocations never queue behind an in-flight
    /// cycle; they skip and retry on the next tick. All other
    /// priorities wait their turn.
    pub async fn refresh(&self, cycle_priority: RefreshPriority) {
        if !self.is_connected() {
            return;
        }

        let effective = self.take_forced_priority().unwrap_or(cycle_priority);
        if effective == RefreshPriority::Unknown {
            return;
        }

        {
            let Some(_guard) = self.gate.enter(effective).await else {
                info!(
                    monitor = %self.config.id,
                    "refresh already in progress, skipping alarm-priority cycle"
                );
                return;
            };

            self.fetch_data(effective).await;

            if !self.state.is_fresh() {
                debug!(monitor = %self.config.id, "publishing channels");
                self.state.publish_all(self.registry.as_ref());
                self.state.mark_published();
            }
        }

        // Gate released; let a bounded alarm window relax if it is due.
        self.alarm.try_expire();
    }

    /// Republish a single channel on demand.
    pub fn update_channel(&self, channel: ChannelId) {
        self.registry.publish(channel, self.state.value(channel));
    }

    // ── Data fetching ────────────────────────────────────────────────

    /// Fetch whatever is due at this priority. Every Monitor Service
    /// call is individually fault-isolated: a failure is logged and the
    /// field keeps its last-known value.
    async fn fetch_data(&self, priority: RefreshPriority) {
        let Some(session) = self.session() else {
            info!(
                monitor = %self.config.id,
                "failed to get session, skipping monitor refresh"
            );
            return;
        };
        let client = session.client();
        let now = Instant::now();
        let mut changed = false;

        if self.general_refresh_due(now) {
            changed |= self.fetch_general_data(client).await;
            changed |= self
                .fetch_daemon_status(client, true, true, session.frame_daemon_enabled())
                .await;
            *self.lock_instant(&self.last_general_refresh) = Some(now);
        }

        if self.registry.channel_linked(ChannelId::StillImage) && self.image_refresh_due(now) {
            match client
                .get_still_image(self.config.id.0, self.config.image_scale)
                .await
            {
                Ok(image) => {
                    changed |= self.state.set_still_image(image);
                    *self.lock_instant(&self.last_image_refresh) = Some(now);
                }
                Err(e) => {
                    warn!(monitor = %self.config.id, error = %e, "still image fetch failed");
                }
            }
        }

        if priority.is_at_least(RefreshPriority::Low) {
            match client.streaming_path(self.config.id.0, self.config.image_scale, None) {
                Ok(path) => changed |= self.state.set_video_url(path),
                Err(e) => {
                    warn!(monitor = %self.config.id, error = %e, "streaming path unavailable");
                }
            }
        }

        if changed {
            debug!(monitor = %self.config.id, "data changed, channels need refreshing");
            self.state.request_refresh();
        }
    }

    /// General metadata + detailed alarm state, each fault-isolated.
    /// Returns whether anything changed.
    async fn fetch_general_data(&self, client: &ZmClient) -> bool {
        let id = self.config.id.0;
        let mut changed = false;

        match client.get_monitor(id).await {
            Ok(data) => changed |= self.state.set_general_data(data),
            Err(e) => {
                warn!(monitor = %self.config.id, error = %e, "general data fetch failed");
            }
        }

        match client.get_alarm_status(id).await {
            Ok(state) => changed |= self.state.set_alarm_state(state),
            Err(e) => {
                warn!(monitor = %self.config.id, error = %e, "alarm status fetch failed");
            }
        }

        changed
    }

    /// Daemon statuses for linked channels. The frame daemon is only
    /// queried when the analysis fetch succeeded and the server runs a
    /// frame daemon at all.
    async fn fetch_daemon_status(
        &self,
        client: &ZmClient,
        fetch_capture: bool,
        fetch_analysis: bool,
        frame_daemon_enabled: bool,
    ) -> bool {
        let id = self.config.id.0;
        let mut analysis_running = None;
        let mut changed = false;

        if fetch_capture && self.registry.channel_linked(ChannelId::CaptureDaemonState) {
            match client.get_daemon_status(id, Daemon::Capture).await {
                Ok(status) => changed |= self.state.set_capture_daemon(status.status),
                Err(e) => {
                    warn!(monitor = %self.config.id, error = %e, "capture daemon fetch failed");
                }
            }
        }

        if fetch_analysis && self.registry.channel_linked(ChannelId::AnalysisDaemonState) {
            match client.get_daemon_status(id, Daemon::Analysis).await {
                Ok(status) => {
                    analysis_running = Some(status.status);
                    changed |= self.state.set_analysis_daemon(status.status);
                }
                Err(e) => {
                    warn!(monitor = %self.config.id, error = %e, "analysis daemon fetch failed");
                }
            }
        }

        if self.registry.channel_linked(ChannelId::FrameDaemonState) {
            if let (Some(analysis), true) = (analysis_running, frame_daemon_enabled) {
                match client.get_daemon_status(id, Daemon::Frame).await {
                    Ok(status) => {
                        changed |= self.state.set_frame_daemon(status.status && analysis);
                    }
                    Err(e) => {
                        warn!(monitor = %self.config.id, error = %e, "frame daemon fetch failed");
                    }
                }
            }
        }

        changed
    }

    // ── Fetch cadence ────────────────────────────────────────────────

    fn general_refresh_due(&self, now: Instant) -> bool {
        let interval = if self.state.alarmed() {
            GENERAL_INTERVAL_ALARMED
        } else {
            GENERAL_INTERVAL
        };
        self.lock_instant(&self.last_general_refresh)
            .is_none_or(|last| now.duration_since(last) >= interval)
    }

    fn image_refresh_due(&self, now: Instant) -> bool {
        let priority = if self.state.alarmed() {
            self.config.image_refresh_alarm
        } else {
            self.config.image_refresh_idle
        };
        let Some(interval) = priority.interval() else {
            return false;
        };
        self.lock_instant(&self.last_image_refresh)
            .is_none_or(|last| now.duration_since(last) >= interval)
    }

    // ── Commands ─────────────────────────────────────────────────────

    /// Handle a user command routed from the host.
    ///
    /// Side effects only touch local state and the dirty counter;
    /// publishing stays centralized in the refresh cycle.
    pub async fn handle_command(
        &self,
        channel: ChannelId,
        command: Command,
    ) -> Result<(), CoreError> {
        debug!(monitor = %self.config.id, %channel, ?command, "command received");

        if command == Command::Refresh {
            self.update_channel(channel);
            return Ok(());
        }

        let result = match (channel, command) {
            (ChannelId::Enabled, Command::SetEnabled(enabled)) => {
                self.command_enabled(enabled).await
            }
            (ChannelId::Function, Command::SetFunction(function)) => {
                self.command_function(function).await
            }
            (ChannelId::ForceAlarm, Command::ForceAlarm(active)) => {
                self.command_force_alarm(active).await
            }
            (channel, command) => {
                info!(
                    monitor = %self.config.id,
                    %channel,
                    ?command,
                    "command received for read-only or unknown channel"
                );
                Ok(())
            }
        };

        // Snap channels back to reality on the next cycle, whether the
        // command stuck or not.
        self.state.request_refresh();
        result
    }

    async fn command_enabled(&self, enabled: bool) -> Result<(), CoreError> {
        let session = self.session().ok_or(CoreError::NotConnected)?;
        session
            .client()
            .set_enabled(self.config.id.0, enabled)
            .await?;
        self.state.set_enabled(enabled);
        debug!(monitor = %self.config.id, enabled, "changed enabled flag");
        Ok(())
    }

    async fn command_function(&self, function: FunctionMode) -> Result<(), CoreError> {
        let session = self.session().ok_or(CoreError::NotConnected)?;
        let client = session.client();
        client.set_function(self.config.id.0, function).await?;

        // The function change cascades into daemon states and general
        // metadata; refetch them so the next publish shows reality.
        self.fetch_general_data(client).await;
        self.fetch_daemon_status(client, true, true, session.frame_daemon_enabled())
            .await;

        self.state.set_function(function);
        debug!(monitor = %self.config.id, %function, "changed detection function");
        Ok(())
    }

    async fn command_force_alarm(&self, active: bool) -> Result<(), CoreError> {
        // Force-alarm only works when the monitor runs a detection
        // function an external trigger can preempt.
        if !self
            .state
            .function()
            .is_some_and(FunctionMode::supports_force_alarm)
        {
            info!(
                monitor = %self.config.id,
                "force-alarm is only available in Modect or Nodect"
            );
            return Err(CoreError::CommandNotApplicable {
                id: self.config.id,
                reason: "force-alarm requires function Modect or Nodect".into(),
            });
        }

        let session = self.session().ok_or(CoreError::NotConnected)?;
        let id = self.config.id.0;

        if active {
            session
                .trigger()
                .activate(
                    id,
                    FORCE_ALARM_SCORE,
                    FORCE_ALARM_CAUSE,
                    &self.config.event_text,
                    "",
                    self.config.alarm_timeout_secs,
                )
                .await?;
            self.state.set_force_alarm(true);
            self.alarm.start_bounded(self.config.alarm_timeout());
        } else {
            session.trigger().cancel(id).await?;
            self.state.set_force_alarm(false);
            self.alarm.force_stop();
        }

        self.fetch_general_data(session.client()).await;
        Ok(())
    }

    // ── Server-pushed events ─────────────────────────────────────────

    /// React to an alarm notification pushed by the server.
    ///
    /// An activation opens an unbounded escalation window: the server
    /// decides when the alarm is over, not a local timeout.
    pub async fn on_trigger_event(&self, event: TriggerEvent) {
        if event.monitor_id != self.config.id.0 {
            return;
        }
        if self.device_status() != DeviceStatus::Online {
            info!(
                monitor = %self.config.id,
                "skipping trigger event, device is offline"
            );
            return;
        }

        let changed = if event.active {
            let mut cause = event.cause.clone();
            if let (Some(session), Some(event_id)) = (self.session(), event.event_id) {
                match session.client().get_event(event_id).await {
                    Ok(data) => cause = Some(data.cause).filter(|c| !c.is_empty()),
                    Err(e) => {
                        warn!(
                            monitor = %self.config.id,
                            event = event_id,
                            error = %e,
                            "event detail fetch failed"
                        );
                    }
                }
            }

            let changed =
                self.state.set_force_alarm(true) | self.state.set_event_cause(cause);
            self.alarm.start_unbounded();
            changed
        } else {
            let changed =
                self.state.set_force_alarm(false) | self.state.set_event_cause(None);
            self.alarm.force_stop();
            changed
        };

        if changed {
            self.state.request_refresh();
        }
    }

    // ── Lock helpers ─────────────────────────────────────────────────

    fn lock_instant<'a>(
        &self,
        slot: &'a Mutex<Option<Instant>>,
    ) -> std::sync::MutexGuard<'a, Option<Instant>> {
        slot.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn lock_status(
        &self,
    ) -> std::sync::MutexGuard<'_, Option<(DeviceStatus, StatusDetail, String)>> {
        self.last_status.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::channel::ChannelValue;
    use crate::config::MonitorId;

    struct NullRegistry;

    impl DeviceRegistry for NullRegistry {
        fn publish(&self, _channel: ChannelId, _value: ChannelValue) {}
        fn channel_linked(&self, _channel: ChannelId) -> bool {
            true
        }
        fn set_device_status(
            &self,
            _status: DeviceStatus,
            _detail: StatusDetail,
            _description: &str,
        ) {
        }
    }

    fn handler() -> MonitorHandler {
        MonitorHandler::new(MonitorConfig::new(MonitorId(3)), Arc::new(NullRegistry))
    }

    #[test]
    fn general_refresh_is_due_initially_then_throttled() {
        let handler = handler();
        let now = Instant::now();

        assert!(handler.general_refresh_due(now));
        *handler.lock_instant(&handler.last_general_refresh) = Some(now);

        assert!(!handler.general_refresh_due(now + Duration::from_secs(2)));
        assert!(handler.general_refresh_due(now + GENERAL_INTERVAL));
    }

    #[test]
    fn alarmed_monitor_polls_general_data_every_second() {
        let handler = handler();
        let now = Instant::now();
        *handler.lock_instant(&handler.last_general_refresh) = Some(now);

        handler.state.set_force_alarm(true);
        assert!(handler.general_refresh_due(now + Duration::from_secs(2)));

        handler.state.set_force_alarm(false);
        assert!(!handler.general_refresh_due(now + Duration::from_secs(2)));
    }

    #[test]
    fn image_refresh_follows_configured_priority() {
        let mut config = MonitorConfig::new(MonitorId(3));
        config.image_refresh_idle = RefreshPriority::Low;
        config.image_refresh_alarm = RefreshPriority::Alarm;
        let handler = MonitorHandler::new(config, Arc::new(NullRegistry));
        let now = Instant::now();

        // Never fetched: due.
        assert!(handler.image_refresh_due(now));
        *handler.lock_instant(&handler.last_image_refresh) = Some(now);

        // Idle cadence is Low (60s).
        assert!(!handler.image_refresh_due(now + Duration::from_secs(30)));
        assert!(handler.image_refresh_due(now + Duration::from_secs(60)));

        // Alarmed cadence is Alarm (1s).
        handler.state.set_force_alarm(true);
        assert!(handler.image_refresh_due(now + Duration::from_secs(2)));
    }

    #[test]
    fn disabled_image_priority_never_fetches() {
        let handler = handler();
        // Default idle priority is Disabled.
        assert!(!handler.image_refresh_due(Instant::now()));
    }

    #[test]
    fn forced_priority_is_one_shot_and_not_overwritten() {
        let handler = handler();

        handler.plant_forced_priority(RefreshPriority::Batch);
        // A later plant must not replace the pending override.
        handler.plant_forced_priority(RefreshPriority::Normal);

        assert_eq!(handler.take_forced_priority(), Some(RefreshPriority::Batch));
        assert_eq!(handler.take_forced_priority(), None);
    }
}
