// Monitor endpoints
//
// Per-monitor reads (general data, alarm state, daemon status, still
// image, streaming path) and writes (enabled flag, detection function).

use bytes::Bytes;
use tracing::debug;

use crate::client::ZmClient;
use crate::error::Error;
use crate::models::{
    AlarmStatusEnvelope, Daemon, DaemonStatus, EventData, EventEnvelope, FunctionMode,
    MonitorData, MonitorEnvelope, MonitorListEnvelope,
};

impl ZmClient {
    /// List all monitors known to the server.
    ///
    /// `GET /api/monitors.json`
    pub async fn list_monitors(&self) -> Result<Vec<MonitorData>, Error> {
        let url = self.api_url("monitors.json")?;
        debug!("listing monitors");
        let envelope: MonitorListEnvelope = self.get(url).await?;
        Ok(envelope.monitors.into_iter().map(|c| c.monitor).collect())
    }

    /// Fetch general metadata for one monitor.
    ///
    /// `GET /api/monitors/{id}.json`
    pub async fn get_monitor(&self, id: u32) -> Result<MonitorData, Error> {
        let url = self.api_url(&format!("monitors/{id}.json"))?;
        let envelope: MonitorEnvelope = self.get(url).await?;
        Ok(envelope.monitor.monitor)
    }

    /// Fetch the detailed alarm state of a monitor.
    ///
    /// `GET /api/monitors/alarm/id:{id}/command:status.json`
    pub async fn get_alarm_status(&self, id: u32) -> Result<crate::models::AlarmState, Error> {
        let url = self.api_url(&format!("monitors/alarm/id:{id}/command:status.json"))?;
        let envelope: AlarmStatusEnvelope = self.get(url).await?;
        Ok(envelope.status)
    }

    /// Fetch the status of one of a monitor's daemons.
    ///
    /// `GET /api/monitors/daemonStatus/id:{id}/daemon:{zmc|zma|zmf}.json`
    pub async fn get_daemon_status(&self, id: u32, daemon: Daemon) -> Result<DaemonStatus, Error> {
        let url = self.api_url(&format!(
            "monitors/daemonStatus/id:{id}/daemon:{}.json",
            daemon.wire_name()
        ))?;
        self.get(url).await
    }

    /// Fetch a single still frame through the streaming CGI.
    ///
    /// `GET /cgi-bin/nph-zms?mode=single&monitor={id}&scale={scale}`
    pub async fn get_still_image(&self, id: u32, scale: u32) -> Result<Bytes, Error> {
        let url = self.cgi_url(&[
            ("mode", "single".to_string()),
            ("monitor", id.to_string()),
            ("scale", scale.to_string()),
        ])?;
        debug!(monitor = id, scale, "fetching still image");
        self.get_bytes(url).await
    }

    /// Build the MJPEG streaming URL for a monitor.
    ///
    /// No request is made; the URL embeds the current access token so
    /// it is only constructible when auth material can go into a query
    /// string ([`Error::AuthHashDisabled`] otherwise).
    pub fn streaming_path(
        &self,
        id: u32,
        scale: u32,
        max_fps: Option<u32>,
    ) -> Result<String, Error> {
        if !self.can_embed_auth() {
            return Err(Error::AuthHashDisabled);
        }
        let mut query = vec![
            ("mode", "jpeg".to_string()),
            ("monitor", id.to_string()),
            ("scale", scale.to_string()),
            ("buffer", "1000".to_string()),
        ];
        if let Some(fps) = max_fps {
            query.push(("maxfps", fps.to_string()));
        }
        Ok(self.cgi_url(&query)?.to_string())
    }

    /// Enable or disable a monitor.
    ///
    /// `POST /api/monitors/{id}.json` with `Monitor[Enabled]`
    pub async fn set_enabled(&self, id: u32, enabled: bool) -> Result<(), Error> {
        let url = self.api_url(&format!("monitors/{id}.json"))?;
        debug!(monitor = id, enabled, "setting enabled flag");
        let form = vec![(
            "Monitor[Enabled]".to_string(),
            if enabled { "1" } else { "0" }.to_string(),
        )];
        let _: serde_json::Value = self.post_form(url, &form).await?;
        Ok(())
    }

    /// Change a monitor's detection function.
    ///
    /// `POST /api/monitors/{id}.json` with `Monitor[Function]`
    pub async fn set_function(&self, id: u32, function: FunctionMode) -> Result<(), Error> {
        let url = self.api_url(&format!("monitors/{id}.json"))?;
        debug!(monitor = id, %function, "setting detection function");
        let form = vec![("Monitor[Function]".to_string(), function.to_string())];
        let _: serde_json::Value = self.post_form(url, &form).await?;
        Ok(())
    }

    /// Fetch details for one event.
    ///
    /// `GET /api/events/{id}.json`
    pub async fn get_event(&self, event_id: u64) -> Result<EventData, Error> {
        let url = self.api_url(&format!("events/{event_id}.json"))?;
        let envelope: EventEnvelope = self.get(url).await?;
        Ok(envelope.event.event)
    }
}
