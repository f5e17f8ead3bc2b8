//! Trigger-port client and event stream with auto-reconnect.
//!
//! ZoneMinder's `zmtrigger` daemon speaks a pipe-delimited line protocol
//! over TCP (default port 6802). Commands force or cancel an alarm on a
//! monitor; the same port pushes `{id}|on|...` / `{id}|off|...` lines
//! when a monitor's alarm state changes. [`TriggerListener`] streams
//! parsed events through a [`tokio::sync::broadcast`] channel and
//! reconnects with exponential backoff.

use std::time::Duration;

use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::net::TcpStream;
use tokio::sync::broadcast;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use crate::error::Error;

// ── Broadcast channel capacity ───────────────────────────────────────

const EVENT_CHANNEL_CAPACITY: usize = 256;

// ── TriggerEvent ─────────────────────────────────────────────────────

/// A parsed alarm notification from the trigger port.
///
/// Wire format: `{monitorId}|{state}|{eventId}|{cause}` where `state`
/// is `on`, `on+{secs}`, `off`, or `cancel`; trailing fields are
/// optional.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TriggerEvent {
    /// Monitor the notification applies to.
    pub monitor_id: u32,

    /// `true` for `on`/`on+N`, `false` for `off`/`cancel`.
    pub active: bool,

    /// Server event id, when the line carries one.
    pub event_id: Option<u64>,

    /// Free-text cause, when the line carries one.
    pub cause: Option<String>,
}

impl TriggerEvent {
    /// Parse one protocol line. Returns `None` for frames that are not
    /// alarm notifications (malformed, or unknown state token).
    pub fn parse(line: &str) -> Option<Self> {
        let mut parts = line.trim().split('|');
        let monitor_id = parts.next()?.trim().parse::<u32>().ok()?;
        let state = parts.next()?.trim();
        let active = match state {
            "on" => true,
            s if s.starts_with("on+") => true,
            "off" | "cancel" => false,
            _ => return None,
        };
        let event_id = parts
            .next()
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .and_then(|s| s.parse::<u64>().ok());
        let cause = parts
            .next()
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(str::to_string);
        Some(Self {
            monitor_id,
            active,
            event_id,
            cause,
        })
    }
}

// ── TriggerClient ────────────────────────────────────────────────────

/// One-shot command writer for the trigger port.
///
/// Each command opens a short-lived connection, writes one line, and
/// closes. The listener socket stays read-only.
#[derive(Debug, Clone)]
pub struct TriggerClient {
    addr: String,
}

impl TriggerClient {
    /// `addr` is `host:port`, typically port 6802.
    pub fn new(addr: impl Into<String>) -> Self {
        Self { addr: addr.into() }
    }

    /// Force an alarm on a monitor.
    ///
    /// `timeout_secs == 0` sends a bare `on` (the alarm stays up until
    /// cancelled); otherwise `on+{secs}` and the server drops the alarm
    /// itself after the window.
    pub async fn activate(
        &self,
        monitor_id: u32,
        score: u32,
        cause: &str,
        text: &str,
        show_text: &str,
        timeout_secs: u64,
    ) -> Result<(), Error> {
        let state = if timeout_secs == 0 {
            "on".to_string()
        } else {
            format!("on+{timeout_secs}")
        };
        let line = format!(
            "{monitor_id}|{state}|{score}|{}|{}|{}\n",
            sanitize(cause),
            sanitize(text),
            sanitize(show_text)
        );
        self.send(&line).await
    }

    /// Cancel a previously forced alarm.
    pub async fn cancel(&self, monitor_id: u32) -> Result<(), Error> {
        let line = format!("{monitor_id}|cancel|0||\n");
        self.send(&line).await
    }

    async fn send(&self, line: &str) -> Result<(), Error> {
        debug!(addr = %self.addr, line = line.trim_end(), "trigger command");
        let mut stream = TcpStream::connect(&self.addr).await?;
        stream.write_all(line.as_bytes()).await?;
        stream.flush().await?;
        stream.shutdown().await?;
        Ok(())
    }
}

/// Pipe and newline characters would corrupt the frame.
fn sanitize(field: &str) -> String {
    field.replace(['|', '\n', '\r'], " ")
}

// ── ReconnectConfig ──────────────────────────────────────────────────

/// Exponential backoff configuration for listener reconnection.
#[derive(Debug, Clone)]
pub struct ReconnectConfig {
    /// Delay before the first reconnection attempt. Default: 1s.
    pub initial_delay: Duration,

    /// Upper bound on backoff delay. Default: 30s.
    pub max_delay: Duration,

    /// Maximum reconnection attempts before giving up.
    /// `None` means retry forever.
    pub max_retries: Option<u32>,
}

impl Default for ReconnectConfig {
    fn default() -> Self {
        Self {
            initial_delay: Duration::from_secs(1),
            max_delay: Duration::from_secs(30),
            max_retries: None,
        }
    }
}

// ── TriggerListener ──────────────────────────────────────────────────

/// Handle to a running trigger-port event stream.
pub struct TriggerListener {
    event_rx: broadcast::Receiver<TriggerEvent>,
    cancel: CancellationToken,
}

impl TriggerListener {
    /// Spawn the listen/reconnect loop against `addr`.
    ///
    /// Returns immediately; the first connection attempt happens in the
    /// background. Subscribe to start consuming events.
    pub fn connect(
        addr: impl Into<String>,
        reconnect: ReconnectConfig,
        cancel: CancellationToken,
    ) -> Self {
        let (event_tx, event_rx) = broadcast::channel(EVENT_CHANNEL_CAPACITY);
        let addr = addr.into();

        let task_cancel = cancel.clone();
        tokio::spawn(async move {
            listen_loop(addr, event_tx, reconnect, task_cancel).await;
        });

        Self { event_rx, cancel }
    }

    /// Get a new broadcast receiver for the event stream.
    ///
    /// Multiple consumers can subscribe concurrently. A consumer that
    /// falls behind receives [`broadcast::error::RecvError::Lagged`].
    pub fn subscribe(&self) -> broadcast::Receiver<TriggerEvent> {
        self.event_rx.resubscribe()
    }

    /// Signal the background task to shut down gracefully.
    pub fn shutdown(&self) {
        self.cancel.cancel();
    }
}

// ── Background reconnection loop ─────────────────────────────────────

/// Main loop: connect → read lines → on error, backoff → reconnect.
async fn listen_loop(
    addr: String,
    event_tx: broadcast::Sender<TriggerEvent>,
    reconnect: ReconnectConfig,
    cancel: CancellationToken,
) {
    let mut attempt: u32 = 0;
    let mut delay = reconnect.initial_delay;

    loop {
        if cancel.is_cancelled() {
            return;
        }

        match TcpStream::connect(&addr).await {
            Ok(stream) => {
                debug!(addr = %addr, "trigger listener connected");
                attempt = 0;
                delay = reconnect.initial_delay;
                read_lines(stream, &event_tx, &cancel).await;
                if cancel.is_cancelled() {
                    return;
                }
                warn!(addr = %addr, "trigger connection lost, reconnecting");
            }
            Err(e) => {
                warn!(addr = %addr, error = %e, "trigger connect failed");
            }
        }

        attempt += 1;
        if let Some(max) = reconnect.max_retries {
            if attempt > max {
                warn!(addr = %addr, attempts = attempt, "giving up on trigger port");
                return;
            }
        }

        tokio::select! {
            () = cancel.cancelled() => return,
            () = tokio::time::sleep(delay) => {}
        }
        delay = (delay * 2).min(reconnect.max_delay);
    }
}

/// Read protocol lines until EOF, error, or cancellation.
async fn read_lines(
    stream: TcpStream,
    event_tx: &broadcast::Sender<TriggerEvent>,
    cancel: &CancellationToken,
) {
    let mut lines = BufReader::new(stream).lines();
    loop {
        tokio::select! {
            () = cancel.cancelled() => return,
            line = lines.next_line() => match line {
                Ok(Some(line)) => {
                    if let Some(event) = TriggerEvent::parse(&line) {
                        debug!(monitor = event.monitor_id, active = event.active, "trigger event");
                        let _ = event_tx.send(event);
                    } else if !line.trim().is_empty() {
                        debug!(line = line.as_str(), "ignoring unrecognized trigger frame");
                    }
                }
                Ok(None) => return,
                Err(e) => {
                    warn!(error = %e, "trigger read failed");
                    return;
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_bounded_on_frame() {
        let event = TriggerEvent::parse("3|on+30|101|Motion detected").expect("parse");
        assert_eq!(event.monitor_id, 3);
        assert!(event.active);
        assert_eq!(event.event_id, Some(101));
        assert_eq!(event.cause.as_deref(), Some("Motion detected"));
    }

    #[test]
    fn parses_off_frame_without_detail() {
        let event = TriggerEvent::parse("7|off").expect("parse");
        assert_eq!(event.monitor_id, 7);
        assert!(!event.active);
        assert_eq!(event.event_id, None);
        assert_eq!(event.cause, None);
    }

    #[test]
    fn rejects_malformed_frames() {
        assert_eq!(TriggerEvent::parse(""), None);
        assert_eq!(TriggerEvent::parse("notanumber|on"), None);
        assert_eq!(TriggerEvent::parse("3|sideways"), None);
        assert_eq!(TriggerEvent::parse("3"), None);
    }

    #[test]
    fn sanitize_strips_frame_delimiters() {
        assert_eq!(sanitize("a|b\nc"), "a b c");
    }
}
