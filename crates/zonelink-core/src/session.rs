// ── Server session ──
//
// One authenticated connection to a ZoneMinder server, shared by every
// monitor handler supervising a device on it. The owning bridge builds
// the session and hands it to handlers through an explicit `attach`
// call -- handlers never reach upward to resolve their connection.

use std::sync::atomic::{AtomicBool, Ordering};

use tracing::{debug, warn};
use zonelink_api::{TriggerClient, ZmClient};

use crate::error::CoreError;

/// Shared handle to a connected ZoneMinder server.
pub struct ZmSession {
    client: ZmClient,
    trigger: TriggerClient,
    connected: AtomicBool,
    frame_daemon_enabled: bool,
}

impl ZmSession {
    /// Authenticate and probe server capabilities.
    ///
    /// Logs in (no-op on auth-less servers) and reads
    /// `ZM_OPT_FRAME_SERVER` once so handlers know whether a frame
    /// daemon can exist at all. The session starts connected.
    pub async fn establish(client: ZmClient, trigger: TriggerClient) -> Result<Self, CoreError> {
        client.login().await?;

        let frame_daemon_enabled = match client.get_config("ZM_OPT_FRAME_SERVER").await {
            Ok(cfg) => cfg.as_bool(),
            Err(e) => {
                warn!(error = %e, "could not read ZM_OPT_FRAME_SERVER, assuming no frame daemon");
                false
            }
        };
        debug!(frame_daemon_enabled, "server session established");

        Ok(Self {
            client,
            trigger,
            connected: AtomicBool::new(true),
            frame_daemon_enabled,
        })
    }

    /// Assemble a session from parts the host already prepared
    /// (it performed login and capability probing itself).
    pub fn from_parts(
        client: ZmClient,
        trigger: TriggerClient,
        frame_daemon_enabled: bool,
    ) -> Self {
        Self {
            client,
            trigger,
            connected: AtomicBool::new(true),
            frame_daemon_enabled,
        }
    }

    pub fn client(&self) -> &ZmClient {
        &self.client
    }

    pub fn trigger(&self) -> &TriggerClient {
        &self.trigger
    }

    pub fn is_connected(&self) -> bool {
        self.connected.load(Ordering::Acquire)
    }

    /// Flipped by the owning bridge when connectivity changes.
    pub fn mark_connected(&self) {
        self.connected.store(true, Ordering::Release);
    }

    pub fn mark_disconnected(&self) {
        self.connected.store(false, Ordering::Release);
    }

    pub fn frame_daemon_enabled(&self) -> bool {
        self.frame_daemon_enabled
    }
}
