// Host-level endpoints
//
// Server version, configuration entries, and the aggregate daemon check
// used for availability probing.

use tracing::debug;

use crate::client::ZmClient;
use crate::error::Error;
use crate::models::{ConfigEnvelope, ConfigValue, DaemonCheckEnvelope, ServerVersion};

impl ZmClient {
    /// Fetch the server and API versions.
    ///
    /// `GET /api/host/getVersion.json`
    pub async fn get_version(&self) -> Result<ServerVersion, Error> {
        let url = self.api_url("host/getVersion.json")?;
        self.get(url).await
    }

    /// Fetch one server configuration entry by name.
    ///
    /// `GET /api/configs/view/{name}.json`
    ///
    /// Used at session establishment to read capability flags such as
    /// `ZM_OPT_FRAME_SERVER`.
    pub async fn get_config(&self, name: &str) -> Result<ConfigValue, Error> {
        let url = self.api_url(&format!("configs/view/{name}.json"))?;
        debug!(name, "reading server config entry");
        let envelope: ConfigEnvelope = self.get(url).await?;
        Ok(envelope.config.config)
    }

    /// Check whether the server's daemons are up as a whole.
    ///
    /// `GET /api/host/daemonCheck.json`
    pub async fn daemon_check(&self) -> Result<bool, Error> {
        let url = self.api_url("host/daemonCheck.json")?;
        let envelope: DaemonCheckEnvelope = self.get(url).await?;
        Ok(envelope.result)
    }
}
