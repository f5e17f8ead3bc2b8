// ZoneMinder HTTP client
//
// Wraps `reqwest::Client` with ZoneMinder-specific URL construction,
// token authentication, and status-code mapping. Endpoint modules
// (monitors, host) are implemented as inherent methods via separate
// files to keep this module focused on transport mechanics.

use std::sync::RwLock;

use bytes::Bytes;
use secrecy::{ExposeSecret, SecretString};
use serde::de::DeserializeOwned;
use tracing::debug;
use url::Url;

use crate::error::Error;
use crate::models::LoginResponse;
use crate::transport::TransportConfig;

/// Login credentials for a ZoneMinder server.
///
/// Servers with `ZM_OPT_USE_AUTH` disabled need none; construct the
/// client with `None` and every call goes out unauthenticated.
#[derive(Debug, Clone)]
pub struct Credentials {
    pub username: String,
    pub password: SecretString,
}

/// Raw HTTP client for the ZoneMinder API.
///
/// Handles token auth (`POST /api/host/login.json`, token appended to
/// every request), API and CGI URL construction, and mapping of HTTP
/// failures onto the crate error taxonomy. Endpoint methods live in
/// `monitors.rs` and `host.rs`.
pub struct ZmClient {
    http: reqwest::Client,
    base_url: Url,
    credentials: Option<Credentials>,
    // Refreshed by login(); read on every URL build. Never held across I/O.
    access_token: RwLock<Option<String>>,
}

impl ZmClient {
    /// Create a new client from a `TransportConfig`.
    ///
    /// The `base_url` should be the ZoneMinder web root, e.g.
    /// `https://server/zm`. Does not authenticate -- call
    /// [`login()`](Self::login) before issuing API calls on servers
    /// that require auth.
    pub fn new(
        base_url: Url,
        credentials: Option<Credentials>,
        transport: &TransportConfig,
    ) -> Result<Self, Error> {
        let http = transport.build_client()?;
        Ok(Self {
            http,
            base_url,
            credentials,
            access_token: RwLock::new(None),
        })
    }

    /// The server base URL.
    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    /// Whether a login has produced an access token.
    pub fn has_token(&self) -> bool {
        self.access_token.read().is_ok_and(|t| t.is_some())
    }

    /// Authenticate against `POST /api/host/login.json`.
    ///
    /// No-op on servers configured without credentials. On success the
    /// access token is stored and appended to every subsequent request.
    pub async fn login(&self) -> Result<(), Error> {
        let Some(ref creds) = self.credentials else {
            debug!("no credentials configured, skipping login");
            return Ok(());
        };

        let url = self.plain_api_url("host/login.json")?;
        debug!(user = %creds.username, "logging in");

        let resp = self
            .http
            .post(url)
            .form(&[
                ("user", creds.username.as_str()),
                ("pass", creds.password.expose_secret()),
            ])
            .send()
            .await
            .map_err(Error::Transport)?;

        let login: LoginResponse = parse_response(resp).await?;
        let Some(token) = login.access_token else {
            return Err(Error::Authentication {
                message: "login succeeded but no access token was issued".into(),
            });
        };

        if let Ok(mut slot) = self.access_token.write() {
            *slot = Some(token);
        }
        debug!(version = login.version.as_deref().unwrap_or("?"), "login successful");
        Ok(())
    }

    // ── URL builders ─────────────────────────────────────────────────

    /// Build an API URL with the access token appended:
    /// `{base}/api/{path}?token=...`
    pub(crate) fn api_url(&self, path: &str) -> Result<Url, Error> {
        let mut url = self.plain_api_url(path)?;
        if let Some(token) = self.token() {
            url.query_pairs_mut().append_pair("token", &token);
        }
        Ok(url)
    }

    /// Build an API URL without auth material (login itself).
    fn plain_api_url(&self, path: &str) -> Result<Url, Error> {
        let full = format!(
            "{}/api/{}",
            self.base_url.as_str().trim_end_matches('/'),
            path
        );
        Ok(Url::parse(&full)?)
    }

    /// Build a streaming-CGI URL: `{base}/cgi-bin/nph-zms?...&token=...`
    pub(crate) fn cgi_url(&self, query: &[(&str, String)]) -> Result<Url, Error> {
        let full = format!(
            "{}/cgi-bin/nph-zms",
            self.base_url.as_str().trim_end_matches('/')
        );
        let mut url = Url::parse(&full)?;
        {
            let mut pairs = url.query_pairs_mut();
            for (key, value) in query {
                pairs.append_pair(key, value);
            }
            if let Some(token) = self.token() {
                pairs.append_pair("token", &token);
            }
        }
        Ok(url)
    }

    /// Whether requests can carry auth material in the URL.
    ///
    /// True when the server needs no auth at all, or a login has
    /// produced a token to embed.
    pub(crate) fn can_embed_auth(&self) -> bool {
        self.credentials.is_none() || self.has_token()
    }

    fn token(&self) -> Option<String> {
        self.access_token.read().ok().and_then(|t| t.clone())
    }

    // ── Request helpers ──────────────────────────────────────────────

    /// Send a GET request and decode the JSON body.
    pub(crate) async fn get<T: DeserializeOwned>(&self, url: Url) -> Result<T, Error> {
        debug!("GET {}", url);
        let resp = self.http.get(url).send().await.map_err(Error::Transport)?;
        parse_response(resp).await
    }

    /// Send a POST request with a form body and decode the JSON body.
    pub(crate) async fn post_form<T: DeserializeOwned>(
        &self,
        url: Url,
        form: &[(String, String)],
    ) -> Result<T, Error> {
        debug!("POST {}", url);
        let resp = self
            .http
            .post(url)
            .form(form)
            .send()
            .await
            .map_err(Error::Transport)?;
        parse_response(resp).await
    }

    /// Send a GET request and return the raw body bytes (images).
    pub(crate) async fn get_bytes(&self, url: Url) -> Result<Bytes, Error> {
        debug!("GET {} (raw)", url);
        let resp = self.http.get(url).send().await.map_err(Error::Transport)?;

        let status = resp.status();
        if status == reqwest::StatusCode::UNAUTHORIZED {
            return Err(Error::Authentication {
                message: "access token expired or invalid credentials".into(),
            });
        }
        if !status.is_success() {
            return Err(Error::ServerRejected {
                status: status.as_u16(),
                message: format!("unexpected status for raw fetch: {status}"),
            });
        }
        resp.bytes().await.map_err(Error::Transport)
    }
}

/// Map the HTTP status onto the error taxonomy, then decode the body.
async fn parse_response<T: DeserializeOwned>(resp: reqwest::Response) -> Result<T, Error> {
    let status = resp.status();

    if status == reqwest::StatusCode::UNAUTHORIZED {
        return Err(Error::Authentication {
            message: "access token expired or invalid credentials".into(),
        });
    }

    let body = resp.text().await.map_err(Error::Transport)?;

    if !status.is_success() {
        return Err(Error::ServerRejected {
            status: status.as_u16(),
            message: truncate_body(&body),
        });
    }

    serde_json::from_str(&body).map_err(|e| Error::Deserialization {
        message: e.to_string(),
        body,
    })
}

/// Keep rejected-request messages log-sized.
fn truncate_body(body: &str) -> String {
    const MAX: usize = 256;
    if body.len() <= MAX {
        body.to_string()
    } else {
        let cut = body
            .char_indices()
            .take_while(|(i, _)| *i < MAX)
            .last()
            .map_or(0, |(i, c)| i + c.len_utf8());
        format!("{}...", &body[..cut])
    }
}
