// Wire models for the ZoneMinder HTTP API.
//
// ZoneMinder encodes most scalars as strings ("1" for true, "10.0" for a
// number) and is inconsistent about it across versions, so the hot fields
// go through tolerant deserializers instead of plain serde primitives.

use chrono::NaiveDateTime;
use serde::{Deserialize, Deserializer, Serialize};

// ── Monitor data ─────────────────────────────────────────────────────

/// General monitor metadata from `GET /api/monitors/{id}.json`.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct MonitorData {
    #[serde(rename = "Id", deserialize_with = "de_u32")]
    pub id: u32,

    #[serde(rename = "Name", default)]
    pub name: String,

    /// Detection function currently assigned to the monitor.
    #[serde(rename = "Function", default)]
    pub function: FunctionMode,

    #[serde(rename = "Enabled", deserialize_with = "de_bool", default)]
    pub enabled: bool,

    /// Capture source type: `Local`, `Remote`, `File`, `Ffmpeg`, ...
    #[serde(rename = "Type", default)]
    pub source_type: String,

    #[serde(rename = "Width", deserialize_with = "de_opt_u32", default)]
    pub width: Option<u32>,

    #[serde(rename = "Height", deserialize_with = "de_opt_u32", default)]
    pub height: Option<u32>,

    #[serde(rename = "MaxFPS", deserialize_with = "de_opt_f64", default)]
    pub max_fps: Option<f64>,

    #[serde(rename = "AlarmMaxFPS", deserialize_with = "de_opt_f64", default)]
    pub alarm_max_fps: Option<f64>,

    #[serde(rename = "AnalysisFPS", deserialize_with = "de_opt_f64", default)]
    pub analysis_fps: Option<f64>,

    #[serde(rename = "AlarmFrameCount", deserialize_with = "de_opt_u32", default)]
    pub alarm_frame_count: Option<u32>,
}

/// The detection function a monitor runs.
///
/// Wire values match the server verbatim (`Modect`, `Nodect`, ...).
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Default,
    Serialize,
    Deserialize,
    strum::Display,
    strum::EnumString,
)]
pub enum FunctionMode {
    #[default]
    None,
    Monitor,
    Modect,
    Record,
    Mocord,
    Nodect,
}

impl FunctionMode {
    /// Force-alarm only makes sense when the monitor runs detection
    /// that an external trigger can preempt.
    pub fn supports_force_alarm(self) -> bool {
        matches!(self, Self::Modect | Self::Nodect)
    }

    /// Whether this function continuously records.
    pub fn records(self) -> bool {
        matches!(self, Self::Record | Self::Mocord)
    }
}

// ── Alarm state ──────────────────────────────────────────────────────

/// Detailed monitor state from the alarm `command:status` endpoint.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AlarmState {
    Idle,
    PreAlarm,
    Alarm,
    Alert,
    Tape,
}

impl AlarmState {
    pub fn from_code(code: u8) -> Option<Self> {
        match code {
            0 => Some(Self::Idle),
            1 => Some(Self::PreAlarm),
            2 => Some(Self::Alarm),
            3 => Some(Self::Alert),
            4 => Some(Self::Tape),
            _ => None,
        }
    }

    /// States in which the monitor is actively handling an event.
    pub fn is_active(self) -> bool {
        matches!(self, Self::PreAlarm | Self::Alarm | Self::Alert)
    }
}

impl std::fmt::Display for AlarmState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Self::Idle => "Idle",
            Self::PreAlarm => "Pre-Alarm",
            Self::Alarm => "Alarm",
            Self::Alert => "Alert",
            Self::Tape => "Tape",
        };
        f.write_str(s)
    }
}

impl<'de> Deserialize<'de> for AlarmState {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let value = serde_json::Value::deserialize(deserializer)?;
        let code = match &value {
            serde_json::Value::Number(n) => n.as_u64(),
            serde_json::Value::String(s) => s.trim().parse::<u64>().ok(),
            _ => None,
        };
        code.and_then(|c| u8::try_from(c).ok())
            .and_then(Self::from_code)
            .ok_or_else(|| serde::de::Error::custom(format!("invalid alarm status: {value}")))
    }
}

// ── Daemons ──────────────────────────────────────────────────────────

/// The per-monitor daemons whose status can be queried.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Daemon {
    /// `zmc` -- capture.
    Capture,
    /// `zma` -- analysis.
    Analysis,
    /// `zmf` -- frame server.
    Frame,
}

impl Daemon {
    pub fn wire_name(self) -> &'static str {
        match self {
            Self::Capture => "zmc",
            Self::Analysis => "zma",
            Self::Frame => "zmf",
        }
    }
}

/// Status of one daemon, from `daemonStatus`.
#[derive(Debug, Clone, Deserialize)]
pub struct DaemonStatus {
    #[serde(deserialize_with = "de_bool", default)]
    pub status: bool,

    #[serde(rename = "statustext", default)]
    pub status_text: String,
}

// ── Events ───────────────────────────────────────────────────────────

/// Event detail from `GET /api/events/{id}.json`.
#[derive(Debug, Clone, Deserialize)]
pub struct EventData {
    #[serde(rename = "Id", deserialize_with = "de_u64")]
    pub id: u64,

    #[serde(rename = "MonitorId", deserialize_with = "de_u32")]
    pub monitor_id: u32,

    #[serde(rename = "Cause", default)]
    pub cause: String,

    #[serde(rename = "Notes", default)]
    pub notes: Option<String>,

    /// Server-local event start time (ZoneMinder sends no timezone).
    #[serde(rename = "StartTime", deserialize_with = "de_opt_datetime", default)]
    pub start_time: Option<NaiveDateTime>,
}

// ── Host / config ────────────────────────────────────────────────────

/// One server configuration entry from `configs/view`.
#[derive(Debug, Clone, Deserialize)]
pub struct ConfigValue {
    #[serde(rename = "Name", default)]
    pub name: String,

    #[serde(rename = "Value", default)]
    pub value: String,
}

impl ConfigValue {
    pub fn as_bool(&self) -> bool {
        matches!(self.value.trim(), "1" | "true" | "yes" | "on")
    }
}

/// Server and API versions from `host/getVersion.json`.
#[derive(Debug, Clone, Deserialize)]
pub struct ServerVersion {
    #[serde(default)]
    pub version: String,

    #[serde(rename = "apiversion", default)]
    pub api_version: String,
}

// ── Response envelopes (crate-internal) ──────────────────────────────

#[derive(Debug, Deserialize)]
pub(crate) struct MonitorEnvelope {
    pub monitor: MonitorContainer,
}

#[derive(Debug, Deserialize)]
pub(crate) struct MonitorContainer {
    #[serde(rename = "Monitor")]
    pub monitor: MonitorData,
}

#[derive(Debug, Deserialize)]
pub(crate) struct MonitorListEnvelope {
    pub monitors: Vec<MonitorContainer>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct AlarmStatusEnvelope {
    pub status: AlarmState,
}

#[derive(Debug, Deserialize)]
pub(crate) struct EventEnvelope {
    pub event: EventContainer,
}

#[derive(Debug, Deserialize)]
pub(crate) struct EventContainer {
    #[serde(rename = "Event")]
    pub event: EventData,
}

#[derive(Debug, Deserialize)]
pub(crate) struct ConfigEnvelope {
    pub config: ConfigContainer,
}

#[derive(Debug, Deserialize)]
pub(crate) struct ConfigContainer {
    #[serde(rename = "Config")]
    pub config: ConfigValue,
}

#[derive(Debug, Deserialize)]
pub(crate) struct DaemonCheckEnvelope {
    #[serde(deserialize_with = "de_bool", default)]
    pub result: bool,
}

#[derive(Debug, Deserialize)]
pub(crate) struct LoginResponse {
    #[serde(default)]
    pub access_token: Option<String>,

    #[serde(default)]
    pub version: Option<String>,
}

// ── Tolerant scalar deserializers ────────────────────────────────────

fn de_bool<'de, D: Deserializer<'de>>(deserializer: D) -> Result<bool, D::Error> {
    let value = serde_json::Value::deserialize(deserializer)?;
    match value {
        serde_json::Value::Bool(b) => Ok(b),
        serde_json::Value::Number(n) => Ok(n.as_i64().unwrap_or(0) != 0),
        serde_json::Value::String(s) => match s.trim() {
            "1" | "true" | "True" => Ok(true),
            "" | "0" | "false" | "False" => Ok(false),
            other => Err(serde::de::Error::custom(format!("invalid bool: {other:?}"))),
        },
        serde_json::Value::Null => Ok(false),
        other => Err(serde::de::Error::custom(format!("invalid bool: {other}"))),
    }
}

fn de_u32<'de, D: Deserializer<'de>>(deserializer: D) -> Result<u32, D::Error> {
    de_opt_u32(deserializer)?
        .ok_or_else(|| serde::de::Error::custom("missing required numeric field"))
}

fn de_u64<'de, D: Deserializer<'de>>(deserializer: D) -> Result<u64, D::Error> {
    let value = serde_json::Value::deserialize(deserializer)?;
    parse_u64(&value).ok_or_else(|| serde::de::Error::custom(format!("invalid integer: {value}")))
}

fn de_opt_u32<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Option<u32>, D::Error> {
    let value = serde_json::Value::deserialize(deserializer)?;
    if value.is_null() {
        return Ok(None);
    }
    match parse_u64(&value).and_then(|n| u32::try_from(n).ok()) {
        Some(n) => Ok(Some(n)),
        None => Err(serde::de::Error::custom(format!("invalid integer: {value}"))),
    }
}

fn de_opt_f64<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Option<f64>, D::Error> {
    let value = serde_json::Value::deserialize(deserializer)?;
    match value {
        serde_json::Value::Null => Ok(None),
        serde_json::Value::Number(n) => Ok(n.as_f64()),
        serde_json::Value::String(s) if s.trim().is_empty() => Ok(None),
        serde_json::Value::String(s) => s
            .trim()
            .parse::<f64>()
            .map(Some)
            .map_err(|_| serde::de::Error::custom(format!("invalid number: {s:?}"))),
        other => Err(serde::de::Error::custom(format!("invalid number: {other}"))),
    }
}

fn de_opt_datetime<'de, D: Deserializer<'de>>(
    deserializer: D,
) -> Result<Option<NaiveDateTime>, D::Error> {
    let value: Option<String> = Option::deserialize(deserializer)?;
    match value {
        None => Ok(None),
        Some(s) if s.trim().is_empty() => Ok(None),
        Some(s) => NaiveDateTime::parse_from_str(s.trim(), "%Y-%m-%d %H:%M:%S")
            .map(Some)
            .map_err(|e| serde::de::Error::custom(format!("invalid timestamp {s:?}: {e}"))),
    }
}

fn parse_u64(value: &serde_json::Value) -> Option<u64> {
    match value {
        serde_json::Value::Number(n) => n.as_u64(),
        serde_json::Value::String(s) => s.trim().parse::<u64>().ok(),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn monitor_data_decodes_stringly_fields() {
        let raw = serde_json::json!({
            "Id": "3",
            "Name": "Driveway",
            "Function": "Modect",
            "Enabled": "1",
            "Type": "Remote",
            "Width": "1920",
            "Height": 1080,
            "MaxFPS": "10.00",
            "AlarmMaxFPS": null,
            "AnalysisFPS": "5.0",
            "AlarmFrameCount": "2"
        });

        let data: MonitorData = serde_json::from_value(raw).expect("decode");
        assert_eq!(data.id, 3);
        assert_eq!(data.function, FunctionMode::Modect);
        assert!(data.enabled);
        assert_eq!(data.width, Some(1920));
        assert_eq!(data.height, Some(1080));
        assert_eq!(data.max_fps, Some(10.0));
        assert_eq!(data.alarm_max_fps, None);
        assert_eq!(data.alarm_frame_count, Some(2));
    }

    #[test]
    fn alarm_state_decodes_number_or_string() {
        let from_num: AlarmStatusEnvelope =
            serde_json::from_value(serde_json::json!({ "status": 2 })).expect("decode");
        assert_eq!(from_num.status, AlarmState::Alarm);
        assert!(from_num.status.is_active());

        let from_str: AlarmStatusEnvelope =
            serde_json::from_value(serde_json::json!({ "status": "0" })).expect("decode");
        assert_eq!(from_str.status, AlarmState::Idle);
        assert!(!from_str.status.is_active());
    }

    #[test]
    fn alarm_state_rejects_unknown_code() {
        let result: Result<AlarmStatusEnvelope, _> =
            serde_json::from_value(serde_json::json!({ "status": 9 }));
        assert!(result.is_err());
    }

    #[test]
    fn function_mode_round_trips_wire_names() {
        assert_eq!("Mocord".parse::<FunctionMode>().ok(), Some(FunctionMode::Mocord));
        assert_eq!(FunctionMode::Nodect.to_string(), "Nodect");
        assert!(FunctionMode::Nodect.supports_force_alarm());
        assert!(!FunctionMode::Record.supports_force_alarm());
        assert!(FunctionMode::Mocord.records());
    }

    #[test]
    fn event_start_time_parses_server_format() {
        let raw = serde_json::json!({
            "Id": "101",
            "MonitorId": "3",
            "Cause": "Forced Web",
            "Notes": null,
            "StartTime": "2018-06-01 12:30:00"
        });
        let event: EventData = serde_json::from_value(raw).expect("decode");
        assert_eq!(event.id, 101);
        assert_eq!(event.monitor_id, 3);
        let start = event.start_time.expect("start time");
        assert_eq!(start.format("%H:%M:%S").to_string(), "12:30:00");
    }

    #[test]
    fn config_value_bool_coercion() {
        let cfg = ConfigValue { name: "ZM_OPT_FRAME_SERVER".into(), value: "1".into() };
        assert!(cfg.as_bool());
        let cfg = ConfigValue { name: "ZM_OPT_FRAME_SERVER".into(), value: "0".into() };
        assert!(!cfg.as_bool());
    }
}
