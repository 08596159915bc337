//! Player data model: the raw record from the reporting API and the
//! validated in-memory player built from it.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize};

/// A player exactly as the reporting API delivers it.
///
/// Everything except `number` arrives as text. Missing keys and `null`
/// values both become empty strings (or `0`).
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct RawPlayer {
    #[serde(deserialize_with = "null_as_default")]
    pub number: i64,
    #[serde(deserialize_with = "null_as_default")]
    pub id: String,
    #[serde(deserialize_with = "null_as_default")]
    pub group_name: String,
    #[serde(deserialize_with = "null_as_default")]
    pub panel_name: String,
    /// Comma-joined tag list.
    #[serde(rename = "f_tag", deserialize_with = "null_as_default")]
    pub tags: String,
    #[serde(deserialize_with = "null_as_default")]
    pub schedule_name: String,
    #[serde(deserialize_with = "null_as_default")]
    pub timezone_diff: String,
    /// `YYYY-MM-DD HH:MM:SS`.
    #[serde(deserialize_with = "null_as_default")]
    pub last_online: String,
    #[serde(deserialize_with = "null_as_default")]
    pub serial: String,
    #[serde(deserialize_with = "null_as_default")]
    pub mac: String,
    #[serde(deserialize_with = "null_as_default")]
    pub ip: String,
    #[serde(rename = "type", deserialize_with = "null_as_default")]
    pub device_type: String,
    #[serde(deserialize_with = "null_as_default")]
    pub model: String,
    #[serde(rename = "v", deserialize_with = "null_as_default")]
    pub version: String,
}

/// `null` reads as the type's zero value.
fn null_as_default<'de, D, T>(d: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Default + Deserialize<'de>,
{
    Ok(Option::<T>::deserialize(d)?.unwrap_or_default())
}

/// A validated player.
///
/// Only built once id, timezone and last-online parsed successfully.
/// `store_number` and `company_name` are derived from prefixed tags;
/// `0` and `""` mean "unassigned".
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Player {
    pub number: i64,
    #[serde(rename = "ID")]
    pub id: i64,
    pub group_name: String,
    #[serde(rename = "panelName")]
    pub player_name: String,
    pub tags: Vec<String>,
    pub schedule_name: String,
    pub time_zone_diff: i64,
    pub last_online: DateTime<Utc>,
    pub serial: String,
    #[serde(rename = "MAC")]
    pub mac: String,
    #[serde(rename = "IP")]
    pub ip: String,
    #[serde(rename = "type")]
    pub device_type: String,
    pub model: String,
    pub version: String,
    pub store_number: i64,
    pub company_name: String,
}

impl Player {
    /// First `/`-separated segment of the group name.
    pub fn root_group(&self) -> &str {
        self.group_name.split('/').next().unwrap_or_default()
    }
}

/// What started a pipeline run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Trigger {
    /// Cron schedule fired.
    Timer,
    /// `POST /api/v1/run`.
    Http,
    /// Started from the command line.
    Manual,
}

impl std::fmt::Display for Trigger {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Trigger::Timer => write!(f, "timer"),
            Trigger::Http => write!(f, "http"),
            Trigger::Manual => write!(f, "manual"),
        }
    }
}
