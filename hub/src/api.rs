//! Controller wire types and HTTP client
//!
//! The controller speaks a narrow vocabulary: the supervisor posts one
//! report per printer and receives zero or more control messages back.

use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use printwarden_core::{Error, Result};

const UPDATE_TIMEOUT: Duration = Duration::from_secs(5);

/// Operating mode the controller has placed a printer in.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OperationState {
    OutOfService,
    #[default]
    Normal,
    Closed,
}

/// Controller-side settings for one printer, cached and echoed back on the
/// next report.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ControlSetting {
    #[serde(rename = "state")]
    pub op_state: OperationState,
    pub enable_maintenance: bool,

    pub is_active: bool,
    pub usage_record_id: String,
}

/// Printer status as reported to the controller.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReportStatus {
    Idle,
    Running,
    Paused,
    Error,
    Disconnected,
    Unknown,
}

/// Job lifecycle as reported to the controller.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReportJobStatus {
    InProgress,
    Done,
    Quit,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JobReport {
    pub id: String,
    pub status: ReportJobStatus,

    pub content_id: String,
    pub start_time: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Report {
    pub status: ReportStatus,
    pub job_report: Option<JobReport>,
    pub current_control_setting: ControlSetting,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UpdateMessage {
    pub key: String,
    pub state: Report,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ControlMessage {
    pub key: String,
    #[serde(rename = "control_state", default)]
    pub control_setting: ControlSetting,
    #[serde(default)]
    pub active_job_id: String,
}

#[derive(Debug, Serialize)]
struct UpdateRequest<'a> {
    updates: &'a [UpdateMessage],
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct UpdateResponse {
    control_messages: Vec<ControlMessage>,
}

/// HTTP client for the central controller.
#[derive(Debug, Clone)]
pub struct HubClient {
    http: reqwest::Client,
    base_url: String,
    hub_id: String,
}

impl HubClient {
    pub fn new(base_url: &str, hub_id: &str) -> Result<Self> {
        let url: reqwest::Url = base_url
            .parse()
            .map_err(|e| Error::Config(format!("invalid controller url '{base_url}': {e}")))?;
        if url.cannot_be_a_base() {
            return Err(Error::Config(format!(
                "invalid controller url '{base_url}': not an http(s) base"
            )));
        }

        Ok(Self {
            http: reqwest::Client::new(),
            base_url: base_url.trim_end_matches('/').to_string(),
            hub_id: hub_id.to_string(),
        })
    }

    pub fn hub_id(&self) -> &str {
        &self.hub_id
    }

    /// Post the fleet report and decode the returned control messages.
    /// Non-2xx replies become [`Error::Controller`] with the body preserved
    /// for logging.
    pub async fn update_status(&self, updates: &[UpdateMessage]) -> Result<Vec<ControlMessage>> {
        let url = format!("{}/hub/{}/update", self.base_url, self.hub_id);

        let response = self
            .http
            .post(url)
            .json(&UpdateRequest { updates })
            .timeout(UPDATE_TIMEOUT)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(Error::Controller { status, body });
        }

        let decoded: UpdateResponse = response.json().await?;
        Ok(decoded.control_messages)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn control_setting_wire_names() {
        let raw = r#"{
            "state": "out_of_service",
            "enable_maintenance": true,
            "is_active": false,
            "usage_record_id": "rec-1"
        }"#;

        let setting: ControlSetting = serde_json::from_str(raw).unwrap();
        assert_eq!(setting.op_state, OperationState::OutOfService);
        assert!(setting.enable_maintenance);
        assert!(!setting.is_active);

        let json = serde_json::to_value(&setting).unwrap();
        assert_eq!(json["state"], "out_of_service");
    }

    #[test]
    fn control_message_tolerates_missing_fields() {
        let message: ControlMessage = serde_json::from_str(r#"{"key": "p1"}"#).unwrap();
        assert_eq!(message.key, "p1");
        assert_eq!(message.active_job_id, "");
        assert_eq!(message.control_setting, ControlSetting::default());
    }

    #[test]
    fn update_request_shape() {
        let updates = vec![UpdateMessage {
            key: "p1".to_string(),
            state: Report {
                status: ReportStatus::Running,
                job_report: None,
                current_control_setting: ControlSetting::default(),
            },
        }];

        let json = serde_json::to_value(UpdateRequest { updates: &updates }).unwrap();
        assert_eq!(json["updates"][0]["key"], "p1");
        assert_eq!(json["updates"][0]["state"]["status"], "running");
        assert!(json["updates"][0]["state"]["job_report"].is_null());
    }

    #[test]
    fn hub_client_rejects_bad_urls() {
        assert!(HubClient::new("definitely not", "hub-1").is_err());
        assert!(HubClient::new("https://controller.example", "hub-1").is_ok());
    }
}
