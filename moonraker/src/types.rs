//! Moonraker wire types
//!
//! Response shapes for the subset of the Moonraker API the supervisor uses.
//! Moonraker omits fields freely depending on printer state, so everything
//! deserializes with defaults; serialization keeps the upstream JSON names
//! because the read-only facade re-exposes these objects verbatim.

use serde::{Deserialize, Serialize};

/// Moonraker error payload, present instead of a result on failed queries.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(default)]
pub struct ApiErrorBody {
    pub code: i64,
    pub message: String,
    pub traceback: String,
}

// ---------------------------
// Printer object status

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(default)]
pub struct DisplayStatus {
    pub message: String,
    pub progress: f64,
}

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(default)]
pub struct IdleTimeout {
    pub state: String,
    pub printing_time: f64,
}

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(default)]
pub struct PrintStats {
    pub filename: String,
    pub total_duration: f64,
    pub print_duration: f64,
    pub filament_used: f64,
    pub state: String,
    pub message: String,
}

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(default)]
pub struct Toolhead {
    pub print_time: f64,
    pub estimated_print_time: f64,
}

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(default)]
pub struct VirtualSdCard {
    pub progress: f64,
    pub is_active: bool,
}

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(default)]
pub struct Webhooks {
    pub state: String,
    pub state_message: String,
}

/// The object set queried on every fast-loop tick.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct PrinterStatus {
    pub display_status: DisplayStatus,
    pub idle_timeout: IdleTimeout,
    pub print_stats: PrintStats,
    pub toolhead: Toolhead,
    pub virtual_sdcard: VirtualSdCard,
    pub webhooks: Webhooks,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct PrinterObjectsResult {
    pub eventtime: f64,
    pub status: Option<PrinterStatus>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct PrinterObjectsResponse {
    pub result: PrinterObjectsResult,
    pub error: Option<ApiErrorBody>,
}

/// The monitor's cached snapshot of one poll.
#[derive(Debug, Clone, Default)]
pub struct PrinterObjects {
    pub display_status: DisplayStatus,
    pub idle_timeout: IdleTimeout,
    pub print_stats: PrintStats,
    pub virtual_sdcard: VirtualSdCard,
    pub webhooks: Webhooks,
}

impl From<PrinterStatus> for PrinterObjects {
    fn from(status: PrinterStatus) -> Self {
        Self {
            display_status: status.display_status,
            idle_timeout: status.idle_timeout,
            print_stats: status.print_stats,
            virtual_sdcard: status.virtual_sdcard,
            webhooks: status.webhooks,
        }
    }
}

// ---------------------------
// Klippy host information

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(default)]
pub struct KlippyInfo {
    pub state: String,
    pub state_message: String,
    pub hostname: String,
    pub software_version: String,
    pub cpu_info: String,
    pub klipper_path: String,
    pub python_path: String,
    pub log_file: String,
    pub config_file: String,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct KlippyInfoResponse {
    pub result: KlippyInfo,
}

// ---------------------------
// Commands (pause/resume/gcode)

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct CommandResponse {
    pub result: String,
}

// ---------------------------
// GCode metadata

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(default)]
pub struct Thumbnail {
    pub width: i64,
    pub height: i64,
    pub size: u64,
    pub relative_path: String,
}

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(default)]
pub struct GCodeMetadata {
    pub print_start_time: Option<f64>,
    pub job_id: Option<String>,
    pub size: u64,
    pub modified: f64,
    pub uuid: String,
    pub slicer: String,
    pub slicer_version: String,
    pub layer_height: f64,
    pub first_layer_height: f64,
    pub object_height: f64,
    pub filament_total: f64,
    pub estimated_time: f64,
    pub thumbnails: Vec<Thumbnail>,
    pub gcode_start_byte: u64,
    pub gcode_end_byte: u64,
    pub filename: String,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct GCodeMetadataResponse {
    pub result: Option<GCodeMetadata>,
    pub error: Option<ApiErrorBody>,
}

// ---------------------------
// Job history

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(default)]
pub struct Job {
    pub job_id: String,
    pub exists: bool,
    pub start_time: f64,
    pub end_time: Option<f64>,
    pub total_duration: f64,
    pub print_duration: f64,
    pub filament_used: f64,
    pub filename: String,
    pub metadata: Option<GCodeMetadata>,
    pub status: String,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct JobList {
    pub count: i64,
    pub jobs: Vec<Job>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct JobListResponse {
    pub result: Option<JobList>,
    pub error: Option<ApiErrorBody>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum JobListOrder {
    Asc,
    #[default]
    Desc,
}

/// Query parameters for `/server/history/list`.
#[derive(Debug, Clone, Default)]
pub struct JobListParams {
    pub limit: Option<u32>,
    pub start: Option<u32>,
    pub since: Option<chrono::DateTime<chrono::Utc>>,
    pub before: Option<chrono::DateTime<chrono::Utc>>,
    pub order: JobListOrder,
}

impl JobListParams {
    /// Latest entry only.
    pub fn latest() -> Self {
        Self {
            limit: Some(1),
            ..Self::default()
        }
    }

    /// Encode as query pairs. Timestamps are epoch microseconds, the unit
    /// Moonraker's history endpoint expects.
    pub(crate) fn to_query(&self) -> Vec<(&'static str, String)> {
        let mut query = Vec::new();
        if let Some(limit) = self.limit {
            query.push(("limit", limit.to_string()));
        }
        if let Some(start) = self.start {
            query.push(("start", start.to_string()));
        }
        if let Some(since) = self.since {
            query.push(("since", (since.timestamp_millis() * 1000).to_string()));
        }
        if let Some(before) = self.before {
            query.push(("before", (before.timestamp_millis() * 1000).to_string()));
        }
        if self.order == JobListOrder::Asc {
            query.push(("order", "asc".to_string()));
        }
        query
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn printer_objects_response_with_status() {
        let raw = r#"{
            "result": {
                "eventtime": 578243.57824499,
                "status": {
                    "webhooks": {"state": "ready", "state_message": "Printer is ready"},
                    "print_stats": {"filename": "part.gcode", "state": "printing", "print_duration": 81.5},
                    "display_status": {"message": "", "progress": 0.25},
                    "virtual_sdcard": {"progress": 0.25, "is_active": true}
                }
            }
        }"#;

        let parsed: PrinterObjectsResponse = serde_json::from_str(raw).unwrap();
        let status = parsed.result.status.unwrap();
        assert_eq!(status.webhooks.state, "ready");
        assert_eq!(status.print_stats.state, "printing");
        assert_eq!(status.print_stats.print_duration, 81.5);
        // idle_timeout was omitted entirely
        assert_eq!(status.idle_timeout.state, "");
        assert!(parsed.error.is_none());
    }

    #[test]
    fn printer_objects_response_with_error() {
        let raw = r#"{
            "result": {"eventtime": 0, "status": null},
            "error": {"code": 400, "message": "Invalid query"}
        }"#;

        let parsed: PrinterObjectsResponse = serde_json::from_str(raw).unwrap();
        assert!(parsed.result.status.is_none());
        let error = parsed.error.unwrap();
        assert_eq!(error.code, 400);
        assert_eq!(error.message, "Invalid query");
    }

    #[test]
    fn job_deserializes_history_entry() {
        let raw = r#"{
            "job_id": "000001",
            "exists": true,
            "start_time": 1700000000.5,
            "end_time": null,
            "status": "in_progress",
            "filename": "benchy.gcode",
            "metadata": {"uuid": "aaaa-bbbb", "estimated_time": 3600.0,
                         "thumbnails": [{"width": 32, "height": 32, "size": 1024, "relative_path": ".thumbs/benchy-32x32.png"}]}
        }"#;

        let job: Job = serde_json::from_str(raw).unwrap();
        assert_eq!(job.job_id, "000001");
        assert_eq!(job.status, "in_progress");
        assert!(job.end_time.is_none());
        let metadata = job.metadata.unwrap();
        assert_eq!(metadata.uuid, "aaaa-bbbb");
        assert_eq!(metadata.thumbnails.len(), 1);
    }

    #[test]
    fn job_list_params_encoding() {
        let params = JobListParams::latest();
        assert_eq!(params.to_query(), vec![("limit", "1".to_string())]);

        let since = chrono::DateTime::from_timestamp(1_700_000_000, 0).unwrap();
        let params = JobListParams {
            limit: Some(5),
            start: Some(10),
            since: Some(since),
            before: None,
            order: JobListOrder::Asc,
        };
        let query = params.to_query();
        assert!(query.contains(&("limit", "5".to_string())));
        assert!(query.contains(&("start", "10".to_string())));
        assert!(query.contains(&("since", "1700000000000000".to_string())));
        assert!(query.contains(&("order", "asc".to_string())));
    }
}
