//! Printer facade endpoints

use std::sync::Arc;

use axum::{
    extract::{Path, Query, State},
    http::{header, HeaderMap, HeaderValue, StatusCode},
    response::IntoResponse,
    Json,
};
use serde::{Deserialize, Serialize};
use tracing::{error, instrument};

use printwarden_core::PrinterState;
use printwarden_moonraker::{
    DisplayStatus, GCodeMetadata, Job, Monitor, PrintStats, VirtualSdCard,
};

use super::ApiError;
use crate::state::AppState;

/// One printer as exposed to the UI.
#[derive(Debug, Serialize)]
pub struct PrinterView {
    pub key: String,
    pub name: String,
    pub url: String,

    pub registered_job_id: String,
    pub allow_no_register_print: bool,
    pub no_pause_duration: f64,

    pub state: PrinterState,
    pub message: String,
    pub last_update_time: i64,

    pub display_status: Option<DisplayStatus>,
    pub printer_stats: Option<PrintStats>,
    pub virtual_sd_card: Option<VirtualSdCard>,

    pub loaded_file: Option<GCodeMetadata>,
    pub latest_job: Option<Job>,
}

fn make_printer(key: &str, monitor: &Monitor) -> PrinterView {
    let objects = monitor.printer_objects();

    let (message, display_status, printer_stats, virtual_sd_card) = match objects.as_deref() {
        Some(objects) => {
            let message = if objects.webhooks.state != "ready" {
                objects.webhooks.state_message.clone()
            } else {
                objects.print_stats.message.clone()
            };
            (
                message,
                Some(objects.display_status.clone()),
                Some(objects.print_stats.clone()),
                Some(objects.virtual_sdcard.clone()),
            )
        }
        None => (String::new(), None, None, None),
    };

    PrinterView {
        key: key.to_string(),
        name: monitor.name().to_string(),
        url: monitor.printer_url().to_string(),

        registered_job_id: monitor.registered_job_id(),
        allow_no_register_print: monitor.allow_no_reg_print(),
        no_pause_duration: monitor.config().no_pause_duration.as_secs_f64(),

        state: monitor.state(),
        message,
        last_update_time: monitor.last_update_time().timestamp_millis(),

        display_status,
        printer_stats,
        virtual_sd_card,

        loaded_file: monitor.loaded_file().map(|file| (*file).clone()),
        latest_job: monitor.latest_job().map(|job| (*job).clone()),
    }
}

/// List all supervised printers
#[instrument(skip(state))]
pub async fn list_printers(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    let printers: Vec<PrinterView> = state
        .monitors()
        .map(|(key, monitor)| make_printer(key, monitor))
        .collect();

    Json(printers)
}

/// Get one printer by key
#[instrument(skip(state))]
pub async fn get_printer(
    State(state): State<Arc<AppState>>,
    Path(key): Path<String>,
) -> Result<impl IntoResponse, (StatusCode, Json<ApiError>)> {
    let monitor = state.monitor(&key).ok_or_else(ApiError::printer_not_found)?;
    Ok(Json(make_printer(&key, monitor)))
}

#[derive(Debug, Deserialize)]
pub struct UpdatePrinterParams {
    #[serde(rename = "regJobId")]
    reg_job_id: Option<String>,
    #[serde(rename = "allowNoRegPrint")]
    allow_no_reg_print: Option<bool>,
}

/// Echo of the fields that were actually applied.
#[derive(Debug, Serialize)]
pub struct UpdatePrinterResponse {
    pub reg_job_id: Option<String>,
    pub allow_no_reg_print: Option<bool>,
}

/// Update a printer's authorization fields; either query parameter may be
/// omitted independently.
#[instrument(skip(state))]
pub async fn update_printer(
    State(state): State<Arc<AppState>>,
    Path(key): Path<String>,
    Query(params): Query<UpdatePrinterParams>,
) -> Result<impl IntoResponse, (StatusCode, Json<ApiError>)> {
    let monitor = state.monitor(&key).ok_or_else(ApiError::printer_not_found)?;

    let mut response = UpdatePrinterResponse {
        reg_job_id: None,
        allow_no_reg_print: None,
    };

    if let Some(job_id) = params.reg_job_id {
        monitor.set_registered_job_id(&job_id).await;
        response.reg_job_id = Some(job_id);
    }

    if let Some(allow) = params.allow_no_reg_print {
        monitor.set_allow_no_reg_print(allow).await;
        response.allow_no_reg_print = Some(allow);
    }

    Ok(Json(response))
}

/// Stream the last thumbnail of the printer's latest job
#[instrument(skip(state))]
pub async fn latest_thumbnail(
    State(state): State<Arc<AppState>>,
    Path(key): Path<String>,
) -> Result<impl IntoResponse, (StatusCode, Json<ApiError>)> {
    let monitor = state.monitor(&key).ok_or_else(ApiError::printer_not_found)?;

    let job = monitor
        .latest_job()
        .ok_or_else(|| ApiError::not_found("no latest job"))?;

    let thumbnail = job
        .metadata
        .as_ref()
        .and_then(|metadata| metadata.thumbnails.last())
        .ok_or_else(|| ApiError::not_found("no thumbnails"))?
        .clone();

    let (content_type, body) = monitor
        .client()
        .gcode_file(&thumbnail.relative_path)
        .await
        .map_err(|e| {
            error!(printer = %key, error = %e, "failed to fetch thumbnail");
            ApiError::internal_error("failed to fetch thumbnail")
        })?;

    let mut headers = HeaderMap::new();
    if let Some(value) = content_type.and_then(|ct| HeaderValue::from_str(&ct).ok()) {
        headers.insert(header::CONTENT_TYPE, value);
    }

    Ok((headers, body))
}
