//! Controller report/control cycle
//!
//! One background task: every cycle it snapshots all monitors into a batch
//! update, posts it, and writes the returned authorization directives back
//! into the monitors. A failed post just ends the cycle — the controller
//! sees a gap and the next cycle retries.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use chrono::DateTime;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;
use tracing::{error, warn};

use printwarden_core::{Error, PrinterState};
use printwarden_moonraker::{Job, Monitor};

use crate::api::{
    ControlMessage, ControlSetting, HubClient, JobReport, Report, ReportJobStatus, ReportStatus,
    UpdateMessage,
};

const UPDATE_PERIOD: Duration = Duration::from_secs(2);

/// Bridges the monitor fleet to the central controller.
pub struct Connector {
    client: HubClient,
    monitors: HashMap<String, Arc<Monitor>>,
    control_settings: Mutex<HashMap<String, ControlSetting>>,
    run_token: Mutex<Option<CancellationToken>>,
}

impl Connector {
    pub fn new(client: HubClient, monitors: HashMap<String, Arc<Monitor>>) -> Self {
        Self {
            client,
            monitors,
            control_settings: Mutex::new(HashMap::new()),
            run_token: Mutex::new(None),
        }
    }

    /// Spawn the report/control cycle. Idempotent while running.
    pub fn start(self: &Arc<Self>, parent: &CancellationToken) {
        let mut run_token = match self.run_token.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        if run_token.is_some() {
            return;
        }

        let token = parent.child_token();
        *run_token = Some(token.clone());
        drop(run_token);

        let connector = Arc::clone(self);
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(UPDATE_PERIOD);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

            loop {
                tokio::select! {
                    _ = token.cancelled() => break,
                    _ = ticker.tick() => connector.sync_once().await,
                }
            }
        });
    }

    /// Cancel the cycle. Idempotent.
    pub fn stop(&self) {
        let mut run_token = match self.run_token.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        if let Some(token) = run_token.take() {
            token.cancel();
        }
    }

    async fn sync_once(&self) {
        let updates = self.build_updates();

        let messages = match self.client.update_status(&updates).await {
            Ok(messages) => messages,
            Err(err) => {
                match &err {
                    Error::Controller { status, body } => {
                        error!(
                            hub = %self.client.hub_id(),
                            status = %status,
                            body = %body,
                            "controller rejected hub update"
                        );
                    }
                    _ => {
                        error!(hub = %self.client.hub_id(), error = %err, "hub update failed");
                    }
                }
                return;
            }
        };

        for message in messages {
            self.apply_control_message(message).await;
        }
    }

    fn build_updates(&self) -> Vec<UpdateMessage> {
        let settings = match self.control_settings.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };

        self.monitors
            .iter()
            .map(|(key, monitor)| UpdateMessage {
                key: key.clone(),
                state: Report {
                    status: report_status(monitor.state()),
                    job_report: monitor.latest_job().as_deref().map(job_report),
                    current_control_setting: settings.get(key).cloned().unwrap_or_default(),
                },
            })
            .collect()
    }

    async fn apply_control_message(&self, message: ControlMessage) {
        let Some(monitor) = self.monitors.get(&message.key) else {
            warn!(key = %message.key, "control message for unknown printer");
            return;
        };

        {
            let mut settings = match self.control_settings.lock() {
                Ok(guard) => guard,
                Err(poisoned) => poisoned.into_inner(),
            };
            settings.insert(message.key.clone(), message.control_setting.clone());
        }

        let (registered_job_id, allow_no_reg_print) = authorization_from(&message);
        monitor.set_registered_job_id(&registered_job_id).await;
        monitor.set_allow_no_reg_print(allow_no_reg_print).await;
    }
}

/// Translate the supervision state into the controller's vocabulary.
fn report_status(state: PrinterState) -> ReportStatus {
    match state {
        PrinterState::Ready => ReportStatus::Idle,
        PrinterState::PrePrint | PrinterState::Printing => ReportStatus::Running,
        PrinterState::Paused => ReportStatus::Paused,
        PrinterState::Error
        | PrinterState::InternalError
        | PrinterState::KlippyError
        | PrinterState::KlippyShutdown
        | PrinterState::KlippyDisconnected => ReportStatus::Error,
        PrinterState::Disconnected => ReportStatus::Disconnected,
        PrinterState::KlippyStartup | PrinterState::Unknown => ReportStatus::Unknown,
    }
}

fn job_report(job: &Job) -> JobReport {
    let status = match job.status.as_str() {
        "in_progress" => ReportJobStatus::InProgress,
        "completed" => ReportJobStatus::Done,
        _ => ReportJobStatus::Quit,
    };

    JobReport {
        id: job.job_id.clone(),
        status,
        content_id: job
            .metadata
            .as_ref()
            .map(|metadata| metadata.uuid.clone())
            .unwrap_or_default(),
        start_time: DateTime::from_timestamp_millis((job.start_time * 1000.0) as i64)
            .unwrap_or(DateTime::UNIX_EPOCH),
    }
}

/// The two authorization fields a control message dictates.
fn authorization_from(message: &ControlMessage) -> (String, bool) {
    if !message.control_setting.is_active {
        return (String::new(), false);
    }

    if message.active_job_id.is_empty() {
        (String::new(), true)
    } else {
        (message.active_job_id.clone(), false)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_translation() {
        let cases = [
            (PrinterState::Ready, ReportStatus::Idle),
            (PrinterState::PrePrint, ReportStatus::Running),
            (PrinterState::Printing, ReportStatus::Running),
            (PrinterState::Paused, ReportStatus::Paused),
            (PrinterState::Error, ReportStatus::Error),
            (PrinterState::InternalError, ReportStatus::Error),
            (PrinterState::KlippyError, ReportStatus::Error),
            (PrinterState::KlippyShutdown, ReportStatus::Error),
            (PrinterState::KlippyDisconnected, ReportStatus::Error),
            (PrinterState::Disconnected, ReportStatus::Disconnected),
            (PrinterState::KlippyStartup, ReportStatus::Unknown),
            (PrinterState::Unknown, ReportStatus::Unknown),
        ];

        for (state, expected) in cases {
            assert_eq!(report_status(state), expected, "state = {state}");
        }
    }

    #[test]
    fn job_report_mapping() {
        let mut job = Job {
            job_id: "000042".to_string(),
            status: "in_progress".to_string(),
            start_time: 1_700_000_000.5,
            ..Job::default()
        };

        let report = job_report(&job);
        assert_eq!(report.id, "000042");
        assert_eq!(report.status, ReportJobStatus::InProgress);
        assert_eq!(report.content_id, "");
        assert_eq!(report.start_time.timestamp_millis(), 1_700_000_000_500);

        job.status = "completed".to_string();
        assert_eq!(job_report(&job).status, ReportJobStatus::Done);

        job.status = "cancelled".to_string();
        assert_eq!(job_report(&job).status, ReportJobStatus::Quit);

        job.metadata = Some(printwarden_moonraker::GCodeMetadata {
            uuid: "uuid-1".to_string(),
            ..Default::default()
        });
        assert_eq!(job_report(&job).content_id, "uuid-1");
    }

    #[test]
    fn authorization_cases() {
        let mut message = ControlMessage {
            key: "p1".to_string(),
            control_setting: ControlSetting {
                is_active: true,
                ..ControlSetting::default()
            },
            active_job_id: "J7".to_string(),
        };

        // Active with a job: register it, no unregistered printing.
        assert_eq!(authorization_from(&message), ("J7".to_string(), false));

        // Active without a job: open use.
        message.active_job_id = String::new();
        assert_eq!(authorization_from(&message), (String::new(), true));

        // Inactive: lock the printer regardless of the job id sent along.
        message.control_setting.is_active = false;
        message.active_job_id = "anything".to_string();
        assert_eq!(authorization_from(&message), (String::new(), false));
    }

    #[tokio::test]
    async fn control_message_updates_monitor() {
        use printwarden_moonraker::{MessageTemplate, MonitorConfig};

        let monitor = Arc::new(
            Monitor::new(
                "p1",
                "http://127.0.0.1:7125",
                MonitorConfig {
                    no_pause_duration: Duration::from_secs(30),
                    will_pause_message: MessageTemplate::new("pausing in {{.RemainDurationStr}}"),
                    pause_message: MessageTemplate::new("paused"),
                },
            )
            .unwrap(),
        );
        monitor.set_registered_job_id("J1").await;
        monitor.set_allow_no_reg_print(true).await;

        let monitors = HashMap::from([("p1".to_string(), Arc::clone(&monitor))]);
        let connector = Connector::new(
            HubClient::new("http://127.0.0.1:9000", "hub-1").unwrap(),
            monitors,
        );

        let message = ControlMessage {
            key: "p1".to_string(),
            control_setting: ControlSetting {
                is_active: false,
                ..ControlSetting::default()
            },
            active_job_id: "anything".to_string(),
        };
        connector.apply_control_message(message).await;

        assert_eq!(monitor.registered_job_id(), "");
        assert!(!monitor.allow_no_reg_print());

        // The setting is cached and echoed on the next report.
        let updates = connector.build_updates();
        assert_eq!(updates.len(), 1);
        assert!(!updates[0].state.current_control_setting.is_active);
    }
}
