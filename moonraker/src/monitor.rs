//! Per-printer supervision monitor
//!
//! Each monitor polls one printer and reconciles against the latest
//! snapshot: a fast loop derives the supervision state and enforces the
//! pause/resume policy, a slow loop refreshes the cached job history entry
//! and the loaded file's metadata. Every tick stands alone — the snapshot
//! fetched in that tick determines every action issued in it, and a failed
//! action is simply re-derived (and re-issued if still warranted) on the
//! next tick.
//!
//! Shared state is published through watch cells and atomic flags so the
//! facade and the hub connector read consistent values without taking a
//! lock across the whole monitor.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use chrono::{DateTime, Utc};
use tokio::sync::watch;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

use printwarden_core::{PrinterState, Result};

use crate::client::MoonrakerClient;
use crate::types::{GCodeMetadata, Job, PrinterObjects};

const FAST_POLL_PERIOD: Duration = Duration::from_secs(2);
const SLOW_POLL_PERIOD: Duration = Duration::from_secs(5);

/// Display message template. The only recognized placeholder is
/// `{{.RemainDurationStr}}`, substituted with the formatted time left
/// before an unauthorized print is paused.
#[derive(Debug, Clone)]
pub struct MessageTemplate(String);

impl MessageTemplate {
    pub fn new(text: impl Into<String>) -> Self {
        Self(text.into())
    }

    pub fn render(&self) -> String {
        self.0.clone()
    }

    pub fn render_remaining(&self, remain: &str) -> String {
        self.0.replace("{{.RemainDurationStr}}", remain)
    }
}

/// Immutable policy configuration shared by all monitors.
#[derive(Debug, Clone)]
pub struct MonitorConfig {
    /// Grace period an unauthorized job is permitted before being paused.
    pub no_pause_duration: Duration,
    /// Countdown shown while the grace period runs out.
    pub will_pause_message: MessageTemplate,
    /// Message shown once the job has been paused.
    pub pause_message: MessageTemplate,
}

/// Everything one fast-loop tick decided, computed before anything is sent
/// to the printer.
#[derive(Debug, Default, PartialEq)]
struct TickPlan {
    /// `paused_by_monitor` after this tick.
    paused_by_monitor: bool,
    /// Pause the print and show this message.
    pause_message: Option<String>,
    /// Show this countdown message (mutually exclusive with pausing).
    countdown_message: Option<String>,
    /// Issue a resume and clear the display.
    resume: bool,
}

/// Supervisor for a single printer.
pub struct Monitor {
    name: String,
    client: MoonrakerClient,
    config: MonitorConfig,

    registered_job_id: watch::Sender<String>,
    allow_no_reg_print: AtomicBool,
    paused_by_monitor: AtomicBool,
    last_message: watch::Sender<String>,

    state: watch::Sender<PrinterState>,
    last_update_time: watch::Sender<DateTime<Utc>>,
    printer_objects: watch::Sender<Option<Arc<PrinterObjects>>>,
    has_loaded_file: AtomicBool,

    latest_job: watch::Sender<Option<Arc<Job>>>,
    loaded_file: watch::Sender<Option<Arc<GCodeMetadata>>>,

    run_token: Mutex<Option<CancellationToken>>,
}

impl Monitor {
    pub fn new(name: impl Into<String>, printer_url: &str, config: MonitorConfig) -> Result<Self> {
        Ok(Self {
            name: name.into(),
            client: MoonrakerClient::new(printer_url)?,
            config,

            registered_job_id: watch::Sender::new(String::new()),
            allow_no_reg_print: AtomicBool::new(true),
            paused_by_monitor: AtomicBool::new(false),
            last_message: watch::Sender::new(String::new()),

            state: watch::Sender::new(PrinterState::Disconnected),
            last_update_time: watch::Sender::new(Utc::now()),
            printer_objects: watch::Sender::new(None),
            has_loaded_file: AtomicBool::new(false),

            latest_job: watch::Sender::new(None),
            loaded_file: watch::Sender::new(None),

            run_token: Mutex::new(None),
        })
    }

    // ---- accessors ----

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn printer_url(&self) -> &str {
        self.client.base_url()
    }

    pub fn config(&self) -> &MonitorConfig {
        &self.config
    }

    pub fn client(&self) -> &MoonrakerClient {
        &self.client
    }

    pub fn state(&self) -> PrinterState {
        *self.state.borrow()
    }

    pub fn last_update_time(&self) -> DateTime<Utc> {
        *self.last_update_time.borrow()
    }

    pub fn printer_objects(&self) -> Option<Arc<PrinterObjects>> {
        self.printer_objects.borrow().clone()
    }

    pub fn latest_job(&self) -> Option<Arc<Job>> {
        self.latest_job.borrow().clone()
    }

    pub fn loaded_file(&self) -> Option<Arc<GCodeMetadata>> {
        self.loaded_file.borrow().clone()
    }

    pub fn registered_job_id(&self) -> String {
        self.registered_job_id.borrow().clone()
    }

    pub fn allow_no_reg_print(&self) -> bool {
        self.allow_no_reg_print.load(Ordering::Relaxed)
    }

    pub fn paused_by_monitor(&self) -> bool {
        self.paused_by_monitor.load(Ordering::Relaxed)
    }

    fn should_print(&self) -> bool {
        self.allow_no_reg_print() || !self.registered_job_id.borrow().is_empty()
    }

    fn is_running(&self) -> bool {
        self.run_token
            .lock()
            .map(|token| token.is_some())
            .unwrap_or(false)
    }

    // ---- authorization setters ----

    /// Register the job allowed to print. A non-empty registration clears
    /// the monitor's own display message (best effort).
    pub async fn set_registered_job_id(&self, job_id: &str) {
        self.registered_job_id.send_replace(job_id.to_string());

        if self.is_running() && !job_id.is_empty() {
            if let Err(e) = self.clear_message().await {
                error!(printer = %self.name, error = %e, "failed to clear display message");
            }
        }
    }

    /// Allow or forbid printing without a registration. Allowing clears the
    /// monitor's own display message (best effort).
    pub async fn set_allow_no_reg_print(&self, allow: bool) {
        self.allow_no_reg_print.store(allow, Ordering::Relaxed);

        if self.is_running() && allow {
            if let Err(e) = self.clear_message().await {
                error!(printer = %self.name, error = %e, "failed to clear display message");
            }
        }
    }

    // ---- lifecycle ----

    /// Spawn the fast and slow polling loops. Idempotent while running.
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

        let monitor = Arc::clone(self);
        let fast_token = token.clone();
        tokio::spawn(async move { monitor.run_fast_loop(fast_token).await });

        let monitor = Arc::clone(self);
        tokio::spawn(async move { monitor.run_slow_loop(token).await });
    }

    /// Cancel the polling loops. Idempotent.
    pub fn stop(&self) {
        let mut run_token = match self.run_token.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        if let Some(token) = run_token.take() {
            token.cancel();
        }
    }

    async fn run_fast_loop(self: Arc<Self>, token: CancellationToken) {
        let mut ticker = tokio::time::interval(FAST_POLL_PERIOD);
        // A tick must never overlap its predecessor.
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                _ = token.cancelled() => break,
                _ = ticker.tick() => self.poll_printer().await,
            }
        }
    }

    async fn run_slow_loop(self: Arc<Self>, token: CancellationToken) {
        let mut ticker = tokio::time::interval(SLOW_POLL_PERIOD);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                _ = token.cancelled() => break,
                _ = ticker.tick() => {
                    tokio::join!(self.refresh_latest_job(), self.refresh_loaded_file());
                }
            }
        }
    }

    // ---- fast loop ----

    async fn poll_printer(&self) {
        let response = self.client.printer_objects().await;
        self.last_update_time.send_replace(Utc::now());

        let response = match response {
            Ok(response) => response,
            Err(err) => {
                self.printer_objects.send_replace(None);
                self.has_loaded_file.store(false, Ordering::Relaxed);

                if err.is_disconnect() {
                    self.state.send_replace(PrinterState::Disconnected);
                } else {
                    self.state.send_replace(PrinterState::InternalError);
                    error!(printer = %self.name, error = %err, "failed to query printer objects");
                }
                return;
            }
        };

        let Some(status) = response.result.status else {
            self.state.send_replace(PrinterState::Error);
            self.has_loaded_file.store(false, Ordering::Relaxed);

            if let Some(api_error) = response.error {
                error!(
                    printer = %self.name,
                    code = api_error.code,
                    message = %api_error.message,
                    "moonraker reported an error"
                );
            }
            return;
        };

        let objects = Arc::new(PrinterObjects::from(status));
        self.printer_objects.send_replace(Some(Arc::clone(&objects)));

        let (state, has_loaded_file) = derive_state(&objects);
        self.state.send_replace(state);
        self.has_loaded_file.store(has_loaded_file, Ordering::Relaxed);

        if objects.webhooks.state != "ready" {
            return;
        }

        self.enforce_policy(state, &objects).await;
    }

    async fn enforce_policy(&self, state: PrinterState, objects: &PrinterObjects) {
        let should_print = self.should_print();

        if state == PrinterState::Printing && !should_print {
            info!(printer = %self.name, "printer is running an unauthorized print");
        }

        let plan = plan_tick(
            state,
            should_print,
            self.paused_by_monitor(),
            duration_from_secs(objects.print_stats.print_duration),
            &self.config,
        );

        if let Some(message) = &plan.pause_message {
            info!(printer = %self.name, "pausing print");
            if let Err(e) = self.client.pause_print().await {
                error!(printer = %self.name, error = %e, "failed to pause print");
            }
            if let Err(e) = self.update_status_message(message).await {
                error!(printer = %self.name, error = %e, "failed to update display message");
            }
        } else if let Some(message) = &plan.countdown_message {
            if let Err(e) = self.update_status_message(message).await {
                error!(printer = %self.name, error = %e, "failed to update display message");
            }
        }

        if plan.resume {
            info!(printer = %self.name, "resuming print");
            if let Err(e) = self.client.resume_print().await {
                error!(printer = %self.name, error = %e, "failed to resume print");
            }
            if let Err(e) = self.clear_message().await {
                error!(printer = %self.name, error = %e, "failed to clear display message");
            }
        }

        self.paused_by_monitor
            .store(plan.paused_by_monitor, Ordering::Relaxed);
    }

    // ---- display etiquette ----

    /// Write `msg` to the display unless it is already showing. Records the
    /// message on every attempted write so [`clear_message`] can later tell
    /// whether the display content is ours.
    ///
    /// [`clear_message`]: Monitor::clear_message
    async fn update_status_message(&self, msg: &str) -> Result<()> {
        let observed = self
            .printer_objects
            .borrow()
            .as_ref()
            .map(|objects| objects.display_status.message.clone());

        if observed.as_deref() == Some(msg) {
            return Ok(());
        }

        self.last_message.send_replace(msg.to_string());
        self.client.set_status_message(msg).await
    }

    /// Clear the display, but only when it still shows the last message this
    /// monitor set — never wipe a message someone else put there.
    async fn clear_message(&self) -> Result<()> {
        let Some(objects) = self.printer_objects.borrow().clone() else {
            return Ok(());
        };

        if *self.last_message.borrow() == objects.display_status.message {
            return self.update_status_message("").await;
        }

        Ok(())
    }

    // ---- slow loop ----

    async fn refresh_latest_job(&self) {
        if self.state().is_offline() {
            self.latest_job.send_replace(None);
            return;
        }

        let job = match self.client.latest_job().await {
            Ok(job) => job,
            Err(e) => {
                error!(printer = %self.name, error = %e, "failed to fetch latest job");
                return;
            }
        };

        let Some(job) = job else {
            warn!(printer = %self.name, "printer has no job history");
            self.latest_job.send_replace(None);
            return;
        };

        if !registration_valid(&job, &self.registered_job_id.borrow()) {
            self.registered_job_id.send_replace(String::new());
        }

        self.latest_job.send_replace(Some(Arc::new(job)));
    }

    async fn refresh_loaded_file(&self) {
        if self.state().is_offline() || !self.has_loaded_file.load(Ordering::Relaxed) {
            self.loaded_file.send_replace(None);
            return;
        }

        let filename = self
            .printer_objects
            .borrow()
            .as_ref()
            .map(|objects| objects.print_stats.filename.clone())
            .unwrap_or_default();
        if filename.is_empty() {
            return;
        }

        match self.client.gcode_metadata(&filename).await {
            Ok(metadata) => {
                self.loaded_file
                    .send_replace(metadata.map(Arc::new));
            }
            Err(e) => {
                error!(printer = %self.name, error = %e, "failed to fetch gcode metadata");
            }
        }
    }
}

/// Derive the supervision state and whether a file is loaded from one
/// snapshot. Total over every input.
fn derive_state(objects: &PrinterObjects) -> (PrinterState, bool) {
    if objects.webhooks.state != "ready" {
        let state = match objects.webhooks.state.as_str() {
            "startup" => PrinterState::KlippyStartup,
            "shutdown" => PrinterState::KlippyShutdown,
            "error" => PrinterState::KlippyError,
            "disconnected" => PrinterState::KlippyDisconnected,
            _ => PrinterState::Unknown,
        };
        return (state, false);
    }

    let state = match objects.print_stats.state.as_str() {
        "standby" | "complete" | "cancelled" => PrinterState::Ready,
        "printing" => {
            if objects.print_stats.print_duration > 0.0 {
                PrinterState::Printing
            } else {
                PrinterState::PrePrint
            }
        }
        "paused" => PrinterState::Paused,
        "error" => PrinterState::Error,
        _ => PrinterState::Unknown,
    };

    let has_loaded_file = objects.print_stats.state != "standby"
        && state != PrinterState::Error
        && state != PrinterState::Unknown;

    (state, has_loaded_file)
}

/// Decide one tick's policy actions. Evaluation order matters: detection
/// may set the pause flag that the pause branch then acts on, and the
/// resume branch clears the flag even when no resume can be issued yet.
fn plan_tick(
    state: PrinterState,
    should_print: bool,
    paused_by_monitor: bool,
    print_duration: Duration,
    config: &MonitorConfig,
) -> TickPlan {
    let mut paused = paused_by_monitor;
    let printing = state == PrinterState::Printing;

    if printing && !should_print && print_duration > config.no_pause_duration {
        paused = true;
    }

    let mut plan = TickPlan {
        paused_by_monitor: paused,
        ..TickPlan::default()
    };

    if printing && paused {
        plan.pause_message = Some(config.pause_message.render());
    } else if printing && !paused && !should_print {
        let remain = config.no_pause_duration.saturating_sub(print_duration);
        plan.countdown_message = Some(
            config
                .will_pause_message
                .render_remaining(&format_whole_seconds(remain)),
        );
    }

    if paused && should_print {
        if state == PrinterState::Paused {
            plan.resume = true;
        }
        plan.paused_by_monitor = false;
    }

    plan
}

/// A registration is only valid while it names the in-progress job.
fn registration_valid(job: &Job, registered_job_id: &str) -> bool {
    job.status == "in_progress" && job.job_id == registered_job_id
}

fn duration_from_secs(secs: f64) -> Duration {
    if secs.is_finite() && secs > 0.0 {
        Duration::from_secs_f64(secs)
    } else {
        Duration::ZERO
    }
}

/// Round to whole seconds (half away from zero) and format for the display.
fn format_whole_seconds(duration: Duration) -> String {
    let rounded = Duration::from_secs(duration.as_secs_f64().round() as u64);
    humantime::format_duration(rounded).to_string()
}
