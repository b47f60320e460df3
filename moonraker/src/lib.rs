//! Moonraker client and per-printer supervision monitor
//!
//! This crate talks to Klipper hosts through their Moonraker HTTP API and
//! runs the supervision state machine that decides when an unauthorized
//! print is paused and when it may resume.

pub mod client;
pub mod monitor;
pub mod types;

// Re-exports
pub use client::MoonrakerClient;
pub use monitor::{MessageTemplate, Monitor, MonitorConfig};
pub use types::{
    DisplayStatus, GCodeMetadata, IdleTimeout, Job, JobListOrder, JobListParams, KlippyInfo,
    PrintStats, PrinterObjects, Thumbnail, VirtualSdCard, Webhooks,
};
