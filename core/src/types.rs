//! Shared types

use serde::{Deserialize, Serialize};
use std::fmt;

/// Supervision state derived from a printer snapshot.
///
/// The `klippy_*` family mirrors the host lifecycle reported by the
/// `webhooks` object; the middle group is derived from `print_stats` while
/// the host is ready; the last group covers the cases where no usable
/// snapshot exists.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PrinterState {
    KlippyStartup,
    KlippyShutdown,
    KlippyError,
    KlippyDisconnected,

    Ready,
    PrePrint,
    Printing,
    Paused,
    Error,

    Disconnected,
    Unknown,
    InternalError,
}

impl PrinterState {
    /// States in which the printer endpoint must not be written to and any
    /// cached job/file data is stale.
    pub fn is_offline(self) -> bool {
        matches!(self, Self::Disconnected | Self::InternalError)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::KlippyStartup => "klippy_startup",
            Self::KlippyShutdown => "klippy_shutdown",
            Self::KlippyError => "klippy_error",
            Self::KlippyDisconnected => "klippy_disconnected",
            Self::Ready => "ready",
            Self::PrePrint => "pre_print",
            Self::Printing => "printing",
            Self::Paused => "paused",
            Self::Error => "error",
            Self::Disconnected => "disconnected",
            Self::Unknown => "unknown",
            Self::InternalError => "internal_error",
        }
    }
}

impl fmt::Display for PrinterState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Authorization policy applied when the controller is unreachable; seeds the
/// initial `allow_unregistered_print` value of a monitor.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ControllerFailMode {
    #[default]
    AllowPrint,
    NoPrint,
}

impl ControllerFailMode {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::AllowPrint => "allow_print",
            Self::NoPrint => "no_print",
        }
    }
}

impl fmt::Display for ControllerFailMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
