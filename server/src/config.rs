//! Configuration management

use std::collections::HashSet;
use std::time::Duration;

use serde::Deserialize;

use printwarden_core::{ControllerFailMode, Error, Result};
use printwarden_moonraker::{MessageTemplate, MonitorConfig};

/// Raw YAML document, validated into [`Config`].
#[derive(Debug, Deserialize)]
struct RawConfig {
    #[serde(default)]
    server: RawServer,
    no_pause_duration: String,
    display_messages: RawDisplayMessages,
    controller: Option<RawController>,
    #[serde(default)]
    printers: Vec<RawPrinter>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct RawServer {
    bind: Option<String>,
    port: Option<u16>,
}

#[derive(Debug, Deserialize)]
struct RawDisplayMessages {
    will_pause_message: String,
    pause_message: String,
}

#[derive(Debug, Deserialize)]
struct RawController {
    url: String,
    #[serde(default)]
    hub_id: String,
    #[serde(default)]
    fail_mode: String,
}

#[derive(Debug, Deserialize)]
struct RawPrinter {
    key: String,
    name: String,
    url: String,
    #[serde(default)]
    controller_fail_mode: String,
}

/// Listen address for the facade.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub bind: String,
    pub port: u16,
}

impl ServerConfig {
    pub fn addr(&self) -> String {
        format!("{}:{}", self.bind, self.port)
    }
}

#[derive(Debug, Clone)]
pub struct DisplayMessages {
    pub will_pause_message: MessageTemplate,
    pub pause_message: MessageTemplate,
}

#[derive(Debug, Clone)]
pub struct ControllerConfig {
    pub url: String,
    pub hub_id: String,
    pub fail_mode: ControllerFailMode,
}

#[derive(Debug, Clone)]
pub struct PrinterEntry {
    pub key: String,
    pub name: String,
    pub url: String,
    pub controller_fail_mode: ControllerFailMode,
}

/// Validated application configuration.
#[derive(Debug, Clone)]
pub struct Config {
    pub server: ServerConfig,
    pub no_pause_duration: Duration,
    pub display_messages: DisplayMessages,
    pub controller: Option<ControllerConfig>,
    pub printers: Vec<PrinterEntry>,
}

impl Config {
    /// Load and validate the configuration file.
    pub fn load(path: &str) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| Error::Config(format!("failed to read {path}: {e}")))?;
        Self::parse(&content)
    }

    fn parse(content: &str) -> Result<Self> {
        let raw: RawConfig = serde_yaml::from_str(content)
            .map_err(|e| Error::Config(format!("failed to parse config: {e}")))?;

        let no_pause_duration = humantime::parse_duration(&raw.no_pause_duration)
            .map_err(|e| Error::Config(format!("invalid no_pause_duration: {e}")))?;

        let controller = match raw.controller {
            Some(ctrl) if !ctrl.url.is_empty() => {
                if ctrl.hub_id.is_empty() {
                    return Err(Error::Config("controller hub_id is required".to_string()));
                }
                Some(ControllerConfig {
                    url: ctrl.url,
                    hub_id: ctrl.hub_id,
                    fail_mode: parse_fail_mode(&ctrl.fail_mode)?,
                })
            }
            _ => None,
        };

        let mut seen = HashSet::new();
        let mut printers = Vec::with_capacity(raw.printers.len());
        for printer in raw.printers {
            if !seen.insert(printer.key.clone()) {
                return Err(Error::Config(format!(
                    "duplicated printer '{}'",
                    printer.key
                )));
            }
            printers.push(PrinterEntry {
                controller_fail_mode: parse_fail_mode(&printer.controller_fail_mode)?,
                key: printer.key,
                name: printer.name,
                url: printer.url,
            });
        }

        Ok(Self {
            server: ServerConfig {
                bind: raw.server.bind.unwrap_or_else(|| "0.0.0.0".to_string()),
                port: raw.server.port.unwrap_or(8080),
            },
            no_pause_duration,
            display_messages: DisplayMessages {
                will_pause_message: MessageTemplate::new(raw.display_messages.will_pause_message),
                pause_message: MessageTemplate::new(raw.display_messages.pause_message),
            },
            controller,
            printers,
        })
    }

    /// The policy configuration every monitor is built with.
    pub fn monitor_config(&self) -> MonitorConfig {
        MonitorConfig {
            no_pause_duration: self.no_pause_duration,
            will_pause_message: self.display_messages.will_pause_message.clone(),
            pause_message: self.display_messages.pause_message.clone(),
        }
    }
}

/// An absent or empty value means `allow_print`.
fn parse_fail_mode(value: &str) -> Result<ControllerFailMode> {
    match value {
        "" | "allow_print" => Ok(ControllerFailMode::AllowPrint),
        "no_print" => Ok(ControllerFailMode::NoPrint),
        other => Err(Error::Config(format!("unknown fail mode '{other}'"))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const FULL: &str = r#"
server:
  bind: 127.0.0.1
  port: 9000
no_pause_duration: 30s
display_messages:
  will_pause_message: "Register now, pausing in {{.RemainDurationStr}}"
  pause_message: "Paused: print not registered"
controller:
  url: https://controller.example
  hub_id: hub-7
  fail_mode: no_print
printers:
  - key: v400-1
    name: Voron 1
    url: http://10.0.0.11:7125
  - key: v400-2
    name: Voron 2
    url: http://10.0.0.12:7125
    controller_fail_mode: no_print
"#;

    #[test]
    fn parses_full_document() {
        let config = Config::parse(FULL).unwrap();

        assert_eq!(config.server.addr(), "127.0.0.1:9000");
        assert_eq!(config.no_pause_duration, Duration::from_secs(30));

        let controller = config.controller.unwrap();
        assert_eq!(controller.hub_id, "hub-7");
        assert_eq!(controller.fail_mode, ControllerFailMode::NoPrint);

        assert_eq!(config.printers.len(), 2);
        assert_eq!(config.printers[0].key, "v400-1");
        assert_eq!(
            config.printers[0].controller_fail_mode,
            ControllerFailMode::AllowPrint
        );
        assert_eq!(
            config.printers[1].controller_fail_mode,
            ControllerFailMode::NoPrint
        );

        let countdown = config
            .display_messages
            .will_pause_message
            .render_remaining("10s");
        assert_eq!(countdown, "Register now, pausing in 10s");
    }

    #[test]
    fn server_defaults_apply() {
        let config = Config::parse(
            r#"
no_pause_duration: 2m
display_messages:
  will_pause_message: "w"
  pause_message: "p"
printers: []
"#,
        )
        .unwrap();

        assert_eq!(config.server.addr(), "0.0.0.0:8080");
        assert_eq!(config.no_pause_duration, Duration::from_secs(120));
        assert!(config.controller.is_none());
        assert!(config.printers.is_empty());
    }

    #[test]
    fn rejects_duplicate_printer_keys() {
        let err = Config::parse(
            r#"
no_pause_duration: 30s
display_messages:
  will_pause_message: "w"
  pause_message: "p"
printers:
  - {key: a, name: A, url: "http://x:7125"}
  - {key: a, name: B, url: "http://y:7125"}
"#,
        )
        .unwrap_err();

        assert!(err.to_string().contains("duplicated printer 'a'"));
    }

    #[test]
    fn rejects_unknown_fail_mode() {
        let err = Config::parse(
            r#"
no_pause_duration: 30s
display_messages:
  will_pause_message: "w"
  pause_message: "p"
printers:
  - {key: a, name: A, url: "http://x:7125", controller_fail_mode: maybe}
"#,
        )
        .unwrap_err();

        assert!(err.to_string().contains("unknown fail mode 'maybe'"));
    }

    #[test]
    fn controller_requires_hub_id() {
        let err = Config::parse(
            r#"
no_pause_duration: 30s
display_messages:
  will_pause_message: "w"
  pause_message: "p"
controller:
  url: https://controller.example
printers: []
"#,
        )
        .unwrap_err();

        assert!(err.to_string().contains("hub_id is required"));
    }

    #[test]
    fn rejects_bad_duration() {
        let err = Config::parse(
            r#"
no_pause_duration: soon
display_messages:
  will_pause_message: "w"
  pause_message: "p"
printers: []
"#,
        )
        .unwrap_err();

        assert!(err.to_string().contains("invalid no_pause_duration"));
    }
}
