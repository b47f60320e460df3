//! Moonraker HTTP client
//!
//! One client per printer, owning its own connection pool and carrying the
//! printer's base URL. Every operation has a fixed deadline; the caller never
//! supplies one.

use std::time::Duration;

use reqwest::header::CONTENT_TYPE;

use printwarden_core::{Error, Result};

use crate::types::{
    CommandResponse, GCodeMetadata, GCodeMetadataResponse, Job, JobListParams, JobListResponse,
    KlippyInfo, KlippyInfoResponse, PrinterObjectsResponse,
};

const QUERY_TIMEOUT: Duration = Duration::from_secs(5);
const GCODE_TIMEOUT: Duration = Duration::from_secs(10);
const PAUSE_RESUME_TIMEOUT: Duration = Duration::from_secs(30);

/// HTTP client for a single Moonraker endpoint.
#[derive(Debug, Clone)]
pub struct MoonrakerClient {
    http: reqwest::Client,
    base_url: String,
}

impl MoonrakerClient {
    /// Create a client for the given printer base URL.
    pub fn new(base_url: &str) -> Result<Self> {
        let url: reqwest::Url = base_url
            .parse()
            .map_err(|e| Error::Config(format!("invalid printer url '{base_url}': {e}")))?;
        if url.cannot_be_a_base() {
            return Err(Error::Config(format!(
                "invalid printer url '{base_url}': not an http(s) base"
            )));
        }

        Ok(Self {
            http: reqwest::Client::new(),
            base_url: base_url.trim_end_matches('/').to_string(),
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    /// Query the object set the monitor reconciles against. The response may
    /// carry a `null` status plus an error payload; the caller decides what
    /// that means.
    pub async fn printer_objects(&self) -> Result<PrinterObjectsResponse> {
        let response = self
            .http
            .get(self.url("/printer/objects/query"))
            .query(&[
                ("webhooks", ""),
                ("print_stats", ""),
                ("idle_timeout", ""),
                ("display_status", ""),
                ("toolhead", ""),
                ("virtual_sdcard", ""),
            ])
            .timeout(QUERY_TIMEOUT)
            .send()
            .await?
            .json()
            .await?;

        Ok(response)
    }

    /// Klippy host information (`/printer/info`).
    pub async fn klippy_info(&self) -> Result<KlippyInfo> {
        let response: KlippyInfoResponse = self
            .http
            .get(self.url("/printer/info"))
            .timeout(QUERY_TIMEOUT)
            .send()
            .await?
            .json()
            .await?;

        Ok(response.result)
    }

    /// Pause the running print.
    pub async fn pause_print(&self) -> Result<()> {
        self.command("/printer/print/pause", PAUSE_RESUME_TIMEOUT)
            .await
    }

    /// Resume a paused print.
    pub async fn resume_print(&self) -> Result<()> {
        self.command("/printer/print/resume", PAUSE_RESUME_TIMEOUT)
            .await
    }

    async fn command(&self, path: &str, timeout: Duration) -> Result<()> {
        let response: CommandResponse = self
            .http
            .post(self.url(path))
            .header(CONTENT_TYPE, "application/json")
            .timeout(timeout)
            .send()
            .await?
            .json()
            .await?;

        if response.result != "ok" {
            return Err(Error::Command(response.result));
        }

        Ok(())
    }

    /// Run a GCode script.
    pub async fn run_gcode(&self, script: &str) -> Result<()> {
        let response: CommandResponse = self
            .http
            .get(self.url("/printer/gcode/script"))
            .query(&[("script", script)])
            .timeout(GCODE_TIMEOUT)
            .send()
            .await?
            .json()
            .await?;

        if response.result != "ok" {
            return Err(Error::Command(response.result));
        }

        Ok(())
    }

    /// Write `msg` to the printer display (M117).
    pub async fn set_status_message(&self, msg: &str) -> Result<()> {
        self.run_gcode(&format!("M117 {msg}")).await
    }

    /// Job history entries.
    pub async fn job_list(&self, params: &JobListParams) -> Result<Vec<Job>> {
        let response: JobListResponse = self
            .http
            .get(self.url("/server/history/list"))
            .query(&params.to_query())
            .timeout(QUERY_TIMEOUT)
            .send()
            .await?
            .json()
            .await?;

        if let Some(error) = response.error {
            return Err(Error::Api {
                code: error.code,
                message: error.message,
            });
        }

        Ok(response.result.map(|list| list.jobs).unwrap_or_default())
    }

    /// Most recent job history entry, if any.
    pub async fn latest_job(&self) -> Result<Option<Job>> {
        let jobs = self.job_list(&JobListParams::latest()).await?;
        Ok(jobs.into_iter().next())
    }

    /// Metadata for a GCode file known to the printer.
    pub async fn gcode_metadata(&self, filename: &str) -> Result<Option<GCodeMetadata>> {
        let response: GCodeMetadataResponse = self
            .http
            .get(self.url("/server/files/metadata"))
            .query(&[("filename", filename)])
            .timeout(QUERY_TIMEOUT)
            .send()
            .await?
            .json()
            .await?;

        if let Some(error) = response.error {
            return Err(Error::Api {
                code: error.code,
                message: error.message,
            });
        }

        Ok(response.result)
    }

    /// Fetch a file from the printer's gcodes root (thumbnails live there).
    /// Returns the content type as reported by the printer and the raw bytes.
    pub async fn gcode_file(&self, relative_path: &str) -> Result<(Option<String>, bytes::Bytes)> {
        let response = self
            .http
            .get(self.url(&format!("/server/files/gcodes/{relative_path}")))
            .timeout(GCODE_TIMEOUT)
            .send()
            .await?
            .error_for_status()?;

        let content_type = response
            .headers()
            .get(CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .map(|v| v.to_string());

        Ok((content_type, response.bytes().await?))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rejects_bad_urls() {
        assert!(MoonrakerClient::new("not a url").is_err());
        assert!(MoonrakerClient::new("mailto:foo@bar").is_err());
    }

    #[test]
    fn trims_trailing_slash() {
        let client = MoonrakerClient::new("http://printer.local:7125/").unwrap();
        assert_eq!(client.base_url(), "http://printer.local:7125");
        assert_eq!(
            client.url("/printer/info"),
            "http://printer.local:7125/printer/info"
        );
    }
}
