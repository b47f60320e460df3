//! Error types

use thiserror::Error;

/// Result type alias
pub type Result<T> = std::result::Result<T, Error>;

/// Main error type
#[derive(Debug, Error)]
pub enum Error {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Moonraker error {code}: {message}")]
    Api { code: i64, message: String },

    #[error("Printer command failed: {0}")]
    Command(String),

    #[error("Controller responded {status}")]
    Controller {
        status: reqwest::StatusCode,
        body: String,
    },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl Error {
    /// Whether this error means the endpoint is unreachable (timeout, refused
    /// connection, dead network) as opposed to reachable but misbehaving.
    pub fn is_disconnect(&self) -> bool {
        let Error::Http(err) = self else {
            return false;
        };

        if err.is_timeout() || err.is_connect() {
            return true;
        }

        // reqwest wraps socket-level failures several layers deep; walk the
        // source chain looking for the underlying IO error.
        let mut source = std::error::Error::source(err);
        while let Some(cause) = source {
            if let Some(io) = cause.downcast_ref::<std::io::Error>() {
                use std::io::ErrorKind;
                return matches!(
                    io.kind(),
                    ErrorKind::ConnectionRefused
                        | ErrorKind::ConnectionReset
                        | ErrorKind::ConnectionAborted
                        | ErrorKind::HostUnreachable
                        | ErrorKind::NetworkUnreachable
                        | ErrorKind::NetworkDown
                        | ErrorKind::TimedOut
                );
            }
            source = cause.source();
        }

        false
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn non_http_errors_are_not_disconnects() {
        assert!(!Error::Config("bad".into()).is_disconnect());
        assert!(!Error::Api {
            code: 400,
            message: "invalid".into()
        }
        .is_disconnect());
        assert!(!Error::Command("error".into()).is_disconnect());
    }

    #[test]
    fn io_error_passes_through() {
        let err = Error::from(std::io::Error::new(
            std::io::ErrorKind::ConnectionRefused,
            "refused",
        ));
        // Only printer HTTP failures count as disconnects.
        assert!(!err.is_disconnect());
    }
}
