//! Error type shared by the collectors, probes and the supervisor.

use thiserror::Error;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, Error)]
pub enum Error {
    /// The process table could not be read at all.
    #[error("failed to enumerate processes: {0}")]
    Enumerate(String),

    #[error("{host}: {reason}")]
    Resolve { host: String, reason: String },

    /// An external diagnostic tool (ping, traceroute, sftp) failed.
    #[error("{tool} failed: {reason}")]
    Probe { tool: &'static str, reason: String },

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("background task failed: {0}")]
    Join(#[from] tokio::task::JoinError),
}

impl Error {
    pub(crate) fn probe(tool: &'static str, reason: impl Into<String>) -> Self {
        Error::Probe {
            tool,
            reason: reason.into(),
        }
    }
}
