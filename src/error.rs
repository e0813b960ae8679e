use thiserror::Error;

/// Error taxonomy for the analyzer protocol core.
///
/// Low-level components (session, channel, block decoder) raise these on
/// every fault. Workflow-level operations (measurements, screenshot
/// retrieval) catch the recoverable ones and degrade to an "unavailable"
/// result or advance to the next fallback candidate; `NotConnected` always
/// escapes because it indicates caller misuse rather than an instrument
/// condition.
#[derive(Error, Debug)]
pub enum ScpiError {
    #[error("analyzer not connected")]
    NotConnected,
    #[error("response timeout")]
    Timeout,
    #[error("IO error: {context}: {source}")]
    Io {
        #[source]
        source: std::io::Error,
        context: String,
    },
    #[error("malformed IEEE block: {0}")]
    MalformedBlock(String),
    #[error("no data: {0}")]
    NoData(String),
    #[error(
        "no file retrieved from any candidate directory (last error: {})",
        .last_error.as_deref().unwrap_or("none recorded")
    )]
    NoFile { last_error: Option<String> },
    #[error("protocol error: {0}")]
    Protocol(String),
    #[error("invalid address: {0}")]
    InvalidAddress(String),
}

impl ScpiError {
    /// Wrap an IO error with context, collapsing socket-timeout kinds into
    /// [`ScpiError::Timeout`]. Read timeouts surface as `WouldBlock` on Unix
    /// and `TimedOut` on Windows.
    pub fn io(context: impl Into<String>, source: std::io::Error) -> Self {
        match source.kind() {
            std::io::ErrorKind::TimedOut | std::io::ErrorKind::WouldBlock => ScpiError::Timeout,
            _ => ScpiError::Io {
                source,
                context: context.into(),
            },
        }
    }
}
