//! Error types for the link interceptor.

use thiserror::Error;

/// Failures of the persistent channel to the background collaborator.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TransportError {
    /// The channel is gone; the session must tear down.
    #[error("disconnected from background page")]
    Disconnected,

    /// A message could not be posted.
    #[error("failed to post message: {0}")]
    Send(String),
}

/// Errors that stop a frame session from starting.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SessionError {
    /// The shared startup step failed before any connection was attempted.
    #[error("extension failed to start up: {0}")]
    StartupFailed(String),

    /// The background channel could not be opened.
    #[error("failed to connect to background page: {0}")]
    ConnectFailed(String),
}
