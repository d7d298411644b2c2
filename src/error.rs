//! Error types for querying and reconfiguring outputs.

/// A directive that is malformed or cannot be resolved against the mirror.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ValidationError {
    /// No head carries the requested name.
    #[error("unknown output {0}")]
    UnknownOutput(String),

    /// A per-output directive appeared before any `--output`.
    #[error("no --output specified before --{0}")]
    NoOutputSelected(String),

    /// Mode or custom-mode text does not follow `<W>x<H>[@<R>Hz]`.
    #[error("invalid mode: {reason}: {value}")]
    InvalidMode { reason: &'static str, value: String },

    /// The mode spec parsed but no announced mode matches it.
    #[error("unknown mode: {0}")]
    UnknownMode(String),

    /// `--preferred` on a head without a preferred mode.
    #[error("no preferred mode found")]
    NoPreferredMode,

    #[error("invalid position: {0}")]
    InvalidPosition(String),

    #[error("invalid transform: {0}")]
    InvalidTransform(String),

    #[error("invalid scale: {0}")]
    InvalidScale(String),

    /// The negotiated protocol version cannot carry adaptive sync.
    #[error("setting adaptive sync not supported by the compositor")]
    AdaptiveSyncUnsupported,

    #[error("invalid adaptive sync state: {0}")]
    InvalidAdaptiveSync(String),
}

/// Errors that can occur while talking to the output manager
#[derive(Debug, thiserror::Error)]
pub enum WlRandrError {
    /// Failed to establish the Wayland connection.
    #[error("failed to connect to display: {0}")]
    Connection(String),

    /// The event queue failed while waiting for the compositor.
    #[error("wayland dispatch failed: {0}")]
    Dispatch(String),

    /// The compositor does not expose the output management global.
    #[error("compositor doesn't support wlr-output-management-unstable-v1")]
    UnsupportedProtocol,

    /// No synchronization marker has been received yet.
    #[error("output state has not been synchronized")]
    NotSynchronized,

    #[error(transparent)]
    Validation(#[from] ValidationError),

    /// The compositor rejected the configuration.
    #[error("failed to apply configuration")]
    TransactionFailed,

    /// The configuration was built against an outdated serial.
    #[error("configuration cancelled, please try again")]
    TransactionCancelled,

    /// An operation was issued against a transaction in the wrong state.
    #[error("transaction is {0}, cannot {1}")]
    InvalidTransactionState(&'static str, &'static str),

    #[error("failed to encode report: {0}")]
    Report(#[from] serde_json::Error),
}
