use anc350_telegram::Reason;

/// Errors that can occur in controller operations.
#[derive(Debug, thiserror::Error)]
pub enum ControllerError {
    /// Transport-level error (connect, socket options).
    #[error("transport error: {0}")]
    Transport(#[from] anc350_transport::TransportError),

    /// Telegram-level error (write failure, closed connection, bad reply).
    #[error("telegram error: {0}")]
    Telegram(#[from] anc350_telegram::TelegramError),

    /// No complete reply arrived within the read budget.
    #[error(
        "timed out waiting for reply to {address:#06x}[{index}] ({received} of {expected} bytes)"
    )]
    Timeout {
        address: i32,
        index: i32,
        expected: usize,
        received: usize,
    },

    /// Replies kept carrying another transaction's correlation number.
    #[error("correlation mismatch (sent {sent}, received {received})")]
    CorrelationMismatch { sent: i32, received: i32 },

    /// The controller answered with a non-OK reason.
    #[error("controller rejected {address:#06x}[{index}]: {reason}")]
    Reason {
        address: i32,
        index: i32,
        reason: Reason,
    },

    /// The ack carried no data word where a value was expected.
    #[error("ack for {address:#06x}[{index}] carried no data")]
    UnexpectedReply { address: i32, index: i32 },

    /// Axis number outside the configured axes.
    #[error("axis {axis} out of range (controller has {axes})")]
    InvalidAxis { axis: usize, axes: usize },

    /// Configuration rejected.
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    /// Configuration file I/O error.
    #[error("config I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON serialization/deserialization error.
    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),
}

impl ControllerError {
    /// Whether this failure says something about the link to the controller.
    ///
    /// Rejections by the controller and caller mistakes do not count towards
    /// the comms-error threshold.
    pub fn is_comm_failure(&self) -> bool {
        matches!(
            self,
            Self::Transport(_)
                | Self::Telegram(_)
                | Self::Timeout { .. }
                | Self::CorrelationMismatch { .. }
                | Self::UnexpectedReply { .. }
        )
    }
}

pub type Result<T> = std::result::Result<T, ControllerError>;
