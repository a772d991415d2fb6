use std::net::SocketAddr;

/// Errors raised while receiving or routing control messages.
///
/// Everything except [`ControlError::Runtime`] is non-fatal: the message is
/// dropped, logged, and the simulation carries on.
#[derive(Debug, thiserror::Error)]
pub enum ControlError {
    #[error("malformed OSC packet: {0}")]
    Malformed(&'static str),

    #[error("unroutable address {0:?}")]
    UnknownAddress(String),

    #[error("parameter {0:?} is not live-tunable")]
    UnknownParam(String),

    #[error("unknown action {0:?}")]
    UnknownAction(String),

    #[error("bad argument for {address}: {reason}")]
    BadArgument {
        address: String,
        reason: &'static str,
    },

    #[error("invalid JSON datagram: {0}")]
    Json(#[from] serde_json::Error),

    #[error("control queue full, message dropped")]
    QueueFull,

    #[error("invalid control address {0:?}")]
    Address(String),

    #[error("failed to bind {addr}: {source}")]
    Bind {
        addr: SocketAddr,
        #[source]
        source: std::io::Error,
    },

    #[error("control runtime: {0}")]
    Runtime(#[source] std::io::Error),
}
