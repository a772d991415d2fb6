//! Live control over UDP (OSC or JSON datagrams).
//!
//! Network receipt runs on its own tokio runtime and only ever writes into a
//! [`ControlChannel`]; the simulation drains that channel at tick boundaries.

pub mod channel;
pub mod error;
pub mod message;
pub mod osc;
pub mod runtime;
pub mod server;

pub use blockbeat_types as types;

pub use channel::{channel, Command, ControlBatch, ControlChannel, ControlSender, ControlStats, ParamUpdate};
pub use error::ControlError;
pub use message::{decode_datagram, ControlEvent};
pub use runtime::{AbortHook, ControlRuntime};
pub use server::OscConfig;
