//! Datagram routing - turns OSC messages and JSON datagrams into control events
//!
//! Addresses understood:
//!
//! | Address | Arguments | Event |
//! |---------|-----------|-------|
//! | `/<param>` or `/param/<param>` | one number | parameter update |
//! | `/action` | one string | player action |
//! | `/action/<name>` | none | player action |
//! | `/reset` | none | board reset |
//! | `/stop` | none | stop the run |
//!
//! A datagram whose first byte is `{` is read as JSON instead:
//! `{"param": "bpm", "value": 128}`, `{"action": "hardDrop"}` or
//! `{"command": "reset"}`.
//!
//! Every parameter update is stamped with the wall-clock time its datagram
//! arrived; bundle timetags are kept alongside when present.

use std::time::SystemTime;

use serde::Deserialize;

use crate::error::ControlError;
use crate::osc::{self, OscMessage, OscTime};
use crate::types::{GameAction, ParamName};

/// A single decoded control request
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ControlEvent {
    Param {
        name: ParamName,
        value: f64,
        /// Timetag of the enclosing OSC bundle, if any
        timetag: Option<OscTime>,
        /// When the datagram carrying the update arrived
        received: SystemTime,
    },
    Action(GameAction),
    Reset,
    Stop,
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum JsonDatagram {
    Param { param: String, value: f64 },
    Action { action: String },
    Command { command: String },
}

/// Decode a datagram into events, appending to `out`.
///
/// A bundle is all-or-nothing: if any message inside it is rejected, none of
/// its events are kept. `received` stamps every parameter update.
pub fn decode_datagram(
    buf: &[u8],
    received: SystemTime,
    out: &mut Vec<ControlEvent>,
) -> Result<(), ControlError> {
    if buf.first() == Some(&b'{') {
        out.push(decode_json(buf, received)?);
        return Ok(());
    }

    let packet = osc::decode(buf)?;
    let start = out.len();
    let mut failure = None;
    packet.for_each_message(&mut |msg, timetag| {
        if failure.is_some() {
            return;
        }
        match route(msg, timetag, received) {
            Ok(event) => out.push(event),
            Err(e) => failure = Some(e),
        }
    });
    if let Some(e) = failure {
        out.truncate(start);
        return Err(e);
    }
    Ok(())
}

fn decode_json(buf: &[u8], received: SystemTime) -> Result<ControlEvent, ControlError> {
    match serde_json::from_slice::<JsonDatagram>(buf)? {
        JsonDatagram::Param { param, value } => param_event(&param, value, None, received),
        JsonDatagram::Action { action } => action_event(&action),
        JsonDatagram::Command { command } => match command.as_str() {
            "reset" => Ok(ControlEvent::Reset),
            "stop" => Ok(ControlEvent::Stop),
            _ => Err(ControlError::UnknownAddress(command)),
        },
    }
}

fn param_event(
    name: &str,
    value: f64,
    timetag: Option<OscTime>,
    received: SystemTime,
) -> Result<ControlEvent, ControlError> {
    let name = ParamName::from_str(name).ok_or_else(|| ControlError::UnknownParam(name.to_string()))?;
    if !value.is_finite() {
        return Err(ControlError::BadArgument {
            address: name.as_str().to_string(),
            reason: "value must be finite",
        });
    }
    Ok(ControlEvent::Param {
        name,
        value,
        timetag,
        received,
    })
}

fn action_event(name: &str) -> Result<ControlEvent, ControlError> {
    GameAction::from_str(name)
        .map(ControlEvent::Action)
        .ok_or_else(|| ControlError::UnknownAction(name.to_string()))
}

fn bad(msg: &OscMessage, reason: &'static str) -> ControlError {
    ControlError::BadArgument {
        address: msg.address.clone(),
        reason,
    }
}

/// Route one OSC message.
pub fn route(
    msg: &OscMessage,
    timetag: Option<OscTime>,
    received: SystemTime,
) -> Result<ControlEvent, ControlError> {
    let path = msg.address.trim_start_matches('/');
    let mut parts = path.split('/');
    let head = parts.next().unwrap_or_default();
    let tail = parts.next();
    if parts.next().is_some() {
        return Err(ControlError::UnknownAddress(msg.address.clone()));
    }

    match (head, tail) {
        ("reset", None) => Ok(ControlEvent::Reset),
        ("stop", None) => Ok(ControlEvent::Stop),
        ("action", None) => {
            let [arg] = msg.args.as_slice() else {
                return Err(bad(msg, "expected exactly one string argument"));
            };
            let name = arg.as_str().ok_or_else(|| bad(msg, "expected a string"))?;
            action_event(name)
        }
        ("action", Some(name)) => action_event(name),
        ("param", Some(name)) => param_from_args(msg, name, timetag, received),
        (name, None) => param_from_args(msg, name, timetag, received),
        _ => Err(ControlError::UnknownAddress(msg.address.clone())),
    }
}

fn param_from_args(
    msg: &OscMessage,
    name: &str,
    timetag: Option<OscTime>,
    received: SystemTime,
) -> Result<ControlEvent, ControlError> {
    if ParamName::from_str(name).is_none() {
        return Err(ControlError::UnknownParam(name.to_string()));
    }
    let [arg] = msg.args.as_slice() else {
        return Err(bad(msg, "expected exactly one numeric argument"));
    };
    let value = arg.as_f64().ok_or_else(|| bad(msg, "expected a number"))?;
    param_event(name, value, timetag, received)
}
