//! Minimal OSC 1.0 codec
//!
//! Supports what control surfaces actually send: messages with `i`, `f`, `d`,
//! `h`, `s`, `T`, `F` and `N` arguments, and (nested) bundles with a timetag.
//! All numbers are big-endian, strings are NUL-terminated and padded to a
//! multiple of four bytes.
//!
//! The encoder exists for tests and tooling; the receiver only decodes.

use crate::error::ControlError;

const BUNDLE_TAG: &[u8] = b"#bundle\0";

/// Bundles nested deeper than this are rejected.
pub const MAX_BUNDLE_DEPTH: usize = 8;

/// NTP-style timetag. `1` means "immediately".
pub type OscTime = u64;

pub const IMMEDIATELY: OscTime = 1;

#[derive(Debug, Clone, PartialEq)]
pub enum OscArg {
    Int(i32),
    Float(f32),
    Double(f64),
    Long(i64),
    Str(String),
    Bool(bool),
    Nil,
}

impl OscArg {
    /// Numeric value of the argument, if it has one.
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            OscArg::Int(v) => Some(*v as f64),
            OscArg::Float(v) => Some(*v as f64),
            OscArg::Double(v) => Some(*v),
            OscArg::Long(v) => Some(*v as f64),
            OscArg::Bool(v) => Some(if *v { 1.0 } else { 0.0 }),
            OscArg::Str(_) | OscArg::Nil => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            OscArg::Str(s) => Some(s),
            _ => None,
        }
    }

    fn tag(&self) -> u8 {
        match self {
            OscArg::Int(_) => b'i',
            OscArg::Float(_) => b'f',
            OscArg::Double(_) => b'd',
            OscArg::Long(_) => b'h',
            OscArg::Str(_) => b's',
            OscArg::Bool(true) => b'T',
            OscArg::Bool(false) => b'F',
            OscArg::Nil => b'N',
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct OscMessage {
    pub address: String,
    pub args: Vec<OscArg>,
}

impl OscMessage {
    pub fn new(address: impl Into<String>, args: Vec<OscArg>) -> Self {
        Self {
            address: address.into(),
            args,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum OscPacket {
    Message(OscMessage),
    Bundle {
        timetag: OscTime,
        content: Vec<OscPacket>,
    },
}

impl OscPacket {
    /// Visit every message, outermost bundle first, with the timetag of the
    /// innermost enclosing bundle.
    pub fn for_each_message(&self, f: &mut impl FnMut(&OscMessage, Option<OscTime>)) {
        self.walk(None, f);
    }

    fn walk(&self, timetag: Option<OscTime>, f: &mut impl FnMut(&OscMessage, Option<OscTime>)) {
        match self {
            OscPacket::Message(msg) => f(msg, timetag),
            OscPacket::Bundle { timetag, content } => {
                for packet in content {
                    packet.walk(Some(*timetag), f);
                }
            }
        }
    }
}

struct Reader<'a> {
    buf: &'a [u8],
    pos: usize,
}

impl<'a> Reader<'a> {
    fn new(buf: &'a [u8]) -> Self {
        Self { buf, pos: 0 }
    }

    fn remaining(&self) -> usize {
        self.buf.len() - self.pos
    }

    fn take(&mut self, n: usize) -> Result<&'a [u8], ControlError> {
        if self.remaining() < n {
            return Err(ControlError::Malformed("truncated packet"));
        }
        let out = &self.buf[self.pos..self.pos + n];
        self.pos += n;
        Ok(out)
    }

    fn array<const N: usize>(&mut self) -> Result<[u8; N], ControlError> {
        let mut out = [0u8; N];
        out.copy_from_slice(self.take(N)?);
        Ok(out)
    }

    fn string(&mut self) -> Result<&'a str, ControlError> {
        let buf = self.buf;
        let len = buf[self.pos..]
            .iter()
            .position(|&b| b == 0)
            .ok_or(ControlError::Malformed("unterminated string"))?;
        let bytes = self.take(padded(len + 1))?;
        std::str::from_utf8(&bytes[..len]).map_err(|_| ControlError::Malformed("string is not UTF-8"))
    }
}

fn padded(len: usize) -> usize {
    (len + 3) & !3
}

/// Decode one datagram.
pub fn decode(buf: &[u8]) -> Result<OscPacket, ControlError> {
    decode_packet(buf, 0)
}

fn decode_packet(buf: &[u8], depth: usize) -> Result<OscPacket, ControlError> {
    if buf.is_empty() || buf.len() % 4 != 0 {
        return Err(ControlError::Malformed("size is not a multiple of 4"));
    }
    if buf.starts_with(BUNDLE_TAG) {
        return decode_bundle(buf, depth);
    }
    decode_message(buf).map(OscPacket::Message)
}

fn decode_bundle(buf: &[u8], depth: usize) -> Result<OscPacket, ControlError> {
    if depth >= MAX_BUNDLE_DEPTH {
        return Err(ControlError::Malformed("bundles nested too deep"));
    }
    let mut r = Reader::new(buf);
    r.take(BUNDLE_TAG.len())?;
    let timetag = u64::from_be_bytes(r.array()?);

    let mut content = Vec::new();
    while r.remaining() > 0 {
        let size = i32::from_be_bytes(r.array()?);
        if size <= 0 {
            return Err(ControlError::Malformed("non-positive bundle element size"));
        }
        let element = r.take(size as usize)?;
        content.push(decode_packet(element, depth + 1)?);
    }
    Ok(OscPacket::Bundle { timetag, content })
}

fn decode_message(buf: &[u8]) -> Result<OscMessage, ControlError> {
    let mut r = Reader::new(buf);
    let address = r.string()?;
    if !address.starts_with('/') {
        return Err(ControlError::Malformed("address must start with '/'"));
    }

    // Type tag string is optional in very old senders; treat absence as no args.
    if r.remaining() == 0 {
        return Ok(OscMessage::new(address, Vec::new()));
    }
    let tags = r.string()?;
    let tags = tags
        .strip_prefix(',')
        .ok_or(ControlError::Malformed("type tags must start with ','"))?;

    let mut args = Vec::with_capacity(tags.len());
    for tag in tags.bytes() {
        let arg = match tag {
            b'i' => OscArg::Int(i32::from_be_bytes(r.array()?)),
            b'f' => OscArg::Float(f32::from_be_bytes(r.array()?)),
            b'd' => OscArg::Double(f64::from_be_bytes(r.array()?)),
            b'h' => OscArg::Long(i64::from_be_bytes(r.array()?)),
            b's' => OscArg::Str(r.string()?.to_string()),
            b'T' => OscArg::Bool(true),
            b'F' => OscArg::Bool(false),
            b'N' => OscArg::Nil,
            _ => return Err(ControlError::Malformed("unsupported argument type")),
        };
        args.push(arg);
    }
    Ok(OscMessage::new(address, args))
}

fn write_string(out: &mut Vec<u8>, s: &str) {
    out.extend_from_slice(s.as_bytes());
    let pad = padded(s.len() + 1) - s.len();
    out.extend(std::iter::repeat(0u8).take(pad));
}

/// Encode a message into `out` (appends).
pub fn encode_message_into(msg: &OscMessage, out: &mut Vec<u8>) {
    write_string(out, &msg.address);
    let mut tags = String::with_capacity(msg.args.len() + 1);
    tags.push(',');
    tags.extend(msg.args.iter().map(|a| a.tag() as char));
    write_string(out, &tags);
    for arg in &msg.args {
        match arg {
            OscArg::Int(v) => out.extend_from_slice(&v.to_be_bytes()),
            OscArg::Float(v) => out.extend_from_slice(&v.to_be_bytes()),
            OscArg::Double(v) => out.extend_from_slice(&v.to_be_bytes()),
            OscArg::Long(v) => out.extend_from_slice(&v.to_be_bytes()),
            OscArg::Str(s) => write_string(out, s),
            OscArg::Bool(_) | OscArg::Nil => {}
        }
    }
}

pub fn encode(packet: &OscPacket) -> Vec<u8> {
    let mut out = Vec::with_capacity(64);
    encode_into(packet, &mut out);
    out
}

fn encode_into(packet: &OscPacket, out: &mut Vec<u8>) {
    match packet {
        OscPacket::Message(msg) => encode_message_into(msg, out),
        OscPacket::Bundle { timetag, content } => {
            out.extend_from_slice(BUNDLE_TAG);
            out.extend_from_slice(&timetag.to_be_bytes());
            for element in content {
                let mut body = Vec::new();
                encode_into(element, &mut body);
                out.extend_from_slice(&(body.len() as i32).to_be_bytes());
                out.extend_from_slice(&body);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn decodes_float_message_from_known_bytes() {
        // "/bpm\0\0\0\0" ",f\0\0" 128.0f32
        let bytes = [
            b'/', b'b', b'p', b'm', 0, 0, 0, 0, b',', b'f', 0, 0, 0x43, 0x00, 0x00, 0x00,
        ];
        let packet = decode(&bytes).unwrap();
        assert_eq!(
            packet,
            OscPacket::Message(OscMessage::new("/bpm", vec![OscArg::Float(128.0)]))
        );
    }

    #[test]
    fn string_padding_is_four_byte_aligned() {
        let msg = OscMessage::new("/action", vec![OscArg::Str("drop".into())]);
        let bytes = encode(&OscPacket::Message(msg.clone()));
        assert_eq!(bytes.len() % 4, 0);
        // "/action\0" is exactly 8 bytes, "drop" needs 4 bytes of padding
        assert_eq!(&bytes[..8], b"/action\0");
        assert_eq!(decode(&bytes).unwrap(), OscPacket::Message(msg));
    }

    #[test]
    fn bundle_carries_timetag_to_messages() {
        let packet = OscPacket::Bundle {
            timetag: 42,
            content: vec![
                OscPacket::Message(OscMessage::new("/bpm", vec![OscArg::Int(90)])),
                OscPacket::Message(OscMessage::new("/reset", vec![])),
            ],
        };
        let decoded = decode(&encode(&packet)).unwrap();
        let mut seen = Vec::new();
        decoded.for_each_message(&mut |m, t| seen.push((m.address.clone(), t)));
        assert_eq!(
            seen,
            vec![("/bpm".to_string(), Some(42)), ("/reset".to_string(), Some(42))]
        );
    }

    #[test]
    fn rejects_garbage() {
        assert!(decode(b"").is_err());
        assert!(decode(b"abc").is_err());
        assert!(decode(b"noslash\0").is_err());
        assert!(decode(b"/bpm\0\0\0\0,f\0\0\0\0").is_err());
        assert!(decode(b"/bpm\0\0\0\0,x\0\0").is_err());
    }

    #[test]
    fn blob_arguments_are_not_supported() {
        // ",b" then a 4-byte size and one padded byte of payload
        let packet = b"/bpm\0\0\0\0,b\0\0\0\0\0\x01\x2a\0\0\0";
        assert!(matches!(
            decode(packet),
            Err(ControlError::Malformed("unsupported argument type"))
        ));
    }

    #[test]
    fn rejects_deeply_nested_bundles() {
        let mut packet = OscPacket::Message(OscMessage::new("/stop", vec![]));
        for _ in 0..=MAX_BUNDLE_DEPTH {
            packet = OscPacket::Bundle {
                timetag: IMMEDIATELY,
                content: vec![packet],
            };
        }
        assert!(decode(&encode(&packet)).is_err());
    }

    #[test]
    fn message_without_type_tags_has_no_args() {
        let msg = decode(b"/stop\0\0\0").unwrap();
        assert_eq!(msg, OscPacket::Message(OscMessage::new("/stop", vec![])));
    }
}
