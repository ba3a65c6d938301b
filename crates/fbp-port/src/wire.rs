//! Wire framing for port messages: the `port_data` discriminator byte plus
//! each message type's byte layout, per the protocol's message table.

use std::sync::Arc;

use fbp_value::{Value, ValueData, ValueFlags};
use thiserror::Error;

pub const MAX_TOPIC_WIRE_LEN: usize = 31;

#[derive(Debug, Error, PartialEq, Eq, Clone)]
pub enum WireError {
    #[error("message truncated: expected at least {expected} bytes, got {got}")]
    Truncated { expected: usize, got: usize },
    #[error("unknown port message type {0}")]
    BadMessageType(u8),
    #[error("unknown value type tag {0}")]
    BadValueType(u8),
    #[error("string payload is not null-terminated within its declared length")]
    StringNotNullTerminated,
    #[error("topic {len} bytes exceeds the wire limit of {MAX_TOPIC_WIRE_LEN}")]
    TopicTooLong { len: usize },
}

type Result<T> = std::result::Result<T, WireError>;

/// The low 5 bits of `port_data`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MessageType {
    Negotiate = 0,
    TopicList = 1,
    TopicAdd = 2,
    TopicRemove = 3,
    Publish = 4,
    Connected = 5,
}

impl MessageType {
    fn from_bits(bits: u8) -> Result<MessageType> {
        match bits {
            0 => Ok(MessageType::Negotiate),
            1 => Ok(MessageType::TopicList),
            2 => Ok(MessageType::TopicAdd),
            3 => Ok(MessageType::TopicRemove),
            4 => Ok(MessageType::Publish),
            5 => Ok(MessageType::Connected),
            other => Err(WireError::BadMessageType(other)),
        }
    }
}

const RETAIN_BIT: u8 = 1 << 7;
const TYPE_MASK: u8 = 0x1F;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Resolution {
    Server = 0,
    Client = 1,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Negotiate {
    pub version: u32,
    pub status: u8,
    pub resolution: Resolution,
    /// `0` = request (upstream -> downstream), `1` = response.
    pub msg_type: u8,
    pub client_conn_count: u64,
    pub server_conn_count: u64,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Connected {
    pub status: u8,
    /// `0` = request, `1` = response.
    pub phase: u8,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Message {
    Negotiate(Negotiate),
    TopicList(Vec<String>),
    TopicAdd(String),
    TopicRemove(String),
    Publish { topic: String, value: Value },
    Connected(Connected),
}

impl Message {
    #[must_use]
    pub fn kind(&self) -> MessageType {
        match self {
            Message::Negotiate(_) => MessageType::Negotiate,
            Message::TopicList(_) => MessageType::TopicList,
            Message::TopicAdd(_) => MessageType::TopicAdd,
            Message::TopicRemove(_) => MessageType::TopicRemove,
            Message::Publish { .. } => MessageType::Publish,
            Message::Connected(_) => MessageType::Connected,
        }
    }
}

/// Encode `msg` into a `(port_data, bytes)` pair ready to hand to the
/// transport.
pub fn encode(msg: &Message) -> (u8, Vec<u8>) {
    let retain = matches!(msg, Message::Publish { value, .. } if value.flags.retain());
    let mut port_data = msg.kind() as u8 & TYPE_MASK;
    if retain {
        port_data |= RETAIN_BIT;
    }
    let bytes = match msg {
        Message::Negotiate(n) => encode_negotiate(n),
        Message::TopicList(prefixes) => encode_null_terminated(&fbp_pubsub::encode_topic_list(prefixes)),
        Message::TopicAdd(topic) | Message::TopicRemove(topic) => encode_null_terminated(topic),
        Message::Publish { topic, value } => encode_publish(topic, value),
        Message::Connected(c) => vec![c.status, c.phase],
    };
    (port_data, bytes)
}

/// Decode a `(port_data, bytes)` pair received from the transport.
pub fn decode(port_data: u8, bytes: &[u8]) -> Result<Message> {
    let retain = port_data & RETAIN_BIT != 0;
    let kind = MessageType::from_bits(port_data & TYPE_MASK)?;
    match kind {
        MessageType::Negotiate => Ok(Message::Negotiate(decode_negotiate(bytes)?)),
        MessageType::TopicList => {
            let s = decode_null_terminated(bytes)?;
            Ok(Message::TopicList(fbp_pubsub::decode_topic_list(&s)))
        }
        MessageType::TopicAdd => Ok(Message::TopicAdd(decode_null_terminated(bytes)?)),
        MessageType::TopicRemove => Ok(Message::TopicRemove(decode_null_terminated(bytes)?)),
        MessageType::Publish => decode_publish(bytes, retain),
        MessageType::Connected => {
            if bytes.len() < 2 {
                return Err(WireError::Truncated {
                    expected: 2,
                    got: bytes.len(),
                });
            }
            Ok(Message::Connected(Connected {
                status: bytes[0],
                phase: bytes[1],
            }))
        }
    }
}

fn encode_negotiate(n: &Negotiate) -> Vec<u8> {
    let mut out = Vec::with_capacity(24);
    out.extend_from_slice(&n.version.to_le_bytes());
    out.push(n.status);
    out.push(n.resolution as u8);
    out.push(n.msg_type);
    out.push(0); // _rsv
    out.extend_from_slice(&n.client_conn_count.to_le_bytes());
    out.extend_from_slice(&n.server_conn_count.to_le_bytes());
    out
}

fn decode_negotiate(bytes: &[u8]) -> Result<Negotiate> {
    if bytes.len() < 24 {
        return Err(WireError::Truncated {
            expected: 24,
            got: bytes.len(),
        });
    }
    let version = u32::from_le_bytes(bytes[0..4].try_into().unwrap());
    let status = bytes[4];
    let resolution = match bytes[5] {
        0 => Resolution::Server,
        _ => Resolution::Client,
    };
    let msg_type = bytes[6];
    let client_conn_count = u64::from_le_bytes(bytes[8..16].try_into().unwrap());
    let server_conn_count = u64::from_le_bytes(bytes[16..24].try_into().unwrap());
    Ok(Negotiate {
        version,
        status,
        resolution,
        msg_type,
        client_conn_count,
        server_conn_count,
    })
}

fn encode_null_terminated(s: &str) -> Vec<u8> {
    let mut out = Vec::with_capacity(s.len() + 1);
    out.extend_from_slice(s.as_bytes());
    out.push(0);
    out
}

fn decode_null_terminated(bytes: &[u8]) -> Result<String> {
    let end = bytes
        .iter()
        .position(|&b| b == 0)
        .ok_or(WireError::StringNotNullTerminated)?;
    Ok(String::from_utf8_lossy(&bytes[..end]).into_owned())
}

fn value_type_tag(data: &ValueData) -> u8 {
    match data {
        ValueData::Null => 0,
        ValueData::Str(_) => 1,
        ValueData::Json(_) => 2,
        ValueData::Bin(_) => 3,
        ValueData::F32(_) => 4,
        ValueData::F64(_) => 5,
        ValueData::U8(_) => 6,
        ValueData::U16(_) => 7,
        ValueData::U32(_) => 8,
        ValueData::U64(_) => 9,
        ValueData::I8(_) => 10,
        ValueData::I16(_) => 11,
        ValueData::I32(_) => 12,
        ValueData::I64(_) => 13,
    }
}

fn encode_publish(topic: &str, value: &Value) -> Vec<u8> {
    let mut payload = Vec::new();
    match &value.data {
        ValueData::Null => {}
        ValueData::Str(s) | ValueData::Json(s) => payload.extend_from_slice(s.as_bytes()),
        ValueData::Bin(b) => payload.extend_from_slice(b),
        ValueData::F32(v) => payload.extend_from_slice(&v.to_le_bytes()),
        ValueData::F64(v) => payload.extend_from_slice(&v.to_le_bytes()),
        ValueData::U8(v) => payload.push(*v),
        ValueData::U16(v) => payload.extend_from_slice(&v.to_le_bytes()),
        ValueData::U32(v) => payload.extend_from_slice(&v.to_le_bytes()),
        ValueData::U64(v) => payload.extend_from_slice(&v.to_le_bytes()),
        ValueData::I8(v) => payload.push(v.to_le_bytes()[0]),
        ValueData::I16(v) => payload.extend_from_slice(&v.to_le_bytes()),
        ValueData::I32(v) => payload.extend_from_slice(&v.to_le_bytes()),
        ValueData::I64(v) => payload.extend_from_slice(&v.to_le_bytes()),
    }
    let topic_bytes = topic.as_bytes();
    let mut out = Vec::with_capacity(4 + topic_bytes.len() + payload.len());
    out.push(value_type_tag(&value.data));
    out.push(0); // _rsv
    out.push(u8::try_from(topic_bytes.len()).unwrap_or(u8::MAX));
    out.extend_from_slice(topic_bytes);
    out.push(0); // null terminator for topic
    out.push(u8::try_from(payload.len()).unwrap_or(u8::MAX));
    out.extend_from_slice(&payload);
    out
}

fn decode_publish(bytes: &[u8], retain: bool) -> Result<Message> {
    if bytes.len() < 3 {
        return Err(WireError::Truncated {
            expected: 3,
            got: bytes.len(),
        });
    }
    let type_tag = bytes[0];
    let topic_len = bytes[2] as usize;
    if topic_len > MAX_TOPIC_WIRE_LEN {
        return Err(WireError::TopicTooLong { len: topic_len });
    }
    let topic_start = 3;
    let topic_end = topic_start + topic_len;
    if bytes.len() < topic_end + 2 {
        return Err(WireError::Truncated {
            expected: topic_end + 2,
            got: bytes.len(),
        });
    }
    if bytes[topic_end] != 0 {
        return Err(WireError::StringNotNullTerminated);
    }
    let topic = String::from_utf8_lossy(&bytes[topic_start..topic_end]).into_owned();
    let payload_len_pos = topic_end + 1;
    let payload_len = bytes[payload_len_pos] as usize;
    let payload_start = payload_len_pos + 1;
    let payload_end = payload_start + payload_len;
    if bytes.len() < payload_end {
        return Err(WireError::Truncated {
            expected: payload_end,
            got: bytes.len(),
        });
    }
    let payload = &bytes[payload_start..payload_end];
    let flags = if retain {
        ValueFlags::RETAIN | ValueFlags::CONST
    } else {
        ValueFlags::CONST
    };
    let data = decode_value_payload(type_tag, payload)?;
    Ok(Message::Publish {
        topic,
        value: Value::new(data, flags),
    })
}

fn decode_value_payload(type_tag: u8, payload: &[u8]) -> Result<ValueData> {
    fn need(payload: &[u8], n: usize) -> Result<&[u8]> {
        if payload.len() < n {
            Err(WireError::Truncated {
                expected: n,
                got: payload.len(),
            })
        } else {
            Ok(payload)
        }
    }
    Ok(match type_tag {
        0 => ValueData::Null,
        1 => ValueData::Str(Arc::from(String::from_utf8_lossy(payload).into_owned())),
        2 => ValueData::Json(Arc::from(String::from_utf8_lossy(payload).into_owned())),
        3 => ValueData::Bin(Arc::from(payload.to_vec())),
        4 => ValueData::F32(f32::from_le_bytes(need(payload, 4)?[0..4].try_into().unwrap())),
        5 => ValueData::F64(f64::from_le_bytes(need(payload, 8)?[0..8].try_into().unwrap())),
        6 => ValueData::U8(need(payload, 1)?[0]),
        7 => ValueData::U16(u16::from_le_bytes(need(payload, 2)?[0..2].try_into().unwrap())),
        8 => ValueData::U32(u32::from_le_bytes(need(payload, 4)?[0..4].try_into().unwrap())),
        9 => ValueData::U64(u64::from_le_bytes(need(payload, 8)?[0..8].try_into().unwrap())),
        10 => ValueData::I8(need(payload, 1)?[0] as i8),
        11 => ValueData::I16(i16::from_le_bytes(need(payload, 2)?[0..2].try_into().unwrap())),
        12 => ValueData::I32(i32::from_le_bytes(need(payload, 4)?[0..4].try_into().unwrap())),
        13 => ValueData::I64(i64::from_le_bytes(need(payload, 8)?[0..8].try_into().unwrap())),
        other => return Err(WireError::BadValueType(other)),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn round_trip(msg: Message) {
        let (port_data, bytes) = encode(&msg);
        let decoded = decode(port_data, &bytes).unwrap();
        assert_eq!(decoded, msg);
    }

    #[test]
    fn negotiate_round_trips() {
        round_trip(Message::Negotiate(Negotiate {
            version: 1,
            status: 0,
            resolution: Resolution::Client,
            msg_type: 1,
            client_conn_count: 3,
            server_conn_count: 1,
        }));
    }

    #[test]
    fn topic_list_round_trips() {
        round_trip(Message::TopicList(vec!["h/".into(), "c/".into()]));
    }

    #[test]
    fn topic_add_remove_round_trip() {
        round_trip(Message::TopicAdd("c/".into()));
        round_trip(Message::TopicRemove("c/".into()));
    }

    #[test]
    fn connected_round_trips() {
        round_trip(Message::Connected(Connected {
            status: 0,
            phase: 1,
        }));
    }

    #[test]
    fn publish_round_trips_with_retain_bit_carried_in_port_data() {
        let value = Value::u32(42, ValueFlags::RETAIN | ValueFlags::CONST);
        let (port_data, bytes) = encode(&Message::Publish {
            topic: "h/en".into(),
            value: value.clone(),
        });
        assert_eq!(port_data & RETAIN_BIT, RETAIN_BIT);
        let Message::Publish { topic, value: decoded } = decode(port_data, &bytes).unwrap() else {
            panic!("expected publish");
        };
        assert_eq!(topic, "h/en");
        assert!(decoded.flags.retain());
        assert!(matches!(decoded.data, ValueData::U32(42)));
    }

    #[test]
    fn publish_str_payload_round_trips() {
        let value = Value::str_const("hello", ValueFlags::NONE);
        let (port_data, bytes) = encode(&Message::Publish {
            topic: "h/name".into(),
            value,
        });
        let Message::Publish { value: decoded, .. } = decode(port_data, &bytes).unwrap() else {
            panic!("expected publish");
        };
        let ValueData::Str(s) = decoded.data else {
            panic!("expected Str");
        };
        assert_eq!(s.as_ref(), "hello");
    }

    #[test]
    fn oversized_topic_is_rejected_on_decode() {
        let long_topic = "a".repeat(MAX_TOPIC_WIRE_LEN + 1);
        let bytes = encode_publish(&long_topic, &Value::null());
        let err = decode_publish(&bytes, false).unwrap_err();
        assert!(matches!(err, WireError::TopicTooLong { .. }));
    }
}
