//! Datagram framing between node and agent.
//!
//! ```text
//! +------+------+-----------+---------------+---------+
//! | 0xA5 | kind | topic_len | topic (utf-8) | payload |
//! +------+------+-----------+---------------+---------+
//!   u8     u8      u8         topic_len       rest
//! ```

use crate::error::WireError;

pub const MAGIC: u8 = 0xA5;
pub const KIND_DATA: u8 = 0x01;
pub const HEADER_SIZE: usize = 3;
pub const MAX_FRAME: usize = 512;
pub const MAX_TOPIC: usize = 64;

/// One data frame, borrowing its topic and payload.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Frame<'a> {
    pub topic: &'a str,
    pub payload: &'a [u8],
}

impl<'a> Frame<'a> {
    pub fn new(topic: &'a str, payload: &'a [u8]) -> Self {
        Self { topic, payload }
    }

    pub fn encoded_len(&self) -> usize {
        HEADER_SIZE + self.topic.len() + self.payload.len()
    }

    /// Replace `out` with the encoded frame.
    pub fn encode(&self, out: &mut Vec<u8>) -> Result<(), WireError> {
        if self.topic.len() > MAX_TOPIC {
            return Err(WireError::TopicTooLong(self.topic.len()));
        }
        let len = self.encoded_len();
        if len > MAX_FRAME {
            return Err(WireError::FrameTooLarge(len));
        }

        out.clear();
        out.reserve(len);
        out.push(MAGIC);
        out.push(KIND_DATA);
        out.push(self.topic.len() as u8);
        out.extend_from_slice(self.topic.as_bytes());
        out.extend_from_slice(self.payload);
        Ok(())
    }

    pub fn decode(bytes: &'a [u8]) -> Result<Self, WireError> {
        if bytes.len() > MAX_FRAME {
            return Err(WireError::FrameTooLarge(bytes.len()));
        }
        let [magic, kind, topic_len, rest @ ..] = bytes else {
            return Err(WireError::Truncated);
        };
        if *magic != MAGIC {
            return Err(WireError::BadMagic(*magic));
        }
        if *kind != KIND_DATA {
            return Err(WireError::UnknownKind(*kind));
        }
        let topic_len = *topic_len as usize;
        if topic_len > MAX_TOPIC {
            return Err(WireError::TopicTooLong(topic_len));
        }
        if rest.len() < topic_len {
            return Err(WireError::Truncated);
        }

        let (topic, payload) = rest.split_at(topic_len);
        let topic = core::str::from_utf8(topic).map_err(|_| WireError::TopicNotUtf8)?;
        Ok(Self { topic, payload })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_layout() {
        let mut out = Vec::new();
        Frame::new("/a", &[7, 0, 0, 0]).encode(&mut out).unwrap();
        assert_eq!(out, [0xA5, 0x01, 2, b'/', b'a', 7, 0, 0, 0]);

        let frame = Frame::decode(&out).unwrap();
        assert_eq!(frame.topic, "/a");
        assert_eq!(frame.payload, &[7, 0, 0, 0]);
    }

    #[test]
    fn test_rejects_malformed() {
        assert_eq!(Frame::decode(&[0xA5, 0x01]), Err(WireError::Truncated));
        assert_eq!(Frame::decode(&[0x00, 0x01, 0]), Err(WireError::BadMagic(0)));
        assert_eq!(Frame::decode(&[0xA5, 0x02, 0]), Err(WireError::UnknownKind(2)));
        assert_eq!(Frame::decode(&[0xA5, 0x01, 5, b'/']), Err(WireError::Truncated));
        assert_eq!(Frame::decode(&[0xA5, 0x01, 1, 0xff]), Err(WireError::TopicNotUtf8));
    }

    #[test]
    fn test_limits() {
        let long = "t".repeat(MAX_TOPIC + 1);
        let mut out = Vec::new();
        assert_eq!(
            Frame::new(&long, &[]).encode(&mut out),
            Err(WireError::TopicTooLong(MAX_TOPIC + 1))
        );

        let payload = [0u8; MAX_FRAME];
        assert!(matches!(
            Frame::new("/t", &payload).encode(&mut out),
            Err(WireError::FrameTooLarge(_))
        ));
    }

    #[test]
    fn test_empty_payload() {
        let mut out = Vec::new();
        Frame::new("/t", &[]).encode(&mut out).unwrap();
        assert_eq!(Frame::decode(&out).unwrap().payload, &[] as &[u8]);
    }
}
