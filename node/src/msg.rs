//! Message types carried in frame payloads.

use crate::error::WireError;

/// A fixed-layout message.
pub trait Message: Sized {
    /// Schema name, for logs.
    const TYPE_NAME: &'static str;

    /// Append the payload encoding to `out`.
    fn encode(&self, out: &mut Vec<u8>);

    fn decode(payload: &[u8]) -> Result<Self, WireError>;
}

/// `std_msgs/msg/Int32`.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct Int32 {
    pub data: i32,
}

impl Int32 {
    pub const fn new(data: i32) -> Self {
        Self { data }
    }
}

impl Message for Int32 {
    const TYPE_NAME: &'static str = "std_msgs/msg/Int32";

    fn encode(&self, out: &mut Vec<u8>) {
        out.extend_from_slice(&self.data.to_le_bytes());
    }

    fn decode(payload: &[u8]) -> Result<Self, WireError> {
        let bytes: [u8; 4] = payload
            .try_into()
            .map_err(|_| WireError::PayloadSize { expected: 4, actual: payload.len() })?;
        Ok(Self { data: i32::from_le_bytes(bytes) })
    }
}
