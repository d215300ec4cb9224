//! Error types for the messaging side of the node.

use micronode_network::error::BringUpError;
use micronode_network::stack::StackError;
use thiserror::Error;

/// Failures of a [`crate::transport::Transport`].
#[derive(Debug, Error)]
pub enum TransportError {
    #[error("transport not open")]
    NotOpen,
    #[error("transport already open")]
    AlreadyOpen,
    #[error("timed out after {0} ms")]
    Timeout(u64),
    #[error("stack: {0}")]
    Stack(#[from] StackError),
    #[error("link: {0}")]
    Link(String),
}

/// Malformed or oversized frames.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum WireError {
    #[error("frame truncated")]
    Truncated,
    #[error("bad magic 0x{0:02x}")]
    BadMagic(u8),
    #[error("unknown frame kind 0x{0:02x}")]
    UnknownKind(u8),
    #[error("topic of {0} bytes exceeds limit")]
    TopicTooLong(usize),
    #[error("topic is not UTF-8")]
    TopicNotUtf8,
    #[error("frame of {0} bytes exceeds limit")]
    FrameTooLarge(usize),
    #[error("payload is {actual} bytes, expected {expected}")]
    PayloadSize { expected: usize, actual: usize },
}

/// A publish that did not reach the transport.
#[derive(Debug, Error)]
pub enum PublishError {
    #[error("encode: {0}")]
    Wire(#[from] WireError),
    #[error("transport: {0}")]
    Transport(#[from] TransportError),
    #[error("short write: {written} of {len} bytes")]
    ShortWrite { written: usize, len: usize },
}

/// Setup, spin and teardown failures of the messaging layer.
#[derive(Debug, Error)]
pub enum MessagingError {
    #[error("transport: {0}")]
    Transport(#[from] TransportError),
    #[error("wire: {0}")]
    Wire(#[from] WireError),
    #[error("messaging link closed")]
    LinkClosed,
    #[error("executor full ({capacity} handles)")]
    ExecutorFull { capacity: usize },
    #[error("timer period must be non-zero")]
    ZeroPeriod,
    #[error("invalid name '{0}'")]
    InvalidName(String),
}

/// Anything that stops the node task.
#[derive(Debug, Error)]
pub enum NodeError {
    #[error("network bring-up: {0}")]
    BringUp(#[from] BringUpError),
    #[error("messaging: {0}")]
    Messaging(#[from] MessagingError),
    #[error("driver: {0}")]
    Driver(#[from] std::io::Error),
}
