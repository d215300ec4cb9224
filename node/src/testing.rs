//! Test doubles for the messaging side.

use std::collections::VecDeque;
use std::sync::{Arc, Mutex, MutexGuard};

use micronode_network::testing::ManualClock;

use crate::board::{OutputPin, OutputState};
use crate::error::TransportError;
use crate::msg::Message;
use crate::transport::{Transport, TransportConfig};
use crate::wire::Frame;

/// What a [`FakeTransport`] saw, plus knobs for the next calls.
#[derive(Debug, Default)]
pub struct LinkLog {
    pub opened: u32,
    pub closed: u32,
    pub agent: Option<TransportConfig>,
    pub written: Vec<Vec<u8>>,
    pub inbox: VecDeque<Vec<u8>>,
    pub refuse_open: bool,
    pub write_attempts: u32,
    /// Number of upcoming writes to fail.
    pub failing_writes: u32,
    /// Write attempts (1-based) to fail.
    pub fail_attempts: Vec<u32>,
    pub short_writes: bool,
    /// Number of upcoming reads to fail.
    pub failing_reads: u32,
}

/// In-memory transport. Clones share one log.
///
/// A read with nothing queued advances the attached clock by its timeout, as
/// a blocking read would.
#[derive(Clone, Default)]
pub struct FakeTransport {
    log: Arc<Mutex<LinkLog>>,
    clock: Option<Arc<ManualClock>>,
}

impl FakeTransport {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_clock(clock: Arc<ManualClock>) -> Self {
        Self { log: Arc::default(), clock: Some(clock) }
    }

    pub fn log(&self) -> MutexGuard<'_, LinkLog> {
        self.log.lock().unwrap_or_else(|e| e.into_inner())
    }

    pub fn push_incoming<M: Message>(&self, topic: &str, msg: &M) {
        let mut payload = Vec::new();
        msg.encode(&mut payload);
        let mut frame = Vec::new();
        Frame::new(topic, &payload).encode(&mut frame).unwrap();
        self.push_raw(frame);
    }

    pub fn push_raw(&self, frame: Vec<u8>) {
        self.log().inbox.push_back(frame);
    }

    /// Messages written to `topic`, in order.
    pub fn published<M: Message>(&self, topic: &str) -> Vec<M> {
        self.log()
            .written
            .iter()
            .filter_map(|bytes| Frame::decode(bytes).ok())
            .filter(|frame| frame.topic == topic)
            .map(|frame| M::decode(frame.payload).unwrap())
            .collect()
    }
}

impl Transport for FakeTransport {
    fn open(&mut self, config: &TransportConfig) -> Result<(), TransportError> {
        let mut log = self.log();
        if log.refuse_open {
            return Err(TransportError::Link("agent unreachable".into()));
        }
        if log.opened > log.closed {
            return Err(TransportError::AlreadyOpen);
        }
        log.opened += 1;
        log.agent = Some(*config);
        Ok(())
    }

    fn close(&mut self) -> Result<(), TransportError> {
        self.log().closed += 1;
        Ok(())
    }

    fn write(&mut self, buf: &[u8], _timeout_ms: u64) -> Result<usize, TransportError> {
        let mut log = self.log();
        log.write_attempts += 1;
        let attempt = log.write_attempts;
        if log.fail_attempts.contains(&attempt) {
            return Err(TransportError::Link("write refused".into()));
        }
        if log.failing_writes > 0 {
            log.failing_writes -= 1;
            return Err(TransportError::Link("write refused".into()));
        }
        if log.short_writes {
            return Ok(buf.len().saturating_sub(1));
        }
        log.written.push(buf.to_vec());
        Ok(buf.len())
    }

    fn read(&mut self, buf: &mut [u8], timeout_ms: u64) -> Result<usize, TransportError> {
        let next = {
            let mut log = self.log();
            if log.failing_reads > 0 {
                log.failing_reads -= 1;
                return Err(TransportError::Link("read failed".into()));
            }
            log.inbox.pop_front()
        };
        match next {
            Some(frame) => {
                let len = frame.len().min(buf.len());
                buf[..len].copy_from_slice(&frame[..len]);
                Ok(len)
            }
            None => {
                if let Some(clock) = &self.clock {
                    clock.advance(timeout_ms);
                }
                Ok(0)
            }
        }
    }
}

/// Output pin that records every state it is driven to.
#[derive(Debug, Default)]
pub struct RecordingPin {
    pub states: Vec<OutputState>,
}

impl OutputPin for RecordingPin {
    fn set(&mut self, state: OutputState) {
        self.states.push(state);
    }
}
