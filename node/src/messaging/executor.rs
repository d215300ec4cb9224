//! Cooperative executor.
//!
//! One `spin_some` call runs three phases:
//!
//! 1. Ingest: one transport read, waiting only when nothing is ready (and
//!    never past the next timer expiry), then up to [`DRAIN_BUDGET`] more
//!    reads without waiting. Frames are queued on the matching subscription.
//! 2. Snapshot: readiness of every handle at a single `now`.
//! 3. Dispatch: ready handles run in registration order, one callback each.
//!
//! A failed read ends the ingest phase but not the spin; only a closed link
//! fails the call.

use std::collections::VecDeque;

use micronode_network::Clock;

use super::context::{Context, SharedLink};
use super::subscription::Subscription;
use super::timer::Timer;
use crate::error::{MessagingError, TransportError, WireError};
use crate::msg::Message;
use crate::wire::{Frame, MAX_FRAME};

/// Extra frames read per spin after the first.
pub const DRAIN_BUDGET: usize = 8;

/// Frames held per subscription; the oldest is dropped beyond this.
pub const QUEUE_DEPTH: usize = 4;

type Dispatch<'a> = Box<dyn FnMut(&[u8]) -> Result<(), WireError> + 'a>;

enum Handle<'a> {
    Subscription {
        topic: String,
        queue: VecDeque<Vec<u8>>,
        dispatch: Dispatch<'a>,
    },
    Timer {
        timer: Timer,
        callback: Box<dyn FnMut() + 'a>,
    },
}

impl Handle<'_> {
    fn is_ready(&self, now_ms: u64) -> bool {
        match self {
            Handle::Subscription { queue, .. } => !queue.is_empty(),
            Handle::Timer { timer, .. } => timer.is_ready(now_ms),
        }
    }
}

pub struct Executor<'a> {
    link: SharedLink,
    clock: &'a dyn Clock,
    capacity: usize,
    handles: Vec<Handle<'a>>,
    rx: Vec<u8>,
}

impl<'a> Executor<'a> {
    pub fn new(ctx: &Context, capacity: usize, clock: &'a dyn Clock) -> Self {
        Self {
            link: ctx.link(),
            clock,
            capacity,
            handles: Vec::with_capacity(capacity),
            rx: vec![0u8; MAX_FRAME],
        }
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn len(&self) -> usize {
        self.handles.len()
    }

    pub fn is_empty(&self) -> bool {
        self.handles.is_empty()
    }

    fn reserve(&self) -> Result<(), MessagingError> {
        if self.handles.len() >= self.capacity {
            return Err(MessagingError::ExecutorFull { capacity: self.capacity });
        }
        Ok(())
    }

    /// Decode each new frame into `msg`, then run `callback` on it.
    pub fn add_subscription<M, F>(
        &mut self,
        subscription: &Subscription<M>,
        msg: &'a mut M,
        mut callback: F,
    ) -> Result<(), MessagingError>
    where
        M: Message + 'a,
        F: FnMut(&M) + 'a,
    {
        self.reserve()?;
        let dispatch = move |payload: &[u8]| -> Result<(), WireError> {
            *msg = M::decode(payload)?;
            callback(&*msg);
            Ok(())
        };
        self.handles.push(Handle::Subscription {
            topic: subscription.topic().to_owned(),
            queue: VecDeque::with_capacity(QUEUE_DEPTH),
            dispatch: Box::new(dispatch),
        });
        Ok(())
    }

    pub fn add_timer<F>(&mut self, timer: Timer, callback: F) -> Result<(), MessagingError>
    where
        F: FnMut() + 'a,
    {
        self.reserve()?;
        self.handles.push(Handle::Timer { timer, callback: Box::new(callback) });
        Ok(())
    }

    /// Service the transport and run ready callbacks, waiting at most
    /// `timeout_ms`. Returns the number of callbacks run.
    pub fn spin_some(&mut self, timeout_ms: u64) -> Result<usize, MessagingError> {
        let now = self.clock.now_ms();
        let wait = if self.handles.iter().any(|h| h.is_ready(now)) {
            0
        } else {
            self.next_timer_in(now).map_or(timeout_ms, |due| due.min(timeout_ms))
        };
        match self.ingest(wait) {
            Ok(()) => {}
            Err(TransportError::NotOpen) => return Err(TransportError::NotOpen.into()),
            Err(e) => log::warn!("[EXEC] Read failed: {}", e),
        }

        let now = self.clock.now_ms();
        let ready: Vec<bool> = self.handles.iter().map(|h| h.is_ready(now)).collect();

        let mut ran = 0;
        for (handle, ready) in self.handles.iter_mut().zip(ready) {
            if !ready {
                continue;
            }
            match handle {
                Handle::Subscription { topic, queue, dispatch } => {
                    let Some(payload) = queue.pop_front() else {
                        continue;
                    };
                    match dispatch(&payload) {
                        Ok(()) => ran += 1,
                        Err(e) => log::warn!("[EXEC] Dropped message on {}: {}", topic, e),
                    }
                }
                Handle::Timer { timer, callback } => {
                    let skipped = timer.fire(now);
                    if skipped > 0 {
                        log::debug!("[EXEC] Timer skipped {} periods", skipped);
                    }
                    callback();
                    ran += 1;
                }
            }
        }
        Ok(ran)
    }

    fn next_timer_in(&self, now_ms: u64) -> Option<u64> {
        self.handles
            .iter()
            .filter_map(|h| match h {
                Handle::Timer { timer, .. } => Some(timer.time_until_due(now_ms)),
                Handle::Subscription { .. } => None,
            })
            .min()
    }

    fn ingest(&mut self, wait_ms: u64) -> Result<(), TransportError> {
        let mut link = self.link.borrow_mut();
        for round in 0..=DRAIN_BUDGET {
            let timeout = if round == 0 { wait_ms } else { 0 };
            let len = link.receive(&mut self.rx, timeout)?;
            if len == 0 {
                break;
            }
            route(&mut self.handles, &self.rx[..len]);
        }
        Ok(())
    }
}

fn route(handles: &mut [Handle<'_>], bytes: &[u8]) {
    let frame = match Frame::decode(bytes) {
        Ok(frame) => frame,
        Err(e) => {
            log::warn!("[EXEC] Malformed frame: {}", e);
            return;
        }
    };

    let queue = handles.iter_mut().find_map(|h| match h {
        Handle::Subscription { topic, queue, .. } if topic.as_str() == frame.topic => Some(queue),
        _ => None,
    });
    match queue {
        Some(queue) => {
            if queue.len() >= QUEUE_DEPTH {
                queue.pop_front();
                log::warn!("[EXEC] Queue full on {}, dropped oldest", frame.topic);
            }
            queue.push_back(frame.payload.to_vec());
        }
        None => log::debug!("[EXEC] No subscription for {}", frame.topic),
    }
}
