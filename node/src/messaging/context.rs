//! Messaging context: owns the transport for the life of the session.

use std::cell::RefCell;
use std::rc::Rc;

use crate::error::{MessagingError, PublishError, TransportError};
use crate::transport::{Transport, TransportConfig};
use crate::wire::Frame;

/// Transport plus its open flag, shared by every handle of a context.
pub(crate) struct Link {
    transport: Box<dyn Transport>,
    open: bool,
    scratch: Vec<u8>,
}

pub(crate) type SharedLink = Rc<RefCell<Link>>;

impl Link {
    pub(crate) fn is_open(&self) -> bool {
        self.open
    }

    pub(crate) fn send(&mut self, frame: &Frame<'_>, timeout_ms: u64) -> Result<(), PublishError> {
        if !self.open {
            return Err(TransportError::NotOpen.into());
        }
        frame.encode(&mut self.scratch)?;
        let len = self.scratch.len();
        let written = self.transport.write(&self.scratch, timeout_ms)?;
        if written != len {
            return Err(PublishError::ShortWrite { written, len });
        }
        Ok(())
    }

    pub(crate) fn receive(&mut self, buf: &mut [u8], timeout_ms: u64) -> Result<usize, TransportError> {
        if !self.open {
            return Err(TransportError::NotOpen);
        }
        self.transport.read(buf, timeout_ms)
    }

    /// Close once; later calls are no-ops.
    fn close(&mut self) -> Result<(), TransportError> {
        if !self.open {
            return Ok(());
        }
        self.open = false;
        self.transport.close()
    }
}

/// An open messaging session.
///
/// The transport is opened by [`Context::init`] and closed exactly once, by
/// [`Context::fini`] or on drop.
pub struct Context {
    link: SharedLink,
    config: TransportConfig,
}

impl Context {
    pub fn init(mut transport: Box<dyn Transport>, config: &TransportConfig) -> Result<Self, MessagingError> {
        transport.open(config)?;
        log::info!("[LINK] Open, agent {}", config.agent);
        let link = Link { transport, open: true, scratch: Vec::new() };
        Ok(Self { link: Rc::new(RefCell::new(link)), config: *config })
    }

    pub fn config(&self) -> &TransportConfig {
        &self.config
    }

    pub fn is_open(&self) -> bool {
        self.link.borrow().is_open()
    }

    pub(crate) fn link(&self) -> SharedLink {
        Rc::clone(&self.link)
    }

    /// Close the transport.
    pub fn fini(self) -> Result<(), MessagingError> {
        self.link.borrow_mut().close()?;
        log::info!("[LINK] Closed");
        Ok(())
    }
}

impl Drop for Context {
    fn drop(&mut self) {
        if let Err(e) = self.link.borrow_mut().close() {
            log::warn!("[LINK] Closing transport failed: {}", e);
        }
    }
}
