//! Board collaborator: one-time init and the output pin the subscriber drives.

use thiserror::Error;

/// Level of a two-state output.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputState {
    /// Driven by a zero payload.
    Off,
    /// Driven by any nonzero payload.
    On,
}

impl OutputState {
    pub const fn from_value(value: i32) -> Self {
        if value == 0 {
            Self::Off
        } else {
            Self::On
        }
    }
}

pub trait OutputPin {
    /// Must not block.
    fn set(&mut self, state: OutputState);
}

#[derive(Debug, Error)]
pub enum BoardError {
    #[error("board already initialized")]
    AlreadyInitialized,
}

pub trait Board {
    /// Called once, before the worker starts.
    fn init(&mut self) -> Result<(), BoardError>;

    /// The user LED. Yields it once.
    fn take_led(&mut self) -> Option<Box<dyn OutputPin + Send>>;
}

/// LED that logs its transitions.
#[derive(Debug)]
pub struct LogLed {
    name: &'static str,
    state: Option<OutputState>,
}

impl LogLed {
    pub const fn new(name: &'static str) -> Self {
        Self { name, state: None }
    }

    pub fn state(&self) -> Option<OutputState> {
        self.state
    }
}

impl OutputPin for LogLed {
    fn set(&mut self, state: OutputState) {
        if self.state != Some(state) {
            log::info!("[LED] {} {:?}", self.name, state);
        }
        self.state = Some(state);
    }
}

/// Host stand-in for the target board.
#[derive(Debug, Default)]
pub struct SimBoard {
    initialized: bool,
    led_taken: bool,
}

impl SimBoard {
    pub fn new() -> Self {
        Self::default()
    }
}

impl Board for SimBoard {
    fn init(&mut self) -> Result<(), BoardError> {
        if self.initialized {
            return Err(BoardError::AlreadyInitialized);
        }
        self.initialized = true;
        log::info!("[BOARD] Simulated board ready");
        Ok(())
    }

    fn take_led(&mut self) -> Option<Box<dyn OutputPin + Send>> {
        if self.led_taken {
            return None;
        }
        self.led_taken = true;
        Some(Box::new(LogLed::new("LD2")))
    }
}
