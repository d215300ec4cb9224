//! Periodic timer driven by the executor's clock.

use crate::error::MessagingError;

/// Fires every `period_ms`, keeping its phase when ticks are missed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Timer {
    period_ms: u64,
    next_due_ms: u64,
}

impl Timer {
    /// First expiry is one period after `now_ms`.
    pub fn new(period_ms: u64, now_ms: u64) -> Result<Self, MessagingError> {
        if period_ms == 0 {
            return Err(MessagingError::ZeroPeriod);
        }
        Ok(Self { period_ms, next_due_ms: now_ms.saturating_add(period_ms) })
    }

    pub fn period_ms(&self) -> u64 {
        self.period_ms
    }

    pub fn next_due_ms(&self) -> u64 {
        self.next_due_ms
    }

    pub fn is_ready(&self, now_ms: u64) -> bool {
        now_ms >= self.next_due_ms
    }

    pub fn time_until_due(&self, now_ms: u64) -> u64 {
        self.next_due_ms.saturating_sub(now_ms)
    }

    /// Advance past `now_ms`. Returns the number of periods skipped.
    pub(crate) fn fire(&mut self, now_ms: u64) -> u64 {
        let late = now_ms.saturating_sub(self.next_due_ms);
        let skipped = late / self.period_ms;
        self.next_due_ms = self
            .next_due_ms
            .saturating_add((skipped + 1).saturating_mul(self.period_ms));
        skipped
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_zero_period() {
        assert!(matches!(Timer::new(0, 0), Err(MessagingError::ZeroPeriod)));
    }

    #[test]
    fn test_due_after_one_period() {
        let timer = Timer::new(1000, 250).unwrap();
        assert!(!timer.is_ready(1249));
        assert!(timer.is_ready(1250));
        assert_eq!(timer.time_until_due(1000), 250);
    }

    #[test]
    fn test_late_fire_keeps_phase() {
        let mut timer = Timer::new(1000, 0).unwrap();
        assert_eq!(timer.fire(1100), 0);
        assert_eq!(timer.next_due_ms(), 2000);

        assert_eq!(timer.fire(4500), 2);
        assert_eq!(timer.next_due_ms(), 5000);
    }
}
