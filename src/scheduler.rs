//! Settle-delay scheduler.
//!
//! Arms the one-shot timer between preparing a column and converting it.
//! Every arm issues a fresh [`TimerToken`]; an expiry is only honoured if
//! it carries the token of the timer currently pending.  A late, duplicate
//! or out-of-order callback is therefore rejected instead of converting a
//! pin that was never prepared.
//!
//! ```text
//!   arm() ──▶ OneShotTimer::schedule(delay, token)
//!                         │
//!                         ▼  (timer task / sim)
//!   accept(token) ──▶ true once, then false
//! ```

use core::num::NonZeroU32;

use log::{debug, warn};

use crate::app::ports::{OneShotTimer, TimerToken};
use crate::error::HwError;

/// Token issuer and pending-timer bookkeeping.
#[derive(Debug)]
pub struct SettleScheduler {
    next: NonZeroU32,
    pending: Option<TimerToken>,
}

impl SettleScheduler {
    pub fn new() -> Self {
        Self {
            next: NonZeroU32::MIN,
            pending: None,
        }
    }

    /// Schedule the settle callback `interval_us` from now.
    ///
    /// On failure nothing is left pending.
    pub fn arm(
        &mut self,
        timer: &mut impl OneShotTimer,
        interval_us: u32,
    ) -> Result<TimerToken, HwError> {
        let token = self.issue();
        timer.schedule(interval_us, token)?;
        if let Some(old) = self.pending.replace(token) {
            warn!("scheduler: token {} superseded before expiry", old.get());
        }
        debug!("scheduler: armed token {} for {}us", token.get(), interval_us);
        Ok(token)
    }

    /// Consume the pending token if `token` matches it.
    pub fn accept(&mut self, token: TimerToken) -> bool {
        if self.pending == Some(token) {
            self.pending = None;
            true
        } else {
            false
        }
    }

    /// Token of the timer currently armed, if any.
    pub fn pending(&self) -> Option<TimerToken> {
        self.pending
    }

    fn issue(&mut self) -> TimerToken {
        let token = TimerToken(self.next);
        // Wrap past u32::MAX back to 1; zero is never issued.
        self.next = self.next.checked_add(1).unwrap_or(NonZeroU32::MIN);
        token
    }
}

impl Default for SettleScheduler {
    fn default() -> Self {
        Self::new()
    }
}
