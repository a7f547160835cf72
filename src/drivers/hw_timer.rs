//! One-shot settle timer on ESP-IDF's esp_timer API.
//!
//! The callback executes in the ESP timer task context (not ISR).  It copies
//! the armed token into [`EXPIRED`] and wakes the task that created the
//! timer through an esp-idf-hal task notification.  That task blocks in
//! [`SettleTimer::wait_expired`] while a pass is in flight, so the
//! conversion follows the settle interval instead of the next display frame.
//!
//! On simulation targets the timer records what was scheduled and expires
//! it on demand.

use core::time::Duration;

use crate::app::ports::{OneShotTimer, TimerToken};
use crate::error::HwError;

#[cfg(not(target_os = "espidf"))]
use core::cell::Cell;

#[cfg(target_os = "espidf")]
use core::num::NonZeroU32;
#[cfg(target_os = "espidf")]
use core::sync::atomic::{AtomicU32, Ordering};
#[cfg(target_os = "espidf")]
use std::sync::Arc;

#[cfg(target_os = "espidf")]
use esp_idf_hal::delay::TickType;
#[cfg(target_os = "espidf")]
use esp_idf_hal::task::notification::{Notification, Notifier};
#[cfg(target_os = "espidf")]
use esp_idf_svc::sys::*;

#[cfg(target_os = "espidf")]
use log::{error, info};

/// Token of the schedule currently armed (0 = none).
#[cfg(target_os = "espidf")]
static ARMED: AtomicU32 = AtomicU32::new(0);

/// Token of the last schedule that fired and has not been collected yet.
#[cfg(target_os = "espidf")]
static EXPIRED: AtomicU32 = AtomicU32::new(0);

/// `arg` is the [`Notifier`] owned by the [`SettleTimer`] that armed us.
#[cfg(target_os = "espidf")]
unsafe extern "C" fn settle_elapsed_cb(arg: *mut core::ffi::c_void) {
    EXPIRED.store(ARMED.swap(0, Ordering::AcqRel), Ordering::Release);
    // SAFETY: the timer is stopped and deleted before its notifier is dropped.
    let notifier = unsafe { &*(arg as *const Notifier) };
    // SAFETY: the waiting task outlives the timer that notifies it.
    let _ = unsafe { notifier.notify_and_yield(NonZeroU32::MIN) };
}

/// Collect the token of an expired settle interval, if any.
#[cfg(target_os = "espidf")]
pub fn take_expired() -> Option<TimerToken> {
    NonZeroU32::new(EXPIRED.swap(0, Ordering::AcqRel)).map(TimerToken)
}

pub struct SettleTimer {
    #[cfg(target_os = "espidf")]
    handle: esp_timer_handle_t,
    /// Bound to the task that called [`SettleTimer::new`].
    #[cfg(target_os = "espidf")]
    notification: Notification,
    /// Target of the callback's `arg`; outlives the esp_timer handle.
    #[cfg(target_os = "espidf")]
    _notifier: Arc<Notifier>,
    #[cfg(not(target_os = "espidf"))]
    pending: Cell<Option<(u32, TimerToken)>>,
    scheduled: u32,
}

#[cfg(target_os = "espidf")]
impl SettleTimer {
    /// Create the timer.  Must run on the task that will call
    /// [`wait_expired`](Self::wait_expired).
    pub fn new() -> Result<Self, HwError> {
        let notification = Notification::new();
        let notifier = notification.notifier();
        let args = esp_timer_create_args_t {
            callback: Some(settle_elapsed_cb),
            arg: Arc::as_ptr(&notifier) as *mut core::ffi::c_void,
            dispatch_method: esp_timer_dispatch_t_ESP_TIMER_TASK,
            name: b"settle\0".as_ptr() as *const _,
            skip_unhandled_events: false,
        };
        let mut handle: esp_timer_handle_t = core::ptr::null_mut();
        // SAFETY: args outlives the call; handle is written by esp_timer_create.
        let ret = unsafe { esp_timer_create(&args, &mut handle) };
        if ret != ESP_OK {
            error!("hw_timer: settle timer create failed (rc={})", ret);
            return Err(HwError::TimerFailed(ret));
        }
        info!("hw_timer: settle timer ready");
        Ok(Self {
            handle,
            notification,
            _notifier: notifier,
            scheduled: 0,
        })
    }

    /// Block until the armed settle interval expires or `timeout` passes,
    /// and return the expired token.  Returns at once if nothing is armed.
    pub fn wait_expired(&self, timeout: Duration) -> Option<TimerToken> {
        if let Some(token) = take_expired() {
            return Some(token);
        }
        if ARMED.load(Ordering::Acquire) == 0 {
            return None;
        }
        let _ = self.notification.wait(TickType::from(timeout).ticks());
        take_expired()
    }
}

#[cfg(target_os = "espidf")]
impl OneShotTimer for SettleTimer {
    fn schedule(&mut self, delay_us: u32, token: TimerToken) -> Result<(), HwError> {
        ARMED.store(token.get(), Ordering::Release);
        // SAFETY: handle is live until Drop.  Stopping an idle timer only
        // returns ESP_ERR_INVALID_STATE, which is fine here.
        let ret = unsafe {
            esp_timer_stop(self.handle);
            esp_timer_start_once(self.handle, u64::from(delay_us))
        };
        if ret != ESP_OK {
            ARMED.store(0, Ordering::Release);
            return Err(HwError::TimerFailed(ret));
        }
        self.scheduled = self.scheduled.wrapping_add(1);
        Ok(())
    }
}

#[cfg(target_os = "espidf")]
impl Drop for SettleTimer {
    fn drop(&mut self) {
        // SAFETY: handle came from esp_timer_create and is deleted once,
        // before `_notifier` is dropped.
        unsafe {
            esp_timer_stop(self.handle);
            esp_timer_delete(self.handle);
        }
        ARMED.store(0, Ordering::Release);
    }
}

#[cfg(not(target_os = "espidf"))]
impl SettleTimer {
    pub fn new() -> Result<Self, HwError> {
        log::info!("hw_timer(sim): settle timer fires on demand");
        Ok(Self {
            pending: Cell::new(None),
            scheduled: 0,
        })
    }

    /// Delay and token of the schedule waiting to fire.
    pub fn pending(&self) -> Option<(u32, TimerToken)> {
        self.pending.get()
    }

    /// Expire the pending schedule now and hand back its token.
    pub fn fire(&self) -> Option<TimerToken> {
        self.pending.take().map(|(_, token)| token)
    }

    /// The pending schedule expires if its delay fits in `timeout`;
    /// otherwise it stays pending and nothing is returned.
    pub fn wait_expired(&self, timeout: Duration) -> Option<TimerToken> {
        match self.pending.get() {
            Some((delay_us, _)) if u128::from(delay_us) <= timeout.as_micros() => self.fire(),
            _ => None,
        }
    }
}

#[cfg(not(target_os = "espidf"))]
impl OneShotTimer for SettleTimer {
    fn schedule(&mut self, delay_us: u32, token: TimerToken) -> Result<(), HwError> {
        self.pending.set(Some((delay_us, token)));
        self.scheduled = self.scheduled.wrapping_add(1);
        Ok(())
    }
}

impl SettleTimer {
    /// Number of successful schedules since creation.
    pub fn scheduled(&self) -> u32 {
        self.scheduled
    }
}
