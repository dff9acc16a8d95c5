//! Protected containers: a value whose reads are verified against its last
//! sanctioned state and whose writes go through a single gateway.
//!
//! ```text
//!   read()          ──► check stamps ──► alert on mismatch ──► value
//!   apply_changes() ──► check stamps ──► mutate ──► notify (new baseline)
//! ```
//!
//! Anything that changes the value without going through
//! [`ProtectedContainer::apply_changes`] is an injection by definition and is
//! reported on the next read.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Mutex, MutexGuard};

use serde::{Deserialize, Serialize};

use crate::error::{Result, VeilError};
use crate::injection::{AlertChannel, InjectionDetector};
use crate::stamp::Protectable;

/// Which stamps a container scans.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProtectionMode {
    #[default]
    StateAndCode,
    JustState,
    JustCode,
    NoProtection,
}

impl ProtectionMode {
    pub fn scans_state(self) -> bool {
        matches!(self, Self::StateAndCode | Self::JustState)
    }

    pub fn scans_code(self) -> bool {
        matches!(self, Self::StateAndCode | Self::JustCode)
    }
}

struct Guarded<T> {
    value: Option<T>,
    detector: InjectionDetector,
    mode: ProtectionMode,
}

/// Wraps one value and gates every access to it.
pub struct ProtectedContainer<T: Protectable> {
    guarded: Mutex<Guarded<T>>,
    read_only: AtomicBool,
    disposed: AtomicBool,
}

impl<T: Protectable> ProtectedContainer<T> {
    /// Wrap `value` and baseline it.
    pub fn new(value: T, mode: ProtectionMode, channel: AlertChannel) -> Result<Self> {
        ensure_supported::<T>(mode)?;
        let mut detector = InjectionDetector::new(mode.scans_state(), mode.scans_code(), channel);
        detector.notify(&value)?;
        Ok(Self {
            guarded: Mutex::new(Guarded {
                value: Some(value),
                detector,
                mode,
            }),
            read_only: AtomicBool::new(false),
            disposed: AtomicBool::new(false),
        })
    }

    /// `StateAndCode` protection, alerts logged.
    pub fn protect(value: T) -> Result<Self> {
        Self::new(value, ProtectionMode::default(), AlertChannel::default())
    }

    /// Wrap a fresh `T::default()`.
    pub fn from_default(mode: ProtectionMode, channel: AlertChannel) -> Result<Self>
    where
        T: Default,
    {
        Self::new(T::default(), mode, channel)
    }

    /// Verify, then hand the value to `f`.
    pub fn with_value<R>(&self, f: impl FnOnce(&T) -> R) -> Result<R> {
        let guarded = self.lock_live()?;
        let value = guarded.value.as_ref().ok_or_else(disposed)?;
        guarded.detector.check(value)?;
        Ok(f(value))
    }

    /// Verify, then return a copy of the value.
    pub fn read(&self) -> Result<T>
    where
        T: Clone,
    {
        self.with_value(T::clone)
    }

    /// The only sanctioned way to change the value.
    ///
    /// Pre-existing tampering is reported before `mutation` runs; afterwards
    /// the mutated value becomes the new baseline.
    pub fn apply_changes(&self, mutation: impl FnOnce(&mut T)) -> Result<()> {
        if self.is_read_only() {
            return Err(VeilError::ReadOnlyViolation);
        }
        let mut guarded = self.lock_live()?;
        if self.is_read_only() {
            return Err(VeilError::ReadOnlyViolation);
        }
        let Guarded { value, detector, .. } = &mut *guarded;
        let value = value.as_mut().ok_or_else(disposed)?;
        detector.check(&*value)?;
        mutation(value);
        detector.notify(&*value)
    }

    pub fn protection_mode(&self) -> ProtectionMode {
        self.guarded.lock().unwrap().mode
    }

    /// Switch protection mode. A dimension that turns on is re-baselined on
    /// the current value; dimensions already on or turning off are not.
    pub fn set_protection_mode(&self, mode: ProtectionMode) -> Result<()> {
        ensure_supported::<T>(mode)?;
        let mut guarded = self.lock_live()?;
        let previous = guarded.mode;
        if previous == mode {
            return Ok(());
        }
        let Guarded { value, detector, .. } = &mut *guarded;
        let value = value.as_ref().ok_or_else(disposed)?;
        if mode.scans_state() && !previous.scans_state() {
            detector.notify_state(value)?;
        }
        if mode.scans_code() && !previous.scans_code() {
            detector.notify_code::<T>()?;
        }
        detector.set_scanning(mode.scans_state(), mode.scans_code());
        guarded.mode = mode;
        log::debug!(
            "{} protection {previous:?} -> {mode:?}",
            std::any::type_name::<T>()
        );
        Ok(())
    }

    pub fn set_alert_channel(&self, channel: AlertChannel) {
        self.guarded.lock().unwrap().detector.set_channel(channel);
    }

    /// Forbid further changes. One-way and idempotent.
    pub fn make_read_only(&self) {
        self.read_only.store(true, Ordering::Release);
    }

    pub fn is_read_only(&self) -> bool {
        self.read_only.load(Ordering::Acquire)
    }

    /// Drop the wrapped value. Idempotent.
    pub fn dispose(&self) {
        if self.disposed.swap(true, Ordering::AcqRel) {
            return;
        }
        let value = self.guarded.lock().unwrap().value.take();
        drop(value);
    }

    pub fn is_disposed(&self) -> bool {
        self.disposed.load(Ordering::Acquire)
    }

    fn lock_live(&self) -> Result<MutexGuard<'_, Guarded<T>>> {
        if self.is_disposed() {
            return Err(disposed());
        }
        Ok(self.guarded.lock().unwrap())
    }
}

fn disposed() -> VeilError {
    VeilError::Disposed("protected container")
}

fn ensure_supported<T: Protectable>(mode: ProtectionMode) -> Result<()> {
    if mode.scans_code() && T::is_dictionary() {
        return Err(VeilError::UnsupportedType {
            type_name: std::any::type_name::<T>(),
            reason: format!("{mode:?} requires code protection, which dictionaries do not support"),
        });
    }
    Ok(())
}
