//! Injection detection: baseline stamps, compare on demand, alert on mismatch.
//!
//! Alerting is advisory. Unless the channel is [`AlertChannel::Raise`], a
//! detected injection never fails the checking call.

use std::fmt;
use std::sync::Arc;
use std::time::SystemTime;

use crate::config::AlertKind;
use crate::error::{Result, VeilError};
use crate::stamp::{Protectable, Stamp, StampProvider};

/// Which stamps failed to match.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InjectionType {
    StateInjection,
    CodeInjection,
    CodeAndStateInjection,
}

impl InjectionType {
    fn from_flags(state: bool, code: bool) -> Option<Self> {
        match (state, code) {
            (true, true) => Some(Self::CodeAndStateInjection),
            (true, false) => Some(Self::StateInjection),
            (false, true) => Some(Self::CodeInjection),
            (false, false) => None,
        }
    }
}

impl fmt::Display for InjectionType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::StateInjection => "state",
            Self::CodeInjection => "code",
            Self::CodeAndStateInjection => "code and state",
        };
        f.write_str(s)
    }
}

/// An injection alert.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InjectionMessage {
    pub injection_type: InjectionType,
    pub type_name: &'static str,
    pub detected_at: SystemTime,
}

impl fmt::Display for InjectionMessage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} injection detected in {}", self.injection_type, self.type_name)
    }
}

/// Custom alert receiver.
pub trait AlertSink: Send + Sync {
    fn alert(&self, message: &InjectionMessage);
}

impl<F> AlertSink for F
where
    F: Fn(&InjectionMessage) + Send + Sync,
{
    fn alert(&self, message: &InjectionMessage) {
        self(message)
    }
}

/// Where injection alerts go.
#[derive(Clone, Default)]
pub enum AlertChannel {
    /// Mismatches are ignored.
    Suppressed,
    /// `log::warn!`.
    #[default]
    Log,
    /// The checking call fails with [`VeilError::InjectionDetected`].
    Raise,
    Sink(Arc<dyn AlertSink>),
}

impl AlertChannel {
    pub fn sink(f: impl Fn(&InjectionMessage) + Send + Sync + 'static) -> Self {
        Self::Sink(Arc::new(f))
    }

    pub fn is_alerting(&self) -> bool {
        !matches!(self, Self::Suppressed)
    }

    fn deliver(&self, message: InjectionMessage) -> Result<()> {
        match self {
            Self::Suppressed => Ok(()),
            Self::Log => {
                log::warn!("{message}");
                Ok(())
            }
            Self::Raise => Err(VeilError::InjectionDetected(message)),
            Self::Sink(sink) => {
                sink.alert(&message);
                Ok(())
            }
        }
    }
}

impl From<AlertKind> for AlertChannel {
    fn from(kind: AlertKind) -> Self {
        match kind {
            AlertKind::Suppressed => Self::Suppressed,
            AlertKind::Log => Self::Log,
            AlertKind::Raise => Self::Raise,
        }
    }
}

impl fmt::Debug for AlertChannel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Suppressed => f.write_str("Suppressed"),
            Self::Log => f.write_str("Log"),
            Self::Raise => f.write_str("Raise"),
            Self::Sink(_) => f.write_str("Sink(..)"),
        }
    }
}

/// Holds the last known-good stamps of one object.
#[derive(Debug)]
pub struct InjectionDetector {
    scan_state: bool,
    scan_code: bool,
    channel: AlertChannel,
    last_state: Option<Stamp>,
    last_code: Option<Stamp>,
}

impl InjectionDetector {
    pub fn new(scan_state: bool, scan_code: bool, channel: AlertChannel) -> Self {
        Self {
            scan_state,
            scan_code,
            channel,
            last_state: None,
            last_code: None,
        }
    }

    pub fn scan_state(&self) -> bool {
        self.scan_state
    }

    pub fn scan_code(&self) -> bool {
        self.scan_code
    }

    /// Change the scanned dimensions. Newly enabled dimensions have a stale
    /// baseline until the caller notifies them.
    pub fn set_scanning(&mut self, scan_state: bool, scan_code: bool) {
        self.scan_state = scan_state;
        self.scan_code = scan_code;
    }

    pub fn channel(&self) -> &AlertChannel {
        &self.channel
    }

    pub fn set_channel(&mut self, channel: AlertChannel) {
        self.channel = channel;
    }

    pub fn can_alert(&self) -> bool {
        (self.scan_state || self.scan_code) && self.channel.is_alerting()
    }

    /// Accept the current state and code as authoritative, for each scanned
    /// dimension.
    pub fn notify<T: Protectable>(&mut self, value: &T) -> Result<()> {
        if self.scan_state {
            self.notify_state(value)?;
        }
        if self.scan_code {
            self.notify_code::<T>()?;
        }
        Ok(())
    }

    pub fn notify_state<T: Protectable>(&mut self, value: &T) -> Result<()> {
        self.last_state = Some(StampProvider::state_stamp(value)?);
        Ok(())
    }

    pub fn notify_code<T: Protectable>(&mut self) -> Result<()> {
        self.last_code = Some(StampProvider::code_stamp::<T>()?);
        Ok(())
    }

    /// Compare `value` against the baseline and alert on mismatch. Returns an
    /// error only for stamping failures or the `Raise` channel.
    pub fn check<T: Protectable>(&self, value: &T) -> Result<()> {
        if !self.can_alert() {
            return Ok(());
        }
        let state_changed = self.scan_state
            && self.last_state != Some(StampProvider::state_stamp(value)?);
        let code_changed =
            self.scan_code && self.last_code != Some(StampProvider::code_stamp::<T>()?);

        match InjectionType::from_flags(state_changed, code_changed) {
            Some(injection_type) => self.channel.deliver(InjectionMessage {
                injection_type,
                type_name: std::any::type_name::<T>(),
                detected_at: SystemTime::now(),
            }),
            None => Ok(()),
        }
    }
}
