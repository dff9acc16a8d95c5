//! Application-managed handle tying the generators and protection defaults
//! together.
//!
//! Nothing in the crate reaches for global state. Applications build a
//! [`SecurityContext`] and pass it around; [`SecurityContext::global`] is an
//! opt-in convenience for programs that want one process-wide instance.

use std::sync::{Arc, OnceLock};

use crate::config::ToolkitConfig;
use crate::digest;
use crate::error::Result;
use crate::fast::FastRandomGenerator;
use crate::protected::ProtectedContainer;
use crate::slow::SlowRandomGenerator;
use crate::stamp::Protectable;

/// Shared slow generator, a fast generator drawing from it, and the
/// defaults applied to new protected containers.
pub struct SecurityContext {
    slow: Arc<SlowRandomGenerator>,
    fast: FastRandomGenerator,
    config: ToolkitConfig,
}

impl SecurityContext {
    /// System sources, plus the persisted pool when `config.entropy_pool` is
    /// set.
    pub fn new(config: ToolkitConfig) -> Result<Self> {
        config.reseed.validate()?;
        let slow = match &config.entropy_pool {
            Some(path) => SlowRandomGenerator::system_with_pool(path)?,
            None => SlowRandomGenerator::system_default()?,
        };
        Self::with_slow(Arc::new(slow), config)
    }

    /// Build around an existing slow generator.
    pub fn with_slow(slow: Arc<SlowRandomGenerator>, config: ToolkitConfig) -> Result<Self> {
        let fast =
            FastRandomGenerator::with_policy(Arc::clone(&slow), digest::sha512(), config.reseed.clone())?;
        log::debug!(
            "security context ready: {} entropy sources, protection {:?}",
            slow.source_count(),
            config.protection.mode
        );
        Ok(Self { slow, fast, config })
    }

    /// Lazily built process-wide context with default configuration.
    pub fn global() -> Result<&'static SecurityContext> {
        static GLOBAL: OnceLock<SecurityContext> = OnceLock::new();
        if let Some(ctx) = GLOBAL.get() {
            return Ok(ctx);
        }
        let ctx = Self::new(ToolkitConfig::default())?;
        // A racing initialiser may have won; its instance is kept.
        Ok(GLOBAL.get_or_init(move || ctx))
    }

    pub fn slow(&self) -> &Arc<SlowRandomGenerator> {
        &self.slow
    }

    pub fn fast(&self) -> &FastRandomGenerator {
        &self.fast
    }

    pub fn config(&self) -> &ToolkitConfig {
        &self.config
    }

    /// Wrap `value` with the configured protection mode and alert channel.
    pub fn protect<T: Protectable>(&self, value: T) -> Result<ProtectedContainer<T>> {
        ProtectedContainer::new(
            value,
            self.config.protection.mode,
            self.config.protection.alert.into(),
        )
    }

    /// Dispose both generators. Idempotent.
    pub fn dispose(&self) {
        self.fast.dispose();
        self.slow.dispose();
    }
}
