use std::sync::atomic::{AtomicBool, Ordering};

use crate::sampler::Identity;

/// Runtime on/off switch consulted at the start of every tick.
pub trait MonitorSwitch: Send + Sync {
    fn is_monitor_enabled(&self) -> bool;
}

/// A switch that can be flipped at runtime.
#[derive(Debug)]
pub struct EnabledFlag(AtomicBool);

impl EnabledFlag {
    pub fn new(enabled: bool) -> Self {
        Self(AtomicBool::new(enabled))
    }

    pub fn set(&self, enabled: bool) {
        self.0.store(enabled, Ordering::Relaxed);
    }
}

impl MonitorSwitch for EnabledFlag {
    fn is_monitor_enabled(&self) -> bool {
        self.0.load(Ordering::Relaxed)
    }
}

/// Supplies the identity columns of each record.
pub trait IdentitySource: Send + Sync {
    fn identity(&self) -> Identity;
}

/// An identity fixed at startup.
#[derive(Debug, Clone, Default)]
pub struct StaticIdentity(pub Identity);

impl IdentitySource for StaticIdentity {
    fn identity(&self) -> Identity {
        self.0.clone()
    }
}
