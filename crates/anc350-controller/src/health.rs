use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};

use tracing::{error, info};

use crate::config::HealthConfig;

/// Consecutive-failure counter for one controller link.
///
/// Single dropped replies are expected on a busy link, so the persistent
/// comm-error flag is only raised once the count exceeds the threshold.
/// Any successful transaction resets both.
#[derive(Debug)]
pub struct CommHealth {
    failures: AtomicU32,
    flagged: AtomicBool,
    threshold: u32,
}

impl CommHealth {
    pub fn new(config: &HealthConfig) -> Self {
        Self {
            failures: AtomicU32::new(0),
            flagged: AtomicBool::new(false),
            threshold: config.comm_error_threshold,
        }
    }

    /// Count a failed transaction; returns the new count.
    pub fn record_failure(&self) -> u32 {
        let count = self
            .failures
            .fetch_update(Ordering::AcqRel, Ordering::Acquire, |n| {
                Some(n.saturating_add(1))
            })
            .unwrap_or_else(|n| n)
            .saturating_add(1);
        if count > self.threshold && !self.flagged.swap(true, Ordering::AcqRel) {
            error!(
                failures = count,
                threshold = self.threshold,
                "persistent communication error"
            );
        }
        count
    }

    /// Count a successful transaction.
    pub fn record_success(&self) {
        self.failures.store(0, Ordering::Release);
        if self.flagged.swap(false, Ordering::AcqRel) {
            info!("communication restored");
        }
    }

    pub fn failures(&self) -> u32 {
        self.failures.load(Ordering::Acquire)
    }

    /// Whether the persistent comm-error flag is raised.
    pub fn flagged(&self) -> bool {
        self.flagged.load(Ordering::Acquire)
    }

    pub fn threshold(&self) -> u32 {
        self.threshold
    }
}

impl Default for CommHealth {
    fn default() -> Self {
        Self::new(&HealthConfig::default())
    }
}
