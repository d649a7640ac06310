//! # Global provider configuration.
//!
//! Provides [`ProviderConfig`] centralized settings for the snapshot provider.
//!
//! Config is consumed once at [`SnapshotProvider::load`](crate::SnapshotProvider::load)
//! and shared by the components it wires together (updater, subscribers).
//!
//! ## Sentinel values
//! - `debounce = 0s` → publish on the next timer tick (no coalescing window)
//! - channel capacities are clamped to a minimum of 1

use std::time::Duration;

/// Global configuration for the snapshot provider runtime.
///
/// ## Field semantics
/// - `debounce`: quiet period after the *last* snapshot change before one
///   "snapshot changed" notification is delivered (burst coalescing)
/// - `channel_capacity`: per-subscriber fan-in queue size for rule batches
/// - `notify_capacity`: ring buffer size of the snapshot notification channel
///
/// The debounce window is a tuning parameter, not a contract; consumers must
/// not rely on its exact value.
#[derive(Clone, Debug)]
pub struct ProviderConfig {
    /// Quiet period before a burst of snapshot updates is published as one
    /// notification.
    ///
    /// Tree-update consumers are expensive to notify; bursts of evaluation or
    /// build activity should collapse into a single redraw.
    pub debounce: Duration,

    /// Capacity of each subscriber's merged rule-batch channel.
    ///
    /// Producers suspend (never block a worker thread) when the consumer side
    /// falls behind. Minimum value is 1 (clamped).
    pub channel_capacity: usize,

    /// Capacity of the broadcast channel carrying snapshot notifications.
    ///
    /// Slow consumers that lag behind more than `notify_capacity` messages
    /// observe `Lagged` and skip older snapshots; only the latest matters.
    pub notify_capacity: usize,
}

impl ProviderConfig {
    /// Returns the fan-in channel capacity clamped to a minimum of 1.
    #[inline]
    pub fn channel_capacity_clamped(&self) -> usize {
        self.channel_capacity.max(1)
    }

    /// Returns the notification channel capacity clamped to a minimum of 1.
    #[inline]
    pub fn notify_capacity_clamped(&self) -> usize {
        self.notify_capacity.max(1)
    }
}

impl Default for ProviderConfig {
    /// Default configuration:
    ///
    /// - `debounce = 250ms` (matches observed tree-update cadence)
    /// - `channel_capacity = 64`
    /// - `notify_capacity = 16`
    fn default() -> Self {
        Self {
            debounce: Duration::from_millis(250),
            channel_capacity: 64,
            notify_capacity: 16,
        }
    }
}
