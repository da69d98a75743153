//! # Supervisor configuration.
//!
//! Provides [`Config`], the settings a [`SupervisorBuilder`](crate::SupervisorBuilder)
//! uses when it has to create infrastructure on the caller's behalf.
//!
//! ## Sentinel values
//! - `bus_capacity = 0` → clamped to 1
//! - `subscriber_capacity = 0` → use each subscriber's own preference

use crate::subscribers::Subscribe;

/// Configuration for supervisors built through the builder.
///
/// ## Field semantics
/// - `bus_capacity`: ring buffer size of the private bus created when no shared
///   [`Bus`](crate::Bus) is supplied (min 1)
/// - `subscriber_capacity`: queue size forced on every subscriber attached via
///   the builder (`0` = use [`Subscribe::queue_capacity`])
#[derive(Clone, Debug)]
pub struct Config {
    /// Capacity of the event bus broadcast channel ring buffer.
    ///
    /// Receivers that lag behind more than `bus_capacity` events observe
    /// `Lagged` and skip older items.
    pub bus_capacity: usize,

    /// Per-subscriber queue capacity override.
    pub subscriber_capacity: usize,
}

impl Config {
    /// Returns a bus capacity clamped to a minimum of 1.
    #[inline]
    pub fn bus_capacity_clamped(&self) -> usize {
        self.bus_capacity.max(1)
    }

    /// Returns the queue capacity to use for `sub`.
    #[inline]
    pub fn queue_capacity_for(&self, sub: &dyn Subscribe) -> usize {
        match self.subscriber_capacity {
            0 => sub.queue_capacity().max(1),
            n => n,
        }
    }
}

impl Default for Config {
    /// Default configuration:
    ///
    /// - `bus_capacity = 1024`
    /// - `subscriber_capacity = 0` (subscriber decides)
    fn default() -> Self {
        Self {
            bus_capacity: 1024,
            subscriber_capacity: 0,
        }
    }
}
