//! Cache configuration.
//!
//! Expiration windows for the derived views and sizing of the in-process
//! backend. Built from the validated [`crate::config::CacheSettings`], which
//! own the `[cache]` table of `relcache.toml`.

use std::num::NonZeroUsize;
use std::time::Duration;

const DEFAULT_VIEW_TTL_SECS: u64 = 60 * 60 * 12;
const DEFAULT_MEMORY_CAPACITY: usize = 10_000;

#[derive(Debug, Clone)]
pub struct CacheConfig {
    /// Expiration of cached follower-id lists, in seconds.
    pub follower_ttl_secs: u64,
    /// Expiration of cached subscriber-id lists, in seconds.
    pub subscriber_ttl_secs: u64,
    /// Maximum entries held by the in-process backend.
    pub memory_capacity: usize,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            follower_ttl_secs: DEFAULT_VIEW_TTL_SECS,
            subscriber_ttl_secs: DEFAULT_VIEW_TTL_SECS,
            memory_capacity: DEFAULT_MEMORY_CAPACITY,
        }
    }
}

impl From<&crate::config::CacheSettings> for CacheConfig {
    fn from(settings: &crate::config::CacheSettings) -> Self {
        Self {
            follower_ttl_secs: settings.follower_ttl.as_secs(),
            subscriber_ttl_secs: settings.subscriber_ttl.as_secs(),
            memory_capacity: settings.memory_capacity.get(),
        }
    }
}

impl CacheConfig {
    pub fn follower_ttl(&self) -> Duration {
        Duration::from_secs(self.follower_ttl_secs)
    }

    pub fn subscriber_ttl(&self) -> Duration {
        Duration::from_secs(self.subscriber_ttl_secs)
    }

    /// Returns the memory capacity as NonZeroUsize, clamping to 1 if zero.
    pub fn memory_capacity_non_zero(&self) -> NonZeroUsize {
        NonZeroUsize::new(self.memory_capacity).unwrap_or(NonZeroUsize::MIN)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_values() {
        let config = CacheConfig::default();
        assert_eq!(config.follower_ttl(), Duration::from_secs(43_200));
        assert_eq!(config.subscriber_ttl(), Duration::from_secs(43_200));
        assert_eq!(config.memory_capacity, 10_000);
    }

    #[test]
    fn non_zero_clamps_to_min() {
        let config = CacheConfig {
            memory_capacity: 0,
            ..Default::default()
        };
        assert_eq!(config.memory_capacity_non_zero().get(), 1);
    }
}
