//! Page cache configuration.

use std::num::NonZeroUsize;
use std::time::Duration;

const DEFAULT_INDEX_TTL: Duration = Duration::from_secs(20);
const DEFAULT_MAX_ENTRIES: NonZeroUsize = NonZeroUsize::new(256).unwrap();

#[derive(Debug, Clone)]
pub struct CacheConfig {
    /// When false every lookup is a miss and nothing is stored.
    pub enabled: bool,
    /// Lifetime of the cached index post-list fragment.
    pub index_ttl: Duration,
    /// Upper bound on stored fragments; least recently used go first.
    pub max_entries: NonZeroUsize,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            index_ttl: DEFAULT_INDEX_TTL,
            max_entries: DEFAULT_MAX_ENTRIES,
        }
    }
}

impl From<&crate::config::CacheSettings> for CacheConfig {
    fn from(settings: &crate::config::CacheSettings) -> Self {
        Self {
            enabled: settings.enabled,
            index_ttl: settings.index_ttl,
            max_entries: settings.max_entries,
        }
    }
}

impl CacheConfig {
    pub fn disabled() -> Self {
        Self {
            enabled: false,
            ..Self::default()
        }
    }
}
