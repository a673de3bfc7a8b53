//! Page cache keys.

use std::fmt;

/// Identity of a cached rendered fragment.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FragmentKey {
    /// The post list of the site index, per resolved page number.
    Index { page: u64 },
}

impl FragmentKey {
    /// Low-cardinality label for metrics.
    pub fn kind(&self) -> &'static str {
        match self {
            FragmentKey::Index { .. } => "index",
        }
    }
}

impl fmt::Display for FragmentKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FragmentKey::Index { page } => write!(f, "index_page:{page}"),
        }
    }
}
