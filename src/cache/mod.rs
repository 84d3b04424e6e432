//! Two-tier response cache with key normalization.
//!
//! The fast local tier is always present and keeps latency low even when the
//! shared tier is down; the optional remote tier shares cached responses
//! across gateway instances. Reads fall through local → remote and backfill
//! on a remote hit; writes land locally right away and propagate to the
//! remote tier without blocking the caller.
//!
//! | Component | Description |
//! |-----------|-------------|
//! | [`KeyNormalizer`] | Stable digests over the semantic request fields |
//! | [`TieredCache`] | Read-through/write-through two-level cache |
//! | [`RemoteTier`] | Trait for shared cache stores |
//! | [`InMemoryRemoteTier`] | Reference remote-tier implementation |

mod key;
mod local;
mod remote;
mod tiered;

pub use key::{CacheKey, KeyNormalizer};
pub use remote::{InMemoryRemoteTier, RemoteHit, RemoteTier};
pub use tiered::{CacheStats, TieredCache};
