//! Result cache for registry queries.
//!
//! Search results and model details are cached as serialized bytes under a
//! namespace plus a key derived from the normalized query. Expiry is lazy:
//! an expired entry is dropped when it is next read.

mod clock;
mod memory;
mod traits;

pub use clock::{Clock, ManualClock, SystemClock};
pub use memory::MemoryCache;
pub use traits::{cache_key, CacheBackend, CacheEntry};

/// Namespaces used by the registry client.
pub struct CacheNamespace;

impl CacheNamespace {
    pub const HF_SEARCH: &'static str = "hf:search";
    pub const HF_MODEL: &'static str = "hf:model";
    pub const DIFFUSION_SEARCH: &'static str = "comfyui:search";
}
