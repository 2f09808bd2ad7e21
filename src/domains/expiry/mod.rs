mod callbacks;
mod controller;
mod index;
pub mod map;
mod reaper;
mod store;
pub mod ttl;

pub use map::{ExpiringMap, WeakExpiringMap};
pub use ttl::Ttl;
