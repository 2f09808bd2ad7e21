//! A concurrent map whose entries carry an optional deadline and are removed in the
//! background once it passes.
//!
//! ```no_run
//! use expiry_map::prelude::*;
//! use std::time::Duration;
//!
//! # #[tokio::main]
//! # async fn main() -> anyhow::Result<()> {
//! let config = ExpiryConfig::default()
//!     .with_default_ttl(Ttl::secs(1))
//!     .with_poll_interval(Duration::from_millis(100));
//! let sessions = ExpiringMap::new(config);
//!
//! sessions.insert("alice", 1);
//! sessions.set_with_ttl("bob", 2, Ttl::Never);
//! sessions.on_key_expired(|key: &&str| println!("{key} expired"));
//!
//! tokio::time::sleep(Duration::from_millis(1300)).await;
//! assert!(!sessions.contains_key(&"alice"));
//!
//! sessions.close().await?;
//! # Ok(())
//! # }
//! ```
pub mod config;
pub mod domains;
pub mod macros;
mod types;

pub use config::ExpiryConfig;
pub use domains::error::ExpiryError;
pub use domains::expiry::{ExpiringMap, Ttl, WeakExpiringMap};

pub mod prelude {
    pub use crate::config::ExpiryConfig;
    pub use crate::domains::error::ExpiryError;
    pub use crate::domains::expiry::{ExpiringMap, Ttl, WeakExpiringMap};
    pub use tokio;
}
