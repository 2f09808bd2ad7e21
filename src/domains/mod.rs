pub mod error;
pub mod expiry;
