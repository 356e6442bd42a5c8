//! Schema stream consumption and topology refresh

pub mod client;
pub mod details;
pub mod refresh;

pub use client::{Cancellation, StreamService};
pub use details::HttpDetailSource;
pub use refresh::RefreshService;
