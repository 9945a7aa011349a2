pub mod client;
pub mod headers;

pub use client::Fetcher;
pub use headers::{HeaderProfile, RequestKind};
