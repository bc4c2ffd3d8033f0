pub mod client;
pub mod errors;
pub mod poller;
pub mod types;

pub use client::AemoClient;
pub use errors::AemoError;
pub use types::*;
