pub mod client;
pub mod errors;
pub mod publisher;
pub mod types;

pub use client::MastodonClient;
pub use errors::PublishError;
pub use publisher::{DryRunPublisher, MastodonPublisher, Outbox, Publisher};
