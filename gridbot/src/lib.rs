pub mod aemo;
pub mod config;
pub mod mastodon;
pub mod metrics;
pub mod peak;
pub mod region;

pub mod error;
pub mod logger;
