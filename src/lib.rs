pub mod arena;
pub mod builder;
pub mod client;
pub mod config;
pub mod credentials;
pub mod error;
pub mod metrics;
pub mod round;
pub mod rpc;
pub mod types;

pub use types::*;
