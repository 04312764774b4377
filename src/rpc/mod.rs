pub mod client;
pub mod handlers;
pub mod server;
pub mod types;

pub use client::RpcCoordinator;
pub use server::RpcServer;
