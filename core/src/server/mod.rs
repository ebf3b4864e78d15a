pub mod bridge_server;
pub mod connection_manager;

pub use bridge_server::BridgeServer;
pub use connection_manager::ConnectionManager;
