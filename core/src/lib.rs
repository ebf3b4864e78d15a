//! DocBridge - MongoDB command bridge for HMI clients

pub mod command;
pub mod config;
pub mod db;
pub mod error;
pub mod network;
pub mod server;

pub use command::{CommandDispatcher, CommandRequest, CommandResponse, StatusCode};
pub use config::{Config, MongoConfig, ServerConfig};
pub use db::{DataAccess, SlotId};
pub use error::{BridgeError, BridgeResult};
pub use network::NetworkConnection;
pub use server::BridgeServer;
