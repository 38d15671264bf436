pub mod config;
pub mod error;
pub mod gateway;
pub mod handlers;
pub mod middleware;
pub mod observability;
pub mod pages;
pub mod secrets;
pub mod server;

pub use config::{AppConfig, GatewayConfig, LoggingConfig, ServerConfig, StoreBackend, StoreConfig};
pub use error::GatewayError;
pub use gateway::AccessState;
pub use observability::init_tracing;
pub use secrets::{Secrets, SecretsError};
pub use server::{AppState, NetmonServer, ServerBuilder, build_app, build_store};
