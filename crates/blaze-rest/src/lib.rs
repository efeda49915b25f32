//! REST collaborators for the blaze gateway
//!
//! - `config` - ProjectConfig, RestAuthConfig, DatabaseConfig
//! - `auth_client` - IdentityToolkitClient (implements `AuthProvider`)
//! - `database_client` - RestDatabase (implements `RealtimeStore`)
//! - `sse` - incremental event-stream parser and snapshot folding
//! - `models` - wire types

pub mod auth_client;
pub mod config;
pub mod database_client;
mod http;
pub mod models;
pub mod sse;

pub use auth_client::{parse_auth_error, IdentityToolkitClient};
pub use config::{ConfigError, DatabaseConfig, ProjectConfig, RestAuthConfig, DEFAULT_AUTH_URL};
pub use database_client::RestDatabase;
