//! Configuration management for the routing pipeline.
//!
//! Loading happens in two steps: [`ConfigLoader`] reads a TOML or JSON file
//! into a raw mapping, and [`ConfigValidator`] checks it against the required
//! key list before producing the typed [`AppConfig`].

pub mod loader;
pub mod schema;
pub mod validator;

pub use loader::{ConfigFormat, ConfigLoader};
pub use schema::*;
pub use validator::{ConfigValidator, REQUIRED_KEYS};
