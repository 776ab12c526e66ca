//! # McpGate Core Library
//!
//! Shared building blocks for the gateway and the server binary.
//!
//! ## Modules
//!
//! - `branding` - Product naming and protocol-level constants
//! - `config` - Environment-driven gateway and identity provider configuration

pub mod branding;
pub mod config;

pub use config::{ConfigError, GatewaySettings, ProviderConfig, ProviderKind};
