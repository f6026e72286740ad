//! # labswitch-settings
//!
//! Process configuration, read once from environment variables at startup.
//!
//! Every required variable is checked before any component is constructed;
//! all missing names are reported together in a single
//! [`SettingsError::Missing`]. Optional variables fall back to defaults, but
//! a present-and-malformed optional value is an error rather than being
//! ignored.
//!
//! # Usage
//!
//! ```no_run
//! use labswitch_settings::Settings;
//!
//! let settings = Settings::from_env().expect("invalid configuration");
//! println!("health port: {}", settings.server.health_port);
//! ```

#![deny(unsafe_code)]

pub mod errors;
pub mod loader;
pub mod types;

pub use errors::{Result, SettingsError};
pub use loader::env_vars;
pub use types::*;
