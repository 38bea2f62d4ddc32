//! Call client
//!
//! - [`config`]: configuration and environment loading
//! - [`builder`]: fluent construction
//! - [`manager`]: the [`CallClient`] lifecycle controller
//! - [`events`]: transport event translation
//! - [`types`]: public state types

pub mod builder;
pub mod config;
pub mod events;
pub mod manager;
pub mod types;

mod lifecycle;

pub use builder::ClientBuilder;
pub use config::ClientConfig;
pub use manager::{CallClient, WeakCallClient};
pub use types::CallState;
