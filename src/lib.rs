pub mod client;
pub mod config;
pub mod definitions;
pub mod error;
pub mod logging;
pub mod types;
pub mod workflow;
