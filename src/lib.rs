pub mod cli;
pub mod config;
pub mod editor;
pub mod model;
pub mod search;
pub mod store;
pub mod tags;

pub use config::{AppConfig, ConfigLoader, ConfigPaths};
