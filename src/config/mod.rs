// src/config/mod.rs
pub mod settings;

pub use settings::{MediaSettings, Settings, DEFAULT_CONFIG_PATH, ENV_CONFIG_PATH};
