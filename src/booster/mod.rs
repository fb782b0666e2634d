pub mod config;
pub mod core;
pub mod setters;

pub use self::config::{BoosterConfig, ModelIO};
pub use self::core::GradientBooster;
