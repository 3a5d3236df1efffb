//! Configuration loading and dependency wiring.

mod dependencies;
mod file;
mod settings;

pub use dependencies::Dependencies;
pub use file::{load_config, resolve_config_path};
pub use settings::InvocationSettings;
