// Configuration loading

pub mod error;
pub mod keys;
pub mod resolve;
pub mod settings;

pub use error::ConfigError;
pub use keys::{get_api_key, KeyLookup, KeySource};
pub use resolve::{BackendStatus, ResolvedBackend};
pub use settings::{BackendKind, Settings};
