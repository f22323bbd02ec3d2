mod resolve;
mod types;

pub use self::resolve::{ConfigSource, load_config, resolve_config, resolve_config_path};
pub use self::types::*;
