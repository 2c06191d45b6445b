mod appdir;
mod config;
mod textblock;

pub use appdir::{
    config_root_in, migrate_legacy_dir, resolve_config_root, CURRENT_DIR_NAME, LEGACY_DIR_NAME,
};
pub use config::{config_path, load_config, parse_config, AppConfig, LogConfig, SetupDefaults};
pub use textblock::{locate, remove, upsert, BlockEdit, Span, TextBlockError};

#[cfg(test)]
mod tests;
