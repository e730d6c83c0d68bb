//! Configuration loading, validation, and env substitution.
//!
//! Config files: `tryon.toml`, `tryon.yaml`, or `tryon.json`
//! Searched in `./` then `~/.config/tryon/`.
//!
//! Supports `${ENV_VAR}` substitution in all string values.

pub mod env_subst;
pub mod loader;
pub mod schema;
pub mod template;
pub mod validate;

pub use {
    loader::{
        apply_env_overrides, config_dir, data_dir, discover_and_load,
        find_or_default_config_path, load_config, save_config, set_config_dir, set_data_dir,
    },
    schema::{
        CacheBackend, CacheConfig, ExtractorConfig, Locator, LocatorKind, ServiceConfig,
        TryonConfig,
    },
    validate::{Diagnostic, Severity, ValidationResult},
};
