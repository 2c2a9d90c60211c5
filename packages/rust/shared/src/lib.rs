//! Shared types, error model, and configuration for RecipeForge.
//!
//! This crate is the foundation depended on by all other RecipeForge crates.
//! It provides:
//! - [`RecipeForgeError`]: the unified error type
//! - Domain types ([`ComponentCategory`], [`MissingPolicy`], chain sentinels, [`schema`] names)
//! - Configuration ([`AppConfig`], config loading)

pub mod config;
pub mod error;
pub mod types;

// Re-export public API at crate root for ergonomic imports.
pub use config::{
    AppConfig, BomConfig, BuildConfig, ComponentEntry, LayoutConfig, TemplatesConfig, config_dir,
    config_file_path, init_config, load_config, load_config_from, validate_config,
};
pub use error::{RecipeForgeError, Result, ResultExt};
pub use types::{CHAIN_END, CHAIN_START, ComponentCategory, FIRST_COMP_NO, MissingPolicy, schema};
