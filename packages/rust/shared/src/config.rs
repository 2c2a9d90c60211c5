//! Application configuration for RecipeForge.
//!
//! User config lives at `~/.recipeforge/recipeforge.toml`.
//! CLI flags override config file values, which override defaults.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::{RecipeForgeError, Result};
use crate::types::{ComponentCategory, MissingPolicy};

/// Default configuration file name.
const CONFIG_FILE_NAME: &str = "recipeforge.toml";

/// Default config directory name under the user's home.
const CONFIG_DIR_NAME: &str = ".recipeforge";

// ---------------------------------------------------------------------------
// Config structs (matching recipeforge.toml schema)
// ---------------------------------------------------------------------------

/// Top-level application config, deserialized from TOML.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AppConfig {
    /// Template locations.
    #[serde(default)]
    pub templates: TemplatesConfig,

    /// Layout cursor constants.
    #[serde(default)]
    pub layout: LayoutConfig,

    /// Recipe build settings.
    #[serde(default)]
    pub build: BuildConfig,

    /// BOM assembly settings.
    #[serde(default)]
    pub bom: BomConfig,

    /// Extra catalog components, overriding built-ins with the same name.
    #[serde(default)]
    pub components: Vec<ComponentEntry>,
}

/// `[templates]` section. Relative paths resolve against `root`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TemplatesConfig {
    /// Directory holding the skeleton, component fragments, and BOM templates.
    #[serde(default = "default_templates_root")]
    pub root: PathBuf,

    /// Base recipe document components are inserted into.
    #[serde(default = "default_skeleton")]
    pub skeleton: PathBuf,

    /// Registry name of the sequence-connector template.
    #[serde(default = "default_sequence_component")]
    pub sequence_component: String,

    /// Outer BOM document.
    #[serde(default = "default_bom_template")]
    pub bom_template: PathBuf,

    /// BOM header fragment.
    #[serde(default = "default_bom_header")]
    pub bom_header: PathBuf,

    /// BOM line-item fragment.
    #[serde(default = "default_bom_line_item")]
    pub bom_line_item: PathBuf,

    /// Material base-object fragment.
    #[serde(default = "default_bom_base")]
    pub bom_base: PathBuf,
}

impl Default for TemplatesConfig {
    fn default() -> Self {
        Self {
            root: default_templates_root(),
            skeleton: default_skeleton(),
            sequence_component: default_sequence_component(),
            bom_template: default_bom_template(),
            bom_header: default_bom_header(),
            bom_line_item: default_bom_line_item(),
            bom_base: default_bom_base(),
        }
    }
}

impl TemplatesConfig {
    /// Resolve a template path against the templates root.
    pub fn resolve(&self, path: impl AsRef<Path>) -> PathBuf {
        let path = path.as_ref();
        if path.is_absolute() {
            path.to_path_buf()
        } else {
            self.root.join(path)
        }
    }

    /// Same config, rooted at a different templates directory.
    pub fn with_root(mut self, root: impl Into<PathBuf>) -> Self {
        self.root = root.into();
        self
    }
}

fn default_templates_root() -> PathBuf {
    PathBuf::from("templates")
}
fn default_skeleton() -> PathBuf {
    PathBuf::from("recipe/Bare.xml")
}
fn default_sequence_component() -> String {
    "sequence".into()
}
fn default_bom_template() -> PathBuf {
    PathBuf::from("bom/template.xml")
}
fn default_bom_header() -> PathBuf {
    PathBuf::from("bom/header.xml")
}
fn default_bom_line_item() -> PathBuf {
    PathBuf::from("bom/line_item.xml")
}
fn default_bom_base() -> PathBuf {
    PathBuf::from("bom/base.xml")
}

/// `[layout]` section.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct LayoutConfig {
    /// x coordinate every row starts at.
    #[serde(default = "default_base_x")]
    pub base_x: i64,

    /// y coordinate before the first row break.
    #[serde(default = "default_base_y")]
    pub base_y: i64,

    /// Label top of the first fragment.
    #[serde(default = "default_label_top")]
    pub label_top: i64,

    /// Start a new row every this many fragments (0 = never).
    #[serde(default = "default_break_every")]
    pub break_every: u32,

    /// Horizontal distance between fragments in a row.
    #[serde(default = "default_step_width")]
    pub step_width: i64,

    /// Vertical distance between rows.
    #[serde(default = "default_row_height")]
    pub row_height: i64,

    /// Label top increment per fragment.
    #[serde(default = "default_label_step")]
    pub label_step: i64,

    /// Label left sits this far left of the fragment's x.
    #[serde(default = "default_label_offset")]
    pub label_offset: i64,
}

impl Default for LayoutConfig {
    fn default() -> Self {
        Self {
            base_x: default_base_x(),
            base_y: default_base_y(),
            label_top: default_label_top(),
            break_every: default_break_every(),
            step_width: default_step_width(),
            row_height: default_row_height(),
            label_step: default_label_step(),
            label_offset: default_label_offset(),
        }
    }
}

fn default_base_x() -> i64 {
    300
}
fn default_base_y() -> i64 {
    100
}
fn default_label_top() -> i64 {
    100
}
fn default_break_every() -> u32 {
    3
}
fn default_step_width() -> i64 {
    180
}
fn default_row_height() -> i64 {
    120
}
fn default_label_step() -> i64 {
    49
}
fn default_label_offset() -> i64 {
    18
}

/// `[build]` section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BuildConfig {
    /// `objType` of the node components are inserted into.
    #[serde(default = "default_operation_obj_type")]
    pub operation_obj_type: String,

    /// `objType` of the node BOMs are attached to.
    #[serde(default = "default_operation_obj_type")]
    pub attach_obj_type: String,

    /// What to do with step names the registry does not know.
    #[serde(default)]
    pub missing_component: MissingPolicy,

    /// Output path used when none is given on the command line.
    #[serde(default = "default_output")]
    pub output: PathBuf,
}

impl Default for BuildConfig {
    fn default() -> Self {
        Self {
            operation_obj_type: default_operation_obj_type(),
            attach_obj_type: default_operation_obj_type(),
            missing_component: MissingPolicy::default(),
            output: default_output(),
        }
    }
}

fn default_operation_obj_type() -> String {
    "PM_OPERATION".into()
}
fn default_output() -> PathBuf {
    PathBuf::from("assisted_recipe.xml")
}

/// `[bom]` section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BomConfig {
    #[serde(default = "default_level_id")]
    pub level_id: String,

    #[serde(default = "default_level_name")]
    pub level_name: String,

    #[serde(default = "default_location_id")]
    pub location_id: String,

    #[serde(default = "default_location_name")]
    pub location_name: String,

    /// Version stamped on headers, line items, and base objects.
    #[serde(default = "default_version")]
    pub version: String,

    /// User recorded as `lastChangedBy` on base objects.
    #[serde(default = "default_changed_by")]
    pub changed_by: String,

    /// Prefix of generated BOM ids when no name is given.
    #[serde(default = "default_id_prefix")]
    pub id_prefix: String,

    /// What to do with material ids the metadata source does not know.
    #[serde(default)]
    pub missing_material: MissingPolicy,
}

impl Default for BomConfig {
    fn default() -> Self {
        Self {
            level_id: default_level_id(),
            level_name: default_level_name(),
            location_id: default_location_id(),
            location_name: default_location_name(),
            version: default_version(),
            changed_by: default_changed_by(),
            id_prefix: default_id_prefix(),
            missing_material: MissingPolicy::default(),
        }
    }
}

fn default_level_id() -> String {
    "10".into()
}
fn default_level_name() -> String {
    "Master".into()
}
fn default_location_id() -> String {
    "4".into()
}
fn default_location_name() -> String {
    "Herndon".into()
}
fn default_version() -> String {
    "1.001".into()
}
fn default_changed_by() -> String {
    "administrator".into()
}
fn default_id_prefix() -> String {
    "RECIPEFORGE_BOM_".into()
}

/// `[[components]]` entry: an extra catalog component.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ComponentEntry {
    /// Step name used in build requests.
    pub name: String,
    /// Fragment file, relative to the templates root.
    pub path: PathBuf,
    /// Human-readable description.
    #[serde(default)]
    pub description: String,
    /// Catalog category.
    #[serde(default = "default_category")]
    pub category: ComponentCategory,
}

fn default_category() -> ComponentCategory {
    ComponentCategory::Root
}

// ---------------------------------------------------------------------------
// Config loading
// ---------------------------------------------------------------------------

/// Get the path to the config directory (`~/.recipeforge/`).
pub fn config_dir() -> Result<PathBuf> {
    let home = dirs::home_dir()
        .ok_or_else(|| RecipeForgeError::config("could not determine home directory"))?;
    Ok(home.join(CONFIG_DIR_NAME))
}

/// Get the path to the config file (`~/.recipeforge/recipeforge.toml`).
pub fn config_file_path() -> Result<PathBuf> {
    Ok(config_dir()?.join(CONFIG_FILE_NAME))
}

/// Load the application config from disk. Returns defaults if the file does not exist.
pub fn load_config() -> Result<AppConfig> {
    let path = config_file_path()?;

    if !path.exists() {
        tracing::debug!(?path, "config file not found, using defaults");
        return Ok(AppConfig::default());
    }

    load_config_from(&path)
}

/// Load the application config from a specific file path.
pub fn load_config_from(path: &Path) -> Result<AppConfig> {
    let content = std::fs::read_to_string(path).map_err(|e| RecipeForgeError::io(path, e))?;

    let config: AppConfig = toml::from_str(&content).map_err(|e| {
        RecipeForgeError::config(format!("failed to parse {}: {e}", path.display()))
    })?;
    validate_config(&config)?;
    Ok(config)
}

/// Create the config directory and write a default config file.
/// Returns the path to the created file.
pub fn init_config() -> Result<PathBuf> {
    let dir = config_dir()?;
    std::fs::create_dir_all(&dir).map_err(|e| RecipeForgeError::io(&dir, e))?;

    let path = dir.join(CONFIG_FILE_NAME);
    let config = AppConfig::default();
    let content =
        toml::to_string_pretty(&config).map_err(|e| RecipeForgeError::config(e.to_string()))?;

    std::fs::write(&path, content).map_err(|e| RecipeForgeError::io(&path, e))?;
    tracing::info!(?path, "created default config file");

    Ok(path)
}

/// Reject settings the engine cannot work with.
pub fn validate_config(config: &AppConfig) -> Result<()> {
    if config.build.operation_obj_type.trim().is_empty() {
        return Err(RecipeForgeError::config(
            "build.operation_obj_type must not be empty",
        ));
    }
    if config.build.attach_obj_type.trim().is_empty() {
        return Err(RecipeForgeError::config(
            "build.attach_obj_type must not be empty",
        ));
    }

    let mut seen = std::collections::HashSet::new();
    for entry in &config.components {
        if entry.name.trim().is_empty() {
            return Err(RecipeForgeError::config("component entry with an empty name"));
        }
        if !seen.insert(entry.name.as_str()) {
            return Err(RecipeForgeError::config(format!(
                "component '{}' is declared more than once",
                entry.name
            )));
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_serializes() {
        let config = AppConfig::default();
        let toml_str = toml::to_string_pretty(&config).expect("serialize default config");
        assert!(toml_str.contains("skeleton"));
        assert!(toml_str.contains("PM_OPERATION"));
        assert!(toml_str.contains("missing_component = \"skip\""));
    }

    #[test]
    fn config_roundtrip() {
        let config = AppConfig::default();
        let toml_str = toml::to_string_pretty(&config).expect("serialize");
        let parsed: AppConfig = toml::from_str(&toml_str).expect("deserialize");
        assert_eq!(parsed.layout, LayoutConfig::default());
        assert_eq!(parsed.bom.location_name, "Herndon");
        assert_eq!(parsed.build.missing_component, MissingPolicy::Skip);
    }

    #[test]
    fn config_with_components_and_policy() {
        let toml_str = r#"
[build]
missing_component = "abort"

[layout]
break_every = 4

[[components]]
name = "weigh"
path = "components/weigh.xml"
description = "Weigh a material"
"#;
        let config: AppConfig = toml::from_str(toml_str).expect("parse");
        assert_eq!(config.build.missing_component, MissingPolicy::Abort);
        assert_eq!(config.layout.break_every, 4);
        assert_eq!(config.layout.step_width, 180);
        assert_eq!(config.components.len(), 1);
        assert_eq!(config.components[0].category, ComponentCategory::Root);
        assert!(validate_config(&config).is_ok());
    }

    #[test]
    fn duplicate_components_rejected() {
        let toml_str = r#"
[[components]]
name = "weigh"
path = "a.xml"

[[components]]
name = "weigh"
path = "b.xml"
"#;
        let config: AppConfig = toml::from_str(toml_str).expect("parse");
        let err = validate_config(&config).unwrap_err();
        assert!(err.to_string().contains("declared more than once"));
    }

    #[test]
    fn templates_resolve_against_root() {
        let templates = TemplatesConfig::default().with_root("/opt/forge");
        assert_eq!(
            templates.resolve(&templates.skeleton),
            PathBuf::from("/opt/forge/recipe/Bare.xml")
        );
        assert_eq!(
            templates.resolve("/abs/seq.xml"),
            PathBuf::from("/abs/seq.xml")
        );
    }
}
