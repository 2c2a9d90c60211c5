//! Component registry: step name → fragment template.
//!
//! The built-in catalog ships with the templates directory; `[[components]]`
//! entries in the config add to it or replace built-ins of the same name.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use tracing::debug;

use recipeforge_shared::{AppConfig, ComponentCategory, RecipeForgeError, Result};

/// One catalog entry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Component {
    pub name: String,
    /// Fragment file, already resolved against the templates root.
    pub location: PathBuf,
    pub category: ComponentCategory,
    pub description: String,
}

const BUILTIN: &[(&str, &str, ComponentCategory, &str)] = &[
    (
        "operator_instruction",
        "components/operator_instruction.xml",
        ComponentCategory::Root,
        "Show an instruction and wait for acknowledgement",
    ),
    (
        "record_text",
        "components/record_text.xml",
        ComponentCategory::Root,
        "Prompt for and record a free-text value",
    ),
    (
        "manual_finish",
        "components/manual_finish.xml",
        ComponentCategory::Root,
        "Manual confirmation that closes the operation",
    ),
    (
        "base_operator_instruction",
        "components/base_components/operator_instruction.xml",
        ComponentCategory::Base,
        "Bare operator instruction",
    ),
    (
        "base_record_text",
        "components/base_components/record_text.xml",
        ComponentCategory::Base,
        "Bare record text",
    ),
    (
        "sequence",
        "components/sequence.xml",
        ComponentCategory::Base,
        "Sequence connector between two components",
    ),
];

/// Read-only after construction; share it by reference.
#[derive(Debug, Clone, Default)]
pub struct ComponentRegistry {
    entries: BTreeMap<String, Component>,
}

impl ComponentRegistry {
    /// The built-in catalog, rooted at `templates_root`.
    pub fn builtin(templates_root: &Path) -> Self {
        let entries = BUILTIN
            .iter()
            .map(|&(name, path, category, description)| {
                let component = Component {
                    name: name.to_string(),
                    location: templates_root.join(path),
                    category,
                    description: description.to_string(),
                };
                (name.to_string(), component)
            })
            .collect();
        Self { entries }
    }

    /// Built-ins plus the `[[components]]` entries of `config`.
    pub fn from_config(config: &AppConfig) -> Self {
        let mut registry = Self::builtin(&config.templates.root);
        for entry in &config.components {
            let replaced = registry.register(Component {
                name: entry.name.clone(),
                location: config.templates.resolve(&entry.path),
                category: entry.category,
                description: entry.description.clone(),
            });
            debug!(component = %entry.name, replaced, "registered configured component");
        }
        registry
    }

    /// Add or replace an entry. Returns `true` when a previous entry was replaced.
    pub fn register(&mut self, component: Component) -> bool {
        self.entries
            .insert(component.name.clone(), component)
            .is_some()
    }

    pub fn resolve(&self, name: &str) -> Result<&Component> {
        self.entries
            .get(name)
            .ok_or_else(|| RecipeForgeError::ComponentNotFound {
                name: name.to_string(),
            })
    }

    pub fn contains(&self, name: &str) -> bool {
        self.entries.contains_key(name)
    }

    /// Entries sorted by name.
    pub fn entries(&self) -> impl Iterator<Item = &Component> {
        self.entries.values()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
