//! Material metadata: the record shape, the lookup trait, and a JSON catalog.

use std::collections::HashMap;
use std::path::Path;

use serde::{Deserialize, Deserializer, Serialize};
use tracing::{debug, instrument};

use recipeforge_shared::{RecipeForgeError, Result};

// ---------------------------------------------------------------------------
// MaterialRecord
// ---------------------------------------------------------------------------

/// Metadata of one material as delivered by the material master.
///
/// Every field is optional. Empty strings deserialize as absent, and numeric
/// values are accepted wherever a string is expected.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub struct MaterialRecord {
    #[serde(default, deserialize_with = "lenient_string")]
    pub material_id: Option<String>,

    #[serde(default, deserialize_with = "lenient_string")]
    pub material_desc: Option<String>,

    /// ISO-8601 or `/Date(<millis>)/`.
    #[serde(default, deserialize_with = "lenient_string")]
    pub last_changed_date: Option<String>,

    #[serde(default, deserialize_with = "lenient_string")]
    pub inventory_uom: Option<String>,

    #[serde(default, deserialize_with = "lenient_string")]
    pub default_qc_status: Option<String>,

    #[serde(default, deserialize_with = "lenient_string")]
    pub inventory_tracking: Option<String>,

    #[serde(default, deserialize_with = "lenient_string")]
    pub storage_class: Option<String>,

    #[serde(default, deserialize_with = "lenient_flag")]
    pub active_flag: Option<bool>,

    #[serde(default, deserialize_with = "lenient_flag")]
    pub aggregate_flag: Option<bool>,
}

impl MaterialRecord {
    /// A record with only its id set.
    pub fn with_id(id: impl Into<String>) -> Self {
        Self {
            material_id: Some(id.into()),
            ..Self::default()
        }
    }
}

fn lenient_string<'de, D>(deserializer: D) -> std::result::Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Option::<serde_json::Value>::deserialize(deserializer)?;
    Ok(match value {
        Some(serde_json::Value::String(s)) => Some(s.trim().to_string()).filter(|s| !s.is_empty()),
        Some(serde_json::Value::Number(n)) => Some(n.to_string()),
        Some(serde_json::Value::Bool(b)) => Some(b.to_string()),
        _ => None,
    })
}

fn lenient_flag<'de, D>(deserializer: D) -> std::result::Result<Option<bool>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Option::<serde_json::Value>::deserialize(deserializer)?;
    Ok(match value {
        Some(serde_json::Value::Bool(b)) => Some(b),
        Some(serde_json::Value::Number(n)) => n.as_i64().map(|n| n != 0),
        Some(serde_json::Value::String(s)) => match s.trim().to_ascii_lowercase().as_str() {
            "true" | "t" | "yes" | "y" | "1" => Some(true),
            "false" | "f" | "no" | "n" | "0" => Some(false),
            _ => None,
        },
        _ => None,
    })
}

// ---------------------------------------------------------------------------
// MaterialSource
// ---------------------------------------------------------------------------

/// Anything that can look up material metadata by id.
///
/// `Ok(None)` means the material is unknown; `Err` means the lookup itself
/// failed and aborts the assembly.
pub trait MaterialSource {
    fn get_material(&self, id: &str) -> Result<Option<MaterialRecord>>;
}

impl MaterialSource for HashMap<String, MaterialRecord> {
    fn get_material(&self, id: &str) -> Result<Option<MaterialRecord>> {
        Ok(self.get(id).cloned())
    }
}

/// Resolves every id to an otherwise empty record, so the BOM carries the
/// template defaults for everything but the id.
#[derive(Debug, Clone, Copy, Default)]
pub struct BlankMaterials;

impl MaterialSource for BlankMaterials {
    fn get_material(&self, id: &str) -> Result<Option<MaterialRecord>> {
        Ok(Some(MaterialRecord::with_id(id)))
    }
}

// ---------------------------------------------------------------------------
// MaterialCatalog
// ---------------------------------------------------------------------------

/// An in-memory catalog loaded from a JSON export.
#[derive(Debug, Clone, Default)]
pub struct MaterialCatalog {
    records: HashMap<String, MaterialRecord>,
}

#[derive(Deserialize)]
#[serde(untagged)]
enum CatalogFile {
    Keyed(HashMap<String, MaterialRecord>),
    List(Vec<MaterialRecord>),
}

impl MaterialCatalog {
    /// Parse either `{"<id>": {...}, ...}` or `[{"MATERIAL_ID": "<id>", ...}, ...]`.
    pub fn from_json_str(json: &str) -> Result<Self> {
        let file: CatalogFile = serde_json::from_str(json)
            .map_err(|e| RecipeForgeError::parse(format!("material catalog: {e}")))?;

        let mut records = HashMap::new();
        match file {
            CatalogFile::Keyed(map) => {
                for (id, mut record) in map {
                    record.material_id.get_or_insert_with(|| id.clone());
                    records.insert(id, record);
                }
            }
            CatalogFile::List(list) => {
                for record in list {
                    let id = record.material_id.clone().ok_or_else(|| {
                        RecipeForgeError::validation("material catalog entry without MATERIAL_ID")
                    })?;
                    records.insert(id, record);
                }
            }
        }

        Ok(Self { records })
    }

    #[instrument(skip_all, fields(path = %path.display()))]
    pub fn from_json_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path).map_err(|e| RecipeForgeError::io(path, e))?;
        let catalog = Self::from_json_str(&content).map_err(|e| match e {
            RecipeForgeError::Parse { message } => {
                RecipeForgeError::parse(format!("{}: {message}", path.display()))
            }
            other => other,
        })?;
        debug!(materials = catalog.len(), "loaded material catalog");
        Ok(catalog)
    }

    pub fn insert(&mut self, record: MaterialRecord) {
        if let Some(id) = record.material_id.clone() {
            self.records.insert(id, record);
        }
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}

impl MaterialSource for MaterialCatalog {
    fn get_material(&self, id: &str) -> Result<Option<MaterialRecord>> {
        self.records.get_material(id)
    }
}
