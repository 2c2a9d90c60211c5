//! Core domain types shared by the RecipeForge crates.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::RecipeForgeError;

// ---------------------------------------------------------------------------
// Sequence chain
// ---------------------------------------------------------------------------

/// `fromCompNo` of the first connector in every sequence chain.
pub const CHAIN_START: i64 = 0;

/// `toCompNo` of the last connector in every sequence chain.
pub const CHAIN_END: i64 = -1;

/// `compNo` assigned to the first inserted component.
pub const FIRST_COMP_NO: i64 = 2;

// ---------------------------------------------------------------------------
// Document schema
// ---------------------------------------------------------------------------

/// Element and attribute names of the eSpec XML dialect the engine reads and writes.
pub mod schema {
    pub const SPEC_OBJECTS: &str = "eSpecXmlObjs";
    pub const PROC_OBJECT: &str = "eProcObject";
    pub const COMPONENT: &str = "eProcCompObject";
    pub const DATA_LINE: &str = "eProcCompDataLine";
    pub const CONNECTOR: &str = "eProcCompLink";
    pub const OBJECT_REF: &str = "eProcObjectRef";
    pub const BOM_ITEM: &str = "eProcBomItem";
    pub const OBJECT_ATTRIBUTE: &str = "eObjectAttribute";
    pub const OBJECT_ATTRIBUTE_ELEMENT: &str = "eObjectAttributeElement";

    pub const OBJ_TYPE: &str = "objType";
    pub const ID: &str = "id";
    pub const GUID: &str = "guid";
    pub const PARENT_GUID: &str = "parent_guid";
    pub const VERSION: &str = "version";
    pub const LEVEL_ID: &str = "levelId";
    pub const LOCATION_ID: &str = "locationId";
    pub const COMP_NO: &str = "compNo";
    pub const INSTANCE_ID: &str = "instanceId";
    pub const FROM_COMP_NO: &str = "fromCompNo";
    pub const TO_COMP_NO: &str = "toCompNo";
    pub const X_POS: &str = "xPos";
    pub const Y_POS: &str = "yPos";
    pub const OBJECT_CONFIG: &str = "objectConfig";
    pub const REF_OBJ_TYPE: &str = "refObjType";
    pub const REF_ID: &str = "refId";
    pub const REF_VERSION: &str = "refVersion";
    pub const ITEM_OBJ_ID: &str = "itemObjId";
    pub const ATTRIB_ID: &str = "attribId";
    pub const ELEM_ID: &str = "elemId";
    pub const S_VALUE: &str = "sValue";

    pub const OBJ_TYPE_BOM: &str = "MM_BOM";
    pub const OBJ_TYPE_MATERIAL: &str = "MM_OBJ";
}

// ---------------------------------------------------------------------------
// ComponentCategory
// ---------------------------------------------------------------------------

/// Catalog category of a registered component.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ComponentCategory {
    /// A complete process step, ready to be placed in a recipe.
    Root,
    /// A bare template other components and connectors are derived from.
    Base,
}

impl fmt::Display for ComponentCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Root => f.write_str("root"),
            Self::Base => f.write_str("base"),
        }
    }
}

// ---------------------------------------------------------------------------
// MissingPolicy
// ---------------------------------------------------------------------------

/// What to do when a named component or material cannot be resolved.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MissingPolicy {
    /// Log the name, leave it out, and keep going.
    #[default]
    Skip,
    /// Fail the whole operation.
    Abort,
}

impl fmt::Display for MissingPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Skip => f.write_str("skip"),
            Self::Abort => f.write_str("abort"),
        }
    }
}

impl FromStr for MissingPolicy {
    type Err = RecipeForgeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "skip" => Ok(Self::Skip),
            "abort" => Ok(Self::Abort),
            other => Err(RecipeForgeError::config(format!(
                "unknown missing-item policy '{other}': expected 'skip' or 'abort'"
            ))),
        }
    }
}
