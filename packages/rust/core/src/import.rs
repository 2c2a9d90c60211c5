//! What the import collaborator needs to know about a written document.

use std::path::Path;

use serde::Serialize;
use sha2::{Digest, Sha256};
use tracing::{debug, instrument, warn};

use recipeforge_document::Document;
use recipeforge_shared::{BomConfig, RecipeForgeError, Result, schema};

/// Upload metadata for one document.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ImportDescriptor {
    pub file_name: String,
    pub obj_type: String,
    pub level_id: String,
    pub location_id: String,
    pub size_bytes: u64,
    /// Hex-encoded SHA-256 of the file contents.
    pub sha256: String,
}

/// Describe the document at `path` from its first `eProcObject`. Attributes
/// it lacks fall back to `MM_OBJ` and the configured level and location.
#[instrument(skip_all, fields(path = %path.display()))]
pub fn describe_for_import(path: &Path, defaults: &BomConfig) -> Result<ImportDescriptor> {
    let bytes = std::fs::read(path).map_err(|e| RecipeForgeError::io(path, e))?;
    let content = String::from_utf8_lossy(&bytes);
    let doc = Document::parse(&content, &path.display().to_string())?;

    let object = if doc.root.name == schema::PROC_OBJECT {
        Some(&doc.root)
    } else {
        doc.root.find(|e| e.name == schema::PROC_OBJECT)
    };
    if object.is_none() {
        warn!("no eProcObject in document, using configured defaults");
    }

    let read = |attr: &str, default: &str| -> String {
        object
            .and_then(|o| o.attr(attr))
            .filter(|v| !v.is_empty())
            .unwrap_or(default)
            .to_string()
    };

    let mut hasher = Sha256::new();
    hasher.update(&bytes);

    let descriptor = ImportDescriptor {
        file_name: path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default(),
        obj_type: read(schema::OBJ_TYPE, schema::OBJ_TYPE_MATERIAL),
        level_id: read(schema::LEVEL_ID, &defaults.level_id),
        location_id: read(schema::LOCATION_ID, &defaults.location_id),
        size_bytes: bytes.len() as u64,
        sha256: format!("{:x}", hasher.finalize()),
    };
    debug!(obj_type = %descriptor.obj_type, size = descriptor.size_bytes, "described document");
    Ok(descriptor)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn write_temp(name: &str, content: &str) -> (std::path::PathBuf, std::path::PathBuf) {
        let dir = std::env::temp_dir().join(format!("rf-import-test-{}", uuid::Uuid::new_v4()));
        std::fs::create_dir_all(&dir).unwrap();
        let path = dir.join(name);
        std::fs::write(&path, content).unwrap();
        (dir, path)
    }

    #[test]
    fn reads_first_proc_object() {
        let (dir, path) = write_temp(
            "recipe.xml",
            r#"<eSpecXml><eSpecXmlObjs><eProcObject objType="PM_OPERATION" levelId="20" locationId="7"/><eProcObject objType="MM_BOM"/></eSpecXmlObjs></eSpecXml>"#,
        );

        let d = describe_for_import(&path, &BomConfig::default()).unwrap();
        assert_eq!(d.file_name, "recipe.xml");
        assert_eq!(d.obj_type, "PM_OPERATION");
        assert_eq!((d.level_id.as_str(), d.location_id.as_str()), ("20", "7"));
        assert_eq!(d.size_bytes, std::fs::metadata(&path).unwrap().len());
        assert_eq!(d.sha256.len(), 64);

        let _ = std::fs::remove_dir_all(&dir);
    }

    #[test]
    fn falls_back_to_configured_defaults() {
        let (dir, path) = write_temp("empty.xml", "<eSpecXml><eSpecXmlObjs/></eSpecXml>");

        let d = describe_for_import(&path, &BomConfig::default()).unwrap();
        assert_eq!(d.obj_type, "MM_OBJ");
        assert_eq!(d.level_id, "10");
        assert_eq!(d.location_id, "4");

        let _ = std::fs::remove_dir_all(&dir);
    }

    #[test]
    fn hash_changes_with_content() {
        let (dir_a, a) = write_temp("a.xml", "<eProcObject objType=\"MM_OBJ\" id=\"1\"/>");
        let (dir_b, b) = write_temp("a.xml", "<eProcObject objType=\"MM_OBJ\" id=\"2\"/>");

        let da = describe_for_import(&a, &BomConfig::default()).unwrap();
        let db = describe_for_import(&b, &BomConfig::default()).unwrap();
        assert_eq!(da.obj_type, "MM_OBJ");
        assert_ne!(da.sha256, db.sha256);

        let _ = std::fs::remove_dir_all(&dir_a);
        let _ = std::fs::remove_dir_all(&dir_b);
    }
}
