//! BOM assembly from material ids and material metadata.
//!
//! The assembler clones the outer BOM template, fills one header with a line
//! item per material, and appends one base object per material next to it.

use std::collections::HashSet;
use std::path::Path;

use tracing::{debug, info, instrument, warn};
use uuid::Uuid;

use recipeforge_document::{Document, Element};
use recipeforge_shared::{
    AppConfig, BomConfig, MissingPolicy, RecipeForgeError, Result, ResultExt, TemplatesConfig,
    schema,
};

use crate::dates::normalize_timestamp;
use crate::document::BomDocument;
use crate::material::{MaterialRecord, MaterialSource};

const DEFAULT_DISPENSE_UOM: &str = "#";
const DEFAULT_QC_STATUS: &str = "Released";
const DEFAULT_INVENTORY_TRACKING: &str = "Container";
const DEFAULT_INVENTORY_UOM: &str = "g";
const DEFAULT_STORAGE_CLASS: &str = "AMBIENT";

// ---------------------------------------------------------------------------
// Templates
// ---------------------------------------------------------------------------

/// The four BOM templates, parsed once.
#[derive(Debug, Clone)]
pub struct BomTemplates {
    /// Outer document; must contain `eSpecXmlObjs`.
    pub document: Document,
    pub header: Element,
    pub line_item: Element,
    pub base: Element,
}

impl BomTemplates {
    pub fn load(config: &TemplatesConfig) -> Result<Self> {
        let load_root = |path: &Path| Document::from_path(&config.resolve(path)).map(|doc| doc.root);
        Ok(Self {
            document: Document::from_path(&config.resolve(&config.bom_template))?,
            header: load_root(&config.bom_header)?,
            line_item: load_root(&config.bom_line_item)?,
            base: load_root(&config.bom_base)?,
        })
    }
}

// ---------------------------------------------------------------------------
// Assembler
// ---------------------------------------------------------------------------

/// Result of one assembly.
#[derive(Debug, Clone)]
pub struct AssembleOutcome {
    pub bom: BomDocument,
    /// Requested ids left out because no metadata was found.
    pub skipped: Vec<String>,
}

#[derive(Debug, Clone)]
pub struct BomAssembler {
    settings: BomConfig,
    templates: BomTemplates,
}

impl BomAssembler {
    pub fn new(settings: BomConfig, templates: BomTemplates) -> Self {
        Self {
            settings,
            templates,
        }
    }

    /// Load the templates named in `config` and take the `[bom]` settings.
    pub fn from_config(config: &AppConfig) -> Result<Self> {
        Ok(Self::new(
            config.bom.clone(),
            BomTemplates::load(&config.templates)?,
        ))
    }

    /// Build a BOM for `material_ids`, in input order.
    ///
    /// Duplicate ids are kept once. Ids without metadata follow
    /// `missing_material`; if none remain the assembly fails.
    #[instrument(skip_all, fields(bom = bom_name.unwrap_or("<generated>"), materials = material_ids.len()))]
    pub fn assemble(
        &self,
        bom_name: Option<&str>,
        material_ids: &[String],
        source: &dyn MaterialSource,
    ) -> Result<AssembleOutcome> {
        if material_ids.is_empty() {
            return Err(RecipeForgeError::validation(
                "at least one material id is required to assemble a BOM",
            ));
        }

        let bom_id = match bom_name.map(str::trim) {
            Some(name) if !name.is_empty() => name.to_string(),
            _ => format!("{}{}", self.settings.id_prefix, Uuid::new_v4()),
        };

        let mut seen = HashSet::new();
        let mut resolved: Vec<(&str, MaterialRecord)> = Vec::new();
        let mut skipped = Vec::new();

        for id in material_ids {
            let id = id.trim();
            if !seen.insert(id) {
                debug!(material = id, "duplicate material id ignored");
                continue;
            }

            let record = source
                .get_material(id)
                .while_processing(|| format!("material '{id}'"))?;
            match (record, self.settings.missing_material) {
                (Some(record), _) => resolved.push((id, record)),
                (None, MissingPolicy::Skip) => {
                    warn!(material = id, "no metadata for material, skipping");
                    skipped.push(id.to_string());
                }
                (None, MissingPolicy::Abort) => {
                    return Err(RecipeForgeError::MaterialNotFound { id: id.to_string() }
                        .while_processing(format!("BOM '{bom_id}'")));
                }
            }
        }

        if resolved.is_empty() {
            return Err(RecipeForgeError::validation(format!(
                "none of the {} requested materials could be resolved",
                seen.len()
            )));
        }

        let mut doc = self.templates.document.clone();
        let objs = spec_objects_mut(&mut doc.root).ok_or_else(|| {
            RecipeForgeError::validation("BOM template has no eSpecXmlObjs container")
        })?;

        let mut header = self.header(&bom_id);
        for (index, (id, record)) in resolved.iter().enumerate() {
            header.push(self.line_item(index + 1, id, record));
        }
        objs.push(header);

        for (id, record) in &resolved {
            objs.push(self.base_object(id, record));
        }

        let bom = BomDocument::new_unchecked(doc);
        bom.validate()
            .while_processing(|| format!("BOM '{bom_id}'"))?;

        info!(
            bom = %bom_id,
            items = resolved.len(),
            skipped = skipped.len(),
            "assembled BOM"
        );
        Ok(AssembleOutcome { bom, skipped })
    }

    fn header(&self, bom_id: &str) -> Element {
        let s = &self.settings;
        let mut header = self.templates.header.clone();
        header.remove_elements(|e| e.name == schema::BOM_ITEM);

        header.set_attr(schema::OBJ_TYPE, schema::OBJ_TYPE_BOM);
        header.set_attr(schema::ID, bom_id);
        header.set_attr(schema::VERSION, s.version.as_str());
        header.set_attr("levelName", s.level_name.as_str());
        header.set_attr(schema::LEVEL_ID, s.level_id.as_str());
        header.set_attr("locationName", s.location_name.as_str());
        header.set_attr(schema::LOCATION_ID, s.location_id.as_str());
        header
    }

    fn line_item(&self, number: usize, id: &str, record: &MaterialRecord) -> Element {
        let s = &self.settings;
        let number = number.to_string();
        let flag = |value: Option<bool>| if value.unwrap_or(true) { "True" } else { "False" };

        let mut item = self.templates.line_item.clone();
        item.set_attr("itemLevelName", s.level_name.as_str());
        item.set_attr("itemLevelId", s.level_id.as_str());
        item.set_attr("itemLocName", s.location_name.as_str());
        item.set_attr("itemLocId", s.location_id.as_str());
        item.set_attr(schema::ITEM_OBJ_ID, id);
        item.set_attr("itemObjTypeName", schema::OBJ_TYPE_MATERIAL);
        item.set_attr("parentRule", "Percent");
        item.set_attr("itemNumber", number.as_str());
        item.set_attr("subNumber", "1");
        item.set_attr("seqNumber", number.as_str());
        item.set_attr("itemObjType", "2");
        item.set_attr("itemObjVer", s.version.as_str());
        item.set_attr("activeFlag", flag(record.active_flag));
        item.set_attr("aggregateFlag", flag(record.aggregate_flag));

        set_object_attribute(
            &mut item,
            "Dispense",
            "UOM",
            record.inventory_uom.as_deref().unwrap_or(DEFAULT_DISPENSE_UOM),
        );
        item
    }

    fn base_object(&self, id: &str, record: &MaterialRecord) -> Element {
        let s = &self.settings;
        let changed = normalize_timestamp(record.last_changed_date.as_deref());

        let mut base = self.templates.base.clone();
        base.set_attr(schema::OBJ_TYPE, schema::OBJ_TYPE_MATERIAL);
        base.set_attr("relObjType", "MM");
        base.set_attr(schema::ID, id);
        base.set_attr("levelName", s.level_name.as_str());
        base.set_attr(schema::LEVEL_ID, s.level_id.as_str());
        base.set_attr("locationName", s.location_name.as_str());
        base.set_attr(schema::LOCATION_ID, s.location_id.as_str());
        base.set_attr(
            "description",
            record.material_desc.as_deref().unwrap_or_default(),
        );
        base.set_attr("status", "APPROVED");
        base.set_attr(schema::VERSION, s.version.as_str());
        base.set_attr("lastChangedDate", changed.as_str());
        base.set_attr("createDate", changed.as_str());
        base.set_attr("lastStatusChangedDate", changed.as_str());
        base.set_attr("lastChangedBy", s.changed_by.as_str());

        let attributes = [
            ("Default Quality", "Status Value", &record.default_qc_status, DEFAULT_QC_STATUS),
            ("Inventory Tracking", "Value", &record.inventory_tracking, DEFAULT_INVENTORY_TRACKING),
            ("Inventory UOM", "UOM", &record.inventory_uom, DEFAULT_INVENTORY_UOM),
            ("Storage Class", "Value", &record.storage_class, DEFAULT_STORAGE_CLASS),
        ];
        for (attrib_id, elem_id, value, default) in attributes {
            set_object_attribute(
                &mut base,
                attrib_id,
                elem_id,
                value.as_deref().unwrap_or(default),
            );
        }
        base
    }
}

fn spec_objects_mut(root: &mut Element) -> Option<&mut Element> {
    if root.name == schema::SPEC_OBJECTS {
        Some(root)
    } else {
        root.child_mut(schema::SPEC_OBJECTS)
    }
}

/// Set `eObjectAttribute[attribId]/eObjectAttributeElement[elemId]@sValue`,
/// creating either node when the template lacks it.
fn set_object_attribute(target: &mut Element, attrib_id: &str, elem_id: &str, value: &str) {
    let element = find_or_push(target, schema::OBJECT_ATTRIBUTE, schema::ATTRIB_ID, attrib_id)
        .and_then(|attribute| {
            find_or_push(
                attribute,
                schema::OBJECT_ATTRIBUTE_ELEMENT,
                schema::ELEM_ID,
                elem_id,
            )
        });
    if let Some(element) = element {
        element.set_attr(schema::S_VALUE, value);
    }
}

fn find_or_push<'a>(
    parent: &'a mut Element,
    name: &str,
    key: &str,
    value: &str,
) -> Option<&'a mut Element> {
    let matches = |e: &Element| e.name == name && e.attr_is(key, value);
    if parent.position(matches).is_none() {
        parent.push(Element::new(name).with_attr(key, value));
    }
    parent.elements_mut().find(|e| matches(e))
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;
    use std::path::{Path, PathBuf};

    use super::*;

    fn templates_root() -> PathBuf {
        Path::new(env!("CARGO_MANIFEST_DIR")).join("../../../templates")
    }

    fn assembler(missing: MissingPolicy) -> BomAssembler {
        let templates = TemplatesConfig::default().with_root(templates_root());
        let settings = BomConfig {
            missing_material: missing,
            ..BomConfig::default()
        };
        BomAssembler::new(settings, BomTemplates::load(&templates).unwrap())
    }

    fn catalog() -> HashMap<String, MaterialRecord> {
        let mut m1 = MaterialRecord::with_id("M1");
        m1.material_desc = Some("Sucrose".into());
        m1.inventory_uom = Some("kg".into());
        m1.last_changed_date = Some("/Date(1764245832000)/".into());
        m1.active_flag = Some(false);

        HashMap::from([
            ("M1".to_string(), m1),
            ("M2".to_string(), MaterialRecord::with_id("M2")),
        ])
    }

    fn ids(ids: &[&str]) -> Vec<String> {
        ids.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn two_materials_yield_items_and_bases() {
        let outcome = assembler(MissingPolicy::Skip)
            .assemble(Some("B1"), &ids(&["M1", "M2"]), &catalog())
            .unwrap();
        let bom = outcome.bom;

        assert_eq!(bom.bom_id(), "B1");
        assert_eq!(bom.version(), "1.001");
        assert_eq!(bom.material_ids(), vec!["M1", "M2"]);
        assert_eq!(bom.base_objects().len(), 2);
        assert!(bom.validate().is_ok());
        assert!(outcome.skipped.is_empty());

        let items = bom.line_items();
        assert_eq!(items[1].attr("itemNumber"), Some("2"));
        assert_eq!(items[1].attr("seqNumber"), Some("2"));
        assert_eq!(items[0].attr("activeFlag"), Some("False"));
        assert_eq!(items[1].attr("activeFlag"), Some("True"));

        let uom = |item: &Element| {
            item.find(|e| e.attr_is(schema::ELEM_ID, "UOM"))
                .and_then(|e| e.attr(schema::S_VALUE))
                .map(str::to_string)
        };
        assert_eq!(uom(items[0]).as_deref(), Some("kg"));
        assert_eq!(uom(items[1]).as_deref(), Some("#"));
    }

    #[test]
    fn base_objects_carry_metadata_and_defaults() {
        let bom = assembler(MissingPolicy::Skip)
            .assemble(None, &ids(&["M1", "M2"]), &catalog())
            .unwrap()
            .bom;
        assert!(bom.bom_id().starts_with("RECIPEFORGE_BOM_"));

        let bases = bom.base_objects();
        assert_eq!(bases[0].attr("description"), Some("Sucrose"));
        assert_eq!(bases[0].attr("lastChangedDate"), Some("27/11/2025 12:17:12.000000"));
        assert_eq!(bases[0].attr("createDate"), bases[0].attr("lastChangedDate"));
        assert_eq!(bases[1].attr("description"), Some(""));
        assert_eq!(bases[1].attr("lastChangedBy"), Some("administrator"));

        let value = |base: &Element, attrib: &str| {
            base.find(|e| e.attr_is(schema::ATTRIB_ID, attrib))
                .and_then(|a| a.elements().next())
                .and_then(|e| e.attr(schema::S_VALUE))
                .map(str::to_string)
        };
        assert_eq!(value(bases[0], "Inventory UOM").as_deref(), Some("kg"));
        assert_eq!(value(bases[1], "Inventory UOM").as_deref(), Some("g"));
        assert_eq!(value(bases[1], "Storage Class").as_deref(), Some("AMBIENT"));
        assert_eq!(value(bases[1], "Default Quality").as_deref(), Some("Released"));
    }

    #[test]
    fn empty_material_list_is_rejected() {
        let err = assembler(MissingPolicy::Skip)
            .assemble(Some("B1"), &[], &catalog())
            .unwrap_err();
        assert!(matches!(err, RecipeForgeError::Validation { .. }));
    }

    #[test]
    fn duplicates_and_unknown_ids_under_skip() {
        let outcome = assembler(MissingPolicy::Skip)
            .assemble(Some("B1"), &ids(&["M1", "M9", "M1"]), &catalog())
            .unwrap();
        assert_eq!(outcome.bom.material_ids(), vec!["M1"]);
        assert_eq!(outcome.skipped, vec!["M9".to_string()]);

        let err = assembler(MissingPolicy::Skip)
            .assemble(Some("B1"), &ids(&["M8", "M9"]), &catalog())
            .unwrap_err();
        assert!(err.to_string().contains("none of the 2 requested materials"));
    }

    #[test]
    fn unknown_id_under_abort_names_the_bom() {
        let err = assembler(MissingPolicy::Abort)
            .assemble(Some("B1"), &ids(&["M1", "M9"]), &catalog())
            .unwrap_err();
        assert_eq!(
            err.to_string(),
            "while processing BOM 'B1': material not found: 'M9'"
        );
    }

    #[test]
    fn rendered_bom_keeps_declaration_and_reloads() {
        let bom = assembler(MissingPolicy::Skip)
            .assemble(Some("B1"), &ids(&["M1", "M2"]), &catalog())
            .unwrap()
            .bom;

        let tmp = std::env::temp_dir().join(format!("rf-bom-test-{}", Uuid::new_v4()));
        let path = tmp.join("bom.xml");
        bom.write(&path).unwrap();

        let written = std::fs::read_to_string(&path).unwrap();
        assert!(written.starts_with("<?xml"));
        let reloaded = BomDocument::from_path(&path).unwrap();
        assert_eq!(reloaded, bom);

        let _ = std::fs::remove_dir_all(&tmp);
    }
}
