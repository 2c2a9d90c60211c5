//! Splicing an assembled BOM into a recipe.
//!
//! Attaching is idempotent: every splice goes through [`find_and_replace`],
//! which first removes whatever an earlier attach of the same BOM left behind.

use std::collections::HashSet;

use tracing::{debug, info, instrument};

use recipeforge_bom::BomDocument;
use recipeforge_document::{Element, Node};
use recipeforge_shared::{AppConfig, RecipeForgeError, Result, ResultExt, schema};

use crate::recipe::RecipeDocument;

/// Remove every direct child of `container` matching `identity`, then insert
/// `replacement` at the index `position` picks in the cleaned container.
///
/// Returns how many children were removed.
pub fn find_and_replace(
    container: &mut Element,
    identity: impl FnMut(&Element) -> bool,
    replacement: Vec<Node>,
    position: impl FnOnce(&Element) -> usize,
) -> usize {
    let removed = container.remove_elements(identity);
    let index = position(container);
    container.insert_all(index, replacement);
    removed
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AttachOutcome {
    pub bom_id: String,
    /// `true` when an earlier attachment of the same BOM was replaced.
    pub replaced: bool,
    /// Top-level BOM nodes inserted next to the anchor.
    pub inserted_nodes: usize,
    /// Base objects not inserted because another attached BOM already provides them.
    pub shared_base_objects: usize,
}

pub struct BomAttacher {
    marker: String,
}

impl BomAttacher {
    /// Attach at the anchor whose `objType` is `marker`.
    pub fn new(marker: impl Into<String>) -> Self {
        Self {
            marker: marker.into(),
        }
    }

    pub fn from_config(config: &AppConfig) -> Self {
        Self::new(config.build.attach_obj_type.as_str())
    }

    #[instrument(skip_all, fields(bom = %bom.bom_id(), marker = %self.marker))]
    pub fn attach(&self, recipe: &mut RecipeDocument, bom: &BomDocument) -> Result<AttachOutcome> {
        let bom_id = bom.bom_id().to_string();
        bom.validate()
            .while_processing(|| format!("BOM '{bom_id}'"))?;

        let anchor_path = recipe
            .locate(&self.marker)
            .while_processing(|| format!("BOM '{bom_id}'"))?;
        let Some((_, parent_path)) = anchor_path.split_last() else {
            return Err(RecipeForgeError::validation(
                "operation anchor cannot be the document root",
            ));
        };
        let parent_path = parent_path.to_vec();
        let marker = self.marker.as_str();
        let is_anchor =
            |e: &Element| e.name == schema::PROC_OBJECT && e.attr_is(schema::OBJ_TYPE, marker);

        // Reference inside the anchor, right after its last component.
        let anchor = recipe
            .root_mut()
            .at_path_mut(&anchor_path)
            .ok_or_else(|| RecipeForgeError::anchor_not_found(marker, "recipe"))?;
        let reference = Element::new(schema::OBJECT_REF)
            .with_attr(schema::REF_OBJ_TYPE, schema::OBJ_TYPE_BOM)
            .with_attr(schema::REF_ID, bom_id.as_str())
            .with_attr(schema::REF_VERSION, bom.version());
        let removed_refs = find_and_replace(
            anchor,
            |e| {
                e.name == schema::OBJECT_REF
                    && e.attr_is(schema::REF_OBJ_TYPE, schema::OBJ_TYPE_BOM)
                    && e.attr_is(schema::REF_ID, &bom_id)
            },
            vec![reference.into()],
            |a| {
                a.rposition(|e| e.name == schema::COMPONENT)
                    .map_or(a.children.len(), |i| i + 1)
            },
        );

        // Header and base objects next to the anchor.
        let container = recipe
            .root_mut()
            .at_path_mut(&parent_path)
            .ok_or_else(|| RecipeForgeError::anchor_not_found(marker, "recipe"))?;
        let orphans = orphaned_base_objects(container, &bom_id);
        let existing: HashSet<String> = container
            .elements()
            .filter(|e| is_base_object(e))
            .map(id_of)
            .filter(|id| !orphans.contains(*id))
            .map(str::to_string)
            .collect();

        let mut shared = 0;
        let nodes: Vec<Node> = bom
            .top_level_nodes()
            .into_iter()
            .filter(|e| {
                let duplicate = is_base_object(e) && existing.contains(id_of(e));
                shared += usize::from(duplicate);
                !duplicate
            })
            .map(|e| Node::Element(e.clone()))
            .collect();
        let inserted_nodes = nodes.len();

        let removed_subtrees = find_and_replace(
            container,
            |e| is_bom_header(e, &bom_id) || (is_base_object(e) && orphans.contains(id_of(e))),
            nodes,
            |c| c.position(is_anchor).map_or(c.children.len(), |i| i + 1),
        );

        let replaced = removed_refs > 0 || removed_subtrees > 0;
        debug!(removed_refs, removed_subtrees, shared, "spliced BOM");
        info!(bom = %bom_id, replaced, inserted_nodes, "attached BOM");

        Ok(AttachOutcome {
            bom_id,
            replaced,
            inserted_nodes,
            shared_base_objects: shared,
        })
    }
}

fn is_bom_header(e: &Element, bom_id: &str) -> bool {
    e.name == schema::PROC_OBJECT
        && e.attr_is(schema::OBJ_TYPE, schema::OBJ_TYPE_BOM)
        && e.attr_is(schema::ID, bom_id)
}

fn is_base_object(e: &Element) -> bool {
    e.name == schema::PROC_OBJECT && e.attr_is(schema::OBJ_TYPE, schema::OBJ_TYPE_MATERIAL)
}

fn id_of(e: &Element) -> &str {
    e.attr(schema::ID).unwrap_or_default()
}

/// Base-object ids referenced by the previous `bom_id` header and by no other
/// BOM header in `container`.
fn orphaned_base_objects(container: &Element, bom_id: &str) -> HashSet<String> {
    let referenced = |header: &Element| -> HashSet<String> {
        header
            .descendants_named(schema::BOM_ITEM)
            .into_iter()
            .filter_map(|item| item.attr(schema::ITEM_OBJ_ID))
            .map(str::to_string)
            .collect()
    };

    let mut own = HashSet::new();
    let mut others = HashSet::new();
    for header in container
        .elements()
        .filter(|e| e.name == schema::PROC_OBJECT && e.attr_is(schema::OBJ_TYPE, schema::OBJ_TYPE_BOM))
    {
        if header.attr_is(schema::ID, bom_id) {
            own.extend(referenced(header));
        } else {
            others.extend(referenced(header));
        }
    }
    own.retain(|id| !others.contains(id));
    own
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;
    use std::path::Path;

    use recipeforge_bom::{BomAssembler, MaterialRecord};
    use recipeforge_shared::TemplatesConfig;

    use super::*;
    use crate::builder::RecipeBuilder;

    fn config() -> AppConfig {
        let mut config = AppConfig::default();
        config.templates = TemplatesConfig::default()
            .with_root(Path::new(env!("CARGO_MANIFEST_DIR")).join("../../../templates"));
        config
    }

    fn bom(config: &AppConfig, name: &str, ids: &[&str]) -> BomDocument {
        let source: HashMap<String, MaterialRecord> = ids
            .iter()
            .map(|id| (id.to_string(), MaterialRecord::with_id(*id)))
            .collect();
        let ids: Vec<String> = ids.iter().map(|s| s.to_string()).collect();
        BomAssembler::from_config(config)
            .unwrap()
            .assemble(Some(name), &ids, &source)
            .unwrap()
            .bom
    }

    fn recipe(config: &AppConfig) -> RecipeDocument {
        RecipeBuilder::new(config)
            .build(&["record_text".to_string(), "manual_finish".to_string()])
            .unwrap()
            .recipe
    }

    fn spec_objects(recipe: &RecipeDocument) -> &Element {
        recipe.root().child("eSpecXmlObjs").unwrap()
    }

    #[test]
    fn find_and_replace_removes_then_inserts() {
        let mut container = Element::new("c");
        container.push(Element::new("a").with_attr("id", "1"));
        container.push(Element::new("b"));
        container.push(Element::new("a").with_attr("id", "1"));

        let removed = find_and_replace(
            &mut container,
            |e| e.attr_is("id", "1"),
            vec![Element::new("a").with_attr("id", "2").into()],
            |c| c.children.len(),
        );
        assert_eq!(removed, 2);
        let names: Vec<_> = container.elements().map(|e| e.name.as_str()).collect();
        assert_eq!(names, vec!["b", "a"]);
    }

    #[test]
    fn attach_places_reference_and_subtree() {
        let config = config();
        let mut recipe = recipe(&config);
        let bom = bom(&config, "B1", &["M1", "M2"]);

        let outcome = BomAttacher::from_config(&config).attach(&mut recipe, &bom).unwrap();
        assert!(!outcome.replaced);
        assert_eq!(outcome.inserted_nodes, 3);

        let refs = recipe.bom_refs();
        assert_eq!(refs.len(), 1);
        assert_eq!(refs[0].attr("refId"), Some("B1"));
        assert_eq!(refs[0].attr("refVersion"), Some("1.001"));

        // Reference follows the last component inside the anchor.
        let anchor = recipe.anchor().unwrap();
        let last_component = anchor.rposition(|e| e.name == "eProcCompObject").unwrap();
        let reference = anchor.position(|e| e.name == "eProcObjectRef").unwrap();
        assert_eq!(reference, last_component + 1);

        // Header and base objects follow the anchor.
        let objs = spec_objects(&recipe);
        let kinds: Vec<_> = objs.elements().filter_map(|e| e.attr("objType")).collect();
        assert_eq!(kinds, vec!["PM_OPERATION", "MM_BOM", "MM_OBJ", "MM_OBJ"]);

        assert!(recipe.validate().is_ok());
    }

    #[test]
    fn attaching_twice_is_idempotent() {
        let config = config();
        let mut recipe = recipe(&config);
        let bom = bom(&config, "B1", &["M1", "M2"]);
        let attacher = BomAttacher::from_config(&config);

        attacher.attach(&mut recipe, &bom).unwrap();
        let once = recipe.clone();
        let second = attacher.attach(&mut recipe, &bom).unwrap();

        assert!(second.replaced);
        assert_eq!(recipe, once);
        assert_eq!(recipe.bom_refs().len(), 1);
        let headers = spec_objects(&recipe)
            .elements()
            .filter(|e| e.attr_is("objType", "MM_BOM"))
            .count();
        assert_eq!(headers, 1);
    }

    #[test]
    fn base_objects_shared_between_boms_are_not_duplicated() {
        let config = config();
        let mut recipe = recipe(&config);
        let attacher = BomAttacher::from_config(&config);

        attacher.attach(&mut recipe, &bom(&config, "B1", &["M1", "M2"])).unwrap();
        let outcome = attacher
            .attach(&mut recipe, &bom(&config, "B2", &["M2", "M3"]))
            .unwrap();
        assert_eq!(outcome.shared_base_objects, 1);
        assert_eq!(recipe.bom_refs().len(), 2);

        // Re-attaching B1 with fewer materials keeps M2 (still used by B2) and drops M1.
        attacher.attach(&mut recipe, &bom(&config, "B1", &["M2"])).unwrap();
        let mut bases: Vec<_> = spec_objects(&recipe)
            .elements()
            .filter(|e| e.attr_is("objType", "MM_OBJ"))
            .filter_map(|e| e.attr("id"))
            .collect();
        bases.sort_unstable();
        assert_eq!(bases, vec!["M2", "M3"]);
    }

    #[test]
    fn missing_anchor_is_reported() {
        let config = config();
        let mut recipe = recipe(&config);
        let bom = bom(&config, "B1", &["M1"]);

        let err = BomAttacher::new("PM_UNIT_PROCEDURE")
            .attach(&mut recipe, &bom)
            .unwrap_err();
        assert!(matches!(err.root_cause(), RecipeForgeError::AnchorNotFound { .. }));
        assert!(err.to_string().starts_with("while processing BOM 'B1': anchor not found"));
        assert!(recipe.bom_refs().is_empty());
    }
}
