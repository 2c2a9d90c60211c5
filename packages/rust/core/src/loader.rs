//! Fragment loading: registry lookup, template cache, positioning.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::{Arc, PoisonError, RwLock};

use tracing::{debug, warn};

use recipeforge_document::{Document, Element};
use recipeforge_shared::{Result, schema};

use crate::label;
use crate::layout::{LayoutCursor, Position};
use crate::registry::ComponentRegistry;

// ---------------------------------------------------------------------------
// TemplateCache
// ---------------------------------------------------------------------------

/// Parsed templates keyed by path. Entries are never mutated; callers clone
/// what they need before editing it.
#[derive(Debug, Default)]
pub struct TemplateCache {
    entries: RwLock<HashMap<PathBuf, Arc<Document>>>,
}

impl TemplateCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get_or_load(&self, path: &Path) -> Result<Arc<Document>> {
        let cached = self
            .entries
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(path)
            .cloned();
        if let Some(doc) = cached {
            return Ok(doc);
        }

        let doc = Arc::new(Document::from_path(path)?);
        let mut entries = self.entries.write().unwrap_or_else(PoisonError::into_inner);
        let doc = entries
            .entry(path.to_path_buf())
            .or_insert(doc)
            .clone();
        debug!(path = %path.display(), cached = entries.len(), "template cached");
        Ok(doc)
    }

    pub fn len(&self) -> usize {
        self.entries
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// The component-instance node of a fragment template: the first
/// `eProcCompObject`, or the root when the file has none.
pub fn instance_node(root: &Element) -> &Element {
    if root.name == schema::COMPONENT {
        return root;
    }
    root.find(|e| e.name == schema::COMPONENT).unwrap_or(root)
}

// ---------------------------------------------------------------------------
// FragmentLoader
// ---------------------------------------------------------------------------

/// An owned, positioned copy of a component template.
#[derive(Debug, Clone)]
pub struct PositionedFragment {
    pub name: String,
    pub node: Element,
    pub position: Position,
    /// `false` when the fragment has no `objectConfig` or it could not be decoded.
    pub blob_rewritten: bool,
}

/// Loads fragments for one build. Each successful [`load`](Self::load)
/// consumes one layout slot.
pub struct FragmentLoader<'a> {
    registry: &'a ComponentRegistry,
    cache: &'a TemplateCache,
    cursor: LayoutCursor,
    label_offset: i64,
}

impl<'a> FragmentLoader<'a> {
    pub fn new(
        registry: &'a ComponentRegistry,
        cache: &'a TemplateCache,
        cursor: LayoutCursor,
        label_offset: i64,
    ) -> Self {
        Self {
            registry,
            cache,
            cursor,
            label_offset,
        }
    }

    /// Unpositioned copy of a template's instance node (used for connectors).
    pub fn template(&self, name: &str) -> Result<Element> {
        let component = self.registry.resolve(name)?;
        let doc = self.cache.get_or_load(&component.location)?;
        Ok(instance_node(&doc.root).clone())
    }

    /// Resolve `name`, copy its instance node, and place it at the next slot.
    ///
    /// Resolution and template loading happen first, so a failure leaves the
    /// cursor where it was.
    pub fn load(&mut self, name: &str) -> Result<PositionedFragment> {
        let mut node = self.template(name)?;
        let position = self.cursor.advance();

        node.set_attr(schema::X_POS, position.x.to_string());
        node.set_attr(schema::Y_POS, position.y.to_string());

        let rewritten = node
            .attr(schema::OBJECT_CONFIG)
            .map(|raw| label::reposition(raw, position, self.label_offset));
        let blob_rewritten = match rewritten {
            None => {
                debug!(component = name, "no objectConfig, coordinates only");
                false
            }
            Some(Ok(encoded)) => {
                node.set_attr(schema::OBJECT_CONFIG, encoded);
                true
            }
            Some(Err(e)) => {
                warn!(component = name, error = %e, "objectConfig left unchanged");
                false
            }
        };

        debug!(
            component = name,
            x = position.x,
            y = position.y,
            label_top = position.label_top,
            "positioned fragment"
        );

        Ok(PositionedFragment {
            name: name.to_string(),
            node,
            position,
            blob_rewritten,
        })
    }

    pub fn cursor(&self) -> &LayoutCursor {
        &self.cursor
    }
}

#[cfg(test)]
mod tests {
    use std::path::Path;

    use recipeforge_shared::LayoutConfig;

    use super::*;
    use crate::label::LabelConfig;

    fn templates_root() -> PathBuf {
        Path::new(env!("CARGO_MANIFEST_DIR")).join("../../../templates")
    }

    fn loader<'a>(registry: &'a ComponentRegistry, cache: &'a TemplateCache) -> FragmentLoader<'a> {
        let layout = LayoutConfig::default();
        FragmentLoader::new(registry, cache, LayoutCursor::new(layout), layout.label_offset)
    }

    #[test]
    fn load_positions_wrapped_fragment_and_rewrites_blob() {
        let registry = ComponentRegistry::builtin(&templates_root());
        let cache = TemplateCache::new();
        let mut loader = loader(&registry, &cache);

        let fragment = loader.load("operator_instruction").unwrap();
        assert_eq!(fragment.node.name, "eProcCompObject");
        assert_eq!(fragment.node.attr("xPos"), Some("300"));
        assert_eq!(fragment.node.attr("yPos"), Some("220"));
        assert!(fragment.blob_rewritten);

        let blob = LabelConfig::decode(fragment.node.attr("objectConfig").unwrap()).unwrap();
        assert_eq!((blob.label.left, blob.label.top), (282, 100));
    }

    #[test]
    fn bare_root_fragment_and_missing_blob() {
        let registry = ComponentRegistry::builtin(&templates_root());
        let cache = TemplateCache::new();
        let mut loader = loader(&registry, &cache);

        let first = loader.load("record_text").unwrap();
        assert_eq!(first.node.attr("instanceId"), Some("record_text"));

        let second = loader.load("manual_finish").unwrap();
        assert!(!second.blob_rewritten);
        assert_eq!(second.node.attr("xPos"), Some("480"));
    }

    #[test]
    fn unknown_name_does_not_consume_a_slot() {
        let registry = ComponentRegistry::builtin(&templates_root());
        let cache = TemplateCache::new();
        let mut loader = loader(&registry, &cache);

        assert!(loader.load("mix_tank").unwrap_err().is_component_not_found());
        assert_eq!(loader.cursor().steps(), 0);
        assert_eq!(loader.load("record_text").unwrap().position.x, 300);
    }

    #[test]
    fn cache_hands_out_shared_templates_and_loads_return_copies() {
        let registry = ComponentRegistry::builtin(&templates_root());
        let cache = TemplateCache::new();
        let mut loader = loader(&registry, &cache);

        let a = loader.load("record_text").unwrap();
        let b = loader.load("record_text").unwrap();
        assert_eq!(cache.len(), 1);
        assert_ne!(a.node.attr("xPos"), b.node.attr("xPos"));

        let template = cache
            .get_or_load(&registry.resolve("record_text").unwrap().location)
            .unwrap();
        assert_eq!(template.root.attr("xPos"), Some("0"));
    }

    #[test]
    fn undecodable_blob_keeps_coordinates() {
        let tmp = std::env::temp_dir().join(format!("rf-loader-test-{}", uuid::Uuid::new_v4()));
        std::fs::create_dir_all(&tmp).unwrap();
        let path = tmp.join("broken.xml");
        std::fs::write(
            &path,
            r#"<eProcCompObject compNo="0" xPos="0" yPos="0" objectConfig="not json"/>"#,
        )
        .unwrap();

        let mut registry = ComponentRegistry::default();
        registry.register(crate::registry::Component {
            name: "broken".into(),
            location: path,
            category: recipeforge_shared::ComponentCategory::Root,
            description: String::new(),
        });
        let cache = TemplateCache::new();
        let mut loader = loader(&registry, &cache);

        let fragment = loader.load("broken").unwrap();
        assert!(!fragment.blob_rewritten);
        assert_eq!(fragment.node.attr("objectConfig"), Some("not json"));
        assert_eq!(fragment.node.attr("xPos"), Some("300"));

        let _ = std::fs::remove_dir_all(&tmp);
    }
}
