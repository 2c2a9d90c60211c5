//! The recipe document being assembled, and its structural invariants.
//!
//! A recipe has exactly one *operation anchor*: an `eProcObject` directly
//! under `eSpecXmlObjs` whose `objType` matches the configured marker.
//! Components and sequence connectors live directly inside the anchor.

use std::collections::{HashMap, HashSet};
use std::path::Path;

use recipeforge_document::{Document, Element};
use recipeforge_shared::{CHAIN_END, CHAIN_START, FIRST_COMP_NO, RecipeForgeError, Result, schema};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecipeDocument {
    doc: Document,
    marker: String,
    origin: String,
}

impl RecipeDocument {
    /// Wrap a parsed document. Recipes are written without an XML declaration.
    pub fn new(mut doc: Document, marker: impl Into<String>, origin: impl Into<String>) -> Self {
        doc.declaration = None;
        Self {
            doc,
            marker: marker.into(),
            origin: origin.into(),
        }
    }

    pub fn from_path(path: &Path, marker: impl Into<String>) -> Result<Self> {
        let doc = Document::from_path(path)?;
        Ok(Self::new(doc, marker, path.display().to_string()))
    }

    pub fn root(&self) -> &Element {
        &self.doc.root
    }

    pub fn root_mut(&mut self) -> &mut Element {
        &mut self.doc.root
    }

    // -----------------------------------------------------------------------
    // Anchors
    // -----------------------------------------------------------------------

    /// Path from the root to the unique anchor with `objType == marker`.
    pub fn locate(&self, marker: &str) -> Result<Vec<usize>> {
        let mut paths = self.doc.root.find_paths(|parent, e| {
            parent.name == schema::SPEC_OBJECTS
                && e.name == schema::PROC_OBJECT
                && e.attr_is(schema::OBJ_TYPE, marker)
        });
        match paths.len() {
            0 => Err(RecipeForgeError::anchor_not_found(marker, self.origin.as_str())),
            1 => Ok(paths.remove(0)),
            n => Err(RecipeForgeError::validation(format!(
                "{}: {n} eProcObject nodes with objType='{marker}', expected exactly one",
                self.origin
            ))),
        }
    }

    pub fn anchor_path(&self) -> Result<Vec<usize>> {
        self.locate(&self.marker)
    }

    pub fn anchor(&self) -> Result<&Element> {
        let path = self.anchor_path()?;
        self.doc
            .root
            .at_path(&path)
            .ok_or_else(|| RecipeForgeError::anchor_not_found(self.marker.as_str(), self.origin.as_str()))
    }

    // -----------------------------------------------------------------------
    // Accessors
    // -----------------------------------------------------------------------

    pub fn operation_guid(&self) -> Option<&str> {
        self.anchor().ok().and_then(|a| a.attr(schema::GUID))
    }

    /// Component instances inside the anchor, in document order.
    pub fn components(&self) -> Vec<&Element> {
        self.anchor_children(schema::COMPONENT)
    }

    /// `(fromCompNo, toCompNo)` of every connector inside the anchor, in
    /// document order. Unparseable numbers are reported as `None`.
    pub fn connectors(&self) -> Vec<(Option<i64>, Option<i64>)> {
        self.anchor_children(schema::CONNECTOR)
            .into_iter()
            .map(|c| (comp_no(c, schema::FROM_COMP_NO), comp_no(c, schema::TO_COMP_NO)))
            .collect()
    }

    /// BOM references inside the anchor.
    pub fn bom_refs(&self) -> Vec<&Element> {
        self.anchor_children(schema::OBJECT_REF)
            .into_iter()
            .filter(|e| e.attr_is(schema::REF_OBJ_TYPE, schema::OBJ_TYPE_BOM))
            .collect()
    }

    fn anchor_children(&self, name: &str) -> Vec<&Element> {
        self.anchor()
            .map(|a| a.elements().filter(|e| e.name == name).collect())
            .unwrap_or_default()
    }

    // -----------------------------------------------------------------------
    // Validation
    // -----------------------------------------------------------------------

    /// Check anchor uniqueness, the compNo sequence, guid and instanceId
    /// uniqueness, data-line stamping, and the connector chain.
    pub fn validate(&self) -> Result<()> {
        let invalid = |msg: String| RecipeForgeError::validation(format!("{}: {msg}", self.origin));

        let anchor = self.anchor()?;
        let anchor_guid = anchor.attr(schema::GUID).unwrap_or_default();
        if anchor_guid.is_empty() {
            return Err(invalid("operation anchor has no guid".into()));
        }

        let mut guids = HashSet::from([anchor_guid]);
        let mut instance_ids = HashSet::new();
        let mut chain = vec![CHAIN_START];

        for (offset, component) in self.components().into_iter().enumerate() {
            let expected = FIRST_COMP_NO + offset as i64;
            let number = comp_no(component, schema::COMP_NO);
            if number != Some(expected) {
                return Err(invalid(format!(
                    "component #{} has compNo {:?}, expected {expected}",
                    offset + 1,
                    component.attr(schema::COMP_NO)
                )));
            }
            chain.push(expected);

            let instance_id = component.attr(schema::INSTANCE_ID).unwrap_or_default();
            if instance_id.is_empty() || !instance_ids.insert(instance_id) {
                return Err(invalid(format!(
                    "component {expected} has a missing or duplicate instanceId '{instance_id}'"
                )));
            }

            let guid = component.attr(schema::GUID).unwrap_or_default();
            if guid.is_empty() || !guids.insert(guid) {
                return Err(invalid(format!(
                    "component {expected} has a missing or duplicate guid '{guid}'"
                )));
            }

            for line in component.descendants_named(schema::DATA_LINE) {
                if !line.attr_is(schema::GUID, guid) || !line.attr_is(schema::PARENT_GUID, anchor_guid) {
                    return Err(invalid(format!(
                        "data line of component {expected} is not stamped with its owner's guids"
                    )));
                }
            }
        }
        chain.push(CHAIN_END);

        let connectors = self.connectors();
        if connectors.len() != chain.len() - 1 {
            return Err(invalid(format!(
                "{} connectors for {} components, expected {}",
                connectors.len(),
                chain.len() - 2,
                chain.len() - 1
            )));
        }

        let mut next = HashMap::new();
        for (from, to) in connectors {
            let (Some(from), Some(to)) = (from, to) else {
                return Err(invalid("connector with a non-numeric compNo".into()));
            };
            if next.insert(from, to).is_some() {
                return Err(invalid(format!("more than one connector leaves {from}")));
            }
        }
        for link in chain.windows(2) {
            if next.get(&link[0]) != Some(&link[1]) {
                return Err(invalid(format!(
                    "sequence chain is broken: no connector {} -> {}",
                    link[0], link[1]
                )));
            }
        }

        Ok(())
    }

    // -----------------------------------------------------------------------
    // Output
    // -----------------------------------------------------------------------

    pub fn render(&self) -> Result<String> {
        self.doc.render()
    }

    pub fn write(&self, path: &Path) -> Result<()> {
        self.doc.write(path)
    }
}

fn comp_no(element: &Element, attr: &str) -> Option<i64> {
    element.attr(attr).and_then(|v| v.trim().parse().ok())
}
