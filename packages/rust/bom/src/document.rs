//! An assembled BOM: one `MM_BOM` header holding the line items, plus one
//! `MM_OBJ` base object per material, all under `eSpecXmlObjs`.

use std::collections::HashSet;
use std::path::Path;

use recipeforge_document::{Document, Element};
use recipeforge_shared::{RecipeForgeError, Result, schema};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BomDocument {
    doc: Document,
}

fn is_header(e: &Element) -> bool {
    e.name == schema::PROC_OBJECT && e.attr_is(schema::OBJ_TYPE, schema::OBJ_TYPE_BOM)
}

fn is_base_object(e: &Element) -> bool {
    e.name == schema::PROC_OBJECT && e.attr_is(schema::OBJ_TYPE, schema::OBJ_TYPE_MATERIAL)
}

impl BomDocument {
    /// Wrap a parsed document, checking that it has the expected shape.
    pub fn from_document(doc: Document) -> Result<Self> {
        let bom = Self { doc };
        bom.validate()?;
        Ok(bom)
    }

    /// Read a previously written BOM.
    pub fn from_path(path: &Path) -> Result<Self> {
        Self::from_document(Document::from_path(path)?)
    }

    pub(crate) fn new_unchecked(doc: Document) -> Self {
        Self { doc }
    }

    /// The `eSpecXmlObjs` container holding the header and base objects.
    pub fn objects(&self) -> Option<&Element> {
        if self.doc.root.name == schema::SPEC_OBJECTS {
            Some(&self.doc.root)
        } else {
            self.doc.root.child(schema::SPEC_OBJECTS)
        }
    }

    pub fn header(&self) -> Option<&Element> {
        self.objects().and_then(|objs| objs.elements().find(|e| is_header(e)))
    }

    /// The BOM id, or `""` when the header is missing.
    pub fn bom_id(&self) -> &str {
        self.header()
            .and_then(|h| h.attr(schema::ID))
            .unwrap_or_default()
    }

    pub fn version(&self) -> &str {
        self.header()
            .and_then(|h| h.attr(schema::VERSION))
            .unwrap_or_default()
    }

    pub fn line_items(&self) -> Vec<&Element> {
        self.header()
            .map(|h| h.descendants_named(schema::BOM_ITEM))
            .unwrap_or_default()
    }

    pub fn base_objects(&self) -> Vec<&Element> {
        self.objects()
            .map(|objs| objs.elements().filter(|e| is_base_object(e)).collect())
            .unwrap_or_default()
    }

    /// Top-level nodes in document order: the header and the base objects.
    pub fn top_level_nodes(&self) -> Vec<&Element> {
        self.objects()
            .map(|objs| objs.elements().collect())
            .unwrap_or_default()
    }

    /// Material ids referenced by the line items, in order.
    pub fn material_ids(&self) -> Vec<&str> {
        self.line_items()
            .into_iter()
            .filter_map(|item| item.attr(schema::ITEM_OBJ_ID))
            .collect()
    }

    /// Check the header, the top-level shape, and the line-item → base-object
    /// references.
    pub fn validate(&self) -> Result<()> {
        let objs = self
            .objects()
            .ok_or_else(|| RecipeForgeError::validation("BOM has no eSpecXmlObjs container"))?;

        let headers: Vec<_> = objs.elements().filter(|e| is_header(e)).collect();
        let header = match headers.as_slice() {
            [header] => *header,
            [] => return Err(RecipeForgeError::validation("BOM has no MM_BOM header")),
            _ => {
                return Err(RecipeForgeError::validation(format!(
                    "BOM has {} MM_BOM headers, expected one",
                    headers.len()
                )));
            }
        };
        if header.attr(schema::ID).is_none_or(str::is_empty) {
            return Err(RecipeForgeError::validation("BOM header has no id"));
        }

        if let Some(other) = objs.elements().find(|e| !is_header(e) && !is_base_object(e)) {
            return Err(RecipeForgeError::validation(format!(
                "BOM has unexpected top-level <{}> objType='{}', only the MM_BOM header and MM_OBJ base objects are allowed",
                other.name,
                other.attr(schema::OBJ_TYPE).unwrap_or_default()
            )));
        }

        let mut base_ids = HashSet::new();
        for base in self.base_objects() {
            let id = base.attr(schema::ID).unwrap_or_default();
            if id.is_empty() {
                return Err(RecipeForgeError::validation("BOM base object has no id"));
            }
            if !base_ids.insert(id) {
                return Err(RecipeForgeError::validation(format!(
                    "BOM has duplicate base object '{id}'"
                )));
            }
        }

        let items = self.line_items();
        if items.is_empty() {
            return Err(RecipeForgeError::validation("BOM has no line items"));
        }
        for item in items {
            let id = item.attr(schema::ITEM_OBJ_ID).unwrap_or_default();
            if !base_ids.contains(id) {
                return Err(RecipeForgeError::validation(format!(
                    "line item references material '{id}' with no base object"
                )));
            }
        }

        Ok(())
    }

    pub fn render(&self) -> Result<String> {
        self.doc.render()
    }

    /// Write atomically, keeping the XML declaration.
    pub fn write(&self, path: &Path) -> Result<()> {
        self.doc.write(path)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const BOM: &str = r#"<?xml version="1.0" encoding="utf-8"?>
<eSpecXml>
  <eSpecXmlObjs>
    <eProcObject objType="MM_BOM" id="B1" version="1.001">
      <eProcBomItem itemObjId="M1"/>
      <eProcBomItem itemObjId="M2"/>
    </eProcObject>
    <eProcObject objType="MM_OBJ" id="M1"/>
    <eProcObject objType="MM_OBJ" id="M2"/>
  </eSpecXmlObjs>
</eSpecXml>
"#;

    #[test]
    fn accessors_read_the_header() {
        let bom = BomDocument::from_document(Document::parse(BOM, "bom").unwrap()).unwrap();
        assert_eq!(bom.bom_id(), "B1");
        assert_eq!(bom.version(), "1.001");
        assert_eq!(bom.material_ids(), vec!["M1", "M2"]);
        assert_eq!(bom.base_objects().len(), 2);
        assert_eq!(bom.top_level_nodes().len(), 3);
    }

    #[test]
    fn dangling_line_item_fails_validation() {
        let xml = BOM.replace(r#"<eProcObject objType="MM_OBJ" id="M2"/>"#, "");
        let err = BomDocument::from_document(Document::parse(&xml, "bom").unwrap()).unwrap_err();
        assert!(err.to_string().contains("'M2' with no base object"));
    }

    #[test]
    fn foreign_top_level_nodes_fail_validation() {
        let xml = BOM.replace(
            r#"<eProcObject objType="MM_OBJ" id="M2"/>"#,
            r#"<eProcObject objType="MM_OBJ" id="M2"/><eProcObject objType="MM_UOM" id="KG"/>"#,
        );
        let err = BomDocument::from_document(Document::parse(&xml, "bom").unwrap()).unwrap_err();
        assert!(matches!(err, RecipeForgeError::Validation { .. }));
        assert!(err.to_string().contains("objType='MM_UOM'"));

        // Comments between objects are not nodes of their own.
        let xml = BOM.replace(
            r#"<eProcObject objType="MM_OBJ" id="M1"/>"#,
            r#"<!-- sugar --><eProcObject objType="MM_OBJ" id="M1"/>"#,
        );
        assert!(BomDocument::from_document(Document::parse(&xml, "bom").unwrap()).is_ok());
    }

    #[test]
    fn missing_header_fails_validation() {
        let xml = BOM.replace("MM_BOM", "MM_OTHER");
        let err = BomDocument::from_document(Document::parse(&xml, "bom").unwrap()).unwrap_err();
        assert!(err.to_string().contains("no MM_BOM header"));
    }
}
