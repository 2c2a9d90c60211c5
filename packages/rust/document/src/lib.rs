//! XML document model for RecipeForge.
//!
//! Parses eSpec XML with `quick-xml` into an owned [`Element`] tree that can be
//! cloned, queried, and edited in place, then renders it back with stable
//! indentation. Whitespace-only text between elements is dropped on parse and
//! regenerated on render.

mod tree;

use std::borrow::Cow;
use std::io::Write;
use std::path::Path;

use quick_xml::Reader;
use quick_xml::Writer;
use quick_xml::events::{BytesCData, BytesDecl, BytesEnd, BytesStart, BytesText, Event};
use tracing::{debug, instrument};

use recipeforge_shared::{RecipeForgeError, Result};

pub use tree::{Attribute, Element, Node};

/// Indentation used when rendering documents.
const INDENT_CHAR: u8 = b' ';
const INDENT_SIZE: usize = 2;

// ---------------------------------------------------------------------------
// Document
// ---------------------------------------------------------------------------

/// The `<?xml ...?>` declaration of a document.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Declaration {
    pub version: String,
    pub encoding: Option<String>,
    pub standalone: Option<String>,
}

impl Default for Declaration {
    fn default() -> Self {
        Self {
            version: "1.0".into(),
            encoding: Some("utf-8".into()),
            standalone: None,
        }
    }
}

/// A parsed XML document: optional declaration plus one root element.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Document {
    pub declaration: Option<Declaration>,
    pub root: Element,
}

impl Document {
    /// Wrap a root element, without a declaration.
    pub fn new(root: Element) -> Self {
        Self {
            declaration: None,
            root,
        }
    }

    /// Parse a document from a string. `origin` names the source in errors.
    pub fn parse(xml: &str, origin: &str) -> Result<Self> {
        parse_document(xml, origin)
    }

    /// Read and parse a document from disk.
    #[instrument(skip_all, fields(path = %path.display()))]
    pub fn from_path(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path).map_err(|e| RecipeForgeError::io(path, e))?;
        let doc = parse_document(&content, &path.display().to_string())?;
        debug!(root = %doc.root.name, "parsed document");
        Ok(doc)
    }

    /// Render to a string (trailing newline included).
    pub fn render(&self) -> Result<String> {
        render_document(self)
    }

    /// Render and write the document atomically to `path`.
    pub fn write(&self, path: &Path) -> Result<()> {
        let xml = self.render()?;
        write_atomic(path, xml.as_bytes())?;
        debug!(path = %path.display(), bytes = xml.len(), "wrote document");
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Parsing
// ---------------------------------------------------------------------------

fn parse_document(xml: &str, origin: &str) -> Result<Document> {
    let mut reader = Reader::from_str(xml);
    reader.trim_text(true);

    let xml_err = |position: usize, e: quick_xml::Error| {
        RecipeForgeError::parse(format!("{origin}: at byte {position}: {e}"))
    };

    let mut declaration = None;
    let mut stack: Vec<Element> = Vec::new();
    let mut root: Option<Element> = None;

    loop {
        let event = reader
            .read_event()
            .map_err(|e| xml_err(reader.buffer_position(), e))?;

        match event {
            Event::Decl(decl) => {
                declaration = Some(
                    read_declaration(&decl).map_err(|e| xml_err(reader.buffer_position(), e))?,
                );
            }
            Event::Start(start) => {
                let element =
                    element_from_start(&start).map_err(|e| xml_err(reader.buffer_position(), e))?;
                stack.push(element);
            }
            Event::Empty(start) => {
                let element =
                    element_from_start(&start).map_err(|e| xml_err(reader.buffer_position(), e))?;
                attach_node(&mut stack, &mut root, Node::Element(element), origin)?;
            }
            Event::End(_) => {
                let element = stack.pop().ok_or_else(|| {
                    RecipeForgeError::parse(format!("{origin}: unbalanced closing tag"))
                })?;
                attach_node(&mut stack, &mut root, Node::Element(element), origin)?;
            }
            Event::Text(text) => {
                let text = text
                    .unescape()
                    .map_err(|e| xml_err(reader.buffer_position(), e))?;
                if let Some(parent) = stack.last_mut() {
                    parent.children.push(Node::Text(text.into_owned()));
                }
            }
            Event::CData(cdata) => {
                if let Some(parent) = stack.last_mut() {
                    let content = String::from_utf8_lossy(&cdata.into_inner()).into_owned();
                    parent.children.push(Node::CData(content));
                }
            }
            Event::Comment(comment) => {
                if let Some(parent) = stack.last_mut() {
                    let content = String::from_utf8_lossy(&comment).into_owned();
                    parent.children.push(Node::Comment(content));
                }
            }
            Event::PI(_) | Event::DocType(_) => {}
            Event::Eof => break,
        }
    }

    if !stack.is_empty() {
        return Err(RecipeForgeError::parse(format!(
            "{origin}: unexpected end of document inside <{}>",
            stack.last().map(|e| e.name.as_str()).unwrap_or_default()
        )));
    }

    let root =
        root.ok_or_else(|| RecipeForgeError::parse(format!("{origin}: no root element")))?;

    Ok(Document { declaration, root })
}

/// Hand a finished node to its parent, or make it the document root.
fn attach_node(
    stack: &mut [Element],
    root: &mut Option<Element>,
    node: Node,
    origin: &str,
) -> Result<()> {
    if let Some(parent) = stack.last_mut() {
        parent.children.push(node);
        return Ok(());
    }

    match node {
        Node::Element(element) if root.is_none() => {
            *root = Some(element);
            Ok(())
        }
        Node::Element(element) => Err(RecipeForgeError::parse(format!(
            "{origin}: second root element <{}>",
            element.name
        ))),
        _ => Ok(()),
    }
}

fn element_from_start(start: &BytesStart<'_>) -> std::result::Result<Element, quick_xml::Error> {
    let mut element = Element::new(String::from_utf8_lossy(start.name().as_ref()).into_owned());
    for attr in start.attributes() {
        let attr = attr?;
        let name = String::from_utf8_lossy(attr.key.as_ref()).into_owned();
        let value = attr.unescape_value()?.into_owned();
        element.attributes.push(Attribute { name, value });
    }
    Ok(element)
}

fn read_declaration(decl: &BytesDecl<'_>) -> std::result::Result<Declaration, quick_xml::Error> {
    let lossy = |bytes: Cow<'_, [u8]>| String::from_utf8_lossy(&bytes).into_owned();

    let version = lossy(decl.version()?);
    let encoding = decl.encoding().transpose()?.map(lossy);
    let standalone = decl.standalone().transpose()?.map(lossy);

    Ok(Declaration {
        version,
        encoding,
        standalone,
    })
}

// ---------------------------------------------------------------------------
// Rendering
// ---------------------------------------------------------------------------

fn render_document(doc: &Document) -> Result<String> {
    let mut writer = Writer::new_with_indent(Vec::new(), INDENT_CHAR, INDENT_SIZE);

    if let Some(decl) = &doc.declaration {
        writer
            .write_event(Event::Decl(BytesDecl::new(
                &decl.version,
                decl.encoding.as_deref(),
                decl.standalone.as_deref(),
            )))
            .map_err(|e| RecipeForgeError::Render(e.to_string()))?;
    }

    write_element(&mut writer, &doc.root).map_err(|e| RecipeForgeError::Render(e.to_string()))?;

    let mut bytes = writer.into_inner();
    bytes.push(b'\n');
    String::from_utf8(bytes).map_err(|e| RecipeForgeError::Render(e.to_string()))
}

fn write_element<W: Write>(
    writer: &mut Writer<W>,
    element: &Element,
) -> std::result::Result<(), quick_xml::Error> {
    let mut start = BytesStart::new(element.name.as_str());
    for attr in &element.attributes {
        start.push_attribute((attr.name.as_str(), attr.value.as_str()));
    }

    if element.children.is_empty() {
        writer.write_event(Event::Empty(start))?;
        return Ok(());
    }

    writer.write_event(Event::Start(start))?;
    for child in &element.children {
        match child {
            Node::Element(e) => write_element(writer, e)?,
            Node::Text(text) => writer.write_event(Event::Text(BytesText::new(text)))?,
            Node::CData(text) => writer.write_event(Event::CData(BytesCData::new(text.as_str())))?,
            Node::Comment(text) => {
                writer.write_event(Event::Comment(BytesText::from_escaped(text.as_str())))?
            }
        }
    }
    writer.write_event(Event::End(BytesEnd::new(element.name.as_str())))?;
    Ok(())
}

// ---------------------------------------------------------------------------
// Output
// ---------------------------------------------------------------------------

/// Write `bytes` to `path` via a temp file in the same directory and a rename,
/// so readers never observe a half-written document.
pub fn write_atomic(path: &Path, bytes: &[u8]) -> Result<()> {
    let dir = match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent.to_path_buf(),
        _ => std::path::PathBuf::from("."),
    };
    std::fs::create_dir_all(&dir).map_err(|e| RecipeForgeError::io(&dir, e))?;

    let file_name = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .ok_or_else(|| RecipeForgeError::validation(format!("not a file path: {}", path.display())))?;
    let temp = dir.join(format!(".{file_name}.tmp"));

    let result = std::fs::File::create(&temp)
        .and_then(|mut file| {
            file.write_all(bytes)?;
            file.sync_all()
        })
        .map_err(|e| RecipeForgeError::io(&temp, e))
        .and_then(|()| std::fs::rename(&temp, path).map_err(|e| RecipeForgeError::io(path, e)));

    if result.is_err() {
        let _ = std::fs::remove_file(&temp);
    }
    result
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
