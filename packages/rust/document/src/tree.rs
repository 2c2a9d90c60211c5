//! Owned element tree: attributes, children, lookup, and in-place edits.
//!
//! Elements are addressed by *paths*: the sequence of indices into each
//! ancestor's `children` vector, starting below the element the path was
//! computed from. An empty path addresses that element itself.

/// A child of an [`Element`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Node {
    Element(Element),
    Text(String),
    CData(String),
    Comment(String),
}

impl Node {
    /// The element behind this node, if it is one.
    pub fn as_element(&self) -> Option<&Element> {
        match self {
            Node::Element(e) => Some(e),
            _ => None,
        }
    }

    pub fn as_element_mut(&mut self) -> Option<&mut Element> {
        match self {
            Node::Element(e) => Some(e),
            _ => None,
        }
    }
}

impl From<Element> for Node {
    fn from(element: Element) -> Self {
        Node::Element(element)
    }
}

/// A single `name="value"` pair. Values are stored unescaped.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Attribute {
    pub name: String,
    pub value: String,
}

/// An XML element with ordered attributes and children.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Element {
    pub name: String,
    pub attributes: Vec<Attribute>,
    pub children: Vec<Node>,
}

impl Element {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            attributes: Vec::new(),
            children: Vec::new(),
        }
    }

    /// Builder-style attribute setter.
    pub fn with_attr(mut self, name: &str, value: impl Into<String>) -> Self {
        self.set_attr(name, value);
        self
    }

    pub fn attr(&self, name: &str) -> Option<&str> {
        self.attributes
            .iter()
            .find(|a| a.name == name)
            .map(|a| a.value.as_str())
    }

    pub fn has_attr(&self, name: &str) -> bool {
        self.attributes.iter().any(|a| a.name == name)
    }

    /// `true` when the attribute exists and equals `value`.
    pub fn attr_is(&self, name: &str, value: &str) -> bool {
        self.attr(name) == Some(value)
    }

    /// Set an attribute, replacing the value in place if it already exists
    /// (attribute order is preserved), appending it otherwise.
    pub fn set_attr(&mut self, name: &str, value: impl Into<String>) {
        let value = value.into();
        match self.attributes.iter_mut().find(|a| a.name == name) {
            Some(existing) => existing.value = value,
            None => self.attributes.push(Attribute {
                name: name.to_string(),
                value,
            }),
        }
    }

    pub fn remove_attr(&mut self, name: &str) -> Option<String> {
        let index = self.attributes.iter().position(|a| a.name == name)?;
        Some(self.attributes.remove(index).value)
    }

    /// Concatenated text of the direct text children.
    pub fn text(&self) -> String {
        self.children
            .iter()
            .filter_map(|n| match n {
                Node::Text(t) | Node::CData(t) => Some(t.as_str()),
                _ => None,
            })
            .collect()
    }

    // -----------------------------------------------------------------------
    // Children
    // -----------------------------------------------------------------------

    /// Direct child elements, in document order.
    pub fn elements(&self) -> impl Iterator<Item = &Element> {
        self.children.iter().filter_map(Node::as_element)
    }

    pub fn elements_mut(&mut self) -> impl Iterator<Item = &mut Element> {
        self.children.iter_mut().filter_map(Node::as_element_mut)
    }

    /// First direct child element named `name`.
    pub fn child(&self, name: &str) -> Option<&Element> {
        self.elements().find(|e| e.name == name)
    }

    pub fn child_mut(&mut self, name: &str) -> Option<&mut Element> {
        self.elements_mut().find(|e| e.name == name)
    }

    pub fn push(&mut self, node: impl Into<Node>) {
        self.children.push(node.into());
    }

    /// Insert at `index` in `children`, clamped to the end.
    pub fn insert(&mut self, index: usize, node: impl Into<Node>) {
        let index = index.min(self.children.len());
        self.children.insert(index, node.into());
    }

    /// Insert several nodes starting at `index` in `children`, clamped to the end.
    pub fn insert_all(&mut self, index: usize, nodes: impl IntoIterator<Item = Node>) {
        let index = index.min(self.children.len());
        self.children.splice(index..index, nodes);
    }

    /// Remove every direct child element matching `pred`; returns how many went.
    pub fn remove_elements(&mut self, mut pred: impl FnMut(&Element) -> bool) -> usize {
        let before = self.children.len();
        self.children
            .retain(|n| !matches!(n, Node::Element(e) if pred(e)));
        before - self.children.len()
    }

    /// Index in `children` of the first element matching `pred`.
    pub fn position(&self, mut pred: impl FnMut(&Element) -> bool) -> Option<usize> {
        self.children
            .iter()
            .position(|n| matches!(n, Node::Element(e) if pred(e)))
    }

    /// Index in `children` of the last element matching `pred`.
    pub fn rposition(&self, mut pred: impl FnMut(&Element) -> bool) -> Option<usize> {
        self.children
            .iter()
            .rposition(|n| matches!(n, Node::Element(e) if pred(e)))
    }

    // -----------------------------------------------------------------------
    // Descendants
    // -----------------------------------------------------------------------

    /// Depth-first, document-order search below this element (self excluded).
    pub fn find(&self, pred: impl Fn(&Element) -> bool + Copy) -> Option<&Element> {
        for child in self.elements() {
            if pred(child) {
                return Some(child);
            }
            if let Some(found) = child.find(pred) {
                return Some(found);
            }
        }
        None
    }

    /// Every descendant matching `pred`, in document order (self excluded).
    pub fn find_all(&self, pred: impl Fn(&Element) -> bool + Copy) -> Vec<&Element> {
        let mut out = Vec::new();
        self.collect_into(pred, &mut out);
        out
    }

    fn collect_into<'a>(&'a self, pred: impl Fn(&Element) -> bool + Copy, out: &mut Vec<&'a Element>) {
        for child in self.elements() {
            if pred(child) {
                out.push(child);
            }
            child.collect_into(pred, out);
        }
    }

    /// Descendants named `name`, in document order.
    pub fn descendants_named(&self, name: &str) -> Vec<&Element> {
        self.find_all(|e| e.name == name)
    }

    /// Apply `f` to every descendant matching `pred` (self excluded).
    /// Returns how many elements were visited.
    pub fn for_each_descendant_mut(
        &mut self,
        pred: impl Fn(&Element) -> bool + Copy,
        f: &mut impl FnMut(&mut Element),
    ) -> usize {
        let mut count = 0;
        for child in self.elements_mut() {
            if pred(child) {
                f(child);
                count += 1;
            }
            count += child.for_each_descendant_mut(pred, f);
        }
        count
    }

    // -----------------------------------------------------------------------
    // Paths
    // -----------------------------------------------------------------------

    /// Paths of every descendant for which `pred(parent, element)` holds,
    /// in document order. The parent is always an element of this tree.
    pub fn find_paths(&self, pred: impl Fn(&Element, &Element) -> bool + Copy) -> Vec<Vec<usize>> {
        let mut out = Vec::new();
        let mut prefix = Vec::new();
        self.paths_into(pred, &mut prefix, &mut out);
        out
    }

    fn paths_into(
        &self,
        pred: impl Fn(&Element, &Element) -> bool + Copy,
        prefix: &mut Vec<usize>,
        out: &mut Vec<Vec<usize>>,
    ) {
        for (index, node) in self.children.iter().enumerate() {
            if let Node::Element(child) = node {
                prefix.push(index);
                if pred(self, child) {
                    out.push(prefix.clone());
                }
                child.paths_into(pred, prefix, out);
                prefix.pop();
            }
        }
    }

    pub fn at_path(&self, path: &[usize]) -> Option<&Element> {
        let mut current = self;
        for &index in path {
            current = current.children.get(index)?.as_element()?;
        }
        Some(current)
    }

    pub fn at_path_mut(&mut self, path: &[usize]) -> Option<&mut Element> {
        let mut current = self;
        for &index in path {
            current = current.children.get_mut(index)?.as_element_mut()?;
        }
        Some(current)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> Element {
        let mut root = Element::new("root");
        let mut objs = Element::new("objs");
        objs.push(Element::new("item").with_attr("id", "a"));
        objs.push(Node::Text("between".into()));
        let mut nested = Element::new("item").with_attr("id", "b");
        nested.push(Element::new("item").with_attr("id", "c"));
        objs.push(nested);
        root.push(objs);
        root
    }

    #[test]
    fn set_attr_replaces_in_place() {
        let mut e = Element::new("x").with_attr("a", "1").with_attr("b", "2");
        e.set_attr("a", "9");
        assert_eq!(e.attributes[0].name, "a");
        assert_eq!(e.attr("a"), Some("9"));
        assert_eq!(e.remove_attr("b").as_deref(), Some("2"));
        assert!(!e.has_attr("b"));
    }

    #[test]
    fn find_all_is_document_order() {
        let root = sample();
        let ids: Vec<_> = root
            .descendants_named("item")
            .iter()
            .filter_map(|e| e.attr("id"))
            .collect();
        assert_eq!(ids, vec!["a", "b", "c"]);
        assert!(root.find(|e| e.attr_is("id", "c")).is_some());
        assert!(root.find(|e| e.name == "root").is_none());
    }

    #[test]
    fn paths_address_elements_through_text_nodes() {
        let root = sample();
        let paths = root.find_paths(|parent, e| parent.name == "objs" && e.name == "item");
        assert_eq!(paths, vec![vec![0, 0], vec![0, 2]]);
        assert_eq!(root.at_path(&paths[1]).and_then(|e| e.attr("id")), Some("b"));
        assert!(root.at_path(&[0, 1]).is_none());
    }

    #[test]
    fn mutation_helpers() {
        let mut root = sample();
        let visited = root.for_each_descendant_mut(|e| e.name == "item", &mut |e: &mut Element| {
            e.set_attr("seen", "yes")
        });
        assert_eq!(visited, 3);

        let objs = root.child_mut("objs").unwrap();
        assert_eq!(objs.rposition(|e| e.name == "item"), Some(2));
        objs.insert_all(
            1,
            vec![Node::Element(Element::new("new")), Node::Comment("c".into())],
        );
        assert_eq!(objs.position(|e| e.name == "new"), Some(1));
        assert_eq!(objs.remove_elements(|e| e.attr_is("id", "a")), 1);
        assert_eq!(objs.position(|e| e.name == "new"), Some(0));
        assert_eq!(objs.text(), "between");
    }
}
