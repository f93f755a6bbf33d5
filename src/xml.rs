//! Minimal mutable element tree over quick-xml
//!
//! METS templates are parsed once into an owned tree, mutated in place by
//! the transformation stages, then serialized back with an XML declaration
//! and 4-space indentation. Element and attribute names are kept verbatim
//! as written in the template (including namespace prefixes), so output
//! uses the same prefixes as the input.

use std::fs;
use std::path::Path;

use quick_xml::escape::escape;
use quick_xml::events::Event;
use quick_xml::Reader;

use crate::error::TransformError;

/// A child node: nested element or text content
#[derive(Debug, Clone, PartialEq)]
pub enum Node {
    Element(Element),
    Text(String),
}

/// An XML element with ordered attributes and children
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Element {
    /// Qualified name as written in the source, e.g. "div" or "mets:div"
    pub name: String,
    pub attrs: Vec<(String, String)>,
    pub children: Vec<Node>,
}

impl Element {
    pub fn new(name: impl Into<String>) -> Self {
        Element {
            name: name.into(),
            attrs: Vec::new(),
            children: Vec::new(),
        }
    }

    /// Local part of the element name (after any namespace prefix)
    pub fn local_name(&self) -> &str {
        match self.name.rfind(':') {
            Some(pos) => &self.name[pos + 1..],
            None => &self.name,
        }
    }

    pub fn attr(&self, key: &str) -> Option<&str> {
        self.attrs
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.as_str())
    }

    /// Set an attribute, replacing an existing value or appending a new one
    /// while preserving attribute order
    pub fn set_attr(&mut self, key: impl Into<String>, value: impl Into<String>) {
        let key = key.into();
        let value = value.into();
        match self.attrs.iter_mut().find(|(k, _)| *k == key) {
            Some(entry) => entry.1 = value,
            None => self.attrs.push((key, value)),
        }
    }

    pub fn remove_attr(&mut self, key: &str) -> Option<String> {
        let pos = self.attrs.iter().position(|(k, _)| k == key)?;
        Some(self.attrs.remove(pos).1)
    }

    /// Concatenated text content of direct text children
    pub fn text(&self) -> Option<&str> {
        self.children.iter().find_map(|n| match n {
            Node::Text(t) => Some(t.as_str()),
            Node::Element(_) => None,
        })
    }

    /// Replace all children with a single text node
    pub fn set_text(&mut self, text: impl Into<String>) {
        self.children = vec![Node::Text(text.into())];
    }

    pub fn push(&mut self, child: Element) {
        self.children.push(Node::Element(child));
    }

    /// Direct child elements
    pub fn elements(&self) -> impl Iterator<Item = &Element> {
        self.children.iter().filter_map(|n| match n {
            Node::Element(e) => Some(e),
            Node::Text(_) => None,
        })
    }

    pub fn elements_mut(&mut self) -> impl Iterator<Item = &mut Element> {
        self.children.iter_mut().filter_map(|n| match n {
            Node::Element(e) => Some(e),
            Node::Text(_) => None,
        })
    }

    /// First direct child element with the given local name
    pub fn find(&self, local: &str) -> Option<&Element> {
        self.elements().find(|e| e.local_name() == local)
    }

    pub fn find_mut(&mut self, local: &str) -> Option<&mut Element> {
        self.elements_mut().find(|e| e.local_name() == local)
    }

    /// All direct child elements with the given local name
    pub fn find_all(&self, local: &str) -> impl Iterator<Item = &Element> {
        let local = local.to_string();
        self.elements().filter(move |e| e.local_name() == local)
    }

    pub fn find_all_mut(&mut self, local: &str) -> impl Iterator<Item = &mut Element> {
        let local = local.to_string();
        self.elements_mut().filter(move |e| e.local_name() == local)
    }

    /// Remove direct child elements failing the predicate; text nodes are kept
    pub fn retain_elements(&mut self, mut keep: impl FnMut(&Element) -> bool) {
        self.children.retain(|n| match n {
            Node::Element(e) => keep(e),
            Node::Text(_) => true,
        });
    }
}

/// A parsed XML document
#[derive(Debug, Clone)]
pub struct Document {
    pub root: Element,
}

impl Document {
    /// Parse a document from a string. Comments, processing instructions
    /// and whitespace-only text are dropped.
    pub fn parse(xml: &str) -> Result<Self, TransformError> {
        let mut reader = Reader::from_str(xml);
        reader.config_mut().trim_text(true);

        let mut stack: Vec<Element> = Vec::new();
        let mut root: Option<Element> = None;

        loop {
            match reader.read_event().map_err(quick_xml::Error::from)? {
                Event::Start(e) => {
                    stack.push(element_from_tag(&e)?);
                }
                Event::Empty(e) => {
                    let element = element_from_tag(&e)?;
                    attach(&mut stack, &mut root, element);
                }
                Event::End(_) => {
                    let element = stack.pop().ok_or_else(|| {
                        TransformError::structural("unbalanced closing tag in XML document")
                    })?;
                    attach(&mut stack, &mut root, element);
                }
                Event::Text(t) => {
                    let text = t.unescape().map_err(quick_xml::Error::from)?;
                    if !text.trim().is_empty() {
                        if let Some(parent) = stack.last_mut() {
                            parent.children.push(Node::Text(text.trim().to_string()));
                        }
                    }
                }
                Event::CData(t) => {
                    let text = String::from_utf8_lossy(t.as_ref()).into_owned();
                    if let Some(parent) = stack.last_mut() {
                        parent.children.push(Node::Text(text));
                    }
                }
                Event::Eof => break,
                _ => {}
            }
        }

        match root {
            Some(root) if stack.is_empty() => Ok(Document { root }),
            _ => Err(TransformError::structural(
                "XML document has no complete root element",
            )),
        }
    }

    pub fn from_file(path: &Path) -> Result<Self, TransformError> {
        let content = fs::read_to_string(path)?;
        Self::parse(&content)
    }

    /// Serialize with an XML declaration and 4-space indentation
    pub fn to_xml(&self) -> String {
        let mut out = String::from("<?xml version=\"1.0\" encoding=\"UTF-8\"?>\n");
        write_element(&mut out, &self.root, 0);
        out
    }

    pub fn write_to_file(&self, path: &Path) -> Result<(), TransformError> {
        fs::write(path, self.to_xml())?;
        Ok(())
    }
}

fn element_from_tag(tag: &quick_xml::events::BytesStart) -> Result<Element, TransformError> {
    let name = String::from_utf8_lossy(tag.name().as_ref()).into_owned();
    let mut element = Element::new(name);
    for attr in tag.attributes() {
        let attr = attr.map_err(quick_xml::Error::from)?;
        let key = String::from_utf8_lossy(attr.key.as_ref()).into_owned();
        let value = attr
            .unescape_value()
            .map_err(quick_xml::Error::from)?
            .into_owned();
        element.attrs.push((key, value));
    }
    Ok(element)
}

fn attach(stack: &mut Vec<Element>, root: &mut Option<Element>, element: Element) {
    match stack.last_mut() {
        Some(parent) => parent.children.push(Node::Element(element)),
        None => {
            if root.is_none() {
                *root = Some(element);
            }
        }
    }
}

fn write_element(out: &mut String, element: &Element, depth: usize) {
    let pad = "    ".repeat(depth);
    out.push_str(&pad);
    out.push('<');
    out.push_str(&element.name);
    for (key, value) in &element.attrs {
        out.push(' ');
        out.push_str(key);
        out.push_str("=\"");
        out.push_str(&escape(value.as_str()));
        out.push('"');
    }

    let only_text = element.children.len() == 1
        && matches!(element.children.first(), Some(Node::Text(_)));

    if element.children.is_empty() {
        out.push_str("/>\n");
    } else if only_text {
        out.push('>');
        if let Some(Node::Text(t)) = element.children.first() {
            out.push_str(&escape(t.as_str()));
        }
        out.push_str("</");
        out.push_str(&element.name);
        out.push_str(">\n");
    } else {
        out.push_str(">\n");
        for child in &element.children {
            match child {
                Node::Element(e) => write_element(out, e, depth + 1),
                Node::Text(t) => {
                    out.push_str(&"    ".repeat(depth + 1));
                    out.push_str(&escape(t.as_str()));
                    out.push('\n');
                }
            }
        }
        out.push_str(&pad);
        out.push_str("</");
        out.push_str(&element.name);
        out.push_str(">\n");
    }
}
