//! Generic XML decoder built on quick-xml SAX events
//!
//! Turns an XML document into an owned element tree. Namespace prefixes are
//! stripped from element and attribute names, attribute values stay raw
//! strings, and whitespace-only text nodes are kept; trimming is the
//! normalizer's job. Repeated and single children are both reached through
//! [`Element::children_named`], so callers never distinguish the two shapes.

use std::borrow::Cow;

use quick_xml::escape::unescape;
use quick_xml::events::{BytesStart, Event};
use quick_xml::reader::Reader;

use crate::error::OsisError;

/// A node in the decoded tree
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Node {
    /// Child element
    Element(Element),
    /// Character data (text, CDATA, resolved entity references)
    Text(String),
}

/// A decoded XML element
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Element {
    /// Local name, without namespace prefix
    pub name: String,
    /// Attributes in document order, keys without namespace prefix
    pub attributes: Vec<(String, String)>,
    /// Child nodes in document order
    pub children: Vec<Node>,
}

impl Element {
    /// Create an empty element with the given name
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            attributes: Vec::new(),
            children: Vec::new(),
        }
    }

    /// Look up an attribute value by local name
    pub fn attr(&self, name: &str) -> Option<&str> {
        self.attributes
            .iter()
            .find(|(key, _)| key == name)
            .map(|(_, value)| value.as_str())
    }

    /// Child elements in document order
    pub fn elements(&self) -> impl Iterator<Item = &Element> {
        self.children.iter().filter_map(|node| match node {
            Node::Element(el) => Some(el),
            Node::Text(_) => None,
        })
    }

    /// Child elements with the given local name, in document order
    pub fn children_named<'a, 'n>(
        &'a self,
        name: &'n str,
    ) -> impl Iterator<Item = &'a Element> + use<'a, 'n> {
        self.elements().filter(move |el| el.name == name)
    }

    /// First child element with the given local name
    pub fn child(&self, name: &str) -> Option<&Element> {
        self.elements().find(|el| el.name == name)
    }

    /// Concatenated text of every descendant, depth-first in document order
    ///
    /// Attribute values are never included. Whitespace is returned as-is.
    pub fn text_content(&self) -> String {
        let mut out = String::new();
        collect_text(self, &mut out);
        out
    }
}

fn collect_text(element: &Element, out: &mut String) {
    for node in &element.children {
        match node {
            Node::Text(text) => out.push_str(text),
            Node::Element(child) => collect_text(child, out),
        }
    }
}

/// Decode an XML document into its root element
///
/// Fails on malformed input: mismatched or unclosed tags, unknown entities,
/// undecodable bytes, a missing root element or more than one root.
pub fn decode(xml: &str) -> Result<Element, OsisError> {
    let xml = xml.strip_prefix('\u{feff}').unwrap_or(xml);
    let mut reader = Reader::from_str(xml);
    reader.config_mut().trim_text(false);

    // Open elements, innermost last
    let mut stack: Vec<Element> = Vec::new();
    let mut root: Option<Element> = None;

    loop {
        match reader.read_event()? {
            Event::Start(e) => {
                let element = start_element(&e, &reader)?;
                stack.push(element);
            }
            Event::Empty(e) => {
                let element = start_element(&e, &reader)?;
                attach(element, &mut stack, &mut root)?;
            }
            Event::End(e) => {
                let name = decode_name(e.local_name().as_ref(), &reader)?;
                let element = stack.pop().ok_or_else(|| {
                    OsisError::Xml(format!("Unexpected closing tag </{}>", name))
                })?;
                attach(element, &mut stack, &mut root)?;
            }
            Event::Text(e) => {
                let text = e
                    .decode()
                    .map_err(|e| OsisError::Xml(format!("Decode error: {:?}", e)))?;
                push_text(&mut stack, text);
            }
            Event::CData(e) => {
                let text = reader
                    .decoder()
                    .decode(&e)
                    .map_err(|e| OsisError::Xml(format!("Decode error: {:?}", e)))?;
                push_text(&mut stack, text);
            }
            Event::GeneralRef(e) => {
                let entity_name = e
                    .decode()
                    .map_err(|e| OsisError::Xml(format!("Decode error: {:?}", e)))?;
                let entity = format!("&{};", entity_name);
                let resolved = unescape(&entity)
                    .map_err(|e| OsisError::Xml(format!("Unescape error: {:?}", e)))?;
                push_text(&mut stack, resolved);
            }
            Event::Comment(_) | Event::Decl(_) | Event::PI(_) | Event::DocType(_) => {}
            Event::Eof => break,
        }
    }

    if let Some(open) = stack.last() {
        return Err(OsisError::Xml(format!(
            "Unexpected end of document: <{}> is not closed",
            open.name
        )));
    }

    root.ok_or_else(|| OsisError::Xml("Document has no root element".into()))
}

/// Append a finished element to its parent, or make it the root
fn attach(
    element: Element,
    stack: &mut [Element],
    root: &mut Option<Element>,
) -> Result<(), OsisError> {
    match stack.last_mut() {
        Some(parent) => {
            parent.children.push(Node::Element(element));
            Ok(())
        }
        None if root.is_none() => {
            *root = Some(element);
            Ok(())
        }
        None => Err(OsisError::Xml(format!(
            "Multiple root elements (second root <{}>)",
            element.name
        ))),
    }
}

/// Append text to the innermost open element, merging adjacent runs
///
/// Text outside the root element is dropped.
fn push_text(stack: &mut [Element], text: Cow<'_, str>) {
    let Some(parent) = stack.last_mut() else {
        return;
    };
    if let Some(Node::Text(last)) = parent.children.last_mut() {
        last.push_str(&text);
    } else {
        parent.children.push(Node::Text(text.into_owned()));
    }
}

fn start_element(e: &BytesStart<'_>, reader: &Reader<&[u8]>) -> Result<Element, OsisError> {
    let mut element = Element::new(decode_name(e.local_name().as_ref(), reader)?);
    for attr in e.attributes() {
        let attr = attr.map_err(|e| OsisError::Xml(format!("Attr error: {:?}", e)))?;
        let key = decode_name(attr.key.local_name().as_ref(), reader)?;
        // Namespace declarations carry no document content
        if key == "xmlns" || attr.key.as_ref().starts_with(b"xmlns:") {
            continue;
        }
        let raw = reader
            .decoder()
            .decode(&attr.value)
            .map_err(|e| OsisError::Xml(format!("Decode error: {:?}", e)))?;
        let value = match unescape(&raw) {
            Ok(value) => value.into_owned(),
            Err(_) => raw.into_owned(),
        };
        element.attributes.push((key, value));
    }
    Ok(element)
}

fn decode_name(name: &[u8], reader: &Reader<&[u8]>) -> Result<String, OsisError> {
    reader
        .decoder()
        .decode(name)
        .map_err(|e| OsisError::Xml(format!("Decode error: {:?}", e)))
        .map(|s| s.to_string())
}
