//! Minimal element tree built from quick-xml events

use crate::xml::XmlError;
use quick_xml::events::{BytesStart, Event};
use quick_xml::Reader;

/// Deepest element nesting accepted by [`Document::parse`]
pub const MAX_DEPTH: usize = 512;

/// A node in the element tree
#[derive(Debug, Clone, PartialEq)]
pub enum Node {
    Element(Element),
    Text(String),
}

/// An XML element with namespace prefixes stripped from its name
#[derive(Debug, Clone, PartialEq)]
pub struct Element {
    /// Local name (`sm:loc` becomes `loc`)
    pub name: String,
    /// Attributes by local name, in document order
    pub attributes: Vec<(String, String)>,
    pub children: Vec<Node>,
}

impl Element {
    fn new(name: String) -> Self {
        Self {
            name,
            attributes: Vec::new(),
            children: Vec::new(),
        }
    }

    /// Child elements in document order
    pub fn elements(&self) -> impl Iterator<Item = &Element> {
        self.children.iter().filter_map(|node| match node {
            Node::Element(element) => Some(element),
            Node::Text(_) => None,
        })
    }

    /// Direct text children in document order
    pub fn texts(&self) -> impl Iterator<Item = &str> {
        self.children.iter().filter_map(|node| match node {
            Node::Text(text) => Some(text.as_str()),
            Node::Element(_) => None,
        })
    }

    /// Value of an attribute by local name
    pub fn attribute(&self, name: &str) -> Option<&str> {
        self.attributes
            .iter()
            .find(|(key, _)| key == name)
            .map(|(_, value)| value.as_str())
    }

    /// Concatenated text of this element and all its descendants
    pub fn text(&self) -> String {
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

/// A parsed XML document
///
/// The document node is an unnamed element whose only child is the root
/// element, which lets absolute paths start from it like any other context.
#[derive(Debug, Clone)]
pub struct Document {
    node: Element,
}

impl Document {
    /// Parses a complete XML document
    ///
    /// Whitespace-only text is dropped and remaining text is trimmed.
    /// Mismatched or unclosed tags, documents without a root element and
    /// nesting deeper than [`MAX_DEPTH`] are reported as [`XmlError::Malformed`].
    pub fn parse(bytes: &[u8]) -> Result<Self, XmlError> {
        let mut reader = Reader::from_reader(bytes);
        reader.config_mut().trim_text(true);

        let mut stack: Vec<Element> = vec![Element::new(String::new())];
        let mut buf = Vec::new();

        loop {
            let event = reader
                .read_event_into(&mut buf)
                .map_err(|e| malformed(&reader, e))?;

            match event {
                Event::Start(start) => {
                    // The stack holds the document node plus one entry per open element
                    if stack.len() > MAX_DEPTH {
                        return Err(malformed(
                            &reader,
                            format!("elements nested deeper than {}", MAX_DEPTH),
                        ));
                    }
                    stack.push(start_element(&start)?);
                }
                Event::Empty(start) => {
                    let element = start_element(&start)?;
                    push_child(&mut stack, Node::Element(element))?;
                }
                Event::End(_) => {
                    let element = stack.pop().filter(|_| !stack.is_empty()).ok_or_else(|| {
                        XmlError::Malformed("unexpected closing tag".to_string())
                    })?;
                    push_child(&mut stack, Node::Element(element))?;
                }
                Event::Text(text) => {
                    if stack.len() > 1 {
                        let value = text.unescape().map_err(|e| malformed(&reader, e))?;
                        if !value.is_empty() {
                            push_child(&mut stack, Node::Text(value.into_owned()))?;
                        }
                    }
                }
                Event::CData(data) => {
                    if stack.len() > 1 {
                        let value = String::from_utf8_lossy(&data.into_inner()).trim().to_string();
                        if !value.is_empty() {
                            push_child(&mut stack, Node::Text(value))?;
                        }
                    }
                }
                Event::Eof => break,
                _ => {}
            }
            buf.clear();
        }

        if stack.len() != 1 {
            return Err(XmlError::Malformed(format!(
                "unclosed element <{}>",
                stack.last().map(|e| e.name.as_str()).unwrap_or_default()
            )));
        }

        let node = stack.pop().unwrap_or_else(|| Element::new(String::new()));
        if node.elements().next().is_none() {
            return Err(XmlError::Malformed("document has no root element".to_string()));
        }

        Ok(Self { node })
    }

    /// The document node (parent of the root element)
    pub fn node(&self) -> &Element {
        &self.node
    }

    /// The root element
    pub fn root(&self) -> Option<&Element> {
        self.node.elements().next()
    }
}

fn malformed<R>(reader: &Reader<R>, error: impl std::fmt::Display) -> XmlError {
    XmlError::Malformed(format!(
        "{} at byte {}",
        error,
        reader.buffer_position()
    ))
}

fn start_element(start: &BytesStart<'_>) -> Result<Element, XmlError> {
    let name = String::from_utf8_lossy(start.local_name().as_ref()).into_owned();
    let mut element = Element::new(name);

    for attribute in start.attributes() {
        let attribute = attribute.map_err(|e| XmlError::Malformed(e.to_string()))?;
        let key = String::from_utf8_lossy(attribute.key.local_name().as_ref()).into_owned();
        let value = attribute
            .unescape_value()
            .map_err(|e| XmlError::Malformed(e.to_string()))?
            .into_owned();
        element.attributes.push((key, value));
    }

    Ok(element)
}

fn push_child(stack: &mut [Element], node: Node) -> Result<(), XmlError> {
    let is_document = stack.len() == 1;
    let parent = stack
        .last_mut()
        .ok_or_else(|| XmlError::Malformed("element outside document".to_string()))?;

    if is_document && matches!(node, Node::Element(_)) && parent.elements().next().is_some() {
        return Err(XmlError::Malformed(
            "document has more than one root element".to_string(),
        ));
    }

    parent.children.push(node);
    Ok(())
}
