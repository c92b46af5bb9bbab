//! A small XPath location-path subset
//!
//! Supported: absolute (`/a/b`), descendant (`//a`, `a//b`) and relative
//! (`a/b`, `./a`, `.//a`) paths over element name tests. A name may carry a
//! namespace prefix, which is ignored (matching is on the local name), or be
//! `*`. The last step may be `text()` or `@attribute`. Predicates, functions
//! other than `text()`, and other axes are rejected at parse time.

use crate::xml::tree::{Document, Element, Node};
use crate::ConfigError;
use std::collections::HashSet;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Axis {
    Child,
    Descendant,
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum NameTest {
    Any,
    Local(String),
}

impl NameTest {
    fn matches(&self, element: &Element) -> bool {
        match self {
            Self::Any => true,
            Self::Local(name) => element.name == *name,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum Terminal {
    Text(Axis),
    Attribute(String),
}

/// A compiled path expression
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct XPath {
    expression: String,
    absolute: bool,
    steps: Vec<(Axis, NameTest)>,
    terminal: Option<Terminal>,
}

/// A value produced by evaluating a path
#[derive(Debug, Clone, PartialEq)]
pub enum Selection<'a> {
    Element(&'a Element),
    Text(&'a str),
    Attribute(&'a str),
}

impl Selection<'_> {
    /// String value: element text content, text node, or attribute value
    pub fn string_value(&self) -> String {
        match self {
            Self::Element(element) => element.text().trim().to_string(),
            Self::Text(text) => text.to_string(),
            Self::Attribute(value) => value.to_string(),
        }
    }
}

impl XPath {
    /// Compiles a path expression
    ///
    /// # Returns
    ///
    /// * `Ok(XPath)` - The expression is within the supported subset
    /// * `Err(ConfigError::InvalidXPath)` - The expression is empty or malformed,
    ///   or uses an unsupported construct
    pub fn parse(expression: &str) -> Result<Self, ConfigError> {
        let invalid = |message: &str| ConfigError::InvalidXPath {
            expression: expression.to_string(),
            message: message.to_string(),
        };

        let trimmed = expression.trim();
        if trimmed.is_empty() {
            return Err(invalid("empty expression"));
        }

        let (absolute, mut axis, mut rest) = if let Some(rest) = trimmed.strip_prefix("//") {
            (true, Axis::Descendant, rest)
        } else if let Some(rest) = trimmed.strip_prefix('/') {
            (true, Axis::Child, rest)
        } else if let Some(rest) = trimmed.strip_prefix(".//") {
            (false, Axis::Descendant, rest)
        } else if let Some(rest) = trimmed.strip_prefix("./") {
            (false, Axis::Child, rest)
        } else {
            (false, Axis::Child, trimmed)
        };

        let mut steps = Vec::new();
        let mut terminal = None;

        loop {
            if rest.is_empty() {
                return Err(invalid("expected a step"));
            }
            if terminal.is_some() {
                return Err(invalid("text() and @attribute must be the last step"));
            }

            let end = rest.find('/').unwrap_or(rest.len());
            let step = &rest[..end];

            if step == "text()" {
                terminal = Some(Terminal::Text(axis));
            } else if let Some(attr) = step.strip_prefix('@') {
                if axis == Axis::Descendant {
                    return Err(invalid("descendant attribute steps are not supported"));
                }
                terminal = Some(Terminal::Attribute(parse_name(attr).ok_or_else(|| {
                    invalid("invalid attribute name")
                })?));
            } else if step == "*" {
                steps.push((axis, NameTest::Any));
            } else {
                let name = parse_name(step).ok_or_else(|| invalid("unsupported step"))?;
                steps.push((axis, NameTest::Local(name)));
            }

            rest = &rest[end..];
            if rest.is_empty() {
                break;
            }
            if let Some(next) = rest.strip_prefix("//") {
                axis = Axis::Descendant;
                rest = next;
            } else {
                axis = Axis::Child;
                rest = &rest[1..];
            }
        }

        if absolute && steps.is_empty() {
            return Err(invalid("absolute path needs an element step"));
        }

        Ok(Self {
            expression: expression.to_string(),
            absolute,
            steps,
            terminal,
        })
    }

    /// The original expression text
    pub fn as_str(&self) -> &str {
        &self.expression
    }

    /// Evaluates the path, returning selections in document order
    ///
    /// Relative paths start at `context`; absolute paths start at the document
    /// node regardless of `context`.
    pub fn evaluate<'a>(&self, document: &'a Document, context: &'a Element) -> Vec<Selection<'a>> {
        let start = if self.absolute {
            document.node()
        } else {
            context
        };

        let mut current: Vec<&'a Element> = vec![start];
        for (axis, test) in &self.steps {
            current = step(&current, *axis, test);
        }

        match &self.terminal {
            None => current.into_iter().map(Selection::Element).collect(),
            Some(Terminal::Attribute(name)) => current
                .into_iter()
                .filter_map(|e| e.attribute(name))
                .map(Selection::Attribute)
                .collect(),
            Some(Terminal::Text(Axis::Child)) => current
                .into_iter()
                .flat_map(|e| e.texts())
                .map(Selection::Text)
                .collect(),
            Some(Terminal::Text(Axis::Descendant)) => {
                let mut out = Vec::new();
                for element in current {
                    descendant_texts(element, &mut out);
                }
                out
            }
        }
    }

    /// Evaluates the path from the document node and returns string values
    pub fn select_strings(&self, document: &Document) -> Vec<String> {
        self.select_strings_from(document, document.node())
    }

    /// Evaluates the path from a context element and returns string values
    pub fn select_strings_from(&self, document: &Document, context: &Element) -> Vec<String> {
        self.evaluate(document, context)
            .iter()
            .map(Selection::string_value)
            .collect()
    }
}

/// Accepts `name` or `prefix:name` and returns the local name
fn parse_name(raw: &str) -> Option<String> {
    let local = match raw.split_once(':') {
        Some((prefix, local)) => {
            if !is_ncname(prefix) {
                return None;
            }
            local
        }
        None => raw,
    };
    is_ncname(local).then(|| local.to_string())
}

fn is_ncname(s: &str) -> bool {
    let mut chars = s.chars();
    match chars.next() {
        Some(c) if c.is_alphabetic() || c == '_' => {}
        _ => return false,
    }
    chars.all(|c| c.is_alphanumeric() || matches!(c, '_' | '-' | '.'))
}

fn step<'a>(context: &[&'a Element], axis: Axis, test: &NameTest) -> Vec<&'a Element> {
    let mut out = Vec::new();
    match axis {
        Axis::Child => {
            for element in context {
                out.extend(element.elements().filter(|child| test.matches(child)));
            }
        }
        Axis::Descendant => {
            let mut seen: HashSet<*const Element> = HashSet::new();
            for element in context {
                descendants(element, test, &mut seen, &mut out);
            }
        }
    }
    out
}

fn descendants<'a>(
    element: &'a Element,
    test: &NameTest,
    seen: &mut HashSet<*const Element>,
    out: &mut Vec<&'a Element>,
) {
    for child in element.elements() {
        if test.matches(child) && seen.insert(child as *const Element) {
            out.push(child);
        }
        descendants(child, test, seen, out);
    }
}

fn descendant_texts<'a>(element: &'a Element, out: &mut Vec<Selection<'a>>) {
    for node in &element.children {
        match node {
            Node::Text(text) => out.push(Selection::Text(text)),
            Node::Element(child) => descendant_texts(child, out),
        }
    }
}
