use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use xmpp_parsers::minidom::Element;

use crate::error::StanzaError;

/// An immutable, already-parsed stanza tree.
///
/// Attributes are kept as strings. The element namespace is exposed as the
/// `xmlns` attribute so handlers can test it like any other attribute.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Stanza {
    name: String,
    attrs: BTreeMap<String, String>,
    children: Vec<Stanza>,
    text: String,
}

impl Stanza {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Self::default()
        }
    }

    pub fn with_attr(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.attrs.insert(name.into(), value.into());
        self
    }

    pub fn with_child(mut self, child: Stanza) -> Self {
        self.children.push(child);
        self
    }

    pub fn with_text(mut self, text: impl Into<String>) -> Self {
        self.text = text.into();
        self
    }

    /// Parse one stanza from XML. The root must declare its namespace.
    pub fn parse(xml: &str) -> Result<Self, StanzaError> {
        let trimmed = xml.trim();
        if trimmed.is_empty() {
            return Err(StanzaError::ParseFailed("stanza payload is empty".to_string()));
        }

        let element = Element::from_str(trimmed)
            .map_err(|error| StanzaError::ParseFailed(format!("invalid stanza XML: {error}")))?;
        Ok(Self::from(&element))
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn attrs(&self) -> &BTreeMap<String, String> {
        &self.attrs
    }

    pub fn attr(&self, name: &str) -> Option<&str> {
        self.attrs.get(name).map(String::as_str)
    }

    /// Attribute value, treating an empty string as absent.
    pub fn non_empty_attr(&self, name: &str) -> Option<&str> {
        self.attr(name).filter(|value| !value.is_empty())
    }

    pub fn children(&self) -> &[Stanza] {
        &self.children
    }

    pub fn first_child(&self) -> Option<&Stanza> {
        self.children.first()
    }

    /// First direct child named `name`.
    pub fn child(&self, name: &str) -> Option<&Stanza> {
        self.children.iter().find(|child| child.name == name)
    }

    pub fn children_named<'a>(&'a self, name: &'a str) -> impl Iterator<Item = &'a Stanza> + 'a {
        self.children.iter().filter(move |child| child.name == name)
    }

    /// Text content directly under this node.
    pub fn text(&self) -> &str {
        &self.text
    }

    /// Text of the first child named `name`, empty when the child is missing.
    pub fn child_text(&self, name: &str) -> &str {
        self.child(name).map(Stanza::text).unwrap_or("")
    }
}

impl FromStr for Stanza {
    type Err = StanzaError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl From<&Element> for Stanza {
    fn from(element: &Element) -> Self {
        // Namespaced attributes (`xml:lang`, `foo:id`) are dropped; handlers
        // only read attributes in no namespace.
        let mut attrs: BTreeMap<String, String> = element
            .attrs()
            .iter()
            .filter(|((namespace, _), _)| namespace.is_none())
            .map(|((_, name), value)| (name.to_string(), value.clone()))
            .collect();
        attrs.insert("xmlns".to_string(), element.ns());

        Self {
            name: element.name().to_string(),
            attrs,
            children: element.children().map(Stanza::from).collect(),
            text: element.text(),
        }
    }
}

/// Renders the tree back to XML. Used when a raw message has to be passed on
/// and only the parsed form is at hand.
impl fmt::Display for Stanza {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "<{}", self.name)?;
        for (name, value) in &self.attrs {
            write!(f, " {name}='{}'", escape(value))?;
        }
        if self.children.is_empty() && self.text.is_empty() {
            return f.write_str("/>");
        }
        f.write_str(">")?;
        f.write_str(&escape(&self.text))?;
        for child in &self.children {
            write!(f, "{child}")?;
        }
        write!(f, "</{}>", self.name)
    }
}

fn escape(value: &str) -> String {
    let mut escaped = String::with_capacity(value.len());
    for c in value.chars() {
        match c {
            '&' => escaped.push_str("&amp;"),
            '<' => escaped.push_str("&lt;"),
            '>' => escaped.push_str("&gt;"),
            '\'' => escaped.push_str("&apos;"),
            '"' => escaped.push_str("&quot;"),
            other => escaped.push(other),
        }
    }
    escaped
}
