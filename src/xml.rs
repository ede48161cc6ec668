//! Minimal namespace-aware XML element tree.
//!
//! METS assembly needs only a small slice of an XML library: build elements
//! with namespace-qualified names, set attributes, append children, find
//! children by tag, and serialize with pretty-printing. [`Element`] provides
//! exactly that, with `quick-xml` doing the byte-level reading and writing.
//!
//! ## Names
//!
//! Names are [`QName`]s: an optional namespace URI plus a local name. Lookups
//! use Clark notation (`{http://www.loc.gov/METS/}amdSec`), so callers never
//! depend on which prefix ends up in the serialized document.
//!
//! ## Prefixes on output
//!
//! Well-known namespaces are written with their conventional prefix (`mets:`,
//! `xlink:`, `xsi:`) and declared on the first element that needs them. Any
//! other element namespace becomes the default namespace (`xmlns="..."`) of
//! the subtree that uses it, which is how embedded metadata such as DNX
//! usually appears in METS files.
//!
//! ## Content model
//!
//! An element carries optional leading text and child elements; each child
//! carries the text that follows it up to the next sibling (its tail). Mixed
//! content such as `<p>Hello <b>world</b> again</p>` keeps its order that way.
//!
//! Whitespace is significant except beside child elements: when every text
//! run of an element is whitespace, the element holds element-only content
//! and the runs are indentation. Pretty output only adds indentation to such
//! elements, and mixed content is written exactly as stored.

use quick_xml::events::{BytesDecl, BytesEnd, BytesStart, BytesText, Event};
use quick_xml::{Reader, Writer};
use std::fmt;
use thiserror::Error;

pub const METS_NS: &str = "http://www.loc.gov/METS/";
pub const XLINK_NS: &str = "http://www.w3.org/1999/xlink";
pub const XSI_NS: &str = "http://www.w3.org/2001/XMLSchema-instance";
pub const DNX_NS: &str = "http://www.exlibrisgroup.com/dnx";

const XMLNS_URI: &str = "http://www.w3.org/2000/xmlns/";
const XML_URI: &str = "http://www.w3.org/XML/1998/namespace";

#[derive(Error, Debug)]
pub enum XmlError {
    #[error("XML error: {0}")]
    Xml(#[from] quick_xml::Error),
    #[error("Invalid UTF-8 in document: {0}")]
    Utf8(#[from] std::str::Utf8Error),
    #[error("Invalid UTF-8 in serialized output: {0}")]
    FromUtf8(#[from] std::string::FromUtf8Error),
    #[error("Malformed document: {0}")]
    Malformed(String),
}

fn well_known_prefix(uri: &str) -> Option<&'static str> {
    match uri {
        METS_NS => Some("mets"),
        XLINK_NS => Some("xlink"),
        XSI_NS => Some("xsi"),
        XML_URI => Some("xml"),
        _ => None,
    }
}

/// A namespace-qualified name.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct QName {
    pub ns: Option<String>,
    pub local: String,
}

impl QName {
    pub fn new(ns: &str, local: &str) -> Self {
        Self {
            ns: Some(ns.to_string()),
            local: local.to_string(),
        }
    }

    /// A name in no namespace (plain attributes such as `ID`).
    pub fn local(local: &str) -> Self {
        Self {
            ns: None,
            local: local.to_string(),
        }
    }

    pub fn mets(local: &str) -> Self {
        Self::new(METS_NS, local)
    }

    /// Parse Clark notation: `{uri}local` or bare `local`.
    pub fn from_clark(s: &str) -> Self {
        if let Some(rest) = s.strip_prefix('{')
            && let Some(end) = rest.find('}')
        {
            return Self::new(&rest[..end], &rest[end + 1..]);
        }
        Self::local(s)
    }

    /// Render in Clark notation.
    pub fn clark(&self) -> String {
        match &self.ns {
            Some(ns) => format!("{{{ns}}}{}", self.local),
            None => self.local.clone(),
        }
    }
}

impl fmt::Display for QName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.clark())
    }
}

/// An XML element with attributes, optional text and child elements.
///
/// Equality compares names, attributes, text and children. Explicit
/// namespace declarations only affect where prefixes are declared on output
/// and are ignored.
#[derive(Debug, Clone)]
pub struct Element {
    pub name: QName,
    attributes: Vec<(QName, String)>,
    text: Option<String>,
    tail: Option<String>,
    children: Vec<Element>,
    declared: Vec<String>,
}

impl PartialEq for Element {
    fn eq(&self, other: &Self) -> bool {
        self.name == other.name
            && self.attributes == other.attributes
            && self.text == other.text
            && self.tail == other.tail
            && self.children == other.children
    }
}

impl Element {
    pub fn new(name: QName) -> Self {
        Self {
            name,
            attributes: Vec::new(),
            text: None,
            tail: None,
            children: Vec::new(),
            declared: Vec::new(),
        }
    }

    /// Declare a namespace on this element even if nothing in it uses the
    /// namespace yet. Used for the document root.
    pub fn declare_ns(mut self, uri: &str) -> Self {
        if !self.declared.iter().any(|d| d == uri) {
            self.declared.push(uri.to_string());
        }
        self
    }

    /// Shorthand for an element in the METS namespace.
    pub fn mets(local: &str) -> Self {
        Self::new(QName::mets(local))
    }

    /// Tag in Clark notation.
    pub fn tag(&self) -> String {
        self.name.clark()
    }

    /// Set an attribute, replacing any existing value for the same name.
    pub fn set_attr(&mut self, name: QName, value: impl Into<String>) {
        let value = value.into();
        match self.attributes.iter_mut().find(|(n, _)| *n == name) {
            Some(slot) => slot.1 = value,
            None => self.attributes.push((name, value)),
        }
    }

    /// Builder form of [`set_attr`](Self::set_attr) for no-namespace attributes.
    pub fn with_attr(mut self, local: &str, value: impl Into<String>) -> Self {
        self.set_attr(QName::local(local), value);
        self
    }

    pub fn with_attr_ns(mut self, name: QName, value: impl Into<String>) -> Self {
        self.set_attr(name, value);
        self
    }

    /// Value of a no-namespace attribute.
    pub fn attr(&self, local: &str) -> Option<&str> {
        self.attr_ns(&QName::local(local))
    }

    pub fn attr_ns(&self, name: &QName) -> Option<&str> {
        self.attributes
            .iter()
            .find(|(n, _)| n == name)
            .map(|(_, v)| v.as_str())
    }

    pub fn attributes(&self) -> &[(QName, String)] {
        &self.attributes
    }

    pub fn set_text(&mut self, text: impl Into<String>) {
        self.text = Some(text.into());
    }

    pub fn with_text(mut self, text: impl Into<String>) -> Self {
        self.set_text(text);
        self
    }

    pub fn text(&self) -> Option<&str> {
        self.text.as_deref()
    }

    /// Text following this element inside its parent.
    pub fn tail(&self) -> Option<&str> {
        self.tail.as_deref()
    }

    pub fn set_tail(&mut self, tail: impl Into<String>) {
        self.tail = Some(tail.into());
    }

    pub fn with_tail(mut self, tail: impl Into<String>) -> Self {
        self.set_tail(tail);
        self
    }

    /// True when some text run next to the children is not whitespace.
    pub fn has_mixed_content(&self) -> bool {
        !self.children.is_empty()
            && std::iter::once(&self.text)
                .chain(self.children.iter().map(|c| &c.tail))
                .flatten()
                .any(|run| !is_xml_whitespace(run))
    }

    /// Clear whitespace runs of element-only content.
    fn drop_indentation(&mut self) {
        if self.children.is_empty() || self.has_mixed_content() {
            return;
        }
        self.text = None;
        for child in &mut self.children {
            child.tail = None;
        }
    }

    pub fn push(&mut self, child: Element) {
        self.children.push(child);
    }

    pub fn with_child(mut self, child: Element) -> Self {
        self.push(child);
        self
    }

    pub fn children(&self) -> &[Element] {
        &self.children
    }

    /// All elements matching a path of Clark-notation steps.
    ///
    /// Steps are separated by `/`; a leading `.` step is ignored. Braced
    /// namespace URIs may themselves contain slashes:
    ///
    /// ```text
    /// ./{http://www.loc.gov/METS/}fileSec/{http://www.loc.gov/METS/}fileGrp
    /// ```
    pub fn find_all(&self, path: &str) -> Vec<&Element> {
        let mut current = vec![self];
        for step in split_path(path) {
            if step == "." {
                continue;
            }
            let name = QName::from_clark(step);
            let name = &name;
            current = current
                .into_iter()
                .flat_map(move |el| el.children.iter().filter(move |c| c.name == *name))
                .collect();
        }
        current
    }

    /// First element matching [`find_all`](Self::find_all).
    pub fn find(&self, path: &str) -> Option<&Element> {
        self.find_all(path).into_iter().next()
    }

    /// Every descendant (depth-first, document order) with the given tag.
    pub fn descendants(&self, tag: &str) -> Vec<&Element> {
        let name = QName::from_clark(tag);
        let mut out = Vec::new();
        collect_descendants(self, &name, &mut out);
        out
    }

    /// Serialize as a standalone document with an XML declaration.
    ///
    /// Element-only content is indented by `indent` spaces per level.
    pub fn to_pretty_string(&self, indent: usize) -> Result<String, XmlError> {
        let mut writer = Writer::new(Vec::new());
        writer.write_event(Event::Decl(BytesDecl::new("1.0", Some("UTF-8"), None)))?;
        write_indent(&mut writer, indent, 0)?;
        let mut counter = 0;
        let layout = Layout { indent, depth: 0 };
        write_element(&mut writer, self, &Scope::default(), &mut counter, Some(layout))?;
        Ok(String::from_utf8(writer.into_inner())?)
    }

    /// Parse a document into its root element.
    ///
    /// Text is kept verbatim except for indentation between child elements
    /// (see the module docs). Comments and processing instructions are
    /// skipped.
    pub fn parse(input: &str) -> Result<Element, XmlError> {
        let mut reader = Reader::from_str(input);

        let mut stack: Vec<Element> = Vec::new();
        let mut scopes: Vec<Vec<(Option<String>, String)>> = Vec::new();
        let mut root: Option<Element> = None;

        loop {
            match reader.read_event()? {
                Event::Start(start) => {
                    let el = open_element(&start, &mut scopes)?;
                    stack.push(el);
                }
                Event::Empty(start) => {
                    let el = open_element(&start, &mut scopes)?;
                    scopes.pop();
                    attach(el, &mut stack, &mut root)?;
                }
                Event::End(_) => {
                    let mut el = stack
                        .pop()
                        .ok_or_else(|| XmlError::Malformed("unbalanced end tag".into()))?;
                    scopes.pop();
                    el.drop_indentation();
                    attach(el, &mut stack, &mut root)?;
                }
                Event::Text(text) => {
                    let value = text.unescape()?;
                    append_text(&mut stack, &value)?;
                }
                Event::CData(data) => {
                    let value = std::str::from_utf8(&data)?.to_string();
                    append_text(&mut stack, &value)?;
                }
                Event::Eof => break,
                _ => {}
            }
        }

        if !stack.is_empty() {
            return Err(XmlError::Malformed("unclosed element".into()));
        }
        root.ok_or_else(|| XmlError::Malformed("no root element".into()))
    }
}

fn is_xml_whitespace(s: &str) -> bool {
    s.chars().all(|c| matches!(c, ' ' | '\t' | '\r' | '\n'))
}

fn collect_descendants<'a>(el: &'a Element, name: &QName, out: &mut Vec<&'a Element>) {
    for child in &el.children {
        if child.name == *name {
            out.push(child);
        }
        collect_descendants(child, name, out);
    }
}

fn split_path(path: &str) -> Vec<&str> {
    let mut steps = Vec::new();
    let mut depth = 0usize;
    let mut start = 0;
    for (i, c) in path.char_indices() {
        match c {
            '{' => depth += 1,
            '}' => depth = depth.saturating_sub(1),
            '/' if depth == 0 => {
                if i > start {
                    steps.push(&path[start..i]);
                }
                start = i + 1;
            }
            _ => {}
        }
    }
    if start < path.len() {
        steps.push(&path[start..]);
    }
    steps
}

// =============================================================================
// Writing
// =============================================================================

/// Namespace bindings in effect while writing a subtree.
#[derive(Debug, Clone, Default)]
struct Scope {
    prefixes: Vec<(String, String)>,
    default_ns: Option<String>,
}

impl Scope {
    fn prefix_for(&self, uri: &str) -> Option<&str> {
        self.prefixes
            .iter()
            .rev()
            .find(|(_, u)| u == uri)
            .map(|(p, _)| p.as_str())
    }

    fn bind(&mut self, prefix: &str, uri: &str, decls: &mut Vec<(String, String)>) {
        if self.prefix_for(uri) == Some(prefix) {
            return;
        }
        self.prefixes.push((prefix.to_string(), uri.to_string()));
        decls.push((format!("xmlns:{prefix}"), uri.to_string()));
    }
}

/// Indentation of the element being written. `None` inside mixed content,
/// where added whitespace would change the text.
#[derive(Debug, Clone, Copy)]
struct Layout {
    indent: usize,
    depth: usize,
}

fn write_indent<W: std::io::Write>(
    writer: &mut Writer<W>,
    indent: usize,
    depth: usize,
) -> Result<(), XmlError> {
    let pad = format!("\n{}", " ".repeat(indent * depth));
    writer.write_event(Event::Text(BytesText::new(&pad)))?;
    Ok(())
}

fn write_element<W: std::io::Write>(
    writer: &mut Writer<W>,
    el: &Element,
    parent: &Scope,
    counter: &mut usize,
    layout: Option<Layout>,
) -> Result<(), XmlError> {
    let mut scope = parent.clone();
    let mut decls: Vec<(String, String)> = Vec::new();

    let tag = match &el.name.ns {
        None => {
            if scope.default_ns.is_some() {
                decls.push(("xmlns".into(), String::new()));
                scope.default_ns = None;
            }
            el.name.local.clone()
        }
        Some(uri) => match well_known_prefix(uri) {
            Some(prefix) => {
                if uri != XML_URI {
                    scope.bind(prefix, uri, &mut decls);
                }
                format!("{prefix}:{}", el.name.local)
            }
            None => {
                if scope.default_ns.as_deref() != Some(uri.as_str()) {
                    decls.push(("xmlns".into(), uri.clone()));
                    scope.default_ns = Some(uri.clone());
                }
                el.name.local.clone()
            }
        },
    };

    for uri in &el.declared {
        let prefix = match well_known_prefix(uri) {
            Some(p) => p.to_string(),
            None => match scope.prefix_for(uri) {
                Some(p) => p.to_string(),
                None => {
                    *counter += 1;
                    format!("ns{counter}")
                }
            },
        };
        if uri != XML_URI {
            scope.bind(&prefix, uri, &mut decls);
        }
    }

    let mut attrs: Vec<(String, &str)> = Vec::with_capacity(el.attributes.len());
    for (name, value) in &el.attributes {
        let key = match &name.ns {
            None => name.local.clone(),
            Some(uri) => {
                let prefix = match well_known_prefix(uri) {
                    Some(p) => p.to_string(),
                    None => match scope.prefix_for(uri) {
                        Some(p) => p.to_string(),
                        None => {
                            *counter += 1;
                            format!("ns{counter}")
                        }
                    },
                };
                if uri != XML_URI {
                    scope.bind(&prefix, uri, &mut decls);
                }
                format!("{prefix}:{}", name.local)
            }
        };
        attrs.push((key, value.as_str()));
    }

    let mut start = BytesStart::new(tag.as_str());
    for (key, value) in &decls {
        start.push_attribute((key.as_str(), value.as_str()));
    }
    for (key, value) in &attrs {
        start.push_attribute((key.as_str(), *value));
    }

    if el.text.is_none() && el.children.is_empty() {
        writer.write_event(Event::Empty(start))?;
        return Ok(());
    }

    writer.write_event(Event::Start(start))?;
    match layout.filter(|_| !el.children.is_empty() && !el.has_mixed_content()) {
        Some(Layout { indent, depth }) => {
            let inner = Layout { indent, depth: depth + 1 };
            for child in &el.children {
                write_indent(writer, indent, inner.depth)?;
                write_element(writer, child, &scope, counter, Some(inner))?;
            }
            write_indent(writer, indent, depth)?;
        }
        None => {
            if let Some(text) = &el.text {
                writer.write_event(Event::Text(BytesText::new(text)))?;
            }
            for child in &el.children {
                write_element(writer, child, &scope, counter, None)?;
                if let Some(tail) = &child.tail {
                    writer.write_event(Event::Text(BytesText::new(tail)))?;
                }
            }
        }
    }
    writer.write_event(Event::End(BytesEnd::new(tag.as_str())))?;
    Ok(())
}

// =============================================================================
// Reading
// =============================================================================

fn split_qname(raw: &str) -> (Option<&str>, &str) {
    match raw.split_once(':') {
        Some((prefix, local)) => (Some(prefix), local),
        None => (None, raw),
    }
}

fn resolve(
    scopes: &[Vec<(Option<String>, String)>],
    prefix: Option<&str>,
) -> Result<Option<String>, XmlError> {
    if prefix == Some("xml") {
        return Ok(Some(XML_URI.to_string()));
    }
    for frame in scopes.iter().rev() {
        if let Some((_, uri)) = frame.iter().find(|(p, _)| p.as_deref() == prefix) {
            return Ok(if uri.is_empty() {
                None
            } else {
                Some(uri.clone())
            });
        }
    }
    match prefix {
        None => Ok(None),
        Some(p) => Err(XmlError::Malformed(format!("undeclared prefix '{p}'"))),
    }
}

/// Build an element from a start tag, pushing its namespace frame.
fn open_element(
    start: &BytesStart<'_>,
    scopes: &mut Vec<Vec<(Option<String>, String)>>,
) -> Result<Element, XmlError> {
    let mut frame = Vec::new();
    let mut plain: Vec<(String, String)> = Vec::new();

    for attr in start.attributes() {
        let attr = attr.map_err(quick_xml::Error::from)?;
        let key = std::str::from_utf8(attr.key.as_ref())?.to_string();
        let value = attr.unescape_value()?.to_string();
        if key == "xmlns" {
            frame.push((None, value));
        } else if let Some(prefix) = key.strip_prefix("xmlns:") {
            frame.push((Some(prefix.to_string()), value));
        } else {
            plain.push((key, value));
        }
    }
    scopes.push(frame);

    let raw_name = std::str::from_utf8(start.name().as_ref())?.to_string();
    let (prefix, local) = split_qname(&raw_name);
    let ns = resolve(scopes, prefix)?;
    let mut el = Element::new(QName {
        ns,
        local: local.to_string(),
    });

    for (key, value) in plain {
        let (prefix, local) = split_qname(&key);
        let ns = match prefix {
            Some(_) => resolve(scopes, prefix)?,
            None => None,
        };
        if ns.as_deref() == Some(XMLNS_URI) {
            continue;
        }
        el.attributes.push((
            QName {
                ns,
                local: local.to_string(),
            },
            value,
        ));
    }
    Ok(el)
}

fn attach(
    el: Element,
    stack: &mut [Element],
    root: &mut Option<Element>,
) -> Result<(), XmlError> {
    match stack.last_mut() {
        Some(parent) => parent.children.push(el),
        None => {
            if root.is_some() {
                return Err(XmlError::Malformed("multiple root elements".into()));
            }
            *root = Some(el);
        }
    }
    Ok(())
}

/// Append to the open element's text, or to the tail of its last child.
fn append_text(stack: &mut [Element], value: &str) -> Result<(), XmlError> {
    let Some(el) = stack.last_mut() else {
        if is_xml_whitespace(value) {
            return Ok(());
        }
        return Err(XmlError::Malformed("text outside root element".into()));
    };
    let slot = match el.children.last_mut() {
        Some(child) => &mut child.tail,
        None => &mut el.text,
    };
    match slot {
        Some(existing) => existing.push_str(value),
        None => *slot = Some(value.to_string()),
    }
    Ok(())
}
