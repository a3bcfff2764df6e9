//! XML ↔ tree mapping.
//!
//! Score and song documents are navigated as open records by name rather
//! than through a fixed schema. This module converts XML into an
//! attribute-addressable [`Node`] tree and back:
//!
//! - Elements with only text content reduce to a scalar after coercion
//!   (integer, then float, then boolean, then text). Callers may install a
//!   different coercer; [`list_coerce`] additionally splits space-separated
//!   numeric strings such as tuning lists into sequences.
//! - An element whose attributes are exactly `count` and whose child count
//!   equals that attribute becomes a [`Node::Sequence`]. If such an element
//!   ever grows another attribute the collection semantics silently
//!   disappear; that is a constraint of the format, not a feature.
//! - Every other element becomes a [`Node::Record`] holding `@attr` fields
//!   for its attributes plus one field per distinct child tag. Repeated
//!   child tags collapse into a [`Node::Inline`] container that preserves
//!   sibling order, so adjacent chord notes are not silently merged.
//!
//! Emission mirrors the rules: sequences get a `count` wrapper with
//! singularised child tags (`ies` → `y`, else drop a trailing `s`), inline
//! containers emit bare siblings. Round-tripping is guaranteed only for
//! XML this crate itself produces.

use std::fmt::Write as _;

use quick_xml::Reader;
use quick_xml::escape::escape;
use quick_xml::events::Event;
use thiserror::Error;

/// An error occurred while mapping XML.
#[non_exhaustive]
#[derive(Debug, Error)]
pub enum XmlError {
    /// The document is not well-formed XML.
    #[error("xml syntax: {0}")]
    Syntax(#[from] quick_xml::Error),
    /// An attribute could not be decoded.
    #[error("xml attribute: {0}")]
    Attribute(#[from] quick_xml::events::attributes::AttrError),
    /// The document shape did not match what the caller required.
    #[error("unexpected shape: {0}")]
    Shape(String),
}

/// A scalar coercion function applied to every text and attribute value.
pub type Coercer = fn(&str) -> Node;

/// One node of the attribute-addressable tree.
#[derive(Debug, Clone, PartialEq)]
pub enum Node {
    /// An integer scalar.
    Int(i64),
    /// A floating-point scalar.
    Float(f64),
    /// A boolean scalar.
    Bool(bool),
    /// A text scalar.
    Text(String),
    /// An ordered record of named fields; attribute fields carry an `@`
    /// prefix.
    Record(Vec<(String, Node)>),
    /// A `count`-wrapped ordered collection.
    Sequence(Vec<Node>),
    /// Repeated sibling elements sharing one tag, kept in order.
    Inline(Vec<Node>),
}

impl Node {
    /// An empty record.
    #[must_use]
    pub const fn empty() -> Self {
        Self::Record(Vec::new())
    }

    /// Looks up a record field by name (`@name` for attributes).
    #[must_use]
    pub fn get(&self, key: &str) -> Option<&Self> {
        match self {
            Self::Record(fields) => fields.iter().find(|(k, _)| k == key).map(|(_, v)| v),
            _ => None,
        }
    }

    /// True when the record carries the field.
    #[must_use]
    pub fn has(&self, key: &str) -> bool {
        self.get(key).is_some()
    }

    /// The record fields, when this node is a record.
    #[must_use]
    pub fn fields(&self) -> Option<&[(String, Node)]> {
        match self {
            Self::Record(fields) => Some(fields),
            _ => None,
        }
    }

    /// The items of a sequence or inline container.
    ///
    /// A lone node is returned as a one-element slice view via the caller;
    /// use [`Node::iter_items`] for the common "one or many" access.
    #[must_use]
    pub fn items(&self) -> Option<&[Node]> {
        match self {
            Self::Sequence(items) | Self::Inline(items) => Some(items),
            _ => None,
        }
    }

    /// Iterates a collection node, treating any other node as a singleton.
    ///
    /// Repeated XML siblings parse as [`Node::Inline`] only when there are
    /// at least two of them, so consumers of "zero or more" children go
    /// through this.
    pub fn iter_items(&self) -> impl Iterator<Item = &Node> {
        match self {
            Self::Sequence(items) | Self::Inline(items) => items.iter(),
            other => std::slice::from_ref(other).iter(),
        }
    }

    /// The integer value, if the node is an integer.
    #[must_use]
    pub const fn as_i64(&self) -> Option<i64> {
        match self {
            Self::Int(v) => Some(*v),
            _ => None,
        }
    }

    /// The numeric value, widening integers to floats.
    #[must_use]
    pub const fn as_f64(&self) -> Option<f64> {
        match self {
            Self::Int(v) => Some(*v as f64),
            Self::Float(v) => Some(*v),
            _ => None,
        }
    }

    /// The text value, if the node is text.
    #[must_use]
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::Text(v) => Some(v),
            _ => None,
        }
    }

    /// Truthiness in the loose, score-property sense: absent fields are
    /// false, zero and empty are false, everything else is true.
    #[must_use]
    pub fn truthy(&self) -> bool {
        match self {
            Self::Int(v) => *v != 0,
            Self::Float(v) => *v != 0.0,
            Self::Bool(v) => *v,
            Self::Text(v) => !v.is_empty(),
            Self::Record(fields) => !fields.is_empty(),
            Self::Sequence(items) | Self::Inline(items) => !items.is_empty(),
        }
    }

    /// Adds or replaces a record field.
    pub fn set(&mut self, key: &str, value: Self) {
        if let Self::Record(fields) = self {
            if let Some(slot) = fields.iter_mut().find(|(k, _)| k == key) {
                slot.1 = value;
            } else {
                fields.push((key.to_string(), value));
            }
        }
    }
}

/// The default scalar coercion: integer, float, boolean, then text.
#[must_use]
pub fn default_coerce(text: &str) -> Node {
    if let Ok(v) = text.parse::<i64>() {
        return Node::Int(v);
    }
    if let Ok(v) = text.parse::<f64>() {
        return Node::Float(v);
    }
    match text {
        "true" => Node::Bool(true),
        "false" => Node::Bool(false),
        _ => Node::Text(text.to_string()),
    }
}

/// [`default_coerce`] plus splitting of space-separated numeric strings
/// (`"40 45 50 55 59 64"`) into sequences.
#[must_use]
pub fn list_coerce(text: &str) -> Node {
    match default_coerce(text) {
        Node::Text(s) => {
            let parts: Vec<&str> = s.split(' ').collect();
            if parts.len() > 1 && !matches!(default_coerce(parts[0]), Node::Text(_)) {
                return Node::Sequence(parts.into_iter().map(default_coerce).collect());
            }
            Node::Text(s)
        }
        scalar => scalar,
    }
}

/// Parses an XML document into the root element's [`Node`].
pub fn from_xml(text: &str, coerce: Coercer) -> Result<Node, XmlError> {
    let mut reader = Reader::from_str(text);
    reader.config_mut().trim_text(true);

    // One frame per open element: its attributes, accumulated children
    // (tag + node) and text content.
    struct Frame {
        attrs: Vec<(String, String)>,
        children: Vec<(String, Node)>,
        text: String,
    }

    fn close(frame: Frame, coerce: Coercer) -> Node {
        if !frame.text.is_empty() {
            return coerce(&frame.text);
        }
        if let [(key, value)] = frame.attrs.as_slice() {
            if key == "count" && value.parse::<usize>() == Ok(frame.children.len()) {
                return Node::Sequence(frame.children.into_iter().map(|(_, n)| n).collect());
            }
        }

        let mut fields: Vec<(String, Node)> = frame
            .attrs
            .into_iter()
            .map(|(k, v)| (format!("@{k}"), coerce(&v)))
            .collect();
        for (tag, node) in frame.children {
            match fields.iter_mut().find(|(k, _)| *k == tag) {
                Some((_, Node::Inline(items))) => items.push(node),
                Some(slot) => {
                    let first = std::mem::replace(&mut slot.1, Node::Inline(vec![]));
                    slot.1 = Node::Inline(vec![first, node]);
                }
                None => fields.push((tag, node)),
            }
        }
        Node::Record(fields)
    }

    let mut stack: Vec<(String, Frame)> = Vec::new();
    let mut root: Option<Node> = None;

    fn open_frame(e: &quick_xml::events::BytesStart<'_>) -> Result<(String, Frame), XmlError> {
        let tag = String::from_utf8_lossy(e.name().as_ref()).into_owned();
        let mut attrs = Vec::new();
        for attr in e.attributes() {
            let attr = attr?;
            attrs.push((
                String::from_utf8_lossy(attr.key.as_ref()).into_owned(),
                attr.unescape_value()?.into_owned(),
            ));
        }
        Ok((
            tag,
            Frame {
                attrs,
                children: Vec::new(),
                text: String::new(),
            },
        ))
    }

    loop {
        match reader.read_event()? {
            Event::Start(e) => {
                stack.push(open_frame(&e)?);
            }
            Event::Empty(e) => {
                let (tag, frame) = open_frame(&e)?;
                let node = close(frame, coerce);
                match stack.last_mut() {
                    Some((_, parent)) => parent.children.push((tag, node)),
                    None => root = Some(node),
                }
            }
            Event::End(_) => {
                let (tag, frame) = stack
                    .pop()
                    .ok_or_else(|| XmlError::Shape("unbalanced end tag".into()))?;
                let node = close(frame, coerce);
                match stack.last_mut() {
                    Some((_, parent)) => parent.children.push((tag, node)),
                    None => root = Some(node),
                }
            }
            Event::Text(t) => {
                if let Some((_, frame)) = stack.last_mut() {
                    frame.text.push_str(&t.unescape()?);
                }
            }
            Event::CData(t) => {
                if let Some((_, frame)) = stack.last_mut() {
                    frame.text.push_str(&String::from_utf8_lossy(&t));
                }
            }
            Event::Eof => break,
            _ => {}
        }
    }

    root.ok_or_else(|| XmlError::Shape("document has no root element".into()))
}

/// Renders a scalar the way it is parsed back.
fn scalar_text(node: &Node) -> String {
    match node {
        Node::Int(v) => v.to_string(),
        Node::Float(v) => v.to_string(),
        Node::Bool(v) => v.to_string(),
        Node::Text(v) => v.clone(),
        _ => String::new(),
    }
}

fn singularize(tag: &str) -> String {
    if let Some(stem) = tag.strip_suffix("ies") {
        format!("{stem}y")
    } else if let Some(stem) = tag.strip_suffix('s') {
        stem.to_string()
    } else {
        tag.to_string()
    }
}

fn write_node(out: &mut String, tag: &str, node: &Node) {
    match node {
        Node::Record(fields) => {
            let _ = write!(out, "<{tag}");
            for (key, value) in fields {
                if let Some(name) = key.strip_prefix('@') {
                    let _ = write!(out, " {name}=\"{}\"", escape(&scalar_text(value)));
                }
            }
            let children: Vec<&(String, Node)> =
                fields.iter().filter(|(k, _)| !k.starts_with('@')).collect();
            if children.is_empty() {
                out.push_str("/>");
            } else {
                out.push('>');
                for (key, value) in children {
                    write_node(out, key, value);
                }
                let _ = write!(out, "</{tag}>");
            }
        }
        Node::Sequence(items) => {
            let child_tag = singularize(tag);
            let _ = write!(out, "<{tag} count=\"{}\">", items.len());
            for item in items {
                write_node(out, &child_tag, item);
            }
            let _ = write!(out, "</{tag}>");
        }
        Node::Inline(items) => {
            for item in items {
                write_node(out, tag, item);
            }
        }
        scalar => {
            let text = scalar_text(scalar);
            if text.is_empty() {
                let _ = write!(out, "<{tag}/>");
            } else {
                let _ = write!(out, "<{tag}>{}</{tag}>", escape(&text));
            }
        }
    }
}

/// Emits a [`Node`] tree as an XML document rooted at `tag`.
#[must_use]
pub fn to_xml(tag: &str, node: &Node) -> String {
    let mut out = String::new();
    write_node(&mut out, tag, node);
    out
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;

    #[test]
    fn text_elements_reduce_to_scalars() {
        let node = from_xml("<r><a>12</a><b>1.5</b><c>true</c><d>hi</d></r>", default_coerce)
            .unwrap();
        assert_eq!(node.get("a"), Some(&Node::Int(12)));
        assert_eq!(node.get("b"), Some(&Node::Float(1.5)));
        assert_eq!(node.get("c"), Some(&Node::Bool(true)));
        assert_eq!(node.get("d"), Some(&Node::Text("hi".into())));
    }

    #[test]
    fn count_attribute_makes_a_sequence() {
        let node = from_xml(
            r#"<Beats count="2"><Beat>1</Beat><Beat>2</Beat></Beats>"#,
            default_coerce,
        )
        .unwrap();
        assert_eq!(node, Node::Sequence(vec![Node::Int(1), Node::Int(2)]));
    }

    #[test]
    fn extra_attribute_disables_sequence_semantics() {
        let node = from_xml(
            r#"<Beats count="1" id="3"><Beat>1</Beat></Beats>"#,
            default_coerce,
        )
        .unwrap();
        assert!(matches!(node, Node::Record(_)));
        assert_eq!(node.get("@count"), Some(&Node::Int(1)));
    }

    #[test]
    fn repeated_tags_collapse_into_inline() {
        let node = from_xml(
            r#"<chord><chordNote fret="1"/><chordNote fret="3"/></chord>"#,
            default_coerce,
        )
        .unwrap();
        let notes = node.get("chordNote").unwrap();
        assert!(matches!(notes, Node::Inline(items) if items.len() == 2));
    }

    #[test]
    fn attributes_are_addressable_with_at() {
        let node = from_xml(r#"<Rhythm ref="4"/>"#, default_coerce).unwrap();
        assert_eq!(node.get("@ref"), Some(&Node::Int(4)));
    }

    #[test]
    fn list_coercion_splits_tunings() {
        assert_eq!(
            list_coerce("40 45 50 55 59 64"),
            Node::Sequence(vec![
                Node::Int(40),
                Node::Int(45),
                Node::Int(50),
                Node::Int(55),
                Node::Int(59),
                Node::Int(64),
            ])
        );
        assert_eq!(list_coerce("E Standard"), Node::Text("E Standard".into()));
    }

    #[test]
    fn roundtrip_of_produced_xml() {
        let tree = Node::Record(vec![
            ("@version".into(), Node::Int(8)),
            ("title".into(), Node::Text("Song & Dance".into())),
            (
                "ebeats".into(),
                Node::Sequence(vec![
                    Node::Record(vec![
                        ("@time".into(), Node::Float(0.0)),
                        ("@measure".into(), Node::Int(1)),
                    ]),
                    Node::Record(vec![
                        ("@time".into(), Node::Float(0.5)),
                        ("@measure".into(), Node::Int(-1)),
                    ]),
                ]),
            ),
            (
                "chordNote".into(),
                Node::Inline(vec![
                    Node::Record(vec![("@fret".into(), Node::Int(2))]),
                    Node::Record(vec![("@fret".into(), Node::Int(4))]),
                ]),
            ),
        ]);
        let xml = to_xml("song", &tree);
        let reparsed = from_xml(&xml, default_coerce).unwrap();
        assert_eq!(to_xml("song", &reparsed), xml);
    }

    #[test]
    fn singularization() {
        assert_eq!(singularize("ebeats"), "ebeat");
        assert_eq!(singularize("entries"), "entry");
        assert_eq!(singularize("phraseIterations"), "phraseIteration");
    }
}
