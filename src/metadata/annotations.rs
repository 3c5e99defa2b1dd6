//! Vocabulary annotation values
//!
//! Generic reader for V4 `<Annotation>` content: inline value attributes,
//! `<Record>`/`<PropertyValue>` structures and `<Collection>`s. Term names are
//! normalised so `com.sap.vocabularies.Common.v1.Label`, `SAP__common.Label`
//! and `Common.Label` all compare equal.

use roxmltree::Node;
use std::collections::HashMap;

#[derive(Debug, Clone, PartialEq)]
pub(crate) enum AnnotationValue {
    String(String),
    Bool(bool),
    Int(i64),
    Path(String),
    EnumMember(String),
    Record(Record),
    Collection(Vec<AnnotationValue>),
}

#[derive(Debug, Clone, PartialEq, Default)]
pub(crate) struct Record {
    pub record_type: Option<String>,
    pub properties: Vec<(String, AnnotationValue)>,
}

impl Record {
    pub fn get(&self, property: &str) -> Option<&AnnotationValue> {
        self.properties
            .iter()
            .find(|(name, _)| name == property)
            .map(|(_, value)| value)
    }
}

impl AnnotationValue {
    /// String-like content: strings, paths and enum members
    pub fn as_str(&self) -> Option<&str> {
        match self {
            AnnotationValue::String(s) | AnnotationValue::Path(s) | AnnotationValue::EnumMember(s) => {
                Some(s)
            }
            _ => None,
        }
    }

    pub fn as_path(&self) -> Option<&str> {
        match self {
            AnnotationValue::Path(p) => Some(p),
            _ => None,
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            AnnotationValue::Bool(b) => Some(*b),
            AnnotationValue::String(s) => parse_bool(s),
            _ => None,
        }
    }

    pub fn as_record(&self) -> Option<&Record> {
        match self {
            AnnotationValue::Record(r) => Some(r),
            _ => None,
        }
    }

    pub fn as_collection(&self) -> Option<&[AnnotationValue]> {
        match self {
            AnnotationValue::Collection(items) => Some(items),
            _ => None,
        }
    }
}

fn parse_bool(raw: &str) -> Option<bool> {
    match raw.trim().to_ascii_lowercase().as_str() {
        "true" => Some(true),
        "false" => Some(false),
        _ => None,
    }
}

fn text_of(node: Node) -> String {
    node.text().map(str::trim).unwrap_or_default().to_string()
}

/// Value carried by an `<Annotation>` or `<PropertyValue>` element.
///
/// Returns `None` when the element has no value we model, e.g. a tag term
/// written without `Bool`, or an `AnnotationPath`.
pub(crate) fn value_of(node: Node) -> Option<AnnotationValue> {
    for attr in node.attributes() {
        let value = attr.value();
        let parsed = match attr.name() {
            "String" | "Decimal" | "Date" | "DateTimeOffset" | "Guid" => {
                AnnotationValue::String(value.to_string())
            }
            "Bool" => AnnotationValue::Bool(parse_bool(value).unwrap_or(false)),
            "Int" => match value.parse() {
                Ok(n) => AnnotationValue::Int(n),
                Err(_) => AnnotationValue::String(value.to_string()),
            },
            "Path" | "PropertyPath" => AnnotationValue::Path(value.to_string()),
            "EnumMember" => AnnotationValue::EnumMember(value.to_string()),
            _ => continue,
        };
        return Some(parsed);
    }

    node.children()
        .filter(Node::is_element)
        .find_map(element_value)
}

/// Value of a standalone expression element (`<String>`, `<Record>`, ...)
fn element_value(node: Node) -> Option<AnnotationValue> {
    let value = match node.tag_name().name() {
        "String" | "Decimal" | "Date" | "DateTimeOffset" | "Guid" => {
            AnnotationValue::String(text_of(node))
        }
        "Bool" => AnnotationValue::Bool(parse_bool(&text_of(node)).unwrap_or(false)),
        "Int" => {
            let raw = text_of(node);
            match raw.parse() {
                Ok(n) => AnnotationValue::Int(n),
                Err(_) => AnnotationValue::String(raw),
            }
        }
        "Path" | "PropertyPath" => AnnotationValue::Path(text_of(node)),
        "EnumMember" => AnnotationValue::EnumMember(text_of(node)),
        "Record" => AnnotationValue::Record(record_of(node)),
        "Collection" => AnnotationValue::Collection(
            node.children()
                .filter(Node::is_element)
                .filter_map(element_value)
                .collect(),
        ),
        // NavigationPropertyPath, AnnotationPath, Apply, nested Annotation, ...
        _ => return None,
    };
    Some(value)
}

fn record_of(node: Node) -> Record {
    let properties = node
        .children()
        .filter(|c| c.is_element() && c.tag_name().name() == "PropertyValue")
        .filter_map(|pv| {
            let name = pv.attribute("Property")?;
            let value = value_of(pv)?;
            Some((name.to_string(), value))
        })
        .collect();

    Record {
        record_type: node.attribute("Type").map(str::to_string),
        properties,
    }
}

/// Normalise a term to `Vocabulary.Name`, resolving `edmx:Include` aliases
/// and dropping namespace/version segments.
pub(crate) fn normalize_term(term: &str, aliases: &HashMap<String, String>) -> String {
    let Some((prefix, name)) = term.rsplit_once('.') else {
        return term.to_string();
    };
    let namespace = aliases.get(prefix).map(String::as_str).unwrap_or(prefix);
    let vocabulary = namespace
        .split('.')
        .filter(|segment| !is_version_segment(segment))
        .last()
        .unwrap_or(namespace);
    format!("{}.{}", vocabulary, name)
}

fn is_version_segment(segment: &str) -> bool {
    let mut chars = segment.chars();
    matches!(chars.next(), Some('v' | 'V'))
        && segment.len() > 1
        && chars.all(|c| c.is_ascii_digit())
}
