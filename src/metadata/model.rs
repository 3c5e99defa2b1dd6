//! Service metadata model
//!
//! Value types produced by the `$metadata` parser. Everything here is built once
//! per fetch and never mutated afterwards, so a `ServiceMetadata` can be shared
//! freely between concurrent readers.

use serde::{Deserialize, Serialize};
use std::fmt;

/// OData protocol generation of a service
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ODataVersion {
    #[default]
    V2,
    V4,
}

impl fmt::Display for ODataVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ODataVersion::V2 => write!(f, "v2"),
            ODataVersion::V4 => write!(f, "v4"),
        }
    }
}

/// A reference to a property that may or may not exist in the model.
///
/// Production metadata routinely points at properties that are not there, so a
/// failed lookup is kept as data instead of failing the parse.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "state", content = "path", rename_all = "lowercase")]
pub enum PropertyRef {
    Resolved(String),
    Unresolved(String),
}

impl PropertyRef {
    /// The referenced path, regardless of resolution state
    pub fn path(&self) -> &str {
        match self {
            PropertyRef::Resolved(p) | PropertyRef::Unresolved(p) => p,
        }
    }

    pub fn is_resolved(&self) -> bool {
        matches!(self, PropertyRef::Resolved(_))
    }
}

/// Declared type of a property
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", content = "name", rename_all = "lowercase")]
pub enum PropertyType {
    /// `Edm.*` primitive, or a collection of one (`Collection(Edm.String)`)
    Primitive(String),
    /// Complex, enum or otherwise unmodeled type; kept so consumers can see the field
    Opaque(String),
}

impl PropertyType {
    pub fn from_declared(raw: &str) -> Self {
        let inner = raw
            .strip_prefix("Collection(")
            .and_then(|s| s.strip_suffix(')'))
            .unwrap_or(raw);
        if inner.starts_with("Edm.") {
            PropertyType::Primitive(raw.to_string())
        } else {
            PropertyType::Opaque(raw.to_string())
        }
    }

    pub fn name(&self) -> &str {
        match self {
            PropertyType::Primitive(t) | PropertyType::Opaque(t) => t,
        }
    }

    pub fn is_opaque(&self) -> bool {
        matches!(self, PropertyType::Opaque(_))
    }

    /// True for types whose literals are written unquoted
    pub fn is_numeric(&self) -> bool {
        matches!(
            self.name(),
            "Edm.Byte"
                | "Edm.SByte"
                | "Edm.Int16"
                | "Edm.Int32"
                | "Edm.Int64"
                | "Edm.Decimal"
                | "Edm.Double"
                | "Edm.Single"
        )
    }
}

/// `sap:semantics` / vocabulary semantics of a field
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum Semantics {
    #[default]
    None,
    CurrencyCode,
    Email,
    Tel,
    UnitOfMeasure,
}

impl Semantics {
    pub fn from_sap(value: &str) -> Self {
        match value {
            "currency-code" => Semantics::CurrencyCode,
            "email" => Semantics::Email,
            "tel" => Semantics::Tel,
            "unit-of-measure" => Semantics::UnitOfMeasure,
            _ => Semantics::None,
        }
    }
}

/// `sap:display-format` / vocabulary display hint
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum DisplayFormat {
    #[default]
    None,
    UpperCase,
    NonNegative,
    Date,
}

impl DisplayFormat {
    pub fn from_sap(value: &str) -> Self {
        match value.to_ascii_lowercase().as_str() {
            "uppercase" => DisplayFormat::UpperCase,
            "nonnegative" => DisplayFormat::NonNegative,
            "date" => DisplayFormat::Date,
            _ => DisplayFormat::None,
        }
    }
}

/// Role of a value-help parameter
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum ParameterKind {
    In,
    Out,
    InOut,
    DisplayOnly,
    Constant,
    FilterOnly,
}

impl ParameterKind {
    /// Parse from a record type such as `Common.ValueListParameterInOut`
    pub fn from_record_type(record_type: &str) -> Option<Self> {
        let short = record_type.rsplit('.').next().unwrap_or(record_type);
        match short.strip_prefix("ValueListParameter")? {
            "In" => Some(ParameterKind::In),
            "Out" => Some(ParameterKind::Out),
            "InOut" => Some(ParameterKind::InOut),
            "DisplayOnly" => Some(ParameterKind::DisplayOnly),
            "Constant" => Some(ParameterKind::Constant),
            "FilterOnly" => Some(ParameterKind::FilterOnly),
            _ => None,
        }
    }
}

/// One mapping between a local property and a value-help property
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ValueListParameter {
    pub kind: ParameterKind,
    /// Absent for kinds that have no local side (display-only, constant, filter-only)
    pub local_property: Option<PropertyRef>,
    pub value_list_property: String,
    pub constant: Option<String>,
}

/// `Common.ValueList` definition attached to a property
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ValueListDefinition {
    pub collection_path: String,
    pub label: Option<String>,
    pub qualifier: Option<String>,
    pub search_supported: Option<bool>,
    pub parameters: Vec<ValueListParameter>,
}

/// Vocabulary bundle of a property, merged from `sap:*` attributes and V4 terms
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Vocabulary {
    pub label: Option<String>,
    pub text: Option<PropertyRef>,
    pub unit: Option<PropertyRef>,
    pub semantics: Semantics,
    pub quickinfo: Option<String>,
    pub display_format: DisplayFormat,
    pub filterable: bool,
    pub sortable: bool,
    pub value_help: Option<ValueListDefinition>,
}

impl Default for Vocabulary {
    fn default() -> Self {
        Self {
            label: None,
            text: None,
            unit: None,
            semantics: Semantics::None,
            quickinfo: None,
            display_format: DisplayFormat::None,
            filterable: true,
            sortable: true,
            value_help: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Property {
    pub name: String,
    pub property_type: PropertyType,
    pub nullable: bool,
    pub max_length: Option<u32>,
    pub creatable: bool,
    pub updatable: bool,
    pub vocabulary: Vocabulary,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Multiplicity {
    One,
    Many,
}

impl Multiplicity {
    /// Map an association-end multiplicity (`1`, `0..1`, `*`)
    pub fn from_end(value: &str) -> Self {
        if value == "*" {
            Multiplicity::Many
        } else {
            Multiplicity::One
        }
    }
}

/// Target of a navigation property
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "state", content = "entity_type", rename_all = "lowercase")]
pub enum NavigationTarget {
    Resolved(String),
    Unresolved(String),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct NavigationProperty {
    pub name: String,
    pub target: NavigationTarget,
    pub multiplicity: Multiplicity,
    pub partner: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct EntityType {
    pub name: String,
    /// Document order; downstream tables rely on it
    pub properties: Vec<Property>,
    /// Always a subset of `properties`
    pub keys: Vec<String>,
    /// `PropertyRef`s in `<Key>` that name no declared property
    pub unresolved_keys: Vec<String>,
    pub navigation: Vec<NavigationProperty>,
}

impl EntityType {
    pub fn property(&self, name: &str) -> Option<&Property> {
        self.properties.iter().find(|p| p.name == name)
    }

    pub(crate) fn property_mut(&mut self, name: &str) -> Option<&mut Property> {
        self.properties.iter_mut().find(|p| p.name == name)
    }

    pub fn navigation(&self, name: &str) -> Option<&NavigationProperty> {
        self.navigation.iter().find(|n| n.name == name)
    }

    pub fn is_key(&self, name: &str) -> bool {
        self.keys.iter().any(|k| k == name)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct EntitySet {
    pub name: String,
    /// Unqualified name of the backing entity type
    pub entity_type: String,
    pub creatable: bool,
    pub updatable: bool,
    pub deletable: bool,
    pub addressable: bool,
    pub searchable: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum OperationKind {
    Action,
    Function,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Parameter {
    pub name: String,
    pub parameter_type: String,
    pub nullable: bool,
}

/// Action or function, bound or unbound (V2 function imports included)
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Operation {
    pub name: String,
    pub kind: OperationKind,
    pub bound: bool,
    pub binding_type: Option<String>,
    /// Excludes the V4 binding parameter
    pub parameters: Vec<Parameter>,
    pub return_type: Option<String>,
    /// V2 `m:HttpMethod`
    pub http_method: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AssociationEnd {
    pub role: String,
    pub entity_type: String,
    pub multiplicity: Multiplicity,
}

/// V2 association between two entity types
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Association {
    pub name: String,
    pub ends: Vec<AssociationEnd>,
}

impl Association {
    pub fn end(&self, role: &str) -> Option<&AssociationEnd> {
        self.ends.iter().find(|e| e.role == role)
    }
}

/// Parsed `$metadata` of one service
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ServiceMetadata {
    pub namespace: String,
    pub alias: Option<String>,
    pub version: ODataVersion,
    pub entity_types: Vec<EntityType>,
    pub entity_sets: Vec<EntitySet>,
    pub operations: Vec<Operation>,
    pub associations: Vec<Association>,
}

impl ServiceMetadata {
    pub fn entity_type(&self, name: &str) -> Option<&EntityType> {
        let name = self.unqualify(name);
        self.entity_types.iter().find(|t| t.name == name)
    }

    pub fn entity_set(&self, name: &str) -> Option<&EntitySet> {
        self.entity_sets.iter().find(|s| s.name == name)
    }

    /// Entity type backing an entity set
    pub fn entity_type_of_set(&self, set: &str) -> Option<&EntityType> {
        self.entity_set(set)
            .and_then(|s| self.entity_type(&s.entity_type))
    }

    pub fn operation(&self, name: &str) -> Option<&Operation> {
        self.operations.iter().find(|o| o.name == name)
    }

    /// Follow a navigation property to its target entity type
    pub fn resolve_navigation(&self, entity_type: &str, nav: &str) -> Option<&EntityType> {
        match &self.entity_type(entity_type)?.navigation(nav)?.target {
            NavigationTarget::Resolved(target) => self.entity_type(target),
            NavigationTarget::Unresolved(_) => None,
        }
    }

    /// Every reference that could not be resolved, as `(owner, path)` pairs
    pub fn unresolved_references(&self) -> Vec<(String, String)> {
        let mut out = Vec::new();
        for et in &self.entity_types {
            for key in &et.unresolved_keys {
                out.push((et.name.clone(), key.clone()));
            }
            for nav in &et.navigation {
                if let NavigationTarget::Unresolved(raw) = &nav.target {
                    out.push((format!("{}/{}", et.name, nav.name), raw.clone()));
                }
            }
            for prop in &et.properties {
                let owner = format!("{}/{}", et.name, prop.name);
                let voc = &prop.vocabulary;
                let params = voc
                    .value_help
                    .iter()
                    .flat_map(|vl| vl.parameters.iter())
                    .filter_map(|p| p.local_property.as_ref());
                for r in voc.text.iter().chain(voc.unit.iter()).chain(params) {
                    if let PropertyRef::Unresolved(raw) = r {
                        out.push((owner.clone(), raw.clone()));
                    }
                }
            }
        }
        out
    }

    /// Strip the schema namespace or alias from a qualified name
    pub fn unqualify<'a>(&self, name: &'a str) -> &'a str {
        strip_qualifier(name, &self.namespace, self.alias.as_deref())
    }
}

pub(crate) fn strip_qualifier<'a>(name: &'a str, namespace: &str, alias: Option<&str>) -> &'a str {
    if !namespace.is_empty() {
        if let Some(rest) = name
            .strip_prefix(namespace)
            .and_then(|r| r.strip_prefix('.'))
        {
            return rest;
        }
    }
    if let Some(rest) = alias
        .and_then(|a| name.strip_prefix(a))
        .and_then(|r| r.strip_prefix('.'))
    {
        return rest;
    }
    name
}
