//! `$metadata` parser
//!
//! Turns an EDMX document into a [`ServiceMetadata`]. V2 `sap:*` attributes are
//! read while the schema skeleton is built; V4 vocabulary annotations are
//! applied afterwards and therefore win when both describe the same slot.

use super::annotations::{normalize_term, value_of, AnnotationValue, Record};
use super::model::*;
use roxmltree::{Document, Node};
use std::collections::{HashMap, HashSet};
use thiserror::Error;

const SAP_NS: &str = "http://www.sap.com/Protocols/SAPData";
const METADATA_NS: &str = "http://schemas.microsoft.com/ado/2007/08/dataservices/metadata";
const EDMX_V4_NS: &str = "http://docs.oasis-open.org/odata/ns/edmx";

/// Metadata parsing errors. No partial model is returned alongside any of these.
#[derive(Error, Debug)]
pub enum MetadataParseError {
    #[error("Metadata is not valid UTF-8: {0}")]
    Encoding(#[from] std::str::Utf8Error),

    #[error("Malformed metadata XML: {0}")]
    Xml(#[from] roxmltree::Error),

    #[error("No <Schema> element found in metadata")]
    MissingSchema,

    #[error("No <EntityContainer> element found in metadata")]
    MissingEntityContainer,

    #[error("Duplicate entity type: {0}")]
    DuplicateEntityType(String),

    #[error("Entity set '{set}' references unknown entity type '{entity_type}'")]
    UnknownEntityType { set: String, entity_type: String },
}

/// Parse raw `$metadata` bytes.
pub fn parse_metadata(xml: &[u8]) -> Result<ServiceMetadata, MetadataParseError> {
    let text = std::str::from_utf8(xml)?;
    let doc = Document::parse(text.trim_start_matches('\u{feff}'))?;
    Parser::new(&doc)?.run()
}

impl std::str::FromStr for ServiceMetadata {
    type Err = MetadataParseError;

    fn from_str(xml: &str) -> Result<Self, Self::Err> {
        parse_metadata(xml.as_bytes())
    }
}

/// Navigation property as declared, before its target is known
struct RawNav {
    name: String,
    /// V2 association and roles
    relationship: Option<String>,
    from_role: Option<String>,
    to_role: Option<String>,
    /// V4 target type and partner
    target_type: Option<String>,
    partner: Option<String>,
}

#[derive(Clone, Copy)]
enum RefSlot {
    Text,
    Unit,
}

/// `sap:text` / `sap:unit` value waiting for resolution
struct RawRef {
    entity_type: usize,
    property: usize,
    slot: RefSlot,
    path: String,
}

/// V4 annotation collected from a block or an inline element
struct PendingAnnotation {
    target: String,
    term: String,
    qualifier: Option<String>,
    value: Option<AnnotationValue>,
}

enum Target {
    EntityType,
    Property(usize, usize),
    EntitySet(usize),
}

struct Parser<'a, 'input> {
    doc: &'a Document<'input>,
    version: ODataVersion,
    namespace: String,
    alias: Option<String>,
    /// Every schema namespace and alias, used to unqualify names
    qualifiers: Vec<String>,
    /// Vocabulary alias -> namespace from `edmx:Include`
    term_aliases: HashMap<String, String>,
    containers: Vec<String>,
    /// `(namespace, name)` of every entity type seen so far
    declared_types: HashSet<(String, String)>,
    entity_types: Vec<EntityType>,
    raw_navs: Vec<Vec<RawNav>>,
    raw_refs: Vec<RawRef>,
    entity_sets: Vec<EntitySet>,
    operations: Vec<Operation>,
    associations: Vec<Association>,
    annotations: Vec<PendingAnnotation>,
}

fn child_elements<'a, 'input: 'a>(
    node: Node<'a, 'input>,
    name: &'static str,
) -> impl Iterator<Item = Node<'a, 'input>> {
    node.children()
        .filter(move |c| c.is_element() && c.tag_name().name() == name)
}

fn sap_attr<'a>(node: Node<'a, '_>, name: &str) -> Option<&'a str> {
    node.attribute((SAP_NS, name))
}

fn sap_bool(node: Node, name: &str, default: bool) -> bool {
    match sap_attr(node, name) {
        Some(v) => v.eq_ignore_ascii_case("true"),
        None => default,
    }
}

fn non_empty(value: Option<&str>) -> Option<String> {
    value.filter(|v| !v.is_empty()).map(str::to_string)
}

fn strip_collection(raw: &str) -> (&str, bool) {
    match raw
        .strip_prefix("Collection(")
        .and_then(|s| s.strip_suffix(')'))
    {
        Some(inner) => (inner, true),
        None => (raw, false),
    }
}

impl<'a, 'input> Parser<'a, 'input> {
    fn new(doc: &'a Document<'input>) -> Result<Self, MetadataParseError> {
        let root = doc.root_element();
        let version = detect_version(root);

        let schemas: Vec<Node> = doc
            .descendants()
            .filter(|n| n.is_element() && n.tag_name().name() == "Schema")
            .collect();
        if schemas.is_empty() {
            return Err(MetadataParseError::MissingSchema);
        }

        let containers: Vec<String> = doc
            .descendants()
            .filter(|n| n.is_element() && n.tag_name().name() == "EntityContainer")
            .map(|n| n.attribute("Name").unwrap_or_default().to_string())
            .collect();
        if containers.is_empty() {
            return Err(MetadataParseError::MissingEntityContainer);
        }

        let main_schema = schemas
            .iter()
            .find(|s| child_elements(**s, "EntityType").next().is_some())
            .unwrap_or(&schemas[0]);

        let mut qualifiers = Vec::new();
        for schema in &schemas {
            qualifiers.extend(schema.attribute("Namespace").map(str::to_string));
            qualifiers.extend(schema.attribute("Alias").map(str::to_string));
        }

        let term_aliases = doc
            .descendants()
            .filter(|n| n.is_element() && n.tag_name().name() == "Include")
            .filter_map(|n| {
                Some((
                    n.attribute("Alias")?.to_string(),
                    n.attribute("Namespace")?.to_string(),
                ))
            })
            .collect();

        let has_v4_annotations = doc
            .descendants()
            .any(|n| n.is_element() && n.tag_name().name() == "Annotation" && n.has_attribute("Term"));
        tracing::debug!(
            "Parsing {} metadata, {} schema(s), V4 annotations present: {}",
            version,
            schemas.len(),
            has_v4_annotations
        );

        Ok(Self {
            doc,
            version,
            namespace: main_schema.attribute("Namespace").unwrap_or_default().to_string(),
            alias: main_schema.attribute("Alias").map(str::to_string),
            qualifiers,
            term_aliases,
            containers,
            declared_types: HashSet::new(),
            entity_types: Vec::new(),
            raw_navs: Vec::new(),
            raw_refs: Vec::new(),
            entity_sets: Vec::new(),
            operations: Vec::new(),
            associations: Vec::new(),
            annotations: Vec::new(),
        })
    }

    fn run(mut self) -> Result<ServiceMetadata, MetadataParseError> {
        let schemas: Vec<Node<'a, 'input>> = self
            .doc
            .descendants()
            .filter(|n| n.is_element() && n.tag_name().name() == "Schema")
            .collect();

        // First pass: skeleton, in document order
        for schema in &schemas {
            let namespace = schema.attribute("Namespace").unwrap_or_default();
            for node in schema.children().filter(Node::is_element) {
                match node.tag_name().name() {
                    "EntityType" => self.parse_entity_type(node, namespace)?,
                    "Association" => self.parse_association(node),
                    "Action" | "Function" => self.parse_operation(node),
                    "EntityContainer" => self.parse_container(node),
                    // ComplexType, EnumType, Term, ...: not modeled
                    _ => {}
                }
            }
        }

        for set in &self.entity_sets {
            if !self.entity_types.iter().any(|t| t.name == set.entity_type) {
                return Err(MetadataParseError::UnknownEntityType {
                    set: set.name.clone(),
                    entity_type: set.entity_type.clone(),
                });
            }
        }

        // Second pass: cross references, then V4 vocabulary on top of V2 attributes
        self.resolve_navigation();
        self.resolve_attribute_refs();
        self.collect_annotation_blocks();
        self.apply_annotations();

        tracing::info!(
            "Parsed metadata for {}: {} entity types, {} entity sets, {} operations",
            self.namespace,
            self.entity_types.len(),
            self.entity_sets.len(),
            self.operations.len()
        );

        Ok(ServiceMetadata {
            namespace: self.namespace,
            alias: self.alias,
            version: self.version,
            entity_types: self.entity_types,
            entity_sets: self.entity_sets,
            operations: self.operations,
            associations: self.associations,
        })
    }

    fn unqualify<'s>(&self, name: &'s str) -> &'s str {
        for qualifier in &self.qualifiers {
            if let Some(rest) = name
                .strip_prefix(qualifier.as_str())
                .and_then(|r| r.strip_prefix('.'))
            {
                return rest;
            }
        }
        name
    }

    fn type_index(&self, name: &str) -> Option<usize> {
        let name = self.unqualify(name);
        self.entity_types.iter().position(|t| t.name == name)
    }

    fn parse_entity_type(&mut self, node: Node, namespace: &str) -> Result<(), MetadataParseError> {
        let name = node.attribute("Name").unwrap_or_default().to_string();
        if !self
            .declared_types
            .insert((namespace.to_string(), name.clone()))
        {
            return Err(MetadataParseError::DuplicateEntityType(name));
        }
        let type_idx = self.entity_types.len();

        let key_refs: Vec<String> = child_elements(node, "Key")
            .flat_map(|k| child_elements(k, "PropertyRef"))
            .filter_map(|r| r.attribute("Name").map(str::to_string))
            .collect();

        let mut properties = Vec::new();
        for prop in child_elements(node, "Property") {
            let prop_idx = properties.len();
            let property = self.parse_property(prop, type_idx, prop_idx);
            self.collect_inline(prop, format!("{}/{}", name, property.name));
            properties.push(property);
        }

        let navs = child_elements(node, "NavigationProperty")
            .map(|nav| RawNav {
                name: nav.attribute("Name").unwrap_or_default().to_string(),
                relationship: nav.attribute("Relationship").map(str::to_string),
                from_role: nav.attribute("FromRole").map(str::to_string),
                to_role: nav.attribute("ToRole").map(str::to_string),
                target_type: nav.attribute("Type").map(str::to_string),
                partner: nav.attribute("Partner").map(str::to_string),
            })
            .collect();

        // Keys stay a subset of the properties; the rest is kept as data
        let (keys, unresolved_keys): (Vec<String>, Vec<String>) = key_refs
            .into_iter()
            .partition(|key| properties.iter().any(|p: &Property| &p.name == key));
        for key in &unresolved_keys {
            tracing::warn!("Entity type {} declares key '{}' without a matching property", name, key);
        }

        self.collect_inline(node, name.clone());
        self.raw_navs.push(navs);
        self.entity_types.push(EntityType {
            name,
            properties,
            keys,
            unresolved_keys,
            navigation: Vec::new(),
        });
        Ok(())
    }

    fn parse_property(&mut self, node: Node, type_idx: usize, prop_idx: usize) -> Property {
        let name = node.attribute("Name").unwrap_or_default().to_string();
        let declared = node.attribute("Type").unwrap_or("Edm.String");

        for (attr, slot) in [("text", RefSlot::Text), ("unit", RefSlot::Unit)] {
            if let Some(path) = non_empty(sap_attr(node, attr)) {
                self.raw_refs.push(RawRef {
                    entity_type: type_idx,
                    property: prop_idx,
                    slot,
                    path,
                });
            }
        }

        Property {
            name,
            property_type: PropertyType::from_declared(declared),
            nullable: node
                .attribute("Nullable")
                .map_or(true, |v| !v.eq_ignore_ascii_case("false")),
            max_length: node.attribute("MaxLength").and_then(|v| v.parse().ok()),
            creatable: sap_bool(node, "creatable", true),
            updatable: sap_bool(node, "updatable", true),
            vocabulary: Vocabulary {
                label: non_empty(sap_attr(node, "label")),
                quickinfo: non_empty(sap_attr(node, "quickinfo")),
                semantics: sap_attr(node, "semantics").map_or(Semantics::None, Semantics::from_sap),
                display_format: sap_attr(node, "display-format")
                    .map_or(DisplayFormat::None, DisplayFormat::from_sap),
                filterable: sap_bool(node, "filterable", true),
                sortable: sap_bool(node, "sortable", true),
                ..Vocabulary::default()
            },
        }
    }

    fn parse_association(&mut self, node: Node) {
        let ends = child_elements(node, "End")
            .map(|end| AssociationEnd {
                role: end.attribute("Role").unwrap_or_default().to_string(),
                entity_type: self.unqualify(end.attribute("Type").unwrap_or_default()).to_string(),
                multiplicity: Multiplicity::from_end(end.attribute("Multiplicity").unwrap_or("1")),
            })
            .collect();
        self.associations.push(Association {
            name: node.attribute("Name").unwrap_or_default().to_string(),
            ends,
        });
    }

    fn parse_parameters(node: Node) -> Vec<Parameter> {
        child_elements(node, "Parameter")
            .map(|p| Parameter {
                name: p.attribute("Name").unwrap_or_default().to_string(),
                parameter_type: p.attribute("Type").unwrap_or_default().to_string(),
                nullable: p
                    .attribute("Nullable")
                    .map_or(true, |v| !v.eq_ignore_ascii_case("false")),
            })
            .collect()
    }

    /// V4 `<Action>` / `<Function>`
    fn parse_operation(&mut self, node: Node) {
        let kind = if node.tag_name().name() == "Action" {
            OperationKind::Action
        } else {
            OperationKind::Function
        };
        let bound = node
            .attribute("IsBound")
            .is_some_and(|v| v.eq_ignore_ascii_case("true"));

        let mut parameters = Self::parse_parameters(node);
        let binding_type = if bound && !parameters.is_empty() {
            let binding = parameters.remove(0);
            let (inner, _) = strip_collection(&binding.parameter_type);
            Some(self.unqualify(inner).to_string())
        } else {
            None
        };

        self.operations.push(Operation {
            name: node.attribute("Name").unwrap_or_default().to_string(),
            kind,
            bound,
            binding_type,
            parameters,
            return_type: child_elements(node, "ReturnType")
                .next()
                .and_then(|r| r.attribute("Type"))
                .map(str::to_string),
            http_method: None,
        });
    }

    fn parse_container(&mut self, node: Node) {
        for child in node.children().filter(Node::is_element) {
            match child.tag_name().name() {
                "EntitySet" => {
                    let set = EntitySet {
                        name: child.attribute("Name").unwrap_or_default().to_string(),
                        entity_type: self
                            .unqualify(child.attribute("EntityType").unwrap_or_default())
                            .to_string(),
                        creatable: sap_bool(child, "creatable", true),
                        updatable: sap_bool(child, "updatable", true),
                        deletable: sap_bool(child, "deletable", true),
                        addressable: sap_bool(child, "addressable", true),
                        searchable: sap_bool(child, "searchable", false),
                    };
                    self.collect_inline(child, set.name.clone());
                    self.entity_sets.push(set);
                }
                // V4 imports point at an Action/Function already read from the schema
                "FunctionImport" if !child.has_attribute("Function") => {
                    self.parse_function_import(child);
                }
                _ => {}
            }
        }
    }

    /// V2 `<FunctionImport>`
    fn parse_function_import(&mut self, node: Node) {
        let http_method = node
            .attribute((METADATA_NS, "HttpMethod"))
            .unwrap_or("GET")
            .to_ascii_uppercase();
        let kind = if http_method == "GET" {
            OperationKind::Function
        } else {
            OperationKind::Action
        };
        let binding_type = sap_attr(node, "action-for").map(|t| self.unqualify(t).to_string());

        self.operations.push(Operation {
            name: node.attribute("Name").unwrap_or_default().to_string(),
            kind,
            bound: binding_type.is_some(),
            binding_type,
            parameters: Self::parse_parameters(node),
            return_type: node.attribute("ReturnType").map(str::to_string),
            http_method: Some(http_method),
        });
    }

    fn collect_inline(&mut self, node: Node, target: String) {
        for ann in child_elements(node, "Annotation") {
            if let Some(pending) = self.pending(ann, &target, None) {
                self.annotations.push(pending);
            }
        }
    }

    fn collect_annotation_blocks(&mut self) {
        let blocks: Vec<Node<'a, 'input>> = self
            .doc
            .descendants()
            .filter(|n| n.is_element() && n.tag_name().name() == "Annotations")
            .collect();

        for block in blocks {
            let Some(target) = block.attribute("Target").filter(|t| !t.is_empty()) else {
                continue;
            };
            let block_qualifier = block.attribute("Qualifier");
            for ann in child_elements(block, "Annotation") {
                if let Some(pending) = self.pending(ann, target, block_qualifier) {
                    self.annotations.push(pending);
                }
            }
        }
    }

    fn pending(
        &self,
        ann: Node,
        target: &str,
        block_qualifier: Option<&str>,
    ) -> Option<PendingAnnotation> {
        let term = ann.attribute("Term")?;
        Some(PendingAnnotation {
            target: target.to_string(),
            term: normalize_term(term, &self.term_aliases),
            qualifier: ann
                .attribute("Qualifier")
                .or(block_qualifier)
                .map(str::to_string),
            value: value_of(ann),
        })
    }

    fn resolve_navigation(&mut self) {
        let raw_navs = std::mem::take(&mut self.raw_navs);
        for (type_idx, navs) in raw_navs.iter().enumerate() {
            let owner = self.entity_types[type_idx].name.clone();
            let resolved: Vec<NavigationProperty> = navs
                .iter()
                .map(|raw| self.resolve_nav(&owner, raw, &raw_navs))
                .collect();
            self.entity_types[type_idx].navigation = resolved;
        }
    }

    fn resolve_nav(&self, owner: &str, raw: &RawNav, all: &[Vec<RawNav>]) -> NavigationProperty {
        if let Some(declared) = &raw.target_type {
            let (inner, many) = strip_collection(declared);
            let target = match self.type_index(inner) {
                Some(idx) => NavigationTarget::Resolved(self.entity_types[idx].name.clone()),
                None => NavigationTarget::Unresolved(declared.clone()),
            };
            return NavigationProperty {
                name: raw.name.clone(),
                target,
                multiplicity: if many { Multiplicity::Many } else { Multiplicity::One },
                partner: raw.partner.clone(),
            };
        }

        let relationship = raw.relationship.as_deref().unwrap_or_default();
        let to_role = raw.to_role.as_deref().unwrap_or_default();
        let association = self
            .associations
            .iter()
            .find(|a| a.name == self.unqualify(relationship));

        let Some(end) = association.and_then(|a| a.end(to_role)) else {
            tracing::debug!("Navigation {}/{} has no association end '{}'", owner, raw.name, to_role);
            return NavigationProperty {
                name: raw.name.clone(),
                target: NavigationTarget::Unresolved(relationship.to_string()),
                multiplicity: Multiplicity::One,
                partner: None,
            };
        };

        let Some(target_idx) = self.type_index(&end.entity_type) else {
            return NavigationProperty {
                name: raw.name.clone(),
                target: NavigationTarget::Unresolved(end.entity_type.clone()),
                multiplicity: end.multiplicity,
                partner: None,
            };
        };

        // Partner: the navigation on the target that walks the same association back
        let partner = all[target_idx]
            .iter()
            .find(|other| {
                other.relationship.as_deref() == Some(relationship)
                    && other.from_role.as_deref() == Some(to_role)
                    && !(self.entity_types[target_idx].name == owner && other.name == raw.name)
            })
            .map(|other| other.name.clone());

        NavigationProperty {
            name: raw.name.clone(),
            target: NavigationTarget::Resolved(self.entity_types[target_idx].name.clone()),
            multiplicity: end.multiplicity,
            partner,
        }
    }

    fn resolve_attribute_refs(&mut self) {
        let raw_refs = std::mem::take(&mut self.raw_refs);
        for raw in raw_refs {
            let resolved = resolve_path(&self.entity_types, raw.entity_type, &raw.path);
            let vocabulary = &mut self.entity_types[raw.entity_type].properties[raw.property].vocabulary;
            match raw.slot {
                RefSlot::Text => vocabulary.text = Some(resolved),
                RefSlot::Unit => vocabulary.unit = Some(resolved),
            }
        }
    }

    fn resolve_target(&self, raw: &str) -> Option<Target> {
        let segments: Vec<&str> = raw.split('/').collect();
        let first = self.unqualify(segments[0]);
        let set_index = |name: &str| self.entity_sets.iter().position(|s| s.name == name);
        let property_of_set = |set_idx: usize, prop: &str| {
            let type_idx = self.type_index(&self.entity_sets[set_idx].entity_type)?;
            let prop_idx = self.entity_types[type_idx]
                .properties
                .iter()
                .position(|p| p.name == prop)?;
            Some(Target::Property(type_idx, prop_idx))
        };

        match segments.as_slice() {
            [_] => {
                if self.type_index(first).is_some() {
                    Some(Target::EntityType)
                } else {
                    set_index(first).map(Target::EntitySet)
                }
            }
            [_, second] => {
                if let Some(type_idx) = self.type_index(first) {
                    let prop_idx = self.entity_types[type_idx]
                        .properties
                        .iter()
                        .position(|p| p.name == *second)?;
                    Some(Target::Property(type_idx, prop_idx))
                } else if self.containers.iter().any(|c| c == first) {
                    set_index(*second).map(Target::EntitySet)
                } else {
                    property_of_set(set_index(first)?, *second)
                }
            }
            [_, set, prop] if self.containers.iter().any(|c| c == first) => {
                property_of_set(set_index(*set)?, *prop)
            }
            _ => None,
        }
    }

    fn apply_annotations(&mut self) {
        let annotations = std::mem::take(&mut self.annotations);
        for ann in &annotations {
            match self.resolve_target(&ann.target) {
                Some(Target::Property(t, p)) => self.apply_property_term(t, p, ann),
                Some(Target::EntitySet(s)) => self.apply_set_term(s, ann),
                Some(Target::EntityType) => {
                    tracing::trace!("Skipping entity type annotation {} on {}", ann.term, ann.target);
                }
                None => {
                    tracing::debug!("Annotation target '{}' not found, skipping {}", ann.target, ann.term);
                }
            }
        }
    }

    fn apply_property_term(&mut self, type_idx: usize, prop_idx: usize, ann: &PendingAnnotation) {
        // A tag term without an explicit value means true
        let flag = ann.value.as_ref().map_or(Some(true), AnnotationValue::as_bool);
        let resolved_path = ann
            .value
            .as_ref()
            .and_then(AnnotationValue::as_path)
            .map(|path| resolve_path(&self.entity_types, type_idx, path));
        let value_list = match ann.term.as_str() {
            "Common.ValueList" => ann
                .value
                .as_ref()
                .and_then(AnnotationValue::as_record)
                .map(|record| value_list(&self.entity_types, type_idx, record, ann.qualifier.clone())),
            _ => None,
        };

        let voc = &mut self.entity_types[type_idx].properties[prop_idx].vocabulary;
        let text = || ann.value.as_ref().and_then(AnnotationValue::as_str).map(str::to_string);

        match ann.term.as_str() {
            "Common.Label" => {
                if let Some(label) = text() {
                    voc.label = Some(label);
                }
            }
            "Common.QuickInfo" => {
                if let Some(quickinfo) = text() {
                    voc.quickinfo = Some(quickinfo);
                }
            }
            "Common.Text" => {
                if resolved_path.is_some() {
                    voc.text = resolved_path;
                }
            }
            "Measures.ISOCurrency" | "Measures.Unit" => {
                if resolved_path.is_some() {
                    voc.unit = resolved_path;
                }
            }
            "Common.IsCurrency" if flag == Some(true) => voc.semantics = Semantics::CurrencyCode,
            "Common.IsUnit" if flag == Some(true) => voc.semantics = Semantics::UnitOfMeasure,
            "Communication.IsEmailAddress" if flag == Some(true) => voc.semantics = Semantics::Email,
            "Communication.IsPhoneNumber" if flag == Some(true) => voc.semantics = Semantics::Tel,
            "Common.IsUpperCase" if flag == Some(true) => voc.display_format = DisplayFormat::UpperCase,
            "Common.IsCalendarDate" if flag == Some(true) => voc.display_format = DisplayFormat::Date,
            "Common.ValueList" => {
                if let Some(definition) = value_list {
                    // Unqualified definitions win; a qualified one only fills an empty slot
                    if definition.qualifier.is_none() || voc.value_help.is_none() {
                        voc.value_help = Some(definition);
                    }
                }
            }
            _ => {}
        }
    }

    fn apply_set_term(&mut self, set_idx: usize, ann: &PendingAnnotation) {
        let Some(record) = ann.value.as_ref().and_then(AnnotationValue::as_record) else {
            return;
        };
        let flag = |name: &str| record.get(name).and_then(AnnotationValue::as_bool);

        match ann.term.as_str() {
            "Capabilities.InsertRestrictions" => {
                if let Some(v) = flag("Insertable") {
                    self.entity_sets[set_idx].creatable = v;
                }
            }
            "Capabilities.UpdateRestrictions" => {
                if let Some(v) = flag("Updatable") {
                    self.entity_sets[set_idx].updatable = v;
                }
            }
            "Capabilities.DeleteRestrictions" => {
                if let Some(v) = flag("Deletable") {
                    self.entity_sets[set_idx].deletable = v;
                }
            }
            "Capabilities.SearchRestrictions" => {
                if let Some(v) = flag("Searchable") {
                    self.entity_sets[set_idx].searchable = v;
                }
            }
            "Capabilities.FilterRestrictions" => {
                self.restrict_properties(set_idx, record, "NonFilterableProperties", |v| {
                    v.filterable = false
                });
            }
            "Capabilities.SortRestrictions" => {
                self.restrict_properties(set_idx, record, "NonSortableProperties", |v| {
                    v.sortable = false
                });
            }
            _ => {}
        }
    }

    fn restrict_properties(
        &mut self,
        set_idx: usize,
        record: &Record,
        list: &str,
        apply: impl Fn(&mut Vocabulary),
    ) {
        let Some(type_idx) = self.type_index(&self.entity_sets[set_idx].entity_type) else {
            return;
        };
        let paths = record
            .get(list)
            .and_then(AnnotationValue::as_collection)
            .unwrap_or_default();
        for path in paths.iter().filter_map(AnnotationValue::as_str) {
            match self.entity_types[type_idx].property_mut(path) {
                Some(prop) => apply(&mut prop.vocabulary),
                None => tracing::debug!("{} lists unknown property '{}'", list, path),
            }
        }
    }
}

fn detect_version(root: Node) -> ODataVersion {
    let declared = root.attribute("Version").unwrap_or_default();
    if declared.starts_with('4') || root.tag_name().namespace() == Some(EDMX_V4_NS) {
        ODataVersion::V4
    } else {
        ODataVersion::V2
    }
}

/// Resolve a property path relative to an entity type, following navigation
/// segments (`to_Customer/Name`) when their targets are known.
fn resolve_path(types: &[EntityType], type_idx: usize, path: &str) -> PropertyRef {
    let mut current = &types[type_idx];
    let mut segments = path.split('/').peekable();
    while let Some(segment) = segments.next() {
        if segments.peek().is_none() {
            return if current.property(segment).is_some() {
                PropertyRef::Resolved(path.to_string())
            } else {
                PropertyRef::Unresolved(path.to_string())
            };
        }
        let next = current.navigation(segment).and_then(|nav| match &nav.target {
            NavigationTarget::Resolved(name) => types.iter().find(|t| &t.name == name),
            NavigationTarget::Unresolved(_) => None,
        });
        match next {
            Some(target) => current = target,
            None => break,
        }
    }
    PropertyRef::Unresolved(path.to_string())
}

fn value_list(
    types: &[EntityType],
    type_idx: usize,
    record: &Record,
    qualifier: Option<String>,
) -> ValueListDefinition {
    let text = |name: &str| {
        record
            .get(name)
            .and_then(AnnotationValue::as_str)
            .map(str::to_string)
    };

    let parameters = record
        .get("Parameters")
        .and_then(AnnotationValue::as_collection)
        .unwrap_or_default()
        .iter()
        .filter_map(AnnotationValue::as_record)
        .filter_map(|param| {
            let record_type = param.record_type.as_deref().unwrap_or_default();
            let Some(kind) = ParameterKind::from_record_type(record_type) else {
                tracing::debug!("Skipping value list parameter of type '{}'", record_type);
                return None;
            };
            // PropertyPath attribute, Path attribute and <PropertyPath> child all land here
            let local_property = param
                .get("LocalDataProperty")
                .and_then(AnnotationValue::as_str)
                .filter(|p| !p.is_empty())
                .map(|p| resolve_path(types, type_idx, p));
            Some(ValueListParameter {
                kind,
                local_property,
                value_list_property: param
                    .get("ValueListProperty")
                    .and_then(AnnotationValue::as_str)
                    .unwrap_or_default()
                    .to_string(),
                constant: param
                    .get("Constant")
                    .and_then(AnnotationValue::as_str)
                    .map(str::to_string),
            })
        })
        .collect();

    ValueListDefinition {
        collection_path: text("CollectionPath").unwrap_or_default(),
        label: text("Label"),
        qualifier,
        search_supported: record.get("SearchSupported").and_then(AnnotationValue::as_bool),
        parameters,
    }
}
