//! Fluent query builder
//!
//! A [`Query`] is a plain value: every fluent call consumes it and returns the
//! updated query, and nothing here performs I/O. Executing a query borrows it,
//! so the same value can be executed again and each execution derives a fresh
//! request from the current state. A `Query` has no interior mutability; share
//! it across tasks by cloning rather than mutating one instance concurrently.
//!
//! ```
//! use sap_odata::{ODataVersion, Query, F};
//!
//! let request = Query::new("Travel")
//!     .select(["TravelID", "TotalPrice"])
//!     .filter(F::eq("Status", "O") & F::gt("TotalPrice", 1000))
//!     .top(10)
//!     .build(ODataVersion::V4)
//!     .unwrap();
//!
//! assert_eq!(request.path, "Travel");
//! assert_eq!(request.param("$top"), Some("10"));
//! ```

use super::filter::FilterExpr;
use super::literal::Literal;
use crate::metadata::{ODataVersion, ServiceMetadata};
use thiserror::Error;

/// Invalid builder state, detected before any request is sent
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum QueryBuildError {
    #[error("Key predicate has no fields")]
    EmptyKey,

    #[error("Navigation to '{0}' requires a key predicate")]
    NavigationWithoutKey(String),

    #[error("Bound action '{action}' cannot be combined with {clause}")]
    ActionConflict { action: String, clause: &'static str },

    #[error("Query does not address a bound action")]
    NotAnAction,

    #[error("Query addresses bound action '{0}'; invoke it with execute_action")]
    ActionNotReadable(String),

    #[error("Unknown entity set: {0}")]
    UnknownEntitySet(String),

    #[error("Key for '{entity_set}' must be exactly {expected:?}, got {provided:?}")]
    KeyMismatch {
        entity_set: String,
        expected: Vec<String>,
        provided: Vec<String>,
    },

    #[error("Entity type '{entity_type}' has no navigation property '{navigation}'")]
    UnknownNavigation {
        entity_type: String,
        navigation: String,
    },
}

#[derive(Debug, Clone, PartialEq)]
enum KeyPredicate {
    Single(Literal),
    Named(Vec<(String, Literal)>),
}

/// Request descriptor: resource path relative to the service root plus ordered,
/// unescaped query options.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ODataRequest {
    pub path: String,
    pub params: Vec<(String, String)>,
}

impl ODataRequest {
    pub fn param(&self, name: &str) -> Option<&str> {
        self.params
            .iter()
            .find(|(k, _)| k == name)
            .map(|(_, v)| v.as_str())
    }

    /// Query options joined with `&`, values percent-encoded
    pub fn query_string(&self) -> String {
        self.params
            .iter()
            .map(|(k, v)| format!("{}={}", k, urlencoding::encode(v)))
            .collect::<Vec<_>>()
            .join("&")
    }
}

#[derive(Clone, Copy, PartialEq, Eq)]
enum Purpose {
    Read,
    Count,
    Action,
}

#[derive(Debug, Clone, PartialEq, Default)]
#[must_use]
pub struct Query {
    entity_set: String,
    select: Vec<String>,
    filter: Option<FilterExpr>,
    orderby: Option<String>,
    expand: Vec<String>,
    top: Option<u64>,
    skip: Option<u64>,
    count: bool,
    key: Option<KeyPredicate>,
    nav: Vec<String>,
    action: Option<String>,
    custom: Vec<(String, String)>,
    max_pages: Option<usize>,
}

impl Query {
    pub fn new(entity_set: impl Into<String>) -> Self {
        Self {
            entity_set: entity_set.into(),
            ..Default::default()
        }
    }

    pub fn entity_set(&self) -> &str {
        &self.entity_set
    }

    /// Page cap set with [`Query::max_pages`], if any
    pub fn page_cap(&self) -> Option<usize> {
        self.max_pages
    }

    /// Add fields to `$select`, verbatim and unvalidated
    pub fn select<I, S>(mut self, fields: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.select.extend(fields.into_iter().map(Into::into));
        self
    }

    /// Set the filter, replacing any previous one. Combine expressions with
    /// `&`/`|` before calling this to get both.
    pub fn filter(mut self, expr: FilterExpr) -> Self {
        self.filter = Some(expr);
        self
    }

    /// Raw `$orderby` clause, passed through unparsed
    pub fn orderby(mut self, clause: impl Into<String>) -> Self {
        self.orderby = Some(clause.into());
        self
    }

    pub fn expand<I, S>(mut self, nav_props: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.expand.extend(nav_props.into_iter().map(Into::into));
        self
    }

    pub fn top(mut self, n: u64) -> Self {
        self.top = Some(n);
        self
    }

    pub fn skip(mut self, n: u64) -> Self {
        self.skip = Some(n);
        self
    }

    /// Ask for the total count inline (`$inlinecount` on V2, `$count` on V4)
    pub fn with_count(mut self) -> Self {
        self.count = true;
        self
    }

    /// Address one entity by named key fields, rendered in the order given
    pub fn key<I, K, V>(mut self, fields: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<Literal>,
    {
        let pairs = fields
            .into_iter()
            .map(|(k, v)| (k.into(), v.into()))
            .collect();
        self.key = Some(KeyPredicate::Named(pairs));
        self
    }

    /// Address one entity by a single unnamed key value
    pub fn key_value(mut self, value: impl Into<Literal>) -> Self {
        self.key = Some(KeyPredicate::Single(value.into()));
        self
    }

    /// Append a navigation segment after the key predicate
    pub fn nav(mut self, name: impl Into<String>) -> Self {
        self.nav.push(name.into());
        self
    }

    /// Target a bound action on the addressed entity or collection
    pub fn action(mut self, name: impl Into<String>) -> Self {
        self.action = Some(name.into());
        self
    }

    /// Extra query option, e.g. `sap-language=EN`
    pub fn custom(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.custom.push((name.into(), value.into()));
        self
    }

    /// Page cap for `execute_all`, overriding the client default
    pub fn max_pages(mut self, pages: usize) -> Self {
        self.max_pages = Some(pages);
        self
    }

    pub fn is_action(&self) -> bool {
        self.action.is_some()
    }

    /// Build the read request (GET on the collection, entity or navigation)
    pub fn build(&self, version: ODataVersion) -> Result<ODataRequest, QueryBuildError> {
        if let Some(action) = &self.action {
            return Err(QueryBuildError::ActionNotReadable(action.clone()));
        }
        self.build_for(version, Purpose::Read)
    }

    /// Build the `/$count` request; only the filter and custom options apply
    pub fn build_count(&self, version: ODataVersion) -> Result<ODataRequest, QueryBuildError> {
        if let Some(action) = &self.action {
            return Err(QueryBuildError::ActionNotReadable(action.clone()));
        }
        self.build_for(version, Purpose::Count)
    }

    /// Build the bound action request (POST)
    pub fn build_action(&self, version: ODataVersion) -> Result<ODataRequest, QueryBuildError> {
        let Some(action) = &self.action else {
            return Err(QueryBuildError::NotAnAction);
        };
        let conflict = [
            (!self.nav.is_empty(), "navigation"),
            (self.filter.is_some(), "$filter"),
            (self.orderby.is_some(), "$orderby"),
            (self.top.is_some(), "$top"),
            (self.skip.is_some(), "$skip"),
            (!self.expand.is_empty(), "$expand"),
        ]
        .into_iter()
        .find_map(|(set, clause)| set.then_some(clause));
        if let Some(clause) = conflict {
            return Err(QueryBuildError::ActionConflict {
                action: action.clone(),
                clause,
            });
        }
        self.build_for(version, Purpose::Action)
    }

    fn build_for(
        &self,
        version: ODataVersion,
        purpose: Purpose,
    ) -> Result<ODataRequest, QueryBuildError> {
        let mut path = self.entity_set.clone();

        match &self.key {
            Some(KeyPredicate::Single(value)) => {
                path.push('(');
                path.push_str(&value.render(version));
                path.push(')');
            }
            Some(KeyPredicate::Named(pairs)) if pairs.is_empty() => {
                return Err(QueryBuildError::EmptyKey);
            }
            Some(KeyPredicate::Named(pairs)) if pairs.len() == 1 => {
                path.push('(');
                path.push_str(&pairs[0].1.render(version));
                path.push(')');
            }
            Some(KeyPredicate::Named(pairs)) => {
                let parts: Vec<String> = pairs
                    .iter()
                    .map(|(k, v)| format!("{}={}", k, v.render(version)))
                    .collect();
                path.push('(');
                path.push_str(&parts.join(","));
                path.push(')');
            }
            None => {
                if let Some(first) = self.nav.first() {
                    return Err(QueryBuildError::NavigationWithoutKey(first.clone()));
                }
            }
        }

        for segment in &self.nav {
            path.push('/');
            path.push_str(segment);
        }

        let mut params = Vec::new();
        match purpose {
            Purpose::Read => {
                if !self.select.is_empty() {
                    params.push(("$select".to_string(), self.select.join(",")));
                }
                if let Some(filter) = &self.filter {
                    params.push(("$filter".to_string(), filter.serialize(version)));
                }
                if !self.expand.is_empty() {
                    params.push(("$expand".to_string(), self.expand.join(",")));
                }
                if let Some(orderby) = &self.orderby {
                    params.push(("$orderby".to_string(), orderby.clone()));
                }
                if let Some(top) = self.top {
                    params.push(("$top".to_string(), top.to_string()));
                }
                if let Some(skip) = self.skip {
                    params.push(("$skip".to_string(), skip.to_string()));
                }
                if self.count {
                    params.push(match version {
                        ODataVersion::V2 => ("$inlinecount".to_string(), "allpages".to_string()),
                        ODataVersion::V4 => ("$count".to_string(), "true".to_string()),
                    });
                }
                if version == ODataVersion::V2 {
                    params.push(("$format".to_string(), "json".to_string()));
                }
            }
            Purpose::Count => {
                path.push_str("/$count");
                if let Some(filter) = &self.filter {
                    params.push(("$filter".to_string(), filter.serialize(version)));
                }
            }
            Purpose::Action => {
                if let Some(action) = &self.action {
                    path.push('/');
                    path.push_str(action);
                }
            }
        }
        params.extend(self.custom.iter().cloned());

        Ok(ODataRequest { path, params })
    }

    /// Check the key predicate and navigation against parsed metadata.
    ///
    /// The builder itself never needs metadata; this is an optional guard for
    /// callers that have it.
    pub fn check_against(&self, metadata: &ServiceMetadata) -> Result<(), QueryBuildError> {
        let entity_type = metadata
            .entity_type_of_set(&self.entity_set)
            .ok_or_else(|| QueryBuildError::UnknownEntitySet(self.entity_set.clone()))?;

        if let Some(KeyPredicate::Named(pairs)) = &self.key {
            let mut provided: Vec<String> = pairs.iter().map(|(k, _)| k.clone()).collect();
            let mut expected = entity_type.keys.clone();
            provided.sort();
            expected.sort();
            if provided != expected {
                return Err(QueryBuildError::KeyMismatch {
                    entity_set: self.entity_set.clone(),
                    expected: entity_type.keys.clone(),
                    provided: pairs.iter().map(|(k, _)| k.clone()).collect(),
                });
            }
        }

        let mut current = entity_type;
        for segment in &self.nav {
            current = metadata
                .resolve_navigation(&current.name, segment)
                .ok_or_else(|| QueryBuildError::UnknownNavigation {
                    entity_type: current.name.clone(),
                    navigation: segment.clone(),
                })?;
        }
        Ok(())
    }
}
