//! SAP OData client library
//!
//! Parses OData V2/V4 `$metadata` (including SAP `sap:*` attributes and V4
//! vocabulary annotations) into a typed model, builds `$filter` expressions
//! and queries, and executes them with transparent pagination.

pub mod auth;
pub mod config;
pub mod metadata;
pub mod odata;
pub mod query;

pub use auth::{AuthError, ClientCredentialsAuth, CredentialProvider, StaticToken};
pub use config::{Config, RuntimeConfig};
pub use metadata::{parse_metadata, MetadataParseError, ODataVersion, ServiceMetadata};
pub use odata::{AllPages, ODataClient, ODataError, Page, ServiceInfo, Transport};
pub use query::{FilterExpr, Literal, ODataRequest, Query, QueryBuildError, F};
