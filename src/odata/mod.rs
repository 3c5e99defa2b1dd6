//! OData module
//!
//! HTTP client, transport seam, response decoding and the Gateway service
//! catalog for SAP OData services

pub mod catalog;
pub mod client;
pub mod response;
pub mod transport;

pub use catalog::{ServiceInfo, DEFAULT_CATALOG_PATH};
pub use client::{ODataClient, ODataError, DEFAULT_MAX_PAGES};
pub use response::{AllPages, Page};
pub use transport::{HttpRequest, HttpResponse, ReqwestTransport, Transport, TransportError};
