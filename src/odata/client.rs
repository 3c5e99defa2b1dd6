//! OData Client module
//!
//! Executes [`Query`] values against an SAP OData V2 or V4 service through an
//! injected [`Transport`] and [`CredentialProvider`].

use super::catalog::ServiceInfo;
use super::response::{decode_page, parse_count, service_error, AllPages, Page};
use super::transport::{HttpRequest, HttpResponse, Transport, TransportError};
use crate::auth::{AuthError, CredentialProvider};
use crate::metadata::{parse_metadata, MetadataParseError, ODataVersion, ServiceMetadata};
use crate::query::{ODataRequest, Query, QueryBuildError};
use reqwest::{Method, Url};
use serde::de::DeserializeOwned;
use serde_json::Value;
use std::sync::Arc;
use thiserror::Error;
use tokio::sync::RwLock;

/// Page cap used by [`Query::execute_all`] when neither the query nor the
/// client sets one
pub const DEFAULT_MAX_PAGES: usize = 100;

/// OData client errors
#[derive(Error, Debug)]
pub enum ODataError {
    #[error("Authentication error: {0}")]
    Auth(#[from] AuthError),

    #[error("Transport error: {0}")]
    Transport(#[from] TransportError),

    #[error("Service error ({status}): {message}")]
    Service {
        status: u16,
        code: Option<String>,
        message: String,
        body: String,
    },

    #[error("Invalid query: {0}")]
    QueryBuild(#[from] QueryBuildError),

    #[error("Metadata error: {0}")]
    Metadata(#[from] MetadataParseError),

    #[error("Invalid URL: {0}")]
    InvalidUrl(String),

    #[error("Parse error: {0}")]
    ParseError(String),
}

impl ODataError {
    /// HTTP status for service errors
    pub fn status(&self) -> Option<u16> {
        match self {
            ODataError::Service { status, .. } => Some(*status),
            _ => None,
        }
    }
}

/// OData client bound to one service root
pub struct ODataClient {
    transport: Arc<dyn Transport>,
    credentials: Arc<dyn CredentialProvider>,
    service_root: Url,
    version: ODataVersion,
    max_pages: usize,
    csrf_token: RwLock<Option<String>>,
}

impl ODataClient {
    /// Create a client for `service_root`, e.g.
    /// `https://host/sap/opu/odata/sap/API_TRAVEL_SRV`. Defaults to V2.
    pub fn new(
        transport: Arc<dyn Transport>,
        credentials: Arc<dyn CredentialProvider>,
        service_root: &str,
    ) -> Result<Self, ODataError> {
        let root = format!("{}/", service_root.trim_end_matches('/'));
        let service_root =
            Url::parse(&root).map_err(|e| ODataError::InvalidUrl(format!("{}: {}", root, e)))?;

        Ok(Self {
            transport,
            credentials,
            service_root,
            version: ODataVersion::default(),
            max_pages: DEFAULT_MAX_PAGES,
            csrf_token: RwLock::new(None),
        })
    }

    pub fn with_version(mut self, version: ODataVersion) -> Self {
        self.version = version;
        self
    }

    pub fn with_max_pages(mut self, max_pages: usize) -> Self {
        self.max_pages = max_pages;
        self
    }

    pub fn version(&self) -> ODataVersion {
        self.version
    }

    pub fn service_root(&self) -> &Url {
        &self.service_root
    }

    pub fn max_pages(&self) -> usize {
        self.max_pages
    }

    /// Absolute URL for a request descriptor
    pub fn url_for(&self, request: &ODataRequest) -> Result<Url, ODataError> {
        // "./" keeps a key predicate containing ':' from parsing as a scheme
        let mut url = self
            .service_root
            .join(&format!("./{}", request.path))
            .map_err(|e| ODataError::InvalidUrl(format!("{}: {}", request.path, e)))?;
        let query = request.query_string();
        if !query.is_empty() {
            url.set_query(Some(&query));
        }
        Ok(url)
    }

    /// Continuation links may be absolute or relative to the service root
    fn link_url(&self, link: &str) -> Result<Url, ODataError> {
        Url::parse(link)
            .or_else(|_| self.service_root.join(link))
            .map_err(|e| ODataError::InvalidUrl(format!("{}: {}", link, e)))
    }

    /// Send with a fresh bearer token, without interpreting the status
    async fn send_raw(&self, request: HttpRequest) -> Result<HttpResponse, ODataError> {
        let token = self.credentials.bearer_token().await?;
        let request = request.header("Authorization", format!("Bearer {}", token));
        tracing::debug!("{} {}", request.method, request.url);
        Ok(self.transport.send(request).await?)
    }

    async fn send(&self, request: HttpRequest) -> Result<HttpResponse, ODataError> {
        let response = self.send_raw(request).await?;
        if !response.is_success() {
            let err = service_error(response.status, &response.body);
            tracing::warn!("Request failed: {}", err);
            return Err(err);
        }
        Ok(response)
    }

    async fn fetch_page<T: DeserializeOwned>(&self, url: &Url) -> Result<Page<T>, ODataError> {
        let request = HttpRequest::get(url.as_str()).header("Accept", "application/json");
        let response = self.send(request).await?;
        decode_page(&response.body)
    }

    /// Fetch and parse `$metadata`
    pub async fn fetch_metadata(&self) -> Result<ServiceMetadata, ODataError> {
        let url = self
            .service_root
            .join("$metadata")
            .map_err(|e| ODataError::InvalidUrl(e.to_string()))?;
        let request = HttpRequest::get(url.as_str()).header("Accept", "application/xml");
        let response = self.send(request).await?;
        let metadata = parse_metadata(&response.body)?;

        if metadata.version != self.version {
            tracing::warn!(
                "Service metadata is OData {} but client is configured for {}",
                metadata.version,
                self.version
            );
        }
        tracing::info!(
            "Parsed metadata: {} entity types, {} entity sets, {} operations",
            metadata.entity_types.len(),
            metadata.entity_sets.len(),
            metadata.operations.len()
        );
        Ok(metadata)
    }

    /// Switch to the protocol version the service declares in its metadata
    pub fn aligned_with(self, metadata: &ServiceMetadata) -> Self {
        if metadata.version != self.version {
            tracing::info!("Switching client from OData {} to {}", self.version, metadata.version);
        }
        self.with_version(metadata.version)
    }

    /// List the services published by the Gateway catalog at `catalog_path`,
    /// e.g. [`DEFAULT_CATALOG_PATH`](super::catalog::DEFAULT_CATALOG_PATH).
    /// An absolute path is resolved against the host, a relative one against
    /// the service root.
    pub async fn list_services(&self, catalog_path: &str) -> Result<Vec<ServiceInfo>, ODataError> {
        let path = format!("{}/ServiceCollection", catalog_path.trim_end_matches('/'));
        let mut url = self
            .service_root
            .join(&path)
            .map_err(|e| ODataError::InvalidUrl(format!("{}: {}", path, e)))?;
        url.set_query(Some("$format=json"));

        let page: Page<ServiceInfo> = self.fetch_page(&url).await?;
        tracing::info!("Catalog lists {} services", page.rows.len());
        Ok(page.rows)
    }

    /// Execute a read query and return the first page
    pub async fn execute<T: DeserializeOwned>(&self, query: &Query) -> Result<Page<T>, ODataError> {
        let request = query.build(self.version)?;
        let url = self.url_for(&request)?;
        let page: Page<T> = self.fetch_page(&url).await?;
        tracing::debug!("Fetched {} records", page.rows.len());
        Ok(page)
    }

    /// Execute a read query and follow continuation links, fetching at most
    /// `max_pages` pages. `max_pages == 0` sends nothing.
    pub async fn execute_all<T: DeserializeOwned>(
        &self,
        query: &Query,
        max_pages: usize,
    ) -> Result<AllPages<T>, ODataError> {
        let request = query.build(self.version)?;
        let mut all = AllPages {
            rows: Vec::new(),
            pages: 0,
            stopped_at_cap: false,
        };
        if max_pages == 0 {
            return Ok(all);
        }

        let mut url = self.url_for(&request)?;
        loop {
            let page: Page<T> = self.fetch_page(&url).await?;
            all.pages += 1;
            tracing::debug!("Page {}: fetched {} records", all.pages, page.rows.len());
            all.rows.extend(page.rows);

            match page.next_link {
                None => break,
                Some(_) if all.pages >= max_pages => {
                    tracing::warn!(
                        "Stopped after {} pages with more results available",
                        all.pages
                    );
                    all.stopped_at_cap = true;
                    break;
                }
                Some(link) => url = self.link_url(&link)?,
            }
        }

        tracing::info!("Total records fetched: {}", all.rows.len());
        Ok(all)
    }

    /// Count matching entities via `/$count`
    pub async fn get_count(&self, query: &Query) -> Result<u64, ODataError> {
        let request = query.build_count(self.version)?;
        let url = self.url_for(&request)?;
        let request = HttpRequest::get(url.as_str()).header("Accept", "text/plain");
        let response = self.send(request).await?;
        parse_count(&response.body)
    }

    /// Invoke the bound action addressed by `query`
    pub async fn execute_action<T: DeserializeOwned>(
        &self,
        query: &Query,
        params: Option<&Value>,
    ) -> Result<Vec<T>, ODataError> {
        let request = query.build_action(self.version)?;
        let url = self.url_for(&request)?;
        self.post_json(&url, params).await
    }

    /// Invoke an unbound action (or V2 function import) at the service root
    pub async fn call_action<T: DeserializeOwned>(
        &self,
        name: &str,
        params: Option<&Value>,
    ) -> Result<Vec<T>, ODataError> {
        let request = ODataRequest {
            path: name.to_string(),
            params: Vec::new(),
        };
        let url = self.url_for(&request)?;
        self.post_json(&url, params).await
    }

    async fn post_json<T: DeserializeOwned>(
        &self,
        url: &Url,
        params: Option<&Value>,
    ) -> Result<Vec<T>, ODataError> {
        let empty = Value::Object(Default::default());
        let body = serde_json::to_vec(params.unwrap_or(&empty))
            .map_err(|e| ODataError::ParseError(format!("Failed to encode parameters: {}", e)))?;

        let mut request = HttpRequest::post(url.as_str(), body)
            .header("Content-Type", "application/json")
            .header("Accept", "application/json");
        if let Some(token) = self.csrf_token().await? {
            request = request.header("x-csrf-token", token);
        }

        let response = match self.send(request).await {
            Err(err @ ODataError::Service { status: 403, .. }) => {
                tracing::warn!("POST rejected with 403, discarding CSRF token");
                *self.csrf_token.write().await = None;
                return Err(err);
            }
            other => other?,
        };

        if response.status == 204 || response.body.iter().all(u8::is_ascii_whitespace) {
            return Ok(Vec::new());
        }
        Ok(decode_page(&response.body)?.rows)
    }

    /// Cached CSRF token, fetched from the service root on first use.
    /// Services that issue none get no header.
    async fn csrf_token(&self) -> Result<Option<String>, ODataError> {
        if let Some(token) = self.csrf_token.read().await.clone() {
            return Ok(Some(token));
        }

        let request = HttpRequest::new(Method::HEAD, self.service_root.as_str())
            .header("x-csrf-token", "Fetch");
        let response = self.send_raw(request).await?;
        let token = response
            .header("x-csrf-token")
            .filter(|t| !t.is_empty() && !t.eq_ignore_ascii_case("required"))
            .map(str::to_string);

        match &token {
            Some(_) => {
                tracing::debug!("Fetched CSRF token");
                *self.csrf_token.write().await = token.clone();
            }
            None => tracing::debug!("Service issued no CSRF token"),
        }
        Ok(token)
    }
}

impl Query {
    /// Execute on `client` and return the first page
    pub async fn execute<T: DeserializeOwned>(
        &self,
        client: &ODataClient,
    ) -> Result<Page<T>, ODataError> {
        client.execute(self).await
    }

    /// Follow pagination up to this query's page cap, or the client's
    pub async fn execute_all<T: DeserializeOwned>(
        &self,
        client: &ODataClient,
    ) -> Result<AllPages<T>, ODataError> {
        let max_pages = self.page_cap().unwrap_or(client.max_pages());
        client.execute_all(self, max_pages).await
    }

    pub async fn execute_action<T: DeserializeOwned>(
        &self,
        client: &ODataClient,
        params: Option<&Value>,
    ) -> Result<Vec<T>, ODataError> {
        client.execute_action(self, params).await
    }

    pub async fn get_count(&self, client: &ODataClient) -> Result<u64, ODataError> {
        client.get_count(self).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::StaticToken;
    use crate::odata::transport::mock::ScriptedTransport;
    use crate::query::F;
    use serde_json::json;

    const ROOT: &str = "https://host/sap/opu/odata/sap/API_TRAVEL_SRV";

    fn client(transport: &Arc<ScriptedTransport>) -> ODataClient {
        ODataClient::new(transport.clone(), Arc::new(StaticToken::new("t0k3n")), ROOT).unwrap()
    }

    fn v4_page(ids: &[u32], next: Option<&str>) -> String {
        let rows: Vec<Value> = ids.iter().map(|id| json!({ "TravelID": id })).collect();
        let mut page = json!({ "value": rows });
        if let Some(next) = next {
            page["@odata.nextLink"] = json!(next);
        }
        page.to_string()
    }

    fn csrf_response(token: &str) -> HttpResponse {
        HttpResponse {
            status: 200,
            headers: vec![("x-csrf-token".to_string(), token.to_string())],
            body: Vec::new(),
        }
    }

    #[tokio::test]
    async fn test_execute_builds_url_and_sends_token() {
        let transport = Arc::new(
            ScriptedTransport::new().respond(200, r#"{"d":{"results":[{"TravelID":"1"}]}}"#),
        );
        let client = client(&transport);

        let query = Query::new("Travel").filter(F::eq("Status", "O")).top(5);
        let page: Page<Value> = query.execute(&client).await.unwrap();
        assert_eq!(page.rows.len(), 1);

        let requests = transport.requests();
        assert_eq!(requests.len(), 1);
        assert_eq!(
            requests[0].url,
            format!("{}/Travel?$filter=Status%20eq%20%27O%27&$top=5&$format=json", ROOT)
        );
        assert_eq!(requests[0].header_value("authorization"), Some("Bearer t0k3n"));
    }

    #[tokio::test]
    async fn test_execute_all_single_request_without_continuation() {
        let transport = Arc::new(ScriptedTransport::new().respond(200, &v4_page(&[1, 2], None)));
        let client = client(&transport).with_version(ODataVersion::V4);

        let all: AllPages<Value> = client.execute_all(&Query::new("Travel"), 10).await.unwrap();
        assert_eq!(all.rows.len(), 2);
        assert_eq!(all.pages, 1);
        assert!(!all.stopped_at_cap);
        assert_eq!(transport.requests().len(), 1);
    }

    #[tokio::test]
    async fn test_execute_all_follows_links_in_order() {
        let transport = Arc::new(
            ScriptedTransport::new()
                .respond(200, &v4_page(&[1, 2], Some("Travel?$skiptoken=2")))
                .respond(200, &v4_page(&[3], Some(&format!("{}/Travel?$skiptoken=3", ROOT))))
                .respond(200, &v4_page(&[4], None)),
        );
        let client = client(&transport).with_version(ODataVersion::V4);

        let all: AllPages<Value> = client.execute_all(&Query::new("Travel"), 10).await.unwrap();
        let ids: Vec<u64> = all.rows.iter().filter_map(|r| r["TravelID"].as_u64()).collect();
        assert_eq!(ids, vec![1, 2, 3, 4]);
        assert_eq!(all.pages, 3);

        let requests = transport.requests();
        assert_eq!(requests[1].url, format!("{}/Travel?$skiptoken=2", ROOT));
        assert_eq!(requests[2].url, format!("{}/Travel?$skiptoken=3", ROOT));
    }

    #[tokio::test]
    async fn test_execute_all_respects_page_cap() {
        for cap in 1..=3usize {
            let mut transport = ScriptedTransport::new();
            for i in 0..5u32 {
                transport = transport.respond(200, &v4_page(&[i], Some("Travel?$skiptoken=x")));
            }
            let transport = Arc::new(transport);
            let client = client(&transport).with_version(ODataVersion::V4);

            let all: AllPages<Value> = Query::new("Travel")
                .max_pages(cap)
                .execute_all(&client)
                .await
                .unwrap();
            assert_eq!(transport.requests().len(), cap);
            assert_eq!(all.pages, cap);
            assert!(all.stopped_at_cap);
        }
    }

    #[tokio::test]
    async fn test_execute_all_zero_pages_sends_nothing() {
        let transport = Arc::new(ScriptedTransport::new());
        let client = client(&transport);

        let all: AllPages<Value> = client.execute_all(&Query::new("Travel"), 0).await.unwrap();
        assert!(all.rows.is_empty());
        assert_eq!(all.pages, 0);
        assert!(transport.requests().is_empty());
    }

    #[tokio::test]
    async fn test_build_errors_send_nothing() {
        let transport = Arc::new(ScriptedTransport::new());
        let client = client(&transport);

        let err = client
            .execute::<Value>(&Query::new("Travel").nav("to_Booking"))
            .await
            .unwrap_err();
        assert!(matches!(err, ODataError::QueryBuild(QueryBuildError::NavigationWithoutKey(_))));
        assert!(transport.requests().is_empty());
    }

    #[tokio::test]
    async fn test_service_error_is_surfaced() {
        let transport = Arc::new(ScriptedTransport::new().respond(
            404,
            r#"{"error":{"code":"/IWBEP/CM_MGW_RT/020","message":{"lang":"en","value":"Resource not found"}}}"#,
        ));
        let client = client(&transport);

        let err = client.execute::<Value>(&Query::new("Nope")).await.unwrap_err();
        assert_eq!(err.status(), Some(404));
        assert!(err.to_string().contains("Resource not found"));
    }

    #[tokio::test]
    async fn test_empty_next_link_stops_pagination() {
        let transport = Arc::new(
            ScriptedTransport::new()
                .respond(200, r#"{"d":{"results":[{"TravelID":"1"}],"__next":""}}"#)
                .respond(200, r#"{"d":{"results":[{"TravelID":"2"}]}}"#),
        );
        let client = client(&transport);

        let all: AllPages<Value> = client.execute_all(&Query::new("Travel"), 10).await.unwrap();
        assert_eq!(all.pages, 1);
        assert_eq!(all.rows.len(), 1);
        assert!(!all.stopped_at_cap);
        assert_eq!(transport.requests().len(), 1);
    }

    #[tokio::test]
    async fn test_action_returning_primitive() {
        let transport = Arc::new(
            ScriptedTransport::new()
                .respond_with(csrf_response("abc"))
                .respond(200, r#"{"@odata.context":"$metadata#Edm.Int32","value":5}"#),
        );
        let client = client(&transport).with_version(ODataVersion::V4);

        let rows: Vec<i64> = Query::new("Travel")
            .key([("TravelID", "1")])
            .action("SAP__self.countIt")
            .execute_action(&client, None)
            .await
            .unwrap();
        assert_eq!(rows, vec![5]);
    }

    #[tokio::test]
    async fn test_list_services_from_catalog() {
        let transport = Arc::new(ScriptedTransport::new().respond(
            200,
            r#"{"d":{"results":[
                {"TechnicalServiceName":"API_TRAVEL_SRV","TechnicalServiceVersion":1,"Title":"Travel",
                 "ServiceUrl":"https://host/sap/opu/odata/sap/API_TRAVEL_SRV"},
                {"TechnicalServiceName":"ZUI_AGENCY","TechnicalServiceVersion":2,"Title":"Agencies","ServiceUrl":""}
            ]}}"#,
        ));
        let client = client(&transport);

        let services = client
            .list_services(crate::odata::catalog::DEFAULT_CATALOG_PATH)
            .await
            .unwrap();
        assert_eq!(services.len(), 2);
        assert_eq!(services[0].technical_name, "API_TRAVEL_SRV");
        assert_eq!(services[1].version, "2");
        assert_eq!(services[1].service_path(), "/sap/opu/odata/sap/ZUI_AGENCY");
        assert_eq!(
            transport.requests()[0].url,
            "https://host/sap/opu/odata/IWFND/CATALOGSERVICE;v=2/ServiceCollection?$format=json"
        );
    }

    #[tokio::test]
    async fn test_get_count() {
        let transport = Arc::new(ScriptedTransport::new().respond(200, "17"));
        let client = client(&transport);

        let count = Query::new("Travel")
            .filter(F::eq("Status", "O"))
            .get_count(&client)
            .await
            .unwrap();
        assert_eq!(count, 17);
        assert_eq!(
            transport.requests()[0].url,
            format!("{}/Travel/$count?$filter=Status%20eq%20%27O%27", ROOT)
        );
    }

    #[tokio::test]
    async fn test_action_fetches_and_reuses_csrf_token() {
        let transport = Arc::new(
            ScriptedTransport::new()
                .respond_with(csrf_response("abc"))
                .respond(200, r#"{"TravelID":"1","Status":"A"}"#)
                .respond(204, ""),
        );
        let client = client(&transport).with_version(ODataVersion::V4);
        let query = Query::new("Travel")
            .key([("TravelID", "1")])
            .action("SAP__self.acceptTravel");

        let rows: Vec<Value> = query.execute_action(&client, None).await.unwrap();
        assert_eq!(rows[0]["Status"], "A");

        let rows: Vec<Value> = client
            .call_action("ResetAll", Some(&json!({ "Force": true })))
            .await
            .unwrap();
        assert!(rows.is_empty());

        let requests = transport.requests();
        assert_eq!(requests.len(), 3);
        assert_eq!(requests[0].method, Method::HEAD);
        assert_eq!(requests[0].header_value("x-csrf-token"), Some("Fetch"));
        assert_eq!(
            requests[1].url,
            format!("{}/Travel('1')/SAP__self.acceptTravel", ROOT)
        );
        assert_eq!(requests[1].header_value("x-csrf-token"), Some("abc"));
        assert_eq!(requests[1].body.as_deref(), Some(&b"{}"[..]));
        assert_eq!(requests[2].url, format!("{}/ResetAll", ROOT));
        assert_eq!(requests[2].header_value("x-csrf-token"), Some("abc"));
    }

    #[tokio::test]
    async fn test_forbidden_post_discards_csrf_token() {
        let transport = Arc::new(
            ScriptedTransport::new()
                .respond_with(csrf_response("old"))
                .respond(403, "CSRF token validation failed")
                .respond_with(csrf_response("new"))
                .respond(204, ""),
        );
        let client = client(&transport);

        let err = client.call_action::<Value>("Reset", None).await.unwrap_err();
        assert_eq!(err.status(), Some(403));

        client.call_action::<Value>("Reset", None).await.unwrap();
        let requests = transport.requests();
        assert_eq!(requests.len(), 4);
        assert_eq!(requests[3].header_value("x-csrf-token"), Some("new"));
    }

    #[tokio::test]
    async fn test_fetch_metadata() {
        let xml = r#"<?xml version="1.0" encoding="utf-8"?>
<edmx:Edmx Version="4.0" xmlns:edmx="http://docs.oasis-open.org/odata/ns/edmx">
  <edmx:DataServices>
    <Schema Namespace="demo" xmlns="http://docs.oasis-open.org/odata/ns/edm">
      <EntityType Name="Travel">
        <Key><PropertyRef Name="TravelID"/></Key>
        <Property Name="TravelID" Type="Edm.String" Nullable="false"/>
      </EntityType>
      <EntityContainer Name="Container">
        <EntitySet Name="Travel" EntityType="demo.Travel"/>
      </EntityContainer>
    </Schema>
  </edmx:DataServices>
</edmx:Edmx>"#;
        let transport = Arc::new(ScriptedTransport::new().respond(200, xml));
        let client = client(&transport).with_version(ODataVersion::V4);

        let metadata = client.fetch_metadata().await.unwrap();
        assert_eq!(metadata.version, ODataVersion::V4);
        assert!(metadata.entity_type_of_set("Travel").is_some());
        assert_eq!(transport.requests()[0].url, format!("{}/$metadata", ROOT));
    }

    #[test]
    fn test_aligned_with_metadata_version() {
        let transport = Arc::new(ScriptedTransport::new());
        let client = client(&transport);
        assert_eq!(client.version(), ODataVersion::V2);

        let metadata: ServiceMetadata = r#"<edmx:Edmx Version="4.0" xmlns:edmx="http://docs.oasis-open.org/odata/ns/edmx">
  <edmx:DataServices>
    <Schema Namespace="demo" xmlns="http://docs.oasis-open.org/odata/ns/edm">
      <EntityType Name="Travel"><Key><PropertyRef Name="ID"/></Key><Property Name="ID" Type="Edm.Int32"/></EntityType>
      <EntityContainer Name="Container"><EntitySet Name="Travel" EntityType="demo.Travel"/></EntityContainer>
    </Schema>
  </edmx:DataServices>
</edmx:Edmx>"#
            .parse()
            .unwrap();

        let client = client.aligned_with(&metadata);
        assert_eq!(client.version(), ODataVersion::V4);
        let request = Query::new("Travel").build(client.version()).unwrap();
        assert_eq!(request.param("$format"), None);
    }

    #[test]
    fn test_invalid_service_root() {
        let transport = Arc::new(ScriptedTransport::new());
        let result = ODataClient::new(transport, Arc::new(StaticToken::new("x")), "not a url");
        assert!(matches!(result, Err(ODataError::InvalidUrl(_))));
    }
}
