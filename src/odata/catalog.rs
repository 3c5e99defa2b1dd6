//! Gateway service catalog
//!
//! ABAP systems publish their OData services through the catalog service's
//! `ServiceCollection` entity set.

use reqwest::Url;
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;

/// Catalog service path on an ABAP system
pub const DEFAULT_CATALOG_PATH: &str = "/sap/opu/odata/IWFND/CATALOGSERVICE;v=2";

/// One entry of the service catalog
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ServiceInfo {
    #[serde(rename = "TechnicalServiceName", default)]
    pub technical_name: String,
    #[serde(
        rename = "TechnicalServiceVersion",
        default,
        deserialize_with = "string_or_number"
    )]
    pub version: String,
    #[serde(rename = "Title", default)]
    pub title: String,
    #[serde(rename = "ServiceUrl", default)]
    pub url: String,
}

impl ServiceInfo {
    /// Path portion of the service URL, or the conventional Gateway path
    /// when the catalog gives no usable URL
    pub fn service_path(&self) -> String {
        match Url::parse(&self.url) {
            Ok(url) => url.path().trim_end_matches('/').to_string(),
            Err(_) => format!("/sap/opu/odata/sap/{}", self.technical_name),
        }
    }
}

/// The catalog types the version as `Edm.Int16`, some releases send a string
fn string_or_number<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(match Value::deserialize(deserializer)? {
        Value::String(s) => s,
        Value::Null => String::new(),
        other => other.to_string(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_catalog_entry() {
        let info: ServiceInfo = serde_json::from_value(serde_json::json!({
            "TechnicalServiceName": "API_TRAVEL_SRV",
            "TechnicalServiceVersion": 1,
            "Title": "Travel",
            "ServiceUrl": "https://host:443/sap/opu/odata/sap/API_TRAVEL_SRV/",
            "__metadata": { "type": "CATALOGSERVICE.Service" }
        }))
        .unwrap();
        assert_eq!(info.version, "1");
        assert_eq!(info.service_path(), "/sap/opu/odata/sap/API_TRAVEL_SRV");
    }

    #[test]
    fn test_service_path_without_url() {
        let info: ServiceInfo = serde_json::from_value(serde_json::json!({
            "TechnicalServiceName": "ZUI_TRAVEL",
            "TechnicalServiceVersion": "0001"
        }))
        .unwrap();
        assert_eq!(info.version, "0001");
        assert_eq!(info.title, "");
        assert_eq!(info.service_path(), "/sap/opu/odata/sap/ZUI_TRAVEL");
    }
}
