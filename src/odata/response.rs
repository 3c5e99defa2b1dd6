//! Response decoding
//!
//! Accepted payload shapes:
//! - V4 collection: `{"value": [...], "@odata.count": n, "@odata.nextLink": "..."}`
//! - V2 collection: `{"d": {"results": [...], "__count": "n", "__next": "..."}}`
//! - V2 single entity: `{"d": {...}}`
//! - V4 single entity: the bare object
//! - V4 action/function result: `{"value": <primitive | object>}`, one row

use super::client::ODataError;
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::{Map, Value};

/// One page of results
#[derive(Debug, Clone, Serialize)]
pub struct Page<T> {
    pub rows: Vec<T>,
    /// Continuation link, absolute or relative to the service root
    pub next_link: Option<String>,
    /// Total count, when requested with `with_count`
    pub count: Option<u64>,
}

/// Concatenated result of [`ODataClient::execute_all`](super::ODataClient::execute_all)
#[derive(Debug, Clone, Serialize)]
pub struct AllPages<T> {
    pub rows: Vec<T>,
    /// Number of pages fetched
    pub pages: usize,
    /// True when the cap was reached while the service still offered a continuation
    pub stopped_at_cap: bool,
}

/// Decode a page body into rows of `T`
pub fn decode_page<T: DeserializeOwned>(body: &[u8]) -> Result<Page<T>, ODataError> {
    let payload: Value = serde_json::from_slice(body)
        .map_err(|e| ODataError::ParseError(format!("Failed to parse response JSON: {}", e)))?;

    let Value::Object(mut root) = payload else {
        return Err(ODataError::ParseError(
            "Expected a JSON object at the top level".to_string(),
        ));
    };

    let (rows, next_link, count) = if let Some(value) = root.remove("value") {
        let rows = match value {
            Value::Array(rows) => rows,
            // Primitive, complex or single-entity result of an action or function
            Value::Null => Vec::new(),
            other => vec![other],
        };
        let next = link_field(&root, "@odata.nextLink");
        let count = count_field(&root, "@odata.count");
        (rows, next, count)
    } else if let Some(d) = root.remove("d") {
        match d {
            Value::Object(mut d) => match d.remove("results") {
                Some(Value::Array(rows)) => {
                    let next = link_field(&d, "__next");
                    let count = count_field(&d, "__count");
                    (rows, next, count)
                }
                Some(other) => {
                    return Err(ODataError::ParseError(format!(
                        "'d.results' is not an array: {}",
                        other
                    )))
                }
                None => (vec![Value::Object(d)], None, None),
            },
            Value::Array(rows) => (rows, None, None),
            other => {
                return Err(ODataError::ParseError(format!(
                    "Unexpected 'd' payload: {}",
                    other
                )))
            }
        }
    } else {
        (vec![Value::Object(root)], None, None)
    };

    let rows = rows
        .into_iter()
        .map(serde_json::from_value)
        .collect::<Result<Vec<T>, _>>()
        .map_err(|e| ODataError::ParseError(format!("Failed to decode row: {}", e)))?;

    Ok(Page {
        rows,
        next_link,
        count,
    })
}

/// An empty link means there is no further page
fn link_field(map: &Map<String, Value>, key: &str) -> Option<String> {
    map.get(key)
        .and_then(Value::as_str)
        .map(str::trim)
        .filter(|link| !link.is_empty())
        .map(str::to_string)
}

/// V2 sends `__count` as a string, V4 sends a number
fn count_field(map: &Map<String, Value>, key: &str) -> Option<u64> {
    match map.get(key)? {
        Value::Number(n) => n.as_u64(),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}

/// Parse the plain-text body of a `/$count` request
pub fn parse_count(body: &[u8]) -> Result<u64, ODataError> {
    let text = String::from_utf8_lossy(body);
    let trimmed = text.trim_start_matches('\u{feff}').trim();
    trimmed
        .parse()
        .map_err(|_| ODataError::ParseError(format!("Invalid $count response: '{}'", trimmed)))
}

/// Build a service error from a non-2xx response, extracting the OData error
/// code and message from JSON (V2 and V4) or XML payloads when present.
pub fn service_error(status: u16, body: &[u8]) -> ODataError {
    let text = String::from_utf8_lossy(body).into_owned();
    let (code, message) = json_error(&text)
        .or_else(|| xml_error(&text))
        .unwrap_or_else(|| (None, fallback_message(status, &text)));

    ODataError::Service {
        status,
        code,
        message,
        body: text,
    }
}

fn json_error(text: &str) -> Option<(Option<String>, String)> {
    let payload: Value = serde_json::from_str(text).ok()?;
    let error = payload.get("error")?;
    let code = error
        .get("code")
        .and_then(Value::as_str)
        .map(str::to_string);
    let message = match error.get("message")? {
        Value::String(s) => s.clone(),
        Value::Object(m) => m.get("value")?.as_str()?.to_string(),
        _ => return None,
    };
    Some((code, message))
}

fn xml_error(text: &str) -> Option<(Option<String>, String)> {
    let doc = roxmltree::Document::parse(text.trim_start()).ok()?;
    let root = doc.root_element();
    if root.tag_name().name() != "error" {
        return None;
    }
    let child_text = |name: &str| {
        root.children()
            .find(|n| n.is_element() && n.tag_name().name() == name)
            .and_then(|n| n.text())
            .map(|t| t.trim().to_string())
    };
    Some((child_text("code"), child_text("message")?))
}

fn fallback_message(status: u16, text: &str) -> String {
    let trimmed = text.trim();
    if trimmed.is_empty() {
        format!("HTTP {}", status)
    } else {
        trimmed.chars().take(200).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::Deserialize;

    #[derive(Debug, Deserialize, PartialEq)]
    struct Travel {
        #[serde(rename = "TravelID")]
        travel_id: String,
    }

    #[test]
    fn test_v4_collection() {
        let body = br#"{"@odata.context":"$metadata#Travel","@odata.count":12,
            "value":[{"TravelID":"1"},{"TravelID":"2"}],
            "@odata.nextLink":"Travel?$skiptoken=2"}"#;
        let page: Page<Travel> = decode_page(body).unwrap();
        assert_eq!(page.rows.len(), 2);
        assert_eq!(page.count, Some(12));
        assert_eq!(page.next_link.as_deref(), Some("Travel?$skiptoken=2"));
    }

    #[test]
    fn test_v2_collection_with_string_count() {
        let body = br#"{"d":{"results":[{"TravelID":"1","__metadata":{"uri":"x"}}],
            "__count":"40","__next":"https://host/srv/Travel?$skiptoken=1"}}"#;
        let page: Page<Travel> = decode_page(body).unwrap();
        assert_eq!(page.rows, vec![Travel { travel_id: "1".into() }]);
        assert_eq!(page.count, Some(40));
        assert!(page.next_link.unwrap().ends_with("$skiptoken=1"));
    }

    #[test]
    fn test_single_entities() {
        let v2: Page<Travel> = decode_page(br#"{"d":{"TravelID":"7"}}"#).unwrap();
        assert_eq!(v2.rows, vec![Travel { travel_id: "7".into() }]);

        let v4: Page<Value> =
            decode_page(br#"{"@odata.context":"$metadata#Travel/$entity","TravelID":"8"}"#).unwrap();
        assert_eq!(v4.rows.len(), 1);
        assert_eq!(v4.rows[0]["TravelID"], "8");
        assert_eq!(v4.next_link, None);
    }

    #[test]
    fn test_non_collection_value_is_one_row() {
        let scalar: Page<i64> =
            decode_page(br#"{"@odata.context":"$metadata#Edm.Int32","value":5}"#).unwrap();
        assert_eq!(scalar.rows, vec![5]);

        let complex: Page<Value> = decode_page(
            br#"{"@odata.context":"$metadata#SAP__self.Stats","value":{"Open":3,"Closed":9}}"#,
        )
        .unwrap();
        assert_eq!(complex.rows.len(), 1);
        assert_eq!(complex.rows[0]["Closed"], 9);

        let null: Page<Value> = decode_page(br#"{"value":null}"#).unwrap();
        assert!(null.rows.is_empty());
    }

    #[test]
    fn test_empty_links_end_pagination() {
        let v2: Page<Value> = decode_page(br#"{"d":{"results":[],"__next":""}}"#).unwrap();
        assert_eq!(v2.next_link, None);
        let v4: Page<Value> = decode_page(br#"{"value":[],"@odata.nextLink":" "}"#).unwrap();
        assert_eq!(v4.next_link, None);
    }

    #[test]
    fn test_non_object_is_parse_error() {
        let err = decode_page::<Value>(b"[1,2]").unwrap_err();
        assert!(matches!(err, ODataError::ParseError(_)));
        let err = decode_page::<Value>(b"<html/>").unwrap_err();
        assert!(matches!(err, ODataError::ParseError(_)));
    }

    #[test]
    fn test_parse_count() {
        assert_eq!(parse_count(b"42\n").unwrap(), 42);
        assert!(parse_count(b"many").is_err());
    }

    #[test]
    fn test_service_error_payloads() {
        let v4 = service_error(
            400,
            br#"{"error":{"code":"SY/530","message":"Property 'Foo' not found"}}"#,
        );
        match v4 {
            ODataError::Service { status, code, message, .. } => {
                assert_eq!(status, 400);
                assert_eq!(code.as_deref(), Some("SY/530"));
                assert_eq!(message, "Property 'Foo' not found");
            }
            other => panic!("unexpected {:?}", other),
        }

        let v2 = service_error(
            404,
            br#"{"error":{"code":"/IWBEP/CM_MGW_RT/020","message":{"lang":"en","value":"Resource not found"}}}"#,
        );
        assert!(matches!(v2, ODataError::Service { ref message, .. } if message == "Resource not found"));

        let xml = service_error(
            500,
            br#"<?xml version="1.0"?><error xmlns="http://schemas.microsoft.com/ado/2007/08/dataservices/metadata"><code>X/1</code><message xml:lang="en">Boom</message></error>"#,
        );
        assert!(matches!(xml, ODataError::Service { ref code, ref message, .. }
            if code.as_deref() == Some("X/1") && message == "Boom"));

        let empty = service_error(502, b"");
        assert!(matches!(empty, ODataError::Service { ref message, .. } if message == "HTTP 502"));
    }
}
