//! OData literal encoding
//!
//! Strings are single-quoted with embedded quotes doubled. Numbers and booleans
//! are written bare. Anything without explicit type information is a string.

use crate::metadata::ODataVersion;
use std::fmt;

#[derive(Debug, Clone, PartialEq)]
pub enum Literal {
    Null,
    Bool(bool),
    Int(i64),
    Decimal(f64),
    String(String),
    /// GUID in canonical `8-4-4-4-12` form
    Guid(String),
    /// `YYYY-MM-DD[THH:MM:SS[.fff]][Z|±HH:MM]`; a bare date means midnight,
    /// no zone means UTC
    DateTime(String),
}

impl Literal {
    pub fn guid(value: impl Into<String>) -> Self {
        Literal::Guid(value.into())
    }

    pub fn datetime(value: impl Into<String>) -> Self {
        Literal::DateTime(value.into())
    }

    /// Render for use inside `$filter` or a key predicate
    pub fn render(&self, version: ODataVersion) -> String {
        match (self, version) {
            (Literal::Null, _) => "null".to_string(),
            (Literal::Bool(b), _) => b.to_string(),
            (Literal::Int(n), _) => n.to_string(),
            (Literal::Decimal(d), _) if !d.is_finite() => non_finite(*d).to_string(),
            (Literal::Decimal(d), ODataVersion::V2) => format!("{}m", d),
            (Literal::Decimal(d), ODataVersion::V4) => d.to_string(),
            (Literal::String(s), _) => quote(s),
            (Literal::Guid(g), ODataVersion::V2) => format!("guid{}", quote(g)),
            (Literal::Guid(g), ODataVersion::V4) => g.clone(),
            (Literal::DateTime(dt), ODataVersion::V2) => match split_zone(dt) {
                (local, None | Some("Z")) => format!("datetime{}", quote(&local)),
                (local, Some(offset)) => {
                    format!("datetimeoffset{}", quote(&format!("{}{}", local, offset)))
                }
            },
            (Literal::DateTime(dt), ODataVersion::V4) => {
                let (local, zone) = split_zone(dt);
                format!("{}{}", local, zone.unwrap_or("Z"))
            }
        }
    }
}

/// Split a datetime into its local part and its zone (`Z` or `±HH:MM`).
/// A bare date is expanded to midnight.
fn split_zone(value: &str) -> (String, Option<&str>) {
    let value = value.trim();
    let Some(t) = value.find('T') else {
        return (format!("{}T00:00:00", value), None);
    };
    let time = &value[t..];
    if let Some(local) = value.strip_suffix('Z') {
        return (local.to_string(), Some("Z"));
    }
    match time.rfind(&['+', '-'][..]) {
        Some(at) => {
            let at = t + at;
            (value[..at].to_string(), Some(&value[at..]))
        }
        None => (value.to_string(), None),
    }
}

/// OData keywords for the IEEE special values
fn non_finite(value: f64) -> &'static str {
    if value.is_nan() {
        "NaN"
    } else if value.is_sign_negative() {
        "-INF"
    } else {
        "INF"
    }
}

/// Single-quote a string, doubling embedded quotes
pub fn quote(value: &str) -> String {
    format!("'{}'", value.replace('\'', "''"))
}

impl fmt::Display for Literal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.render(ODataVersion::V4))
    }
}

impl From<&str> for Literal {
    fn from(value: &str) -> Self {
        Literal::String(value.to_string())
    }
}

impl From<String> for Literal {
    fn from(value: String) -> Self {
        Literal::String(value)
    }
}

impl From<&String> for Literal {
    fn from(value: &String) -> Self {
        Literal::String(value.clone())
    }
}

impl From<bool> for Literal {
    fn from(value: bool) -> Self {
        Literal::Bool(value)
    }
}

macro_rules! int_literal {
    ($($t:ty),*) => {
        $(impl From<$t> for Literal {
            fn from(value: $t) -> Self {
                Literal::Int(i64::from(value))
            }
        })*
    };
}

int_literal!(i8, i16, i32, i64, u8, u16, u32);

impl From<f64> for Literal {
    fn from(value: f64) -> Self {
        Literal::Decimal(value)
    }
}

impl From<f32> for Literal {
    fn from(value: f32) -> Self {
        Literal::Decimal(f64::from(value))
    }
}

impl<T: Into<Literal>> From<Option<T>> for Literal {
    fn from(value: Option<T>) -> Self {
        value.map_or(Literal::Null, Into::into)
    }
}
