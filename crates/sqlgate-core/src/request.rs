//! Normalized query request.
//!
//! The HTTP layer accepts parameters from the query string, a form body or a
//! JSON body; all of them are folded into one [`QueryRequest`] before the
//! gatekeeper runs.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use std::time::Duration;

/// Default spatial reference used when the caller sends none.
pub const DEFAULT_SRS: &str = "900913";

/// Serialization requested for read results.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum OutputFormat {
    #[default]
    Geojson,
    Csv,
    Excel,
}

impl FromStr for OutputFormat {
    type Err = UnsupportedValue;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "geojson" => Ok(OutputFormat::Geojson),
            "csv" => Ok(OutputFormat::Csv),
            "excel" => Ok(OutputFormat::Excel),
            other => Err(UnsupportedValue(format!(
                "{} is not a supported format.",
                other
            ))),
        }
    }
}

impl fmt::Display for OutputFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            OutputFormat::Geojson => write!(f, "geojson"),
            OutputFormat::Csv => write!(f, "csv"),
            OutputFormat::Excel => write!(f, "excel"),
        }
    }
}

/// Geometry encoding for non-GeoJSON output.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum GeoFormat {
    Geojson,
    Wkt,
}

impl GeoFormat {
    /// Parse an optional `geoformat` parameter; empty and `null` mean none.
    pub fn parse_optional(raw: Option<&str>) -> Result<Option<Self>, UnsupportedValue> {
        match raw {
            None | Some("") | Some("null") => Ok(None),
            Some("geojson") => Ok(Some(GeoFormat::Geojson)),
            Some("wkt") => Ok(Some(GeoFormat::Wkt)),
            Some(other) => Err(UnsupportedValue(format!(
                "{} is not a supported geom format.",
                other
            ))),
        }
    }
}

/// A request parameter outside its allowed set.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnsupportedValue(pub String);

impl fmt::Display for UnsupportedValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl std::error::Error for UnsupportedValue {}

/// One query as seen by the gatekeeper.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QueryRequest {
    /// Raw SQL text (already base64/percent decoded).
    pub sql: String,
    #[serde(default)]
    pub client_encoding: Option<String>,
    #[serde(default = "default_srs")]
    pub srs: String,
    #[serde(default)]
    pub format: OutputFormat,
    #[serde(default)]
    pub geoformat: Option<GeoFormat>,
    /// Flatten every column to a string (non-GeoJSON formats).
    #[serde(default)]
    pub all_to_str: bool,
    #[serde(default)]
    pub alias: bool,
    #[serde(default)]
    pub api_key: Option<String>,
    /// Requested cache lifetime; zero disables caching.
    #[serde(default)]
    pub lifetime: Duration,
    #[serde(default)]
    pub subuser: Option<String>,
    #[serde(default)]
    pub stream: bool,
}

fn default_srs() -> String {
    DEFAULT_SRS.to_string()
}

impl QueryRequest {
    /// A request with defaults for everything but the SQL text.
    pub fn new(sql: impl Into<String>) -> Self {
        Self {
            sql: sql.into(),
            client_encoding: None,
            srs: default_srs(),
            format: OutputFormat::default(),
            geoformat: None,
            all_to_str: false,
            alias: false,
            api_key: None,
            lifetime: Duration::ZERO,
            subuser: None,
            stream: false,
        }
    }

    pub fn with_api_key(mut self, key: impl Into<String>) -> Self {
        self.api_key = Some(key.into());
        self
    }

    pub fn with_subuser(mut self, subuser: impl Into<String>) -> Self {
        self.subuser = Some(subuser.into());
        self
    }

    pub fn with_lifetime(mut self, lifetime: Duration) -> Self {
        self.lifetime = lifetime;
        self
    }

    pub fn streaming(mut self) -> Self {
        self.stream = true;
        self
    }

    /// Same request parameters, different statement text. Used for bulk batches.
    pub fn for_statement(&self, sql: impl Into<String>) -> Self {
        Self {
            sql: sql.into(),
            ..self.clone()
        }
    }

    /// Whether the caller asked for caching at all.
    pub fn wants_cache(&self) -> bool {
        !self.lifetime.is_zero()
    }
}
