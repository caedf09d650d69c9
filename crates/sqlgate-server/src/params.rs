//! Request parameter normalization.
//!
//! Parameters arrive in the query string, a form body or a JSON body. They
//! are merged in that order, later sources winning, and folded into a
//! [`QueryRequest`].

use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use serde_json::Value;
use sqlgate_core::request::{DEFAULT_SRS, GeoFormat, OutputFormat, QueryRequest};
use sqlgate_runtime::GateError;
use std::collections::HashMap;
use std::time::Duration;

pub const MISSING_QUERY: &str = "Query is missing (the 'q' parameter)";

/// Merged request parameters. Empty values count as absent.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Params(HashMap<String, String>);

impl Params {
    pub fn from_query(raw: Option<&str>) -> Self {
        let mut params = Self::default();
        if let Some(raw) = raw {
            params.merge_form(raw.as_bytes());
        }
        params
    }

    pub fn merge_form(&mut self, body: &[u8]) {
        for (key, value) in url::form_urlencoded::parse(body) {
            self.insert(key.into_owned(), value.into_owned());
        }
    }

    /// Merge the top-level fields of a JSON object. Other JSON values are
    /// ignored.
    pub fn merge_json(&mut self, body: &Value) {
        let Some(object) = body.as_object() else {
            return;
        };
        for (key, value) in object {
            let value = match value {
                Value::Null => continue,
                Value::String(s) => s.clone(),
                Value::Bool(b) => b.to_string(),
                other => other.to_string(),
            };
            self.insert(key.clone(), value);
        }
    }

    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<String>) {
        let value = value.into();
        if !value.is_empty() {
            self.0.insert(key.into(), value);
        }
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.0.get(key).map(String::as_str)
    }

    pub fn flag(&self, key: &str) -> bool {
        matches!(self.get(key), Some("true" | "1"))
    }

    pub fn wants_stream(&self) -> bool {
        self.get("method") == Some("stream")
    }

    /// The statement text, base64-decoded when `base64=true` and
    /// percent-decoded otherwise.
    pub fn statement(&self) -> Result<String, GateError> {
        let raw = self.get("q").ok_or_else(missing_query)?;
        let sql = if self.flag("base64") {
            STANDARD
                .decode(raw.trim())
                .ok()
                .and_then(|bytes| String::from_utf8(bytes).ok())
                .unwrap_or_default()
        } else {
            urlencoding::decode(raw)
                .map(|decoded| decoded.into_owned())
                .unwrap_or_else(|_| raw.to_string())
        };
        if sql.trim().is_empty() {
            return Err(missing_query());
        }
        Ok(sql)
    }

    /// Everything but the statement text.
    pub fn template(
        &self,
        subuser: Option<String>,
        api_key: Option<String>,
    ) -> Result<QueryRequest, GateError> {
        let format = self
            .get("format")
            .map(str::parse::<OutputFormat>)
            .transpose()
            .map_err(|e| GateError::Request(e.to_string()))?
            .unwrap_or_default();
        let geoformat = GeoFormat::parse_optional(self.get("geoformat"))
            .map_err(|e| GateError::Request(e.to_string()))?;
        let lifetime = match self.get("lifetime") {
            Some(raw) => raw.parse::<u64>().map(Duration::from_secs).map_err(|_| {
                GateError::Request(format!("{} is not a valid lifetime in seconds.", raw))
            })?,
            None => Duration::ZERO,
        };

        Ok(QueryRequest {
            sql: String::new(),
            client_encoding: self.get("client_encoding").map(str::to_string),
            srs: self.get("srs").unwrap_or(DEFAULT_SRS).to_string(),
            format,
            geoformat,
            all_to_str: self.flag("allstr"),
            alias: self.flag("alias"),
            api_key,
            lifetime,
            subuser,
            stream: self.wants_stream(),
        })
    }

    /// A complete single-statement request.
    pub fn request(
        &self,
        subuser: Option<String>,
        api_key: Option<String>,
    ) -> Result<QueryRequest, GateError> {
        let sql = self.statement()?;
        Ok(self.template(subuser, api_key)?.for_statement(sql))
    }
}

impl FromIterator<(String, String)> for Params {
    fn from_iter<I: IntoIterator<Item = (String, String)>>(iter: I) -> Self {
        let mut params = Self::default();
        for (key, value) in iter {
            params.insert(key, value);
        }
        params
    }
}

fn missing_query() -> GateError {
    GateError::Validation {
        code: 403,
        message: MISSING_QUERY.to_string(),
    }
}

/// Split `subuser@account` into its parts. A bare name is an account.
pub fn split_user(user: &str) -> (Option<String>, String) {
    match user.split_once('@') {
        Some((subuser, account)) if !subuser.is_empty() && !account.is_empty() => {
            (Some(subuser.to_string()), account.to_string())
        }
        _ => (None, user.to_string()),
    }
}
