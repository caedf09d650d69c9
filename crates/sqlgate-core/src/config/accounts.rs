//! Account configuration: API keys, subusers and relation access levels.
//!
//! An account maps to one database owner. Relations carry an access level,
//! and subusers get explicit per-relation privileges.
//!
//! ```yaml
//! accounts:
//!   mapcentia:
//!     api_key_env: MAPCENTIA_API_KEY
//!     default_access: write_protected
//!     relations:
//!       public.parcels: public
//!       public.owners: private
//!     subusers:
//!       surveyor:
//!         api_key: s3cret
//!         privileges:
//!           public.owners: read
//!           public.parcels: write
//! ```

use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Who may touch a relation without further privileges.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum RelationAccess {
    /// Reads and writes need no key.
    Public,
    /// Reads are free, writes need a key.
    #[default]
    WriteProtected,
    /// Reads and writes need a key.
    Private,
}

/// A subuser's privilege on one relation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum Privilege {
    #[default]
    None,
    Read,
    Write,
    All,
}

impl Privilege {
    pub fn allows_read(&self) -> bool {
        !matches!(self, Privilege::None)
    }

    pub fn allows_write(&self) -> bool {
        matches!(self, Privilege::Write | Privilege::All)
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AccountConfig {
    /// The account's canonical API key.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_key: Option<String>,

    /// Environment variable holding the API key (takes precedence).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_key_env: Option<String>,

    /// Access level for relations not listed in `relations`.
    #[serde(default)]
    pub default_access: RelationAccess,

    /// Access level per schema-qualified relation.
    #[serde(default)]
    pub relations: HashMap<String, RelationAccess>,

    #[serde(default)]
    pub subusers: HashMap<String, SubuserConfig>,
}

impl AccountConfig {
    /// Resolve the API key, checking `api_key_env` first. Empty keys count as absent.
    pub fn resolve_api_key(&self) -> Option<String> {
        resolve_key(self.api_key_env.as_deref(), self.api_key.as_deref())
    }

    /// Access level of a relation. Lookups are case-insensitive and an
    /// unqualified entry also matches the `public` schema.
    pub fn access_for(&self, relation: &str) -> RelationAccess {
        lookup_relation(&self.relations, relation).unwrap_or(self.default_access)
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SubuserConfig {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_key: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_key_env: Option<String>,

    #[serde(default)]
    pub privileges: HashMap<String, Privilege>,
}

impl SubuserConfig {
    pub fn resolve_api_key(&self) -> Option<String> {
        resolve_key(self.api_key_env.as_deref(), self.api_key.as_deref())
    }

    pub fn privilege_for(&self, relation: &str) -> Privilege {
        lookup_relation(&self.privileges, relation).unwrap_or_default()
    }
}

fn resolve_key(env_var: Option<&str>, literal: Option<&str>) -> Option<String> {
    if let Some(var) = env_var
        && let Ok(key) = std::env::var(var)
        && !key.is_empty()
    {
        return Some(key);
    }
    literal.filter(|k| !k.is_empty()).map(str::to_string)
}

fn lookup_relation<T: Copy>(map: &HashMap<String, T>, relation: &str) -> Option<T> {
    let wanted = qualified(relation);
    map.iter()
        .find(|(name, _)| qualified(name) == wanted)
        .map(|(_, value)| *value)
}

/// Lowercased, with an unqualified name placed in the `public` schema.
fn qualified(relation: &str) -> String {
    let lowered = relation.to_ascii_lowercase();
    if lowered.contains('.') {
        lowered
    } else {
        format!("public.{}", lowered)
    }
}
