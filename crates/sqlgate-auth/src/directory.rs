//! Accounts and the configuration-driven authorizer.

use crate::authorizer::{AuthRequest, AuthResult, Authorizer};
use async_trait::async_trait;
use sqlgate_core::config::{AccountConfig, RelationAccess};
use std::collections::HashMap;
use std::sync::Arc;
use tracing::debug;

/// Resolves accounts to their canonical key and authorizer.
pub trait AccountDirectory: Send + Sync {
    /// The account's canonical API key, if the account exists and has one.
    fn api_key(&self, account: &str) -> Option<String>;

    /// The authorizer scoped to one account.
    fn authorizer(&self, account: &str) -> Option<Arc<dyn Authorizer>>;
}

/// Directory backed by the `accounts` section of the configuration.
#[derive(Debug, Clone, Default)]
pub struct ConfigDirectory {
    accounts: HashMap<String, Arc<AccountConfig>>,
}

impl ConfigDirectory {
    pub fn new(accounts: &HashMap<String, AccountConfig>) -> Self {
        Self {
            accounts: accounts
                .iter()
                .map(|(name, config)| (name.clone(), Arc::new(config.clone())))
                .collect(),
        }
    }

    pub fn contains(&self, account: &str) -> bool {
        self.accounts.contains_key(account)
    }
}

impl AccountDirectory for ConfigDirectory {
    fn api_key(&self, account: &str) -> Option<String> {
        self.accounts.get(account)?.resolve_api_key()
    }

    fn authorizer(&self, account: &str) -> Option<Arc<dyn Authorizer>> {
        let config = self.accounts.get(account)?;
        Some(Arc::new(ConfigAuthorizer::new(account, Arc::clone(config))))
    }
}

/// Authorizes relations of one account against its configured access levels.
///
/// - `public`: no key needed
/// - `write_protected`: reads are free, writes need a key
/// - `private`: reads and writes need a key
///
/// A key is the account's own key, or a subuser's key combined with a
/// privilege on the relation that covers the access.
#[derive(Debug, Clone)]
pub struct ConfigAuthorizer {
    account: String,
    config: Arc<AccountConfig>,
}

impl ConfigAuthorizer {
    pub fn new(account: impl Into<String>, config: Arc<AccountConfig>) -> Self {
        Self {
            account: account.into(),
            config,
        }
    }

    fn wrong_key(relation: &str) -> AuthResult {
        AuthResult::denied(
            403,
            format!("Forbidden. Not the right key for relation '{}'", relation),
        )
    }
}

fn access_name(access: RelationAccess) -> &'static str {
    match access {
        RelationAccess::Public => "public",
        RelationAccess::WriteProtected => "write_protected",
        RelationAccess::Private => "private",
    }
}

fn key_matches(expected: Option<String>, supplied: Option<&str>) -> bool {
    match (expected, supplied) {
        (Some(expected), Some(supplied)) => !supplied.is_empty() && expected == supplied,
        _ => false,
    }
}

#[async_trait]
impl Authorizer for ConfigAuthorizer {
    async fn authorize(&self, request: &AuthRequest<'_>) -> AuthResult {
        let access = self.config.access_for(request.relation);
        let needs_key = match access {
            RelationAccess::Public => false,
            RelationAccess::WriteProtected => request.require_write,
            RelationAccess::Private => true,
        };

        debug!(
            account = %self.account,
            relation = %request.relation,
            access = access_name(access),
            needs_key,
            "config authorizer"
        );

        let granted = || {
            AuthResult::granted()
                .with_detail("auth_level", access_name(access))
                .with_detail("checked_relations", request.known_relations.len())
        };

        if !needs_key {
            return granted();
        }

        let Some(subuser) = request.subuser else {
            return if key_matches(self.config.resolve_api_key(), request.api_key) {
                granted().with_detail("session", self.account.as_str())
            } else {
                Self::wrong_key(request.relation)
            };
        };

        let Some(sub) = self.config.subusers.get(subuser) else {
            return Self::wrong_key(request.relation);
        };
        if !key_matches(sub.resolve_api_key(), request.api_key) {
            return Self::wrong_key(request.relation);
        }

        let privilege = sub.privilege_for(request.relation);
        let (allowed, wanted) = if request.require_write {
            (privilege.allows_write(), "write")
        } else {
            (privilege.allows_read(), "read")
        };
        if !allowed {
            return AuthResult::denied(
                403,
                format!(
                    "Forbidden. Subuser '{}' lacks {} privilege on '{}'",
                    subuser, wanted, request.relation
                ),
            );
        }

        granted().with_detail("session", format!("{}@{}", subuser, self.account))
    }
}
