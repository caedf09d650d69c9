//! # sqlgate-auth
//!
//! Per-relation authorization. The gateway asks an [`Authorizer`] about each
//! relation a statement touches through the [`AuthorizationGate`], which
//! stops at the first denial. [`ConfigAuthorizer`] answers from the
//! `accounts` section of the configuration.

pub mod authorizer;
pub mod directory;
pub mod gate;

pub use authorizer::{AllowAll, AuthRequest, AuthResult, Authorizer};
pub use directory::{AccountDirectory, ConfigAuthorizer, ConfigDirectory};
pub use gate::{AuthDenied, AuthorizationGate, Credentials};
