//! Credential types.

use serde::{Deserialize, Serialize};

use crate::clock::Timestamp;

/// Namespace used when none is configured.
pub const DEFAULT_NAMESPACE: &str = "wxbroker";

/// What a cached credential authorizes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CredentialKind {
    /// Access token of an app that holds its own secret.
    SecretAppToken,
    /// Access token of the third-party component itself.
    ComponentAppToken,
    /// Access token of an authorizer, obtained through the component.
    AuthorizerAppToken,
    /// Ticket pushed by the platform; required to obtain a component token.
    VerifyTicket,
}

impl CredentialKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::SecretAppToken => "secret_app_token",
            Self::ComponentAppToken => "component_app_token",
            Self::AuthorizerAppToken => "authorizer_app_token",
            Self::VerifyTicket => "verify_ticket",
        }
    }
}

impl std::fmt::Display for CredentialKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Identifies one cache entry: a (tenant, kind) pair under a namespace.
///
/// Renders as `"{namespace}:{tenant}:{kind}"`.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ScopeKey {
    namespace: String,
    tenant: String,
    kind: CredentialKind,
}

impl ScopeKey {
    /// Scope in the default namespace.
    pub fn new(tenant: impl Into<String>, kind: CredentialKind) -> Self {
        Self::with_namespace(DEFAULT_NAMESPACE, tenant, kind)
    }

    pub fn with_namespace(
        namespace: impl Into<String>,
        tenant: impl Into<String>,
        kind: CredentialKind,
    ) -> Self {
        Self {
            namespace: namespace.into(),
            tenant: tenant.into(),
            kind,
        }
    }

    pub fn namespace(&self) -> &str {
        &self.namespace
    }

    /// The tenant appid.
    pub fn tenant(&self) -> &str {
        &self.tenant
    }

    pub fn kind(&self) -> CredentialKind {
        self.kind
    }
}

impl std::fmt::Display for ScopeKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}:{}:{}", self.namespace, self.tenant, self.kind)
    }
}

/// A cached credential.
///
/// Replaced wholesale on refresh, never mutated in place.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Credential {
    pub kind: CredentialKind,
    pub scope_key: String,
    pub value: String,
    /// Absolute expiry in Unix seconds; `None` never expires.
    pub expires_at: Option<Timestamp>,
}

impl Credential {
    /// True while `now < expires_at`.
    pub fn is_valid_at(&self, now: Timestamp) -> bool {
        match self.expires_at {
            Some(expires_at) => now < expires_at,
            None => true,
        }
    }

    /// Seconds left before expiry, if the credential expires.
    pub fn remaining(&self, now: Timestamp) -> Option<u64> {
        self.expires_at.map(|at| at.saturating_sub(now))
    }
}

impl std::fmt::Debug for Credential {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Credential")
            .field("kind", &self.kind)
            .field("scope_key", &self.scope_key)
            .field("value", &"[REDACTED]")
            .field("expires_at", &self.expires_at)
            .finish()
    }
}

/// Result of a credential fetch: the value and its lifetime in seconds.
#[derive(Clone, PartialEq, Eq)]
pub struct FetchedCredential {
    pub value: String,
    pub ttl: Option<u64>,
}

impl FetchedCredential {
    /// A credential that expires `ttl_secs` after it is stored.
    pub fn new(value: impl Into<String>, ttl_secs: u64) -> Self {
        Self {
            value: value.into(),
            ttl: Some(ttl_secs),
        }
    }

    pub fn never_expiring(value: impl Into<String>) -> Self {
        Self {
            value: value.into(),
            ttl: None,
        }
    }
}

impl std::fmt::Debug for FetchedCredential {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FetchedCredential")
            .field("value", &"[REDACTED]")
            .field("ttl", &self.ttl)
            .finish()
    }
}
