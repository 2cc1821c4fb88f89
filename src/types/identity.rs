use serde::{Deserialize, Serialize};

/// An authenticated user. Every store query and mutation is scoped to `id`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub struct Identity {
    pub id: String,
    pub email: Option<String>,
}

impl Identity {
    pub fn new(id: impl Into<String>, email: Option<String>) -> Self {
        Self {
            id: id.into(),
            email,
        }
    }
}

/// External identity providers a user can sign in with.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum OAuthProvider {
    Google,
}

impl OAuthProvider {
    pub fn as_str(&self) -> &'static str {
        match self {
            OAuthProvider::Google => "google",
        }
    }

    pub fn parse(name: &str) -> Option<Self> {
        match name {
            "google" => Some(OAuthProvider::Google),
            _ => None,
        }
    }
}

/// Profile returned by the identity provider after a successful code exchange.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ProviderProfile {
    /// Provider-scoped stable subject identifier.
    pub sub: String,
    #[serde(default)]
    pub email: Option<String>,
}

/// Where to send the user to start the provider's sign-in flow.
#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct SignInRedirect {
    pub url: String,
    pub state: String,
}

/// A freshly created session. The token is only ever returned here; the
/// database stores its hash.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IssuedSession {
    pub token: String,
    pub identity: Identity,
}
