use std::fmt;

use serde::{Deserialize, Serialize};

use crate::ResourceKind;

/// Write verbs as they appear in user-facing rejection messages.
/// Updates report as `create`, matching the create-or-update contract.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Verb {
    Get,
    Create,
    Patch,
    Delete,
}

impl fmt::Display for Verb {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Verb::Get => "get",
            Verb::Create => "create",
            Verb::Patch => "patch",
            Verb::Delete => "delete",
        };
        f.write_str(s)
    }
}

#[derive(Debug, thiserror::Error)]
pub enum ClientError {
    /// The control plane answered with an error status.
    #[error("Unable to {verb} kubernetes {kind} {message}")]
    Rejected { verb: Verb, kind: ResourceKind, code: u16, message: String },
    /// Optimistic concurrency check failed (HTTP 409); callers may retry.
    #[error("Conflict writing kubernetes {kind} {name}: {message}")]
    Conflict { kind: ResourceKind, name: String, message: String },
    #[error("Unable to parse kubernetes {kind} manifest: {source}")]
    Manifest {
        kind: ResourceKind,
        #[source]
        source: serde_yaml::Error,
    },
    #[error("encoding kubernetes {kind}: {source}")]
    Encoding {
        kind: ResourceKind,
        #[source]
        source: serde_json::Error,
    },
    /// Anything that is not an API status (connection, TLS, auth plumbing).
    #[error(transparent)]
    Transport(#[from] kube::Error),
}

impl ClientError {
    pub fn rejected(verb: Verb, kind: ResourceKind, code: u16, message: impl Into<String>) -> Self {
        ClientError::Rejected { verb, kind, code, message: message.into() }
    }

    /// Translate a kube-rs error for a `verb` on `kind/name`.
    pub fn from_kube(verb: Verb, kind: ResourceKind, name: &str, err: kube::Error) -> Self {
        match err {
            kube::Error::Api(ae) if ae.code == 409 => {
                ClientError::Conflict { kind, name: name.to_string(), message: ae.message }
            }
            kube::Error::Api(ae) => ClientError::Rejected { verb, kind, code: ae.code, message: ae.message },
            other => ClientError::Transport(other),
        }
    }

    pub fn is_conflict(&self) -> bool {
        matches!(self, ClientError::Conflict { .. })
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self, ClientError::Rejected { code: 404, .. })
    }
}
