//! Stacklab ops: stack type registry, lifecycle pipelines and the stack manager.

#![forbid(unsafe_code)]

mod credentials;
mod error;
mod manager;
mod pipeline;
mod registry;

pub use credentials::{ClusterSecretStore, CredentialKind, Credentials, MemorySecretStore, SecretStore};
pub use error::{ErrorKind, StackError, StepError};
pub use manager::{CreatedStack, MountOutcome, MountRequest, StackManager};
pub use registry::{handler_for, Registry, StackHandler, Step};
pub use stacklab_apply::MountPreview;
