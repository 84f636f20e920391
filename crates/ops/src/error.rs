use stacklab_core::UnknownStackType;
use stacklab_kubehub::ClientError;
use stacklab_manifests::GeneratorError;

use crate::registry::Step;

/// Failure of a single pipeline step.
#[derive(Debug, thiserror::Error)]
pub enum StepError {
    #[error(transparent)]
    Client(#[from] ClientError),
    #[error(transparent)]
    Generator(#[from] GeneratorError),
    #[error("Unable to store stack credentials: {0:#}")]
    Credentials(anyhow::Error),
    #[error("{step} step needs the output of the {needs} step")]
    MissingInput { step: Step, needs: Step },
}

impl StepError {
    /// The cluster error behind this step, including one raised inside the
    /// credential store.
    pub fn client_error(&self) -> Option<&ClientError> {
        match self {
            StepError::Client(e) => Some(e),
            StepError::Credentials(e) => e.downcast_ref::<ClientError>(),
            _ => None,
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum StackError {
    #[error(transparent)]
    UnknownStackType(#[from] UnknownStackType),

    #[error("Could not mount assets on Stack. No stack deployment with name: {deployment} in namespace: {namespace}")]
    StackDeploymentNotFound { deployment: String, namespace: String },

    /// A create or delete pipeline stopped at `step`; the steps in
    /// `completed` already took effect and are not rolled back.
    #[error("{source}")]
    Pipeline { stack: String, step: Step, completed: Vec<Step>, source: StepError },

    #[error(transparent)]
    Client(#[from] ClientError),

    #[error("stack repository: {0:#}")]
    Repository(anyhow::Error),

    #[error("asset metadata: {0:#}")]
    Assets(anyhow::Error),

    #[error("encoding mount preview: {0}")]
    Encoding(#[source] serde_json::Error),
}

/// Coarse classification callers map onto responses.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    UnknownStackType,
    PreconditionFailed,
    UpstreamRejected,
    Conflict,
    PartialPipelineFailure,
    Transport,
    Repository,
    Encoding,
}

fn client_kind(err: &ClientError) -> ErrorKind {
    match err {
        ClientError::Conflict { .. } => ErrorKind::Conflict,
        ClientError::Transport(_) => ErrorKind::Transport,
        _ => ErrorKind::UpstreamRejected,
    }
}

impl StackError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            StackError::UnknownStackType(_) => ErrorKind::UnknownStackType,
            StackError::StackDeploymentNotFound { .. } => ErrorKind::PreconditionFailed,
            StackError::Pipeline { .. } => ErrorKind::PartialPipelineFailure,
            StackError::Client(e) => client_kind(e),
            StackError::Repository(_) | StackError::Assets(_) => ErrorKind::Repository,
            StackError::Encoding(_) => ErrorKind::Encoding,
        }
    }

    /// True only for optimistic-concurrency conflicts, wherever they surfaced.
    pub fn is_retryable(&self) -> bool {
        self.client_error().is_some_and(ClientError::is_conflict)
    }

    /// The underlying client error, if the failure came from the cluster.
    pub fn client_error(&self) -> Option<&ClientError> {
        match self {
            StackError::Client(e) => Some(e),
            StackError::Pipeline { source, .. } => source.client_error(),
            _ => None,
        }
    }
}
