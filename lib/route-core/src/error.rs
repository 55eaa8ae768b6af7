use thiserror::Error;

pub type Result<T> = std::result::Result<T, CoreError>;

#[derive(Error, Debug)]
pub enum CoreError {
    #[error("Route table {0} is locked by another operation")]
    Busy(String),

    #[error("Node not found: {0}")]
    NodeNotFound(String),

    #[error("No InternalIP found for node {0:?}")]
    NoInternalAddress(String),

    #[error("Operation {id} failed with code {code}: {message}")]
    OperationFailed {
        id: String,
        code: i32,
        message: String,
    },

    #[error("Kubernetes error: {0}")]
    KubernetesError(#[from] kube::error::Error),

    #[error(transparent)]
    Transport(#[from] anyhow::Error),
}

impl CoreError {
    /// The route table lock was held; the call can simply be repeated later
    pub fn is_busy(&self) -> bool {
        matches!(self, CoreError::Busy(_))
    }
}
