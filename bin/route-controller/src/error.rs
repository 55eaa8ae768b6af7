use route_core::CoreError;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ReconcileError {
    #[error("Route error: {0}")]
    RouteError(#[from] CoreError),

    #[error("Kubernetes error: {0}")]
    KubernetesError(#[from] kube::Error),
}

impl ReconcileError {
    pub fn is_busy(&self) -> bool {
        matches!(self, ReconcileError::RouteError(err) if err.is_busy())
    }
}
