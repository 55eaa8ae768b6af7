use route_core::CoreError;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum CloudError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("VPC API returned {status}: {body}")]
    Api { status: u16, body: String },

    #[error("Operation {0} did not finish in time")]
    OperationTimeout(String),
}

impl From<CloudError> for CoreError {
    fn from(err: CloudError) -> Self {
        CoreError::Transport(err.into())
    }
}
