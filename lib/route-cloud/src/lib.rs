//! Cloud and cluster collaborators of the route reconciler
pub mod client;
pub mod error;
pub mod nodes;

pub use client::{CloudClientConfig, CloudRouteTableClient};
pub use error::CloudError;
pub use nodes::KubeNodeResolver;
