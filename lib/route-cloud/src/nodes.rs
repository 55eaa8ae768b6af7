//! Node address lookup through the Kubernetes API

use async_trait::async_trait;
use k8s_openapi::api::core::v1::Node;
use kube::{Api, Client};
use route_core::{CoreError, NodeAddressResolver};
use tracing::debug;

const INTERNAL_IP: &str = "InternalIP";

/// KubeNodeResolver resolves node names to their InternalIP
pub struct KubeNodeResolver {
    client: Client,
}

impl KubeNodeResolver {
    pub fn new(client: Client) -> Self {
        Self { client }
    }

    /// InternalIP of a node; with several InternalIPs the last one is used
    pub fn internal_ip(node: &Node) -> Option<String> {
        node.status
            .as_ref()?
            .addresses
            .as_ref()?
            .iter()
            .rfind(|address| address.type_ == INTERNAL_IP)
            .map(|address| address.address.clone())
            .filter(|address| !address.is_empty())
    }
}

#[async_trait]
impl NodeAddressResolver for KubeNodeResolver {
    async fn internal_address(&self, node_name: &str) -> route_core::Result<String> {
        let nodes: Api<Node> = Api::all(self.client.clone());
        let node = nodes
            .get_opt(node_name)
            .await?
            .ok_or_else(|| CoreError::NodeNotFound(node_name.to_string()))?;

        let address = Self::internal_ip(&node)
            .ok_or_else(|| CoreError::NoInternalAddress(node_name.to_string()))?;
        debug!("Node {} has InternalIP {}", node_name, address);
        Ok(address)
    }
}
