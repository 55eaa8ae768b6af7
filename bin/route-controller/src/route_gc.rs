//! Periodic removal of routes whose node no longer exists

use crate::error::ReconcileError;
use crate::metrics::RouteMetrics;
use async_trait::async_trait;
use k8s_openapi::api::core::v1::Node;
use kube::Api;
use route_core::{ManagedRoute, NodeAddressResolver, RouteReconciler, RouteTableApi};
use std::collections::{BTreeSet, HashSet};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, error, info};

/// Names of the nodes currently in the cluster
#[async_trait]
pub trait NodeLister: Send + Sync {
    async fn node_names(&self) -> Result<HashSet<String>, ReconcileError>;
}

#[async_trait]
impl NodeLister for Api<Node> {
    async fn node_names(&self) -> Result<HashSet<String>, ReconcileError> {
        Ok(self
            .list(&Default::default())
            .await?
            .items
            .into_iter()
            .filter_map(|node| node.metadata.name)
            .collect())
    }
}

/// RouteGarbageCollector drops managed routes of deleted nodes
pub struct RouteGarbageCollector<T, N, L> {
    reconciler: Arc<RouteReconciler<T, N>>,
    nodes: L,
    metrics: RouteMetrics,
    interval: Duration,
}

impl<T, N, L> RouteGarbageCollector<T, N, L>
where
    T: RouteTableApi,
    N: NodeAddressResolver,
    L: NodeLister,
{
    pub fn new(
        reconciler: Arc<RouteReconciler<T, N>>,
        nodes: L,
        metrics: RouteMetrics,
        interval: Duration,
    ) -> Self {
        Self {
            reconciler,
            nodes,
            metrics,
            interval,
        }
    }

    pub async fn run(&self) {
        info!("Starting route garbage collection every {:?}", self.interval);

        let mut ticker = tokio::time::interval(self.interval);
        loop {
            ticker.tick().await;

            match self.collect().await {
                Ok(0) => debug!("No orphaned routes"),
                Ok(count) => info!("Removed {} orphaned routes", count),
                Err(e) if e.is_busy() => debug!("Route table busy, garbage collection deferred"),
                Err(e) => error!("Error collecting orphaned routes: {}", e),
            }
        }
    }

    async fn collect(&self) -> Result<usize, ReconcileError> {
        // Routes before nodes: a node owning a listed route already existed
        // when the route was written, so it shows up in the later node list.
        let started = Instant::now();
        let routes = self.reconciler.list_managed_routes().await;
        self.metrics.record("list", started, &routes);
        let routes = routes?;
        self.metrics.managed_routes.set(routes.len() as i64);

        let node_names = self.nodes.node_names().await?;

        let orphaned = orphaned_routes(&routes, &node_names);
        for node_name in &orphaned {
            info!("Node {} is gone, removing its route", node_name);

            let started = Instant::now();
            let result = self.reconciler.remove_route(node_name).await;
            self.metrics.record("remove", started, &result);
            result?;
        }

        Ok(orphaned.len())
    }
}

/// Owners of `routes` that are not in `node_names`, each listed once
fn orphaned_routes<'a>(routes: &'a [ManagedRoute], node_names: &HashSet<String>) -> BTreeSet<&'a str> {
    routes
        .iter()
        .map(|route| route.node_name.as_str())
        .filter(|node_name| !node_names.contains(*node_name))
        .collect()
}
