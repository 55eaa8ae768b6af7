//! Node controller keeping one route per node in the cloud route table

use crate::config::Config;
use crate::error::ReconcileError;
use crate::metrics::RouteMetrics;
use chrono::{DateTime, Utc};
use futures::StreamExt;
use k8s_openapi::api::core::v1::Node;
use kube::api::{Patch, PatchParams};
use kube::{Api, Client, ResourceExt};
use kube_runtime::controller::{self, Action};
use kube_runtime::Controller;
use route_cloud::{CloudRouteTableClient, KubeNodeResolver};
use route_core::{ManagedRoute, RouteReconciler};
use serde_json::{json, Value};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, error, info, warn};

pub type CloudRouteReconciler = RouteReconciler<CloudRouteTableClient, KubeNodeResolver>;

const NETWORK_UNAVAILABLE: &str = "NetworkUnavailable";

struct Context {
    client: Client,
    reconciler: Arc<CloudRouteReconciler>,
    metrics: RouteMetrics,
    sync_period: Duration,
    error_requeue: Duration,
    busy_requeue: Duration,
}

pub struct NodeRouteController {
    ctx: Arc<Context>,
    concurrency: u16,
}

impl NodeRouteController {
    pub fn new(
        client: Client,
        reconciler: Arc<CloudRouteReconciler>,
        metrics: RouteMetrics,
        config: &Config,
    ) -> Self {
        let ctx = Arc::new(Context {
            client,
            reconciler,
            metrics,
            sync_period: config.sync_period(),
            error_requeue: config.error_requeue(),
            busy_requeue: config.busy_requeue(),
        });
        Self {
            ctx,
            concurrency: config.concurrency,
        }
    }

    pub async fn run(&self) -> anyhow::Result<()> {
        info!("Starting Node route reconciliation");

        let nodes: Api<Node> = Api::all(self.ctx.client.clone());

        let mut stream = Controller::new(nodes, Default::default())
            .with_config(controller::Config::default().concurrency(self.concurrency))
            .run(reconcile, error_policy, self.ctx.clone())
            .boxed();

        while let Some(item) = stream.next().await {
            match item {
                Ok((node, _)) => debug!("Reconciled Node {}", node.name),
                Err(e) => error!("Error in reconciliation stream: {}", e),
            }
        }

        Ok(())
    }
}

async fn reconcile(node: Arc<Node>, ctx: Arc<Context>) -> Result<Action, ReconcileError> {
    let name = node.name_any();

    if node.metadata.deletion_timestamp.is_some() {
        debug!("Node {} is being deleted, leaving its route to the garbage collector", name);
        return Ok(Action::await_change());
    }

    let Some(pod_cidr) = pod_cidr(&node) else {
        debug!("Node {} has no podCIDR yet", name);
        return Ok(Action::await_change());
    };

    let started = Instant::now();
    let routes = ctx.reconciler.list_managed_routes().await;
    ctx.metrics.record("list", started, &routes);
    let routes = routes?;
    ctx.metrics.managed_routes.set(routes.len() as i64);

    if needs_route(&name, pod_cidr, &routes) {
        let started = Instant::now();
        let result = ctx.reconciler.add_or_update_route(&name, pod_cidr).await;
        ctx.metrics.record("add_or_update", started, &result);
        result?;
        info!("Route {} via node {} is in place", pod_cidr, name);
    }

    if network_unavailable(&node) {
        let nodes: Api<Node> = Api::all(ctx.client.clone());
        nodes
            .patch_status(
                &name,
                &PatchParams::default(),
                &Patch::Strategic(network_available_patch(Utc::now())),
            )
            .await?;
        info!("Marked network available on node {}", name);
    }

    Ok(Action::requeue(ctx.sync_period))
}

fn error_policy(node: Arc<Node>, err: &ReconcileError, ctx: Arc<Context>) -> Action {
    if err.is_busy() {
        debug!("Route table busy while reconciling Node {}, retrying", node.name_any());
        return Action::requeue(ctx.busy_requeue);
    }

    warn!("Error reconciling Node {}: {}", node.name_any(), err);
    Action::requeue(ctx.error_requeue)
}

fn pod_cidr(node: &Node) -> Option<&str> {
    node.spec
        .as_ref()?
        .pod_cidr
        .as_deref()
        .filter(|cidr| !cidr.is_empty())
}

/// Whether the route of `node_name` is missing or points at another prefix
fn needs_route(node_name: &str, pod_cidr: &str, routes: &[ManagedRoute]) -> bool {
    !routes
        .iter()
        .any(|route| route.node_name == node_name && route.destination_cidr == pod_cidr)
}

fn network_unavailable(node: &Node) -> bool {
    node.status
        .as_ref()
        .and_then(|status| status.conditions.as_ref())
        .and_then(|conditions| {
            conditions
                .iter()
                .find(|condition| condition.type_ == NETWORK_UNAVAILABLE)
        })
        .map_or(true, |condition| condition.status != "False")
}

fn network_available_patch(now: DateTime<Utc>) -> Value {
    let now = now.to_rfc3339();
    json!({
        "status": {
            "conditions": [{
                "type": NETWORK_UNAVAILABLE,
                "status": "False",
                "reason": "RouteCreated",
                "message": "route-controller created a route",
                "lastTransitionTime": now,
                "lastHeartbeatTime": now,
            }]
        }
    })
}
