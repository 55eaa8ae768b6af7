//! Read-modify-write cycles against the provider route table

use crate::guard::RouteTableLock;
use crate::merge::{merge_static_routes, RouteMutation};
use crate::ownership::{managed_routes, ManagedRoute};
use crate::{CoreError, Result};
use async_trait::async_trait;
use route_api::{Operation, RouteTable, StaticRoute, UpdateRouteTableRequest};
use tracing::{debug, info};

/// Access to the provider's route tables
#[async_trait]
pub trait RouteTableApi: Send + Sync {
    /// Fetch the current state of a route table
    async fn get(&self, route_table_id: &str) -> Result<RouteTable>;

    /// Submit an update, returning the operation tracking it
    async fn update(
        &self,
        route_table_id: &str,
        request: UpdateRouteTableRequest,
    ) -> Result<Operation>;

    /// Wait until `operation` is done and return its final state
    async fn wait(&self, operation: Operation) -> Result<Operation>;
}

/// Node inventory lookup
#[async_trait]
pub trait NodeAddressResolver: Send + Sync {
    /// InternalIP of `node_name`
    async fn internal_address(&self, node_name: &str) -> Result<String>;
}

/// RouteReconciler keeps one managed route per node in a provider route table
///
/// Every operation holds the route table lock for its whole cycle and fails
/// with `CoreError::Busy` instead of waiting when another one is in flight.
pub struct RouteReconciler<T, N> {
    route_table_id: String,
    route_tables: T,
    nodes: N,
    lock: RouteTableLock,
}

impl<T, N> RouteReconciler<T, N>
where
    T: RouteTableApi,
    N: NodeAddressResolver,
{
    pub fn new(
        route_table_id: impl Into<String>,
        route_tables: T,
        nodes: N,
        lock: RouteTableLock,
    ) -> Self {
        Self {
            route_table_id: route_table_id.into(),
            route_tables,
            nodes,
            lock,
        }
    }

    pub fn route_table_id(&self) -> &str {
        &self.route_table_id
    }

    /// Routes owned by this controller, in table order
    pub async fn list_managed_routes(&self) -> Result<Vec<ManagedRoute>> {
        info!("Listing managed routes in route table {}", self.route_table_id);

        let _guard = self.lock.try_acquire(&self.route_table_id)?;
        let table = self.route_tables.get(&self.route_table_id).await?;

        Ok(managed_routes(&table.static_routes))
    }

    /// Point `destination_cidr` at the InternalIP of `node_name`, replacing
    /// any previous route for that node
    pub async fn add_or_update_route(&self, node_name: &str, destination_cidr: &str) -> Result<()> {
        info!(
            "Adding or updating route {} for node {} in route table {}",
            destination_cidr, node_name, self.route_table_id
        );

        let _guard = self.lock.try_acquire(&self.route_table_id)?;
        let table = self.route_tables.get(&self.route_table_id).await?;
        let next_hop = self.nodes.internal_address(node_name).await?;

        let static_routes = merge_static_routes(
            &table.static_routes,
            &[RouteMutation::add_or_update(node_name, destination_cidr, next_hop)],
        );
        self.replace_static_routes(static_routes).await
    }

    /// Drop the route of `node_name`, if any
    pub async fn remove_route(&self, node_name: &str) -> Result<()> {
        info!(
            "Removing route for node {} from route table {}",
            node_name, self.route_table_id
        );

        let _guard = self.lock.try_acquire(&self.route_table_id)?;
        let table = self.route_tables.get(&self.route_table_id).await?;

        let static_routes =
            merge_static_routes(&table.static_routes, &[RouteMutation::remove(node_name)]);
        self.replace_static_routes(static_routes).await
    }

    async fn replace_static_routes(&self, static_routes: Vec<StaticRoute>) -> Result<()> {
        debug!(
            "Submitting {} static routes to route table {}",
            static_routes.len(),
            self.route_table_id
        );

        let request = UpdateRouteTableRequest::static_routes(static_routes);
        let operation = self
            .route_tables
            .update(&self.route_table_id, request)
            .await?;
        let operation = self.route_tables.wait(operation).await?;

        match operation.error {
            Some(error) => Err(CoreError::OperationFailed {
                id: operation.id,
                code: error.code,
                message: error.message,
            }),
            None => {
                debug!("Operation {} finished", operation.id);
                Ok(())
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ownership::{managed_route, owner_of};
    use route_api::OperationError;
    use std::collections::HashMap;
    use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
    use std::sync::{Arc, Mutex};
    use tokio::sync::Notify;

    #[derive(Default)]
    struct TableState {
        table: Mutex<RouteTable>,
        gets: AtomicUsize,
        updates: Mutex<Vec<UpdateRouteTableRequest>>,
        fail_next_get: AtomicBool,
        operation_error: Mutex<Option<OperationError>>,
        hold_get: Mutex<Option<(Arc<Notify>, Arc<Notify>)>>,
    }

    #[derive(Clone, Default)]
    struct FakeRouteTables {
        state: Arc<TableState>,
    }

    impl FakeRouteTables {
        fn with_routes(static_routes: Vec<StaticRoute>) -> Self {
            let fake = Self::default();
            *fake.state.table.lock().unwrap() = RouteTable {
                id: "rt1".to_string(),
                static_routes,
                ..Default::default()
            };
            fake
        }

        fn routes(&self) -> Vec<StaticRoute> {
            self.state.table.lock().unwrap().static_routes.clone()
        }

        fn gets(&self) -> usize {
            self.state.gets.load(Ordering::SeqCst)
        }

        fn updates(&self) -> usize {
            self.state.updates.lock().unwrap().len()
        }

        /// Park the next `get` until `release` is notified; `entered` fires once parked
        fn hold_next_get(&self) -> (Arc<Notify>, Arc<Notify>) {
            let entered = Arc::new(Notify::new());
            let release = Arc::new(Notify::new());
            *self.state.hold_get.lock().unwrap() = Some((entered.clone(), release.clone()));
            (entered, release)
        }
    }

    #[async_trait]
    impl RouteTableApi for FakeRouteTables {
        async fn get(&self, route_table_id: &str) -> Result<RouteTable> {
            assert_eq!(route_table_id, "rt1");
            self.state.gets.fetch_add(1, Ordering::SeqCst);

            let hold = self.state.hold_get.lock().unwrap().take();
            if let Some((entered, release)) = hold {
                entered.notify_one();
                release.notified().await;
            }

            if self.state.fail_next_get.swap(false, Ordering::SeqCst) {
                return Err(anyhow::anyhow!("connection reset by peer").into());
            }
            Ok(self.state.table.lock().unwrap().clone())
        }

        async fn update(
            &self,
            route_table_id: &str,
            request: UpdateRouteTableRequest,
        ) -> Result<Operation> {
            assert_eq!(route_table_id, "rt1");
            assert_eq!(request.update_mask, "staticRoutes");
            self.state.table.lock().unwrap().static_routes = request.static_routes.clone();
            self.state.updates.lock().unwrap().push(request);
            Ok(Operation {
                id: "op1".to_string(),
                ..Default::default()
            })
        }

        async fn wait(&self, mut operation: Operation) -> Result<Operation> {
            operation.done = true;
            operation.error = self.state.operation_error.lock().unwrap().clone();
            Ok(operation)
        }
    }

    struct FakeNodes(HashMap<String, String>);

    #[async_trait]
    impl NodeAddressResolver for FakeNodes {
        async fn internal_address(&self, node_name: &str) -> Result<String> {
            self.0
                .get(node_name)
                .cloned()
                .ok_or_else(|| CoreError::NoInternalAddress(node_name.to_string()))
        }
    }

    fn foreign() -> StaticRoute {
        StaticRoute {
            destination_prefix: Some("10.0.0.0/8".to_string()),
            gateway_id: Some("enpgw".to_string()),
            ..Default::default()
        }
    }

    fn setup() -> (FakeRouteTables, RouteReconciler<FakeRouteTables, FakeNodes>) {
        let tables = FakeRouteTables::with_routes(vec![
            foreign(),
            managed_route("a", "192.168.1.0/24", "10.1.1.1"),
        ]);
        let nodes = FakeNodes(HashMap::from([
            ("a".to_string(), "10.1.1.1".to_string()),
            ("b".to_string(), "10.1.1.2".to_string()),
        ]));
        let reconciler = RouteReconciler::new("rt1", tables.clone(), nodes, RouteTableLock::new());
        (tables, reconciler)
    }

    #[tokio::test]
    async fn test_list_managed_routes() {
        let (_, reconciler) = setup();

        let routes = reconciler.list_managed_routes().await.unwrap();

        assert_eq!(
            routes,
            vec![ManagedRoute {
                node_name: "a".to_string(),
                destination_cidr: "192.168.1.0/24".to_string(),
            }]
        );
    }

    #[tokio::test]
    async fn test_add_route_for_new_node() {
        let (tables, reconciler) = setup();

        reconciler
            .add_or_update_route("b", "192.168.2.0/24")
            .await
            .unwrap();

        assert_eq!(
            tables.routes(),
            vec![
                foreign(),
                managed_route("a", "192.168.1.0/24", "10.1.1.1"),
                managed_route("b", "192.168.2.0/24", "10.1.1.2"),
            ]
        );
    }

    #[tokio::test]
    async fn test_add_route_twice() {
        let (tables, reconciler) = setup();

        reconciler.add_or_update_route("b", "192.168.2.0/24").await.unwrap();
        let once = tables.routes();
        reconciler.add_or_update_route("b", "192.168.2.0/24").await.unwrap();

        assert_eq!(tables.routes(), once);
        assert_eq!(tables.updates(), 2);
    }

    #[tokio::test]
    async fn test_remove_route() {
        let (tables, reconciler) = setup();

        reconciler.remove_route("a").await.unwrap();

        assert_eq!(tables.routes(), vec![foreign()]);
        assert!(tables.routes().iter().all(|route| owner_of(route).is_none()));
    }

    #[tokio::test]
    async fn test_missing_address_submits_nothing() {
        let (tables, reconciler) = setup();

        let err = reconciler
            .add_or_update_route("ghost", "192.168.9.0/24")
            .await
            .unwrap_err();

        assert!(matches!(err, CoreError::NoInternalAddress(ref node) if node == "ghost"));
        assert_eq!(tables.updates(), 0);
        assert!(!reconciler.lock.is_locked());
    }

    #[tokio::test]
    async fn test_operation_error_is_surfaced() {
        let (tables, reconciler) = setup();
        *tables.state.operation_error.lock().unwrap() = Some(OperationError {
            code: 9,
            message: "route table is being modified".to_string(),
            details: vec![],
        });

        let err = reconciler.remove_route("a").await.unwrap_err();

        match err {
            CoreError::OperationFailed { id, code, message } => {
                assert_eq!(id, "op1");
                assert_eq!(code, 9);
                assert_eq!(message, "route table is being modified");
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[tokio::test]
    async fn test_transport_error_releases_lock() {
        let (tables, reconciler) = setup();
        tables.state.fail_next_get.store(true, Ordering::SeqCst);

        let err = reconciler.list_managed_routes().await.unwrap_err();
        assert_eq!(err.to_string(), "connection reset by peer");

        assert!(reconciler.list_managed_routes().await.is_ok());
    }

    #[tokio::test]
    async fn test_concurrent_call_is_busy() {
        let (tables, reconciler) = setup();
        let reconciler = Arc::new(reconciler);
        let (entered, release) = tables.hold_next_get();

        let first = tokio::spawn({
            let reconciler = reconciler.clone();
            async move { reconciler.add_or_update_route("b", "192.168.2.0/24").await }
        });
        entered.notified().await;

        let err = reconciler.remove_route("a").await.unwrap_err();
        assert!(err.is_busy());
        assert_eq!(tables.gets(), 1);
        assert_eq!(tables.updates(), 0);

        release.notify_one();
        first.await.unwrap().unwrap();
        assert_eq!(tables.updates(), 1);
    }

    #[tokio::test]
    async fn test_cancelled_call_releases_lock() {
        let (tables, reconciler) = setup();
        let reconciler = Arc::new(reconciler);
        let (entered, _release) = tables.hold_next_get();

        let first = tokio::spawn({
            let reconciler = reconciler.clone();
            async move { reconciler.remove_route("a").await }
        });
        entered.notified().await;
        assert!(reconciler.lock.is_locked());

        first.abort();
        assert!(first.await.unwrap_err().is_cancelled());

        assert!(!reconciler.lock.is_locked());
        assert_eq!(reconciler.list_managed_routes().await.unwrap().len(), 1);
        assert_eq!(tables.updates(), 0);
    }
}
