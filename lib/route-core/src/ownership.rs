//! Ownership labels on static routes

use route_api::StaticRoute;
use std::collections::BTreeMap;

/// Label carrying the name of the node a managed route belongs to.
///
/// The key is shared with every controller version writing to the same table
/// and must not change.
pub const NODE_ROLE_LABEL: &str = "yandex.cpi.flant.com/node-role";

/// A route owned by this controller, as reported to the orchestrator
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ManagedRoute {
    pub node_name: String,
    /// Empty when the provider holds no destination prefix for the route
    pub destination_cidr: String,
}

/// Name of the node owning `route`, or `None` for a foreign route
pub fn owner_of(route: &StaticRoute) -> Option<&str> {
    route.label(NODE_ROLE_LABEL)
}

/// New route for `node_name`, labelled as managed
pub fn managed_route(node_name: &str, destination_cidr: &str, next_hop: &str) -> StaticRoute {
    let labels = BTreeMap::from([(NODE_ROLE_LABEL.to_string(), node_name.to_string())]);
    StaticRoute::new(destination_cidr, next_hop, labels)
}

/// Managed routes in table order; foreign routes are skipped
pub fn managed_routes(routes: &[StaticRoute]) -> Vec<ManagedRoute> {
    routes
        .iter()
        .filter_map(|route| {
            owner_of(route).map(|node_name| ManagedRoute {
                node_name: node_name.to_string(),
                destination_cidr: route.destination_prefix.clone().unwrap_or_default(),
            })
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn foreign(destination: &str) -> StaticRoute {
        StaticRoute {
            destination_prefix: Some(destination.to_string()),
            gateway_id: Some("enpgw".to_string()),
            ..Default::default()
        }
    }

    #[test]
    fn test_owner_of() {
        let route = managed_route("node-a", "192.168.1.0/24", "10.1.1.1");
        assert_eq!(owner_of(&route), Some("node-a"));
        assert_eq!(owner_of(&foreign("10.0.0.0/8")), None);
    }

    #[test]
    fn test_other_labels_do_not_mark_ownership() {
        let mut route = foreign("10.0.0.0/8");
        route.labels = Some(BTreeMap::from([("team".to_string(), "net".to_string())]));
        assert_eq!(owner_of(&route), None);
    }

    #[test]
    fn test_managed_routes_skips_foreign() {
        let mut unset = managed_route("node-c", "", "10.1.1.3");
        unset.destination_prefix = None;
        let routes = vec![
            foreign("10.0.0.0/8"),
            managed_route("node-a", "192.168.1.0/24", "10.1.1.1"),
            unset,
        ];

        assert_eq!(
            managed_routes(&routes),
            vec![
                ManagedRoute {
                    node_name: "node-a".to_string(),
                    destination_cidr: "192.168.1.0/24".to_string(),
                },
                ManagedRoute {
                    node_name: "node-c".to_string(),
                    destination_cidr: String::new(),
                },
            ]
        );
    }
}
