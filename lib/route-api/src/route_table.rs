use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::BTreeMap;

/// Field mask selecting only the static routes of a route table for update
pub const STATIC_ROUTES_FIELD_MASK: &str = "staticRoutes";

/// RouteTable as returned by the VPC API
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RouteTable {
    /// Route table identifier
    pub id: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub folder_id: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created_at: Option<DateTime<Utc>>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,

    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub labels: BTreeMap<String, String>,

    /// Network this table is attached to
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub network_id: Option<String>,

    /// Static routes, in the order the provider stores them
    #[serde(default)]
    pub static_routes: Vec<StaticRoute>,
}

/// A single static route entry
///
/// Fields the controller does not know about are kept in `extra` so that a
/// route written by somebody else goes back to the provider unchanged.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StaticRoute {
    /// Destination CIDR, passed through as-is
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub destination_prefix: Option<String>,

    /// Next hop IP address
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub next_hop_address: Option<String>,

    /// Next hop gateway (routes not created by this controller)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub gateway_id: Option<String>,

    /// Route labels; `None` and an empty map are kept distinct
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub labels: Option<BTreeMap<String, String>>,

    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl StaticRoute {
    /// Build a route to `destination` via `next_hop` carrying `labels`
    pub fn new(
        destination: impl Into<String>,
        next_hop: impl Into<String>,
        labels: BTreeMap<String, String>,
    ) -> Self {
        Self {
            destination_prefix: Some(destination.into()),
            next_hop_address: Some(next_hop.into()),
            gateway_id: None,
            labels: Some(labels),
            extra: Map::new(),
        }
    }

    /// Look up a label value
    pub fn label(&self, key: &str) -> Option<&str> {
        self.labels
            .as_ref()
            .and_then(|labels| labels.get(key))
            .map(String::as_str)
    }
}

/// Body of a route table PATCH replacing the static routes
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateRouteTableRequest {
    /// Comma separated list of fields to update
    pub update_mask: String,

    /// The complete new list of static routes
    pub static_routes: Vec<StaticRoute>,
}

impl UpdateRouteTableRequest {
    /// Replace the static routes and nothing else
    pub fn static_routes(static_routes: Vec<StaticRoute>) -> Self {
        Self {
            update_mask: STATIC_ROUTES_FIELD_MASK.to_string(),
            static_routes,
        }
    }
}
