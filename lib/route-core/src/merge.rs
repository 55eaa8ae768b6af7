//! Computing the new static route list from the current one and a set of mutations

use crate::ownership::{managed_route, owner_of};
use route_api::StaticRoute;
use std::collections::HashSet;
use tracing::{info, warn};

/// Requested change to the managed route of one node
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum RouteMutation {
    /// A managed route for `node` must point `destination_cidr` at `next_hop`
    AddOrUpdate {
        node: String,
        destination_cidr: String,
        next_hop: String,
    },
    /// No managed route for `node` may remain
    Remove { node: String },
}

impl RouteMutation {
    pub fn add_or_update(
        node: impl Into<String>,
        destination_cidr: impl Into<String>,
        next_hop: impl Into<String>,
    ) -> Self {
        RouteMutation::AddOrUpdate {
            node: node.into(),
            destination_cidr: destination_cidr.into(),
            next_hop: next_hop.into(),
        }
    }

    pub fn remove(node: impl Into<String>) -> Self {
        RouteMutation::Remove { node: node.into() }
    }

    /// Node the mutation applies to
    pub fn node(&self) -> &str {
        match self {
            RouteMutation::AddOrUpdate { node, .. } | RouteMutation::Remove { node } => node,
        }
    }
}

/// Apply `mutations` to `existing` and return the complete new route list.
///
/// Foreign routes are copied unchanged and keep their relative order. A
/// managed route is rewritten in place, dropped, or copied depending on the
/// mutation for its node; nodes added for the first time are appended at the
/// end. Only the first mutation naming a node is honoured.
pub fn merge_static_routes(
    existing: &[StaticRoute],
    mutations: &[RouteMutation],
) -> Vec<StaticRoute> {
    let mutations = first_per_node(mutations);
    let mut updated: HashSet<&str> = HashSet::new();
    let mut merged = Vec::with_capacity(existing.len() + mutations.len());

    for route in existing {
        let Some(node) = owner_of(route) else {
            merged.push(route.clone());
            continue;
        };

        match mutations.iter().find(|mutation| mutation.node() == node) {
            Some(RouteMutation::AddOrUpdate {
                node,
                destination_cidr,
                next_hop,
            }) => {
                if !updated.insert(node.as_str()) {
                    warn!("Dropping duplicate managed route {:?} for node {}", route, node);
                    continue;
                }
                let labels = route.labels.clone().unwrap_or_default();
                merged.push(StaticRoute::new(
                    destination_cidr.as_str(),
                    next_hop.as_str(),
                    labels,
                ));
            }
            Some(RouteMutation::Remove { .. }) => {
                info!("Removing static route {:?}", route);
            }
            None => merged.push(route.clone()),
        }
    }

    for mutation in &mutations {
        if let RouteMutation::AddOrUpdate {
            node,
            destination_cidr,
            next_hop,
        } = mutation
        {
            if !updated.contains(node.as_str()) {
                merged.push(managed_route(node, destination_cidr, next_hop));
            }
        }
    }

    merged
}

/// Keep the first mutation for every node, in request order
fn first_per_node(mutations: &[RouteMutation]) -> Vec<&RouteMutation> {
    let mut seen = HashSet::new();
    mutations
        .iter()
        .filter(|mutation| {
            let first = seen.insert(mutation.node());
            if !first {
                warn!("Ignoring conflicting route mutation {:?}", mutation);
            }
            first
        })
        .collect()
}
