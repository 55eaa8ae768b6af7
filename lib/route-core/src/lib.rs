//! Route table reconciliation engine
//!
//! This library provides:
//! - Ownership filter telling managed routes apart from foreign ones
//! - Merge algorithm computing the complete route list after a mutation
//! - Serialization guard around whole-table read-modify-write cycles
//! - RouteReconciler tying the above to the provider and node inventory

pub mod error;
pub mod guard;
pub mod merge;
pub mod ownership;
pub mod reconciler;

pub use error::{CoreError, Result};
pub use guard::{RouteTableGuard, RouteTableLock};
pub use merge::{merge_static_routes, RouteMutation};
pub use ownership::{owner_of, ManagedRoute, NODE_ROLE_LABEL};
pub use reconciler::{NodeAddressResolver, RouteReconciler, RouteTableApi};
