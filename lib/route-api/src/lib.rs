//! Wire types for the cloud VPC route table API
//!
//! This library defines the resources exchanged with the provider:
//! - RouteTable: a VPC route table and its static routes
//! - StaticRoute: a single destination prefix / next hop entry
//! - UpdateRouteTableRequest: whole-table replacement of the static routes
//! - Operation: long-running operation returned by mutating calls

pub mod operation;
pub mod route_table;

pub use operation::{Operation, OperationError};
pub use route_table::{RouteTable, StaticRoute, UpdateRouteTableRequest, STATIC_ROUTES_FIELD_MASK};
