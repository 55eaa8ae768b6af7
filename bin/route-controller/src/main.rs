use anyhow::Result;
use clap::Parser;
use k8s_openapi::api::core::v1::Node;
use kube::{Api, Client};
use route_cloud::{CloudRouteTableClient, KubeNodeResolver};
use route_core::{RouteReconciler, RouteTableLock};
use std::sync::Arc;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

mod config;
mod error;
mod metrics;
mod node_route_controller;
mod route_gc;

use config::{Config, LogFormat};
use metrics::RouteMetrics;
use node_route_controller::NodeRouteController;
use route_gc::RouteGarbageCollector;

#[tokio::main]
async fn main() -> Result<()> {
    let config = Config::parse();
    init_tracing(config.log_format);

    info!("Starting route-controller for route table {}...", config.route_table_id);

    let client = Client::try_default().await?;
    let route_tables = CloudRouteTableClient::new(config.cloud_client_config())?;
    let reconciler = Arc::new(RouteReconciler::new(
        config.route_table_id.clone(),
        route_tables,
        KubeNodeResolver::new(client.clone()),
        RouteTableLock::new(),
    ));

    let metrics = RouteMetrics::new()?;
    info!("Metrics collector initialized");

    let controller = NodeRouteController::new(
        client.clone(),
        reconciler.clone(),
        metrics.clone(),
        &config,
    );
    tokio::spawn(async move {
        if let Err(e) = controller.run().await {
            error!("Node route controller error: {}", e);
        }
    });

    let nodes: Api<Node> = Api::all(client);
    let collector =
        RouteGarbageCollector::new(reconciler, nodes, metrics.clone(), config.sync_period());
    tokio::spawn(async move { collector.run().await });

    let metrics_addr = config.metrics_addr;
    tokio::spawn(async move {
        if let Err(e) = metrics::serve(metrics_addr, metrics).await {
            error!("Metrics server error: {}", e);
        }
    });

    // Keep the process alive
    tokio::signal::ctrl_c().await?;
    info!("Shutdown signal received, exiting...");

    Ok(())
}

fn init_tracing(format: LogFormat) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let subscriber = tracing_subscriber::fmt().with_env_filter(filter);

    match format {
        LogFormat::Text => subscriber.init(),
        LogFormat::Json => subscriber.json().init(),
    }
}
