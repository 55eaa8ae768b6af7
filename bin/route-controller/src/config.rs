//! Command line and environment configuration

use clap::{Parser, ValueEnum};
use route_cloud::CloudClientConfig;
use std::net::SocketAddr;
use std::time::Duration;

/// Keeps the cloud VPC route table in sync with the pod CIDRs of cluster nodes
#[derive(Parser, Debug, Clone)]
#[command(name = "route-controller")]
#[command(author, version, about, long_about = None)]
pub struct Config {
    /// Route table holding the node routes
    #[arg(long, env = "ROUTE_TABLE_ID")]
    pub route_table_id: String,

    /// IAM token used to authenticate against the cloud API
    #[arg(long, env = "CLOUD_IAM_TOKEN", hide_env_values = true)]
    pub iam_token: String,

    /// VPC API endpoint
    #[arg(long, default_value = "https://vpc.api.cloud.yandex.net", env = "CLOUD_VPC_ENDPOINT")]
    pub vpc_endpoint: String,

    /// Operation API endpoint
    #[arg(
        long,
        default_value = "https://operation.api.cloud.yandex.net",
        env = "CLOUD_OPERATION_ENDPOINT"
    )]
    pub operation_endpoint: String,

    /// Seconds between two full syncs of a node and of the garbage collector
    #[arg(long, default_value = "60", env = "ROUTE_SYNC_PERIOD", value_parser = seconds())]
    pub sync_period: u64,

    /// Seconds before retrying a node whose reconciliation failed
    #[arg(long, default_value = "30", env = "ROUTE_ERROR_REQUEUE", value_parser = seconds())]
    pub error_requeue: u64,

    /// Seconds before retrying a node rejected because the route table was busy
    #[arg(long, default_value = "5", env = "ROUTE_BUSY_REQUEUE", value_parser = seconds())]
    pub busy_requeue: u64,

    /// Nodes reconciled at the same time
    #[arg(long, default_value = "1", env = "RECONCILE_CONCURRENCY")]
    pub concurrency: u16,

    /// Timeout of a single cloud API request in seconds
    #[arg(long, default_value = "30", env = "REQUEST_TIMEOUT", value_parser = seconds())]
    pub request_timeout: u64,

    /// Seconds between polls of a running operation
    #[arg(long, default_value = "1", env = "OPERATION_POLL_INTERVAL", value_parser = seconds())]
    pub operation_poll_interval: u64,

    /// Seconds to wait for a route table update to finish
    #[arg(long, default_value = "300", env = "OPERATION_TIMEOUT", value_parser = seconds())]
    pub operation_timeout: u64,

    /// Address of the metrics and health endpoint
    #[arg(long, default_value = "0.0.0.0:9100", env = "METRICS_ADDR")]
    pub metrics_addr: SocketAddr,

    /// Log output format
    #[arg(long, value_enum, default_value_t = LogFormat::Text, env = "LOG_FORMAT")]
    pub log_format: LogFormat,
}

#[derive(ValueEnum, Clone, Copy, Debug, PartialEq, Eq)]
pub enum LogFormat {
    Text,
    Json,
}

/// Whole seconds, at least one
fn seconds() -> clap::builder::RangedU64ValueParser<u64> {
    clap::value_parser!(u64).range(1..)
}

impl Config {
    pub fn cloud_client_config(&self) -> CloudClientConfig {
        CloudClientConfig {
            vpc_endpoint: self.vpc_endpoint.clone(),
            operation_endpoint: self.operation_endpoint.clone(),
            iam_token: self.iam_token.clone(),
            request_timeout: Duration::from_secs(self.request_timeout),
            poll_interval: Duration::from_secs(self.operation_poll_interval),
            operation_timeout: Duration::from_secs(self.operation_timeout),
        }
    }

    pub fn sync_period(&self) -> Duration {
        Duration::from_secs(self.sync_period)
    }

    pub fn error_requeue(&self) -> Duration {
        Duration::from_secs(self.error_requeue)
    }

    pub fn busy_requeue(&self) -> Duration {
        Duration::from_secs(self.busy_requeue)
    }
}
