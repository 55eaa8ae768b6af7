//! REST client for VPC route tables and their operations

use crate::CloudError;
use async_trait::async_trait;
use reqwest::RequestBuilder;
use route_api::{Operation, RouteTable, UpdateRouteTableRequest};
use route_core::RouteTableApi;
use serde::de::DeserializeOwned;
use std::time::Duration;
use tracing::debug;

/// Endpoints, credentials and timings of the cloud API
#[derive(Clone, Debug)]
pub struct CloudClientConfig {
    /// Base URL of the VPC service
    pub vpc_endpoint: String,
    /// Base URL of the operation service
    pub operation_endpoint: String,
    /// Bearer token sent with every request
    pub iam_token: String,
    /// Timeout of a single HTTP request
    pub request_timeout: Duration,
    /// Delay between two polls of a running operation
    pub poll_interval: Duration,
    /// Upper bound for waiting on one operation
    pub operation_timeout: Duration,
}

impl Default for CloudClientConfig {
    fn default() -> Self {
        Self {
            vpc_endpoint: "https://vpc.api.cloud.yandex.net".to_string(),
            operation_endpoint: "https://operation.api.cloud.yandex.net".to_string(),
            iam_token: String::new(),
            request_timeout: Duration::from_secs(30),
            poll_interval: Duration::from_secs(1),
            operation_timeout: Duration::from_secs(300),
        }
    }
}

/// CloudRouteTableClient talks to the VPC route table API over HTTPS
pub struct CloudRouteTableClient {
    http: reqwest::Client,
    config: CloudClientConfig,
}

impl CloudRouteTableClient {
    /// Create a new client
    pub fn new(config: CloudClientConfig) -> Result<Self, CloudError> {
        let http = reqwest::Client::builder()
            .timeout(config.request_timeout)
            .build()?;
        Ok(Self { http, config })
    }

    fn route_table_url(&self, route_table_id: &str) -> String {
        format!(
            "{}/vpc/v1/routeTables/{}",
            self.config.vpc_endpoint.trim_end_matches('/'),
            route_table_id
        )
    }

    fn operation_url(&self, operation_id: &str) -> String {
        format!(
            "{}/operations/{}",
            self.config.operation_endpoint.trim_end_matches('/'),
            operation_id
        )
    }

    async fn send<R: DeserializeOwned>(&self, request: RequestBuilder) -> Result<R, CloudError> {
        let response = request.bearer_auth(&self.config.iam_token).send().await?;

        let status = response.status();
        if !status.is_success() {
            return Err(CloudError::Api {
                status: status.as_u16(),
                body: error_body(response.text().await),
            });
        }

        Ok(response.json().await?)
    }

    /// GET a route table
    pub async fn get_route_table(&self, route_table_id: &str) -> Result<RouteTable, CloudError> {
        let table: RouteTable = self
            .send(self.http.get(self.route_table_url(route_table_id)))
            .await?;

        debug!(
            "Fetched route table {} with {} static routes",
            route_table_id,
            table.static_routes.len()
        );
        Ok(table)
    }

    /// PATCH a route table
    pub async fn update_route_table(
        &self,
        route_table_id: &str,
        request: &UpdateRouteTableRequest,
    ) -> Result<Operation, CloudError> {
        let operation: Operation = self
            .send(self.http.patch(self.route_table_url(route_table_id)).json(request))
            .await?;

        debug!(
            "Route table {} update started as operation {}",
            route_table_id, operation.id
        );
        Ok(operation)
    }

    /// GET the current state of an operation
    pub async fn get_operation(&self, operation_id: &str) -> Result<Operation, CloudError> {
        self.send(self.http.get(self.operation_url(operation_id)))
            .await
    }

    /// Poll `operation` until it is done or the operation timeout elapses
    pub async fn wait_operation(&self, operation: Operation) -> Result<Operation, CloudError> {
        let operation_id = operation.id.clone();

        let poll = async {
            let mut operation = operation;
            while !operation.done {
                tokio::time::sleep(self.config.poll_interval).await;
                operation = self.get_operation(&operation.id).await?;
                debug!("Operation {} done: {}", operation.id, operation.done);
            }
            Ok::<_, CloudError>(operation)
        };

        tokio::time::timeout(self.config.operation_timeout, poll)
            .await
            .map_err(|_| CloudError::OperationTimeout(operation_id))?
    }
}

/// Body of a failed response, or a note why it could not be read
fn error_body<E: std::fmt::Display>(body: Result<String, E>) -> String {
    body.unwrap_or_else(|e| {
        debug!("Failed to read error response body: {}", e);
        format!("<unreadable body: {}>", e)
    })
}

#[async_trait]
impl RouteTableApi for CloudRouteTableClient {
    async fn get(&self, route_table_id: &str) -> route_core::Result<RouteTable> {
        Ok(self.get_route_table(route_table_id).await?)
    }

    async fn update(
        &self,
        route_table_id: &str,
        request: UpdateRouteTableRequest,
    ) -> route_core::Result<Operation> {
        Ok(self.update_route_table(route_table_id, &request).await?)
    }

    async fn wait(&self, operation: Operation) -> route_core::Result<Operation> {
        Ok(self.wait_operation(operation).await?)
    }
}
