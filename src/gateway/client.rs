//! Blocking HTTP client for the gateway-management REST API.

use super::{ApiResult, GatewayApi};
use crate::config::ClientConfig;
use crate::error::{Error, ExternalServiceError, Result};
use crate::models::{GatewayDescriptor, IpRange, ProvisionedPool};
use reqwest::blocking::{Client, RequestBuilder, Response};
use reqwest::header::LOCATION;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::net::Ipv4Addr;

/// DHCP configuration document of one gateway.
#[derive(Serialize, Deserialize, Debug, Default)]
#[serde(rename_all = "camelCase")]
struct DhcpConfig {
    #[serde(default)]
    ip_pools: Vec<ProvisionedPool>,
}

#[derive(Serialize, Debug)]
#[serde(rename_all = "camelCase")]
struct NewPool {
    ip_range: IpRange,
    default_gateway: Ipv4Addr,
    subnet_mask: Ipv4Addr,
}

pub struct HttpGatewayClient {
    config: ClientConfig,
    client: Client,
}

impl HttpGatewayClient {
    pub fn new(config: ClientConfig) -> Result<HttpGatewayClient> {
        let client = Client::builder()
            .danger_accept_invalid_certs(config.allow_unverified_ssl)
            .user_agent(config.user_agent.clone())
            .timeout(config.timeout)
            .build()
            .map_err(|e| Error::Config(format!("Error building HTTP client: {e}")))?;
        Ok(HttpGatewayClient { config, client })
    }

    fn edge_url(&self, gateway_id: &str) -> String {
        format!("{}/api/4.0/edges/{gateway_id}", self.config.manager_uri)
    }

    fn pools_url(&self, gateway_id: &str) -> String {
        format!("{}/dhcp/config/ippools", self.edge_url(gateway_id))
    }

    /// Authenticate, send and turn any non-2xx status into an error.
    fn send(&self, operation: &str, request: RequestBuilder) -> ApiResult<Response> {
        let response = request
            .basic_auth(&self.config.user, Some(&self.config.password))
            .send()
            .map_err(|e| ExternalServiceError::Unavailable {
                operation: operation.to_string(),
                detail: e.to_string(),
            })?;
        let status = response.status();
        if status.is_success() {
            log::debug!("{operation}: HTTP {status}");
            return Ok(response);
        }
        let body = response
            .text()
            .unwrap_or_else(|_| "Unknown error".to_string());
        Err(ExternalServiceError::from_status(
            operation,
            status.as_u16(),
            body,
        ))
    }

    fn read_body(operation: &str, response: Response) -> ApiResult<String> {
        response
            .text()
            .map_err(|e| ExternalServiceError::Unavailable {
                operation: operation.to_string(),
                detail: format!("Error reading response body: {e}"),
            })
    }
}

/// Deserialize a response body, naming the JSON path on failure.
fn parse_json<T: DeserializeOwned>(operation: &str, body: &str) -> ApiResult<T> {
    let mut deserializer = serde_json::Deserializer::from_str(body);
    serde_path_to_error::deserialize(&mut deserializer).map_err(|e| {
        log::error!("{operation}: unparsable response:\n\n{body}\n");
        ExternalServiceError::Unavailable {
            operation: operation.to_string(),
            detail: format!("Error parsing JSON: path={} error={}", e.path(), e),
        }
    })
}

/// The new pool's id: last segment of the Location header, else the body.
fn pool_id_from_response(location: Option<&str>, body: &str) -> Option<String> {
    location
        .and_then(|l| l.trim_end_matches('/').rsplit('/').next())
        .filter(|id| !id.is_empty())
        .map(str::to_string)
        .or_else(|| {
            let body = body.trim().trim_matches('"');
            (!body.is_empty()).then(|| body.to_string())
        })
}

impl GatewayApi for HttpGatewayClient {
    fn fetch_gateway(&mut self, gateway_id: &str) -> ApiResult<GatewayDescriptor> {
        let operation = "fetch gateway";
        log::info!("{operation} {gateway_id}");
        let response = self.send(operation, self.client.get(self.edge_url(gateway_id)))?;
        let body = Self::read_body(operation, response)?;
        parse_json(operation, &body)
    }

    fn write_gateway(&mut self, gateway: &GatewayDescriptor) -> ApiResult<()> {
        let operation = "write gateway";
        log::info!("{operation} {}", gateway.id);
        let request = self.client.put(self.edge_url(&gateway.id)).json(gateway);
        self.send(operation, request)?;
        Ok(())
    }

    fn add_pool_entry(
        &mut self,
        gateway_id: &str,
        range: &IpRange,
        default_gateway: Ipv4Addr,
        netmask: Ipv4Addr,
    ) -> ApiResult<String> {
        let operation = "add pool entry";
        log::info!("{operation} {range} on {gateway_id}");
        let body = NewPool {
            ip_range: *range,
            default_gateway,
            subnet_mask: netmask,
        };
        let request = self.client.post(self.pools_url(gateway_id)).json(&body);
        let response = self.send(operation, request)?;
        let location = response
            .headers()
            .get(LOCATION)
            .and_then(|v| v.to_str().ok())
            .map(str::to_string);
        let body = Self::read_body(operation, response)?;
        pool_id_from_response(location.as_deref(), &body).ok_or_else(|| {
            ExternalServiceError::Invalid {
                operation: operation.to_string(),
                detail: format!("no pool id returned for {range}"),
            }
        })
    }

    fn delete_pool_entry(&mut self, gateway_id: &str, pool_id: &str) -> ApiResult<()> {
        let operation = "delete pool entry";
        log::info!("{operation} {pool_id} on {gateway_id}");
        let url = format!("{}/{pool_id}", self.pools_url(gateway_id));
        self.send(operation, self.client.delete(url))?;
        Ok(())
    }

    fn fetch_provisioned_pools(&mut self, gateway_id: &str) -> ApiResult<Vec<ProvisionedPool>> {
        let operation = "fetch provisioned pools";
        log::info!("{operation} {gateway_id}");
        let url = format!("{}/dhcp/config", self.edge_url(gateway_id));
        let response = self.send(operation, self.client.get(url))?;
        let body = Self::read_body(operation, response)?;
        let config: DhcpConfig = parse_json(operation, &body)?;
        Ok(config.ip_pools)
    }
}
