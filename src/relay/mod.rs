//! Bundling relay client.
//!
//! The relay is an external service that accepts a multi-chain operation
//! description, quotes which chains can cover the aggregate gas, and
//! executes/gas-sponsors the bundle across chains, reporting per-chain status
//! back. This module only speaks its HTTP surface; the relay itself is a
//! remote dependency.

use crate::{
    config::RelayConfig,
    error::{RelayClientError, truncate_for_display},
    types::relay::{RelayBundle, RelayBundleRequest, RelayBundleStatus},
};
use alloy::primitives::ChainId;
use serde::Serialize;
use std::fmt;
use tracing::trace;
use url::Url;

/// Client surface of the bundling relay.
///
/// Behind a trait so tests can drive the coordinator against an in-memory
/// relay.
#[async_trait::async_trait]
pub trait RelayApi: fmt::Debug + Send + Sync {
    /// Creates a bundle and returns its payment options.
    async fn create_bundle(
        &self,
        request: &RelayBundleRequest,
    ) -> Result<RelayBundle, RelayClientError>;

    /// Starts bundle execution, paying aggregate gas from the given chain.
    async fn start_bundle(
        &self,
        bundle_uuid: &str,
        payment_chain: ChainId,
    ) -> Result<(), RelayClientError>;

    /// Fetches the bundle's per-chain status.
    async fn bundle_status(&self, bundle_uuid: &str)
    -> Result<RelayBundleStatus, RelayClientError>;
}

/// HTTP client for the bundling relay.
#[derive(Debug)]
pub struct HttpRelayClient {
    client: reqwest::Client,
    endpoint: Url,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct StartBundleRequest {
    #[serde(with = "alloy::serde::quantity")]
    payment_chain_id: ChainId,
}

impl HttpRelayClient {
    /// Creates a relay client from its configuration.
    pub fn new(config: &RelayConfig) -> eyre::Result<Self> {
        let client = reqwest::Client::builder().timeout(config.request_timeout).build()?;
        Ok(Self { client, endpoint: config.endpoint.clone() })
    }

    fn url(&self, path: &str) -> Url {
        let mut url = self.endpoint.clone();
        url.set_path(path);
        url
    }

    async fn decode<T: serde::de::DeserializeOwned>(
        response: reqwest::Response,
    ) -> Result<T, RelayClientError> {
        let status = response.status();
        let body = response.text().await?;
        trace!(%status, body_len = body.len(), "relay response");
        if !status.is_success() {
            return Err(RelayClientError::Status {
                status: status.as_u16(),
                body: truncate_for_display(body),
            });
        }
        Ok(serde_json::from_str(&body)?)
    }
}

#[async_trait::async_trait]
impl RelayApi for HttpRelayClient {
    async fn create_bundle(
        &self,
        request: &RelayBundleRequest,
    ) -> Result<RelayBundle, RelayClientError> {
        let response = self.client.post(self.url("/v1/bundles")).json(request).send().await?;
        Self::decode(response).await
    }

    async fn start_bundle(
        &self,
        bundle_uuid: &str,
        payment_chain: ChainId,
    ) -> Result<(), RelayClientError> {
        let response = self
            .client
            .post(self.url(&format!("/v1/bundles/{bundle_uuid}/start")))
            .json(&StartBundleRequest { payment_chain_id: payment_chain })
            .send()
            .await?;
        let status = response.status();
        if status == reqwest::StatusCode::NOT_FOUND {
            return Err(RelayClientError::UnknownBundle(bundle_uuid.to_string()));
        }
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(RelayClientError::Status {
                status: status.as_u16(),
                body: truncate_for_display(body),
            });
        }
        Ok(())
    }

    async fn bundle_status(
        &self,
        bundle_uuid: &str,
    ) -> Result<RelayBundleStatus, RelayClientError> {
        let response =
            self.client.get(self.url(&format!("/v1/bundles/{bundle_uuid}"))).send().await?;
        if response.status() == reqwest::StatusCode::NOT_FOUND {
            return Err(RelayClientError::UnknownBundle(bundle_uuid.to_string()));
        }
        Self::decode(response).await
    }
}
