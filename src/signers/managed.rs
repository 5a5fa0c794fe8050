//! Managed (custodial) signing backend.
//!
//! A server holds signing authority and executes calls on behalf of the user.
//! There is no chain-switch concept and batching happens server-side.

use super::{OperationSigner, SignerKind};
use crate::{error::SignerError, error::truncate_for_display, types::PreparedCall};
use alloy::primitives::{Address, B256, Bytes, ChainId, TxHash, U256};
use serde::{Deserialize, Serialize};
use std::time::Duration;
use url::Url;

/// Configuration of the managed signer service.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ManagedSignerConfig {
    /// Service endpoint.
    pub endpoint: Url,
    /// The account the service signs for.
    pub account: Address,
    /// Bearer token authenticating the session.
    pub access_token: String,
    /// Request timeout.
    #[serde(with = "crate::serde::duration")]
    pub request_timeout: Duration,
}

/// A managed signing backend over HTTP.
#[derive(Debug)]
pub struct ManagedSigner {
    client: reqwest::Client,
    config: ManagedSignerConfig,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct ExecuteRequest<'a> {
    #[serde(with = "alloy::serde::quantity")]
    chain_id: ChainId,
    from: Address,
    calls: &'a [WireCall],
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct WireCall {
    target: Address,
    data: Bytes,
    value: U256,
}

impl From<&PreparedCall> for WireCall {
    fn from(call: &PreparedCall) -> Self {
        Self { target: call.target, data: call.data.clone(), value: call.value }
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ExecuteResponse {
    transaction_hash: TxHash,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct SignRequest {
    #[serde(with = "alloy::serde::quantity")]
    chain_id: ChainId,
    from: Address,
    hash: B256,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct SignResponse {
    signature: Bytes,
}

impl ManagedSigner {
    /// Creates a managed backend from its service configuration.
    pub fn new(config: ManagedSignerConfig) -> eyre::Result<Self> {
        let client = reqwest::Client::builder().timeout(config.request_timeout).build()?;
        Ok(Self { client, config })
    }

    fn url(&self, path: &str) -> Url {
        let mut url = self.config.endpoint.clone();
        url.set_path(path);
        url
    }

    async fn post<Req: Serialize, Resp: serde::de::DeserializeOwned>(
        &self,
        path: &str,
        body: &Req,
    ) -> Result<Resp, SignerError> {
        let response = self
            .client
            .post(self.url(path))
            .bearer_auth(&self.config.access_token)
            .json(body)
            .send()
            .await?;

        if !response.status().is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(SignerError::Managed(truncate_for_display(body)));
        }
        Ok(response.json().await?)
    }

    async fn execute(
        &self,
        chain_id: ChainId,
        calls: &[PreparedCall],
    ) -> Result<TxHash, SignerError> {
        let calls: Vec<WireCall> = calls.iter().map(Into::into).collect();
        let request =
            ExecuteRequest { chain_id, from: self.config.account, calls: &calls };
        let response: ExecuteResponse = self.post("/v1/execute", &request).await?;
        Ok(response.transaction_hash)
    }
}

#[async_trait::async_trait]
impl OperationSigner for ManagedSigner {
    fn address(&self) -> Address {
        self.config.account
    }

    fn kind(&self) -> SignerKind {
        SignerKind::Managed
    }

    fn supports_batching(&self) -> bool {
        true
    }

    async fn active_chain(&self) -> Option<ChainId> {
        None
    }

    async fn switch_chain(&self, _chain_id: ChainId) -> Result<(), SignerError> {
        Ok(())
    }

    async fn sign_payload_hash(
        &self,
        chain_id: ChainId,
        payload_hash: B256,
    ) -> Result<Bytes, SignerError> {
        let request =
            SignRequest { chain_id, from: self.config.account, hash: payload_hash };
        let response: SignResponse = self.post("/v1/sign", &request).await?;
        Ok(response.signature)
    }

    async fn send_call(
        &self,
        chain_id: ChainId,
        call: &PreparedCall,
    ) -> Result<TxHash, SignerError> {
        self.execute(chain_id, std::slice::from_ref(call)).await
    }

    async fn send_calls(
        &self,
        chain_id: ChainId,
        calls: &[PreparedCall],
    ) -> Result<TxHash, SignerError> {
        self.execute(chain_id, calls).await
    }
}
