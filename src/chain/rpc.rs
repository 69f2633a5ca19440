//! JSON-RPC client for a live node
//!
//! Speaks JSON-RPC 2.0 over HTTP. Storage reads go through
//! `state_getStorage`; calls are signed by the external signer and sent
//! with `author_submitExtrinsic`.

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::common::config::{NodeConfig, StorageLayout};
use crate::common::{decode_hex, encode_hex, Error, Result};

use super::signer::ExternalSigner;
use super::{AccountId, Call, Chain};

/// JSON-RPC request envelope
#[derive(Debug, Serialize)]
pub struct RpcRequest<'a> {
    pub jsonrpc: &'static str,
    pub id: u64,
    pub method: &'a str,
    pub params: Value,
}

/// JSON-RPC response envelope
#[derive(Debug, Deserialize)]
pub struct RpcResponse {
    #[serde(default)]
    pub id: Option<Value>,
    #[serde(default)]
    pub result: Option<Value>,
    #[serde(default)]
    pub error: Option<RpcErrorObject>,
}

/// JSON-RPC error object
#[derive(Debug, Deserialize)]
pub struct RpcErrorObject {
    pub code: i64,
    pub message: String,
    #[serde(default)]
    pub data: Option<Value>,
}

impl RpcErrorObject {
    fn describe(&self) -> String {
        match &self.data {
            Some(Value::String(data)) => format!("{} ({}): {}", self.message, self.code, data),
            Some(data) => format!("{} ({}): {}", self.message, self.code, data),
            None => format!("{} ({})", self.message, self.code),
        }
    }
}

/// Check a response envelope and extract its typed result
pub fn parse_response<T: DeserializeOwned>(
    method: &str,
    expected_id: u64,
    response: RpcResponse,
) -> Result<T> {
    if let Some(id) = &response.id {
        if id.as_u64() != Some(expected_id) {
            return Err(Error::rpc(
                method,
                format!("response id mismatch: expected {}, got {}", expected_id, id),
            ));
        }
    }

    if let Some(err) = response.error {
        return Err(Error::rpc(method, err.describe()));
    }

    let result = response.result.unwrap_or(Value::Null);
    serde_json::from_value(result)
        .map_err(|e| Error::rpc(method, format!("unexpected result shape: {}", e)))
}

/// Node client over JSON-RPC
pub struct RpcChain {
    http: reqwest::Client,
    url: String,
    seq: AtomicU64,
    signer: ExternalSigner,
    layout: StorageLayout,
}

impl RpcChain {
    /// Create a client for the node at `config.url`
    pub fn new(config: &NodeConfig, signer: ExternalSigner, layout: StorageLayout) -> Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.request_timeout_secs))
            .build()?;

        Ok(Self {
            http,
            url: config.url.clone(),
            seq: AtomicU64::new(1),
            signer,
            layout,
        })
    }

    fn next_seq(&self) -> u64 {
        self.seq.fetch_add(1, Ordering::SeqCst)
    }

    /// Send a request and wait for the response
    pub async fn request<T: DeserializeOwned>(&self, method: &str, params: Value) -> Result<T> {
        let id = self.next_seq();
        let request = RpcRequest {
            jsonrpc: "2.0",
            id,
            method,
            params,
        };

        tracing::debug!(method, id, "RPC request: {}", request.params);

        let response: RpcResponse = self
            .http
            .post(&self.url)
            .json(&request)
            .send()
            .await?
            .error_for_status()?
            .json()
            .await?;

        tracing::debug!(method, id, "RPC response: {:?}", response.result);

        parse_response(method, id, response)
    }

    /// Hash of the best block, useful as a connectivity check
    pub async fn best_block_hash(&self) -> Result<String> {
        self.request("chain_getBlockHash", Value::Array(vec![])).await
    }
}

#[async_trait]
impl Chain for RpcChain {
    fn layout(&self) -> &StorageLayout {
        &self.layout
    }

    async fn submit(&mut self, signer: &AccountId, call: Call) -> Result<()> {
        let name = call.name();
        let extrinsic = self.signer.sign(signer, &call).await?;
        let hash: String = self
            .request("author_submitExtrinsic", serde_json::json!([extrinsic]))
            .await?;
        tracing::info!(call = name, %hash, "Extrinsic submitted");
        Ok(())
    }

    async fn storage(&mut self, key: &[u8]) -> Result<Option<Vec<u8>>> {
        let value: Option<String> = self
            .request("state_getStorage", serde_json::json!([encode_hex(key)]))
            .await?;
        value.map(|v| decode_hex("storage value", &v)).transpose()
    }
}
