//! # RoninRpcClient: HTTP Chain Collaborator
//!
//! Production [`ChainClient`] backed by three HTTP endpoints:
//!
//! | Operation | Endpoint |
//! |-----------|----------|
//! | `get_transaction_count` | JSON-RPC `eth_getTransactionCount(addr, "latest")` |
//! | `get_claimed_balance` | JSON-RPC `eth_call` → ERC-20 `balanceOf(addr)` on the SLP contract |
//! | `get_unclaimed_balance` | `GET {game_api}/clients/{addr}/items/1`, `total - blockchain_related.balance` |
//! | `submit_transfer` | `POST {signer}/transfer` |
//! | `submit_claim` | `POST {signer}/claim` |
//!
//! Transaction signing is delegated to the signing gateway; this client only
//! moves JSON. Request bodies carrying private keys are never logged.

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use tracing::debug;

use slp_common::{Address, PrivateKey, SlpClaim, Transaction, TxHash};

use crate::chain::{ChainClient, ChainError};

// ════════════════════════════════════════════════════════════════════════════════
// CONSTANTS
// ════════════════════════════════════════════════════════════════════════════════

pub const DEFAULT_RPC_URL: &str = "https://api.roninchain.com/rpc";

pub const DEFAULT_GAME_API_URL: &str = "https://game-api.skymavis.com/game-api";

pub const DEFAULT_SIGNER_URL: &str = "http://127.0.0.1:8650";

/// SLP token contract on Ronin.
pub const SLP_CONTRACT: &str = "0xa8754b9fa15fc18bb59458815510e40a12cd2014";

/// `keccak256("balanceOf(address)")[..4]`
const BALANCE_OF_SELECTOR: &str = "70a08231";

/// Game item id of SLP.
const SLP_ITEM_ID: u32 = 1;

// ════════════════════════════════════════════════════════════════════════════════
// WIRE TYPES
// ════════════════════════════════════════════════════════════════════════════════

#[derive(Serialize)]
struct JsonRpcRequest<'a> {
    jsonrpc: &'static str,
    id: u64,
    method: &'a str,
    params: serde_json::Value,
}

#[derive(Deserialize)]
struct JsonRpcResponse<T> {
    result: Option<T>,
    error: Option<JsonRpcErrorBody>,
}

#[derive(Deserialize)]
struct JsonRpcErrorBody {
    code: i64,
    message: String,
}

#[derive(Deserialize)]
struct GameItemResponse {
    total: u64,
    #[serde(default)]
    blockchain_related: Option<BlockchainRelated>,
}

#[derive(Deserialize)]
struct BlockchainRelated {
    #[serde(default)]
    balance: Option<u64>,
}

#[derive(Serialize)]
struct TransferRequest<'a> {
    from: String,
    to: String,
    amount: u64,
    nonce: u64,
    private_key: &'a str,
}

#[derive(Deserialize)]
struct TransferResponse {
    tx_hash: String,
}

#[derive(Serialize)]
struct ClaimRequest<'a> {
    address: String,
    amount: u64,
    nonce: u64,
    private_key: &'a str,
}

#[derive(Deserialize)]
struct ClaimResponse {
    #[serde(default)]
    signature: Option<String>,
    #[serde(default)]
    tx_hash: Option<String>,
}

// ════════════════════════════════════════════════════════════════════════════════
// ENCODING HELPERS
// ════════════════════════════════════════════════════════════════════════════════

/// Parses a JSON-RPC hex quantity (`0x1a`). Leading zeros are allowed so a
/// 32-byte ABI word decodes as long as the value fits in `u64`.
pub fn parse_quantity(raw: &str) -> Result<u64, ChainError> {
    let body = raw
        .strip_prefix("0x")
        .ok_or_else(|| ChainError::InvalidResponse(format!("quantity `{}` lacks 0x prefix", raw)))?;
    let significant = body.trim_start_matches('0');
    if significant.is_empty() {
        return Ok(0);
    }
    if significant.len() > 16 {
        return Err(ChainError::InvalidResponse(format!(
            "quantity `{}` does not fit in 64 bits",
            raw
        )));
    }
    u64::from_str_radix(significant, 16)
        .map_err(|e| ChainError::InvalidResponse(format!("quantity `{}`: {}", raw, e)))
}

/// ABI call data for `balanceOf(owner)`.
pub fn encode_balance_of(owner: &Address) -> String {
    format!("0x{}{:0>64}", BALANCE_OF_SELECTOR, owner.to_lower_hex())
}

fn map_transport(e: reqwest::Error) -> ChainError {
    if e.is_timeout() {
        ChainError::Timeout
    } else {
        ChainError::Network(e.to_string())
    }
}

// ════════════════════════════════════════════════════════════════════════════════
// CLIENT
// ════════════════════════════════════════════════════════════════════════════════

#[derive(Debug, Clone)]
pub struct RpcEndpoints {
    pub rpc_url: String,
    pub game_api_url: String,
    pub signer_url: String,
    pub slp_contract: Address,
    pub timeout: Duration,
}

pub struct RoninRpcClient {
    endpoints: RpcEndpoints,
    client: Client,
    next_id: AtomicU64,
}

impl RoninRpcClient {
    pub fn new(endpoints: RpcEndpoints) -> Result<Self, ChainError> {
        let client = Client::builder()
            .timeout(endpoints.timeout)
            .build()
            .map_err(|e| ChainError::Network(format!("http client: {}", e)))?;
        Ok(Self {
            endpoints,
            client,
            next_id: AtomicU64::new(1),
        })
    }

    async fn rpc_call<T: DeserializeOwned>(
        &self,
        method: &str,
        params: serde_json::Value,
    ) -> Result<T, ChainError> {
        let request = JsonRpcRequest {
            jsonrpc: "2.0",
            id: self.next_id.fetch_add(1, Ordering::Relaxed),
            method,
            params,
        };
        debug!(method, "json-rpc call");

        let resp = self
            .client
            .post(&self.endpoints.rpc_url)
            .json(&request)
            .send()
            .await
            .map_err(map_transport)?;
        let status = resp.status();
        if !status.is_success() {
            let t = resp.text().await.unwrap_or_default();
            return Err(ChainError::Network(format!("{} failed {} {}", method, status, t)));
        }

        let body: JsonRpcResponse<T> = resp
            .json()
            .await
            .map_err(|e| ChainError::InvalidResponse(format!("{}: {}", method, e)))?;
        if let Some(err) = body.error {
            return Err(ChainError::Rejected(format!("{} ({}): {}", method, err.code, err.message)));
        }
        body.result
            .ok_or_else(|| ChainError::InvalidResponse(format!("{}: empty result", method)))
    }

    async fn post_signer<B: Serialize, R: DeserializeOwned>(
        &self,
        path: &str,
        body: &B,
    ) -> Result<R, ChainError> {
        let url = format!("{}{}", self.endpoints.signer_url.trim_end_matches('/'), path);
        let resp = self
            .client
            .post(&url)
            .json(body)
            .send()
            .await
            .map_err(map_transport)?;
        let status = resp.status();
        if status.is_success() {
            resp.json::<R>()
                .await
                .map_err(|e| ChainError::InvalidResponse(format!("{}: {}", path, e)))
        } else {
            let t = resp.text().await.unwrap_or_default();
            Err(ChainError::Rejected(format!("{} failed {} {}", path, status, t)))
        }
    }
}

#[async_trait]
impl ChainClient for RoninRpcClient {
    async fn get_unclaimed_balance(&self, address: &Address) -> Result<u64, ChainError> {
        let url = format!(
            "{}/clients/{}/items/{}",
            self.endpoints.game_api_url.trim_end_matches('/'),
            address.to_canonical(),
            SLP_ITEM_ID
        );
        let resp = self.client.get(&url).send().await.map_err(map_transport)?;
        let status = resp.status();
        if !status.is_success() {
            let t = resp.text().await.unwrap_or_default();
            return Err(ChainError::Network(format!("game api failed {} {}", status, t)));
        }
        let item: GameItemResponse = resp
            .json()
            .await
            .map_err(|e| ChainError::InvalidResponse(format!("game api: {}", e)))?;
        let on_chain = item
            .blockchain_related
            .and_then(|b| b.balance)
            .unwrap_or(0);
        Ok(item.total.saturating_sub(on_chain))
    }

    async fn get_claimed_balance(&self, address: &Address) -> Result<u64, ChainError> {
        let call = serde_json::json!({
            "to": self.endpoints.slp_contract.to_canonical(),
            "data": encode_balance_of(address),
        });
        let raw: String = self
            .rpc_call("eth_call", serde_json::json!([call, "latest"]))
            .await?;
        parse_quantity(&raw)
    }

    async fn get_transaction_count(&self, address: &Address) -> Result<u64, ChainError> {
        let raw: String = self
            .rpc_call(
                "eth_getTransactionCount",
                serde_json::json!([address.to_canonical(), "latest"]),
            )
            .await?;
        parse_quantity(&raw)
    }

    async fn submit_transfer(
        &self,
        transaction: &Transaction,
        private_key: &PrivateKey,
        nonce: u64,
    ) -> Result<TxHash, ChainError> {
        debug!(
            from = %transaction.from_address.to_canonical(),
            to = %transaction.to_address.to_canonical(),
            amount = transaction.amount,
            nonce,
            "submitting transfer"
        );
        let body = TransferRequest {
            from: transaction.from_address.to_canonical(),
            to: transaction.to_address.to_canonical(),
            amount: transaction.amount,
            nonce,
            private_key: private_key.expose(),
        };
        let resp: TransferResponse = self.post_signer("/transfer", &body).await?;
        Ok(TxHash::new(resp.tx_hash))
    }

    async fn submit_claim(&self, claim: &SlpClaim, nonce: u64) -> Result<Option<TxHash>, ChainError> {
        debug!(address = %claim.address.to_canonical(), nonce, "submitting claim");
        let body = ClaimRequest {
            address: claim.address.to_canonical(),
            amount: claim.unclaimed_balance,
            nonce,
            private_key: claim.private_key.expose(),
        };
        let resp: ClaimResponse = self.post_signer("/claim", &body).await?;
        Ok(resp.tx_hash.or(resp.signature).map(TxHash::new))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_quantities() {
        assert_eq!(parse_quantity("0x0"), Ok(0));
        assert_eq!(parse_quantity("0x"), Ok(0));
        assert_eq!(parse_quantity("0x1a"), Ok(26));
        assert_eq!(
            parse_quantity("0x00000000000000000000000000000000000000000000000000000000000003e8"),
            Ok(1000)
        );
        assert!(matches!(parse_quantity("1a"), Err(ChainError::InvalidResponse(_))));
        assert!(matches!(
            parse_quantity("0x10000000000000000"),
            Err(ChainError::InvalidResponse(_))
        ));
        assert!(matches!(parse_quantity("0xzz"), Err(ChainError::InvalidResponse(_))));
    }

    #[test]
    fn balance_of_call_data() {
        let owner = Address::from_bytes([0xab; 20]);
        let data = encode_balance_of(&owner);
        assert_eq!(data.len(), 2 + 8 + 64);
        assert!(data.starts_with("0x70a08231000000000000000000000000abab"));
        assert!(data.ends_with("abababab"));
    }

    #[test]
    fn game_item_response_tolerates_missing_chain_section() {
        let item: GameItemResponse = serde_json::from_str(r#"{"total": 120}"#).unwrap();
        assert_eq!(item.total, 120);
        assert!(item.blockchain_related.is_none());

        let item: GameItemResponse =
            serde_json::from_str(r#"{"total": 120, "blockchain_related": {"balance": 20}}"#).unwrap();
        assert_eq!(item.blockchain_related.and_then(|b| b.balance), Some(20));
    }

    #[test]
    fn claim_response_without_signature() {
        let resp: ClaimResponse = serde_json::from_str(r#"{"signature": null}"#).unwrap();
        assert!(resp.tx_hash.or(resp.signature).is_none());
    }
}
