//! RPC Backend - eth_createAccessList + (state-overridden) eth_call
//!
//! Everything above this layer talks to a `SimulationBackend`, so tests can
//! swap in an in-memory node and the binary plugs in an alloy HTTP provider.

use alloy_eips::eip2930::AccessListItem;
use alloy_eips::BlockId;
use alloy_primitives::Bytes;
use alloy_provider::Provider;
use alloy_rpc_types::state::StateOverride;
use alloy_rpc_types::TransactionRequest;
use alloy_sol_types::decode_revert_reason;
use alloy_transport::TransportError;
use std::fmt;
use tracing::debug;

use crate::error::{Result, SimulationError};

// ============================================
// BLOCK TAG
// ============================================

/// Block a simulation is pinned to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum BlockTag {
    #[default]
    Latest,
    Number(u64),
}

impl fmt::Display for BlockTag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BlockTag::Latest => write!(f, "latest"),
            BlockTag::Number(n) => write!(f, "0x{:x}", n),
        }
    }
}

impl From<Option<u64>> for BlockTag {
    fn from(block: Option<u64>) -> Self {
        block.map(BlockTag::Number).unwrap_or(BlockTag::Latest)
    }
}

impl From<BlockTag> for BlockId {
    fn from(tag: BlockTag) -> Self {
        match tag {
            BlockTag::Latest => BlockId::latest(),
            BlockTag::Number(n) => BlockId::number(n),
        }
    }
}

// ============================================
// BACKEND TRAIT
// ============================================

/// The two RPC primitives a preview needs
#[allow(async_fn_in_trait)]
pub trait SimulationBackend {
    /// Whether `eth_call` accepts a state-override set
    fn supports_state_overrides(&self) -> bool;

    /// Storage touched by `tx`. Fails with `AccessListUnavailable` when the
    /// node does not implement the method.
    async fn create_access_list(
        &self,
        tx: &TransactionRequest,
        block: BlockTag,
    ) -> Result<Vec<AccessListItem>>;

    /// Raw return data of `tx`. Reverts map to `CallReverted`.
    async fn call(
        &self,
        tx: &TransactionRequest,
        block: BlockTag,
        overrides: Option<&StateOverride>,
    ) -> Result<Bytes>;
}

// ============================================
// ALLOY PROVIDER BACKEND
// ============================================

/// `SimulationBackend` over any alloy `Provider`
#[derive(Debug, Clone)]
pub struct RpcBackend<P> {
    provider: P,
    state_overrides: bool,
}

impl<P: Provider> RpcBackend<P> {
    pub fn new(provider: P, state_overrides: bool) -> Self {
        Self { provider, state_overrides }
    }
}

impl<P: Provider> SimulationBackend for RpcBackend<P> {
    fn supports_state_overrides(&self) -> bool {
        self.state_overrides
    }

    async fn create_access_list(
        &self,
        tx: &TransactionRequest,
        block: BlockTag,
    ) -> Result<Vec<AccessListItem>> {
        debug!(to = ?tx.to, block = %block, "eth_createAccessList");

        let result = self
            .provider
            .create_access_list(tx)
            .block_id(block.into())
            .await
            .map_err(|e| {
                if is_unsupported_method(&e, "eth_createaccesslist") {
                    SimulationError::AccessListUnavailable(e.to_string())
                } else {
                    SimulationError::Rpc(format!("eth_createAccessList failed: {}", e))
                }
            })?;

        let result = result
            .ensure_ok()
            .map_err(|e| SimulationError::Rpc(format!("eth_createAccessList execution error: {}", e)))?;

        debug!(entries = result.access_list.0.len(), gas_used = %result.gas_used, "access list resolved");
        Ok(result.access_list.0)
    }

    async fn call(
        &self,
        tx: &TransactionRequest,
        block: BlockTag,
        overrides: Option<&StateOverride>,
    ) -> Result<Bytes> {
        debug!(to = ?tx.to, block = %block, overridden = overrides.is_some(), "eth_call");

        let call = self.provider.call(tx.clone()).block(block.into());
        let result = match overrides {
            Some(overrides) => call.overrides(overrides.clone()).await,
            None => call.await,
        };

        result.map_err(classify_call_error)
    }
}

// ============================================
// ERROR CLASSIFICATION
// ============================================

const UNSUPPORTED_MARKERS: [&str; 5] =
    ["not supported", "unsupported", "does not exist", "not available", "not found"];

/// JSON-RPC "method not found" (-32601), or a message naming `method` (lowercase)
/// as missing. Pruned-state errors also say "not available" but name no method.
fn is_unsupported_method(err: &TransportError, method: &str) -> bool {
    match err.as_error_resp() {
        Some(payload) => {
            let message = payload.message.to_lowercase();
            payload.code == -32601
                || (message.contains(method) && UNSUPPORTED_MARKERS.iter().any(|m| message.contains(m)))
        }
        None => false,
    }
}

fn classify_call_error(err: TransportError) -> SimulationError {
    if let Some(payload) = err.as_error_resp() {
        if let Some(data) = payload.as_revert_data() {
            return SimulationError::CallReverted(revert_reason(&data));
        }
        if payload.code == 3 || payload.message.contains("revert") {
            return SimulationError::CallReverted(payload.message.to_string());
        }
    }
    SimulationError::Rpc(format!("eth_call failed: {}", err))
}

/// Human-readable revert reason: Error(string), Panic(uint256), or hex
pub fn revert_reason(data: &[u8]) -> String {
    if data.is_empty() {
        return "execution reverted without data".to_string();
    }
    decode_revert_reason(data).unwrap_or_else(|| format!("0x{}", hex::encode(data)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use alloy_sol_types::{Revert, SolError};

    fn error_resp(payload: serde_json::Value) -> TransportError {
        TransportError::ErrorResp(serde_json::from_str(&payload.to_string()).unwrap())
    }

    #[test]
    fn test_block_tag_format() {
        assert_eq!(BlockTag::Latest.to_string(), "latest");
        assert_eq!(BlockTag::Number(19_000_000).to_string(), "0x121eac0");
        assert_eq!(BlockTag::from(None), BlockTag::Latest);
        assert_eq!(BlockTag::from(Some(1)), BlockTag::Number(1));
    }

    #[test]
    fn test_block_tag_to_block_id() {
        assert_eq!(BlockId::from(BlockTag::Number(42)), BlockId::number(42));
        assert_eq!(BlockId::from(BlockTag::Latest), BlockId::latest());
    }

    #[test]
    fn test_revert_reason_decodes_error_string() {
        let data = Revert { reason: "Price slippage check".into() }.abi_encode();
        assert!(revert_reason(&data).contains("Price slippage check"));
    }

    #[test]
    fn test_revert_reason_fallbacks() {
        assert_eq!(revert_reason(&[]), "execution reverted without data");
        assert_eq!(revert_reason(&[0xff, 0xff, 0xff, 0xff]), "0xffffffff");
    }

    #[test]
    fn test_method_not_found_is_unsupported() {
        let err = error_resp(serde_json::json!({ "code": -32601, "message": "Method not found" }));
        assert!(is_unsupported_method(&err, "eth_createaccesslist"));

        let err = error_resp(serde_json::json!({
            "code": -32000,
            "message": "the method eth_createAccessList does not exist/is not available"
        }));
        assert!(is_unsupported_method(&err, "eth_createaccesslist"));
    }

    #[test]
    fn test_pruned_state_is_not_unsupported() {
        let err = error_resp(serde_json::json!({
            "code": -32000,
            "message": "missing trie node abc (path ) state 0x12 is not available"
        }));
        assert!(!is_unsupported_method(&err, "eth_createaccesslist"));

        let err = error_resp(serde_json::json!({ "code": -32000, "message": "header not found" }));
        assert!(!is_unsupported_method(&err, "eth_createaccesslist"));
        assert!(!is_unsupported_method(&TransportError::local_usage_str("offline"), "eth_createaccesslist"));
    }

    #[test]
    fn test_call_error_with_revert_data() {
        let data = format!("0x{}", hex::encode(Revert { reason: "STF".into() }.abi_encode()));
        let err = error_resp(serde_json::json!({ "code": 3, "message": "execution reverted: STF", "data": data }));
        match classify_call_error(err) {
            SimulationError::CallReverted(reason) => assert!(reason.contains("STF")),
            other => panic!("expected a revert, got {:?}", other),
        }
    }

    #[test]
    fn test_call_error_code_3_without_data() {
        let err = error_resp(serde_json::json!({ "code": 3, "message": "execution reverted" }));
        assert!(matches!(classify_call_error(err), SimulationError::CallReverted(m) if m == "execution reverted"));
    }

    #[test]
    fn test_call_error_other_failures_are_rpc() {
        let err = error_resp(serde_json::json!({
            "code": -32000,
            "message": "missing trie node abc (path ) state 0x12 is not available"
        }));
        assert!(matches!(classify_call_error(err), SimulationError::Rpc(_)));
    }
}
