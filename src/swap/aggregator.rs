//! Aggregator quote client (1inch-style swap API)
//!
//! The response is treated as opaque beyond {to, data}: the router address is
//! checked against the allow-list by the planner and the calldata is forwarded
//! untouched inside the swap envelope.

use alloy_primitives::{Address, Bytes, U256};
use reqwest::Client;
use serde::Deserialize;
use std::sync::Mutex;
use std::time::Duration;
use tracing::{debug, trace};

use super::quote_cache::{Clock, SystemClock, TtlCache};
use crate::error::{Result, SimulationError};

// ============================================
// TYPES
// ============================================

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct QuoteRequest {
    pub chain_id: u64,
    pub token_in: Address,
    pub token_out: Address,
    pub amount_in: U256,
    pub slippage_bips: u32,
    /// Account that will execute the router call
    pub from: Address,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AggregatorQuote {
    /// Router contract to call
    pub to: Address,
    /// Opaque router calldata
    pub data: Bytes,
    /// Spender that needs the input-token approval, when it differs from `to`
    pub approve_target: Option<Address>,
    pub amount_out: Option<U256>,
}

/// External swap-quote collaborator
#[allow(async_fn_in_trait)]
pub trait SwapQuoter {
    async fn quote(&self, request: &QuoteRequest) -> Result<AggregatorQuote>;
}

// ============================================
// RESPONSE PARSING
// ============================================

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct SwapResponse {
    dst_amount: Option<String>,
    tx: SwapTx,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct SwapTx {
    to: Address,
    data: Bytes,
    #[serde(default)]
    approve_target: Option<Address>,
}

/// Extract {to, data} from a swap API response body
pub fn parse_swap_response(body: &str) -> Result<AggregatorQuote> {
    let response: SwapResponse = serde_json::from_str(body)
        .map_err(|e| SimulationError::Aggregator(format!("malformed swap response: {}", e)))?;

    if response.tx.data.is_empty() {
        return Err(SimulationError::Aggregator("swap response carries no calldata".into()));
    }

    let amount_out = match response.dst_amount {
        Some(raw) => Some(
            raw.parse::<U256>()
                .map_err(|e| SimulationError::Aggregator(format!("bad dstAmount {}: {}", raw, e)))?,
        ),
        None => None,
    };

    Ok(AggregatorQuote {
        to: response.tx.to,
        data: response.tx.data,
        approve_target: response.tx.approve_target,
        amount_out,
    })
}

/// 1inch expresses slippage in percent
fn slippage_percent(bips: u32) -> String {
    format!("{}", bips as f64 / 100.0)
}

// ============================================
// HTTP CLIENT
// ============================================

type QuoteKey = (u64, Address, Address, U256, u32);

pub struct AggregatorClient<C: Clock = SystemClock> {
    http_client: Client,
    base_url: Option<String>,
    api_key: Option<String>,
    cache: Mutex<TtlCache<QuoteKey, AggregatorQuote, C>>,
}

impl AggregatorClient<SystemClock> {
    /// `base_url` of None disables aggregator routing entirely
    pub fn new(base_url: Option<String>, api_key: Option<String>, cache_ttl: Duration) -> Self {
        Self::with_clock(base_url, api_key, cache_ttl, SystemClock)
    }
}

impl<C: Clock> AggregatorClient<C> {
    pub fn with_clock(base_url: Option<String>, api_key: Option<String>, cache_ttl: Duration, clock: C) -> Self {
        Self {
            http_client: Client::new(),
            base_url: base_url.map(|url| url.trim_end_matches('/').to_string()),
            api_key,
            cache: Mutex::new(TtlCache::with_clock(cache_ttl, clock)),
        }
    }

    pub fn is_enabled(&self) -> bool {
        self.base_url.is_some()
    }

    fn cached(&self, key: &QuoteKey) -> Option<AggregatorQuote> {
        self.cache.lock().ok().and_then(|mut cache| cache.get(key))
    }

    fn remember(&self, key: QuoteKey, quote: &AggregatorQuote) {
        if let Ok(mut cache) = self.cache.lock() {
            cache.sweep();
            cache.set(key, quote.clone());
        }
    }

    async fn fetch(&self, base_url: &str, request: &QuoteRequest) -> Result<AggregatorQuote> {
        let url = format!("{}/swap/v6.0/{}/swap", base_url, request.chain_id);
        debug!(
            token_in = %request.token_in,
            token_out = %request.token_out,
            amount_in = %request.amount_in,
            "Requesting aggregator quote"
        );

        let mut builder = self.http_client.get(&url).query(&[
            ("src", request.token_in.to_string()),
            ("dst", request.token_out.to_string()),
            ("amount", request.amount_in.to_string()),
            ("from", request.from.to_string()),
            ("slippage", slippage_percent(request.slippage_bips)),
            ("disableEstimate", "true".to_string()),
            ("allowPartialFill", "false".to_string()),
        ]);
        if let Some(key) = &self.api_key {
            builder = builder.bearer_auth(key);
        }

        let response = builder
            .send()
            .await
            .map_err(|e| SimulationError::Aggregator(format!("request failed: {}", e)))?;

        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|e| SimulationError::Aggregator(format!("failed to read response: {}", e)))?;

        if !status.is_success() {
            return Err(SimulationError::Aggregator(format!("HTTP {}: {}", status, body)));
        }
        parse_swap_response(&body)
    }
}

impl<C: Clock> SwapQuoter for AggregatorClient<C> {
    async fn quote(&self, request: &QuoteRequest) -> Result<AggregatorQuote> {
        let Some(base_url) = self.base_url.as_deref() else {
            return Err(SimulationError::Aggregator("no aggregator configured".into()));
        };

        let key = (
            request.chain_id,
            request.token_in,
            request.token_out,
            request.amount_in,
            request.slippage_bips,
        );
        if let Some(quote) = self.cached(&key) {
            trace!(router = %quote.to, "Using cached aggregator quote");
            return Ok(quote);
        }

        let quote = self.fetch(base_url, request).await?;
        self.remember(key, &quote);
        Ok(quote)
    }
}
