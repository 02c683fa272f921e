//! In-memory collaborators for unit tests
//!
//! `MockBackend` answers eth_createAccessList / eth_call from registered
//! handlers and records every call's override set. `MockErc20` installs a token
//! that keeps balances and allowances in plain mappings, optionally behind a proxy.

use alloy_eips::eip2930::AccessListItem;
use alloy_primitives::{keccak256, Address, Bytes, B256, U256};
use alloy_rpc_types::state::StateOverride;
use alloy_rpc_types::TransactionRequest;
use alloy_sol_types::{SolCall, SolValue};
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use crate::error::{Result, SimulationError};
use crate::overrides::access_list::IERC20;
use crate::overrides::mapping_slot::{mapping_slot, nested_mapping_slot};
use crate::position::{PoolSnapshot, Position, PositionReader};
use crate::simulator::provider::{BlockTag, SimulationBackend};
use crate::swap::aggregator::{AggregatorQuote, QuoteRequest, SwapQuoter};

type AccessListHandler = Box<dyn Fn(&TransactionRequest) -> Result<Vec<AccessListItem>> + Send>;
type CallHandler = Box<dyn Fn(&TransactionRequest, Option<&StateOverride>) -> Result<Bytes> + Send>;

pub fn tx_to(tx: &TransactionRequest) -> Address {
    tx.to.and_then(|kind| kind.to().copied()).unwrap_or_default()
}

pub fn tx_input(tx: &TransactionRequest) -> Bytes {
    tx.input.input().cloned().unwrap_or_default()
}

/// Storage value at `slot` of `address` as seen through `overrides`
pub fn read_slot(overrides: Option<&StateOverride>, address: Address, slot: B256) -> U256 {
    overrides
        .and_then(|o| o.get(&address))
        .and_then(|account| {
            account
                .state_diff
                .as_ref()
                .and_then(|diff| diff.get(&slot))
                .or_else(|| account.state.as_ref().and_then(|state| state.get(&slot)))
        })
        .map(|word| U256::from_be_bytes(word.0))
        .unwrap_or(U256::ZERO)
}

pub struct MockBackend {
    state_overrides: bool,
    access_lists_supported: bool,
    access_lists: Mutex<HashMap<Address, AccessListHandler>>,
    calls: Mutex<HashMap<Address, CallHandler>>,
    recorded: Mutex<Vec<Option<StateOverride>>>,
    access_list_calls: AtomicUsize,
}

impl MockBackend {
    pub fn new() -> Self {
        Self {
            state_overrides: true,
            access_lists_supported: true,
            access_lists: Mutex::new(HashMap::new()),
            calls: Mutex::new(HashMap::new()),
            recorded: Mutex::new(Vec::new()),
            access_list_calls: AtomicUsize::new(0),
        }
    }

    pub fn without_state_overrides(mut self) -> Self {
        self.state_overrides = false;
        self
    }

    pub fn without_access_lists(mut self) -> Self {
        self.access_lists_supported = false;
        self
    }

    pub fn on_access_list<F>(&self, to: Address, handler: F)
    where
        F: Fn(&TransactionRequest) -> Result<Vec<AccessListItem>> + Send + 'static,
    {
        self.access_lists.lock().unwrap().insert(to, Box::new(handler));
    }

    pub fn on_call<F>(&self, to: Address, handler: F)
    where
        F: Fn(&TransactionRequest, Option<&StateOverride>) -> Result<Bytes> + Send + 'static,
    {
        self.calls.lock().unwrap().insert(to, Box::new(handler));
    }

    /// Whether each eth_call so far carried overrides
    pub fn recorded_overrides(&self) -> Vec<bool> {
        self.recorded.lock().unwrap().iter().map(Option::is_some).collect()
    }

    pub fn last_overrides(&self) -> Option<StateOverride> {
        self.recorded.lock().unwrap().last().cloned().flatten()
    }

    pub fn access_list_calls(&self) -> usize {
        self.access_list_calls.load(Ordering::SeqCst)
    }
}

impl SimulationBackend for MockBackend {
    fn supports_state_overrides(&self) -> bool {
        self.state_overrides
    }

    async fn create_access_list(
        &self,
        tx: &TransactionRequest,
        _block: BlockTag,
    ) -> Result<Vec<AccessListItem>> {
        self.access_list_calls.fetch_add(1, Ordering::SeqCst);
        if !self.access_lists_supported {
            return Err(SimulationError::AccessListUnavailable(
                "the method eth_createAccessList does not exist/is not available".into(),
            ));
        }
        let to = tx_to(tx);
        let handlers = self.access_lists.lock().unwrap();
        match handlers.get(&to) {
            Some(handler) => handler(tx),
            None => Err(SimulationError::Rpc(format!("no access list handler for {}", to))),
        }
    }

    async fn call(
        &self,
        tx: &TransactionRequest,
        _block: BlockTag,
        overrides: Option<&StateOverride>,
    ) -> Result<Bytes> {
        self.recorded.lock().unwrap().push(overrides.cloned());
        let to = tx_to(tx);
        let handlers = self.calls.lock().unwrap();
        match handlers.get(&to) {
            Some(handler) => handler(tx, overrides),
            None => Err(SimulationError::CallReverted(format!("no code at {}", to))),
        }
    }
}

// ============================================
// MOCK ERC20
// ============================================

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Indirection {
    None,
    /// Constant implementation slot plus a foreign implementation entry
    Proxy(Address),
    /// An extra token-owned slot derived from each call's calldata
    PerCall,
}

/// ERC-20 with `balances` at slot 0 and `allowances` at slot 1
#[derive(Debug, Clone, Copy)]
pub struct MockErc20 {
    pub address: Address,
    indirection: Indirection,
}

const BALANCES_SLOT: u64 = 0;
const ALLOWANCES_SLOT: u64 = 1;
const TOTAL_SUPPLY_SLOT: u64 = 2;
const IMPLEMENTATION_SLOT: B256 = B256::repeat_byte(0x36);

impl MockErc20 {
    pub fn standard(address: Address) -> Self {
        Self { address, indirection: Indirection::None }
    }

    pub fn proxied(address: Address, implementation: Address) -> Self {
        Self { address, indirection: Indirection::Proxy(implementation) }
    }

    pub fn varying_indirection(address: Address) -> Self {
        Self { address, indirection: Indirection::PerCall }
    }

    pub fn balance_slot_of(&self, owner: Address) -> B256 {
        mapping_slot(owner, U256::from(BALANCES_SLOT))
    }

    pub fn allowance_slot_of(&self, owner: Address, spender: Address) -> B256 {
        nested_mapping_slot(owner, spender, U256::from(ALLOWANCES_SLOT))
    }

    fn touched(&self, input: &Bytes, own_slot: B256) -> Vec<AccessListItem> {
        // totalSupply-style metadata read on every call, common to both probes
        let mut keys = vec![B256::from(U256::from(TOTAL_SUPPLY_SLOT).to_be_bytes::<32>()), own_slot];
        let mut entries = Vec::new();
        match self.indirection {
            Indirection::None => {}
            Indirection::Proxy(implementation) => {
                keys.push(IMPLEMENTATION_SLOT);
                entries.push(AccessListItem { address: implementation, storage_keys: vec![B256::ZERO] });
            }
            Indirection::PerCall => keys.push(keccak256(input)),
        }
        entries.push(AccessListItem { address: self.address, storage_keys: keys });
        entries
    }

    pub fn install(&self, backend: &MockBackend) {
        let token = *self;
        backend.on_access_list(self.address, move |tx| {
            let input = tx_input(tx);
            if let Ok(call) = IERC20::balanceOfCall::abi_decode(&input) {
                return Ok(token.touched(&input, token.balance_slot_of(call.owner)));
            }
            if let Ok(call) = IERC20::allowanceCall::abi_decode(&input) {
                return Ok(token.touched(&input, token.allowance_slot_of(call.owner, call.spender)));
            }
            Err(SimulationError::Rpc("unexpected probe".into()))
        });

        backend.on_call(self.address, move |tx, overrides| {
            let input = tx_input(tx);
            let from = tx.from.unwrap_or_default();
            let balance = |owner| read_slot(overrides, token.address, token.balance_slot_of(owner));

            if let Ok(call) = IERC20::balanceOfCall::abi_decode(&input) {
                return Ok(balance(call.owner).abi_encode().into());
            }
            if let Ok(call) = IERC20::transferCall::abi_decode(&input) {
                if balance(from) < call.amount {
                    return Err(SimulationError::CallReverted(
                        "ERC20: transfer amount exceeds balance".into(),
                    ));
                }
                return Ok(true.abi_encode().into());
            }
            if let Ok(call) = IERC20::transferFromCall::abi_decode(&input) {
                let allowance =
                    read_slot(overrides, token.address, token.allowance_slot_of(call.from, from));
                if allowance < call.amount {
                    return Err(SimulationError::CallReverted("ERC20: insufficient allowance".into()));
                }
                if balance(call.from) < call.amount {
                    return Err(SimulationError::CallReverted(
                        "ERC20: transfer amount exceeds balance".into(),
                    ));
                }
                return Ok(true.abi_encode().into());
            }
            Err(SimulationError::CallReverted("unknown selector".into()))
        });
    }

    /// Whether `overrides` let `owner` spend `amount` through `spender`
    pub fn can_spend(overrides: Option<&StateOverride>, token: Address, owner: Address, spender: Address, amount: U256) -> bool {
        let mock = MockErc20::standard(token);
        read_slot(overrides, token, mock.balance_slot_of(owner)) >= amount
            && read_slot(overrides, token, mock.allowance_slot_of(owner, spender)) >= amount
    }
}

/// Shared, clonable log of values a mock collaborator saw
#[derive(Debug, Clone)]
pub struct Recorder<T>(Arc<Mutex<Vec<T>>>);

impl<T> Default for Recorder<T> {
    fn default() -> Self {
        Self(Arc::new(Mutex::new(Vec::new())))
    }
}

impl<T: Clone> Recorder<T> {
    pub fn push(&self, value: T) {
        self.0.lock().unwrap().push(value);
    }

    pub fn all(&self) -> Vec<T> {
        self.0.lock().unwrap().clone()
    }
}

// ============================================
// MOCK QUOTER / POSITION READER
// ============================================

type MakeError = Box<dyn Fn() -> SimulationError + Send + Sync>;

pub struct MockQuoter {
    response: std::result::Result<AggregatorQuote, MakeError>,
    requests: Recorder<QuoteRequest>,
}

impl MockQuoter {
    pub fn returning(quote: AggregatorQuote) -> Self {
        Self { response: Ok(quote), requests: Recorder::default() }
    }

    /// Fails every quote with `SimulationError::Aggregator(reason)`
    pub fn failing(reason: &str) -> Self {
        let reason = reason.to_string();
        Self::erroring(move || SimulationError::Aggregator(reason.clone()))
    }

    pub fn erroring(make: impl Fn() -> SimulationError + Send + Sync + 'static) -> Self {
        Self { response: Err(Box::new(make)), requests: Recorder::default() }
    }

    pub fn requests(&self) -> Vec<QuoteRequest> {
        self.requests.all()
    }
}

impl SwapQuoter for MockQuoter {
    async fn quote(&self, request: &QuoteRequest) -> Result<AggregatorQuote> {
        self.requests.push(*request);
        match &self.response {
            Ok(quote) => Ok(quote.clone()),
            Err(make) => Err(make()),
        }
    }
}

pub struct MockPositionReader {
    pub position: Position,
    pub pool: PoolSnapshot,
    position_reads: AtomicUsize,
}

impl MockPositionReader {
    pub fn new(position: Position, pool: PoolSnapshot) -> Self {
        Self { position, pool, position_reads: AtomicUsize::new(0) }
    }

    pub fn position_reads(&self) -> usize {
        self.position_reads.load(Ordering::SeqCst)
    }
}

impl PositionReader for MockPositionReader {
    async fn position(&self, token_id: U256, _block: BlockTag) -> Result<Position> {
        self.position_reads.fetch_add(1, Ordering::SeqCst);
        if token_id != self.position.token_id {
            return Err(SimulationError::CallReverted("Invalid token ID".into()));
        }
        Ok(self.position)
    }

    async fn pool(&self, _token0: Address, _token1: Address, _fee: u32, _block: BlockTag) -> Result<PoolSnapshot> {
        Ok(self.pool)
    }
}
