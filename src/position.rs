//! Position Reader - NonfungiblePositionManager + pool state
//!
//! Loads a position by token id and the current price of its pool. The
//! orchestrator only sees the `PositionReader` trait.
//!
//! `positions().tokensOwed*` only moves when the position is poked, so the
//! owed amounts are taken from a simulated `collect` sent by the owner. The
//! manager pokes the position inside `collect`, which folds in every fee
//! accrued since the last increase, decrease or collect.

use alloy_primitives::aliases::U24;
use alloy_primitives::{Address, Bytes, U256};
use alloy_rpc_types::TransactionRequest;
use alloy_sol_types::SolCall;
use serde::Serialize;
use tracing::debug;

use crate::abi::{INonfungiblePositionManager, IUniswapV3Factory, IUniswapV3Pool};
use crate::error::{Result, SimulationError};
use crate::math::tick_spacing_for_fee;
use crate::simulator::provider::{BlockTag, SimulationBackend};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Position {
    pub token_id: U256,
    pub owner: Address,
    pub token0: Address,
    pub token1: Address,
    /// Fee tier in hundredths of a bip
    pub fee: u32,
    pub tick_spacing: i32,
    pub tick_lower: i32,
    pub tick_upper: i32,
    pub liquidity: u128,
    /// Collectable right now, accrued fees included
    pub tokens_owed0: u128,
    pub tokens_owed1: u128,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct PoolSnapshot {
    pub address: Address,
    pub sqrt_price_x96: U256,
    pub tick: i32,
}

/// Position-reader collaborator
#[allow(async_fn_in_trait)]
pub trait PositionReader {
    async fn position(&self, token_id: U256, block: BlockTag) -> Result<Position>;

    async fn pool(&self, token0: Address, token1: Address, fee: u32, block: BlockTag) -> Result<PoolSnapshot>;
}

/// Reads positions and pools through eth_call
#[derive(Debug, Clone)]
pub struct OnChainPositionReader<B> {
    backend: B,
    npm: Address,
    factory: Address,
}

impl<B: SimulationBackend> OnChainPositionReader<B> {
    pub fn new(backend: B, npm: Address, factory: Address) -> Self {
        Self { backend, npm, factory }
    }

    async fn view<C: SolCall>(&self, to: Address, call: C, block: BlockTag) -> Result<C::Return> {
        self.call_from(None, to, call, block).await
    }

    async fn call_from<C: SolCall>(
        &self,
        from: Option<Address>,
        to: Address,
        call: C,
        block: BlockTag,
    ) -> Result<C::Return> {
        let mut tx = TransactionRequest::default().to(to).input(Bytes::from(call.abi_encode()).into());
        if let Some(from) = from {
            tx = tx.from(from);
        }
        let out = self.backend.call(&tx, block, None).await?;
        C::abi_decode_returns(&out).map_err(|e| SimulationError::decode(C::SIGNATURE, e))
    }

    /// Fees the owner could collect at `block`
    async fn collectable(&self, token_id: U256, owner: Address, block: BlockTag) -> Result<(u128, u128)> {
        let call = INonfungiblePositionManager::collectCall {
            params: INonfungiblePositionManager::CollectParams {
                tokenId: token_id,
                recipient: owner,
                amount0Max: u128::MAX,
                amount1Max: u128::MAX,
            },
        };
        let ret = self.call_from(Some(owner), self.npm, call, block).await?;
        Ok((ret.amount0.saturating_to(), ret.amount1.saturating_to()))
    }

    async fn pool_address(&self, token0: Address, token1: Address, fee: u32, block: BlockTag) -> Result<Address> {
        let call = IUniswapV3Factory::getPoolCall { tokenA: token0, tokenB: token1, fee: U24::saturating_from(fee) };
        let pool = self.view(self.factory, call, block).await?;
        if pool == Address::ZERO {
            return Err(SimulationError::Rpc(format!(
                "no pool for {}/{} at fee {}",
                token0, token1, fee
            )));
        }
        Ok(pool)
    }
}

impl<B: SimulationBackend> PositionReader for OnChainPositionReader<B> {
    async fn position(&self, token_id: U256, block: BlockTag) -> Result<Position> {
        let (details, owner) = futures::try_join!(
            self.view(self.npm, INonfungiblePositionManager::positionsCall { tokenId: token_id }, block),
            self.view(self.npm, INonfungiblePositionManager::ownerOfCall { tokenId: token_id }, block),
        )?;

        let (owed0, owed1) = self.collectable(token_id, owner, block).await?;

        let fee = details.fee.to::<u32>();
        let tick_spacing = match tick_spacing_for_fee(fee) {
            Some(spacing) => spacing,
            None => {
                let pool = self.pool_address(details.token0, details.token1, fee, block).await?;
                self.view(pool, IUniswapV3Pool::tickSpacingCall {}, block).await?.as_i32()
            }
        };

        let position = Position {
            token_id,
            owner,
            token0: details.token0,
            token1: details.token1,
            fee,
            tick_spacing,
            tick_lower: details.tickLower.as_i32(),
            tick_upper: details.tickUpper.as_i32(),
            liquidity: details.liquidity,
            tokens_owed0: owed0,
            tokens_owed1: owed1,
        };
        debug!(
            token_id = %token_id,
            owner = %owner,
            tick_lower = position.tick_lower,
            tick_upper = position.tick_upper,
            liquidity = position.liquidity,
            stored_owed0 = details.tokensOwed0,
            owed0 = owed0,
            owed1 = owed1,
            "Loaded position"
        );
        Ok(position)
    }

    async fn pool(&self, token0: Address, token1: Address, fee: u32, block: BlockTag) -> Result<PoolSnapshot> {
        let address = self.pool_address(token0, token1, fee, block).await?;
        let slot0 = self.view(address, IUniswapV3Pool::slot0Call {}, block).await?;

        Ok(PoolSnapshot {
            address,
            sqrt_price_x96: U256::from(slot0.sqrtPriceX96),
            tick: slot0.tick.as_i32(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utils::{tx_input, MockBackend};
    use alloy_primitives::aliases::{I24, U160, U96};
    use alloy_primitives::address;
    use alloy_sol_types::SolValue;

    const NPM: Address = address!("C36442b4a4522E871399CD717aBDD847Ab11FE88");
    const FACTORY: Address = address!("1F98431c8aD98523631AE4a59f267346ea31F984");
    const POOL: Address = address!("88e6A0c2dDD26FEEb64F039a2c41296FcB3f5640");
    const OWNER: Address = address!("00000000000000000000000000000000000000aa");

    /// Manager whose stored `tokensOwed` lag behind what `collect` pays out
    fn install_npm(backend: &MockBackend, fee: u32) {
        backend.on_call(NPM, move |tx, _| {
            let input = tx_input(tx);
            if INonfungiblePositionManager::ownerOfCall::abi_decode(&input).is_ok() {
                return Ok(OWNER.abi_encode().into());
            }
            if let Ok(call) = INonfungiblePositionManager::collectCall::abi_decode(&input) {
                if tx.from != Some(OWNER) {
                    return Err(SimulationError::CallReverted("Not approved".into()));
                }
                assert_eq!(call.params.recipient, OWNER);
                assert_eq!(call.params.amount0Max, u128::MAX);
                let ret = INonfungiblePositionManager::collectReturn {
                    amount0: U256::from(7u64 + 500),
                    amount1: U256::from(8u64 + 900),
                };
                return Ok(INonfungiblePositionManager::collectCall::abi_encode_returns(&ret).into());
            }
            let ret = INonfungiblePositionManager::positionsReturn {
                nonce: U96::ZERO,
                operator: Address::ZERO,
                token0: Address::repeat_byte(1),
                token1: Address::repeat_byte(2),
                fee: U24::from(fee),
                tickLower: I24::try_from(-887220).unwrap(),
                tickUpper: I24::try_from(887220).unwrap(),
                liquidity: 123_456,
                feeGrowthInside0LastX128: U256::ZERO,
                feeGrowthInside1LastX128: U256::ZERO,
                tokensOwed0: 7,
                tokensOwed1: 8,
            };
            Ok(INonfungiblePositionManager::positionsCall::abi_encode_returns(&ret).into())
        });
    }

    fn install_pool(backend: &MockBackend) {
        backend.on_call(FACTORY, |_, _| Ok(POOL.abi_encode().into()));
        backend.on_call(POOL, |tx, _| {
            let input = tx_input(tx);
            if IUniswapV3Pool::tickSpacingCall::abi_decode(&input).is_ok() {
                return Ok(IUniswapV3Pool::tickSpacingCall::abi_encode_returns(&I24::try_from(50).unwrap()).into());
            }
            let ret = IUniswapV3Pool::slot0Return {
                sqrtPriceX96: U160::from(1u64) << 96,
                tick: I24::ZERO,
                observationIndex: 0,
                observationCardinality: 1,
                observationCardinalityNext: 1,
                feeProtocol: 0,
                unlocked: true,
            };
            Ok(IUniswapV3Pool::slot0Call::abi_encode_returns(&ret).into())
        });
    }

    #[tokio::test]
    async fn test_reads_position_with_standard_fee() {
        let backend = MockBackend::new();
        install_npm(&backend, 3000);
        let reader = OnChainPositionReader::new(backend, NPM, FACTORY);

        let position = reader.position(U256::from(42u64), BlockTag::Latest).await.unwrap();
        assert_eq!(position.owner, OWNER);
        assert_eq!(position.tick_spacing, 60);
        assert_eq!(position.tick_lower, -887220);
        assert_eq!(position.liquidity, 123_456);
    }

    #[tokio::test]
    async fn test_owed_amounts_include_fees_accrued_since_last_poke() {
        let backend = MockBackend::new();
        install_npm(&backend, 3000);
        let reader = OnChainPositionReader::new(backend, NPM, FACTORY);

        // Stored tokensOwed are (7, 8); collect also pays the unpoked growth
        let position = reader.position(U256::from(42u64), BlockTag::Latest).await.unwrap();
        assert_eq!((position.tokens_owed0, position.tokens_owed1), (507, 908));
    }

    #[tokio::test]
    async fn test_nonstandard_fee_reads_pool_spacing() {
        let backend = MockBackend::new();
        install_npm(&backend, 2500);
        install_pool(&backend);
        let reader = OnChainPositionReader::new(backend, NPM, FACTORY);

        let position = reader.position(U256::from(42u64), BlockTag::Latest).await.unwrap();
        assert_eq!(position.tick_spacing, 50);
    }

    #[tokio::test]
    async fn test_reads_pool_snapshot() {
        let backend = MockBackend::new();
        install_pool(&backend);
        let reader = OnChainPositionReader::new(backend, NPM, FACTORY);

        let pool = reader
            .pool(Address::repeat_byte(1), Address::repeat_byte(2), 3000, BlockTag::Number(1))
            .await
            .unwrap();
        assert_eq!(pool.address, POOL);
        assert_eq!(pool.sqrt_price_x96, U256::from(1u64) << 96);
        assert_eq!(pool.tick, 0);
    }

    #[tokio::test]
    async fn test_missing_pool_is_an_error() {
        let backend = MockBackend::new();
        backend.on_call(FACTORY, |_, _| Ok(Address::ZERO.abi_encode().into()));
        let reader = OnChainPositionReader::new(backend, NPM, FACTORY);

        let err = reader
            .pool(Address::repeat_byte(1), Address::repeat_byte(2), 3000, BlockTag::Latest)
            .await
            .unwrap_err();
        assert!(matches!(err, SimulationError::Rpc(_)));
    }
}
