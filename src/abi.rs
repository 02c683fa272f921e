//! Contract interfaces used by the preview pipeline

use alloy_sol_types::sol;

sol! {
    /// Liquidity automation contract (Automan)
    #[derive(Debug, PartialEq, Eq)]
    interface IAutoman {
        struct MintParams {
            address token0;
            address token1;
            uint24 fee;
            int24 tickLower;
            int24 tickUpper;
            uint256 amount0Desired;
            uint256 amount1Desired;
            uint256 amount0Min;
            uint256 amount1Min;
            address recipient;
            uint256 deadline;
        }

        struct IncreaseLiquidityParams {
            uint256 tokenId;
            uint256 amount0Desired;
            uint256 amount1Desired;
            uint256 amount0Min;
            uint256 amount1Min;
            uint256 deadline;
        }

        struct DecreaseLiquidityParams {
            uint256 tokenId;
            uint128 liquidity;
            uint256 amount0Min;
            uint256 amount1Min;
            uint256 deadline;
        }

        function isWhiteListedSwapRouter(address router) external view returns (bool);

        function getOptimalSwap(
            address pool,
            int24 tickLower,
            int24 tickUpper,
            uint256 amount0Desired,
            uint256 amount1Desired
        ) external view returns (uint256 amountIn, uint256 amountOut, bool zeroForOne, uint160 sqrtPriceX96);

        function mintOptimal(MintParams memory params, bytes calldata swapData)
            external payable
            returns (uint256 tokenId, uint128 liquidity, uint256 amount0, uint256 amount1);

        function decreaseLiquidity(DecreaseLiquidityParams memory params, uint256 feeBips)
            external
            returns (uint256 amount0, uint256 amount1);

        function decreaseLiquidity(
            DecreaseLiquidityParams memory params,
            uint256 feeBips,
            uint256 permitDeadline,
            uint8 v,
            bytes32 r,
            bytes32 s
        ) external returns (uint256 amount0, uint256 amount1);

        function decreaseLiquiditySingle(
            DecreaseLiquidityParams memory params,
            bool zeroForOne,
            uint256 feeBips,
            bytes calldata swapData
        ) external returns (uint256 amount);

        function decreaseLiquiditySingle(
            DecreaseLiquidityParams memory params,
            bool zeroForOne,
            uint256 feeBips,
            bytes calldata swapData,
            uint256 permitDeadline,
            uint8 v,
            bytes32 r,
            bytes32 s
        ) external returns (uint256 amount);

        function removeLiquidity(DecreaseLiquidityParams memory params, uint256 feeBips)
            external
            returns (uint256 amount0, uint256 amount1);

        function removeLiquidity(
            DecreaseLiquidityParams memory params,
            uint256 feeBips,
            uint256 permitDeadline,
            uint8 v,
            bytes32 r,
            bytes32 s
        ) external returns (uint256 amount0, uint256 amount1);

        function reinvest(IncreaseLiquidityParams memory params, uint256 feeBips, bytes calldata swapData)
            external
            returns (uint128 liquidity, uint256 amount0, uint256 amount1);

        function reinvest(
            IncreaseLiquidityParams memory params,
            uint256 feeBips,
            bytes calldata swapData,
            uint256 permitDeadline,
            uint8 v,
            bytes32 r,
            bytes32 s
        ) external returns (uint128 liquidity, uint256 amount0, uint256 amount1);

        function rebalance(MintParams memory params, uint256 tokenId, uint256 feeBips, bytes calldata swapData)
            external
            returns (uint256 newTokenId, uint128 liquidity, uint256 amount0, uint256 amount1);

        function rebalance(
            MintParams memory params,
            uint256 tokenId,
            uint256 feeBips,
            bytes calldata swapData,
            uint256 permitDeadline,
            uint8 v,
            bytes32 r,
            bytes32 s
        ) external returns (uint256 newTokenId, uint128 liquidity, uint256 amount0, uint256 amount1);
    }

    /// Uniswap V3 NonfungiblePositionManager
    #[derive(Debug)]
    interface INonfungiblePositionManager {
        struct CollectParams {
            uint256 tokenId;
            address recipient;
            uint128 amount0Max;
            uint128 amount1Max;
        }

        function positions(uint256 tokenId) external view returns (
            uint96 nonce,
            address operator,
            address token0,
            address token1,
            uint24 fee,
            int24 tickLower,
            int24 tickUpper,
            uint128 liquidity,
            uint256 feeGrowthInside0LastX128,
            uint256 feeGrowthInside1LastX128,
            uint128 tokensOwed0,
            uint128 tokensOwed1
        );
        function ownerOf(uint256 tokenId) external view returns (address);
        function isApprovedForAll(address owner, address operator) external view returns (bool);
        function collect(CollectParams calldata params) external payable returns (uint256 amount0, uint256 amount1);
    }

    /// Uniswap V3 Factory
    #[derive(Debug)]
    interface IUniswapV3Factory {
        function getPool(address tokenA, address tokenB, uint24 fee) external view returns (address);
    }

    /// Uniswap V3 Pool (state reads only)
    #[derive(Debug)]
    interface IUniswapV3Pool {
        function slot0() external view returns (
            uint160 sqrtPriceX96,
            int24 tick,
            uint16 observationIndex,
            uint16 observationCardinality,
            uint16 observationCardinalityNext,
            uint8 feeProtocol,
            bool unlocked
        );
        function tickSpacing() external view returns (int24);
    }
}
