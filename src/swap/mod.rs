//! Swap planning: in-pool optimum, aggregator routing, quote caching

pub mod aggregator;
pub mod planner;
pub mod quote_cache;

pub use aggregator::{AggregatorClient, AggregatorQuote, QuoteRequest, SwapQuoter};
pub use planner::{OptimalSwap, OptimalSwapPlanner, PlannedSwap, PlannerSettings, SwapPlan, SwapRequest};
pub use quote_cache::{Clock, SystemClock, TtlCache};
