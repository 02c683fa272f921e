//! Simulation pipeline
//!
//! - `provider`: the RPC seam (access lists, overridden eth_call)
//! - `executor`: one simulated call with optional overrides
//! - `actions`: automation-contract calls and their return shapes
//! - `orchestrator`: the staged preview run

pub mod actions;
pub mod executor;
pub mod orchestrator;
pub mod provider;

pub use actions::{AutomationAction, CallArgs, MintRequest, Permit, SimulatedResult};
pub use executor::SimulatedCallExecutor;
pub use orchestrator::{
    RebalanceSimulationOrchestrator, SimulationFailure, SimulationReport, SimulationRequest,
    SimulationSettings, Stage,
};
pub use provider::{BlockTag, RpcBackend, SimulationBackend};
