pub mod batch;
pub mod calibration;
pub mod context;
pub mod copula;
pub mod kelly;
pub mod minutes;
pub mod negbin;
pub mod normal;
pub mod odds;
pub mod pricing;
pub mod priors;
pub mod rate;
pub mod simulator;
pub mod summary;

pub use context::{AdjustmentSet, ContextAdjuster, GameContext};
pub use minutes::{MinutesDistributionSpec, MinutesModel};
pub use pricing::{ConfidenceTier, EdgeAssessment, EdgePricer, RationaleContext};
pub use priors::PriorEngine;
pub use rate::RateParameters;
pub use simulator::{JointSimulation, SimulationEngine, SimulationOutput};
pub use summary::SimulationResult;
