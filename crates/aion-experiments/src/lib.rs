pub mod assignment;
pub mod engine;
pub mod errors;
pub mod model;
pub mod statistics;

pub use assignment::{hash_to_percentile, select_variant, stable_hash};
pub use engine::ExperimentEngine;
pub use errors::{ExperimentError, ExperimentResult};
pub use model::{
    Experiment, ExperimentKind, ExperimentStatus, StatisticalResults, UserAssignment, Variant,
    VariantMetrics,
};
pub use statistics::{StatisticsEngine, ThresholdStub};
