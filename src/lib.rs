// Modules
pub mod binning;
pub mod booster;
pub mod causal;
pub mod constants;
pub mod data;
pub mod dataset;
pub mod errors;
pub mod learner;
pub mod objective;
pub mod preprocess;
pub mod tree;
pub mod utils;

// Individual classes, and functions
pub use booster::{BoosterConfig, GradientBooster, ModelIO};
pub use causal::{Ate, BiasConfig, CausalConfig, CausalModel, MatchFailurePolicy, MetalearnerKind};
pub use data::{FeatureMatrix, Matrix};
pub use dataset::{Column, Dataset, Value};
pub use errors::CausalError;
pub use learner::{Estimator, Task};
