//! Causal
//!
//! Treatment effect estimation with metalearners, and propensity-score matching to reduce
//! covariate imbalance between the treated and control groups.
pub mod balance;
pub mod bias;
pub mod config;
pub mod matching;
pub mod metalearners;
pub mod model;
pub mod propensity;


pub use balance::BalanceTable;
pub use bias::{BiasMinimizer, MatchStatus, MatchedSample};
pub use config::{BiasConfig, CausalConfig, MatchFailurePolicy};
pub use matching::NearestNeighborMatch;
pub use metalearners::{Metalearner, MetalearnerKind, MetalearnerRegistry, RLearner, TLearner, XLearner};
pub use model::{Ate, CausalModel, Features};
pub use propensity::{ElasticNetPropensityModel, PropensityModel};
