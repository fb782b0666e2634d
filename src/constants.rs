pub const TREATMENT_COL: &str = "treatment";
pub const OUTCOME_COL: &str = "outcome";
pub const TEXT_COL: &str = "text";
pub const EFFECT_COL: &str = "treatment_effect";
pub const NA_CONT_VALUE: f64 = -1.0;
pub const NA_CAT_VALUE: &str = "MISSING";
pub const CONTROL_NAME: f64 = 0.0;
pub const SEED: u64 = 42;
pub const PROPENSITY_N_FOLD: usize = 3;
pub const PROPENSITY_SEED: u64 = 42;
pub const MATCHING_SEED: u64 = 423;
pub const PROPENSITY_CLIP: f64 = 1e-3;
pub const HESSIAN_EPS: f64 = 1e-12;
