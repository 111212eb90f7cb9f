//! Process analytics math utilities.

pub mod math;

pub use math::chi_square::{
    chi_square_data_sets_comparison, chi_square_survival, ChiSquareComparison,
};
pub use math::extended_stats::ExtendedStats;
pub use math::gamma::{gamma_p, gamma_q};
pub use math::stable::log_gamma;
