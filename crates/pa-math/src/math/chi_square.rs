//! Chi-square significance testing for frequency comparisons.
//!
//! The outlier analysis compares how often a variable term occurs in two
//! populations. Each population contributes an observation vector of counts
//! over the same bins, and the test asks whether both vectors could have been
//! drawn from the same distribution.
//!
//! The statistic follows the two-data-set comparison form: with bin counts
//! `K_i` and `L_i` and totals `ΣK`, `ΣL`,
//!
//! ```text
//! w     = sqrt(ΣK / ΣL)
//! χ²    = Σ (K_i / w - L_i · w)² / (K_i + L_i)
//! ```
//!
//! which reduces to `Σ (K_i - L_i)² / (K_i + L_i)` when the totals agree. The
//! statistic has `bins - 1` degrees of freedom.

use serde::Serialize;

use super::gamma::gamma_q;

/// Survival function `P(X > x)` of the chi-square distribution with `dof`
/// degrees of freedom.
///
/// Returns 1.0 for `x <= 0` and NaN for a non-positive `dof`.
pub fn chi_square_survival(x: f64, dof: f64) -> f64 {
    if x.is_nan() || dof.is_nan() || dof <= 0.0 {
        return f64::NAN;
    }
    if x <= 0.0 {
        return 1.0;
    }
    gamma_q(dof / 2.0, x / 2.0)
}

/// Outcome of comparing two observation vectors.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct ChiSquareComparison {
    /// The chi-square statistic.
    pub statistic: f64,
    /// Degrees of freedom (`bins - 1`).
    pub degrees_of_freedom: f64,
    /// Probability of a statistic at least this large under the null
    /// hypothesis that both vectors share one distribution.
    pub p_value: f64,
}

impl ChiSquareComparison {
    /// Whether the null hypothesis is rejected at significance level `alpha`.
    ///
    /// Only `0 < alpha <= 0.5` is meaningful; anything else never rejects.
    pub fn rejects_null(&self, alpha: f64) -> bool {
        if !(alpha > 0.0 && alpha <= 0.5) {
            return false;
        }
        self.p_value < alpha
    }
}

/// Compare two observation vectors over the same bins.
///
/// Returns `None` when the comparison is undefined: fewer than two bins,
/// vectors of different length, a population with zero total, or a bin that
/// is empty in both vectors.
pub fn chi_square_data_sets_comparison(
    observed1: &[u64],
    observed2: &[u64],
) -> Option<ChiSquareComparison> {
    if observed1.len() < 2 || observed1.len() != observed2.len() {
        return None;
    }

    let sum1: u64 = observed1.iter().sum();
    let sum2: u64 = observed2.iter().sum();
    if sum1 == 0 || sum2 == 0 {
        return None;
    }

    let unequal_totals = sum1 != sum2;
    let weight = if unequal_totals {
        (sum1 as f64 / sum2 as f64).sqrt()
    } else {
        1.0
    };

    let mut statistic = 0.0;
    for (&k, &l) in observed1.iter().zip(observed2) {
        if k == 0 && l == 0 {
            return None;
        }
        let (k, l) = (k as f64, l as f64);
        let dev = if unequal_totals {
            k / weight - l * weight
        } else {
            k - l
        };
        statistic += dev * dev / (k + l);
    }

    let degrees_of_freedom = (observed1.len() - 1) as f64;
    Some(ChiSquareComparison {
        statistic,
        degrees_of_freedom,
        p_value: chi_square_survival(statistic, degrees_of_freedom),
    })
}
