//! Cost kernel: per-family sufficient-statistic updates and penalized segment savings.
//!
//! Family choice is a tagged `enum`, matched once per candidate per step; there is no trait
//! object and no dynamic dispatch in the inner loop, per the re-architecture note this crate
//! follows over the original's parallel per-family function names.

use crate::list::{CandidateList, LN_FLOOR, Node, SENTINEL_COST};

/// Segment cost model, also known as the loss/saving function.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Family {
    /// Mean-shift Gaussian cost with known unit baseline variance.
    #[default]
    Mean,
    /// Mean-and-variance Gaussian cost (profile likelihood vs. a `N(0, 1)` baseline).
    MeanVar,
    /// Poisson rate cost vs. a unit baseline rate.
    Poisson,
}

impl Family {
    /// Walk every active candidate `c` with `c.n <= i`, fold in `x[i]`, and recompute
    /// `c.seg_cost`. Stops at the first candidate whose `n > i` since candidates are linked in
    /// increasing `n` order and the pre-populated tail of the list hasn't started yet.
    pub(crate) fn update(self, i: usize, list: &mut CandidateList, penalty_change: f64) {
        let x = list.get(list.by_position(i)).observation;

        let mut current = list.get(list.head()).next;
        loop {
            if current == list.tail() {
                break;
            }
            let node = list.get_mut(current);
            if node.n > i {
                break;
            }

            self.update_stats(node, x);

            let k = i - node.n + 1;
            let saving = self.saving_from_stats(node.cum_sum, node.cum_sum_sq, k as f64);
            let seg_cost = node.optcost_prev - saving + penalty_change;
            node.seg_cost = if seg_cost.is_finite() {
                seg_cost
            } else {
                SENTINEL_COST
            };

            current = node.next;
        }
    }

    /// Fold `x` into this candidate's running sufficient statistics.
    #[inline]
    fn update_stats(self, node: &mut Node, x: f64) {
        node.cum_sum += x;
        if matches!(self, Self::MeanVar) {
            node.cum_sum_sq += x * x;
        }
    }

    /// The family's saving (reduction in negative log-likelihood vs. the standardized
    /// baseline) for a segment of length `k` with the given running sum/sum-of-squares.
    ///
    /// Shared by segment savings (`cum_sum`/`cum_sum_sq` accumulated over `[s, i]`) and the
    /// single-sample point-anomaly saving (`k = 1`, `cum_sum = x`, `cum_sum_sq = x^2`).
    fn saving_from_stats(self, cum_sum: f64, cum_sum_sq: f64, k: f64) -> f64 {
        match self {
            Self::Mean => {
                let mean = cum_sum / k;
                k * mean * mean
            }
            Self::MeanVar => {
                let mean = cum_sum / k;
                let variance = (cum_sum_sq / k - mean * mean).max(LN_FLOOR);
                k * (1.0 + variance.ln() - variance) / 2.0
            }
            Self::Poisson => {
                let lambda = cum_sum / k;
                if lambda > 0.0 {
                    k * (1.0 - lambda + lambda * lambda.ln())
                } else {
                    k
                }
            }
        }
    }

    /// Single-sample saving used by Option 1 (point anomaly).
    pub(crate) fn point_saving(self, x: f64) -> f64 {
        self.saving_from_stats(x, x * x, 1.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::list::NodeId;

    #[test]
    fn mean_saving_matches_squared_mean() {
        let saving = Family::Mean.saving_from_stats(6.0, 0.0, 3.0);
        // mean = 2, k * mean^2 = 3 * 4 = 12
        assert_eq!(saving, 12.0);
    }

    #[test]
    fn mean_point_saving_is_squared_value() {
        assert_eq!(Family::Mean.point_saving(5.0), 25.0);
    }

    #[test]
    fn poisson_zero_rate_guard() {
        let saving = Family::Poisson.saving_from_stats(0.0, 0.0, 4.0);
        assert_eq!(saving, 4.0);
    }

    #[test]
    fn poisson_positive_rate_matches_formula() {
        let saving = Family::Poisson.saving_from_stats(8.0, 0.0, 4.0);
        let lambda = 2.0_f64;
        let expected = 4.0 * (1.0 - lambda + lambda * lambda.ln());
        assert!((saving - expected).abs() < 1e-12);
    }

    #[test]
    fn mean_var_floors_non_positive_variance() {
        // cum_sum_sq/k - mean^2 == 0 exactly (constant segment): variance floored, no NaN.
        let saving = Family::MeanVar.saving_from_stats(6.0, 12.0, 3.0);
        assert!(saving.is_finite());
    }

    #[test]
    fn non_finite_observation_yields_sentinel_cost_not_nan() {
        let mut list = CandidateList::populate(&[f64::INFINITY, 1.0, 2.0], 10).expect("alloc");
        Family::Mean.update(1, &mut list, 5.0);
        let node = list.get(NodeId(1));
        assert_eq!(node.seg_cost, SENTINEL_COST);
    }
}
