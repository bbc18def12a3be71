//! Optimal-option selector: for each step, choose among extend-background, point-anomaly, or
//! close-a-collective-anomaly.

use crate::cost::Family;
use crate::list::{CandidateList, NodeId, Option_};

/// Outcome of resolving step `i`.
#[derive(Debug, Clone, Copy)]
pub(crate) struct StepResult {
    pub opt_cost: f64,
    pub opt_cut: NodeId,
    pub option: Option_,
}

/// Resolve step `i`: pick the minimum of Option 0/1/2, ties broken by lower option number and
/// then by earliest `n`.
pub(crate) fn select(
    family: Family,
    i: usize,
    list: &CandidateList,
    penalty_outlier: f64,
    min_seg_length: usize,
) -> StepResult {
    let current = list.get(list.by_position(i));
    let optcost_prev = current.optcost_prev;
    let background_cut = list.by_position(i - 1);

    // Option 0: extend background.
    let mut best_cost = optcost_prev;
    let mut best_cut = background_cut;
    let mut best_option = Option_::Background;

    // Option 1: point anomaly. Cut is the same as background's: declaring x[i] anomalous
    // doesn't change what the *previous* optimal prefix was.
    let point_cost = optcost_prev - family.point_saving(current.observation) + penalty_outlier;
    if point_cost < best_cost {
        best_cost = point_cost;
        best_cut = background_cut;
        best_option = Option_::PointAnomaly;
    }

    // Option 2: close a collective anomaly at the best active candidate whose segment would
    // already satisfy the minimum length, `c.n <= i - minseglength + 1`.
    let threshold = i as isize + 1 - min_seg_length as isize;
    if threshold >= 1 {
        let threshold = threshold as usize;
        for id in list.iter() {
            let node = list.get(id);
            if node.n > threshold {
                break;
            }
            if node.seg_cost < best_cost {
                best_cost = node.seg_cost;
                best_cut = list.by_position(node.n - 1);
                best_option = Option_::Collective;
            }
        }
    }

    StepResult {
        opt_cost: best_cost,
        opt_cut: best_cut,
        option: best_option,
    }
}
