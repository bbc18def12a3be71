//! Pruner: after each step, remove candidates that can never win again.

use crate::list::{CandidateList, NodeId};

/// Remove every active candidate `c` (with `c.n <= i`, i.e. already reached) that is either
/// PELT-dominated (`c.seg_cost > opt_cost + penalty_change`) or has hit the maximum segment
/// length. Candidates not yet reached (`c.n > i`) are left untouched — their statistics are
/// still zeroed and not yet meaningful.
pub(crate) fn prune(i: usize, list: &mut CandidateList, opt_cost: f64, penalty_change: f64) {
    let threshold = opt_cost + penalty_change;

    let dominated: Vec<NodeId> = list
        .iter()
        .filter(|&id| {
            let node = list.get(id);
            node.n <= i && (node.seg_cost > threshold || i >= node.destroy_at)
        })
        .collect();

    for id in dominated {
        list.unlink(id);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cost::Family;

    #[test]
    fn dominated_candidate_is_unlinked() {
        let x = vec![0.0, 0.0, 0.0, 100.0, 0.0];
        let mut list = CandidateList::populate(&x, 100).expect("alloc");

        for i in 1..=4 {
            Family::Mean.update(i, &mut list, 1.0);
            // Manually resolve opt_cost as the minimum active seg_cost for this test.
            let opt_cost = list
                .iter()
                .filter(|&id| list.get(id).n <= i)
                .map(|id| list.get(id).seg_cost)
                .fold(f64::MAX, f64::min);
            prune(i, &mut list, opt_cost, 1.0);
        }

        // After the huge jump at position 4, position-1's background-only candidate should
        // have become dominated and pruned out by the time we reach position 4.
        let remaining: Vec<_> = list.iter().map(|id| list.get(id).n).collect();
        assert!(remaining.contains(&4));
    }

    #[test]
    fn max_segment_length_cap_unlinks_candidate() {
        let x = vec![1.0, 1.0, 1.0, 1.0, 1.0];
        let mut list = CandidateList::populate(&x, 3).expect("alloc");

        for i in 1..=5 {
            Family::Mean.update(i, &mut list, 0.0);
            prune(i, &mut list, 0.0, 0.0);
        }

        // maxseglength = 3: the candidate starting at n = 1 must have been unlinked by i = 4.
        let remaining: Vec<_> = list.iter().map(|id| list.get(id).n).collect();
        assert!(!remaining.contains(&1));
    }
}
