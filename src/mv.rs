//! Multivariate CAPA variant: the same pruned DP skeleton, but each candidate segment also
//! chooses *which* series are affected and with what onset/offset lag within the window.
//!
//! The per-component subset/lag selection rule is an explicit extension point (see
//! `DESIGN.md`): only the data contract (`affectedcomponents`/`startlag`/`endlag`) is given,
//! not a selection algorithm. This module
//! implements the common MVCAPA approach — score every component independently, then greedily
//! keep the components whose marginal saving exceeds their share of the segmentation penalty —
//! using a symmetric lag trim (the same `lag` trimmed from both ends of the window) to stay
//! within the `p * (l + 1)` per-candidate cost budget the data model specifies.

use smallvec::SmallVec;

use crate::cancel::{CancellationToken, NeverCancel};
use crate::cost::Family;
use crate::list::SENTINEL_COST;
use crate::{Error, Option_, SolveStatus, cancel::POLL_INTERVAL, validate};

/// Components are usually few (a handful of correlated sensors/series); inline up to 8 before
/// spilling to the heap.
const INLINE_COMPONENTS: usize = 8;

type Components<T> = SmallVec<T, INLINE_COMPONENTS>;

/// Arena index, local to [`MvList`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct MvNodeId(usize);

/// A multivariate candidate node: the univariate fields plus one entry per component.
struct MvNode {
    n: usize,
    observation: Components<f64>,
    cum_sum: Components<f64>,
    best_saving: Components<f64>,
    best_lag: Components<u32>,
    optcost_prev: f64,
    seg_cost: f64,
    opt_cost: f64,
    opt_cut: MvNodeId,
    option: Option<Option_>,
    affected: Components<bool>,
    start_lag: Components<u32>,
    end_lag: Components<u32>,
    destroy_at: usize,
    next: MvNodeId,
    prev: MvNodeId,
}

impl MvNode {
    fn empty(n: usize, p: usize) -> Self {
        Self {
            n,
            observation: SmallVec::from_elem(0.0, p),
            cum_sum: SmallVec::from_elem(0.0, p),
            best_saving: SmallVec::from_elem(0.0, p),
            best_lag: SmallVec::from_elem(0, p),
            optcost_prev: 0.0,
            seg_cost: 0.0,
            opt_cost: 0.0,
            opt_cut: MvNodeId(0),
            option: None,
            affected: SmallVec::from_elem(false, p),
            start_lag: SmallVec::from_elem(0, p),
            end_lag: SmallVec::from_elem(0, p),
            destroy_at: usize::MAX,
            next: MvNodeId(0),
            prev: MvNodeId(0),
        }
    }
}

/// Arena-backed doubly-linked active-candidate list, one per-component set of statistics per
/// node. Same shape as [`crate::list::CandidateList`], generalized to `p` components.
struct MvList {
    nodes: Vec<MvNode>,
    tail: MvNodeId,
    p: usize,
}

impl MvList {
    fn populate(x: &[f64], n: usize, p: usize, max_seg_length: usize) -> Result<Self, Error> {
        let mut nodes = Vec::new();
        nodes
            .try_reserve_exact(n + 2)
            .map_err(|_| Error::Allocation)?;

        nodes.push(MvNode::empty(0, p));

        for position in 1..=n {
            let mut node = MvNode::empty(position, p);
            for component in 0..p {
                node.observation[component] = x[component * n + position - 1];
            }
            node.destroy_at = position + max_seg_length - 1;
            node.next = MvNodeId(position + 1);
            node.prev = MvNodeId(position - 1);
            nodes.push(node);
        }

        let tail = MvNodeId(n + 1);
        let mut tail_node = MvNode::empty(n + 1, p);
        tail_node.prev = MvNodeId(n);
        nodes.push(tail_node);

        Ok(Self { nodes, tail, p })
    }

    const fn head(&self) -> MvNodeId {
        MvNodeId(0)
    }

    const fn tail(&self) -> MvNodeId {
        self.tail
    }

    fn get(&self, id: MvNodeId) -> &MvNode {
        &self.nodes[id.0]
    }

    fn get_mut(&mut self, id: MvNodeId) -> &mut MvNode {
        &mut self.nodes[id.0]
    }

    fn by_position(&self, position: usize) -> MvNodeId {
        MvNodeId(position)
    }

    fn unlink(&mut self, id: MvNodeId) {
        debug_assert!(id != MvNodeId(0), "head sentinel must never be unlinked");
        debug_assert!(id != self.tail, "tail sentinel must never be unlinked");
        let prev = self.nodes[id.0].prev;
        let next = self.nodes[id.0].next;
        self.nodes[prev.0].next = next;
        self.nodes[next.0].prev = prev;
    }

    fn iter(&self) -> MvIter<'_> {
        MvIter {
            list: self,
            current: self.nodes[0].next,
        }
    }
}

/// Forward traversal of active multivariate candidates, in strictly increasing `n` order.
struct MvIter<'a> {
    list: &'a MvList,
    current: MvNodeId,
}

impl Iterator for MvIter<'_> {
    type Item = MvNodeId;

    fn next(&mut self) -> Option<MvNodeId> {
        if self.current == self.list.tail {
            return None;
        }
        let id = self.current;
        self.current = self.list.get(id).next;
        Some(id)
    }
}

/// One resolved multivariate segment boundary.
#[derive(Debug, Clone)]
pub struct MvChangepoint {
    /// First position (1-based) of the segment.
    pub start: usize,
    /// Last position (1-based) of the segment.
    pub end: usize,
    /// Which option produced this segment.
    pub option: Option_,
    /// Per-component participation in a collective anomaly (meaningless for `Background`).
    pub affected_components: Vec<bool>,
    /// Per-component onset lag (samples into the window before the component is considered
    /// affected).
    pub start_lag: Vec<u32>,
    /// Per-component offset lag (samples before the window's end where the component stops
    /// being considered affected).
    pub end_lag: Vec<u32>,
}

/// Result of running [`MvCapa::solve`].
#[derive(Debug, Clone)]
pub struct MvSolution {
    /// Whether the DP completed or was cancelled.
    pub status: SolveStatus,
    changepoints: Vec<MvChangepoint>,
}

impl MvSolution {
    /// The resolved segments, in chronological order.
    #[must_use]
    pub fn changepoints(&self) -> &[MvChangepoint] {
        &self.changepoints
    }
}

/// CAPA multivariate penalized dynamic program.
///
/// Always uses the mean-shift cost family per component (the data model's `mean_of_xs` field
/// carries no second moment); [`crate::Capa`] covers the univariate mean+variance and Poisson
/// families.
///
/// # Defaults
///
/// - `lag`: `0` (no onset/offset slack; a collective anomaly affects a component for its whole
///   window or not at all)
/// - `penalty_change` / `penalty_outlier`: `0.0`
/// - `min_seg_length`: `2`
/// - `max_seg_length`: unbounded
/// - cancellation token: [`NeverCancel`]
#[derive(Debug, Clone, Copy)]
pub struct MvCapa<C: CancellationToken = NeverCancel> {
    components: usize,
    lag: u32,
    penalty_change: f64,
    penalty_outlier: f64,
    min_seg_length: usize,
    max_seg_length: usize,
    cancellation: C,
}

impl MvCapa<NeverCancel> {
    /// Construct a new `MvCapa` for `components` series.
    ///
    /// # Panics
    ///
    /// Panics if `components == 0`; the number of series must be at least 1.
    #[must_use]
    pub fn new(components: usize) -> Self {
        assert!(components >= 1, "components (p) must be >= 1");
        Self {
            components,
            lag: 0,
            penalty_change: 0.0,
            penalty_outlier: 0.0,
            min_seg_length: 2,
            max_seg_length: usize::MAX,
            cancellation: NeverCancel,
        }
    }
}

impl<C: CancellationToken> MvCapa<C> {
    /// Set the maximum within-window onset/offset lag `l`. Must satisfy `0 <= l < minseglength`
    /// (checked at `solve` time).
    #[must_use]
    pub const fn with_lag(mut self, lag: u32) -> Self {
        self.lag = lag;
        self
    }

    /// Set the penalty `β` added per collective anomaly.
    #[must_use]
    pub const fn with_penalty_change(mut self, penalty_change: f64) -> Self {
        self.penalty_change = penalty_change;
        self
    }

    /// Set the penalty `β'` added per point anomaly.
    #[must_use]
    pub const fn with_penalty_outlier(mut self, penalty_outlier: f64) -> Self {
        self.penalty_outlier = penalty_outlier;
        self
    }

    /// Set the minimum allowable length of a collective anomaly.
    #[must_use]
    pub const fn with_min_seg_length(mut self, min_seg_length: std::num::NonZero<usize>) -> Self {
        self.min_seg_length = min_seg_length.get();
        self
    }

    /// Set the maximum allowable length of a collective anomaly.
    #[must_use]
    pub const fn with_max_seg_length(mut self, max_seg_length: std::num::NonZero<usize>) -> Self {
        self.max_seg_length = max_seg_length.get();
        self
    }

    /// Inject a [`CancellationToken`], polled every [`POLL_INTERVAL`] steps.
    #[must_use]
    pub fn with_cancellation_token<C2: CancellationToken>(self, token: C2) -> MvCapa<C2> {
        MvCapa {
            components: self.components,
            lag: self.lag,
            penalty_change: self.penalty_change,
            penalty_outlier: self.penalty_outlier,
            min_seg_length: self.min_seg_length,
            max_seg_length: self.max_seg_length,
            cancellation: token,
        }
    }

    /// Run the DP over `x`, laid out component-major: `x[j * n + t]` is series `j`'s value at
    /// time `t` (`0 <= t < n`).
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidParameter`] if the parameter constraints are violated, or
    /// [`Error::Allocation`] if the backing store cannot be reserved.
    pub fn solve(&self, x: &[f64]) -> Result<MvSolution, Error> {
        let p = self.components;
        if p == 0 || !x.len().is_multiple_of(p) {
            return Err(Error::InvalidParameter(
                "x length must be a non-zero multiple of the component count",
            ));
        }
        let n = x.len() / p;

        let max_seg_length = if self.max_seg_length == usize::MAX {
            n.max(1)
        } else {
            self.max_seg_length
        };
        validate(
            n,
            self.penalty_change,
            self.penalty_outlier,
            self.min_seg_length,
            max_seg_length,
        )?;
        if self.lag as usize >= self.min_seg_length {
            return Err(Error::InvalidParameter("lag must be < minseglength"));
        }

        let span = tracing::info_span!("capa::mv_solve", p, n, lag = self.lag);
        let _entered = span.enter();

        let mut list = MvList::populate(x, n, p, max_seg_length)?;

        for i in 1..=n {
            update(i, &mut list, self.penalty_change, self.lag, self.min_seg_length);

            let step = select(i, &list, self.penalty_outlier, self.min_seg_length);

            {
                let node = list.get_mut(list.by_position(i));
                node.opt_cost = step.opt_cost;
                node.opt_cut = step.opt_cut;
                node.option = Some(step.option);
            }
            list.get_mut(list.by_position(i + 1)).optcost_prev = step.opt_cost;

            prune(i, &mut list, step.opt_cost, self.penalty_change);

            if i % POLL_INTERVAL == 0 && self.cancellation.is_cancelled() {
                return Ok(MvSolution {
                    status: SolveStatus::Cancelled,
                    changepoints: Vec::new(),
                });
            }
        }

        let changepoints = traceback(&list, n);
        Ok(MvSolution {
            status: SolveStatus::Completed,
            changepoints,
        })
    }
}

/// Sum of `p`-component observations over `[from, to]` (inclusive, 1-based), read straight out
/// of the arena since every position is pre-populated.
fn windowed_sum(list: &MvList, component: usize, from: usize, to: usize) -> f64 {
    if from > to {
        return 0.0;
    }
    (from..=to)
        .map(|position| list.get(list.by_position(position)).observation[component])
        .sum()
}

/// Update every active candidate's per-component running sums and its overall `seg_cost`,
/// folding in the component subset/lag selection from the module doc comment.
fn update(i: usize, list: &mut MvList, penalty_change: f64, lag: u32, min_seg_length: usize) {
    let p = list.p;
    let x_i: Components<f64> = (0..p)
        .map(|component| list.get(list.by_position(i)).observation[component])
        .collect();

    let mut current = list.get(list.head()).next;
    loop {
        if current == list.tail() {
            break;
        }
        let n = list.get(current).n;
        if n > i {
            break;
        }

        for component in 0..p {
            list.get_mut(current).cum_sum[component] += x_i[component];
        }

        let k = i - n + 1;
        let (total_saving, affected, start_lag, end_lag) =
            select_components(list, current, n, i, k, lag, min_seg_length, penalty_change, p);

        let node = list.get_mut(current);
        node.affected = affected;
        node.start_lag = start_lag;
        node.end_lag = end_lag;

        let seg_cost = node.optcost_prev - total_saving + penalty_change;
        node.seg_cost = if seg_cost.is_finite() { seg_cost } else { SENTINEL_COST };

        current = list.get(current).next;
    }
}

/// Best saving and the symmetric lag trim that achieves it, for one component of one candidate.
fn score_component(list: &MvList, current: MvNodeId, n: usize, i: usize, k: usize, lag: u32, component: usize) -> (f64, u32) {
    let cum_sum = list.get(current).cum_sum[component];
    let mut best = 0.0_f64;
    let mut chosen_lag = 0_u32;

    for trial in 0..=lag {
        let trial_usize = trial as usize;
        if k <= 2 * trial_usize || k - 2 * trial_usize < 1 {
            continue;
        }
        let start_trim = windowed_sum(list, component, n, n + trial_usize - 1);
        let end_trim = if trial_usize == 0 {
            0.0
        } else {
            windowed_sum(list, component, i - trial_usize + 1, i)
        };
        let trimmed_sum = cum_sum - start_trim - end_trim;
        let trimmed_k = (k - 2 * trial_usize) as f64;
        let saving = trimmed_k * (trimmed_sum / trimmed_k).powi(2);
        if saving > best {
            best = saving;
            chosen_lag = trial;
        }
    }

    (best, chosen_lag)
}

/// Score every component's best saving/lag. Each component is scored independently off shared
/// `&MvList` state, so with the `rayon` feature this fans out across threads the same way the
/// per-admissible-point loss evaluation does.
#[cfg(feature = "rayon")]
fn score_components(
    list: &MvList,
    current: MvNodeId,
    n: usize,
    i: usize,
    k: usize,
    lag: u32,
    p: usize,
) -> Vec<(f64, u32)> {
    use rayon::iter::{IntoParallelIterator as _, ParallelIterator as _};
    (0..p)
        .into_par_iter()
        .map(|component| score_component(list, current, n, i, k, lag, component))
        .collect()
}

#[cfg(not(feature = "rayon"))]
fn score_components(
    list: &MvList,
    current: MvNodeId,
    n: usize,
    i: usize,
    k: usize,
    lag: u32,
    p: usize,
) -> Vec<(f64, u32)> {
    (0..p)
        .map(|component| score_component(list, current, n, i, k, lag, component))
        .collect()
}

/// Greedy penalized subset selection over components: score each component's best saving under
/// a symmetric lag trim, then keep components (in descending-saving order) while their marginal
/// saving exceeds their even share of the segmentation penalty.
#[allow(clippy::too_many_arguments)]
fn select_components(
    list: &MvList,
    current: MvNodeId,
    n: usize,
    i: usize,
    k: usize,
    lag: u32,
    min_seg_length: usize,
    penalty_change: f64,
    p: usize,
) -> (f64, Components<bool>, Components<u32>, Components<u32>) {
    let scores = score_components(list, current, n, i, k, lag, p);
    let best_saving: Components<f64> = scores.iter().map(|&(saving, _)| saving).collect();
    let best_lag: Components<u32> = scores.iter().map(|&(_, chosen_lag)| chosen_lag).collect();

    let component_penalty = penalty_change / p as f64;
    let mut order: Vec<usize> = (0..p).collect();
    order.sort_by(|&a, &b| best_saving[b].total_cmp(&best_saving[a]));

    let mut affected: Components<bool> = SmallVec::from_elem(false, p);
    let mut start_lag: Components<u32> = SmallVec::from_elem(0, p);
    let mut end_lag: Components<u32> = SmallVec::from_elem(0, p);
    let mut total_saving = 0.0;

    for component in order {
        if best_saving[component] - component_penalty <= 0.0 {
            break;
        }
        // The segment must still satisfy the global minimum length after trimming.
        let trimmed_k = k.saturating_sub(2 * best_lag[component] as usize);
        if trimmed_k < min_seg_length.min(k) {
            continue;
        }
        affected[component] = true;
        start_lag[component] = best_lag[component];
        end_lag[component] = best_lag[component];
        total_saving += best_saving[component];
    }

    (total_saving, affected, start_lag, end_lag)
}

/// Outcome of resolving one step of the multivariate driver.
struct MvStepResult {
    opt_cost: f64,
    opt_cut: MvNodeId,
    option: Option_,
}

fn select(i: usize, list: &MvList, penalty_outlier: f64, min_seg_length: usize) -> MvStepResult {
    let current = list.get(list.by_position(i));
    let optcost_prev = current.optcost_prev;
    let background_cut = list.by_position(i - 1);

    let mut best_cost = optcost_prev;
    let mut best_cut = background_cut;
    let mut best_option = Option_::Background;

    let point_saving: f64 = current
        .observation
        .iter()
        .map(|&value| Family::Mean.point_saving(value))
        .sum();
    let point_cost = optcost_prev - point_saving + penalty_outlier;
    if point_cost < best_cost {
        best_cost = point_cost;
        best_cut = background_cut;
        best_option = Option_::PointAnomaly;
    }

    // Option 2 admits only candidates whose segment already satisfies the minimum length,
    // `c.n <= i - minseglength + 1`.
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

    MvStepResult {
        opt_cost: best_cost,
        opt_cut: best_cut,
        option: best_option,
    }
}

fn prune(i: usize, list: &mut MvList, opt_cost: f64, penalty_change: f64) {
    let threshold = opt_cost + penalty_change;
    let dominated: Vec<MvNodeId> = list
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

fn traceback(list: &MvList, n: usize) -> Vec<MvChangepoint> {
    let mut out = Vec::new();
    let mut current = list.by_position(n);

    while current != list.head() {
        let node = list.get(current);
        let option = node
            .option
            .expect("traceback reached an unresolved node: DP loop did not run to completion");
        let cut = node.opt_cut;
        let start = list.get(cut).n + 1;
        out.push(MvChangepoint {
            start,
            end: node.n,
            option,
            affected_components: node.affected.iter().copied().collect(),
            start_lag: node.start_lag.iter().copied().collect(),
            end_lag: node.end_lag.iter().copied().collect(),
        });
        current = cut;
    }

    out.reverse();
    out
}
