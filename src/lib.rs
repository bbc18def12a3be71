//! Collective and point anomaly detection (CAPA) via penalized dynamic programming.
//!
//! Given a sequence of (pre-standardized) observations, [`Capa::solve`] partitions the
//! timeline into a background regime punctuated by collective anomalies (segments whose
//! mean/variance/rate differ from baseline) and point anomalies (single-sample outliers),
//! minimizing a total penalized cost. The multivariate variant, [`MvCapa::solve`], additionally
//! chooses, per collective anomaly, which series are affected and with what onset/offset lag.
//!
//! The DP itself is the pruned, amortized-near-linear optimal-partition search described by
//! Killick et al.'s PELT pruning rule applied to the CAPA cost model of Fisch, Eckley &
//! Fearnhead. Marshalling observations in from a host array, packaging results for a host
//! environment, and polling a host's own interrupt mechanism are all out of scope for this
//! crate: callers inject a [`CancellationToken`] and read back a typed [`Solution`].

mod cancel;
mod cost;
mod error;
mod list;
mod mv;
mod pruner;
mod selector;
mod traceback;

use std::num::NonZero;

pub use cancel::{CancellationToken, NeverCancel, POLL_INTERVAL};
pub use cost::Family;
pub use error::Error;
pub use list::Option_;
pub use mv::{MvCapa, MvChangepoint, MvSolution};
pub use traceback::Changepoint;

use list::CandidateList;

/// Outcome of a [`Capa::solve`] call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SolveStatus {
    /// The DP ran to completion; `changepoints` is valid.
    Completed,
    /// A [`CancellationToken`] signalled cancellation; `changepoints` is empty and must not be
    /// used.
    Cancelled,
}

/// Result of running [`Capa::solve`].
#[derive(Debug, Clone)]
pub struct Solution {
    /// Whether the DP completed or was cancelled.
    pub status: SolveStatus,
    changepoints: Vec<Changepoint>,
}

impl Solution {
    /// The resolved segments, in chronological order. Empty (and meaningless) if `status` is
    /// [`SolveStatus::Cancelled`].
    #[must_use]
    pub fn changepoints(&self) -> &[Changepoint] {
        &self.changepoints
    }
}

/// CAPA univariate penalized dynamic program.
///
/// # Defaults
///
/// - `family`: [`Family::Mean`]
/// - `penalty_change` / `penalty_outlier`: `0.0`
/// - `min_seg_length`: `2`
/// - `max_seg_length`: unbounded (`usize::MAX`, clamped to `n` at `solve` time)
/// - cancellation token: [`NeverCancel`]
#[derive(Debug, Clone, Copy)]
pub struct Capa<C: CancellationToken = NeverCancel> {
    family: Family,
    penalty_change: f64,
    penalty_outlier: f64,
    min_seg_length: usize,
    max_seg_length: usize,
    cancellation: C,
}

impl Capa<NeverCancel> {
    /// Construct a new `Capa` instance with default values.
    #[must_use]
    pub const fn new() -> Self {
        Self {
            family: Family::Mean,
            penalty_change: 0.0,
            penalty_outlier: 0.0,
            min_seg_length: 2,
            max_seg_length: usize::MAX,
            cancellation: NeverCancel,
        }
    }
}

impl Default for Capa<NeverCancel> {
    fn default() -> Self {
        Self::new()
    }
}

impl<C: CancellationToken> Capa<C> {
    /// Set the cost family (also known as the loss function).
    #[must_use]
    pub const fn with_family(mut self, family: Family) -> Self {
        self.family = family;

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
    pub const fn with_min_seg_length(mut self, min_seg_length: NonZero<usize>) -> Self {
        self.min_seg_length = min_seg_length.get();

        self
    }

    /// Set the maximum allowable length of a collective anomaly.
    #[must_use]
    pub const fn with_max_seg_length(mut self, max_seg_length: NonZero<usize>) -> Self {
        self.max_seg_length = max_seg_length.get();

        self
    }

    /// Inject a [`CancellationToken`], polled every [`POLL_INTERVAL`] steps.
    #[must_use]
    pub fn with_cancellation_token<C2: CancellationToken>(self, token: C2) -> Capa<C2> {
        Capa {
            family: self.family,
            penalty_change: self.penalty_change,
            penalty_outlier: self.penalty_outlier,
            min_seg_length: self.min_seg_length,
            max_seg_length: self.max_seg_length,
            cancellation: token,
        }
    }

    /// Run the DP over `x`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidParameter`] if the parameter constraints in the crate
    /// documentation are violated, or [`Error::Allocation`] if the backing store cannot be
    /// reserved.
    pub fn solve(&self, x: &[f64]) -> Result<Solution, Error> {
        let max_seg_length = if self.max_seg_length == usize::MAX {
            x.len().max(1)
        } else {
            self.max_seg_length
        };

        let span = tracing::info_span!(
            "capa::solve",
            family = ?self.family,
            n = x.len(),
            penalty_change = self.penalty_change,
            penalty_outlier = self.penalty_outlier,
        );
        let _entered = span.enter();

        validate(
            x.len(),
            self.penalty_change,
            self.penalty_outlier,
            self.min_seg_length,
            max_seg_length,
        )?;

        let mut list = CandidateList::populate(x, max_seg_length)?;
        let n = x.len();

        for i in 1..=n {
            self.family.update(i, &mut list, self.penalty_change);

            let step = selector::select(
                self.family,
                i,
                &list,
                self.penalty_outlier,
                self.min_seg_length,
            );

            {
                let node = list.get_mut(list.by_position(i));
                node.opt_cost = step.opt_cost;
                node.opt_cut = step.opt_cut;
                node.option = Some(step.option);
            }
            list.get_mut(list.by_position(i + 1)).optcost_prev = step.opt_cost;

            pruner::prune(i, &mut list, step.opt_cost, self.penalty_change);

            if i % POLL_INTERVAL == 0 && self.cancellation.is_cancelled() {
                tracing::debug!(step = i, "capa solve cancelled");
                return Ok(Solution {
                    status: SolveStatus::Cancelled,
                    changepoints: Vec::new(),
                });
            }
        }

        let changepoints = traceback::traceback(&list, n);
        tracing::debug!(changepoints = changepoints.len(), "capa solve completed");

        Ok(Solution {
            status: SolveStatus::Completed,
            changepoints,
        })
    }
}

/// Shared parameter validation for the univariate and multivariate drivers.
fn validate(
    n: usize,
    penalty_change: f64,
    penalty_outlier: f64,
    min_seg_length: usize,
    max_seg_length: usize,
) -> Result<(), Error> {
    if n == 0 {
        return Err(Error::InvalidParameter("x must be non-empty"));
    }
    if min_seg_length < 2 {
        return Err(Error::InvalidParameter("minseglength must be >= 2"));
    }
    if max_seg_length < min_seg_length {
        return Err(Error::InvalidParameter(
            "maxseglength must be >= minseglength",
        ));
    }
    if max_seg_length > n {
        return Err(Error::InvalidParameter("maxseglength must be <= n"));
    }
    if !(penalty_change >= 0.0) {
        return Err(Error::InvalidParameter("penalty_change must be >= 0"));
    }
    if !(penalty_outlier >= 0.0) {
        return Err(Error::InvalidParameter("penalty_outlier must be >= 0"));
    }
    Ok(())
}
