//! Integration tests against the public `MvCapa` API.

#[path = "common.rs"]
mod common;

use capa::{MvCapa, Option_, SolveStatus};
use common::mv_signal_with_shift;

#[test]
fn only_the_shifted_component_is_marked_affected() {
    common::init_tracing();
    let n = 30;
    let signal = mv_signal_with_shift(3, n, 1, 12, 6, 5.0);

    let solution = MvCapa::new(3)
        .with_penalty_change(3.0)
        .with_penalty_outlier(10.0)
        .solve(&signal)
        .expect("valid parameters");

    assert_eq!(solution.status, SolveStatus::Completed);
    let collective = solution
        .changepoints()
        .iter()
        .find(|c| c.option == Option_::Collective)
        .expect("a collective anomaly was reported");

    assert!(collective.affected_components[1]);
    assert!(!collective.affected_components[0]);
    assert!(!collective.affected_components[2]);
}
