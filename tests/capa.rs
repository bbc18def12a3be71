//! Integration tests against the public `Capa` API.

#[path = "common.rs"]
mod common;

use std::num::NonZero;

use capa::{Capa, Family, Option_, SolveStatus};
use common::signal_with_shift;

#[test]
fn mean_shift_is_isolated_as_one_collective_anomaly() {
    common::init_tracing();
    let signal = signal_with_shift(40, 15, 6, 4.0);

    let solution = Capa::new()
        .with_penalty_change(4.0)
        .with_penalty_outlier(10.0)
        .with_min_seg_length(NonZero::new(2).expect("nonzero"))
        .solve(&signal)
        .expect("valid parameters");

    assert_eq!(solution.status, SolveStatus::Completed);
    let collective = solution
        .changepoints()
        .iter()
        .find(|c| c.option == Option_::Collective)
        .expect("a collective anomaly was reported");
    assert_eq!((collective.start, collective.end), (15, 20));
}

#[test]
fn poisson_family_catches_a_rate_jump() {
    let mut signal = vec![2.0; 60];
    for sample in signal.iter_mut().skip(29).take(8) {
        *sample = 12.0;
    }

    let solution = Capa::new()
        .with_family(Family::Poisson)
        .with_penalty_change(5.0)
        .with_penalty_outlier(20.0)
        .with_min_seg_length(NonZero::new(2).expect("nonzero"))
        .solve(&signal)
        .expect("valid parameters");

    assert!(
        solution
            .changepoints()
            .iter()
            .any(|c| c.option == Option_::Collective)
    );
}

#[test]
fn changepoints_partition_the_whole_signal_without_gaps_or_overlaps() {
    let signal = signal_with_shift(25, 10, 3, -6.0);

    let solution = Capa::new()
        .with_penalty_change(1.0)
        .with_penalty_outlier(1.0)
        .solve(&signal)
        .expect("valid parameters");

    let changepoints = solution.changepoints();
    assert_eq!(changepoints.first().expect("non-empty").start, 1);
    assert_eq!(changepoints.last().expect("non-empty").end, signal.len());
    for pair in changepoints.windows(2) {
        assert_eq!(pair[0].end + 1, pair[1].start);
    }
}
