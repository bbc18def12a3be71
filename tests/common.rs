//! Shared functionality between integration tests.

/// Install a `tracing` subscriber that prints to stderr, gated so running the suite twice (or
/// under `cargo test` with multiple integration test binaries) doesn't panic on re-init.
pub fn init_tracing() {
    let _ = tracing_subscriber::fmt().with_test_writer().try_init();
}

/// A flat baseline of `n` zeros with a mean-shifted run of `len` copies of `value` starting at
/// 1-based position `start`.
#[must_use]
pub fn signal_with_shift(n: usize, start: usize, len: usize, value: f64) -> Vec<f64> {
    let mut signal = vec![0.0; n];
    for sample in signal.iter_mut().skip(start - 1).take(len) {
        *sample = value;
    }
    signal
}

/// A component-major multivariate signal: `components` flat series of `n` zeros each, with
/// `value` written into `component`'s run `[start, start + len)`.
#[must_use]
pub fn mv_signal_with_shift(
    components: usize,
    n: usize,
    component: usize,
    start: usize,
    len: usize,
    value: f64,
) -> Vec<f64> {
    let mut signal = vec![0.0; components * n];
    for sample in signal[component * n..(component + 1) * n]
        .iter_mut()
        .skip(start - 1)
        .take(len)
    {
        *sample = value;
    }
    signal
}
