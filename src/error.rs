//! Error types.

/// Errors that can occur while configuring or running [`crate::Capa`]/[`crate::MvCapa`].
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// A parameter combination is invalid (e.g. `minseglength > maxseglength`).
    #[error("invalid parameter: {0}")]
    InvalidParameter(&'static str),
    /// The up-front backing-store allocation could not be satisfied.
    #[error("failed to allocate candidate list backing store")]
    Allocation,
}
