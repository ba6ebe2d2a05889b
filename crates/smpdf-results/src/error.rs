//! Error types for result assembly.

use crate::cache::CacheError;
use smpdf_bridge::{BridgeError, ErrorType};

#[derive(Debug, thiserror::Error)]
pub enum ResultsError {
    #[error(transparent)]
    Bridge(#[from] BridgeError),

    #[error(transparent)]
    Cache(#[from] CacheError),

    /// The set's error type has no uncertainty prescription.
    #[error("{pdf}: no uncertainty prescription for error type `{error_type}`")]
    UnsupportedErrorType { pdf: String, error_type: ErrorType },

    /// A member selection that leaves out the central member.
    #[error("{pdf}: member selection must include the central member 0")]
    MissingCentralMember { pdf: String },

    #[error("{observable}: member {member} produced {actual} bins, expected {expected}")]
    BinMismatch {
        observable: String,
        member: usize,
        expected: usize,
        actual: usize,
    },

    #[error("{observable}: no member values")]
    EmptyTable { observable: String },

    #[error("a {percent}% interval over {nrep} replicas contains no replica")]
    EmptyInterval { percent: u32, nrep: usize },

    #[error("failed to write results table: {0}")]
    Write(#[source] std::io::Error),
}
