//! Error types for bridge operations.

use std::fmt;

/// Failure reported by one of the external engines (distribution library or
/// grid engine). Carried as the `source` of a [`BridgeError`].
pub type ExternalError = Box<dyn std::error::Error + Send + Sync + 'static>;

/// Errors surfaced by the bridge. None of them is retried locally.
#[derive(Debug, thiserror::Error)]
pub enum BridgeError {
    /// The distribution library does not know the ensemble name.
    #[error("cannot resolve distribution ensemble `{name}`: {source}")]
    EnsembleResolution {
        name: String,
        #[source]
        source: ExternalError,
    },

    /// The grid path is invalid or the grid engine rejected the file.
    #[error("cannot load grid {path}: {source}")]
    GridLoad {
        path: String,
        #[source]
        source: ExternalError,
    },

    /// An evaluation or convolution was requested before the state it reads
    /// was loaded.
    #[error("{component} not initialized")]
    NotInitialized { component: Component },

    /// A member index outside `[0, members)` of the current ensemble.
    #[error(
        "member index {index} out of range for ensemble `{ensemble}` ({members} members)"
    )]
    InvalidMemberIndex {
        ensemble: String,
        index: usize,
        members: usize,
    },

    /// The grid engine failed while convoluting.
    #[error("convolution at perturbative order {order} failed: {source}")]
    Convolution {
        order: i32,
        #[source]
        source: ExternalError,
    },
}

impl BridgeError {
    pub(crate) fn not_initialized(component: Component) -> Self {
        Self::NotInitialized { component }
    }
}

/// Which piece of bridge state an operation required.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Component {
    Distribution,
    Grid,
}

impl fmt::Display for Component {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Distribution => f.write_str("distribution ensemble"),
            Self::Grid => f.write_str("grid"),
        }
    }
}
