//! # smpdf bridge
//!
//! Connects a precomputed perturbative-coefficient grid with an evaluatable
//! parton-distribution ensemble, so cross sections can be recomputed for any
//! ensemble member without rerunning the perturbative calculation.
//!
//! Neither side is implemented here. The distribution library and the grid
//! engine are reached through the [`EnsembleLoader`], [`GridLoader`] and
//! [`Grid`] traits; this crate only manages which ensemble, member and grid
//! are active and hands the engine the two point-query callbacks it needs.
//!
//! ## Architecture
//!
//! ```text
//! DistributionState     ← ensemble + selected member   (initpdf, pdfreplica)
//!     │
//! GridState             ← active grid                  (initobs)
//!     │
//! EvaluationBridge      ← flavor / coupling callbacks over the selected member
//!     │
//! Session::convolute    ← grid engine × bridge → one value per bin
//! ```
//!
//! All state lives in a [`Session`] owned by the caller. There is no
//! process-wide state except the scoped trampoline slot in [`raw`], which is
//! only populated while a convolution that needs bare C callbacks is running.

pub mod distribution;
pub mod error;
pub mod evaluation;
pub mod grid;
pub mod raw;
pub mod session;
pub mod toy;

pub use distribution::{
    DistributionEnsemble, DistributionMember, DistributionState, EnsembleInfo, EnsembleLoader,
    ErrorType,
};
pub use error::{BridgeError, Component, ExternalError};
pub use evaluation::{
    EvaluationBridge, FLAVOR_IDS, NUM_FLAVORS, PartonEvaluator, flavor_id, flavor_index,
};
pub use grid::{ActiveGrid, ConvolutionResult, Grid, GridLoader, GridState};
pub use session::{Session, SessionState};
