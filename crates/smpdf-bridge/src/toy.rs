//! Toy backends for conformance testing.
//!
//! In-memory stand-ins for the distribution library and the grid engine,
//! with closed-form members and grids small enough to check by hand.
//! Both registries deserialize from JSON so fixtures can describe them.
//!
//! ## Members
//!
//! A [`ToyMember`] evaluates
//!
//! ```text
//! x·f_i(x, Q) = norm_i · x^a · (1 − x)^b · (1 + k · ln(Q / M_Z))
//! αs(Q)       = αs(M_Z) / (1 + αs(M_Z) · β0/(2π) · ln(Q / M_Z)),   β0 = 23/3
//! ```
//!
//! ## Grids
//!
//! A [`ToyGrid`] bin is a point `(x, Q)` with a flavor weight vector `w` and
//! one coefficient per perturbative order. At order `p` the bin evaluates
//!
//! ```text
//! Σ_{k ≤ p} c_k · αs(Q)^k · Σ_i w_i · x·f_i(x, Q)
//! ```

use crate::distribution::{DistributionEnsemble, DistributionMember, EnsembleLoader, ErrorType};
use crate::error::ExternalError;
use crate::evaluation::{NUM_FLAVORS, PartonEvaluator, flavor_index};
use crate::grid::{Grid, GridLoader};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::f64::consts::PI;
use std::path::{Path, PathBuf};

/// Z boson mass, the reference scale of the toy parameterizations.
pub const M_Z: f64 = 91.1876;

const BETA0_NF5: f64 = 23.0 / 3.0;

/// Errors raised by the toy backends.
#[derive(Debug, thiserror::Error)]
pub enum ToyError {
    #[error("unknown toy ensemble: {0}")]
    UnknownEnsemble(String),

    #[error("unknown toy grid: {0}")]
    UnknownGrid(String),

    #[error("negative perturbative order: {0}")]
    NegativeOrder(i32),

    #[error("invalid toy backend description: {0}")]
    Parse(String),
}

/// A closed-form distribution member.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToyMember {
    pub normalizations: [f64; NUM_FLAVORS],
    #[serde(default = "default_small_x")]
    pub small_x: f64,
    #[serde(default = "default_large_x")]
    pub large_x: f64,
    #[serde(default)]
    pub scaling: f64,
    pub alphas_mz: f64,
}

fn default_small_x() -> f64 {
    0.5
}

fn default_large_x() -> f64 {
    3.0
}

impl ToyMember {
    /// Member with every flavor normalized to `norm` and no scale dependence
    /// in the densities.
    pub fn scaled(norm: f64, alphas_mz: f64) -> Self {
        Self {
            normalizations: [norm; NUM_FLAVORS],
            small_x: default_small_x(),
            large_x: default_large_x(),
            scaling: 0.0,
            alphas_mz,
        }
    }
}

impl DistributionMember for ToyMember {
    fn flavor_value(&self, flavor: i32, x: f64, q: f64) -> f64 {
        let Some(index) = flavor_index(flavor) else {
            return 0.0;
        };
        let evolution = 1.0 + self.scaling * (q / M_Z).ln();
        self.normalizations[index] * x.powf(self.small_x) * (1.0 - x).powf(self.large_x) * evolution
    }

    fn coupling_value(&self, q: f64) -> f64 {
        self.alphas_mz / (1.0 + self.alphas_mz * BETA0_NF5 / (2.0 * PI) * (q / M_Z).ln())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct ToyEnsembleEntry {
    error_type: ErrorType,
    members: Vec<ToyMember>,
}

/// Named toy ensembles, served as a distribution library.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ToyEnsembleLibrary {
    ensembles: BTreeMap<String, ToyEnsembleEntry>,
}

impl ToyEnsembleLibrary {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_ensemble(
        mut self,
        name: impl Into<String>,
        error_type: ErrorType,
        members: Vec<ToyMember>,
    ) -> Self {
        self.ensembles.insert(
            name.into(),
            ToyEnsembleEntry {
                error_type,
                members,
            },
        );
        self
    }

    /// The members registered under `name`.
    pub fn members(&self, name: &str) -> Option<&[ToyMember]> {
        self.ensembles.get(name).map(|entry| entry.members.as_slice())
    }
}

impl EnsembleLoader for ToyEnsembleLibrary {
    fn load_ensemble(&self, name: &str) -> Result<DistributionEnsemble, ExternalError> {
        let entry = self
            .ensembles
            .get(name)
            .ok_or_else(|| ToyError::UnknownEnsemble(name.to_string()))?;
        let members = entry
            .members
            .iter()
            .cloned()
            .map(|member| Box::new(member) as Box<dyn DistributionMember>)
            .collect();
        Ok(DistributionEnsemble::new(
            name,
            entry.error_type.clone(),
            members,
        ))
    }
}

/// One observable bin of a toy grid.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToyBin {
    pub x: f64,
    pub q: f64,
    pub weights: [f64; NUM_FLAVORS],
    /// Coefficient of `αs^k` at index `k`.
    pub coefficients: Vec<f64>,
}

/// A closed-form grid.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ToyGrid {
    pub bins: Vec<ToyBin>,
}

impl ToyGrid {
    pub fn new(bins: Vec<ToyBin>) -> Self {
        Self { bins }
    }

    /// Leading-order-only grid reading the gluon at `x = 0.1`, `Q = M_Z`,
    /// one bin per coefficient.
    pub fn gluon_only(coefficients: &[f64]) -> Self {
        let mut weights = [0.0; NUM_FLAVORS];
        weights[6] = 1.0;
        Self::new(
            coefficients
                .iter()
                .map(|c| ToyBin {
                    x: 0.1,
                    q: M_Z,
                    weights,
                    coefficients: vec![*c],
                })
                .collect(),
        )
    }
}

impl Grid for ToyGrid {
    fn bins(&self) -> usize {
        self.bins.len()
    }

    fn convolute(
        &self,
        evaluator: &dyn PartonEvaluator,
        order: i32,
    ) -> Result<Vec<f64>, ExternalError> {
        let highest = usize::try_from(order).map_err(|_| ToyError::NegativeOrder(order))?;
        Ok(self
            .bins
            .iter()
            .map(|bin| {
                let xfx = evaluator.flavor_evaluation(bin.x, bin.q);
                let luminosity: f64 = bin.weights.iter().zip(xfx).map(|(w, f)| w * f).sum();
                let alphas = evaluator.coupling_evaluation(bin.q);
                bin.coefficients
                    .iter()
                    .take(highest + 1)
                    .zip(0..)
                    .map(|(c, k)| c * alphas.powi(k))
                    .sum::<f64>()
                    * luminosity
            })
            .collect())
    }
}

/// Toy grids keyed by path, served as a grid engine.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ToyGridLibrary {
    grids: BTreeMap<PathBuf, ToyGrid>,
}

impl ToyGridLibrary {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_grid(mut self, path: impl Into<PathBuf>, grid: ToyGrid) -> Self {
        self.grids.insert(path.into(), grid);
        self
    }
}

impl GridLoader for ToyGridLibrary {
    fn load_grid(&self, path: &Path) -> Result<Box<dyn Grid>, ExternalError> {
        let grid = self
            .grids
            .get(path)
            .ok_or_else(|| ToyError::UnknownGrid(path.display().to_string()))?;
        Ok(Box::new(grid.clone()))
    }
}

/// Both toy backends, as described by a JSON fixture:
///
/// ```json
/// { "ensembles": { "NAME": { "error_type": "replicas", "members": [...] } },
///   "grids": { "path.root": { "bins": [...] } } }
/// ```
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ToyBackend {
    #[serde(default)]
    pub ensembles: ToyEnsembleLibrary,
    #[serde(default)]
    pub grids: ToyGridLibrary,
}

impl ToyBackend {
    pub fn from_json_str(text: &str) -> Result<Self, ToyError> {
        serde_json::from_str(text).map_err(|e| ToyError::Parse(e.to_string()))
    }
}
