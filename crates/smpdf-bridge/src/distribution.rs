//! Distribution state: the loaded ensemble and the selected member.

use crate::error::{BridgeError, Component, ExternalError};
use crate::evaluation::{EvaluationBridge, NUM_FLAVORS, PartonEvaluator};
use serde::{Deserialize, Serialize};
use std::fmt;
use tracing::{debug, info};

/// One parameterization inside an ensemble.
pub trait DistributionMember {
    /// `x·f(x, Q)` for flavor id `flavor` (−6..=6, 0 is the gluon).
    fn flavor_value(&self, flavor: i32, x: f64, q: f64) -> f64;

    /// Strong coupling at scale `q`.
    fn coupling_value(&self, q: f64) -> f64;
}

/// Resolves ensemble names against an external distribution library.
pub trait EnsembleLoader {
    /// Load every member of the named ensemble.
    fn load_ensemble(&self, name: &str) -> Result<DistributionEnsemble, ExternalError>;
}

/// How the members of an ensemble encode its uncertainty.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum ErrorType {
    /// Monte Carlo replicas; member 0 is their average.
    Replicas,
    /// Symmetric Hessian eigenvector members around member 0.
    SymmHessian,
    Other(String),
}

impl From<String> for ErrorType {
    fn from(value: String) -> Self {
        match value.as_str() {
            "replicas" => Self::Replicas,
            "symmhessian" => Self::SymmHessian,
            _ => Self::Other(value),
        }
    }
}

impl From<&str> for ErrorType {
    fn from(value: &str) -> Self {
        Self::from(value.to_string())
    }
}

impl From<ErrorType> for String {
    fn from(value: ErrorType) -> Self {
        value.to_string()
    }
}

impl fmt::Display for ErrorType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Replicas => f.write_str("replicas"),
            Self::SymmHessian => f.write_str("symmhessian"),
            Self::Other(name) => f.write_str(name),
        }
    }
}

/// Descriptive metadata of a loaded ensemble.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EnsembleInfo {
    pub name: String,
    pub error_type: ErrorType,
    pub num_members: usize,
}

/// An ordered set of members, loaded and released as a unit.
pub struct DistributionEnsemble {
    info: EnsembleInfo,
    members: Vec<Box<dyn DistributionMember>>,
}

impl DistributionEnsemble {
    pub fn new(
        name: impl Into<String>,
        error_type: ErrorType,
        members: Vec<Box<dyn DistributionMember>>,
    ) -> Self {
        Self {
            info: EnsembleInfo {
                name: name.into(),
                error_type,
                num_members: members.len(),
            },
            members,
        }
    }

    pub fn info(&self) -> &EnsembleInfo {
        &self.info
    }

    pub fn name(&self) -> &str {
        &self.info.name
    }

    pub fn len(&self) -> usize {
        self.members.len()
    }

    pub fn is_empty(&self) -> bool {
        self.members.is_empty()
    }

    pub fn member(&self, index: usize) -> Option<&dyn DistributionMember> {
        self.members.get(index).map(Box::as_ref)
    }
}

impl fmt::Debug for DistributionEnsemble {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DistributionEnsemble")
            .field("info", &self.info)
            .finish_non_exhaustive()
    }
}

/// Owns the current ensemble and which of its members is selected.
pub struct DistributionState {
    loader: Box<dyn EnsembleLoader>,
    current: Option<DistributionEnsemble>,
    selected: usize,
}

impl DistributionState {
    pub fn new(loader: impl EnsembleLoader + 'static) -> Self {
        Self {
            loader: Box::new(loader),
            current: None,
            selected: 0,
        }
    }

    /// Resolve `name`, replace the current ensemble and select member 0.
    ///
    /// On failure the previously loaded ensemble stays active.
    pub fn load_ensemble(&mut self, name: &str) -> Result<&EnsembleInfo, BridgeError> {
        let ensemble =
            self.loader
                .load_ensemble(name)
                .map_err(|source| BridgeError::EnsembleResolution {
                    name: name.to_string(),
                    source,
                })?;
        if ensemble.is_empty() {
            return Err(BridgeError::EnsembleResolution {
                name: name.to_string(),
                source: "ensemble has no members".into(),
            });
        }

        if let Some(previous) = self.current.take() {
            debug!(ensemble = previous.name(), "releasing distribution ensemble");
            drop(previous);
        }
        info!(
            ensemble = name,
            members = ensemble.len(),
            error_type = %ensemble.info().error_type,
            "loaded distribution ensemble"
        );
        self.selected = 0;
        let installed = self.current.insert(ensemble);
        Ok(installed.info())
    }

    /// Select the member used by subsequent evaluations.
    pub fn select_member(&mut self, index: usize) -> Result<(), BridgeError> {
        let ensemble = self
            .current
            .as_ref()
            .ok_or(BridgeError::not_initialized(Component::Distribution))?;
        if index >= ensemble.len() {
            return Err(BridgeError::InvalidMemberIndex {
                ensemble: ensemble.name().to_string(),
                index,
                members: ensemble.len(),
            });
        }
        debug!(ensemble = ensemble.name(), member = index, "selected member");
        self.selected = index;
        Ok(())
    }

    pub fn ensemble(&self) -> Option<&DistributionEnsemble> {
        self.current.as_ref()
    }

    pub fn is_loaded(&self) -> bool {
        self.current.is_some()
    }

    pub fn selected_index(&self) -> usize {
        self.selected
    }

    /// The selected member of the current ensemble.
    pub fn current_member(&self) -> Result<&dyn DistributionMember, BridgeError> {
        let ensemble = self
            .current
            .as_ref()
            .ok_or(BridgeError::not_initialized(Component::Distribution))?;
        ensemble
            .member(self.selected)
            .ok_or_else(|| BridgeError::InvalidMemberIndex {
                ensemble: ensemble.name().to_string(),
                index: self.selected,
                members: ensemble.len(),
            })
    }

    /// Callbacks over the selected member, borrowed from this state.
    pub fn evaluator(&self) -> Result<EvaluationBridge<'_>, BridgeError> {
        self.current_member().map(EvaluationBridge::new)
    }

    /// Flavor values of the selected member at `(x, q)`.
    pub fn flavor_evaluation(&self, x: f64, q: f64) -> Result<[f64; NUM_FLAVORS], BridgeError> {
        Ok(self.evaluator()?.flavor_evaluation(x, q))
    }

    /// Coupling of the selected member at `q`.
    pub fn coupling_evaluation(&self, q: f64) -> Result<f64, BridgeError> {
        Ok(self.evaluator()?.coupling_evaluation(q))
    }
}

impl fmt::Debug for DistributionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DistributionState")
            .field("current", &self.current)
            .field("selected", &self.selected)
            .finish_non_exhaustive()
    }
}
