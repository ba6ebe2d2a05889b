//! The caller-owned session: distribution state, grid state and the
//! convolution entry point.
//!
//! | Operation    | Method                  |
//! |--------------|-------------------------|
//! | `initpdf`    | [`Session::init_pdf`]   |
//! | `pdfreplica` | [`Session::pdf_replica`]|
//! | `initobs`    | [`Session::init_obs`]   |
//! | `convolute`  | [`Session::convolute`]  |

use crate::distribution::{DistributionState, EnsembleInfo, EnsembleLoader};
use crate::error::{BridgeError, Component};
use crate::grid::{ConvolutionResult, GridLoader, GridState};
use serde::{Deserialize, Serialize};
use std::path::Path;
use tracing::{debug, warn};

/// Which pieces of state a session currently holds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionState {
    Uninitialized,
    GridLoaded,
    DistributionLoaded,
    /// Both loaded; `convolute` is valid.
    Ready,
}

/// One independent bridge session.
#[derive(Debug)]
pub struct Session {
    distributions: DistributionState,
    grids: GridState,
}

impl Session {
    pub fn new(ensembles: impl EnsembleLoader + 'static, grids: impl GridLoader + 'static) -> Self {
        Self {
            distributions: DistributionState::new(ensembles),
            grids: GridState::new(grids),
        }
    }

    /// Load or replace the distribution ensemble and select member 0.
    pub fn init_pdf(&mut self, name: &str) -> Result<&EnsembleInfo, BridgeError> {
        self.distributions.load_ensemble(name)
    }

    /// Select the ensemble member used by subsequent convolutions.
    pub fn pdf_replica(&mut self, index: usize) -> Result<(), BridgeError> {
        self.distributions.select_member(index)
    }

    /// Load or replace the active grid. Returns its bin count.
    pub fn init_obs(&mut self, path: impl AsRef<Path>) -> Result<usize, BridgeError> {
        self.grids.load_grid(path).map(|grid| grid.bins())
    }

    /// Convolute the active grid with the selected member.
    ///
    /// Returns the engine's values unmodified, one per bin in grid order.
    /// `order` is passed through to the engine without validation.
    pub fn convolute(&self, order: i32) -> Result<ConvolutionResult, BridgeError> {
        let grid = self
            .grids
            .active()
            .ok_or(BridgeError::not_initialized(Component::Grid))?;
        let evaluator = self.distributions.evaluator()?;

        debug!(
            grid = %grid.path().display(),
            member = self.distributions.selected_index(),
            order,
            "convoluting"
        );
        let values = grid
            .grid()
            .convolute(&evaluator, order)
            .map_err(|source| BridgeError::Convolution { order, source })?;
        if values.len() != grid.bins() {
            warn!(
                grid = %grid.path().display(),
                bins = grid.bins(),
                values = values.len(),
                "grid engine returned a different number of values than bins"
            );
        }
        Ok(ConvolutionResult { order, values })
    }

    pub fn state(&self) -> SessionState {
        match (self.distributions.is_loaded(), self.grids.is_loaded()) {
            (false, false) => SessionState::Uninitialized,
            (false, true) => SessionState::GridLoaded,
            (true, false) => SessionState::DistributionLoaded,
            (true, true) => SessionState::Ready,
        }
    }

    pub fn distributions(&self) -> &DistributionState {
        &self.distributions
    }

    pub fn grids(&self) -> &GridState {
        &self.grids
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::distribution::{DistributionEnsemble, DistributionMember, ErrorType};
    use crate::error::ExternalError;
    use crate::evaluation::NUM_FLAVORS;
    use crate::toy::{M_Z, ToyEnsembleLibrary, ToyGrid, ToyGridLibrary, ToyMember};
    use std::cell::RefCell;
    use std::rc::Rc;

    fn toy_session() -> Session {
        let ensembles = ToyEnsembleLibrary::new()
            .with_ensemble(
                "TEST",
                ErrorType::Replicas,
                vec![ToyMember::scaled(1.0, 0.118), ToyMember::scaled(2.0, 0.121)],
            )
            .with_ensemble("SINGLE", ErrorType::Replicas, vec![ToyMember::scaled(5.0, 0.117)]);
        let grids = ToyGridLibrary::new()
            .with_grid("three.root", ToyGrid::gluon_only(&[1.0, 2.0, 3.0]))
            .with_grid("one.root", ToyGrid::gluon_only(&[1.0]));
        Session::new(ensembles, grids)
    }

    #[test]
    fn state_follows_loads_in_any_order() {
        let mut session = toy_session();
        assert_eq!(session.state(), SessionState::Uninitialized);
        session.init_obs("one.root").expect("grid loads");
        assert_eq!(session.state(), SessionState::GridLoaded);
        session.init_pdf("TEST").expect("ensemble loads");
        assert_eq!(session.state(), SessionState::Ready);

        let mut session = toy_session();
        session.init_pdf("TEST").expect("ensemble loads");
        assert_eq!(session.state(), SessionState::DistributionLoaded);
        session.init_obs("one.root").expect("grid loads");
        assert_eq!(session.state(), SessionState::Ready);
        session.init_obs("three.root").expect("grid reloads");
        assert_eq!(session.state(), SessionState::Ready);
    }

    #[test]
    fn convolute_without_grid_is_not_initialized() {
        let mut session = toy_session();
        session.init_pdf("TEST").expect("ensemble loads");
        assert!(matches!(
            session.convolute(0),
            Err(BridgeError::NotInitialized {
                component: Component::Grid
            })
        ));
    }

    #[test]
    fn convolute_without_distribution_is_not_initialized() {
        let mut session = toy_session();
        session.init_obs("three.root").expect("grid loads");
        assert!(matches!(
            session.convolute(0),
            Err(BridgeError::NotInitialized {
                component: Component::Distribution
            })
        ));
    }

    #[test]
    fn convolute_returns_one_value_per_bin_for_every_order() {
        let mut session = toy_session();
        session.init_pdf("TEST").expect("ensemble loads");
        let bins = session.init_obs("three.root").expect("grid loads");
        assert_eq!(bins, 3);
        for order in 0..3 {
            let result = session.convolute(order).expect("convolution succeeds");
            assert_eq!(result.len(), 3);
            assert_eq!(result.order, order);
        }
    }

    #[test]
    fn convolute_uses_selected_member() {
        let mut session = toy_session();
        session.init_pdf("TEST").expect("ensemble loads");
        session.init_obs("three.root").expect("grid loads");

        let gluon = |norm: f64| ToyMember::scaled(norm, 0.118).flavor_value(0, 0.1, M_Z);
        let first = session.convolute(0).expect("member 0");
        assert_eq!(first.values, vec![gluon(1.0), 2.0 * gluon(1.0), 3.0 * gluon(1.0)]);

        session.pdf_replica(1).expect("member 1 exists");
        let second = session.convolute(0).expect("member 1");
        assert_eq!(second.values, vec![gluon(2.0), 2.0 * gluon(2.0), 3.0 * gluon(2.0)]);
    }

    #[test]
    fn engine_failure_is_reported_with_order() {
        let mut session = toy_session();
        session.init_pdf("TEST").expect("ensemble loads");
        session.init_obs("one.root").expect("grid loads");
        match session.convolute(-1) {
            Err(BridgeError::Convolution { order, source }) => {
                assert_eq!(order, -1);
                assert!(source.to_string().contains("negative"));
            }
            other => panic!("expected convolution error, got {other:?}"),
        }
    }

    #[test]
    fn pdf_replica_out_of_range_is_rejected() {
        let mut session = toy_session();
        session.init_pdf("SINGLE").expect("ensemble loads");
        assert!(matches!(
            session.pdf_replica(1),
            Err(BridgeError::InvalidMemberIndex { members: 1, .. })
        ));
    }

    /// Member that records its own release in a shared log.
    struct Tracked {
        label: &'static str,
        value: f64,
        released: Rc<RefCell<Vec<&'static str>>>,
    }

    impl DistributionMember for Tracked {
        fn flavor_value(&self, _flavor: i32, _x: f64, _q: f64) -> f64 {
            self.value
        }

        fn coupling_value(&self, _q: f64) -> f64 {
            self.value
        }
    }

    impl Drop for Tracked {
        fn drop(&mut self) {
            self.released.borrow_mut().push(self.label);
        }
    }

    struct TrackedLibrary {
        released: Rc<RefCell<Vec<&'static str>>>,
    }

    impl EnsembleLoader for TrackedLibrary {
        fn load_ensemble(&self, name: &str) -> Result<DistributionEnsemble, ExternalError> {
            let (labels, value): (&[&'static str], f64) = match name {
                "FIRST" => (&["first-0", "first-1"], 1.0),
                "SECOND" => (&["second-0"], 2.0),
                _ => return Err(format!("unknown set {name}").into()),
            };
            let members = labels
                .iter()
                .map(|&label| {
                    Box::new(Tracked {
                        label,
                        value,
                        released: Rc::clone(&self.released),
                    }) as Box<dyn DistributionMember>
                })
                .collect();
            Ok(DistributionEnsemble::new(name, ErrorType::Replicas, members))
        }
    }

    #[test]
    fn reload_releases_previous_members_exactly_once() {
        let released = Rc::new(RefCell::new(Vec::new()));
        let mut session = Session::new(
            TrackedLibrary {
                released: Rc::clone(&released),
            },
            ToyGridLibrary::new(),
        );

        session.init_pdf("FIRST").expect("FIRST loads");
        session.pdf_replica(1).expect("member 1 exists");
        assert!(released.borrow().is_empty());

        session.init_pdf("SECOND").expect("SECOND loads");
        assert_eq!(*released.borrow(), vec!["first-0", "first-1"]);
        assert_eq!(
            session.distributions().flavor_evaluation(0.3, 5.0).expect("loaded"),
            [2.0; NUM_FLAVORS]
        );

        session.init_pdf("MISSING").expect_err("MISSING is unknown");
        assert_eq!(released.borrow().len(), 2);

        drop(session);
        assert_eq!(*released.borrow(), vec!["first-0", "first-1", "second-0"]);
    }
}
