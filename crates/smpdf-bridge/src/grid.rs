//! Grid state: the active coefficient grid.

use crate::error::{BridgeError, ExternalError};
use crate::evaluation::PartonEvaluator;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::ops::Deref;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

/// A loaded perturbative-coefficient grid, owned by the grid engine.
pub trait Grid {
    /// Number of observable bins the grid produces.
    fn bins(&self) -> usize;

    /// Convolute the grid coefficients with `evaluator`.
    ///
    /// `order` selects which terms of the perturbative expansion are
    /// included; its meaning belongs to the engine. The engine may call the
    /// evaluator any number of times, at points of its choosing.
    fn convolute(
        &self,
        evaluator: &dyn PartonEvaluator,
        order: i32,
    ) -> Result<Vec<f64>, ExternalError>;
}

/// Opens grid files through an external grid engine.
pub trait GridLoader {
    fn load_grid(&self, path: &Path) -> Result<Box<dyn Grid>, ExternalError>;
}

/// The grid currently installed in a [`GridState`].
pub struct ActiveGrid {
    path: PathBuf,
    grid: Box<dyn Grid>,
}

impl ActiveGrid {
    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn bins(&self) -> usize {
        self.grid.bins()
    }

    pub fn grid(&self) -> &dyn Grid {
        self.grid.as_ref()
    }
}

impl fmt::Debug for ActiveGrid {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ActiveGrid")
            .field("path", &self.path)
            .field("bins", &self.bins())
            .finish()
    }
}

/// Owns at most one loaded grid.
pub struct GridState {
    loader: Box<dyn GridLoader>,
    current: Option<ActiveGrid>,
}

impl GridState {
    pub fn new(loader: impl GridLoader + 'static) -> Self {
        Self {
            loader: Box::new(loader),
            current: None,
        }
    }

    /// Open `path` and make it the active grid, releasing the previous one.
    ///
    /// On failure the previously loaded grid stays active.
    pub fn load_grid(&mut self, path: impl AsRef<Path>) -> Result<&ActiveGrid, BridgeError> {
        let path = path.as_ref();
        let grid = self
            .loader
            .load_grid(path)
            .map_err(|source| BridgeError::GridLoad {
                path: path.display().to_string(),
                source,
            })?;

        if let Some(previous) = self.current.take() {
            debug!(grid = %previous.path.display(), "releasing grid");
            drop(previous);
        }
        info!(grid = %path.display(), bins = grid.bins(), "loaded grid");
        Ok(&*self.current.insert(ActiveGrid {
            path: path.to_path_buf(),
            grid,
        }))
    }

    pub fn active(&self) -> Option<&ActiveGrid> {
        self.current.as_ref()
    }

    pub fn is_loaded(&self) -> bool {
        self.current.is_some()
    }
}

impl fmt::Debug for GridState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("GridState")
            .field("current", &self.current)
            .finish_non_exhaustive()
    }
}

/// Values produced by one convolution, one per bin in grid order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConvolutionResult {
    pub order: i32,
    pub values: Vec<f64>,
}

impl ConvolutionResult {
    pub fn into_values(self) -> Vec<f64> {
        self.values
    }
}

impl Deref for ConvolutionResult {
    type Target = [f64];

    fn deref(&self) -> &[f64] {
        &self.values
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::toy::{ToyGrid, ToyGridLibrary};

    fn library() -> ToyGridLibrary {
        ToyGridLibrary::new()
            .with_grid("grids/a.root", ToyGrid::gluon_only(&[1.0, 2.0, 3.0]))
            .with_grid("grids/b.root", ToyGrid::gluon_only(&[4.0]))
    }

    #[test]
    fn starts_without_grid() {
        let state = GridState::new(library());
        assert!(!state.is_loaded());
        assert!(state.active().is_none());
    }

    #[test]
    fn load_replaces_active_grid() {
        let mut state = GridState::new(library());
        assert_eq!(state.load_grid("grids/a.root").expect("a loads").bins(), 3);
        let active = state.load_grid("grids/b.root").expect("b loads");
        assert_eq!(active.bins(), 1);
        assert_eq!(active.path(), Path::new("grids/b.root"));
    }

    #[test]
    fn failed_load_keeps_previous_grid() {
        let mut state = GridState::new(library());
        state.load_grid("grids/a.root").expect("a loads");
        let err = state.load_grid("grids/missing.root").expect_err("missing");
        match err {
            BridgeError::GridLoad { path, .. } => assert_eq!(path, "grids/missing.root"),
            other => panic!("expected grid load error, got {other:?}"),
        }
        assert_eq!(
            state.active().map(ActiveGrid::path),
            Some(Path::new("grids/a.root"))
        );
    }
}
