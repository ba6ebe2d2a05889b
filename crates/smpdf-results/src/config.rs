//! Run configuration, read from TOML.
//!
//! ```toml
//! cache = "results/cache.jsonl"
//!
//! [[pdfsets]]
//! name = "NNPDF30_nlo_as_0118"
//!
//! [[pdfsets]]
//! name = "MMHT2014nlo68cl"
//! members = { min = 0, max = 51 }
//!
//! [[observables]]
//! file = "grids/ttbar.root"
//! order = 1
//! ```

use crate::observable::{Observable, PdfSet};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("failed to read file: {path}: {source}")]
    ReadFile {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid toml at {path}: {source}")]
    ParseToml {
        path: String,
        #[source]
        source: toml::de::Error,
    },

    #[error("{0}")]
    Invalid(String),
}

/// What to convolute: every PDF set against every observable.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RunConfig {
    pub pdfsets: Vec<PdfSet>,
    pub observables: Vec<Observable>,
    /// JSONL file holding previously computed member tables.
    #[serde(default)]
    pub cache: Option<PathBuf>,
}

impl RunConfig {
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path).map_err(|source| ConfigError::ReadFile {
            path: path.display().to_string(),
            source,
        })?;
        Self::from_toml_str(&text, &path.display().to_string())
    }

    /// Parse and validate a configuration. `origin` names the source in
    /// error messages.
    pub fn from_toml_str(text: &str, origin: &str) -> Result<Self, ConfigError> {
        let config: Self = toml::from_str(text).map_err(|source| ConfigError::ParseToml {
            path: origin.to_string(),
            source,
        })?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.pdfsets.is_empty() {
            return Err(ConfigError::Invalid(
                "'pdfsets' must list at least one PDF set".to_string(),
            ));
        }
        if self.observables.is_empty() {
            return Err(ConfigError::Invalid(
                "'observables' must list at least one grid".to_string(),
            ));
        }
        if let Some(pdf) = self.pdfsets.iter().find(|pdf| !pdf.members.includes_central()) {
            return Err(ConfigError::Invalid(format!(
                "pdf set `{}`: member selection must include the central member 0",
                pdf.name
            )));
        }
        Ok(())
    }
}
