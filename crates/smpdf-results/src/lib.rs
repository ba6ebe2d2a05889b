//! # smpdf results
//!
//! Everything between the bridge and a results table: sweeping every member
//! of a PDF set through the configured observables, caching the per-member
//! values, and reducing them to central values and uncertainties according
//! to the set's error type.
//!
//! ## Data flow
//!
//! ```text
//! RunConfig (TOML)
//!     │ pdfsets × observables
//! get_dataset ── ResultCache (JSONL) ── make_convolution ── Session
//!     │
//! ObservableResult        ← members × bins, error type
//!     │
//! results_table / summed_results_table / write_results_tsv
//! ```

pub mod cache;
pub mod config;
pub mod dataset;
pub mod error;
pub mod observable;
pub mod report;
pub mod result;
pub mod sweep;

pub use cache::{CacheError, CacheRecord, Corruption, ResultCache};
pub use config::{ConfigError, RunConfig};
pub use dataset::{PdfData, convolve_or_load, get_dataset, results_from_dataset};
pub use error::ResultsError;
pub use observable::{MemberSelection, Observable, ObservableKey, PdfSet, order_label};
pub use report::{BinLabel, ResultRow, results_table, summed_results_table, write_results_tsv};
pub use result::{Interval, MemberTable, ObservableResult};
pub use sweep::{ObservableTable, make_convolution};
