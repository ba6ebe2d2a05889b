//! Flat results tables and their tab-separated export.

use crate::error::ResultsError;
use crate::result::ObservableResult;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::io::Write;

/// Column headers of the exported table.
pub const COLUMNS: [&str; 8] = [
    "Observable", "Order", "PDF", "ErrorType", "Bin", "CV", "Up68", "Down68",
];

/// 1-based bin number, or `sum` for bin-summed rows.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum BinLabel {
    Index(usize),
    Label(String),
}

impl BinLabel {
    pub fn sum() -> Self {
        Self::Label("sum".to_string())
    }
}

impl fmt::Display for BinLabel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Index(index) => write!(f, "{index}"),
            Self::Label(label) => f.write_str(label),
        }
    }
}

/// One bin of one result.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResultRow {
    pub observable: String,
    /// Perturbative order the grid was convoluted at.
    pub order: i32,
    pub pdf: String,
    pub error_type: String,
    pub bin: BinLabel,
    pub cv: f64,
    pub up68: f64,
    pub down68: f64,
}

/// One row per bin of every result.
pub fn results_table(results: &[ObservableResult]) -> Result<Vec<ResultRow>, ResultsError> {
    let mut rows = Vec::new();
    for result in results {
        let band = result.errorbar68()?;
        for (bin, cv) in result.central_value().iter().enumerate() {
            rows.push(ResultRow {
                observable: result.observable.to_string(),
                order: result.observable.order,
                pdf: result.pdf.clone(),
                error_type: result.error_type.to_string(),
                bin: BinLabel::Index(bin + 1),
                cv: *cv,
                up68: band.max[bin].abs(),
                down68: band.min[bin].abs(),
            });
        }
    }
    Ok(rows)
}

/// One row per result, over the sum of its bins.
pub fn summed_results_table(results: &[ObservableResult]) -> Result<Vec<ResultRow>, ResultsError> {
    let summed: Vec<ObservableResult> = results.iter().map(ObservableResult::sum_bins).collect();
    let mut rows = results_table(&summed)?;
    for row in &mut rows {
        row.bin = BinLabel::sum();
    }
    Ok(rows)
}

/// Write the per-bin table followed by the summed table as TSV.
pub fn write_results_tsv(
    writer: &mut impl Write,
    results: &[ObservableResult],
) -> Result<(), ResultsError> {
    let mut rows = results_table(results)?;
    rows.extend(summed_results_table(results)?);

    writeln!(writer, "{}", COLUMNS.join("\t")).map_err(ResultsError::Write)?;
    for row in rows {
        writeln!(
            writer,
            "{}\t{}\t{}\t{}\t{}\t{}\t{}\t{}",
            row.observable, row.order, row.pdf, row.error_type, row.bin, row.cv, row.up68, row.down68
        )
        .map_err(ResultsError::Write)?;
    }
    Ok(())
}
