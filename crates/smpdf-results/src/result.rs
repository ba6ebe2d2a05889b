//! Per-observable results and their uncertainty prescriptions.
//!
//! A result holds one row of bin values per convoluted member. Row 0 is the
//! central member; the remaining rows are replicas (Monte Carlo sets) or
//! eigenvector members (symmetric Hessian sets).

use crate::error::ResultsError;
use crate::observable::ObservableKey;
use serde::{Deserialize, Serialize};
use smpdf_bridge::ErrorType;

/// Bin values of every convoluted member: rows are members, columns bins.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "Vec<Vec<f64>>", into = "Vec<Vec<f64>>")]
pub struct MemberTable {
    rows: Vec<Vec<f64>>,
}

impl MemberTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a table from rows that must all have the same length.
    pub fn from_rows(observable: &str, rows: Vec<Vec<f64>>) -> Result<Self, ResultsError> {
        let mut table = Self::new();
        for row in rows {
            table.push(observable, row)?;
        }
        Ok(table)
    }

    /// Append the values of the next member.
    pub fn push(&mut self, observable: &str, values: Vec<f64>) -> Result<(), ResultsError> {
        if let Some(first) = self.rows.first()
            && first.len() != values.len()
        {
            return Err(ResultsError::BinMismatch {
                observable: observable.to_string(),
                member: self.rows.len(),
                expected: first.len(),
                actual: values.len(),
            });
        }
        self.rows.push(values);
        Ok(())
    }

    pub fn rows(&self) -> &[Vec<f64>] {
        &self.rows
    }

    pub fn members(&self) -> usize {
        self.rows.len()
    }

    pub fn bins(&self) -> usize {
        self.rows.first().map_or(0, Vec::len)
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }
}

impl TryFrom<Vec<Vec<f64>>> for MemberTable {
    type Error = ResultsError;

    fn try_from(rows: Vec<Vec<f64>>) -> Result<Self, Self::Error> {
        Self::from_rows("member table", rows)
    }
}

impl From<MemberTable> for Vec<Vec<f64>> {
    fn from(table: MemberTable) -> Self {
        table.rows
    }
}

/// Lower and upper edge per bin.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Interval {
    pub min: Vec<f64>,
    pub max: Vec<f64>,
}

/// The member values of one observable for one PDF set.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ObservableResult {
    pub observable: ObservableKey,
    pub pdf: String,
    pub error_type: ErrorType,
    table: MemberTable,
}

impl ObservableResult {
    pub fn new(
        observable: ObservableKey,
        pdf: impl Into<String>,
        error_type: ErrorType,
        table: MemberTable,
    ) -> Result<Self, ResultsError> {
        if table.is_empty() {
            return Err(ResultsError::EmptyTable {
                observable: observable.to_string(),
            });
        }
        Ok(Self {
            observable,
            pdf: pdf.into(),
            error_type,
            table,
        })
    }

    pub fn table(&self) -> &MemberTable {
        &self.table
    }

    /// Values of the central member.
    pub fn central_value(&self) -> &[f64] {
        &self.table.rows[0]
    }

    /// Number of non-central members.
    pub fn nrep(&self) -> usize {
        self.table.members() - 1
    }

    pub fn nbins(&self) -> usize {
        self.table.bins()
    }

    fn replicas(&self) -> &[Vec<f64>] {
        &self.table.rows[1..]
    }

    fn unsupported(&self) -> ResultsError {
        ResultsError::UnsupportedErrorType {
            pdf: self.pdf.clone(),
            error_type: self.error_type.clone(),
        }
    }

    /// One-sigma uncertainty per bin, scaled by `nsigma`.
    ///
    /// - symmetric Hessian: `sqrt(Σ_k (v_k − cv)²)`
    /// - replicas: sample standard deviation of the replicas (n − 1
    ///   normalization); NaN with fewer than two replicas
    pub fn std_error(&self, nsigma: f64) -> Result<Vec<f64>, ResultsError> {
        let cv = self.central_value();
        match self.error_type {
            ErrorType::SymmHessian => Ok((0..self.nbins())
                .map(|bin| {
                    self.replicas()
                        .iter()
                        .map(|row| (row[bin] - cv[bin]).powi(2))
                        .sum::<f64>()
                        .sqrt()
                        * nsigma
                })
                .collect()),
            ErrorType::Replicas => {
                let n = self.nrep() as f64;
                Ok((0..self.nbins())
                    .map(|bin| {
                        if self.nrep() < 2 {
                            return f64::NAN;
                        }
                        let mean = self.replicas().iter().map(|row| row[bin]).sum::<f64>() / n;
                        let variance = self
                            .replicas()
                            .iter()
                            .map(|row| (row[bin] - mean).powi(2))
                            .sum::<f64>()
                            / (n - 1.0);
                        variance.sqrt() * nsigma
                    })
                    .collect())
            }
            ErrorType::Other(_) => Err(self.unsupported()),
        }
    }

    /// `cv ± std_error(nsigma)`.
    pub fn std_interval(&self, nsigma: f64) -> Result<Interval, ResultsError> {
        let std = self.std_error(nsigma)?;
        let cv = self.central_value();
        Ok(Interval {
            min: cv.iter().zip(&std).map(|(c, s)| c - s).collect(),
            max: cv.iter().zip(&std).map(|(c, s)| c + s).collect(),
        })
    }

    /// `±std_error(nsigma)`, relative to the central value.
    pub fn rel_std_interval(&self, nsigma: f64) -> Result<Interval, ResultsError> {
        let std = self.std_error(nsigma)?;
        Ok(Interval {
            min: std.iter().map(|s| -s).collect(),
            max: std,
        })
    }

    /// Smallest interval around the central value holding `percent`% of the
    /// replicas, bin by bin.
    ///
    /// The `percent·nrep/100` replicas closest to the central value are kept,
    /// capped at all of them; the interval spans their deviations, shifted by
    /// the central value when `add_central` is set.
    pub fn centered_interval(
        &self,
        percent: u32,
        add_central: bool,
    ) -> Result<Interval, ResultsError> {
        let kept = (percent as usize * self.nrep() / 100).min(self.nrep());
        if kept == 0 {
            return Err(ResultsError::EmptyInterval {
                percent,
                nrep: self.nrep(),
            });
        }
        let cv = self.central_value();
        let mut interval = Interval {
            min: Vec::with_capacity(self.nbins()),
            max: Vec::with_capacity(self.nbins()),
        };
        for bin in 0..self.nbins() {
            let mut deviations: Vec<f64> =
                self.replicas().iter().map(|row| row[bin] - cv[bin]).collect();
            deviations.sort_by(|a, b| a.abs().total_cmp(&b.abs()));
            let closest = &deviations[..kept];
            let shift = if add_central { cv[bin] } else { 0.0 };
            interval
                .min
                .push(closest.iter().copied().fold(f64::INFINITY, f64::min) + shift);
            interval
                .max
                .push(closest.iter().copied().fold(f64::NEG_INFINITY, f64::max) + shift);
        }
        Ok(interval)
    }

    /// The 68% band relative to the central value.
    pub fn errorbar68(&self) -> Result<Interval, ResultsError> {
        match self.error_type {
            ErrorType::Replicas => self.centered_interval(68, false),
            ErrorType::SymmHessian => self.rel_std_interval(1.0),
            ErrorType::Other(_) => Err(self.unsupported()),
        }
    }

    /// Collapse all bins into one per member, as observable `<name>[Sum]`.
    pub fn sum_bins(&self) -> Self {
        Self {
            observable: ObservableKey::new(
                format!("{}[Sum]", self.observable.name),
                self.observable.order,
            ),
            pdf: self.pdf.clone(),
            error_type: self.error_type.clone(),
            table: MemberTable {
                rows: self
                    .table
                    .rows
                    .iter()
                    .map(|row| vec![row.iter().sum()])
                    .collect(),
            },
        }
    }
}
