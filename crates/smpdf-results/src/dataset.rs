//! Assemble member tables for many PDF sets, reusing cached sweeps.

use crate::cache::{CacheRecord, ResultCache};
use crate::error::ResultsError;
use crate::observable::{Observable, PdfSet};
use crate::result::ObservableResult;
use crate::sweep::{ObservableTable, make_convolution};
use serde::{Deserialize, Serialize};
use smpdf_bridge::{ErrorType, Session};
use tracing::{debug, info};

/// Member tables of one PDF set, in observable order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PdfData {
    pub pdf: String,
    /// Unknown only when no table was computed or loaded.
    pub error_type: Option<ErrorType>,
    pub tables: Vec<ObservableTable>,
}

impl PdfData {
    pub fn empty(pdf: impl Into<String>) -> Self {
        Self {
            pdf: pdf.into(),
            error_type: None,
            tables: Vec::new(),
        }
    }
}

/// Member tables for every PDF set and observable.
///
/// With a cache, tables found there are reused and only the missing
/// observables are convoluted; new tables are added to the cache. The
/// caller decides when to persist it.
pub fn get_dataset(
    session: &mut Session,
    pdfsets: &[PdfSet],
    observables: &[Observable],
    mut cache: Option<&mut ResultCache>,
) -> Result<Vec<PdfData>, ResultsError> {
    let mut dataset = Vec::with_capacity(pdfsets.len());
    for pdf in pdfsets {
        let Some(cache) = cache.as_deref_mut() else {
            dataset.push(make_convolution(session, pdf, observables)?);
            continue;
        };

        let (cached, missing): (Vec<&Observable>, Vec<&Observable>) = observables
            .iter()
            .partition(|observable| cache.get(&pdf.name, &observable.key()).is_some());
        debug!(
            pdf = %pdf,
            cached = cached.len(),
            missing = missing.len(),
            "cache lookup"
        );

        let missing: Vec<Observable> = missing.into_iter().cloned().collect();
        let computed = make_convolution(session, pdf, &missing)?;
        if let Some(error_type) = &computed.error_type {
            for table in &computed.tables {
                cache.insert(CacheRecord {
                    pdf: pdf.name.clone(),
                    observable: table.observable.key(),
                    error_type: error_type.clone(),
                    table: table.table.clone(),
                });
            }
        }

        let mut error_type = computed.error_type.clone();

        let mut tables = Vec::with_capacity(observables.len());
        for observable in observables {
            if let Some(table) = computed
                .tables
                .iter()
                .find(|table| table.observable == *observable)
            {
                tables.push(table.clone());
            } else if let Some(record) = cache.get(&pdf.name, &observable.key()) {
                error_type.get_or_insert_with(|| record.error_type.clone());
                tables.push(ObservableTable {
                    observable: observable.clone(),
                    table: record.table.clone(),
                });
            }
        }
        dataset.push(PdfData {
            pdf: pdf.name.clone(),
            error_type,
            tables,
        });
    }
    Ok(dataset)
}

/// One result per (PDF set, observable) table.
pub fn results_from_dataset(dataset: Vec<PdfData>) -> Result<Vec<ObservableResult>, ResultsError> {
    let mut results = Vec::new();
    for data in dataset {
        let Some(error_type) = data.error_type else {
            continue;
        };
        for table in data.tables {
            results.push(ObservableResult::new(
                table.observable.key(),
                data.pdf.clone(),
                error_type.clone(),
                table.table,
            )?);
        }
    }
    Ok(results)
}

/// [`get_dataset`] followed by [`results_from_dataset`].
pub fn convolve_or_load(
    session: &mut Session,
    pdfsets: &[PdfSet],
    observables: &[Observable],
    cache: Option<&mut ResultCache>,
) -> Result<Vec<ObservableResult>, ResultsError> {
    let results = results_from_dataset(get_dataset(session, pdfsets, observables, cache)?)?;
    info!(results = results.len(), "assembled results");
    Ok(results)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::observable::ObservableKey;
    use crate::result::MemberTable;
    use smpdf_bridge::toy::{ToyEnsembleLibrary, ToyGrid, ToyGridLibrary, ToyMember};

    fn session() -> Session {
        let ensembles = ToyEnsembleLibrary::new()
            .with_ensemble(
                "MC",
                ErrorType::Replicas,
                vec![
                    ToyMember::scaled(2.0, 0.118),
                    ToyMember::scaled(1.0, 0.118),
                    ToyMember::scaled(3.0, 0.118),
                ],
            )
            .with_ensemble(
                "HESSIAN",
                ErrorType::SymmHessian,
                vec![ToyMember::scaled(2.0, 0.118), ToyMember::scaled(2.5, 0.118)],
            );
        let grids = ToyGridLibrary::new()
            .with_grid("a.root", ToyGrid::gluon_only(&[1.0, 2.0]))
            .with_grid("b.root", ToyGrid::gluon_only(&[1.0]));
        Session::new(ensembles, grids)
    }

    fn observables() -> Vec<Observable> {
        vec![Observable::new("a.root", 0), Observable::new("b.root", 0)]
    }

    #[test]
    fn without_cache_every_table_is_computed() {
        let mut session = session();
        let pdfsets = [PdfSet::new("MC"), PdfSet::new("HESSIAN")];
        let dataset = get_dataset(&mut session, &pdfsets, &observables(), None)
            .expect("dataset assembles");
        assert_eq!(dataset.len(), 2);
        assert_eq!(dataset[1].error_type, Some(ErrorType::SymmHessian));
        assert_eq!(dataset[1].tables[0].table.members(), 2);
    }

    #[test]
    fn cached_tables_are_reused() {
        let marker = MemberTable::from_rows("a", vec![vec![-1.0, -2.0]]).expect("rows");
        let mut cache = ResultCache::from_records([CacheRecord {
            pdf: "MC".to_string(),
            observable: ObservableKey::new("a", 0),
            error_type: ErrorType::Replicas,
            table: marker.clone(),
        }]);

        let mut session = session();
        let dataset = get_dataset(
            &mut session,
            &[PdfSet::new("MC")],
            &observables(),
            Some(&mut cache),
        )
        .expect("dataset assembles");

        let data = &dataset[0];
        assert_eq!(data.tables.len(), 2);
        assert_eq!(data.tables[0].observable.name(), "a");
        assert_eq!(data.tables[0].table, marker);
        assert_eq!(data.tables[1].table.members(), 3);
        assert_eq!(cache.len(), 2);
        assert!(cache.get("MC", &ObservableKey::new("b", 0)).is_some());
    }

    #[test]
    fn fully_cached_set_never_touches_the_session() {
        let mut cache = ResultCache::new();
        for name in ["a", "b"] {
            cache.insert(CacheRecord {
                pdf: "UNKNOWN".to_string(),
                observable: ObservableKey::new(name, 0),
                error_type: ErrorType::SymmHessian,
                table: MemberTable::from_rows(name, vec![vec![1.0], vec![2.0]]).expect("rows"),
            });
        }

        let mut session = session();
        let results = convolve_or_load(
            &mut session,
            &[PdfSet::new("UNKNOWN")],
            &observables(),
            Some(&mut cache),
        )
        .expect("served from cache");
        assert_eq!(results.len(), 2);
        assert!(results.iter().all(|r| r.error_type == ErrorType::SymmHessian));
        assert!(!session.distributions().is_loaded());
    }

    #[test]
    fn results_carry_set_error_type() {
        let mut session = session();
        let results = convolve_or_load(
            &mut session,
            &[PdfSet::new("MC"), PdfSet::new("HESSIAN")],
            &observables(),
            None,
        )
        .expect("results assemble");
        assert_eq!(results.len(), 4);
        assert_eq!(results[0].pdf, "MC");
        assert_eq!(results[0].error_type, ErrorType::Replicas);
        assert_eq!(results[0].observable, ObservableKey::new("a", 0));
        assert_eq!(results[3].pdf, "HESSIAN");
        assert_eq!(results[3].observable, ObservableKey::new("b", 0));
        assert_eq!(results[3].nrep(), 1);
    }
}
