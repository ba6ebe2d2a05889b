//! Convolute every selected member of a PDF set through a list of
//! observables.

use crate::dataset::PdfData;
use crate::error::ResultsError;
use crate::observable::{Observable, PdfSet};
use crate::result::MemberTable;
use serde::{Deserialize, Serialize};
use smpdf_bridge::Session;
use tracing::{debug, info};

/// Member values of one observable.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ObservableTable {
    pub observable: Observable,
    pub table: MemberTable,
}

/// Sweep `pdf` through `observables` on `session`.
///
/// The ensemble is loaded once, and only if there is something to compute.
/// Each grid is loaded once and convoluted for every selected member, so the
/// session ends with the last observable's grid and member active.
pub fn make_convolution(
    session: &mut Session,
    pdf: &PdfSet,
    observables: &[Observable],
) -> Result<PdfData, ResultsError> {
    if observables.is_empty() {
        return Ok(PdfData::empty(&pdf.name));
    }
    if !pdf.members.includes_central() {
        return Err(ResultsError::MissingCentralMember {
            pdf: pdf.name.clone(),
        });
    }

    let info = session.init_pdf(&pdf.name)?.clone();
    let members = pdf.members.indices(info.num_members);
    let mut tables = Vec::with_capacity(observables.len());
    for observable in observables {
        let bins = session.init_obs(observable.file())?;
        info!(
            pdf = %pdf,
            observable = %observable,
            bins,
            members = members.len(),
            "computing observable"
        );
        let label = observable.to_string();
        let mut table = MemberTable::new();
        for member in members.clone() {
            debug!(pdf = %pdf, member, "computing member");
            session.pdf_replica(member)?;
            let result = session.convolute(observable.order)?;
            table.push(&label, result.into_values())?;
        }
        tables.push(ObservableTable {
            observable: observable.clone(),
            table,
        });
    }

    Ok(PdfData {
        pdf: pdf.name.clone(),
        error_type: Some(info.error_type),
        tables,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::observable::MemberSelection;
    use smpdf_bridge::toy::{ToyEnsembleLibrary, ToyGrid, ToyGridLibrary, ToyMember};
    use smpdf_bridge::{BridgeError, ErrorType};

    fn session() -> Session {
        let ensembles = ToyEnsembleLibrary::new().with_ensemble(
            "SET",
            ErrorType::Replicas,
            vec![
                ToyMember::scaled(2.0, 0.118),
                ToyMember::scaled(1.0, 0.118),
                ToyMember::scaled(4.0, 0.118),
            ],
        );
        let grids = ToyGridLibrary::new()
            .with_grid("a.root", ToyGrid::gluon_only(&[1.0, 1.0]))
            .with_grid("b.root", ToyGrid::gluon_only(&[1.0]));
        Session::new(ensembles, grids)
    }

    #[test]
    fn sweeps_every_member_of_every_observable() {
        let mut session = session();
        let observables = [Observable::new("a.root", 0), Observable::new("b.root", 0)];
        let data = make_convolution(&mut session, &PdfSet::new("SET"), &observables)
            .expect("sweep succeeds");

        assert_eq!(data.error_type, Some(ErrorType::Replicas));
        assert_eq!(data.tables.len(), 2);
        assert_eq!(data.tables[0].observable.name(), "a");
        assert_eq!(data.tables[0].table.members(), 3);
        assert_eq!(data.tables[0].table.bins(), 2);
        assert_eq!(data.tables[1].table.bins(), 1);

        let rows = data.tables[1].table.rows();
        assert_eq!(rows[0][0] * 0.5, rows[1][0]);
        assert_eq!(rows[1][0] * 4.0, rows[2][0]);
    }

    #[test]
    fn nothing_to_compute_skips_loading() {
        let mut session = session();
        let data = make_convolution(&mut session, &PdfSet::new("MISSING"), &[])
            .expect("nothing to do");
        assert!(data.tables.is_empty());
        assert_eq!(data.error_type, None);
        assert!(!session.distributions().is_loaded());
    }

    #[test]
    fn member_subset_is_respected() {
        let mut session = session();
        let pdf = PdfSet::new("SET").with_members(MemberSelection::Range { min: 0, max: 2 });
        let data = make_convolution(&mut session, &pdf, &[Observable::new("b.root", 0)])
            .expect("sweep succeeds");
        assert_eq!(data.tables[0].table.members(), 2);
    }

    #[test]
    fn subset_without_central_member_is_rejected() {
        let mut session = session();
        let pdf = PdfSet::new("SET").with_members(MemberSelection::Single(2));
        assert!(matches!(
            make_convolution(&mut session, &pdf, &[Observable::new("b.root", 0)]),
            Err(ResultsError::MissingCentralMember { .. })
        ));
    }

    #[test]
    fn bridge_errors_propagate() {
        let mut session = session();
        let err = make_convolution(
            &mut session,
            &PdfSet::new("SET"),
            &[Observable::new("missing.root", 0)],
        )
        .expect_err("grid is unknown");
        assert!(matches!(
            err,
            ResultsError::Bridge(BridgeError::GridLoad { .. })
        ));

        let pdf = PdfSet::new("SET").with_members(MemberSelection::Range { min: 0, max: 5 });
        let err = make_convolution(&mut session, &pdf, &[Observable::new("b.root", 0)])
            .expect_err("member 3 does not exist");
        assert!(matches!(
            err,
            ResultsError::Bridge(BridgeError::InvalidMemberIndex { index: 3, .. })
        ));
    }
}
