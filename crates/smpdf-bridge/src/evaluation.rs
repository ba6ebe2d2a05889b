//! Point-query callbacks handed to the grid engine.
//!
//! The engine evaluates the distribution at points of its own choosing while
//! it convolutes, so the two queries are exposed as a capability
//! ([`PartonEvaluator`]) rather than batched or buffered.
//!
//! ## Flavor layout
//!
//! The flavor array has [`NUM_FLAVORS`] entries. Index `i` holds flavor id
//! `i - 6`:
//!
//! ```text
//! index   0   1   2   3   4   5   6   7   8   9  10  11  12
//! flavor -6  -5  -4  -3  -2  -1   0   1   2   3   4   5   6
//!        t̄   b̄   c̄   s̄   ū   d̄   g   d   u   s   c   b   t
//! ```
//!
//! The engine reads the array positionally; the layout must not change.

use crate::distribution::DistributionMember;

/// Number of entries in a flavor evaluation.
pub const NUM_FLAVORS: usize = 13;

/// Flavor ids in array order.
pub const FLAVOR_IDS: [i32; NUM_FLAVORS] = [-6, -5, -4, -3, -2, -1, 0, 1, 2, 3, 4, 5, 6];

/// Flavor id stored at array position `index`.
///
/// Returns `None` for positions past the end of the array.
pub fn flavor_id(index: usize) -> Option<i32> {
    FLAVOR_IDS.get(index).copied()
}

/// Array position of flavor id `flavor`.
pub fn flavor_index(flavor: i32) -> Option<usize> {
    let index = usize::try_from(flavor + 6).ok()?;
    (index < NUM_FLAVORS).then_some(index)
}

/// The two callbacks a grid engine convolutes against.
pub trait PartonEvaluator {
    /// `x·f(x, Q)` for every flavor, in [`FLAVOR_IDS`] order.
    fn flavor_evaluation(&self, x: f64, q: f64) -> [f64; NUM_FLAVORS];

    /// Strong coupling at scale `q`.
    fn coupling_evaluation(&self, q: f64) -> f64;
}

/// Evaluator over one ensemble member.
///
/// Borrowing the member for the lifetime of the bridge keeps the distribution
/// state frozen while an engine holds the callbacks.
#[derive(Clone, Copy)]
pub struct EvaluationBridge<'a> {
    member: &'a dyn DistributionMember,
}

impl<'a> EvaluationBridge<'a> {
    pub fn new(member: &'a dyn DistributionMember) -> Self {
        Self { member }
    }

    /// The member the bridge answers for.
    pub fn member(&self) -> &'a dyn DistributionMember {
        self.member
    }
}

impl PartonEvaluator for EvaluationBridge<'_> {
    fn flavor_evaluation(&self, x: f64, q: f64) -> [f64; NUM_FLAVORS] {
        FLAVOR_IDS.map(|flavor| self.member.flavor_value(flavor, x, q))
    }

    fn coupling_evaluation(&self, q: f64) -> f64 {
        self.member.coupling_value(q)
    }
}
