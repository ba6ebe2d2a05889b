//! C-ABI callbacks for grid engines that only accept bare function pointers.
//!
//! Engines written against the classic Fortran-style interface take
//! `evolvepdf_(const double& x, const double& Q, double* xfx)` and
//! `alphaspdf_(const double& Q)` with no user-data argument. The
//! trampolines here forward to whichever [`PartonEvaluator`] was installed by
//! [`with_evaluator`] on the calling thread. Outside that scope there is no
//! evaluator, and the trampolines answer NaN.

use crate::evaluation::{NUM_FLAVORS, PartonEvaluator};
use std::cell::Cell;
use tracing::error;

/// `void evolvepdf_(const double& x, const double& Q, double* xfx)`.
pub type EvolvePdfFn = unsafe extern "C" fn(x: &f64, q: &f64, xfx: *mut f64);

/// `double alphaspdf_(const double& Q)`.
pub type AlphasPdfFn = extern "C" fn(q: &f64) -> f64;

/// The pair of function pointers handed to a C grid engine.
#[derive(Debug, Clone, Copy)]
pub struct RawCallbacks {
    pub evolvepdf: EvolvePdfFn,
    pub alphaspdf: AlphasPdfFn,
}

type EvaluatorPtr = *const (dyn PartonEvaluator + 'static);

thread_local! {
    static ACTIVE: Cell<Option<EvaluatorPtr>> = const { Cell::new(None) };
}

/// Restores the previously installed evaluator, also on unwind.
struct ScopeGuard {
    previous: Option<EvaluatorPtr>,
}

impl Drop for ScopeGuard {
    fn drop(&mut self) {
        ACTIVE.with(|slot| slot.set(self.previous));
    }
}

/// Run `body` with `evaluator` behind the raw callbacks.
///
/// Scopes nest: the innermost evaluator answers, and the outer one is
/// restored when `body` returns.
///
/// The evaluator is installed for the current thread only. An engine that
/// calls [`evolvepdf_`] or [`alphaspdf_`] from its own worker threads finds
/// no evaluator there and gets NaN back, so it must run the convolution on
/// the thread that entered this scope.
pub fn with_evaluator<R>(
    evaluator: &dyn PartonEvaluator,
    body: impl FnOnce(RawCallbacks) -> R,
) -> R {
    let ptr: *const (dyn PartonEvaluator + '_) = evaluator;
    // SAFETY: only the pointer's lifetime bound is erased. The slot is reset
    // by `ScopeGuard` before `evaluator`'s borrow ends, so the pointer is never
    // dereferenced after it dangles.
    let ptr: EvaluatorPtr = unsafe { std::mem::transmute(ptr) };
    let previous = ACTIVE.with(|slot| slot.replace(Some(ptr)));
    let _guard = ScopeGuard { previous };
    body(RawCallbacks {
        evolvepdf: evolvepdf_,
        alphaspdf: alphaspdf_,
    })
}

fn with_active<R>(query: impl FnOnce(&dyn PartonEvaluator) -> R) -> Option<R> {
    let ptr = ACTIVE.with(Cell::get)?;
    // SAFETY: a pointer in the slot is live for the enclosing `with_evaluator`.
    Some(query(unsafe { &*ptr }))
}

/// Fill `xfx[0..13]` with the active evaluator's flavor values.
///
/// # Safety
///
/// `xfx` must be null or valid for writes of 13 consecutive `f64`.
pub unsafe extern "C" fn evolvepdf_(x: &f64, q: &f64, xfx: *mut f64) {
    if xfx.is_null() {
        error!("evolvepdf_ called with a null output buffer");
        return;
    }
    let values = with_active(|evaluator| evaluator.flavor_evaluation(*x, *q)).unwrap_or_else(|| {
        error!("evolvepdf_ called outside an evaluator scope");
        [f64::NAN; NUM_FLAVORS]
    });
    // SAFETY: the caller guarantees room for NUM_FLAVORS values.
    unsafe { std::ptr::copy_nonoverlapping(values.as_ptr(), xfx, NUM_FLAVORS) };
}

/// Coupling of the active evaluator at `q`.
pub extern "C" fn alphaspdf_(q: &f64) -> f64 {
    with_active(|evaluator| evaluator.coupling_evaluation(*q)).unwrap_or_else(|| {
        error!("alphaspdf_ called outside an evaluator scope");
        f64::NAN
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Constant(f64);

    impl PartonEvaluator for Constant {
        fn flavor_evaluation(&self, x: f64, q: f64) -> [f64; NUM_FLAVORS] {
            [self.0 + x + q; NUM_FLAVORS]
        }

        fn coupling_evaluation(&self, q: f64) -> f64 {
            self.0 * q
        }
    }

    fn call_evolve(callbacks: RawCallbacks, x: f64, q: f64) -> [f64; NUM_FLAVORS] {
        let mut out = [0.0; NUM_FLAVORS];
        unsafe { (callbacks.evolvepdf)(&x, &q, out.as_mut_ptr()) };
        out
    }

    #[test]
    fn callbacks_forward_to_scoped_evaluator() {
        let evaluator = Constant(1.0);
        with_evaluator(&evaluator, |callbacks| {
            assert_eq!(call_evolve(callbacks, 0.25, 2.0), [3.25; NUM_FLAVORS]);
            assert_eq!((callbacks.alphaspdf)(&4.0), 4.0);
        });
    }

    #[test]
    fn callbacks_outside_scope_answer_nan() {
        assert!(alphaspdf_(&10.0).is_nan());
        let mut out = [0.0; NUM_FLAVORS];
        unsafe { evolvepdf_(&0.1, &10.0, out.as_mut_ptr()) };
        assert!(out.iter().all(|value| value.is_nan()));
    }

    #[test]
    fn nested_scopes_restore_outer_evaluator() {
        let outer = Constant(1.0);
        let inner = Constant(2.0);
        with_evaluator(&outer, |callbacks| {
            with_evaluator(&inner, |nested| {
                assert_eq!((nested.alphaspdf)(&1.0), 2.0);
            });
            assert_eq!((callbacks.alphaspdf)(&1.0), 1.0);
        });
        assert!(alphaspdf_(&1.0).is_nan());
    }

    #[test]
    fn other_threads_do_not_see_the_scoped_evaluator() {
        let evaluator = Constant(1.0);
        with_evaluator(&evaluator, |callbacks| {
            let alphas = std::thread::spawn(move || (callbacks.alphaspdf)(&1.0))
                .join()
                .expect("worker thread");
            assert!(alphas.is_nan());
            assert_eq!((callbacks.alphaspdf)(&1.0), 1.0);
        });
    }
}
