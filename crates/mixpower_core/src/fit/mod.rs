//! Model fitting interface.
//!
//! The sweep engine treats fitting as an opaque capability: it hands a
//! dataset and a formula to a [`Fitter`] and receives term estimates back.
//! [`BalancedFitter`] is the built-in implementation for the balanced
//! two-condition design.

mod balanced;

pub use balanced::{BalancedFitter, SINGULAR_FIT_WARNING};

use crate::error::FitError;
use crate::model::{FitResult, TrialRecord};

/// Random intercepts and slopes per subject, correlated.
pub const MODEL_FORMULA: &str = "response ~ condition + (1+condition | subject)";

/// Name of the fixed intercept term
pub const INTERCEPT_TERM: &str = "(Intercept)";
/// Name of the fixed treatment-effect term
pub const EFFECT_TERM: &str = "conditiontreatment";

/// Fits a mixed model to simulated data.
///
/// Convergence problems that still yield estimates are reported through
/// [`FitResult::warnings`]; anything that prevents estimation is a
/// [`FitError`].
pub trait Fitter: Send + Sync {
    fn fit(&self, data: &[TrialRecord], formula: &str) -> Result<FitResult, FitError>;
}

impl<F: Fitter + ?Sized> Fitter for &F {
    fn fit(&self, data: &[TrialRecord], formula: &str) -> Result<FitResult, FitError> {
        (**self).fit(data, formula)
    }
}

impl<F: Fitter + ?Sized> Fitter for Box<F> {
    fn fit(&self, data: &[TrialRecord], formula: &str) -> Result<FitResult, FitError> {
        (**self).fit(data, formula)
    }
}
