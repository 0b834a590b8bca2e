mod design;
mod results;
mod trials;

pub use design::{DesignField, DesignParameters, UnknownFieldError};
pub(crate) use design::covariance_is_psd;
pub use results::{
    EffectType, FitResult, ReplicationResult, ResultRow, TermEstimate, rows_to_results,
};
pub use trials::{Condition, RandomEffect, SubjectRandomEffects, TrialRecord};
