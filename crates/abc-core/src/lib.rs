#![deny(missing_docs)]
#![doc = "Core traits and data types for the ABC-MCMC engine: errors, seeding, parameter boxes and the work function contract."]

pub mod errors;
pub mod rng;
mod types;

pub use errors::{AbcError, ErrorInfo};
pub use rng::{derive_substream_seed, RngHandle};
pub use types::{Bounds, EvaluationResult, ParamBox};

/// Contract for the black-box simulator plus distance metric.
///
/// Implementations map a parameter vector to an [`EvaluationResult`] whose
/// leading entries repeat the parameters and whose last entry is the distance
/// between simulated and observed behaviour. Stochastic simulators draw their
/// noise from the supplied RNG so runs stay reproducible.
pub trait WorkFunction: Send + Sync {
    /// Number of parameters the function expects.
    fn n_params(&self) -> usize;

    /// Runs the simulator for `params` and scores it against the observations.
    fn evaluate(&self, params: &[f64], rng: &mut RngHandle) -> Result<EvaluationResult, AbcError>;
}

impl<W: WorkFunction + ?Sized> WorkFunction for &W {
    fn n_params(&self) -> usize {
        (**self).n_params()
    }

    fn evaluate(&self, params: &[f64], rng: &mut RngHandle) -> Result<EvaluationResult, AbcError> {
        (**self).evaluate(params, rng)
    }
}

impl<W: WorkFunction + ?Sized> WorkFunction for Box<W> {
    fn n_params(&self) -> usize {
        (**self).n_params()
    }

    fn evaluate(&self, params: &[f64], rng: &mut RngHandle) -> Result<EvaluationResult, AbcError> {
        (**self).evaluate(params, rng)
    }
}
