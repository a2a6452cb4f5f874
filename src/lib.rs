//! Parameter estimation for nonlinear models: an Adaptive Metropolis MCMC
//! sampler over bounded parameters, plus a Nelder–Mead point estimate to
//! start it from.
//!
//! The usual workflow is [`optimization::optimize`] for a starting point,
//! then [`adaptive_metropolis::sample`] for the posterior chain.

pub mod adaptive_metropolis;
pub mod bounds;
pub mod core;
pub mod distributions;
pub mod errors;
pub mod io;
pub mod objective;
pub mod optimization;
pub mod parameters;
pub mod stats;
pub mod summary;

pub use adaptive_metropolis::{sample, sample_chains, SamplerOptions};
pub use errors::{ConfigurationError, SamplerError};
pub use objective::{Objective, ParameterValues};
pub use optimization::optimize;
pub use parameters::{Parameter, ParameterSet};
