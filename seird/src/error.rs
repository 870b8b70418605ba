//! Error types for the forecasting core.
//!
//! Every failure is surfaced to the immediate caller; nothing here is retried
//! or replaced by a default value.

use thiserror::Error;

use crate::math::ode::OdeError;

#[derive(Debug, Error)]
pub enum Error {
    /// An input with no sensible physical interpretation, rejected before integration.
    #[error("invalid parameter `{name}` = {value}: {reason}")]
    InvalidParameter {
        name: &'static str,
        value: f64,
        reason: &'static str,
    },
    /// The integrator could not produce a finite solution over the requested grid.
    #[error(transparent)]
    Integration(#[from] OdeError),
    /// A case-history series that cannot be differenced or summed.
    #[error("malformed series: {0}")]
    MalformedSeries(String),
}

impl Error {
    pub(crate) fn invalid(name: &'static str, value: f64, reason: &'static str) -> Self {
        Error::InvalidParameter { name, value, reason }
    }
}

pub type Result<T> = std::result::Result<T, Error>;
