//! Compile errors
//!
//! Every fault is fatal at the point detected; the transfer index is
//! attached where one is known so the outer system can point at the
//! offending request entry.

use thiserror::Error;

use decant_model::Volume;

/// Compiler result type
pub type Result<T> = std::result::Result<T, Error>;

/// Compile errors
#[derive(Debug, Clone, PartialEq, Error)]
pub enum Error {
    #[error(transparent)]
    Model(#[from] decant_model::Error),

    #[error("malformed policy document: {0}")]
    PolicyParse(String),

    #[error("policy rule set has no \"default\" policy")]
    PolicyMissingDefault,

    #[error("rule {rule:?} has no policy entry")]
    MissingRulePolicy { rule: String },

    #[error("invalid condition on {variable:?}: {reason}")]
    InvalidCondition { variable: String, reason: String },

    #[error("rules {first:?} and {second:?} both match with equal priority and specificity")]
    PolicyAmbiguous { first: String, second: String },

    #[error("volume {volume} below channel minimum {min}")]
    VolumeBelowMinimum { volume: Volume, min: Volume },

    #[error("transfer {index}: {source}")]
    AtTransfer { index: usize, source: Box<Error> },
}

impl Error {
    /// Attach the index of the transfer being lowered when the fault
    /// was detected. Already-indexed errors keep the innermost index.
    pub fn at_transfer(self, index: usize) -> Error {
        match self {
            Error::AtTransfer { .. } => self,
            other => Error::AtTransfer {
                index,
                source: Box::new(other),
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_at_transfer_wraps_once() {
        let err = Error::PolicyMissingDefault.at_transfer(3).at_transfer(7);
        match err {
            Error::AtTransfer { index, source } => {
                assert_eq!(index, 3);
                assert!(matches!(*source, Error::PolicyMissingDefault));
            }
            other => panic!("unexpected error {other:?}"),
        }
    }

    #[test]
    fn test_model_error_converts() {
        let model = decant_model::Error::NoHeadAvailable(Volume::microlitres(0.1));
        let err: Error = model.into();
        assert!(err.to_string().contains("no head"));
    }
}
