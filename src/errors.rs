use thiserror::Error;

/// The result type for the `regfa` crate.
pub type Result<T> = std::result::Result<T, RegFaError>;

/// The error type for the `regfa` crate.
#[derive(Error, Debug)]
pub struct RegFaError {
    /// The source of the error.
    pub source: Box<RegFaErrorKind>,
}

impl RegFaError {
    /// Create a new `RegFaError`.
    pub fn new(kind: RegFaErrorKind) -> Self {
        RegFaError {
            source: Box::new(kind),
        }
    }

    /// Get the kind of the error.
    pub fn kind(&self) -> &RegFaErrorKind {
        &self.source
    }
}

impl std::fmt::Display for RegFaError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.source)
    }
}

/// The error kind type.
#[derive(Error, Debug)]
pub enum RegFaErrorKind {
    /// The bounds of a range are out of their domain or in the wrong order.
    #[error("Invalid range: {lo}-{hi}")]
    InvalidRange {
        /// The lower bound as given by the caller.
        lo: String,
        /// The upper bound as given by the caller.
        hi: String,
    },

    /// An argument could not be interpreted, e.g. a range bound that is not an integer.
    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    /// An error occurred during construction of the DFA.
    #[error(transparent)]
    DfaError(DfaError),
}

impl From<DfaError> for RegFaError {
    fn from(error: DfaError) -> Self {
        RegFaError::new(RegFaErrorKind::DfaError(error))
    }
}

/// An error type for the DFA.
#[derive(Error, Debug)]
pub enum DfaError {
    /// The subset construction needed more states than the caller allowed.
    #[error("DFA construction exceeded the limit of {limit} states")]
    StateLimitExceeded {
        /// The state limit that was exceeded.
        limit: usize,
    },
}

/// Construct a `RegFaError` with kind `InvalidRange` from two displayable bounds.
macro_rules! invalid_range {
    ($lo:expr, $hi:expr) => {
        $crate::errors::RegFaError::new($crate::errors::RegFaErrorKind::InvalidRange {
            lo: $lo.to_string(),
            hi: $hi.to_string(),
        })
    };
}
pub(crate) use invalid_range;
