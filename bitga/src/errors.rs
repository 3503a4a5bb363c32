use thiserror::Error;

/// Error returned by a failing fitness function.
pub type EvaluationError = Box<dyn std::error::Error + Send + Sync>;

pub type Result<T> = std::result::Result<T, GaError>;

/// Broad classes of [`GaError`].
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ErrorKind {
    /// Invalid arguments or configuration, detected at the point of use.
    Configuration,
    /// The population is in a state where the operation is meaningless.
    State,
    /// The caller-supplied fitness function failed.
    Evaluation,
}

/// The errors produced by encoding, population and evolution operations.
#[derive(Debug, Error)]
pub enum GaError {
    #[error("invalid bit width {0}, must be 32 or 64")]
    InvalidWidth(usize),
    #[error("selection pressure {0} is outside the interval [1, 2]")]
    SelectionPressure(f64),
    #[error("probability {0} is outside the interval [0, 1]")]
    Probability(f64),
    #[error("invalid {name} {value}")]
    InvalidParameter { name: &'static str, value: f64 },
    #[error("fitness must be an array with shape ({expected},), but has shape ({actual},)")]
    FitnessDimension { expected: usize, actual: usize },
    #[error("index lists differ in length ({0} != {1})")]
    MismatchedIndices(usize, usize),
    #[error("index {index} is out of bounds for {size} elements")]
    IndexOutOfBounds { index: usize, size: usize },
    #[error("bit position {position} is out of range for {width}-bit strings")]
    BitPosition { position: usize, width: usize },
    #[error("unknown bit selection policy `{0}`")]
    UnknownSelection(String),
    #[error("`{0}` is not a 32 or 64 character binary string")]
    InvalidBitString(String),
    #[error(transparent)]
    Shape(#[from] ndarray::ShapeError),
    #[error(
        "fitness values are not set, likely caused by updating individuals \
         without redefining fitness"
    )]
    FitnessNotSet,
    #[error("population must contain at least one individual")]
    EmptyPopulation,
    #[error("attempted selection on degenerate population: {0}")]
    DegeneratePopulation(&'static str),
    #[error("fitness evaluation failed: {0}")]
    Evaluation(#[source] EvaluationError),
}

impl GaError {
    /// Returns the class this error belongs to.
    ///
    /// # Examples
    /// ```
    /// use bitga::{ErrorKind, GaError};
    ///
    /// assert_eq!(GaError::InvalidWidth(16).kind(), ErrorKind::Configuration);
    /// assert_eq!(GaError::FitnessNotSet.kind(), ErrorKind::State);
    /// ```
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::FitnessNotSet | Self::EmptyPopulation | Self::DegeneratePopulation(_) => {
                ErrorKind::State
            }
            Self::Evaluation(_) => ErrorKind::Evaluation,
            _ => ErrorKind::Configuration,
        }
    }
}
