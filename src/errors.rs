use snafu::Snafu;

/// Errors surfaced by rules, extensions and manipulation analyzers.
///
/// All shape and precondition violations are reported before any computation
/// proceeds; mismatched matrices are never truncated or padded.
#[derive(Debug, Snafu, Clone, PartialEq)]
#[snafu(visibility(pub(crate)))]
pub enum VotingError {
    #[snafu(display(
        "ratings has {ratings_voters} voters but embeddings has {embeddings_voters}"
    ))]
    VoterCountMismatch {
        ratings_voters: usize,
        embeddings_voters: usize,
    },

    #[snafu(display(
        "points vector has {points} entries but the election has {candidates} candidates"
    ))]
    PointsLengthMismatch { points: usize, candidates: usize },

    /// The points of a positional extension must be non-increasing with a
    /// strictly positive maximum.
    #[snafu(display("points vector must be non-increasing with a positive maximum"))]
    InvalidPoints,

    #[snafu(display("row {row} has {actual} entries, expected {expected}"))]
    RaggedRows {
        row: usize,
        expected: usize,
        actual: usize,
    },

    #[snafu(display("the election has no candidates"))]
    EmptyElection,

    #[snafu(display("candidate index {candidate} out of range ({candidates} candidates)"))]
    CandidateOutOfRange {
        candidate: usize,
        candidates: usize,
    },

    #[snafu(display("voter index {voter} out of range ({voters} voters)"))]
    VoterOutOfRange { voter: usize, voters: usize },

    #[snafu(display("dimension mismatch: got {actual}, expected {expected}"))]
    DimensionMismatch { actual: usize, expected: usize },

    #[snafu(display("parameter {name} must lie in [0, 1], got {value}"))]
    ParameterOutOfRange { name: &'static str, value: f64 },

    #[snafu(display("numerical routine failed: {detail}"))]
    NumericalFailure { detail: String },
}

impl VotingError {
    pub(crate) fn numerical(detail: impl Into<String>) -> VotingError {
        VotingError::NumericalFailure {
            detail: detail.into(),
        }
    }
}
