use crate::embeddings::Embeddings;
use crate::errors::VotingError;
use crate::ratings::Ratings;
use crate::rule::{check_score_inputs, ScoringRule};
use crate::score::Score;

/// Singular values below this threshold do not count towards the rank.
const RANK_EPS: f64 = 1e-10;

/// How the singular values of a candidate's weighted embeddings matrix are
/// collapsed into one scalar.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SingularAggregation {
    /// Product of the singular values (Nash-style).
    Product,
    /// Sum of the singular values (utilitarian-style).
    Sum,
    Min,
    Max,
}

/// Rule scoring a candidate through the singular values of the embeddings
/// matrix weighted by her ratings.
///
/// For a candidate, every voter's embedding row is scaled by the square root
/// of the rating that voter gave her (or by the raw rating, see
/// [`raw_weights`](RuleSvd::raw_weights)), and the singular values of the
/// scaled matrix are aggregated. Singular values are invariant under row
/// permutations, so permuting voters in ratings and embeddings together
/// leaves every score unchanged.
///
/// With [`use_rank`](RuleSvd::use_rank), the score becomes the pair
/// (numerical rank, aggregate of the top-rank singular values), so candidates
/// spanning more independent voter directions always come first.
#[derive(Debug, Clone, Copy)]
pub struct RuleSvd {
    aggregation: SingularAggregation,
    square_root: bool,
    use_rank: bool,
}

impl RuleSvd {
    pub fn new(aggregation: SingularAggregation) -> RuleSvd {
        RuleSvd {
            aggregation,
            square_root: true,
            use_rank: false,
        }
    }

    /// Nash-style product aggregation.
    pub fn nash() -> RuleSvd {
        RuleSvd::new(SingularAggregation::Product)
    }

    pub fn sum() -> RuleSvd {
        RuleSvd::new(SingularAggregation::Sum)
    }

    pub fn min() -> RuleSvd {
        RuleSvd::new(SingularAggregation::Min)
    }

    pub fn max() -> RuleSvd {
        RuleSvd::new(SingularAggregation::Max)
    }

    /// Weight the embeddings rows by the raw ratings instead of their square
    /// roots.
    pub fn raw_weights(mut self) -> RuleSvd {
        self.square_root = false;
        self
    }

    /// Score by (rank, aggregate of the top-rank singular values) instead of
    /// aggregating all singular values.
    pub fn use_rank(mut self) -> RuleSvd {
        self.use_rank = true;
        self
    }

    fn aggregate(&self, values: &[f64]) -> f64 {
        if values.is_empty() {
            return 0.0;
        }
        match self.aggregation {
            SingularAggregation::Product => values.iter().product(),
            SingularAggregation::Sum => values.iter().sum(),
            SingularAggregation::Min => {
                values.iter().copied().fold(f64::INFINITY, f64::min)
            }
            SingularAggregation::Max => {
                values.iter().copied().fold(f64::NEG_INFINITY, f64::max)
            }
        }
    }
}

impl ScoringRule for RuleSvd {
    fn score(
        &self,
        ratings: &Ratings,
        embeddings: &Embeddings,
        candidate: usize,
    ) -> Result<Score, VotingError> {
        check_score_inputs(ratings, embeddings, candidate)?;
        let mut weighted = embeddings.positions().clone();
        for voter in 0..ratings.n_voters() {
            let rating = ratings.get(voter, candidate);
            let weight = if self.square_root {
                rating.max(0.0).sqrt()
            } else {
                rating
            };
            for dim in 0..weighted.ncols() {
                weighted[(voter, dim)] *= weight;
            }
        }
        let svd = weighted.svd(false, false);
        let mut singular: Vec<f64> = svd.singular_values.iter().copied().collect();
        singular.sort_by(|a, b| b.total_cmp(a));

        if self.use_rank {
            let rank = singular.iter().filter(|s| **s > RANK_EPS).count();
            Ok(Score::Pair(rank as u64, self.aggregate(&singular[..rank])))
        } else {
            Ok(Score::Single(self.aggregate(&singular)))
        }
    }
}
