use nalgebra::DMatrix;

use crate::embeddings::{Embeddings, EmbeddingsFromRatingsCorrelation};
use crate::errors::VotingError;
use crate::ratings::Ratings;
use crate::rule::{check_score_inputs, check_shapes, Election, ScoringRule};
use crate::score::Score;

/// How the leading eigenvalues of a candidate's weighted correlation matrix
/// are collapsed into one scalar.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FastAggregation {
    /// Product of the leading values (Nash-style).
    Product,
    Sum,
    Min,
    /// `sum(ln(1 + value * n_voters))`, a softened product.
    Log,
}

/// Rule scoring a candidate through the voter correlation matrix, with the
/// embeddings inferred from the ratings themselves.
///
/// The rule builds [`EmbeddingsFromRatingsCorrelation`] from the ratings,
/// transforms each voter's rating of the candidate by
/// `sqrt(max(0, rating / ||row||))`, scales row and column `i` of the
/// correlation matrix by voter `i`'s transformed rating, and aggregates the
/// top `leading()` eigenvalues (clamped at zero, square-rooted, sorted
/// descending). The embeddings argument is accepted for interface uniformity
/// and ignored; only its voter count is checked.
#[derive(Debug, Clone, Copy)]
pub struct RuleFast {
    aggregation: FastAggregation,
}

impl RuleFast {
    pub fn new(aggregation: FastAggregation) -> RuleFast {
        RuleFast { aggregation }
    }

    /// Nash-style product aggregation.
    pub fn nash() -> RuleFast {
        RuleFast::new(FastAggregation::Product)
    }

    pub fn sum() -> RuleFast {
        RuleFast::new(FastAggregation::Sum)
    }

    pub fn min() -> RuleFast {
        RuleFast::new(FastAggregation::Min)
    }

    pub fn log() -> RuleFast {
        RuleFast::new(FastAggregation::Log)
    }

    /// Per-voter transform of the ratings: `sqrt(max(0, rating / ||row||))`.
    /// Rows of zero norm stay zero.
    fn transformed(ratings: &Ratings) -> DMatrix<f64> {
        let mut out = ratings.matrix().clone();
        for voter in 0..out.nrows() {
            let norm = out.row(voter).iter().map(|x| x * x).sum::<f64>().sqrt();
            for candidate in 0..out.ncols() {
                let value = if norm > 0.0 {
                    out[(voter, candidate)] / norm
                } else {
                    0.0
                };
                out[(voter, candidate)] = value.max(0.0).sqrt();
            }
        }
        out
    }

    fn aggregate(&self, values: &[f64], n_voters: usize) -> f64 {
        if values.is_empty() {
            return 0.0;
        }
        match self.aggregation {
            FastAggregation::Product => values.iter().product(),
            FastAggregation::Sum => values.iter().sum(),
            FastAggregation::Min => values.iter().copied().fold(f64::INFINITY, f64::min),
            FastAggregation::Log => values
                .iter()
                .map(|v| (1.0 + v * n_voters as f64).ln())
                .sum(),
        }
    }

    fn candidate_score(
        &self,
        correlation: &EmbeddingsFromRatingsCorrelation,
        transformed: &DMatrix<f64>,
        candidate: usize,
    ) -> f64 {
        let n_voters = transformed.nrows();
        let mut weighted = correlation.embeddings().positions().clone();
        for i in 0..n_voters {
            for j in 0..n_voters {
                weighted[(i, j)] *=
                    transformed[(i, candidate)] * transformed[(j, candidate)];
            }
        }
        let mut values: Vec<f64> = weighted
            .symmetric_eigenvalues()
            .iter()
            .map(|e| e.max(0.0).sqrt())
            .collect();
        values.sort_by(|a, b| b.total_cmp(a));
        let keep = correlation.leading().min(values.len());
        self.aggregate(&values[..keep], n_voters)
    }
}

impl ScoringRule for RuleFast {
    fn score(
        &self,
        ratings: &Ratings,
        embeddings: &Embeddings,
        candidate: usize,
    ) -> Result<Score, VotingError> {
        check_score_inputs(ratings, embeddings, candidate)?;
        let correlation = EmbeddingsFromRatingsCorrelation::from_ratings(ratings);
        let transformed = RuleFast::transformed(ratings);
        Ok(Score::Single(self.candidate_score(
            &correlation,
            &transformed,
            candidate,
        )))
    }

    // The correlation matrix is shared by all candidates, compute it once.
    fn evaluate(
        &self,
        ratings: &Ratings,
        embeddings: &Embeddings,
    ) -> Result<Election, VotingError> {
        check_shapes(ratings, embeddings)?;
        let correlation = EmbeddingsFromRatingsCorrelation::from_ratings(ratings);
        let transformed = RuleFast::transformed(ratings);
        let scores = (0..ratings.n_candidates())
            .map(|c| Score::Single(self.candidate_score(&correlation, &transformed, c)))
            .collect();
        Election::from_scores(scores)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;

    fn reference_ratings() -> Ratings {
        Ratings::from_rows(&[
            vec![0.5, 0.6, 0.3],
            vec![0.7, 0.0, 0.2],
            vec![0.2, 1.0, 0.8],
        ])
        .unwrap()
    }

    fn no_embeddings(n_voters: usize) -> Embeddings {
        Embeddings::new(nalgebra::DMatrix::zeros(n_voters, 0), false)
    }

    #[test]
    fn reference_ranking_is_stable_across_aggregations() {
        let ratings = reference_ratings();
        for rule in [RuleFast::nash(), RuleFast::sum(), RuleFast::min(), RuleFast::log()] {
            let election = rule.evaluate(&ratings, &no_embeddings(3)).unwrap();
            assert_eq!(election.ranking, vec![0, 2, 1]);
            assert_eq!(election.winner, 0);
        }
    }

    #[test]
    fn reference_scores() {
        let ratings = reference_ratings();
        let nash = RuleFast::nash().evaluate(&ratings, &no_embeddings(3)).unwrap();
        assert_abs_diff_eq!(nash.scores[0].value(), 0.4971855803806034, epsilon = 1e-9);
        assert_abs_diff_eq!(nash.scores[1].value(), 0.2601666006671786, epsilon = 1e-9);
        assert_abs_diff_eq!(nash.scores[2].value(), 0.3684545926716884, epsilon = 1e-9);

        let sum = RuleFast::sum().evaluate(&ratings, &no_embeddings(3)).unwrap();
        assert_abs_diff_eq!(sum.scores[0].value(), 1.5075218165304547, epsilon = 1e-9);
        assert_abs_diff_eq!(sum.scores[1].value(), 1.2530740216231677, epsilon = 1e-9);
        assert_abs_diff_eq!(sum.scores[2].value(), 1.2810734250943994, epsilon = 1e-9);
    }

    #[test]
    fn embeddings_argument_is_ignored() {
        let ratings = reference_ratings();
        let with_dims = Embeddings::from_rows(
            &[vec![1.0, 0.0], vec![0.0, 1.0], vec![1.0, 1.0]],
            true,
        )
        .unwrap();
        let a = RuleFast::nash().evaluate(&ratings, &no_embeddings(3)).unwrap();
        let b = RuleFast::nash().evaluate(&ratings, &with_dims).unwrap();
        assert_eq!(a.scores, b.scores);
    }

    #[test]
    fn zero_rating_rows_are_tolerated() {
        let ratings = Ratings::from_rows(&[
            vec![0.0, 0.0],
            vec![0.8, 0.3],
        ])
        .unwrap();
        let election = RuleFast::sum().evaluate(&ratings, &no_embeddings(2)).unwrap();
        assert_eq!(election.ranking.len(), 2);
        assert_eq!(election.winner, 0);
    }

    #[test]
    fn voter_count_mismatch_fails_fast() {
        let ratings = reference_ratings();
        assert_eq!(
            RuleFast::nash()
                .evaluate(&ratings, &no_embeddings(2))
                .unwrap_err(),
            VotingError::VoterCountMismatch {
                ratings_voters: 3,
                embeddings_voters: 2
            }
        );
    }
}
