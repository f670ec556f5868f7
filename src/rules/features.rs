use nalgebra::DMatrix;

use crate::embeddings::Embeddings;
use crate::errors::VotingError;
use crate::ratings::Ratings;
use crate::rule::{check_score_inputs, check_shapes, Election, ScoringRule};
use crate::score::Score;

/// Tolerance for the Moore-Penrose pseudo-inverse.
const PINV_EPS: f64 = 1e-12;

/// Rule in which the score of a candidate is the squared norm of her
/// feature vector.
///
/// Features are obtained by least-squares projection of the ratings onto the
/// embeddings basis: `features = (pinv(EᵗE) Eᵗ R)ᵗ`, one row per candidate.
/// The pseudo-inverse keeps the projection defined when the embeddings are
/// rank-deficient or `n_dim > n_voters`.
#[derive(Debug, Clone, Copy, Default)]
pub struct RuleFeatures;

impl RuleFeatures {
    /// The `n_candidates x n_dim` features matrix.
    pub fn features(
        ratings: &Ratings,
        embeddings: &Embeddings,
    ) -> Result<DMatrix<f64>, VotingError> {
        check_shapes(ratings, embeddings)?;
        let positions = embeddings.positions();
        let gram = positions.transpose() * positions;
        let pinv = gram
            .pseudo_inverse(PINV_EPS)
            .map_err(VotingError::numerical)?;
        Ok((pinv * positions.transpose() * ratings.matrix()).transpose())
    }
}

impl ScoringRule for RuleFeatures {
    fn score(
        &self,
        ratings: &Ratings,
        embeddings: &Embeddings,
        candidate: usize,
    ) -> Result<Score, VotingError> {
        check_score_inputs(ratings, embeddings, candidate)?;
        let features = RuleFeatures::features(ratings, embeddings)?;
        Ok(Score::Single(
            features.row(candidate).iter().map(|x| x * x).sum(),
        ))
    }

    // The projection is shared by all candidates, compute it once.
    fn evaluate(
        &self,
        ratings: &Ratings,
        embeddings: &Embeddings,
    ) -> Result<Election, VotingError> {
        check_shapes(ratings, embeddings)?;
        let features = RuleFeatures::features(ratings, embeddings)?;
        let scores = (0..ratings.n_candidates())
            .map(|c| Score::Single(features.row(c).iter().map(|x| x * x).sum()))
            .collect();
        Election::from_scores(scores)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;

    fn reference_inputs() -> (Ratings, Embeddings) {
        let ratings = Ratings::from_rows(&[
            vec![0.5, 0.6, 0.3],
            vec![0.7, 0.0, 0.2],
            vec![0.2, 1.0, 0.8],
        ])
        .unwrap();
        let embeddings = Embeddings::from_rows(
            &[vec![1.0, 1.0], vec![1.0, 0.0], vec![0.0, 1.0]],
            true,
        )
        .unwrap();
        (ratings, embeddings)
    }

    #[test]
    fn reference_election() {
        let (ratings, embeddings) = reference_inputs();
        let election = RuleFeatures.evaluate(&ratings, &embeddings).unwrap();

        assert_abs_diff_eq!(
            election.scores[0].value(),
            0.44784902576697316,
            epsilon = 1e-9
        );
        assert_abs_diff_eq!(
            election.scores[1].value(),
            0.9271320343559639,
            epsilon = 1e-9
        );
        assert_abs_diff_eq!(
            election.scores[2].value(),
            0.43356601717798204,
            epsilon = 1e-9
        );

        assert_eq!(election.ranking, vec![1, 0, 2]);
        assert_eq!(election.winner, 1);

        assert_abs_diff_eq!(
            election.welfare[0],
            0.028938395456510148,
            epsilon = 1e-9
        );
        assert_abs_diff_eq!(election.welfare[1], 1.0, epsilon = 1e-12);
        assert_abs_diff_eq!(election.welfare[2], 0.0, epsilon = 1e-12);
    }

    #[test]
    fn score_matches_evaluate() {
        let (ratings, embeddings) = reference_inputs();
        let election = RuleFeatures.evaluate(&ratings, &embeddings).unwrap();
        for c in 0..3 {
            let s = RuleFeatures.score(&ratings, &embeddings, c).unwrap();
            assert_eq!(s, election.scores[c]);
        }
    }

    #[test]
    fn rank_deficient_embeddings_do_not_fail() {
        // All voters share the same direction: the Gram matrix is singular.
        let ratings =
            Ratings::from_rows(&[vec![0.4, 0.9], vec![0.8, 0.1], vec![0.3, 0.3]]).unwrap();
        let embeddings = Embeddings::from_rows(
            &[vec![1.0, 1.0], vec![1.0, 1.0], vec![1.0, 1.0]],
            true,
        )
        .unwrap();
        let election = RuleFeatures.evaluate(&ratings, &embeddings).unwrap();
        assert_eq!(election.ranking.len(), 2);
    }

    #[test]
    fn more_dims_than_voters_is_well_defined() {
        let ratings = Ratings::from_rows(&[vec![0.2, 0.9]]).unwrap();
        let embeddings =
            Embeddings::from_rows(&[vec![0.5, 0.5, 0.5, 0.5]], true).unwrap();
        assert!(RuleFeatures.evaluate(&ratings, &embeddings).is_ok());
    }
}
