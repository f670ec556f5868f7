use crate::embeddings::Embeddings;
use crate::errors::VotingError;
use crate::ratings::Ratings;
use crate::rule::{check_score_inputs, ScoringRule};
use crate::score::Score;

/// Rule in which the score of a candidate is the product of her ratings.
///
/// The score is a pair: the number of strictly positive ratings, then the
/// product of those ratings. Zero or negative ratings are excluded from the
/// product and only affect the count, so a candidate with more nonzero
/// ratings always outranks one with fewer, whatever the product magnitudes.
/// Well suited only to nonnegative ratings. Embeddings are ignored.
#[derive(Debug, Clone, Copy, Default)]
pub struct RuleProductRatings;

impl ScoringRule for RuleProductRatings {
    fn score(
        &self,
        ratings: &Ratings,
        embeddings: &Embeddings,
        candidate: usize,
    ) -> Result<Score, VotingError> {
        check_score_inputs(ratings, embeddings, candidate)?;
        let mut count = 0u64;
        let mut product = 1.0;
        for rating in ratings.candidate_ratings(candidate) {
            if rating > 0.0 {
                count += 1;
                product *= rating;
            }
        }
        Ok(Score::Pair(count, product))
    }
}
