use log::debug;

use crate::embeddings::Embeddings;
use crate::errors::VotingError;
use crate::ratings::Ratings;
use crate::score::{scores_to_floats, Score};

/// The outcome of evaluating a rule on one (ratings, embeddings) pair.
///
/// An `Election` is the explicit cache of every derived quantity: it is
/// immutable and bound to the inputs it was computed from. Evaluating the
/// same inputs twice yields identical elections; evaluating new inputs
/// yields a fresh election, so no stale state can leak between runs.
#[derive(Debug, Clone, PartialEq)]
pub struct Election {
    /// Per-candidate scores, in candidate order.
    pub scores: Vec<Score>,
    /// Candidate indices sorted by descending score; ties keep the lower
    /// candidate index first (stable sort).
    pub ranking: Vec<usize>,
    /// The first candidate of the ranking.
    pub winner: usize,
    /// Per-candidate welfare in `[0, 1]`: 1 for the best raw score, 0 for the
    /// worst, linear in between. All 1 when every candidate is tied.
    pub welfare: Vec<f64>,
}

impl Election {
    pub(crate) fn from_scores(scores: Vec<Score>) -> Result<Election, VotingError> {
        if scores.is_empty() {
            return Err(VotingError::EmptyElection);
        }
        let mut ranking: Vec<usize> = (0..scores.len()).collect();
        ranking.sort_by(|&a, &b| scores[b].cmp(&scores[a]));
        let winner = ranking[0];

        let floats = scores_to_floats(&scores);
        let min = floats.iter().copied().fold(f64::INFINITY, f64::min);
        let max = floats.iter().copied().fold(f64::NEG_INFINITY, f64::max);
        let welfare = if max > min {
            floats.iter().map(|v| (v - min) / (max - min)).collect()
        } else {
            // Degenerate case: every candidate is tied, welfare is all 1.
            vec![1.0; scores.len()]
        };
        Ok(Election {
            scores,
            ranking,
            winner,
            welfare,
        })
    }
}

/// A scoring rule: maps (ratings, embeddings) to per-candidate scores.
///
/// Implementors provide [`score`](ScoringRule::score), a pure function of
/// its inputs; the provided [`evaluate`](ScoringRule::evaluate) derives the
/// ranking, winner and welfare from it. Rules that ignore the embeddings
/// still take them, for interface uniformity.
pub trait ScoringRule {
    /// The score of one candidate. Pure: no side effects, no cached state,
    /// since manipulation analyzers repeatedly probe it under perturbed
    /// ratings.
    fn score(
        &self,
        ratings: &Ratings,
        embeddings: &Embeddings,
        candidate: usize,
    ) -> Result<Score, VotingError>;

    /// Scores all candidates and derives the ranking, winner and welfare.
    fn evaluate(
        &self,
        ratings: &Ratings,
        embeddings: &Embeddings,
    ) -> Result<Election, VotingError> {
        check_shapes(ratings, embeddings)?;
        debug!(
            "evaluate: {} voters, {} candidates, {} dims",
            ratings.n_voters(),
            ratings.n_candidates(),
            embeddings.n_dim()
        );
        let scores = (0..ratings.n_candidates())
            .map(|c| self.score(ratings, embeddings, c))
            .collect::<Result<Vec<Score>, VotingError>>()?;
        let election = Election::from_scores(scores)?;
        debug!("evaluate: winner {}", election.winner);
        Ok(election)
    }
}

/// Fails fast on mismatched inputs, before any numeric work.
pub(crate) fn check_shapes(
    ratings: &Ratings,
    embeddings: &Embeddings,
) -> Result<(), VotingError> {
    if ratings.n_candidates() == 0 {
        return Err(VotingError::EmptyElection);
    }
    if ratings.n_voters() != embeddings.n_voters() {
        return Err(VotingError::VoterCountMismatch {
            ratings_voters: ratings.n_voters(),
            embeddings_voters: embeddings.n_voters(),
        });
    }
    Ok(())
}

pub(crate) fn check_score_inputs(
    ratings: &Ratings,
    embeddings: &Embeddings,
    candidate: usize,
) -> Result<(), VotingError> {
    check_shapes(ratings, embeddings)?;
    if candidate >= ratings.n_candidates() {
        return Err(VotingError::CandidateOutOfRange {
            candidate,
            candidates: ratings.n_candidates(),
        });
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ranking_breaks_ties_by_candidate_index() {
        let election = Election::from_scores(vec![
            Score::Single(0.5),
            Score::Single(0.9),
            Score::Single(0.5),
        ])
        .unwrap();
        assert_eq!(election.ranking, vec![1, 0, 2]);
        assert_eq!(election.winner, 1);
    }

    #[test]
    fn welfare_bounds() {
        let election = Election::from_scores(vec![
            Score::Single(0.2),
            Score::Single(1.0),
            Score::Single(0.6),
        ])
        .unwrap();
        assert_eq!(election.welfare[election.winner], 1.0);
        assert_eq!(election.welfare[0], 0.0);
        assert_eq!(election.welfare[2], 0.5);
    }

    #[test]
    fn all_tied_welfare_is_all_one() {
        let election =
            Election::from_scores(vec![Score::Single(0.3); 4]).unwrap();
        assert_eq!(election.welfare, vec![1.0; 4]);
        assert_eq!(election.ranking, vec![0, 1, 2, 3]);
    }

    #[test]
    fn empty_election_is_an_error() {
        assert_eq!(
            Election::from_scores(vec![]).unwrap_err(),
            VotingError::EmptyElection
        );
    }
}
