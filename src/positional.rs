//! Ordinal extensions: turning rank-order preferences into synthetic
//! cardinal ratings fed to a base rule.

use log::debug;
use nalgebra::DMatrix;

use crate::embeddings::Embeddings;
use crate::errors::VotingError;
use crate::ratings::Ratings;
use crate::rule::{check_shapes, Election, ScoringRule};
use crate::score::Score;

/// A voter's preference order: candidate indices sorted by descending rating.
///
/// Ties are resolved towards the higher candidate index (a stable ascending
/// sort read backwards). The single-voter manipulation walk depends on this
/// exact tie-break for reproducibility.
pub fn preference_order(ratings_row: &[f64]) -> Vec<usize> {
    let mut order: Vec<usize> = (0..ratings_row.len()).collect();
    order.sort_by(|&a, &b| ratings_row[a].total_cmp(&ratings_row[b]));
    order.reverse();
    order
}

/// Extends a cardinal rule to ordinal inputs through a fixed points vector.
///
/// Each voter's ratings row is reduced to its preference order, and the
/// rank-th preferred candidate receives `points[rank]` in a fake ratings
/// matrix, which is fed (with the original embeddings) to the base rule.
/// The transform is a function of ordinal information only: any two ratings
/// matrices inducing the same per-voter orders produce identical fake
/// ratings, hence identical outcomes.
///
/// ```
/// use embedded_voting::{Embeddings, Ratings, RulePositional, RuleProductRatings, ScoringRule};
///
/// let ratings = Ratings::from_rows(&[
///     vec![0.1, 0.2, 0.8, 1.0],
///     vec![0.7, 0.9, 0.8, 0.6],
///     vec![1.0, 0.6, 0.1, 0.3],
/// ])?;
/// let embeddings = Embeddings::from_rows(
///     &[vec![1.0, 0.0], vec![1.0, 1.0], vec![0.0, 1.0]],
///     true,
/// )?;
/// let plurality = RulePositional::plurality(4, RuleProductRatings)?;
/// let fake = plurality.fake_ratings(&ratings)?;
/// assert_eq!(fake.voter_ratings(0), vec![0.0, 0.0, 0.0, 1.0]);
/// assert_eq!(fake.voter_ratings(1), vec![0.0, 1.0, 0.0, 0.0]);
/// assert_eq!(fake.voter_ratings(2), vec![1.0, 0.0, 0.0, 0.0]);
/// # Ok::<(), embedded_voting::VotingError>(())
/// ```
#[derive(Debug, Clone)]
pub struct RulePositional<R> {
    points: Vec<f64>,
    base: R,
}

impl<R: ScoringRule> RulePositional<R> {
    /// A positional extension with an arbitrary points vector. The points
    /// must be non-increasing with a positive maximum; they are normalized
    /// by the maximum.
    pub fn new(points: Vec<f64>, base: R) -> Result<RulePositional<R>, VotingError> {
        let max = points.iter().copied().fold(f64::NEG_INFINITY, f64::max);
        let non_increasing = points.windows(2).all(|w| w[0] >= w[1]);
        if points.is_empty() || !non_increasing || !(max > 0.0) {
            return Err(VotingError::InvalidPoints);
        }
        Ok(RulePositional {
            points: points.iter().map(|p| p / max).collect(),
            base,
        })
    }

    /// Plurality points: `[1, 0, ..., 0]`.
    pub fn plurality(n_candidates: usize, base: R) -> Result<RulePositional<R>, VotingError> {
        let mut points = vec![0.0; n_candidates];
        if let Some(first) = points.first_mut() {
            *first = 1.0;
        }
        RulePositional::new(points, base)
    }

    /// Borda points: `[n-1, n-2, ..., 0]`.
    pub fn borda(n_candidates: usize, base: R) -> Result<RulePositional<R>, VotingError> {
        let points = (0..n_candidates)
            .rev()
            .map(|p| p as f64)
            .collect();
        RulePositional::new(points, base)
    }

    /// k-approval points: `[1, ..., 1, 0, ..., 0]` with `k` ones.
    pub fn k_approval(
        n_candidates: usize,
        k: usize,
        base: R,
    ) -> Result<RulePositional<R>, VotingError> {
        let points = (0..n_candidates)
            .map(|p| if p < k { 1.0 } else { 0.0 })
            .collect();
        RulePositional::new(points, base)
    }

    pub fn base(&self) -> &R {
        &self.base
    }

    /// The normalized points vector.
    pub fn points(&self) -> &[f64] {
        &self.points
    }

    /// The synthetic ratings derived from the voters' preference orders.
    /// Row `i` is a permutation of the points vector, placed according to
    /// voter `i`'s order over the candidates.
    pub fn fake_ratings(&self, ratings: &Ratings) -> Result<Ratings, VotingError> {
        if self.points.len() != ratings.n_candidates() {
            return Err(VotingError::PointsLengthMismatch {
                points: self.points.len(),
                candidates: ratings.n_candidates(),
            });
        }
        let mut fake = DMatrix::zeros(ratings.n_voters(), ratings.n_candidates());
        for voter in 0..ratings.n_voters() {
            let row = ratings.voter_ratings(voter);
            for (rank, &candidate) in preference_order(&row).iter().enumerate() {
                fake[(voter, candidate)] = self.points[rank];
            }
        }
        Ok(Ratings::new(fake))
    }
}

impl<R: ScoringRule> ScoringRule for RulePositional<R> {
    fn score(
        &self,
        ratings: &Ratings,
        embeddings: &Embeddings,
        candidate: usize,
    ) -> Result<Score, VotingError> {
        check_shapes(ratings, embeddings)?;
        let fake = self.fake_ratings(ratings)?;
        self.base.score(&fake, embeddings, candidate)
    }

    fn evaluate(
        &self,
        ratings: &Ratings,
        embeddings: &Embeddings,
    ) -> Result<Election, VotingError> {
        check_shapes(ratings, embeddings)?;
        let fake = self.fake_ratings(ratings)?;
        self.base.evaluate(&fake, embeddings)
    }
}

/// Instant-runoff extension.
///
/// Rounds of plurality counts over the still-running candidates: each round,
/// every voter's top remaining candidate receives one point, the base rule
/// scores the resulting fake ratings, and the lowest-scoring remaining
/// candidate is eliminated. On ties, the lowest original candidate index is
/// eliminated (preserved exactly for reproducibility). The ranking is the
/// reverse elimination order; the exposed scores are positional
/// (`n_candidates - 1 - rank position`), so the ranking/score coherence of
/// [`ScoringRule`] holds and the welfare decreases linearly along the
/// ranking.
#[derive(Debug, Clone)]
pub struct RuleInstantRunoff<R> {
    base: R,
}

impl<R: ScoringRule> RuleInstantRunoff<R> {
    pub fn new(base: R) -> RuleInstantRunoff<R> {
        RuleInstantRunoff { base }
    }

    pub fn base(&self) -> &R {
        &self.base
    }

    fn elimination_ranking(
        &self,
        ratings: &Ratings,
        embeddings: &Embeddings,
    ) -> Result<Vec<usize>, VotingError> {
        let n_candidates = ratings.n_candidates();
        let mut remaining = vec![true; n_candidates];
        let mut ranking = vec![0usize; n_candidates];

        for round in 0..n_candidates {
            let fake = plurality_restricted(ratings, &remaining);
            let election = self.base.evaluate(&fake, embeddings)?;
            let mut eliminated: Option<(usize, Score)> = None;
            for candidate in 0..n_candidates {
                if !remaining[candidate] {
                    continue;
                }
                let score = election.scores[candidate];
                // Strict comparison: ties eliminate the lowest index.
                match eliminated {
                    Some((_, worst)) if score >= worst => {}
                    _ => eliminated = Some((candidate, score)),
                }
            }
            let (out, _) = eliminated.ok_or(VotingError::EmptyElection)?;
            debug!("instant runoff round {}: eliminating {}", round + 1, out);
            remaining[out] = false;
            ranking[n_candidates - 1 - round] = out;
        }
        Ok(ranking)
    }
}

/// Plurality fake ratings over the still-running candidates: each voter's
/// preferred remaining candidate gets 1, everyone else 0.
fn plurality_restricted(ratings: &Ratings, remaining: &[bool]) -> Ratings {
    let mut fake = DMatrix::zeros(ratings.n_voters(), ratings.n_candidates());
    for voter in 0..ratings.n_voters() {
        let row = ratings.voter_ratings(voter);
        if let Some(&top) = preference_order(&row)
            .iter()
            .find(|&&c| remaining[c])
        {
            fake[(voter, top)] = 1.0;
        }
    }
    Ratings::new(fake)
}

impl<R: ScoringRule> ScoringRule for RuleInstantRunoff<R> {
    fn score(
        &self,
        ratings: &Ratings,
        embeddings: &Embeddings,
        candidate: usize,
    ) -> Result<Score, VotingError> {
        check_shapes(ratings, embeddings)?;
        if candidate >= ratings.n_candidates() {
            return Err(VotingError::CandidateOutOfRange {
                candidate,
                candidates: ratings.n_candidates(),
            });
        }
        let ranking = self.elimination_ranking(ratings, embeddings)?;
        let position = ranking
            .iter()
            .position(|&c| c == candidate)
            .ok_or(VotingError::EmptyElection)?;
        Ok(Score::Single((ratings.n_candidates() - 1 - position) as f64))
    }

    fn evaluate(
        &self,
        ratings: &Ratings,
        embeddings: &Embeddings,
    ) -> Result<Election, VotingError> {
        check_shapes(ratings, embeddings)?;
        let ranking = self.elimination_ranking(ratings, embeddings)?;
        let n_candidates = ratings.n_candidates();
        let mut scores = vec![Score::Single(0.0); n_candidates];
        for (position, &candidate) in ranking.iter().enumerate() {
            scores[candidate] = Score::Single((n_candidates - 1 - position) as f64);
        }
        Election::from_scores(scores)
    }
}
