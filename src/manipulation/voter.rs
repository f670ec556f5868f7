use log::{debug, info};

use crate::embeddings::Embeddings;
use crate::errors::VotingError;
use crate::manipulation::RatingsPatch;
use crate::positional::{preference_order, RulePositional};
use crate::ratings::Ratings;
use crate::rule::ScoringRule;
use crate::score::Score;

/// Single-voter manipulation analysis of a cardinal rule.
///
/// For each voter, finds the most-preferred candidate (by her true ranking)
/// she could make win by misreporting her own ratings row, holding everyone
/// else fixed. Instead of searching all possible reports, the analyzer
/// probes the rule with the voter's row set to all-ones and to all-zeros and
/// walks the merged score list: a candidate whose maximal-report score comes
/// before the first minimal-report score is considered reachable. This is a
/// heuristic over extremal reports, not an exhaustive best-response search;
/// its tie-break order is part of the contract and kept stable across
/// releases so simulation results stay comparable.
#[derive(Debug)]
pub struct ManipulationVoter<R> {
    ratings: Ratings,
    embeddings: Embeddings,
    rule: R,
    winner: usize,
    welfare: Vec<f64>,
    outcomes: Option<Vec<usize>>,
}

impl<R: ScoringRule> ManipulationVoter<R> {
    pub fn new(
        ratings: &Ratings,
        embeddings: &Embeddings,
        rule: R,
    ) -> Result<ManipulationVoter<R>, VotingError> {
        let baseline = rule.evaluate(ratings, embeddings)?;
        info!(
            "single-voter analysis: baseline winner {} over {} candidates",
            baseline.winner,
            ratings.n_candidates()
        );
        Ok(ManipulationVoter {
            ratings: ratings.clone(),
            embeddings: embeddings.clone(),
            rule,
            winner: baseline.winner,
            welfare: baseline.welfare,
            outcomes: None,
        })
    }

    pub fn winner(&self) -> usize {
        self.winner
    }

    pub fn welfare(&self) -> &[f64] {
        &self.welfare
    }

    /// The favorite candidate voter `i` can turn into the winner by
    /// misreporting, or the baseline winner when she cannot do better.
    pub fn manipulation_voter(&mut self, voter: usize) -> Result<usize, VotingError> {
        if voter >= self.ratings.n_voters() {
            return Err(VotingError::VoterOutOfRange {
                voter,
                voters: self.ratings.n_voters(),
            });
        }
        let order = preference_order(&self.ratings.voter_ratings(voter));
        // A voter whose favorite already wins does not manipulate.
        if order[0] == self.winner {
            return Ok(self.winner);
        }
        let winner = self.winner;

        let ManipulationVoter {
            ratings,
            embeddings,
            rule,
            ..
        } = self;
        let (scores_max, scores_min) = {
            let mut patch = RatingsPatch::new(ratings);
            patch.set_row_uniform(voter, 1.0);
            let scores_max = rule.evaluate(patch.ratings(), embeddings)?.scores;
            patch.set_row_uniform(voter, 0.0);
            let scores_min = rule.evaluate(patch.ratings(), embeddings)?.scores;
            (scores_max, scores_min)
        };

        // Merge the two probes; bucket 1 is the maximal report, bucket 0 the
        // minimal one. The walk stops at the first minimal-report entry.
        let mut all_scores: Vec<(Score, usize, usize)> = Vec::new();
        all_scores.extend(scores_max.iter().enumerate().map(|(c, &s)| (s, c, 1)));
        all_scores.extend(scores_min.iter().enumerate().map(|(c, &s)| (s, c, 0)));
        all_scores.sort_by(|a, b| b.cmp(a));

        let mut best = position_in(&order, winner)?;
        for (_, candidate, bucket) in all_scores {
            if bucket == 0 {
                break;
            }
            let index = position_in(&order, candidate)?;
            if index < best {
                best = index;
            }
        }
        debug!(
            "voter {}: best reachable candidate {}",
            voter, order[best]
        );
        Ok(order[best])
    }

    /// The per-voter outcomes of [`manipulation_voter`], memoized.
    ///
    /// [`manipulation_voter`]: ManipulationVoter::manipulation_voter
    pub fn manipulation_global(&mut self) -> Result<Vec<usize>, VotingError> {
        if let Some(ref outcomes) = self.outcomes {
            return Ok(outcomes.clone());
        }
        let mut outcomes = Vec::with_capacity(self.ratings.n_voters());
        for voter in 0..self.ratings.n_voters() {
            outcomes.push(self.manipulation_voter(voter)?);
        }
        self.outcomes = Some(outcomes.clone());
        Ok(outcomes)
    }

    /// The proportion of voters able to improve on the baseline winner.
    pub fn prop_manipulator(&mut self) -> Result<f64, VotingError> {
        let winner = self.winner;
        let outcomes = self.manipulation_global()?;
        Ok(proportion_not(&outcomes, winner))
    }

    /// The mean baseline welfare of the per-voter outcomes.
    pub fn avg_welfare(&mut self) -> Result<f64, VotingError> {
        let outcomes = self.manipulation_global()?;
        Ok(mean_welfare(&outcomes, &self.welfare))
    }

    /// The minimum baseline welfare over the per-voter outcomes.
    pub fn worst_welfare(&mut self) -> Result<f64, VotingError> {
        let outcomes = self.manipulation_global()?;
        Ok(min_welfare(&outcomes, &self.welfare))
    }

    pub fn is_manipulable(&mut self) -> Result<bool, VotingError> {
        let winner = self.winner;
        Ok(self.manipulation_global()?.iter().any(|&c| c != winner))
    }
}

/// Single-voter manipulation analysis in the ordinal/positional setting.
///
/// The voter reports a preference order, so her influence goes through the
/// extension's fake ratings row. For each of the `n_candidates` uniform
/// reports (the whole row set to `e / (n_candidates - 1)`), the base rule is
/// re-scored; the merged `(score, candidate, bucket)` list is walked in
/// descending order, consuming one slot per bucket (`bucket e` holds `e`
/// slots, mirroring the at-most-one-rank-per-level constraint), and stops at
/// the first exhausted bucket. Candidates seen in the top bucket before the
/// stop are reachable. Uniform-bucket reports are a strict subset of all
/// `n!` orders, so this is a documented approximation of the true
/// best-response search, kept as-is for reproducibility.
#[derive(Debug)]
pub struct ManipulationOrdinal<R> {
    ratings: Ratings,
    embeddings: Embeddings,
    extension: RulePositional<R>,
    fake_ratings: Ratings,
    winner: usize,
    welfare: Vec<f64>,
    outcomes: Option<Vec<usize>>,
}

impl<R: ScoringRule> ManipulationOrdinal<R> {
    /// Sets up the analyzer: the winner comes from the extension, the
    /// baseline welfare from the base rule on the true ratings.
    pub fn new(
        ratings: &Ratings,
        embeddings: &Embeddings,
        extension: RulePositional<R>,
    ) -> Result<ManipulationOrdinal<R>, VotingError> {
        let fake_ratings = extension.fake_ratings(ratings)?;
        let winner = extension.base().evaluate(&fake_ratings, embeddings)?.winner;
        let welfare = extension.base().evaluate(ratings, embeddings)?.welfare;
        info!("ordinal single-voter analysis: baseline winner {}", winner);
        Ok(ManipulationOrdinal {
            ratings: ratings.clone(),
            embeddings: embeddings.clone(),
            extension,
            fake_ratings,
            winner,
            welfare,
            outcomes: None,
        })
    }

    /// Convenience constructor for the Borda extension of `rule`.
    pub fn borda(
        ratings: &Ratings,
        embeddings: &Embeddings,
        rule: R,
    ) -> Result<ManipulationOrdinal<R>, VotingError> {
        let extension = RulePositional::borda(ratings.n_candidates(), rule)?;
        ManipulationOrdinal::new(ratings, embeddings, extension)
    }

    pub fn winner(&self) -> usize {
        self.winner
    }

    pub fn welfare(&self) -> &[f64] {
        &self.welfare
    }

    /// The fake ratings of the honest reports.
    pub fn fake_ratings(&self) -> &Ratings {
        &self.fake_ratings
    }

    /// The favorite candidate voter `i` can turn into the winner by
    /// reporting a different preference order.
    pub fn manipulation_voter(&mut self, voter: usize) -> Result<usize, VotingError> {
        if voter >= self.ratings.n_voters() {
            return Err(VotingError::VoterOutOfRange {
                voter,
                voters: self.ratings.n_voters(),
            });
        }
        let order = preference_order(&self.ratings.voter_ratings(voter));
        if order[0] == self.winner {
            return Ok(self.winner);
        }
        let winner = self.winner;
        let n_candidates = self.ratings.n_candidates();

        let ManipulationOrdinal {
            fake_ratings,
            embeddings,
            extension,
            ..
        } = self;
        let mut all_scores: Vec<(Score, usize, usize)> =
            Vec::with_capacity(n_candidates * n_candidates);
        {
            let mut patch = RatingsPatch::new(fake_ratings);
            for bucket in 0..n_candidates {
                let level = bucket as f64 / (n_candidates - 1) as f64;
                patch.set_row_uniform(voter, level);
                let scores = extension
                    .base()
                    .evaluate(patch.ratings(), embeddings)?
                    .scores;
                all_scores.extend(scores.iter().enumerate().map(|(c, &s)| (s, c, bucket)));
            }
        }
        all_scores.sort_by(|a, b| b.cmp(a));

        // Bucket e can absorb at most e higher-scoring entries before the
        // walk becomes inconsistent with a single report.
        let mut budgets: Vec<i64> = (0..n_candidates as i64).collect();
        let mut best = position_in(&order, winner)?;
        for (_, candidate, bucket) in all_scores {
            budgets[bucket] -= 1;
            if budgets[bucket] < 0 {
                break;
            }
            if bucket == n_candidates - 1 {
                let index = position_in(&order, candidate)?;
                if index < best {
                    best = index;
                }
            }
        }
        debug!(
            "voter {}: best reachable candidate {}",
            voter, order[best]
        );
        Ok(order[best])
    }

    /// The per-voter outcomes of [`manipulation_voter`], memoized.
    ///
    /// [`manipulation_voter`]: ManipulationOrdinal::manipulation_voter
    pub fn manipulation_global(&mut self) -> Result<Vec<usize>, VotingError> {
        if let Some(ref outcomes) = self.outcomes {
            return Ok(outcomes.clone());
        }
        let mut outcomes = Vec::with_capacity(self.ratings.n_voters());
        for voter in 0..self.ratings.n_voters() {
            outcomes.push(self.manipulation_voter(voter)?);
        }
        self.outcomes = Some(outcomes.clone());
        Ok(outcomes)
    }

    pub fn prop_manipulator(&mut self) -> Result<f64, VotingError> {
        let winner = self.winner;
        let outcomes = self.manipulation_global()?;
        Ok(proportion_not(&outcomes, winner))
    }

    pub fn avg_welfare(&mut self) -> Result<f64, VotingError> {
        let outcomes = self.manipulation_global()?;
        Ok(mean_welfare(&outcomes, &self.welfare))
    }

    pub fn worst_welfare(&mut self) -> Result<f64, VotingError> {
        let outcomes = self.manipulation_global()?;
        Ok(min_welfare(&outcomes, &self.welfare))
    }

    pub fn is_manipulable(&mut self) -> Result<bool, VotingError> {
        let winner = self.winner;
        Ok(self.manipulation_global()?.iter().any(|&c| c != winner))
    }
}

fn position_in(order: &[usize], candidate: usize) -> Result<usize, VotingError> {
    order
        .iter()
        .position(|&c| c == candidate)
        .ok_or(VotingError::CandidateOutOfRange {
            candidate,
            candidates: order.len(),
        })
}

fn proportion_not(outcomes: &[usize], winner: usize) -> f64 {
    if outcomes.is_empty() {
        return 0.0;
    }
    outcomes.iter().filter(|&&c| c != winner).count() as f64 / outcomes.len() as f64
}

fn mean_welfare(outcomes: &[usize], welfare: &[f64]) -> f64 {
    if outcomes.is_empty() {
        return 0.0;
    }
    outcomes.iter().map(|&c| welfare[c]).sum::<f64>() / outcomes.len() as f64
}

fn min_welfare(outcomes: &[usize], welfare: &[f64]) -> f64 {
    outcomes
        .iter()
        .map(|&c| welfare[c])
        .fold(f64::INFINITY, f64::min)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::rules::RuleProductRatings;
    use approx::assert_abs_diff_eq;
    use nalgebra::DMatrix;

    fn no_embeddings(n_voters: usize) -> Embeddings {
        Embeddings::new(DMatrix::zeros(n_voters, 0), false)
    }

    // Winner is candidate 0; voter 0 prefers candidate 1.
    fn cardinal_ratings() -> Ratings {
        Ratings::from_rows(&[
            vec![0.2, 0.9, 0.1],
            vec![0.8, 0.3, 0.1],
            vec![0.9, 0.4, 0.2],
        ])
        .unwrap()
    }

    #[test]
    fn cardinal_walk_finds_the_reachable_favorite() {
        let _ = env_logger::builder().is_test(true).try_init();
        let ratings = cardinal_ratings();
        let mut analysis =
            ManipulationVoter::new(&ratings, &no_embeddings(3), RuleProductRatings)
                .unwrap();
        assert_eq!(analysis.winner(), 0);
        assert_eq!(analysis.manipulation_voter(0).unwrap(), 1);
        assert_eq!(analysis.manipulation_global().unwrap(), vec![1, 0, 0]);
    }

    #[test]
    fn cardinal_fast_path_for_satisfied_voters() {
        let ratings = cardinal_ratings();
        let mut analysis =
            ManipulationVoter::new(&ratings, &no_embeddings(3), RuleProductRatings)
                .unwrap();
        // Voters 1 and 2 already see their favorite win.
        assert_eq!(analysis.manipulation_voter(1).unwrap(), 0);
        assert_eq!(analysis.manipulation_voter(2).unwrap(), 0);
    }

    #[test]
    fn cardinal_statistics() {
        let ratings = cardinal_ratings();
        let mut analysis =
            ManipulationVoter::new(&ratings, &no_embeddings(3), RuleProductRatings)
                .unwrap();
        assert!(analysis.is_manipulable().unwrap());
        assert_abs_diff_eq!(
            analysis.prop_manipulator().unwrap(),
            1.0 / 3.0,
            epsilon = 1e-12
        );
        // Welfare of candidate 1 under the product rule baseline.
        let w1 = 0.106 / 0.142;
        assert_abs_diff_eq!(analysis.worst_welfare().unwrap(), w1, epsilon = 1e-9);
        assert_abs_diff_eq!(
            analysis.avg_welfare().unwrap(),
            (w1 + 2.0) / 3.0,
            epsilon = 1e-9
        );
    }

    #[test]
    fn cardinal_probes_leave_no_residual_mutation() {
        let ratings = cardinal_ratings();
        let mut analysis =
            ManipulationVoter::new(&ratings, &no_embeddings(3), RuleProductRatings)
                .unwrap();
        let before = analysis.ratings.clone();
        analysis.manipulation_global().unwrap();
        assert_eq!(analysis.ratings, before);
    }

    #[test]
    fn voter_out_of_range() {
        let ratings = cardinal_ratings();
        let mut analysis =
            ManipulationVoter::new(&ratings, &no_embeddings(3), RuleProductRatings)
                .unwrap();
        assert_eq!(
            analysis.manipulation_voter(7).unwrap_err(),
            VotingError::VoterOutOfRange { voter: 7, voters: 3 }
        );
    }

    // A cyclic profile: the Borda fake ratings tie all candidates and
    // candidate 0 wins on the index tie-break.
    fn cyclic_ratings() -> Ratings {
        Ratings::from_rows(&[
            vec![0.9, 0.5, 0.1],
            vec![0.1, 0.9, 0.5],
            vec![0.5, 0.1, 0.9],
        ])
        .unwrap()
    }

    #[test]
    fn ordinal_walk_finds_the_reachable_candidate() {
        let ratings = cyclic_ratings();
        let mut analysis =
            ManipulationOrdinal::borda(&ratings, &no_embeddings(3), RuleProductRatings)
                .unwrap();
        assert_eq!(analysis.winner(), 0);
        // Voter 1 (true order 1 > 2 > 0) can reach her second choice.
        assert_eq!(analysis.manipulation_voter(1).unwrap(), 2);
        // Voter 2 (true order 2 > 0 > 1) cannot do better than the winner.
        assert_eq!(analysis.manipulation_voter(2).unwrap(), 0);
        assert_eq!(analysis.manipulation_global().unwrap(), vec![0, 2, 0]);
    }

    #[test]
    fn ordinal_statistics_with_tied_baseline_welfare() {
        let ratings = cyclic_ratings();
        let mut analysis =
            ManipulationOrdinal::borda(&ratings, &no_embeddings(3), RuleProductRatings)
                .unwrap();
        // The product rule ties every candidate on the true ratings, so the
        // baseline welfare is all 1.
        assert_eq!(analysis.welfare(), &[1.0, 1.0, 1.0]);
        assert!(analysis.is_manipulable().unwrap());
        assert_abs_diff_eq!(
            analysis.prop_manipulator().unwrap(),
            1.0 / 3.0,
            epsilon = 1e-12
        );
        assert_abs_diff_eq!(analysis.worst_welfare().unwrap(), 1.0, epsilon = 1e-12);
    }

    #[test]
    fn ordinal_probes_leave_no_residual_mutation() {
        let ratings = cyclic_ratings();
        let mut analysis =
            ManipulationOrdinal::borda(&ratings, &no_embeddings(3), RuleProductRatings)
                .unwrap();
        let fake_before = analysis.fake_ratings().clone();
        let ratings_before = analysis.ratings.clone();
        analysis.manipulation_global().unwrap();
        assert_eq!(analysis.fake_ratings(), &fake_before);
        assert_eq!(analysis.ratings, ratings_before);
    }
}
