use log::{debug, info};

use crate::embeddings::Embeddings;
use crate::errors::VotingError;
use crate::manipulation::RatingsPatch;
use crate::positional::{RuleInstantRunoff, RulePositional};
use crate::ratings::Ratings;
use crate::rule::ScoringRule;

/// Coalition manipulation analysis of a rule.
///
/// The analyzer records the baseline winner and welfare at construction,
/// then probes, candidate by candidate, whether the coalition of all voters
/// strictly preferring that candidate to the winner can elect her through
/// the trivial/extremal manipulation: every coalition member sets her rating
/// of the winner to the global minimum and of the candidate to the global
/// maximum, all other ratings untouched.
///
/// The analyzer works on a private copy of the ratings; each probe restores
/// the copy before returning, so probes never contaminate one another and
/// the caller's matrix is never touched.
#[derive(Debug)]
pub struct ManipulationCoalition<R> {
    ratings: Ratings,
    embeddings: Embeddings,
    rule: R,
    winner: usize,
    welfare: Vec<f64>,
}

impl<R: ScoringRule> ManipulationCoalition<R> {
    /// Evaluates the baseline election and sets up the analyzer.
    pub fn new(
        ratings: &Ratings,
        embeddings: &Embeddings,
        rule: R,
    ) -> Result<ManipulationCoalition<R>, VotingError> {
        let baseline = rule.evaluate(ratings, embeddings)?;
        info!(
            "coalition analysis: baseline winner {} over {} candidates",
            baseline.winner,
            ratings.n_candidates()
        );
        Ok(ManipulationCoalition {
            ratings: ratings.clone(),
            embeddings: embeddings.clone(),
            rule,
            winner: baseline.winner,
            welfare: baseline.welfare,
        })
    }

    /// The winner of the election without manipulation.
    pub fn winner(&self) -> usize {
        self.winner
    }

    /// The welfare of the candidates without manipulation.
    pub fn welfare(&self) -> &[f64] {
        &self.welfare
    }

    /// Whether the coalition of voters preferring `candidate` to the
    /// baseline winner can elect her by the extremal manipulation. An empty
    /// coalition leaves the ratings unchanged and can never flip the winner.
    ///
    /// The probe writes the observed global minimum and maximum of the
    /// matrix, never values outside the rating range. Rules sensitive to
    /// sign or count therefore see a weaker attack than one writing
    /// out-of-range values: under the product rule, a winner rated strictly
    /// positively everywhere keeps her full positive count, since the
    /// coalition can only lower her to the smallest rating in use.
    pub fn is_manipulable_for(&mut self, candidate: usize) -> Result<bool, VotingError> {
        if candidate >= self.ratings.n_candidates() {
            return Err(VotingError::CandidateOutOfRange {
                candidate,
                candidates: self.ratings.n_candidates(),
            });
        }
        let winner = self.winner;
        let coalition: Vec<usize> = (0..self.ratings.n_voters())
            .filter(|&voter| {
                self.ratings.get(voter, winner) < self.ratings.get(voter, candidate)
            })
            .collect();
        debug!(
            "{} voters interested to elect {} instead of {}",
            coalition.len(),
            candidate,
            winner
        );

        let min = self.ratings.min_rating();
        let max = self.ratings.max_rating();
        let ManipulationCoalition {
            ratings,
            embeddings,
            rule,
            ..
        } = self;
        let mut patch = RatingsPatch::new(ratings);
        for &voter in &coalition {
            patch.set(voter, winner, min);
            patch.set(voter, candidate, max);
        }
        let probe = rule.evaluate(patch.ratings(), embeddings)?;
        debug!("winner under manipulation for {}: {}", candidate, probe.winner);
        Ok(probe.winner == candidate)
    }

    /// Whether any candidate other than the baseline winner is reachable by
    /// coalition manipulation.
    pub fn is_manipulable(&mut self) -> Result<bool, VotingError> {
        for candidate in 0..self.ratings.n_candidates() {
            if candidate == self.winner {
                continue;
            }
            if self.is_manipulable_for(candidate)? {
                return Ok(true);
            }
        }
        Ok(false)
    }

    /// The minimum baseline welfare over all candidates reachable by
    /// coalition manipulation; the baseline winner's welfare (1.0) when no
    /// candidate is reachable.
    pub fn worst_welfare(&mut self) -> Result<f64, VotingError> {
        let mut worst = self.welfare[self.winner];
        for candidate in 0..self.ratings.n_candidates() {
            if candidate == self.winner {
                continue;
            }
            if self.is_manipulable_for(candidate)? {
                worst = worst.min(self.welfare[candidate]);
            }
        }
        Ok(worst)
    }
}

impl<R: ScoringRule> ManipulationCoalition<RulePositional<R>> {
    /// Coalition analysis in the ordinal setting: the winner comes from the
    /// extension-wrapped rule, the baseline welfare from the base rule on
    /// the true ratings.
    pub fn ordinal(
        ratings: &Ratings,
        embeddings: &Embeddings,
        extension: RulePositional<R>,
    ) -> Result<ManipulationCoalition<RulePositional<R>>, VotingError> {
        let winner = extension.evaluate(ratings, embeddings)?.winner;
        let welfare = extension.base().evaluate(ratings, embeddings)?.welfare;
        info!("ordinal coalition analysis: baseline winner {}", winner);
        Ok(ManipulationCoalition {
            ratings: ratings.clone(),
            embeddings: embeddings.clone(),
            rule: extension,
            winner,
            welfare,
        })
    }
}

impl<R: ScoringRule> ManipulationCoalition<RuleInstantRunoff<R>> {
    /// Coalition analysis under the instant-runoff extension of `rule`.
    pub fn ordinal_irv(
        ratings: &Ratings,
        embeddings: &Embeddings,
        rule: R,
    ) -> Result<ManipulationCoalition<RuleInstantRunoff<R>>, VotingError> {
        let irv = RuleInstantRunoff::new(rule);
        let winner = irv.evaluate(ratings, embeddings)?.winner;
        let welfare = irv.base().evaluate(ratings, embeddings)?.welfare;
        info!("IRV coalition analysis: baseline winner {}", winner);
        Ok(ManipulationCoalition {
            ratings: ratings.clone(),
            embeddings: embeddings.clone(),
            rule: irv,
            winner,
            welfare,
        })
    }
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

    // Candidate 0 wins honestly; voters 1 and 2 prefer candidate 1 and can
    // flip the election with the extremal manipulation; nobody prefers
    // candidate 2.
    fn manipulable_ratings() -> Ratings {
        Ratings::from_rows(&[
            vec![0.9, 0.1, 0.1],
            vec![0.4, 0.6, 0.1],
            vec![0.45, 0.55, 0.1],
        ])
        .unwrap()
    }

    #[test]
    fn trivial_manipulation_flips_the_winner() {
        let _ = env_logger::builder().is_test(true).try_init();
        let ratings = manipulable_ratings();
        let mut analysis =
            ManipulationCoalition::new(&ratings, &no_embeddings(3), RuleProductRatings)
                .unwrap();
        assert_eq!(analysis.winner(), 0);
        assert!(analysis.is_manipulable_for(1).unwrap());
        assert!(analysis.is_manipulable().unwrap());
    }

    #[test]
    fn empty_coalition_cannot_manipulate() {
        let ratings = manipulable_ratings();
        let mut analysis =
            ManipulationCoalition::new(&ratings, &no_embeddings(3), RuleProductRatings)
                .unwrap();
        // No voter rates candidate 2 above the winner.
        assert!(!analysis.is_manipulable_for(2).unwrap());
    }

    #[test]
    fn worst_welfare_is_the_reached_candidate_welfare() {
        let ratings = manipulable_ratings();
        let mut analysis =
            ManipulationCoalition::new(&ratings, &no_embeddings(3), RuleProductRatings)
                .unwrap();
        // Candidate 1 is the only reachable candidate; its baseline welfare
        // is (0.033 - 0.001) / (0.162 - 0.001).
        assert_abs_diff_eq!(
            analysis.worst_welfare().unwrap(),
            0.032 / 0.161,
            epsilon = 1e-9
        );
    }

    #[test]
    fn probe_values_stay_within_the_rating_range() {
        // All ratings are strictly positive, so the probe lowers the winner
        // to 0.1 instead of knocking her out of the positive count. The
        // lone defector cannot outweigh that: writing values outside the
        // range (say -1 and 2) would flip this election, writing the
        // observed extremes does not.
        let ratings = Ratings::from_rows(&[
            vec![0.9, 0.1],
            vec![0.5, 0.6],
            vec![0.6, 0.5],
        ])
        .unwrap();
        let mut analysis =
            ManipulationCoalition::new(&ratings, &no_embeddings(3), RuleProductRatings)
                .unwrap();
        assert_eq!(analysis.winner(), 0);
        // Probed: candidate 0 keeps (3, 0.9 * 0.1 * 0.6), candidate 1 gets
        // (3, 0.1 * 0.9 * 0.5), so candidate 0 survives.
        assert!(!analysis.is_manipulable_for(1).unwrap());
        assert!(!analysis.is_manipulable().unwrap());
    }

    #[test]
    fn probes_leave_no_residual_mutation() {
        let ratings = manipulable_ratings();
        let mut analysis =
            ManipulationCoalition::new(&ratings, &no_embeddings(3), RuleProductRatings)
                .unwrap();
        let before = analysis.ratings.clone();
        analysis.is_manipulable().unwrap();
        analysis.worst_welfare().unwrap();
        assert_eq!(analysis.ratings, before);
    }

    #[test]
    fn non_manipulable_profile_keeps_winner_welfare() {
        // Unanimous profile: no coalition wants a change.
        let ratings = Ratings::from_rows(&[
            vec![0.9, 0.1, 0.2],
            vec![0.8, 0.2, 0.1],
            vec![0.9, 0.3, 0.2],
        ])
        .unwrap();
        let mut analysis =
            ManipulationCoalition::new(&ratings, &no_embeddings(3), RuleProductRatings)
                .unwrap();
        assert!(!analysis.is_manipulable().unwrap());
        assert_abs_diff_eq!(analysis.worst_welfare().unwrap(), 1.0, epsilon = 1e-12);
    }

    #[test]
    fn ordinal_irv_baseline_comes_from_the_extension() {
        let ratings = Ratings::from_rows(&[
            vec![0.9, 0.5, 0.1],
            vec![0.8, 0.6, 0.2],
            vec![0.1, 0.5, 0.9],
            vec![0.2, 0.6, 0.8],
            vec![0.5, 0.9, 0.1],
        ])
        .unwrap();
        let analysis = ManipulationCoalition::ordinal_irv(
            &ratings,
            &no_embeddings(5),
            RuleProductRatings,
        )
        .unwrap();
        // IRV elects candidate 0, while the base product rule on the true
        // ratings supplies the welfare scale.
        assert_eq!(analysis.winner(), 0);
        assert_eq!(analysis.welfare().len(), 3);
    }
}
